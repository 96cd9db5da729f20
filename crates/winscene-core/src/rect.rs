//! Window geometry and the clamp-never-fail rect check.
//!
//! Rect requests frequently come from continuous drag gestures, so the check
//! clamps every out-of-range dimension to the nearest valid bound instead of
//! rejecting the request.

use serde::{Deserialize, Serialize};

/// Window rectangle in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `(px, py)` falls inside the rect (right/bottom edges exclusive).
    #[must_use]
    pub fn contains(&self, px: i32, py: i32) -> bool {
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        i64::from(px) >= i64::from(self.x)
            && i64::from(px) < right
            && i64::from(py) >= i64::from(self.y)
            && i64::from(py) < bottom
    }

    #[must_use]
    pub const fn with_size(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }
}

/// Per-window size limits requested by the client.
///
/// Zero in a `max_*` field means "unbounded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowLimits {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl WindowLimits {
    #[must_use]
    pub const fn new(min_width: u32, min_height: u32, max_width: u32, max_height: u32) -> Self {
        Self {
            min_width,
            min_height,
            max_width,
            max_height,
        }
    }

    /// Limits are coherent when each bounded max is at least its min.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        (self.max_width == 0 || self.max_width >= self.min_width)
            && (self.max_height == 0 || self.max_height >= self.min_height)
    }
}

/// Why a rect changed; drives whether the rect check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeChangeReason {
    #[default]
    Undefined,
    Resize,
    Move,
    DragStart,
    DragMove,
    DragEnd,
    Maximize,
    Recover,
    Rotation,
}

impl SizeChangeReason {
    /// Reasons whose requested size must pass the rect check.
    #[must_use]
    pub const fn is_rect_affecting(self) -> bool {
        matches!(
            self,
            Self::Resize | Self::Move | Self::DragMove | Self::DragEnd | Self::Maximize | Self::Recover
        )
    }
}

/// Effective bounds for one rect check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl SizeBounds {
    /// Combine category minimums, the global floating cap, client limits and
    /// the parent rect into one set of bounds. A max below its min yields to
    /// the min.
    #[must_use]
    pub fn resolve(
        category_min: (u32, u32),
        max_floating_size: u32,
        limits: &WindowLimits,
        parent: Option<&Rect>,
    ) -> Self {
        let min_width = category_min.0.max(limits.min_width);
        let min_height = category_min.1.max(limits.min_height);

        let mut max_width = max_floating_size;
        let mut max_height = max_floating_size;
        if limits.max_width > 0 {
            max_width = max_width.min(limits.max_width);
        }
        if limits.max_height > 0 {
            max_height = max_height.min(limits.max_height);
        }
        if let Some(parent) = parent.filter(|rect| !rect.is_empty()) {
            max_width = max_width.min(parent.width);
            max_height = max_height.min(parent.height);
        }

        Self {
            min_width,
            min_height,
            max_width: max_width.max(min_width),
            max_height: max_height.max(min_height),
        }
    }

    /// Clamp a requested size into these bounds.
    #[must_use]
    pub fn clamp(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.clamp(self.min_width, self.max_width),
            height.clamp(self.min_height, self.max_height),
        )
    }
}
