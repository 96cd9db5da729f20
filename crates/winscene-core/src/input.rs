//! Input event values forwarded (or blocked) by sessions.
//!
//! Sessions never read raw input frames. They decide whether an event may
//! reach the client and hand it to the session's [`EventChannel`].
//!
//! [`EventChannel`]: crate::collaborators::EventChannel

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Back,
    Enter,
    Escape,
    Tab,
    Space,
    /// Any other platform key code
    Other(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    #[default]
    Down,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key_code: KeyCode,
    #[serde(default)]
    pub action: KeyAction,
}

impl KeyEvent {
    #[must_use]
    pub const fn down(key_code: KeyCode) -> Self {
        Self {
            key_code,
            action: KeyAction::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Down,
    Up,
    Move,
    Cancel,
    EnterWindow,
    LeaveWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    #[serde(default)]
    pub pointer_id: u32,
    pub action: PointerAction,
    pub x: i32,
    pub y: i32,
}

impl PointerEvent {
    #[must_use]
    pub const fn new(action: PointerAction, x: i32, y: i32) -> Self {
        Self {
            pointer_id: 0,
            action,
            x,
            y,
        }
    }
}

/// Outcome of an input transfer that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// Forwarded to the client's event channel
    Delivered,
    /// A dispatch-eligibility hook declined the event
    Suppressed,
}

impl Dispatch {
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Who handled a point-down on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointDown {
    /// The session itself handled the point-down
    Handled,
    /// A foreground dialog of the session claimed it
    RoutedToDialog(SessionId),
    /// Another dialog of the same parent is on top; nothing happened
    Ignored,
}
