//! Boundary traits for the subsystems a session talks to.
//!
//! The client stage, the input channel and the compositor surface node are
//! owned elsewhere; a session only holds shared handles to them and treats
//! every one of them as optional until connect.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::SessionResult;
use crate::input::{KeyEvent, PointerEvent};
use crate::rect::{Rect, SizeChangeReason};

/// Client-side peer of a session.
///
/// Every method has a no-op default so test doubles only override what they
/// observe.
pub trait SessionStage: Send + Sync {
    fn set_active(&self, _active: bool) {}

    fn update_focus(&self, _focused: bool) {}

    fn update_rect(&self, _rect: Rect, _reason: SizeChangeReason) {}

    fn notify_session_foreground(&self) {}

    fn notify_session_background(&self) {}

    fn notify_foreground_interactive_status(&self, _interactive: bool) {}

    fn handle_back_event(&self) -> SessionResult<()> {
        Ok(())
    }
}

/// Input channel into the client process.
pub trait EventChannel: Send + Sync {
    fn transfer_key_event(&self, event: &KeyEvent) -> SessionResult<()>;

    fn transfer_pointer_event(&self, event: &PointerEvent) -> SessionResult<()>;
}

/// Compositor-side surface node supplied by the client at connect.
///
/// `attach` and `detach` must be idempotent.
pub trait SurfaceNode: Send + Sync {
    fn id(&self) -> u64;

    fn attach(&self, handle: &RenderSurfaceHandle) -> SessionResult<()>;

    fn detach(&self);
}

static NEXT_SURFACE_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Drawable surface a foregrounded session owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderSurfaceHandle {
    pub id: u64,
    pub node_id: u64,
}

impl RenderSurfaceHandle {
    pub(crate) fn allocate(node_id: u64) -> Self {
        Self {
            id: NEXT_SURFACE_HANDLE.fetch_add(1, Ordering::Relaxed),
            node_id,
        }
    }
}

/// Opaque credential a client establishes at connect.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdentityToken(..)")
    }
}

impl From<&str> for IdentityToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity of the process issuing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Caller {
    /// `-1` when unknown
    pub pid: i32,
    /// System applications pass the system-permission gates
    pub is_system: bool,
}

impl Caller {
    #[must_use]
    pub const fn app(pid: i32) -> Self {
        Self {
            pid,
            is_system: false,
        }
    }

    #[must_use]
    pub const fn system() -> Self {
        Self {
            pid: 0,
            is_system: true,
        }
    }
}
