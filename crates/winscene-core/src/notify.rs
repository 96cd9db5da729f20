//! Single-slot notification handlers keyed by event kind.
//!
//! A session fires an event by kind; the registered handler for that kind, if
//! any, runs on the session's queue. With no handlers registered every
//! notification is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::property::{FloatingBallTemplate, PropertyAction};
use crate::rect::{Rect, SizeChangeReason};
use crate::session::{ExceptionInfo, SessionId, TerminateInfo};
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StateChange,
    Foreground,
    Background,
    ActiveStatus,
    FocusChange,
    RectChange,
    Exception,
    Terminate,
    ApplyFailed,
    PropertyChange,
    LockState,
    ModalType,
    Topmost,
    MainWindowTopmost,
    LabelAndIcon,
    Flag,
    RaiseToTop,
    ClickOutsideModal,
    CustomAnimation,
    FloatingBallUpdate,
    FloatingBallStop,
    RestoreFbMainWindow,
    CameraStatus,
}

impl EventKind {
    pub const ALL: [Self; 23] = [
        Self::StateChange,
        Self::Foreground,
        Self::Background,
        Self::ActiveStatus,
        Self::FocusChange,
        Self::RectChange,
        Self::Exception,
        Self::Terminate,
        Self::ApplyFailed,
        Self::PropertyChange,
        Self::LockState,
        Self::ModalType,
        Self::Topmost,
        Self::MainWindowTopmost,
        Self::LabelAndIcon,
        Self::Flag,
        Self::RaiseToTop,
        Self::ClickOutsideModal,
        Self::CustomAnimation,
        Self::FloatingBallUpdate,
        Self::FloatingBallStop,
        Self::RestoreFbMainWindow,
        Self::CameraStatus,
    ];
}

/// Which kind of window is holding the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraWindow {
    Float,
    Pip,
}

/// Payload handed to a notification handler.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChange {
        from: SessionState,
        to: SessionState,
    },
    Foreground,
    Background {
        from_client: bool,
    },
    ActiveStatus(bool),
    FocusChange(bool),
    RectChange {
        rect: Rect,
        reason: SizeChangeReason,
    },
    Exception(ExceptionInfo),
    Terminate(TerminateInfo),
    /// The asynchronous half of a transition failed
    ApplyFailed {
        operation: &'static str,
        error: SessionError,
    },
    PropertyChange(PropertyAction),
    LockState(bool),
    ModalType(bool),
    Topmost(bool),
    MainWindowTopmost(bool),
    LabelAndIcon {
        label: String,
        has_icon: bool,
    },
    Flag(String),
    RaiseToTop,
    ClickOutsideModal {
        x: i32,
        y: i32,
    },
    CustomAnimation(bool),
    FloatingBallUpdate(FloatingBallTemplate),
    FloatingBallStop,
    RestoreFbMainWindow(String),
    /// A camera float or video-call PiP window started or stopped showing
    CameraStatus {
        window: CameraWindow,
        showing: bool,
    },
}

impl SessionEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StateChange { .. } => EventKind::StateChange,
            Self::Foreground => EventKind::Foreground,
            Self::Background { .. } => EventKind::Background,
            Self::ActiveStatus(_) => EventKind::ActiveStatus,
            Self::FocusChange(_) => EventKind::FocusChange,
            Self::RectChange { .. } => EventKind::RectChange,
            Self::Exception(_) => EventKind::Exception,
            Self::Terminate(_) => EventKind::Terminate,
            Self::ApplyFailed { .. } => EventKind::ApplyFailed,
            Self::PropertyChange(_) => EventKind::PropertyChange,
            Self::LockState(_) => EventKind::LockState,
            Self::ModalType(_) => EventKind::ModalType,
            Self::Topmost(_) => EventKind::Topmost,
            Self::MainWindowTopmost(_) => EventKind::MainWindowTopmost,
            Self::LabelAndIcon { .. } => EventKind::LabelAndIcon,
            Self::Flag(_) => EventKind::Flag,
            Self::RaiseToTop => EventKind::RaiseToTop,
            Self::ClickOutsideModal { .. } => EventKind::ClickOutsideModal,
            Self::CustomAnimation(_) => EventKind::CustomAnimation,
            Self::FloatingBallUpdate(_) => EventKind::FloatingBallUpdate,
            Self::FloatingBallStop => EventKind::FloatingBallStop,
            Self::RestoreFbMainWindow(_) => EventKind::RestoreFbMainWindow,
            Self::CameraStatus { .. } => EventKind::CameraStatus,
        }
    }
}

/// Notification handler: receives the firing session's id and the event.
pub type Handler = Arc<dyn Fn(SessionId, &SessionEvent) + Send + Sync>;

/// At most one handler per [`EventKind`].
#[derive(Default, Clone)]
pub struct SessionCallbacks {
    handlers: HashMap<EventKind, Handler>,
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SessionCallbacks {
    /// Install `handler` for `kind`, replacing any previous one.
    pub fn set(&mut self, kind: EventKind, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    pub fn clear(&mut self, kind: EventKind) -> Option<Handler> {
        self.handlers.remove(&kind)
    }

    #[must_use]
    pub fn contains(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Call the handler for the event's kind if one is present.
    ///
    /// Returns whether a handler ran.
    pub fn fire(&self, session_id: SessionId, event: &SessionEvent) -> bool {
        match self.handlers.get(&event.kind()) {
            Some(handler) => {
                handler(session_id, event);
                true
            }
            None => false,
        }
    }
}
