//! Overlay windows (system windows, dialogs, floating balls): permission
//! gated show/hide, back-event handling and the input-dispatch checks that
//! keep hidden overlays from receiving events.

use tracing::debug;

use super::{Session, SessionId, SessionInner};
use crate::category::{WindowCategory, need_system_permission};
use crate::collaborators::Caller;
use crate::error::{SessionError, SessionResult};
use crate::input::{KeyCode, KeyEvent, PointDown};
use crate::notify::{CameraWindow, SessionEvent};
use crate::property::{WindowAnimation, WindowMode, WindowProperty, WindowType};

impl SessionInner {
    fn show(&mut self, caller: Caller, property: Option<WindowProperty>) -> SessionResult<()> {
        self.ensure_not_ended()?;
        let window_type = self.property.window_type;
        if !caller.is_system {
            if matches!(window_type, WindowType::Toast | WindowType::Float) {
                let parent = self.parent_session().ok_or(SessionError::InvalidParent)?;
                if !parent.state().is_foreground() {
                    return Err(SessionError::InvalidOperation(format!(
                        "parent {} is not in foreground",
                        parent.id()
                    )));
                }
            } else if self.category == WindowCategory::System && need_system_permission(window_type)
            {
                return Err(SessionError::PermissionDenied(format!(
                    "{window_type:?} requires a system caller"
                )));
            }
        }
        let property = property.ok_or(SessionError::NullArgument("window property"))?;
        if property.animation_flag == WindowAnimation::Custom {
            self.property.animation_flag = WindowAnimation::Custom;
            self.fire(SessionEvent::CustomAnimation(true));
        }
        self.update_camera_status(true);
        self.foreground(Some(property), true)
    }

    fn hide(&mut self, caller: Caller) -> SessionResult<()> {
        self.ensure_not_ended()?;
        let window_type = self.property.window_type;
        if !caller.is_system
            && self.category == WindowCategory::System
            && need_system_permission(window_type)
            && window_type != WindowType::InputMethodStatusBar
        {
            return Err(SessionError::PermissionDenied(format!(
                "{window_type:?} requires a system caller"
            )));
        }
        self.set_active(false)?;
        if self.property.animation_flag == WindowAnimation::Custom {
            debug!(session_id = %self.id, "hide deferred to custom animation");
            self.fire(SessionEvent::CustomAnimation(true));
            return Ok(());
        }
        self.update_camera_status(false);
        self.background(false)
    }

    /// Report a camera float window, or a PiP window in a video call or
    /// meeting, starting or stopping.
    pub(crate) fn update_camera_status(&self, showing: bool) {
        let window = match self.property.window_type {
            WindowType::FloatCamera => CameraWindow::Float,
            WindowType::Pip
                if self.property.window_mode == WindowMode::Pip
                    && self.property.pip_template.uses_camera() =>
            {
                CameraWindow::Pip
            }
            _ => return,
        };
        debug!(session_id = %self.id, ?window, showing, "camera window status");
        self.fire(SessionEvent::CameraStatus { window, showing });
    }

    fn process_back_event(&mut self) -> SessionResult<()> {
        self.ensure_valid()?;
        if self.category == WindowCategory::Dialog {
            debug!(session_id = %self.id, "dialog swallows back event");
            return Ok(());
        }
        self.stage
            .as_ref()
            .ok_or(SessionError::NullArgument("session stage"))?
            .handle_back_event()
    }

    /// Id of the dialog on top of this session's parent, if any.
    fn sibling_on_top(&self) -> Option<SessionId> {
        if self.category != WindowCategory::Dialog {
            return None;
        }
        let parent = self.parent_session()?;
        parent
            .dialogs()
            .into_iter()
            .filter(Session::blocks_parent)
            .last()
            .map(|top| top.id())
            .filter(|top| *top != self.id)
    }

    /// Visible, foreground, and (for bound overlays) under a foreground parent.
    pub(crate) fn check_key_event_dispatch(&self) -> bool {
        if !self.state.is_foreground() || self.property.rect.is_empty() {
            return false;
        }
        match self.parent_session() {
            Some(parent) => parent.state().is_foreground(),
            None => self.category != WindowCategory::Dialog,
        }
    }

    pub(crate) fn overlay_key_gate(&self, event: &KeyEvent) -> SessionResult<bool> {
        if self.category == WindowCategory::Dialog {
            if event.key_code == KeyCode::Back {
                return Err(SessionError::PermissionDenied(
                    "dialogs do not receive the back key".to_string(),
                ));
            }
            if let Some(top) = self.sibling_on_top() {
                return Err(SessionError::PermissionDenied(format!(
                    "dialog {top} is on top"
                )));
            }
        }
        Ok(self.check_key_event_dispatch())
    }

    pub(crate) fn overlay_point_down(&mut self) -> PointDown {
        if let Some(top) = self.sibling_on_top() {
            debug!(session_id = %self.id, top = %top, "point down below another dialog");
            return PointDown::Ignored;
        }
        self.raise_for_point_down()
    }

    pub(crate) fn raise_for_point_down(&mut self) -> PointDown {
        if self.category == WindowCategory::Dialog && self.property.raise_enabled {
            self.fire(SessionEvent::RaiseToTop);
        }
        self.present_focus_on_point_down()
    }
}

impl Session {
    /// Show the window on behalf of `caller`.
    pub async fn show(&self, caller: Caller, property: Option<WindowProperty>) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.show(caller, property))
            .await
    }

    /// Hide the window on behalf of `caller`.
    pub async fn hide(&self, caller: Caller) -> SessionResult<()> {
        self.queue().call(move |inner| inner.hide(caller)).await
    }

    pub async fn process_back_event(&self) -> SessionResult<()> {
        self.queue().call(SessionInner::process_back_event).await
    }

    pub async fn check_key_event_dispatch(&self) -> SessionResult<bool> {
        self.queue()
            .call(|inner| Ok(inner.check_key_event_dispatch()))
            .await
    }

    /// Mission this window belongs to: its parent's, or its own.
    #[must_use]
    pub fn mission_id(&self) -> SessionId {
        self.parent().map_or_else(|| self.id(), |parent| parent.id())
    }
}
