//! Top-level application windows: dialog binding, modal input blocking and
//! the attributes only a main window carries.

use tokio::sync::oneshot;
use tracing::{debug, info};

use super::{Link, Session, SessionId, SessionInner, WeakSession};
use crate::category::WindowCategory;
use crate::collaborators::Caller;
use crate::error::{SessionError, SessionResult};
use crate::input::PointDown;
use crate::notify::SessionEvent;
use crate::property::WindowMode;
use crate::queue::Step;
use crate::rect::Rect;

/// Longest accepted window label, in bytes.
pub const MAX_LABEL_LEN: usize = 1024;

const MAIN_ONLY: &[WindowCategory] = &[WindowCategory::Main];

impl SessionInner {
    // ── Dialogs ──────────────────────────────────────────────────────

    fn bind_dialog(
        &mut self,
        dialog: Session,
        this: WeakSession,
    ) -> SessionResult<oneshot::Receiver<()>> {
        self.require_category("bind_dialog", MAIN_ONLY)?;
        self.ensure_not_ended()?;
        if dialog.id() == self.id {
            return Err(SessionError::InvalidParam(
                "a session cannot be its own dialog".to_string(),
            ));
        }
        if !dialog.category().is_overlay() {
            return Err(SessionError::InvalidParam(format!(
                "{} windows cannot be bound as dialogs",
                dialog.category()
            )));
        }
        if dialog.state().is_terminal() {
            return Err(SessionError::InvalidSession(dialog.id().0));
        }

        {
            let mut links = self.write_links();
            if !links.dialogs.iter().any(|link| link.id == dialog.id()) {
                links.dialogs.push(Link {
                    id: dialog.id(),
                    handle: dialog.downgrade(),
                });
            }
        }
        info!(session_id = %self.id, dialog = %dialog.id(), "dialog bound");

        let link = Link {
            id: self.id,
            handle: this,
        };
        let (active, focused, rect) = (self.is_active, self.is_focused, self.property.rect);
        dialog
            .queue()
            .post_with_signal(move |child: &mut SessionInner| {
                child.attach_parent(link, active, focused, rect);
                Step::Done
            })
    }

    /// Dialog side of a bind: record the parent and adopt its state.
    fn attach_parent(&mut self, link: Link, active: bool, focused: bool, parent_rect: Rect) {
        if self.state.is_terminal() {
            if let Some(parent) = link.handle.upgrade() {
                let id = self.id;
                let _ = parent.queue().post(Box::new(move |owner: &mut SessionInner| {
                    owner.unbind_dialog(id);
                    Step::Done
                }));
            }
            return;
        }
        self.set_parent(Some(link));
        self.update_active_status(active);
        self.update_focus(focused);
        if !parent_rect.is_empty() {
            self.reclamp_within(parent_rect);
        }
    }

    pub(crate) fn unbind_dialog(&mut self, dialog: SessionId) {
        let mut links = self.write_links();
        let before = links.dialogs.len();
        links.dialogs.retain(|link| link.id != dialog);
        if links.dialogs.len() != before {
            debug!(session_id = %self.id, dialog = %dialog, "dialog unbound");
        }
    }

    /// Topmost dialog currently holding input away from this window.
    pub(crate) fn blocking_dialog(&self) -> Option<Session> {
        self.dialog_sessions()
            .into_iter()
            .filter(Session::blocks_parent)
            .last()
    }

    // ── Input ────────────────────────────────────────────────────────

    pub(crate) fn main_key_gate(&self) -> SessionResult<bool> {
        if let Some(dialog) = self.blocking_dialog() {
            return Err(SessionError::PermissionDenied(format!(
                "dialog {} holds input",
                dialog.id()
            )));
        }
        Ok(true)
    }

    pub(crate) fn main_point_down(&mut self, x: i32, y: i32) -> PointDown {
        let modal = self.property.is_modal();
        if !modal {
            if let Some(top) = self.blocking_dialog() {
                let id = top.id();
                let _ = top.queue().post(Box::new(|child: &mut SessionInner| {
                    child.raise_for_point_down();
                    Step::Done
                }));
                debug!(session_id = %self.id, dialog = %id, "point down routed to dialog");
                return PointDown::RoutedToDialog(id);
            }
        }
        if modal && !self.property.rect.contains(x, y) {
            self.fire(SessionEvent::ClickOutsideModal { x, y });
        }
        self.present_focus_on_point_down()
    }

    // ── Main-window attributes ───────────────────────────────────────

    pub(crate) fn set_topmost(&mut self, topmost: bool) -> SessionResult<()> {
        self.require_category("set_topmost", MAIN_ONLY)?;
        self.ensure_not_ended()?;
        if self.property.topmost != topmost {
            self.property.topmost = topmost;
            self.fire(SessionEvent::Topmost(topmost));
        }
        Ok(())
    }

    pub(crate) fn set_main_window_topmost(&mut self, topmost: bool) -> SessionResult<()> {
        self.require_category("set_main_window_topmost", MAIN_ONLY)?;
        self.ensure_not_ended()?;
        if self.property.main_window_topmost != topmost {
            self.property.main_window_topmost = topmost;
            self.fire(SessionEvent::MainWindowTopmost(topmost));
        }
        Ok(())
    }

    fn notify_session_lock_state_change(&mut self, locked: bool) -> SessionResult<()> {
        self.require_category("notify_session_lock_state_change", MAIN_ONLY)?;
        if self.main.lock_state == locked {
            return Ok(());
        }
        self.main.lock_state = locked;
        debug!(session_id = %self.id, locked, "lock state changed");
        self.fire(SessionEvent::LockState(locked));
        Ok(())
    }

    fn notify_main_modal_type_change(&mut self, is_modal: bool) -> SessionResult<()> {
        self.require_category("notify_main_modal_type_change", MAIN_ONLY)?;
        self.ensure_not_ended()?;
        self.fire(SessionEvent::ModalType(is_modal));
        Ok(())
    }

    fn set_session_label_and_icon(
        &mut self,
        caller: Caller,
        label: String,
        icon: Option<Vec<u8>>,
    ) -> SessionResult<()> {
        self.require_category("set_session_label_and_icon", MAIN_ONLY)?;
        if caller.pid == -1 || caller.pid != self.calling_pid {
            return Err(SessionError::PermissionDenied(
                "only the owning process may set the label".to_string(),
            ));
        }
        if !self.config.device.is_pc_window {
            return Err(SessionError::DeviceNotSupported("window label and icon"));
        }
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(SessionError::InvalidParam(format!(
                "label must be 1..={MAX_LABEL_LEN} bytes"
            )));
        }
        let has_icon = icon.is_some_and(|bytes| !bytes.is_empty());
        self.main.label.clone_from(&label);
        self.fire(SessionEvent::LabelAndIcon { label, has_icon });
        Ok(())
    }

    fn update_flag(&mut self, flag: String) -> SessionResult<()> {
        self.require_category("update_flag", MAIN_ONLY)?;
        self.main.specified_flag.clone_from(&flag);
        self.fire(SessionEvent::Flag(flag));
        Ok(())
    }

    fn notify_foreground_interactive_status(&mut self, interactive: bool) -> SessionResult<()> {
        self.require_category("notify_foreground_interactive_status", MAIN_ONLY)?;
        self.main.foreground_interactive = interactive;
        if self.state.is_valid() && self.state.is_visible() {
            if let Some(stage) = &self.stage {
                stage.notify_foreground_interactive_status(interactive);
            }
        }
        Ok(())
    }

    /// Restore a saved aspect ratio; ratios too close to zero are ignored.
    pub(crate) fn restore_aspect_ratio(&mut self, ratio: f32) -> bool {
        if ratio.abs() < 1e-6 {
            return false;
        }
        self.property.aspect_ratio = ratio;
        true
    }

    fn set_exit_split_on_background(&mut self, exit: bool) -> SessionResult<()> {
        self.require_category("set_exit_split_on_background", MAIN_ONLY)?;
        self.main.exit_split_on_background = exit;
        Ok(())
    }

    /// Record the pointer hot area; only floating windows keep one.
    fn update_pointer_area(&mut self, area: Rect) -> bool {
        let floating = self.property.window_mode == WindowMode::Floating;
        let applies = match self.category {
            WindowCategory::Main => floating,
            WindowCategory::System => floating && self.property.decor_enabled,
            _ => false,
        };
        if applies {
            self.pointer_area = Some(area);
        }
        applies
    }
}

impl Session {
    /// Bind `dialog` to this main window. Resolves once the dialog has
    /// adopted the parent's active and focus state.
    pub async fn bind_dialog(&self, dialog: &Session) -> SessionResult<()> {
        let this = self.downgrade();
        let child = dialog.clone();
        let adopted = self
            .queue()
            .call(move |inner| inner.bind_dialog(child, this))
            .await?;
        adopted.await.map_err(|_| SessionError::DestroyedObject)
    }

    /// Main window with the modal flag set.
    #[must_use]
    pub fn is_modal(&self) -> bool {
        self.category() == WindowCategory::Main && self.snapshot().property.is_modal()
    }

    pub async fn set_topmost(&self, topmost: bool) -> SessionResult<()> {
        self.queue().call(move |inner| inner.set_topmost(topmost)).await
    }

    pub async fn set_main_window_topmost(&self, topmost: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.set_main_window_topmost(topmost))
            .await
    }

    pub async fn notify_session_lock_state_change(&self, locked: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.notify_session_lock_state_change(locked))
            .await
    }

    pub async fn notify_main_modal_type_change(&self, is_modal: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.notify_main_modal_type_change(is_modal))
            .await
    }

    pub async fn set_session_label_and_icon(
        &self,
        caller: Caller,
        label: impl Into<String>,
        icon: Option<Vec<u8>>,
    ) -> SessionResult<()> {
        let label = label.into();
        self.queue()
            .call(move |inner| inner.set_session_label_and_icon(caller, label, icon))
            .await
    }

    pub async fn update_flag(&self, flag: impl Into<String>) -> SessionResult<()> {
        let flag = flag.into();
        self.queue().call(move |inner| inner.update_flag(flag)).await
    }

    pub async fn notify_foreground_interactive_status(&self, interactive: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.notify_foreground_interactive_status(interactive))
            .await
    }

    /// Returns whether the ratio was applied.
    pub async fn restore_aspect_ratio(&self, ratio: f32) -> SessionResult<bool> {
        self.queue()
            .call(move |inner| {
                inner.require_category("restore_aspect_ratio", MAIN_ONLY)?;
                Ok(inner.restore_aspect_ratio(ratio))
            })
            .await
    }

    pub async fn set_exit_split_on_background(&self, exit: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.set_exit_split_on_background(exit))
            .await
    }

    /// Returns whether the area was recorded.
    pub async fn update_pointer_area(&self, area: Rect) -> SessionResult<bool> {
        self.queue()
            .call(move |inner| Ok(inner.update_pointer_area(area)))
            .await
    }
}
