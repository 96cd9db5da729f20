//! Keyed property updates.
//!
//! Each [`PropertyAction`] names one attribute family. The handler copies
//! that family, and nothing else, from the incoming property after
//! validating it, then fires the notification tied to the action.

use tracing::debug;

use super::{Session, SessionInner};
use crate::category::WindowCategory;
use crate::collaborators::Caller;
use crate::error::{SessionError, SessionResult};
use crate::notify::SessionEvent;
use crate::property::{PropertyAction, WindowFlags, WindowProperty};
use crate::rect::SizeChangeReason;

/// Accepted sub-window z-level range.
pub const SUB_WINDOW_Z_LEVEL_RANGE: std::ops::RangeInclusive<i32> = -10_000..=10_000;

fn require_system(caller: Caller, action: PropertyAction) -> SessionResult<()> {
    if caller.is_system {
        Ok(())
    } else {
        Err(SessionError::PermissionDenied(format!(
            "{action:?} requires a system caller"
        )))
    }
}

/// Copy one field, reporting whether it changed.
fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl SessionInner {
    fn update_property(
        &mut self,
        caller: Caller,
        property: Option<WindowProperty>,
        action: PropertyAction,
    ) -> SessionResult<()> {
        let incoming = property.ok_or(SessionError::NullArgument("window property"))?;
        self.ensure_not_ended()?;
        if !(self.rules.supports_action)(action) {
            return Err(SessionError::NotSupportedForCategory {
                action,
                category: self.category,
            });
        }

        let changed = match action {
            PropertyAction::TurnScreenOn => {
                assign(&mut self.property.turn_screen_on, incoming.turn_screen_on)
            }
            PropertyAction::KeepScreenOn => {
                assign(&mut self.property.keep_screen_on, incoming.keep_screen_on)
            }
            PropertyAction::Focusable => {
                let changed = assign(&mut self.property.focusable, incoming.focusable);
                if changed && !incoming.focusable {
                    self.update_focus(false);
                }
                changed
            }
            PropertyAction::Touchable => assign(&mut self.property.touchable, incoming.touchable),
            PropertyAction::SetBrightness => {
                let brightness = incoming.brightness;
                if brightness != -1.0 && !(0.0..=1.0).contains(&brightness) {
                    return Err(SessionError::InvalidParam(format!(
                        "brightness {brightness} outside [0, 1]"
                    )));
                }
                assign(&mut self.property.brightness, brightness)
            }
            PropertyAction::Orientation => {
                assign(&mut self.property.orientation, incoming.orientation)
            }
            PropertyAction::PrivacyMode => {
                assign(&mut self.property.privacy_mode, incoming.privacy_mode)
            }
            PropertyAction::SystemPrivacyMode => {
                require_system(caller, action)?;
                assign(
                    &mut self.property.system_privacy_mode,
                    incoming.system_privacy_mode,
                )
            }
            PropertyAction::SnapshotSkip => {
                assign(&mut self.property.snapshot_skip, incoming.snapshot_skip)
            }
            PropertyAction::AnimationFlag => {
                assign(&mut self.property.animation_flag, incoming.animation_flag)
            }
            PropertyAction::Flags => return self.update_flags(caller, incoming.flags),
            PropertyAction::Mode => assign(&mut self.property.window_mode, incoming.window_mode),
            PropertyAction::WindowLimits => return self.update_limits(incoming),
            PropertyAction::DragEnabled => {
                assign(&mut self.property.drag_enabled, incoming.drag_enabled)
            }
            PropertyAction::RaiseEnabled => {
                require_system(caller, action)?;
                assign(&mut self.property.raise_enabled, incoming.raise_enabled)
            }
            PropertyAction::TextFieldAvoidInfo => {
                if let Some(info) = &incoming.text_field_avoid {
                    if !info.is_valid() {
                        return Err(SessionError::InvalidParam(
                            "text field position must be finite and non-negative".to_string(),
                        ));
                    }
                }
                assign(&mut self.property.text_field_avoid, incoming.text_field_avoid)
            }
            PropertyAction::WindowMask => {
                let mask = incoming
                    .window_mask
                    .ok_or_else(|| SessionError::InvalidParam("window mask is empty".to_string()))?;
                if !mask.fits(&self.property.rect) {
                    return Err(SessionError::InvalidParam(format!(
                        "{}x{} mask does not fit the window rect",
                        mask.width(),
                        mask.height()
                    )));
                }
                assign(&mut self.property.window_mask, Some(mask))
            }
            PropertyAction::Topmost => {
                require_system(caller, action)?;
                return self.set_topmost(incoming.topmost);
            }
            PropertyAction::MainWindowTopmost => {
                return self.set_main_window_topmost(incoming.main_window_topmost);
            }
            PropertyAction::SubWindowZLevel => {
                let level = incoming.sub_window_z_level;
                if !SUB_WINDOW_Z_LEVEL_RANGE.contains(&level) {
                    return Err(SessionError::InvalidParam(format!(
                        "sub-window z-level {level} out of range"
                    )));
                }
                assign(&mut self.property.sub_window_z_level, level)
            }
            PropertyAction::FloatingBallTemplate => {
                let template = incoming.floating_ball.ok_or_else(|| {
                    SessionError::InvalidParam("floating ball template missing".to_string())
                })?;
                self.floating_ball.template = Some(template.clone());
                assign(&mut self.property.floating_ball, Some(template))
            }
        };

        if changed {
            debug!(session_id = %self.id, ?action, "property updated");
            self.fire(SessionEvent::PropertyChange(action));
        }
        Ok(())
    }

    fn update_flags(&mut self, caller: Caller, flags: WindowFlags) -> SessionResult<()> {
        let old = self.property.flags;
        let added = flags.difference(old);
        if added.contains(WindowFlags::SHOW_WHEN_LOCKED) && !caller.is_system {
            return Err(SessionError::PermissionDenied(
                "SHOW_WHEN_LOCKED requires a system caller".to_string(),
            ));
        }
        if old == flags {
            return Ok(());
        }
        self.property.flags = flags;
        self.fire(SessionEvent::PropertyChange(PropertyAction::Flags));
        let was_modal = old.contains(WindowFlags::IS_MODAL);
        let is_modal = flags.contains(WindowFlags::IS_MODAL);
        if self.category == WindowCategory::Main && was_modal != is_modal {
            self.fire(SessionEvent::ModalType(is_modal));
        }
        Ok(())
    }

    fn update_limits(&mut self, incoming: WindowProperty) -> SessionResult<()> {
        let limits = incoming.limits;
        if !limits.is_consistent() {
            return Err(SessionError::InvalidParam(format!(
                "inconsistent window limits {limits:?}"
            )));
        }
        if self.property.limits == limits {
            return Ok(());
        }
        self.property.limits = limits;
        self.fire(SessionEvent::PropertyChange(PropertyAction::WindowLimits));
        let rect = self.property.rect;
        if !rect.is_empty() {
            let clamped = self.rect_check(rect.width, rect.height);
            self.apply_rect(clamped, SizeChangeReason::Resize);
        }
        Ok(())
    }
}

impl Session {
    /// Apply the attribute family named by `action` from `property`.
    pub async fn update_property(
        &self,
        caller: Caller,
        property: Option<WindowProperty>,
        action: PropertyAction,
    ) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.update_property(caller, property, action))
            .await
    }
}
