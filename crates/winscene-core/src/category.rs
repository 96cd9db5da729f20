//! Window categories and the per-category rule table.
//!
//! The state machine never branches on a concrete window type. It asks the
//! session's [`CategoryRules`] at fixed points (foreground admission, rect
//! check, background surface policy, input dispatch, property dispatch).

use serde::{Deserialize, Serialize};

use crate::config::{LimitsConfig, SessionConfig};
use crate::input::PointerAction;
use crate::property::{PropertyAction, WindowProperty, WindowType};
use crate::state::{SessionState, WindowState};

/// Fixed classification of a session, chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowCategory {
    /// Top-level application window
    Main,
    /// Application sub window
    Sub,
    /// System overlay (toast, float, status bar, ...)
    System,
    /// Dialog bound to a main window
    Dialog,
    /// Floating-ball widget
    FloatingBall,
}

impl std::fmt::Display for WindowCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Sub => f.write_str("sub"),
            Self::System => f.write_str("system"),
            Self::Dialog => f.write_str("dialog"),
            Self::FloatingBall => f.write_str("floating_ball"),
        }
    }
}

impl WindowCategory {
    #[must_use]
    pub const fn from_window_type(window_type: WindowType) -> Self {
        match window_type {
            WindowType::AppMainWindow => Self::Main,
            WindowType::AppSubWindow => Self::Sub,
            WindowType::Dialog => Self::Dialog,
            WindowType::FloatingBall => Self::FloatingBall,
            _ => Self::System,
        }
    }

    /// Overlay categories share the permission-gated show/hide path.
    #[must_use]
    pub const fn is_overlay(self) -> bool {
        matches!(self, Self::System | Self::Dialog | Self::FloatingBall)
    }

    #[must_use]
    pub fn rules(self) -> &'static CategoryRules {
        match self {
            Self::Main => &MAIN_RULES,
            Self::Sub => &SUB_RULES,
            Self::System => &SYSTEM_RULES,
            Self::Dialog => &DIALOG_RULES,
            Self::FloatingBall => &FLOATING_BALL_RULES,
        }
    }
}

/// Category-specific predicates consulted by the state machine.
pub struct CategoryRules {
    /// Minimum `(width, height)` enforced by the rect check.
    pub min_size: fn(&LimitsConfig) -> (u32, u32),
    /// Whether a show request is honored; `false` turns it into a silent no-op.
    pub eligible_for_foreground: fn(&WindowProperty) -> bool,
    /// Whether the render surface survives a background transition.
    pub keeps_snapshot: fn(&SessionConfig) -> bool,
    /// Whether a pointer event may reach the client in `state`.
    pub pointer_dispatch: fn(SessionState, PointerAction) -> bool,
    /// Whether the keyed dispatcher accepts `action` for this category.
    pub supports_action: fn(PropertyAction) -> bool,
}

impl std::fmt::Debug for CategoryRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRules").finish_non_exhaustive()
    }
}

fn main_min_size(limits: &LimitsConfig) -> (u32, u32) {
    (limits.main_min_width, limits.main_min_height)
}

fn sub_min_size(limits: &LimitsConfig) -> (u32, u32) {
    (limits.sub_min_width, limits.sub_min_height)
}

fn system_min_size(limits: &LimitsConfig) -> (u32, u32) {
    (limits.system_min_width, limits.system_min_height)
}

fn not_frozen(property: &WindowProperty) -> bool {
    property.window_state != WindowState::Frozen
}

fn system_eligible(property: &WindowProperty) -> bool {
    not_frozen(property) && property.window_type != WindowType::AppLaunching
}

fn keep_main_snapshot(config: &SessionConfig) -> bool {
    config.lifecycle.keep_snapshot_on_background
}

fn never(_: &SessionConfig) -> bool {
    false
}

fn foreground_or_leaving(state: SessionState, action: PointerAction) -> bool {
    state.is_foreground() || action == PointerAction::LeaveWindow
}

fn always_dispatch(_: SessionState, _: PointerAction) -> bool {
    true
}

/// Actions every category accepts.
const fn is_common_action(action: PropertyAction) -> bool {
    matches!(
        action,
        PropertyAction::TurnScreenOn
            | PropertyAction::KeepScreenOn
            | PropertyAction::Focusable
            | PropertyAction::Touchable
            | PropertyAction::SetBrightness
            | PropertyAction::PrivacyMode
            | PropertyAction::SystemPrivacyMode
            | PropertyAction::SnapshotSkip
            | PropertyAction::AnimationFlag
            | PropertyAction::Flags
            | PropertyAction::Mode
            | PropertyAction::WindowLimits
            | PropertyAction::TextFieldAvoidInfo
            | PropertyAction::WindowMask
    )
}

fn main_actions(action: PropertyAction) -> bool {
    is_common_action(action)
        || matches!(
            action,
            PropertyAction::Orientation
                | PropertyAction::DragEnabled
                | PropertyAction::Topmost
                | PropertyAction::MainWindowTopmost
        )
}

fn sub_actions(action: PropertyAction) -> bool {
    is_common_action(action)
        || matches!(
            action,
            PropertyAction::Orientation
                | PropertyAction::DragEnabled
                | PropertyAction::RaiseEnabled
                | PropertyAction::SubWindowZLevel
        )
}

fn system_actions(action: PropertyAction) -> bool {
    is_common_action(action) || action == PropertyAction::RaiseEnabled
}

fn dialog_actions(action: PropertyAction) -> bool {
    is_common_action(action)
        || matches!(
            action,
            PropertyAction::DragEnabled | PropertyAction::RaiseEnabled
        )
}

fn floating_ball_actions(action: PropertyAction) -> bool {
    is_common_action(action) || action == PropertyAction::FloatingBallTemplate
}

static MAIN_RULES: CategoryRules = CategoryRules {
    min_size: main_min_size,
    eligible_for_foreground: not_frozen,
    keeps_snapshot: keep_main_snapshot,
    pointer_dispatch: foreground_or_leaving,
    supports_action: main_actions,
};

static SUB_RULES: CategoryRules = CategoryRules {
    min_size: sub_min_size,
    eligible_for_foreground: not_frozen,
    keeps_snapshot: never,
    pointer_dispatch: always_dispatch,
    supports_action: sub_actions,
};

static SYSTEM_RULES: CategoryRules = CategoryRules {
    min_size: system_min_size,
    eligible_for_foreground: system_eligible,
    keeps_snapshot: never,
    pointer_dispatch: foreground_or_leaving,
    supports_action: system_actions,
};

static DIALOG_RULES: CategoryRules = CategoryRules {
    min_size: system_min_size,
    eligible_for_foreground: not_frozen,
    keeps_snapshot: never,
    pointer_dispatch: foreground_or_leaving,
    supports_action: dialog_actions,
};

static FLOATING_BALL_RULES: CategoryRules = CategoryRules {
    min_size: system_min_size,
    eligible_for_foreground: not_frozen,
    keeps_snapshot: never,
    pointer_dispatch: foreground_or_leaving,
    supports_action: floating_ball_actions,
};

/// Whether hiding (and, for pure system windows, showing) a window of this
/// type requires a system caller.
#[must_use]
pub const fn need_system_permission(window_type: WindowType) -> bool {
    !matches!(
        window_type,
        WindowType::SceneBoard
            | WindowType::SystemFloat
            | WindowType::SystemSubWindow
            | WindowType::Toast
            | WindowType::DraggingEffect
            | WindowType::AppLaunching
            | WindowType::Pip
    )
}
