//! The per-session attribute bag and the keyed actions that mutate it.
//!
//! A session owns exactly one [`WindowProperty`]. External callers only ever
//! see clones of it, or ask for a keyed mutation through
//! [`PropertyAction`] (see `session::dispatch`).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::rect::{Rect, WindowLimits};
use crate::state::WindowState;

/// Concrete window type reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    #[default]
    AppMainWindow,
    AppSubWindow,
    Dialog,
    Toast,
    Float,
    FloatCamera,
    SystemFloat,
    SystemSubWindow,
    SceneBoard,
    DraggingEffect,
    AppLaunching,
    Pip,
    InputMethodFloat,
    InputMethodStatusBar,
    StatusBar,
    NavigationBar,
    Wallpaper,
    FloatingBall,
}

/// Layout mode of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    #[default]
    Fullscreen,
    Floating,
    SplitPrimary,
    SplitSecondary,
    Pip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Unspecified,
    Vertical,
    Horizontal,
    ReverseVertical,
    ReverseHorizontal,
    Sensor,
    Locked,
}

/// Show/hide animation selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnimation {
    None,
    #[default]
    Default,
    Custom,
}

bitflags! {
    /// Window flag bits carried in the property bag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WindowFlags: u32 {
        const NEED_AVOID = 1;
        const PARENT_LIMIT = 1 << 1;
        const SHOW_WHEN_LOCKED = 1 << 2;
        const FORBID_SPLIT_MOVE = 1 << 3;
        const WATER_MARK = 1 << 4;
        const IS_MODAL = 1 << 5;
        const HANDWRITING = 1 << 6;
        const IS_TOAST = 1 << 7;
        const IS_APPLICATION_MODAL = 1 << 8;
        const IS_TEXT_MENU = 1 << 9;
    }
}

/// Position of the focused text field, used for keyboard avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TextFieldAvoidInfo {
    pub position_y: f64,
    pub height: f64,
}

impl TextFieldAvoidInfo {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.position_y.is_finite()
            && self.height.is_finite()
            && self.position_y >= 0.0
            && self.height >= 0.0
    }
}

/// Hit-test mask; `rows[y][x] == true` means the pixel belongs to the window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowMask {
    pub rows: Vec<Vec<bool>>,
}

impl WindowMask {
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Non-empty, rectangular, and no larger than `rect`.
    #[must_use]
    pub fn fits(&self, rect: &Rect) -> bool {
        let width = self.width();
        width > 0
            && self.rows.iter().all(|row| row.len() == width)
            && width <= rect.width as usize
            && self.height() <= rect.height as usize
    }
}

/// Content template of a picture-in-picture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipTemplate {
    #[default]
    VideoPlay,
    VideoCall,
    VideoMeeting,
    VideoLive,
}

impl PipTemplate {
    /// Call and meeting templates keep the camera open.
    #[must_use]
    pub const fn uses_camera(self) -> bool {
        matches!(self, Self::VideoCall | Self::VideoMeeting)
    }
}

/// Template of a floating-ball widget.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FloatingBallTemplate {
    pub template: u32,
    pub title: String,
    pub content: String,
    pub background_color: Option<String>,
}

/// Mutable runtime attributes of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowProperty {
    pub window_name: String,
    pub window_type: WindowType,
    pub window_mode: WindowMode,
    /// Client-side state, consulted on reconnect.
    pub window_state: WindowState,
    pub flags: WindowFlags,
    pub rect: Rect,
    pub limits: WindowLimits,
    pub orientation: Orientation,
    pub turn_screen_on: bool,
    pub keep_screen_on: bool,
    pub focusable: bool,
    pub touchable: bool,
    /// `-1.0` follows the system brightness.
    pub brightness: f32,
    pub privacy_mode: bool,
    pub system_privacy_mode: bool,
    pub snapshot_skip: bool,
    pub animation_flag: WindowAnimation,
    pub drag_enabled: bool,
    pub raise_enabled: bool,
    pub decor_enabled: bool,
    pub text_field_avoid: Option<TextFieldAvoidInfo>,
    pub window_mask: Option<WindowMask>,
    pub topmost: bool,
    pub main_window_topmost: bool,
    pub sub_window_z_level: i32,
    pub aspect_ratio: f32,
    pub floating_ball: Option<FloatingBallTemplate>,
    pub pip_template: PipTemplate,
}

impl Default for WindowProperty {
    fn default() -> Self {
        Self {
            window_name: String::new(),
            window_type: WindowType::AppMainWindow,
            window_mode: WindowMode::Fullscreen,
            window_state: WindowState::Initial,
            flags: WindowFlags::empty(),
            rect: Rect::default(),
            limits: WindowLimits::default(),
            orientation: Orientation::Unspecified,
            turn_screen_on: false,
            keep_screen_on: false,
            focusable: true,
            touchable: true,
            brightness: -1.0,
            privacy_mode: false,
            system_privacy_mode: false,
            snapshot_skip: false,
            animation_flag: WindowAnimation::Default,
            drag_enabled: true,
            raise_enabled: true,
            decor_enabled: false,
            text_field_avoid: None,
            window_mask: None,
            topmost: false,
            main_window_topmost: false,
            sub_window_z_level: 0,
            aspect_ratio: 0.0,
            floating_ball: None,
            pip_template: PipTemplate::VideoPlay,
        }
    }
}

impl WindowProperty {
    #[must_use]
    pub fn new(window_type: WindowType) -> Self {
        Self {
            window_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_state(mut self, window_state: WindowState) -> Self {
        self.window_state = window_state;
        self
    }

    #[must_use]
    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: WindowFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn is_modal(&self) -> bool {
        self.flags.contains(WindowFlags::IS_MODAL)
    }
}

/// Attribute families that can be mutated through the keyed dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyAction {
    TurnScreenOn,
    KeepScreenOn,
    Focusable,
    Touchable,
    SetBrightness,
    Orientation,
    PrivacyMode,
    SystemPrivacyMode,
    SnapshotSkip,
    AnimationFlag,
    Flags,
    Mode,
    WindowLimits,
    DragEnabled,
    RaiseEnabled,
    TextFieldAvoidInfo,
    WindowMask,
    Topmost,
    MainWindowTopmost,
    SubWindowZLevel,
    FloatingBallTemplate,
}

impl PropertyAction {
    pub const ALL: [Self; 21] = [
        Self::TurnScreenOn,
        Self::KeepScreenOn,
        Self::Focusable,
        Self::Touchable,
        Self::SetBrightness,
        Self::Orientation,
        Self::PrivacyMode,
        Self::SystemPrivacyMode,
        Self::SnapshotSkip,
        Self::AnimationFlag,
        Self::Flags,
        Self::Mode,
        Self::WindowLimits,
        Self::DragEnabled,
        Self::RaiseEnabled,
        Self::TextFieldAvoidInfo,
        Self::WindowMask,
        Self::Topmost,
        Self::MainWindowTopmost,
        Self::SubWindowZLevel,
        Self::FloatingBallTemplate,
    ];
}
