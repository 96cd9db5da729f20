//! Session lifecycle states and the legal transition edges between them.
//!
//! ```text
//! Initial ──► Created ──► Connect ──► Foreground ──► Active ⇄ Inactive
//!    │                       ▲  │         ▲    │        │
//!    └──────────────────────►┘  └─► Background ◄────────┘
//!                            │            │
//!                     Disconnect ◄────────┴── (any live state)
//!                            │
//!                           End  (reachable from every state)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle state of one window session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initial,
    Created,
    Connect,
    Foreground,
    Active,
    Inactive,
    Background,
    Disconnect,
    End,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Created => "created",
            Self::Connect => "connect",
            Self::Foreground => "foreground",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Background => "background",
            Self::Disconnect => "disconnect",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

impl SessionState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Initial,
        Self::Created,
        Self::Connect,
        Self::Foreground,
        Self::Active,
        Self::Inactive,
        Self::Background,
        Self::Disconnect,
        Self::End,
    ];

    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// Self-loops are not edges; callers treat them as no-ops.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{
            Active, Background, Connect, Created, Disconnect, End, Foreground, Inactive, Initial,
        };
        match (self, next) {
            (End, _) => false,
            (_, End) => true,
            (Initial, Created | Connect) => true,
            (Created | Disconnect, Connect) => true,
            (Connect, Foreground | Background) => true,
            (Foreground, Active | Background) => true,
            (Active, Inactive | Background) => true,
            (Inactive, Active | Foreground | Background) => true,
            (Background, Foreground) => true,
            (Connect | Foreground | Active | Inactive | Background, Disconnect) => true,
            _ => false,
        }
    }

    /// Connected and not yet torn down.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(
            self,
            Self::Connect | Self::Foreground | Self::Active | Self::Inactive | Self::Background
        )
    }

    /// Shown on screen (a render surface is attached).
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Foreground | Self::Active | Self::Inactive)
    }

    /// Foreground in the strict sense used by input dispatch.
    #[must_use]
    pub const fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground | Self::Active)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::End)
    }

    /// States from which `connect` is accepted.
    #[must_use]
    pub const fn accepts_connect(self) -> bool {
        matches!(self, Self::Initial | Self::Created | Self::Disconnect)
    }
}

/// Window state as reported by the client in its property bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    #[default]
    Initial,
    Created,
    Shown,
    Hidden,
    Frozen,
    Destroyed,
}

/// Coarse state exposed to recent-task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentSessionState {
    Disconnect,
    Connect,
    Foreground,
    Background,
    Active,
    Inactive,
    End,
}

impl From<SessionState> for RecentSessionState {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Disconnect => Self::Disconnect,
            SessionState::Connect => Self::Connect,
            SessionState::Foreground => Self::Foreground,
            SessionState::Background => Self::Background,
            SessionState::Active => Self::Active,
            SessionState::Inactive => Self::Inactive,
            _ => Self::End,
        }
    }
}
