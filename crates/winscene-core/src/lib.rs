//! winscene-core: window-session lifecycle core for a compositor window manager
//!
//! Every on-screen window is backed by a session. A session runs a fixed
//! lifecycle state machine, guards client identity, owns its render surface
//! while visible, and dispatches keyed property updates. Window categories
//! (main, sub, system overlay, dialog, floating ball) specialise the base
//! behaviour through a rule table instead of subclassing.
//!
//! # Architecture
//!
//! ```text
//! caller ──► Session handle ──post──► per-session queue ──► SessionInner
//!                 ▲                                              │
//!                 └──────────── watch snapshot ◄─────────────────┘
//!
//! SessionRegistry ── owns handles, assigns ids, binds dialogs
//! ```
//!
//! # Modules
//!
//! - `state`: lifecycle states and transition edges
//! - `session`: session handle, lifecycle, category behaviour, property dispatch
//! - `registry`: id allocation and session ownership
//! - `queue`: serialized per-session task queue
//! - `category`: window categories and their rule table
//! - `property`: window property bag and keyed actions
//! - `rect`: geometry and the clamping rect check
//! - `notify`: per-kind notification handlers
//! - `collaborators`: stage, event channel and surface node traits
//! - `input`: key/pointer event values and dispatch outcomes
//! - `config`: TOML configuration
//! - `logging`: tracing subscriber setup
//! - `error`: error type and stable result codes
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod category;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod notify;
pub mod property;
pub mod queue;
pub mod rect;
pub mod registry;
pub mod session;
pub mod state;

pub use category::WindowCategory;
pub use config::SessionConfig;
pub use error::{ResultCode, SessionError, SessionResult};
pub use registry::SessionRegistry;
pub use session::{Session, SessionId, SessionSnapshot};
pub use state::SessionState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
