//! Floating-ball sub-lifecycle.
//!
//! The ball widget starts, updates and stops independently of the session
//! state; stopping it never touches the session lifecycle.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Session, SessionInner};
use crate::category::WindowCategory;
use crate::error::{SessionError, SessionResult};
use crate::notify::SessionEvent;
use crate::property::FloatingBallTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatingBallState {
    #[default]
    Idle,
    Started,
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct FloatingBall {
    pub state: FloatingBallState,
    pub template: Option<FloatingBallTemplate>,
}

impl SessionInner {
    fn update_floating_ball(&mut self, template: FloatingBallTemplate) -> SessionResult<()> {
        self.require_category("update_floating_ball", &[WindowCategory::FloatingBall])?;
        self.ensure_not_ended()?;
        if !self.state.is_valid() {
            return Err(SessionError::InvalidState {
                operation: "update_floating_ball",
                state: self.state,
            });
        }
        if self.floating_ball.state != FloatingBallState::Started {
            debug!(session_id = %self.id, "floating ball started");
        }
        self.floating_ball.state = FloatingBallState::Started;
        self.floating_ball.template = Some(template.clone());
        self.property.floating_ball = Some(template.clone());
        self.fire(SessionEvent::FloatingBallUpdate(template));
        Ok(())
    }

    fn stop_floating_ball(&mut self) -> SessionResult<()> {
        self.require_category("stop_floating_ball", &[WindowCategory::FloatingBall])?;
        match self.floating_ball.state {
            FloatingBallState::Started => {
                self.floating_ball.state = FloatingBallState::Stopped;
                debug!(session_id = %self.id, "floating ball stopped");
                self.fire(SessionEvent::FloatingBallStop);
                Ok(())
            }
            FloatingBallState::Stopped => Ok(()),
            FloatingBallState::Idle => Err(SessionError::InvalidOperation(
                "floating ball was never started".to_string(),
            )),
        }
    }

    fn restore_fb_main_window(&mut self, want: String) -> SessionResult<()> {
        self.require_category("restore_fb_main_window", &[WindowCategory::FloatingBall])?;
        if self.floating_ball.state != FloatingBallState::Started {
            return Err(SessionError::InvalidOperation(
                "floating ball is not running".to_string(),
            ));
        }
        self.fire(SessionEvent::RestoreFbMainWindow(want));
        Ok(())
    }
}

impl Session {
    /// Start the ball (first call) or refresh its template.
    pub async fn update_floating_ball(&self, template: FloatingBallTemplate) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.update_floating_ball(template))
            .await
    }

    /// Stop the ball. Stopping twice is a no-op.
    pub async fn stop_floating_ball(&self) -> SessionResult<()> {
        self.queue().call(SessionInner::stop_floating_ball).await
    }

    /// Ask the owner to bring the ball's main window back.
    pub async fn restore_fb_main_window(&self, want: impl Into<String>) -> SessionResult<()> {
        let want = want.into();
        self.queue()
            .call(move |inner| inner.restore_fb_main_window(want))
            .await
    }
}
