//! Scenario files: named windows plus an ordered list of session operations.
//!
//! ```toml
//! [[windows]]
//! name = "editor"
//! window_type = "app_main_window"
//! rect = { x = 0, y = 0, width = 1280, height = 800 }
//!
//! [[steps]]
//! op = "connect"
//! window = "editor"
//! token = "editor-token"
//!
//! [[steps]]
//! op = "foreground"
//! window = "editor"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use winscene_core::collaborators::{
    Caller, EventChannel, IdentityToken, RenderSurfaceHandle, SessionStage, SurfaceNode,
};
use winscene_core::error::into_reply;
use winscene_core::input::{KeyCode, KeyEvent, PointerAction, PointerEvent};
use winscene_core::notify::EventKind;
use winscene_core::property::{
    FloatingBallTemplate, PropertyAction, WindowFlags, WindowProperty, WindowType,
};
use winscene_core::rect::{Rect, SizeChangeReason};
use winscene_core::session::{ConnectParams, ExceptionInfo, TerminateInfo};
use winscene_core::state::WindowState;
use winscene_core::{ResultCode, Session, SessionRegistry, SessionResult, SessionSnapshot};

/// A window declared up front and created in the registry before any step.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowSpec {
    pub name: String,
    #[serde(default)]
    pub window_type: WindowType,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub modal: bool,
}

impl WindowSpec {
    fn property(&self) -> WindowProperty {
        let mut property = WindowProperty::new(self.window_type).with_rect(self.rect);
        property.window_name.clone_from(&self.name);
        if self.modal {
            property = property.with_flags(WindowFlags::IS_MODAL);
        }
        property
    }
}

fn default_true() -> bool {
    true
}

/// One session operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Connect {
        window: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        pid: Option<i32>,
        #[serde(default = "default_true")]
        surface: bool,
    },
    Reconnect {
        window: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        window_state: WindowState,
    },
    Foreground {
        window: String,
    },
    Background {
        window: String,
    },
    FirstFrame {
        window: String,
    },
    SetActive {
        window: String,
        active: bool,
    },
    Focus {
        window: String,
        focused: bool,
    },
    Show {
        window: String,
        #[serde(default)]
        system: bool,
    },
    Hide {
        window: String,
        #[serde(default)]
        system: bool,
    },
    Disconnect {
        window: String,
        #[serde(default)]
        from_client: bool,
        #[serde(default)]
        token: Option<String>,
    },
    Suspend {
        window: String,
    },
    Exception {
        window: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        need_remove: bool,
    },
    Terminate {
        window: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        reason: String,
    },
    BindDialog {
        parent: String,
        dialog: String,
    },
    Key {
        window: String,
        key: KeyCode,
    },
    Pointer {
        window: String,
        action: PointerAction,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
    },
    PointDown {
        window: String,
        x: i32,
        y: i32,
    },
    BackEvent {
        window: String,
    },
    UpdateRect {
        window: String,
        rect: Rect,
        #[serde(default)]
        reason: SizeChangeReason,
    },
    UpdateProperty {
        window: String,
        action: PropertyAction,
        property: WindowProperty,
        #[serde(default)]
        system: bool,
    },
    LockState {
        window: String,
        locked: bool,
    },
    UpdateFloatingBall {
        window: String,
        template: FloatingBallTemplate,
    },
    StopFloatingBall {
        window: String,
    },
    Flush,
}

impl Action {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Reconnect { .. } => "reconnect",
            Self::Foreground { .. } => "foreground",
            Self::Background { .. } => "background",
            Self::FirstFrame { .. } => "first_frame",
            Self::SetActive { .. } => "set_active",
            Self::Focus { .. } => "focus",
            Self::Show { .. } => "show",
            Self::Hide { .. } => "hide",
            Self::Disconnect { .. } => "disconnect",
            Self::Suspend { .. } => "suspend",
            Self::Exception { .. } => "exception",
            Self::Terminate { .. } => "terminate",
            Self::BindDialog { .. } => "bind_dialog",
            Self::Key { .. } => "key",
            Self::Pointer { .. } => "pointer",
            Self::PointDown { .. } => "point_down",
            Self::BackEvent { .. } => "back_event",
            Self::UpdateRect { .. } => "update_rect",
            Self::UpdateProperty { .. } => "update_property",
            Self::LockState { .. } => "lock_state",
            Self::UpdateFloatingBall { .. } => "update_floating_ball",
            Self::StopFloatingBall { .. } => "stop_floating_ball",
            Self::Flush => "flush",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Result code the step is expected to produce; defaults to `ok`
    #[serde(default)]
    pub expect: Option<ResultCode>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub windows: Vec<WindowSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario; `.json` files are JSON, everything else TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let scenario: Self = if is_json {
            serde_json::from_str(&text).context("failed to parse JSON scenario")?
        } else {
            toml::from_str(&text).context("failed to parse TOML scenario")?
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for window in &self.windows {
            if !seen.insert(window.name.as_str()) {
                bail!("window {:?} declared twice", window.name);
            }
        }
        Ok(())
    }
}

// ── Collaborators ─────────────────────────────────────────────────────

/// Stage that only logs what the session tells the client.
struct TracingStage {
    window: String,
}

impl SessionStage for TracingStage {
    fn set_active(&self, active: bool) {
        tracing::debug!(window = %self.window, active, "stage set_active");
    }

    fn notify_session_foreground(&self) {
        tracing::debug!(window = %self.window, "stage foreground");
    }

    fn notify_session_background(&self) {
        tracing::debug!(window = %self.window, "stage background");
    }
}

/// Channel that counts delivered events.
#[derive(Default)]
struct CountingChannel {
    delivered: AtomicU64,
}

impl EventChannel for CountingChannel {
    fn transfer_key_event(&self, _event: &KeyEvent) -> SessionResult<()> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn transfer_pointer_event(&self, _event: &PointerEvent) -> SessionResult<()> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct ScenarioSurface {
    id: u64,
}

impl SurfaceNode for ScenarioSurface {
    fn id(&self) -> u64 {
        self.id
    }

    fn attach(&self, handle: &RenderSurfaceHandle) -> SessionResult<()> {
        tracing::trace!(node = self.id, surface = handle.id, "surface attached");
        Ok(())
    }

    fn detach(&self) {
        tracing::trace!(node = self.id, "surface detached");
    }
}

// ── Report ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub code: ResultCode,
    pub expected: ResultCode,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub window: String,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub passed: bool,
    pub steps: Vec<StepReport>,
    pub windows: BTreeMap<String, SessionSnapshot>,
    pub events: Vec<EventRecord>,
}

// ── Runner ────────────────────────────────────────────────────────────

pub struct Runner {
    registry: SessionRegistry,
    windows: BTreeMap<String, Session>,
    events: Arc<Mutex<Vec<EventRecord>>>,
    next_node: u64,
}

impl Runner {
    /// Create every declared window and record its events.
    pub async fn new(registry: SessionRegistry, scenario: &Scenario) -> Result<Self> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut windows = BTreeMap::new();
        for spec in &scenario.windows {
            let session = registry.create(spec.property());
            for kind in EventKind::ALL {
                let sink = Arc::clone(&events);
                let window = spec.name.clone();
                session
                    .set_callback(
                        kind,
                        Arc::new(move |_, event| {
                            let record = EventRecord {
                                window: window.clone(),
                                kind: event.kind(),
                                detail: format!("{event:?}"),
                            };
                            match sink.lock() {
                                Ok(mut guard) => guard.push(record),
                                Err(poisoned) => poisoned.into_inner().push(record),
                            }
                        }),
                    )
                    .await
                    .with_context(|| format!("failed to register handlers for {}", spec.name))?;
            }
            windows.insert(spec.name.clone(), session);
        }
        Ok(Self {
            registry,
            windows,
            events,
            next_node: 1,
        })
    }

    fn window(&self, name: &str) -> Result<Session> {
        self.windows
            .get(name)
            .cloned()
            .with_context(|| format!("unknown window {name:?}"))
    }

    /// Flush every declared window, including ones already removed from
    /// the registry after reaching END.
    async fn flush_windows(&self) -> SessionResult<()> {
        self.registry.flush_all().await?;
        for session in self.windows.values() {
            session.flush().await?;
        }
        Ok(())
    }

    fn connect_params(&self, name: &str, session: &Session) -> ConnectParams {
        let mut property = session.snapshot().property;
        property.window_state = WindowState::Created;
        ConnectParams::new(
            Arc::new(TracingStage {
                window: name.to_string(),
            }),
            Arc::new(CountingChannel::default()),
            property,
        )
    }

    fn next_surface(&mut self) -> Arc<dyn SurfaceNode> {
        let id = self.next_node;
        self.next_node += 1;
        Arc::new(ScenarioSurface { id })
    }

    pub async fn run(mut self, scenario: &Scenario) -> Result<ScenarioReport> {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = self.apply(&step.action).await?;
            let (code, result) = into_reply(outcome);
            let expected = step.expect.unwrap_or(ResultCode::Ok);
            let passed = code == expected;
            if !passed {
                tracing::warn!(index, op = step.action.name(), %code, %expected, "step result differs");
            }
            steps.push(StepReport {
                index,
                op: step.action.name(),
                code,
                expected,
                passed,
                error: (code != ResultCode::Ok).then(|| code.to_string()),
                result: result.filter(|value| !value.is_null()),
            });
        }

        self.flush_windows().await?;
        let windows = self
            .windows
            .iter()
            .map(|(name, session)| (name.clone(), session.snapshot()))
            .collect();
        let events = match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Ok(ScenarioReport {
            passed: steps.iter().all(|step| step.passed),
            steps,
            windows,
            events,
        })
    }

    /// Run one action. Session errors become part of the report; only
    /// scenario mistakes (unknown window names) abort the run.
    async fn apply(&mut self, action: &Action) -> Result<SessionResult<serde_json::Value>> {
        let outcome = match action {
            Action::Connect {
                window,
                token,
                pid,
                surface,
            } => {
                let session = self.window(window)?;
                let mut params = self
                    .connect_params(window, &session)
                    .with_pid(pid.unwrap_or(-1), -1);
                if let Some(token) = token {
                    params = params.with_token(IdentityToken::new(token.as_str()));
                }
                if *surface {
                    params = params.with_surface(self.next_surface());
                }
                session.connect(params).await.map(to_value)
            }
            Action::Reconnect {
                window,
                token,
                window_state,
            } => {
                let session = self.window(window)?;
                let mut params = self.connect_params(window, &session);
                if let Some(params_property) = params.property.as_mut() {
                    params_property.window_state = *window_state;
                }
                if let Some(token) = token {
                    params = params.with_token(IdentityToken::new(token.as_str()));
                }
                params = params.with_surface(self.next_surface());
                session.reconnect(params).await.map(to_value)
            }
            Action::Foreground { window } => {
                let session = self.window(window)?;
                let property = session.snapshot().property;
                session.foreground(Some(property), false).await.map(to_value)
            }
            Action::Background { window } => {
                self.window(window)?.background(false).await.map(to_value)
            }
            Action::FirstFrame { window } => {
                self.window(window)?.notify_first_frame().await.map(to_value)
            }
            Action::SetActive { window, active } => {
                self.window(window)?.set_active(*active).await.map(to_value)
            }
            Action::Focus { window, focused } => {
                self.window(window)?.update_focus(*focused).await.map(to_value)
            }
            Action::Show { window, system } => {
                let session = self.window(window)?;
                let property = session.snapshot().property;
                session
                    .show(caller(*system), Some(property))
                    .await
                    .map(to_value)
            }
            Action::Hide { window, system } => {
                self.window(window)?.hide(caller(*system)).await.map(to_value)
            }
            Action::Disconnect {
                window,
                from_client,
                token,
            } => self
                .window(window)?
                .disconnect(*from_client, token.as_deref().map(IdentityToken::from))
                .await
                .map(to_value),
            Action::Suspend { window } => {
                self.window(window)?.suspend_for_recovery().await.map(to_value)
            }
            Action::Exception {
                window,
                token,
                reason,
                need_remove,
            } => self
                .window(window)?
                .notify_session_exception(ExceptionInfo {
                    token: token.as_deref().map(IdentityToken::from),
                    error_code: 0,
                    reason: reason.clone(),
                    need_remove_session: *need_remove,
                })
                .await
                .map(to_value),
            Action::Terminate {
                window,
                token,
                reason,
            } => self
                .window(window)?
                .terminate_session(TerminateInfo {
                    token: token.as_deref().map(IdentityToken::from),
                    reason: reason.clone(),
                })
                .await
                .map(to_value),
            Action::BindDialog { parent, dialog } => {
                let parent = self.window(parent)?;
                let dialog = self.window(dialog)?;
                parent.bind_dialog(&dialog).await.map(to_value)
            }
            Action::Key { window, key } => self
                .window(window)?
                .transfer_key_event(Some(KeyEvent::down(*key)))
                .await
                .map(to_value),
            Action::Pointer { window, action, x, y } => self
                .window(window)?
                .transfer_pointer_event(Some(PointerEvent::new(*action, *x, *y)))
                .await
                .map(to_value),
            Action::PointDown { window, x, y } => self
                .window(window)?
                .process_point_down(*x, *y)
                .await
                .map(to_value),
            Action::BackEvent { window } => {
                self.window(window)?.process_back_event().await.map(to_value)
            }
            Action::UpdateRect {
                window,
                rect,
                reason,
            } => self
                .window(window)?
                .update_rect(*rect, *reason)
                .await
                .map(to_value),
            Action::UpdateProperty {
                window,
                action,
                property,
                system,
            } => self
                .window(window)?
                .update_property(caller(*system), Some(property.clone()), *action)
                .await
                .map(to_value),
            Action::LockState { window, locked } => self
                .window(window)?
                .notify_session_lock_state_change(*locked)
                .await
                .map(to_value),
            Action::UpdateFloatingBall { window, template } => self
                .window(window)?
                .update_floating_ball(template.clone())
                .await
                .map(to_value),
            Action::StopFloatingBall { window } => {
                self.window(window)?.stop_floating_ball().await.map(to_value)
            }
            Action::Flush => self.flush_windows().await.map(to_value),
        };
        Ok(outcome)
    }
}

const fn caller(system: bool) -> Caller {
    if system { Caller::system() } else { Caller::app(-1) }
}

fn to_value<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
