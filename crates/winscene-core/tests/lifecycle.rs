//! Integration tests for the application-window lifecycle.
//!
//! Covers connect/reconnect, foreground/background with the deferred apply
//! step, first-frame activation, the identity-token guard on disconnect,
//! exception/terminate bookkeeping and recovery suspension.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::fixtures::{
    Client, EventLog, StageCall, connected, pc_registry, property, registry, settle, show, shown,
};
use winscene_core::collaborators::IdentityToken;
use winscene_core::notify::{EventKind, SessionEvent};
use winscene_core::property::{WindowProperty, WindowType};
use winscene_core::rect::Rect;
use winscene_core::session::{ConnectParams, ExceptionInfo, TerminateInfo};
use winscene_core::state::WindowState;
use winscene_core::{ResultCode, SessionError, SessionState};

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn connect_moves_created_to_connect() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    assert_eq!(session.state(), SessionState::Created);

    let client = Client::new("tok");
    let reply = session
        .connect(client.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap();

    assert_eq!(reply.session_id, session.id());
    assert_eq!(reply.limits.max_floating_window_size, 2560);
    assert!(!reply.is_pc_window);
    assert_eq!(session.state(), SessionState::Connect);
}

#[tokio::test]
async fn connect_reports_pc_devices() {
    let registry = pc_registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    let client = Client::new("tok");
    let reply = session
        .connect(client.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap();
    assert!(reply.is_pc_window);
}

#[tokio::test]
async fn connect_rejects_missing_collaborators() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    let client = Client::new("tok");

    let mut params = client.params(property(WindowType::AppMainWindow));
    params.stage = None;
    assert_eq!(
        session.connect(params).await.unwrap_err(),
        SessionError::NullArgument("session stage")
    );

    let mut params = client.params(property(WindowType::AppMainWindow));
    params.channel = None;
    assert_eq!(
        session.connect(params).await.unwrap_err(),
        SessionError::NullArgument("event channel")
    );

    let params = ConnectParams::default();
    assert_eq!(
        session.connect(params).await.unwrap_err().code(),
        ResultCode::NullPtr
    );
    assert_eq!(session.state(), SessionState::Created);
}

#[tokio::test]
async fn second_connect_is_an_invalid_state() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    let err = session
        .connect(client.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            operation: "connect",
            state: SessionState::Connect
        }
    ));
}

#[tokio::test]
async fn connect_keeps_the_creation_window_type_and_clamps_the_rect() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    let client = Client::new("tok");
    let requested =
        WindowProperty::new(WindowType::StatusBar).with_rect(Rect::new(10, 20, 100, 100));

    session.connect(client.params(requested)).await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.property.window_type, WindowType::AppMainWindow);
    assert_eq!(snapshot.property.rect, Rect::new(10, 20, 320, 240));
}

// =============================================================================
// Foreground / background
// =============================================================================

#[tokio::test]
async fn full_lifecycle_fires_transitions_in_order() {
    let registry = registry();
    let (session, client, log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    show(&session).await;
    session.notify_first_frame().await.unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert!(session.is_active());

    session.background(false).await.unwrap();
    session.flush().await.unwrap();
    assert_eq!(session.state(), SessionState::Background);
    assert!(!session.is_active());

    session
        .disconnect(true, Some(client.token.clone()))
        .await
        .unwrap();
    session.wait_for_state(SessionState::End).await.unwrap();

    assert_eq!(
        log.states(session.id()),
        vec![
            SessionState::Connect,
            SessionState::Foreground,
            SessionState::Active,
            SessionState::Background,
            SessionState::Disconnect,
            SessionState::End,
        ]
    );
    assert_eq!(
        client.stage.calls(),
        vec![
            StageCall::Foreground,
            StageCall::SetActive(true),
            StageCall::SetActive(false),
            StageCall::Background,
        ]
    );
}

#[tokio::test]
async fn foreground_before_connect_is_rejected() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    let err = session
        .foreground(Some(property(WindowType::AppMainWindow)), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidState);
}

#[tokio::test]
async fn foreground_requires_a_property() {
    let registry = registry();
    let (session, _client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;
    assert_eq!(
        session.foreground(None, false).await.unwrap_err(),
        SessionError::NullArgument("window property")
    );
}

#[tokio::test]
async fn frozen_windows_are_not_foregrounded() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    let frozen = property(WindowType::AppMainWindow).with_state(WindowState::Frozen);
    session.foreground(Some(frozen), false).await.unwrap();
    session.flush().await.unwrap();

    assert_eq!(session.state(), SessionState::Connect);
    assert!(!client.surface.is_attached());
}

#[tokio::test]
async fn foreground_attaches_the_surface() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    assert!(client.surface.is_attached());
    assert!(session.snapshot().has_surface());
    assert_eq!(log.count(session.id(), EventKind::Foreground), 1);
}

#[tokio::test]
async fn repeated_foreground_is_a_no_op() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session
        .foreground(Some(property(WindowType::AppMainWindow)), false)
        .await
        .unwrap();
    session.flush().await.unwrap();

    assert_eq!(session.state(), SessionState::Foreground);
    assert_eq!(log.count(session.id(), EventKind::Foreground), 1);
    assert_eq!(client.stage.count(&StageCall::Foreground), 1);
}

#[tokio::test]
async fn failed_surface_attach_reports_apply_failure() {
    let registry = registry();
    let (session, client, log) = connected(&registry, WindowType::AppMainWindow, "tok").await;
    client.surface.fail_attach(true);

    session
        .foreground(Some(property(WindowType::AppMainWindow)), false)
        .await
        .unwrap();
    session.flush().await.unwrap();

    assert_eq!(session.state(), SessionState::Connect);
    let failures: Vec<_> = log
        .of(session.id())
        .into_iter()
        .filter(|event| event.kind() == EventKind::ApplyFailed)
        .collect();
    assert!(matches!(
        failures.as_slice(),
        [SessionEvent::ApplyFailed {
            operation: "foreground",
            error: SessionError::Surface(_)
        }]
    ));
}

#[tokio::test]
async fn background_is_idempotent() {
    let registry = registry();
    let (session, _client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.background(true).await.unwrap();
    session.flush().await.unwrap();
    session.background(true).await.unwrap();
    session.flush().await.unwrap();

    assert_eq!(session.state(), SessionState::Background);
    assert_eq!(
        log.of(session.id())
            .into_iter()
            .filter(|event| matches!(event, SessionEvent::Background { from_client: true }))
            .count(),
        1
    );
}

#[tokio::test]
async fn background_from_connect_is_rejected() {
    let registry = registry();
    let (session, _client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;
    let err = session.background(false).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            operation: "background",
            ..
        }
    ));
}

#[tokio::test]
async fn main_windows_keep_their_surface_in_background() {
    let registry = registry();
    let (session, client, _log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.background(false).await.unwrap();
    session.flush().await.unwrap();

    assert!(session.snapshot().has_surface());
    assert!(client.surface.is_attached());
}

#[tokio::test]
async fn sub_windows_release_their_surface_in_background() {
    let registry = registry();
    let (session, client, _log) = shown(&registry, WindowType::AppSubWindow, "tok").await;

    session.background(false).await.unwrap();
    session.flush().await.unwrap();

    assert!(!session.snapshot().has_surface());
    assert_eq!(client.surface.detaches(), 1);
}

#[tokio::test]
async fn background_then_foreground_reattaches_the_surface() {
    let registry = registry();
    let (session, client, _log) = shown(&registry, WindowType::AppSubWindow, "tok").await;

    session.background(false).await.unwrap();
    session
        .foreground(Some(property(WindowType::AppSubWindow)), false)
        .await
        .unwrap();
    session.flush().await.unwrap();

    assert_eq!(session.state(), SessionState::Foreground);
    assert!(session.snapshot().has_surface());
    assert!(client.surface.is_attached());
}

#[tokio::test]
async fn first_frame_does_not_activate_when_disabled() {
    let mut config = winscene_core::SessionConfig::default();
    config.lifecycle.auto_activate_on_first_frame = false;
    let registry = winscene_core::SessionRegistry::new(config);
    let (session, _client, _log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.notify_first_frame().await.unwrap();
    assert_eq!(session.state(), SessionState::Foreground);
}

// =============================================================================
// Active / focus
// =============================================================================

#[tokio::test]
async fn set_active_walks_active_and_inactive() {
    let registry = registry();
    let (session, _client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.set_active(true).await.unwrap();
    session.set_active(true).await.unwrap();
    session.set_active(false).await.unwrap();
    session.set_active(true).await.unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(
        log.states(session.id()),
        vec![
            SessionState::Connect,
            SessionState::Foreground,
            SessionState::Active,
            SessionState::Inactive,
            SessionState::Active,
        ]
    );
    assert_eq!(log.count(session.id(), EventKind::ActiveStatus), 3);
}

#[tokio::test]
async fn set_active_requires_a_connected_session() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    assert_eq!(
        session.set_active(true).await.unwrap_err(),
        SessionError::InvalidSession(session.id().0)
    );
}

#[tokio::test]
async fn update_active_status_changes_the_flag_only() {
    let registry = registry();
    let (session, client, _log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.update_active_status(true).await.unwrap();
    assert!(session.is_active());
    assert_eq!(session.state(), SessionState::Foreground);
    assert_eq!(client.stage.count(&StageCall::SetActive(true)), 0);
}

#[tokio::test]
async fn focus_changes_are_forwarded_once() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.update_focus(true).await.unwrap();
    session.update_focus(true).await.unwrap();

    assert!(session.snapshot().is_focused);
    assert_eq!(client.stage.count(&StageCall::Focus(true)), 1);
    assert_eq!(log.count(session.id(), EventKind::FocusChange), 1);
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test]
async fn client_disconnect_requires_a_token() {
    let registry = registry();
    let (session, _client, _log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    assert_eq!(
        session.disconnect(true, None).await.unwrap_err(),
        SessionError::NullArgument("identity token")
    );
    assert_eq!(
        session
            .disconnect(true, Some(IdentityToken::new("stolen")))
            .await
            .unwrap_err(),
        SessionError::IdentityMismatch
    );
    session.flush().await.unwrap();
    assert_eq!(session.state(), SessionState::Foreground);
}

#[tokio::test]
async fn server_disconnect_skips_the_token_check() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.disconnect(false, None).await.unwrap();
    session.wait_for_state(SessionState::End).await.unwrap();

    assert!(!client.surface.is_attached());
    assert!(log.of(session.id()).contains(&SessionEvent::Background { from_client: false }));
    assert!(registry.get(session.id()).is_none());
}

#[tokio::test]
async fn disconnect_twice_is_a_no_op() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session
        .disconnect(true, Some(client.token.clone()))
        .await
        .unwrap();
    session
        .disconnect(true, Some(client.token.clone()))
        .await
        .unwrap();
    session.wait_for_state(SessionState::End).await.unwrap();
    session.disconnect(false, None).await.unwrap();

    let ends = log
        .states(session.id())
        .into_iter()
        .filter(|state| *state == SessionState::End)
        .count();
    assert_eq!(ends, 1);
    assert_eq!(client.surface.detaches(), 1);
}

#[tokio::test]
async fn operations_after_end_report_an_invalid_session() {
    let registry = registry();
    let (session, _client, _log) = shown(&registry, WindowType::AppMainWindow, "tok").await;
    session.disconnect(false, None).await.unwrap();
    session.wait_for_state(SessionState::End).await.unwrap();
    let id = session.id().0;

    assert_eq!(
        session
            .foreground(Some(property(WindowType::AppMainWindow)), false)
            .await
            .unwrap_err(),
        SessionError::InvalidSession(id)
    );
    assert_eq!(
        session.background(false).await.unwrap_err(),
        SessionError::InvalidSession(id)
    );
    assert_eq!(
        session.set_active(true).await.unwrap_err(),
        SessionError::InvalidSession(id)
    );
    assert_eq!(
        session
            .update_rect(Rect::new(0, 0, 500, 500), Default::default())
            .await
            .unwrap_err(),
        SessionError::InvalidSession(id)
    );
}

#[tokio::test]
async fn disconnect_from_created_ends_the_session() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    session.disconnect(false, None).await.unwrap();
    session.wait_for_state(SessionState::End).await.unwrap();
    assert!(registry.is_empty());
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test]
async fn reconnect_shown_restores_foreground_and_activity() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    let restarted = Client::new("tok");
    let mut visible = property(WindowType::AppMainWindow).with_state(WindowState::Shown);
    visible.aspect_ratio = 1.5;
    session
        .reconnect(restarted.params(visible).with_token(client.token.clone()))
        .await
        .unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Foreground);
    assert!(snapshot.is_active);
    assert!(restarted.surface.is_attached());
    assert!((snapshot.property.aspect_ratio - 1.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn reconnect_hidden_from_connect_goes_to_background() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    let hidden = property(WindowType::AppMainWindow).with_state(WindowState::Hidden);
    session.reconnect(client.params(hidden)).await.unwrap();

    assert_eq!(session.state(), SessionState::Background);
    assert!(!session.is_active());
}

#[tokio::test]
async fn reconnect_hidden_while_visible_hides() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    let hidden = property(WindowType::AppMainWindow).with_state(WindowState::Hidden);
    session.reconnect(client.params(hidden)).await.unwrap();

    assert_eq!(session.state(), SessionState::Background);
    assert_eq!(log.count(session.id(), EventKind::Background), 1);
}

#[tokio::test]
async fn reconnect_with_a_foreign_token_is_rejected() {
    let registry = registry();
    let (session, _client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    let intruder = Client::new("other");
    let err = session
        .reconnect(intruder.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::IdentityMismatch);
}

#[tokio::test]
async fn reconnect_of_a_destroyed_window_is_rejected() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;

    let destroyed = property(WindowType::AppMainWindow).with_state(WindowState::Destroyed);
    let err = session.reconnect(client.params(destroyed)).await.unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidParam);
}

#[tokio::test]
async fn reconnect_after_end_is_rejected() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;
    session.disconnect(false, None).await.unwrap();
    session.wait_for_state(SessionState::End).await.unwrap();

    let err = session
        .reconnect(client.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::InvalidSession(session.id().0));
}

#[tokio::test]
async fn input_method_float_reconnects_active() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::InputMethodFloat, "tok").await;

    let visible = property(WindowType::InputMethodFloat).with_state(WindowState::Shown);
    session.reconnect(client.params(visible)).await.unwrap();

    assert_eq!(session.state(), SessionState::Active);
}

// =============================================================================
// Exceptions, termination, recovery
// =============================================================================

#[tokio::test]
async fn exceptions_are_reported_once() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;
    let info = ExceptionInfo {
        token: Some(client.token.clone()),
        error_code: 7,
        reason: "renderer crashed".to_string(),
        need_remove_session: true,
    };

    session.notify_session_exception(info.clone()).await.unwrap();
    session.notify_session_exception(info.clone()).await.unwrap();

    assert_eq!(
        log.of(session.id())
            .into_iter()
            .filter(|event| *event == SessionEvent::Exception(info.clone()))
            .count(),
        1
    );
    let snapshot = session.snapshot();
    assert!(snapshot.exception_reported);
    assert!(snapshot.need_remove);
}

#[tokio::test]
async fn exceptions_require_the_owner_token() {
    let registry = registry();
    let (session, _client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    let forged = ExceptionInfo {
        token: Some(IdentityToken::new("forged")),
        ..ExceptionInfo::default()
    };
    assert_eq!(
        session.notify_session_exception(forged).await.unwrap_err(),
        SessionError::IdentityMismatch
    );
    assert_eq!(
        session
            .notify_session_exception(ExceptionInfo::default())
            .await
            .unwrap_err(),
        SessionError::NullArgument("identity token")
    );
    assert_eq!(log.count(session.id(), EventKind::Exception), 0);
}

#[tokio::test]
async fn reconnect_clears_the_exception_latch() {
    let registry = registry();
    let (session, client, _log) = connected(&registry, WindowType::AppMainWindow, "tok").await;
    session
        .notify_session_exception(ExceptionInfo {
            token: Some(client.token.clone()),
            ..ExceptionInfo::default()
        })
        .await
        .unwrap();

    session
        .reconnect(client.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap();
    assert!(!session.snapshot().exception_reported);
}

#[tokio::test]
async fn terminate_fires_once_while_in_progress() {
    let registry = registry();
    let (session, client, log) = shown(&registry, WindowType::AppMainWindow, "tok").await;
    let info = TerminateInfo {
        token: Some(client.token.clone()),
        reason: "user closed".to_string(),
    };

    session.terminate_session(info.clone()).await.unwrap();
    session.terminate_session(info).await.unwrap();

    assert!(session.snapshot().is_terminating);
    assert_eq!(log.count(session.id(), EventKind::Terminate), 1);
}

#[tokio::test]
async fn suspend_for_recovery_keeps_the_session_reconnectable() {
    let registry = registry();
    let (session, client, _log) = shown(&registry, WindowType::AppMainWindow, "tok").await;

    session.suspend_for_recovery().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnect);
    assert!(!client.surface.is_attached());
    assert!(registry.get(session.id()).is_some());

    let restarted = Client::new("tok");
    let visible = property(WindowType::AppMainWindow).with_state(WindowState::Shown);
    session.reconnect(restarted.params(visible)).await.unwrap();
    assert_eq!(session.state(), SessionState::Foreground);
    assert!(restarted.surface.is_attached());
}

#[tokio::test]
async fn suspend_requires_a_connected_session() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    assert_eq!(
        session.suspend_for_recovery().await.unwrap_err().code(),
        ResultCode::InvalidState
    );
}

// =============================================================================
// Callbacks
// =============================================================================

#[tokio::test]
async fn cleared_callbacks_stop_firing() {
    let registry = registry();
    let session = registry.create(property(WindowType::AppMainWindow));
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    session
        .set_callback(
            EventKind::StateChange,
            Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

    let client = Client::new("tok");
    session
        .connect(client.params(property(WindowType::AppMainWindow)))
        .await
        .unwrap();
    session.clear_callback(EventKind::StateChange).await.unwrap();
    show(&session).await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn registry_drops_ended_sessions() {
    let registry = registry();
    let log = EventLog::new();
    let (a, _ca, _) = connected(&registry, WindowType::AppMainWindow, "a").await;
    let (b, _cb, _) = connected(&registry, WindowType::AppSubWindow, "b").await;
    log.attach(&b).await;
    assert_eq!(registry.len(), 2);

    a.disconnect(false, None).await.unwrap();
    settle(&registry, &[&a, &b]).await;

    assert_eq!(registry.ids(), vec![b.id()]);
    assert_eq!(log.count(b.id(), EventKind::StateChange), 0);
}
