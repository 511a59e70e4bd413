use super::*;
use crate::auth::OwnerPolicy;
use crate::capture::ChannelMessage;
use appshare_common::{Rect, ScreenSize};
use appshare_display::{ProgramBehavior, VirtualDisplay, VirtualProcessHost};
use std::future::Future;
use std::time::Instant;

struct Harness {
    engine: Engine,
    display: Arc<VirtualDisplay>,
    host: Arc<VirtualProcessHost>,
}

fn test_config() -> AppShareConfig {
    let mut config = AppShareConfig::default();
    config.apps.allowed = vec!["firefox".into(), "code".into()];
    config.apps.launch_timeout_ms = 2_000;
    config.apps.stop_grace_ms = 100;
    config.health.interval_ms = 20;
    config.health.failure_threshold = 1;
    config.capture.frame_rate = 10;
    config.capture.quality = 50;
    config
}

async fn harness(config: AppShareConfig) -> Harness {
    let display = Arc::new(VirtualDisplay::new(ScreenSize::new(1920, 1080)));
    let host = Arc::new(VirtualProcessHost::new(Some(display.clone())));
    host.install("firefox", ProgramBehavior::Normal).await;
    host.install("code", ProgramBehavior::Normal).await;
    host.set_window_size(160, 120).await;
    let engine = Engine::new(config, display.clone(), host.clone(), Arc::new(OwnerPolicy))
        .await
        .unwrap();
    Harness {
        engine,
        display,
        host,
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn bob() -> UserId {
    UserId::new("bob")
}

#[tokio::test]
async fn strangers_cannot_watch_an_instance() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();

    let err = h
        .engine
        .subscribe(ChannelTarget::Instance(instance.id.clone()), &bob())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));
    assert!(h.engine.channels().await.is_empty());

    assert!(h.engine.subscribe(ChannelTarget::LiveView, &bob()).await.is_ok());
}

#[tokio::test]
async fn session_participants_may_watch_the_shared_instance() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();
    let session = h
        .engine
        .create_session(&alice(), "", &instance.id, None)
        .await
        .unwrap();
    assert_eq!(session.name, "alice's session");

    let (joined, _stream) = h.engine.join_session(&session.id, &bob()).await.unwrap();
    assert_eq!(joined.participant_count(), 2);
    assert!(h
        .engine
        .subscribe(ChannelTarget::Instance(instance.id.clone()), &bob())
        .await
        .is_ok());
}

#[tokio::test]
async fn only_the_owner_can_share_an_instance() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();

    let err = h
        .engine
        .create_session(&bob(), "mine", &instance.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));

    let missing = InstanceId::new();
    let err = h
        .engine
        .create_session(&alice(), "gone", &missing, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn stopping_an_instance_closes_its_sessions_and_streams() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();
    let session = h
        .engine
        .create_session(&alice(), "demo", &instance.id, None)
        .await
        .unwrap();
    let (_, mut stream) = h.engine.join_session(&session.id, &bob()).await.unwrap();

    h.engine.stop(&instance.id, &alice()).await.unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.recv().await {
                Some(message) if message.is_terminal() => return message,
                Some(_) => continue,
                None => panic!("stream ended without a terminal message"),
            }
        }
    })
    .await
    .unwrap();
    // The session may release the stream before the channel drains.
    assert!(matches!(
        closed,
        ChannelMessage::Closed(CloseReason::TargetNotRunning | CloseReason::Unsubscribed)
    ));

    let engine = &h.engine;
    let session_id = &session.id;
    eventually(|| async move { engine.session(session_id).await.is_err() }).await;
    assert!(h.engine.list_sessions(&alice()).await.is_empty());
}

#[tokio::test]
async fn only_owner_can_stop() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();

    let err = h.engine.stop(&instance.id, &bob()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));
    assert!(h.engine.status(&instance.id).await.is_ok());
}

#[tokio::test]
async fn list_instances_filters_by_owner() {
    let h = harness(test_config()).await;
    h.engine.start("firefox", &alice()).await.unwrap();
    h.engine.start("code", &bob()).await.unwrap();

    assert_eq!(h.engine.list_instances(None).await.len(), 2);
    let mine = h.engine.list_instances(Some(&bob())).await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].app, "code");
}

#[tokio::test]
async fn windows_are_tagged_with_their_instance() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();

    let windows = h.engine.windows().await.unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].instance_id.as_ref(), Some(&instance.id));
}

#[tokio::test]
async fn snap_instance_moves_its_window() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();

    let placement = h
        .engine
        .snap_instance(&instance.id, SnapZone::Right)
        .await
        .unwrap();
    assert_eq!(placement.rect, Rect::new(960, 0, 960, 1080));
    let window = h.display.window(instance.window.unwrap()).await.unwrap();
    assert_eq!(window.geometry, placement.rect);

    let err = h
        .engine
        .snap_instance(&InstanceId::new(), SnapZone::Left)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn reconfigure_pushes_capture_defaults_to_live_channels() {
    let h = harness(test_config()).await;
    let _live = h
        .engine
        .subscribe(ChannelTarget::LiveView, &alice())
        .await
        .unwrap();

    let mut config = test_config();
    config.capture.frame_rate = 5;
    config.capture.quality = 30;
    h.engine.reconfigure(config).await;

    let channels = h.engine.channels().await;
    assert_eq!(channels[0].settings.frame_rate, 5);
    assert_eq!(channels[0].settings.quality, 30);
    assert_eq!(h.engine.config().await.capture.frame_rate, 5);
}

#[tokio::test]
async fn available_applications_reflect_installed_programs() {
    let mut config = test_config();
    config.apps.allowed.push("gimp".into());
    let h = harness(config).await;
    assert_eq!(
        h.engine.available_applications().await,
        vec!["firefox".to_string(), "code".to_string()]
    );
}

#[tokio::test]
async fn shutdown_closes_streams_and_stops_instances() {
    let h = harness(test_config()).await;
    let mut rx = h.engine.events();
    h.engine.start("firefox", &alice()).await.unwrap();
    let mut live = h
        .engine
        .subscribe(ChannelTarget::LiveView, &alice())
        .await
        .unwrap();

    h.engine.shutdown().await;

    assert!(h.engine.list_instances(None).await.is_empty());
    assert_eq!(h.host.alive_count().await, 0);
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match live.recv().await {
                Some(message) if message.is_terminal() => return message,
                Some(_) => continue,
                None => panic!("stream ended without a terminal message"),
            }
        }
    })
    .await
    .unwrap();
    assert!(matches!(closed, ChannelMessage::Closed(CloseReason::Shutdown)));

    let saw_shutdown = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(EngineEvent::Shutdown) = rx.recv().await {
                return true;
            }
        }
    })
    .await
    .unwrap();
    assert!(saw_shutdown);
}

#[tokio::test]
async fn instance_windows_change_only_for_their_controllers() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();
    let window = instance.window.unwrap();

    let err = h.engine.close_window(window, &bob()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));
    assert!(h.display.window(window).await.is_some());

    let placement = h.engine.maximize_window(window, &alice()).await.unwrap();
    assert_eq!(placement.rect, Rect::new(0, 0, 1920, 1080));

    let stray = h
        .display
        .open_window(None, "stray", Rect::new(0, 0, 100, 100))
        .await;
    h.engine.minimize_window(stray, &bob()).await.unwrap();
    assert!(h.display.window(stray).await.unwrap().minimized);
}

#[tokio::test]
async fn user_session_and_stats_follow_joins() {
    let h = harness(test_config()).await;
    let instance = h.engine.start("firefox", &alice()).await.unwrap();
    let session = h
        .engine
        .create_session(&alice(), "demo", &instance.id, None)
        .await
        .unwrap();
    let (_, _stream) = h.engine.join_session(&session.id, &bob()).await.unwrap();

    assert_eq!(h.engine.user_session(&bob()).await.unwrap().id, session.id);
    let err = h
        .engine
        .user_session(&UserId::new("carol"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    let stats = h.engine.session_stats().await;
    assert_eq!(stats.active_sessions, 1);
    assert_eq!(stats.total_participants, 2);
    assert_eq!(stats.total_sessions, 1);
}
