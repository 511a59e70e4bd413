use super::*;
use crate::auth::{Authorizer, OwnerPolicy, StaticPolicy};
use crate::capture::{CaptureRegistry, ChannelMessage};
use crate::error::EngineError;
use crate::process::{ProcessManager, ProcessSettings};
use appshare_common::{
    ChannelTarget, CloseReason, EngineEvent, EventBus, InstanceId, ScreenSize, UserId,
};
use appshare_config::{CaptureConfig, SessionsConfig};
use appshare_display::{ProgramBehavior, VirtualDisplay, VirtualProcessHost};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    sessions: SessionManager,
    capture: CaptureRegistry,
    events: EventBus,
    instance: InstanceId,
}

async fn harness_with(authorizer: Arc<dyn Authorizer>) -> Harness {
    let display = Arc::new(VirtualDisplay::new(ScreenSize::new(320, 240)));
    let host = Arc::new(VirtualProcessHost::new(Some(display.clone())));
    host.install("gedit", ProgramBehavior::Normal).await;
    host.set_window_size(64, 48).await;

    let mut settings = ProcessSettings::default();
    settings.apps.allowed = vec!["gedit".into()];
    settings.health.interval_ms = 20;
    let events = EventBus::new(256);
    let processes = ProcessManager::new(
        settings,
        host,
        display.clone(),
        authorizer.clone(),
        events.clone(),
    );
    let capture = CaptureRegistry::new(
        CaptureConfig {
            frame_rate: 20,
            ..CaptureConfig::default()
        },
        processes.clone(),
        display,
        events.clone(),
    );
    let sessions = SessionManager::new(
        SessionsConfig::default(),
        capture.clone(),
        authorizer,
        events.clone(),
    );
    let instance = processes.start("gedit", &alice()).await.unwrap().id;
    Harness {
        sessions,
        capture,
        events,
        instance,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(OwnerPolicy)).await
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn bob() -> UserId {
    UserId::new("bob")
}

fn carol() -> UserId {
    UserId::new("carol")
}

fn limited(max_participants: usize, allow_guests: bool) -> SessionSettings {
    SessionSettings {
        max_participants,
        allow_guests,
        recording: false,
    }
}

#[tokio::test]
async fn owner_join_opens_stream_without_using_capacity() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "review", h.instance.clone(), Some(limited(1, true)))
        .await
        .unwrap();
    assert!(h
        .capture
        .channel(&ChannelTarget::Instance(h.instance.clone()))
        .await
        .is_none());

    let (joined, mut sub) = h.sessions.join(&session.id, &alice()).await.unwrap();
    assert_eq!(joined.participant_count(), 1);
    let first = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap();
    assert!(matches!(first, Some(ChannelMessage::Frame(_))));
}

#[tokio::test]
async fn rejoin_replaces_subscription() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "", h.instance.clone(), None)
        .await
        .unwrap();
    assert_eq!(session.name, "alice's session");

    let (_, mut first) = h.sessions.join(&session.id, &bob()).await.unwrap();
    let (after, second) = h.sessions.join(&session.id, &bob()).await.unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(after.participant_count(), 2);

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match first.recv().await {
                Some(message) if message.is_terminal() => return message,
                Some(_) => continue,
                None => panic!("no terminal message"),
            }
        }
    })
    .await
    .unwrap();
    assert!(matches!(
        ended,
        ChannelMessage::Closed(CloseReason::Unsubscribed)
    ));
}

#[tokio::test]
async fn join_at_capacity_leaves_count_unchanged() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "pair", h.instance.clone(), Some(limited(2, true)))
        .await
        .unwrap();
    let (_, _bob_sub) = h.sessions.join(&session.id, &bob()).await.unwrap();

    let err = h.sessions.join(&session.id, &carol()).await.unwrap_err();
    assert!(matches!(err, EngineError::AtCapacity { limit: 2 }));
    let current = h.sessions.get(&session.id).await.unwrap();
    assert_eq!(current.participant_count(), 2);
    assert!(!current.is_participant(&carol()));
}

#[tokio::test]
async fn guests_need_preauthorization() {
    let mut policy = StaticPolicy::default();
    policy.preauthorized.insert(carol());
    let h = harness_with(Arc::new(policy)).await;
    let session = h
        .sessions
        .create(&alice(), "closed", h.instance.clone(), Some(limited(5, false)))
        .await
        .unwrap();

    let err = h.sessions.join(&session.id, &bob()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));
    assert!(h.sessions.join(&session.id, &carol()).await.is_ok());
}

#[tokio::test]
async fn owner_leaving_hands_over_to_earliest_participant() {
    let h = harness().await;
    let mut rx = h.events.subscribe();
    let session = h
        .sessions
        .create(&alice(), "mob", h.instance.clone(), None)
        .await
        .unwrap();
    let _b = h.sessions.join(&session.id, &bob()).await.unwrap();
    let _c = h.sessions.join(&session.id, &carol()).await.unwrap();

    let after = h
        .sessions
        .leave(&session.id, &alice())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.owner, bob());
    let order: Vec<_> = after.participants.iter().map(|p| p.user.clone()).collect();
    assert_eq!(order, vec![bob(), carol()]);

    let mut transferred = None;
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::OwnershipTransferred { from, to, .. } = event {
            transferred = Some((from, to));
        }
    }
    assert_eq!(transferred, Some((alice(), bob())));
}

#[tokio::test]
async fn last_leave_destroys_session_and_releases_stream() {
    let h = harness().await;
    let target = ChannelTarget::Instance(h.instance.clone());
    let session = h
        .sessions
        .create(&alice(), "solo", h.instance.clone(), None)
        .await
        .unwrap();
    let (_, mut sub) = h.sessions.join(&session.id, &alice()).await.unwrap();

    assert!(h.sessions.leave(&session.id, &alice()).await.unwrap().is_none());
    assert!(h.sessions.get(&session.id).await.is_none());

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match sub.recv().await {
                Some(message) if message.is_terminal() => return message,
                Some(_) => continue,
                None => panic!("no terminal message"),
            }
        }
    })
    .await
    .unwrap();
    assert!(ended.is_terminal());

    for _ in 0..500 {
        if h.capture.channel(&target).await.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("channel still open after the session ended");
}

#[tokio::test]
async fn destroy_keeps_channel_for_other_viewers() {
    let h = harness().await;
    let target = ChannelTarget::Instance(h.instance.clone());
    let _direct = h.capture.subscribe(target.clone()).await.unwrap();
    let session = h
        .sessions
        .create(&alice(), "s", h.instance.clone(), None)
        .await
        .unwrap();
    let _b = h.sessions.join(&session.id, &bob()).await.unwrap();

    h.sessions.close(&session.id, &alice()).await.unwrap();
    let channel = h.capture.channel(&target).await.unwrap();
    assert_eq!(channel.subscriber_count().await, 1);
}

#[tokio::test]
async fn only_owner_may_close_or_reconfigure() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "s", h.instance.clone(), None)
        .await
        .unwrap();
    let _b = h.sessions.join(&session.id, &bob()).await.unwrap();

    assert!(matches!(
        h.sessions.close(&session.id, &bob()).await,
        Err(EngineError::NotAllowed(_))
    ));
    assert!(matches!(
        h.sessions
            .update_settings(&session.id, &bob(), limited(3, false))
            .await,
        Err(EngineError::NotAllowed(_))
    ));

    let updated = h
        .sessions
        .update_settings(&session.id, &alice(), limited(3, false))
        .await
        .unwrap();
    assert_eq!(updated.settings.max_participants, 3);
    assert!(h
        .sessions
        .update_settings(&session.id, &alice(), limited(0, true))
        .await
        .is_err());
}

#[tokio::test]
async fn list_reports_who_can_join() {
    let h = harness().await;
    let open = h
        .sessions
        .create(&alice(), "open", h.instance.clone(), None)
        .await
        .unwrap();
    let _full = h
        .sessions
        .create(&alice(), "full", h.instance.clone(), Some(limited(1, true)))
        .await
        .unwrap();

    let listed = h.sessions.list(&bob()).await;
    assert_eq!(listed.len(), 2);
    for summary in &listed {
        assert_eq!(summary.can_join, summary.session.id == open.id);
    }
    assert!(h.sessions.list(&alice()).await.iter().all(|s| s.can_join));
}

#[tokio::test]
async fn idle_sessions_are_reaped() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "s", h.instance.clone(), None)
        .await
        .unwrap();
    assert!(h.sessions.reap_idle(Duration::from_secs(3600)).await.is_empty());

    tokio::time::sleep(Duration::from_millis(30)).await;
    let reaped = h.sessions.reap_idle(Duration::from_millis(10)).await;
    assert_eq!(reaped, vec![session.id.clone()]);
    assert!(h.sessions.get(&session.id).await.is_none());
}

#[tokio::test]
async fn sessions_close_with_their_instance() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "s", h.instance.clone(), None)
        .await
        .unwrap();
    let closed = h.sessions.close_for_instance(&h.instance).await;
    assert_eq!(closed, vec![session.id.clone()]);
    assert!(matches!(
        h.sessions.join(&session.id, &bob()).await,
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn participants_are_tracked_per_instance() {
    let h = harness().await;
    let session = h
        .sessions
        .create(&alice(), "s", h.instance.clone(), None)
        .await
        .unwrap();
    let _b = h.sessions.join(&session.id, &bob()).await.unwrap();
    assert!(h.sessions.is_participant(&h.instance, &bob()).await);
    assert!(!h.sessions.is_participant(&h.instance, &carol()).await);
    assert!(!h.sessions.is_participant(&InstanceId::new(), &bob()).await);
}

#[tokio::test]
async fn user_session_is_the_latest_joined() {
    let h = harness().await;
    let first = h
        .sessions
        .create(&alice(), "first", h.instance.clone(), None)
        .await
        .unwrap();
    let second = h
        .sessions
        .create(&carol(), "second", h.instance.clone(), None)
        .await
        .unwrap();
    assert!(h.sessions.user_session(&bob()).await.is_none());

    let _a = h.sessions.join(&first.id, &bob()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let _b = h.sessions.join(&second.id, &bob()).await.unwrap();
    assert_eq!(h.sessions.user_session(&bob()).await.unwrap().id, second.id);
    assert_eq!(h.sessions.user_session(&alice()).await.unwrap().id, first.id);

    h.sessions.leave(&second.id, &bob()).await.unwrap();
    assert_eq!(h.sessions.user_session(&bob()).await.unwrap().id, first.id);
}

#[tokio::test]
async fn stats_count_live_and_historic_sessions() {
    let h = harness().await;
    let first = h
        .sessions
        .create(&alice(), "first", h.instance.clone(), None)
        .await
        .unwrap();
    let second = h
        .sessions
        .create(&alice(), "second", h.instance.clone(), None)
        .await
        .unwrap();
    let _b = h.sessions.join(&first.id, &bob()).await.unwrap();
    h.sessions.close(&second.id, &alice()).await.unwrap();

    let stats = h.sessions.stats().await;
    assert_eq!(stats.active_sessions, 1);
    assert_eq!(stats.total_participants, 2);
    assert_eq!(stats.total_sessions, 2);
}
