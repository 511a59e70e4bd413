//! Session manager: create, join, leave and close sessions.

use appshare_common::{ChannelTarget, EngineEvent, EventBus, InstanceId, SessionId, UserId};
use appshare_config::SessionsConfig;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::types::{Participant, Session, SessionSettings, SessionStats, SessionSummary};
use crate::auth::Authorizer;
use crate::capture::{CaptureRegistry, Subscription};
use crate::error::{EngineError, Result};

type SessionEntry = Arc<Mutex<Session>>;

/// Owns every live session. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    defaults: Arc<RwLock<SessionsConfig>>,
    created: Arc<AtomicU64>,
    capture: CaptureRegistry,
    authorizer: Arc<dyn Authorizer>,
    events: EventBus,
}

impl SessionManager {
    pub fn new(
        defaults: SessionsConfig,
        capture: CaptureRegistry,
        authorizer: Arc<dyn Authorizer>,
        events: EventBus,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            defaults: Arc::new(RwLock::new(defaults)),
            created: Arc::new(AtomicU64::new(0)),
            capture,
            authorizer,
            events,
        }
    }

    pub async fn apply_defaults(&self, defaults: SessionsConfig) {
        *self.defaults.write().await = defaults;
    }

    pub async fn defaults(&self) -> SessionsConfig {
        self.defaults.read().await.clone()
    }

    /// Create a session with `owner` as the only participant. No stream is
    /// opened until someone joins.
    pub async fn create(
        &self,
        owner: &UserId,
        name: &str,
        target: InstanceId,
        settings: Option<SessionSettings>,
    ) -> Result<Session> {
        let settings = match settings {
            Some(settings) => settings,
            None => SessionSettings::from_config(&*self.defaults.read().await),
        };
        validate_settings(&settings)?;

        let name = match name.trim() {
            "" => format!("{owner}'s session"),
            trimmed => trimmed.to_string(),
        };
        let session = Session::new(name, owner.clone(), target, settings);
        let snapshot = session.clone();
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        self.created.fetch_add(1, Ordering::Relaxed);

        info!(session_id = %snapshot.id, owner = %owner, target = %snapshot.target, "session created");
        self.events.publish(EngineEvent::SessionCreated {
            session_id: snapshot.id.clone(),
            owner: owner.clone(),
        });
        Ok(snapshot)
    }

    /// Join (or re-join) a session and receive a fresh frame subscription.
    pub async fn join(&self, id: &SessionId, user: &UserId) -> Result<(Session, Subscription)> {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        if session.closed {
            return Err(EngineError::not_found("session", id));
        }
        let target = ChannelTarget::Instance(session.target.clone());

        if let Some(index) = session.position(user) {
            let subscription = self.capture.subscribe(target.clone()).await?;
            let previous = session.participants[index]
                .subscription
                .replace(subscription.id().clone());
            if let Some(previous) = previous {
                self.capture.unsubscribe(&target, &previous).await;
            }
            session.touch();
            debug!(session_id = %id, user = %user, "participant re-joined");
            return Ok((session.clone(), subscription));
        }

        let limit = session.settings.max_participants;
        if session.participant_count() >= limit {
            info!(session_id = %id, user = %user, limit, "join rejected: session full");
            return Err(EngineError::AtCapacity { limit });
        }
        if !session.settings.allow_guests && !self.authorizer.is_preauthorized(user, id) {
            info!(session_id = %id, user = %user, "join rejected: guests not allowed");
            return Err(EngineError::NotAllowed(format!(
                "session {id} does not admit guests"
            )));
        }

        let subscription = self.capture.subscribe(target).await?;
        let mut participant = Participant::new(user.clone());
        participant.subscription = Some(subscription.id().clone());
        session.participants.push(participant);
        session.touch();

        info!(session_id = %id, user = %user, participants = session.participant_count(), "participant joined");
        self.events.publish(EngineEvent::ParticipantJoined {
            session_id: id.clone(),
            user: user.clone(),
        });
        Ok((session.clone(), subscription))
    }

    /// Leave a session. Returns the session as it stands afterwards, or
    /// `None` if the last participant left and it was destroyed.
    pub async fn leave(&self, id: &SessionId, user: &UserId) -> Result<Option<Session>> {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        if session.closed {
            return Err(EngineError::not_found("session", id));
        }
        let index = session
            .position(user)
            .ok_or_else(|| EngineError::not_found("participant", user))?;
        let participant = session.participants.remove(index);
        self.release(&session.target, &participant).await;

        info!(session_id = %id, user = %user, "participant left");
        self.events.publish(EngineEvent::ParticipantLeft {
            session_id: id.clone(),
            user: user.clone(),
        });

        if session.participants.is_empty() {
            drop(session);
            self.destroy(id).await;
            return Ok(None);
        }

        if session.owner == *user {
            let new_owner = session.participants[0].user.clone();
            session.owner = new_owner.clone();
            info!(session_id = %id, from = %user, to = %new_owner, "ownership transferred");
            self.events.publish(EngineEvent::OwnershipTransferred {
                session_id: id.clone(),
                from: user.clone(),
                to: new_owner,
            });
        }
        session.touch();
        Ok(Some(session.clone()))
    }

    /// Owner-only explicit close.
    pub async fn close(&self, id: &SessionId, requester: &UserId) -> Result<()> {
        let entry = self.entry(id).await?;
        if entry.lock().await.owner != *requester {
            return Err(EngineError::NotAllowed(format!(
                "only the owner may close session {id}"
            )));
        }
        self.destroy(id).await;
        Ok(())
    }

    /// Owner-only settings change. Lowering the limit below the current
    /// participant count keeps everyone but blocks new joins.
    pub async fn update_settings(
        &self,
        id: &SessionId,
        requester: &UserId,
        settings: SessionSettings,
    ) -> Result<Session> {
        validate_settings(&settings)?;
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        if session.owner != *requester {
            return Err(EngineError::NotAllowed(format!(
                "only the owner may change session {id}"
            )));
        }
        session.settings = settings;
        session.touch();
        Ok(session.clone())
    }

    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        let entry = self.sessions.read().await.get(id).cloned()?;
        let session = entry.lock().await;
        Some(session.clone())
    }

    /// Every session, flagged with whether `user` could join it now.
    pub async fn list(&self, user: &UserId) -> Vec<SessionSummary> {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let session = entry.lock().await.clone();
            let can_join = session.is_participant(user)
                || (session.participant_count() < session.settings.max_participants
                    && (session.settings.allow_guests
                        || self.authorizer.is_preauthorized(user, &session.id)));
            out.push(SessionSummary { session, can_join });
        }
        out.sort_by(|a, b| a.session.created_at.cmp(&b.session.created_at));
        out
    }

    /// The session `user` joined most recently, if they are in any.
    pub async fn user_session(&self, user: &UserId) -> Option<Session> {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut latest: Option<(chrono::DateTime<Utc>, Session)> = None;
        for entry in entries {
            let session = entry.lock().await;
            let Some(joined) = session
                .participants
                .iter()
                .find(|p| p.user == *user)
                .map(|p| p.joined_at)
            else {
                continue;
            };
            if latest.as_ref().map_or(true, |(at, _)| joined > *at) {
                latest = Some((joined, session.clone()));
            }
        }
        latest.map(|(_, session)| session)
    }

    pub async fn stats(&self) -> SessionStats {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut total_participants = 0;
        for entry in &entries {
            total_participants += entry.lock().await.participant_count();
        }
        SessionStats {
            active_sessions: entries.len(),
            total_participants,
            total_sessions: self.created.load(Ordering::Relaxed),
        }
    }

    /// Whether `user` participates in any session sharing `instance`.
    pub async fn is_participant(&self, instance: &InstanceId, user: &UserId) -> bool {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        for entry in entries {
            let session = entry.lock().await;
            if session.target == *instance && session.is_participant(user) {
                return true;
            }
        }
        false
    }

    /// Record activity on every session sharing `instance`.
    pub async fn touch_instance(&self, instance: &InstanceId) {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        for entry in entries {
            let mut session = entry.lock().await;
            if session.target == *instance {
                session.touch();
            }
        }
    }

    /// Close every session sharing `instance`, e.g. once it stopped for good.
    pub async fn close_for_instance(&self, instance: &InstanceId) -> Vec<SessionId> {
        let mut matching = Vec::new();
        let entries: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        for (id, entry) in entries {
            if entry.lock().await.target == *instance {
                matching.push(id);
            }
        }
        for id in &matching {
            self.destroy(id).await;
        }
        matching
    }

    /// Close sessions with no activity for `timeout`.
    pub async fn reap_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let now = Utc::now();
        let mut idle = Vec::new();
        let entries: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        for (id, entry) in entries {
            let last = entry.lock().await.last_activity;
            let quiet = (now - last).to_std().unwrap_or_default();
            if quiet >= timeout {
                idle.push(id);
            }
        }
        for id in &idle {
            info!(session_id = %id, "closing idle session");
            self.destroy(id).await;
        }
        idle
    }

    async fn entry(&self, id: &SessionId) -> Result<SessionEntry> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("session", id))
    }

    /// Remove the session and release every participant's subscription.
    async fn destroy(&self, id: &SessionId) {
        let Some(entry) = self.sessions.write().await.remove(id) else {
            return;
        };
        let mut session = entry.lock().await;
        session.closed = true;
        let participants = std::mem::take(&mut session.participants);
        for participant in &participants {
            self.release(&session.target, participant).await;
        }
        info!(session_id = %id, released = participants.len(), "session closed");
        self.events.publish(EngineEvent::SessionClosed {
            session_id: id.clone(),
        });
    }

    async fn release(&self, target: &InstanceId, participant: &Participant) {
        if let Some(subscription) = &participant.subscription {
            let target = ChannelTarget::Instance(target.clone());
            self.capture.unsubscribe(&target, subscription).await;
        }
    }
}

fn validate_settings(settings: &SessionSettings) -> Result<()> {
    if settings.max_participants == 0 {
        return Err(EngineError::NotAllowed(
            "max_participants must be at least 1".into(),
        ));
    }
    Ok(())
}
