//! Types for collaborative sessions.

use appshare_common::{InstanceId, SessionId, SubscriberId, UserId};
use appshare_config::SessionsConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-session knobs, owner-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_participants: usize,
    /// When false, only pre-authorized users may join.
    pub allow_guests: bool,
    /// Advisory; surfaced to participants.
    pub recording: bool,
}

impl SessionSettings {
    pub fn from_config(config: &SessionsConfig) -> Self {
        Self {
            max_participants: config.max_participants,
            allow_guests: config.allow_guests,
            recording: false,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionsConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub user: UserId,
    pub joined_at: DateTime<Utc>,
    /// The participant's current frame subscription, once they have joined.
    #[serde(skip)]
    pub(crate) subscription: Option<SubscriberId>,
}

impl Participant {
    pub(crate) fn new(user: UserId) -> Self {
        Self {
            user,
            joined_at: Utc::now(),
            subscription: None,
        }
    }
}

/// A shared view of one instance.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub owner: UserId,
    pub target: InstanceId,
    /// In join order; the first entry inherits ownership.
    pub participants: Vec<Participant>,
    pub settings: SessionSettings,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) closed: bool,
}

impl Session {
    pub(crate) fn new(
        name: String,
        owner: UserId,
        target: InstanceId,
        settings: SessionSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            name,
            participants: vec![Participant::new(owner.clone())],
            owner,
            target,
            settings,
            created_at: now,
            last_activity: now,
            closed: false,
        }
    }

    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p.user == *user)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub(crate) fn position(&self, user: &UserId) -> Option<usize> {
        self.participants.iter().position(|p| p.user == *user)
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// A session as seen by one prospective joiner.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub can_join: bool,
}

/// Counts across every session the manager has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_participants: usize,
    /// Sessions created since start, including closed ones.
    pub total_sessions: u64,
}
