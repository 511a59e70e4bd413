use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::{InstanceId, SessionId, SubscriberId, UserId};
use crate::types::{ChannelTarget, InstanceState};

/// Why a capture channel stopped delivering frames to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The subscriber unsubscribed itself.
    Unsubscribed,
    /// The subscriber could not keep up and was dropped.
    SlowConsumer,
    /// The target instance left the Running state.
    TargetNotRunning,
    /// The last subscriber left.
    NoSubscribers,
    /// Engine shutdown.
    Shutdown,
}

/// Lifecycle events published by the engine. Transport layers subscribe to
/// this bus to surface terminal states to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    InstanceStateChanged {
        instance_id: InstanceId,
        app: String,
        state: InstanceState,
    },
    InstanceCrashed {
        instance_id: InstanceId,
        app: String,
        restart_count: u32,
        terminal: bool,
    },
    InstanceResourceExceeded {
        instance_id: InstanceId,
        detail: String,
    },
    ChannelOpened {
        target: ChannelTarget,
    },
    ChannelClosed {
        target: ChannelTarget,
        reason: CloseReason,
    },
    ChannelDegraded {
        target: ChannelTarget,
        failures: usize,
    },
    ChannelRecovered {
        target: ChannelTarget,
    },
    SubscriberDropped {
        target: ChannelTarget,
        subscriber_id: SubscriberId,
        reason: CloseReason,
    },
    SessionCreated {
        session_id: SessionId,
        owner: UserId,
    },
    SessionClosed {
        session_id: SessionId,
    },
    ParticipantJoined {
        session_id: SessionId,
        user: UserId,
    },
    ParticipantLeft {
        session_id: SessionId,
        user: UserId,
    },
    OwnershipTransferred {
        session_id: SessionId,
        from: UserId,
        to: UserId,
    },
    LayoutApplied {
        kind: String,
        windows: usize,
    },
    Shutdown,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of receivers the event reached.
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
