//! Per-subscriber bounded frame queue.

use appshare_common::{ChannelTarget, CloseReason, SubscriberId};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// One encoded frame, shared by every subscriber of a channel.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Starts at 1 and increases by one per delivered frame.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    Frame(Arc<Frame>),
    /// Captures keep failing; frames may pause.
    Degraded { failures: usize },
    Recovered,
    /// This subscriber was removed; the channel carries on.
    Disconnected(CloseReason),
    /// The channel itself was torn down.
    Closed(CloseReason),
}

impl ChannelMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Closed(_))
    }
}

struct QueueState {
    items: VecDeque<ChannelMessage>,
    closed: bool,
    consecutive_drops: u32,
}

/// Producer side. Overflow drops the oldest queued frame; control
/// messages are never dropped.
pub(crate) struct SubscriberQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
    consumer_gone: AtomicBool,
    last_sequence: AtomicU64,
}

impl SubscriberQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                consecutive_drops: 0,
            }),
            notify: Notify::new(),
            consumer_gone: AtomicBool::new(false),
            last_sequence: AtomicU64::new(0),
        }
    }

    /// Queue a frame. Returns how many pushes in a row had to drop a frame.
    pub async fn push_frame(&self, frame: Arc<Frame>) -> u32 {
        let mut state = self.state.lock().await;
        if state.closed {
            return 0;
        }
        let frames = state
            .items
            .iter()
            .filter(|m| matches!(m, ChannelMessage::Frame(_)))
            .count();
        if frames >= self.capacity {
            if let Some(oldest) = state
                .items
                .iter()
                .position(|m| matches!(m, ChannelMessage::Frame(_)))
            {
                state.items.remove(oldest);
            }
            state.consecutive_drops += 1;
        } else {
            state.consecutive_drops = 0;
        }
        state.items.push_back(ChannelMessage::Frame(frame));
        let drops = state.consecutive_drops;
        drop(state);
        self.notify.notify_one();
        drops
    }

    pub async fn push_control(&self, message: ChannelMessage) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.items.push_back(message);
        drop(state);
        self.notify.notify_one();
    }

    /// Enqueue a terminal message; nothing is accepted afterwards.
    pub async fn close(&self, message: ChannelMessage) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.items.push_back(message);
        drop(state);
        self.notify.notify_one();
    }

    pub fn consumer_gone(&self) -> bool {
        self.consumer_gone.load(Ordering::SeqCst)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }
}

/// Consumer side of one subscription. Dropping it marks the subscriber as
/// gone; the channel removes it on its next delivery.
pub struct Subscription {
    id: SubscriberId,
    target: ChannelTarget,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, target: ChannelTarget, queue: Arc<SubscriberQueue>) -> Self {
        Self { id, target, queue }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn target(&self) -> &ChannelTarget {
        &self.target
    }

    /// Sequence number of the last frame handed out by [`recv`](Self::recv).
    pub fn last_sequence(&self) -> u64 {
        self.queue.last_sequence()
    }

    /// Next message, or `None` once the terminal message has been consumed.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        loop {
            let notified = self.queue.notify.notified();
            {
                let mut state = self.queue.state.lock().await;
                if let Some(message) = state.items.pop_front() {
                    if let ChannelMessage::Frame(frame) = &message {
                        self.queue
                            .last_sequence
                            .store(frame.sequence, Ordering::SeqCst);
                    }
                    return Some(message);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.consumer_gone.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish()
    }
}
