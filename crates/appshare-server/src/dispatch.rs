//! Maps client operations onto the engine and tracks what a connection
//! holds so it can be released on disconnect.

use std::collections::{HashMap, HashSet};

use appshare_common::{ChannelTarget, SessionId, SubscriberId, UserId};
use appshare_engine::{Engine, InputEvent, Subscription};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RequestError;
use crate::protocol::{ClientRequest, Operation, ServerMessage};

struct Stream {
    subscriber: SubscriberId,
    forwarder: JoinHandle<()>,
}

/// Per-connection view of the engine.
pub struct ConnectionState {
    user: UserId,
    out: mpsc::Sender<String>,
    streams: HashMap<ChannelTarget, Stream>,
    sessions: HashSet<SessionId>,
}

impl ConnectionState {
    pub fn new(user: UserId, out: mpsc::Sender<String>) -> Self {
        Self {
            user,
            out,
            streams: HashMap::new(),
            sessions: HashSet::new(),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Parse one text frame and produce the message to send back.
    pub async fn respond(&mut self, engine: &Engine, text: &str) -> ServerMessage {
        let request: ClientRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(user = %self.user, error = %e, "malformed request");
                return ServerMessage::error(None, &RequestError::Malformed(e.to_string()));
            }
        };
        let id = request.id;
        if matches!(request.op, Operation::Ping) {
            return ServerMessage::Pong { id };
        }
        match self.handle(engine, request.op).await {
            Ok(data) => ServerMessage::Reply { id, data },
            Err(e) => {
                tracing::debug!(user = %self.user, code = e.code(), error = %e, "request failed");
                ServerMessage::error(id, &e)
            }
        }
    }

    async fn handle(&mut self, engine: &Engine, op: Operation) -> Result<Value, RequestError> {
        self.streams.retain(|_, s| !s.forwarder.is_finished());
        let user = self.user.clone();

        match op {
            Operation::ListApplications => to_value(engine.available_applications().await),
            Operation::ListInstances { mine } => {
                to_value(engine.list_instances(mine.then_some(&user)).await)
            }
            Operation::Start { app } => to_value(engine.start(&app, &user).await?),
            Operation::Stop { instance_id } => {
                let snapshot = engine.stop(&instance_id, &user).await?;
                self.streams.remove(&ChannelTarget::Instance(instance_id));
                to_value(snapshot)
            }
            Operation::Status { instance_id } => to_value(engine.status(&instance_id).await?),
            Operation::Windows => to_value(engine.windows().await?),
            Operation::Subscribe { target } => {
                let subscription = engine.subscribe(target.clone(), &user).await?;
                let subscriber = subscription.id().clone();
                self.attach(engine, subscription).await;
                Ok(json!({ "target": target, "subscriber_id": subscriber }))
            }
            Operation::Unsubscribe { target } => {
                let removed = match self.streams.remove(&target) {
                    Some(stream) => engine.unsubscribe(&target, &stream.subscriber).await,
                    None => false,
                };
                Ok(json!({ "unsubscribed": removed }))
            }
            Operation::SetCaptureSettings { target, settings } => {
                engine.set_capture_settings(&target, settings).await?;
                Ok(Value::Null)
            }
            Operation::Channels => to_value(engine.channels().await),
            Operation::ApplyLayout { layout } => to_value(engine.apply_layout(layout).await?),
            Operation::Snap { window, zone } => to_value(engine.snap(window, zone).await?),
            Operation::SnapInstance { instance_id, zone } => {
                to_value(engine.snap_instance(&instance_id, zone).await?)
            }
            Operation::ResizeWindow { window, rect } => {
                to_value(engine.resize_window(window, rect, &user).await?)
            }
            Operation::MaximizeWindow { window } => {
                to_value(engine.maximize_window(window, &user).await?)
            }
            Operation::MinimizeWindow { window } => {
                engine.minimize_window(window, &user).await?;
                Ok(Value::Null)
            }
            Operation::CloseWindow { window } => {
                engine.close_window(window, &user).await?;
                Ok(Value::Null)
            }
            Operation::FocusWindow { window } => {
                engine.focus_window(window, &user).await?;
                Ok(Value::Null)
            }
            Operation::SaveLayoutPreset { name, preset } => {
                to_value(engine.save_layout_preset(&name, preset).await?)
            }
            Operation::ApplyLayoutPreset { name } => {
                to_value(engine.apply_layout_preset(&name).await?)
            }
            Operation::ListLayoutPresets => to_value(engine.layout_presets().await),
            Operation::DeleteLayoutPreset { name } => {
                engine.delete_layout_preset(&name).await?;
                Ok(Value::Null)
            }
            Operation::Input { instance_id, event } => {
                engine
                    .submit_input(InputEvent {
                        target: instance_id,
                        submitter: user,
                        kind: event,
                    })
                    .await?;
                Ok(Value::Null)
            }
            Operation::CreateSession {
                instance_id,
                name,
                settings,
            } => {
                let session = engine
                    .create_session(&user, &name, &instance_id, settings)
                    .await?;
                self.sessions.insert(session.id.clone());
                to_value(session)
            }
            Operation::JoinSession { session_id } => {
                let (session, subscription) = engine.join_session(&session_id, &user).await?;
                self.attach(engine, subscription).await;
                self.sessions.insert(session_id);
                to_value(session)
            }
            Operation::LeaveSession { session_id } => {
                let target = engine.session(&session_id).await?.target;
                let remaining = engine.leave_session(&session_id, &user).await?;
                self.sessions.remove(&session_id);
                self.streams.remove(&ChannelTarget::Instance(target));
                to_value(remaining)
            }
            Operation::CloseSession { session_id } => {
                engine.close_session(&session_id, &user).await?;
                self.sessions.remove(&session_id);
                Ok(Value::Null)
            }
            Operation::UpdateSession {
                session_id,
                settings,
            } => to_value(
                engine
                    .update_session_settings(&session_id, &user, settings)
                    .await?,
            ),
            Operation::ListSessions => to_value(engine.list_sessions(&user).await),
            Operation::MySession => to_value(engine.user_session(&user).await?),
            Operation::SessionStats => to_value(engine.session_stats().await),
            Operation::Ping => Ok(Value::Null),
        }
    }

    /// Start forwarding `subscription` to the client, replacing any earlier
    /// stream for the same target.
    async fn attach(&mut self, engine: &Engine, subscription: Subscription) {
        let target = subscription.target().clone();
        let stream = Stream {
            subscriber: subscription.id().clone(),
            forwarder: forward(subscription, self.out.clone()),
        };
        if let Some(previous) = self.streams.insert(target.clone(), stream) {
            previous.forwarder.abort();
            engine.unsubscribe(&target, &previous.subscriber).await;
        }
    }

    /// Drop every stream and leave every session this connection joined.
    pub async fn release(&mut self, engine: &Engine) {
        for (target, stream) in self.streams.drain() {
            stream.forwarder.abort();
            engine.unsubscribe(&target, &stream.subscriber).await;
        }
        for session_id in self.sessions.drain() {
            if let Err(e) = engine.leave_session(&session_id, &self.user).await {
                tracing::debug!(session_id = %session_id, error = %e, "leave on disconnect failed");
            }
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RequestError> {
    Ok(serde_json::to_value(value)?)
}

/// Relay channel messages to the connection's outbound queue until the
/// stream ends or the connection goes away.
fn forward(mut subscription: Subscription, out: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let target = subscription.target().clone();
        while let Some(message) = subscription.recv().await {
            let terminal = message.is_terminal();
            let json = ServerMessage::from_channel(&target, message).to_json();
            if out.send(json).await.is_err() || terminal {
                break;
            }
        }
    })
}
