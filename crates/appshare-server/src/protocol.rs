//! Client-facing wire protocol. Every message is one JSON object in a text
//! frame, tagged by `type`. Frames carry base64 JPEG.

use appshare_common::{
    ChannelTarget, CloseReason, EngineEvent, InstanceId, Rect, SessionId, UserId, WindowId,
};
use appshare_engine::{CaptureSettings, ChannelMessage, InputKind, PresetConfig, SessionSettings};
use appshare_layout::{LayoutKind, SnapZone};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// First message a client sends to identify itself.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientHello {
    #[serde(rename = "hello")]
    Hello { user: UserId },
}

/// Every message after the hello. `id` is echoed back in the reply.
#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub op: Operation,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    #[serde(rename = "list_applications")]
    ListApplications,

    #[serde(rename = "list_instances")]
    ListInstances {
        #[serde(default)]
        mine: bool,
    },

    #[serde(rename = "start")]
    Start { app: String },

    #[serde(rename = "stop")]
    Stop { instance_id: InstanceId },

    #[serde(rename = "status")]
    Status { instance_id: InstanceId },

    #[serde(rename = "windows")]
    Windows,

    #[serde(rename = "subscribe")]
    Subscribe { target: ChannelTarget },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { target: ChannelTarget },

    #[serde(rename = "capture_settings")]
    SetCaptureSettings {
        target: ChannelTarget,
        settings: CaptureSettings,
    },

    #[serde(rename = "channels")]
    Channels,

    #[serde(rename = "apply_layout")]
    ApplyLayout { layout: LayoutKind },

    #[serde(rename = "snap")]
    Snap { window: WindowId, zone: SnapZone },

    #[serde(rename = "snap_instance")]
    SnapInstance {
        instance_id: InstanceId,
        zone: SnapZone,
    },

    #[serde(rename = "resize_window")]
    ResizeWindow { window: WindowId, rect: Rect },

    #[serde(rename = "maximize_window")]
    MaximizeWindow { window: WindowId },

    #[serde(rename = "minimize_window")]
    MinimizeWindow { window: WindowId },

    #[serde(rename = "close_window")]
    CloseWindow { window: WindowId },

    #[serde(rename = "focus_window")]
    FocusWindow { window: WindowId },

    #[serde(rename = "save_layout_preset")]
    SaveLayoutPreset {
        name: String,
        #[serde(default)]
        preset: PresetConfig,
    },

    #[serde(rename = "apply_layout_preset")]
    ApplyLayoutPreset { name: String },

    #[serde(rename = "list_layout_presets")]
    ListLayoutPresets,

    #[serde(rename = "delete_layout_preset")]
    DeleteLayoutPreset { name: String },

    #[serde(rename = "input")]
    Input {
        instance_id: InstanceId,
        event: InputKind,
    },

    #[serde(rename = "create_session")]
    CreateSession {
        instance_id: InstanceId,
        #[serde(default)]
        name: String,
        #[serde(default)]
        settings: Option<SessionSettings>,
    },

    #[serde(rename = "join_session")]
    JoinSession { session_id: SessionId },

    #[serde(rename = "leave_session")]
    LeaveSession { session_id: SessionId },

    #[serde(rename = "close_session")]
    CloseSession { session_id: SessionId },

    #[serde(rename = "update_session")]
    UpdateSession {
        session_id: SessionId,
        settings: SessionSettings,
    },

    #[serde(rename = "list_sessions")]
    ListSessions,

    #[serde(rename = "my_session")]
    MySession,

    #[serde(rename = "session_stats")]
    SessionStats,

    #[serde(rename = "ping")]
    Ping,
}

/// Stream notices other than frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamStatus {
    Degraded { failures: usize },
    Recovered,
    Disconnected { reason: CloseReason },
    Closed { reason: CloseReason },
}

/// Messages the server sends to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome { user: UserId, version: &'static str },

    #[serde(rename = "reply")]
    Reply {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        data: serde_json::Value,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        code: &'static str,
        message: String,
    },

    #[serde(rename = "frame")]
    Frame {
        target: ChannelTarget,
        sequence: u64,
        width: u32,
        height: u32,
        data: String,
    },

    #[serde(rename = "stream")]
    Stream {
        target: ChannelTarget,
        #[serde(flatten)]
        status: StreamStatus,
    },

    #[serde(rename = "event")]
    Event { event: EngineEvent },

    #[serde(rename = "pong")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },
}

impl ServerMessage {
    pub fn error(id: Option<u64>, err: &RequestError) -> Self {
        ServerMessage::Error {
            id,
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn from_channel(target: &ChannelTarget, message: ChannelMessage) -> Self {
        let target = target.clone();
        let status = match message {
            ChannelMessage::Frame(frame) => {
                return ServerMessage::Frame {
                    target,
                    sequence: frame.sequence,
                    width: frame.width,
                    height: frame.height,
                    data: B64.encode(&frame.jpeg),
                };
            }
            ChannelMessage::Degraded { failures } => StreamStatus::Degraded { failures },
            ChannelMessage::Recovered => StreamStatus::Recovered,
            ChannelMessage::Disconnected(reason) => StreamStatus::Disconnected { reason },
            ChannelMessage::Closed(reason) => StreamStatus::Closed { reason },
        };
        ServerMessage::Stream { target, status }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","code":"internal","message":"failed to encode message: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appshare_engine::Frame;
    use std::sync::Arc;

    #[test]
    fn hello_parses() {
        let hello: ClientHello = serde_json::from_str(r#"{"type":"hello","user":"alice"}"#).unwrap();
        let ClientHello::Hello { user } = hello;
        assert_eq!(user, UserId::new("alice"));
    }

    #[test]
    fn request_id_is_optional() {
        let request: ClientRequest =
            serde_json::from_str(r#"{"type":"start","id":7,"app":"firefox"}"#).unwrap();
        assert_eq!(request.id, Some(7));
        assert!(matches!(request.op, Operation::Start { ref app } if app == "firefox"));

        let request: ClientRequest = serde_json::from_str(r#"{"type":"windows"}"#).unwrap();
        assert_eq!(request.id, None);
        assert!(matches!(request.op, Operation::Windows));
    }

    #[test]
    fn subscribe_targets_parse() {
        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"subscribe","target":{"kind":"instance","instance_id":"abc"}}"#,
        )
        .unwrap();
        match request.op {
            Operation::Subscribe { target } => {
                assert_eq!(target, ChannelTarget::Instance(InstanceId::from("abc")))
            }
            other => panic!("unexpected {other:?}"),
        }

        let request: ClientRequest =
            serde_json::from_str(r#"{"type":"subscribe","target":{"kind":"live_view"}}"#).unwrap();
        assert!(matches!(
            request.op,
            Operation::Subscribe {
                target: ChannelTarget::LiveView
            }
        ));
    }

    #[test]
    fn input_event_nests_under_event() {
        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"input","instance_id":"abc","event":{"type":"key","key":"Return"}}"#,
        )
        .unwrap();
        match request.op {
            Operation::Input { event, .. } => {
                assert!(matches!(event, InputKind::Key { ref key, .. } if key == "Return"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn layout_request_parses() {
        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"apply_layout","layout":{"kind":"grid","cols":2}}"#,
        )
        .unwrap();
        assert!(matches!(
            request.op,
            Operation::ApplyLayout {
                layout: LayoutKind::Grid {
                    rows: None,
                    cols: Some(2)
                }
            }
        ));
    }

    #[test]
    fn window_and_preset_requests_parse() {
        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"resize_window","window":12,"rect":{"x":0,"y":0,"width":640,"height":480}}"#,
        )
        .unwrap();
        assert!(matches!(
            request.op,
            Operation::ResizeWindow {
                window: WindowId(12),
                rect: Rect {
                    width: 640,
                    height: 480,
                    ..
                }
            }
        ));

        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"save_layout_preset","name":"coding","preset":{"tiling":{"kind":"tiled"}}}"#,
        )
        .unwrap();
        match request.op {
            Operation::SaveLayoutPreset { name, preset } => {
                assert_eq!(name, "coding");
                assert_eq!(preset.tiling, Some(LayoutKind::Tiled));
                assert!(preset.snaps.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientRequest>(r#"{"type":"format_disk"}"#).is_err());
    }

    #[test]
    fn frame_is_base64_jpeg() {
        let frame = Frame {
            sequence: 3,
            width: 2,
            height: 1,
            jpeg: vec![0xff, 0xd8, 0xff],
            captured_at: chrono::Utc::now(),
        };
        let message = ServerMessage::from_channel(
            &ChannelTarget::LiveView,
            ChannelMessage::Frame(Arc::new(frame)),
        );
        let json: serde_json::Value = serde_json::from_str(&message.to_json()).unwrap();
        assert_eq!(json["type"], "frame");
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["data"], "/9j/");
    }

    #[test]
    fn closed_stream_carries_reason() {
        let message = ServerMessage::from_channel(
            &ChannelTarget::LiveView,
            ChannelMessage::Closed(CloseReason::TargetNotRunning),
        );
        let json: serde_json::Value = serde_json::from_str(&message.to_json()).unwrap();
        assert_eq!(json["type"], "stream");
        assert_eq!(json["status"], "closed");
        assert_eq!(json["reason"], "target_not_running");
        assert_eq!(json["target"]["kind"], "live_view");
    }
}
