//! JSON codec for hubcast frames.
//!
//! Inbound frames are classified without re-serializing the payload, and
//! malformed input is reported as a value rather than a panic: callers log
//! the error, drop the frame, and keep the connection open.

use bytes::Bytes;
use thiserror::Error;

use crate::frames::{ChatEvent, ServerFrame, TYPE_JOIN, TYPE_MESSAGE, TYPE_PRIVATE_MESSAGE};

/// Maximum accepted frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors produced while classifying or encoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame exceeds [`MAX_FRAME_SIZE`].
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Frame is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but not an object.
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// The `type` discriminator is missing or not a string.
    #[error("Missing `type` discriminator")]
    MissingType,

    /// The `type` discriminator names no known frame kind.
    #[error("Unknown frame type: {0}")]
    UnknownType(String),

    /// A required field is missing or not a string.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A `JOIN` frame carrying an empty username.
    #[error("Empty username in JOIN frame")]
    EmptyUsername,
}

/// Classify a raw inbound frame.
///
/// Chat frames keep `raw` untouched so downstream persistence and fan-out
/// stay byte-for-byte identical to what the client sent.
///
/// # Errors
///
/// Returns a [`FrameError`] describing why the frame was rejected.
pub fn decode(raw: &Bytes) -> Result<ChatEvent, FrameError> {
    if raw.len() > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge(raw.len()));
    }

    let value: serde_json::Value = serde_json::from_slice(raw)?;
    let object = value.as_object().ok_or(FrameError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(FrameError::MissingType)?;

    match kind {
        TYPE_JOIN => {
            let username = object
                .get("username")
                .and_then(|v| v.as_str())
                .ok_or(FrameError::MissingField("username"))?;

            if username.is_empty() {
                return Err(FrameError::EmptyUsername);
            }

            Ok(ChatEvent::Join {
                username: username.to_string(),
            })
        }

        TYPE_MESSAGE => Ok(ChatEvent::Chat { raw: raw.clone() }),

        TYPE_PRIVATE_MESSAGE => {
            let to_session = object
                .get("toSession")
                .and_then(|v| v.as_str())
                .ok_or(FrameError::MissingField("toSession"))?;

            Ok(ChatEvent::Private {
                to_session: to_session.to_string(),
                raw: raw.clone(),
            })
        }

        other => Err(FrameError::UnknownType(other.to_string())),
    }
}

/// Encode a server frame to wire bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(frame: &ServerFrame) -> Result<Bytes, FrameError> {
    let data = serde_json::to_vec(frame)?;
    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{PresenceKind, RosterEntry};

    #[test]
    fn test_decode_join() {
        let raw = Bytes::from(r#"{"type":"JOIN","username":"alice"}"#);
        let event = decode(&raw).unwrap();
        assert_eq!(
            event,
            ChatEvent::Join {
                username: "alice".into()
            }
        );
    }

    #[test]
    fn test_decode_join_rejects_empty_username() {
        let raw = Bytes::from(r#"{"type":"JOIN","username":""}"#);
        assert!(matches!(decode(&raw), Err(FrameError::EmptyUsername)));

        let raw = Bytes::from(r#"{"type":"JOIN"}"#);
        assert!(matches!(
            decode(&raw),
            Err(FrameError::MissingField("username"))
        ));
    }

    #[test]
    fn test_decode_message_keeps_raw_bytes() {
        let raw = Bytes::from(r#"{"type":"MESSAGE","from":"alice","body":"hi there"}"#);
        let event = decode(&raw).unwrap();

        match event {
            ChatEvent::Chat { raw: kept } => assert_eq!(kept, raw),
            other => panic!("Expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_private_message() {
        let raw = Bytes::from(r#"{"type":"PRIVATE_MESSAGE","toSession":"conn_9","body":"psst"}"#);
        let event = decode(&raw).unwrap();

        match event {
            ChatEvent::Private { to_session, raw: kept } => {
                assert_eq!(to_session, "conn_9");
                assert_eq!(kept, raw);
            }
            other => panic!("Expected Private, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_private_message_requires_target() {
        let raw = Bytes::from(r#"{"type":"PRIVATE_MESSAGE","body":"psst"}"#);
        assert!(matches!(
            decode(&raw),
            Err(FrameError::MissingField("toSession"))
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        let raw = Bytes::from(r#"{"type":"BOGUS"}"#);
        match decode(&raw) {
            Err(FrameError::UnknownType(kind)) => assert_eq!(kind, "BOGUS"),
            other => panic!("Expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_malformed_input() {
        assert!(matches!(
            decode(&Bytes::from("not json at all")),
            Err(FrameError::Json(_))
        ));
        assert!(matches!(
            decode(&Bytes::from(r#"[1,2,3]"#)),
            Err(FrameError::NotAnObject)
        ));
        assert!(matches!(
            decode(&Bytes::from(r#"{"username":"alice"}"#)),
            Err(FrameError::MissingType)
        ));
        assert!(matches!(
            decode(&Bytes::from(r#"{"type":42}"#)),
            Err(FrameError::MissingType)
        ));
    }

    #[test]
    fn test_decode_frame_too_large() {
        let body = "x".repeat(MAX_FRAME_SIZE + 1);
        let raw = Bytes::from(body);
        assert!(matches!(decode(&raw), Err(FrameError::FrameTooLarge(_))));
    }

    #[test]
    fn test_encode_users_frame() {
        let frame = ServerFrame::users(
            vec![
                RosterEntry::new("conn_1", "alice"),
                RosterEntry::new("conn_2", "bob"),
            ],
            PresenceKind::Left,
            "carol",
        );

        let encoded = encode(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(value["type"], "USERS");
        assert_eq!(value["users"].as_array().unwrap().len(), 2);
        assert_eq!(value["message"], "carol left the chat.");
    }
}
