//! Protocol frames and their encodings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of a frame.
///
/// Serialized as a plain string; kinds other than the two time frames are
/// carried through as [`FrameKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameKind {
    /// Request for the remote peer's time
    TimeRequest,
    /// Reply carrying the remote peer's time as payload
    TimeResponse,
    /// Application-defined frame kind
    Other(String),
}

impl FrameKind {
    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TimeRequest => "TIME_REQUEST",
            Self::TimeResponse => "TIME_RESPONSE",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for FrameKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "TIME_REQUEST" => Self::TimeRequest,
            "TIME_RESPONSE" => Self::TimeResponse,
            _ => Self::Other(kind),
        }
    }
}

impl From<FrameKind> for String {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol message.
///
/// `frame_id` is assigned by the sender from its own sequence, so it is only
/// unique per `(from, frame_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Sender-local sequence number
    pub frame_id: u64,
    /// Frame id of the request this frame answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
    /// Sender peer id
    pub from: String,
    /// Receiver peer id
    pub to: String,
    /// Frame kind
    pub kind: FrameKind,
    /// Payload (the remote time on `TIME_RESPONSE`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Frame {
    /// Create a time request.
    #[must_use]
    pub fn time_request(frame_id: u64, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            frame_id,
            reply_to: None,
            from: from.into(),
            to: to.into(),
            kind: FrameKind::TimeRequest,
            payload: None,
        }
    }

    /// Create the response to `request`, carrying `now_ms` as payload.
    #[must_use]
    pub fn time_response(
        frame_id: u64,
        from: impl Into<String>,
        request: &Frame,
        now_ms: i64,
    ) -> Self {
        Self {
            frame_id,
            reply_to: Some(request.frame_id),
            from: from.into(),
            to: request.from.clone(),
            kind: FrameKind::TimeResponse,
            payload: Some(Value::from(now_ms)),
        }
    }

    /// Whether this frame answers an earlier request.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Whether the sender waits for a reply to this frame.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        !self.is_reply() && self.kind == FrameKind::TimeRequest
    }

    /// The payload as a remote time reading, if it is numeric.
    #[must_use]
    pub fn remote_time(&self) -> Option<f64> {
        self.payload.as_ref().and_then(Value::as_f64)
    }

    /// Validate the shape of an untyped frame and convert it.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] if the value is not an object, if
    /// `frameId` or `kind` are missing or ill-typed, if `replyTo` is present
    /// but not a frame id, or if any other field does not match.
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let Value::Object(fields) = &value else {
            return Err(FrameError::Malformed("frame is not an object".to_string()));
        };

        match fields.get("frameId") {
            None => return Err(FrameError::Malformed("missing frameId".to_string())),
            Some(id) if !id.is_u64() => {
                return Err(FrameError::Malformed(format!("invalid frameId: {id}")));
            }
            Some(_) => {}
        }

        match fields.get("kind") {
            None => return Err(FrameError::Malformed("missing kind".to_string())),
            Some(Value::String(_)) => {}
            Some(kind) => return Err(FrameError::Malformed(format!("invalid kind: {kind}"))),
        }

        match fields.get("replyTo") {
            None | Some(Value::Null) => {}
            Some(id) if id.is_u64() => {}
            Some(id) => return Err(FrameError::Malformed(format!("invalid replyTo: {id}"))),
        }

        serde_json::from_value(value).map_err(|e| FrameError::Malformed(e.to_string()))
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(self).map_err(|e| FrameError::Serialize(e.to_string()))
    }

    /// Deserialize and validate JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not JSON or the frame is malformed.
    pub fn from_json(bytes: &[u8]) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| FrameError::Deserialize(e.to_string()))?;
        Self::from_value(value)
    }

    /// Serialize to CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>, FrameError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| FrameError::Serialize(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize and validate CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not CBOR or the frame is malformed.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, FrameError> {
        let value: Value =
            ciborium::from_reader(bytes).map_err(|e| FrameError::Deserialize(e.to_string()))?;
        Self::from_value(value)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// Frame encoding on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// JSON objects
    #[default]
    Json,
    /// CBOR maps
    Cbor,
}

impl Codec {
    /// Encode a frame.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn encode(self, frame: &Frame) -> Result<Vec<u8>, FrameError> {
        match self {
            Self::Json => frame.to_json(),
            Self::Cbor => frame.to_cbor(),
        }
    }

    /// Decode and validate a frame.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be decoded or the frame is malformed.
    pub fn decode(self, bytes: &[u8]) -> Result<Frame, FrameError> {
        match self {
            Self::Json => Frame::from_json(bytes),
            Self::Cbor => Frame::from_cbor(bytes),
        }
    }
}

impl FromStr for Codec {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "cbor" => Ok(Self::Cbor),
            other => Err(FrameError::UnknownCodec(other.to_string())),
        }
    }
}

/// Errors for frame validation and encoding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    /// The frame does not have the expected shape
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialize(String),
    /// Deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialize(String),
    /// Unknown codec name
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
}
