//! Wire codec shared by the tracker server and its clients.
//!
//! Every request and response is one frame:
//!
//! ```text
//! +------+-----------+----------------------+
//! | code | length    | body                 |
//! | u8   | u16 (BE)  | `length` bytes, JSON |
//! +------+-----------+----------------------+
//! ```
//!
//! Request bodies are JSON arrays of positional arguments. Response codes
//! repeat the request code with [`FLAG_RESPONSE`] set, plus [`FLAG_ERROR`]
//! when the body is an error descriptor.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 3;

/// Largest body the 16-bit length field can describe.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Set on every frame sent by the server.
pub const FLAG_RESPONSE: u8 = 0x80;

/// Set on responses whose body describes a failure.
pub const FLAG_ERROR: u8 = 0x40;

/// Operations understood by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    Declare = 0x01,
    Done = 0x02,
    Query = 0x03,
    Progress = 0x04,
}

impl Operation {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Operation {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Self::Declare),
            0x02 => Ok(Self::Done),
            0x03 => Ok(Self::Query),
            0x04 => Ok(Self::Progress),
            other => Err(ProtocolError::UnknownOperation(other)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Declare => "DECLARE",
            Self::Done => "DONE",
            Self::Query => "QUERY",
            Self::Progress => "PROGRESS",
        };
        write!(f, "{name}")
    }
}

/// Code of the reply to a request carrying `request_code`.
pub fn response_code(request_code: u8, failed: bool) -> u8 {
    let code = request_code | FLAG_RESPONSE;
    if failed {
        code | FLAG_ERROR
    } else {
        code
    }
}

/// Framing and body failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown request type: 0x{0:02x}")]
    UnknownOperation(u8),

    #[error("Frame body too large: {0} bytes (max 65535)")]
    BodyTooLarge(usize),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Request arguments must be a JSON array")]
    ArgumentsNotArray,

    #[error("Connection closed while reading frame")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err)
        }
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: u8,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(code: u8, body: Vec<u8>) -> Self {
        Self { code, body }
    }

    /// Build a frame whose body is `value` encoded as JSON.
    pub fn from_json<T: Serialize + ?Sized>(code: u8, value: &T) -> Result<Self, ProtocolError> {
        let body = serde_json::to_vec(value)?;
        if body.len() > MAX_BODY_LEN {
            return Err(ProtocolError::BodyTooLarge(body.len()));
        }
        Ok(Self { code, body })
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode a tracker response body without serde_json's nesting limit.
    ///
    /// Nested `tasks` snapshots need two JSON levels per task, so the default
    /// limit of 128 rejects trees past about 64 levels. The tracker caps
    /// snapshot depth, so only use this on bodies a tracker produced.
    pub fn response_json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let mut deserializer = serde_json::Deserializer::from_slice(&self.body);
        deserializer.disable_recursion_limit();
        let value = T::deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(value)
    }

    pub fn is_response(&self) -> bool {
        self.code & FLAG_RESPONSE != 0
    }

    pub fn is_error(&self) -> bool {
        self.code & FLAG_ERROR != 0
    }

    /// Request code this frame answers, with the reply flags stripped.
    pub fn request_code(&self) -> u8 {
        self.code & !(FLAG_RESPONSE | FLAG_ERROR)
    }

    /// Header followed by body, ready to be written to a socket.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let len = u16::try_from(self.body.len())
            .map_err(|_| ProtocolError::BodyTooLarge(self.body.len()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.body.len());
        bytes.push(self.code);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&self.body);
        Ok(bytes)
    }
}

/// Accumulates raw bytes read from a non-blocking socket and yields
/// complete frames as they become available.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.pending.len() < HEADER_LEN {
            return None;
        }

        let len = u16::from_be_bytes([self.pending[1], self.pending[2]]) as usize;
        if self.pending.len() < HEADER_LEN + len {
            return None;
        }

        let code = self.pending[0];
        let body = self.pending[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.pending.drain(..HEADER_LEN + len);

        Some(Frame { code, body })
    }
}

/// Write one frame to a blocking stream.
pub fn write_frame<W: Write>(stream: &mut W, frame: &Frame) -> Result<(), ProtocolError> {
    let bytes = frame.encode()?;
    stream.write_all(&bytes)?;
    stream.flush()?;
    Ok(())
}

/// Read one frame from a blocking stream.
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Frame, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header)?;

    let len = u16::from_be_bytes([header[1], header[2]]) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;

    Ok(Frame {
        code: header[0],
        body,
    })
}
