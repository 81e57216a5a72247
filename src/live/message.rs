//! Feed message types and text decoding.

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// A complete message received from (or injected into) the feed.
///
/// Text carries the decoded string; binary carries the raw bytes. Messages
/// are produced only by the receive loop or by explicit synthetic injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Decoded text message.
    Text(String),
    /// Raw binary message.
    Binary(Vec<u8>),
}

impl Message {
    /// Creates a text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Creates a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(data.into())
    }

    /// Returns true if this is a text message.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns true if this is a binary message.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Returns the text content if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Returns the binary content if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            Self::Text(_) => None,
        }
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Text decoding mode for inbound text payloads.
///
/// The payload of a text message is decoded once, as a whole, after frame
/// reassembly completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// Strict UTF-8; an invalid payload is rejected.
    Utf8,
    /// UTF-8 with replacement characters for invalid sequences.
    #[default]
    Utf8Lossy,
}

impl TextEncoding {
    /// Decodes an assembled payload into a string.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Decode` in strict mode when the payload is not
    /// valid UTF-8.
    pub fn decode(&self, bytes: Vec<u8>) -> Result<String, FeedError> {
        match self {
            Self::Utf8 => String::from_utf8(bytes).map_err(|e| FeedError::Decode {
                reason: format!("invalid UTF-8 payload: {e}"),
            }),
            Self::Utf8Lossy => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}
