//! Wire protocol
//!
//! Inbound: a raw byte stream split into `\n`-terminated lines by
//! [`LineBuffer`]. Outbound: [`ServerMessage`] values encoded as
//! `<= `-prefixed lines followed by a `=> ` input prompt.

use crate::error::ProtocolError;

/// Prefix of every server-to-client text line
pub const NOTICE_PREFIX: &str = "<= ";

/// Input prompt written after a batch of notices
pub const PROMPT: &str = "=> ";

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Chat or system text; may span several lines
    Notice(String),
    /// Re-display the input prompt without any text
    Prompt,
    /// Last text the client receives before the connection closes
    Farewell(String),
}

impl ServerMessage {
    /// Text carried by the message, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            ServerMessage::Notice(text) | ServerMessage::Farewell(text) => Some(text),
            ServerMessage::Prompt => None,
        }
    }
}

/// Encode a batch of queued messages for the socket
///
/// Each line of text is prefixed with [`NOTICE_PREFIX`] and ends in `\r\n`.
/// A single [`PROMPT`] closes the batch unless it ends with a farewell.
pub fn encode_batch(messages: &[ServerMessage]) -> String {
    let mut out = String::new();

    for msg in messages {
        if let Some(text) = msg.text() {
            for line in text.lines() {
                out.push_str(NOTICE_PREFIX);
                out.push_str(line);
                out.push_str("\r\n");
            }
        }
    }

    if !matches!(messages.last(), Some(ServerMessage::Farewell(_))) {
        out.push_str(PROMPT);
    }

    out
}

/// Per-client accumulator for partial input lines
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    /// Create a buffer that refuses lines longer than `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Append raw bytes and extract every completed line
    ///
    /// The `\n` terminator and a preceding `\r` are stripped. Incomplete
    /// trailing data stays buffered for the next read. Lines completed
    /// before an overlong one are still returned alongside the error; the
    /// buffer is emptied once the limit is hit.
    pub fn push(&mut self, bytes: &[u8]) -> (Vec<String>, Option<ProtocolError>) {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.len() > self.limit {
                return (lines, Some(self.overflow()));
            }

            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        // A trailing `\r` may still be the first half of a terminator
        let partial = match self.pending.last() {
            Some(b'\r') => self.pending.len() - 1,
            _ => self.pending.len(),
        };
        if partial > self.limit {
            return (lines, Some(self.overflow()));
        }

        (lines, None)
    }

    fn overflow(&mut self) -> ProtocolError {
        self.pending.clear();
        ProtocolError::LineTooLong { limit: self.limit }
    }

    /// Discard any partially typed input
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
