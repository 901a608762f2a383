//! Extraction of complete JSON messages from an unbounded byte stream.
//!
//! The transport gives us arbitrary-sized chunks with no message boundary
//! information. A frame starts at the first `{` in the buffer and ends when
//! brace nesting depth returns to zero. Braces inside quoted string values
//! are NOT distinguished from structural ones; this is a known limitation
//! of the protocol, kept as-is.

use log::warn;
use serde::de::DeserializeOwned;

#[derive(Debug, Default)]
pub struct MessageFramer {
    buf: Vec<u8>,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw chunk from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extracts the next complete frame, if one exists, and erases it
    /// (plus any leading garbage) from the buffer.
    pub fn next_frame(&mut self) -> Option<String> {
        let start = match self.buf.iter().position(|&b| b == b'{') {
            Some(i) => i,
            None => {
                // Nothing in the buffer can start a frame.
                self.buf.clear();
                return None;
            }
        };

        let mut depth: u32 = 0;
        for i in start..self.buf.len() {
            match self.buf[i] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let frame = String::from_utf8_lossy(&self.buf[start..=i]).into_owned();
                        self.buf.drain(..=i);
                        return Some(frame);
                    }
                }
                _ => {}
            }
        }

        // Incomplete frame; leave the remainder buffered.
        None
    }

    /// Decodes every complete frame currently buffered, in arrival order.
    /// A frame that fails to parse is dropped and scanning continues; a
    /// single bad message never costs the connection.
    pub fn drain_messages<T: DeserializeOwned>(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(frame) = self.next_frame() {
            match serde_json::from_str::<T>(&frame) {
                Ok(msg) => out.push(msg),
                Err(e) => warn!("Dropping malformed message: {} ({})", frame, e),
            }
        }
        out
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}
