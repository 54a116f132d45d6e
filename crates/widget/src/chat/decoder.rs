use bytes::{Buf, BytesMut};

use crate::chat::events::{DATA_PREFIX, FRAME_DELIMITER};
use crate::chat::message::StreamMode;

const REPLACEMENT_CHARACTER: char = '\u{FFFD}';

/// Incremental UTF-8 decoder.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the rest
/// of it arrives. Bytes that can never form valid UTF-8 decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: BytesMut,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut output = String::with_capacity(self.pending.len());

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    output.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    output.push_str(
                        std::str::from_utf8(&self.pending[..valid_up_to]).unwrap_or_default(),
                    );
                    match error.error_len() {
                        Some(invalid_len) => {
                            output.push(REPLACEMENT_CHARACTER);
                            self.pending.advance(valid_up_to + invalid_len);
                        }
                        // Incomplete trailing sequence: keep it for the next chunk.
                        None => {
                            self.pending.advance(valid_up_to);
                            break;
                        }
                    }
                }
            }
        }

        output
    }

    /// Flushes the decoder at end of stream.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }

        tracing::debug!(
            pending_bytes = self.pending.len(),
            "stream ended inside a multi-byte sequence"
        );
        self.pending.clear();
        REPLACEMENT_CHARACTER.to_string()
    }
}

/// Splits decoded text into `\n\n`-delimited frames, keeping the incomplete
/// tail buffered.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut frames = Vec::new();
        while let Some(index) = self.buffer.find(FRAME_DELIMITER) {
            let rest = self.buffer.split_off(index + FRAME_DELIMITER.len());
            let mut frame = std::mem::replace(&mut self.buffer, rest);
            frame.truncate(index);
            frames.push(frame);
        }
        frames
    }

    /// Returns the trailing fragment left when the body ended without a
    /// final delimiter.
    pub fn finish(&mut self) -> Option<String> {
        let fragment = std::mem::take(&mut self.buffer);
        if fragment.trim().is_empty() {
            None
        } else {
            Some(fragment)
        }
    }
}

/// Decides how a body is framed from its first decoded text.
///
/// Stays undecided while the text could still grow into the data prefix.
pub fn detect_mode(head: &str, at_end: bool) -> Option<StreamMode> {
    if head.starts_with(DATA_PREFIX) {
        return Some(StreamMode::Framed);
    }
    if !at_end && DATA_PREFIX.starts_with(head) {
        return None;
    }
    Some(StreamMode::Raw)
}
