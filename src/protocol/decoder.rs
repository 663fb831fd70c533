//! Incremental frame decoder.
//!
//! Network chunks may split a frame (or a UTF-8 sequence) anywhere, so bytes
//! are buffered until a full delimiter arrives and only complete frames are
//! decoded.

use super::{Frame, DATA_PREFIX, FRAME_DELIMITER};
use tracing::{debug, warn};

/// Buffering parser turning raw response bytes into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completes, in order.
    ///
    /// Malformed frames are logged and dropped; the rest of the buffer is
    /// unaffected.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            if let Some(frame) = parse_block(&block[..pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
            self.buffer.clear();
            return None;
        }
        let block = std::mem::take(&mut self.buffer);
        parse_block(&block)
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_DELIMITER.len())
        .position(|w| w == FRAME_DELIMITER)
}

fn parse_block(block: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(block);

    let payload: Vec<&str> = text
        .lines()
        .filter_map(|line| line.trim().strip_prefix(DATA_PREFIX))
        .map(|value| value.trim_start())
        .collect();

    if payload.is_empty() {
        // keep-alive comments and blank blocks
        debug!("Skipping non-data block ({} bytes)", block.len());
        return None;
    }

    match serde_json::from_str::<Frame>(&payload.join("\n")) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            None
        }
    }
}
