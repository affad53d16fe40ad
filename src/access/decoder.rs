//! `STATUS:<VALUE>;` frame extraction from the raw serial byte stream.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::access::types::{AccessEvent, StatusKind};

/// End-of-frame byte
pub const FRAME_DELIMITER: u8 = b';';

pub const FRAME_PREFIX: &str = "STATUS:";

/// Longest candidate frame we will try to decode. The longest valid frame is
/// 13 bytes; anything past this is line noise.
pub const MAX_FRAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: {0:?}")]
    Malformed(String),

    #[error("Unknown status value: {0:?}")]
    UnknownStatus(String),

    #[error("Oversized frame ({0} bytes)")]
    Overflow(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub malformed_frames: u64,
    pub unknown_status: u64,
    pub overflowed_frames: u64,
    pub non_printable_dropped: u64,
}

/// Decode one delimiter-terminated candidate frame.
///
/// Bytes outside printable ASCII are dropped and surrounding spaces trimmed;
/// what remains must be exactly `STATUS:<VALUE>;`.
pub fn decode_frame(frame: &[u8]) -> Result<StatusKind, DecodeError> {
    let text = printable_ascii(frame);
    let text = text.trim_matches(' ');
    if text.len() > MAX_FRAME_LEN {
        return Err(DecodeError::Overflow(text.len()));
    }

    let value = text
        .strip_prefix(FRAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(FRAME_DELIMITER as char))
        .ok_or_else(|| DecodeError::Malformed(text.to_string()))?;

    StatusKind::from_wire(value).ok_or_else(|| DecodeError::UnknownStatus(value.to_string()))
}

fn printable_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| is_printable(**b))
        .map(|b| *b as char)
        .collect()
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// Accumulates bytes across reads and yields an event for every valid frame.
///
/// Frames need not line up with read boundaries: a trailing partial frame
/// stays buffered until its delimiter arrives. Only bytes that can take part
/// in a match are buffered: non-printable bytes and spaces ahead of a frame
/// are dropped on arrival, so `MAX_FRAME_LEN` bounds the frame text itself.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    // Set once the buffered text passes MAX_FRAME_LEN; input is dropped
    // through the next delimiter.
    discarding: bool,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly read bytes, stamping decoded events with the current time
    pub fn push_bytes(&mut self, raw: &[u8]) -> Vec<AccessEvent> {
        self.push_bytes_at(raw, Local::now())
    }

    /// Feed newly read bytes, stamping decoded events with `timestamp`
    pub fn push_bytes_at(&mut self, raw: &[u8], timestamp: DateTime<Local>) -> Vec<AccessEvent> {
        let mut events = Vec::new();

        for &byte in raw {
            if byte == FRAME_DELIMITER {
                if self.discarding {
                    self.discarding = false;
                    log::debug!("Dropped tail of oversized frame");
                } else if let Some(event) = self.finish_frame(timestamp) {
                    events.push(event);
                }
                continue;
            }

            if !is_printable(byte) {
                self.stats.non_printable_dropped += 1;
                continue;
            }
            if self.discarding || (self.buffer.is_empty() && byte == b' ') {
                continue;
            }

            self.buffer.push(byte);
            // Buffer excludes the delimiter, so at this length the frame
            // can no longer fit
            if self.buffer.len() >= MAX_FRAME_LEN {
                let err = DecodeError::Overflow(self.buffer.len() + 1);
                self.record_failure(&err);
                self.buffer.clear();
                self.discarding = true;
            }
        }

        events
    }

    fn finish_frame(&mut self, timestamp: DateTime<Local>) -> Option<AccessEvent> {
        let mut frame = std::mem::take(&mut self.buffer);
        frame.push(FRAME_DELIMITER);
        match decode_frame(&frame) {
            Ok(kind) => {
                self.stats.frames_decoded += 1;
                log::debug!("Decoded frame STATUS:{};", kind);
                Some(AccessEvent::new(kind, timestamp))
            }
            Err(e) => {
                self.record_failure(&e);
                None
            }
        }
    }

    fn record_failure(&mut self, err: &DecodeError) {
        match err {
            DecodeError::Malformed(_) => {
                self.stats.malformed_frames += 1;
                log::debug!("Discarding frame: {}", err);
            }
            DecodeError::UnknownStatus(_) => {
                self.stats.unknown_status += 1;
                log::warn!("Discarding frame: {}", err);
            }
            DecodeError::Overflow(_) => {
                self.stats.overflowed_frames += 1;
                log::warn!("Discarding frame: {}", err);
            }
        }
    }

    /// Frame text held back waiting for a delimiter
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Drop any partial frame, e.g. after a read fault
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_each_status() {
        assert_eq!(decode_frame(b"STATUS:OPEN;"), Ok(StatusKind::Open));
        assert_eq!(decode_frame(b"STATUS:WRONG;"), Ok(StatusKind::Wrong));
        assert_eq!(decode_frame(b"STATUS:LOCK;"), Ok(StatusKind::Lock));
    }

    #[test]
    fn test_decode_drops_control_bytes() {
        assert_eq!(decode_frame(b"\r\nSTATUS:\x00OPEN;"), Ok(StatusKind::Open));
        assert_eq!(decode_frame(b"  STATUS:LOCK;"), Ok(StatusKind::Lock));
    }

    #[test]
    fn test_decode_rejects_unknown_value() {
        assert_eq!(
            decode_frame(b"STATUS:FOO;"),
            Err(DecodeError::UnknownStatus("FOO".to_string()))
        );
        assert!(matches!(decode_frame(b"STATUS:open;"), Err(DecodeError::UnknownStatus(_))));
    }

    #[test]
    fn test_decode_rejects_bad_wrapping() {
        assert!(matches!(decode_frame(b"STATE:OPEN;"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_frame(b"xSTATUS:OPEN;"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_frame(b";"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_frame(b"STATUS:OPEN"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_partial_frame_stays_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_bytes(b"STATUS:OP").is_empty());
        assert_eq!(decoder.pending(), b"STATUS:OP");
        let events = decoder.push_bytes(b"EN;STATUS:");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), StatusKind::Open);
        assert_eq!(decoder.pending(), b"STATUS:");
    }

    #[test]
    fn test_failures_are_counted() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push_bytes(b"garbage;STATUS:FOO;STATUS:WRONG;");
        assert_eq!(events.len(), 1);
        let stats = decoder.stats();
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.malformed_frames, 1);
        assert_eq!(stats.unknown_status, 1);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_oversized_run_is_discarded_through_next_delimiter() {
        let mut decoder = FrameDecoder::new();
        let noise = vec![b'x'; MAX_FRAME_LEN + 1];
        assert!(decoder.push_bytes(&noise).is_empty());
        assert!(decoder.pending().is_empty());
        assert_eq!(decoder.stats().overflowed_frames, 1);

        // The rest of the oversized frame is dropped, the next one decodes
        let events = decoder.push_bytes(b"STATUS:OPEN;STATUS:LOCK;");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), StatusKind::Lock);
    }

    #[test]
    fn test_oversized_frame_in_one_chunk_is_rejected() {
        let mut decoder = FrameDecoder::new();
        let mut input = vec![b'x'; MAX_FRAME_LEN];
        input.extend_from_slice(b"STATUS:OPEN;STATUS:WRONG;");
        let events = decoder.push_bytes(&input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), StatusKind::Wrong);
        assert_eq!(decoder.stats().overflowed_frames, 1);
    }

    #[test]
    fn test_leading_control_bytes_do_not_count_toward_cap() {
        let mut decoder = FrameDecoder::new();
        let mut input = vec![b'\n'; 60];
        input.extend_from_slice(b"STATUS:OPEN;");
        let events = decoder.push_bytes(&input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), StatusKind::Open);
        assert_eq!(decoder.stats().overflowed_frames, 0);
        assert_eq!(decoder.stats().non_printable_dropped, 60);
    }

    #[test]
    fn test_space_run_then_frame_in_next_read() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_bytes(&[b' '; 70]).is_empty());
        assert!(decoder.pending().is_empty());
        let events = decoder.push_bytes(b"STATUS:LOCK;");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), StatusKind::Lock);
        assert_eq!(decoder.stats().overflowed_frames, 0);
    }

    #[test]
    fn test_decode_frame_caps_filtered_text() {
        let mut padded = vec![0u8; 40];
        padded.extend_from_slice(&[b' '; 40]);
        padded.extend_from_slice(b"STATUS:WRONG;");
        assert_eq!(decode_frame(&padded), Ok(StatusKind::Wrong));

        let long = format!("STATUS:{};", "X".repeat(MAX_FRAME_LEN));
        assert!(matches!(decode_frame(long.as_bytes()), Err(DecodeError::Overflow(_))));
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"STATUS:OP");
        decoder.reset();
        assert!(decoder.pending().is_empty());
        assert_eq!(decoder.push_bytes(b"STATUS:OPEN;").len(), 1);
    }
}
