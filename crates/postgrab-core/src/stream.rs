//! Streamed progress/result decoder
//!
//! The parser service answers a batch with an event stream: UTF-8 frames
//! separated by a blank line, each carrying one `data: <json>` line.
//!
//! ```text
//! data: {"type":"progress","current":1,"total":3}
//!
//! data: {"type":"done","notes":[...],"failed":[...]}
//! ```
//!
//! Chunk boundaries are arbitrary, so the decoder buffers bytes until a
//! separator arrives. Frames that don't parse are dropped.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::debug;

use crate::models::{ParseFailure, ParsedNote};

/// Frame separator on the wire
const FRAME_SEPARATOR: &[u8] = b"\n\n";

/// Prefix of the payload line inside a frame
const DATA_PREFIX: &str = "data:";

/// One decoded event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParseEvent {
    /// Batch progress, `current` of `total` URLs handled
    Progress { current: u64, total: u64 },
    /// Final result set for the batch
    Done {
        #[serde(default)]
        notes: Vec<ParsedNote>,
        #[serde(default)]
        failed: Vec<ParseFailure>,
    },
}

/// Incremental frame decoder
///
/// Push chunks as they arrive and drain whatever events became complete.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    events: VecDeque<ParseEvent>,
    discarded: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and decode every frame it completes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(pos) = find_separator(&self.buffer[start..]) {
            let end = start + pos;
            match decode_frame(&self.buffer[start..end]) {
                Some(event) => self.events.push_back(event),
                None => self.discarded += 1,
            }
            start = end + FRAME_SEPARATOR.len();
        }

        self.buffer.drain(..start);
    }

    /// Take the events decoded so far, in wire order
    pub fn drain(&mut self) -> impl Iterator<Item = ParseEvent> + '_ {
        self.events.drain(..)
    }

    /// Signal end of stream
    ///
    /// A trailing frame without a separator is decoded as if it were complete.
    pub fn finish(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let rest = std::mem::take(&mut self.buffer);
        match decode_frame(&rest) {
            Some(event) => self.events.push_back(event),
            None => self.discarded += 1,
        }
    }

    /// Number of frames dropped as malformed
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Bytes waiting for a separator
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode a single frame
///
/// Returns `None` for anything that is not a valid `data:` event.
pub fn decode_frame(frame: &[u8]) -> Option<ParseEvent> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(e) => {
            debug!("Discarding frame with invalid UTF-8: {}", e);
            return None;
        }
    };

    let payload = text
        .lines()
        .find_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .filter(|payload| !payload.is_empty());

    let Some(payload) = payload else {
        if !text.trim().is_empty() {
            debug!("Discarding frame without data line");
        }
        return None;
    };

    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Discarding malformed frame: {}", e);
            None
        }
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_SEPARATOR.len())
        .position(|window| window == FRAME_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRESS: &str = "data: {\"type\":\"progress\",\"current\":1,\"total\":3}\n\n";
    const DONE: &str = "data: {\"type\":\"done\",\"notes\":[],\"failed\":[]}\n\n";

    fn expected() -> Vec<ParseEvent> {
        vec![
            ParseEvent::Progress { current: 1, total: 3 },
            ParseEvent::Done {
                notes: vec![],
                failed: vec![],
            },
        ]
    }

    fn decode_all(chunks: &[&[u8]]) -> Vec<ParseEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            decoder.push(chunk);
            events.extend(decoder.drain());
        }
        decoder.finish();
        events.extend(decoder.drain());
        events
    }

    #[test]
    fn test_whole_stream() {
        let wire = format!("{}{}", PROGRESS, DONE);
        assert_eq!(decode_all(&[wire.as_bytes()]), expected());
    }

    #[test]
    fn test_every_split_offset_decodes_the_same() {
        let wire = format!("{}{}", PROGRESS, DONE);
        let bytes = wire.as_bytes();
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected(), "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let wire = format!("{}{}", PROGRESS, DONE);
        let chunks: Vec<&[u8]> = wire.as_bytes().chunks(1).collect();
        assert_eq!(decode_all(&chunks), expected());
    }

    #[test]
    fn test_multibyte_characters_split_across_chunks() {
        let wire = "data: {\"type\":\"done\",\"notes\":[{\"url\":\"https://xhslink.com/p\",\"title\":\"早餐\"}],\"failed\":[]}\n\n";
        let bytes = wire.as_bytes();
        let cut = wire.find('早').unwrap() + 1;
        let events = decode_all(&[&bytes[..cut], &bytes[cut..]]);
        match &events[..] {
            [ParseEvent::Done { notes, .. }] => assert_eq!(notes[0].title, "早餐"),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_frame_without_separator() {
        let wire = format!("{}{}", PROGRESS, DONE.trim_end());
        let mut decoder = StreamDecoder::new();
        decoder.push(wire.as_bytes());
        assert_eq!(decoder.drain().count(), 1);
        assert!(decoder.pending_len() > 0);

        decoder.finish();
        let rest: Vec<_> = decoder.drain().collect();
        assert_eq!(rest, vec![expected().remove(1)]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_malformed_frames_are_skipped() {
        let wire = format!(
            "{}data: {{not json}}\n\n: keep-alive comment\n\ndata: {{\"type\":\"bogus\"}}\n\n{}",
            PROGRESS, DONE
        );
        let mut decoder = StreamDecoder::new();
        decoder.push(wire.as_bytes());
        let events: Vec<_> = decoder.drain().collect();
        assert_eq!(events, expected());
        assert_eq!(decoder.discarded(), 3);
    }

    #[test]
    fn test_invalid_utf8_frame_is_skipped() {
        let mut decoder = StreamDecoder::new();
        decoder.push(b"data: \xff\xfe\n\n");
        decoder.push(PROGRESS.as_bytes());
        let events: Vec<_> = decoder.drain().collect();
        assert_eq!(events, vec![ParseEvent::Progress { current: 1, total: 3 }]);
        assert_eq!(decoder.discarded(), 1);
    }

    #[test]
    fn test_data_line_after_other_fields() {
        let frame = b"event: message\ndata:{\"type\":\"progress\",\"current\":2,\"total\":2}";
        assert_eq!(
            decode_frame(frame),
            Some(ParseEvent::Progress { current: 2, total: 2 })
        );
    }

    #[test]
    fn test_done_with_results() {
        let frame = br#"data: {"type":"done","notes":[{"id":"a","url":"https://xhslink.com/a","title":"A"}],"failed":[{"url":"https://xhslink.com/b","error":"timeout"}]}"#;
        match decode_frame(frame) {
            Some(ParseEvent::Done { notes, failed }) => {
                assert_eq!(notes.len(), 1);
                assert_eq!(notes[0].id, "a");
                assert_eq!(failed[0].error, "timeout");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_done_keeps_notes_with_loose_store_fields() {
        let mut decoder = StreamDecoder::new();
        decoder.push(br#"data: {"type":"done","notes":[{"id":"x","url":"https://xhslink.com/a","createdAt":1700000000000.0,"coverImage":null},{"url":"https://xhslink.com/b","isDeleted":null,"title":null}],"failed":[]}"#);
        decoder.finish();

        let events: Vec<_> = decoder.drain().collect();
        assert_eq!(decoder.discarded(), 0);
        match events.as_slice() {
            [ParseEvent::Done { notes, .. }] => {
                assert_eq!(notes.len(), 2);
                assert_eq!(notes[0].id, "x");
                assert_eq!(notes[1].url, "https://xhslink.com/b");
                assert!(notes[1].title.is_empty());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_stream() {
        assert!(decode_all(&[]).is_empty());
    }
}
