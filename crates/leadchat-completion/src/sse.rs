//! Incremental server-sent-events decoder.
//!
//! The transport delivers bytes in arbitrary chunks: a logical `data:` line
//! may arrive split across several reads, or several lines may arrive in
//! one. The decoder buffers raw bytes and only emits events for complete
//! lines, so callers never see a torn payload.

/// A decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line (everything after the prefix, trimmed).
    Data(String),
    /// The literal `data: [DONE]` terminator.
    Done,
}

/// Stateful line-reassembling decoder.
///
/// Feed it raw byte chunks as they arrive; it returns the events completed
/// by each chunk. Comment lines (leading `:`), blank lines and non-`data`
/// fields are skipped. CRLF line endings are tolerated.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            // Drop the newline and an optional preceding CR.
            let mut line = &line[..line.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }

            if let Some(event) = Self::parse_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a trailing unterminated line at end of stream.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line: Vec<u8> = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Self::parse_line(&line)
    }

    fn parse_line(line: &[u8]) -> Option<SseEvent> {
        let text = String::from_utf8_lossy(line);
        let text = text.as_ref();
        if text.trim().is_empty() || text.starts_with(':') {
            return None;
        }
        let payload = text.strip_prefix("data: ").or_else(|| {
            // "data:" with no space is also legal SSE.
            text.strip_prefix("data:")
        })?;
        let payload = payload.trim();
        if payload == "[DONE]" {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(payload.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> SseEvent {
        SseEvent::Data(s.to_string())
    }

    #[test]
    fn test_single_complete_event() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: {\"x\":1}\n");
        assert_eq!(events, vec![data("{\"x\":1}")]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"da").is_empty());
        assert!(dec.feed(b"ta: {\"x\"").is_empty());
        let events = dec.feed(b":1}\ndata: [DONE]\n");
        assert_eq!(events, vec![data("{\"x\":1}"), SseEvent::Done]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: a\ndata: b\n\ndata: c\n");
        assert_eq!(events, vec![data("a"), data("b"), data("c")]);
    }

    #[test]
    fn test_crlf_and_comments_tolerated() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b": keep-alive\r\ndata: x\r\n\r\n");
        assert_eq!(events, vec![data("x")]);
    }

    #[test]
    fn test_done_marker() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: [DONE]\n");
        assert_eq!(events, vec![SseEvent::Done]);
    }

    #[test]
    fn test_non_data_fields_skipped() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: ping\nid: 7\ndata: y\n");
        assert_eq!(events, vec![data("y")]);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: tail").is_empty());
        assert_eq!(dec.finish(), Some(data("tail")));
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn test_utf8_split_inside_multibyte_char() {
        let mut dec = SseDecoder::new();
        let bytes = "data: caf\u{e9}\n".as_bytes();
        // Split in the middle of the two-byte 'é'.
        let cut = bytes.len() - 2;
        assert!(dec.feed(&bytes[..cut]).is_empty());
        let events = dec.feed(&bytes[cut..]);
        assert_eq!(events, vec![data("caf\u{e9}")]);
    }
}
