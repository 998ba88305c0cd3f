//! Incremental decoder for `text/event-stream` bodies.

use std::time::Duration;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, `message` when the server did not name one
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Turns arbitrary body chunks into complete events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: String,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<Duration>,
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every event it completed.
    ///
    /// Lines may end in `\r\n`, `\n` or a lone `\r`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            // the previous line ended in '\r'; a '\n' right after it belongs to the same break
            if self.after_cr {
                match self.pending.first() {
                    Some(b'\n') => {
                        self.pending.remove(0);
                        self.after_cr = false;
                    }
                    Some(_) => self.after_cr = false,
                    None => break,
                }
            }

            let Some(pos) = self.pending.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            if line.pop() == Some(b'\r') {
                self.after_cr = true;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Reconnection delay most recently requested by the server.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        data.pop();
        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"message\":\"hi\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, r#"{"message":"hi"}"#);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: par").is_empty());
        assert!(decoder.feed(b"tial\r\n").is_empty());
        let events = decoder.feed(b"\r\ndata: next\n\n");
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["partial", "next"]);
    }

    #[test]
    fn comments_and_empty_frames_are_skipped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b": keep-alive\n\n\n").is_empty());
    }

    #[test]
    fn tracks_event_type_id_and_retry() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\nid: 7\nretry: 2500\ndata: x\n\ndata: y\n\n");
        assert_eq!(events[0].event, "ping");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].event, "message");
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(decoder.retry(), Some(Duration::from_millis(2500)));
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn utf8_split_inside_a_character() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: héllo\n\n".as_bytes();
        let (head, tail) = bytes.split_at(8);
        assert!(decoder.feed(head).is_empty());
        let events = decoder.feed(tail);
        assert_eq!(events[0].data, "héllo");
    }

    #[test]
    fn cr_only_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\r\rdata: b\r\r");
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);
        assert!(decoder.pending.is_empty());
    }

    #[test]
    fn crlf_split_across_chunks_is_one_line_break() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: x\r").is_empty());
        let events = decoder.feed(b"\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
        assert!(decoder.feed(b"\n").is_empty());
    }
}
