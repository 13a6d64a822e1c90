//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only the parts of the format the progress endpoint uses are honoured:
//! `data:` and `event:` fields, `:` comments and blank-line dispatch.
//! `id:` and `retry:` are accepted and ignored since the client never
//! reconnects.

/// Upper bound for a single line and for the data buffered for one message.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SseError {
    #[error("event stream message exceeds {MAX_MESSAGE_BYTES} bytes")]
    MessageTooLarge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a body chunk and returns every message it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseMessage>, SseError> {
        let mut out = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let line = self.take_line();
                if let Some(msg) = self.process_line(&line)? {
                    out.push(msg);
                }
            } else {
                if self.line.len() >= MAX_MESSAGE_BYTES {
                    return Err(SseError::MessageTooLarge);
                }
                self.line.push(byte);
            }
        }
        Ok(out)
    }

    /// Flushes a message left without a terminating blank line.
    pub fn finish(&mut self) -> Result<Option<SseMessage>, SseError> {
        if !self.line.is_empty() {
            let line = self.take_line();
            if let Some(msg) = self.process_line(&line)? {
                return Ok(Some(msg));
            }
        }
        Ok(self.dispatch())
    }

    fn take_line(&mut self) -> String {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }

    fn process_line(&mut self, line: &str) -> Result<Option<SseMessage>, SseError> {
        if line.is_empty() {
            return Ok(self.dispatch());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data_len += value.len() + 1;
                if self.data_len > MAX_MESSAGE_BYTES {
                    return Err(SseError::MessageTooLarge);
                }
                self.data.push(value.to_owned());
            }
            "event" => self.event = Some(value.to_owned()),
            _ => {}
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        self.data_len = 0;
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_of(msgs: &[SseMessage]) -> Vec<&str> {
        msgs.iter().map(|m| m.data.as_str()).collect()
    }

    #[test]
    fn decodes_data_only_frames() {
        let mut dec = SseDecoder::new();
        let msgs = dec
            .feed(b"data: {\"stage\": \"init\"}\n\ndata: {\"stage\": \"emotion\"}\n\n")
            .unwrap();
        assert_eq!(
            data_of(&msgs),
            vec!["{\"stage\": \"init\"}", "{\"stage\": \"emotion\"}"]
        );
        assert_eq!(dec.finish().unwrap(), None);
    }

    #[test]
    fn handles_chunk_boundaries_inside_lines() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"da").unwrap().is_empty());
        assert!(dec.feed(b"ta: {\"stage\":").unwrap().is_empty());
        assert!(dec.feed(b" \"tts\"}\n").unwrap().is_empty());
        let msgs = dec.feed(b"\n").unwrap();
        assert_eq!(data_of(&msgs), vec!["{\"stage\": \"tts\"}"]);
    }

    #[test]
    fn crlf_comments_and_event_names() {
        let mut dec = SseDecoder::new();
        let msgs = dec
            .feed(b": keep-alive\r\n\r\nevent: progress\r\ndata: x\r\nid: 7\r\n\r\n")
            .unwrap();
        assert_eq!(
            msgs,
            vec![SseMessage {
                event: Some("progress".to_owned()),
                data: "x".to_owned(),
            }]
        );
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut dec = SseDecoder::new();
        let msgs = dec.feed(b"data: first\ndata:second\n\n").unwrap();
        assert_eq!(data_of(&msgs), vec!["first\nsecond"]);
    }

    #[test]
    fn trailing_message_flushed_on_finish() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: {\"stage\":\"done\"}").unwrap().is_empty());
        let msg = dec.finish().unwrap().expect("flushed");
        assert_eq!(msg.data, "{\"stage\":\"done\"}");
        assert_eq!(dec.finish().unwrap(), None);
    }

    #[test]
    fn utf8_split_across_chunks_survives() {
        let text = "data: ✅ Processing complete\n\n".as_bytes();
        let mut dec = SseDecoder::new();
        assert!(dec.feed(&text[..8]).unwrap().is_empty());
        let msgs = dec.feed(&text[8..]).unwrap();
        assert_eq!(data_of(&msgs), vec!["✅ Processing complete"]);
    }

    #[test]
    fn endless_line_is_rejected() {
        let mut dec = SseDecoder::new();
        let chunk = vec![b'x'; 4096];
        let mut fed = 0;
        let err = loop {
            match dec.feed(&chunk) {
                Ok(msgs) => assert!(msgs.is_empty()),
                Err(e) => break e,
            }
            fed += chunk.len();
            assert!(fed <= MAX_MESSAGE_BYTES, "cap never hit");
        };
        assert_eq!(err, SseError::MessageTooLarge);
    }

    #[test]
    fn oversized_multi_line_message_is_rejected() {
        let mut dec = SseDecoder::new();
        let line = format!("data: {}\n", "y".repeat(1024));
        let mut result = Ok(Vec::new());
        for _ in 0..=MAX_MESSAGE_BYTES / 1024 {
            result = dec.feed(line.as_bytes());
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(SseError::MessageTooLarge));
    }

    #[test]
    fn size_budget_resets_after_each_message() {
        let mut dec = SseDecoder::new();
        let frame = format!("data: {}\n\n", "z".repeat(MAX_MESSAGE_BYTES / 2));
        for _ in 0..4 {
            assert_eq!(dec.feed(frame.as_bytes()).unwrap().len(), 1);
        }
    }
}
