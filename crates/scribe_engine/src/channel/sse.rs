use crate::{ChannelError, ChannelFailure};

const DEFAULT_EVENT_NAME: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across chunks decode correctly. `id` and `retry` fields are
/// ignored; reconnection is not this decoder's business.
/// Frames completed by one chunk. A decoding failure ends the batch; frames
/// before it are still returned so they can be delivered first.
#[derive(Debug, Default)]
pub(crate) struct SseBatch {
    pub frames: Vec<SseFrame>,
    pub error: Option<ChannelError>,
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn feed(&mut self, chunk: &[u8]) -> SseBatch {
        self.buffer.extend_from_slice(chunk);
        let mut batch = SseBatch::default();
        let mut start = 0;

        while let Some(offset) = self.buffer[start..]
            .iter()
            .position(|byte| *byte == b'\n' || *byte == b'\r')
        {
            let end = start + offset;
            let terminator_len = if self.buffer[end] == b'\r' {
                match self.buffer.get(end + 1) {
                    Some(b'\n') => 2,
                    Some(_) => 1,
                    // Need the next byte to tell CR from CRLF.
                    None => break,
                }
            } else {
                1
            };

            let line = match std::str::from_utf8(&self.buffer[start..end]) {
                Ok(line) => line.to_string(),
                Err(err) => {
                    batch.error = Some(ChannelError::new(
                        ChannelFailure::Malformed,
                        err.to_string(),
                    ));
                    break;
                }
            };
            start = end + terminator_len;

            if let Some(frame) = self.process_line(&line) {
                batch.frames.push(frame);
            }
        }

        self.buffer.drain(..start);
        batch
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
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
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
        })
    }
}
