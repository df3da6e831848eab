//! Incremental server-sent-events decoder.
//!
//! Bytes arrive in arbitrary network chunks. Lines are split on `\n` at the
//! byte level so a multi-byte character cut by a chunk boundary is never
//! decoded early. Only `data:` fields matter here; other fields and
//! comments are ignored.

/// Accumulates bytes and yields complete event payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: String,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every event completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        // Only the new bytes can hold a newline that was not seen before.
        let mut scan = self.buffer.len();
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[scan..].iter().position(|b| *b == b'\n') {
            let end = scan + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            self.process_line(line.trim_end_matches('\r'), &mut events);
            start = end + 1;
            scan = start;
        }
        self.buffer.drain(..start);
        events
    }

    /// Flush at end of stream. A trailing event without a blank line is
    /// still delivered.
    pub fn finish(&mut self) -> Option<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.process_line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events.pop()
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if self.has_data {
            events.push(std::mem::take(&mut self.data));
            self.has_data = false;
        }
    }
}
