//! Incremental Server-Sent Events decoding.
//!
//! Cloud chat endpoints stream completions as `text/event-stream` bodies.
//! [`SseDecoder`] accepts raw body chunks — which may split lines at any
//! byte — and yields one [`SseFrame`] per complete event.

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the server sent one.
    pub event: Option<String>,
    /// Joined `data:` payload lines.
    pub data: String,
}

impl SseFrame {
    /// Whether this frame is the `[DONE]` sentinel that closes an
    /// OpenAI-style completion stream.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Incremental SSE decoder with internal line buffering.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current, not-yet-terminated line.
    pending: String,
    /// `event:` value of the frame being assembled.
    event: Option<String>,
    /// `data:` lines of the frame being assembled.
    data: Vec<String>,
}

impl SseDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk, returning every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.truncate(pos);
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(frame) = self.take_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush the frame still being assembled when the stream ends.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            if let Some(frame) = self.take_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.emit()
    }

    /// Consume one line; a blank line closes the current frame.
    fn take_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.emit();
        }
        // Lines starting with ':' are comments (keep-alive pings).
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            // A field name with no colon has an empty value; nothing we use.
            None => return None,
        };
        match field {
            "data" => self.data.push(value.to_owned()),
            "event" => self.event = Some(value.to_owned()),
            _ => {}
        }
        None
    }

    /// Close the current frame if it has any data.
    fn emit(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}
