//! Shared Output Buffer
//!
//! The transport's reader thread appends shell output through an
//! [`OutputSink`]; the poll loop reads consistent [`Snapshot`]s. Both sides
//! go through one mutex.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Decoded shell output plus the stream's lifecycle flags
#[derive(Debug, Default)]
pub struct OutputAccumulator {
    /// Decoded text since the last clear
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    /// The reader reached end of stream
    closed: bool,
    /// The shell process has exited
    exited: bool,
    exit_code: Option<u32>,
    /// First write or read failure reported by the transport
    transport_error: Option<String>,
}

/// Point-in-time copy of the accumulator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub text: String,
    pub closed: bool,
    pub exited: bool,
    pub exit_code: Option<u32>,
    pub transport_error: Option<String>,
}

impl OutputAccumulator {
    /// Append raw bytes, decoding as much complete UTF-8 as possible.
    /// Invalid sequences become U+FFFD.
    pub fn append(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = consumed + e.valid_up_to();
                    self.text.push_str(&String::from_utf8_lossy(
                        &self.pending[consumed..valid_up_to],
                    ));
                    match e.error_len() {
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    /// Drop accumulated text. Lifecycle flags are kept.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn mark_exited(&mut self, exit_code: Option<u32>) {
        self.exited = true;
        self.exit_code = exit_code;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.transport_error.is_none() {
            self.transport_error = Some(reason.into());
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the shell can still answer requests
    pub fn is_alive(&self) -> bool {
        !self.closed && !self.exited && self.transport_error.is_none()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            text: self.text.clone(),
            closed: self.closed,
            exited: self.exited,
            exit_code: self.exit_code,
            transport_error: self.transport_error.clone(),
        }
    }
}

/// Shared handle to an [`OutputAccumulator`]
pub type SharedOutput = Arc<Mutex<OutputAccumulator>>;

pub(crate) fn lock(output: &SharedOutput) -> MutexGuard<'_, OutputAccumulator> {
    // A panicking reader leaves the buffer usable
    output.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer side of the accumulator, handed to transports
#[derive(Debug, Clone)]
pub struct OutputSink {
    output: SharedOutput,
}

impl OutputSink {
    pub fn new(output: SharedOutput) -> Self {
        Self { output }
    }

    /// Sink over a fresh accumulator, returning both ends
    pub fn detached() -> (Self, SharedOutput) {
        let output = SharedOutput::default();
        (Self::new(Arc::clone(&output)), output)
    }

    pub fn push(&self, bytes: &[u8]) {
        lock(&self.output).append(bytes);
    }

    /// Record end of stream
    pub fn close(&self) {
        lock(&self.output).close();
    }

    pub fn mark_exited(&self, exit_code: Option<u32>) {
        lock(&self.output).mark_exited(exit_code);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        lock(&self.output).fail(reason);
    }

    pub fn is_exited(&self) -> bool {
        lock(&self.output).exited
    }
}
