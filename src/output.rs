//! Progress reporting for the bootstrap sequence.

use std::io::Write;
use std::sync::Mutex;

/// Receives human-readable progress lines in the order they happen.
pub trait OutputSink {
    /// Records a single progress message.
    fn output(&self, message: &str);
}

impl<T: OutputSink + ?Sized> OutputSink for &T {
    fn output(&self, message: &str) {
        (**self).output(message);
    }
}

/// Sink that writes one line per message to a writer such as stderr.
///
/// Write failures are ignored.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    target: Mutex<W>,
}

impl<W: Write> WriterSink<W> {
    /// Wraps `target`.
    #[must_use]
    pub const fn new(target: W) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }

    /// Returns the wrapped writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.target
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn output(&self, message: &str) {
        let mut target = self
            .target
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(target, "{message}").ok();
    }
}

/// Sink that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for RecordingSink {
    fn output(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_writes_one_line_per_message() {
        let sink = WriterSink::new(Vec::new());
        sink.output("first");
        sink.output("second");
        let rendered = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(rendered, "first\nsecond\n");
    }

    #[test]
    fn recording_sink_preserves_order() {
        let sink = RecordingSink::new();
        sink.output("a");
        sink.output("b");
        assert_eq!(sink.messages(), vec![String::from("a"), String::from("b")]);
    }
}
