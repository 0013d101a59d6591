//! Reporting sink for carve runs.
//!
//! The engine never prints. It hands progress and match events to a
//! [`CarveSink`] supplied by the caller, which decides how to present them.

use std::path::PathBuf;

/// Emitted after every chunk read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Cumulative bytes read from the input
    pub bytes_scanned: u64,
    /// Total input length, when the caller knew it
    pub bytes_total_hint: Option<u64>,
}

/// Emitted once an artifact is on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    /// Type tag of the matched signature
    pub type_tag: &'static str,
    /// Absolute stream offset of the header's first byte
    pub absolute_start_offset: u64,
    /// Absolute stream offset one past the footer's last byte
    pub absolute_end_offset: u64,
    /// Where the artifact was written
    pub output_path: PathBuf,
}

impl MatchEvent {
    /// Artifact length in bytes
    pub fn len(&self) -> u64 {
        self.absolute_end_offset - self.absolute_start_offset
    }

    /// Always false: a match holds at least a header and a footer
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiver for carve events.
///
/// Both methods default to doing nothing, so implementors only override what
/// they care about.
pub trait CarveSink {
    /// Called after each chunk read
    fn on_progress(&mut self, event: &ProgressEvent) {
        let _ = event;
    }

    /// Called after each artifact is written
    fn on_match(&mut self, event: &MatchEvent) {
        let _ = event;
    }
}

impl<S: CarveSink + ?Sized> CarveSink for &mut S {
    fn on_progress(&mut self, event: &ProgressEvent) {
        (**self).on_progress(event);
    }

    fn on_match(&mut self, event: &MatchEvent) {
        (**self).on_match(event);
    }
}

/// A sink that discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CarveSink for NullSink {}

/// A sink that keeps every event it receives
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    /// Progress events, in emission order
    pub progress: Vec<ProgressEvent>,
    /// Match events, in emission order
    pub matches: Vec<MatchEvent>,
}

impl RecordingSink {
    /// Creates an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl CarveSink for RecordingSink {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.progress.push(*event);
    }

    fn on_match(&mut self, event: &MatchEvent) {
        self.matches.push(event.clone());
    }
}
