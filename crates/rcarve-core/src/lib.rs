//! # rcarve-core
//!
//! A streaming, signature-based file carving engine.
//!
//! Given a raw byte stream such as a disk image, this crate finds embedded
//! files of known types by matching a header pattern followed by a footer
//! pattern, and writes each match out as a standalone file. No filesystem
//! metadata is parsed.
//!
//! ## Architecture
//!
//! - [`registry`]: the static table of header/footer signatures
//! - [`carver`]: the bounded-memory streaming carver and its reporting sink
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use rcarve_core::{carve_file, CarverConfig, RecordingSink};
//!
//! let mut sink = RecordingSink::new();
//! let summary = carve_file("disk.img", "./recovered", &["jpg", "pdf"], CarverConfig::new(), &mut sink)?;
//!
//! for event in &sink.matches {
//!     println!("{} at {} -> {}", event.type_tag, event.absolute_start_offset, event.output_path.display());
//! }
//! println!("{} files from {} bytes", summary.files_written, summary.bytes_scanned);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Memory
//!
//! Peak buffer use is bounded by the largest `max_span` among the selected
//! signatures plus one chunk, independent of the input size.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod carver;
pub mod error;
pub mod registry;

// Re-export primary types for convenience
pub use carver::{
    artifact_path, carve_file, CancelFlag, CarveResult, CarveSink, CarveSummary, Carver,
    CarverConfig, MatchEvent, NullSink, ProgressCounter, ProgressEvent, RecordingSink,
    DEFAULT_CHUNK_SIZE,
};
pub use error::{CarveFailure, Error, ErrorKind, Result};
pub use registry::{Signature, SignatureRegistry};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
