//! Streaming carver.
//!
//! [`Carver::carve`] reads an input stream in fixed-size chunks and writes
//! every header..footer match of the selected signatures to its own file.
//!
//! ## Algorithm Overview
//!
//! 1. Append the next chunk to the working buffer
//! 2. For each selected signature, search headers left to right and look for
//!    the footer within `max_span` bytes of each header
//! 3. Write each match to `out_dir/NNNNNN.<tag>` and report it
//! 4. A header whose footer window is not yet fully buffered stays undecided
//!    and pins the buffer until more data arrives
//! 5. Trim everything no signature still needs, then read the next chunk
//!
//! Headers still undecided when the stream ends are dropped silently.
//!
//! ## Example
//!
//! ```no_run
//! use rcarve_core::{Carver, NullSink, SignatureRegistry};
//! use std::fs::File;
//!
//! let registry = SignatureRegistry::builtin();
//! let image = File::open("disk.img")?;
//! let summary = Carver::new(&registry)
//!     .carve(image, None, "./recovered", &["jpg", "png"], NullSink)?;
//! println!("recovered {} files", summary.files_written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod control;
mod sink;
mod state;

use crate::error::{CarveFailure, Error, Result};
use crate::registry::SignatureRegistry;
use state::ScanState;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use control::{CancelFlag, ProgressCounter};
pub use sink::{CarveSink, MatchEvent, NullSink, ProgressEvent, RecordingSink};

/// Default read size per chunk (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Outcome of a carve run, complete or partial
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarveSummary {
    /// Artifacts written to the output directory
    pub files_written: u64,
    /// Bytes read from the input
    pub bytes_scanned: u64,
    /// Largest size the working buffer reached
    pub peak_buffer_bytes: usize,
}

/// Result of a carve run
pub type CarveResult = std::result::Result<CarveSummary, CarveFailure>;

/// Configuration for the carver
#[derive(Debug, Clone)]
pub struct CarverConfig {
    /// Bytes requested from the input per read
    pub chunk_size: usize,
    /// Replace artifacts that already exist instead of failing
    pub overwrite: bool,
    /// Counter updated after every chunk
    pub progress: Option<ProgressCounter>,
    /// Checked before every chunk read
    pub cancel: Option<CancelFlag>,
}

impl Default for CarverConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overwrite: false,
            progress: None,
            cancel: None,
        }
    }
}

impl CarverConfig {
    /// Creates a new carver config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Allows replacing existing artifacts
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Publishes bytes scanned to `counter`
    pub fn progress(mut self, counter: ProgressCounter) -> Self {
        self.progress = Some(counter);
        self
    }

    /// Stops the run once `flag` is set
    pub fn cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be greater than zero"));
        }
        Ok(())
    }
}

/// Signature carver over a shared registry
#[derive(Debug, Clone)]
pub struct Carver<'r> {
    registry: &'r SignatureRegistry,
    config: CarverConfig,
}

impl<'r> Carver<'r> {
    /// Creates a carver with default configuration
    pub fn new(registry: &'r SignatureRegistry) -> Self {
        Self::with_config(registry, CarverConfig::default())
    }

    /// Creates a carver with custom configuration
    pub fn with_config(registry: &'r SignatureRegistry, config: CarverConfig) -> Self {
        Self { registry, config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &CarverConfig {
        &self.config
    }

    /// Carves `input` into `out_dir`, looking for the `selected` types only.
    ///
    /// `length_hint` is passed through to progress events. On failure the
    /// returned [`CarveFailure`] holds the summary of what was already
    /// written; those artifacts are left on disk.
    pub fn carve<R, P, T, K>(
        &self,
        mut input: R,
        length_hint: Option<u64>,
        out_dir: P,
        selected: &[T],
        mut sink: K,
    ) -> CarveResult
    where
        R: Read,
        P: AsRef<Path>,
        T: AsRef<str>,
        K: CarveSink,
    {
        let out_dir = out_dir.as_ref();
        self.config.validate().map_err(CarveFailure::preflight)?;
        let signatures = self
            .registry
            .select(selected)
            .map_err(CarveFailure::preflight)?;
        let mut state = ScanState::new(signatures).map_err(CarveFailure::preflight)?;
        fs::create_dir_all(out_dir)
            .map_err(|e| CarveFailure::preflight(Error::directory_create(out_dir, e)))?;

        debug!(
            "Starting carve into {} for [{}]",
            out_dir.display(),
            state.tags().collect::<Vec<_>>().join(", ")
        );

        let mut files_written = 0u64;

        loop {
            if self.is_cancelled() {
                debug!("Carve cancelled after {} bytes", state.bytes_consumed());
                return Err(failure(&state, files_written, Error::Cancelled));
            }

            let read = state
                .fill(&mut input, self.config.chunk_size)
                .map_err(|e| failure(&state, files_written, e))?;
            if read == 0 {
                break;
            }

            let bytes_scanned = state.bytes_consumed();
            if let Some(progress) = &self.config.progress {
                progress.set(bytes_scanned);
            }
            sink.on_progress(&ProgressEvent {
                bytes_scanned,
                bytes_total_hint: length_hint,
            });

            let scanned = state.scan(|ordinal, found, bytes| {
                let path = artifact_path(out_dir, ordinal, found.type_tag);
                write_artifact(&path, bytes, self.config.overwrite)?;
                files_written += 1;

                debug!(
                    "Recovered {} at offset {} ({} bytes) -> {}",
                    found.type_tag,
                    found.absolute_start_offset,
                    bytes.len(),
                    path.display()
                );
                sink.on_match(&MatchEvent {
                    type_tag: found.type_tag,
                    absolute_start_offset: found.absolute_start_offset,
                    absolute_end_offset: found.absolute_end_offset,
                    output_path: path,
                });
                Ok(())
            });
            if let Err(e) = scanned {
                return Err(failure(&state, files_written, e));
            }

            state.trim();

            if let Some(e) = state.take_read_error() {
                debug!("Input failed after {} bytes", state.bytes_consumed());
                return Err(failure(&state, files_written, e));
            }
        }

        let summary = summarize(&state, files_written);
        debug!(
            "Carve complete: {} files from {} bytes, {} undecided headers dropped",
            summary.files_written,
            summary.bytes_scanned,
            state.undecided()
        );
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancel
            .as_ref()
            .map(CancelFlag::is_cancelled)
            .unwrap_or(false)
    }
}

fn summarize(state: &ScanState<'_>, files_written: u64) -> CarveSummary {
    CarveSummary {
        files_written,
        bytes_scanned: state.bytes_consumed(),
        peak_buffer_bytes: state.peak_buffer_bytes(),
    }
}

fn failure(state: &ScanState<'_>, files_written: u64, error: Error) -> CarveFailure {
    CarveFailure::new(summarize(state, files_written), error)
}

/// Output path for the `ordinal`-th artifact of a run
pub fn artifact_path(out_dir: &Path, ordinal: u64, type_tag: &str) -> PathBuf {
    out_dir.join(format!("{:06}.{}", ordinal, type_tag))
}

/// Write one artifact, refusing to clobber unless `overwrite` is set
fn write_artifact(path: &Path, bytes: &[u8], overwrite: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).map_err(|e| Error::file_write(path, e))?;
    write_contents(path, file, bytes)
}

/// Fill a freshly opened artifact, removing it again if the write fails so
/// no truncated file is left behind
fn write_contents<W: Write>(path: &Path, mut out: W, bytes: &[u8]) -> Result<()> {
    match out.write_all(bytes).and_then(|()| out.flush()) {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(out);
            if let Err(cleanup) = fs::remove_file(path) {
                warn!("Failed to remove partial file {}: {}", path.display(), cleanup);
            }
            Err(Error::file_write(path, e))
        }
    }
}

/// Carve a file or device with the built-in signatures
///
/// This is a convenience function that opens the source read-only and uses
/// its length as the progress total.
pub fn carve_file<T, K>(
    path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    types: &[T],
    config: CarverConfig,
    sink: K,
) -> CarveResult
where
    T: AsRef<str>,
    K: CarveSink,
{
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|e| CarveFailure::preflight(Error::file_open(path, e)))?;
    // block devices report zero
    let length_hint = file
        .metadata()
        .ok()
        .map(|m| m.len())
        .filter(|&len| len > 0);

    let registry = SignatureRegistry::builtin();
    Carver::with_config(&registry, config).carve(file, length_hint, out_dir, types, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_carver_config_builder() {
        let flag = CancelFlag::new();
        let config = CarverConfig::new()
            .chunk_size(4096)
            .overwrite(true)
            .cancel(flag.clone());

        assert_eq!(config.chunk_size, 4096);
        assert!(config.overwrite);
        assert!(config.progress.is_none());
        assert!(config.cancel.is_some());
    }

    #[test]
    fn test_artifact_path() {
        let path = artifact_path(Path::new("/out"), 7, "jpg");
        assert_eq!(path, PathBuf::from("/out/000007.jpg"));
        let path = artifact_path(Path::new("/out"), 1_234_567, "zip");
        assert_eq!(path, PathBuf::from("/out/1234567.zip"));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let registry = SignatureRegistry::builtin();
        let temp_dir = TempDir::new().unwrap();
        let carver = Carver::with_config(&registry, CarverConfig::new().chunk_size(0));
        let err = carver
            .carve(Cursor::new(Vec::<u8>::new()), None, temp_dir.path(), &["jpg"], NullSink)
            .unwrap_err();
        assert!(matches!(err.error, Error::InvalidConfig(_)));
        assert_eq!(err.summary, CarveSummary::default());
    }

    #[test]
    fn test_empty_input() {
        let registry = SignatureRegistry::builtin();
        let temp_dir = TempDir::new().unwrap();
        let mut sink = RecordingSink::new();
        let summary = Carver::new(&registry)
            .carve(Cursor::new(Vec::<u8>::new()), Some(0), temp_dir.path(), &["jpg"], &mut sink)
            .unwrap();
        assert_eq!(summary.files_written, 0);
        assert_eq!(summary.bytes_scanned, 0);
        assert!(sink.progress.is_empty());
    }

    #[test]
    fn test_existing_artifact_is_not_clobbered() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("000001.jpg");
        fs::write(&path, b"keep").unwrap();

        let err = write_artifact(&path, b"new", false).unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"keep");

        write_artifact(&path, b"new", true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_failed_write_removes_partial_file() {
        struct DiskFull;
        impl Write for DiskFull {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("000001.jpg");
        fs::write(&path, b"").unwrap();

        let err = write_contents(&path, DiskFull, b"payload").unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert!(!path.exists());

        write_contents(&path, Vec::new(), b"payload").unwrap();
    }
}
