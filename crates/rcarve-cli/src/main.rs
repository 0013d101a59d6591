//! rcarve - Recover files from raw disk images by header/footer signatures
//!
//! This tool streams a disk image, device or arbitrary file through the
//! carving engine and writes every recognised file to an output directory.
//! Work on an image or clone of a failing drive, never the drive itself.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use rcarve_core::{
    carve_file, CarveSink, CarveSummary, CarverConfig, MatchEvent, ProgressEvent,
    SignatureRegistry, DEFAULT_CHUNK_SIZE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Recover files from raw disk images by header/footer signatures
#[derive(Parser, Debug)]
#[command(name = "rcarve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output directory for recovered files
    #[arg(short, long, default_value = "./recovered")]
    output: PathBuf,

    /// Comma separated file types to carve (default: all known types)
    #[arg(short, long, value_delimiter = ',')]
    types: Vec<String>,

    /// Bytes read per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Overwrite existing files in the output directory
    #[arg(long)]
    force: bool,

    /// Print a BLAKE3 digest for every recovered file
    #[arg(long)]
    hash: bool,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a disk image, device or file to carve
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory; every file below it is carved separately
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// List the known file types and exit
    #[arg(long)]
    list_types: bool,
}

/// Presents carve events on the terminal
struct TerminalSink {
    bar: ProgressBar,
    hash: bool,
}

impl TerminalSink {
    fn new(source: &Path, quiet: bool, hash: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(progress_style());
            bar
        };
        bar.set_message(format!(
            "Scanning {}",
            source.file_name().unwrap_or(source.as_os_str()).to_string_lossy()
        ));
        Self { bar, hash }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl CarveSink for TerminalSink {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if let Some(total) = event.bytes_total_hint {
            self.bar.set_length(total);
        }
        self.bar.set_position(event.bytes_scanned);
    }

    fn on_match(&mut self, event: &MatchEvent) {
        let mut line = format!(
            "Recovered {} at offset {} -> {}",
            event.type_tag.to_uppercase(),
            event.absolute_start_offset,
            event.output_path.display()
        );
        if self.hash {
            match hash_file(&event.output_path) {
                Ok(digest) => line.push_str(&format!(" [blake3 {}]", digest)),
                Err(e) => warn!("Failed to hash {}: {:#}", event.output_path.display(), e),
            }
        }
        self.bar.println(line);
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let registry = SignatureRegistry::builtin();

    if cli.input.list_types {
        list_types(&registry);
        return Ok(());
    }

    let types = resolve_types(&cli.types, &registry)?;

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file, &types)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory, &types)
    } else {
        bail!("One of --file, --directory or --list-types must be given")
    }
}

fn list_types(registry: &SignatureRegistry) {
    for signature in registry.iter() {
        println!(
            "{:<6} header {:<18} footer {:<18} max {} MiB",
            signature.tag(),
            hex(signature.header()),
            hex(signature.footer()),
            signature.max_span() / (1024 * 1024)
        );
    }
}

/// Normalize the `--types` selection; empty means every known type
fn resolve_types(requested: &[String], registry: &SignatureRegistry) -> Result<Vec<String>> {
    let types: Vec<String> = requested
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if types.is_empty() {
        return Ok(registry.all_tags().into_iter().map(String::from).collect());
    }
    for tag in &types {
        if registry.lookup(tag).is_none() {
            let known: Vec<_> = registry.all_tags().into_iter().collect();
            bail!("Unknown file type '{}' (known: {})", tag, known.join(", "));
        }
    }
    Ok(types)
}

fn carver_config(cli: &Cli) -> CarverConfig {
    CarverConfig::new()
        .chunk_size(cli.chunk_size)
        .overwrite(cli.force)
}

/// Process a single image or device
fn process_single_file(cli: &Cli, file: &Path, types: &[String]) -> Result<()> {
    if !file.exists() {
        bail!("Source not found: {}", file.display());
    }
    if file.is_dir() {
        bail!("Source is a directory, use --directory: {}", file.display());
    }

    let summary = carve_one(cli, file, &cli.output, types)?;
    println!(
        "Done. Recovered {} files to {}",
        summary.files_written,
        cli.output.display()
    );
    Ok(())
}

/// Process every file below a directory, one output subdirectory each
fn process_directory(cli: &Cli, directory: &Path, types: &[String]) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let output = fs::canonicalize(&cli.output).unwrap_or_else(|_| cli.output.clone());
    let mut sources_processed = 0;
    let mut files_written = 0;

    // Walk the directory
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !entry.file_type().is_file() {
            continue;
        }

        // Never carve our own output
        let inside_output = fs::canonicalize(path)
            .map(|p| p.starts_with(&output))
            .unwrap_or(false);
        if inside_output {
            trace!("Skipping output file: {}", path.display());
            continue;
        }

        let out_dir = source_output_dir(&cli.output, directory, path);
        debug!("Carving {} into {}", path.display(), out_dir.display());
        match carve_one(cli, path, &out_dir, types) {
            Ok(summary) => files_written += summary.files_written,
            Err(e) => {
                // Log error but continue with other files
                warn!("Error processing {}: {:#}", path.display(), e);
            }
        }
        sources_processed += 1;
    }

    info!("Processed {} sources", sources_processed);
    println!(
        "Done. Recovered {} files from {} sources to {}",
        files_written,
        sources_processed,
        cli.output.display()
    );
    Ok(())
}

/// Output directory for one source of a directory walk, mirroring its
/// relative path so sources with equal names do not collide
fn source_output_dir(output: &Path, root: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(root).unwrap_or(source);
    let mut name = relative.as_os_str().to_owned();
    if relative.components().count() > 1 {
        name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("_")
            .into();
    }
    output.join(name)
}

/// Carve one source, reporting the partial summary if the run fails
fn carve_one(cli: &Cli, source: &Path, out_dir: &Path, types: &[String]) -> Result<CarveSummary> {
    let mut sink = TerminalSink::new(source, cli.quiet, cli.hash);
    let result = carve_file(source, out_dir, types, carver_config(cli), &mut sink);
    sink.finish();

    match result {
        Ok(summary) => {
            info!(
                "{}: {} files from {} bytes",
                source.display(),
                summary.files_written,
                summary.bytes_scanned
            );
            Ok(summary)
        }
        Err(failure) => {
            error!(
                "{}: stopped after recovering {} files from {} bytes",
                source.display(),
                failure.summary.files_written,
                failure.summary.bytes_scanned
            );
            Err(failure).with_context(|| format!("Failed to carve {}", source.display()))
        }
    }
}

/// BLAKE3 digest of a recovered file
fn hash_file(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
