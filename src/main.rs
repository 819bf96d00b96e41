//! dsttool
//!
//! Command-line interface for inspecting and re-emitting Distance `.bytes` files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use distance_parsers::logging::{instrument_parse, log_progress, progress_span};
use distance_parsers::{
    log_parse_complete, log_parse_error, log_parse_start, probe_file, DstBytes, DstFile, DstFormat,
    HumanReadable, Manifest, ReadOptions, Registry,
};

/// dsttool - Distance level and data file inspector
#[derive(Parser)]
#[command(name = "dsttool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the kind and contents of a file
    Info(InfoArgs),

    /// Read a file, write it back and compare the bytes
    Roundtrip(RoundtripArgs),

    /// Write or verify the registry autoload manifest
    Manifest(ManifestArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input .bytes file
    input: PathBuf,

    /// Materialize everything and fail on the first captured error
    #[arg(long)]
    strict: bool,

    /// Registry manifest to resolve classes with instead of the built-in one
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Args)]
struct RoundtripArgs {
    /// Input .bytes file
    input: PathBuf,

    /// Write the re-emitted bytes here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail when the re-emitted bytes differ from the input
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct ManifestArgs {
    #[command(subcommand)]
    action: ManifestAction,
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Export the manifest of the fully loaded registry
    Write {
        /// Output JSON file
        path: PathBuf,
    },

    /// Compare a manifest against the fully loaded registry
    Check {
        /// Manifest JSON file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => cmd_info(args, cli.format),
        Commands::Roundtrip(args) => cmd_roundtrip(args, cli.format),
        Commands::Manifest(args) => cmd_manifest(args),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_thread_ids(verbosity >= 3)
        .with_file(verbosity >= 3)
        .with_line_number(verbosity >= 3)
        .with_writer(std::io::stderr)
        .init();
}

fn registry_for(manifest: Option<&Path>) -> Result<Arc<Registry>> {
    match manifest {
        Some(path) => {
            let manifest = Manifest::load(path).with_context(|| format!("Failed to load manifest: {}", path.display()))?;
            Ok(Arc::new(Registry::from_manifest(manifest)?))
        }
        None => Ok(distance_parsers::default_registry()?),
    }
}

fn open_file(path: &Path, registry: Arc<Registry>, options: &ReadOptions) -> Result<(DstFile, u64)> {
    let data = fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let size = data.len() as u64;

    let kind = probe_file(&DstBytes::new(data.clone()), &registry)
        .with_context(|| format!("Not a recognized .bytes file: {}", path.display()))?;
    log_parse_start!(kind, path);

    let start = Instant::now();
    let file = instrument_parse(kind.name(), || DstFile::from_bytes_with(data, registry, options));
    match file {
        Ok(file) => {
            log_parse_complete!(kind, start.elapsed(), size);
            Ok((file, size))
        }
        Err(e) => {
            log_parse_error!(kind, e);
            Err(e).with_context(|| format!("Failed to read {}", path.display()))
        }
    }
}

fn cmd_info(args: InfoArgs, format: OutputFormat) -> Result<()> {
    let registry = registry_for(args.manifest.as_deref())?;
    let options = if args.strict { ReadOptions::strict() } else { ReadOptions::default() };
    let (file, size) = open_file(&args.input, registry.clone(), &options)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.input.display().to_string(),
                "size": size,
                "kind": file.kind().name(),
                "contents": file.to_json(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("File: {}", args.input.display());
            println!("Size: {}", format_size(size));
            println!("Kind: {}", file.kind());
            println!();
            println!("{}", file.to_readable_string());

            if let Some(level) = file.as_level() {
                let total: usize = level.layers().map(|l| l.objects().len()).sum();
                let span = progress_span("walk", total);
                let _guard = span.enter();

                let mut broken = 0;
                for (i, obj) in level.objects().enumerate() {
                    if obj.exception().is_some() {
                        broken += 1;
                    }
                    log_progress(i + 1, total);
                }
                println!();
                println!("Layers: {}", level.layer_count());
                println!("Objects: {} ({} with errors)", total, broken);
            }
        }
    }

    if !args.strict {
        if let Err(e) = file.check_exceptions() {
            warn!("File contains unreadable data: {}", e);
        }
    }

    debug!(modules = ?registry.loaded_modules(), "registry modules in use");
    Ok(())
}

fn cmd_roundtrip(args: RoundtripArgs, format: OutputFormat) -> Result<()> {
    let registry = distance_parsers::default_registry()?;
    let original = fs::read(&args.input).with_context(|| format!("Failed to read file: {}", args.input.display()))?;
    let (file, _) = open_file(&args.input, registry, &ReadOptions::default())?;

    file.materialize_all();
    if let Err(e) = file.check_exceptions() {
        warn!("Re-emitting a file with unreadable data: {}", e);
    }

    let written = instrument_parse("write", || file.to_bytes()).context("Failed to write file")?;
    let mismatch = first_difference(&original, &written);

    if let Some(output) = &args.output {
        fs::write(output, &written).with_context(|| format!("Failed to write: {}", output.display()))?;
        info!("Wrote {} to {}", format_size(written.len() as u64), output.display());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.input.display().to_string(),
                "kind": file.kind().name(),
                "input_size": original.len(),
                "output_size": written.len(),
                "identical": mismatch.is_none(),
                "first_difference": mismatch,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => match mismatch {
            None => println!("{}: identical ({})", args.input.display(), format_size(written.len() as u64)),
            Some(offset) => println!(
                "{}: differs at offset 0x{:x} (input {}, output {})",
                args.input.display(),
                offset,
                format_size(original.len() as u64),
                format_size(written.len() as u64)
            ),
        },
    }

    if args.strict {
        if let Some(offset) = mismatch {
            bail!("Re-emitted bytes differ from input at offset 0x{:x}", offset);
        }
    }

    Ok(())
}

fn cmd_manifest(args: ManifestArgs) -> Result<()> {
    let eager = Registry::eager().context("Failed to load registry modules")?.export_manifest();

    match args.action {
        ManifestAction::Write { path } => {
            eager.save(&path).with_context(|| format!("Failed to write manifest: {}", path.display()))?;
            println!(
                "Wrote manifest for {} modules to {}",
                eager.modules().len(),
                path.display()
            );
        }
        ManifestAction::Check { path } => {
            let manifest = Manifest::load(&path).with_context(|| format!("Failed to load manifest: {}", path.display()))?;
            let problems = manifest.check(&eager);
            if problems.is_empty() {
                println!("{}: up to date", path.display());
            } else {
                for problem in &problems {
                    println!("  {}", problem);
                }
                bail!("Manifest {} is stale ({} differences)", path.display(), problems.len());
            }
        }
    }

    Ok(())
}

/// Offset of the first differing byte, or the shorter length if one is a prefix
fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(pos) => Some(pos),
        None if a.len() != b.len() => Some(a.len().min(b.len())),
        None => None,
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(b"abc", b"abc"), None);
        assert_eq!(first_difference(b"abc", b"abd"), Some(2));
        assert_eq!(first_difference(b"ab", b"abc"), Some(2));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(2048), "2.00 KB");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
