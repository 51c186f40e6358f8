//! CLI command implementations
//!
//! All command logic lives here, extracted from main.rs for testability.
//! Handlers print to stdout; errors bubble up to main, which reports them
//! on stderr and exits non-zero.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::checkpoint::SafetensorsCheckpoint;
use crate::convert::convert_checkpoint_with;
use crate::download::download_file;
use crate::error::Result;
use crate::hparams::{sibling_hparams_path, HParams};
use crate::manifest::Manifest;

/// Volcar - flatten GPT-2 checkpoints into a blob plus a JSON index
///
/// Converts a safetensors checkpoint into a raw weight blob and a nested
/// tensor index that an inference engine can memory-map.
#[derive(Parser)]
#[command(name = "volcar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Convert a checkpoint into a blob/manifest pair
    ///
    /// Examples:
    ///   volcar convert models/gpt2/model.safetensors
    ///   volcar convert model.safetensors -o weights.data --index weights.json
    Convert {
        /// Path to the safetensors checkpoint
        #[arg(value_name = "CHECKPOINT")]
        checkpoint: PathBuf,

        /// Path to hparams.json (default: sibling of the checkpoint)
        #[arg(long)]
        hparams: Option<PathBuf>,

        /// Output blob path
        #[arg(short, long, default_value = "model_file.data")]
        output: PathBuf,

        /// Output manifest path
        #[arg(long, default_value = "model_index.json")]
        index: PathBuf,
    },
    /// Download a checkpoint asset over HTTP
    ///
    /// Examples:
    ///   volcar pull https://example.com/gpt2/model.safetensors assets/gpt2/model.safetensors
    Pull {
        /// Source URL
        #[arg(value_name = "URL")]
        url: String,

        /// Destination file path (parent directories are created)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// Inspect a manifest and verify its blob
    ///
    /// Examples:
    ///   volcar show model_index.json
    Show {
        /// Path to the manifest JSON
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },
    /// Show version info
    Info,
}

/// Main CLI entrypoint - dispatches commands to handlers
///
/// # Errors
///
/// Propagates any handler error unchanged.
pub fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            checkpoint,
            hparams,
            output,
            index,
        } => handle_convert(&checkpoint, hparams.as_deref(), &output, &index),
        Commands::Pull { url, output } => handle_pull(&url, &output),
        Commands::Show { manifest } => handle_show(&manifest),
        Commands::Info => {
            handle_info();
            Ok(())
        },
    }
}

/// Run the conversion, printing each tensor as it streams
fn handle_convert(
    checkpoint: &std::path::Path,
    hparams: Option<&std::path::Path>,
    output: &std::path::Path,
    index: &std::path::Path,
) -> Result<()> {
    let hparams_path = hparams.map_or_else(|| sibling_hparams_path(checkpoint), PathBuf::from);
    let hparams = HParams::load(&hparams_path)?;
    println!(
        "Converting {} ({} layers)",
        checkpoint.display(),
        hparams.n_layer
    );

    let reader = SafetensorsCheckpoint::open(checkpoint)?;
    let start = Instant::now();
    let report = convert_checkpoint_with(&reader, hparams.n_layer, output, index, |summary| {
        println!("{}: {:?}: {}", summary.name, summary.shape, summary.size);
    })?;

    println!();
    println!(
        "✓ Wrote {} tensors, {} bytes to {} in {:.2}s",
        report.tensor_count(),
        report.blob_bytes,
        output.display(),
        start.elapsed().as_secs_f64()
    );
    println!("✓ Manifest: {}", index.display());
    Ok(())
}

/// Download a checkpoint asset
fn handle_pull(url: &str, output: &std::path::Path) -> Result<()> {
    println!("Pulling {url}");
    let transferred = download_file(url, output)?;
    println!("✓ {transferred} bytes -> {}", output.display());
    Ok(())
}

/// Load a manifest, verify its blob, and print a summary
fn handle_show(manifest_path: &std::path::Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let blob = manifest.open_blob()?;

    println!("Blob: {} ({} bytes)", manifest.file_path, blob.len());
    println!("Layer blocks: {}", manifest.model_index.n_blocks());
    println!("Tensors: {}", manifest.model_index.tensor_count());
    println!("Top-level entries:");
    for name in manifest.model_index.globals.keys() {
        println!("  {name}");
    }
    Ok(())
}

/// Print version and feature summary
fn handle_info() {
    println!("Volcar v{}", crate::VERSION);
    println!("GPT-2 checkpoint flattener");
    println!();
    println!("Features:");
    println!("  - Safetensors checkpoint input (F32)");
    println!("  - Flat f32 blob + nested JSON tensor index");
    println!("  - Blob size verification before manifest write");
    println!("  - HTTP asset download");
}
