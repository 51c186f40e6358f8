//! Volcar CLI - GPT-2 checkpoint flattener
//!
//! # Commands
//!
//! - `convert` - Flatten a checkpoint into a blob/manifest pair
//! - `pull` - Download a checkpoint asset
//! - `show` - Inspect a manifest and verify its blob
//! - `info` - Show version info

use clap::Parser;
use volcar::cli::{entrypoint, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = entrypoint(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
