use std::path::PathBuf;

use clap::Parser;

/// jsdeob - deobfuscate string-pool protected JavaScript
#[derive(Debug, Parser)]
#[command(name = "jsdeob", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(flatten)]
    pub decode: DecodeOptions,
}

/// Options shared by every mode of operation.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit a JSON report instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// What to decode and how.
#[derive(Debug, Parser)]
pub struct DecodeOptions {
    /// Input `.js` file, or a directory searched recursively for `.js` files.
    #[arg(value_name = "INPUT", default_value = "input")]
    pub input: PathBuf,

    /// Output directory; paths below INPUT are mirrored into it.
    #[arg(value_name = "OUTPUT", default_value = "decoded")]
    pub output: PathBuf,

    /// Maximum pipeline rounds per file.
    #[arg(long)]
    pub max_rounds: Option<usize>,

    /// Sandbox wall-clock budget in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Don't normalise boolean idioms or remove the version marker.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Number of files processed in parallel (default: one per core).
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
