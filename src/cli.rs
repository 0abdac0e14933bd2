use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use aegis::ScanMode;

#[derive(Parser)]
#[command(name = "aegis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scan untrusted image uploads for malicious content", long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON file with scan options
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Malware hash list (one hex SHA-256 per line)
    #[arg(long, global = true)]
    pub hashes: Option<PathBuf>,

    /// JSON rule file; the builtin rules are used when absent
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan one or more files
    Scan {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = ModeArg::Full)]
        mode: ModeArg,

        /// Print one JSON object per file
        #[arg(long)]
        json: bool,

        /// Print scanner statistics after the batch
        #[arg(long)]
        stats: bool,
    },

    /// Validate a rule file and list its rules
    CheckRules { file: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Light,
    Full,
}

impl From<ModeArg> for ScanMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Light => ScanMode::Light,
            ModeArg::Full => ScanMode::Full,
        }
    }
}
