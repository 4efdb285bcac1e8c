use std::path::PathBuf;

use clap::Parser;

use crate::{builtin::DEFAULT_PROFILE, writer::OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "Microcode Compiler")]
#[command(version)]
#[command(about = "Compiles an ISA profile into control store ROM images", long_about = None)]
pub(crate) struct Cli {
    /// ISA profile file (defaults to the built-in profile)
    #[arg(short, long, conflicts_with = "builtin")]
    pub(crate) profile: Option<PathBuf>,

    /// Built-in ISA profile
    #[arg(short, long, default_value = DEFAULT_PROFILE)]
    pub(crate) builtin: String,

    /// Output file prefix, one file per ROM chip: <prefix>0.hex .. <prefix>3.hex
    #[arg(short, long, default_value = "uCode")]
    pub(crate) output: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Ihex)]
    pub(crate) format: OutputFormat,

    /// Encode and validate only, write no files
    #[arg(long)]
    pub(crate) check: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}

impl Cli {
    pub(crate) fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
