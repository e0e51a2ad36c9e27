//! shmkv CLI
//!
//! Command-line access to shmkv variables in System V shared memory.
//!
//! # Commands
//!
//! - `tokenize` - Print the segment key derived from a name or path
//! - `get` / `set` / `delete` / `exists` - Work with one variable
//! - `inspect` - Display variable table statistics
//! - `remove` - Mark the segment for destruction

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::{CommandResult, Format};
use shmkv_core::{tokenize, SegmentKey, StoreConfig, DEFAULT_PERMISSIONS, DEFAULT_SEGMENT_SIZE};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// shmkv shared memory variable tools.
#[derive(Parser, Debug)]
#[command(name = "shmkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    segment: SegmentArgs,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which segment to attach, and how to create it.
#[derive(Args, Debug)]
struct SegmentArgs {
    /// Name or file path to tokenize into the segment key
    #[arg(global = true, short, long, conflicts_with = "id")]
    key: Option<String>,

    /// Numeric segment key
    #[arg(global = true, long)]
    id: Option<u32>,

    /// Bytes to reserve if the segment is created
    #[arg(global = true, long, default_value_t = DEFAULT_SEGMENT_SIZE)]
    size: usize,

    /// Octal permission bits if the segment is created
    #[arg(global = true, long, value_parser = parse_octal, default_value = "666")]
    permissions: u32,
}

impl SegmentArgs {
    fn resolve_key(&self) -> CommandResult<SegmentKey> {
        match (&self.key, self.id) {
            (_, Some(id)) => Ok(SegmentKey::new(id)),
            (Some(name), None) => Ok(tokenize(name)?),
            (None, None) => Err("segment required: pass --key <name> or --id <number>".into()),
        }
    }

    fn config(&self) -> StoreConfig {
        StoreConfig::new()
            .size(self.size)
            .permissions(self.permissions)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the segment key for a name or file path
    Tokenize {
        /// The name or path to tokenize
        input: String,
    },

    /// Print a variable
    Get {
        /// Variable name
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Store a JSON value in a variable
    Set {
        /// Variable name
        name: String,

        /// JSON value (quote strings: '"text"')
        value: String,
    },

    /// Delete a variable
    Delete {
        /// Variable name
        name: String,
    },

    /// Print whether a variable exists
    Exists {
        /// Variable name
        name: String,
    },

    /// Display variable table statistics
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Mark the segment for destruction
    Remove,

    /// Show version information
    Version,
}

fn parse_octal(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode = u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {s:?}: {e}"))?;
    if mode > 0o777 {
        return Err(format!("mode {s} exceeds 777"));
    }
    Ok(mode)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Tokenize { input } => commands::tokenize::run(&input, &mut out)?,
        Commands::Version => {
            writeln!(out, "shmkv CLI v{}", env!("CARGO_PKG_VERSION"))?;
            writeln!(out, "shmkv core v{}", shmkv_core::VERSION)?;
            writeln!(
                out,
                "defaults: size {DEFAULT_SEGMENT_SIZE} bytes, permissions {DEFAULT_PERMISSIONS:o}"
            )?;
        }
        command => run_on_segment(&cli.segment, command, &mut out)?,
    }

    Ok(())
}

#[cfg(unix)]
fn run_on_segment(
    segment: &SegmentArgs,
    command: Commands,
    out: &mut impl Write,
) -> CommandResult {
    use shmkv_core::{SysvFacility, SysvStore};

    let key = segment.resolve_key()?;
    let mut store = SysvStore::open(SysvFacility, key, &segment.config())?;

    match command {
        Commands::Get { name, format } => commands::vars::get(&store, &name, format, out),
        Commands::Set { name, value } => commands::vars::set(&mut store, &name, &value),
        Commands::Delete { name } => commands::vars::delete(&mut store, &name),
        Commands::Exists { name } => commands::vars::exists(&store, &name, out),
        Commands::Inspect { format } => commands::inspect::run(&store, format, out),
        Commands::Remove => commands::remove::run(&mut store, out),
        Commands::Tokenize { .. } | Commands::Version => Ok(()),
    }
}

#[cfg(not(unix))]
fn run_on_segment(
    _segment: &SegmentArgs,
    _command: Commands,
    _out: &mut impl Write,
) -> CommandResult {
    Err("System V shared memory is not available on this platform".into())
}
