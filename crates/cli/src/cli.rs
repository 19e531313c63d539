//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// fanout - copy stdin to files, sockets, HTTP and WebSocket peers
#[derive(Parser, Debug)]
#[command(
    name = "fanout",
    author,
    version,
    about = "Forward stdin to one or more output sinks",
    long_about = "Reads stdin and writes every line (or chunk) to each configured output.\n\n\
                  Outputs are `scheme://argument` strings. Listening schemes \
                  (tcp-listen, unix-listen, http-listen, ws-listen) broadcast to \n\
                  every connected client; slow clients are disconnected."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FANOUT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs always go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "FANOUT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Forward stdin to the configured outputs
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// List the output schemes
    Schemes(SchemesArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Output URI, repeatable (e.g. `-o tcp-listen://:9000 -o file:///tmp/out.log`)
    #[arg(short, long = "output", value_name = "URI")]
    pub outputs: Vec<String>,

    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "FANOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// How stdin is cut into writes
    #[arg(long, value_enum, env = "FANOUT_FRAMING")]
    pub framing: Option<FramingArg>,

    /// Read size for chunk framing
    #[arg(long, env = "FANOUT_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Payloads buffered per listener client before it is disconnected
    #[arg(long, env = "FANOUT_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Milliseconds close waits for listener clients to drain
    #[arg(long, env = "FANOUT_SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout_ms: Option<u64>,

    /// Validate configuration and exit without forwarding
    #[arg(long)]
    pub dry_run: bool,

    /// Print forwarding statistics on exit
    #[arg(long)]
    pub stats: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FANOUT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "fanout.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `schemes` command
#[derive(Parser, Debug)]
pub struct SchemesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Input framing
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramingArg {
    /// One write per line
    Line,
    /// One write per raw read
    Chunk,
}

impl From<FramingArg> for contracts::Framing {
    fn from(framing: FramingArg) -> Self {
        match framing {
            FramingArg::Line => Self::Line,
            FramingArg::Chunk => Self::Chunk,
        }
    }
}
