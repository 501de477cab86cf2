//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use logsend_core::Priority;

/// logsend - schema-routed metric capture for log streams.
#[derive(Parser, Debug, Clone)]
#[command(name = "logsend")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format for reports.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Replay JSONL messages through the metrics filter.
    ///
    /// Every message is echoed to stdout; metric-bearing messages are also
    /// written to rotating block files under the output directory.
    Collect(CollectArgs),

    /// Summarize block files.
    Inspect(InspectArgs),

    /// Pack JSONL payloads into size-rotated block files.
    Pack(PackArgs),

    /// Republish JSONL payloads as log lines on stdout.
    Echo(EchoArgs),
}

/// Arguments for the collect command.
///
/// Flags override values loaded from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct CollectArgs {
    /// JSONL input file; stdin when omitted.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for block files.
    #[arg(short, long, env = "LOGSEND_DIR")]
    pub dir: Option<PathBuf>,

    /// Prefix of every block file name.
    #[arg(short, long, env = "LOGSEND_PREFIX")]
    pub prefix: Option<String>,

    /// Flush interval in milliseconds.
    #[arg(long, env = "LOGSEND_FLUSH_INTERVAL_MS")]
    pub flush_interval_ms: Option<u64>,

    /// Maximum samples per block.
    #[arg(long)]
    pub samples: Option<usize>,

    /// Blocks per file before rotation.
    #[arg(long)]
    pub blocks: Option<usize>,

    /// Capture untagged structured messages, keyed by payload shape.
    #[arg(long)]
    pub capture_all: bool,

    /// JSON collector config file.
    #[arg(short, long, env = "LOGSEND_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for the inspect command.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Block files to summarize.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the pack command.
#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// JSONL payload file; stdin when omitted.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long, env = "LOGSEND_DIR")]
    pub dir: PathBuf,

    /// Base file name.
    #[arg(short, long, default_value = "samples")]
    pub base: String,

    /// File extension, including the dot.
    #[arg(long, default_value = ".lsb")]
    pub extension: String,

    /// Rotate once a file reaches this many bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub target_size: u64,

    /// Maximum samples per block.
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,

    /// Width of the zero-padded file counter.
    #[arg(long, default_value_t = 4)]
    pub digits: usize,
}

/// Arguments for the echo command.
#[derive(Args, Debug, Clone)]
pub struct EchoArgs {
    /// JSONL payload file; stdin when omitted.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Priority of the emitted lines.
    #[arg(short, long, default_value = "info")]
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_collect_flags() {
        let cli = Cli::try_parse_from([
            "logsend",
            "collect",
            "--dir",
            "/tmp/m",
            "--samples",
            "20",
            "--capture-all",
        ]);
        let Ok(cli) = cli else {
            panic!("arguments should parse");
        };
        let Commands::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/m")));
        assert_eq!(args.samples, Some(20));
        assert!(args.capture_all);
        assert_eq!(args.blocks, None);
    }

    #[test]
    fn parses_echo_priority() {
        let cli = Cli::try_parse_from(["logsend", "echo", "--priority", "warn"]);
        let Ok(cli) = cli else {
            panic!("arguments should parse");
        };
        let Commands::Echo(args) = cli.command else {
            panic!("expected echo");
        };
        assert_eq!(args.priority, Priority::Warning);
    }

    #[test]
    fn rejects_unknown_priority() {
        assert!(Cli::try_parse_from(["logsend", "echo", "--priority", "loud"]).is_err());
    }

    #[test]
    fn inspect_requires_files() {
        assert!(Cli::try_parse_from(["logsend", "inspect"]).is_err());
    }

    #[test]
    fn global_format_flag() {
        let cli = Cli::try_parse_from(["logsend", "inspect", "a.lsb", "--format", "json"]);
        assert!(matches!(cli, Ok(Cli { format: Format::Json, .. })));
    }
}
