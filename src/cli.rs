//! CLI argument parsing for benchtrend

use crate::model::TimeSeriesKey;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "benchtrend")]
#[command(version)]
#[command(about = "Benchmark history with rolling-distribution regression detection", long_about = None)]
pub struct Cli {
    /// SQLite database (overrides [storage].path)
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// TOML settings file
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Rolling window in commit ranks (overrides [regression].window_size)
    #[arg(long = "window-size", value_name = "N", global = true)]
    pub window_size: Option<usize>,

    /// Z-score threshold (overrides [regression].threshold_z)
    #[arg(long = "threshold-z", value_name = "Z", global = true)]
    pub threshold_z: Option<f64>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert or replace commits from a JSON array
    ImportCommits {
        /// JSON file holding an array of commits
        file: PathBuf,
    },

    /// Record results from a JSON array and score each one
    Record {
        /// JSON file holding an array of observations
        file: PathBuf,
    },

    /// Default-branch history of one series with rolling statistics
    History(SeriesArgs),

    /// Baseline distribution strictly before a commit
    Baseline {
        #[arg(long = "commit", value_name = "SHA")]
        commit: String,

        #[command(flatten)]
        series: SeriesArgs,
    },

    /// Cached distribution snapshot of a series as of a commit
    Snapshot {
        #[arg(long = "commit", value_name = "SHA")]
        commit: String,

        #[command(flatten)]
        series: SeriesArgs,
    },

    /// Compare two runs result by result
    Compare {
        #[arg(long = "baseline-run", value_name = "RUN_ID")]
        baseline_run: String,

        #[arg(long = "contender-run", value_name = "RUN_ID")]
        contender_run: String,

        /// Exit with status 1 when any regression is indicated
        #[arg(long = "fail-on-regression")]
        fail_on_regression: bool,
    },

    /// Drop and recompute every distribution snapshot
    RebuildCache,
}

/// Identifies one time series
#[derive(Args, Debug, Clone)]
pub struct SeriesArgs {
    #[arg(long = "case", value_name = "CASE_ID")]
    pub case: String,

    #[arg(long = "context", value_name = "CONTEXT_ID")]
    pub context: String,

    #[arg(long = "hardware", value_name = "FINGERPRINT")]
    pub hardware: String,

    #[arg(long = "repository", value_name = "URL")]
    pub repository: String,
}

impl SeriesArgs {
    pub fn key(&self) -> TimeSeriesKey {
        TimeSeriesKey::new(&self.case, &self.context, &self.hardware, &self.repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES: [&str; 8] = [
        "--case", "c", "--context", "x", "--hardware", "h", "--repository", "r",
    ];

    #[test]
    fn test_cli_parses_record() {
        let cli = Cli::parse_from(["benchtrend", "record", "results.json"]);
        match cli.command {
            Command::Record { file } => assert_eq!(file, PathBuf::from("results.json")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "benchtrend",
            "rebuild-cache",
            "--db",
            "x.db",
            "--format",
            "json",
            "--window-size",
            "20",
        ]);
        assert!(matches!(cli.command, Command::RebuildCache));
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.window_size, Some(20));
    }

    #[test]
    fn test_cli_series_args() {
        let mut args = vec!["benchtrend", "baseline", "--commit", "abc"];
        args.extend(SERIES);
        let cli = Cli::parse_from(args);
        match cli.command {
            Command::Baseline { commit, series } => {
                assert_eq!(commit, "abc");
                assert_eq!(series.key(), TimeSeriesKey::new("c", "x", "h", "r"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_history_requires_series() {
        assert!(Cli::try_parse_from(["benchtrend", "history", "--case", "c"]).is_err());
    }

    #[test]
    fn test_cli_compare() {
        let cli = Cli::parse_from([
            "benchtrend",
            "compare",
            "--baseline-run",
            "a",
            "--contender-run",
            "b",
        ]);
        match cli.command {
            Command::Compare {
                baseline_run,
                contender_run,
                fail_on_regression,
            } => {
                assert_eq!(baseline_run, "a");
                assert_eq!(contender_run, "b");
                assert!(!fail_on_regression);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
