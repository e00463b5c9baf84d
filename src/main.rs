use anyhow::{Context, Result};
use benchtrend::cache::RebuildSummary;
use benchtrend::cli::{Cli, Command, OutputFormat};
use benchtrend::config::Settings;
use benchtrend::model::{Commit, DistributionSnapshot, Observation};
use benchtrend::recorder::{HistoryRow, ResultRecorder};
use benchtrend::regression::{Baseline, ResultComparator, ScoredResult, ZScoreCalculator};
use benchtrend::store::SqliteStore;
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
///
/// `--debug` turns on everything; otherwise `RUST_LOG` decides, and nothing
/// is installed when it is unset.
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_settings(args: &Cli) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_toml(path)?,
        None => Settings::default(),
    };
    if let Some(db) = &args.db {
        settings.storage.path = db.clone();
    }
    if let Some(window_size) = args.window_size {
        settings.regression.window_size = window_size;
    }
    if let Some(threshold_z) = args.threshold_z {
        settings.regression.threshold_z = threshold_z;
    }
    Ok(settings)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

fn print_scored(results: &[ScoredResult], zscore: &ZScoreCalculator) {
    for r in results {
        let verdict = match r.z_score {
            Some(z) if zscore.is_regression(z) => "REGRESSION",
            Some(z) if zscore.is_improvement(z) => "IMPROVEMENT",
            Some(_) => "ok",
            None => "unscored",
        };
        println!(
            "{}\t{}\t{}\tz={}\t{}",
            r.observation.id,
            r.observation.commit_sha.as_deref().unwrap_or("-"),
            fmt_opt(r.observation.svs()),
            fmt_opt(r.z_score),
            verdict
        );
    }
}

fn print_history(rows: &[HistoryRow]) {
    println!("observation\tcommit\tvalue\tmean_excl\tmean_incl\tresidual\tstddev\tsegment");
    for row in rows {
        println!(
            "{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}\t{}\t{}",
            row.observation_id,
            row.commit_sha,
            row.value,
            row.rolling_mean_excl,
            row.rolling_mean_incl,
            row.residual,
            fmt_opt(row.rolling_stddev),
            row.segment_id
        );
    }
}

fn print_baseline(commit: &str, baseline: Option<&Baseline>) {
    match baseline {
        Some(b) => {
            println!("Baseline before {}:", commit);
            println!("  mean:   {}", fmt_opt(b.mean));
            println!("  stddev: {}", fmt_opt(b.stddev));
            println!("  observations: {}", b.observation_count);
        }
        None => println!("No baseline for {} (ancestry unavailable)", commit),
    }
}

fn print_snapshot(commit: &str, snapshot: Option<&DistributionSnapshot>) {
    match snapshot {
        Some(s) => {
            println!("Snapshot at {}:", commit);
            println!("  mean_of_means:   {:.4}", s.mean_of_means);
            println!("  stddev_of_means: {}", fmt_opt(s.stddev_of_means));
            println!("  observations:    {} (window {})", s.observation_count, s.window_limit);
            println!("  span:            {}..{}", s.first_timestamp, s.last_timestamp);
        }
        None => println!("No snapshot for {}", commit),
    }
}

fn print_rebuild(summary: &RebuildSummary) {
    println!(
        "Rebuilt cache: {} cleared, {} written, {} skipped",
        summary.cleared, summary.written, summary.skipped
    );
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag or RUST_LOG is set
    init_tracing(args.debug);

    let settings = load_settings(&args)?;
    let store = SqliteStore::open(&settings.storage.path).with_context(|| {
        format!("Failed to open database {}", settings.storage.path.display())
    })?;
    let recorder = ResultRecorder::new(store, settings.regression.clone())?;
    let json = args.format == OutputFormat::Json;

    match &args.command {
        Command::ImportCommits { file } => {
            let commits: Vec<Commit> = read_json(file)?;
            let count = recorder.import_commits(&commits)?;
            if json {
                print_json(&serde_json::json!({ "imported": count }))?;
            } else {
                println!("Imported {} commits", count);
            }
        }
        Command::Record { file } => {
            let observations: Vec<Observation> = read_json(file)?;
            let scored = observations
                .into_iter()
                .map(|o| recorder.record_observation(o))
                .collect::<benchtrend::Result<Vec<_>>>()?;
            if json {
                print_json(&scored)?;
            } else {
                print_scored(&scored, &ZScoreCalculator::from_config(recorder.config()));
            }
        }
        Command::History(series) => {
            let rows = recorder.get_history(&series.key())?;
            if json {
                print_json(&rows)?;
            } else {
                print_history(&rows);
            }
        }
        Command::Baseline { commit, series } => {
            let baseline = recorder.get_baseline_for_commit(commit, &series.key())?;
            if json {
                print_json(&baseline)?;
            } else {
                print_baseline(commit, baseline.as_ref());
            }
        }
        Command::Snapshot { commit, series } => {
            let snapshot = recorder
                .cache()
                .lookup(&series.key().snapshot_key(commit))?;
            if json {
                print_json(&snapshot)?;
            } else {
                print_snapshot(commit, snapshot.as_ref());
            }
        }
        Command::Compare {
            baseline_run,
            contender_run,
            fail_on_regression,
        } => {
            let baseline = recorder.scored_run(baseline_run)?;
            let contender = recorder.scored_run(contender_run)?;
            let report = ResultComparator::new(recorder.config())
                .compare_lists(&baseline, &contender);
            if json {
                print_json(&report)?;
            } else {
                print!("{}", report.to_report_string());
            }
            if *fail_on_regression && report.has_regression() {
                std::process::exit(1);
            }
        }
        Command::RebuildCache => {
            let summary = recorder.cache().rebuild(recorder.config().window_size)?;
            if json {
                print_json(&summary)?;
            } else {
                print_rebuild(&summary);
            }
        }
    }

    Ok(())
}
