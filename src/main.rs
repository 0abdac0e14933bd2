use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aegis::domain::entities::Alignment;
use aegis::domain::repositories::{HashDatabaseSource, RuleSetSource};
use aegis::domain::services::SignatureScanner;
use aegis::infrastructure::hash_database::HashListFile;
use aegis::infrastructure::rules::{BuiltinRules, JsonRuleFile};
use aegis::{ImageScanner, ScanMode, ScanOptions, ScanOutcome, Verdict};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Scan {
            files,
            mode,
            json,
            stats,
        } => {
            let scanner = build_scanner(&cli)?;
            run_scan(&scanner, files, (*mode).into(), *json, *stats)
        }
        Commands::CheckRules { file } => check_rules(file),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "aegis=debug" } else { "aegis=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_scanner(cli: &Cli) -> Result<ImageScanner> {
    let options = match &cli.config {
        Some(path) => ScanOptions::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanOptions::default(),
    };

    let hashes = cli.hashes.as_ref().map(HashListFile::new);
    let rules: Box<dyn RuleSetSource> = match &cli.rules {
        Some(path) => Box::new(JsonRuleFile::new(path)),
        None => Box::new(BuiltinRules),
    };

    ImageScanner::from_sources(
        options,
        hashes.as_ref().map(|h| h as &dyn HashDatabaseSource),
        rules.as_ref(),
    )
    .context("Failed to initialise scanner")
}

struct FileReport {
    path: PathBuf,
    outcome: Result<ScanOutcome>,
}

fn scan_file(scanner: &ImageScanner, path: &Path, mode: ScanMode) -> Result<ScanOutcome> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(scanner.scan(&data, &filename, mode)?)
}

fn run_scan(
    scanner: &ImageScanner,
    files: &[PathBuf],
    mode: ScanMode,
    json: bool,
    show_stats: bool,
) -> Result<ExitCode> {
    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| FileReport {
            path: path.clone(),
            outcome: scan_file(scanner, path, mode),
        })
        .collect();

    let mut worst = Verdict::Clean;
    let mut failed = false;

    for report in &reports {
        match &report.outcome {
            Ok(outcome) => {
                if let Some(verdict) = outcome.verdict() {
                    worst = worst.max(verdict);
                }
                if json {
                    let line = serde_json::json!({
                        "file": report.path.display().to_string(),
                        "outcome": outcome,
                    });
                    println!("{line}");
                } else {
                    print_outcome(&report.path, outcome);
                }
            }
            Err(e) => {
                failed = true;
                eprintln!("{}: {e:#}", report.path.display());
            }
        }
    }

    if show_stats {
        let stats = scanner.stats();
        if json {
            println!("{}", serde_json::json!({ "stats": stats }));
        } else {
            println!(
                "\n{} scanned ({} light, {} full), {} rejected: {} clean, {} suspicious, {} malicious",
                stats.total_scans,
                stats.light_scans,
                stats.full_scans,
                stats.rejected,
                stats.clean,
                stats.suspicious,
                stats.malicious
            );
        }
    }

    Ok(match (worst, failed) {
        (Verdict::Malicious, _) => ExitCode::from(3),
        (Verdict::Suspicious, _) => ExitCode::from(2),
        (Verdict::Clean, true) => ExitCode::FAILURE,
        (Verdict::Clean, false) => ExitCode::SUCCESS,
    })
}

fn print_outcome(path: &Path, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Completed(result) => print!("{}: {}", path.display(), result.summary()),
        ScanOutcome::Rejected(rejection) => {
            println!("{}: rejected: {}", path.display(), rejection.reason)
        }
    }
}

fn check_rules(file: &Path) -> Result<ExitCode> {
    let rules = JsonRuleFile::new(file)
        .load()
        .with_context(|| format!("Failed to load rules from {}", file.display()))?;
    let compiled = SignatureScanner::compile(rules)
        .with_context(|| format!("Invalid rule set in {}", file.display()))?;

    println!("{}: {} rules", file.display(), compiled.len());
    for rule in compiled.rules() {
        let anchor = match (rule.offset, rule.alignment) {
            (Some(offset), _) => format!("@{offset}"),
            (None, Alignment::JpegSegment) => "segment".to_string(),
            (None, Alignment::Anywhere) => "*".to_string(),
        };
        println!(
            "  {:<24} {:<8} {:>6}  {}",
            rule.id, rule.severity, anchor, rule.description
        );
    }
    Ok(ExitCode::SUCCESS)
}
