use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tracing::warn;
use walkdir::WalkDir;

use sawfile_ledger::Ledger;
use sawfile_sdk::{CheckStatus, Keys, KeysConfig, OpenMode, Status, VerificationReport};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Verify(args) => cmd_verify(&cli, args),
        Command::Add(args) => cmd_add(&cli, args),
        Command::Seal(args) => cmd_seal(&cli, args),
        Command::Update(args) => cmd_update(&cli, args),
        Command::List(_) => cmd_list(&cli),
    }
}

/// Config file (if any) overlaid with command-line overrides.
fn load_config(cli: &Cli, mode: OpenMode) -> anyhow::Result<KeysConfig> {
    let mut config = match &cli.config {
        Some(path) => KeysConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => KeysConfig::default(),
    };
    if let Some(ledger) = &cli.ledger {
        config.ledger_path = ledger.clone();
    }
    if let Some(base) = &cli.base {
        config.ledger.base_dir = Some(base.clone());
    }
    config.mode = mode;
    Ok(config)
}

fn open(config: KeysConfig) -> anyhow::Result<Keys> {
    let path = config.ledger_path.clone();
    Keys::open(config).with_context(|| format!("opening ledger {}", path.display()))
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn cmd_verify(cli: &Cli, args: &VerifyArgs) -> anyhow::Result<ExitCode> {
    let mut config = load_config(cli, OpenMode::ReadOnly)?;
    config.required.extend(args.require.iter().cloned());
    let keys = open(config)?;

    let report = keys.last_report().unwrap_or_else(VerificationReport::empty);
    let missing = keys.missing_required(&keys.config().required);
    let passed = keys.status().is_ok();

    match cli.format {
        OutputFormat::Json => {
            let out = json!({
                "ledger": keys.ledger().path().display().to_string(),
                "status": keys.status(),
                "all_valid": report.all_valid,
                "missing_required": missing,
                "checks": report.checks,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text if keys.status() == Status::FileError => println!(
            "{} ledger {} has no entries to verify",
            "✗".red().bold(),
            keys.ledger().path().display()
        ),
        OutputFormat::Text => print_report(&report, &missing),
    }
    Ok(exit_code(passed))
}

fn print_report(report: &VerificationReport, missing: &[String]) {
    for check in &report.checks {
        let mark = match check.status {
            CheckStatus::Match => "✓".green(),
            CheckStatus::Mismatch => "✗ modified".red().bold(),
            CheckStatus::Unreadable => "✗ unreadable".red().bold(),
            CheckStatus::SoftFailed => "! unreadable (ignored)".yellow(),
        };
        println!("  {} {}", mark, check.filename);
    }
    for name in missing {
        println!("  {} {}", "✗ missing".red().bold(), name);
    }

    let failures = report.failures().count() + missing.len();
    if failures == 0 {
        println!(
            "{} {} entries verified",
            "✓".green().bold(),
            report.len().to_string().bold()
        );
    } else {
        println!(
            "{} {} of {} checks failed",
            "✗".red().bold(),
            failures.to_string().bold(),
            report.len() + missing.len()
        );
    }
}

fn cmd_add(cli: &Cli, args: &AddArgs) -> anyhow::Result<ExitCode> {
    let keys = open(load_config(cli, OpenMode::ReadWrite)?)?;
    for path in &args.paths {
        let path = std::path::absolute(path)?;
        keys.add_file(&path)?;
        println!("  {} {}", "queued:".green(), path.display());
    }
    finish_appends(&keys)
}

fn cmd_seal(cli: &Cli, args: &SealArgs) -> anyhow::Result<ExitCode> {
    let keys = open(load_config(cli, OpenMode::ReadWrite)?)?;
    let ledger_path = std::path::absolute(keys.ledger().path())?;
    let root = std::path::absolute(&args.dir)?;

    let mut queued = 0usize;
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.path() == ledger_path {
            continue;
        }
        keys.add_file(entry.path())?;
        queued += 1;
    }
    println!(
        "Sealing {} files under {}",
        queued.to_string().bold(),
        root.display()
    );
    finish_appends(&keys)
}

/// Wait for the append worker and summarise what it did.
fn finish_appends(keys: &Keys) -> anyhow::Result<ExitCode> {
    keys.wait_idle()?;
    let stats = keys.append_stats().unwrap_or_default();
    println!(
        "{} {} added, {} updated, {} failed",
        if stats.failed == 0 { "✓".green().bold() } else { "✗".red().bold() },
        stats.appended,
        stats.rewritten,
        stats.failed
    );
    Ok(exit_code(stats.failed == 0))
}

fn cmd_update(cli: &Cli, args: &UpdateArgs) -> anyhow::Result<ExitCode> {
    let keys = open(load_config(cli, OpenMode::ReadWrite)?)?;
    let mut all_updated = true;
    for path in &args.paths {
        let abs = std::path::absolute(path)?;
        if keys.update_existing_key(&abs)? {
            println!("  {} {}", "updated:".green(), path.display());
        } else {
            println!("  {} {}", "no entry:".yellow(), path.display());
            all_updated = false;
        }
    }
    Ok(exit_code(all_updated))
}

fn cmd_list(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli, OpenMode::ReadOnly)?;
    let ledger = open_for_listing(&config)?;
    let entries = ledger.entries();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}  {}", entry.digest.to_hex().dimmed(), entry.filename);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Listing reads the ledger without the verification `Keys::open` runs.
fn open_for_listing(config: &KeysConfig) -> anyhow::Result<Ledger> {
    let path = &config.ledger_path;
    Ledger::open(path, OpenMode::ReadOnly, config.ledger.clone())
        .with_context(|| format!("opening ledger {}", path.display()))
}
