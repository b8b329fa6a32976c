// src/main.rs

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn, Level};

use wintune::{
    adapter::{memory::MemoryAdapter, ResourceAdapter},
    constants::LEDGER_FILE_NAME,
    ledger::{RestoreReport, SnapshotLedger},
    orchestrator::{Engine, EngineRequest, EngineResponse, OrchestratorContext, TweakOutcome},
    tweaks::{self, TweakId},
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    args.retain(|a| a != "--dry-run");
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.split_first() {
        Some((&"list", _)) => {
            list();
            Ok(())
        }
        Some((&"apply", rest)) if !rest.is_empty() => {
            run(EngineRequest::Apply(resolve(rest)?), dry_run)
        }
        Some((&"rollback", _)) => run(EngineRequest::Rollback, dry_run),
        Some((&"restore-defaults", _)) => run(EngineRequest::RestoreDefaults, dry_run),
        Some((&"status", _)) => status(),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    eprintln!("usage: wintune <command> [--dry-run]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  list                      show available tweaks and bundles");
    eprintln!("  apply <tweak|bundle>...   apply tweaks, snapshotting prior state");
    eprintln!("  rollback                  restore every snapshotted resource");
    eprintln!("  restore-defaults          apply catalog defaults where no snapshot exists");
    eprintln!("  status                    show pending snapshot entries");
}

fn list() {
    println!("tweaks:");
    for (id, tweak) in tweaks::all_tweaks() {
        let marker = if tweak.requires_elevation { " (admin)" } else { "" };
        println!("  {id}{marker}");
        println!("      {}", tweak.description);
    }
    println!("bundles:");
    for bundle in tweaks::bundles() {
        let ids: Vec<String> = bundle.tweaks.iter().map(|t| t.to_string()).collect();
        println!("  {} = [{}]", bundle.name, ids.join(", "));
    }
}

/// Expands bundle names and tweak ids into an ordered id list.
fn resolve(names: &[&str]) -> anyhow::Result<Vec<TweakId>> {
    let bundles = tweaks::bundles();
    let mut ids = Vec::new();
    for name in names {
        if let Some(bundle) = bundles.iter().find(|b| b.name == *name) {
            ids.extend(bundle.tweaks.iter().copied());
        } else {
            ids.push(
                name.parse::<TweakId>()
                    .map_err(|_| anyhow::anyhow!("unknown tweak or bundle '{name}'"))?,
            );
        }
    }
    Ok(ids)
}

fn ledger_path() -> anyhow::Result<PathBuf> {
    let exe = env::current_exe().context("failed to locate executable")?;
    Ok(exe
        .parent()
        .map(|dir| dir.join(LEDGER_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(LEDGER_FILE_NAME)))
}

/// A dry run captures from and restores into the throwaway memory adapter,
/// so it gets a scratch ledger file too. Flushing dry-run snapshots into the
/// durable ledger would poison a later real rollback.
fn session_ledger_path(dry_run: bool) -> anyhow::Result<PathBuf> {
    if dry_run {
        Ok(env::temp_dir().join("wintune_ledger.dry-run.json"))
    } else {
        ledger_path()
    }
}

#[cfg(windows)]
fn host_elevated() -> bool {
    wintune::utils::windows::is_elevated()
}

#[cfg(not(windows))]
fn host_elevated() -> bool {
    false
}

fn build_adapter(dry_run: bool) -> Arc<dyn ResourceAdapter> {
    #[cfg(windows)]
    if !dry_run {
        return Arc::new(wintune::adapter::windows::WindowsAdapter::new());
    }
    #[cfg(not(windows))]
    if !dry_run {
        warn!("not running on Windows; nothing will actually be changed");
    }
    Arc::new(MemoryAdapter::new())
}

fn run(request: EngineRequest, dry_run: bool) -> anyhow::Result<()> {
    let adapter = build_adapter(dry_run);
    let elevated = dry_run || host_elevated();
    let ledger = SnapshotLedger::load(session_ledger_path(dry_run)?);
    let ctx = OrchestratorContext::new(adapter, ledger, elevated);

    let engine = Engine::spawn(ctx);
    engine
        .submit(request)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    match engine.recv() {
        Some(EngineResponse::Applied(outcomes)) => report_outcomes(&outcomes),
        Some(EngineResponse::RolledBack(report)) => report_restore("rollback", &report),
        Some(EngineResponse::DefaultsRestored(report)) => {
            report_restore("restore-defaults", &report)
        }
        None => anyhow::bail!("worker exited without a result"),
    }
}

fn report_outcomes(outcomes: &[TweakOutcome]) -> anyhow::Result<()> {
    let mut failed = 0usize;
    for outcome in outcomes {
        if outcome.success {
            info!("{}: ok", outcome.name);
            for change in &outcome.changes {
                info!("  {change}");
            }
        } else {
            failed += 1;
            warn!(
                "{}: FAILED: {}",
                outcome.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    // A bundle succeeds only when zero operations reported an error, but the
    // siblings of a failed operation have still been applied.
    if failed > 0 {
        anyhow::bail!("{failed} of {} tweaks failed", outcomes.len());
    }
    Ok(())
}

fn report_restore(action: &str, report: &RestoreReport) -> anyhow::Result<()> {
    for resource in &report.restored {
        info!("restored {resource}");
    }
    for (resource, error) in &report.failed {
        warn!("failed to restore {resource}: {error}");
    }
    if !report.is_clean() {
        anyhow::bail!(
            "{action} incomplete: {} restored, {} failed; run again after fixing the cause",
            report.restored.len(),
            report.failed.len()
        );
    }
    info!("{action} complete ({} resources)", report.restored.len());
    Ok(())
}

fn status() -> anyhow::Result<()> {
    let ledger = SnapshotLedger::load(session_ledger_path(false)?);
    if ledger.is_empty() {
        println!("no pending snapshots; system is at its recorded baseline");
        return Ok(());
    }
    println!("{} snapshot entries pending rollback:", ledger.len());
    for entry in ledger.entries() {
        let prior = match &entry.prior_value {
            Some(value) => format!("{value}"),
            None => "absent".to_string(),
        };
        println!("  {} (prior: {prior})", entry.resource);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_ledger_never_aliases_the_durable_one() {
        let scratch = session_ledger_path(true).unwrap();
        let durable = session_ledger_path(false).unwrap();
        assert_ne!(scratch, durable);
        assert!(scratch.starts_with(env::temp_dir()));
    }
}
