// src/orchestrator.rs

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use crossbeam::channel;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    adapter::ResourceAdapter,
    ledger::{RestoreReport, SnapshotLedger},
    tweaks::{self, Tweak, TweakId},
};

/// Result of one tweak invocation. Always produced: a failing tweak reports
/// here instead of raising, so sibling tweaks in a bundle still run.
#[derive(Debug)]
pub struct TweakOutcome {
    pub id: TweakId,
    pub name: &'static str,
    pub success: bool,
    pub changes: Vec<String>,
    pub error: Option<String>,
}

impl TweakOutcome {
    fn failure(tweak: &Tweak, error: String) -> Self {
        Self {
            id: tweak.id,
            name: tweak.name,
            success: false,
            changes: Vec::new(),
            error: Some(error),
        }
    }
}

/// Per-session execution state. `&mut self` on the run methods already rules
/// out overlap; the enum exists so "no concurrent running and rolling back"
/// is checkable rather than implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Running,
    RollingBack,
}

/// Coordinates catalog, ledger and adapter. Constructed once per process with
/// injected collaborators; no process-wide singletons. The elevation fact is
/// read once at construction, not per operation.
pub struct OrchestratorContext {
    adapter: Arc<dyn ResourceAdapter>,
    ledger: SnapshotLedger,
    elevated: bool,
    state: SessionState,
}

impl OrchestratorContext {
    pub fn new(adapter: Arc<dyn ResourceAdapter>, ledger: SnapshotLedger, elevated: bool) -> Self {
        Self {
            adapter,
            ledger,
            elevated,
            state: SessionState::Idle,
        }
    }

    pub fn elevated(&self) -> bool {
        self.elevated
    }

    pub fn ledger(&self) -> &SnapshotLedger {
        &self.ledger
    }

    /// Runs a single tweak: elevation gate, snapshot capture for every
    /// declared resource, then the writes and command steps. Adapter and
    /// command errors are folded into the outcome, never raised past this
    /// call.
    pub fn run_one(&mut self, tweak: &Tweak) -> TweakOutcome {
        assert_eq!(self.state, SessionState::Idle, "operation already in flight");
        self.state = SessionState::Running;
        let outcome = self.run_one_inner(tweak);
        if let Err(err) = self.ledger.flush() {
            // The in-memory ledger still covers this session; only
            // rollback-after-crash is at risk.
            error!("failed to flush ledger after {}: {err}", tweak.id);
        }
        self.state = SessionState::Idle;
        outcome
    }

    fn run_one_inner(&mut self, tweak: &Tweak) -> TweakOutcome {
        info!("applying '{}'", tweak.name);

        if tweak.requires_elevation && !self.elevated {
            warn!("'{}' requires elevation, skipping", tweak.name);
            // Nothing has run, so nothing is captured.
            return TweakOutcome::failure(
                tweak,
                "elevation required: re-run as administrator".to_string(),
            );
        }

        // Capture before any side effect, including command-driven ones.
        for resource in tweak.resources() {
            if let Err(err) = self.ledger.capture(resource, self.adapter.as_ref()) {
                return TweakOutcome::failure(
                    tweak,
                    format!("failed to snapshot {resource}: {err}"),
                );
            }
        }

        let mut changes = Vec::new();
        let mut first_error: Option<String> = None;

        for write in &tweak.writes {
            match self.adapter.write(&write.resource, write.value.as_ref()) {
                Ok(()) => changes.push(write.change.clone()),
                Err(err) => {
                    error!("'{}': write to {} failed: {err}", tweak.name, write.resource);
                    first_error = Some(format!("{}: {err}", write.resource));
                    break;
                }
            }
        }

        if first_error.is_none() {
            for step in &tweak.commands {
                match self.adapter.run_command(step) {
                    Ok(_) => changes.push(step.change.clone()),
                    Err(err) if step.best_effort => {
                        warn!("'{}': {} failed: {err}", tweak.name, step.command_line());
                    }
                    Err(err) => {
                        error!("'{}': {} failed: {err}", tweak.name, step.command_line());
                        first_error = Some(format!("{}: {err}", step.command_line()));
                        break;
                    }
                }
            }
        }

        let success = first_error.is_none();
        if success {
            info!("'{}' applied ({} changes)", tweak.name, changes.len());
        }
        TweakOutcome {
            id: tweak.id,
            name: tweak.name,
            success,
            changes,
            error: first_error,
        }
    }

    /// Runs tweaks in order, always continuing after a failure. The ledger is
    /// flushed after each tweak (inside `run_one`) so a crash mid-bundle
    /// leaves every completed mutation restorable.
    pub fn run_bundle(&mut self, tweaks: &[&Tweak]) -> Vec<TweakOutcome> {
        tweaks.iter().map(|t| self.run_one(t)).collect()
    }

    /// Restores every captured snapshot. The ledger and its file are cleared
    /// only when *all* resources restored; any failure leaves them intact so
    /// the restore can be retried.
    pub fn rollback(&mut self) -> RestoreReport {
        assert_eq!(self.state, SessionState::Idle, "operation already in flight");
        self.state = SessionState::RollingBack;
        info!("rolling back {} snapshot entries", self.ledger.len());
        let report = self.ledger.restore_all(self.adapter.as_ref());
        if report.is_clean() {
            if let Err(err) = self.ledger.clear() {
                error!("restore succeeded but clearing the ledger failed: {err}");
            }
        } else {
            warn!(
                "rollback incomplete: {} restored, {} failed; ledger retained for retry",
                report.restored.len(),
                report.failed.len()
            );
            if let Err(err) = self.ledger.flush() {
                error!("failed to re-flush retained ledger: {err}");
            }
        }
        self.state = SessionState::Idle;
        report
    }

    /// Lower-priority fallback for machines whose ledger is gone: applies the
    /// catalog's factory defaults, but only to resources with no snapshot
    /// entry.
    pub fn restore_defaults(&mut self) -> RestoreReport {
        assert_eq!(self.state, SessionState::Idle, "operation already in flight");
        self.state = SessionState::Running;
        let mut report = RestoreReport::default();
        for write in tweaks::definitions::catalog_defaults() {
            if self.ledger.contains(&write.resource) {
                info!(
                    "skipping default for {}: snapshot entry exists",
                    write.resource
                );
                continue;
            }
            match self.adapter.write(&write.resource, write.value.as_ref()) {
                Ok(()) => {
                    info!("{}", write.change);
                    report.restored.push(write.resource.clone());
                }
                Err(err) => {
                    error!("default restore of {} failed: {err}", write.resource);
                    report.failed.push((write.resource.clone(), err.to_string()));
                }
            }
        }
        self.state = SessionState::Idle;
        report
    }
}

/// Requests accepted by the engine worker.
#[derive(Debug, Clone)]
pub enum EngineRequest {
    Apply(Vec<TweakId>),
    Rollback,
    RestoreDefaults,
}

/// Terminal responses, one per accepted request.
#[derive(Debug)]
pub enum EngineResponse {
    Applied(Vec<TweakOutcome>),
    RolledBack(RestoreReport),
    DefaultsRestored(RestoreReport),
}

/// Returned when a request arrives while another is still in flight.
/// Requests are rejected immediately rather than queued.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a request is already in flight")]
pub struct Busy;

/// Single background worker wrapping an [`OrchestratorContext`] so a UI or
/// CLI thread stays responsive. One request runs to completion before the
/// next is accepted; there is no cancellation mid-operation.
pub struct Engine {
    request_tx: channel::Sender<EngineRequest>,
    response_rx: channel::Receiver<EngineResponse>,
    in_flight: Arc<AtomicBool>,
}

impl Engine {
    pub fn spawn(mut ctx: OrchestratorContext) -> Self {
        let (request_tx, request_rx) = channel::unbounded::<EngineRequest>();
        let (response_tx, response_rx) = channel::unbounded::<EngineResponse>();
        let in_flight = Arc::new(AtomicBool::new(false));
        let worker_flag = Arc::clone(&in_flight);

        thread::spawn(move || {
            let catalog = tweaks::all_tweaks();
            for request in request_rx {
                let response = match request {
                    EngineRequest::Apply(ids) => {
                        let selected: Vec<&Tweak> =
                            ids.iter().filter_map(|id| catalog.get(id)).collect();
                        EngineResponse::Applied(ctx.run_bundle(&selected))
                    }
                    EngineRequest::Rollback => EngineResponse::RolledBack(ctx.rollback()),
                    EngineRequest::RestoreDefaults => {
                        EngineResponse::DefaultsRestored(ctx.restore_defaults())
                    }
                };
                if response_tx.send(response).is_err() {
                    break;
                }
                worker_flag.store(false, Ordering::SeqCst);
            }
        });

        Self {
            request_tx,
            response_rx,
            in_flight,
        }
    }

    /// Submits a request, or rejects it with [`Busy`] when one is in flight.
    pub fn submit(&self, request: EngineRequest) -> Result<(), Busy> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(Busy);
        }
        if self.request_tx.send(request).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(Busy);
        }
        Ok(())
    }

    /// Non-blocking poll for the next finished response.
    pub fn try_recv(&self) -> Option<EngineResponse> {
        self.response_rx.try_recv().ok()
    }

    /// Blocks until the in-flight request finishes.
    pub fn recv(&self) -> Option<EngineResponse> {
        self.response_rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::MemoryAdapter;
    use crate::resources::{RegistryHive, ResourceRef, ServiceStartMode, TypedValue};
    use crate::tweaks::definitions;

    fn context(adapter: Arc<MemoryAdapter>, dir: &tempfile::TempDir, elevated: bool) -> OrchestratorContext {
        let ledger = SnapshotLedger::load(dir.path().join("ledger.json"));
        OrchestratorContext::new(adapter, ledger, elevated)
    }

    fn game_bar(name: &str) -> ResourceRef {
        ResourceRef::registry(RegistryHive::CurrentUser, "Software\\Microsoft\\GameBar", name)
    }

    #[test]
    fn game_mode_rollback_deletes_initially_absent_values() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let mut ctx = context(Arc::clone(&adapter), &dir, false);

        let outcome = ctx.run_one(&definitions::game_mode());
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(
            adapter.current(&game_bar("AllowAutoGameMode")),
            Some(TypedValue::Dword(1))
        );
        assert_eq!(
            adapter.current(&game_bar("AutoGameModeEnabled")),
            Some(TypedValue::Dword(1))
        );

        let report = ctx.rollback();
        assert!(report.is_clean());
        // Key was initially absent: values deleted, not written back as 0.
        assert_eq!(adapter.current(&game_bar("AllowAutoGameMode")), None);
        assert_eq!(adapter.current(&game_bar("AutoGameModeEnabled")), None);
    }

    #[test]
    fn elevation_gate_fails_fast_without_touching_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let mut ctx = context(Arc::clone(&adapter), &dir, false);

        let outcome = ctx.run_one(&definitions::disable_services());
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("elevation"));
        assert!(ctx.ledger().is_empty());
        assert!(adapter.executed_commands().is_empty());
    }

    #[test]
    fn bundle_continues_past_a_failing_tweak() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        // Deny one of the input-lag writes to force a mid-bundle failure.
        adapter.deny_writes_to(ResourceRef::registry(
            RegistryHive::LocalMachine,
            "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Multimedia\\SystemProfile",
            "SystemResponsiveness",
        ));
        let mut ctx = context(Arc::clone(&adapter), &dir, true);

        let catalog = tweaks::all_tweaks();
        let bundle: Vec<&Tweak> = [TweakId::InputLag, TweakId::GameMode, TweakId::MouseAcceleration]
            .iter()
            .map(|id| &catalog[id])
            .collect();
        let outcomes = ctx.run_bundle(&bundle);

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("permission denied"));
        assert!(outcomes[1].success);
        assert!(outcomes[2].success);
    }

    #[test]
    fn double_run_restores_pre_first_run_start_modes() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        adapter.seed(
            ResourceRef::service("SysMain"),
            TypedValue::StartMode(ServiceStartMode::Auto),
        );
        adapter.seed(
            ResourceRef::service("WSearch"),
            TypedValue::StartMode(ServiceStartMode::Demand),
        );
        let mut ctx = context(Arc::clone(&adapter), &dir, true);

        // Run twice: the second run's captures must be no-ops.
        let tweak = definitions::disable_services();
        assert!(ctx.run_one(&tweak).success);
        let entries_after_first = ctx.ledger().len();
        assert!(ctx.run_one(&tweak).success);
        assert_eq!(ctx.ledger().len(), entries_after_first);

        let report = ctx.rollback();
        assert!(report.is_clean());
        assert_eq!(
            adapter.current(&ResourceRef::service("SysMain")),
            Some(TypedValue::StartMode(ServiceStartMode::Auto))
        );
        assert_eq!(
            adapter.current(&ResourceRef::service("WSearch")),
            Some(TypedValue::StartMode(ServiceStartMode::Demand))
        );
    }

    #[test]
    fn failed_rollback_retains_ledger_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let mut ctx = context(Arc::clone(&adapter), &dir, false);

        assert!(ctx.run_one(&definitions::game_mode()).success);
        adapter.deny_writes_to(game_bar("AllowAutoGameMode"));

        let report = ctx.rollback();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.restored.len(), 2);
        assert!(!ctx.ledger().is_empty());
        assert!(ctx.ledger().path().exists());
        assert!(ctx
            .ledger()
            .entries()
            .any(|e| e.resource == game_bar("AllowAutoGameMode")));
    }

    #[test]
    fn clean_rollback_clears_ledger_file() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let mut ctx = context(Arc::clone(&adapter), &dir, false);

        assert!(ctx.run_one(&definitions::mouse_acceleration()).success);
        assert!(ctx.ledger().path().exists());

        let report = ctx.rollback();
        assert!(report.is_clean());
        assert!(ctx.ledger().is_empty());
        assert!(!ctx.ledger().path().exists());
    }

    #[test]
    fn defaults_skip_resources_with_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        adapter.seed(
            ResourceRef::ActivePowerScheme,
            TypedValue::SchemeGuid("original-scheme".into()),
        );
        let mut ctx = context(Arc::clone(&adapter), &dir, true);

        // The power tweak snapshots the active scheme.
        assert!(ctx.run_one(&definitions::high_performance_power()).success);
        let report = ctx.restore_defaults();

        // Snapshot present for the scheme, so the balanced default must not
        // override it; the two service defaults have no snapshot and apply.
        assert!(!report.restored.contains(&ResourceRef::ActivePowerScheme));
        assert_eq!(report.restored.len(), 2);
        assert_eq!(
            adapter.current(&ResourceRef::ActivePowerScheme),
            Some(TypedValue::SchemeGuid(
                crate::constants::HIGH_PERFORMANCE_SCHEME.into()
            ))
        );
    }

    #[test]
    fn restore_defaults_returns_the_context_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let mut ctx = context(Arc::clone(&adapter), &dir, true);

        assert!(ctx.run_one(&definitions::game_mode()).success);
        assert!(ctx.restore_defaults().is_clean());
        // A follow-up operation must not trip the in-flight assertion.
        assert!(ctx.rollback().is_clean());
    }

    #[test]
    fn command_steps_run_after_writes() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let mut ctx = context(Arc::clone(&adapter), &dir, true);

        assert!(ctx.run_one(&definitions::disable_services()).success);
        let commands = adapter.executed_commands();
        assert_eq!(commands.len(), 6);
        assert!(commands[0].starts_with("sc stop"));
    }

    #[test]
    fn engine_rejects_second_request_while_busy() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MemoryAdapter::new());
        let ctx = context(adapter, &dir, true);
        let engine = Engine::spawn(ctx);

        engine.submit(EngineRequest::Apply(vec![TweakId::GameMode])).unwrap();
        // Immediately after an accepted submit the engine is busy; a second
        // request is rejected, not queued.
        let second = engine.submit(EngineRequest::Rollback);
        assert!(matches!(engine.recv(), Some(EngineResponse::Applied(_))));
        match second {
            Err(busy) => assert_eq!(busy, Busy),
            // Tiny requests can finish before the second submit lands; then
            // the rollback was legitimately accepted and must also complete.
            Ok(()) => assert!(matches!(engine.recv(), Some(EngineResponse::RolledBack(_)))),
        }
    }
}
