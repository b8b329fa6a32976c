// src/ledger.rs

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    adapter::ResourceAdapter,
    constants::LEDGER_SCHEMA,
    errors::{AdapterError, LedgerError},
    resources::{ResourceRef, TypedValue},
};

/// The state of one resource immediately before its first mutation in a
/// session. `prior_exists == false` means the resource was absent and must be
/// deleted on rollback, not reset to some value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub resource: ResourceRef,
    pub prior_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_value: Option<TypedValue>,
}

/// Serialized form of the ledger file.
#[derive(Serialize, Deserialize)]
struct LedgerFile {
    schema: String,
    entries: Vec<SnapshotEntry>,
}

/// Outcome of a restore pass. Partial failures are expected and reported per
/// resource; the pass never stops early.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<ResourceRef>,
    pub failed: Vec<(ResourceRef, String)>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Persisted record of pre-mutation resource states.
///
/// Append-only during a session, first-write-wins per resource, flushed to a
/// durable JSON file after every operation so a crash mid-bundle never loses
/// the ability to roll back completed mutations. Not safe for concurrent
/// capture; the orchestrator guarantees a single mutator at a time.
pub struct SnapshotLedger {
    entries: IndexMap<ResourceRef, SnapshotEntry>,
    path: PathBuf,
}

impl SnapshotLedger {
    /// Loads the ledger at `path`. A missing file yields an empty ledger; an
    /// unreadable or wrong-schema file is preserved on disk but ignored, with
    /// a warning, so a bad file never blocks startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_file(&path) {
            Ok(Some(entries)) => {
                info!(
                    "loaded snapshot ledger with {} entries from {}",
                    entries.len(),
                    path.display()
                );
                entries
            }
            Ok(None) => IndexMap::new(),
            Err(err) => {
                warn!(
                    "ignoring unreadable ledger file {}: {err}",
                    path.display()
                );
                IndexMap::new()
            }
        };
        Self { entries, path }
    }

    fn read_file(path: &Path) -> Result<Option<IndexMap<ResourceRef, SnapshotEntry>>, LedgerError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = fs::File::open(path)?;
        let doc: LedgerFile = serde_json::from_reader(file)?;
        let major = doc.schema.rsplit(".v").next().unwrap_or("");
        let expected = LEDGER_SCHEMA.rsplit(".v").next().unwrap_or("");
        if !doc.schema.starts_with("wintune_ledger.v") || major != expected {
            return Err(LedgerError::UnsupportedSchema(doc.schema));
        }
        Ok(Some(
            doc.entries
                .into_iter()
                .map(|e| (e.resource.clone(), e))
                .collect(),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.entries.contains_key(resource)
    }

    pub fn entry(&self, resource: &ResourceRef) -> Option<&SnapshotEntry> {
        self.entries.get(resource)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.values()
    }

    /// Records the current state of `resource` unless an entry already
    /// exists. Idempotent by contract: multiple operations touching the same
    /// resource keep the snapshot taken before the *first* mutation, so
    /// rollback reaches the pre-session state rather than an intermediate
    /// one.
    pub fn capture(
        &mut self,
        resource: &ResourceRef,
        adapter: &dyn ResourceAdapter,
    ) -> Result<(), AdapterError> {
        if self.entries.contains_key(resource) {
            debug!("snapshot for {resource} already captured, skipping");
            return Ok(());
        }
        let prior_value = adapter.read(resource)?;
        debug!(
            "captured {resource}: {}",
            match &prior_value {
                Some(v) => format!("{v}"),
                None => "absent".to_string(),
            }
        );
        self.entries.insert(
            resource.clone(),
            SnapshotEntry {
                resource: resource.clone(),
                prior_exists: prior_value.is_some(),
                prior_value,
            },
        );
        Ok(())
    }

    /// Serializes the full ledger to its file, write-temp-then-rename with an
    /// fsync so a crash leaves either the old or the new file, never a torn
    /// one.
    pub fn flush(&self) -> Result<(), LedgerError> {
        let doc = LedgerFile {
            schema: LEDGER_SCHEMA.to_string(),
            entries: self.entries.values().cloned().collect(),
        };
        let tmp = self.path.with_extension("json.tmp");
        let file = fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(&file, &doc)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "flushed {} snapshot entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Writes every captured prior state back through the adapter. Entries
    /// are independent; a failure on one never stops the others. The ledger
    /// is left intact either way; the caller decides whether to clear it.
    pub fn restore_all(&self, adapter: &dyn ResourceAdapter) -> RestoreReport {
        let mut report = RestoreReport::default();
        for entry in self.entries.values() {
            let value = if entry.prior_exists {
                entry.prior_value.as_ref()
            } else {
                None
            };
            match adapter.write(&entry.resource, value) {
                Ok(()) => {
                    info!(
                        "restored {} to {}",
                        entry.resource,
                        match value {
                            Some(v) => format!("{v}"),
                            None => "absent".to_string(),
                        }
                    );
                    report.restored.push(entry.resource.clone());
                }
                Err(err) => {
                    error!("failed to restore {}: {err}", entry.resource);
                    report.failed.push((entry.resource.clone(), err.to_string()));
                }
            }
        }
        report
    }

    /// Empties the ledger and removes its file. Only called after a restore
    /// pass with zero failures.
    pub fn clear(&mut self) -> Result<(), LedgerError> {
        self.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::MemoryAdapter;
    use crate::resources::RegistryHive;

    fn reg(name: &str) -> ResourceRef {
        ResourceRef::registry(RegistryHive::CurrentUser, "Software\\Test", name)
    }

    fn ledger_in(dir: &tempfile::TempDir) -> SnapshotLedger {
        SnapshotLedger::load(dir.path().join("ledger.json"))
    }

    #[test]
    fn missing_file_yields_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        assert!(ledger.is_empty());
    }

    #[test]
    fn capture_is_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = MemoryAdapter::new();
        let mut ledger = ledger_in(&dir);

        adapter.seed(reg("A"), TypedValue::Dword(7));
        ledger.capture(&reg("A"), &adapter).unwrap();

        // Mutate, then capture again: the original snapshot must survive.
        adapter.write(&reg("A"), Some(&TypedValue::Dword(99))).unwrap();
        ledger.capture(&reg("A"), &adapter).unwrap();

        assert_eq!(ledger.len(), 1);
        let entry = ledger.entry(&reg("A")).unwrap();
        assert!(entry.prior_exists);
        assert_eq!(entry.prior_value, Some(TypedValue::Dword(7)));
    }

    #[test]
    fn capture_of_absent_resource_records_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = MemoryAdapter::new();
        let mut ledger = ledger_in(&dir);

        ledger.capture(&reg("Missing"), &adapter).unwrap();
        let entry = ledger.entry(&reg("Missing")).unwrap();
        assert!(!entry.prior_exists);
        assert_eq!(entry.prior_value, None);
    }

    #[test]
    fn restore_round_trip_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = MemoryAdapter::new();
        let mut ledger = ledger_in(&dir);

        adapter.seed(reg("Existing"), TypedValue::String("before".into()));
        for name in ["Existing", "Absent"] {
            ledger.capture(&reg(name), &adapter).unwrap();
            adapter
                .write(&reg(name), Some(&TypedValue::Dword(1)))
                .unwrap();
        }

        let report = ledger.restore_all(&adapter);
        assert!(report.is_clean());
        assert_eq!(report.restored.len(), 2);
        assert_eq!(
            adapter.current(&reg("Existing")),
            Some(TypedValue::String("before".into()))
        );
        // Initially absent: restored to absent, not written back as zero.
        assert_eq!(adapter.current(&reg("Absent")), None);
    }

    #[test]
    fn flush_and_load_behave_identically_across_processes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let adapter = MemoryAdapter::new();

        let mut ledger = SnapshotLedger::load(&path);
        adapter.seed(reg("Kept"), TypedValue::Dword(3));
        ledger.capture(&reg("Kept"), &adapter).unwrap();
        ledger.capture(&reg("Gone"), &adapter).unwrap();
        adapter.write(&reg("Kept"), Some(&TypedValue::Dword(9))).unwrap();
        adapter.write(&reg("Gone"), Some(&TypedValue::Dword(9))).unwrap();
        ledger.flush().unwrap();
        drop(ledger);

        // Fresh "process": reload from disk and restore.
        let reloaded = SnapshotLedger::load(&path);
        assert_eq!(reloaded.len(), 2);
        let report = reloaded.restore_all(&adapter);
        assert!(report.is_clean());
        assert_eq!(adapter.current(&reg("Kept")), Some(TypedValue::Dword(3)));
        assert_eq!(adapter.current(&reg("Gone")), None);
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not json").unwrap();
        let ledger = SnapshotLedger::load(&path);
        assert!(ledger.is_empty());
        // The corrupt file is left in place until a flush replaces it.
        assert!(path.exists());
    }

    #[test]
    fn wrong_schema_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"schema":"wintune_ledger.v2","entries":[]}"#).unwrap();
        assert!(SnapshotLedger::load(&path).is_empty());
    }

    #[test]
    fn partial_restore_failure_keeps_failed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = MemoryAdapter::new();
        let mut ledger = ledger_in(&dir);

        adapter.seed(reg("Ok"), TypedValue::Dword(1));
        adapter.seed(reg("Denied"), TypedValue::Dword(2));
        ledger.capture(&reg("Ok"), &adapter).unwrap();
        ledger.capture(&reg("Denied"), &adapter).unwrap();
        ledger.flush().unwrap();
        adapter.deny_writes_to(reg("Denied"));

        let report = ledger.restore_all(&adapter);
        assert_eq!(report.restored, vec![reg("Ok")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, reg("Denied"));

        // Ledger (and its file) still hold the failed entry for retry.
        assert!(ledger.contains(&reg("Denied")));
        let reloaded = SnapshotLedger::load(ledger.path());
        assert!(reloaded.contains(&reg("Denied")));
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = MemoryAdapter::new();
        let mut ledger = ledger_in(&dir);
        ledger.capture(&reg("A"), &adapter).unwrap();
        ledger.flush().unwrap();
        assert!(ledger.path().exists());

        ledger.clear().unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.path().exists());
        // Clearing twice is fine.
        ledger.clear().unwrap();
    }
}
