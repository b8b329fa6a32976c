// src/adapter/memory.rs

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::debug;

use crate::{
    adapter::ResourceAdapter,
    errors::AdapterError,
    resources::{ResourceRef, TypedValue},
    tweaks::CommandStep,
};

/// In-memory adapter backing `--dry-run` and the core tests.
///
/// Holds the whole resource space in a map; writes of `None` remove the
/// entry. Individual resources can be set up to fail writes with
/// `PermissionDenied`, and every executed command step is recorded so order
/// can be asserted.
#[derive(Default)]
pub struct MemoryAdapter {
    state: Mutex<HashMap<ResourceRef, TypedValue>>,
    denied_writes: Mutex<HashSet<ResourceRef>>,
    executed_commands: Mutex<Vec<String>>,
    failing_commands: Mutex<HashSet<String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates a resource, as if the setting already existed on the
    /// machine before the session.
    pub fn seed(&self, resource: ResourceRef, value: TypedValue) {
        self.state.lock().unwrap().insert(resource, value);
    }

    /// Makes every subsequent write to `resource` fail with
    /// `PermissionDenied`.
    pub fn deny_writes_to(&self, resource: ResourceRef) {
        self.denied_writes.lock().unwrap().insert(resource);
    }

    /// Makes the command whose program equals `program` fail.
    pub fn fail_command(&self, program: &str) {
        self.failing_commands
            .lock()
            .unwrap()
            .insert(program.to_string());
    }

    pub fn current(&self, resource: &ResourceRef) -> Option<TypedValue> {
        self.state.lock().unwrap().get(resource).cloned()
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.executed_commands.lock().unwrap().clone()
    }
}

impl ResourceAdapter for MemoryAdapter {
    fn read(&self, resource: &ResourceRef) -> Result<Option<TypedValue>, AdapterError> {
        Ok(self.state.lock().unwrap().get(resource).cloned())
    }

    fn write(
        &self,
        resource: &ResourceRef,
        value: Option<&TypedValue>,
    ) -> Result<(), AdapterError> {
        if self.denied_writes.lock().unwrap().contains(resource) {
            return Err(AdapterError::PermissionDenied(format!(
                "write to {resource} denied"
            )));
        }
        let mut state = self.state.lock().unwrap();
        match value {
            Some(v) => {
                debug!("dry-run write: {resource} = {v}");
                state.insert(resource.clone(), v.clone());
            }
            None => {
                debug!("dry-run delete: {resource}");
                state.remove(resource);
            }
        }
        Ok(())
    }

    fn run_command(&self, step: &CommandStep) -> Result<String, AdapterError> {
        let line = step.command_line();
        debug!("dry-run command: {line}");
        self.executed_commands.lock().unwrap().push(line.clone());
        if self.failing_commands.lock().unwrap().contains(&step.program) {
            return Err(AdapterError::Other(format!("command '{line}' failed")));
        }
        Ok(String::new())
    }
}
