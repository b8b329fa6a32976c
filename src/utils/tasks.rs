// src/utils/tasks.rs

use crate::{errors::AdapterError, utils::command};

/// Reads the enabled state of a scheduled task. `Ok(None)` when the task
/// does not exist.
pub fn task_enabled(task_path: &str) -> Result<Option<bool>, AdapterError> {
    let output = match command::run("schtasks", &["/query", "/tn", task_path, "/fo", "LIST"]) {
        Ok(output) => output,
        // schtasks exits nonzero for an unknown task name.
        Err(AdapterError::Other(msg)) if msg.to_lowercase().contains("cannot find") => {
            return Ok(None)
        }
        Err(e) => return Err(e),
    };
    for line in output.lines() {
        if let Some(status) = line.trim().strip_prefix("Status:") {
            return Ok(Some(!status.trim().eq_ignore_ascii_case("disabled")));
        }
    }
    Err(AdapterError::Other(format!(
        "unexpected schtasks output for '{task_path}'"
    )))
}

/// Enables or disables a scheduled task.
pub fn set_task_enabled(task_path: &str, enabled: bool) -> Result<(), AdapterError> {
    let flag = if enabled { "/enable" } else { "/disable" };
    match command::run("schtasks", &["/change", "/tn", task_path, flag]) {
        Ok(_) => Ok(()),
        Err(AdapterError::Other(msg)) if msg.to_lowercase().contains("cannot find") => {
            Err(AdapterError::NotFound(format!(
                "scheduled task '{task_path}' does not exist"
            )))
        }
        Err(e) => Err(e),
    }
}
