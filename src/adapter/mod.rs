// src/adapter/mod.rs

pub mod memory;
#[cfg(windows)]
pub mod windows;

use crate::{
    errors::AdapterError,
    resources::{ResourceRef, TypedValue},
    tweaks::CommandStep,
};

/// Uniform read/write interface over heterogeneous OS settings, plus
/// execution of the external commands a tweak declares.
///
/// Writes are externally observable immediately; there is no buffering and
/// no retrying at this layer. Every attempt is one-shot.
pub trait ResourceAdapter: Send + Sync {
    /// Reads the current value of `resource`.
    ///
    /// Returns `Ok(None)` when the underlying setting does not currently
    /// exist (registry value unset, service absent); absence is not an error.
    fn read(&self, resource: &ResourceRef) -> Result<Option<TypedValue>, AdapterError>;

    /// Writes `value` to `resource`. `None` deletes/unsets the setting;
    /// `Some` creates or overwrites it, preserving the carried storage type.
    fn write(
        &self,
        resource: &ResourceRef,
        value: Option<&TypedValue>,
    ) -> Result<(), AdapterError>;

    /// Runs one declared external command step, bounded by the command
    /// timeout. Returns the command's textual output on success.
    fn run_command(&self, step: &CommandStep) -> Result<String, AdapterError>;
}
