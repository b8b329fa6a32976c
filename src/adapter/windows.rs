// src/adapter/windows.rs

use crate::{
    adapter::ResourceAdapter,
    errors::AdapterError,
    resources::{ResourceRef, TypedValue},
    tweaks::CommandStep,
    utils::{command, power, registry, services, tasks},
};

/// The live adapter: dispatches each resource kind to its OS primitive.
/// Stateless; every call goes straight to the OS with no caching or retry.
#[derive(Default)]
pub struct WindowsAdapter;

impl WindowsAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceAdapter for WindowsAdapter {
    fn read(&self, resource: &ResourceRef) -> Result<Option<TypedValue>, AdapterError> {
        match resource {
            ResourceRef::RegistryValue { hive, path, name } => {
                registry::read_value(*hive, path, name)
            }
            ResourceRef::ServiceStartMode { service } => {
                Ok(services::query_start_mode(service)?.map(TypedValue::StartMode))
            }
            ResourceRef::ActivePowerScheme => {
                Ok(Some(TypedValue::SchemeGuid(power::active_scheme()?)))
            }
            ResourceRef::ScheduledTask { task_path } => {
                Ok(tasks::task_enabled(task_path)?.map(TypedValue::Enabled))
            }
        }
    }

    fn write(
        &self,
        resource: &ResourceRef,
        value: Option<&TypedValue>,
    ) -> Result<(), AdapterError> {
        match (resource, value) {
            (ResourceRef::RegistryValue { hive, path, name }, Some(v)) => {
                registry::set_value(*hive, path, name, v)
            }
            (ResourceRef::RegistryValue { hive, path, name }, None) => {
                registry::delete_value(*hive, path, name)
            }
            (
                ResourceRef::ServiceStartMode { service },
                Some(TypedValue::StartMode(mode)),
            ) => services::set_start_mode(service, *mode),
            (ResourceRef::ActivePowerScheme, Some(TypedValue::SchemeGuid(guid))) => {
                power::set_active_scheme(guid)
            }
            (ResourceRef::ScheduledTask { task_path }, Some(TypedValue::Enabled(enabled))) => {
                tasks::set_task_enabled(task_path, *enabled)
            }
            // A snapshot taken while the service or task was absent restores
            // to "absent"; when it still is, the end state is already right.
            (ResourceRef::ServiceStartMode { service }, None) => {
                match services::query_start_mode(service)? {
                    None => Ok(()),
                    Some(_) => Err(AdapterError::Unsupported {
                        resource: resource.to_string(),
                        reason: "an installed service cannot be deleted".to_string(),
                    }),
                }
            }
            (ResourceRef::ScheduledTask { task_path }, None) => {
                match tasks::task_enabled(task_path)? {
                    None => Ok(()),
                    Some(_) => Err(AdapterError::Unsupported {
                        resource: resource.to_string(),
                        reason: "a registered task cannot be deleted".to_string(),
                    }),
                }
            }
            (ResourceRef::ActivePowerScheme, None) => Err(AdapterError::Unsupported {
                resource: resource.to_string(),
                reason: "the active power scheme cannot be deleted".to_string(),
            }),
            (resource, Some(v)) => Err(AdapterError::Unsupported {
                resource: resource.to_string(),
                reason: format!("value {v} does not fit this resource kind"),
            }),
        }
    }

    fn run_command(&self, step: &CommandStep) -> Result<String, AdapterError> {
        let args: Vec<&str> = step.args.iter().map(String::as_str).collect();
        command::run(&step.program, &args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Services like Fax or TabletInputService are absent on many installs;
    // their snapshots restore to "absent" and must not wedge a rollback.
    #[test]
    fn restoring_an_absent_service_to_absent_is_success() {
        let adapter = WindowsAdapter::new();
        let resource = ResourceRef::service("WintuneNoSuchService");
        assert_eq!(adapter.read(&resource).unwrap(), None);
        adapter
            .write(&resource, None)
            .expect("absent-to-absent restore failed");
    }

    #[test]
    fn active_power_scheme_cannot_be_deleted() {
        let adapter = WindowsAdapter::new();
        let err = adapter
            .write(&ResourceRef::ActivePowerScheme, None)
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported { .. }));
    }
}
