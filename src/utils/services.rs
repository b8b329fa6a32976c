// src/utils/services.rs

use widestring::U16CString;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{ERROR_ACCESS_DENIED, ERROR_SERVICE_DOES_NOT_EXIST},
        System::Services::{
            ChangeServiceConfigW, CloseServiceHandle, OpenSCManagerW, OpenServiceW,
            QueryServiceConfigW, ENUM_SERVICE_TYPE, QUERY_SERVICE_CONFIGW, SC_HANDLE,
            SC_MANAGER_CONNECT, SERVICE_AUTO_START, SERVICE_CHANGE_CONFIG, SERVICE_DEMAND_START,
            SERVICE_DISABLED, SERVICE_ERROR, SERVICE_NO_CHANGE, SERVICE_QUERY_CONFIG,
        },
    },
};

use crate::{errors::AdapterError, resources::ServiceStartMode};

/// Closes the SCM/service handle on drop so every exit path releases it.
struct ScHandle(SC_HANDLE);

impl Drop for ScHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseServiceHandle(self.0);
        }
    }
}

fn classify(service: &str, err: windows::core::Error) -> AdapterError {
    if err.code() == ERROR_ACCESS_DENIED.to_hresult() {
        AdapterError::PermissionDenied(format!("service '{service}': {err}"))
    } else {
        AdapterError::Other(format!("service '{service}': {err}"))
    }
}

/// Opens `service` with the given access. `Ok(None)` when the service does
/// not exist; the SCM handle is returned alongside so it outlives the
/// service handle.
fn open_service(
    service: &str,
    access: u32,
) -> Result<Option<(ScHandle, ScHandle)>, AdapterError> {
    unsafe {
        let scm = OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT)
            .map_err(|e| AdapterError::Other(format!("failed to open service manager: {e}")))?;
        let scm = ScHandle(scm);
        let wide = U16CString::from_str(service)
            .map_err(|e| AdapterError::Other(format!("invalid service name '{service}': {e}")))?;
        match OpenServiceW(scm.0, PCWSTR::from_raw(wide.as_ptr()), access) {
            Ok(handle) => Ok(Some((scm, ScHandle(handle)))),
            Err(e) if e.code() == ERROR_SERVICE_DOES_NOT_EXIST.to_hresult() => Ok(None),
            Err(e) => Err(classify(service, e)),
        }
    }
}

/// Reads the configured start mode of `service`. `Ok(None)` when the service
/// does not exist.
pub fn query_start_mode(service: &str) -> Result<Option<ServiceStartMode>, AdapterError> {
    let Some((_scm, svc)) = open_service(service, SERVICE_QUERY_CONFIG)? else {
        return Ok(None);
    };
    unsafe {
        let mut needed = 0u32;
        // First call only sizes the buffer; the insufficient-buffer error is
        // the expected outcome.
        let _ = QueryServiceConfigW(svc.0, None, 0, &mut needed);
        // u64 backing keeps the buffer aligned for QUERY_SERVICE_CONFIGW.
        let mut buf = vec![0u64; (needed as usize + 7) / 8];
        QueryServiceConfigW(
            svc.0,
            Some(buf.as_mut_ptr() as *mut QUERY_SERVICE_CONFIGW),
            needed,
            &mut needed,
        )
        .map_err(|e| classify(service, e))?;
        let config = &*(buf.as_ptr() as *const QUERY_SERVICE_CONFIGW);
        let mode = match config.dwStartType {
            t if t == SERVICE_AUTO_START => ServiceStartMode::Auto,
            t if t == SERVICE_DEMAND_START => ServiceStartMode::Demand,
            t if t == SERVICE_DISABLED => ServiceStartMode::Disabled,
            other => {
                // Boot/system driver start types sit outside the catalog's
                // vocabulary and are never snapshot targets.
                return Err(AdapterError::Unsupported {
                    resource: format!("service '{service}' start mode"),
                    reason: format!("start type {} has no restorable mapping", other.0),
                });
            }
        };
        Ok(Some(mode))
    }
}

/// Sets the start mode of `service`, leaving every other configuration field
/// unchanged.
pub fn set_start_mode(service: &str, mode: ServiceStartMode) -> Result<(), AdapterError> {
    let Some((_scm, svc)) = open_service(service, SERVICE_CHANGE_CONFIG)? else {
        return Err(AdapterError::NotFound(format!(
            "service '{service}' does not exist"
        )));
    };
    let start_type = match mode {
        ServiceStartMode::Auto => SERVICE_AUTO_START,
        ServiceStartMode::Demand => SERVICE_DEMAND_START,
        ServiceStartMode::Disabled => SERVICE_DISABLED,
    };
    unsafe {
        ChangeServiceConfigW(
            svc.0,
            ENUM_SERVICE_TYPE(SERVICE_NO_CHANGE),
            start_type,
            SERVICE_ERROR(SERVICE_NO_CHANGE),
            PCWSTR::null(),
            PCWSTR::null(),
            None,
            PCWSTR::null(),
            PCWSTR::null(),
            PCWSTR::null(),
            PCWSTR::null(),
        )
        .map_err(|e| classify(service, e))
    }
}
