// src/resources.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

/// Predefined registry roots. Parsed from the conventional `HKEY_*` prefixes
/// used throughout the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryHive {
    ClassesRoot,
    CurrentConfig,
    CurrentUser,
    LocalMachine,
    Users,
}

impl RegistryHive {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "HKEY_CLASSES_ROOT" | "HKCR" => Some(Self::ClassesRoot),
            "HKEY_CURRENT_CONFIG" | "HKCC" => Some(Self::CurrentConfig),
            "HKEY_CURRENT_USER" | "HKCU" => Some(Self::CurrentUser),
            "HKEY_LOCAL_MACHINE" | "HKLM" => Some(Self::LocalMachine),
            "HKEY_USERS" | "HKU" => Some(Self::Users),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKEY_CLASSES_ROOT",
            Self::CurrentConfig => "HKEY_CURRENT_CONFIG",
            Self::CurrentUser => "HKEY_CURRENT_USER",
            Self::LocalMachine => "HKEY_LOCAL_MACHINE",
            Self::Users => "HKEY_USERS",
        }
    }
}

impl fmt::Display for RegistryHive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one mutable OS setting. Equality is by variant plus identifying
/// fields; this is the key of the snapshot ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRef {
    /// A named value under a registry key.
    RegistryValue {
        hive: RegistryHive,
        path: String,
        name: String,
    },
    /// The start mode of a named Windows service.
    ServiceStartMode { service: String },
    /// The machine-wide active power scheme.
    ActivePowerScheme,
    /// The enabled state of a named scheduled task.
    ScheduledTask { task_path: String },
}

impl ResourceRef {
    pub fn registry(hive: RegistryHive, path: &str, name: &str) -> Self {
        Self::RegistryValue {
            hive,
            path: path.to_string(),
            name: name.to_string(),
        }
    }

    pub fn service(service: &str) -> Self {
        Self::ServiceStartMode {
            service: service.to_string(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryValue { hive, path, name } => {
                write!(f, "{hive}\\{path}\\{name}")
            }
            Self::ServiceStartMode { service } => write!(f, "service '{service}' start mode"),
            Self::ActivePowerScheme => write!(f, "active power scheme"),
            Self::ScheduledTask { task_path } => write!(f, "scheduled task '{task_path}'"),
        }
    }
}

/// Start modes accepted by the service control manager, in the `sc config
/// start=` vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceStartMode {
    Auto,
    Demand,
    Disabled,
}

/// A value together with its storage type, so that capture -> restore
/// round-trips preserve the original representation (a REG_SZ "0" is never
/// written back as a DWORD 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    /// 32-bit registry value.
    Dword(u32),
    /// REG_SZ registry value.
    String(String),
    /// REG_BINARY registry value.
    Binary(Vec<u8>),
    /// Service start mode.
    StartMode(ServiceStartMode),
    /// Power scheme GUID.
    SchemeGuid(String),
    /// Scheduled task enabled state.
    Enabled(bool),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dword(v) => write!(f, "{v:#x}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Binary(b) => write!(f, "{} bytes", b.len()),
            Self::StartMode(m) => write!(f, "{m}"),
            Self::SchemeGuid(g) => f.write_str(g),
            Self::Enabled(e) => write!(f, "{}", if *e { "enabled" } else { "disabled" }),
        }
    }
}
