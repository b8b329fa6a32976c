// src/utils/registry.rs

use winreg::{
    enums::{
        RegType::{REG_BINARY, REG_DWORD, REG_SZ},
        HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
        KEY_READ, KEY_WRITE,
    },
    RegKey, RegValue,
};

use crate::{
    errors::AdapterError,
    resources::{RegistryHive, TypedValue},
};

fn hive_key(hive: RegistryHive) -> RegKey {
    RegKey::predef(match hive {
        RegistryHive::ClassesRoot => HKEY_CLASSES_ROOT,
        RegistryHive::CurrentConfig => HKEY_CURRENT_CONFIG,
        RegistryHive::CurrentUser => HKEY_CURRENT_USER,
        RegistryHive::LocalMachine => HKEY_LOCAL_MACHINE,
        RegistryHive::Users => HKEY_USERS,
    })
}

/// Reads a named registry value. A missing parent key or value name is
/// "absent" (`Ok(None)`), never an error.
pub fn read_value(
    hive: RegistryHive,
    path: &str,
    name: &str,
) -> Result<Option<TypedValue>, AdapterError> {
    let subkey = match hive_key(hive).open_subkey_with_flags(path, KEY_READ) {
        Ok(key) => key,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AdapterError::from_io(
                &format!("failed to open '{hive}\\{path}'"),
                e,
            ))
        }
    };
    match subkey.get_raw_value(name) {
        Ok(raw) => decode(raw, name).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AdapterError::from_io(
            &format!("failed to read '{name}' from '{hive}\\{path}'"),
            e,
        )),
    }
}

/// Creates or overwrites a named registry value, creating intermediate keys
/// as needed and preserving the value's storage type.
pub fn set_value(
    hive: RegistryHive,
    path: &str,
    name: &str,
    value: &TypedValue,
) -> Result<(), AdapterError> {
    let (key, _) = hive_key(hive).create_subkey(path).map_err(|e| {
        AdapterError::from_io(&format!("failed to create or open '{hive}\\{path}'"), e)
    })?;
    let raw = match value {
        TypedValue::Dword(v) => RegValue {
            bytes: v.to_le_bytes().to_vec(),
            vtype: REG_DWORD,
        },
        TypedValue::String(s) => RegValue {
            bytes: s
                .encode_utf16()
                .chain(std::iter::once(0))
                .flat_map(|c| c.to_le_bytes())
                .collect(),
            vtype: REG_SZ,
        },
        TypedValue::Binary(data) => RegValue {
            bytes: data.clone(),
            vtype: REG_BINARY,
        },
        other => {
            return Err(AdapterError::Unsupported {
                resource: format!("{hive}\\{path}\\{name}"),
                reason: format!("value {other} is not a registry type"),
            })
        }
    };
    key.set_raw_value(name, &raw).map_err(|e| {
        AdapterError::from_io(&format!("failed to set '{name}' in '{hive}\\{path}'"), e)
    })
}

/// Deletes a named registry value. Deleting a value (or key) that does not
/// exist is success.
pub fn delete_value(hive: RegistryHive, path: &str, name: &str) -> Result<(), AdapterError> {
    let subkey = match hive_key(hive).open_subkey_with_flags(path, KEY_WRITE) {
        Ok(key) => key,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(AdapterError::from_io(
                &format!("failed to open '{hive}\\{path}'"),
                e,
            ))
        }
    };
    match subkey.delete_value(name) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AdapterError::from_io(
            &format!("failed to delete '{name}' in '{hive}\\{path}'"),
            e,
        )),
    }
}

fn decode(raw: RegValue, name: &str) -> Result<TypedValue, AdapterError> {
    match raw.vtype {
        REG_DWORD => {
            if raw.bytes.len() >= 4 {
                Ok(TypedValue::Dword(u32::from_le_bytes([
                    raw.bytes[0],
                    raw.bytes[1],
                    raw.bytes[2],
                    raw.bytes[3],
                ])))
            } else {
                Err(AdapterError::Other(format!(
                    "REG_DWORD data too small for value '{name}'"
                )))
            }
        }
        REG_BINARY => Ok(TypedValue::Binary(raw.bytes)),
        REG_SZ => {
            let utf16: Vec<u16> = raw
                .bytes
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .take_while(|c| *c != 0)
                .collect();
            Ok(TypedValue::String(String::from_utf16_lossy(&utf16)))
        }
        other => Err(AdapterError::Unsupported {
            resource: format!("registry value '{name}'"),
            reason: format!("registry value type {other:?} is not supported"),
        }),
    }
}
