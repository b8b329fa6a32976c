// src/constants.rs

/// File name of the durable snapshot ledger, stored beside the executable.
pub const LEDGER_FILE_NAME: &str = "wintune_ledger.json";

/// Schema tag written into the ledger file. The major version must match on
/// load; unknown majors fall back to an empty ledger with a warning.
pub const LEDGER_SCHEMA: &str = "wintune_ledger.v1";

/// Bounded wait for external commands (powercfg, netsh, bcdedit, sc,
/// schtasks). One-shot: a timed-out command is reported, never retried.
pub const COMMAND_TIMEOUT_SECS: u64 = 120;

/// Built-in "High performance" power scheme.
pub const HIGH_PERFORMANCE_SCHEME: &str = "8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c";

/// Built-in "Balanced" power scheme, used only by the catalog-default
/// fallback when no snapshot exists for the active scheme.
pub const BALANCED_SCHEME: &str = "381b4222-f694-41f0-9685-ff5bb260df2e";
