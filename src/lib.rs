// src/lib.rs

pub mod adapter;
pub mod constants;
pub mod errors;
pub mod ledger;
pub mod orchestrator;
pub mod resources;
pub mod tweaks;
#[cfg(windows)]
pub mod utils;
