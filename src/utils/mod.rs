// src/utils/mod.rs

pub mod command;
pub mod power;
pub mod registry;
pub mod services;
pub mod tasks;
pub mod windows;
