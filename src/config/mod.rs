//! Config module - YAML settings file under ~/.pbi_cli

pub mod commands;
pub mod store;
