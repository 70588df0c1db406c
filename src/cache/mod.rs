//! Cache module - Versioned JSON cache of API responses
//!
//! Provides:
//! - Cache envelope and version labels
//! - Cache manager (save/load/list/clear over a storage backend)
//! - Handlers for the `pbi cache` commands

pub mod commands;
pub mod config;
pub mod envelope;
pub mod manager;
pub mod version;
