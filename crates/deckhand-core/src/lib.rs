//! deckhand-core - Core library for deckhand
//!
//! This crate provides the core functionality for deckhand, including:
//! - Template rendering against a per-invocation deploy context
//! - Configuration file parsing and merging
//! - Remote execution backends (ssh/scp, local, recording)
//! - Tree synchronization and file/string/template materialization
//! - Deployment tasks (virtualenvs, nginx, crontabs, runit, redis, accounts)

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod materialize;
pub mod remote;
pub mod session;
pub mod sync;
pub mod tasks;
pub mod template;

pub use error::{Error, Result};
