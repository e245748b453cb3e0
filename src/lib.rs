//! Per-repository GitHub identity resolution.
//!
//! `ctx` decides which configured profile owns a repository, binds the
//! working copy to that profile's SSH host and commit identity, and guards
//! pushes against drift.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
pub mod guard;
pub mod mask;
pub mod menu;
pub mod probe;
pub mod profile;
pub mod resolver;
pub mod validation;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
