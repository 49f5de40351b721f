//! Stepwright CLI
//!
//! Command-line surface over the spec store, the generation agent and the
//! execution runner.

pub mod commands;
pub mod config;
pub mod output;
