//! CLI command implementations.
//!
//! Commands that touch a segment take an attached store and an output sink,
//! so they run the same against System V or the in-memory facility.

pub mod inspect;
pub mod remove;
pub mod tokenize;
pub mod vars;

/// Result type shared by command implementations.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Output format for commands that print values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Human readable.
    Text,
    /// Pretty printed JSON.
    Json,
}
