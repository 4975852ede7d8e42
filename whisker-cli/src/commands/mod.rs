//! Subcommand implementations.

pub mod aggregate;
pub mod enroll;
pub mod match_cmd;
pub mod signature;
