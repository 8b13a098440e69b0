//! CLI command implementations.

pub mod analyze;
pub mod collapse;
pub mod init;
