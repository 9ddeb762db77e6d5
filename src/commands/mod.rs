//! CLI command implementations.

pub mod play;
pub mod reset;
pub mod status;
