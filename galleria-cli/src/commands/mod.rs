//! CLI command implementations.

pub mod common;
pub mod config;
pub mod placeholder;
pub mod policy;
pub mod preload;
pub mod window;
