// ABOUTME: Library root for berth - container lifecycle orchestration.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod demo;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod output;
pub mod probe;
pub mod runtime;
pub mod types;
