//! This crate is intended to contain code that is required to provide or
//! improve the observability of the deployment tooling. That includes
//! initialization logic for logging and panic reporting.
pub mod config;
pub mod panic_hook;
pub mod tracing;

pub use config::Config;
