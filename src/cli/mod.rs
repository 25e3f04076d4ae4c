//! Command line interface module
//!
//! This module provides the entry point for parsing command-line arguments and running the
//! selected registry or archive operation.

pub mod args;
pub mod config;
pub mod runner;

pub use args::{Args, Command};
pub use config::AppConfig;
pub use runner::{Outcome, Runner};
