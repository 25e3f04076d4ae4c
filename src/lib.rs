//! Image Sync Library
//!
//! This file serves as the library root for the image-sync crate, organizing and
//! exposing the modules that retag, push, pull, list and archive container images.

pub mod archive;
pub mod cli;
pub mod error;
pub mod input;
pub mod logging;
pub mod registry;

pub use archive::ArchiveBuilder;
pub use cli::AppConfig;
pub use error::{Result, SyncError};
pub use logging::Logger;
pub use registry::{Credentials, EngineClient, TargetSpec, TransferEngine};
