//! Shared test infrastructure for image-sync integration tests
//!
//! - `fake_engine`: an in-memory [`EngineClient`](image_sync::EngineClient) that records calls
//! - `sinks`: progress sinks for asserting on output

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_engine;
pub mod sinks;

pub use fake_engine::*;
pub use sinks::*;
