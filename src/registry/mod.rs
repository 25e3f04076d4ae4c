//! Registry synchronization: reference rewriting, credentials, the container engine
//! collaborator, progress output and the transfer engine built on top of them.

pub mod auth;
pub mod catalog;
pub mod docker;
pub mod engine;
pub mod progress;
pub mod reference;
pub mod transfer;

pub use auth::{AuthToken, Credentials};
pub use catalog::ImageCatalog;
pub use docker::{DockerEngine, EngineHost};
pub use engine::{ByteStream, EngineClient, ImageSummary};
pub use progress::{BufferSink, ConsoleSink, ProgressSink, SerializedSink, Severity};
pub use reference::{TargetSpec, rewrite};
pub use transfer::{
    Direction, JobReport, JobState, TagReport, TaggedImage, TransferEngine, TransferOptions,
};
