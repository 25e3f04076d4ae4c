//! Tagging and concurrent push/pull transfers
//!
//! [`TransferEngine`] rewrites and tags source references, then runs one background
//! task per image for pushes and pulls. Each task owns its engine stream and writes
//! whole lines to the shared sink through a [`SerializedSink`]. A failing job only
//! fails its own [`JobReport`].

use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::auth::{AuthToken, Credentials};
use crate::registry::catalog::ImageCatalog;
use crate::registry::engine::EngineClient;
use crate::registry::progress::{
    LineBuffer, ProgressLine, ProgressSink, SerializedSink, Severity, decode_line,
};
use crate::registry::reference::{TargetSpec, rewrite};
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const NO_TAGGED_IMAGES: &str = "There are no tagged images. Please Tag Images and try again.";
pub const NO_IMAGES_TO_PULL: &str = "Please input a valid Images File and try again";

/// A source reference and the target it was successfully tagged as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedImage {
    pub source: String,
    pub target: String,
}

/// Outcome of one tagging pass.
///
/// Tagging stops at the first failure; `tagged` holds everything tagged before it.
#[derive(Debug)]
pub struct TagReport {
    pub tagged: Vec<TaggedImage>,
    pub error: Option<SyncError>,
}

impl TagReport {
    pub fn targets(&self) -> Vec<String> {
        self.tagged.iter().map(|image| image.target.clone()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Push,
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => write!(f, "push"),
            Direction::Pull => write!(f, "pull"),
        }
    }
}

/// Lifecycle of a transfer job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Created,
    Authenticating,
    Streaming,
    Completed,
    Failed(String),
}

/// Final state of one push or pull
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: Uuid,
    pub reference: String,
    pub direction: Direction,
    pub state: JobState,
    /// Progress lines written before the job ended, including for failed jobs
    pub lines_emitted: usize,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Upper bound for a single push or pull, stream included
    pub job_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(7200),
        }
    }
}

struct TransferJob {
    id: Uuid,
    reference: String,
    direction: Direction,
    state: JobState,
    sink: Arc<SerializedSink>,
    buffer: LineBuffer,
    lines_emitted: usize,
}

impl TransferJob {
    fn new(reference: String, direction: Direction, sink: Arc<SerializedSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference,
            direction,
            state: JobState::Created,
            sink,
            buffer: LineBuffer::new(),
            lines_emitted: 0,
        }
    }

    async fn run(
        mut self,
        engine: Arc<dyn EngineClient>,
        credentials: Credentials,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> JobReport {
        self.state = JobState::Authenticating;
        let outcome = match AuthToken::encode(&credentials) {
            Ok(token) => {
                let label = format!("{} {}", self.direction, self.reference);
                let work = self.execute(engine.as_ref(), &token);
                tokio::select! {
                    _ = cancel.cancelled() => Err(SyncError::Cancelled(label)),
                    result = tokio::time::timeout(timeout, work) => match result {
                        Ok(result) => result,
                        Err(_) => Err(SyncError::Timeout(format!(
                            "{} exceeded {}s",
                            label,
                            timeout.as_secs()
                        ))),
                    },
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.state = JobState::Completed;
                self.sink.emit(
                    &format!("{}: {} completed", self.reference, self.direction),
                    Severity::Success,
                );
            }
            Err(e) => {
                let message = e.into_transfer().to_string();
                self.sink
                    .emit(&format!("{}: {}", self.reference, message), Severity::Error);
                self.state = JobState::Failed(message);
            }
        }

        JobReport {
            id: self.id,
            reference: self.reference,
            direction: self.direction,
            state: self.state,
            lines_emitted: self.lines_emitted,
        }
    }

    async fn execute(&mut self, engine: &dyn EngineClient, token: &AuthToken) -> Result<()> {
        let mut stream = match self.direction {
            Direction::Push => engine.push(&self.reference, token).await?,
            Direction::Pull => engine.pull(&self.reference, token).await?,
        };

        self.state = JobState::Streaming;
        while let Some(chunk) = stream.next().await {
            let lines = self.buffer.push(&chunk?);
            self.forward(lines)?;
        }
        if let Some(rest) = self.buffer.finish() {
            self.forward(vec![rest])?;
        }
        Ok(())
    }

    /// Write decoded lines to the sink; an engine-reported error ends the job
    fn forward(&mut self, lines: Vec<String>) -> Result<()> {
        let mut batch = Vec::with_capacity(lines.len());
        let mut failure = None;
        for line in lines {
            match decode_line(&line) {
                Some(ProgressLine::Text(text)) => batch.push((text, Severity::Info)),
                Some(ProgressLine::Failure(message)) => {
                    failure = Some(message);
                    break;
                }
                None => {}
            }
        }

        if !batch.is_empty() {
            self.lines_emitted += batch.len();
            self.sink.emit_all(&batch);
        }

        match failure {
            Some(message) => Err(SyncError::Transfer(message)),
            None => Ok(()),
        }
    }
}

pub struct TransferEngine {
    engine: Arc<dyn EngineClient>,
    sink: Arc<SerializedSink>,
    options: TransferOptions,
    cancel: CancellationToken,
    last_pass: Vec<TaggedImage>,
    output: Logger,
}

impl TransferEngine {
    pub fn new(engine: Arc<dyn EngineClient>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            engine,
            sink: Arc::new(SerializedSink::new(sink)),
            options: TransferOptions::default(),
            cancel: CancellationToken::new(),
            last_pass: Vec::new(),
            output: Logger::new_quiet(),
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    /// Token cancelling every job this engine starts
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort all in-flight transfers. Jobs started afterwards fail immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Images tagged by the most recent pass
    pub fn tagged(&self) -> &[TaggedImage] {
        &self.last_pass
    }

    /// Tag every source under `spec`, in input order, stopping at the first failure
    pub async fn tag_all(&mut self, sources: &[String], spec: &TargetSpec) -> TagReport {
        self.output.verbose(&format!(
            "Tagging {} images for {}/{}",
            sources.len(),
            spec.server(),
            spec.namespace
        ));

        let mut tagged = Vec::new();
        let mut error = None;

        for source in sources {
            let target = rewrite(source, spec);
            match self.engine.tag(source, &target).await {
                Ok(()) => {
                    self.output.detail(&format!("Tagged {} as {}", source, target));
                    tagged.push(TaggedImage {
                        source: source.clone(),
                        target,
                    });
                }
                Err(e) => {
                    let e = e.into_transfer();
                    self.output
                        .detail(&format!("Failed to tag {}: {}", source, e));
                    self.sink.emit(&e.to_string(), Severity::Error);
                    error = Some(e);
                    break;
                }
            }
        }

        let lines: Vec<(String, Severity)> = tagged
            .iter()
            .map(|image| (image.target.clone(), Severity::Info))
            .collect();
        self.sink.emit_all(&lines);

        self.last_pass = tagged.clone();
        TagReport { tagged, error }
    }

    /// Push images from the most recent tagging pass
    pub async fn push_all(
        &self,
        images: &[TaggedImage],
        credentials: &Credentials,
    ) -> Result<Vec<JobReport>> {
        if images.is_empty() {
            self.output.detail("Push requested without tagged images");
            self.sink.emit(NO_TAGGED_IMAGES, Severity::Error);
            return Err(SyncError::Configuration(NO_TAGGED_IMAGES.to_string()));
        }

        if let Some(stray) = images.iter().find(|image| !self.last_pass.contains(image)) {
            let message = format!(
                "{} was not produced by the most recent tagging pass",
                stray.target
            );
            self.sink.emit(&message, Severity::Error);
            return Err(SyncError::Configuration(message));
        }

        let references = images.iter().map(|image| image.target.clone()).collect();
        Ok(self
            .run_jobs(references, Direction::Push, credentials)
            .await)
    }

    /// Push everything the last `tag_all` produced
    pub async fn push_tagged(&self, credentials: &Credentials) -> Result<Vec<JobReport>> {
        self.push_all(&self.last_pass, credentials).await
    }

    /// Pull every source reference concurrently
    pub async fn pull_all(
        &self,
        sources: &[String],
        credentials: &Credentials,
    ) -> Result<Vec<JobReport>> {
        if sources.is_empty() {
            self.output.detail("Pull requested without images");
            self.sink.emit(NO_IMAGES_TO_PULL, Severity::Error);
            return Err(SyncError::Configuration(NO_IMAGES_TO_PULL.to_string()));
        }

        Ok(self
            .run_jobs(sources.to_vec(), Direction::Pull, credentials)
            .await)
    }

    /// Every local repository:tag, one per line
    pub async fn list_catalog(&self) -> Result<String> {
        let catalog = ImageCatalog::new(Arc::clone(&self.engine));
        let identifiers = catalog.list_identifiers().await?;
        Ok(identifiers.join("\n"))
    }

    async fn run_jobs(
        &self,
        references: Vec<String>,
        direction: Direction,
        credentials: &Credentials,
    ) -> Vec<JobReport> {
        self.output.verbose(&format!(
            "Starting {} {} jobs against {}",
            references.len(),
            direction,
            self.engine.endpoint()
        ));

        let handles: Vec<(String, Uuid, JoinHandle<JobReport>)> = references
            .into_iter()
            .map(|reference| {
                let job = TransferJob::new(reference.clone(), direction, Arc::clone(&self.sink));
                let id = job.id;
                let handle = tokio::spawn(job.run(
                    Arc::clone(&self.engine),
                    credentials.clone(),
                    self.cancel.child_token(),
                    self.options.job_timeout,
                ));
                (reference, id, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (reference, id, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    let message = format!("{} task aborted: {}", direction, e);
                    self.sink
                        .emit(&format!("{}: {}", reference, message), Severity::Error);
                    JobReport {
                        id,
                        reference,
                        direction,
                        state: JobState::Failed(message),
                        lines_emitted: 0,
                    }
                }
            };
            self.output.detail(&match report.error() {
                Some(error) => format!("{} {} failed: {}", direction, report.reference, error),
                None => format!("{} {} completed", direction, report.reference),
            });
            reports.push(report);
        }

        let failed = reports.iter().filter(|report| !report.is_success()).count();
        if failed == 0 {
            let verb = match direction {
                Direction::Push => "uploaded",
                Direction::Pull => "downloaded",
            };
            self.sink.emit(
                &format!("Success! All Images {} successfully.", verb),
                Severity::Success,
            );
        } else {
            self.sink.emit(
                &format!("{} of {} {} jobs failed", failed, reports.len(), direction),
                Severity::Error,
            );
        }

        reports
    }
}
