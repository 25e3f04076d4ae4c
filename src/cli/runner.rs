//! Runner wiring configuration, the container engine and the registry operations

use crate::archive::ArchiveBuilder;
use crate::cli::args::{Args, Command};
use crate::cli::config::AppConfig;
use crate::error::Result;
use crate::input::read_reference_file;
use crate::logging::Logger;
use crate::registry::{
    ConsoleSink, DockerEngine, EngineClient, ImageCatalog, JobReport, ProgressSink, Severity,
    TargetSpec, TransferEngine,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

pub struct Runner {
    args: Args,
    config: AppConfig,
    output: Logger,
    sink: Arc<ConsoleSink>,
}

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The command ran but at least one part of it failed; the cause was already printed
    Failed,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Failed => 1,
        }
    }
}

/// Cancels a transfer on Ctrl-C for as long as it is alive
struct InterruptGuard(JoinHandle<()>);

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Runner {
    /// Resolve configuration (defaults, then environment, then flags) and open the log file
    pub fn new(args: Args) -> Result<Self> {
        let config = args.apply_to(AppConfig::from_env());
        config.validate()?;

        let output = if config.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(config.verbose)
        };
        let output = match &config.log_file {
            Some(path) => output.with_log_file(path)?,
            None => output,
        };
        let sink = Arc::new(ConsoleSink::new(output.clone()));

        Ok(Self {
            args,
            config,
            output,
            sink,
        })
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    /// Run the selected command.
    ///
    /// Startup problems are returned as errors: invalid arguments or no reachable
    /// engine. Failures of the operation itself are printed once and turn into
    /// [`Outcome::Failed`].
    pub async fn run(&self) -> Result<Outcome> {
        let start_time = Instant::now();

        self.output.section("Image Sync");
        self.validate_arguments()?;

        let result = match &self.args.command {
            Command::View { file } => self.view(file),
            Command::Archive { paths, output } => self.archive(paths, output).await,
            Command::Pull { file, .. } => self.pull(file, self.connect().await?).await,
            Command::Tag { file, .. } => self.tag(file, self.connect().await?).await,
            Command::Push { file, .. } => self.push(file, self.connect().await?).await,
            Command::List => self.list(self.connect().await?).await,
            Command::Save { output } => self.save(output, self.connect().await?).await,
        };

        let elapsed = self.output.format_duration(start_time.elapsed());
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.output.error(&format!("Operation failed: {}", e));
                Outcome::Failed
            }
        };
        match outcome {
            Outcome::Completed => self
                .output
                .success(&format!("Operation completed in {}", elapsed)),
            Outcome::Failed => self
                .output
                .warning(&format!("Operation finished with failures in {}", elapsed)),
        }

        Ok(outcome)
    }

    fn validate_arguments(&self) -> Result<()> {
        self.output.subsection("Validating arguments");
        self.args.validate()?;

        if let Some(path) = self.output.log_path() {
            self.output.verbose(&format!("Logging to {}", path.display()));
        }
        self.output.verbose(&format!(
            "Engine hosts: {}",
            self.config.engine_hosts.join(", ")
        ));
        self.output.step("Arguments validation passed");
        Ok(())
    }

    async fn connect(&self) -> Result<Arc<dyn EngineClient>> {
        self.output.subsection("Connecting to container engine");
        let engine = DockerEngine::connect(&self.config.engine_hosts, &self.output).await?;
        self.output
            .step(&format!("Using container engine at {}", engine.endpoint()));
        Ok(Arc::new(engine))
    }

    fn transfer_engine(&self, engine: Arc<dyn EngineClient>) -> TransferEngine {
        let sink: Arc<dyn ProgressSink> = self.sink.clone();
        TransferEngine::new(engine, sink)
            .with_options(self.config.transfer_options())
            .with_logger(self.output.clone())
    }

    fn watch_interrupt(&self, transfer: &TransferEngine) -> InterruptGuard {
        let token = transfer.cancellation_token();
        let output = self.output.clone();
        InterruptGuard(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                output.warning("Interrupted, cancelling transfers");
                token.cancel();
            }
        }))
    }

    fn target_spec(&self) -> TargetSpec {
        self.args.target_spec().unwrap_or_default()
    }

    fn view(&self, file: &Path) -> Result<Outcome> {
        self.output.subsection("Images file");
        let references = read_reference_file(file)?;
        for reference in &references {
            self.sink.emit(reference, Severity::Info);
        }
        self.output
            .verbose(&format!("{} references in {}", references.len(), file.display()));
        Ok(Outcome::Completed)
    }

    async fn pull(&self, file: &Path, engine: Arc<dyn EngineClient>) -> Result<Outcome> {
        self.output.subsection("Pulling images");
        let references = read_reference_file(file)?;

        let transfer = self.transfer_engine(engine);
        let _interrupt = self.watch_interrupt(&transfer);
        // Precondition failures were already written to the sink
        let Ok(reports) = transfer.pull_all(&references, &self.args.credentials()).await else {
            return Ok(Outcome::Failed);
        };
        self.summarize(&reports);
        Ok(transfer_outcome(&reports))
    }

    async fn tag(&self, file: &Path, engine: Arc<dyn EngineClient>) -> Result<Outcome> {
        self.output.subsection("Tagging images");
        let references = read_reference_file(file)?;

        let mut transfer = self.transfer_engine(engine);
        let report = transfer.tag_all(&references, &self.target_spec()).await;
        if !report.is_complete() {
            return Ok(Outcome::Failed);
        }
        self.output
            .step(&format!("Tagged {} images", report.tagged.len()));
        Ok(Outcome::Completed)
    }

    async fn push(&self, file: &Path, engine: Arc<dyn EngineClient>) -> Result<Outcome> {
        self.output.subsection("Tagging images");
        let references = read_reference_file(file)?;

        let mut transfer = self.transfer_engine(engine);
        let report = transfer.tag_all(&references, &self.target_spec()).await;
        if !report.is_complete() {
            self.output.warning(&format!(
                "Tagging stopped after {} of {} images, nothing was pushed",
                report.tagged.len(),
                references.len()
            ));
            return Ok(Outcome::Failed);
        }

        self.output.subsection("Pushing images");
        let _interrupt = self.watch_interrupt(&transfer);
        let Ok(reports) = transfer.push_tagged(&self.args.credentials()).await else {
            return Ok(Outcome::Failed);
        };
        self.summarize(&reports);
        Ok(transfer_outcome(&reports))
    }

    async fn list(&self, engine: Arc<dyn EngineClient>) -> Result<Outcome> {
        self.output.subsection("Local images");
        let identifiers = ImageCatalog::new(engine).list_identifiers().await?;
        if identifiers.is_empty() {
            self.output.info("The local image store has no tagged images");
        }
        for identifier in &identifiers {
            self.sink.emit(identifier, Severity::Info);
        }
        Ok(Outcome::Completed)
    }

    async fn save(&self, destination: &Path, engine: Arc<dyn EngineClient>) -> Result<Outcome> {
        self.output.subsection("Saving local images");
        let names = ImageCatalog::new(Arc::clone(&engine))
            .list_export_names()
            .await?;
        self.output
            .verbose(&format!("Exporting {} images", names.len()));

        let message = ArchiveBuilder::new(self.output.clone())
            .save_images(engine.as_ref(), &names, destination)
            .await?;
        self.sink.emit(&message, Severity::Success);
        Ok(Outcome::Completed)
    }

    async fn archive(&self, paths: &[PathBuf], destination: &Path) -> Result<Outcome> {
        self.output.subsection("Creating archive");
        let message = ArchiveBuilder::new(self.output.clone())
            .build_archive_async(paths.to_vec(), destination.to_path_buf())
            .await?;

        if self.output.verbose {
            let entries = ArchiveBuilder::list_entries(destination)?;
            let names: Vec<String> = entries
                .iter()
                .map(|(path, size)| format!("{} ({})", path, self.output.format_size(*size)))
                .collect();
            self.output.list("Archive entries", &names);
        }
        self.sink.emit(&message, Severity::Success);
        Ok(Outcome::Completed)
    }

    fn summarize(&self, reports: &[JobReport]) {
        let succeeded = reports.iter().filter(|report| report.is_success()).count();
        let lines: usize = reports.iter().map(|report| report.lines_emitted).sum();

        self.output.summary_kv(
            "Transfer summary",
            &[
                ("Jobs", reports.len().to_string()),
                ("Succeeded", succeeded.to_string()),
                ("Failed", (reports.len() - succeeded).to_string()),
                ("Progress lines", lines.to_string()),
            ],
        );
    }
}

fn transfer_outcome(reports: &[JobReport]) -> Outcome {
    if reports.iter().all(JobReport::is_success) {
        Outcome::Completed
    } else {
        Outcome::Failed
    }
}
