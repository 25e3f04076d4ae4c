//! Compressed archives of local files and exported images
//!
//! [`ArchiveBuilder`] writes `tar` framing inside a `gzip` stream inside the
//! destination file. Finalization runs inside out: tar trailer, then gzip trailer,
//! then the file is flushed and closed. A failed build removes the partial file, so a
//! destination on disk is always a complete archive.

use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::engine::EngineClient;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use futures::StreamExt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, Header};

pub const DEFAULT_ARCHIVE_PATH: &str = "output.tar.gz";
pub const DEFAULT_IMAGES_PATH: &str = "images.tar.gz";

pub const ARCHIVE_CREATED: &str = "Archive created successfully";
pub const IMAGES_SAVED: &str = "TAR file successfully created";

/// Chunks buffered between the engine stream and the file writer
const SAVE_CHANNEL_DEPTH: usize = 16;

#[derive(Clone)]
pub struct ArchiveBuilder {
    output: Logger,
}

impl ArchiveBuilder {
    pub fn new(output: Logger) -> Self {
        Self { output }
    }

    /// Bundle `paths` into a gzip-compressed tar at `destination`.
    ///
    /// Entries keep the path as given (minus a leading `/`) and appear in input order.
    pub fn build_archive(&self, paths: &[PathBuf], destination: &Path) -> Result<String> {
        self.output.verbose(&format!(
            "Creating archive {} from {} files",
            destination.display(),
            paths.len()
        ));

        let file = Self::create_destination(destination)?;
        match self.write_archive(paths, file) {
            Ok(()) => {
                self.output.success(ARCHIVE_CREATED);
                Ok(ARCHIVE_CREATED.to_string())
            }
            Err(e) => {
                let e = e.into_archive();
                Self::remove_partial(destination, &self.output);
                Err(e)
            }
        }
    }

    /// [`build_archive`](Self::build_archive) on the blocking thread pool
    pub async fn build_archive_async(
        &self,
        paths: Vec<PathBuf>,
        destination: PathBuf,
    ) -> Result<String> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.build_archive(&paths, &destination)).await?
    }

    /// Export `names` through the engine and gzip the resulting tar into `destination`
    pub async fn save_images(
        &self,
        engine: &dyn EngineClient,
        names: &[String],
        destination: &Path,
    ) -> Result<String> {
        if names.is_empty() {
            return Err(SyncError::Configuration(
                "There are no local images to save".to_string(),
            ));
        }

        self.output.info(&format!(
            "Creating TAR file named {}",
            destination.display()
        ));

        let file = Self::create_destination(destination)?;
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(SAVE_CHANNEL_DEPTH);

        let writer = tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            let mut written = 0u64;
            while let Some(chunk) = rx.blocking_recv() {
                encoder.write_all(&chunk)?;
                written += chunk.len() as u64;
            }
            let file = encoder
                .finish()?
                .into_inner()
                .map_err(|e| SyncError::from(e.into_error()))?;
            file.sync_all()?;
            Ok(written)
        });

        let streamed = async {
            let mut stream = engine.save(names).await?;
            while let Some(chunk) = stream.next().await {
                // A closed channel means the writer failed; its error is reported below
                if tx.send(chunk?).await.is_err() {
                    break;
                }
            }
            Ok::<(), SyncError>(())
        }
        .await;
        drop(tx);

        let written = writer.await.map_err(SyncError::from).and_then(|result| result);
        let outcome = match (streamed, written) {
            (Err(e), _) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(bytes)) => Ok(bytes),
        };

        match outcome {
            Ok(bytes) => {
                self.output.detail(&format!(
                    "Exported {} of image data for {} references",
                    self.output.format_size(bytes),
                    names.len()
                ));
                self.output.success(IMAGES_SAVED);
                Ok(IMAGES_SAVED.to_string())
            }
            Err(e) => {
                let e = e.into_archive();
                Self::remove_partial(destination, &self.output);
                Err(e)
            }
        }
    }

    /// Entry paths and sizes of a gzip-compressed tar, in archive order
    pub fn list_entries(archive_path: &Path) -> Result<Vec<(String, u64)>> {
        let file = File::open(archive_path).map_err(|e| {
            SyncError::Archive(format!(
                "Failed to open archive {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut entries = Vec::new();
        for entry_result in archive
            .entries()
            .map_err(|e| SyncError::Archive(format!("Failed to read archive entries: {}", e)))?
        {
            let entry = entry_result
                .map_err(|e| SyncError::Archive(format!("Failed to read archive entry: {}", e)))?;

            let path = entry
                .path()
                .map_err(|e| SyncError::Archive(format!("Failed to read entry path: {}", e)))?
                .to_string_lossy()
                .to_string();

            entries.push((path, entry.header().size().unwrap_or(0)));
        }

        Ok(entries)
    }

    fn create_destination(destination: &Path) -> Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(destination)
            .map_err(|e| {
                SyncError::Archive(format!(
                    "Failed to create {}: {}",
                    destination.display(),
                    e
                ))
            })
    }

    fn write_archive(&self, paths: &[PathBuf], file: File) -> Result<()> {
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = Builder::new(encoder);

        for path in paths {
            self.append_entry(&mut builder, path)?;
        }

        // tar trailer, then gzip trailer, then the file itself
        let encoder = builder
            .into_inner()
            .map_err(|e| SyncError::Archive(format!("Failed to finalize tar stream: {}", e)))?;
        let writer = encoder
            .finish()
            .map_err(|e| SyncError::Archive(format!("Failed to finalize gzip stream: {}", e)))?;
        let file = writer
            .into_inner()
            .map_err(|e| SyncError::Archive(format!("Failed to flush archive: {}", e.error())))?;
        file.sync_all()?;
        Ok(())
    }

    fn append_entry<W: Write>(&self, builder: &mut Builder<W>, path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|e| SyncError::Archive(format!("Failed to open {}: {}", path.display(), e)))?;
        let metadata = file.metadata().map_err(|e| {
            SyncError::Archive(format!("Failed to stat {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(SyncError::Archive(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let mut header = Header::new_gnu();
        header.set_metadata(&metadata);
        builder.append_data(&mut header, entry_name(path), file).map_err(|e| {
            SyncError::Archive(format!("Failed to add {}: {}", path.display(), e))
        })?;

        self.output.detail(&format!(
            "Added {} ({})",
            path.display(),
            self.output.format_size(metadata.len())
        ));
        Ok(())
    }

    fn remove_partial(destination: &Path, output: &Logger) {
        // NotFound is fine: nothing was left behind
        match std::fs::remove_file(destination) {
            Ok(()) => output.detail(&format!(
                "Removed partial archive {}",
                destination.display()
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => output.warning(&format!(
                "Could not remove partial archive {}: {}",
                destination.display(),
                e
            )),
        }
    }
}

/// Name stored in the archive: the path as given, minus any root or drive prefix
pub fn entry_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::RootDir | Component::Prefix(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(path: &Path) -> String {
        entry_name(path).to_string_lossy().to_string()
    }

    #[test]
    fn test_entry_name_strips_root_only() {
        assert_eq!(
            entry_name(Path::new("/etc/app/settings.yaml")),
            PathBuf::from("etc/app/settings.yaml")
        );
        assert_eq!(
            entry_name(Path::new("conf/app/settings.yaml")),
            PathBuf::from("conf/app/settings.yaml")
        );
    }

    #[test]
    fn test_entries_keep_full_path_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("conf").join("app");
        std::fs::create_dir_all(&nested).unwrap();
        let settings = nested.join("settings.yaml");
        let readme = dir.path().join("README");
        std::fs::write(&settings, b"replicas: 2\n").unwrap();
        std::fs::write(&readme, b"hello").unwrap();
        let destination = dir.path().join("bundle.tar.gz");

        let result = ArchiveBuilder::new(Logger::new_quiet())
            .build_archive(&[settings.clone(), readme.clone()], &destination);
        assert_eq!(result.unwrap(), ARCHIVE_CREATED);

        assert_eq!(
            ArchiveBuilder::list_entries(&destination).unwrap(),
            vec![(stored(&settings), 12), (stored(&readme), 5)]
        );
    }

    #[test]
    fn test_missing_input_removes_partial_archive() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.txt");
        std::fs::write(&present, b"data").unwrap();
        let destination = dir.path().join("out.tar.gz");

        let err = ArchiveBuilder::new(Logger::new_quiet())
            .build_archive(
                &[present, dir.path().join("missing.txt")],
                &destination,
            )
            .unwrap_err();

        assert!(matches!(err, SyncError::Archive(_)));
        assert!(err.to_string().contains("missing.txt"));
        assert!(!destination.exists());
    }

    #[test]
    fn test_directory_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.tar.gz");

        let err = ArchiveBuilder::new(Logger::new_quiet())
            .build_archive(&[dir.path().to_path_buf()], &destination)
            .unwrap_err();

        assert!(err.to_string().contains("Not a regular file"));
        assert!(!destination.exists());
    }
}
