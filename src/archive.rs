//! ZIP archive output and input
//!
//! [`ArchiveWriter`] is written sequentially by exactly one engine. [`SharedArchive`]
//! wraps it for async callers: writes are serialized by a mutex and run on the blocking
//! pool. [`read_image_entries`] loads the image entries of previously written archives
//! for the resize engine.

use crate::config::ResizeConfig;
use crate::error::{ArchiveError, Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One file inside an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name (no directories)
    pub name: String,
    /// Entry contents
    pub bytes: Vec<u8>,
}

/// Incrementally written ZIP file
pub struct ArchiveWriter {
    path: PathBuf,
    writer: Option<ZipWriter<File>>,
    names: HashSet<String>,
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("path", &self.path)
            .field("entries", &self.names.len())
            .field("finished", &self.writer.is_none())
            .finish()
    }
}

impl ArchiveWriter {
    /// Create (or truncate) the archive at `path`, creating parent directories
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let write_failed = |reason: String| ArchiveError::WriteFailed {
            path: path.clone(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| write_failed(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(&path)
            .map_err(|e| write_failed(format!("failed to create file: {}", e)))?;

        Ok(Self {
            writer: Some(ZipWriter::new(file)),
            path,
            names: HashSet::new(),
        })
    }

    /// Path of the archive on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.names.len()
    }

    /// Append one entry, returning the name it was stored under
    ///
    /// Directory components are stripped. A name already present in this archive gets a
    /// ` (n)` suffix before its extension.
    pub fn append(&mut self, name: &str, bytes: &[u8]) -> Result<String> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ArchiveError::AlreadyFinished {
                path: self.path.clone(),
            }
            .into());
        };

        let entry_name = unique_name(&self.names, &entry_base_name(name));
        // Media is already compressed
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        writer
            .start_file(entry_name.as_str(), options)
            .map_err(|e| write_error(&self.path, format!("failed to start entry: {}", e)))?;
        writer
            .write_all(bytes)
            .map_err(|e| write_error(&self.path, format!("failed to write entry: {}", e)))?;

        self.names.insert(entry_name.clone());
        Ok(entry_name)
    }

    /// Write the central directory and close the file, returning its size in bytes
    pub fn finish(mut self) -> Result<u64> {
        let Some(mut writer) = self.writer.take() else {
            return Err(ArchiveError::AlreadyFinished {
                path: self.path.clone(),
            }
            .into());
        };

        let file = writer
            .finish()
            .map_err(|e| write_error(&self.path, format!("failed to finish archive: {}", e)))?;
        let size = file
            .metadata()
            .map_err(|e| write_error(&self.path, format!("failed to stat archive: {}", e)))?
            .len();

        tracing::debug!(path = ?self.path, entries = self.names.len(), size, "archive finished");
        Ok(size)
    }

    /// Drop the writer and delete the partial file
    pub fn discard(mut self) {
        drop(self.writer.take());
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = ?self.path, error = %e, "failed to remove partial archive");
        }
    }
}

/// Summary of a finished archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishedArchive {
    /// Path of the archive on disk
    pub path: PathBuf,
    /// Number of entries written
    pub entry_count: u64,
    /// File size in bytes
    pub size_bytes: u64,
}

/// [`ArchiveWriter`] shared by async tasks
///
/// Every operation runs on the blocking pool. Concurrent appends are serialized by a
/// mutex. Once finished or discarded, further operations fail with
/// [`ArchiveError::AlreadyFinished`].
#[derive(Clone, Debug)]
pub struct SharedArchive {
    path: PathBuf,
    writer: Arc<Mutex<Option<ArchiveWriter>>>,
}

impl SharedArchive {
    /// Create the archive at `path` (see [`ArchiveWriter::create`])
    pub async fn create(path: PathBuf) -> Result<Self> {
        let target = path.clone();
        let writer = tokio::task::spawn_blocking(move || ArchiveWriter::create(target))
            .await
            .map_err(|e| write_error(&path, format!("archive worker stopped: {}", e)))??;

        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    /// Path of the archive on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, returning the name it was stored under
    pub async fn append(&self, name: String, bytes: Vec<u8>) -> Result<String> {
        let path = self.path.clone();
        self.with_writer(move |slot| match slot.as_mut() {
            Some(writer) => writer.append(&name, &bytes),
            None => Err(ArchiveError::AlreadyFinished { path }.into()),
        })
        .await
    }

    /// Finish the archive and close the file
    pub async fn finish(&self) -> Result<FinishedArchive> {
        let path = self.path.clone();
        self.with_writer(move |slot| {
            let writer = slot
                .take()
                .ok_or(ArchiveError::AlreadyFinished { path: path.clone() })?;
            let entry_count = writer.entry_count() as u64;
            let size_bytes = writer.finish()?;
            Ok(FinishedArchive {
                path,
                entry_count,
                size_bytes,
            })
        })
        .await
    }

    /// Drop the writer and delete the partial file; no-op once finished or discarded
    pub async fn discard(&self) {
        let discarded = self
            .with_writer(|slot| {
                if let Some(writer) = slot.take() {
                    writer.discard();
                }
                Ok(())
            })
            .await;
        if let Err(e) = discarded {
            tracing::warn!(path = ?self.path, error = %e, "failed to discard archive");
        }
    }

    async fn with_writer<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Option<ArchiveWriter>) -> Result<T> + Send + 'static,
    {
        let writer = Arc::clone(&self.writer);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut slot = writer
                .lock()
                .map_err(|_| write_error(&path, "archive lock poisoned".to_string()))?;
            op(&mut *slot)
        })
        .await
        .map_err(|e| write_error(&self.path, format!("archive worker stopped: {}", e)))?
    }
}

fn write_error(path: &Path, reason: String) -> Error {
    ArchiveError::WriteFailed {
        path: path.to_path_buf(),
        reason,
    }
    .into()
}

fn entry_base_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        "asset".to_string()
    } else {
        base.to_string()
    }
}

fn unique_name(taken: &HashSet<String>, name: &str) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    (1..)
        .map(|n| format!("{} ({}){}", stem, n, ext))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Read every image entry of every archive in `paths`, in order
///
/// Entries whose extension is not listed in `config.image_extensions` are skipped, as
/// are directories.
pub fn read_image_entries(paths: &[PathBuf], config: &ResizeConfig) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();

    for path in paths {
        let read_failed = |reason: String| -> Error {
            ArchiveError::ReadFailed {
                path: path.clone(),
                reason,
            }
            .into()
        };

        let file = File::open(path).map_err(|e| read_failed(format!("failed to open: {}", e)))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| read_failed(format!("not a ZIP archive: {}", e)))?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| read_failed(format!("failed to read entry {}: {}", index, e)))?;
            if entry.is_dir() {
                continue;
            }

            let name = entry_base_name(entry.name());
            if !config.is_image_name(&name) {
                tracing::debug!(archive = ?path, entry = %name, "skipping non-image entry");
                continue;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| read_failed(format!("failed to read {}: {}", name, e)))?;
            entries.push(ArchiveEntry { name, bytes });
        }
    }

    Ok(entries)
}
