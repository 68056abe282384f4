use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};
use crate::keys;

/// A part that has been durably written under its final name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartWritten {
    pub index: u32,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// A finished artifact placed in the upload root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
    pub size_bytes: u64,
}

/// Local filesystem storage for session parts and finished artifacts
#[derive(Clone, Debug)]
pub struct LocalStore {
    upload_dir: PathBuf,
    base_url: String,
}

impl LocalStore {
    /// Create a new LocalStore rooted at `upload_dir`
    ///
    /// # Arguments
    /// * `upload_dir` - Root directory for session directories and artifacts
    /// * `base_url` - Base URL for serving stored files (e.g., "http://localhost:3000/media")
    pub async fn new(upload_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> StorageResult<Self> {
        let upload_dir = upload_dir.into();

        fs::create_dir_all(&upload_dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create upload directory {}: {}",
                upload_dir.display(),
                e
            ))
        })?;

        Ok(LocalStore {
            upload_dir,
            base_url: base_url.into(),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Public URL for a stored filename
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), filename)
    }

    /// Directory holding the parts of one session
    pub fn session_dir(&self, session_id: &str) -> StorageResult<PathBuf> {
        keys::validate_session_id(session_id)?;
        Ok(self.upload_dir.join(session_id))
    }

    /// Write one part under its deterministic name.
    ///
    /// The bytes land in a hidden staging file first and are renamed into place
    /// after `sync_all`, so a concurrent completion check never sees a partial
    /// part. When `declared_size` is given and differs from the written length
    /// the staging file is removed and `SizeMismatch` is returned.
    pub async fn write_part(
        &self,
        session_id: &str,
        index: u32,
        data: &[u8],
        declared_size: Option<u64>,
    ) -> StorageResult<PartWritten> {
        let dir = self.session_dir(session_id)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create session directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let part_name = keys::part_file_name(session_id, index);
        let path = dir.join(&part_name);
        let staging = dir.join(keys::staging_name(&part_name));

        let start = Instant::now();
        let size_bytes = data.len() as u64;

        if let Err(e) = write_synced(&staging, data).await {
            cleanup_file(&staging).await;
            return Err(e);
        }

        if let Some(expected) = declared_size {
            if expected != size_bytes {
                remove_file_if_exists(&staging).await?;
                tracing::warn!(
                    session_id = %session_id,
                    part_index = index,
                    expected,
                    actual = size_bytes,
                    "Part size mismatch, part discarded"
                );
                return Err(StorageError::SizeMismatch {
                    expected,
                    actual: size_bytes,
                });
            }
        }

        fs::rename(&staging, &path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to move part into {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            session_id = %session_id,
            part_index = index,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Part written"
        );

        Ok(PartWritten {
            index,
            size_bytes,
            path,
        })
    }

    /// Count files in the session directory whose name starts with the session id (case-insensitive).
    pub async fn count_session_files(&self, session_id: &str) -> StorageResult<usize> {
        let dir = self.session_dir(session_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if keys::has_session_prefix(session_id, name) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// List the session's part files sorted by ascending index.
    pub async fn list_parts(&self, session_id: &str) -> StorageResult<Vec<(u32, PathBuf)>> {
        let dir = self.session_dir(session_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut parts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(index) = name.to_str().and_then(|n| keys::parse_part_index(session_id, n)) {
                parts.push((index, entry.path()));
            }
        }
        parts.sort_by_key(|(index, _)| *index);
        Ok(parts)
    }

    /// Concatenate the session's parts into `output_name` inside the session directory.
    ///
    /// Any existing output is replaced. Parts must be exactly `0..n`. The output is
    /// fsynced before its length is compared to `declared_total_size`; on mismatch
    /// the output and every part are deleted. On success the parts are deleted and
    /// the output path returned.
    pub async fn merge_parts(
        &self,
        session_id: &str,
        output_name: &str,
        declared_total_size: u64,
    ) -> StorageResult<PathBuf> {
        let dir = self.session_dir(session_id)?;
        let output = dir.join(keys::sanitize_filename(output_name));
        let start = Instant::now();

        remove_file_if_exists(&output).await?;

        let parts = self.list_parts(session_id).await?;
        if let Some(missing) = first_gap(&parts) {
            self.discard(&parts, &output).await;
            return Err(StorageError::MissingPart { index: missing });
        }

        if let Err(e) = concat_synced(&parts, &output).await {
            cleanup_file(&output).await;
            return Err(e);
        }

        let actual = fs::metadata(&output).await?.len();
        if actual != declared_total_size {
            tracing::warn!(
                session_id = %session_id,
                expected = declared_total_size,
                actual,
                "Merged size mismatch, discarding session parts"
            );
            self.discard(&parts, &output).await;
            return Err(StorageError::SizeMismatch {
                expected: declared_total_size,
                actual,
            });
        }

        for (_, path) in &parts {
            remove_file_if_exists(path).await?;
        }

        tracing::info!(
            session_id = %session_id,
            parts = parts.len(),
            size_bytes = actual,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Parts merged"
        );

        Ok(output)
    }

    /// Move a merged file into the upload root under a fresh name and fsync it.
    pub async fn store_artifact(&self, source: &Path, ext: &str) -> StorageResult<StoredFile> {
        let filename = keys::stored_file_name(ext);
        let path = self.upload_dir.join(&filename);

        if fs::rename(source, &path).await.is_err() {
            fs::copy(source, &path).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to copy {}: {}", path.display(), e))
            })?;
            remove_file_if_exists(source).await?;
        }

        let file = fs::File::open(&path).await?;
        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;
        let size_bytes = file.metadata().await?.len();

        Ok(StoredFile {
            url: self.url_for(&filename),
            filename,
            path,
            size_bytes,
        })
    }

    /// Write a whole-file upload into the upload root under a fresh name.
    pub async fn store_bytes(&self, data: &[u8], ext: &str) -> StorageResult<StoredFile> {
        let filename = keys::stored_file_name(ext);
        let path = self.upload_dir.join(&filename);
        let start = Instant::now();

        write_synced(&path, data).await?;

        tracing::info!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload stored"
        );

        Ok(StoredFile {
            url: self.url_for(&filename),
            filename,
            path,
            size_bytes: data.len() as u64,
        })
    }

    /// Remove the whole session directory. A missing directory is not an error.
    pub async fn delete_session(&self, session_id: &str) -> StorageResult<()> {
        let dir = self.session_dir(session_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(session_id = %session_id, "Session directory removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    async fn discard(&self, parts: &[(u32, PathBuf)], output: &Path) {
        for (_, path) in parts {
            if let Err(e) = remove_file_if_exists(path).await {
                tracing::error!(path = %path.display(), error = %e, "Failed to delete part");
            }
        }
        if let Err(e) = remove_file_if_exists(output).await {
            tracing::error!(path = %output.display(), error = %e, "Failed to delete merged output");
        }
    }
}

/// First index missing from a sorted part list, if the indices are not exactly `0..n`.
fn first_gap(parts: &[(u32, PathBuf)]) -> Option<u32> {
    parts
        .iter()
        .enumerate()
        .find(|(expected, (index, _))| *index != *expected as u32)
        .map(|(expected, _)| expected as u32)
}

async fn write_synced(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
    })?;

    file.write_all(data).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
    })?;

    file.sync_all().await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
    })?;

    Ok(())
}

async fn concat_synced(parts: &[(u32, PathBuf)], output: &Path) -> StorageResult<()> {
    let mut out = fs::File::create(output).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to create file {}: {}", output.display(), e))
    })?;

    for (_, path) in parts {
        let mut part = fs::File::open(path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to open part {}: {}", path.display(), e))
        })?;
        tokio::io::copy(&mut part, &mut out).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to append {}: {}", path.display(), e))
        })?;
    }

    out.flush().await?;
    out.sync_all().await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to sync file {}: {}", output.display(), e))
    })?;
    Ok(())
}

async fn remove_file_if_exists(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::DeleteFailed(format!(
            "Failed to delete {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Best-effort removal on an error path; a failure is logged, not returned.
async fn cleanup_file(path: &Path) {
    if let Err(e) = remove_file_if_exists(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to clean up file");
    }
}
