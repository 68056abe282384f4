//! Chunk reassembly
//!
//! Parts of one upload session may arrive concurrently and in any order. Each
//! part is written under its own deterministic name; the request that observes
//! the full part count merges, verifies, places the artifact and dispatches it
//! to the pipeline. Every write to a session directory runs under a mutex
//! scoped to the session id, so a session is merged at most once while other
//! sessions proceed in parallel. Sessions that completed or were deleted are
//! remembered so a late or retried part cannot recreate their directory.

use dashmap::DashMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;

use mediaload_core::constants::extension_for_content_type;
use mediaload_core::{AppError, MediaArtifact, MediaHooks, PartUpload, SessionState, UploadSession};
use mediaload_processing::{MediaPipeline, StagedArtifact};
use mediaload_storage::{LocalStore, PartWritten, StoredFile};

/// What happened to one ingested part or whole-file upload
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The host already recorded this session; nothing was written.
    AlreadyProcessed(String),
    /// Part index beyond the declared count; ignored.
    Skipped,
    /// Part stored, session still collecting.
    Accepted(PartWritten),
    /// The upload is complete and was dispatched.
    Completed {
        media_id: Option<String>,
        artifact: Option<MediaArtifact>,
    },
}

impl IngestOutcome {
    /// Identifier to return to the client, if any.
    pub fn media_id(&self) -> Option<&str> {
        match self {
            IngestOutcome::AlreadyProcessed(id) => Some(id),
            IngestOutcome::Completed { media_id, .. } => media_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, IngestOutcome::Completed { .. })
    }
}

/// Closed sessions remembered for late parts.
const CLOSED_SESSIONS_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
enum ClosedSession {
    Completed(Option<String>),
    Deleted,
}

pub struct ChunkAssembler {
    store: LocalStore,
    pipeline: Arc<MediaPipeline>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    closed: StdMutex<LruCache<String, ClosedSession>>,
}

impl ChunkAssembler {
    pub fn new(store: LocalStore, pipeline: Arc<MediaPipeline>) -> Self {
        let capacity = NonZeroUsize::new(CLOSED_SESSIONS_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            pipeline,
            locks: DashMap::new(),
            closed: StdMutex::new(LruCache::new(capacity)),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Number of sessions with a live lock entry.
    pub fn active_sessions(&self) -> usize {
        self.locks.len()
    }

    /// Ingest one part (or a whole file) and complete the session when it is the last one.
    #[tracing::instrument(
        skip(self, upload, hooks),
        fields(
            session_id = %upload.session.session_id,
            part_index = ?upload.part_index,
            size_bytes = upload.data.len()
        )
    )]
    pub async fn ingest(
        &self,
        upload: PartUpload,
        hooks: &dyn MediaHooks,
    ) -> Result<IngestOutcome, AppError> {
        let session = &upload.session;
        UploadSession::validate_session_id(&session.session_id)?;

        if let Some(id) = hooks
            .check_already_processed(&session.session_id)
            .await
            .filter(|id| !id.is_empty())
        {
            tracing::info!(media_id = %id, "Session already processed, skipping");
            return Ok(IngestOutcome::AlreadyProcessed(id));
        }

        let Some(total_parts) = session.total_parts else {
            return self.ingest_whole_file(&upload, hooks).await;
        };

        let index = upload
            .part_index
            .ok_or_else(|| AppError::Validation("Part index is required".to_string()))?;
        let total_size = session
            .total_size
            .ok_or_else(|| AppError::Validation("Total file size is required".to_string()))?;

        if index >= total_parts {
            tracing::warn!(total_parts, "Part index out of range, ignoring");
            return Ok(IngestOutcome::Skipped);
        }

        let lock = self.lock_for(&session.session_id);
        let guard = lock.lock_owned().await;
        let result = self
            .ingest_locked(&upload, index, total_parts, total_size, hooks)
            .await;
        drop(guard);
        self.evict(&session.session_id);
        result
    }

    /// Write one part. A declared size that differs from the payload is an integrity failure.
    pub async fn ingest_part(
        &self,
        session_id: &str,
        index: u32,
        declared_part_size: Option<u64>,
        data: &[u8],
    ) -> Result<PartWritten, AppError> {
        Ok(self
            .store
            .write_part(session_id, index, data, declared_part_size)
            .await?)
    }

    /// True when the session directory holds exactly `total_parts` files for this session.
    pub async fn try_complete(&self, session_id: &str, total_parts: u32) -> Result<bool, AppError> {
        let count = self.store.count_session_files(session_id).await?;
        Ok(count == total_parts as usize)
    }

    /// Concatenate the session's parts in index order and verify the total size.
    ///
    /// On a size mismatch the parts and the output are gone when this returns.
    pub async fn merge(
        &self,
        session_id: &str,
        output_name: &str,
        declared_total_size: u64,
    ) -> Result<PathBuf, AppError> {
        Ok(self
            .store
            .merge_parts(session_id, output_name, declared_total_size)
            .await?)
    }

    /// Remove everything stored for a session. Waits for an in-flight merge.
    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        UploadSession::validate_session_id(session_id)?;
        let lock = self.lock_for(session_id);
        let guard = lock.lock_owned().await;
        let result = self.store.delete_session(session_id).await;
        if result.is_ok() {
            self.close(session_id, ClosedSession::Deleted);
        }
        drop(guard);
        self.evict(session_id);
        Ok(result?)
    }

    async fn ingest_locked(
        &self,
        upload: &PartUpload,
        index: u32,
        total_parts: u32,
        total_size: u64,
        hooks: &dyn MediaHooks,
    ) -> Result<IngestOutcome, AppError> {
        let session_id = upload.session.session_id.as_str();

        match self.closed_state(session_id) {
            Some(ClosedSession::Completed(Some(media_id))) => {
                tracing::info!(media_id = %media_id, "Part for a completed session, skipping");
                return Ok(IngestOutcome::AlreadyProcessed(media_id));
            }
            Some(closed) => {
                tracing::warn!(state = ?closed, "Part for a closed session, ignoring");
                return Ok(IngestOutcome::Skipped);
            }
            None => {}
        }

        let written = match self
            .ingest_part(session_id, index, upload.declared_part_size, &upload.data)
            .await
        {
            Ok(written) => written,
            Err(e @ AppError::Integrity(_)) => {
                transition(session_id, SessionState::Collecting, SessionState::Failed);
                self.discard_session(session_id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let outcome = self
            .complete_locked(upload, total_parts, total_size, written, hooks)
            .await?;
        if let IngestOutcome::Completed { media_id, .. } = &outcome {
            self.close(session_id, ClosedSession::Completed(media_id.clone()));
        }
        Ok(outcome)
    }

    async fn complete_locked(
        &self,
        upload: &PartUpload,
        total_parts: u32,
        total_size: u64,
        written: PartWritten,
        hooks: &dyn MediaHooks,
    ) -> Result<IngestOutcome, AppError> {
        let session = &upload.session;
        let session_id = session.session_id.as_str();

        if !self.try_complete(session_id, total_parts).await? {
            tracing::debug!(state = %SessionState::Collecting, total_parts, "Waiting for more parts");
            return Ok(IngestOutcome::Accepted(written));
        }

        transition(session_id, SessionState::Collecting, SessionState::Merging);
        let merged = match self.merge(session_id, &session.filename, total_size).await {
            Ok(merged) => merged,
            Err(e) => {
                transition(session_id, SessionState::Merging, SessionState::Failed);
                if matches!(e, AppError::Integrity(_)) {
                    self.discard_session(session_id).await;
                }
                return Err(e);
            }
        };

        transition(session_id, SessionState::Merging, SessionState::Verifying);
        let ext = artifact_extension(session, upload.content_type.as_deref());
        let stored = match self.store.store_artifact(&merged, &ext).await {
            Ok(stored) => stored,
            Err(e) => {
                transition(session_id, SessionState::Verifying, SessionState::Failed);
                self.discard_session(session_id).await;
                return Err(e.into());
            }
        };
        self.discard_session(session_id).await;
        transition(session_id, SessionState::Verifying, SessionState::Complete);

        self.dispatch(stored, upload, &ext, hooks).await
    }

    async fn ingest_whole_file(
        &self,
        upload: &PartUpload,
        hooks: &dyn MediaHooks,
    ) -> Result<IngestOutcome, AppError> {
        let ext = artifact_extension(&upload.session, upload.content_type.as_deref());
        let stored = self.store.store_bytes(&upload.data, &ext).await?;
        self.dispatch(stored, upload, &ext, hooks).await
    }

    /// Hand a durable artifact to the pipeline and the host.
    async fn dispatch(
        &self,
        stored: StoredFile,
        upload: &PartUpload,
        ext: &str,
        hooks: &dyn MediaHooks,
    ) -> Result<IngestOutcome, AppError> {
        let staged = StagedArtifact {
            path: stored.path,
            filename: stored.filename,
            url: stored.url,
            original_filename: upload.session.filename.clone(),
        };

        let artifact = self
            .pipeline
            .process(
                staged,
                upload.content_type.as_deref(),
                ext,
                upload.session.keep_original,
            )
            .await?;

        let media_id = match &artifact {
            Some(artifact) => hooks.on_media_ready(artifact.clone()).await,
            None => None,
        };

        Ok(IngestOutcome::Completed { media_id, artifact })
    }

    fn closed_state(&self, session_id: &str) -> Option<ClosedSession> {
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn close(&self, session_id: &str, state: ClosedSession) {
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(session_id.to_string(), state);
    }

    async fn discard_session(&self, session_id: &str) {
        if let Err(e) = self.store.delete_session(session_id).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to remove session directory");
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the session's lock entry unless another request holds or awaits it.
    fn evict(&self, session_id: &str) {
        self.locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn transition(session_id: &str, from: SessionState, to: SessionState) {
    if to == SessionState::Failed {
        tracing::warn!(session_id = %session_id, from = %from, to = %to, "Session state changed");
    } else {
        tracing::info!(session_id = %session_id, from = %from, to = %to, "Session state changed");
    }
}

/// Extension for the stored artifact: the filename's, else the one registered for the content type.
fn artifact_extension(session: &UploadSession, content_type: Option<&str>) -> String {
    let ext = session.extension();
    if !ext.is_empty() {
        return ext;
    }
    content_type
        .and_then(extension_for_content_type)
        .map(str::to_string)
        .unwrap_or_default()
}
