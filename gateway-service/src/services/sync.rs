//! Content synchronization pipeline: reconciles the source repository and
//! the Policy Store into public/protected object storage.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use service_core::error::AppError;

use crate::dtos::{SyncErrorEntry, SyncReport};
use crate::models::{
    AccessMode, BuildKind, BuildTrigger, DocumentArtifact, Visibility,
};
use crate::services::processor::{document_location, process_document};
use crate::services::source::SourceFetcher;
use crate::services::storage::Storage;
use crate::services::Database;

/// How many documents are fetched/processed concurrently. Same-key writes
/// are still serialized via per-key locks.
const SYNC_CONCURRENCY: usize = 4;

pub struct SyncService {
    db: Database,
    fetcher: Arc<dyn SourceFetcher>,
    public_storage: Arc<dyn Storage>,
    protected_storage: Arc<dyn Storage>,
    content_root: String,
    fetch_timeout: Duration,
    // One lock per in-flight storage key; entries are evicted once the last
    // holder releases them, so the map never outlives a run.
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

struct ProcessOutcome {
    artifact: DocumentArtifact,
    missing_rule: bool,
}

impl SyncService {
    pub fn new(
        db: Database,
        fetcher: Arc<dyn SourceFetcher>,
        public_storage: Arc<dyn Storage>,
        protected_storage: Arc<dyn Storage>,
        content_root: String,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            db,
            fetcher,
            public_storage,
            protected_storage,
            content_root,
            fetch_timeout,
            key_locks: DashMap::new(),
        }
    }

    /// Run one synchronization pass over the given paths.
    ///
    /// Opens a build record, processes every path (collecting per-document
    /// failures instead of aborting), reconciles object storage, and
    /// finalizes the build record exactly once. Only a pipeline-level error
    /// marks the build `failed`.
    pub async fn run(
        &self,
        paths: Vec<String>,
        removed_paths: Vec<String>,
        kind: BuildKind,
        trigger: BuildTrigger,
        revision: Option<String>,
        branch: Option<String>,
    ) -> Result<SyncReport, AppError> {
        let build_id = self
            .db
            .open_build_log(kind, trigger, revision.as_deref(), branch.as_deref())
            .await?;

        tracing::info!(
            build_id = %build_id,
            kind = kind.as_str(),
            files = paths.len(),
            "Sync run started"
        );

        match self.execute(build_id, paths, removed_paths, kind).await {
            Ok((report, log_lines)) => {
                if let Err(e) = self
                    .db
                    .finalize_build_log(build_id, true, Some(&log_lines.join("\n")), None)
                    .await
                {
                    tracing::error!(build_id = %build_id, "Failed to finalize build log: {}", e);
                }
                tracing::info!(
                    build_id = %build_id,
                    uploaded = report.uploaded,
                    skipped = report.skipped,
                    errors = report.errors.len(),
                    "Sync run completed"
                );
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(fin) = self
                    .db
                    .finalize_build_log(build_id, false, None, Some(&message))
                    .await
                {
                    tracing::error!(build_id = %build_id, "Failed to finalize build log: {}", fin);
                }
                tracing::error!(build_id = %build_id, "Sync run failed: {}", message);
                Err(e)
            }
        }
    }

    /// Full resync: enumerate the entire source tree instead of relying on
    /// a change set, and prune stored artifacts with no source document.
    pub async fn run_full(
        &self,
        trigger: BuildTrigger,
        revision: Option<String>,
        branch: Option<String>,
    ) -> Result<SyncReport, AppError> {
        let paths = self.fetcher.list_content_paths().await?;
        self.run(paths, Vec::new(), BuildKind::Full, trigger, revision, branch)
            .await
    }

    async fn execute(
        &self,
        build_id: uuid::Uuid,
        paths: Vec<String>,
        removed_paths: Vec<String>,
        kind: BuildKind,
    ) -> Result<(SyncReport, Vec<String>), AppError> {
        // The Policy Store is the single authority for visibility; load it
        // once per run. An unparseable stored mode fails the whole run.
        let rules = self.db.all_rules_with_allowlists().await?;
        let mut visibility: HashMap<(String, String), AccessMode> = HashMap::new();
        for (rule, _) in &rules {
            visibility.insert(
                (rule.content_type.clone(), rule.slug.clone()),
                rule.mode()?,
            );
        }

        let files_processed = paths.len();
        let mut log_lines = Vec::new();
        let mut errors: Vec<SyncErrorEntry> = Vec::new();
        let mut artifacts: Vec<DocumentArtifact> = Vec::new();

        let outcomes: Vec<(String, Result<ProcessOutcome, AppError>)> =
            stream::iter(paths.into_iter().map(|path| {
                let visibility = &visibility;
                async move {
                    let outcome = self.process_path(&path, visibility).await;
                    (path, outcome)
                }
            }))
            .buffer_unordered(SYNC_CONCURRENCY)
            .collect()
            .await;

        for (path, outcome) in outcomes {
            match outcome {
                Ok(ProcessOutcome {
                    artifact,
                    missing_rule,
                }) => {
                    if missing_rule {
                        tracing::warn!(
                            content_type = %artifact.content_type,
                            slug = %artifact.slug,
                            "No access rule for document; defaulting to public"
                        );
                        log_lines.push(format!(
                            "warning: no access rule for {}/{}, defaulting to public",
                            artifact.content_type, artifact.slug
                        ));
                    }
                    artifacts.push(artifact);
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(path = %path, "Document sync failed: {}", message);
                    log_lines.push(format!("error: {}: {}", path, message));
                    errors.push(SyncErrorEntry { path, message });
                }
            }
        }

        let (public, protected): (Vec<_>, Vec<_>) =
            artifacts.into_iter().partition(|a| !a.is_protected);

        // One listing per bucket up front, so a steady-state run issues no
        // opposite-bucket deletes at all.
        let public_keys: HashSet<String> =
            self.public_storage.list().await?.into_iter().collect();
        let protected_keys: HashSet<String> =
            self.protected_storage.list().await?.into_iter().collect();

        let mut uploaded = 0;
        let mut skipped = 0;
        let mut deleted = 0;

        for artifact in &public {
            let in_opposite = protected_keys.contains(&artifact.storage_key());
            match self
                .reconcile_artifact(
                    artifact,
                    &self.public_storage,
                    &self.protected_storage,
                    in_opposite,
                )
                .await
            {
                Ok(true) => uploaded += 1,
                Ok(false) => skipped += 1,
                Err(e) => {
                    let path = artifact.storage_key();
                    let message = e.to_string();
                    log_lines.push(format!("error: {}: {}", path, message));
                    errors.push(SyncErrorEntry { path, message });
                }
            }
        }
        for artifact in &protected {
            let in_opposite = public_keys.contains(&artifact.storage_key());
            match self
                .reconcile_artifact(
                    artifact,
                    &self.protected_storage,
                    &self.public_storage,
                    in_opposite,
                )
                .await
            {
                Ok(true) => uploaded += 1,
                Ok(false) => skipped += 1,
                Err(e) => {
                    let path = artifact.storage_key();
                    let message = e.to_string();
                    log_lines.push(format!("error: {}: {}", path, message));
                    errors.push(SyncErrorEntry { path, message });
                }
            }
        }

        // Documents removed from the source are removed from both sides.
        for path in &removed_paths {
            match document_location(path, &self.content_root) {
                Ok((content_type, slug)) => {
                    let key = format!("{}/{}.json", content_type, slug);
                    deleted += self.delete_everywhere(&key).await;
                }
                Err(e) => {
                    log_lines.push(format!("error: {}: {}", path, e));
                    errors.push(SyncErrorEntry {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // A full resync drives storage to match the source exactly: stored
        // artifacts without a source document are pruned.
        if kind == BuildKind::Full {
            let expected_public: HashSet<String> =
                public.iter().map(|a| a.storage_key()).collect();
            let expected_protected: HashSet<String> =
                protected.iter().map(|a| a.storage_key()).collect();

            deleted += self.prune(&self.public_storage, &expected_public).await?;
            deleted += self
                .prune(&self.protected_storage, &expected_protected)
                .await?;
        }

        log_lines.push(format!(
            "processed {} files: {} public, {} protected, {} uploaded, {} skipped, {} deleted, {} errors",
            files_processed,
            public.len(),
            protected.len(),
            uploaded,
            skipped,
            deleted,
            errors.len()
        ));

        let report = SyncReport {
            build_id,
            files_processed,
            public_count: public.len(),
            protected_count: protected.len(),
            uploaded,
            skipped,
            deleted,
            errors,
        };
        Ok((report, log_lines))
    }

    /// Fetch, parse, and classify one document. Failures here are
    /// per-document and never abort the run.
    async fn process_path(
        &self,
        path: &str,
        visibility: &HashMap<(String, String), AccessMode>,
    ) -> Result<ProcessOutcome, AppError> {
        let raw = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_file(path))
            .await
            .map_err(|_| {
                AppError::UpstreamError(format!(
                    "Source fetch timed out after {}s",
                    self.fetch_timeout.as_secs()
                ))
            })??;

        let mut artifact = process_document(path, &raw, &self.content_root)?;

        let mode = visibility
            .get(&(artifact.content_type.clone(), artifact.slug.clone()))
            .copied();
        let (vis, missing_rule) = Visibility::resolve(mode);
        artifact.is_protected = vis == Visibility::Protected;

        Ok(ProcessOutcome {
            artifact,
            missing_rule,
        })
    }

    /// Idempotent upload: writes only when the stored bytes differ, and
    /// removes the artifact from the opposite-visibility bucket when it is
    /// present there. Writes to one key are serialized so concurrent runs
    /// cannot interleave on it.
    async fn reconcile_artifact(
        &self,
        artifact: &DocumentArtifact,
        target: &Arc<dyn Storage>,
        opposite: &Arc<dyn Storage>,
        in_opposite: bool,
    ) -> Result<bool, AppError> {
        let key = artifact.storage_key();
        let data = serde_json::to_vec(artifact).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize artifact: {}", e))
        })?;

        let lock = self.lock_for(&key);
        let guard = lock.lock().await;

        let result: Result<bool, AppError> = async {
            if in_opposite {
                opposite.delete(&key).await?;
            }

            let changed = match target.download(&key).await {
                Ok(existing) => content_hash(&existing) != content_hash(&data),
                Err(_) => true,
            };

            if changed {
                target.upload(&key, data).await?;
                tracing::debug!(key = %key, "Artifact uploaded");
            } else {
                tracing::debug!(key = %key, "Artifact unchanged, skipped");
            }
            Ok(changed)
        }
        .await;

        drop(guard);
        drop(lock);
        self.release_lock(&key);
        result
    }

    async fn delete_everywhere(&self, key: &str) -> usize {
        let lock = self.lock_for(key);
        let guard = lock.lock().await;

        let mut deleted = 0;
        for storage in [&self.public_storage, &self.protected_storage] {
            if storage.download(key).await.is_err() {
                continue;
            }
            if let Err(e) = storage.delete(key).await {
                tracing::warn!(key = %key, "Failed to delete artifact: {}", e);
            } else {
                deleted += 1;
            }
        }

        drop(guard);
        drop(lock);
        self.release_lock(key);
        deleted
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Evict a key's lock entry once no task holds it. The strong-count check
    /// runs under the shard lock, so a concurrent `lock_for` either sees the
    /// entry (and keeps it alive) or inserts a fresh one after removal.
    fn release_lock(&self, key: &str) {
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) <= 1);
    }

    async fn prune(
        &self,
        storage: &Arc<dyn Storage>,
        expected: &HashSet<String>,
    ) -> Result<usize, AppError> {
        let mut deleted = 0;
        for key in storage.list().await? {
            if !expected.contains(&key) {
                storage.delete(&key).await?;
                tracing::info!(key = %key, bucket = storage.bucket(), "Pruned stale artifact");
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

fn content_hash(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::LocalStorage;
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;
    use tempfile::TempDir;

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoFetcher;

    #[async_trait]
    impl SourceFetcher for NoFetcher {
        async fn fetch_file(&self, path: &str) -> Result<String, AppError> {
            Err(AppError::NotFound(anyhow::anyhow!("no such file: {}", path)))
        }

        async fn list_content_paths(&self) -> Result<Vec<String>, AppError> {
            Ok(Vec::new())
        }
    }

    /// Storage wrapper that counts delete calls.
    struct CountingStorage {
        inner: LocalStorage,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl Storage for CountingStorage {
        async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
            self.inner.upload(key, data).await
        }

        async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
            self.inner.download(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(key).await
        }

        async fn list(&self) -> Result<Vec<String>, AppError> {
            self.inner.list().await
        }

        fn bucket(&self) -> &str {
            self.inner.bucket()
        }
    }

    // The reconciliation methods never touch the database; a lazy pool is
    // enough to construct the service.
    fn service_over(
        public: Arc<dyn Storage>,
        protected: Arc<dyn Storage>,
    ) -> SyncService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();

        SyncService::new(
            Database::new(pool),
            Arc::new(NoFetcher),
            public,
            protected,
            "content".to_string(),
            Duration::from_secs(5),
        )
    }

    async fn service() -> (SyncService, TempDir, TempDir) {
        let public_dir = tempfile::tempdir().unwrap();
        let protected_dir = tempfile::tempdir().unwrap();

        let public: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(public_dir.path(), "public").await.unwrap(),
        );
        let protected: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(protected_dir.path(), "protected")
                .await
                .unwrap(),
        );

        (service_over(public, protected), public_dir, protected_dir)
    }

    fn artifact(slug: &str, body: &str, protected: bool) -> DocumentArtifact {
        DocumentArtifact {
            slug: slug.to_string(),
            content_type: "notes".to_string(),
            title: slug.to_string(),
            date: None,
            reading_time_minutes: 1,
            excerpt: String::new(),
            rendered_body: body.to_string(),
            is_protected: protected,
        }
    }

    #[tokio::test]
    async fn unchanged_artifact_is_skipped_on_second_pass() {
        let (svc, _d1, _d2) = service().await;
        let doc = artifact("a", "<p>hi</p>", false);

        let first = svc
            .reconcile_artifact(&doc, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();
        assert!(first);

        let second = svc
            .reconcile_artifact(&doc, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();
        assert!(!second);

        let changed = artifact("a", "<p>edited</p>", false);
        let third = svc
            .reconcile_artifact(&changed, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();
        assert!(third);
    }

    #[tokio::test]
    async fn visibility_flip_moves_the_artifact() {
        let (svc, _d1, _d2) = service().await;
        let doc = artifact("a", "<p>hi</p>", false);
        svc.reconcile_artifact(&doc, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();
        assert!(svc.public_storage.download("notes/a.json").await.is_ok());

        let doc = artifact("a", "<p>hi</p>", true);
        svc.reconcile_artifact(&doc, &svc.protected_storage, &svc.public_storage, true)
            .await
            .unwrap();

        assert!(svc.public_storage.download("notes/a.json").await.is_err());
        assert!(svc.protected_storage.download("notes/a.json").await.is_ok());
    }

    #[tokio::test]
    async fn steady_state_reconcile_issues_no_deletes() {
        let public_dir = tempfile::tempdir().unwrap();
        let protected_dir = tempfile::tempdir().unwrap();

        let public: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(public_dir.path(), "public").await.unwrap(),
        );
        let counting = Arc::new(CountingStorage {
            inner: LocalStorage::new(protected_dir.path(), "protected")
                .await
                .unwrap(),
            deletes: AtomicUsize::new(0),
        });
        let protected: Arc<dyn Storage> = counting.clone();

        let svc = service_over(public, protected);
        let doc = artifact("a", "<p>hi</p>", false);

        svc.reconcile_artifact(&doc, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();
        svc.reconcile_artifact(&doc, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();

        assert_eq!(counting.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn key_locks_are_released_after_use() {
        let (svc, _d1, _d2) = service().await;
        let doc = artifact("a", "<p>hi</p>", false);

        svc.reconcile_artifact(&doc, &svc.public_storage, &svc.protected_storage, false)
            .await
            .unwrap();
        assert!(svc.key_locks.is_empty());

        svc.delete_everywhere("notes/a.json").await;
        assert!(svc.key_locks.is_empty());
    }

    #[tokio::test]
    async fn prune_removes_only_unexpected_keys() {
        let (svc, _d1, _d2) = service().await;
        svc.public_storage
            .upload("notes/keep.json", b"{}".to_vec())
            .await
            .unwrap();
        svc.public_storage
            .upload("notes/stale.json", b"{}".to_vec())
            .await
            .unwrap();

        let expected: HashSet<String> = ["notes/keep.json".to_string()].into_iter().collect();
        let deleted = svc.prune(&svc.public_storage, &expected).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(svc.public_storage.download("notes/keep.json").await.is_ok());
        assert!(svc.public_storage.download("notes/stale.json").await.is_err());
    }

    #[tokio::test]
    async fn delete_everywhere_counts_existing_copies() {
        let (svc, _d1, _d2) = service().await;
        svc.public_storage
            .upload("notes/a.json", b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(svc.delete_everywhere("notes/a.json").await, 1);
        assert_eq!(svc.delete_everywhere("notes/a.json").await, 0);
    }
}
