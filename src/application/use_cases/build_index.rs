use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::application::EmbeddingService;
use crate::connector::{EmbeddingStoreBuilder, PassageCorpus, CORPUS_FILE, DEFAULT_TREE_COUNT};
use crate::domain::{DistanceMetric, DomainError, Passage, PassageId};

pub const LOCK_FILE: &str = ".build.lock";

/// Parameters for an offline index build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub tree_count: usize,
    /// Fixed seed for reproducible trees; random when unset.
    pub seed: Option<u64>,
    /// Maximum number of embedding calls in flight.
    pub concurrency: usize,
    /// Passages sent per embedding call.
    pub batch_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            metric: DistanceMetric::Angular,
            tree_count: DEFAULT_TREE_COUNT,
            seed: None,
            concurrency: 4,
            batch_size: 16,
        }
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub tree_count: usize,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub output_dir: PathBuf,
    pub elapsed: Duration,
}

/// Embeds a passage corpus and writes the embedding store plus the passage
/// corpus into one output directory.
pub struct BuildIndexUseCase {
    embedding_service: Arc<dyn EmbeddingService>,
    config: BuildConfig,
}

impl BuildIndexUseCase {
    pub fn new(embedding_service: Arc<dyn EmbeddingService>, config: BuildConfig) -> Self {
        Self {
            embedding_service,
            config,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub async fn execute(
        &self,
        passages: Vec<Passage>,
        output_dir: &Path,
    ) -> Result<BuildReport, DomainError> {
        fs::create_dir_all(output_dir)?;
        let _lock = BuildLock::acquire(output_dir)?;

        let start_time = Instant::now();
        let service_dims = self.embedding_service.config().dimensions();
        if service_dims != self.config.dimension {
            warn!(
                "Embedding model {} produces {} dimensions but the store expects {}",
                self.embedding_service.config().model_name(),
                service_dims,
                self.config.dimension
            );
        }

        info!(
            "Building {} store (dim {}, {} trees) from {} passages into {}",
            self.config.metric,
            self.config.dimension,
            self.config.tree_count,
            passages.len(),
            output_dir.display()
        );

        let embeddings = self.embed_all(&passages).await;

        let mut builder = EmbeddingStoreBuilder::<PassageId>::create(
            self.config.dimension,
            self.config.metric,
        )?;
        if let Some(seed) = self.config.seed {
            builder = builder.with_seed(seed);
        }

        let mut corpus = PassageCorpus::new();
        let mut skipped = 0usize;

        for (passage, embedding) in passages.into_iter().zip(embeddings) {
            let vector = match embedding {
                Ok(vector) => vector,
                Err(e) => {
                    warn!("Skipping passage {}: {}", passage.id(), e);
                    skipped += 1;
                    continue;
                }
            };

            let (id, text) = passage.into_parts();
            match builder.insert(vector, id.clone()) {
                Ok(item_id) => {
                    debug!("Inserted passage {} as item {}", id, item_id);
                    corpus.insert(id, text);
                }
                Err(e) => {
                    warn!("Skipping passage {}: {}", id, e);
                    skipped += 1;
                }
            }
        }

        let indexed = builder.size();
        if indexed == 0 {
            return Err(DomainError::EmptyBuild);
        }

        let tree_count = self.config.tree_count;
        let store_dir = output_dir.to_path_buf();
        let store = tokio::task::spawn_blocking(move || {
            builder.build_and_persist(tree_count, &store_dir)
        })
        .await
        .map_err(|e| DomainError::internal(format!("Index build task failed: {}", e)))??;

        corpus.persist(&output_dir.join(CORPUS_FILE))?;

        let elapsed = start_time.elapsed();
        info!(
            "Indexed {} passages ({} skipped) in {:.2}s",
            indexed,
            skipped,
            elapsed.as_secs_f64()
        );

        Ok(BuildReport {
            indexed,
            skipped,
            tree_count: store.tree_count(),
            dimension: store.dimension(),
            metric: store.metric(),
            output_dir: output_dir.to_path_buf(),
            elapsed,
        })
    }

    /// Embeds every passage in batches, keeping corpus order. Failures are
    /// returned in place so the caller can skip them.
    async fn embed_all(&self, passages: &[Passage]) -> Vec<Result<Vec<f32>, DomainError>> {
        let progress_bar = ProgressBar::new(passages.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message("embedding");

        let batches: Vec<Vec<_>> = stream::iter(passages.chunks(self.config.batch_size.max(1)))
            .map(|batch| self.embed_chunk(batch))
            .buffered(self.config.concurrency.max(1))
            .inspect(|results| progress_bar.inc(results.len() as u64))
            .collect()
            .await;

        progress_bar.finish_with_message("embedded");
        batches.into_iter().flatten().collect()
    }

    /// Embeds one batch in a single call. If the call fails, each passage is
    /// retried alone so only the failing ones are lost.
    async fn embed_chunk(&self, batch: &[Passage]) -> Vec<Result<Vec<f32>, DomainError>> {
        let texts: Vec<String> = batch.iter().map(|p| p.text().to_string()).collect();
        match self.embedding_service.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => vectors.into_iter().map(Ok).collect(),
            Ok(vectors) => {
                warn!(
                    "Batch of {} passages returned {} embeddings, retrying one at a time",
                    batch.len(),
                    vectors.len()
                );
                self.embed_each(batch).await
            }
            Err(e) if batch.len() == 1 => vec![Err(e)],
            Err(e) => {
                debug!("Batch of {} passages failed ({}), retrying one at a time", batch.len(), e);
                self.embed_each(batch).await
            }
        }
    }

    async fn embed_each(&self, batch: &[Passage]) -> Vec<Result<Vec<f32>, DomainError>> {
        let mut results = Vec::with_capacity(batch.len());
        for passage in batch {
            results.push(self.embedding_service.embed(passage.text()).await);
        }
        results
    }
}

/// Exclusive marker file held for the duration of a build.
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(dir: &Path) -> Result<Self, DomainError> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(DomainError::BuildInProgress(dir.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove build lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::connector::{EmbeddingStore, MockEmbedding};
    use crate::domain::EmbeddingConfig;

    /// Mock embeddings that reject one text and count batch calls.
    struct FlakyEmbedding {
        inner: MockEmbedding,
        failing_text: &'static str,
        batch_calls: AtomicUsize,
    }

    impl FlakyEmbedding {
        fn new(dimensions: usize, failing_text: &'static str) -> Self {
            Self {
                inner: MockEmbedding::with_dimensions(dimensions),
                failing_text,
                batch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingService for FlakyEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
            if text == self.failing_text {
                return Err(DomainError::embedding("rejected"));
            }
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }

        fn config(&self) -> &EmbeddingConfig {
            self.inner.config()
        }
    }

    fn passages(texts: &[&str]) -> Vec<Passage> {
        texts.iter().map(|t| Passage::new(*t)).collect()
    }

    fn config(dimension: usize) -> BuildConfig {
        BuildConfig {
            dimension,
            tree_count: 3,
            seed: Some(7),
            ..BuildConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_writes_store_and_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = BuildIndexUseCase::new(Arc::new(MockEmbedding::with_dimensions(8)), config(8));

        let report = use_case
            .execute(passages(&["one", "two", "three"]), dir.path())
            .await
            .unwrap();

        assert_eq!(report.indexed, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.tree_count, 3);

        let store = EmbeddingStore::<PassageId>::load(dir.path()).unwrap();
        let corpus = PassageCorpus::load(&dir.path().join(CORPUS_FILE)).unwrap();
        assert_eq!(store.size(), 3);
        assert_eq!(corpus.len(), 3);
        assert!(store.items().all(|item| corpus.contains(item.payload)));
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_ids_follow_corpus_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = passages(&["a", "b", "c", "d"]);
        let expected: Vec<String> = input.iter().map(|p| p.id().to_string()).collect();

        BuildIndexUseCase::new(Arc::new(MockEmbedding::with_dimensions(4)), config(4))
            .execute(input, dir.path())
            .await
            .unwrap();

        let store = EmbeddingStore::<PassageId>::load(dir.path()).unwrap();
        let payloads: Vec<String> = store.items().map(|item| item.payload.clone()).collect();
        assert_eq!(payloads, expected);
    }

    #[tokio::test]
    async fn test_wrong_dimension_embeddings_fail_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = BuildIndexUseCase::new(Arc::new(MockEmbedding::with_dimensions(8)), config(16));

        let err = use_case
            .execute(passages(&["one", "two"]), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::EmptyBuild));
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_existing_lock_blocks_build() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "1234").unwrap();

        let use_case = BuildIndexUseCase::new(Arc::new(MockEmbedding::with_dimensions(4)), config(4));
        let err = use_case
            .execute(passages(&["one"]), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::BuildInProgress(_)));
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_failed_passage_is_skipped_and_the_rest_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let input = passages(&["one", "two", "broken", "four"]);
        let broken_id = input[2].id().to_string();
        let service = Arc::new(FlakyEmbedding::new(4, "broken"));

        let report = BuildIndexUseCase::new(service, config(4))
            .execute(input, dir.path())
            .await
            .unwrap();

        assert_eq!(report.indexed, 3);
        assert_eq!(report.skipped, 1);

        let store = EmbeddingStore::<PassageId>::load(dir.path()).unwrap();
        let corpus = PassageCorpus::load(&dir.path().join(CORPUS_FILE)).unwrap();
        assert_eq!(store.size(), 3);
        assert_eq!(corpus.len(), 3);
        assert!(store.items().all(|item| item.payload != &broken_id));
        assert!(!corpus.contains(&broken_id));
    }

    #[tokio::test]
    async fn test_passages_are_embedded_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(FlakyEmbedding::new(4, "never"));
        let use_case = BuildIndexUseCase::new(
            service.clone(),
            BuildConfig {
                batch_size: 2,
                ..config(4)
            },
        );

        let report = use_case
            .execute(passages(&["a", "b", "c", "d", "e"]), dir.path())
            .await
            .unwrap();

        assert_eq!(report.indexed, 5);
        assert_eq!(service.batch_calls.load(Ordering::SeqCst), 3);
    }
}
