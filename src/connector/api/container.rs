use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::{
    BuildConfig, BuildIndexUseCase, EmbeddingService, RetrievalConfig, RetrievalService,
};
use crate::connector::{
    EmbeddingStore, MockEmbedding, OpenAiEmbedding, PassageCorpus, TextCorpusLoader, CORPUS_FILE,
};
use crate::domain::PassageId;

pub struct ContainerConfig {
    pub data_dir: PathBuf,
    pub mock_embeddings: bool,
    /// Overrides the embedding width reported by the embedding service.
    pub dimensions: Option<usize>,
    pub retrieval: RetrievalConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            mock_embeddings: false,
            dimensions: None,
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Wires adapters to use cases for one CLI invocation. Stores are loaded on
/// demand so commands that never read them (such as `build`) work against an
/// empty data directory.
pub struct Container {
    embedding_service: Arc<dyn EmbeddingService>,
    config: ContainerConfig,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Result<Self> {
        let embedding_service: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            match config.dimensions {
                Some(dims) => Arc::new(MockEmbedding::with_dimensions(dims)),
                None => Arc::new(MockEmbedding::new()),
            }
        } else {
            debug!("Using OpenAI-compatible embedding service");
            let service = OpenAiEmbedding::from_env()
                .context("Failed to create embedding client")?;
            match config.dimensions {
                Some(dims) => Arc::new(service.with_dimensions(dims)),
                None => Arc::new(service),
            }
        };

        Ok(Self::with_embedding_service(config, embedding_service))
    }

    pub fn with_embedding_service(
        config: ContainerConfig,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            embedding_service,
            config,
        }
    }

    pub fn embedding_service(&self) -> Arc<dyn EmbeddingService> {
        self.embedding_service.clone()
    }

    pub fn dimensions(&self) -> usize {
        self.embedding_service.config().dimensions()
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn corpus_loader(&self, extensions: Option<Vec<String>>) -> TextCorpusLoader {
        match extensions {
            Some(exts) if !exts.is_empty() => TextCorpusLoader::with_extensions(exts),
            _ => TextCorpusLoader::new(),
        }
    }

    pub fn build_use_case(&self, config: BuildConfig) -> BuildIndexUseCase {
        BuildIndexUseCase::new(self.embedding_service.clone(), config)
    }

    pub fn load_store(&self) -> Result<EmbeddingStore<PassageId>> {
        EmbeddingStore::load(self.data_dir())
            .with_context(|| format!("Failed to load store from {}", self.data_dir().display()))
    }

    pub fn load_corpus(&self) -> Result<PassageCorpus> {
        let path = self.data_dir().join(CORPUS_FILE);
        PassageCorpus::load(&path)
            .with_context(|| format!("Failed to load passages from {}", path.display()))
    }

    pub fn retrieval_service(&self) -> Result<RetrievalService> {
        let store = self.load_store()?;
        let corpus = self.load_corpus()?;

        let missing = store
            .items()
            .filter(|item| !corpus.contains(item.payload))
            .count();
        if missing > 0 {
            warn!(
                "{} stored passages have no text in {}; they will be skipped",
                missing, CORPUS_FILE
            );
        }
        if store.dimension() != self.dimensions() {
            warn!(
                "Store dimension {} differs from embedding dimension {}; lookups will fail",
                store.dimension(),
                self.dimensions()
            );
        }

        info!(
            "Loaded {} passages ({} dims, {}) from {}",
            store.size(),
            store.dimension(),
            store.metric(),
            self.data_dir().display()
        );

        Ok(RetrievalService::new(
            Arc::new(store),
            Arc::new(corpus),
            self.embedding_service.clone(),
        )
        .with_config(self.config.retrieval.clone()))
    }
}
