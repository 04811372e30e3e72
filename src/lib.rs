pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use cli::Commands;

pub use application::{
    BuildConfig, BuildIndexUseCase, BuildReport, EmbeddingService, LookupReply, PassageLookup,
    RetrievalConfig, RetrievalService, RetrievalSession, SeenSet, VectorIndex,
};

pub use connector::{
    EmbeddingStore, EmbeddingStoreBuilder, FaqsearchMcpServer, MockEmbedding, OpenAiEmbedding,
    PassageCorpus, TextCorpusLoader,
};

pub use domain::{
    extract_attribution, Attribution, DistanceMetric, DomainError, EmbeddingConfig,
    FormattedContext, Passage, PassageId, QueryResult, SearchOutcome,
};
