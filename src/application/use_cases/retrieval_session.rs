use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::{EmbeddingService, PassageLookup, VectorIndex};
use crate::domain::{
    extract_attribution, render_contexts, DomainError, FormattedContext, PassageId, SearchOutcome,
};

pub const NO_NEW_RESULTS_MESSAGE: &str = "No new results found.";
pub const UNAVAILABLE_MESSAGE: &str = "Could not find any relevant information for that query.";

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Neighbours requested from the store per search.
    pub over_fetch_count: usize,
    /// Unseen passages handed back per search.
    pub return_count: usize,
    pub search_effort: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            over_fetch_count: 5,
            return_count: 2,
            search_effort: None,
        }
    }
}

/// Passage ids already surfaced in one session. Only ever grows.
#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    ids: HashSet<PassageId>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `true` if the id was not present before.
    pub fn insert(&mut self, id: impl Into<PassageId>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// What the conversational agent receives for one lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupReply {
    Context(String),
    NoNewInformation,
    Unavailable,
}

impl LookupReply {
    pub fn message(&self) -> &str {
        match self {
            LookupReply::Context(text) => text,
            LookupReply::NoNewInformation => NO_NEW_RESULTS_MESSAGE,
            LookupReply::Unavailable => UNAVAILABLE_MESSAGE,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            LookupReply::Context(text) => text,
            other => other.message().to_string(),
        }
    }
}

/// Shared retrieval resources. Cheap to clone; every conversation opens its
/// own session from it.
#[derive(Clone)]
pub struct RetrievalService {
    index: Arc<dyn VectorIndex<PassageId>>,
    passages: Arc<dyn PassageLookup>,
    embedding_service: Arc<dyn EmbeddingService>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        index: Arc<dyn VectorIndex<PassageId>>,
        passages: Arc<dyn PassageLookup>,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            index,
            passages,
            embedding_service,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex<PassageId>> {
        &self.index
    }

    pub fn passages(&self) -> &Arc<dyn PassageLookup> {
        &self.passages
    }

    pub fn embedding_service(&self) -> &Arc<dyn EmbeddingService> {
        &self.embedding_service
    }

    pub fn open_session(&self) -> RetrievalSession {
        let session = RetrievalSession {
            id: Uuid::new_v4().to_string(),
            service: self.clone(),
            seen: SeenSet::new(),
        };
        info!("Opened retrieval session {}", session.id);
        session
    }
}

/// One conversation's view of the store. Never returns a passage twice.
pub struct RetrievalSession {
    id: String,
    service: RetrievalService,
    seen: SeenSet,
}

impl RetrievalSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn mark_seen(&mut self, id: impl Into<PassageId>) {
        self.seen.insert(id);
    }

    /// Searches with the configured over-fetch and return counts.
    pub fn search(&mut self, query_vector: &[f32]) -> Result<SearchOutcome, DomainError> {
        let config = &self.service.config;
        let (over_fetch, return_count) = (config.over_fetch_count, config.return_count);
        self.search_with(query_vector, over_fetch, return_count)
    }

    /// Fetches `over_fetch_count` neighbours, drops the ones already seen and
    /// returns at most `return_count` new passages. Every passage returned,
    /// and every one whose text is missing from the corpus, is recorded as
    /// seen.
    pub fn search_with(
        &mut self,
        query_vector: &[f32],
        over_fetch_count: usize,
        return_count: usize,
    ) -> Result<SearchOutcome, DomainError> {
        let candidates = self.service.index.query(
            query_vector,
            over_fetch_count,
            self.service.config.search_effort,
        )?;

        let mut batch: HashSet<&str> = HashSet::new();
        let mut fresh: Vec<_> = candidates
            .iter()
            .filter(|result| !self.seen.contains(result.payload()))
            .filter(|result| batch.insert(result.payload().as_str()))
            .collect();

        if fresh.is_empty() {
            debug!(
                "Session {}: all {} candidates already seen",
                self.id,
                candidates.len()
            );
            return Ok(SearchOutcome::NoNewResults);
        }
        fresh.truncate(return_count);

        let mut contexts = Vec::with_capacity(fresh.len());
        for result in fresh {
            let passage_id = result.payload().clone();
            self.seen.insert(passage_id.clone());

            let Some(text) = self.service.passages.passage(&passage_id) else {
                debug!(
                    "Session {}: passage {} missing from corpus, skipping",
                    self.id, passage_id
                );
                continue;
            };

            let attribution = extract_attribution(text);
            contexts.push(FormattedContext::new(
                passage_id,
                attribution.source,
                attribution.body,
                result.distance(),
            ));
        }

        Ok(SearchOutcome::Found(contexts))
    }

    /// Embeds `query`, searches, and renders the reply for the agent. Failures
    /// never escape; they come back as [`LookupReply::Unavailable`].
    pub async fn lookup(&mut self, query: &str) -> LookupReply {
        let vector = match self.service.embedding_service.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Session {}: embedding failed for '{}': {}", self.id, query, e);
                return LookupReply::Unavailable;
            }
        };

        let outcome = match self.search(&vector) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Session {}: search failed for '{}': {}", self.id, query, e);
                return LookupReply::Unavailable;
            }
        };

        match outcome {
            SearchOutcome::Found(contexts) if !contexts.is_empty() => {
                let rendered = render_contexts(&contexts);
                info!(
                    "Results for query: {}, full context: {}",
                    query,
                    rendered.replace('\n', "\\n")
                );
                LookupReply::Context(rendered)
            }
            _ => {
                info!("Session {}: no new results for '{}'", self.id, query);
                LookupReply::NoNewInformation
            }
        }
    }

    /// Ends the session and returns how many passages it surfaced.
    pub fn close(self) -> usize {
        let surfaced = self.seen.len();
        info!(
            "Closed retrieval session {} after surfacing {} passages",
            self.id, surfaced
        );
        surfaced
    }
}
