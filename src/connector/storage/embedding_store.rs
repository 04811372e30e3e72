//! File-backed, read-only embedding store.
//!
//! A store is assembled with [`EmbeddingStoreBuilder`] and frozen by
//! [`EmbeddingStoreBuilder::build`]. Persisting it writes two artifacts into
//! one directory:
//!
//! - `index.forest`: vectors and projection trees (bincode)
//! - `metadata.json`: dimension, metric and the item id → payload mapping
//!
//! Both carry the same build id; [`EmbeddingStore::load`] refuses a pair that
//! does not match.

use std::collections::BTreeMap;
use std::fs;
use std::hash::Hash;
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::atomic_file::write_atomic;
use super::forest::Forest;
use crate::application::VectorIndex;
use crate::domain::{
    check_dimension, DistanceMetric, DomainError, ItemId, QueryResult, StoreItem,
};

pub const INDEX_FILE: &str = "index.forest";
pub const METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_TREE_COUNT: usize = 10;

const FORMAT_VERSION: u32 = 1;

/// Values that can be attached to stored vectors.
pub trait Payload: Clone + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Mutable, build-time half of the store.
#[derive(Debug, Clone)]
pub struct EmbeddingStoreBuilder<P> {
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<Vec<f32>>,
    payloads: Vec<P>,
    seed: Option<u64>,
}

impl<P: Payload> EmbeddingStoreBuilder<P> {
    pub fn create(dimension: usize, metric: DistanceMetric) -> Result<Self, DomainError> {
        if dimension == 0 {
            return Err(DomainError::invalid_input("dimension must be at least 1"));
        }

        Ok(Self {
            dimension,
            metric,
            vectors: Vec::new(),
            payloads: Vec::new(),
            seed: None,
        })
    }

    /// Fixes the RNG seed used for tree construction.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn insert(&mut self, vector: Vec<f32>, payload: P) -> Result<ItemId, DomainError> {
        check_dimension(&vector, self.dimension)?;

        let id = ItemId::try_from(self.vectors.len())
            .map_err(|_| DomainError::invalid_input("store is full"))?;

        self.vectors.push(vector);
        self.payloads.push(payload);
        Ok(id)
    }

    pub fn size(&self) -> usize {
        self.vectors.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Builds `tree_count` trees and freezes the store. More trees give
    /// better recall at a higher query cost.
    pub fn build(self, tree_count: usize) -> EmbeddingStore<P> {
        let seed = self.seed.unwrap_or_else(rand::random);
        let forest = Forest::build(&self.vectors, self.metric, tree_count, seed);

        debug!(
            "Built forest with {} trees ({} nodes) over {} items",
            forest.tree_count(),
            forest.node_count(),
            self.vectors.len()
        );

        EmbeddingStore {
            build_id: Uuid::new_v4().to_string(),
            dimension: self.dimension,
            metric: self.metric,
            vectors: self.vectors,
            payloads: self.payloads,
            forest,
        }
    }

    pub fn build_and_persist(
        self,
        tree_count: usize,
        dir: &Path,
    ) -> Result<EmbeddingStore<P>, DomainError> {
        let store = self.build(tree_count);
        store.persist(dir)?;
        Ok(store)
    }
}

/// Immutable nearest-neighbour store over fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct EmbeddingStore<P> {
    build_id: String,
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<Vec<f32>>,
    payloads: Vec<P>,
    forest: Forest,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    build_id: &'a str,
    dimension: usize,
    metric: DistanceMetric,
    vectors: &'a [Vec<f32>],
    forest: &'a Forest,
}

#[derive(Deserialize)]
struct IndexFile {
    build_id: String,
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<Vec<f32>>,
    forest: Forest,
}

#[derive(Serialize)]
struct MetadataFileRef<'a, P> {
    format_version: u32,
    build_id: &'a str,
    dimension: usize,
    metric: DistanceMetric,
    item_count: usize,
    userdata: BTreeMap<ItemId, &'a P>,
}

#[derive(Deserialize)]
struct MetadataFile<P> {
    format_version: u32,
    build_id: String,
    dimension: usize,
    metric: DistanceMetric,
    item_count: usize,
    userdata: BTreeMap<ItemId, P>,
}

impl<P: Payload> EmbeddingStore<P> {
    /// Writes both artifacts into `dir`, creating it if needed. The index is
    /// written before the metadata.
    pub fn persist(&self, dir: &Path) -> Result<(), DomainError> {
        fs::create_dir_all(dir)?;

        let index = IndexFileRef {
            build_id: &self.build_id,
            dimension: self.dimension,
            metric: self.metric,
            vectors: &self.vectors,
            forest: &self.forest,
        };
        let index_bytes = bincode::serialize(&index)
            .map_err(|e| DomainError::storage(format!("Failed to encode index: {}", e)))?;

        let metadata = MetadataFileRef {
            format_version: FORMAT_VERSION,
            build_id: &self.build_id,
            dimension: self.dimension,
            metric: self.metric,
            item_count: self.payloads.len(),
            userdata: self
                .payloads
                .iter()
                .enumerate()
                .map(|(i, payload)| (i as ItemId, payload))
                .collect(),
        };
        let metadata_bytes = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| DomainError::storage(format!("Failed to encode metadata: {}", e)))?;

        write_atomic(&dir.join(INDEX_FILE), &index_bytes)?;
        write_atomic(&dir.join(METADATA_FILE), &metadata_bytes)?;

        info!(
            "Persisted store with {} items ({} trees, {}, dim {}) to {}",
            self.size(),
            self.tree_count(),
            self.metric,
            self.dimension,
            dir.display()
        );

        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, DomainError> {
        let metadata_path = dir.join(METADATA_FILE);
        let metadata_file = fs::File::open(&metadata_path).map_err(|e| {
            DomainError::corrupt(format!("Cannot open {}: {}", metadata_path.display(), e))
        })?;
        let metadata: MetadataFile<P> = serde_json::from_reader(BufReader::new(metadata_file))
            .map_err(|e| {
                DomainError::corrupt(format!("Cannot decode {}: {}", metadata_path.display(), e))
            })?;

        if metadata.format_version != FORMAT_VERSION {
            return Err(DomainError::corrupt(format!(
                "Unsupported metadata format version {}",
                metadata.format_version
            )));
        }
        if metadata.dimension == 0 {
            return Err(DomainError::corrupt("Metadata records a zero dimension"));
        }
        if metadata.userdata.len() != metadata.item_count {
            return Err(DomainError::corrupt(format!(
                "Metadata lists {} payloads for {} items",
                metadata.userdata.len(),
                metadata.item_count
            )));
        }

        let mut payloads = Vec::with_capacity(metadata.item_count);
        for (expected, (id, payload)) in metadata.userdata.into_iter().enumerate() {
            if id as usize != expected {
                return Err(DomainError::corrupt(format!(
                    "Item ids are not dense: expected {}, found {}",
                    expected, id
                )));
            }
            payloads.push(payload);
        }

        let index_path = dir.join(INDEX_FILE);
        let index_file = fs::File::open(&index_path).map_err(|e| {
            DomainError::corrupt(format!("Cannot open {}: {}", index_path.display(), e))
        })?;
        let index: IndexFile = bincode::deserialize_from(BufReader::new(index_file))
            .map_err(|e| {
                DomainError::corrupt(format!("Cannot decode {}: {}", index_path.display(), e))
            })?;

        if index.build_id != metadata.build_id {
            return Err(DomainError::corrupt(format!(
                "Index build {} does not match metadata build {}",
                index.build_id, metadata.build_id
            )));
        }
        if index.dimension != metadata.dimension || index.metric != metadata.metric {
            return Err(DomainError::corrupt(
                "Index and metadata disagree on dimension or metric",
            ));
        }
        if index.vectors.len() != payloads.len() {
            return Err(DomainError::corrupt(format!(
                "Index holds {} vectors but metadata has {} payloads",
                index.vectors.len(),
                payloads.len()
            )));
        }
        if index.vectors.iter().any(|v| v.len() != index.dimension) {
            return Err(DomainError::corrupt("Index holds a vector of the wrong length"));
        }
        if index.forest.metric() != index.metric
            || !index.forest.is_consistent(index.vectors.len(), index.dimension)
        {
            return Err(DomainError::corrupt("Index tree structure is inconsistent"));
        }

        info!(
            "Loaded store with {} items ({} trees, {}, dim {}) from {}",
            payloads.len(),
            index.forest.tree_count(),
            index.metric,
            index.dimension,
            dir.display()
        );

        Ok(Self {
            build_id: index.build_id,
            dimension: index.dimension,
            metric: index.metric,
            vectors: index.vectors,
            payloads,
            forest: index.forest,
        })
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn size(&self) -> usize {
        self.vectors.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn tree_count(&self) -> usize {
        self.forest.tree_count()
    }

    pub fn get_vector(&self, id: ItemId) -> Option<&[f32]> {
        self.vectors.get(id as usize).map(Vec::as_slice)
    }

    pub fn payload(&self, id: ItemId) -> Option<&P> {
        self.payloads.get(id as usize)
    }

    pub fn query(
        &self,
        vector: &[f32],
        k: usize,
        search_effort: Option<usize>,
    ) -> Result<Vec<QueryResult<P>>, DomainError> {
        check_dimension(vector, self.dimension)?;

        Ok(self
            .forest
            .search(&self.vectors, vector, k, search_effort)
            .into_iter()
            .map(|(id, distance)| QueryResult::new(self.payloads[id as usize].clone(), distance))
            .collect())
    }

    /// Iterates over every stored item in id order. Each call starts over.
    pub fn items(&self) -> impl Iterator<Item = StoreItem<'_, P>> + '_ {
        self.payloads
            .iter()
            .zip(&self.vectors)
            .enumerate()
            .map(|(i, (payload, vector))| StoreItem {
                id: i as ItemId,
                payload,
                vector,
            })
    }
}

impl<P: Payload> VectorIndex<P> for EmbeddingStore<P> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn size(&self) -> usize {
        self.vectors.len()
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        search_effort: Option<usize>,
    ) -> Result<Vec<QueryResult<P>>, DomainError> {
        EmbeddingStore::query(self, vector, k, search_effort)
    }
}
