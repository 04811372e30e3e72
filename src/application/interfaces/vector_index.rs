use crate::domain::{DistanceMetric, DomainError, QueryResult};

/// Read-only nearest-neighbour lookup over stored vectors.
///
/// Implementations are immutable once built, so a single instance can be
/// shared across any number of concurrent readers.
pub trait VectorIndex<P>: Send + Sync {
    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    fn size(&self) -> usize;

    /// Returns up to `k` results ordered by ascending distance.
    /// `search_effort` bounds how many candidates are examined; `None`
    /// lets the implementation pick a default proportional to `k`.
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        search_effort: Option<usize>,
    ) -> Result<Vec<QueryResult<P>>, DomainError>;
}
