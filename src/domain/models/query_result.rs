use serde::{Deserialize, Serialize};

/// Dense, zero-based identifier assigned to each vector at insertion time.
pub type ItemId = u32;

/// A single nearest-neighbour hit: the stored payload and its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<P> {
    payload: P,
    distance: f32,
}

impl<P> QueryResult<P> {
    pub fn new(payload: P, distance: f32) -> Self {
        Self { payload, distance }
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// One stored entry as exposed by store iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreItem<'a, P> {
    pub id: ItemId,
    pub payload: &'a P,
    pub vector: &'a [f32],
}
