//! Forest of random projection trees for approximate nearest-neighbour search.
//!
//! Each tree recursively splits the item set with a hyperplane drawn between
//! two randomly chosen items until a node holds at most [`LEAF_SIZE`] items.
//! A query walks all trees at once through a shared priority queue keyed by
//! the smallest margin seen on the path, so the most promising branches of
//! every tree are opened first. The candidates collected this way are then
//! ranked by their exact distance to the query.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::{dot, norm, DistanceMetric, ItemId};

pub const LEAF_SIZE: usize = 16;
const MAX_SPLIT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        items: Vec<ItemId>,
    },
    Split {
        normal: Vec<f32>,
        offset: f32,
        left: u32,
        right: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    metric: DistanceMetric,
    nodes: Vec<Node>,
    roots: Vec<u32>,
}

impl Forest {
    /// Builds `tree_count` trees (at least one) over `vectors`, where the
    /// position of each vector is its item id.
    pub fn build(
        vectors: &[Vec<f32>],
        metric: DistanceMetric,
        tree_count: usize,
        seed: u64,
    ) -> Self {
        let mut forest = Self {
            metric,
            nodes: Vec::new(),
            roots: Vec::new(),
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let all_items: Vec<ItemId> = (0..vectors.len() as ItemId).collect();

        for _ in 0..tree_count.max(1) {
            let root = forest.build_node(vectors, all_items.clone(), &mut rng);
            forest.roots.push(root);
        }

        forest
    }

    pub fn tree_count(&self) -> usize {
        self.roots.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns up to `k` `(item, distance)` pairs sorted by ascending distance.
    ///
    /// Traversal stops once at least `search_effort` leaf entries have been
    /// read and at least `k` distinct items collected, or when every tree has
    /// been exhausted. Without an explicit effort, `k * tree_count` is used.
    pub fn search(
        &self,
        vectors: &[Vec<f32>],
        query: &[f32],
        k: usize,
        search_effort: Option<usize>,
    ) -> Vec<(ItemId, f32)> {
        if k == 0 || vectors.is_empty() {
            return Vec::new();
        }

        let search_k = search_effort.unwrap_or(k.saturating_mul(self.roots.len().max(1)));

        let mut queue: BinaryHeap<QueueEntry> = self
            .roots
            .iter()
            .map(|&node| QueueEntry {
                priority: f32::INFINITY,
                node,
            })
            .collect();

        let mut collected = vec![false; vectors.len()];
        let mut candidates: Vec<ItemId> = Vec::new();
        let mut examined = 0usize;

        while let Some(QueueEntry { priority, node }) = queue.pop() {
            if examined >= search_k && candidates.len() >= k {
                break;
            }

            match &self.nodes[node as usize] {
                Node::Leaf { items } => {
                    examined += items.len();
                    for &item in items {
                        let slot = &mut collected[item as usize];
                        if !*slot {
                            *slot = true;
                            candidates.push(item);
                        }
                    }
                }
                Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                } => {
                    let margin = self.margin(normal, *offset, query);
                    queue.push(QueueEntry {
                        priority: priority.min(margin),
                        node: *right,
                    });
                    queue.push(QueueEntry {
                        priority: priority.min(-margin),
                        node: *left,
                    });
                }
            }
        }

        let mut scored: Vec<(ItemId, f32)> = candidates
            .into_iter()
            .map(|item| (item, self.metric.distance(query, &vectors[item as usize])))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    /// Checks that every tree is acyclic, that no node is shared between
    /// trees, and that the leaves of each tree hold every item exactly once.
    pub fn is_consistent(&self, item_count: usize, dimension: usize) -> bool {
        let node_count = self.nodes.len();
        if self.roots.is_empty() {
            return false;
        }

        let mut visited = vec![false; node_count];
        for &root in &self.roots {
            let mut covered = vec![false; item_count];
            let mut covered_count = 0usize;
            let mut stack = vec![root];

            while let Some(node) = stack.pop() {
                let Some(seen) = visited.get_mut(node as usize) else {
                    return false;
                };
                if *seen {
                    return false;
                }
                *seen = true;

                match &self.nodes[node as usize] {
                    Node::Leaf { items } => {
                        for &item in items {
                            match covered.get_mut(item as usize) {
                                Some(slot) if !*slot => {
                                    *slot = true;
                                    covered_count += 1;
                                }
                                _ => return false,
                            }
                        }
                    }
                    Node::Split {
                        normal,
                        left,
                        right,
                        ..
                    } => {
                        if normal.len() != dimension {
                            return false;
                        }
                        stack.push(*left);
                        stack.push(*right);
                    }
                }
            }

            if covered_count != item_count {
                return false;
            }
        }

        true
    }

    fn build_node(&mut self, vectors: &[Vec<f32>], items: Vec<ItemId>, rng: &mut StdRng) -> u32 {
        if items.len() <= LEAF_SIZE {
            return self.push(Node::Leaf { items });
        }

        let mut split = None;
        for _ in 0..MAX_SPLIT_ATTEMPTS {
            let (normal, offset) = self.split_plane(vectors, &items, rng);
            let (left, right) = self.partition(vectors, &items, &normal, offset, rng);
            if !left.is_empty() && !right.is_empty() {
                split = Some((normal, offset, left, right));
                break;
            }
        }

        // All attempts put every item on one side (typically duplicates):
        // fall back to a random balanced split with a neutral plane.
        let (normal, offset, left_items, right_items) = match split {
            Some(split) => split,
            None => {
                let mut shuffled = items;
                shuffled.shuffle(rng);
                let right = shuffled.split_off(shuffled.len() / 2);
                let dimension = vectors[0].len();
                (vec![0.0; dimension], 0.0, shuffled, right)
            }
        };

        let left = self.build_node(vectors, left_items, rng);
        let right = self.build_node(vectors, right_items, rng);
        self.push(Node::Split {
            normal,
            offset,
            left,
            right,
        })
    }

    fn split_plane(
        &self,
        vectors: &[Vec<f32>],
        items: &[ItemId],
        rng: &mut StdRng,
    ) -> (Vec<f32>, f32) {
        let i = rng.gen_range(0..items.len());
        let mut j = rng.gen_range(0..items.len() - 1);
        if j >= i {
            j += 1;
        }
        let a = &vectors[items[i] as usize];
        let b = &vectors[items[j] as usize];

        match self.metric {
            DistanceMetric::Angular | DistanceMetric::Dot => {
                let a = normalized(a);
                let b = normalized(b);
                let normal = a.iter().zip(&b).map(|(x, y)| x - y).collect();
                (normal, 0.0)
            }
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => {
                let normal: Vec<f32> = a.iter().zip(b).map(|(x, y)| x - y).collect();
                let midpoint: Vec<f32> = a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect();
                let offset = -dot(&normal, &midpoint);
                (normal, offset)
            }
            DistanceMetric::Hamming => {
                let mut normal = vec![0.0; a.len()];
                normal[rng.gen_range(0..a.len())] = 1.0;
                (normal, -0.5)
            }
        }
    }

    fn partition(
        &self,
        vectors: &[Vec<f32>],
        items: &[ItemId],
        normal: &[f32],
        offset: f32,
        rng: &mut StdRng,
    ) -> (Vec<ItemId>, Vec<ItemId>) {
        let mut left = Vec::new();
        let mut right = Vec::new();

        for &item in items {
            let margin = self.margin(normal, offset, &vectors[item as usize]);
            let goes_right = match margin.partial_cmp(&0.0) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Less) => false,
                _ => rng.gen_bool(0.5),
            };
            if goes_right {
                right.push(item);
            } else {
                left.push(item);
            }
        }

        (left, right)
    }

    fn margin(&self, normal: &[f32], offset: f32, vector: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Hamming => {
                let bits: f32 = normal
                    .iter()
                    .zip(vector)
                    .filter(|(_, x)| **x != 0.0)
                    .map(|(n, _)| n)
                    .sum();
                bits + offset
            }
            _ => dot(normal, vector) + offset,
        }
    }

    fn push(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / n).collect()
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    priority: f32,
    node: u32,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    fn brute_force(
        vectors: &[Vec<f32>],
        query: &[f32],
        metric: DistanceMetric,
        k: usize,
    ) -> Vec<ItemId> {
        let mut scored: Vec<(ItemId, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i as ItemId, metric.distance(query, v)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.into_iter().take(k).map(|(i, _)| i).collect()
    }

    #[test]
    fn test_small_forest_is_exact() {
        let vectors = random_vectors(12, 8, 1);
        for metric in DistanceMetric::ALL {
            let forest = Forest::build(&vectors, metric, 4, 7);
            let query = &vectors[3];
            let found: Vec<ItemId> = forest
                .search(&vectors, query, 5, None)
                .into_iter()
                .map(|(i, _)| i)
                .collect();
            assert_eq!(found, brute_force(&vectors, query, metric, 5), "{metric}");
        }
    }

    #[test]
    fn test_results_sorted_and_distinct() {
        let vectors = random_vectors(500, 16, 2);
        let forest = Forest::build(&vectors, DistanceMetric::Euclidean, 8, 3);
        let results = forest.search(&vectors, &vectors[10], 20, None);

        assert_eq!(results.len(), 20);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));

        let mut ids: Vec<ItemId> = results.iter().map(|(i, _)| *i).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_query_point_finds_itself() {
        let vectors = random_vectors(400, 12, 4);
        let forest = Forest::build(&vectors, DistanceMetric::Angular, 10, 5);
        for target in [0usize, 77, 399] {
            let results = forest.search(&vectors, &vectors[target], 1, None);
            assert_eq!(results[0].0, target as ItemId);
        }
    }

    #[test]
    fn test_recall_is_high_with_default_effort() {
        let vectors = random_vectors(1000, 16, 6);
        let forest = Forest::build(&vectors, DistanceMetric::Euclidean, 10, 8);
        let queries = random_vectors(20, 16, 9);

        let mut hits = 0;
        for query in &queries {
            let truth = brute_force(&vectors, query, DistanceMetric::Euclidean, 10);
            let found: Vec<ItemId> = forest
                .search(&vectors, query, 10, Some(2000))
                .into_iter()
                .map(|(i, _)| i)
                .collect();
            hits += truth.iter().filter(|t| found.contains(t)).count();
        }

        assert!(hits >= 150, "recall too low: {hits}/200");
    }

    #[test]
    fn test_k_larger_than_item_count() {
        let vectors = random_vectors(5, 4, 10);
        let forest = Forest::build(&vectors, DistanceMetric::Manhattan, 3, 11);
        assert_eq!(forest.search(&vectors, &vectors[0], 50, None).len(), 5);
    }

    #[test]
    fn test_at_least_k_even_with_tiny_effort() {
        let vectors = random_vectors(300, 8, 12);
        let forest = Forest::build(&vectors, DistanceMetric::Euclidean, 5, 13);
        assert_eq!(forest.search(&vectors, &vectors[1], 40, Some(1)).len(), 40);
    }

    #[test]
    fn test_duplicate_vectors_still_split() {
        let vectors = vec![vec![1.0, 1.0]; 100];
        let forest = Forest::build(&vectors, DistanceMetric::Euclidean, 2, 14);
        assert!(forest.node_count() > 2);
        assert!(forest.is_consistent(100, 2));
        assert_eq!(forest.search(&vectors, &[1.0, 1.0], 100, None).len(), 100);
    }

    #[test]
    fn test_hamming_splits_on_bits() {
        let mut rng = StdRng::seed_from_u64(15);
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|_| (0..32).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect())
            .collect();
        let forest = Forest::build(&vectors, DistanceMetric::Hamming, 6, 16);
        let results = forest.search(&vectors, &vectors[42], 1, None);
        assert_eq!(results[0], (42, 0.0));
    }

    #[test]
    fn test_empty_forest() {
        let forest = Forest::build(&[], DistanceMetric::Angular, 3, 0);
        assert_eq!(forest.tree_count(), 3);
        assert!(forest.search(&[], &[1.0], 5, None).is_empty());
    }

    #[test]
    fn test_same_seed_same_forest() {
        let vectors = random_vectors(100, 6, 17);
        let a = Forest::build(&vectors, DistanceMetric::Angular, 4, 99);
        let b = Forest::build(&vectors, DistanceMetric::Angular, 4, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_consistency_check_rejects_out_of_range_items() {
        let vectors = random_vectors(40, 4, 18);
        let forest = Forest::build(&vectors, DistanceMetric::Euclidean, 2, 19);
        assert!(forest.is_consistent(40, 4));
        assert!(!forest.is_consistent(10, 4));
        assert!(!forest.is_consistent(40, 5));
    }

    #[test]
    fn test_consistency_check_rejects_cycles() {
        assert!(!Forest::with_self_loop(DistanceMetric::Euclidean, 4).is_consistent(3, 4));
    }

    #[test]
    fn test_consistency_check_rejects_missing_and_repeated_items() {
        let partial = Forest::with_single_leaf(DistanceMetric::Euclidean, vec![0]);
        assert!(!partial.is_consistent(3, 4));
        assert!(partial.is_consistent(1, 4));

        let repeated = Forest::with_single_leaf(DistanceMetric::Euclidean, vec![0, 1, 1]);
        assert!(!repeated.is_consistent(2, 4));
    }

    #[test]
    fn test_consistency_check_rejects_shared_nodes() {
        let shared = Forest {
            metric: DistanceMetric::Euclidean,
            nodes: vec![Node::Leaf { items: vec![0, 1] }],
            roots: vec![0, 0],
        };
        assert!(!shared.is_consistent(2, 4));
    }

    #[test]
    fn test_huge_k_does_not_overflow() {
        let vectors = random_vectors(20, 3, 21);
        let forest = Forest::build(&vectors, DistanceMetric::Euclidean, 4, 22);
        assert_eq!(forest.search(&vectors, &vectors[0], usize::MAX, None).len(), 20);
    }
}

#[cfg(test)]
impl Forest {
    /// Hand-built forests for load validation tests elsewhere in the crate.
    pub(crate) fn with_single_leaf(metric: DistanceMetric, items: Vec<ItemId>) -> Self {
        Self {
            metric,
            nodes: vec![Node::Leaf { items }],
            roots: vec![0],
        }
    }

    pub(crate) fn with_self_loop(metric: DistanceMetric, dimension: usize) -> Self {
        Self {
            metric,
            nodes: vec![Node::Split {
                normal: vec![1.0; dimension],
                offset: 0.0,
                left: 0,
                right: 0,
            }],
            roots: vec![0],
        }
    }
}
