use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::{Array1, ArrayView1};

use crate::error::{AppError, AppResult};

/// Cosine similarity between two vectors
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance: 1 - cosine similarity
pub fn cosine_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    1.0 - cosine_similarity(a, b)
}

/// A point returned by a neighbor query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Caller-assigned index of the point
    pub index: usize,
    pub distance: f64,
}

impl Neighbor {
    /// Ascending distance, then ascending index
    fn rank(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// Heap entry ordered by `Neighbor::rank`, so the heap top is the worst kept point
struct Ranked(Neighbor);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.0.rank(&other.0) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank(&other.0)
    }
}

/// Brute-force nearest-neighbor search under cosine distance
///
/// Points are streamed through `search`, and only the best `n_neighbors` are
/// kept in memory, so candidate sets never need to be materialized as a matrix.
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighbors {
    n_neighbors: usize,
}

impl NearestNeighbors {
    pub fn new(n_neighbors: usize) -> AppResult<Self> {
        if n_neighbors == 0 {
            return Err(AppError::InvalidInput(
                "Neighbor count must be at least 1".to_string(),
            ));
        }

        Ok(Self { n_neighbors })
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// The `n_neighbors` points closest to `query`, nearest first
    ///
    /// Returns every point when fewer are supplied. Equal distances are
    /// ordered by index; NaN distances rank after every number.
    pub fn search<I>(&self, query: ArrayView1<f64>, points: I) -> Vec<Neighbor>
    where
        I: IntoIterator<Item = (usize, Array1<f64>)>,
    {
        let mut heap = BinaryHeap::with_capacity(self.n_neighbors + 1);

        for (index, point) in points {
            heap.push(Ranked(Neighbor {
                index,
                distance: cosine_distance(query, point.view()),
            }));
            if heap.len() > self.n_neighbors {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.0)
            .collect()
    }
}
