//! Vantage-point tree index for nearest-neighbor search in metric space.
//!
//! The tree recursively partitions the store around a vantage point and the
//! median distance to it: points strictly closer than the median go into the
//! left subtree, the rest (median included) into the right. Searches use the
//! triangle inequality to skip subtrees that cannot contain a better
//! candidate, giving sub-linear lookups on well-structured data.
//!
//! Key properties:
//! - Deterministic builds: vantage points are drawn from a seeded RNG, and
//!   parallel subtree builds derive per-subtree seeds so they produce the
//!   same tree as a sequential build.
//! - Deterministic results: equal distances are ranked by ascending point
//!   index everywhere (search heap, result sorts, median selection).
//! - Expected depth O(log N); degenerate distance distributions degrade to
//!   O(N) because every level still removes its vantage point.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};
use crate::store::VectorStore;
use crate::vector::DistanceMetric;

/// Point sets at least this large build their subtrees on the rayon pool.
const PARALLEL_BUILD_THRESHOLD: usize = 1024;

/// Configuration for VP-tree construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpTreeConfig {
    /// Maximum number of points held directly in a leaf node.
    pub leaf_size: usize,
    /// Distance metric used for partitioning and search.
    pub metric: DistanceMetric,
    /// Seed for vantage-point selection, for reproducible builds.
    pub seed: u64,
    /// Whether to build disjoint subtrees in parallel.
    pub parallel: bool,
}

impl Default for VpTreeConfig {
    fn default() -> Self {
        Self {
            leaf_size: 2,
            metric: DistanceMetric::Euclidean,
            seed: 42,
            parallel: true,
        }
    }
}

impl VpTreeConfig {
    /// Set the leaf size.
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the vantage-point selection seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_size == 0 {
            return Err(VantageError::invalid_argument("leaf_size must be > 0"));
        }
        Ok(())
    }
}

/// A single search hit: a point index and its distance from the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Row index of the point in the store.
    pub index: u32,
    /// Distance from the query under the tree's metric.
    pub distance: f32,
}

/// A node of the tree.
///
/// Invariant: every point in `left` has distance to `vantage` strictly less
/// than `threshold`; every point in `right` has distance >= `threshold`.
#[derive(Debug)]
enum VpNode {
    Leaf {
        points: Vec<u32>,
    },
    Internal {
        vantage: u32,
        threshold: f32,
        left: Option<Box<VpNode>>,
        right: Option<Box<VpNode>>,
    },
}

/// Heap entry ordered by (distance, point index) so that the heap maximum is
/// the worst kept candidate and ties rank lower indices as better.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    distance: f32,
    index: u32,
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// Bounded best-k collector backed by a max-heap.
struct KnnHeap {
    capacity: usize,
    heap: BinaryHeap<HeapEntry>,
}

impl KnnHeap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    fn offer(&mut self, distance: f32, index: u32) {
        let entry = HeapEntry { distance, index };
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
        } else if let Some(&worst) = self.heap.peek()
            && entry < worst
        {
            self.heap.pop();
            self.heap.push(entry);
        }
    }

    /// Current pruning radius: the worst kept distance once the heap is
    /// full, infinity before that.
    fn tau(&self) -> f32 {
        if self.heap.len() == self.capacity {
            self.heap.peek().map_or(f32::INFINITY, |e| e.distance)
        } else {
            f32::INFINITY
        }
    }

    fn into_sorted(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| Neighbor {
                index: e.index,
                distance: e.distance,
            })
            .collect()
    }
}

/// A vantage-point tree over a [`VectorStore`].
///
/// Built once, then read-only; shared across query threads without locking.
pub struct VpTree {
    store: Arc<VectorStore>,
    root: VpNode,
    config: VpTreeConfig,
}

impl VpTree {
    /// Build the tree over every point in the store.
    pub fn build(store: Arc<VectorStore>, config: VpTreeConfig) -> Result<Self> {
        config.validate()?;
        if store.is_empty() {
            return Err(VantageError::empty_index(
                "cannot build an index over zero points",
            ));
        }

        let ids: Vec<u32> = (0..store.len() as u32).collect();
        let root = build_node(&store, &config, ids, config.seed);

        Ok(VpTree {
            store,
            root,
            config,
        })
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// A built tree always holds at least one point.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Dimensionality of the indexed points.
    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// The configuration this tree was built with.
    pub fn config(&self) -> &VpTreeConfig {
        &self.config
    }

    /// The underlying vector store.
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Median split distance at the root, if the root is an internal node.
    pub fn root_threshold(&self) -> Option<f32> {
        match &self.root {
            VpNode::Internal { threshold, .. } => Some(*threshold),
            VpNode::Leaf { .. } => None,
        }
    }

    /// Return the `min(k, N)` nearest points to the query, sorted ascending
    /// by distance with ties broken by ascending point index.
    pub fn knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(VantageError::invalid_argument("k must be > 0"));
        }
        self.check_query(query)?;

        // The heap never holds more than every indexed point.
        let mut heap = KnnHeap::new(k.min(self.len()));
        self.knn_node(&self.root, query, &mut heap);
        Ok(heap.into_sorted())
    }

    /// Return every point within `max_range` of the query, sorted like
    /// [`knn`](Self::knn). `f32::INFINITY` is a legal radius and returns
    /// every indexed point.
    pub fn range(&self, query: &[f32], max_range: f32) -> Result<Vec<Neighbor>> {
        if max_range.is_nan() || max_range < 0.0 {
            return Err(VantageError::invalid_argument(
                "maxRange must be a non-negative number",
            ));
        }
        self.check_query(query)?;

        let mut hits = Vec::new();
        self.range_node(&self.root, query, max_range, &mut hits);
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        Ok(hits)
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension() {
            return Err(VantageError::dimension_mismatch(
                self.dimension(),
                query.len(),
            ));
        }
        Ok(())
    }

    fn knn_node(&self, node: &VpNode, query: &[f32], heap: &mut KnnHeap) {
        match node {
            VpNode::Leaf { points } => {
                for &id in points {
                    heap.offer(self.config.metric.compute(query, self.store.row(id)), id);
                }
            }
            VpNode::Internal {
                vantage,
                threshold,
                left,
                right,
            } => {
                let d = self.config.metric.compute(query, self.store.row(*vantage));
                heap.offer(d, *vantage);

                // Descend the side the query falls on first so tau tightens
                // before the far side is tested.
                if d < *threshold {
                    if let Some(l) = left
                        && d - heap.tau() <= *threshold
                    {
                        self.knn_node(l, query, heap);
                    }
                    if let Some(r) = right
                        && d + heap.tau() >= *threshold
                    {
                        self.knn_node(r, query, heap);
                    }
                } else {
                    if let Some(r) = right
                        && d + heap.tau() >= *threshold
                    {
                        self.knn_node(r, query, heap);
                    }
                    if let Some(l) = left
                        && d - heap.tau() <= *threshold
                    {
                        self.knn_node(l, query, heap);
                    }
                }
            }
        }
    }

    fn range_node(&self, node: &VpNode, query: &[f32], max_range: f32, hits: &mut Vec<Neighbor>) {
        match node {
            VpNode::Leaf { points } => {
                for &id in points {
                    let d = self.config.metric.compute(query, self.store.row(id));
                    if d <= max_range {
                        hits.push(Neighbor {
                            index: id,
                            distance: d,
                        });
                    }
                }
            }
            VpNode::Internal {
                vantage,
                threshold,
                left,
                right,
            } => {
                let d = self.config.metric.compute(query, self.store.row(*vantage));
                if d <= max_range {
                    hits.push(Neighbor {
                        index: *vantage,
                        distance: d,
                    });
                }

                if let Some(l) = left
                    && d - max_range <= *threshold
                {
                    self.range_node(l, query, max_range, hits);
                }
                if let Some(r) = right
                    && d + max_range >= *threshold
                {
                    self.range_node(r, query, max_range, hits);
                }
            }
        }
    }
}

fn build_node(
    store: &Arc<VectorStore>,
    config: &VpTreeConfig,
    mut ids: Vec<u32>,
    seed: u64,
) -> VpNode {
    if ids.len() <= config.leaf_size {
        return VpNode::Leaf { points: ids };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let vantage = ids.swap_remove(rng.random_range(0..ids.len()));
    let vantage_row = store.row(vantage);

    let mut spread: Vec<(f32, u32)> = ids
        .iter()
        .map(|&id| (config.metric.compute(vantage_row, store.row(id)), id))
        .collect();

    let mid = spread.len() / 2;
    spread.select_nth_unstable_by(mid, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let threshold = spread[mid].0;

    // Distances equal to the median go right, so the left partition is
    // strictly below the threshold and recursion always terminates.
    let mut near = Vec::with_capacity(mid);
    let mut far = Vec::with_capacity(spread.len() - mid);
    for (d, id) in spread {
        if d < threshold {
            near.push(id);
        } else {
            far.push(id);
        }
    }

    let near_seed = mix_seed(seed, 1);
    let far_seed = mix_seed(seed, 2);
    let (left, right) = if config.parallel && near.len().max(far.len()) >= PARALLEL_BUILD_THRESHOLD
    {
        rayon::join(
            || build_child(store, config, near, near_seed),
            || build_child(store, config, far, far_seed),
        )
    } else {
        (
            build_child(store, config, near, near_seed),
            build_child(store, config, far, far_seed),
        )
    };

    VpNode::Internal {
        vantage,
        threshold,
        left,
        right,
    }
}

fn build_child(
    store: &Arc<VectorStore>,
    config: &VpTreeConfig,
    ids: Vec<u32>,
    seed: u64,
) -> Option<Box<VpNode>> {
    if ids.is_empty() {
        None
    } else {
        Some(Box::new(build_node(store, config, ids, seed)))
    }
}

/// Splitmix64-style derivation of child seeds, so parallel and sequential
/// builds pick the same vantage points.
fn mix_seed(seed: u64, lane: u64) -> u64 {
    let mut z = seed.wrapping_add(lane.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
