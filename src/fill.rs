//! Expanding-radius search that fills a result set of a target size.
//!
//! Instead of a single bounded-heap descent, [`FillSearch`] runs range
//! queries with a geometrically growing radius until at least `k` points are
//! inside, then keeps the `k` closest. The radius seeds from the tree root's
//! median split distance, which lands near the data spread and usually
//! converges in one or two rounds. The final result set is identical to the
//! exact k-NN answer for the same query.

use crate::error::{Result, VantageError};
use crate::vptree::{Neighbor, VpTree};

/// An expanding-radius k-NN search over a built [`VpTree`].
///
/// `search` populates internal result and distance sequences, retrievable
/// via [`results`](Self::results) and [`distances`](Self::distances).
pub struct FillSearch<'a> {
    tree: &'a VpTree,
    target: usize,
    seed_radius: Option<f32>,
    results: Vec<u32>,
    distances: Vec<f32>,
}

impl<'a> FillSearch<'a> {
    /// Create a search that fills up to `target` results.
    pub fn new(tree: &'a VpTree, target: usize) -> Result<Self> {
        if target == 0 {
            return Err(VantageError::invalid_argument("target count must be > 0"));
        }
        Ok(FillSearch {
            tree,
            target,
            seed_radius: None,
            results: Vec::new(),
            distances: Vec::new(),
        })
    }

    /// Override the initial search radius.
    pub fn with_seed_radius(mut self, radius: f32) -> Self {
        self.seed_radius = Some(radius);
        self
    }

    /// Run the expanding-radius search, replacing any previous results.
    ///
    /// Collects fewer than the target only when the index itself holds fewer
    /// points.
    pub fn search(&mut self, query: &[f32]) -> Result<()> {
        let mut radius = self
            .seed_radius
            .or_else(|| self.tree.root_threshold())
            .unwrap_or(1.0);
        // A zero or degenerate seed (all-duplicate points give a zero root
        // threshold) would never grow by doubling.
        if !(radius > 0.0) || !radius.is_finite() {
            radius = 1.0;
        }

        loop {
            let mut hits = self.tree.range(query, radius)?;
            if hits.len() >= self.target || hits.len() == self.tree.len() {
                hits.truncate(self.target);
                self.results = hits.iter().map(|n| n.index).collect();
                self.distances = hits.iter().map(|n| n.distance).collect();
                return Ok(());
            }
            radius *= 2.0;
        }
    }

    /// Point indices collected by the last `search`, ascending by distance.
    pub fn results(&self) -> &[u32] {
        &self.results
    }

    /// Distances aligned with [`results`](Self::results).
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// The collected results as neighbor pairs.
    pub fn neighbors(&self) -> Vec<Neighbor> {
        self.results
            .iter()
            .zip(self.distances.iter())
            .map(|(&index, &distance)| Neighbor { index, distance })
            .collect()
    }
}
