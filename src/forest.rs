//! Maximum-similarity spanning forest.
//!
//! Frames are vertices, successful pair scores are weighted edges. Taking
//! edges from heaviest to lightest and skipping any that would close a cycle
//! (Kruskal) yields a maximum-weight spanning forest: the cheapest set of
//! diffs that still links every frame that can be linked.
//!
//! Everything is index-addressed: the union-find is a `Vec<usize>` of parent
//! links and the forest is an adjacency list indexed by frame id.

use crate::types::{FrameId, PairScore};

/// Union-find over `0..n` with path compression.
///
/// `union` attaches the second representative under the first; there is no
/// rank or size balancing.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of `x`'s set. Compresses the path it walks.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `x` and `y`. Returns `false` if they were already one set.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return false;
        }
        self.parent[ry] = rx;
        true
    }
}

/// Undirected forest over frame ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningForest {
    adjacency: Vec<Vec<FrameId>>,
    edges: Vec<PairScore>,
}

impl SpanningForest {
    /// Forest with `n` vertices and no edges.
    pub fn empty(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
            edges: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Accepted edges, in the order they were accepted (heaviest first).
    pub fn edges(&self) -> &[PairScore] {
        &self.edges
    }

    pub fn neighbors(&self, id: FrameId) -> &[FrameId] {
        &self.adjacency[id]
    }

    pub fn has_edge(&self, a: FrameId, b: FrameId) -> bool {
        self.adjacency[a].contains(&b)
    }

    fn add_edge(&mut self, edge: PairScore) {
        self.adjacency[edge.a].push(edge.b);
        self.adjacency[edge.b].push(edge.a);
        self.edges.push(edge);
    }
}

/// Sort scores heaviest first, ties by `(a, b)` ascending.
///
/// The tiebreak is what makes manifests byte-identical across runs: scores
/// arrive from the worker pool in completion order.
pub fn sort_scores(scores: &mut [PairScore]) {
    scores.sort_by(|x, y| {
        y.score
            .cmp(&x.score)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });
}

/// Build the maximum spanning forest over `n` frames.
///
/// Scores referencing ids `>= n` or self-pairs are ignored.
pub fn spanning_forest(n: usize, scores: &[PairScore]) -> SpanningForest {
    let mut ordered: Vec<PairScore> = scores
        .iter()
        .copied()
        .filter(|s| s.a < n && s.b < n && s.a != s.b)
        .collect();
    sort_scores(&mut ordered);

    let mut sets = DisjointSet::new(n);
    let mut forest = SpanningForest::empty(n);
    for edge in ordered {
        if sets.union(edge.a, edge.b) {
            forest.add_edge(edge);
        }
    }
    forest
}
