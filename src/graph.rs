//! Rooted dependency forest.
//!
//! The spanning forest says which frames should diff against each other but
//! not in which direction. This module picks one root per connected
//! component (the frame with the smallest file, since it is stored in full)
//! and orients every edge away from it with a breadth-first traversal. The
//! result maps each non-root frame to exactly one parent.
//!
//! ```text
//! forest:   2 ── 0 ── 1        sizes: 0=900  1=400  2=700   3=50
//!                                                    (3 isolated)
//! roots:    [1, 3]
//! parents:  0 → 1, 2 → 0
//! ```

use crate::forest::SpanningForest;
use crate::types::FrameId;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown frame id {0}")]
    UnknownFrame(FrameId),
    #[error("Circular dependency detected involving frame {0}")]
    Cycle(FrameId),
}

/// Roots plus the parent of every other frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    frame_count: usize,
    roots: Vec<FrameId>,
    parents: BTreeMap<FrameId, FrameId>,
}

impl DependencyGraph {
    /// Assemble a graph from already-decided roots and parents.
    ///
    /// Used when reading a manifest back; no structural checks are made here,
    /// [`chain`](Self::chain) reports cycles lazily.
    pub fn from_parts(
        frame_count: usize,
        mut roots: Vec<FrameId>,
        parents: BTreeMap<FrameId, FrameId>,
    ) -> Self {
        roots.sort_unstable();
        roots.dedup();
        Self {
            frame_count,
            roots,
            parents,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Root ids, ascending.
    pub fn roots(&self) -> &[FrameId] {
        &self.roots
    }

    /// Child → parent for every non-root frame.
    pub fn parents(&self) -> &BTreeMap<FrameId, FrameId> {
        &self.parents
    }

    pub fn is_root(&self, id: FrameId) -> bool {
        self.roots.binary_search(&id).is_ok()
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.parents.get(&id).copied()
    }

    /// Ancestry of `id`, from its root down to `id` itself.
    pub fn chain(&self, id: FrameId) -> Result<Vec<FrameId>, GraphError> {
        if id >= self.frame_count {
            return Err(GraphError::UnknownFrame(id));
        }
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if parent >= self.frame_count {
                return Err(GraphError::UnknownFrame(parent));
            }
            if chain.contains(&parent) {
                return Err(GraphError::Cycle(parent));
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }
}

/// Orient the spanning forest into a dependency graph.
///
/// `sizes[id]` is the on-disk size of frame `id`. Components are visited in
/// ascending id order; each component's root is its smallest file, ties
/// broken by the smaller id.
pub fn build(forest: &SpanningForest, sizes: &[u64]) -> DependencyGraph {
    let n = forest.vertex_count();
    debug_assert_eq!(n, sizes.len());

    let mut roots = Vec::new();
    let mut parents = BTreeMap::new();
    let mut placed = vec![false; n];

    for start in 0..n {
        if placed[start] {
            continue;
        }

        let component = collect_component(forest, start);
        let root = component
            .iter()
            .copied()
            .min_by_key(|&id| (sizes[id], id))
            .unwrap_or(start);
        roots.push(root);

        placed[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for &child in forest.neighbors(node) {
                if !placed[child] {
                    placed[child] = true;
                    parents.insert(child, node);
                    queue.push_back(child);
                }
            }
        }
    }

    DependencyGraph::from_parts(n, roots, parents)
}

/// Every frame reachable from `start` over forest edges, in BFS order.
fn collect_component(forest: &SpanningForest, start: FrameId) -> Vec<FrameId> {
    let mut seen = vec![false; forest.vertex_count()];
    let mut order = Vec::new();
    let mut queue = VecDeque::from([start]);
    seen[start] = true;
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in forest.neighbors(node) {
            if !seen[next] {
                seen[next] = true;
                queue.push_back(next);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::spanning_forest;
    use crate::types::PairScore;

    fn s(score: u64, a: usize, b: usize) -> PairScore {
        PairScore::new(score, a, b)
    }

    fn component_of(graph: &DependencyGraph, id: FrameId) -> FrameId {
        graph.chain(id).unwrap()[0]
    }

    #[test]
    fn module_doc_example() {
        let forest = spanning_forest(4, &[s(10, 0, 1), s(8, 0, 2)]);
        let graph = build(&forest, &[900, 400, 700, 50]);

        assert_eq!(graph.roots(), &[1, 3]);
        assert_eq!(graph.parent(0), Some(1));
        assert_eq!(graph.parent(2), Some(0));
        assert_eq!(graph.parent(1), None);
        assert_eq!(graph.parent(3), None);
    }

    #[test]
    fn root_ties_broken_by_smallest_id() {
        let forest = spanning_forest(3, &[s(4, 0, 1), s(4, 1, 2)]);
        let graph = build(&forest, &[10, 10, 10]);
        assert_eq!(graph.roots(), &[0]);
        assert_eq!(graph.parent(1), Some(0));
        // Path 0 - 1 - 2: frame 2 is only reachable through 1
        assert_eq!(graph.parent(2), Some(1));
    }

    #[test]
    fn isolated_frames_are_their_own_roots() {
        let forest = spanning_forest(3, &[]);
        let graph = build(&forest, &[5, 1, 3]);
        assert_eq!(graph.roots(), &[0, 1, 2]);
        assert!(graph.parents().is_empty());
    }

    #[test]
    fn bfs_layers_parents_before_children() {
        // Path 0-1-2-3 with the root in the middle
        let forest = spanning_forest(4, &[s(9, 0, 1), s(8, 1, 2), s(7, 2, 3)]);
        let graph = build(&forest, &[40, 30, 10, 20]);
        assert_eq!(graph.roots(), &[2]);
        assert_eq!(graph.parent(1), Some(2));
        assert_eq!(graph.parent(3), Some(2));
        assert_eq!(graph.parent(0), Some(1));
        assert_eq!(graph.chain(0).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn every_frame_is_root_or_has_one_acyclic_parent_chain() {
        let n = 9;
        let mut scores = Vec::new();
        for a in 0..n {
            for b in (a + 1)..n {
                // Two clusters: {0..5} and {5..9}
                if (a < 5) == (b < 5) {
                    scores.push(s(((a * 31 + b * 17) % 23) as u64, a, b));
                }
            }
        }
        let sizes: Vec<u64> = (0..n).map(|i| ((i * 37) % 11) as u64 + 1).collect();
        let graph = build(&spanning_forest(n, &scores), &sizes);

        assert_eq!(graph.roots().len(), 2);
        assert_eq!(graph.roots().len() + graph.parents().len(), n);
        for id in 0..n {
            assert_ne!(graph.is_root(id), graph.parent(id).is_some());
            let chain = graph.chain(id).unwrap();
            assert!(graph.is_root(chain[0]));
            assert_eq!(*chain.last().unwrap(), id);
        }
    }

    #[test]
    fn root_is_smallest_in_component() {
        let scores = [s(5, 0, 1), s(5, 1, 2), s(3, 3, 4)];
        let sizes = [30, 20, 25, 8, 9];
        let graph = build(&spanning_forest(5, &scores), &sizes);
        for id in 0..5 {
            let root = component_of(&graph, id);
            assert!(sizes[root] <= sizes[id]);
        }
    }

    #[test]
    fn chain_of_root_is_itself() {
        let graph = build(&spanning_forest(2, &[s(1, 0, 1)]), &[1, 2]);
        assert_eq!(graph.chain(0).unwrap(), vec![0]);
    }

    #[test]
    fn chain_detects_cycles() {
        let parents = BTreeMap::from([(0, 1), (1, 0)]);
        let graph = DependencyGraph::from_parts(2, vec![], parents);
        assert!(matches!(graph.chain(0), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn chain_rejects_unknown_ids() {
        let graph = DependencyGraph::from_parts(2, vec![0, 1], BTreeMap::new());
        assert_eq!(graph.chain(5), Err(GraphError::UnknownFrame(5)));

        let dangling = DependencyGraph::from_parts(2, vec![0], BTreeMap::from([(1, 7)]));
        assert_eq!(dangling.chain(1), Err(GraphError::UnknownFrame(7)));
    }
}
