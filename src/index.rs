//! Broad-phase candidate pruning over bounding envelopes.
//!
//! Planar and volumetric modes index ground-truth envelopes in an R-tree
//! and query it once per prediction, so pairs whose bounds cannot overlap
//! are never scored. Keypoint and interval modes skip the index and score
//! densely.

use rstar::{RTree, RTreeObject, AABB};

/// An indexed envelope pointing back at its object's position in the
/// input slice.
#[derive(Debug, Clone)]
struct EnvelopeEntry<P: rstar::Point> {
    index: usize,
    aabb: AABB<P>,
}

impl<P: rstar::Point> RTreeObject for EnvelopeEntry<P> {
    type Envelope = AABB<P>;

    fn envelope(&self) -> AABB<P> {
        self.aabb.clone()
    }
}

/// An R-tree over ground-truth envelopes.
#[derive(Debug)]
pub struct SpatialIndex<P: rstar::Point> {
    tree: RTree<EnvelopeEntry<P>>,
}

/// Index over 2D envelopes, used by the planar modes.
pub type PlanarIndex = SpatialIndex<[f64; 2]>;

/// Index over 3D envelopes, used by cuboid mode.
pub type VolumetricIndex = SpatialIndex<[f64; 3]>;

impl<P: rstar::Point> SpatialIndex<P> {
    /// Bulk-load an index from `(position, envelope)` pairs.
    pub fn build(entries: Vec<(usize, AABB<P>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(index, aabb)| EnvelopeEntry { index, aabb })
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    /// Positions of all indexed envelopes intersecting `query`, in
    /// ascending position order.
    pub fn intersecting(&self, query: &AABB<P>) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(query)
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Number of indexed envelopes.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no envelopes.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
