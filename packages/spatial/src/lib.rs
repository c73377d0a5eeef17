#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Broad-phase spatial index over entity bounding boxes.
//!
//! Maps each entity's bounding box to its identifier in a bulk-loaded
//! R-tree. A box query returns *candidate* ids only — every entry whose
//! box overlaps the query box — to be refined by exact geometry tests
//! against the entities themselves. The index never owns geometry.

use std::collections::BTreeSet;

use rstar::{AABB, Envelope, PointDistance, RTree, RTreeObject};
use thiserror::Error;

/// Axis-aligned bounding box in canonical coordinates.
pub type Aabb = AABB<[f64; 2]>;

/// One indexed bounding box and the id of the entity it belongs to.
#[derive(Debug)]
struct IndexedBox {
    id: String,
    envelope: Aabb,
}

impl RTreeObject for IndexedBox {
    type Envelope = Aabb;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedBox {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// Internal invariant violations found while building an index.
///
/// These are fatal for the generation being built: a corrupt index is
/// rejected rather than published.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The same id appeared on more than one entry.
    #[error("duplicate id in spatial index: {id}")]
    DuplicateId {
        /// The offending identifier.
        id: String,
    },
}

/// A bulk-loaded, read-only R-tree over `(id, bounding box)` entries.
///
/// Built once per dataset generation via sort-and-pack bulk loading
/// (O(n log n)), never mutated afterwards; queries are O(log n + k).
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedBox>,
}

impl SpatialIndex {
    /// Bulk-constructs an index from `(id, bounding box)` entries.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DuplicateId`] if two entries share an id.
    pub fn bulk_load(entries: Vec<(String, Aabb)>) -> Result<Self, IndexError> {
        let mut seen = BTreeSet::new();
        for (id, _) in &entries {
            if !seen.insert(id.as_str()) {
                return Err(IndexError::DuplicateId { id: id.clone() });
            }
        }

        let boxes = entries
            .into_iter()
            .map(|(id, envelope)| IndexedBox { id, envelope })
            .collect();
        let tree = RTree::bulk_load(boxes);
        log::debug!("Bulk-loaded spatial index with {} entries", tree.size());

        Ok(Self { tree })
    }

    /// Ids of all entries whose bounding box overlaps the query box.
    ///
    /// This is a broad-phase candidate set; callers refine it with exact
    /// geometry tests.
    pub fn query(&self, bbox: &Aabb) -> impl Iterator<Item = &str> {
        self.tree
            .locate_in_envelope_intersecting(bbox)
            .map(|entry| entry.id.as_str())
    }

    /// Id of the entry whose bounding box is closest to the point, if the
    /// index is non-empty. Used to disambiguate lookups at boundaries.
    #[must_use]
    pub fn nearest(&self, point: [f64; 2]) -> Option<&str> {
        self.tree
            .nearest_neighbor(&point)
            .map(|entry| entry.id.as_str())
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(id: &str, min: [f64; 2], max: [f64; 2]) -> (String, Aabb) {
        (id.to_string(), AABB::from_corners(min, max))
    }

    #[test]
    fn query_returns_overlapping_candidates_only() {
        let index = SpatialIndex::bulk_load(vec![
            boxed("a", [0.0, 0.0], [10.0, 10.0]),
            boxed("b", [5.0, 5.0], [15.0, 15.0]),
            boxed("c", [100.0, 100.0], [110.0, 110.0]),
        ])
        .unwrap();

        let mut hits: Vec<&str> = index
            .query(&AABB::from_corners([8.0, 8.0], [9.0, 9.0]))
            .collect();
        hits.sort_unstable();
        assert_eq!(hits, ["a", "b"]);
    }

    #[test]
    fn point_query_uses_zero_area_box() {
        let index = SpatialIndex::bulk_load(vec![
            boxed("a", [0.0, 0.0], [10.0, 10.0]),
            boxed("c", [100.0, 100.0], [110.0, 110.0]),
        ])
        .unwrap();

        let hits: Vec<&str> = index.query(&AABB::from_point([3.0, 3.0])).collect();
        assert_eq!(hits, ["a"]);
    }

    #[test]
    fn nearest_picks_closest_box() {
        let index = SpatialIndex::bulk_load(vec![
            boxed("a", [0.0, 0.0], [10.0, 10.0]),
            boxed("c", [100.0, 100.0], [110.0, 110.0]),
        ])
        .unwrap();

        assert_eq!(index.nearest([90.0, 90.0]), Some("c"));
        assert_eq!(index.nearest([20.0, 20.0]), Some("a"));
    }

    #[test]
    fn nearest_on_empty_index_is_none() {
        let index = SpatialIndex::bulk_load(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.nearest([0.0, 0.0]), None);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = SpatialIndex::bulk_load(vec![
            boxed("a", [0.0, 0.0], [10.0, 10.0]),
            boxed("a", [5.0, 5.0], [15.0, 15.0]),
        ])
        .unwrap_err();
        assert_eq!(err, IndexError::DuplicateId { id: "a".into() });
    }
}
