#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Generational in-memory dataset stores.
//!
//! Each collection (parcels, zoning districts, landmarks) lives in a
//! [`DatasetStore`]: an immutable [`Generation`] — entity map plus spatial
//! index — behind a single swappable pointer. Readers take an `Arc` to the
//! current generation and finish their work on that snapshot; `replace_all`
//! builds the next generation entirely off the read path and publishes it
//! with one pointer swap, so no reader ever observes a half-loaded
//! collection. Superseded generations are freed by reference count once
//! their last reader drops.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use thiserror::Error;
use zoning_map_models::{HealthSnapshot, Landmark, Parcel, ZoningDistrict};
use zoning_map_spatial::{IndexError, SpatialIndex};

pub use zoning_map_spatial::Aabb;

/// An entity that can live in a [`DatasetStore`]: it has a stable unique
/// id and a bounding box for the generation's spatial index.
pub trait Entity: Send + Sync + 'static {
    /// Stable identifier, unique within the entity's collection.
    fn id(&self) -> String;

    /// Bounding box of the entity's geometry, canonical CRS.
    fn envelope(&self) -> Aabb;
}

impl Entity for Parcel {
    fn id(&self) -> String {
        self.bbl.to_string()
    }

    fn envelope(&self) -> Aabb {
        self.geometry.envelope()
    }
}

impl Entity for ZoningDistrict {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn envelope(&self) -> Aabb {
        self.geometry.envelope()
    }
}

impl Entity for Landmark {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn envelope(&self) -> Aabb {
        self.geometry.envelope()
    }
}

/// Failures publishing a new generation or starting an import.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The generation being built violated an index invariant; it is
    /// rejected and the previously published generation stays live.
    #[error("index corruption, generation rejected: {0}")]
    IndexCorruption(#[from] IndexError),

    /// Another import of the same collection is already running.
    #[error("an import of this collection is already in progress")]
    ImportInProgress,
}

/// One complete, immutable, atomically published version of a collection.
pub struct Generation<E> {
    number: u64,
    index: SpatialIndex,
    entities: BTreeMap<String, Arc<E>>,
}

impl<E: Entity> Generation<E> {
    fn empty() -> Self {
        Self {
            number: 0,
            index: SpatialIndex::bulk_load(Vec::new())
                .unwrap_or_else(|_| unreachable!("empty index has no duplicates")),
            entities: BTreeMap::new(),
        }
    }

    /// Builds an unnumbered generation; the store assigns the number at
    /// publication time, under the write lock.
    fn build(entities: Vec<E>) -> Result<Self, StoreError> {
        let entries: Vec<(String, Aabb)> = entities
            .iter()
            .map(|entity| (entity.id(), entity.envelope()))
            .collect();
        let index = SpatialIndex::bulk_load(entries)?;

        let entities: BTreeMap<String, Arc<E>> = entities
            .into_iter()
            .map(|entity| (entity.id(), Arc::new(entity)))
            .collect();

        Ok(Self {
            number: 0,
            index,
            entities,
        })
    }

    /// Sequence number of this generation; 0 means "never loaded".
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Number of entities in this generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether this generation holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entity with the given id, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<E>> {
        self.entities.get(id).cloned()
    }

    /// Entities whose bounding box overlaps the query box, for exact
    /// geometry refinement by the caller.
    #[must_use]
    pub fn candidates_overlapping(&self, bbox: &Aabb) -> Vec<Arc<E>> {
        self.index
            .query(bbox)
            .filter_map(|id| self.entities.get(id).cloned())
            .collect()
    }

    /// Id of the entity whose bounding box is closest to the point.
    #[must_use]
    pub fn nearest(&self, point: [f64; 2]) -> Option<&str> {
        self.index.nearest(point)
    }
}

/// Serializes imports of one collection; dropped when the import ends.
pub struct ImportGuard<'a> {
    _lock: MutexGuard<'a, ()>,
}

/// A swappable holder for the current [`Generation`] of one collection.
pub struct DatasetStore<E> {
    current: RwLock<Arc<Generation<E>>>,
    import_lock: Mutex<()>,
}

impl<E: Entity> DatasetStore<E> {
    /// Creates an unloaded store (generation 0, no entities).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(Arc::new(Generation::empty())),
            import_lock: Mutex::new(()),
        }
    }

    /// A consistent read handle to the currently published generation.
    ///
    /// The snapshot stays valid (and its memory alive) for as long as the
    /// caller holds it, regardless of concurrent `replace_all` calls.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Generation<E>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The entity with the given id in the current generation.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<E>> {
        self.snapshot().get(id)
    }

    /// Current-generation candidates overlapping the query box.
    #[must_use]
    pub fn candidates_overlapping(&self, bbox: &Aabb) -> Vec<Arc<E>> {
        self.snapshot().candidates_overlapping(bbox)
    }

    /// Number of entities in the current generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the current generation holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Sequence number of the current generation; 0 until first load.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.snapshot().number()
    }

    /// Atomically replaces the whole collection with a new generation.
    ///
    /// The new generation (spatial index included) is built before the
    /// swap; readers holding the old snapshot are unaffected. Returns the
    /// new generation number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexCorruption`] if the entities violate an
    /// index invariant (duplicate ids); the previous generation stays
    /// published.
    pub fn replace_all(&self, entities: Vec<E>) -> Result<u64, StoreError> {
        // Index and map construction stay off the read path; only the
        // number assignment and swap hold the lock.
        let mut next = Generation::build(entities)?;

        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        next.number = current.number + 1;
        let next_number = next.number;
        *current = Arc::new(next);
        log::info!(
            "Published generation {next_number} with {} entities",
            current.len()
        );
        Ok(next_number)
    }

    /// Claims the import slot for this collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ImportInProgress`] if another import of this
    /// collection holds the slot.
    pub fn begin_import(&self) -> Result<ImportGuard<'_>, StoreError> {
        match self.import_lock.try_lock() {
            Ok(lock) => Ok(ImportGuard { _lock: lock }),
            Err(TryLockError::Poisoned(poisoned)) => Ok(ImportGuard {
                _lock: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => Err(StoreError::ImportInProgress),
        }
    }
}

impl<E: Entity> Default for DatasetStore<E> {
    fn default() -> Self {
        Self::empty()
    }
}

/// The three dataset stores the engine serves lookups from.
#[derive(Default)]
pub struct Datasets {
    /// MapPLUTO parcels keyed by BBL.
    pub parcels: DatasetStore<Parcel>,
    /// Zoning districts keyed by code + ordinal.
    pub zoning: DatasetStore<ZoningDistrict>,
    /// Landmarks keyed by LPC number or name.
    pub landmarks: DatasetStore<Landmark>,
}

impl Datasets {
    /// Creates three unloaded stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Readiness and counts for the currently published generations.
    ///
    /// Ready once parcels and zoning both have a published generation;
    /// landmarks are optional enrichment.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        let parcels = self.parcels.snapshot();
        let zoning = self.zoning.snapshot();
        let landmarks = self.landmarks.snapshot();

        HealthSnapshot {
            ready: parcels.number() > 0 && zoning.number() > 0,
            parcel_count: parcels.len() as u64,
            zoning_count: zoning.len() as u64,
            landmark_count: landmarks.len() as u64,
        }
    }
}
