#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch ingestion of `GeoJSON` datasets into the generational stores.
//!
//! An import streams a FeatureCollection one feature at a time, extracts
//! and normalizes each record for its dataset kind, and publishes the
//! accepted records as one new generation with a single atomic swap.
//! Malformed records are skipped and counted; a systemic failure (too
//! many skips, unreadable source, concurrent import of the same
//! collection) aborts the whole run and leaves the previously published
//! generation untouched.

mod extract;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use geojson::FeatureReader;
use serde::Serialize;
use thiserror::Error;
use zoning_map_geometry::SourceCrs;
use zoning_map_models::DatasetKind;
use zoning_map_store::{DatasetStore, Datasets, Entity, StoreError};

/// Records that must have been seen before the failure-ratio abort can
/// fire; below this the sample is too small to call the source corrupt.
pub const FAILURE_CHECK_MIN: u64 = 20;

/// Default number of features between progress logs and ratio checks.
pub const DEFAULT_BATCH_SIZE: u64 = 500;

/// Default tolerated ratio of skipped records before the import aborts.
pub const DEFAULT_MAX_FAILURE_RATIO: f64 = 0.25;

/// Tuning knobs for one import run.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Features between progress logs and failure-ratio checks.
    pub batch_size: u64,
    /// Skip ratio above which the import aborts.
    pub max_failure_ratio: f64,
    /// CRS the source coordinates are expressed in.
    pub source_crs: SourceCrs,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_failure_ratio: DEFAULT_MAX_FAILURE_RATIO,
            source_crs: SourceCrs::Wgs84,
        }
    }
}

/// Which stage of the import pipeline an error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    /// Reading and parsing features from the source.
    Streaming,
    /// Extracting and normalizing records.
    Validating,
    /// Publishing the new generation.
    Committing,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Streaming => "streaming",
            Self::Validating => "validating",
            Self::Committing => "committing",
        })
    }
}

/// Systemic import failures. Any of these aborts the run; the previously
/// published generation stays live.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The source file could not be opened or read.
    #[error("failed reading source: {0}")]
    Io(#[from] std::io::Error),

    /// The source was not a valid `GeoJSON` feature stream.
    #[error("failed parsing source: {0}")]
    Parse(#[from] geojson::Error),

    /// Too many records failed extraction or normalization.
    #[error("import aborted while {phase}: {skipped} of {total} records failed")]
    FailureRateExceeded {
        /// Phase the abort fired in.
        phase: ImportPhase,
        /// Records seen so far.
        total: u64,
        /// Records skipped so far.
        skipped: u64,
    },

    /// Another import of the same collection is already running.
    #[error("an import of this collection is already in progress")]
    ImportInProgress,

    /// The assembled generation was rejected at publication.
    #[error("commit failed, prior generation left published: {0}")]
    Commit(#[source] StoreError),

    /// The source parsed cleanly but contained no features at all.
    #[error("source contained no features")]
    EmptySource,
}

/// What one completed import did.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Collection that was imported.
    pub kind: DatasetKind,
    /// Features seen in the source.
    pub total: u64,
    /// Records accepted into the new generation.
    pub accepted: u64,
    /// Records skipped.
    pub skipped: u64,
    /// Skip counts bucketed by reason.
    pub skip_reasons: BTreeMap<String, u64>,
    /// Generation number that was published.
    pub generation: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Imports one `GeoJSON` source file into the store for `kind`.
///
/// Streams the FeatureCollection, extracts records with the per-kind field
/// fallbacks, normalizes geometries into the canonical CRS, and publishes
/// everything accepted as one new generation. Duplicate ids within the run
/// keep the first record and count the rest as skipped.
///
/// # Errors
///
/// Returns an [`ImportError`] if the source cannot be read or parsed, the
/// skip ratio exceeds `options.max_failure_ratio` (checked at batch
/// boundaries and at end of stream once [`FAILURE_CHECK_MIN`] records were
/// seen), the source is empty, another import of the collection is running,
/// or the commit is rejected. In every error case the previously published
/// generation remains live.
pub fn import_dataset(
    datasets: &Datasets,
    kind: DatasetKind,
    source: &Path,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    match kind {
        DatasetKind::Parcels => run_import(&datasets.parcels, kind, source, options, extract::parcel),
        DatasetKind::Zoning => {
            let mut ordinals = BTreeMap::new();
            run_import(&datasets.zoning, kind, source, options, move |feature, crs| {
                extract::zoning_district(feature, crs, &mut ordinals)
            })
        }
        DatasetKind::Landmarks => {
            run_import(&datasets.landmarks, kind, source, options, extract::landmark)
        }
    }
}

fn run_import<E: Entity>(
    store: &DatasetStore<E>,
    kind: DatasetKind,
    source: &Path,
    options: &ImportOptions,
    mut extract_record: impl FnMut(&geojson::Feature, SourceCrs) -> Result<E, String>,
) -> Result<ImportReport, ImportError> {
    let started = Instant::now();
    // A zero batch size would divide by zero at the progress cadence.
    let batch_size = options.batch_size.max(1);
    let _guard = store
        .begin_import()
        .map_err(|_| ImportError::ImportInProgress)?;

    log::info!("{kind}: streaming features from {}", source.display());
    let reader = FeatureReader::from_reader(BufReader::new(File::open(source)?));

    let mut entities: Vec<E> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut total: u64 = 0;
    let mut skipped: u64 = 0;
    let mut skip_reasons: BTreeMap<String, u64> = BTreeMap::new();

    for feature in reader.features() {
        let feature = feature?;
        total += 1;

        match extract_record(&feature, options.source_crs) {
            Ok(entity) => {
                let id = entity.id();
                if seen.insert(id.clone()) {
                    entities.push(entity);
                } else {
                    log::warn!("{kind}: skipping record {total}: duplicate id {id}");
                    skipped += 1;
                    *skip_reasons.entry("duplicate id".to_string()).or_insert(0) += 1;
                }
            }
            Err(reason) => {
                log::warn!("{kind}: skipping record {total}: {reason}");
                skipped += 1;
                *skip_reasons.entry(reason).or_insert(0) += 1;
            }
        }

        if total % batch_size == 0 {
            check_failure_ratio(kind, total, skipped, options.max_failure_ratio)?;
            log::info!("{kind}: validated {total} features ({skipped} skipped)");
        }
    }

    if total == 0 {
        return Err(ImportError::EmptySource);
    }
    check_failure_ratio(kind, total, skipped, options.max_failure_ratio)?;
    if entities.is_empty() {
        // Small sources can dodge the ratio check, but publishing an
        // empty generation over real data is never right.
        return Err(ImportError::FailureRateExceeded {
            phase: ImportPhase::Validating,
            total,
            skipped,
        });
    }

    let accepted = entities.len() as u64;
    log::info!("{kind}: committing {accepted} records ({skipped} of {total} skipped)");
    let generation = store.replace_all(entities).map_err(|err| match err {
        StoreError::ImportInProgress => ImportError::ImportInProgress,
        err @ StoreError::IndexCorruption(_) => ImportError::Commit(err),
    })?;

    let duration = started.elapsed();
    log::info!("{kind}: import complete, generation {generation} published in {duration:?}");

    Ok(ImportReport {
        kind,
        total,
        accepted,
        skipped,
        skip_reasons,
        generation,
        duration,
    })
}

#[allow(clippy::cast_precision_loss)]
fn check_failure_ratio(
    kind: DatasetKind,
    total: u64,
    skipped: u64,
    max_ratio: f64,
) -> Result<(), ImportError> {
    if total < FAILURE_CHECK_MIN {
        return Ok(());
    }
    if skipped as f64 / total as f64 > max_ratio {
        log::error!("{kind}: aborting import, {skipped} of {total} records failed");
        return Err(ImportError::FailureRateExceeded {
            phase: ImportPhase::Validating,
            total,
            skipped,
        });
    }
    Ok(())
}
