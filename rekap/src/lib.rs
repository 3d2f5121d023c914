//! # rekap
//!
//! Agrégation des rekap électoraux et coloration des cartes par région.
//!
//! ## Features
//!
//! - Index en mémoire de la hiérarchie provinsi → kabupaten → kecamatan → desa
//! - Agrégation en deux passes, sans requête par région
//! - Paliers d'intensité par type de scrutin (pilpres, pileg RI)
//! - Assemblage GeoJSON tolérant aux payloads mal formés
//! - Validation de la couverture des dapil
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rekap::{build_map, MapRequest, RegionIndex, Thresholds};
//!
//! let index = RegionIndex::build(regions)?;
//! let request = MapRequest::from_query(Some("kecamatan"), Some("pilpres"), Some(kab_id), None)?;
//! let (collection, report) =
//!     build_map(&request, &index, &geometries, Some(&contest), &Thresholds::PRESIDENTIAL)?;
//! println!("{}", report.summary());
//! ```

pub mod aggregate;
pub mod assemble;
pub mod cache;
pub mod color;
pub mod dapil;
pub mod error;
pub mod hierarchy;
pub mod map;
pub mod report;
pub mod types;

pub use aggregate::{aggregate, percentage, ContestData, ContestantResult, RegionStats};
pub use assemble::{assemble, ContestLayer};
pub use cache::ContestantCache;
pub use color::{IntensityTier, Rgb, Thresholds};
pub use dapil::{audit, validate_coverage, CoverageViolation, ViolationKind};
pub use error::{RekapError, Result};
pub use hierarchy::RegionIndex;
pub use map::{build_map, MapRequest};
pub use report::{MapReport, MapStatus, SkipReason};
pub use types::{
    ContestKind, Contestant, ContestantId, DistrictId, DistrictTier, ElectoralDistrict, MapMode,
    Region, RegionGeometry, RegionId, RegionLevel, TurnoutInfo, VoteTally,
};
