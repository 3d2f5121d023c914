//! Assemblage des features GeoJSON
//!
//! Joint les régions cibles, leurs contours et (en mode scrutin) leurs
//! statistiques agrégées. Une géométrie absente ou invalide écarte la
//! région sans faire échouer la carte.

pub mod geometry;

use std::collections::{BTreeMap, HashMap};

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use tracing::{debug, warn};

pub use geometry::{normalize, NormalizedGeometry};

use crate::aggregate::RegionStats;
use crate::color::{Rgb, NO_DATA_OPACITY};
use crate::error::{RekapError, Result};
use crate::hierarchy::RegionIndex;
use crate::report::{MapReport, SkipReason};
use crate::types::{ContestKind, Region, RegionGeometry, RegionId, RegionLevel};

/// Couche de données superposée aux contours
#[derive(Debug, Clone, Copy)]
pub enum ContestLayer<'a> {
    /// Fond de carte: couleur d'affichage de chaque région
    Plain,
    /// Résultats d'un scrutin, indexés par région cible
    Contest {
        kind: ContestKind,
        stats: &'a BTreeMap<RegionId, RegionStats>,
    },
}

impl ContestLayer<'_> {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Plain => "default",
            Self::Contest { kind, .. } => kind.mode_name(),
        }
    }
}

/// Construit la FeatureCollection des régions de niveau `level`.
///
/// Les features suivent l'ordre alphabétique des régions cibles.
///
/// # Errors
///
/// Uniquement pour un niveau ou un périmètre invalide; les géométries
/// fautives sont consignées dans le [`MapReport`].
pub fn assemble(
    index: &RegionIndex,
    level: RegionLevel,
    scope: Option<RegionId>,
    geometries: &[RegionGeometry],
    layer: ContestLayer<'_>,
) -> Result<(FeatureCollection, MapReport)> {
    let targets = index.targets(level, scope)?;
    let by_region: HashMap<RegionId, &RegionGeometry> =
        geometries.iter().map(|g| (g.region_id, g)).collect();

    let mut report = MapReport::new(level.query_name(), layer.mode_name());
    report.regions_targeted = targets.len();
    let mut features = Vec::with_capacity(targets.len());

    for region in targets {
        let Some(row) = by_region.get(&region.id) else {
            report.record_skip(region.id, &region.name, SkipReason::MissingGeometry, None);
            continue;
        };

        let normalized = match normalize(region.id, row.payload.as_deref()) {
            Ok(Some(normalized)) => normalized,
            Ok(None) => {
                debug!(region_id = region.id, name = %region.name, "Empty geometry payload, skipping");
                report.record_skip(region.id, &region.name, SkipReason::EmptyPayload, None);
                continue;
            }
            Err(RekapError::InvalidGeometry { reason, .. }) => {
                warn!(region_id = region.id, name = %region.name, %reason, "Malformed geometry, skipping");
                report.record_skip(region.id, &region.name, SkipReason::Malformed, Some(reason));
                continue;
            }
            Err(e) => return Err(e),
        };

        let mut properties = normalized.properties.unwrap_or_default();
        set_identity(&mut properties, index, region);

        let has_tally = match layer {
            ContestLayer::Plain => {
                let color = row.display_color.unwrap_or(Rgb::NO_DATA);
                properties.insert("warna".into(), color.to_hex().into());
                properties.insert("fill_opacity".into(), NO_DATA_OPACITY.into());
                false
            }
            ContestLayer::Contest { kind, stats } => match stats.get(&region.id) {
                Some(stats) if stats.has_tally() => {
                    properties.insert("warna".into(), stats.color.to_hex().into());
                    properties.insert("fill_opacity".into(), stats.fill_opacity.into());
                    properties.insert(kind.detail_key(), serde_json::to_value(stats)?);
                    true
                }
                _ => {
                    properties.insert("warna".into(), Rgb::NO_DATA.to_hex().into());
                    properties.insert("fill_opacity".into(), NO_DATA_OPACITY.into());
                    false
                }
            },
        };

        report.record_feature(has_tally);
        features.push(Feature {
            bbox: Some(normalized.bbox),
            geometry: Some(normalized.geometry),
            id: Some(Id::Number(region.id.into())),
            properties: Some(properties),
            foreign_members: None,
        });
    }

    report.finalize();

    Ok((
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
        report,
    ))
}

/// Propriétés d'identification, prioritaires sur celles du payload
fn set_identity(properties: &mut JsonObject, index: &RegionIndex, region: &Region) {
    properties.insert("id".into(), region.id.into());
    properties.insert("nama".into(), region.name.clone().into());
    properties.insert("level".into(), region.level.query_name().into());

    let ancestor_name = |level: RegionLevel| -> JsonValue {
        index
            .ancestor_at(region.id, level)
            .and_then(|id| index.name(id))
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null)
    };

    if region.level >= RegionLevel::Kecamatan {
        properties.insert("kabupaten".into(), ancestor_name(RegionLevel::Kabupaten));
    }
    if region.level == RegionLevel::Desa {
        properties.insert("kecamatan".into(), ancestor_name(RegionLevel::Kecamatan));
    }
}
