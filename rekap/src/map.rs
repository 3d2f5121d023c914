//! Point d'entrée d'une carte: requête → FeatureCollection

use geojson::FeatureCollection;

use crate::aggregate::{aggregate, ContestData};
use crate::assemble::{assemble, ContestLayer};
use crate::color::Thresholds;
use crate::error::{RekapError, Result};
use crate::hierarchy::RegionIndex;
use crate::report::MapReport;
use crate::types::{MapMode, RegionGeometry, RegionId, RegionLevel};

/// Paramètres d'une carte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRequest {
    pub level: RegionLevel,
    pub mode: MapMode,
    /// Région parente limitant la carte (kabupaten pour le niveau
    /// kecamatan, kecamatan pour le niveau desa)
    pub scope: Option<RegionId>,
}

impl MapRequest {
    /// Interprète les paramètres de requête `level`, `mode`, `kab_id`, `kec_id`.
    ///
    /// Niveau par défaut `kokab`, mode par défaut `default`. `kab_id` ne
    /// s'applique qu'au niveau kecamatan et `kec_id` qu'au niveau desa.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` pour un niveau (provinsi compris) ou un mode inconnu.
    pub fn from_query(
        level: Option<&str>,
        mode: Option<&str>,
        kab_id: Option<RegionId>,
        kec_id: Option<RegionId>,
    ) -> Result<Self> {
        let level = match level.map(str::trim).filter(|l| !l.is_empty()) {
            Some(raw) => raw.parse::<RegionLevel>()?,
            None => RegionLevel::Kabupaten,
        };
        if level == RegionLevel::Provinsi {
            return Err(RekapError::invalid_argument(
                "Unknown level: provinsi. Use: kokab, kecamatan, desa",
            ));
        }

        let mode = match mode {
            Some(raw) => raw.parse::<MapMode>()?,
            None => MapMode::Default,
        };

        let scope = match level {
            RegionLevel::Kecamatan => kab_id,
            RegionLevel::Desa => kec_id,
            _ => None,
        };

        Ok(Self { level, mode, scope })
    }
}

/// Construit une carte complète.
///
/// `contest` doit être fourni en mode scrutin et correspondre au type
/// demandé; il est ignoré en mode `default`.
///
/// # Errors
///
/// `InvalidArgument` si les données du scrutin manquent ou ne
/// correspondent pas au mode, ou si le périmètre est invalide.
pub fn build_map(
    request: &MapRequest,
    index: &RegionIndex,
    geometries: &[RegionGeometry],
    contest: Option<&ContestData>,
    thresholds: &Thresholds,
) -> Result<(FeatureCollection, MapReport)> {
    match request.mode {
        MapMode::Default => assemble(
            index,
            request.level,
            request.scope,
            geometries,
            ContestLayer::Plain,
        ),
        MapMode::Contest(kind) => {
            let data = contest.filter(|c| c.kind == kind).ok_or_else(|| {
                RekapError::invalid_argument(format!("No {} data supplied", kind))
            })?;
            let stats = aggregate(index, data, thresholds, request.level, request.scope)?;
            assemble(
                index,
                request.level,
                request.scope,
                geometries,
                ContestLayer::Contest {
                    kind,
                    stats: &stats,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContestKind, Contestant};

    #[test]
    fn test_from_query_defaults() {
        let req = MapRequest::from_query(None, None, None, None).unwrap();
        assert_eq!(req.level, RegionLevel::Kabupaten);
        assert_eq!(req.mode, MapMode::Default);
        assert_eq!(req.scope, None);
    }

    #[test]
    fn test_from_query_scope_per_level() {
        let req = MapRequest::from_query(Some("kecamatan"), Some("pilpres"), Some(10), Some(100))
            .unwrap();
        assert_eq!(req.scope, Some(10));
        assert_eq!(req.mode, MapMode::Contest(ContestKind::Pilpres));

        let req = MapRequest::from_query(Some("desa"), None, Some(10), Some(100)).unwrap();
        assert_eq!(req.scope, Some(100));

        let req = MapRequest::from_query(Some("kokab"), None, Some(10), None).unwrap();
        assert_eq!(req.scope, None);
    }

    #[test]
    fn test_from_query_rejects_unknown() {
        assert!(MapRequest::from_query(Some("provinsi"), None, None, None).is_err());
        assert!(MapRequest::from_query(Some("rw"), None, None, None).is_err());
        assert!(MapRequest::from_query(None, Some("pilkada"), None, None).is_err());
    }

    #[test]
    fn test_build_map_requires_matching_contest() {
        let index = RegionIndex::build(Vec::new()).unwrap();
        let req = MapRequest::from_query(None, Some("pileg_ri"), None, None).unwrap();
        let pilpres = ContestData::new(ContestKind::Pilpres, Vec::<Contestant>::new());

        assert!(matches!(
            build_map(&req, &index, &[], Some(&pilpres), &Thresholds::LEGISLATIVE),
            Err(RekapError::InvalidArgument(_))
        ));
        assert!(build_map(&req, &index, &[], None, &Thresholds::LEGISLATIVE).is_err());
    }

    #[test]
    fn test_build_map_empty_index() {
        let index = RegionIndex::build(Vec::new()).unwrap();
        let req = MapRequest::from_query(None, None, None, None).unwrap();
        let (fc, report) = build_map(&req, &index, &[], None, &Thresholds::default()).unwrap();
        assert!(fc.features.is_empty());
        assert_eq!(report.features_emitted, 0);
    }
}
