//! Validation de la couverture des dapil
//!
//! Au sein d'un même niveau, une région appartient à au plus une dapil.
//! Pour le niveau kabkota, une kecamatan entière entre aussi en conflit
//! avec l'un de ses desa affecté ailleurs (et réciproquement).

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{RekapError, Result};
use crate::hierarchy::RegionIndex;
use crate::types::{DistrictId, DistrictTier, ElectoralDistrict, RegionId, RegionLevel};

/// Type de violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Région inconnue de la hiérarchie
    UnknownRegion,
    /// Niveau administratif non couvrable par ce niveau de dapil
    WrongLevel,
    /// Région hors du kabupaten de la dapil
    OutsideKabupaten,
    /// Région déjà couverte par une autre dapil
    AlreadyAssigned,
    /// Kecamatan dont un desa est couvert par une autre dapil
    ChildAssigned,
    /// Desa dont la kecamatan est couverte entière par une autre dapil
    ParentAssigned,
    /// Dapil elle-même invalide (sièges, kabupaten de rattachement)
    InvalidDistrict,
}

/// Conflit de couverture détecté
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageViolation {
    pub region_id: RegionId,
    pub region_name: String,
    pub kind: ViolationKind,
    /// Dapil en conflit, le cas échéant
    pub conflicting_district: Option<DistrictId>,
    pub message: String,
}

/// Affectations existantes d'un niveau: région → (id, nom) de la dapil
struct Assignments<'a> {
    by_region: HashMap<RegionId, (DistrictId, &'a str)>,
}

impl<'a> Assignments<'a> {
    fn collect(
        tier: DistrictTier,
        districts: impl IntoIterator<Item = &'a ElectoralDistrict>,
        exclude: Option<DistrictId>,
    ) -> Self {
        let mut by_region = HashMap::new();
        for district in districts {
            if district.tier != tier || Some(district.id) == exclude {
                continue;
            }
            for region_id in &district.covered_regions {
                by_region
                    .entry(*region_id)
                    .or_insert((district.id, district.name.as_str()));
            }
        }
        Self { by_region }
    }

    fn get(&self, region_id: RegionId) -> Option<(DistrictId, &'a str)> {
        self.by_region.get(&region_id).copied()
    }
}

/// Vérifie qu'une dapil peut être enregistrée à côté des dapil existantes.
///
/// La dapil candidate elle-même (même id) est ignorée parmi `existing`,
/// ce qui permet la mise à jour.
///
/// # Errors
///
/// `InvalidArgument` si le nombre de sièges est nul ou si le kabupaten de
/// rattachement est absent ou invalide; `Coverage` avec la liste complète
/// des conflits sinon.
pub fn validate_coverage(
    candidate: &ElectoralDistrict,
    existing: &[ElectoralDistrict],
    index: &RegionIndex,
) -> Result<()> {
    if candidate.name.trim().is_empty() {
        return Err(RekapError::invalid_argument("Dapil name must not be empty"));
    }
    if candidate.seat_count == 0 {
        return Err(RekapError::invalid_argument(format!(
            "Dapil {} must allocate at least one seat",
            candidate.name
        )));
    }

    let kabupaten = match candidate.tier {
        DistrictTier::KabKota => {
            let kab_id = candidate.kabupaten_id.ok_or_else(|| {
                RekapError::invalid_argument(format!(
                    "Dapil {} (kabkota) requires a kabupaten",
                    candidate.name
                ))
            })?;
            match index.get(kab_id) {
                Some(region) if region.level == RegionLevel::Kabupaten => Some(kab_id),
                _ => {
                    return Err(RekapError::invalid_argument(format!(
                        "Dapil {}: {} is not a known kabupaten",
                        candidate.name, kab_id
                    )))
                }
            }
        }
        DistrictTier::Ri | DistrictTier::Provinsi => None,
    };

    let assigned = Assignments::collect(candidate.tier, existing, Some(candidate.id));
    let mut violations = Vec::new();

    for &region_id in &candidate.covered_regions {
        let Some(region) = index.get(region_id) else {
            violations.push(CoverageViolation {
                region_id,
                region_name: String::new(),
                kind: ViolationKind::UnknownRegion,
                conflicting_district: None,
                message: format!("Region {} does not exist", region_id),
            });
            continue;
        };

        let mut push = |kind: ViolationKind, other: Option<DistrictId>, message: String| {
            violations.push(CoverageViolation {
                region_id,
                region_name: region.name.clone(),
                kind,
                conflicting_district: other,
                message,
            });
        };

        if !candidate.tier.coverable_levels().contains(&region.level) {
            push(
                ViolationKind::WrongLevel,
                None,
                format!(
                    "{} is a {}, a {} dapil cannot cover it",
                    region.name, region.level, candidate.tier
                ),
            );
            continue;
        }

        if let Some(kab_id) = kabupaten {
            if index.ancestor_at(region_id, RegionLevel::Kabupaten) != Some(kab_id) {
                push(
                    ViolationKind::OutsideKabupaten,
                    None,
                    format!(
                        "{} is not part of {}",
                        region.name,
                        index.name(kab_id).unwrap_or_default()
                    ),
                );
                continue;
            }
        }

        if let Some((other_id, other_name)) = assigned.get(region_id) {
            push(
                ViolationKind::AlreadyAssigned,
                Some(other_id),
                format!("{} already belongs to dapil {}", region.name, other_name),
            );
        }

        if candidate.tier != DistrictTier::KabKota {
            continue;
        }

        match region.level {
            RegionLevel::Kecamatan => {
                if let Some((other_id, other_name)) = index
                    .children(region_id)
                    .iter()
                    .find_map(|desa| assigned.get(*desa))
                {
                    push(
                        ViolationKind::ChildAssigned,
                        Some(other_id),
                        format!(
                            "{} cannot be selected: one of its desa belongs to dapil {}",
                            region.name, other_name
                        ),
                    );
                }
            }
            RegionLevel::Desa => {
                if let Some((other_id, other_name)) =
                    region.parent_id.and_then(|kec| assigned.get(kec))
                {
                    push(
                        ViolationKind::ParentAssigned,
                        Some(other_id),
                        format!(
                            "{} cannot be selected: its kecamatan belongs entirely to dapil {}",
                            region.name, other_name
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(RekapError::Coverage(violations))
    }
}

/// Contrôle global d'un ensemble de dapil déjà enregistrées.
///
/// Chaque dapil est validée contre les autres; les conflits symétriques
/// apparaissent donc une fois pour chaque dapil concernée.
pub fn audit(districts: &[ElectoralDistrict], index: &RegionIndex) -> Vec<CoverageViolation> {
    let mut violations = Vec::new();
    for district in districts {
        match validate_coverage(district, districts, index) {
            Ok(()) => {}
            Err(RekapError::Coverage(found)) => violations.extend(found),
            Err(other) => violations.push(CoverageViolation {
                region_id: district.kabupaten_id.unwrap_or_default(),
                region_name: district.name.clone(),
                kind: ViolationKind::InvalidDistrict,
                conflicting_district: Some(district.id),
                message: other.to_string(),
            }),
        }
    }
    violations
}
