//! Types de données pour le crate rekap

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::color::Rgb;
use crate::error::{RekapError, Result};

pub type RegionId = i64;
pub type ContestantId = i64;
pub type DistrictId = i64;

/// Niveau administratif (du plus large au plus fin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionLevel {
    Provinsi,
    Kabupaten,
    Kecamatan,
    Desa,
}

impl RegionLevel {
    pub const ALL: [RegionLevel; 4] = [
        RegionLevel::Provinsi,
        RegionLevel::Kabupaten,
        RegionLevel::Kecamatan,
        RegionLevel::Desa,
    ];

    /// Profondeur dans l'arbre (provinsi = 0)
    pub fn depth(self) -> u8 {
        match self {
            Self::Provinsi => 0,
            Self::Kabupaten => 1,
            Self::Kecamatan => 2,
            Self::Desa => 3,
        }
    }

    /// Niveau immédiatement supérieur
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Provinsi => None,
            Self::Kabupaten => Some(Self::Provinsi),
            Self::Kecamatan => Some(Self::Kabupaten),
            Self::Desa => Some(Self::Kecamatan),
        }
    }

    /// Niveau immédiatement inférieur
    pub fn child(self) -> Option<Self> {
        match self {
            Self::Provinsi => Some(Self::Kabupaten),
            Self::Kabupaten => Some(Self::Kecamatan),
            Self::Kecamatan => Some(Self::Desa),
            Self::Desa => None,
        }
    }

    /// Code stocké en base (colonne `tingkat`)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provinsi => "provinsi",
            Self::Kabupaten => "kabupaten",
            Self::Kecamatan => "kecamatan",
            Self::Desa => "desa",
        }
    }

    /// Nom utilisé dans les requêtes HTTP et les propriétés GeoJSON
    pub fn query_name(self) -> &'static str {
        match self {
            Self::Kabupaten => "kokab",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for RegionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionLevel {
    type Err = RekapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "provinsi" | "prov" => Ok(Self::Provinsi),
            "kokab" | "kabupaten" | "kabkota" | "kab" => Ok(Self::Kabupaten),
            "kecamatan" | "kec" => Ok(Self::Kecamatan),
            "desa" | "kelurahan" | "deskel" => Ok(Self::Desa),
            _ => Err(RekapError::invalid_argument(format!(
                "Unknown level: {}. Use: kokab, kecamatan, desa",
                s
            ))),
        }
    }
}

/// Unité administrative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub level: RegionLevel,
    pub parent_id: Option<RegionId>,
}

impl Region {
    pub fn new(
        id: RegionId,
        name: impl Into<String>,
        level: RegionLevel,
        parent_id: Option<RegionId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            parent_id,
        }
    }
}

/// Type de scrutin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContestKind {
    /// Élection présidentielle (paslon)
    Pilpres,
    /// Élection législative DPR RI (partai + caleg)
    PilegRi,
}

impl ContestKind {
    pub const ALL: [ContestKind; 2] = [ContestKind::Pilpres, ContestKind::PilegRi];

    /// Valeur du paramètre `mode`
    pub fn mode_name(self) -> &'static str {
        match self {
            Self::Pilpres => "pilpres",
            Self::PilegRi => "pileg_ri",
        }
    }

    /// Clé de la propriété détaillée (`detail_pilpres`, `detail_pileg_ri`)
    pub fn detail_key(self) -> String {
        format!("detail_{}", self.mode_name())
    }
}

impl fmt::Display for ContestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_name())
    }
}

/// Mode d'affichage de la carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Fond de carte seul, couleurs neutres
    Default,
    /// Carte colorée selon les résultats d'un scrutin
    Contest(ContestKind),
}

impl MapMode {
    pub fn contest(self) -> Option<ContestKind> {
        match self {
            Self::Default => None,
            Self::Contest(kind) => Some(kind),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Contest(kind) => kind.mode_name(),
        }
    }
}

impl FromStr for MapMode {
    type Err = RekapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" | "all" => Ok(Self::Default),
            "pilpres" => Ok(Self::Contest(ContestKind::Pilpres)),
            "pileg_ri" | "pilegri" | "pileg-ri" => Ok(Self::Contest(ContestKind::PilegRi)),
            _ => Err(RekapError::invalid_argument(format!(
                "Unknown mode: {}. Use: default, pilpres, pileg_ri",
                s
            ))),
        }
    }
}

/// Paslon (pilpres) ou partai (pileg)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contestant {
    pub id: ContestantId,
    #[serde(skip)]
    pub kind: ContestKind,
    /// Numéro d'ordre sur le bulletin, unique par scrutin
    pub ballot_number: u32,
    pub name: String,
    /// Cawapres pour un paslon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_mate: Option<String>,
    pub color: Rgb,
    /// Photo du paslon ou logo du partai
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Rekap des suffrages d'une région pour un scrutin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub region_id: RegionId,
    pub votes: BTreeMap<ContestantId, u64>,
    pub invalid_votes: u64,
}

impl VoteTally {
    pub fn new(region_id: RegionId) -> Self {
        Self {
            region_id,
            ..Default::default()
        }
    }

    /// Ajoute des voix à un kontestan (cumulatif)
    pub fn add_votes(&mut self, contestant_id: ContestantId, votes: u64) {
        *self.votes.entry(contestant_id).or_insert(0) += votes;
    }

    pub fn with_votes(mut self, contestant_id: ContestantId, votes: u64) -> Self {
        self.add_votes(contestant_id, votes);
        self
    }

    pub fn with_invalid(mut self, invalid_votes: u64) -> Self {
        self.invalid_votes = invalid_votes;
        self
    }

    pub fn votes_for(&self, contestant_id: ContestantId) -> u64 {
        self.votes.get(&contestant_id).copied().unwrap_or(0)
    }

    /// Suara sah
    pub fn total_valid(&self) -> u64 {
        self.votes.values().sum()
    }

    /// Suara sah + tidak sah
    pub fn total_cast(&self) -> u64 {
        self.total_valid() + self.invalid_votes
    }
}

/// Nombre de TPS et DPT d'une région
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnoutInfo {
    pub region_id: RegionId,
    pub polling_stations: u64,
    pub registered_voters: u64,
}

/// Contour GeoJSON d'une région
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    pub region_id: RegionId,
    /// JSON brut tel que stocké; `None` pour un brouillon
    pub payload: Option<String>,
    /// Couleur d'affichage hors scrutin
    pub display_color: Option<Rgb>,
}

/// Niveau d'une circonscription (dapil)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistrictTier {
    /// DPR RI: ensemble de kabupaten
    Ri,
    /// DPRD provinsi: ensemble de kabupaten
    Provinsi,
    /// DPRD kabupaten/kota: kecamatan et/ou desa d'un kabupaten
    KabKota,
}

impl DistrictTier {
    pub const ALL: [DistrictTier; 3] = [DistrictTier::Ri, DistrictTier::Provinsi, DistrictTier::KabKota];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ri => "ri",
            Self::Provinsi => "provinsi",
            Self::KabKota => "kabkota",
        }
    }

    /// Niveaux administratifs qu'une dapil de ce niveau peut couvrir
    pub fn coverable_levels(self) -> &'static [RegionLevel] {
        match self {
            Self::Ri | Self::Provinsi => &[RegionLevel::Kabupaten],
            Self::KabKota => &[RegionLevel::Kecamatan, RegionLevel::Desa],
        }
    }
}

impl fmt::Display for DistrictTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistrictTier {
    type Err = RekapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ri" | "national" => Ok(Self::Ri),
            "provinsi" | "provincial" => Ok(Self::Provinsi),
            "kabkota" | "kab_kota" | "local" => Ok(Self::KabKota),
            _ => Err(RekapError::invalid_argument(format!(
                "Unknown dapil tier: {}. Use: ri, provinsi, kabkota",
                s
            ))),
        }
    }
}

/// Daerah pemilihan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectoralDistrict {
    pub id: DistrictId,
    pub name: String,
    pub tier: DistrictTier,
    pub seat_count: u32,
    /// Kabupaten de rattachement (niveau kabkota uniquement)
    pub kabupaten_id: Option<RegionId>,
    pub covered_regions: BTreeSet<RegionId>,
}
