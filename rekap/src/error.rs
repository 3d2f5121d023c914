//! Types d'erreurs pour le crate rekap

use thiserror::Error;

use crate::dapil::CoverageViolation;
use crate::types::RegionId;

/// Erreurs pouvant survenir lors de l'agrégation ou de la validation
#[derive(Debug, Error)]
pub enum RekapError {
    /// Paramètre de requête invalide (niveau, mode, périmètre)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Région inconnue dans l'index
    #[error("Unknown region: {0}")]
    UnknownRegion(RegionId),

    /// Hiérarchie administrative incohérente
    #[error("Invalid hierarchy at region {region_id}: {reason}")]
    Hierarchy { region_id: RegionId, reason: String },

    /// Suppression refusée: des rekap référencent la région
    #[error("Region {region_id} is referenced by {tallies} vote tallies")]
    RegionInUse { region_id: RegionId, tallies: u64 },

    /// Couleur hexadécimale invalide
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Payload géométrique inutilisable
    #[error("Invalid geometry for region {region_id}: {reason}")]
    InvalidGeometry { region_id: RegionId, reason: String },

    /// Rekap déjà saisi sur un ancêtre ou un descendant
    #[error("Region {region_id} conflicts with the tally already recorded at region {conflicting}")]
    TallyOverlap {
        region_id: RegionId,
        conflicting: RegionId,
    },

    /// Sérialisation JSON des propriétés
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cakupan de dapil en conflit
    #[error("Dapil coverage conflict ({} violations)", .0.len())]
    Coverage(Vec<CoverageViolation>),
}

impl RekapError {
    /// Crée une erreur d'argument invalide
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Crée une erreur de hiérarchie avec contexte
    pub fn hierarchy(region_id: RegionId, reason: impl Into<String>) -> Self {
        Self::Hierarchy {
            region_id,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(region_id: RegionId, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            region_id,
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur provient de la requête du client
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::UnknownRegion(_)
                | Self::InvalidColor(_)
                | Self::Coverage(_)
                | Self::RegionInUse { .. }
                | Self::TallyOverlap { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RekapError>;
