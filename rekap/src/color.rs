//! Couleurs et paliers d'intensité
//!
//! La couleur d'une région est celle du vainqueur, éclaircie vers le blanc
//! selon la part de suffrages valides obtenue (palier "decisive", "moderate"
//! ou "narrow"). Les seuils dépendent du type de scrutin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RekapError, Result};

/// Couleur RGB 8 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Région sans rekap (ou carte sans scrutin)
    pub const NO_DATA: Rgb = Rgb::new(0xc0, 0xc0, 0xc0);

    /// Rekap présent mais aucun suffrage valide
    pub const NO_VOTES: Rgb = Rgb::new(0x80, 0x80, 0x80);

    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `rrggbb` ou la forme courte `#rgb`
    pub fn parse_hex(input: &str) -> Result<Self> {
        let hex = input.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RekapError::InvalidColor(input.to_string()));
        }

        let channel = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| RekapError::InvalidColor(input.to_string()))
        };

        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(RekapError::InvalidColor(input.to_string())),
        }
    }

    /// Format `#rrggbb` en minuscules
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Éclaircit vers le blanc: `c + (255 - c) * factor` pour chaque canal
    pub fn blend_toward_white(self, factor: f64) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let mix = |c: u8| {
            let c = f64::from(c);
            (c + (255.0 - c) * factor).round() as u8
        };
        Self::new(mix(self.r), mix(self.g), mix(self.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = RekapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_hex(s)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rgb::parse_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Palier d'intensité selon la marge du vainqueur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityTier {
    /// Victoire nette: couleur de base
    Decisive,
    /// Victoire moyenne: 30% vers le blanc
    Moderate,
    /// Victoire courte: 50% vers le blanc
    Narrow,
}

impl IntensityTier {
    pub fn blend_factor(self) -> f64 {
        match self {
            Self::Decisive => 0.0,
            Self::Moderate => 0.3,
            Self::Narrow => 0.5,
        }
    }

    /// Opacité de remplissage côté carte
    pub fn fill_opacity(self) -> f64 {
        match self {
            Self::Decisive => 0.90,
            Self::Moderate => 0.65,
            Self::Narrow => 0.35,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decisive => "decisive",
            Self::Moderate => "moderate",
            Self::Narrow => "narrow",
        }
    }
}

/// Opacité d'une région sans rekap
pub const NO_DATA_OPACITY: f64 = 0.5;

/// Opacité d'une région dont le rekap ne contient aucun suffrage valide
pub const NO_VOTES_OPACITY: f64 = 0.75;

/// Seuils (en %) des paliers d'intensité pour un type de scrutin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Marge minimale du palier "decisive"
    pub decisive: f64,
    /// Marge minimale du palier "moderate"
    pub moderate: f64,
}

impl Thresholds {
    /// Pilpres / pilkada: 60% et 50%
    pub const PRESIDENTIAL: Thresholds = Thresholds {
        decisive: 60.0,
        moderate: 50.0,
    };

    /// Pileg (nombreux partis): 25% et 15%
    pub const LEGISLATIVE: Thresholds = Thresholds {
        decisive: 25.0,
        moderate: 15.0,
    };

    /// Vérifie `0 <= moderate <= decisive <= 100`
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.decisive) || !in_range(self.moderate) {
            return Err(RekapError::invalid_argument(format!(
                "thresholds must lie within 0..=100 (decisive={}, moderate={})",
                self.decisive, self.moderate
            )));
        }
        if self.moderate > self.decisive {
            return Err(RekapError::invalid_argument(format!(
                "moderate threshold {} exceeds decisive threshold {}",
                self.moderate, self.decisive
            )));
        }
        Ok(())
    }

    /// Palier correspondant à une marge en pourcentage
    pub fn tier(&self, margin_pct: f64) -> IntensityTier {
        if margin_pct >= self.decisive {
            IntensityTier::Decisive
        } else if margin_pct >= self.moderate {
            IntensityTier::Moderate
        } else {
            IntensityTier::Narrow
        }
    }

    /// Couleur affichée pour une marge donnée.
    ///
    /// Une marge absente ou nulle donne la couleur neutre [`Rgb::NO_VOTES`].
    pub fn shade(&self, base: Rgb, margin_pct: Option<f64>) -> (Rgb, Option<IntensityTier>) {
        match margin_pct {
            Some(margin) if margin > 0.0 => {
                let tier = self.tier(margin);
                (base.blend_toward_white(tier.blend_factor()), Some(tier))
            }
            _ => (Rgb::NO_VOTES, None),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::PRESIDENTIAL
    }
}
