//! Configuration des règles de coloration

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use rekap::{ContestKind, Thresholds};

/// Presets embarqués
pub const PRESETS: [&str; 2] = ["standard", "uniform"];

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Seuils des paliers pour le pilpres
    pub pilpres: Thresholds,

    /// Seuils des paliers pour le pileg DPR RI
    pub pileg_ri: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pilpres: Thresholds::PRESIDENTIAL,
            pileg_ri: Thresholds::LEGISLATIVE,
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "standard" => Self::load_embedded(include_str!("presets/standard.json")),
            "uniform" => Self::load_embedded(include_str!("presets/uniform.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: standard, uniform", preset),
        }
    }

    /// Nom de preset ou chemin vers un fichier JSON
    pub fn resolve(spec: &str) -> Result<Self> {
        if PRESETS.contains(&spec) {
            Self::from_preset(spec)
        } else {
            Self::load(Path::new(spec))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse embedded config")?;
        config.validate()?;
        Ok(config)
    }

    /// Seuils applicables à un type de scrutin
    pub fn thresholds(&self, kind: ContestKind) -> &Thresholds {
        match kind {
            ContestKind::Pilpres => &self.pilpres,
            ContestKind::PilegRi => &self.pileg_ri,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in ContestKind::ALL {
            self.thresholds(kind)
                .validate()
                .with_context(|| format!("Invalid thresholds for {}", kind))?;
        }
        Ok(())
    }
}

/// Vérifie qu'un nom de schéma peut être interpolé dans le SQL
pub fn validate_schema_name(schema: &str) -> Result<()> {
    let pattern = Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").context("Invalid schema pattern")?;

    if !pattern.is_match(schema) {
        anyhow::bail!(
            "Invalid schema name: '{}'. Use lowercase letters, digits and underscores",
            schema
        );
    }
    Ok(())
}
