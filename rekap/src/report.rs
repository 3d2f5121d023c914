//! Rapport de construction d'une carte avec graceful degradation
//!
//! Collecte les features produites et les régions écartées (géométrie
//! absente ou invalide) pour la journalisation et la commande `export`.

use std::path::Path;

use serde::Serialize;

use crate::types::RegionId;

/// Statut global de la carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MapStatus {
    /// Toutes les régions cibles ont une feature
    Complete,
    /// Certaines régions ont été écartées
    Partial,
    /// Aucune feature produite
    Empty,
}

/// Raison de l'écartement d'une région
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Pas de ligne géométrie pour la région
    MissingGeometry,
    /// Payload nul ou vide (brouillon)
    EmptyPayload,
    /// Payload illisible ou géométrie non polygonale
    Malformed,
}

/// Région écartée avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRegion {
    pub region_id: RegionId,
    pub region_name: String,
    pub reason: SkipReason,
    /// Détails supplémentaires (optionnel)
    pub details: Option<String>,
}

/// Rapport complet d'une carte
#[derive(Debug, Clone, Serialize)]
pub struct MapReport {
    /// Niveau demandé (`kokab`, `kecamatan`, `desa`)
    pub level: String,
    /// Mode demandé (`default`, `pilpres`, `pileg_ri`)
    pub mode: String,
    pub status: MapStatus,

    /// Nombre de régions cibles
    pub regions_targeted: usize,
    /// Nombre de features produites
    pub features_emitted: usize,
    /// Features produites sans rekap (couleur neutre)
    pub features_without_tally: usize,

    /// Régions écartées
    pub skipped: Vec<SkippedRegion>,
}

impl MapReport {
    pub fn new(level: &str, mode: &str) -> Self {
        Self {
            level: level.to_string(),
            mode: mode.to_string(),
            status: MapStatus::Empty,
            regions_targeted: 0,
            features_emitted: 0,
            features_without_tally: 0,
            skipped: Vec::new(),
        }
    }

    /// Enregistre une feature produite
    pub fn record_feature(&mut self, has_tally: bool) {
        self.features_emitted += 1;
        if !has_tally {
            self.features_without_tally += 1;
        }
    }

    /// Enregistre une région écartée
    pub fn record_skip(
        &mut self,
        region_id: RegionId,
        region_name: &str,
        reason: SkipReason,
        details: Option<String>,
    ) {
        self.skipped.push(SkippedRegion {
            region_id,
            region_name: region_name.to_string(),
            reason,
            details,
        });
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.features_emitted == 0 {
            MapStatus::Empty
        } else if self.skipped.is_empty() {
            MapStatus::Complete
        } else {
            MapStatus::Partial
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("MAP REPORT - level {} / mode {}", self.level, self.mode);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!(
            "Features: {} emitted of {} regions ({} without tally)",
            self.features_emitted, self.regions_targeted, self.features_without_tally
        );
        println!(
            "Skipped: {} missing geometry, {} empty payload, {} malformed",
            self.count(SkipReason::MissingGeometry),
            self.count(SkipReason::EmptyPayload),
            self.count(SkipReason::Malformed)
        );

        let malformed: Vec<_> = self
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::Malformed)
            .collect();
        if !malformed.is_empty() {
            println!("\n--- MALFORMED ({}) ---", malformed.len());
            for s in malformed.iter().take(20) {
                println!(
                    "  [{}] {}: {}",
                    s.region_id,
                    s.region_name,
                    s.details.as_deref().unwrap_or("-")
                );
            }
            if malformed.len() > 20 {
                println!("  ... and {} more", malformed.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Affichage compact pour les logs
    pub fn summary(&self) -> String {
        format!(
            "{}/{}: {} features, {} without tally, {} skipped",
            self.level,
            self.mode,
            self.features_emitted,
            self.features_without_tally,
            self.skipped.len()
        )
    }
}
