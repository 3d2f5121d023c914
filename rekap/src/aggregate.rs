//! Moteur d'agrégation des rekap
//!
//! Deux passes en mémoire: les rekap du périmètre sont chargés en lot, puis
//! repliés dans un accumulateur par région cible (ancêtre au niveau demandé).
//! Aucune requête par région.
//!
//! Un rekap n'est compté que s'il est au niveau le plus fin de sa branche:
//! celui d'une région dont un descendant a aussi un rekap est ignoré.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::color::{IntensityTier, Rgb, Thresholds, NO_DATA_OPACITY, NO_VOTES_OPACITY};
use crate::error::{RekapError, Result};
use crate::hierarchy::RegionIndex;
use crate::types::{
    ContestKind, Contestant, ContestantId, RegionId, RegionLevel, TurnoutInfo, VoteTally,
};

/// Données d'un scrutin chargées pour un périmètre
#[derive(Debug, Clone)]
pub struct ContestData {
    pub kind: ContestKind,
    pub contestants: Arc<[Contestant]>,
    pub tallies: Vec<VoteTally>,
    pub turnout: Vec<TurnoutInfo>,
}

impl ContestData {
    pub fn new(kind: ContestKind, contestants: impl Into<Arc<[Contestant]>>) -> Self {
        Self {
            kind,
            contestants: contestants.into(),
            tallies: Vec::new(),
            turnout: Vec::new(),
        }
    }

    /// Kontestan triés par numéro de bulletin (ordre du départage)
    fn ballot_order(&self) -> Vec<&Contestant> {
        let mut ordered: Vec<&Contestant> = self.contestants.iter().collect();
        ordered.sort_by_key(|c| (c.ballot_number, c.id));
        ordered
    }
}

/// Résultat d'un kontestan dans une région
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestantResult {
    #[serde(skip)]
    pub contestant_id: ContestantId,
    #[serde(rename = "no_urut")]
    pub ballot_number: u32,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "warna")]
    pub color: Rgb,
    #[serde(rename = "suara")]
    pub votes: u64,
    /// Part des suffrages valides (%)
    #[serde(rename = "persen")]
    pub share_pct: f64,
    #[serde(rename = "foto", skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Statistiques agrégées d'une région cible
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStats {
    #[serde(skip)]
    pub region_id: RegionId,
    #[serde(rename = "kandidat")]
    pub breakdown: Vec<ContestantResult>,
    #[serde(rename = "sah")]
    pub total_valid: u64,
    #[serde(rename = "sts")]
    pub invalid_votes: u64,
    #[serde(rename = "total")]
    pub total_cast: u64,
    #[serde(rename = "tps")]
    pub polling_stations: u64,
    #[serde(rename = "dpt")]
    pub registered_voters: u64,
    /// total_cast / registered_voters (%)
    #[serde(rename = "partisipasi")]
    pub turnout_pct: f64,
    /// Numéro de bulletin du vainqueur
    #[serde(rename = "pemenang")]
    pub winner: Option<u32>,
    #[serde(rename = "persen_menang")]
    pub margin_pct: Option<f64>,
    #[serde(rename = "tingkat")]
    pub tier: Option<IntensityTier>,
    #[serde(rename = "win_warna")]
    pub color: Rgb,
    pub fill_opacity: f64,
    /// Nombre de rekap repliés dans cette région
    #[serde(rename = "jumlah_rekap")]
    pub reporting_units: usize,
}

impl RegionStats {
    pub fn has_tally(&self) -> bool {
        self.reporting_units > 0
    }

    /// Résultat du vainqueur
    pub fn winner_result(&self) -> Option<&ContestantResult> {
        let winner = self.winner?;
        self.breakdown.iter().find(|r| r.ballot_number == winner)
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    votes: HashMap<ContestantId, u64>,
    invalid_votes: u64,
    polling_stations: u64,
    registered_voters: u64,
    reporting_units: usize,
}

/// Pourcentage protégé contre la division par zéro
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Régions dont un descendant porte un rekap
fn shadowed_regions(index: &RegionIndex, tallies: &[VoteTally]) -> HashSet<RegionId> {
    let mut shadowed = HashSet::new();
    for tally in tallies {
        let mut current = index.parent(tally.region_id);
        while let Some(parent) = current {
            if !shadowed.insert(parent.id) {
                break;
            }
            current = index.parent(parent.id);
        }
    }
    shadowed
}

/// Agrège les rekap au niveau `level`, éventuellement restreint aux enfants
/// de `scope`.
///
/// Chaque région cible figure dans le résultat; une région sans rekap
/// reçoit des statistiques nulles (`reporting_units == 0`).
///
/// # Errors
///
/// `InvalidArgument` pour le niveau provinsi ou un périmètre invalide.
pub fn aggregate(
    index: &RegionIndex,
    contest: &ContestData,
    thresholds: &Thresholds,
    level: RegionLevel,
    scope: Option<RegionId>,
) -> Result<BTreeMap<RegionId, RegionStats>> {
    if level == RegionLevel::Provinsi {
        return Err(RekapError::invalid_argument(
            "Aggregation level must be kokab, kecamatan or desa",
        ));
    }

    let targets = index.targets(level, scope)?;
    let mut accumulators: HashMap<RegionId, Accumulator> = targets
        .iter()
        .map(|r| (r.id, Accumulator::default()))
        .collect();

    // Passe 1: repli des rekap et des TPS/DPT vers l'ancêtre cible
    let shadowed = shadowed_regions(index, &contest.tallies);
    let mut unattributed = 0usize;
    let mut superseded = 0usize;
    for tally in &contest.tallies {
        if shadowed.contains(&tally.region_id) {
            superseded += 1;
            continue;
        }
        let Some(acc) = index
            .ancestor_at(tally.region_id, level)
            .and_then(|target| accumulators.get_mut(&target))
        else {
            unattributed += 1;
            continue;
        };
        for (contestant_id, votes) in &tally.votes {
            *acc.votes.entry(*contestant_id).or_insert(0) += votes;
        }
        acc.invalid_votes += tally.invalid_votes;
        acc.reporting_units += 1;
    }

    for info in &contest.turnout {
        if let Some(acc) = index
            .ancestor_at(info.region_id, level)
            .and_then(|target| accumulators.get_mut(&target))
        {
            acc.polling_stations += info.polling_stations;
            acc.registered_voters += info.registered_voters;
        }
    }

    if unattributed > 0 {
        debug!(
            unattributed,
            level = %level,
            kind = %contest.kind,
            "Tallies outside the requested scope or above the requested level"
        );
    }

    if superseded > 0 {
        warn!(
            superseded,
            kind = %contest.kind,
            "Tallies above a finer tallied level ignored"
        );
    }

    // Passe 2: vainqueur, marge et couleur
    let ordered = contest.ballot_order();
    Ok(accumulators
        .into_iter()
        .map(|(region_id, acc)| (region_id, finalize(region_id, acc, &ordered, thresholds)))
        .collect())
}

fn finalize(
    region_id: RegionId,
    acc: Accumulator,
    ordered: &[&Contestant],
    thresholds: &Thresholds,
) -> RegionStats {
    let total_valid: u64 = ordered
        .iter()
        .map(|c| acc.votes.get(&c.id).copied().unwrap_or(0))
        .sum();

    let breakdown: Vec<ContestantResult> = ordered
        .iter()
        .map(|c| {
            let votes = acc.votes.get(&c.id).copied().unwrap_or(0);
            ContestantResult {
                contestant_id: c.id,
                ballot_number: c.ballot_number,
                name: c.name.clone(),
                color: c.color,
                votes,
                share_pct: percentage(votes, total_valid),
                photo: c.photo.clone(),
            }
        })
        .collect();

    // Strictement supérieur: à égalité, le plus petit numéro l'emporte
    let mut winner: Option<&ContestantResult> = None;
    for result in &breakdown {
        if winner.map_or(true, |w| result.votes > w.votes) {
            winner = Some(result);
        }
    }
    let winner = winner.filter(|_| total_valid > 0);

    let margin_pct = winner.map(|w| percentage(w.votes, total_valid));
    let base = winner.map(|w| w.color).unwrap_or(Rgb::NO_VOTES);
    let (color, tier) = thresholds.shade(base, margin_pct);

    let fill_opacity = match (tier, acc.reporting_units) {
        (Some(tier), _) => tier.fill_opacity(),
        (None, 0) => NO_DATA_OPACITY,
        (None, _) => NO_VOTES_OPACITY,
    };
    let color = if acc.reporting_units == 0 {
        Rgb::NO_DATA
    } else {
        color
    };

    let total_cast = total_valid + acc.invalid_votes;
    let winner = winner.map(|w| w.ballot_number);

    RegionStats {
        region_id,
        winner,
        breakdown,
        total_valid,
        invalid_votes: acc.invalid_votes,
        total_cast,
        polling_stations: acc.polling_stations,
        registered_voters: acc.registered_voters,
        turnout_pct: percentage(total_cast, acc.registered_voters),
        margin_pct,
        tier,
        color,
        fill_opacity,
        reporting_units: acc.reporting_units,
    }
}
