//! Rendu d'une carte depuis la base

use anyhow::Result;
use deadpool_postgres::Pool;
use geojson::FeatureCollection;
use tracing::info;

use rekap::{build_map, MapReport, MapRequest};

use crate::config::Config;
use crate::directory::ContestantDirectory;
use crate::store::load_map_data;

/// Charge les données d'une carte et construit la FeatureCollection
pub async fn render_map(
    pool: &Pool,
    schema: &str,
    config: &Config,
    contestants: &ContestantDirectory,
    request: &MapRequest,
) -> Result<(FeatureCollection, MapReport)> {
    let kind = request.mode.contest();
    let roster = match kind {
        Some(kind) => Some(contestants.get(kind).await?),
        None => None,
    };

    let data = load_map_data(pool, schema, request, roster).await?;
    let thresholds = kind
        .map(|kind| *config.thresholds(kind))
        .unwrap_or_default();

    let (collection, report) = build_map(
        request,
        &data.index,
        &data.geometries,
        data.contest.as_ref(),
        &thresholds,
    )?;

    info!(
        level = %report.level,
        mode = %report.mode,
        scope = ?request.scope,
        features = report.features_emitted,
        skipped = report.skipped.len(),
        "Map rendered"
    );
    Ok((collection, report))
}
