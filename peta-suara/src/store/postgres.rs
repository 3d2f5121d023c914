//! Lectures PostgreSQL pour la construction des cartes
//!
//! Chaque fonction exécute une seule requête en lot (`= ANY($1)`); aucune
//! requête n'est émise par région.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use deadpool_postgres::{GenericClient, Pool};
use serde::Serialize;
use tokio_postgres::Row;
use tracing::{debug, warn};

use rekap::{
    ContestData, ContestKind, Contestant, DistrictTier, ElectoralDistrict, MapRequest, Region,
    RegionGeometry, RegionId, RegionIndex, RegionLevel, Rgb, TurnoutInfo, VoteTally,
};

/// Entrée des listes déroulantes en cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionOption {
    pub id: RegionId,
    pub nama: String,
}

/// Données nécessaires à une carte
#[derive(Debug)]
pub struct MapData {
    pub index: RegionIndex,
    pub geometries: Vec<RegionGeometry>,
    pub contest: Option<ContestData>,
}

/// Compteur SQL (BIGINT) vers u64, valeurs négatives ramenées à 0
pub(crate) fn count(row: &Row, column: &str) -> u64 {
    row.get::<_, i64>(column).max(0) as u64
}

fn region_from_row(row: &Row) -> Result<Region> {
    let level: String = row.get("tingkat");
    Ok(Region::new(
        row.get("id"),
        row.get::<_, String>("nama"),
        level.parse::<RegionLevel>()?,
        row.get("parent_id"),
    ))
}

fn color_from_row(row: &Row, column: &str, owner: i64) -> Option<Rgb> {
    let raw: Option<String> = row.get(column);
    let raw = raw.filter(|s| !s.trim().is_empty())?;
    match raw.parse() {
        Ok(color) => Some(color),
        Err(e) => {
            warn!(id = owner, %e, "Ignoring invalid colour");
            None
        }
    }
}

/// Hiérarchie d'un périmètre: descendants de `scope` et chaîne de ses
/// ancêtres. Sans périmètre, toute la table.
pub async fn load_hierarchy(
    pool: &Pool,
    schema: &str,
    scope: Option<RegionId>,
) -> Result<Vec<Region>> {
    let client = pool.get().await?;

    let rows = match scope {
        None => return all_regions(&client, schema).await,
        Some(scope_id) => {
            let sql = format!(
                r#"
                WITH RECURSIVE turunan AS (
                    SELECT id, nama, tingkat, parent_id FROM {s}.wilayah WHERE id = $1
                    UNION ALL
                    SELECT w.id, w.nama, w.tingkat, w.parent_id
                    FROM {s}.wilayah w JOIN turunan t ON w.parent_id = t.id
                ), leluhur AS (
                    SELECT id, nama, tingkat, parent_id FROM {s}.wilayah WHERE id = $1
                    UNION ALL
                    SELECT w.id, w.nama, w.tingkat, w.parent_id
                    FROM {s}.wilayah w JOIN leluhur l ON w.id = l.parent_id
                )
                SELECT id, nama, tingkat, parent_id FROM turunan
                UNION
                SELECT id, nama, tingkat, parent_id FROM leluhur
                "#,
                s = schema
            );
            client
                .query(&sql, &[&scope_id])
                .await
                .context("Failed to load scoped regions")?
        }
    };

    let regions = rows.iter().map(region_from_row).collect::<Result<Vec<_>>>()?;
    debug!(scope = ?scope, regions = regions.len(), "Hierarchy loaded");
    Ok(regions)
}

/// Toute la table des régions, sur un client ou dans une transaction
pub(crate) async fn all_regions<C: GenericClient>(client: &C, schema: &str) -> Result<Vec<Region>> {
    let rows = client
        .query(
            &format!("SELECT id, nama, tingkat, parent_id FROM {}.wilayah", schema),
            &[],
        )
        .await
        .context("Failed to load regions")?;

    let regions = rows.iter().map(region_from_row).collect::<Result<Vec<_>>>()?;
    debug!(regions = regions.len(), "Hierarchy loaded");
    Ok(regions)
}

/// Rekap d'un scrutin pour un ensemble de régions.
///
/// Pour le pileg RI, les voix des caleg sont ajoutées à celles de leur
/// partai dans la même requête.
pub async fn load_tallies(
    pool: &Pool,
    schema: &str,
    kind: ContestKind,
    region_ids: &[RegionId],
) -> Result<Vec<VoteTally>> {
    let client = pool.get().await?;

    let sql = match kind {
        ContestKind::Pilpres => format!(
            r#"
            SELECT r.wilayah_id, r.suara_tidak_sah, v.paslon_id AS kontestan_id, v.suara
            FROM {s}.rekap_pilpres r
            LEFT JOIN {s}.suara_paslon v ON v.wilayah_id = r.wilayah_id
            WHERE r.wilayah_id = ANY($1)
            "#,
            s = schema
        ),
        ContestKind::PilegRi => format!(
            r#"
            SELECT r.wilayah_id, r.suara_tidak_sah, v.partai_id AS kontestan_id, v.suara
            FROM {s}.rekap_pileg_ri r
            LEFT JOIN (
                SELECT wilayah_id, partai_id, SUM(suara)::BIGINT AS suara
                FROM (
                    SELECT wilayah_id, partai_id, suara
                    FROM {s}.suara_partai
                    WHERE wilayah_id = ANY($1)
                    UNION ALL
                    SELECT sc.wilayah_id, c.partai_id, sc.suara
                    FROM {s}.suara_caleg sc
                    JOIN {s}.caleg c ON c.id = sc.caleg_id
                    WHERE sc.wilayah_id = ANY($1)
                ) suara
                GROUP BY wilayah_id, partai_id
            ) v ON v.wilayah_id = r.wilayah_id
            WHERE r.wilayah_id = ANY($1)
            "#,
            s = schema
        ),
    };

    let rows = client
        .query(&sql, &[&region_ids])
        .await
        .context(format!("Failed to load {} tallies", kind))?;

    let mut tallies: BTreeMap<RegionId, VoteTally> = BTreeMap::new();
    for row in &rows {
        let region_id: RegionId = row.get("wilayah_id");
        let tally = tallies.entry(region_id).or_insert_with(|| {
            VoteTally::new(region_id).with_invalid(count(row, "suara_tidak_sah"))
        });
        let contestant: Option<i64> = row.get("kontestan_id");
        if let Some(contestant_id) = contestant {
            let votes: Option<i64> = row.get("suara");
            tally.add_votes(contestant_id, votes.unwrap_or(0).max(0) as u64);
        }
    }

    debug!(kind = %kind, tallies = tallies.len(), "Tallies loaded");
    Ok(tallies.into_values().collect())
}

/// TPS et DPT pour un ensemble de régions
pub async fn load_turnout(
    pool: &Pool,
    schema: &str,
    region_ids: &[RegionId],
) -> Result<Vec<TurnoutInfo>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT wilayah_id, jumlah_tps, jumlah_dpt FROM {}.tps_dpt WHERE wilayah_id = ANY($1)",
                schema
            ),
            &[&region_ids],
        )
        .await
        .context("Failed to load TPS/DPT")?;

    Ok(rows
        .iter()
        .map(|row| TurnoutInfo {
            region_id: row.get("wilayah_id"),
            polling_stations: count(row, "jumlah_tps"),
            registered_voters: count(row, "jumlah_dpt"),
        })
        .collect())
}

/// Paslon (pilpres) ou partai (pileg RI), triés par numéro de bulletin
pub async fn load_contestants(
    pool: &Pool,
    schema: &str,
    kind: ContestKind,
) -> Result<Vec<Contestant>> {
    let client = pool.get().await?;

    let sql = match kind {
        ContestKind::Pilpres => format!(
            "SELECT id, no_urut, nama_capres AS nama, nama_cawapres AS pendamping, warna_hex, foto \
             FROM {}.paslon ORDER BY no_urut",
            schema
        ),
        ContestKind::PilegRi => format!(
            "SELECT id, no_urut, nama, NULL::TEXT AS pendamping, warna_hex, logo AS foto \
             FROM {}.partai ORDER BY no_urut",
            schema
        ),
    };

    let rows = client
        .query(&sql, &[])
        .await
        .context(format!("Failed to load {} contestants", kind))?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            Contestant {
                id,
                kind,
                ballot_number: row.get::<_, i32>("no_urut").max(0) as u32,
                name: row.get("nama"),
                running_mate: row.get("pendamping"),
                color: color_from_row(row, "warna_hex", id).unwrap_or(Rgb::NO_VOTES),
                photo: row.get("foto"),
            }
        })
        .collect())
}

/// Contours des régions demandées
pub async fn load_geometries(
    pool: &Pool,
    schema: &str,
    region_ids: &[RegionId],
) -> Result<Vec<RegionGeometry>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT wilayah_id, geojson::TEXT AS geojson, warna_area \
                 FROM {}.geometri_wilayah WHERE wilayah_id = ANY($1)",
                schema
            ),
            &[&region_ids],
        )
        .await
        .context("Failed to load geometries")?;

    Ok(rows
        .iter()
        .map(|row| {
            let region_id: RegionId = row.get("wilayah_id");
            RegionGeometry {
                region_id,
                payload: row.get("geojson"),
                display_color: color_from_row(row, "warna_area", region_id),
            }
        })
        .collect())
}

/// Dapil avec leur couverture, éventuellement filtrées par niveau
pub async fn load_districts(
    pool: &Pool,
    schema: &str,
    tier: Option<DistrictTier>,
) -> Result<Vec<ElectoralDistrict>> {
    let client = pool.get().await?;
    districts_of(&client, schema, tier).await
}

pub(crate) async fn districts_of<C: GenericClient>(
    client: &C,
    schema: &str,
    tier: Option<DistrictTier>,
) -> Result<Vec<ElectoralDistrict>> {
    let sql = format!(
        r#"
        SELECT d.id, d.nama, d.tingkat, d.alokasi_kursi, d.kabupaten_id,
               COALESCE(
                   array_agg(dw.wilayah_id) FILTER (WHERE dw.wilayah_id IS NOT NULL),
                   '{{}}'
               ) AS cakupan
        FROM {s}.dapil d
        LEFT JOIN {s}.dapil_wilayah dw ON dw.dapil_id = d.id
        WHERE $1::TEXT IS NULL OR d.tingkat = $1
        GROUP BY d.id
        ORDER BY d.tingkat, d.nama
        "#,
        s = schema
    );

    let tier_code = tier.map(DistrictTier::as_str);
    let rows = client
        .query(&sql, &[&tier_code])
        .await
        .context("Failed to load dapil")?;

    rows.iter()
        .map(|row| {
            let tier: String = row.get("tingkat");
            let covered: Vec<i64> = row.get("cakupan");
            Ok(ElectoralDistrict {
                id: row.get("id"),
                name: row.get("nama"),
                tier: tier.parse()?,
                seat_count: row.get::<_, i32>("alokasi_kursi").max(0) as u32,
                kabupaten_id: row.get("kabupaten_id"),
                covered_regions: covered.into_iter().collect(),
            })
        })
        .collect()
}

/// Enfants directs d'une région à un niveau donné, triés par nom
pub async fn children_of(
    pool: &Pool,
    schema: &str,
    parent_id: RegionId,
    level: RegionLevel,
) -> Result<Vec<RegionOption>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT id, nama FROM {}.wilayah WHERE parent_id = $1 AND tingkat = $2 ORDER BY nama, id",
                schema
            ),
            &[&parent_id, &level.as_str()],
        )
        .await
        .context("Failed to load child regions")?;

    Ok(rows
        .iter()
        .map(|row| RegionOption {
            id: row.get("id"),
            nama: row.get("nama"),
        })
        .collect())
}

/// Charge tout ce qu'il faut pour une carte: hiérarchie du périmètre puis,
/// en parallèle, contours des régions cibles, rekap et TPS/DPT.
pub async fn load_map_data(
    pool: &Pool,
    schema: &str,
    request: &MapRequest,
    contestants: Option<Arc<[Contestant]>>,
) -> Result<MapData> {
    let regions = load_hierarchy(pool, schema, request.scope).await?;
    let index = RegionIndex::build(regions)?;

    let target_ids: Vec<RegionId> = index
        .targets(request.level, request.scope)?
        .iter()
        .map(|r| r.id)
        .collect();
    let all_ids: Vec<RegionId> = index.iter().map(|r| r.id).collect();

    let (geometries, contest) = match (request.mode.contest(), contestants) {
        (Some(kind), Some(contestants)) => {
            let (geometries, tallies, turnout) = futures::try_join!(
                load_geometries(pool, schema, &target_ids),
                load_tallies(pool, schema, kind, &all_ids),
                load_turnout(pool, schema, &all_ids),
            )?;
            let mut data = ContestData::new(kind, contestants);
            data.tallies = tallies;
            data.turnout = turnout;
            (geometries, Some(data))
        }
        _ => (load_geometries(pool, schema, &target_ids).await?, None),
    };

    Ok(MapData {
        index,
        geometries,
        contest,
    })
}
