//! Écritures d'administration
//!
//! Toutes les écritures sont des upserts (dernier écrivain gagnant). Les
//! règles métier (niveau du parent, rekap existants, cakupan des dapil) sont
//! vérifiées avant d'écrire et renvoyées comme [`RekapError`].

use anyhow::{Context, Result};
use deadpool_postgres::{Pool, Transaction};
use tracing::{debug, info};

use rekap::assemble::normalize;
use rekap::{
    validate_coverage, ContestKind, Contestant, ContestantId, DistrictId, ElectoralDistrict,
    Region, RegionGeometry, RegionId, RegionIndex, RegionLevel, RekapError, Rgb, TurnoutInfo,
    VoteTally,
};

use super::postgres::{all_regions, count, districts_of};
use crate::directory::ContestantDirectory;

fn to_bigint(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("{} out of range: {}", what, value))
}

fn to_integer(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).with_context(|| format!("{} out of range: {}", what, value))
}

/// Tables d'un scrutin: (rekap, voix, colonne kontestan)
fn contest_tables(kind: ContestKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ContestKind::Pilpres => ("rekap_pilpres", "suara_paslon", "paslon_id"),
        ContestKind::PilegRi => ("rekap_pileg_ri", "suara_partai", "partai_id"),
    }
}

async fn ensure_region(
    client: &deadpool_postgres::Client,
    schema: &str,
    id: RegionId,
) -> Result<RegionLevel> {
    let row = client
        .query_opt(
            &format!("SELECT tingkat FROM {}.wilayah WHERE id = $1", schema),
            &[&id],
        )
        .await
        .context("Failed to look up region")?;

    match row {
        Some(row) => Ok(row.get::<_, String>("tingkat").parse()?),
        None => Err(RekapError::UnknownRegion(id).into()),
    }
}

/// Crée ou renomme une région.
///
/// Le parent doit exister au niveau immédiatement supérieur; le niveau
/// d'une région existante ne peut pas changer.
pub async fn insert_region(pool: &Pool, schema: &str, region: &Region) -> Result<()> {
    if region.name.trim().is_empty() {
        return Err(RekapError::invalid_argument("Region name cannot be empty").into());
    }

    let client = pool.get().await?;

    match (region.level.parent(), region.parent_id) {
        (None, None) => {}
        (None, Some(_)) => {
            return Err(RekapError::hierarchy(region.id, "provinsi cannot have a parent").into())
        }
        (Some(expected), None) => {
            return Err(RekapError::hierarchy(
                region.id,
                format!("{} requires a {} parent", region.level, expected),
            )
            .into())
        }
        (Some(expected), Some(parent_id)) => {
            let parent_level = ensure_region(&client, schema, parent_id).await?;
            if parent_level != expected {
                return Err(RekapError::hierarchy(
                    region.id,
                    format!(
                        "parent {} is a {}, expected {}",
                        parent_id, parent_level, expected
                    ),
                )
                .into());
            }
        }
    }

    let written = client
        .execute(
            &format!(
                r#"
                INSERT INTO {s}.wilayah (id, nama, tingkat, parent_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET nama = EXCLUDED.nama, parent_id = EXCLUDED.parent_id
                WHERE wilayah.tingkat = EXCLUDED.tingkat
                "#,
                s = schema
            ),
            &[
                &region.id,
                &region.name,
                &region.level.as_str(),
                &region.parent_id,
            ],
        )
        .await
        .context("Failed to insert region")?;

    if written == 0 {
        return Err(RekapError::hierarchy(region.id, "region level cannot change").into());
    }

    debug!(id = region.id, level = %region.level, "Region saved");
    Ok(())
}

/// Supprime une région et ses descendants.
///
/// Refusé si un rekap (pilpres ou pileg RI) référence la région ou l'un de
/// ses descendants. Renvoie le nombre de régions supprimées.
pub async fn delete_region(pool: &Pool, schema: &str, region_id: RegionId) -> Result<u64> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let sql = format!(
        r#"
        WITH RECURSIVE cabang AS (
            SELECT id FROM {s}.wilayah WHERE id = $1
            UNION ALL
            SELECT w.id FROM {s}.wilayah w JOIN cabang c ON w.parent_id = c.id
        )
        SELECT
            (SELECT COUNT(*) FROM cabang) AS wilayah,
            (SELECT COUNT(*) FROM {s}.rekap_pilpres WHERE wilayah_id IN (SELECT id FROM cabang))
          + (SELECT COUNT(*) FROM {s}.rekap_pileg_ri WHERE wilayah_id IN (SELECT id FROM cabang))
            AS rekap
        "#,
        s = schema
    );
    let row = tx
        .query_one(&sql, &[&region_id])
        .await
        .context("Failed to inspect region subtree")?;

    let regions = count(&row, "wilayah");
    let tallies = count(&row, "rekap");
    if regions == 0 {
        return Err(RekapError::UnknownRegion(region_id).into());
    }
    if tallies > 0 {
        return Err(RekapError::RegionInUse { region_id, tallies }.into());
    }

    tx.execute(
        &format!("DELETE FROM {}.wilayah WHERE id = $1", schema),
        &[&region_id],
    )
    .await
    .context("Failed to delete region")?;
    tx.commit().await.context("Failed to commit region deletion")?;

    info!(region_id, regions, "Region deleted");
    Ok(regions)
}

/// Enregistre une dapil et sa cakupan après validation.
///
/// `id == 0` crée une nouvelle dapil. Renvoie l'identifiant enregistré.
pub async fn save_district(
    pool: &Pool,
    schema: &str,
    district: &ElectoralDistrict,
) -> Result<DistrictId> {
    let seats = to_integer(district.seat_count, "Seat count")?;
    let tier = district.tier.as_str();
    let covered: Vec<RegionId> = district.covered_regions.iter().copied().collect();

    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    // Une seule sauvegarde de cakupan à la fois: validation et écriture
    // voient le même état
    tx.batch_execute(&format!(
        "LOCK TABLE {}.dapil_wilayah IN SHARE ROW EXCLUSIVE MODE",
        schema
    ))
    .await
    .context("Failed to lock dapil coverage")?;

    let index = RegionIndex::build(all_regions(&tx, schema).await?)?;
    let existing = districts_of(&tx, schema, Some(district.tier)).await?;
    validate_coverage(district, &existing, &index)?;

    let id: DistrictId = if district.id > 0 {
        let row = tx
            .query_opt(
                &format!(
                    "UPDATE {}.dapil SET nama = $2, tingkat = $3, alokasi_kursi = $4, kabupaten_id = $5 \
                     WHERE id = $1 RETURNING id",
                    schema
                ),
                &[&district.id, &district.name, &tier, &seats, &district.kabupaten_id],
            )
            .await
            .context("Failed to update dapil")?;
        match row {
            Some(row) => row.get("id"),
            None => {
                return Err(
                    RekapError::invalid_argument(format!("Unknown dapil: {}", district.id)).into(),
                )
            }
        }
    } else {
        tx.query_one(
            &format!(
                "INSERT INTO {}.dapil (nama, tingkat, alokasi_kursi, kabupaten_id) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
                schema
            ),
            &[&district.name, &tier, &seats, &district.kabupaten_id],
        )
        .await
        .context("Failed to insert dapil")?
        .get("id")
    };

    tx.execute(
        &format!("DELETE FROM {}.dapil_wilayah WHERE dapil_id = $1", schema),
        &[&id],
    )
    .await
    .context("Failed to clear dapil coverage")?;

    tx.execute(
        &format!(
            "INSERT INTO {}.dapil_wilayah (dapil_id, tingkat, wilayah_id) \
             SELECT $1::BIGINT, $2::TEXT, UNNEST($3::BIGINT[])",
            schema
        ),
        &[&id, &tier, &covered],
    )
    .await
    .context("Failed to write dapil coverage")?;

    tx.commit().await.context("Failed to commit dapil")?;

    info!(id, tier, regions = covered.len(), "Dapil saved");
    Ok(id)
}

/// Refuse un rekap sous ou au-dessus d'une région déjà saisie.
///
/// La table de rekap est verrouillée jusqu'à la fin de la transaction.
async fn ensure_single_level(
    tx: &Transaction<'_>,
    schema: &str,
    rekap_table: &str,
    region_id: RegionId,
) -> Result<()> {
    tx.batch_execute(&format!(
        "LOCK TABLE {}.{} IN SHARE ROW EXCLUSIVE MODE",
        schema, rekap_table
    ))
    .await
    .context("Failed to lock tally table")?;

    let sql = format!(
        r#"
        WITH RECURSIVE leluhur AS (
            SELECT parent_id AS id FROM {s}.wilayah WHERE id = $1
            UNION ALL
            SELECT w.parent_id FROM {s}.wilayah w JOIN leluhur l ON w.id = l.id
        ), turunan AS (
            SELECT id FROM {s}.wilayah WHERE parent_id = $1
            UNION ALL
            SELECT w.id FROM {s}.wilayah w JOIN turunan t ON w.parent_id = t.id
        )
        SELECT r.wilayah_id FROM {s}.{t} r
        WHERE r.wilayah_id IN (
            SELECT id FROM leluhur WHERE id IS NOT NULL
            UNION
            SELECT id FROM turunan
        )
        ORDER BY r.wilayah_id
        LIMIT 1
        "#,
        s = schema,
        t = rekap_table
    );
    let row = tx
        .query_opt(&sql, &[&region_id])
        .await
        .context("Failed to check tally level")?;

    match row {
        Some(row) => Err(RekapError::TallyOverlap {
            region_id,
            conflicting: row.get("wilayah_id"),
        }
        .into()),
        None => Ok(()),
    }
}

/// Remplace le rekap d'une région pour un scrutin.
///
/// Un seul niveau de rekap par branche: refusé si un ancêtre ou un
/// descendant a déjà un rekap pour ce scrutin.
pub async fn upsert_tally(
    pool: &Pool,
    schema: &str,
    kind: ContestKind,
    tally: &VoteTally,
) -> Result<()> {
    let (rekap_table, votes_table, contestant_column) = contest_tables(kind);

    let contestant_ids: Vec<ContestantId> = tally.votes.keys().copied().collect();
    let votes = tally
        .votes
        .values()
        .map(|v| to_bigint(*v, "Vote count"))
        .collect::<Result<Vec<_>>>()?;
    let invalid = to_bigint(tally.invalid_votes, "Invalid vote count")?;

    let mut client = pool.get().await?;
    ensure_region(&client, schema, tally.region_id).await?;
    let tx = client.transaction().await?;
    ensure_single_level(&tx, schema, rekap_table, tally.region_id).await?;

    tx.execute(
        &format!(
            r#"
            INSERT INTO {s}.{t} (wilayah_id, suara_tidak_sah, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (wilayah_id) DO UPDATE
            SET suara_tidak_sah = EXCLUDED.suara_tidak_sah, updated_at = NOW()
            "#,
            s = schema,
            t = rekap_table
        ),
        &[&tally.region_id, &invalid],
    )
    .await
    .context("Failed to upsert tally")?;

    tx.execute(
        &format!("DELETE FROM {}.{} WHERE wilayah_id = $1", schema, votes_table),
        &[&tally.region_id],
    )
    .await
    .context("Failed to clear previous votes")?;

    tx.execute(
        &format!(
            "INSERT INTO {s}.{t} (wilayah_id, {c}, suara) \
             SELECT $1::BIGINT, UNNEST($2::BIGINT[]), UNNEST($3::BIGINT[])",
            s = schema,
            t = votes_table,
            c = contestant_column
        ),
        &[&tally.region_id, &contestant_ids, &votes],
    )
    .await
    .context("Failed to write votes")?;

    tx.commit().await.context("Failed to commit tally")?;

    debug!(
        region_id = tally.region_id,
        kind = %kind,
        contestants = contestant_ids.len(),
        "Tally saved"
    );
    Ok(())
}

/// Enregistre les voix des caleg d'une région (pileg RI).
///
/// Même règle de niveau unique que [`upsert_tally`].
pub async fn upsert_caleg_votes(
    pool: &Pool,
    schema: &str,
    region_id: RegionId,
    votes: &[(i64, u64)],
) -> Result<()> {
    let caleg_ids: Vec<i64> = votes.iter().map(|(id, _)| *id).collect();
    let counts = votes
        .iter()
        .map(|(_, v)| to_bigint(*v, "Vote count"))
        .collect::<Result<Vec<_>>>()?;

    let mut client = pool.get().await?;
    ensure_region(&client, schema, region_id).await?;
    let tx = client.transaction().await?;
    ensure_single_level(&tx, schema, "rekap_pileg_ri", region_id).await?;

    tx.execute(
        &format!(
            "INSERT INTO {}.rekap_pileg_ri (wilayah_id) VALUES ($1) ON CONFLICT (wilayah_id) DO NOTHING",
            schema
        ),
        &[&region_id],
    )
    .await
    .context("Failed to create pileg tally")?;

    tx.execute(
        &format!(
            r#"
            INSERT INTO {s}.suara_caleg (wilayah_id, caleg_id, suara)
            SELECT $1::BIGINT, UNNEST($2::BIGINT[]), UNNEST($3::BIGINT[])
            ON CONFLICT (wilayah_id, caleg_id) DO UPDATE SET suara = EXCLUDED.suara
            "#,
            s = schema
        ),
        &[&region_id, &caleg_ids, &counts],
    )
    .await
    .context("Failed to write caleg votes")?;

    tx.commit().await.context("Failed to commit caleg votes")?;
    Ok(())
}

/// Enregistre le nombre de TPS et de DPT d'une région
pub async fn upsert_turnout(pool: &Pool, schema: &str, turnout: &TurnoutInfo) -> Result<()> {
    let stations = to_bigint(turnout.polling_stations, "TPS count")?;
    let voters = to_bigint(turnout.registered_voters, "DPT count")?;

    let client = pool.get().await?;
    ensure_region(&client, schema, turnout.region_id).await?;
    client
        .execute(
            &format!(
                r#"
                INSERT INTO {s}.tps_dpt (wilayah_id, jumlah_tps, jumlah_dpt)
                VALUES ($1, $2, $3)
                ON CONFLICT (wilayah_id) DO UPDATE
                SET jumlah_tps = EXCLUDED.jumlah_tps, jumlah_dpt = EXCLUDED.jumlah_dpt
                "#,
                s = schema
            ),
            &[&turnout.region_id, &stations, &voters],
        )
        .await
        .context("Failed to upsert TPS/DPT")?;
    Ok(())
}

/// Enregistre le contour d'une région.
///
/// Un payload absent ou vide est accepté (brouillon); un payload présent
/// doit être un (Multi)Polygon exploitable.
pub async fn upsert_geometry(pool: &Pool, schema: &str, geometry: &RegionGeometry) -> Result<()> {
    normalize(geometry.region_id, geometry.payload.as_deref())?;

    let payload = geometry
        .payload
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let color = geometry.display_color.map(Rgb::to_hex);

    let client = pool.get().await?;
    ensure_region(&client, schema, geometry.region_id).await?;
    client
        .execute(
            &format!(
                r#"
                INSERT INTO {s}.geometri_wilayah (wilayah_id, geojson, warna_area, updated_at)
                VALUES ($1, CAST($2::TEXT AS JSONB), $3, NOW())
                ON CONFLICT (wilayah_id) DO UPDATE
                SET geojson = EXCLUDED.geojson, warna_area = EXCLUDED.warna_area, updated_at = NOW()
                "#,
                s = schema
            ),
            &[&geometry.region_id, &payload, &color],
        )
        .await
        .context("Failed to upsert geometry")?;

    debug!(region_id = geometry.region_id, draft = payload.is_none(), "Geometry saved");
    Ok(())
}

/// Change la couleur d'affichage d'un contour existant
pub async fn recolor_geometry(
    pool: &Pool,
    schema: &str,
    region_id: RegionId,
    color: Rgb,
) -> Result<()> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            &format!(
                "UPDATE {}.geometri_wilayah SET warna_area = $2, updated_at = NOW() WHERE wilayah_id = $1",
                schema
            ),
            &[&region_id, &color.to_hex()],
        )
        .await
        .context("Failed to recolor geometry")?;

    if updated == 0 {
        return Err(RekapError::UnknownRegion(region_id).into());
    }
    Ok(())
}

/// Crée ou modifie un paslon / partai puis rafraîchit le cache
pub async fn update_contestant(
    pool: &Pool,
    schema: &str,
    directory: &ContestantDirectory,
    contestant: &Contestant,
) -> Result<()> {
    if contestant.id <= 0 {
        return Err(RekapError::invalid_argument(format!(
            "Invalid contestant id: {}",
            contestant.id
        ))
        .into());
    }
    if contestant.ballot_number == 0 {
        return Err(RekapError::invalid_argument("Ballot number must be positive").into());
    }

    let ballot = to_integer(contestant.ballot_number, "Ballot number")?;
    let color = contestant.color.to_hex();

    let client = pool.get().await?;
    match contestant.kind {
        ContestKind::Pilpres => client
            .execute(
                &format!(
                    r#"
                    INSERT INTO {s}.paslon (id, no_urut, nama_capres, nama_cawapres, warna_hex, foto)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO UPDATE
                    SET no_urut = EXCLUDED.no_urut, nama_capres = EXCLUDED.nama_capres,
                        nama_cawapres = EXCLUDED.nama_cawapres, warna_hex = EXCLUDED.warna_hex,
                        foto = EXCLUDED.foto
                    "#,
                    s = schema
                ),
                &[
                    &contestant.id,
                    &ballot,
                    &contestant.name,
                    &contestant.running_mate,
                    &color,
                    &contestant.photo,
                ],
            )
            .await
            .context("Failed to upsert paslon")?,
        ContestKind::PilegRi => client
            .execute(
                &format!(
                    r#"
                    INSERT INTO {s}.partai (id, no_urut, nama, warna_hex, logo)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE
                    SET no_urut = EXCLUDED.no_urut, nama = EXCLUDED.nama,
                        warna_hex = EXCLUDED.warna_hex, logo = EXCLUDED.logo
                    "#,
                    s = schema
                ),
                &[
                    &contestant.id,
                    &ballot,
                    &contestant.name,
                    &color,
                    &contestant.photo,
                ],
            )
            .await
            .context("Failed to upsert partai")?,
    };

    directory.refresh(contestant.kind).await?;
    info!(id = contestant.id, kind = %contestant.kind, "Contestant saved");
    Ok(())
}
