//! Création du schéma PostgreSQL

use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use tracing::info;

use crate::config::validate_schema_name;

/// Tables dans l'ordre de création
pub const TABLES: [&str; 13] = [
    "wilayah",
    "dapil",
    "dapil_wilayah",
    "paslon",
    "partai",
    "caleg",
    "rekap_pilpres",
    "suara_paslon",
    "rekap_pileg_ri",
    "suara_partai",
    "suara_caleg",
    "tps_dpt",
    "geometri_wilayah",
];

/// SQL de création des tables dans `schema`
pub fn schema_sql(schema: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {s}.wilayah (
            id BIGINT PRIMARY KEY,
            nama TEXT NOT NULL,
            tingkat TEXT NOT NULL CHECK (tingkat IN ('provinsi', 'kabupaten', 'kecamatan', 'desa')),
            parent_id BIGINT REFERENCES {s}.wilayah(id) ON DELETE CASCADE,
            CHECK ((tingkat = 'provinsi') = (parent_id IS NULL)),
            UNIQUE (parent_id, nama)
        );
        CREATE INDEX IF NOT EXISTS wilayah_parent_idx ON {s}.wilayah (parent_id);
        CREATE INDEX IF NOT EXISTS wilayah_tingkat_idx ON {s}.wilayah (tingkat, nama);

        CREATE TABLE IF NOT EXISTS {s}.dapil (
            id BIGSERIAL PRIMARY KEY,
            nama TEXT NOT NULL,
            tingkat TEXT NOT NULL CHECK (tingkat IN ('ri', 'provinsi', 'kabkota')),
            alokasi_kursi INTEGER NOT NULL CHECK (alokasi_kursi > 0),
            kabupaten_id BIGINT REFERENCES {s}.wilayah(id) ON DELETE CASCADE,
            CHECK ((tingkat = 'kabkota') = (kabupaten_id IS NOT NULL)),
            UNIQUE (tingkat, nama)
        );

        CREATE TABLE IF NOT EXISTS {s}.dapil_wilayah (
            dapil_id BIGINT NOT NULL REFERENCES {s}.dapil(id) ON DELETE CASCADE,
            tingkat TEXT NOT NULL,
            wilayah_id BIGINT NOT NULL REFERENCES {s}.wilayah(id) ON DELETE CASCADE,
            PRIMARY KEY (dapil_id, wilayah_id),
            UNIQUE (tingkat, wilayah_id)
        );

        CREATE TABLE IF NOT EXISTS {s}.paslon (
            id BIGSERIAL PRIMARY KEY,
            no_urut INTEGER NOT NULL UNIQUE CHECK (no_urut > 0),
            nama_capres TEXT NOT NULL,
            nama_cawapres TEXT,
            warna_hex TEXT NOT NULL DEFAULT '#808080',
            foto TEXT
        );

        CREATE TABLE IF NOT EXISTS {s}.partai (
            id BIGSERIAL PRIMARY KEY,
            no_urut INTEGER NOT NULL UNIQUE CHECK (no_urut > 0),
            nama TEXT NOT NULL,
            warna_hex TEXT NOT NULL DEFAULT '#808080',
            logo TEXT
        );

        CREATE TABLE IF NOT EXISTS {s}.caleg (
            id BIGSERIAL PRIMARY KEY,
            partai_id BIGINT NOT NULL REFERENCES {s}.partai(id) ON DELETE CASCADE,
            dapil_id BIGINT NOT NULL REFERENCES {s}.dapil(id) ON DELETE CASCADE,
            no_urut INTEGER NOT NULL CHECK (no_urut > 0),
            nama TEXT NOT NULL,
            UNIQUE (partai_id, dapil_id, no_urut)
        );

        CREATE TABLE IF NOT EXISTS {s}.rekap_pilpres (
            wilayah_id BIGINT PRIMARY KEY REFERENCES {s}.wilayah(id) ON DELETE RESTRICT,
            suara_tidak_sah BIGINT NOT NULL DEFAULT 0 CHECK (suara_tidak_sah >= 0),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );

        CREATE TABLE IF NOT EXISTS {s}.suara_paslon (
            wilayah_id BIGINT NOT NULL REFERENCES {s}.rekap_pilpres(wilayah_id) ON DELETE CASCADE,
            paslon_id BIGINT NOT NULL REFERENCES {s}.paslon(id) ON DELETE CASCADE,
            suara BIGINT NOT NULL DEFAULT 0 CHECK (suara >= 0),
            PRIMARY KEY (wilayah_id, paslon_id)
        );

        CREATE TABLE IF NOT EXISTS {s}.rekap_pileg_ri (
            wilayah_id BIGINT PRIMARY KEY REFERENCES {s}.wilayah(id) ON DELETE RESTRICT,
            suara_tidak_sah BIGINT NOT NULL DEFAULT 0 CHECK (suara_tidak_sah >= 0),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );

        CREATE TABLE IF NOT EXISTS {s}.suara_partai (
            wilayah_id BIGINT NOT NULL REFERENCES {s}.rekap_pileg_ri(wilayah_id) ON DELETE CASCADE,
            partai_id BIGINT NOT NULL REFERENCES {s}.partai(id) ON DELETE CASCADE,
            suara BIGINT NOT NULL DEFAULT 0 CHECK (suara >= 0),
            PRIMARY KEY (wilayah_id, partai_id)
        );

        CREATE TABLE IF NOT EXISTS {s}.suara_caleg (
            wilayah_id BIGINT NOT NULL REFERENCES {s}.rekap_pileg_ri(wilayah_id) ON DELETE CASCADE,
            caleg_id BIGINT NOT NULL REFERENCES {s}.caleg(id) ON DELETE CASCADE,
            suara BIGINT NOT NULL DEFAULT 0 CHECK (suara >= 0),
            PRIMARY KEY (wilayah_id, caleg_id)
        );

        CREATE TABLE IF NOT EXISTS {s}.tps_dpt (
            wilayah_id BIGINT PRIMARY KEY REFERENCES {s}.wilayah(id) ON DELETE CASCADE,
            jumlah_tps BIGINT NOT NULL DEFAULT 0 CHECK (jumlah_tps >= 0),
            jumlah_dpt BIGINT NOT NULL DEFAULT 0 CHECK (jumlah_dpt >= 0)
        );

        CREATE TABLE IF NOT EXISTS {s}.geometri_wilayah (
            wilayah_id BIGINT PRIMARY KEY REFERENCES {s}.wilayah(id) ON DELETE CASCADE,
            geojson JSONB,
            warna_area TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#,
        s = schema
    )
}

/// Crée le schéma et les tables
pub async fn create_schema(pool: &Pool, schema: &str, drop_existing: bool) -> Result<()> {
    validate_schema_name(schema)?;
    let client = pool.get().await?;

    if drop_existing {
        client
            .execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema), &[])
            .await
            .context("Failed to drop schema")?;
        info!(schema, "Dropped existing schema");
    }

    client
        .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
        .await
        .context("Failed to create schema")?;

    client
        .batch_execute(&schema_sql(schema))
        .await
        .context("Failed to create tables")?;

    info!(schema, tables = TABLES.len(), "Schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_mentions_every_table() {
        let sql = schema_sql("pemilu");
        for table in TABLES {
            assert!(
                sql.contains(&format!("pemilu.{} (", table)),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn test_tallies_restrict_region_deletion() {
        let sql = schema_sql("pemilu");
        let restricts = sql.matches("ON DELETE RESTRICT").count();
        assert_eq!(restricts, 2);
    }
}
