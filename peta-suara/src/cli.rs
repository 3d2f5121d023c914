//! Définition et implémentation des commandes CLI
//!
//! - `serve`: API HTTP des cartes
//! - `init-schema`: création des tables
//! - `check-dapil`: audit de la couverture des dapil
//! - `export`: carte → fichier GeoJSON

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use peta_suara::server::{self, AppState};
use peta_suara::store::postgres::{load_districts, load_hierarchy};
use peta_suara::store::{create_pool, schema, test_connection, DatabaseConfig};
use peta_suara::{render_map, Config, ContestantDirectory};
use rekap::{audit, DistrictTier, MapRequest, RegionIndex};

/// Connexion PostgreSQL (défauts: variables d'environnement PG*)
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// PostgreSQL database name (défaut : env PGDATABASE / pemilu)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// Schema holding the election tables (défaut : env PGSCHEMA / pemilu)
    #[arg(long)]
    pub schema: Option<String>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

impl DbArgs {
    /// Environnement puis options de la ligne de commande
    pub fn database_config(self) -> Result<DatabaseConfig> {
        DatabaseConfig::from_env().with_overrides(
            self.host,
            self.port,
            self.database,
            self.user,
            self.password,
            self.schema,
            self.ssl,
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the map API over HTTP
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// Colour rules: preset name (standard/uniform) or path to a JSON config
        #[arg(long, default_value = "standard")]
        config: String,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Create the schema and its tables
    InitSchema {
        /// Drop the schema before creating it
        #[arg(long)]
        drop: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Check dapil coverage for conflicts
    CheckDapil {
        /// Dapil tier: ri, provinsi, kabkota (défaut : tous)
        #[arg(long)]
        tier: Option<String>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Write a map as a GeoJSON FeatureCollection
    Export {
        /// Map level: kokab, kecamatan, desa
        #[arg(long, default_value = "kokab")]
        level: String,

        /// Map mode: default, pilpres, pileg_ri
        #[arg(long, default_value = "default")]
        mode: String,

        /// Kabupaten scoping a kecamatan map
        #[arg(long)]
        kab_id: Option<i64>,

        /// Kecamatan scoping a desa map
        #[arg(long)]
        kec_id: Option<i64>,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Optional JSON report of skipped regions
        #[arg(long)]
        report: Option<PathBuf>,

        /// Colour rules: preset name (standard/uniform) or path to a JSON config
        #[arg(long, default_value = "standard")]
        config: String,

        #[command(flatten)]
        db: DbArgs,
    },
}

fn describe(db_config: &DatabaseConfig) {
    println!(
        "Database: {}@{}:{}/{} schema {} (SSL: {:?})",
        db_config.user,
        db_config.host,
        db_config.port,
        db_config.dbname,
        db_config.schema,
        db_config.ssl_mode
    );
}

/// Exécute la commande serve
pub async fn cmd_serve(bind: &str, config_spec: &str, db: DbArgs) -> Result<()> {
    let config = Config::resolve(config_spec)?;
    let db_config = db.database_config()?;
    describe(&db_config);

    let pool = create_pool(&db_config)?;
    match test_connection(&pool).await {
        Ok(()) => info!("Connected to PostgreSQL"),
        Err(e) => warn!(
            error = %format!("{:#}", e),
            "PostgreSQL not reachable yet, serving anyway"
        ),
    }

    let state = AppState::new(pool, db_config.schema, config);
    server::serve(state, bind).await
}

/// Exécute la commande init-schema
pub async fn cmd_init_schema(drop: bool, db: DbArgs) -> Result<()> {
    let db_config = db.database_config()?;
    describe(&db_config);

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;
    schema::create_schema(&pool, &db_config.schema, drop).await?;

    println!("Schema {} ready ({} tables)", db_config.schema, schema::TABLES.len());
    Ok(())
}

/// Exécute la commande check-dapil
pub async fn cmd_check_dapil(tier: Option<&str>, db: DbArgs) -> Result<()> {
    let tier = tier.map(str::parse::<DistrictTier>).transpose()?;
    let db_config = db.database_config()?;
    describe(&db_config);

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;

    let index = RegionIndex::build(load_hierarchy(&pool, &db_config.schema, None).await?)?;
    let districts = load_districts(&pool, &db_config.schema, tier).await?;
    let violations = audit(&districts, &index);

    println!("\n=== Dapil audit ===");
    println!("Regions: {}", index.len());
    println!("Dapil: {}", districts.len());

    if violations.is_empty() {
        println!("No coverage conflict");
        return Ok(());
    }

    println!("\nConflicts ({}):", violations.len());
    for v in &violations {
        println!(
            "- [{}] {} ({:?}): {}",
            v.region_id, v.region_name, v.kind, v.message
        );
    }

    anyhow::bail!("{} dapil coverage conflicts", violations.len())
}

/// Exécute la commande export
#[allow(clippy::too_many_arguments)]
pub async fn cmd_export(
    level: &str,
    mode: &str,
    kab_id: Option<i64>,
    kec_id: Option<i64>,
    output: &Path,
    report_path: Option<&Path>,
    config_spec: &str,
    db: DbArgs,
) -> Result<()> {
    let request = MapRequest::from_query(Some(level), Some(mode), kab_id, kec_id)?;
    let config = Config::resolve(config_spec)?;
    let db_config = db.database_config()?;
    describe(&db_config);

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;

    let contestants = ContestantDirectory::new(pool.clone(), db_config.schema.clone());
    let (collection, report) =
        render_map(&pool, &db_config.schema, &config, &contestants, &request).await?;

    let file = File::create(output)
        .context(format!("Failed to create output file: {}", output.display()))?;
    serde_json::to_writer(BufWriter::new(file), &collection)
        .context("Failed to write FeatureCollection")?;

    report.display();
    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context(format!("Failed to write report: {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }

    info!(output = %output.display(), summary = %report.summary(), "Export complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_args_override_environment() {
        let args = DbArgs {
            host: Some("db.internal".into()),
            port: Some(6543),
            schema: Some("pemilu_2024".into()),
            ..Default::default()
        };
        let config = args.database_config().unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.schema, "pemilu_2024");
    }

    #[test]
    fn test_db_args_reject_bad_schema() {
        let args = DbArgs {
            schema: Some("pemilu;--".into()),
            ..Default::default()
        };
        assert!(args.database_config().is_err());
    }
}
