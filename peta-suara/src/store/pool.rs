//! Pool de connexions PostgreSQL

use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{
    Config, Pool, PoolConfig, PoolError, Runtime, SslMode as PgSslMode, Timeouts,
};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::config::validate_schema_name;

/// Schéma PostgreSQL par défaut
pub const DEFAULT_SCHEMA: &str = "pemilu";

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Pas de SSL (défaut)
    #[default]
    Disable,
    /// SSL préféré mais non requis
    Prefer,
    /// SSL requis
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

/// Configuration de la base de données
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// Schéma contenant les tables pemilu
    pub schema: String,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "pemilu".into(),
            user: "postgres".into(),
            password: None,
            schema: DEFAULT_SCHEMA.into(),
            pool_size: 16,
            ssl_mode: SslMode::Disable,
        }
    }
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("PGHOST").unwrap_or(defaults.host),
            port: std::env::var("PGPORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("PGDATABASE").unwrap_or(defaults.dbname),
            user: std::env::var("PGUSER").unwrap_or(defaults.user),
            password: std::env::var("PGPASSWORD").ok(),
            schema: std::env::var("PGSCHEMA").unwrap_or(defaults.schema),
            pool_size: std::env::var("POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            ssl_mode: std::env::var("PGSSLMODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Applique les options passées en ligne de commande
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        database: Option<String>,
        user: Option<String>,
        password: Option<String>,
        schema: Option<String>,
        ssl: Option<String>,
    ) -> Result<Self> {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(database) = database {
            self.dbname = database;
        }
        if let Some(user) = user {
            self.user = user;
        }
        if let Some(password) = password {
            self.password = Some(password);
        }
        if let Some(schema) = schema {
            self.schema = schema;
        }
        if let Some(ssl) = ssl {
            self.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
        }
        validate_schema_name(&self.schema)?;
        Ok(self)
    }
}

/// Crée la configuration TLS pour rustls
fn make_tls_connector() -> MakeRustlsConnect {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

/// Configuration deadpool, `sslmode` compris
fn pool_config(config: &DatabaseConfig) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();

    cfg.pool = Some(PoolConfig {
        max_size: config.pool_size,
        timeouts: Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(30)),
        },
        ..Default::default()
    });

    // Sans sslmode explicite, tokio-postgres reste en Prefer
    cfg.ssl_mode = Some(match config.ssl_mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
    });
    cfg
}

/// Crée un pool de connexions
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = pool_config(config);

    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create database pool"),
        SslMode::Prefer | SslMode::Require => cfg
            .create_pool(Some(Runtime::Tokio1), make_tls_connector())
            .context("Failed to create database pool with TLS"),
    }
}

/// Teste la connexion à la base
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(())
}

/// Vrai si l'erreur vient de l'impossibilité d'obtenir une connexion
pub fn is_unavailable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<PoolError>().is_some())
}
