//! État partagé des handlers

use std::sync::Arc;

use deadpool_postgres::Pool;

use crate::config::Config;
use crate::directory::ContestantDirectory;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: Pool,
    /// Schéma PostgreSQL, validé au démarrage
    pub schema: String,
    pub config: Config,
    pub contestants: ContestantDirectory,
}

impl AppState {
    pub fn new(pool: Pool, schema: impl Into<String>, config: Config) -> SharedState {
        let schema = schema.into();
        Arc::new(Self {
            contestants: ContestantDirectory::new(pool.clone(), schema.clone()),
            pool,
            schema,
            config,
        })
    }
}
