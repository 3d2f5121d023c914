//! Annuaire des kontestan adossé à PostgreSQL

use std::sync::Arc;

use anyhow::Result;
use deadpool_postgres::Pool;
use tracing::debug;

use rekap::{ContestKind, Contestant, ContestantCache};

use crate::store::postgres::load_contestants;

/// Paslon et partai en cache, chargés à la première demande
pub struct ContestantDirectory {
    pool: Pool,
    schema: String,
    cache: ContestantCache,
}

impl ContestantDirectory {
    pub fn new(pool: Pool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            cache: ContestantCache::new(),
        }
    }

    /// Liste du scrutin, chargée depuis la base en cas d'absence
    pub async fn get(&self, kind: ContestKind) -> Result<Arc<[Contestant]>> {
        if let Some(hit) = self.cache.get(kind) {
            return Ok(hit);
        }
        self.refresh(kind).await
    }

    /// Recharge la liste depuis la base
    pub async fn refresh(&self, kind: ContestKind) -> Result<Arc<[Contestant]>> {
        let contestants = load_contestants(&self.pool, &self.schema, kind).await?;
        debug!(kind = %kind, count = contestants.len(), "Contestants loaded");
        Ok(self.cache.put(kind, contestants))
    }

    /// Oublie la liste en cache; le prochain `get` la recharge
    pub fn invalidate(&self, kind: ContestKind) {
        self.cache.invalidate(kind);
    }
}
