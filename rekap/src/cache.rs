//! Cache des métadonnées kontestan (paslon, partai)
//!
//! Une liste par type de scrutin. Le chargement est délégué à l'appelant et
//! le rafraîchissement est explicite (après une écriture d'administration).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::{ContestKind, Contestant};

#[derive(Debug, Default)]
pub struct ContestantCache {
    entries: RwLock<HashMap<ContestKind, Arc<[Contestant]>>>,
}

impl ContestantCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liste en cache, sans chargement
    pub fn get(&self, kind: ContestKind) -> Option<Arc<[Contestant]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// Remplace la liste d'un scrutin, triée par numéro de bulletin
    pub fn put(&self, kind: ContestKind, mut contestants: Vec<Contestant>) -> Arc<[Contestant]> {
        contestants.sort_by_key(|c| (c.ballot_number, c.id));
        let shared: Arc<[Contestant]> = contestants.into();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, Arc::clone(&shared));
        shared
    }

    pub fn invalidate(&self, kind: ContestKind) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
    }
}
