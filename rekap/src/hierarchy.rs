//! Index en mémoire de la hiérarchie administrative
//!
//! Construit une fois par requête à partir des lignes `wilayah` chargées en
//! lot, puis interrogé en O(1) (parent, ancêtre à un niveau donné, enfants).

use std::collections::HashMap;

use crate::error::{RekapError, Result};
use crate::types::{Region, RegionId, RegionLevel};

/// Arbre provinsi → kabupaten → kecamatan → desa
#[derive(Debug, Default, Clone)]
pub struct RegionIndex {
    regions: HashMap<RegionId, Region>,
    children: HashMap<RegionId, Vec<RegionId>>,
}

impl RegionIndex {
    /// Construit l'index en vérifiant les invariants de l'arbre.
    ///
    /// # Errors
    ///
    /// `RekapError::Hierarchy` si un identifiant est dupliqué, si un parent
    /// est absent, ou si le niveau d'une région n'est pas exactement celui
    /// situé sous le niveau de son parent.
    pub fn build(regions: impl IntoIterator<Item = Region>) -> Result<Self> {
        let mut by_id: HashMap<RegionId, Region> = HashMap::new();
        for region in regions {
            let id = region.id;
            if by_id.insert(id, region).is_some() {
                return Err(RekapError::hierarchy(id, "duplicate region id"));
            }
        }

        let mut children: HashMap<RegionId, Vec<RegionId>> = HashMap::new();
        for region in by_id.values() {
            match (region.level.parent(), region.parent_id) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(RekapError::hierarchy(
                        region.id,
                        "provinsi cannot have a parent",
                    ));
                }
                (Some(expected), None) => {
                    return Err(RekapError::hierarchy(
                        region.id,
                        format!("{} requires a {} parent", region.level, expected),
                    ));
                }
                (Some(expected), Some(parent_id)) => {
                    let parent = by_id.get(&parent_id).ok_or_else(|| {
                        RekapError::hierarchy(region.id, format!("missing parent {}", parent_id))
                    })?;
                    if parent.level != expected {
                        return Err(RekapError::hierarchy(
                            region.id,
                            format!(
                                "{} cannot sit under {} {}",
                                region.level, parent.level, parent_id
                            ),
                        ));
                    }
                    children.entry(parent_id).or_default().push(region.id);
                }
            }
        }

        // Enfants triés par nom pour un ordre de sortie stable
        for ids in children.values_mut() {
            ids.sort_by(|a, b| by_id[a].name.cmp(&by_id[b].name).then(a.cmp(b)));
        }

        Ok(Self {
            regions: by_id,
            children,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.regions.contains_key(&id)
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn name(&self, id: RegionId) -> Option<&str> {
        self.regions.get(&id).map(|r| r.name.as_str())
    }

    pub fn parent(&self, id: RegionId) -> Option<&Region> {
        self.regions
            .get(&id)
            .and_then(|r| r.parent_id)
            .and_then(|p| self.regions.get(&p))
    }

    /// Enfants directs, triés par nom
    pub fn children(&self, id: RegionId) -> &[RegionId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancêtre (ou la région elle-même) situé au niveau demandé.
    ///
    /// `None` si la région est inconnue ou plus haute que `level`.
    pub fn ancestor_at(&self, id: RegionId, level: RegionLevel) -> Option<RegionId> {
        let mut current = self.regions.get(&id)?;
        if current.level < level {
            return None;
        }
        while current.level > level {
            current = self.regions.get(&current.parent_id?)?;
        }
        Some(current.id)
    }

    /// Région elle-même et tous ses descendants (parcours en profondeur)
    pub fn subtree(&self, id: RegionId) -> Vec<RegionId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Régions d'un niveau, triées par nom
    pub fn at_level(&self, level: RegionLevel) -> Vec<&Region> {
        let mut regions: Vec<&Region> = self
            .regions
            .values()
            .filter(|r| r.level == level)
            .collect();
        regions.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        regions
    }

    /// Régions cibles d'une carte: niveau `level`, éventuellement limitées aux
    /// enfants de `scope`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` si `scope` est inconnu ou n'est pas au niveau parent.
    pub fn targets(&self, level: RegionLevel, scope: Option<RegionId>) -> Result<Vec<&Region>> {
        let Some(scope_id) = scope else {
            return Ok(self.at_level(level));
        };

        let scope_region = self.get(scope_id).ok_or_else(|| {
            RekapError::invalid_argument(format!("Unknown scope region: {}", scope_id))
        })?;

        if Some(scope_region.level) != level.parent() {
            return Err(RekapError::invalid_argument(format!(
                "Scope {} is a {}, expected a {} for level {}",
                scope_id,
                scope_region.level,
                level
                    .parent()
                    .map(RegionLevel::as_str)
                    .unwrap_or("(none)"),
                level
            )));
        }

        Ok(self
            .children(scope_id)
            .iter()
            .filter_map(|id| self.regions.get(id))
            .collect())
    }

    /// Itère sur toutes les régions (ordre quelconque)
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }
}
