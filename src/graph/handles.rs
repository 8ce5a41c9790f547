//! Handle hierarchy
//!
//! Ancestors come from the comma-separated `parent` attribute of each
//! handle type and are computed lazily. Descendants are the inversion of
//! the complete ancestor map, built once on first use.

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use super::memo::{Lookup, MemoTable};
use crate::error::{RegistryError, Result};
use crate::registry::Registry;

pub type HandleSet = BTreeSet<String>;

#[derive(Debug, Clone, Default)]
pub struct HandleHierarchy {
    /// Handle -> immediate parents
    parents: BTreeMap<String, Vec<String>>,
    ancestors: MemoTable<String, HandleSet>,
    descendants: Option<BTreeMap<String, HandleSet>>,
}

impl HandleHierarchy {
    /// Index every handle type of the registry, preferring `api`'s definitions
    pub fn new(registry: &Registry<'_>, api: Option<&str>) -> Self {
        Self::from_parents(registry.handles(api).map(|ty| {
            (ty.name.clone(), ty.parents().map(String::from).collect::<Vec<_>>())
        }))
    }

    /// Build from `(handle, immediate parents)` pairs
    pub fn from_parents<I, P>(handles: I) -> Self
    where
        I: IntoIterator<Item = (String, P)>,
        P: IntoIterator<Item = String>,
    {
        Self {
            parents: handles
                .into_iter()
                .map(|(name, parents)| (name, parents.into_iter().collect()))
                .collect(),
            ancestors: MemoTable::new(),
            descendants: None,
        }
    }

    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    pub fn is_handle(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    pub fn parents_of(&self, handle: &str) -> &[String] {
        self.parents.get(handle).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every transitive parent of `handle`
    pub fn ancestors_of(&mut self, handle: &str) -> Result<HandleSet> {
        let mut chain = Vec::new();
        self.compute_ancestors(handle, &mut chain)
    }

    fn compute_ancestors(&mut self, handle: &str, chain: &mut Vec<String>) -> Result<HandleSet> {
        let key = handle.to_string();
        match self.ancestors.begin(&key) {
            Lookup::Cached(ancestors) => return Ok(ancestors),
            Lookup::Cyclic => {
                let start = chain.iter().position(|h| h == handle).unwrap_or(0);
                let mut cycle = chain[start..].to_vec();
                cycle.push(key.clone());
                return Err(RegistryError::HandleCycle {
                    handle: key,
                    chain: cycle,
                });
            }
            Lookup::Compute => {}
        }

        if !self.parents.contains_key(handle) && !chain.is_empty() {
            warn!(handle, "parent is not a known handle, treating it as a root");
        }

        chain.push(key.clone());
        let mut ancestors = HandleSet::new();
        for parent in self.parents_of(handle).to_vec() {
            match self.compute_ancestors(&parent, chain) {
                Ok(grand) => {
                    ancestors.extend(grand);
                    ancestors.insert(parent);
                }
                Err(e) => {
                    self.ancestors.abandon(&key);
                    return Err(e);
                }
            }
        }
        chain.pop();

        self.ancestors.finish(key, ancestors.clone());
        Ok(ancestors)
    }

    /// Ancestor sets of every handle
    pub fn all_ancestors(&mut self) -> Result<BTreeMap<String, HandleSet>> {
        let handles: Vec<String> = self.parents.keys().cloned().collect();
        handles
            .into_iter()
            .map(|h| {
                let ancestors = self.ancestors_of(&h)?;
                Ok((h, ancestors))
            })
            .collect()
    }

    /// Every handle that has `handle` among its ancestors
    pub fn descendants_of(&mut self, handle: &str) -> Result<HandleSet> {
        Ok(self.descendants()?.get(handle).cloned().unwrap_or_default())
    }

    /// The full descendant map, inverted from the ancestor map on first use
    pub fn descendants(&mut self) -> Result<&BTreeMap<String, HandleSet>> {
        if self.descendants.is_none() {
            let ancestors = self.all_ancestors()?;
            let mut inverted: BTreeMap<String, HandleSet> =
                ancestors.keys().map(|h| (h.clone(), HandleSet::new())).collect();
            for (handle, ancestor_set) in &ancestors {
                for ancestor in ancestor_set {
                    inverted.entry(ancestor.clone()).or_default().insert(handle.clone());
                }
            }
            self.descendants = Some(inverted);
        }
        Ok(self.descendants.get_or_insert_with(BTreeMap::new))
    }
}
