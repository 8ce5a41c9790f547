//! Return-code maps
//!
//! `type -> codes` says which codes an input of that type makes possible;
//! `code -> types` says which input types can justify a code.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::graph::HandleHierarchy;

pub type CodeSets = BTreeMap<String, BTreeSet<String>>;

/// Add every `(key, values)` pair of `from` into `into`
pub fn merge_into<I, S>(into: &mut CodeSets, from: I)
where
    I: IntoIterator<Item = (String, S)>,
    S: IntoIterator<Item = String>,
{
    for (key, values) in from {
        into.entry(key).or_default().extend(values);
    }
}

/// Seed codes plus, for every handle, the union of its ancestors' codes
pub fn compute_type_to_codes(handles: &mut HandleHierarchy, seed: &CodeSets) -> Result<CodeSets> {
    let mut out = seed.clone();
    for (handle, ancestors) in handles.all_ancestors()? {
        let inherited: BTreeSet<String> = ancestors
            .iter()
            .filter_map(|ancestor| seed.get(ancestor))
            .flatten()
            .cloned()
            .collect();
        if !inherited.is_empty() {
            out.entry(handle).or_default().extend(inherited);
        }
    }
    Ok(out)
}

/// Invert `seed`; a descendant handle of a justifying type also justifies
pub fn compute_codes_requiring_type(handles: &mut HandleHierarchy, seed: &CodeSets) -> Result<CodeSets> {
    let mut out = CodeSets::new();
    for (ty, codes) in seed {
        let descendants = handles.descendants_of(ty)?;
        for code in codes {
            let types = out.entry(code.clone()).or_default();
            types.insert(ty.clone());
            types.extend(descendants.iter().cloned());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> HandleHierarchy {
        HandleHierarchy::from_parents(vec![
            ("Root".to_string(), vec![]),
            ("Mid".to_string(), vec!["Root".to_string()]),
            ("Leaf".to_string(), vec!["Mid".to_string()]),
        ])
    }

    fn seed(pairs: &[(&str, &[&str])]) -> CodeSets {
        let mut sets = CodeSets::new();
        merge_into(
            &mut sets,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|c| c.to_string()).collect::<Vec<_>>())),
        );
        sets
    }

    #[test]
    fn test_codes_propagate_to_every_descendant() {
        let mut handles = chain();
        let out = compute_type_to_codes(&mut handles, &seed(&[("Root", &["X"])])).unwrap();
        for handle in ["Root", "Mid", "Leaf"] {
            assert!(out[handle].contains("X"), "{} should imply X", handle);
        }
    }

    #[test]
    fn test_propagation_is_a_union() {
        let mut handles = chain();
        let out = compute_type_to_codes(&mut handles, &seed(&[("Root", &["X"]), ("Mid", &["Y"])])).unwrap();
        assert_eq!(out["Leaf"], ["X", "Y"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>());
        assert_eq!(out["Mid"], ["X", "Y"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_descendants_justify_codes() {
        let mut handles = chain();
        let out = compute_codes_requiring_type(&mut handles, &seed(&[("Mid", &["Y"])])).unwrap();
        assert_eq!(out["Y"], ["Leaf", "Mid"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>());
    }
}
