// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rename tables consulted while loading old data.

use std::collections::HashMap;

/// Property renames scoped by owning type, plus struct type renames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectTable {
    properties: HashMap<String, HashMap<String, String>>,
    structs: HashMap<String, String>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `old_name` on `type_name` (or any type deriving from it) is now `new_name`.
    pub fn add_property(&mut self, type_name: &str, old_name: &str, new_name: &str) {
        self.properties
            .entry(type_name.to_string())
            .or_default()
            .insert(old_name.to_string(), new_name.to_string());
    }

    pub fn add_struct(&mut self, old_name: &str, new_name: &str) {
        self.structs
            .insert(old_name.to_string(), new_name.to_string());
    }

    /// Look `old_name` up on each owner name, most-derived first.
    pub fn resolve_property<'a, I>(&self, owners: I, old_name: &str) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        owners.into_iter().find_map(|owner| {
            self.properties
                .get(owner)
                .and_then(|renames| renames.get(old_name))
                .map(String::as_str)
        })
    }

    /// Current name of a struct type saved as `old_name`, following chained renames.
    pub fn resolve_struct<'a>(&'a self, old_name: &'a str) -> &'a str {
        let mut current = old_name;
        // Bounded walk so a rename cycle cannot hang the loader.
        for _ in 0..=self.structs.len() {
            match self.structs.get(current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    pub fn has_struct_redirect(&self, old_name: &str) -> bool {
        self.structs.contains_key(old_name)
    }

    pub fn property_redirect_count(&self) -> usize {
        self.properties.values().map(HashMap::len).sum()
    }

    pub fn struct_redirect_count(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.structs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_derived_owner_wins() {
        let mut table = RedirectTable::new();
        table.add_property("Pawn", "Health", "HitPoints");
        table.add_property("Character", "Health", "Vitality");

        assert_eq!(
            table.resolve_property(["Character", "Pawn"], "Health"),
            Some("Vitality")
        );
        assert_eq!(table.resolve_property(["Hero", "Pawn"], "Health"), Some("HitPoints"));
        assert_eq!(table.resolve_property(["Pawn"], "Armor"), None);
        assert_eq!(table.property_redirect_count(), 2);
    }

    #[test]
    fn test_struct_redirect_chain_and_cycle() {
        let mut table = RedirectTable::new();
        table.add_struct("OldVector", "Vector3");
        table.add_struct("Vector3", "Vector");
        assert_eq!(table.resolve_struct("OldVector"), "Vector");
        assert_eq!(table.resolve_struct("Rotator"), "Rotator");

        table.add_struct("A", "B");
        table.add_struct("B", "A");
        let resolved = table.resolve_struct("A");
        assert!(resolved == "A" || resolved == "B");
    }
}
