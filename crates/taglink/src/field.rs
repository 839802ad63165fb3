// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field descriptors: the members a composite type owns, in declaration order.

use crate::property::{Property, PropertyFlags};

/// A declared member of a composite type.
#[derive(Debug, Clone)]
pub enum Field {
    Property(Property),
    /// Enum scoped to its owning type
    Enum(EnumDef),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Property(property) => property.name(),
            Field::Enum(def) => def.name(),
        }
    }

    pub fn flags(&self) -> PropertyFlags {
        match self {
            Field::Property(property) => property.flags(),
            Field::Enum(_) => PropertyFlags::empty(),
        }
    }

    pub fn as_property(&self) -> Option<&Property> {
        match self {
            Field::Property(property) => Some(property),
            Field::Enum(_) => None,
        }
    }

    pub fn as_property_mut(&mut self) -> Option<&mut Property> {
        match self {
            Field::Property(property) => Some(property),
            Field::Enum(_) => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDef> {
        match self {
            Field::Enum(def) => Some(def),
            Field::Property(_) => None,
        }
    }
}

/// Named integer values backing enum-typed byte properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    name: String,
    entries: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, entries: Vec<(String, i64)>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Entries numbered 0, 1, 2, ... in order.
    pub fn sequential<S: AsRef<str>>(name: impl Into<String>, names: &[S]) -> Self {
        let entries = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_ref().to_string(), i as i64))
            .collect();
        Self::new(name, entries)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }

    pub fn value_by_name(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| *value)
    }

    pub fn name_by_value(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(entry, _)| entry.as_str())
    }

    pub fn is_valid_value(&self, value: i64) -> bool {
        self.entries.iter().any(|(_, v)| *v == value)
    }

    /// Largest declared value, the fallback for names that no longer exist.
    pub fn max_value(&self) -> i64 {
        self.entries.iter().map(|(_, v)| *v).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_lookups() {
        let def = EnumDef::sequential("EColor", &["Red", "Green", "Blue", "EColor_MAX"]);
        assert_eq!(def.value_by_name("Blue"), Some(2));
        assert_eq!(def.value_by_name("Purple"), None);
        assert_eq!(def.name_by_value(1), Some("Green"));
        assert!(def.is_valid_value(3));
        assert!(!def.is_valid_value(4));
        assert_eq!(def.max_value(), 3);
    }

    #[test]
    fn test_empty_enum_max_is_zero() {
        let def = EnumDef::new("EEmpty", Vec::new());
        assert_eq!(def.max_value(), 0);
    }
}
