// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Property values file for `encode`.
//!
//! A YAML mapping from property name to its text form. A sequence sets the
//! elements of a static array by index.
//!
//! ```yaml
//! Health: 75
//! Label: scout
//! Tint: Green
//! Path: "((X=1.5,Y=2.5),(X=3))"
//! Slots: [1, 2, 3]
//! ```

use anyhow::{bail, Context};
use serde_yaml::Value as Yaml;
use std::path::Path;
use taglink::{Instance, TypeRegistry};

/// `(property, element index, text)` assignments in file order.
pub fn load(path: &Path) -> anyhow::Result<Vec<(String, usize, String)>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse(&text)
}

pub fn parse(text: &str) -> anyhow::Result<Vec<(String, usize, String)>> {
    let doc: Yaml = serde_yaml::from_str(text)?;
    let Yaml::Mapping(map) = doc else {
        bail!("values file must be a mapping of property names");
    };
    let mut out = Vec::with_capacity(map.len());
    for (key, value) in map {
        let Some(name) = key.as_str() else {
            bail!("property names must be strings, got {:?}", key);
        };
        match value {
            Yaml::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    out.push((name.to_string(), index, scalar_text(name, item)?));
                }
            }
            other => out.push((name.to_string(), 0, scalar_text(name, &other)?)),
        }
    }
    Ok(out)
}

fn scalar_text(name: &str, value: &Yaml) -> anyhow::Result<String> {
    Ok(match value {
        Yaml::Bool(true) => "True".to_string(),
        Yaml::Bool(false) => "False".to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::String(s) => s.clone(),
        Yaml::Null => "None".to_string(),
        other => bail!("'{}': expected a scalar, got {:?}", name, other),
    })
}

pub fn apply(registry: &TypeRegistry, instance: &mut Instance, values: &[(String, usize, String)]) -> anyhow::Result<()> {
    for (name, index, text) in values {
        instance
            .import_property(registry, name, *index, text)
            .with_context(|| format!("setting {}[{}] from '{}'", name, index, text))?;
    }
    Ok(())
}
