// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML schema loader.
//!
//! # Example YAML
//!
//! ```yaml
//! enums:
//!   EColor: [Red, Green, Blue]
//!   EPriority:
//!     - { name: Low, value: 10 }
//!     - { name: High, value: 20 }
//!
//! types:
//!   - name: Vector
//!     kind: struct
//!     flags: [atomic]
//!     guid: auto
//!     properties:
//!       - { name: X, type: float }
//!       - { name: Y, type: float }
//!   - name: Actor
//!     kind: class
//!     class_flags: [not_placeable]
//!     properties:
//!       - { name: Location, type: Struct<Vector>, flags: [edit, save_game] }
//!       - { name: Tags, type: Array<name> }
//!       - { name: Slots, type: int, array_dim: 4 }
//! ```
//!
//! Types may appear in any order; parents are declared before children.

use super::{PropertyDecl, TypeDecl};
use crate::error::{Error, Result};
use crate::field::EnumDef;
use crate::guid::Guid;
use crate::property::{ClassFlags, PropertyFlags, PropertyKind, StructFlags};
use crate::types::{TypeId, TypeRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Root YAML document structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlSchemaDocument {
    /// Global enums
    pub enums: BTreeMap<String, YamlEnum>,
    pub types: Vec<YamlType>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum YamlEnum {
    /// Entries numbered from 0
    Sequential(Vec<String>),
    Valued(Vec<YamlEnumEntry>),
}

#[derive(Debug, Deserialize)]
pub struct YamlEnumEntry {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct YamlType {
    pub name: String,
    /// `struct` or `class`
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Declared struct flags
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub class_flags: Vec<String>,
    /// Braced GUID text, or `auto` for one derived from the type name
    #[serde(default)]
    pub guid: Option<String>,
    /// Enums scoped to this type
    #[serde(default)]
    pub enums: BTreeMap<String, YamlEnum>,
    #[serde(default)]
    pub properties: Vec<YamlProperty>,
}

fn default_kind() -> String {
    "struct".to_string()
}

#[derive(Debug, Deserialize)]
pub struct YamlProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default = "default_array_dim")]
    pub array_dim: usize,
}

fn default_array_dim() -> usize {
    1
}

/// Enums and type declarations of one schema file.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub enums: Vec<EnumDef>,
    pub types: Vec<TypeDecl>,
}

impl Schema {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let doc: YamlSchemaDocument =
            serde_yaml::from_str(text).map_err(|e| Error::Config(format!("schema YAML: {}", e)))?;
        Self::from_document(doc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        log::debug!("[schema] loading {}", path.display());
        Self::from_yaml_str(&text)
    }

    fn from_document(doc: YamlSchemaDocument) -> Result<Self> {
        let enums = doc
            .enums
            .into_iter()
            .map(|(name, def)| convert_enum(name, def))
            .collect();
        let types = doc.types.into_iter().map(convert_type).collect::<Result<Vec<_>>>()?;
        Ok(Self { enums, types })
    }

    /// Declare every enum and type. Types are declared once their parent is.
    pub fn declare(&self, registry: &mut TypeRegistry) -> Result<Vec<TypeId>> {
        for def in &self.enums {
            registry.add_enum(None, def.clone())?;
        }
        let mut pending: Vec<&TypeDecl> = self.types.iter().collect();
        let mut ids = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for decl in pending {
                let parent_ready = decl.parent.as_deref().map_or(true, |p| registry.find(p).is_some());
                if parent_ready {
                    ids.push(decl.declare(registry)?);
                } else {
                    waiting.push(decl);
                }
            }
            if waiting.len() == before {
                let names: Vec<_> = waiting.iter().map(|d| d.name.as_str()).collect();
                return Err(Error::Declaration(format!(
                    "unresolved parents for {}",
                    names.join(", ")
                )));
            }
            pending = waiting;
        }
        Ok(ids)
    }
}

fn convert_enum(name: String, def: YamlEnum) -> EnumDef {
    match def {
        YamlEnum::Sequential(entries) => EnumDef::sequential(name, &entries),
        YamlEnum::Valued(entries) => EnumDef::new(name, entries.into_iter().map(|e| (e.name, e.value)).collect()),
    }
}

fn convert_type(ty: YamlType) -> Result<TypeDecl> {
    let is_class = match ty.kind.as_str() {
        "struct" => false,
        "class" => true,
        other => return Err(Error::Config(format!("type '{}': unknown kind '{}'", ty.name, other))),
    };
    let mut decl = TypeDecl::new(ty.name.clone(), is_class, ty.parent.as_deref());
    for flag in &ty.flags {
        let parsed = StructFlags::from_name(flag)
            .ok_or_else(|| Error::Config(format!("type '{}': unknown struct flag '{}'", ty.name, flag)))?;
        decl.struct_flags.insert(parsed);
    }
    for flag in &ty.class_flags {
        let parsed = ClassFlags::from_name(flag)
            .ok_or_else(|| Error::Config(format!("type '{}': unknown class flag '{}'", ty.name, flag)))?;
        decl.class_flags.insert(parsed);
    }
    decl.guid = match ty.guid.as_deref() {
        None => Guid::default(),
        Some("auto") => Guid::from_name(&ty.name),
        Some(text) => Guid::parse(text)
            .ok_or_else(|| Error::Config(format!("type '{}': invalid guid '{}'", ty.name, text)))?,
    };
    decl.enums = ty
        .enums
        .into_iter()
        .map(|(name, def)| convert_enum(name, def))
        .collect();
    for property in ty.properties {
        let kind = PropertyKind::parse(&property.kind).ok_or_else(|| {
            Error::Config(format!(
                "'{}.{}': unknown type '{}'",
                ty.name, property.name, property.kind
            ))
        })?;
        let mut flags = PropertyFlags::empty();
        for flag in &property.flags {
            let parsed = PropertyFlags::from_name(flag).ok_or_else(|| {
                Error::Config(format!("'{}.{}': unknown flag '{}'", ty.name, property.name, flag))
            })?;
            flags.insert(parsed);
        }
        if property.array_dim == 0 {
            return Err(Error::Config(format!("'{}.{}': array_dim must be at least 1", ty.name, property.name)));
        }
        decl.properties.push(PropertyDecl {
            name: property.name,
            kind,
            flags,
            array_dim: property.array_dim,
        });
    }
    Ok(decl)
}
