// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! archive:
//!   format_version: 3
//!   load_editor_only: false
//!   save_game: false
//!   delta: true
//!
//! tagged_property_redirects:
//!   - { class_name: Actor, old_property_name: Hp, new_property_name: Health }
//!
//! struct_redirects:
//!   - { old_name: Vec3, new_name: Vector }
//!
//! hot_reload: true
//! ```

use crate::archive::{ArchiveContext, FormatVersion};
use crate::error::{Error, Result};
use crate::types::TypeRegistry;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TaglinkConfig {
    pub archive: ArchiveSection,
    pub tagged_property_redirects: Vec<PropertyRedirect>,
    pub struct_redirects: Vec<StructRedirect>,
    /// Retire replaced struct-ops bundles instead of dropping them
    pub hot_reload: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveSection {
    /// Defaults to the latest version
    pub format_version: Option<u32>,
    pub load_editor_only: bool,
    pub save_game: bool,
    pub delta: bool,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            format_version: None,
            load_editor_only: true,
            save_game: false,
            delta: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PropertyRedirect {
    pub class_name: String,
    pub old_property_name: String,
    pub new_property_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StructRedirect {
    pub old_name: String,
    pub new_name: String,
}

impl TaglinkConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: TaglinkConfig =
            serde_yaml::from_str(text).map_err(|e| Error::Config(format!("YAML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        log::debug!("[config] loading {}", path.display());
        Self::from_yaml_str(&text)
    }

    /// Reject entries that cannot do anything useful.
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = self.archive.format_version {
            if FormatVersion(version) > FormatVersion::LATEST {
                return Err(Error::Config(format!(
                    "format_version {} is newer than {}",
                    version,
                    FormatVersion::LATEST.0
                )));
            }
        }
        for r in &self.tagged_property_redirects {
            if r.class_name.is_empty() || r.old_property_name.is_empty() || r.new_property_name.is_empty() {
                return Err(Error::Config(format!("property redirect with empty name: {:?}", r)));
            }
            if r.old_property_name == r.new_property_name {
                return Err(Error::Config(format!(
                    "property redirect '{}.{}' points at itself",
                    r.class_name, r.old_property_name
                )));
            }
        }
        for r in &self.struct_redirects {
            if r.old_name.is_empty() || r.new_name.is_empty() {
                return Err(Error::Config(format!("struct redirect with empty name: {:?}", r)));
            }
            if r.old_name == r.new_name {
                return Err(Error::Config(format!("struct redirect '{}' points at itself", r.old_name)));
            }
        }
        Ok(())
    }

    /// Install the redirect tables and the hot-reload setting.
    pub fn apply(&self, registry: &mut TypeRegistry) -> Result<()> {
        self.validate()?;
        let redirects = registry.redirects_mut();
        for r in &self.tagged_property_redirects {
            redirects.add_property(&r.class_name, &r.old_property_name, &r.new_property_name);
        }
        for r in &self.struct_redirects {
            redirects.add_struct(&r.old_name, &r.new_name);
        }
        registry.ops_registry().set_hot_reload(self.hot_reload);
        log::debug!(
            "[config] applied {} property and {} struct redirects (hot_reload={})",
            self.tagged_property_redirects.len(),
            self.struct_redirects.len(),
            self.hot_reload
        );
        Ok(())
    }

    pub fn archive_context(&self) -> ArchiveContext {
        let mut ctx = ArchiveContext::new().with_delta(self.archive.delta);
        if let Some(version) = self.archive.format_version {
            ctx = ctx.with_version(FormatVersion(version));
        }
        ctx.load_editor_only = self.archive.load_editor_only;
        ctx.save_game = self.archive.save_game;
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = TaglinkConfig::from_yaml_str("{}").expect("parse");
        assert_eq!(config, TaglinkConfig::default());
        let ctx = config.archive_context();
        assert_eq!(ctx.version, FormatVersion::LATEST);
        assert!(ctx.delta);
        assert!(ctx.load_editor_only);
    }

    #[test]
    fn test_sections_are_applied() {
        let yaml = r#"
archive:
  format_version: 1
  load_editor_only: false
  delta: false
tagged_property_redirects:
  - { class_name: Actor, old_property_name: Hp, new_property_name: Health }
struct_redirects:
  - { old_name: Vec3, new_name: Vector }
hot_reload: true
"#;
        let config = TaglinkConfig::from_yaml_str(yaml).expect("parse");
        let ctx = config.archive_context();
        assert_eq!(ctx.version, FormatVersion::CLASS_NOTPLACEABLE_ADDED);
        assert!(!ctx.load_editor_only);
        assert!(!ctx.delta);

        let mut reg = TypeRegistry::new();
        config.apply(&mut reg).expect("apply");
        assert_eq!(reg.redirects().resolve_property(["Actor"], "Hp"), Some("Health"));
        assert_eq!(reg.redirects().resolve_struct("Vec3"), "Vector");
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let self_redirect = "struct_redirects:\n  - { old_name: A, new_name: A }\n";
        assert!(matches!(TaglinkConfig::from_yaml_str(self_redirect), Err(Error::Config(_))));
        let empty = "tagged_property_redirects:\n  - { class_name: '', old_property_name: a, new_property_name: b }\n";
        assert!(matches!(TaglinkConfig::from_yaml_str(empty), Err(Error::Config(_))));
        let future = "archive:\n  format_version: 42\n";
        assert!(matches!(TaglinkConfig::from_yaml_str(future), Err(Error::Config(_))));
        assert!(matches!(TaglinkConfig::from_yaml_str("archive: ["), Err(Error::Config(_))));
    }
}
