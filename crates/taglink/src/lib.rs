// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # taglink - reflective type layout and tagged property serialization
//!
//! Types are declared at runtime as ordered property lists, linked into a
//! concrete memory layout, instantiated, and saved as self-describing tagged
//! records that survive schema evolution: added, removed, reordered, renamed
//! and retyped properties all load without a migration step.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taglink::{ArchiveContext, Instance, Property, PropertyKind, Result, TypeRegistry};
//!
//! fn main() -> Result<()> {
//!     let mut registry = TypeRegistry::new();
//!     let point = registry.declare_struct("Point", None)?;
//!     registry.add_property(point, Property::new("X", PropertyKind::Int))?;
//!     registry.add_property(point, Property::new("Y", PropertyKind::Int))?;
//!     registry.link_all()?;
//!
//!     let mut p = Instance::new(&registry, point)?;
//!     p.set(&registry, "X", 3)?;
//!
//!     let ctx = ArchiveContext::new();
//!     let bytes = taglink::save_tagged(&registry, &p, &ctx)?;
//!     let mut loaded = Instance::new(&registry, point)?;
//!     let report = taglink::load_tagged(&registry, &mut loaded, &bytes, &ctx)?;
//!     assert!(report.is_clean());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                 Schema (YAML / binary decls) | Config               |
//! +---------------------------------------------------------------------+
//! |   TypeRegistry: composite types, enums, redirects, default objects  |
//! |   HierarchyIndex: O(1) subtype queries                              |
//! +---------------------------------------------------------------------+
//! |   Linker: offsets, size, alignment, chains | StructOpsRegistry      |
//! +---------------------------------------------------------------------+
//! |   Instance: bytes + heap, init / copy / compare / destroy           |
//! +---------------------------------------------------------------------+
//! |   Tagged records | Binary form | Text form | Archive cursors        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`types`] - registry and composite type descriptors (start here)
//! - [`link`] - layout computation and chain building
//! - [`ops`] - native struct behavior bundles
//! - [`instance`] - live values and generic struct operations
//! - [`tagged`] - tagged property protocol and package files
//! - [`hierarchy`] - subtype index
//! - [`introspect`] - layout tables for tooling

pub mod archive;
pub mod binary;
#[cfg(feature = "config-loaders")]
pub mod config;
pub mod error;
pub mod field;
pub mod guid;
pub mod hierarchy;
pub mod instance;
pub mod introspect;
pub mod link;
pub mod name;
pub mod ops;
pub mod property;
pub mod redirect;
pub mod schema;
pub mod tagged;
mod text;
pub mod types;

pub use archive::{ArchiveContext, ArchiveReader, ArchiveWriter, FormatVersion, PortFlags};
pub use binary::{deserialize_bin, serialize_bin};
#[cfg(feature = "config-loaders")]
pub use config::TaglinkConfig;
pub use error::{ArchiveError, ArchiveResult, Error, LinkError, Result};
pub use field::{EnumDef, Field};
pub use guid::Guid;
pub use hierarchy::HierarchyIndex;
pub use instance::{FromValue, Instance, ObjectRef, Value};
pub use introspect::{describe, properties_same, same_layout, PropertyInfo};
pub use link::{LinkOutcome, MAX_RELINK_ITERATIONS};
pub use name::Name;
pub use ops::{StructOps, StructOpsRegistry};
pub use property::{ClassFlags, Property, PropertyFlags, PropertyKind, StructFlags, WireType};
pub use redirect::RedirectTable;
pub use schema::{PropertyDecl, TypeDecl};
pub use tagged::{
    is_package, load_tagged, load_tagged_from, read_package, save_tagged, save_tagged_into, write_package,
    DiagnosticKind, LoadDiagnostic, LoadReport, PropertyTag, PACKAGE_MAGIC,
};
pub use types::{CompositeKind, CompositeType, PropRef, TypeId, TypeRegistry};
