// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Differential construction probe.
//!
//! A native constructor that does not declare zero construction is run twice:
//! once into memory filled with `0x00` and once into memory filled with
//! `0xFF`. A property whose bytes differ between the two results kept the
//! fill pattern, so the constructor never wrote it.
//!
//! Findings are diagnostics only. Nested struct properties are examined
//! recursively so the report names the innermost field; nested types whose
//! own ops declare zero construction are skipped, as they initialize
//! themselves.

use crate::property::{PropertyKind, StructFlags};
use crate::types::{TypeId, TypeRegistry};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Warnings already printed this process.
static REPORTED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// A property the native constructor left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninitializedField {
    /// Struct that declares the property
    pub type_name: String,
    /// Dotted path from the probed type, e.g. `Bounds.Min.X`
    pub path: String,
    /// Offset from the start of the probed type
    pub offset: usize,
    pub size: usize,
}

/// Probe `id` if it owns ops without zero construction.
pub(crate) fn run(registry: &TypeRegistry, id: TypeId) -> Vec<UninitializedField> {
    let Some(ty) = registry.get(id) else {
        return Vec::new();
    };
    let Some(ops) = ty.ops() else {
        return Vec::new();
    };
    if ops.has_zero_constructor() || ty.ops_inherited() {
        return Vec::new();
    }

    let size = ops.size();
    let mut zeroed = vec![0x00u8; size];
    let mut filled = vec![0xFFu8; size];
    ops.construct(&mut zeroed);
    ops.construct(&mut filled);

    let mut findings = Vec::new();
    if zeroed != filled {
        compare(registry, id, &zeroed, &filled, 0, "", &mut findings);
    }
    if ops.has_destructor() {
        ops.destruct(&mut zeroed);
        ops.destruct(&mut filled);
    }

    let reported = REPORTED.get_or_init(|| Mutex::new(HashSet::new()));
    for finding in &findings {
        let key = format!("{}:{}", ty.name(), finding.path);
        if reported.lock().insert(key) {
            log::warn!(
                "[probe] native constructor of '{}' does not initialize '{}' (offset {}, {} bytes)",
                ty.name(),
                finding.path,
                finding.offset,
                finding.size
            );
        }
    }
    findings
}

fn compare(
    registry: &TypeRegistry,
    id: TypeId,
    zeroed: &[u8],
    filled: &[u8],
    base: usize,
    prefix: &str,
    out: &mut Vec<UninitializedField>,
) {
    let Some(ty) = registry.get(id) else {
        return;
    };
    for prop_ref in &ty.chains().general {
        let Some(prop) = registry.property(*prop_ref) else {
            continue;
        };
        let start = base + prop.offset();
        let end = start + prop.size();
        if end > zeroed.len() || zeroed[start..end] == filled[start..end] {
            continue;
        }
        let path = if prefix.is_empty() {
            prop.name().to_string()
        } else {
            format!("{}.{}", prefix, prop.name())
        };

        if let (PropertyKind::Struct { .. }, Some(nested)) = (prop.kind(), prop.struct_id()) {
            let Some(nested_ty) = registry.get(nested) else {
                continue;
            };
            let self_initializing = nested_ty.ops().is_some()
                && nested_ty.struct_flags().contains(StructFlags::ZERO_CONSTRUCTOR);
            if self_initializing {
                continue;
            }
            let before = out.len();
            for index in 0..prop.array_dim() {
                let element_base = start + index * prop.element_size();
                compare(registry, nested, zeroed, filled, element_base, &path, out);
            }
            if out.len() > before {
                continue;
            }
        }

        out.push(UninitializedField {
            type_name: registry
                .get(prop_ref.owner)
                .map(|t| t.name().to_string())
                .unwrap_or_default(),
            path,
            offset: start,
            size: prop.size(),
        });
    }
}
