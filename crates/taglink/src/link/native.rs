// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binding struct-ops bundles to linked struct types and deriving the
//! computed struct flags.

use crate::error::LinkError;
use crate::ops::StructOps;
use crate::property::{PropertyFlags, StructFlags};
use crate::types::{CompositeKind, TypeId, TypeRegistry};
use std::sync::Arc;

/// Clear and re-bind the ops of `id`. Returns whether the bound bundle came
/// from a base struct.
///
/// Non-inherited ops dictate the type's size and alignment; inherited ops can
/// only raise the alignment.
pub(crate) fn prepare_struct_ops(registry: &mut TypeRegistry, id: TypeId) -> Result<bool, LinkError> {
    let ops_registry = Arc::clone(registry.ops_registry());
    let Some(ty) = registry.get_mut(id) else {
        return Ok(false);
    };
    ty.struct_flags.remove(StructFlags::COMPUTED);
    ty.ops = None;
    ty.ops_inherited = false;
    if ty.kind != CompositeKind::Struct {
        return Ok(false);
    }

    let type_name = ty.name.clone();
    let declared_native = ty.struct_flags.contains(StructFlags::NATIVE);
    let parent = ty.parent;

    let (ops, inherited) = match ops_registry.find(&type_name) {
        Some(ops) => (Some(ops), false),
        None if declared_native => {
            return Err(LinkError::MissingNativeOps { type_name });
        }
        None => {
            let base_ops = parent.and_then(|pid| registry.get(pid)).and_then(|p| p.ops.clone());
            let inherited = base_ops.is_some();
            (base_ops, inherited)
        }
    };

    if ops.is_none() {
        // A native ancestor must have handed its ops down.
        for ancestor in registry.ancestry(id).into_iter().skip(1) {
            let Some(base) = registry.get(ancestor) else {
                continue;
            };
            if base.struct_flags.contains(StructFlags::NATIVE) || ops_registry.contains(&base.name) {
                return Err(LinkError::MissingNativeBase {
                    type_name,
                    base: base.name.clone(),
                });
            }
        }
        return Ok(false);
    }

    let Some(ops) = ops else {
        return Ok(false);
    };
    let Some(ty) = registry.get_mut(id) else {
        return Ok(false);
    };

    if inherited {
        ty.min_alignment = ty.min_alignment.max(ops.alignment());
        log::debug!("[ops] '{}' inherits struct ops from its base", type_name);
    } else {
        if ops.size() < ty.properties_size {
            return Err(LinkError::NativeSizeTooSmall {
                type_name,
                native_size: ops.size(),
                properties_size: ty.properties_size,
            });
        }
        ty.properties_size = ops.size();
        ty.min_alignment = ops.alignment();
        let flags = derive_ops_flags(&type_name, &ops);
        ty.struct_flags.insert(flags);
    }
    ty.ops = Some(ops);
    ty.ops_inherited = inherited;
    Ok(inherited)
}

/// One computed flag per capability the bundle declares.
fn derive_ops_flags(type_name: &str, ops: &StructOps) -> StructFlags {
    let mut flags = StructFlags::empty();
    if ops.has_serializer() {
        log::debug!("[ops] '{}' has a custom serializer", type_name);
        flags.insert(StructFlags::SERIALIZE_NATIVE);
    }
    if ops.has_post_serialize() {
        flags.insert(StructFlags::POST_SERIALIZE_NATIVE);
    }
    if ops.has_net_serializer() {
        flags.insert(StructFlags::NET_SERIALIZE_NATIVE);
    }

    if ops.is_plain_old_data() {
        log::debug!("[ops] '{}' is plain old data", type_name);
        flags.insert(StructFlags::IS_PLAIN_OLD_DATA | StructFlags::NO_DESTRUCTOR);
    } else {
        if ops.has_copy() {
            flags.insert(StructFlags::COPY_NATIVE);
        }
        if !ops.has_destructor() {
            flags.insert(StructFlags::NO_DESTRUCTOR);
        }
    }

    if ops.has_zero_constructor() {
        flags.insert(StructFlags::ZERO_CONSTRUCTOR);
    } else if ops.is_plain_old_data() && discover_zero_construction(ops) {
        log::debug!(
            "[ops] '{}' has discovered zero construction ({} bytes)",
            type_name,
            ops.size()
        );
        flags.insert(StructFlags::ZERO_CONSTRUCTOR);
    }

    if ops.has_identical() {
        flags.insert(StructFlags::IDENTICAL_NATIVE);
    }
    if ops.has_referenced_objects() {
        flags.insert(StructFlags::ADD_STRUCT_REFERENCED_OBJECTS);
    }
    if ops.has_export_text() {
        flags.insert(StructFlags::EXPORT_TEXT_ITEM_NATIVE);
    }
    if ops.has_import_text() {
        flags.insert(StructFlags::IMPORT_TEXT_ITEM_NATIVE);
    }
    if ops.has_mismatched_tag() {
        flags.insert(StructFlags::SERIALIZE_FROM_MISMATCHED_TAG);
    }
    flags
}

/// Construct twice into zeroed memory; an all-zero result means the
/// constructor is equivalent to zero-filling.
fn discover_zero_construction(ops: &StructOps) -> bool {
    let mut data = vec![0u8; ops.size()];
    ops.construct(&mut data);
    // Twice, to catch constructors bumping internal counters.
    ops.construct(&mut data);
    data.iter().all(|b| *b == 0)
}

/// Structs without their own ops take zero-construction, no-destructor and
/// plain-old-data from their properties (and their base struct).
pub(crate) fn derive_property_capabilities(registry: &mut TypeRegistry, id: TypeId) {
    let Some(ty) = registry.get(id) else {
        return;
    };
    if ty.kind != CompositeKind::Struct || (ty.ops.is_some() && !ty.ops_inherited) {
        return;
    }

    let mut capabilities = StructFlags::ZERO_CONSTRUCTOR | StructFlags::NO_DESTRUCTOR | StructFlags::IS_PLAIN_OLD_DATA;
    if let Some(parent) = ty.parent.and_then(|pid| registry.get(pid)) {
        capabilities = StructFlags::from_bits(capabilities.bits() & parent.struct_flags.bits());
    }
    for (_, prop) in ty.own_properties() {
        let flags = prop.flags();
        if !flags.contains(PropertyFlags::ZERO_CONSTRUCTOR) {
            capabilities.remove(StructFlags::ZERO_CONSTRUCTOR);
        }
        if !flags.contains(PropertyFlags::NO_DESTRUCTOR) {
            capabilities.remove(StructFlags::NO_DESTRUCTOR);
        }
        if !flags.contains(PropertyFlags::IS_PLAIN_OLD_DATA) {
            capabilities.remove(StructFlags::IS_PLAIN_OLD_DATA);
        }
    }

    let name = ty.name.clone();
    if let Some(ty) = registry.get_mut(id) {
        ty.struct_flags.insert(capabilities);
    }
    log::debug!("[link] '{}' capabilities from properties: {:?}", name, capabilities);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::StructOpsRegistry;
    use crate::property::{Property, PropertyKind};

    fn registry_with(ops: &[(&str, StructOps)]) -> TypeRegistry {
        let table = Arc::new(StructOpsRegistry::new());
        for (name, bundle) in ops {
            table.defer_register(name, bundle.clone());
        }
        TypeRegistry::with_ops(table)
    }

    #[test]
    fn test_native_without_ops_is_fatal() {
        let mut reg = registry_with(&[]);
        let id = reg.declare_struct("Guid", None).expect("declare");
        reg.set_struct_flags(id, StructFlags::NATIVE).expect("flags");
        assert!(matches!(
            reg.link(id, true),
            Err(crate::Error::Link(LinkError::MissingNativeOps { .. }))
        ));
    }

    #[test]
    fn test_ops_dictate_size_and_flags() {
        let ops = StructOps::new(16, 8)
            .plain_old_data()
            .with_identical(|a, b, _| Some(a == b));
        let mut reg = registry_with(&[("Pair", ops)]);
        let id = reg.declare_struct("Pair", None).expect("declare");
        reg.add_property(id, Property::new("A", PropertyKind::Int64)).expect("add");

        let outcome = reg.link(id, true).expect("link");
        assert!(!outcome.ops_inherited);
        let ty = reg.get(id).expect("type");
        assert_eq!(ty.structure_size(), 16);
        let flags = ty.struct_flags();
        assert!(flags.contains(StructFlags::IS_PLAIN_OLD_DATA | StructFlags::NO_DESTRUCTOR));
        assert!(flags.contains(StructFlags::IDENTICAL_NATIVE));
        // No constructor at all: discovered zero construction.
        assert!(flags.contains(StructFlags::ZERO_CONSTRUCTOR));
        assert!(!flags.contains(StructFlags::SERIALIZE_NATIVE));
    }

    #[test]
    fn test_nonzero_constructor_not_discovered() {
        let ops = StructOps::new(4, 4)
            .plain_old_data()
            .with_construct(|data| data[0] = 1);
        let mut reg = registry_with(&[("Counter", ops)]);
        let id = reg.declare_struct("Counter", None).expect("declare");
        reg.link(id, true).expect("link");
        let flags = reg.get(id).expect("type").struct_flags();
        assert!(!flags.contains(StructFlags::ZERO_CONSTRUCTOR));
    }

    #[test]
    fn test_derived_struct_inherits_ops() {
        let ops = StructOps::new(8, 8).zero_constructor().with_destruct(|_| {});
        let mut reg = registry_with(&[("Base", ops)]);
        reg.declare_struct("Base", None).expect("declare");
        let derived = reg.declare_struct("Derived", Some("Base")).expect("declare");
        reg.add_property(derived, Property::new("Extra", PropertyKind::Int)).expect("add");

        let outcome = reg.link(derived, true).expect("link");
        assert!(outcome.ops_inherited);
        let ty = reg.get(derived).expect("type");
        assert_eq!(ty.structure_size(), 16);
        assert!(ty.ops_inherited());
        // Base has a destructor, so the derived struct needs one too.
        assert!(!ty.struct_flags().contains(StructFlags::NO_DESTRUCTOR));
        assert!(ty.struct_flags().contains(StructFlags::ZERO_CONSTRUCTOR));
    }

    #[test]
    fn test_native_base_without_ops_is_fatal_for_derived() {
        let mut reg = registry_with(&[]);
        let base = reg.declare_struct("Base", None).expect("declare");
        let derived = reg.declare_struct("Derived", Some("Base")).expect("declare");
        reg.link(base, true).expect("plain base links");
        reg.set_struct_flags(base, StructFlags::NATIVE).expect("flags");
        // The base now fails first, which aborts the derived link too.
        assert!(reg.link(derived, true).is_err());
    }
}
