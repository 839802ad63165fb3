// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Struct layout linker.
//!
//! `link_type` computes a composite type's property offsets, size and
//! alignment, binds its native ops, and rebuilds the four traversal chains.
//!
//! # Passes
//!
//! Linking a property may resolve a forward dependency (link the struct it
//! embeds, follow a struct rename, run the registry fixup hook). If that
//! changes the property's name or transience the per-type loop restarts from
//! the parent's size. The loop is capped at [`MAX_RELINK_ITERATIONS`].
//!
//! # Failure
//!
//! Every [`LinkError`] is fatal for the type being linked: the type is restored
//! to the state it had before the call. Types linked as dependencies along the
//! way keep their new layout.

pub mod intrinsic;
pub mod native;
#[cfg(feature = "ctor-probe")]
pub mod probe;
pub mod replication;

#[cfg(feature = "ctor-probe")]
pub use probe::UninitializedField;

use crate::error::LinkError;
use crate::property::{ClassFlags, PropertyFlags, PropertyKind, ResolvedStruct};
use crate::types::{Chains, CompositeKind, LinkState, PropRef, TypeId, TypeRegistry};

/// Hard cap on per-type link passes.
pub const MAX_RELINK_ITERATIONS: usize = 64;

/// What a successful link computed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOutcome {
    /// Passes of the per-type property loop (1 when nothing restarted it)
    pub passes: usize,
    pub properties_size: usize,
    pub min_alignment: usize,
    pub ops_inherited: bool,
    /// Fields a native constructor left uninitialized
    #[cfg(feature = "ctor-probe")]
    pub probe: Vec<UninitializedField>,
}

/// Link `id`.
///
/// With `relink_existing` the layout is computed from scratch. Without it,
/// existing offsets are kept and every own property only re-validates its
/// size; a property whose size changed is a [`LinkError::LayoutDrift`] and a
/// parent whose data area changed size is a [`LinkError::BaseDrift`]. A type
/// that has never been linked is always fully linked.
pub fn link_type(
    registry: &mut TypeRegistry,
    id: TypeId,
    relink_existing: bool,
) -> Result<LinkOutcome, LinkError> {
    link_inner(registry, id, relink_existing, None)
}

fn link_inner(
    registry: &mut TypeRegistry,
    id: TypeId,
    relink_existing: bool,
    via: Option<&str>,
) -> Result<LinkOutcome, LinkError> {
    let Some(snapshot) = registry.get(id).cloned() else {
        return Err(LinkError::UnknownType {
            type_name: via.unwrap_or("<root>").to_string(),
            referenced: id.to_string(),
        });
    };

    if snapshot.link_state == LinkState::Linking {
        let err = LinkError::RecursiveLayout {
            type_name: snapshot.name.clone(),
            via: via.unwrap_or(&snapshot.name).to_string(),
        };
        log::error!("[link] {}", err);
        return Err(err);
    }

    let ever_linked = snapshot.link_generation > 0;
    let full = relink_existing || !ever_linked || has_unlinked_property(registry, id);
    if full
        && ever_linked
        && snapshot.kind == CompositeKind::Class
        && snapshot.class_flags.contains(ClassFlags::INTRINSIC)
    {
        let err = LinkError::RelinkIntrinsic {
            type_name: snapshot.name.clone(),
        };
        log::error!("[link] {}", err);
        return Err(err);
    }

    if let Some(ty) = registry.get_mut(id) {
        ty.link_state = LinkState::Linking;
    }

    let result = if full {
        link_full(registry, id)
    } else {
        link_in_place(registry, id)
    };

    match result {
        Ok(outcome) => {
            let old_size = snapshot.structure_size();
            let fingerprint = layout_fingerprint(registry, id);
            let Some(ty) = registry.get_mut(id) else {
                return Ok(outcome);
            };
            ty.link_state = LinkState::Linked;
            ty.link_generation += 1;
            ty.layout_fingerprint = fingerprint;
            let new_size = ty.structure_size();
            log::debug!(
                "[link] '{}' linked: {} bytes, align {}, {} pass(es)",
                ty.name,
                new_size,
                ty.min_alignment,
                outcome.passes
            );
            if ever_linked && old_size != new_size {
                registry.invalidate_dependents(id);
            }
            Ok(outcome)
        }
        Err(err) => {
            log::error!("[link] '{}' failed: {}", snapshot.name, err);
            if let Some(ty) = registry.get_mut(id) {
                *ty = snapshot;
            }
            Err(err)
        }
    }
}

fn has_unlinked_property(registry: &TypeRegistry, id: TypeId) -> bool {
    registry
        .get(id)
        .is_some_and(|ty| ty.own_properties().any(|(_, p)| !p.is_linked()))
}

fn link_full(registry: &mut TypeRegistry, id: TypeId) -> Result<LinkOutcome, LinkError> {
    let (type_name, parent) = match registry.get(id) {
        Some(ty) => (ty.name.clone(), ty.parent),
        None => unreachable_type(id)?,
    };

    let (base_size, base_alignment) = match parent {
        Some(pid) => {
            ensure_linked(registry, pid, &type_name)?;
            match registry.get(pid) {
                Some(p) => (p.properties_size, p.min_alignment),
                None => unreachable_type(pid)?,
            }
        }
        None => (0, 1),
    };

    let field_indices: Vec<usize> = match registry.get(id) {
        Some(ty) => ty.own_properties().map(|(i, _)| i).collect(),
        None => Vec::new(),
    };
    let fixup = registry.link_fixup();

    let mut passes = 0;
    let (properties_size, min_alignment) = loop {
        passes += 1;
        if passes > MAX_RELINK_ITERATIONS {
            return Err(LinkError::RelinkLoopExceeded {
                type_name,
                passes: MAX_RELINK_ITERATIONS,
            });
        }

        let mut cumulative = base_size;
        let mut alignment = base_alignment;
        let mut restart = false;

        for &field in &field_indices {
            let prop_ref = PropRef { owner: id, field };
            let Some(before) = registry.property(prop_ref).map(|p| (p.name().to_string(), p.is_transient())) else {
                continue;
            };

            if let Some(hook) = &fixup {
                if let Some(prop) = registry.property_at_mut(prop_ref) {
                    hook(&type_name, prop);
                }
            }

            let resolved = resolve_struct_dependency(registry, id, &type_name, prop_ref)?;

            let Some(prop) = registry.property_at_mut(prop_ref) else {
                continue;
            };
            let end = prop.link(cumulative, resolved.as_ref());
            let after = (prop.name().to_string(), prop.is_transient());
            if before != after {
                log::debug!(
                    "[link] '{}': property '{}' changed while linking, restarting pass {}",
                    type_name,
                    before.0,
                    passes
                );
                restart = true;
                break;
            }
            cumulative = end;
            alignment = alignment.max(prop.alignment());
        }

        if !restart {
            break (cumulative, alignment);
        }
    };

    if let Some(ty) = registry.get_mut(id) {
        ty.properties_size = properties_size;
        ty.min_alignment = min_alignment;
        ty.base_size = base_size;
    }

    let ops_inherited = native::prepare_struct_ops(registry, id)?;
    native::derive_property_capabilities(registry, id);

    let (final_size, final_alignment, flags) = match registry.get(id) {
        Some(ty) => (ty.properties_size, ty.min_alignment, ty.struct_flags),
        None => unreachable_type(id)?,
    };
    intrinsic::check(&type_name, flags, final_size, final_alignment)?;

    rebuild_chains(registry, id);
    replication::build(registry, id);

    #[cfg(feature = "ctor-probe")]
    let probe = if ops_inherited {
        Vec::new()
    } else {
        probe::run(registry, id)
    };

    Ok(LinkOutcome {
        passes,
        properties_size: final_size,
        min_alignment: final_alignment,
        ops_inherited,
        #[cfg(feature = "ctor-probe")]
        probe,
    })
}

fn link_in_place(registry: &mut TypeRegistry, id: TypeId) -> Result<LinkOutcome, LinkError> {
    let (type_name, parent) = match registry.get(id) {
        Some(ty) => (ty.name.clone(), ty.parent),
        None => unreachable_type(id)?,
    };
    if let Some(pid) = parent {
        ensure_linked(registry, pid, &type_name)?;
        let (Some(ty), Some(p)) = (registry.get(id), registry.get(pid)) else {
            return unreachable_type(pid);
        };
        // Own offsets start at the old parent size.
        if p.properties_size != ty.base_size {
            return Err(LinkError::BaseDrift {
                type_name,
                parent: p.name.clone(),
                old_size: ty.base_size,
                new_size: p.properties_size,
            });
        }
    }

    let field_indices: Vec<usize> = match registry.get(id) {
        Some(ty) => ty.own_properties().map(|(i, _)| i).collect(),
        None => Vec::new(),
    };
    for field in field_indices {
        let prop_ref = PropRef { owner: id, field };
        let resolved = resolve_struct_dependency(registry, id, &type_name, prop_ref)?;
        let Some(prop) = registry.property_at_mut(prop_ref) else {
            continue;
        };
        if let Some(old_size) = prop.link_without_changing_offset(resolved.as_ref()) {
            return Err(LinkError::LayoutDrift {
                type_name,
                property: prop.name().to_string(),
                old_size,
                new_size: prop.element_size(),
            });
        }
    }

    rebuild_chains(registry, id);
    replication::build(registry, id);

    let Some(ty) = registry.get(id) else {
        return unreachable_type(id);
    };
    Ok(LinkOutcome {
        passes: 1,
        properties_size: ty.properties_size,
        min_alignment: ty.min_alignment,
        ops_inherited: ty.ops_inherited,
        #[cfg(feature = "ctor-probe")]
        probe: Vec::new(),
    })
}

/// MD5 over every property's name, kind, offset, element size and dimension,
/// in general-chain order.
fn layout_fingerprint(registry: &TypeRegistry, id: TypeId) -> u64 {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    for prop_ref in registry.all_properties(id) {
        let Some(prop) = registry.property(prop_ref) else {
            continue;
        };
        hasher.update(prop.name().as_bytes());
        hasher.update(format!("{:?}", prop.kind()).as_bytes());
        for value in [prop.offset(), prop.element_size(), prop.array_dim()] {
            hasher.update((value as u64).to_le_bytes());
        }
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Make sure a type `dependent` relies on is linked, linking it now if needed.
fn ensure_linked(registry: &mut TypeRegistry, id: TypeId, dependent: &str) -> Result<(), LinkError> {
    match registry.get(id).map(|ty| ty.link_state) {
        Some(LinkState::Linked) => Ok(()),
        Some(_) => link_inner(registry, id, true, Some(dependent)).map(|_| ()),
        None => Err(LinkError::UnknownType {
            type_name: dependent.to_string(),
            referenced: id.to_string(),
        }),
    }
}

/// Resolve (and link first, if needed) the struct a property embeds.
fn resolve_struct_dependency(
    registry: &mut TypeRegistry,
    id: TypeId,
    type_name: &str,
    prop_ref: PropRef,
) -> Result<Option<ResolvedStruct>, LinkError> {
    let Some(prop) = registry.property(prop_ref) else {
        return Ok(None);
    };
    let Some(saved_name) = prop.kind().struct_name().map(str::to_string) else {
        return Ok(None);
    };
    let is_array = matches!(prop.kind(), PropertyKind::Array { .. });
    let prop_name = prop.name().to_string();

    let current = registry.redirects().resolve_struct(&saved_name).to_string();
    if current != saved_name {
        if let Some(prop) = registry.property_at_mut(prop_ref) {
            log::debug!(
                "[link] '{}.{}': struct '{}' redirected to '{}'",
                type_name,
                prop_name,
                saved_name,
                current
            );
            prop.retarget_struct(&current);
        }
    }

    let target = match registry.find(&current) {
        Some(target) if registry.get(target).is_some_and(|t| t.kind == CompositeKind::Struct) => target,
        _ => {
            return Err(LinkError::UnknownType {
                type_name: type_name.to_string(),
                referenced: current,
            })
        }
    };

    let target_state = registry.get(target).map(|t| t.link_state);
    if target == id || target_state == Some(LinkState::Linking) {
        return Err(if is_array {
            LinkError::RecursiveArrayStruct {
                type_name: type_name.to_string(),
                property: prop_name,
            }
        } else {
            LinkError::RecursiveLayout {
                type_name: type_name.to_string(),
                via: prop_name,
            }
        });
    }
    if target_state != Some(LinkState::Linked) {
        link_inner(registry, target, true, Some(type_name))?;
    }
    Ok(registry.struct_info(target))
}

/// Rebuild the four chains, parent properties first.
pub(crate) fn rebuild_chains(registry: &mut TypeRegistry, id: TypeId) {
    let mut chains = Chains::default();
    for prop_ref in registry.all_properties(id) {
        let (Some(prop), Some(owner)) = (registry.property(prop_ref), registry.get(prop_ref.owner)) else {
            continue;
        };
        chains.general.push(prop_ref);
        if prop.contains_object_reference() || prop.contains_weak_reference() {
            chains.reference.push(prop_ref);
        }
        // Covered by the owning class's native destructor.
        if prop.needs_destructor() && !owner.is_native_class() {
            chains.destructor.push(prop_ref);
        }
        if prop.flags().contains(PropertyFlags::CONFIG) && owner.copies_config_from_default() {
            chains.post_construct.push(prop_ref);
        }
    }
    if let Some(ty) = registry.get_mut(id) {
        ty.chains = chains;
    }
}

fn unreachable_type<T>(id: TypeId) -> Result<T, LinkError> {
    Err(LinkError::UnknownType {
        type_name: id.to_string(),
        referenced: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::StructOpsRegistry;
    use crate::property::{Property, StructFlags};
    use std::sync::Arc;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_ops(Arc::new(StructOpsRegistry::new()))
    }

    #[test]
    fn test_point_layout() {
        let mut reg = registry();
        let point = reg.declare_struct("Point", None).expect("declare");
        reg.add_property(point, Property::new("X", PropertyKind::Int)).expect("add");
        reg.add_property(point, Property::new("Flag", PropertyKind::Bool)).expect("add");
        reg.add_property(point, Property::new("Y", PropertyKind::Double)).expect("add");

        let outcome = reg.link(point, true).expect("link");
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.properties_size, 16);
        assert_eq!(outcome.min_alignment, 8);

        let ty = reg.get(point).expect("type");
        assert_eq!(ty.structure_size(), 16);
        assert_eq!(ty.chains().general.len(), 3);
        assert!(ty.chains().destructor.is_empty());
        assert!(ty.struct_flags().contains(StructFlags::IS_PLAIN_OLD_DATA));
    }

    #[test]
    fn test_transient_struct_restarts_once() {
        let mut reg = registry();
        let cache = reg.declare_struct("Cache", None).expect("declare");
        reg.set_struct_flags(cache, StructFlags::TRANSIENT).expect("flags");
        reg.add_property(cache, Property::new("Hits", PropertyKind::Int)).expect("add");

        let owner = reg.declare_struct("Owner", None).expect("declare");
        reg.add_property(owner, Property::new("Cache", PropertyKind::structure("Cache")))
            .expect("add");
        let outcome = reg.link(owner, true).expect("link");
        assert_eq!(outcome.passes, 2);
        let prop = reg.find_property(owner, "Cache").and_then(|r| reg.property(r)).expect("prop");
        assert!(prop.is_transient());
    }

    #[test]
    fn test_self_array_is_fatal_and_state_restored() {
        let mut reg = registry();
        let node = reg.declare_struct("Node", None).expect("declare");
        reg.add_property(
            node,
            Property::new("Children", PropertyKind::array(PropertyKind::structure("Node"))),
        )
        .expect("add");
        let err = reg.link(node, true).expect_err("recursive");
        assert!(matches!(
            err,
            crate::Error::Link(LinkError::RecursiveArrayStruct { .. })
        ));
        assert_eq!(reg.get(node).map(|t| t.link_state()), Some(LinkState::Unlinked));
    }

    #[test]
    fn test_by_value_cycle_is_fatal() {
        let mut reg = registry();
        let a = reg.declare_struct("A", None).expect("declare");
        let b = reg.declare_struct("B", None).expect("declare");
        reg.add_property(a, Property::new("B", PropertyKind::structure("B"))).expect("add");
        reg.add_property(b, Property::new("A", PropertyKind::structure("A"))).expect("add");
        let err = reg.link(a, true).expect_err("cycle");
        assert!(matches!(err, crate::Error::Link(LinkError::RecursiveLayout { .. })));
    }

    #[test]
    fn test_in_place_relink_detects_drift() {
        let mut reg = registry();
        let inner = reg.declare_struct("Inner", None).expect("declare");
        reg.add_property(inner, Property::new("A", PropertyKind::Int)).expect("add");
        let outer = reg.declare_struct("Outer", None).expect("declare");
        reg.add_property(outer, Property::new("In", PropertyKind::structure("Inner")))
            .expect("add");
        reg.link(outer, true).expect("link");

        // Same layout: in-place relink is fine.
        reg.link(outer, false).expect("in place");

        reg.add_property(inner, Property::new("B", PropertyKind::Int)).expect("grow");
        reg.link(inner, true).expect("relink inner");
        let err = reg.link(outer, false).expect_err("drift");
        assert!(matches!(err, crate::Error::Link(LinkError::LayoutDrift { old_size: 4, .. })));
        reg.link(outer, true).expect("full relink");
        assert_eq!(reg.get(outer).map(|t| t.structure_size()), Some(8));
    }

    #[test]
    fn test_in_place_relink_detects_grown_parent() {
        let mut reg = registry();
        let base = reg.declare_class("Base", None).expect("declare");
        reg.add_property(base, Property::new("A", PropertyKind::Int)).expect("add");
        let derived = reg.declare_class("Derived", Some("Base")).expect("declare");
        reg.add_property(derived, Property::new("B", PropertyKind::Int)).expect("add");
        reg.link_all().expect("link");

        // Unchanged parent: offsets stay valid.
        reg.link(derived, false).expect("in place");

        reg.add_property(base, Property::new("C", PropertyKind::Int)).expect("grow base");
        let err = reg.link(derived, false).expect_err("base drift");
        assert!(matches!(
            err,
            crate::Error::Link(LinkError::BaseDrift {
                old_size: 4,
                new_size: 8,
                ..
            })
        ));
        assert_eq!(reg.get(derived).map(|t| t.link_state()), Some(LinkState::Unlinked));

        reg.link(derived, true).expect("full relink");
        let offset = |name: &str| {
            reg.find_property(derived, name)
                .and_then(|r| reg.property(r))
                .map(|p| p.offset())
        };
        assert_eq!(offset("A"), Some(0));
        assert_eq!(offset("C"), Some(4));
        assert_eq!(offset("B"), Some(8));
        assert_eq!(reg.get(derived).map(|t| t.structure_size()), Some(12));
    }

    #[test]
    fn test_intrinsic_class_cannot_be_fully_relinked() {
        let mut reg = registry();
        let object = reg.declare_class("Object", None).expect("declare");
        reg.set_class_flags(object, ClassFlags::INTRINSIC).expect("flags");
        reg.add_property(object, Property::new("Index", PropertyKind::Int)).expect("add");
        reg.link(object, true).expect("first link");
        assert!(matches!(
            reg.link(object, true),
            Err(crate::Error::Link(LinkError::RelinkIntrinsic { .. }))
        ));
        reg.link(object, false).expect("in-place relink allowed");
    }
}
