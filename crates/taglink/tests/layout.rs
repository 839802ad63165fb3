// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test indices fit in u32

//! Linker behavior across type hierarchies.

use std::sync::Arc;
use taglink::types::{Chains, RepRecord};
use taglink::{
    describe, Error, Instance, LinkError, PropRef, Property, PropertyFlags, PropertyInfo, PropertyKind, StructFlags,
    StructOps, StructOpsRegistry, TypeId, TypeRegistry, Value, MAX_RELINK_ITERATIONS,
};

const KINDS: &[fn() -> PropertyKind] = &[
    || PropertyKind::Bool,
    || PropertyKind::Int8,
    || PropertyKind::Int16,
    || PropertyKind::Int,
    || PropertyKind::Int64,
    || PropertyKind::Double,
    || PropertyKind::Str,
    || PropertyKind::Object,
];

fn random_tree(rng: &mut fastrand::Rng, count: usize) -> (TypeRegistry, Vec<TypeId>) {
    let mut reg = TypeRegistry::new();
    let mut ids: Vec<TypeId> = Vec::with_capacity(count);
    for i in 0..count {
        let parent = if i == 0 || rng.bool() {
            None
        } else {
            Some(format!("C{}", rng.usize(0..i)))
        };
        let id = reg.declare_class(&format!("C{}", i), parent.as_deref()).expect("declare");
        for p in 0..rng.usize(1..4) {
            let kind = KINDS[rng.usize(0..KINDS.len())]();
            let dim = if rng.u8(0..5) == 0 { 3 } else { 1 };
            reg.add_property(id, Property::new(format!("P{}_{}", i, p), kind).with_array_dim(dim))
                .expect("add");
        }
        ids.push(id);
    }
    reg.link_all().expect("link");
    (reg, ids)
}

fn offsets(reg: &TypeRegistry, id: TypeId) -> Vec<(String, usize)> {
    reg.all_properties(id)
        .into_iter()
        .filter_map(|r| reg.property(r))
        .map(|p| (p.name().to_string(), p.offset()))
        .collect()
}

#[test]
fn test_children_never_shrink_and_keep_inherited_offsets() {
    for seed in 0..12u64 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let (mut reg, ids) = random_tree(&mut rng, 10);
        for &id in &ids {
            let Some(parent) = reg.type_ref(id).expect("type").parent() else {
                continue;
            };
            let parent_size = reg.type_ref(parent).expect("parent").properties_size();
            let parent_offsets = offsets(&reg, parent);

            reg.link(id, true).expect("relink");
            let child = reg.type_ref(id).expect("type");
            assert!(
                child.properties_size() >= parent_size,
                "seed {}: {} smaller than its parent",
                seed,
                child.name()
            );
            let child_offsets = offsets(&reg, id);
            assert_eq!(
                &child_offsets[..parent_offsets.len()],
                &parent_offsets[..],
                "seed {}: inherited offsets moved in {}",
                seed,
                child.name()
            );
        }
    }
}

/// Everything the linker computes for one type.
#[derive(Debug, PartialEq)]
struct Linked {
    rows: Vec<PropertyInfo>,
    chains: Chains,
    flags: StructFlags,
    net_fields: Vec<PropRef>,
    class_reps: Vec<RepRecord>,
    fingerprint: u64,
}

fn linked(reg: &TypeRegistry, id: TypeId) -> Linked {
    let ty = reg.type_ref(id).expect("type");
    Linked {
        rows: describe(reg, id).expect("describe"),
        chains: ty.chains().clone(),
        flags: ty.struct_flags(),
        net_fields: ty.net_fields().to_vec(),
        class_reps: ty.class_reps().to_vec(),
        fingerprint: ty.layout_fingerprint(),
    }
}

#[test]
fn test_full_relink_is_idempotent() {
    let table = Arc::new(StructOpsRegistry::new());
    table.defer_register("Handle", StructOps::new(8, 8).zero_constructor().with_destruct(|_| {}));
    let mut reg = TypeRegistry::with_ops(table);

    let cache = reg.declare_struct("Cache", None).expect("declare");
    reg.set_struct_flags(cache, StructFlags::TRANSIENT).expect("flags");
    reg.add_property(cache, Property::new("Hits", PropertyKind::Int)).expect("add");

    reg.declare_struct("Handle", None).expect("declare");
    let typed = reg.declare_struct("TypedHandle", Some("Handle")).expect("declare");
    reg.add_property(typed, Property::new("Kind", PropertyKind::Int)).expect("add");

    let vec2 = reg.declare_struct("Vec2", None).expect("declare");
    reg.add_property(vec2, Property::new("X", PropertyKind::Float)).expect("add");
    reg.add_property(vec2, Property::new("Y", PropertyKind::Float)).expect("add");
    reg.redirects_mut().add_struct("OldVec", "Vec2");

    let base = reg.declare_class("Unit", None).expect("declare");
    reg.add_property(base, Property::new("Health", PropertyKind::Int).with_flags(PropertyFlags::NET))
        .expect("add");
    reg.add_property(base, Property::new("Label", PropertyKind::Str)).expect("add");
    let pawn = reg.declare_class("Pawn", Some("Unit")).expect("declare");
    reg.add_property(
        pawn,
        Property::new("Ammo", PropertyKind::Int16)
            .with_flags(PropertyFlags::NET)
            .with_array_dim(2),
    )
    .expect("add");
    reg.add_property(pawn, Property::new("Spot", PropertyKind::structure("OldVec")))
        .expect("add");
    reg.add_property(pawn, Property::new("Scratch", PropertyKind::structure("Cache")))
        .expect("add");
    reg.add_property(pawn, Property::new("Target", PropertyKind::structure("TypedHandle")))
        .expect("add");
    reg.add_property(pawn, Property::new("Owner", PropertyKind::Object)).expect("add");
    reg.link_all().expect("link");

    let pawn_ty = reg.type_ref(pawn).expect("type");
    assert_eq!(pawn_ty.class_reps().len(), 3);
    assert_eq!(pawn_ty.net_fields().len(), 1);
    assert!(reg.type_ref(typed).expect("type").ops_inherited());

    for id in [cache, typed, vec2, base, pawn] {
        let first = reg.link(id, true).expect("relink");
        let before = linked(&reg, id);
        let second = reg.link(id, true).expect("relink again");
        assert_eq!(first, second, "outcome of {}", id);
        assert_eq!(linked(&reg, id), before, "layout of {}", id);
        assert_eq!(second.passes, 1);
    }

    let spot = reg.find_property(pawn, "Spot").and_then(|r| reg.property(r)).expect("spot");
    assert_eq!(spot.kind().struct_name(), Some("Vec2"));
    let scratch = reg.find_property(pawn, "Scratch").and_then(|r| reg.property(r)).expect("scratch");
    assert!(scratch.is_transient());
}

#[test]
fn test_offsets_respect_alignment() {
    let mut rng = fastrand::Rng::with_seed(99);
    let (reg, ids) = random_tree(&mut rng, 16);
    for &id in &ids {
        let ty = reg.type_ref(id).expect("type");
        assert_eq!(ty.structure_size() % ty.min_alignment(), 0, "{}", ty.name());
        for r in reg.all_properties(id) {
            let prop = reg.property(r).expect("property");
            assert_eq!(prop.offset() % prop.alignment(), 0, "{}.{}", ty.name(), prop.name());
            assert!(prop.offset() + prop.size() <= ty.properties_size());
        }
    }
}

#[test]
fn test_fixup_rename_restarts_once() {
    let mut reg = TypeRegistry::new();
    let id = reg.declare_struct("Legacy", None).expect("declare");
    reg.add_property(id, Property::new("OldCount", PropertyKind::Int)).expect("add");
    reg.add_property(id, Property::new("Weight", PropertyKind::Float)).expect("add");
    reg.set_link_fixup(Some(Arc::new(|_type_name: &str, prop: &mut Property| {
        if prop.name() == "OldCount" {
            prop.rename("Count");
        }
    })));

    let outcome = reg.link(id, true).expect("link");
    assert_eq!(outcome.passes, 2);
    assert!(reg.find_property(id, "Count").is_some());
    assert!(reg.find_property(id, "OldCount").is_none());
}

#[test]
fn test_unsettled_layout_hits_the_pass_cap() {
    let mut reg = TypeRegistry::new();
    let id = reg.declare_struct("Flicker", None).expect("declare");
    reg.add_property(id, Property::new("Value", PropertyKind::Int)).expect("add");
    reg.set_link_fixup(Some(Arc::new(|_type_name: &str, prop: &mut Property| {
        let transient = prop.is_transient();
        prop.set_flags(PropertyFlags::TRANSIENT, !transient);
    })));

    let err = reg.link(id, true).expect_err("never settles");
    assert!(matches!(
        err,
        Error::Link(LinkError::RelinkLoopExceeded { passes, .. }) if passes == MAX_RELINK_ITERATIONS
    ));
    assert!(!reg.type_ref(id).expect("type").is_linked());
}

#[test]
fn test_intrinsic_layout_is_enforced() {
    let mut reg = TypeRegistry::new();
    let color = reg.declare_struct("Color", None).expect("declare");
    for channel in ["B", "G", "R", "A"] {
        reg.add_property(color, Property::new(channel, PropertyKind::byte())).expect("add");
    }
    reg.set_struct_flags(color, StructFlags::INTRINSIC).expect("flags");
    let err = reg.link(color, true).expect_err("byte aligned");
    assert!(matches!(
        err,
        Error::Link(LinkError::IntrinsicLayoutMismatch {
            expected_size: 4,
            expected_alignment: 4,
            size: 4,
            alignment: 1,
            ..
        })
    ));

    let mut reg = TypeRegistry::new();
    let color = reg.declare_struct("Color", None).expect("declare");
    reg.add_property(color, Property::new("Packed", PropertyKind::UInt32)).expect("add");
    reg.set_struct_flags(color, StructFlags::INTRINSIC).expect("flags");
    reg.link(color, true).expect("packed color fits");
}

#[test]
fn test_native_ops_drive_construction_and_copy() {
    let table = Arc::new(StructOpsRegistry::new());
    table.defer_register(
        "Counter",
        StructOps::new(8, 4)
            .with_construct(|data| {
                data[..4].copy_from_slice(&42i32.to_le_bytes());
                data[4..8].fill(0);
            })
            // Copies keep the destination's generation field.
            .with_copy(|dest, src| {
                dest[..4].copy_from_slice(&src[..4]);
                true
            }),
    );
    let mut reg = TypeRegistry::with_ops(table);
    let counter = reg.declare_struct("Counter", None).expect("declare");
    reg.add_property(counter, Property::new("Value", PropertyKind::Int)).expect("add");
    reg.add_property(counter, Property::new("Generation", PropertyKind::Int)).expect("add");
    reg.set_struct_flags(counter, StructFlags::NATIVE).expect("flags");
    let holder = reg.declare_class("Holder", None).expect("declare");
    reg.add_property(holder, Property::new("Slot", PropertyKind::structure("Counter")))
        .expect("add");
    reg.link_all().expect("link");

    let flags = reg.type_ref(counter).expect("type").struct_flags();
    assert!(flags.contains(StructFlags::COPY_NATIVE));

    let mut a = Instance::new(&reg, holder).expect("instance");
    let slot = a.get_value(&reg, "Slot").expect("get");
    assert_eq!(slot.field("Value"), Some(&Value::Int(42)));

    a.set_value(
        &reg,
        "Slot",
        Value::Struct(vec![("Value".into(), Value::Int(5)), ("Generation".into(), Value::Int(9))]),
    )
    .expect("set");
    let mut b = Instance::new(&reg, holder).expect("instance");
    b.copy_from(&reg, &a).expect("copy");
    let copied = b.get_value(&reg, "Slot").expect("get");
    assert_eq!(copied.field("Value"), Some(&Value::Int(5)));
    assert_eq!(copied.field("Generation"), Some(&Value::Int(0)));
}

#[test]
fn test_failed_link_restores_previous_layout() {
    let mut reg = TypeRegistry::new();
    let id = reg.declare_struct("Pair", None).expect("declare");
    reg.add_property(id, Property::new("A", PropertyKind::Int)).expect("add");
    reg.link(id, true).expect("link");
    let before = offsets(&reg, id);

    reg.set_struct_flags(id, StructFlags::NATIVE).expect("flags");
    let err = reg.link(id, true).expect_err("no ops registered");
    assert!(matches!(err, Error::Link(LinkError::MissingNativeOps { .. })));
    assert_eq!(offsets(&reg, id), before);
    assert!(reg.type_ref(id).expect("type").is_linked());
}

#[cfg(feature = "ctor-probe")]
#[test]
fn test_probe_reports_nested_untouched_fields() {
    let table = Arc::new(StructOpsRegistry::new());
    table.defer_register(
        "Sparse",
        StructOps::new(12, 4).with_construct(|data| data[8..12].copy_from_slice(&1f32.to_le_bytes())),
    );
    let mut reg = TypeRegistry::with_ops(table);
    let id = reg.declare_struct("Sparse", None).expect("declare");
    reg.add_property(id, Property::new("Min", PropertyKind::Int)).expect("add");
    reg.add_property(id, Property::new("Max", PropertyKind::Int)).expect("add");
    reg.add_property(id, Property::new("Scale", PropertyKind::Float)).expect("add");

    let outcome = reg.link(id, true).expect("link");
    let paths: Vec<&str> = outcome.probe.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["Min", "Max"]);
    assert!(outcome.probe.iter().all(|f| f.type_name == "Sparse"));
}
