// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tagged and binary serialization throughput.
//!
//! Measures:
//! - Tagged save with and without delta against defaults
//! - Tagged load, in declaration order and through the name-search fallback
//! - Untagged binary form for comparison
//! - Subtype queries on a deep hierarchy

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use taglink::{
    deserialize_bin, load_tagged, save_tagged, serialize_bin, ArchiveContext, Instance, Property, PropertyKind,
    TypeId, TypeRegistry, Value,
};

/// Registry with one class of `count` properties of mixed kinds.
fn wide_type(count: usize, reversed: bool) -> (TypeRegistry, TypeId) {
    let mut reg = TypeRegistry::new();
    let vec = reg.declare_struct("Vec3", None).expect("declare");
    for axis in ["X", "Y", "Z"] {
        reg.add_property(vec, Property::new(axis, PropertyKind::Float)).expect("add");
    }
    let id = reg.declare_class("Wide", None).expect("declare");
    let mut order: Vec<usize> = (0..count).collect();
    if reversed {
        order.reverse();
    }
    for i in order {
        let kind = match i % 4 {
            0 => PropertyKind::Int,
            1 => PropertyKind::Double,
            2 => PropertyKind::Str,
            _ => PropertyKind::structure("Vec3"),
        };
        reg.add_property(id, Property::new(format!("P{}", i), kind)).expect("add");
    }
    reg.link_all().expect("link");
    (reg, id)
}

fn populated(reg: &TypeRegistry, id: TypeId, count: usize) -> Instance {
    let mut inst = Instance::new(reg, id).expect("instance");
    for i in 0..count {
        let name = format!("P{}", i);
        let value = match i % 4 {
            0 => Value::Int(i as i32),
            1 => Value::Double(i as f64 * 0.5),
            2 => Value::Str(format!("value-{}", i)),
            _ => Value::Struct(vec![("Y".into(), Value::Float(1.0))]),
        };
        inst.set_value(reg, &name, value).expect("set");
    }
    inst
}

fn bench_tagged_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("tagged_save");
    for count in [8usize, 64, 256] {
        let (reg, id) = wide_type(count, false);
        let inst = populated(&reg, id, count);
        group.throughput(Throughput::Elements(count as u64));
        for (label, ctx) in [
            ("delta", ArchiveContext::new()),
            ("full", ArchiveContext::new().with_delta(false)),
        ] {
            group.bench_with_input(BenchmarkId::new(label, count), &inst, |b, inst| {
                b.iter(|| black_box(save_tagged(&reg, inst, &ctx).expect("save")));
            });
        }
    }
    group.finish();
}

fn bench_tagged_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("tagged_load");
    let ctx = ArchiveContext::new().with_delta(false);
    for count in [8usize, 64, 256] {
        let (writer_reg, writer_id) = wide_type(count, false);
        let bytes = save_tagged(&writer_reg, &populated(&writer_reg, writer_id, count), &ctx).expect("save");
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        for (label, reversed) in [("in_order", false), ("reordered", true)] {
            let (reg, id) = wide_type(count, reversed);
            group.bench_with_input(BenchmarkId::new(label, count), &bytes, |b, bytes| {
                b.iter(|| {
                    let mut inst = Instance::new(&reg, id).expect("instance");
                    black_box(load_tagged(&reg, &mut inst, bytes, &ctx).expect("load"))
                });
            });
        }
    }
    group.finish();
}

fn bench_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary");
    let ctx = ArchiveContext::new();
    let count = 64;
    let (reg, id) = wide_type(count, false);
    let inst = populated(&reg, id, count);
    let bytes = serialize_bin(&reg, &inst, &ctx).expect("save");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("serialize", |b| {
        b.iter(|| black_box(serialize_bin(&reg, &inst, &ctx).expect("save")));
    });
    group.bench_function("deserialize", |b| {
        b.iter(|| {
            let mut out = Instance::new(&reg, id).expect("instance");
            deserialize_bin(&reg, &mut out, &bytes, &ctx).expect("load");
            black_box(out)
        });
    });
    group.finish();
}

fn bench_is_child_of(c: &mut Criterion) {
    let mut reg = TypeRegistry::new();
    let mut previous: Option<String> = None;
    for depth in 0..32 {
        let name = format!("Level{}", depth);
        reg.declare_class(&name, previous.as_deref()).expect("declare");
        previous = Some(name);
    }
    let leaf = reg.require("Level31").expect("leaf");
    let root = reg.require("Level0").expect("root");
    c.bench_function("is_child_of_depth_32", |b| {
        b.iter(|| black_box(reg.is_child_of(black_box(leaf), black_box(root))));
    });
}

criterion_group!(benches, bench_tagged_save, bench_tagged_load, bench_binary, bench_is_child_of);
criterion_main!(benches);
