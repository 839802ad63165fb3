// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::similar_names)] // Test variable naming

//! Tagged streams written by one version of a type and read by another.
//!
//! Each test builds two registries standing for two builds of the program.

use taglink::{
    load_tagged, save_tagged, ArchiveContext, DiagnosticKind, EnumDef, Guid, Instance, ObjectRef, PortFlags,
    Property, PropertyKind, StructFlags, TypeRegistry, Value,
};

fn registry_with(type_name: &str, props: &[(&str, PropertyKind)]) -> TypeRegistry {
    let mut reg = TypeRegistry::new();
    let id = reg.declare_class(type_name, None).expect("declare");
    for (name, kind) in props {
        reg.add_property(id, Property::new(*name, kind.clone())).expect("add");
    }
    reg.link_all().expect("link");
    reg
}

fn full() -> ArchiveContext {
    ArchiveContext::new().with_delta(false)
}

#[test]
fn test_round_trip_every_kind() {
    let mut reg = TypeRegistry::new();
    reg.add_enum(None, EnumDef::sequential("ESlot", &["Head", "Body", "Feet"])).expect("enum");
    let vec2 = reg.declare_struct("Vec2", None).expect("declare");
    reg.add_property(vec2, Property::new("X", PropertyKind::Float)).expect("add");
    reg.add_property(vec2, Property::new("Y", PropertyKind::Float)).expect("add");
    let id = reg.declare_class("Loadout", None).expect("declare");
    let props = [
        ("Enabled", PropertyKind::Bool),
        ("Raw", PropertyKind::byte()),
        ("Slot", PropertyKind::enum_byte("ESlot")),
        ("Small", PropertyKind::Int8),
        ("Short", PropertyKind::Int16),
        ("Count", PropertyKind::Int),
        ("Big", PropertyKind::Int64),
        ("Port", PropertyKind::UInt16),
        ("Mask", PropertyKind::UInt32),
        ("Serial", PropertyKind::UInt64),
        ("Weight", PropertyKind::Float),
        ("Precise", PropertyKind::Double),
        ("Tag", PropertyKind::Name),
        ("Label", PropertyKind::Str),
        ("Caption", PropertyKind::Text),
        ("Owner", PropertyKind::Object),
        ("Watcher", PropertyKind::WeakObject),
        ("Asset", PropertyKind::SoftObject),
        ("Anchor", PropertyKind::structure("Vec2")),
        ("Levels", PropertyKind::array(PropertyKind::Int)),
        ("Notes", PropertyKind::array(PropertyKind::Str)),
        ("Path", PropertyKind::array(PropertyKind::structure("Vec2"))),
    ];
    for (name, kind) in props {
        reg.add_property(id, Property::new(name, kind)).expect("add");
    }
    reg.add_property(id, Property::new("Grid", PropertyKind::Int).with_array_dim(3))
        .expect("add");
    reg.link_all().expect("link");

    let mut loadout = Instance::new(&reg, id).expect("instance");
    loadout.set(&reg, "Enabled", true).expect("set");
    loadout.set(&reg, "Raw", 200u8).expect("set");
    loadout.set(&reg, "Slot", 2u8).expect("set");
    loadout.set(&reg, "Small", -3i8).expect("set");
    loadout.set(&reg, "Short", -300i16).expect("set");
    loadout.set(&reg, "Count", 123_456i32).expect("set");
    loadout.set(&reg, "Big", -9_000_000_000i64).expect("set");
    loadout.set(&reg, "Port", 8080u16).expect("set");
    loadout.set(&reg, "Mask", 0xDEAD_BEEFu32).expect("set");
    loadout.set(&reg, "Serial", u64::MAX).expect("set");
    loadout.set(&reg, "Weight", 72.5f32).expect("set");
    loadout.set(&reg, "Precise", std::f64::consts::PI).expect("set");
    loadout.set_value(&reg, "Tag", Value::Name("Heavy".into())).expect("set");
    loadout.set(&reg, "Label", "main loadout").expect("set");
    loadout.set_value(&reg, "Caption", Value::Text("Ready".into())).expect("set");
    loadout.set(&reg, "Owner", ObjectRef(11)).expect("set");
    loadout.set_value(&reg, "Watcher", Value::WeakObject(ObjectRef(12))).expect("set");
    loadout.set_value(&reg, "Asset", Value::SoftObject(ObjectRef(13))).expect("set");
    loadout
        .set_value(
            &reg,
            "Anchor",
            Value::Struct(vec![("X".into(), Value::Float(1.0)), ("Y".into(), Value::Float(-1.0))]),
        )
        .expect("set");
    loadout.set(&reg, "Levels", vec![1i32, 2, 3]).expect("set");
    loadout
        .set(&reg, "Notes", vec![String::from("a"), String::from("bb")])
        .expect("set");
    loadout
        .set_value(
            &reg,
            "Path",
            Value::Array(vec![
                Value::Struct(vec![("X".into(), Value::Float(4.0))]),
                Value::Struct(vec![("Y".into(), Value::Float(5.0))]),
            ]),
        )
        .expect("set");
    loadout.set_at(&reg, "Grid", 2, 9i32).expect("set");

    for ctx in [ArchiveContext::new(), full()] {
        let bytes = save_tagged(&reg, &loadout, &ctx).expect("save");
        let mut loaded = Instance::new(&reg, id).expect("instance");
        let report = load_tagged(&reg, &mut loaded, &bytes, &ctx).expect("load");
        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert!(loaded.identical(&reg, &loadout, PortFlags::NONE).expect("compare"));
    }
}

#[test]
fn test_added_property_keeps_default() {
    let v1 = registry_with("Point", &[("X", PropertyKind::Int), ("Y", PropertyKind::Int)]);
    let v2 = registry_with(
        "Point",
        &[("X", PropertyKind::Int), ("Y", PropertyKind::Int), ("Z", PropertyKind::Int)],
    );
    let mut old = Instance::by_name(&v1, "Point").expect("instance");
    old.set(&v1, "X", 5i32).expect("set");
    old.set(&v1, "Y", 7i32).expect("set");
    let bytes = save_tagged(&v1, &old, &full()).expect("save");

    let mut new = Instance::by_name(&v2, "Point").expect("instance");
    let report = load_tagged(&v2, &mut new, &bytes, &full()).expect("load");
    assert!(report.is_clean());
    assert_eq!(new.get::<i32>(&v2, "X").expect("get"), 5);
    assert_eq!(new.get::<i32>(&v2, "Y").expect("get"), 7);
    assert_eq!(new.get::<i32>(&v2, "Z").expect("get"), 0);
}

#[test]
fn test_removed_property_is_skipped_exactly() {
    let v2 = registry_with(
        "Point",
        &[("X", PropertyKind::Int), ("Extra", PropertyKind::Str), ("Y", PropertyKind::Int)],
    );
    let v1 = registry_with("Point", &[("X", PropertyKind::Int), ("Y", PropertyKind::Int)]);
    let mut newer = Instance::by_name(&v2, "Point").expect("instance");
    newer.set(&v2, "X", 1i32).expect("set");
    newer.set(&v2, "Extra", "only in v2").expect("set");
    newer.set(&v2, "Y", 2i32).expect("set");
    let bytes = save_tagged(&v2, &newer, &full()).expect("save");

    let mut older = Instance::by_name(&v1, "Point").expect("instance");
    let report = load_tagged(&v1, &mut older, &bytes, &full()).expect("load");
    assert_eq!(report.count(DiagnosticKind::UnknownProperty), 1);
    assert_eq!(report.records, 3);
    assert_eq!(older.get::<i32>(&v1, "X").expect("get"), 1);
    assert_eq!(older.get::<i32>(&v1, "Y").expect("get"), 2);
}

#[test]
fn test_point_losing_y() {
    let v1 = registry_with("Point", &[("x", PropertyKind::Int), ("y", PropertyKind::Int)]);
    let v2 = registry_with("Point", &[("x", PropertyKind::Int)]);
    let mut p = Instance::by_name(&v1, "Point").expect("instance");
    p.set(&v1, "x", 5i32).expect("set");
    p.set(&v1, "y", 7i32).expect("set");
    let bytes = save_tagged(&v1, &p, &ArchiveContext::new()).expect("save");

    let mut q = Instance::by_name(&v2, "Point").expect("instance");
    let report = load_tagged(&v2, &mut q, &bytes, &ArchiveContext::new()).expect("load");
    assert_eq!(q.get::<i32>(&v2, "x").expect("get"), 5);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::UnknownProperty);
}

#[test]
fn test_reordered_declarations_resolve() {
    let names = ["A", "B", "C", "D", "E", "F", "G", "H"];
    let ordered: Vec<(&str, PropertyKind)> = names.iter().map(|n| (*n, PropertyKind::Int)).collect();
    let reader_reg = registry_with("Shuffled", &ordered);

    for seed in 0..20u64 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut shuffled = ordered.clone();
        rng.shuffle(&mut shuffled);
        let writer_reg = registry_with("Shuffled", &shuffled);

        let mut source = Instance::by_name(&writer_reg, "Shuffled").expect("instance");
        for (i, name) in names.iter().enumerate() {
            source.set(&writer_reg, name, (i as i32 + 1) * 10).expect("set");
        }
        let bytes = save_tagged(&writer_reg, &source, &ArchiveContext::new()).expect("save");

        let mut loaded = Instance::by_name(&reader_reg, "Shuffled").expect("instance");
        let report = load_tagged(&reader_reg, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
        assert!(report.is_clean(), "seed {}: {:?}", seed, report.diagnostics);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(
                loaded.get::<i32>(&reader_reg, name).expect("get"),
                (i as i32 + 1) * 10,
                "seed {} property {}",
                seed,
                name
            );
        }
    }
}

#[test]
fn test_rename_redirect_through_base_class() {
    let build = |health_name: &str| {
        let mut reg = TypeRegistry::new();
        let actor = reg.declare_class("Actor", None).expect("declare");
        reg.add_property(actor, Property::new(health_name, PropertyKind::Int)).expect("add");
        let pawn = reg.declare_class("Pawn", Some("Actor")).expect("declare");
        reg.add_property(pawn, Property::new("Speed", PropertyKind::Float)).expect("add");
        reg.link_all().expect("link");
        reg
    };
    let v1 = build("Hp");
    let mut v2 = build("Health");
    v2.redirects_mut().add_property("Actor", "Hp", "Health");

    let mut pawn = Instance::by_name(&v1, "Pawn").expect("instance");
    pawn.set(&v1, "Hp", 40i32).expect("set");
    pawn.set(&v1, "Speed", 2.0f32).expect("set");
    let bytes = save_tagged(&v1, &pawn, &ArchiveContext::new()).expect("save");

    let mut loaded = Instance::by_name(&v2, "Pawn").expect("instance");
    let report = load_tagged(&v2, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
    assert!(report.is_clean());
    assert_eq!(loaded.get::<i32>(&v2, "Health").expect("get"), 40);
    assert_eq!(loaded.get::<f32>(&v2, "Speed").expect("get"), 2.0);
}

fn mood_registry(mood: PropertyKind, entries: &[&str]) -> TypeRegistry {
    let mut reg = TypeRegistry::new();
    reg.add_enum(None, EnumDef::sequential("EMood", entries)).expect("enum");
    let npc = reg.declare_class("Npc", None).expect("declare");
    reg.add_property(npc, Property::new("Mood", mood)).expect("add");
    reg.add_property(npc, Property::new("Level", PropertyKind::Int)).expect("add");
    reg.link_all().expect("link");
    reg
}

fn saved_mood(value: u8) -> Vec<u8> {
    let v1 = mood_registry(PropertyKind::enum_byte("EMood"), &["Calm", "Angry", "Sleepy"]);
    let mut npc = Instance::by_name(&v1, "Npc").expect("instance");
    npc.set(&v1, "Mood", value).expect("set");
    npc.set(&v1, "Level", 3i32).expect("set");
    save_tagged(&v1, &npc, &ArchiveContext::new()).expect("save")
}

#[test]
fn test_enum_byte_loads_into_int() {
    let bytes = saved_mood(2);
    let v2 = mood_registry(PropertyKind::Int, &["Calm", "Angry", "Sleepy"]);
    let mut npc = Instance::by_name(&v2, "Npc").expect("instance");
    let report = load_tagged(&v2, &mut npc, &bytes, &ArchiveContext::new()).expect("load");
    assert!(report.is_clean());
    assert_eq!(report.coerced, 1);
    assert_eq!(npc.get::<i32>(&v2, "Mood").expect("get"), 2);
    assert_eq!(npc.get::<i32>(&v2, "Level").expect("get"), 3);
}

#[test]
fn test_enum_entries_follow_names() {
    let bytes = saved_mood(2);

    // Renumbered: the entry name wins over the old number.
    let renumbered = mood_registry(PropertyKind::enum_byte("EMood"), &["Sleepy", "Calm", "Angry"]);
    let mut npc = Instance::by_name(&renumbered, "Npc").expect("instance");
    let report = load_tagged(&renumbered, &mut npc, &bytes, &ArchiveContext::new()).expect("load");
    assert!(report.is_clean());
    assert_eq!(npc.get::<u8>(&renumbered, "Mood").expect("get"), 0);

    // Removed: falls back to the enum's maximum.
    let removed = mood_registry(PropertyKind::enum_byte("EMood"), &["Calm", "Angry", "Bored", "EMood_MAX"]);
    let mut npc = Instance::by_name(&removed, "Npc").expect("instance");
    let report = load_tagged(&removed, &mut npc, &bytes, &ArchiveContext::new()).expect("load");
    assert_eq!(report.count(DiagnosticKind::UnknownEnumValue), 1);
    assert_eq!(npc.get::<u8>(&removed, "Mood").expect("get"), 3);
    assert_eq!(npc.get::<i32>(&removed, "Level").expect("get"), 3);
}

#[test]
fn test_string_kinds_coerce() {
    let v1 = registry_with(
        "Sign",
        &[
            ("Title", PropertyKind::Str),
            ("Key", PropertyKind::Name),
            ("Body", PropertyKind::Text),
            ("Aliases", PropertyKind::array(PropertyKind::Str)),
        ],
    );
    let v2 = registry_with(
        "Sign",
        &[
            ("Title", PropertyKind::Name),
            ("Key", PropertyKind::Text),
            ("Body", PropertyKind::Str),
            ("Aliases", PropertyKind::array(PropertyKind::Name)),
        ],
    );
    let mut sign = Instance::by_name(&v1, "Sign").expect("instance");
    sign.set(&v1, "Title", "Inn").expect("set");
    sign.set_value(&v1, "Key", Value::Name("SignKey".into())).expect("set");
    sign.set_value(&v1, "Body", Value::Text("Welcome".into())).expect("set");
    sign.set(&v1, "Aliases", vec![String::from("Tavern"), String::from("Pub")])
        .expect("set");
    let bytes = save_tagged(&v1, &sign, &ArchiveContext::new()).expect("save");

    let mut loaded = Instance::by_name(&v2, "Sign").expect("instance");
    let report = load_tagged(&v2, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert_eq!(report.coerced, 4);
    assert_eq!(loaded.get_value(&v2, "Title").expect("get"), Value::Name("Inn".into()));
    assert_eq!(loaded.get_value(&v2, "Key").expect("get"), Value::Text("SignKey".into()));
    assert_eq!(loaded.get::<String>(&v2, "Body").expect("get"), "Welcome");
    assert_eq!(
        loaded.get_value(&v2, "Aliases").expect("get"),
        Value::Array(vec![Value::Name("Tavern".into()), Value::Name("Pub".into())])
    );
}

#[test]
fn test_int_to_bool_and_reference_wrappers() {
    let v1 = registry_with(
        "Switch",
        &[
            ("On", PropertyKind::Int),
            ("Lit", PropertyKind::Int),
            ("Target", PropertyKind::Object),
            ("Lazy", PropertyKind::SoftObject),
        ],
    );
    let v2 = registry_with(
        "Switch",
        &[
            ("On", PropertyKind::Bool),
            ("Lit", PropertyKind::Bool),
            ("Target", PropertyKind::SoftObject),
            ("Lazy", PropertyKind::Object),
        ],
    );
    let mut s = Instance::by_name(&v1, "Switch").expect("instance");
    s.set(&v1, "On", 1i32).expect("set");
    s.set(&v1, "Lit", 2i32).expect("set");
    s.set(&v1, "Target", ObjectRef(77)).expect("set");
    s.set_value(&v1, "Lazy", Value::SoftObject(ObjectRef(78))).expect("set");
    let bytes = save_tagged(&v1, &s, &ArchiveContext::new()).expect("save");

    let mut loaded = Instance::by_name(&v2, "Switch").expect("instance");
    let report = load_tagged(&v2, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
    assert_eq!(report.count(DiagnosticKind::SuspiciousBool), 1);
    assert!(loaded.get::<bool>(&v2, "On").expect("get"));
    assert!(loaded.get::<bool>(&v2, "Lit").expect("get"));
    assert_eq!(
        loaded.get_value(&v2, "Target").expect("get"),
        Value::SoftObject(ObjectRef(77))
    );
    assert_eq!(loaded.get::<ObjectRef>(&v2, "Lazy").expect("get"), ObjectRef(78));
}

#[test]
fn test_mismatch_without_rule_keeps_default() {
    let v1 = registry_with("Score", &[("Value", PropertyKind::Str), ("Rank", PropertyKind::Int)]);
    let v2 = registry_with("Score", &[("Value", PropertyKind::Int), ("Rank", PropertyKind::Int)]);
    let mut s = Instance::by_name(&v1, "Score").expect("instance");
    s.set(&v1, "Value", "12").expect("set");
    s.set(&v1, "Rank", 4i32).expect("set");
    let bytes = save_tagged(&v1, &s, &ArchiveContext::new()).expect("save");

    let mut loaded = Instance::by_name(&v2, "Score").expect("instance");
    let report = load_tagged(&v2, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
    assert_eq!(report.count(DiagnosticKind::TypeMismatch), 1);
    assert_eq!(loaded.get::<i32>(&v2, "Value").expect("get"), 0);
    assert_eq!(loaded.get::<i32>(&v2, "Rank").expect("get"), 4);
}

#[test]
fn test_static_array_index_out_of_range() {
    let v1 = {
        let mut reg = TypeRegistry::new();
        let id = reg.declare_class("Sampler", None).expect("declare");
        reg.add_property(id, Property::new("Samples", PropertyKind::Float).with_array_dim(6))
            .expect("add");
        reg.add_property(id, Property::new("After", PropertyKind::Int)).expect("add");
        reg.link_all().expect("link");
        reg
    };
    let v2 = {
        let mut reg = TypeRegistry::new();
        let id = reg.declare_class("Sampler", None).expect("declare");
        reg.add_property(id, Property::new("Samples", PropertyKind::Float)).expect("add");
        reg.add_property(id, Property::new("After", PropertyKind::Int)).expect("add");
        reg.link_all().expect("link");
        reg
    };
    let mut s = Instance::by_name(&v1, "Sampler").expect("instance");
    s.set_at(&v1, "Samples", 5, 0.25f32).expect("set");
    s.set(&v1, "After", 99i32).expect("set");
    let bytes = save_tagged(&v1, &s, &ArchiveContext::new()).expect("save");

    let mut loaded = Instance::by_name(&v2, "Sampler").expect("instance");
    let report = load_tagged(&v2, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
    assert_eq!(report.count(DiagnosticKind::ArrayIndexOutOfRange), 1);
    assert_eq!(loaded.get::<f32>(&v2, "Samples").expect("get"), 0.0);
    assert_eq!(loaded.get::<i32>(&v2, "After").expect("get"), 99);
}

fn located(struct_name: &str, guid: Option<Guid>) -> TypeRegistry {
    let mut reg = TypeRegistry::new();
    let vec = reg.declare_struct(struct_name, None).expect("declare");
    reg.add_property(vec, Property::new("X", PropertyKind::Double)).expect("add");
    if let Some(guid) = guid {
        reg.set_custom_guid(vec, guid).expect("guid");
    }
    let marker = reg.declare_class("Marker", None).expect("declare");
    reg.add_property(marker, Property::new("Where", PropertyKind::structure(struct_name)))
        .expect("add");
    reg.link_all().expect("link");
    reg
}

fn saved_marker(reg: &TypeRegistry) -> Vec<u8> {
    let mut marker = Instance::by_name(reg, "Marker").expect("instance");
    marker
        .set_value(reg, "Where", Value::Struct(vec![("X".into(), Value::Double(8.5))]))
        .expect("set");
    save_tagged(reg, &marker, &ArchiveContext::new()).expect("save")
}

fn loaded_x(reg: &TypeRegistry, bytes: &[u8]) -> (f64, taglink::LoadReport) {
    let mut marker = Instance::by_name(reg, "Marker").expect("instance");
    let report = load_tagged(reg, &mut marker, bytes, &ArchiveContext::new()).expect("load");
    let x = match marker.get_value(reg, "Where").expect("get").field("X") {
        Some(Value::Double(x)) => *x,
        other => panic!("unexpected {:?}", other),
    };
    (x, report)
}

#[test]
fn test_renamed_struct_accepted_by_guid() {
    let identity = Guid::from_name("Location");
    let bytes = saved_marker(&located("OldVec", Some(identity)));

    let (x, report) = loaded_x(&located("Vec", Some(identity)), &bytes);
    assert!(report.is_clean());
    assert_eq!(x, 8.5);

    let (x, report) = loaded_x(&located("Vec", Some(Guid::from_name("Other"))), &bytes);
    assert_eq!(report.count(DiagnosticKind::StructNameMismatch), 1);
    assert_eq!(x, 0.0);
}

#[test]
fn test_renamed_struct_accepted_by_redirect() {
    let bytes = saved_marker(&located("OldVec", None));
    let mut reg = located("Vec", None);
    reg.redirects_mut().add_struct("OldVec", "Vec");
    let (x, report) = loaded_x(&reg, &bytes);
    assert!(report.is_clean());
    assert_eq!(x, 8.5);
}

#[test]
fn test_native_struct_takes_mismatched_record() {
    use std::sync::Arc;
    use taglink::{describe, ArchiveReader, PropertyTag, StructOps, StructOpsRegistry, WireType};

    let v1 = registry_with("Lamp", &[("Tint", PropertyKind::Int)]);
    let mut lamp = Instance::by_name(&v1, "Lamp").expect("instance");
    lamp.set(&v1, "Tint", 0x11_22_33_44i32).expect("set");
    let bytes = save_tagged(&v1, &lamp, &ArchiveContext::new()).expect("save");

    // Packed colors used to be saved as plain ints.
    fn from_int(tag: &PropertyTag, reader: &mut ArchiveReader<'_>, data: &mut [u8]) -> taglink::ArchiveResult<bool> {
        if tag.wire_type() != Some(WireType::Int) {
            return Ok(false);
        }
        let packed = reader.read_i32()?;
        data[..4].copy_from_slice(&packed.to_le_bytes());
        Ok(true)
    }
    let table = Arc::new(StructOpsRegistry::new());
    table.defer_register(
        "Color32",
        StructOps::new(4, 4).plain_old_data().with_mismatched_tag(Arc::new(from_int)),
    );
    let mut v2 = TypeRegistry::with_ops(table);
    let color = v2.declare_struct("Color32", None).expect("declare");
    v2.set_struct_flags(color, StructFlags::NATIVE).expect("flags");
    let lamp_id = v2.declare_class("Lamp", None).expect("declare");
    v2.add_property(lamp_id, Property::new("Tint", PropertyKind::structure("Color32")))
        .expect("add");
    v2.link_all().expect("link");

    let mut loaded = Instance::new(&v2, lamp_id).expect("instance");
    let report = load_tagged(&v2, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert_eq!(report.coerced, 1);

    let offset = describe(&v2, lamp_id).expect("describe")[0].offset;
    let raw = &loaded.data()[offset..offset + 4];
    assert_eq!(raw, &0x11_22_33_44i32.to_le_bytes());
}

#[test]
fn test_atomic_struct_writes_every_field_once_dirty() {
    for (atomic, expected_records) in [(false, 2), (true, 4)] {
        let mut reg = TypeRegistry::new();
        let vec3 = reg.declare_struct("Vec3", None).expect("declare");
        for axis in ["X", "Y", "Z"] {
            reg.add_property(vec3, Property::new(axis, PropertyKind::Float)).expect("add");
        }
        if atomic {
            reg.set_struct_flags(vec3, StructFlags::ATOMIC).expect("flags");
        }
        let owner = reg.declare_class("Owner", None).expect("declare");
        reg.add_property(owner, Property::new("Pos", PropertyKind::structure("Vec3")))
            .expect("add");
        reg.add_property(owner, Property::new("Speed", PropertyKind::Int)).expect("add");
        reg.link_all().expect("link");

        // Untouched: nothing but terminators either way.
        let pristine = Instance::new(&reg, owner).expect("instance");
        let bytes = save_tagged(&reg, &pristine, &ArchiveContext::new()).expect("save");
        let mut loaded = Instance::new(&reg, owner).expect("instance");
        let report = load_tagged(&reg, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
        assert_eq!(report.records, 0, "atomic={}", atomic);

        let mut moved = Instance::new(&reg, owner).expect("instance");
        moved
            .set_value(&reg, "Pos", Value::Struct(vec![("X".into(), Value::Float(1.5))]))
            .expect("set");
        let bytes = save_tagged(&reg, &moved, &ArchiveContext::new()).expect("save");
        let mut loaded = Instance::new(&reg, owner).expect("instance");
        let report = load_tagged(&reg, &mut loaded, &bytes, &ArchiveContext::new()).expect("load");
        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert_eq!(report.records, expected_records, "atomic={}", atomic);
        assert!(loaded.identical(&reg, &moved, PortFlags::NONE).expect("compare"));
    }
}
