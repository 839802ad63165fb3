// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generic struct operations driven by the traversal chains.
//!
//! Every function works on the raw bytes of one struct (or one property
//! element) plus the heap of the instance those bytes belong to. Native ops
//! take over the first `ops.size()` bytes when they provide the matching hook;
//! properties that start past that region always use the generic path.

use super::heap::{read_handle, write_handle, ArrayValue, Heap, HeapValue};
use super::ObjectRef;
use crate::archive::PortFlags;
use crate::property::{PropertyFlags, PropertyKind, StructFlags, OBJECT_REF_SIZE};
use crate::types::{PropRef, TypeId, TypeRegistry};

/// `(size, alignment)` of one element of `kind`.
pub(crate) fn element_layout(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
) -> (usize, usize) {
    kind.primitive_layout().unwrap_or_else(|| {
        struct_id
            .and_then(|id| registry.get(id))
            .map(|ty| (ty.structure_size(), ty.min_alignment()))
            .unwrap_or((0, 1))
    })
}

/// Bytes of `data` owned by native ops.
fn native_region(registry: &TypeRegistry, id: TypeId, data_len: usize) -> usize {
    registry
        .get(id)
        .and_then(|ty| ty.ops())
        .map(|ops| ops.size().min(data_len))
        .unwrap_or(0)
}

// ============================================================================
// Initialize / destroy
// ============================================================================

/// Zero `data`, run the native constructor, then construct nested structs
/// that live past the native region.
pub(crate) fn initialize_struct(registry: &TypeRegistry, id: TypeId, data: &mut [u8]) {
    data.fill(0);
    let Some(ty) = registry.get(id) else {
        return;
    };
    let covered = native_region(registry, id, data.len());
    if let Some(ops) = ty.ops() {
        if !ty.struct_flags().contains(StructFlags::ZERO_CONSTRUCTOR) {
            ops.construct(&mut data[..covered]);
        }
    }

    for prop_ref in &ty.chains().general {
        let Some(prop) = registry.property(*prop_ref) else {
            continue;
        };
        if prop.offset() < covered || prop.flags().contains(PropertyFlags::ZERO_CONSTRUCTOR) {
            continue;
        }
        if let PropertyKind::Struct { .. } = prop.kind() {
            for index in 0..prop.array_dim() {
                let start = prop.value_offset(index);
                let end = start + prop.element_size();
                if end <= data.len() {
                    initialize_value(registry, prop.kind(), prop.struct_id(), &mut data[start..end]);
                }
            }
        }
    }
}

pub(crate) fn initialize_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    slot: &mut [u8],
) {
    match (kind, struct_id) {
        (PropertyKind::Struct { .. }, Some(id)) => initialize_struct(registry, id, slot),
        _ => slot.fill(0),
    }
}

/// Run the native destructor, then release everything on the destructor chain.
pub(crate) fn destroy_struct(registry: &TypeRegistry, id: TypeId, data: &mut [u8], heap: &mut Heap) {
    let Some(ty) = registry.get(id) else {
        return;
    };
    let covered = native_region(registry, id, data.len());
    if let Some(ops) = ty.ops() {
        if !ty.struct_flags().contains(StructFlags::NO_DESTRUCTOR) {
            ops.destruct(&mut data[..covered]);
        }
    }
    for prop_ref in &ty.chains().destructor {
        let Some(prop) = registry.property(*prop_ref) else {
            continue;
        };
        for index in 0..prop.array_dim() {
            let start = prop.value_offset(index);
            let end = start + prop.element_size();
            if end <= data.len() {
                destroy_value(registry, prop.kind(), prop.struct_id(), &mut data[start..end], heap);
            }
        }
    }
}

/// Release whatever `slot` owns and leave it in the empty state.
pub(crate) fn destroy_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    slot: &mut [u8],
    heap: &mut Heap,
) {
    match kind {
        PropertyKind::Str | PropertyKind::Text => {
            heap.release(read_handle(slot));
            write_handle(slot, 0);
        }
        PropertyKind::Array { inner } => {
            if let Some(HeapValue::Array(mut array)) = heap.release(read_handle(slot)) {
                let (element_size, _) = element_layout(registry, inner, struct_id);
                if needs_destroy(registry, inner, struct_id) {
                    for index in 0..array.count {
                        destroy_value(
                            registry,
                            inner,
                            struct_id,
                            array.element_mut(index, element_size),
                            heap,
                        );
                    }
                }
            }
            write_handle(slot, 0);
        }
        PropertyKind::Struct { .. } => {
            if let Some(id) = struct_id {
                destroy_struct(registry, id, slot, heap);
            }
        }
        _ => {}
    }
}

fn needs_destroy(registry: &TypeRegistry, kind: &PropertyKind, struct_id: Option<TypeId>) -> bool {
    match kind {
        PropertyKind::Str | PropertyKind::Text | PropertyKind::Array { .. } => true,
        PropertyKind::Struct { .. } => struct_id
            .and_then(|id| registry.get(id))
            .is_some_and(|ty| !ty.struct_flags().contains(StructFlags::NO_DESTRUCTOR)),
        _ => false,
    }
}

// ============================================================================
// Copy
// ============================================================================

/// Deep copy one struct value between (possibly different) instance heaps.
pub(crate) fn copy_struct(
    registry: &TypeRegistry,
    id: TypeId,
    dest: &mut [u8],
    dest_heap: &mut Heap,
    src: &[u8],
    src_heap: &Heap,
) {
    let Some(ty) = registry.get(id) else {
        return;
    };
    let flags = ty.struct_flags();
    let mut covered = 0;
    if flags.contains(StructFlags::COPY_NATIVE) {
        if let Some(ops) = ty.ops() {
            let n = native_region(registry, id, dest.len().min(src.len()));
            if ops.copy(&mut dest[..n], &src[..n]) {
                covered = n;
            }
        }
    } else if flags.contains(StructFlags::IS_PLAIN_OLD_DATA) && dest.len() == src.len() {
        dest.copy_from_slice(src);
        return;
    }
    copy_properties(registry, &ty.chains().general, covered, dest, dest_heap, src, src_heap);
}

/// Copy the listed properties that start at or past `skip_below`.
pub(crate) fn copy_properties(
    registry: &TypeRegistry,
    props: &[PropRef],
    skip_below: usize,
    dest: &mut [u8],
    dest_heap: &mut Heap,
    src: &[u8],
    src_heap: &Heap,
) {
    for prop_ref in props {
        let Some(prop) = registry.property(*prop_ref) else {
            continue;
        };
        if prop.offset() < skip_below {
            continue;
        }
        for index in 0..prop.array_dim() {
            let start = prop.value_offset(index);
            let end = start + prop.element_size();
            if end <= dest.len() && end <= src.len() {
                copy_value(
                    registry,
                    prop.kind(),
                    prop.struct_id(),
                    &mut dest[start..end],
                    dest_heap,
                    &src[start..end],
                    src_heap,
                );
            }
        }
    }
}

pub(crate) fn copy_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    dest: &mut [u8],
    dest_heap: &mut Heap,
    src: &[u8],
    src_heap: &Heap,
) {
    match kind {
        PropertyKind::Str | PropertyKind::Text | PropertyKind::Array { .. } => {
            destroy_value(registry, kind, struct_id, dest, dest_heap);
            let copied = src_heap
                .get(read_handle(src))
                .map(|value| clone_heap_value(registry, kind, struct_id, value, dest_heap, src_heap));
            if let Some(value) = copied {
                let handle = dest_heap.alloc(value);
                write_handle(dest, handle);
            }
        }
        PropertyKind::Struct { .. } => {
            if let Some(id) = struct_id {
                copy_struct(registry, id, dest, dest_heap, src, src_heap);
            }
        }
        _ => dest.copy_from_slice(src),
    }
}

fn clone_heap_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    value: &HeapValue,
    dest_heap: &mut Heap,
    src_heap: &Heap,
) -> HeapValue {
    match (value, kind) {
        (HeapValue::Array(src_array), PropertyKind::Array { inner }) => {
            let (element_size, _) = element_layout(registry, inner, struct_id);
            let mut array = ArrayValue::zeroed(src_array.count, element_size);
            for index in 0..src_array.count {
                copy_value(
                    registry,
                    inner,
                    struct_id,
                    array.element_mut(index, element_size),
                    dest_heap,
                    src_array.element(index, element_size),
                    src_heap,
                );
            }
            HeapValue::Array(array)
        }
        (other, _) => other.clone(),
    }
}

// ============================================================================
// Compare
// ============================================================================

/// Whether two struct values are identical; native identical wins when it
/// answers.
pub(crate) fn identical_struct(
    registry: &TypeRegistry,
    id: TypeId,
    a: &[u8],
    a_heap: &Heap,
    b: &[u8],
    b_heap: &Heap,
    port_flags: PortFlags,
) -> bool {
    let Some(ty) = registry.get(id) else {
        return a == b;
    };
    if ty.struct_flags().contains(StructFlags::IDENTICAL_NATIVE) {
        if let Some(ops) = ty.ops() {
            let n = native_region(registry, id, a.len().min(b.len()));
            if let Some(result) = ops.identical(&a[..n], &b[..n], port_flags) {
                return result;
            }
        }
    }
    ty.chains().general.iter().all(|prop_ref| {
        let Some(prop) = registry.property(*prop_ref) else {
            return true;
        };
        (0..prop.array_dim()).all(|index| {
            let start = prop.value_offset(index);
            let end = start + prop.element_size();
            end > a.len()
                || end > b.len()
                || identical_value(
                    registry,
                    prop.kind(),
                    prop.struct_id(),
                    &a[start..end],
                    a_heap,
                    &b[start..end],
                    b_heap,
                    port_flags,
                )
        })
    })
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn identical_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    a: &[u8],
    a_heap: &Heap,
    b: &[u8],
    b_heap: &Heap,
    port_flags: PortFlags,
) -> bool {
    match kind {
        PropertyKind::Str => a_heap.str(read_handle(a)) == b_heap.str(read_handle(b)),
        PropertyKind::Text => {
            let source = |heap: &Heap, slot: &[u8]| {
                heap.text(read_handle(slot))
                    .map(|t| t.source.clone())
                    .unwrap_or_default()
            };
            source(a_heap, a) == source(b_heap, b)
        }
        PropertyKind::Array { inner } => {
            let empty = ArrayValue::default();
            let left = a_heap.array(read_handle(a)).unwrap_or(&empty);
            let right = b_heap.array(read_handle(b)).unwrap_or(&empty);
            if left.count != right.count {
                return false;
            }
            let (element_size, _) = element_layout(registry, inner, struct_id);
            (0..left.count).all(|index| {
                identical_value(
                    registry,
                    inner,
                    struct_id,
                    left.element(index, element_size),
                    a_heap,
                    right.element(index, element_size),
                    b_heap,
                    port_flags,
                )
            })
        }
        PropertyKind::Struct { .. } => match struct_id {
            Some(id) => identical_struct(registry, id, a, a_heap, b, b_heap, port_flags),
            None => a == b,
        },
        PropertyKind::Float => read_f32(a) == read_f32(b),
        PropertyKind::Double => read_f64(a) == read_f64(b),
        _ => a == b,
    }
}

fn read_f32(slot: &[u8]) -> f32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&slot[..4]);
    f32::from_le_bytes(bytes)
}

fn read_f64(slot: &[u8]) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&slot[..8]);
    f64::from_le_bytes(bytes)
}

// ============================================================================
// References
// ============================================================================

/// Append every non-null object reference held by a struct value.
pub(crate) fn collect_references(
    registry: &TypeRegistry,
    id: TypeId,
    data: &[u8],
    heap: &Heap,
    out: &mut Vec<ObjectRef>,
) {
    let Some(ty) = registry.get(id) else {
        return;
    };
    if ty.struct_flags().contains(StructFlags::ADD_STRUCT_REFERENCED_OBJECTS) {
        if let Some(ops) = ty.ops() {
            let n = native_region(registry, id, data.len());
            ops.add_referenced_objects(&data[..n], out);
        }
    }
    for prop_ref in &ty.chains().reference {
        let Some(prop) = registry.property(*prop_ref) else {
            continue;
        };
        for index in 0..prop.array_dim() {
            let start = prop.value_offset(index);
            let end = start + prop.element_size();
            if end <= data.len() {
                collect_value(registry, prop.kind(), prop.struct_id(), &data[start..end], heap, out);
            }
        }
    }
}

fn collect_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    slot: &[u8],
    heap: &Heap,
    out: &mut Vec<ObjectRef>,
) {
    match kind {
        PropertyKind::Object | PropertyKind::WeakObject | PropertyKind::SoftObject => {
            let mut bytes = [0u8; OBJECT_REF_SIZE];
            bytes.copy_from_slice(&slot[..OBJECT_REF_SIZE]);
            let reference = ObjectRef(u64::from_le_bytes(bytes));
            if !reference.is_null() {
                out.push(reference);
            }
        }
        PropertyKind::Array { inner } => {
            if let Some(array) = heap.array(read_handle(slot)) {
                let (element_size, _) = element_layout(registry, inner, struct_id);
                for index in 0..array.count {
                    collect_value(registry, inner, struct_id, array.element(index, element_size), heap, out);
                }
            }
        }
        PropertyKind::Struct { .. } => {
            if let Some(id) = struct_id {
                collect_references(registry, id, slot, heap, out);
            }
        }
        _ => {}
    }
}
