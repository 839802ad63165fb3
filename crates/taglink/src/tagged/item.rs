// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload codec for one property element.
//!
//! Fixed-size values are already little-endian in instance memory and are
//! copied as-is. Names, strings and text are written as strings, dynamic
//! arrays as an `i32` count followed by their elements. Nested structs go
//! through native ops, the binary form, or nested tagged records, depending on
//! the struct's flags and the nesting mode of the codec.

use super::report::LoadReport;
use crate::archive::{ArchiveContext, ArchiveReader, ArchiveWriter};
use crate::error::{ArchiveError, Error, Result};
use crate::instance::heap::{read_handle, write_handle, Heap, HeapValue, TextValue};
use crate::instance::ops::{destroy_value, element_layout, initialize_struct};
use crate::instance::value::new_array;
use crate::name::Name;
use crate::property::{PropertyKind, StructFlags};
use crate::types::{TypeId, TypeRegistry};

/// How nested structs without native serialization are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nesting {
    /// Nested tagged records, delta against a default
    Tagged,
    /// Every property, no tags
    Binary,
}

pub(crate) struct ItemCodec<'a> {
    pub registry: &'a TypeRegistry,
    pub ctx: &'a ArchiveContext,
    pub nesting: Nesting,
}

impl<'a> ItemCodec<'a> {
    pub fn tagged(registry: &'a TypeRegistry, ctx: &'a ArchiveContext) -> Self {
        Self {
            registry,
            ctx,
            nesting: Nesting::Tagged,
        }
    }

    pub fn binary(registry: &'a TypeRegistry, ctx: &'a ArchiveContext) -> Self {
        Self {
            registry,
            ctx,
            nesting: Nesting::Binary,
        }
    }

    // ------------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------------

    /// Write one element. `default` is only consulted for nested tagged structs.
    pub fn save_item(
        &self,
        kind: &PropertyKind,
        struct_id: Option<TypeId>,
        slot: &[u8],
        heap: &Heap,
        default: Option<(&[u8], &Heap)>,
        writer: &mut ArchiveWriter,
    ) -> Result<()> {
        match kind {
            PropertyKind::Name => {
                let index = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
                let name = Name::from_index(index).unwrap_or(Name::NONE);
                writer.write_string(&name.text())?;
            }
            PropertyKind::Str => writer.write_string(heap.str(read_handle(slot)))?,
            PropertyKind::Text => {
                let empty = TextValue::default();
                let text = heap.text(read_handle(slot)).unwrap_or(&empty);
                writer.write_u32(text.flags)?;
                writer.write_string(&text.source)?;
            }
            PropertyKind::Array { inner } => {
                let (element_size, _) = element_layout(self.registry, inner, struct_id);
                match heap.array(read_handle(slot)) {
                    Some(array) => {
                        writer.write_i32(count_i32(array.count, writer.tell())?)?;
                        for index in 0..array.count {
                            self.save_item(inner, struct_id, array.element(index, element_size), heap, None, writer)?;
                        }
                    }
                    None => writer.write_i32(0)?,
                }
            }
            PropertyKind::Struct { .. } => {
                let id = struct_id.ok_or_else(|| Error::NotLinked(kind.to_string()))?;
                self.save_struct_value(id, slot, heap, default, writer)?;
            }
            fixed => {
                let (size, _) = fixed.primitive_layout().unwrap_or((0, 1));
                writer.write_bytes(&slot[..size])?;
            }
        }
        Ok(())
    }

    fn save_struct_value(
        &self,
        id: TypeId,
        slot: &[u8],
        heap: &Heap,
        default: Option<(&[u8], &Heap)>,
        writer: &mut ArchiveWriter,
    ) -> Result<()> {
        let ty = self.registry.type_ref(id)?;
        let flags = ty.struct_flags();
        if flags.contains(StructFlags::SERIALIZE_NATIVE) {
            if let Some(serializer) = ty.ops().and_then(|ops| ops.serializer()) {
                let n = ty.ops().map(|ops| ops.size().min(slot.len())).unwrap_or(0);
                (serializer.save)(&slot[..n], writer)?;
                return Ok(());
            }
        }
        if self.nesting == Nesting::Binary || flags.contains(StructFlags::IMMUTABLE) {
            return self.save_struct_bin(id, slot, heap, writer);
        }
        match default {
            Some((default_slot, default_heap)) => {
                self.save_struct_tagged(id, slot, heap, Some((default_slot, default_heap)), writer)
            }
            None => {
                let mut fresh = vec![0u8; slot.len()];
                initialize_struct(self.registry, id, &mut fresh);
                let fresh_heap = Heap::new();
                self.save_struct_tagged(id, slot, heap, Some((&fresh, &fresh_heap)), writer)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    /// Read one element written by [`ItemCodec::save_item`] into `slot`.
    pub fn load_item(
        &self,
        kind: &PropertyKind,
        struct_id: Option<TypeId>,
        slot: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        report: &mut LoadReport,
    ) -> Result<()> {
        match kind {
            PropertyKind::Name => {
                let name = Name::new(&reader.read_string()?);
                slot[..4].copy_from_slice(&name.index().to_le_bytes());
            }
            PropertyKind::Str => {
                let text = reader.read_string()?;
                replace_heap_value(self.registry, kind, None, slot, heap, HeapValue::Str(text));
            }
            PropertyKind::Text => {
                let flags = reader.read_u32()?;
                let source = reader.read_string()?;
                replace_heap_value(self.registry, kind, None, slot, heap, HeapValue::Text(TextValue { flags, source }));
            }
            PropertyKind::Array { inner } => {
                let count = self.read_count(inner, reader)?;
                let (element_size, _) = element_layout(self.registry, inner, struct_id);
                let mut array = new_array(self.registry, inner, struct_id, count, element_size);
                for index in 0..count {
                    self.load_item(inner, struct_id, array.element_mut(index, element_size), heap, reader, report)?;
                }
                replace_heap_value(self.registry, kind, struct_id, slot, heap, HeapValue::Array(array));
            }
            PropertyKind::Struct { .. } => {
                let id = struct_id.ok_or_else(|| Error::NotLinked(kind.to_string()))?;
                self.load_struct_value(id, slot, heap, reader, report)?;
            }
            fixed => {
                let (size, _) = fixed.primitive_layout().unwrap_or((0, 1));
                slot[..size].copy_from_slice(reader.read_bytes(size)?);
            }
        }
        Ok(())
    }

    pub(crate) fn load_struct_value(
        &self,
        id: TypeId,
        slot: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let ty = self.registry.type_ref(id)?;
        let flags = ty.struct_flags();
        let native = ty.ops().map(|ops| ops.size().min(slot.len())).unwrap_or(0);
        let serializer = ty.ops().and_then(|ops| ops.serializer());
        match serializer {
            Some(serializer) if flags.contains(StructFlags::SERIALIZE_NATIVE) => {
                (serializer.load)(&mut slot[..native], reader)?;
            }
            _ if self.nesting == Nesting::Binary || flags.contains(StructFlags::IMMUTABLE) => {
                self.load_struct_bin(id, slot, heap, reader, report)?;
            }
            _ => self.load_struct_tagged(id, slot, heap, reader, report)?,
        }
        if flags.contains(StructFlags::POST_SERIALIZE_NATIVE) {
            if let Some(ops) = ty.ops() {
                ops.post_serialize(&mut slot[..native]);
            }
        }
        Ok(())
    }

    /// Element count of a dynamic array, checked against the bytes left.
    pub(crate) fn read_count(&self, inner: &PropertyKind, reader: &mut ArchiveReader<'_>) -> Result<usize> {
        let offset = reader.tell();
        let count = reader.read_i32()?;
        // Every encoded element takes at least one byte, except empty binary structs.
        let may_be_empty = matches!(inner, PropertyKind::Struct { .. }) && self.nesting == Nesting::Binary;
        if count < 0 || (!may_be_empty && count as usize > reader.remaining()) {
            return Err(ArchiveError::InvalidData {
                offset,
                reason: format!("array count {} with {} bytes left", count, reader.remaining()),
            }
            .into());
        }
        Ok(count as usize)
    }
}

/// Release what `slot` holds and point it at a newly allocated value.
pub(crate) fn replace_heap_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    slot: &mut [u8],
    heap: &mut Heap,
    value: HeapValue,
) {
    destroy_value(registry, kind, struct_id, slot, heap);
    let handle = heap.alloc(value);
    write_handle(slot, handle);
}

fn count_i32(count: usize, offset: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| {
        ArchiveError::WriteFailed {
            offset,
            reason: format!("array of {} elements exceeds limit", count),
        }
        .into()
    })
}
