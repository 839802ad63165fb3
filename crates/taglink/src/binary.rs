// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Untagged binary serialization.
//!
//! Every serializable property of the general chain, every static element,
//! in order and without headers. The reader must have the exact layout the
//! writer had; there is no tolerance for schema changes. `IMMUTABLE` structs
//! nested inside tagged streams use this form.

use crate::archive::{ArchiveContext, ArchiveReader, ArchiveWriter};
use crate::error::Result;
use crate::instance::heap::Heap;
use crate::instance::Instance;
use crate::tagged::item::ItemCodec;
use crate::tagged::LoadReport;
use crate::types::{TypeId, TypeRegistry};

impl ItemCodec<'_> {
    pub(crate) fn save_struct_bin(&self, id: TypeId, data: &[u8], heap: &Heap, writer: &mut ArchiveWriter) -> Result<()> {
        let ty = self.registry.type_ref(id)?;
        for prop_ref in &ty.chains().general {
            let Some(prop) = self.registry.property(*prop_ref) else {
                continue;
            };
            if !prop.should_serialize(self.ctx, true) {
                continue;
            }
            for index in 0..prop.array_dim() {
                let start = prop.value_offset(index);
                let slot = &data[start..start + prop.element_size()];
                self.save_item(prop.kind(), prop.struct_id(), slot, heap, None, writer)?;
            }
        }
        Ok(())
    }

    pub(crate) fn load_struct_bin(
        &self,
        id: TypeId,
        data: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let ty = self.registry.type_ref(id)?;
        for prop_ref in &ty.chains().general {
            let Some(prop) = self.registry.property(*prop_ref) else {
                continue;
            };
            // Same filter as the writer so both sides agree on the field list.
            if !prop.should_serialize(self.ctx, true) {
                continue;
            }
            for index in 0..prop.array_dim() {
                let start = prop.value_offset(index);
                let slot = &mut data[start..start + prop.element_size()];
                self.load_item(prop.kind(), prop.struct_id(), slot, heap, reader, report)?;
            }
        }
        Ok(())
    }
}

/// Write every property of `instance` without tags.
pub fn serialize_bin(registry: &TypeRegistry, instance: &Instance, ctx: &ArchiveContext) -> Result<Vec<u8>> {
    instance.check(registry)?;
    let codec = ItemCodec::binary(registry, ctx);
    let mut writer = ArchiveWriter::with_capacity(instance.data().len());
    codec.save_struct_bin(instance.type_id(), instance.data(), instance.heap(), &mut writer)?;
    Ok(writer.into_inner())
}

/// Read bytes written by [`serialize_bin`] for the same layout.
///
/// Nested structs are decoded in binary form too, except those with a native
/// serializer. The instance is only modified on success.
pub fn deserialize_bin(
    registry: &TypeRegistry,
    instance: &mut Instance,
    bytes: &[u8],
    ctx: &ArchiveContext,
) -> Result<()> {
    instance.check(registry)?;
    let codec = ItemCodec::binary(registry, ctx);
    let mut reader = ArchiveReader::new(bytes);
    let mut report = LoadReport::new();
    let mut staged = instance.clone();
    {
        let id = staged.type_id();
        let (data, heap) = staged.parts_mut();
        codec.load_struct_bin(id, data, heap, &mut reader, &mut report)?;
    }
    if reader.remaining() > 0 {
        log::warn!(
            "[binary] {} trailing bytes after '{}'",
            reader.remaining(),
            staged.type_name()
        );
    }
    *instance = staged;
    Ok(())
}
