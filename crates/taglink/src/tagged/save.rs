// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tagged write path.

use super::item::ItemCodec;
use super::tag::PropertyTag;
use crate::archive::{ArchiveWriter, PortFlags};
use crate::error::Result;
use crate::instance::heap::Heap;
use crate::instance::ops::identical_value;
use crate::property::{Property, PropertyKind, StructFlags, WireType};
use crate::types::{PropRef, TypeId};

impl ItemCodec<'_> {
    /// Write a record for every serializable property element of struct `id`
    /// that differs from `default`, then the terminator.
    ///
    /// Without a default (or with delta disabled) every element is written.
    /// An `ATOMIC` struct with at least one differing element writes all of them.
    pub(crate) fn save_struct_tagged(
        &self,
        id: TypeId,
        data: &[u8],
        heap: &Heap,
        default: Option<(&[u8], &Heap)>,
        writer: &mut ArchiveWriter,
    ) -> Result<()> {
        let ty = self.registry.type_ref(id)?;
        let default = default.filter(|_| self.ctx.delta);

        let mut pending: Vec<(PropRef, &Property, usize, bool)> = Vec::new();
        for prop_ref in &ty.chains().general {
            let Some(prop) = self.registry.property(*prop_ref) else {
                continue;
            };
            if !prop.should_serialize(self.ctx, true) {
                continue;
            }
            for index in 0..prop.array_dim() {
                let start = prop.value_offset(index);
                let end = start + prop.element_size();
                let differs = match default {
                    Some((default_data, default_heap)) => !identical_value(
                        self.registry,
                        prop.kind(),
                        prop.struct_id(),
                        &data[start..end],
                        heap,
                        &default_data[start..end],
                        default_heap,
                        PortFlags::DELTA_COMPARISON,
                    ),
                    None => true,
                };
                pending.push((*prop_ref, prop, index, differs));
            }
        }

        let emit_all = ty.struct_flags().contains(StructFlags::ATOMIC) && pending.iter().any(|p| p.3);
        for (prop_ref, prop, index, differs) in pending {
            if differs || emit_all {
                self.save_record(prop_ref, prop, index, data, heap, default, writer)?;
            }
        }
        PropertyTag::write_terminator(writer)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn save_record(
        &self,
        prop_ref: PropRef,
        prop: &Property,
        index: usize,
        data: &[u8],
        heap: &Heap,
        default: Option<(&[u8], &Heap)>,
        writer: &mut ArchiveWriter,
    ) -> Result<()> {
        let start = prop.value_offset(index);
        let slot = &data[start..start + prop.element_size()];
        let mut tag = PropertyTag::new(prop.name(), prop.wire_type(), index);

        // Enum bytes are written by entry name so renumbering the enum is safe;
        // values the enum doesn't define stay raw bytes.
        let mut enum_entry = None;
        match prop.kind() {
            PropertyKind::Bool => tag.bool_value = slot[0] != 0,
            PropertyKind::Byte {
                enum_name: Some(enum_name),
            } => {
                enum_entry = self
                    .registry
                    .find_enum(Some(prop_ref.owner), enum_name)
                    .and_then(|def| def.name_by_value(i64::from(slot[0])))
                    .map(str::to_string);
                if enum_entry.is_some() {
                    tag.enum_name = enum_name.clone();
                }
            }
            PropertyKind::Struct { .. } => {
                if let Some(ty) = prop.struct_id().and_then(|id| self.registry.get(id)) {
                    tag.struct_name = ty.name().to_string();
                    tag.struct_guid = ty.custom_guid();
                }
            }
            PropertyKind::Array { inner } => tag.inner_type = inner.wire_type().as_str().to_string(),
            _ => {}
        }

        let size_offset = tag.write(writer, self.ctx.version)?;
        let payload_start = writer.tell();
        match (prop.wire_type(), enum_entry) {
            (WireType::Bool, _) => {}
            (WireType::Byte, Some(entry)) => writer.write_string(&entry)?,
            _ => {
                let default_slot =
                    default.map(|(d, dh)| (&d[start..start + prop.element_size()], dh));
                self.save_item(prop.kind(), prop.struct_id(), slot, heap, default_slot, writer)?;
            }
        }
        PropertyTag::patch_size(writer, size_offset, payload_start)?;
        Ok(())
    }
}
