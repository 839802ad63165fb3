// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tagged read path.
//!
//! Records are matched against the general chain with a cursor that assumes
//! declaration order. A miss consults the property redirects of the type and
//! its ancestors, then searches forward from the cursor, then from the head of
//! the chain up to the cursor. Whatever happens to a record, the reader ends
//! up at `record start + size` before the next header.

use super::coerce::Target;
use super::item::ItemCodec;
use super::report::{DiagnosticKind, LoadReport};
use super::tag::PropertyTag;
use crate::archive::{ArchiveReader, FormatVersion};
use crate::error::{ArchiveError, Result};
use crate::instance::heap::Heap;
use crate::property::{Property, PropertyKind, WireType};
use crate::types::{PropRef, TypeId, TypeRegistry};

fn position_of(registry: &TypeRegistry, props: &[PropRef], cursor: usize, name: &str) -> Option<usize> {
    let matches = |i: &usize| registry.property(props[*i]).is_some_and(|p| p.name() == name);
    if cursor < props.len() && matches(&cursor) {
        return Some(cursor);
    }
    (cursor + 1..props.len())
        .find(matches)
        .or_else(|| (0..cursor.min(props.len())).find(matches))
}

impl ItemCodec<'_> {
    /// Read records into struct `id` until the terminator.
    pub(crate) fn load_struct_tagged(
        &self,
        id: TypeId,
        data: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let ty = self.registry.type_ref(id)?;
        let type_name = ty.name();
        let props = &ty.chains().general;
        let owners = self.registry.owner_names(id);
        let mut cursor = 0usize;

        while let Some(tag) = PropertyTag::read(reader, self.ctx.version)? {
            report.records += 1;
            let start = reader.tell();
            let size = tag.size as usize;
            if size > reader.remaining() {
                return Err(ArchiveError::ReadFailed {
                    offset: start,
                    reason: format!("record '{}' of {} bytes runs past the archive", tag.name, size),
                }
                .into());
            }
            let end = start + size;

            let at_cursor = props
                .get(cursor)
                .and_then(|r| self.registry.property(*r))
                .is_some_and(|p| p.name() == tag.name);
            let found = if at_cursor {
                Some(cursor)
            } else {
                let name = self
                    .registry
                    .redirects()
                    .resolve_property(owners.iter().copied(), &tag.name)
                    .unwrap_or(&tag.name);
                if name != tag.name {
                    log::debug!("[tagged] '{}.{}' redirected to '{}'", type_name, tag.name, name);
                }
                position_of(self.registry, props, cursor, name)
            };

            match found.and_then(|pos| self.registry.property(props[pos]).map(|p| (pos, p))) {
                None => report.push(
                    DiagnosticKind::UnknownProperty,
                    type_name,
                    &tag.name,
                    format!("skipped {} bytes", size),
                ),
                Some((pos, prop)) => {
                    let dim = prop.array_dim();
                    let index = usize::try_from(tag.array_index).ok().filter(|i| *i < dim);
                    match index {
                        None => report.push(
                            DiagnosticKind::ArrayIndexOutOfRange,
                            type_name,
                            &tag.name,
                            format!("index {} outside [0, {}), payload discarded", tag.array_index, dim),
                        ),
                        Some(_) if !prop.should_serialize(self.ctx, false) => report.push(
                            DiagnosticKind::NotSerializable,
                            type_name,
                            &tag.name,
                            "property no longer serialized",
                        ),
                        Some(_) if prop.is_editor_only() && !self.ctx.load_editor_only => report.push(
                            DiagnosticKind::EditorOnlySkipped,
                            type_name,
                            &tag.name,
                            "editor-only data is not loaded",
                        ),
                        Some(index) => {
                            let target = Target {
                                type_name,
                                property: prop.name(),
                                scope: props[pos].owner,
                            };
                            let applied = self.load_record(&tag, prop, index, data, heap, reader, &target, report)?;
                            if applied && reader.tell() != end {
                                report.push(
                                    DiagnosticKind::SizeMismatch,
                                    type_name,
                                    &tag.name,
                                    format!("payload used {} of {} bytes", reader.tell() - start, size),
                                );
                            }
                        }
                    }
                    let last_element = tag.array_index < 0 || tag.array_index as usize + 1 >= dim;
                    cursor = if last_element { pos + 1 } else { pos };
                }
            }
            reader.seek(end)?;
        }
        Ok(())
    }

    /// Apply one matched record. Returns whether the value was taken.
    #[allow(clippy::too_many_arguments)]
    fn load_record(
        &self,
        tag: &PropertyTag,
        prop: &Property,
        index: usize,
        data: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        target: &Target<'_>,
        report: &mut LoadReport,
    ) -> Result<bool> {
        let start = prop.value_offset(index);
        let slot = &mut data[start..start + prop.element_size()];
        let kind = prop.kind();

        if tag.wire_type() != Some(kind.wire_type()) {
            let taken = self.coerce_record(tag, kind, prop.struct_id(), slot, heap, reader, target, report)?;
            if !taken {
                report.push(
                    DiagnosticKind::TypeMismatch,
                    target.type_name,
                    &tag.name,
                    format!("saved as {}, property is {}", describe_wire(tag), kind),
                );
            }
            return Ok(taken);
        }

        match kind {
            PropertyKind::Bool => slot[0] = u8::from(tag.bool_value),
            PropertyKind::Byte { enum_name } => self.load_byte(tag, enum_name.as_deref(), slot, reader, target, report)?,
            PropertyKind::Struct { .. } => return self.load_struct_record(tag, prop, slot, heap, reader, target, report),
            PropertyKind::Array { inner } => {
                let saved_inner = tag
                    .inner_wire_type()
                    .filter(|_| self.ctx.version >= FormatVersion::ARRAY_PROPERTY_INNER_TAGS);
                match saved_inner {
                    Some(from) if from != inner.wire_type() => {
                        let taken = self.coerce_array(from, kind, inner, prop.struct_id(), slot, heap, reader, target, report)?;
                        if !taken {
                            report.push(
                                DiagnosticKind::TypeMismatch,
                                target.type_name,
                                &tag.name,
                                format!("array of {} cannot load into array of {}", from, inner),
                            );
                        }
                        return Ok(taken);
                    }
                    _ => self.load_item(kind, prop.struct_id(), slot, heap, reader, report)?,
                }
            }
            _ => self.load_item(kind, prop.struct_id(), slot, heap, reader, report)?,
        }
        Ok(true)
    }

    /// Byte records, covering a property that gained or lost its enum.
    fn load_byte(
        &self,
        tag: &PropertyTag,
        enum_name: Option<&str>,
        slot: &mut [u8],
        reader: &mut ArchiveReader<'_>,
        target: &Target<'_>,
        report: &mut LoadReport,
    ) -> Result<()> {
        if tag.enum_name.is_empty() {
            slot[0] = reader.read_u8()?;
            if enum_name.is_some() {
                report.coerced += 1;
            }
            return Ok(());
        }
        let entry = reader.read_string()?;
        // Resolve through the current enum when there is one, else the saved one.
        let lookup = enum_name.unwrap_or(&tag.enum_name);
        if enum_name.is_none() {
            report.coerced += 1;
        }
        slot[0] = self.resolve_enum_entry(target, lookup, &entry, report) as u8;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn load_struct_record(
        &self,
        tag: &PropertyTag,
        prop: &Property,
        slot: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        target: &Target<'_>,
        report: &mut LoadReport,
    ) -> Result<bool> {
        let Some(id) = prop.struct_id() else {
            return Ok(false);
        };
        let ty = self.registry.type_ref(id)?;
        let saved = self.registry.redirects().resolve_struct(&tag.struct_name);
        if saved != ty.name() {
            if self.load_mismatched_struct(tag, id, slot, reader, report)? {
                return Ok(true);
            }
            let same_identity = if self.ctx.version >= FormatVersion::STRUCT_GUID_IN_PROPERTY_TAG {
                tag.struct_guid.is_valid() && tag.struct_guid == ty.custom_guid()
            } else {
                !ty.uses_binary_or_native_serialization()
            };
            if !same_identity {
                report.push(
                    DiagnosticKind::StructNameMismatch,
                    target.type_name,
                    &tag.name,
                    format!("saved as struct '{}', property holds '{}'", tag.struct_name, ty.name()),
                );
                return Ok(false);
            }
            log::debug!(
                "[tagged] struct '{}' accepted as '{}' for '{}'",
                tag.struct_name,
                ty.name(),
                tag.name
            );
        }
        self.load_struct_value(id, slot, heap, reader, report)?;
        Ok(true)
    }
}

/// Wire type a record was saved with, for diagnostics on unknown types.
fn describe_wire(tag: &PropertyTag) -> String {
    match tag.wire_type() {
        Some(WireType::Struct) => format!("{}<{}>", tag.type_name, tag.struct_name),
        Some(WireType::Array) if !tag.inner_type.is_empty() => format!("{}<{}>", tag.type_name, tag.inner_type),
        _ => tag.type_name.clone(),
    }
}
