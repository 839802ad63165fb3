// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conversions applied when a record's wire type differs from the property.
//!
//! Rules, in the order they are tried:
//!
//! | saved as               | loaded into                    |
//! |------------------------|--------------------------------|
//! | string                 | name, text                     |
//! | name                   | text, string                   |
//! | text                   | name, string                   |
//! | byte (enum or raw)     | any integer                    |
//! | any integer, byte      | bool (nonzero is true)         |
//! | soft reference         | object, weak object            |
//! | object, weak object    | soft reference                 |
//!
//! A struct whose native ops declare a mismatched-tag serializer takes any
//! record before these rules are consulted. Array records whose inner type
//! differs go through the same table per element.

use super::item::{replace_heap_value, ItemCodec};
use super::report::{DiagnosticKind, LoadReport};
use super::tag::PropertyTag;
use crate::archive::ArchiveReader;
use crate::error::Result;
use crate::instance::heap::{Heap, HeapValue, TextValue, TEXT_CONVERTED_FROM_STRING};
use crate::instance::ops::element_layout;
use crate::instance::value::new_array;
use crate::name::Name;
use crate::property::{PropertyKind, StructFlags, WireType, OBJECT_REF_SIZE};
use crate::types::TypeId;

/// A saved value decoded from its own wire type.
enum Source {
    Str(String),
    Name(String),
    Text(TextValue),
    Int(i64),
    /// Enum entry name of a byte saved with an enum
    EnumEntry(String),
    Ref(u64),
}

fn is_integer_wire(wire: WireType) -> bool {
    matches!(
        wire,
        WireType::Byte
            | WireType::Int8
            | WireType::Int16
            | WireType::Int
            | WireType::Int64
            | WireType::UInt16
            | WireType::UInt32
            | WireType::UInt64
    )
}

fn is_integer_kind(kind: &PropertyKind) -> bool {
    matches!(
        kind,
        PropertyKind::Int8
            | PropertyKind::Int16
            | PropertyKind::Int
            | PropertyKind::Int64
            | PropertyKind::UInt16
            | PropertyKind::UInt32
            | PropertyKind::UInt64
    )
}

/// Whether a value saved as `from` can be loaded into `to`.
pub fn can_coerce(from: WireType, to: &PropertyKind) -> bool {
    match (from, to) {
        (WireType::Str, PropertyKind::Name | PropertyKind::Text)
        | (WireType::Name, PropertyKind::Text | PropertyKind::Str)
        | (WireType::Text, PropertyKind::Name | PropertyKind::Str) => true,
        (WireType::Byte, to) if is_integer_kind(to) => true,
        (from, PropertyKind::Bool) if is_integer_wire(from) => true,
        (WireType::SoftObject, PropertyKind::Object | PropertyKind::WeakObject)
        | (WireType::Object | WireType::WeakObject, PropertyKind::SoftObject) => true,
        _ => false,
    }
}

fn read_source(from: WireType, enum_name: &str, reader: &mut ArchiveReader<'_>) -> Result<Option<Source>> {
    let source = match from {
        WireType::Str => Source::Str(reader.read_string()?),
        WireType::Name => Source::Name(reader.read_string()?),
        WireType::Text => {
            let flags = reader.read_u32()?;
            Source::Text(TextValue {
                flags,
                source: reader.read_string()?,
            })
        }
        WireType::Byte if !enum_name.is_empty() => Source::EnumEntry(reader.read_string()?),
        WireType::Byte => Source::Int(i64::from(reader.read_u8()?)),
        WireType::Int8 => Source::Int(i64::from(reader.read_i8()?)),
        WireType::Int16 => Source::Int(i64::from(reader.read_i16()?)),
        WireType::Int => Source::Int(i64::from(reader.read_i32()?)),
        WireType::Int64 => Source::Int(reader.read_i64()?),
        WireType::UInt16 => Source::Int(i64::from(reader.read_u16()?)),
        WireType::UInt32 => Source::Int(i64::from(reader.read_u32()?)),
        WireType::UInt64 => Source::Int(reader.read_u64()? as i64),
        WireType::Object | WireType::WeakObject | WireType::SoftObject => Source::Ref(reader.read_u64()?),
        _ => return Ok(None),
    };
    Ok(Some(source))
}

fn write_int(kind: &PropertyKind, value: i64, slot: &mut [u8]) {
    match kind {
        PropertyKind::Int8 => slot[..1].copy_from_slice(&(value as i8).to_le_bytes()),
        PropertyKind::Int16 => slot[..2].copy_from_slice(&(value as i16).to_le_bytes()),
        PropertyKind::Int => slot[..4].copy_from_slice(&(value as i32).to_le_bytes()),
        PropertyKind::Int64 => slot[..8].copy_from_slice(&value.to_le_bytes()),
        PropertyKind::UInt16 => slot[..2].copy_from_slice(&(value as u16).to_le_bytes()),
        PropertyKind::UInt32 => slot[..4].copy_from_slice(&(value as u32).to_le_bytes()),
        PropertyKind::UInt64 => slot[..8].copy_from_slice(&(value as u64).to_le_bytes()),
        PropertyKind::Byte { .. } | PropertyKind::Bool => slot[0] = value as u8,
        _ => {}
    }
}

/// Where a coerced value lands, for diagnostics and enum lookup.
pub(crate) struct Target<'t> {
    pub type_name: &'t str,
    pub property: &'t str,
    /// Type whose scoped enums are visible
    pub scope: TypeId,
}

impl ItemCodec<'_> {
    /// Value of an enum entry saved under `enum_name`, falling back to the
    /// enum's maximum when the entry no longer exists.
    pub(crate) fn resolve_enum_entry(
        &self,
        target: &Target<'_>,
        enum_name: &str,
        entry: &str,
        report: &mut LoadReport,
    ) -> i64 {
        let Some(def) = self.registry.find_enum(Some(target.scope), enum_name) else {
            report.push(
                DiagnosticKind::UnknownEnumValue,
                target.type_name,
                target.property,
                format!("enum '{}' is not declared, '{}' read as 0", enum_name, entry),
            );
            return 0;
        };
        let short = entry.rsplit("::").next().unwrap_or(entry);
        match def.value_by_name(short) {
            Some(value) => value,
            None => {
                report.push(
                    DiagnosticKind::UnknownEnumValue,
                    target.type_name,
                    target.property,
                    format!(
                        "'{}' is not an entry of '{}', using its maximum {}",
                        entry,
                        enum_name,
                        def.max_value()
                    ),
                );
                def.max_value()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_source(
        &self,
        source: Source,
        enum_name: &str,
        to: &PropertyKind,
        slot: &mut [u8],
        heap: &mut Heap,
        target: &Target<'_>,
        report: &mut LoadReport,
    ) {
        match (source, to) {
            (Source::Str(s) | Source::Name(s), PropertyKind::Text) => {
                let text = TextValue {
                    flags: TEXT_CONVERTED_FROM_STRING,
                    source: s,
                };
                replace_heap_value(self.registry, to, None, slot, heap, HeapValue::Text(text));
            }
            (Source::Str(s), PropertyKind::Name) => write_name(&s, slot),
            (Source::Name(s), PropertyKind::Str) => {
                replace_heap_value(self.registry, to, None, slot, heap, HeapValue::Str(s));
            }
            (Source::Text(text), PropertyKind::Name) => write_name(&text.source, slot),
            (Source::Text(text), PropertyKind::Str) => {
                replace_heap_value(self.registry, to, None, slot, heap, HeapValue::Str(text.source));
            }
            (Source::EnumEntry(entry), kind) => {
                let value = self.resolve_enum_entry(target, enum_name, &entry, report);
                write_bool_or_int(kind, value, slot, target, report);
            }
            (Source::Int(value), kind) => write_bool_or_int(kind, value, slot, target, report),
            (Source::Ref(id), PropertyKind::Object | PropertyKind::WeakObject | PropertyKind::SoftObject) => {
                slot[..OBJECT_REF_SIZE].copy_from_slice(&id.to_le_bytes());
            }
            _ => {}
        }
    }

    /// Load a record whose wire type differs from the property. Returns
    /// `false` when no rule applies; the payload is then left unread.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn coerce_record(
        &self,
        tag: &PropertyTag,
        kind: &PropertyKind,
        struct_id: Option<TypeId>,
        slot: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        target: &Target<'_>,
        report: &mut LoadReport,
    ) -> Result<bool> {
        if let (PropertyKind::Struct { .. }, Some(id)) = (kind, struct_id) {
            return self.load_mismatched_struct(tag, id, slot, reader, report);
        }
        let Some(from) = tag.wire_type() else {
            return Ok(false);
        };
        if !can_coerce(from, kind) {
            return Ok(false);
        }
        let Some(source) = read_source(from, &tag.enum_name, reader)? else {
            return Ok(false);
        };
        self.apply_source(source, &tag.enum_name, kind, slot, heap, target, report);
        report.coerced += 1;
        log::debug!(
            "[tagged] '{}.{}' coerced from {} to {}",
            target.type_name,
            target.property,
            from,
            kind
        );
        Ok(true)
    }

    /// Hand a record to the struct's mismatched-tag serializer, if it has one.
    pub(crate) fn load_mismatched_struct(
        &self,
        tag: &PropertyTag,
        id: TypeId,
        slot: &mut [u8],
        reader: &mut ArchiveReader<'_>,
        report: &mut LoadReport,
    ) -> Result<bool> {
        let Some(ty) = self.registry.get(id) else {
            return Ok(false);
        };
        let Some(ops) = ty.ops() else {
            return Ok(false);
        };
        if !ty.struct_flags().contains(StructFlags::SERIALIZE_FROM_MISMATCHED_TAG) {
            return Ok(false);
        }
        let n = ops.size().min(slot.len());
        let taken = ops.serialize_from_mismatched_tag(tag, reader, &mut slot[..n])?;
        if taken {
            report.coerced += 1;
        }
        Ok(taken)
    }

    /// Array record whose inner wire type differs from the property's.
    /// The target array is rebuilt from the record's element count.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn coerce_array(
        &self,
        from: WireType,
        kind: &PropertyKind,
        inner: &PropertyKind,
        struct_id: Option<TypeId>,
        slot: &mut [u8],
        heap: &mut Heap,
        reader: &mut ArchiveReader<'_>,
        target: &Target<'_>,
        report: &mut LoadReport,
    ) -> Result<bool> {
        if !can_coerce(from, inner) {
            return Ok(false);
        }
        let count = self.read_count(inner, reader)?;
        let (element_size, _) = element_layout(self.registry, inner, struct_id);
        let mut array = new_array(self.registry, inner, struct_id, count, element_size);
        for index in 0..count {
            // Bytes inside arrays are always raw.
            if let Some(source) = read_source(from, "", reader)? {
                self.apply_source(source, "", inner, array.element_mut(index, element_size), heap, target, report);
            }
        }
        replace_heap_value(self.registry, kind, struct_id, slot, heap, HeapValue::Array(array));
        report.coerced += 1;
        log::debug!(
            "[tagged] '{}.{}' array elements coerced from {} to {}",
            target.type_name,
            target.property,
            from,
            inner
        );
        Ok(true)
    }
}

fn write_name(text: &str, slot: &mut [u8]) {
    slot[..4].copy_from_slice(&Name::new(text).index().to_le_bytes());
}

fn write_bool_or_int(kind: &PropertyKind, value: i64, slot: &mut [u8], target: &Target<'_>, report: &mut LoadReport) {
    match kind {
        PropertyKind::Bool => {
            if value != 0 && value != 1 {
                report.push(
                    DiagnosticKind::SuspiciousBool,
                    target.type_name,
                    target.property,
                    format!("integer {} loaded as true", value),
                );
            }
            slot[0] = u8::from(value != 0);
        }
        kind => write_int(kind, value, slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        assert!(can_coerce(WireType::Str, &PropertyKind::Name));
        assert!(can_coerce(WireType::Text, &PropertyKind::Str));
        assert!(can_coerce(WireType::Byte, &PropertyKind::Int));
        assert!(can_coerce(WireType::Int64, &PropertyKind::Bool));
        assert!(can_coerce(WireType::SoftObject, &PropertyKind::Object));
        assert!(can_coerce(WireType::WeakObject, &PropertyKind::SoftObject));

        assert!(!can_coerce(WireType::Int, &PropertyKind::Float));
        assert!(!can_coerce(WireType::Float, &PropertyKind::Bool));
        assert!(!can_coerce(WireType::Int, &PropertyKind::Int64));
        assert!(!can_coerce(WireType::Object, &PropertyKind::WeakObject));
        assert!(!can_coerce(WireType::Str, &PropertyKind::Int));
    }

    #[test]
    fn test_write_int_truncates() {
        let mut slot = [0u8; 8];
        write_int(&PropertyKind::Int16, 0x1_0005, &mut slot);
        assert_eq!(i16::from_le_bytes([slot[0], slot[1]]), 5);
        write_int(&PropertyKind::Int64, -3, &mut slot);
        assert_eq!(i64::from_le_bytes(slot), -3);
    }
}
