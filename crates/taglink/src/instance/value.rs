// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic property values.
//!
//! [`Value`] is the owned, registry-independent form of one property element.
//! `read_value` / `write_value` convert between it and instance bytes.

use super::heap::{read_handle, write_handle, ArrayValue, Heap, HeapValue, TextValue};
use super::ops::{destroy_value, element_layout, initialize_value};
use super::ObjectRef;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::property::{PropertyKind, OBJECT_REF_SIZE};
use crate::types::{TypeId, TypeRegistry};

/// Owned value of one property element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Int8(i8),
    Int16(i16),
    Int(i32),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Name(String),
    Str(String),
    /// Source string of a text value
    Text(String),
    Object(ObjectRef),
    WeakObject(ObjectRef),
    SoftObject(ObjectRef),
    /// Field values in general-chain order; static arrays appear as `Array`
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int(_) => "int",
            Value::Int64(_) => "int64",
            Value::UInt16(_) => "uint16",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Name(_) => "name",
            Value::Str(_) => "str",
            Value::Text(_) => "text",
            Value::Object(_) => "object",
            Value::WeakObject(_) => "weak_object",
            Value::SoftObject(_) => "soft_object",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }

    /// Field of a struct value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::ValueMismatch {
        property: String::new(),
        expected: expected.to_string(),
        got: format!("{:?}", got),
    }
}

/// Typed extraction from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_value_conversion {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    other => Err(mismatch($name, other)),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_value_conversion!(bool, Bool, "bool");
impl_value_conversion!(u8, Byte, "byte");
impl_value_conversion!(i8, Int8, "int8");
impl_value_conversion!(i16, Int16, "int16");
impl_value_conversion!(i32, Int, "int");
impl_value_conversion!(i64, Int64, "int64");
impl_value_conversion!(u16, UInt16, "uint16");
impl_value_conversion!(u32, UInt32, "uint32");
impl_value_conversion!(u64, UInt64, "uint64");
impl_value_conversion!(f32, Float, "float");
impl_value_conversion!(f64, Double, "double");
impl_value_conversion!(ObjectRef, Object, "object");

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) | Value::Name(s) | Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<Name> for Value {
    fn from(name: Name) -> Self {
        Value::Name(name.to_string())
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch("array", other)),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Bytes <-> Value
// ============================================================================

fn fixed<const N: usize>(slot: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&slot[..N]);
    bytes
}

fn read_ref(slot: &[u8]) -> ObjectRef {
    ObjectRef(u64::from_le_bytes(fixed::<OBJECT_REF_SIZE>(slot)))
}

/// Decode one element of `kind` from `slot`.
pub(crate) fn read_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    slot: &[u8],
    heap: &Heap,
) -> Value {
    match kind {
        PropertyKind::Bool => Value::Bool(slot[0] != 0),
        PropertyKind::Byte { .. } => Value::Byte(slot[0]),
        PropertyKind::Int8 => Value::Int8(i8::from_le_bytes(fixed(slot))),
        PropertyKind::Int16 => Value::Int16(i16::from_le_bytes(fixed(slot))),
        PropertyKind::Int => Value::Int(i32::from_le_bytes(fixed(slot))),
        PropertyKind::Int64 => Value::Int64(i64::from_le_bytes(fixed(slot))),
        PropertyKind::UInt16 => Value::UInt16(u16::from_le_bytes(fixed(slot))),
        PropertyKind::UInt32 => Value::UInt32(u32::from_le_bytes(fixed(slot))),
        PropertyKind::UInt64 => Value::UInt64(u64::from_le_bytes(fixed(slot))),
        PropertyKind::Float => Value::Float(f32::from_le_bytes(fixed(slot))),
        PropertyKind::Double => Value::Double(f64::from_le_bytes(fixed(slot))),
        PropertyKind::Name => {
            let index = u32::from_le_bytes(fixed(slot));
            let name = Name::from_index(index).unwrap_or(Name::NONE);
            Value::Name(name.to_string())
        }
        PropertyKind::Str => Value::Str(heap.str(read_handle(slot)).to_string()),
        PropertyKind::Text => Value::Text(
            heap.text(read_handle(slot))
                .map(|t| t.source.clone())
                .unwrap_or_default(),
        ),
        PropertyKind::Object => Value::Object(read_ref(slot)),
        PropertyKind::WeakObject => Value::WeakObject(read_ref(slot)),
        PropertyKind::SoftObject => Value::SoftObject(read_ref(slot)),
        PropertyKind::Array { inner } => {
            let items = heap
                .array(read_handle(slot))
                .map(|array| {
                    let (element_size, _) = element_layout(registry, inner, struct_id);
                    (0..array.count)
                        .map(|i| {
                            read_value(registry, inner, struct_id, array.element(i, element_size), heap)
                        })
                        .collect()
                })
                .unwrap_or_default();
            Value::Array(items)
        }
        PropertyKind::Struct { .. } => {
            let Some(ty) = struct_id.and_then(|id| registry.get(id)) else {
                return Value::Struct(Vec::new());
            };
            let fields = ty
                .chains()
                .general
                .iter()
                .filter_map(|r| registry.property(*r))
                .map(|prop| {
                    let element = |index: usize| {
                        let start = prop.value_offset(index);
                        read_value(
                            registry,
                            prop.kind(),
                            prop.struct_id(),
                            &slot[start..start + prop.element_size()],
                            heap,
                        )
                    };
                    let value = if prop.array_dim() == 1 {
                        element(0)
                    } else {
                        Value::Array((0..prop.array_dim()).map(element).collect())
                    };
                    (prop.name().to_string(), value)
                })
                .collect();
            Value::Struct(fields)
        }
    }
}

/// Encode `value` into one element of `kind`, releasing what the slot held.
pub(crate) fn write_value(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    slot: &mut [u8],
    heap: &mut Heap,
    value: &Value,
) -> Result<()> {
    match (kind, value) {
        (PropertyKind::Bool, Value::Bool(v)) => slot[0] = u8::from(*v),
        (PropertyKind::Byte { .. }, Value::Byte(v)) => slot[0] = *v,
        (PropertyKind::Int8, Value::Int8(v)) => slot[..1].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::Int16, Value::Int16(v)) => slot[..2].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::Int, Value::Int(v)) => slot[..4].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::Int64, Value::Int64(v)) => slot[..8].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::UInt16, Value::UInt16(v)) => slot[..2].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::UInt32, Value::UInt32(v)) => slot[..4].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::UInt64, Value::UInt64(v)) => slot[..8].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::Float, Value::Float(v)) => slot[..4].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::Double, Value::Double(v)) => slot[..8].copy_from_slice(&v.to_le_bytes()),
        (PropertyKind::Name, Value::Name(text)) => {
            slot[..4].copy_from_slice(&Name::new(text).index().to_le_bytes());
        }
        (PropertyKind::Str, Value::Str(text)) => {
            destroy_value(registry, kind, struct_id, slot, heap);
            let handle = heap.alloc(HeapValue::Str(text.clone()));
            write_handle(slot, handle);
        }
        (PropertyKind::Text, Value::Text(source)) => {
            destroy_value(registry, kind, struct_id, slot, heap);
            let handle = heap.alloc(HeapValue::Text(TextValue {
                flags: 0,
                source: source.clone(),
            }));
            write_handle(slot, handle);
        }
        (PropertyKind::Object, Value::Object(r))
        | (PropertyKind::WeakObject, Value::WeakObject(r))
        | (PropertyKind::SoftObject, Value::SoftObject(r)) => {
            slot[..OBJECT_REF_SIZE].copy_from_slice(&r.0.to_le_bytes());
        }
        (PropertyKind::Array { inner }, Value::Array(items)) => {
            let (element_size, _) = element_layout(registry, inner, struct_id);
            let array = new_array(registry, inner, struct_id, items.len(), element_size);
            destroy_value(registry, kind, struct_id, slot, heap);
            let handle = heap.alloc(HeapValue::Array(array));
            write_handle(slot, handle);
            for (index, item) in items.iter().enumerate() {
                write_array_element(registry, inner, struct_id, heap, handle, index, element_size, item)?;
            }
        }
        (PropertyKind::Struct { .. }, Value::Struct(fields)) => {
            let Some(id) = struct_id else {
                return Err(mismatch(&kind.to_string(), value));
            };
            for (name, field_value) in fields {
                let prop = registry
                    .find_property(id, name)
                    .and_then(|r| registry.property(r))
                    .ok_or_else(|| Error::UnknownProperty {
                        type_name: kind.to_string(),
                        property: name.clone(),
                    })?;
                match (prop.array_dim(), field_value) {
                    (dim, Value::Array(items)) if dim > 1 => {
                        for (index, item) in items.iter().take(dim).enumerate() {
                            let start = prop.value_offset(index);
                            let end = start + prop.element_size();
                            write_value(registry, prop.kind(), prop.struct_id(), &mut slot[start..end], heap, item)?;
                        }
                    }
                    _ => {
                        let start = prop.offset();
                        let end = start + prop.element_size();
                        write_value(
                            registry,
                            prop.kind(),
                            prop.struct_id(),
                            &mut slot[start..end],
                            heap,
                            field_value,
                        )?;
                    }
                }
            }
        }
        (kind, other) => return Err(mismatch(&kind.to_string(), other)),
    }
    Ok(())
}

/// Constructed array of `count` default elements.
pub(crate) fn new_array(
    registry: &TypeRegistry,
    inner: &PropertyKind,
    struct_id: Option<TypeId>,
    count: usize,
    element_size: usize,
) -> ArrayValue {
    let mut array = ArrayValue::zeroed(count, element_size);
    for index in 0..count {
        initialize_value(registry, inner, struct_id, array.element_mut(index, element_size));
    }
    array
}

/// Write one element of the heap array behind `handle`.
///
/// The element bytes are taken out of the heap while writing, since nested
/// heap values are allocated from the same heap.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_array_element(
    registry: &TypeRegistry,
    inner: &PropertyKind,
    struct_id: Option<TypeId>,
    heap: &mut Heap,
    handle: u32,
    index: usize,
    element_size: usize,
    value: &Value,
) -> Result<()> {
    let mut element = match heap.get(handle) {
        Some(HeapValue::Array(array)) if index < array.count => array.element(index, element_size).to_vec(),
        _ => return Ok(()),
    };
    write_value(registry, inner, struct_id, &mut element, heap, value)?;
    if let Some(HeapValue::Array(array)) = heap.get_mut(handle) {
        array.element_mut(index, element_size).copy_from_slice(&element);
    }
    Ok(())
}
