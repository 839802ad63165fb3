// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Closed set of property kinds and their wire spellings.

use std::fmt;

/// Size of a heap handle (strings, text, dynamic arrays).
pub const HANDLE_SIZE: usize = 4;

/// Size of an object reference id.
pub const OBJECT_REF_SIZE: usize = 8;

/// What a property stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Bool,
    /// Raw byte, or an enum value when `enum_name` is set
    Byte { enum_name: Option<String> },
    Int8,
    Int16,
    Int,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Name,
    Str,
    Text,
    /// Strong reference to another heap object
    Object,
    WeakObject,
    /// Legacy reference wrapper
    SoftObject,
    Struct { type_name: String },
    /// Dynamic array
    Array { inner: Box<PropertyKind> },
}

/// Declared type carried by a tagged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool,
    Byte,
    Int8,
    Int16,
    Int,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Name,
    Str,
    Text,
    Object,
    WeakObject,
    SoftObject,
    Struct,
    Array,
}

const WIRE_NAMES: &[(WireType, &str)] = &[
    (WireType::Bool, "BoolProperty"),
    (WireType::Byte, "ByteProperty"),
    (WireType::Int8, "Int8Property"),
    (WireType::Int16, "Int16Property"),
    (WireType::Int, "IntProperty"),
    (WireType::Int64, "Int64Property"),
    (WireType::UInt16, "UInt16Property"),
    (WireType::UInt32, "UInt32Property"),
    (WireType::UInt64, "UInt64Property"),
    (WireType::Float, "FloatProperty"),
    (WireType::Double, "DoubleProperty"),
    (WireType::Name, "NameProperty"),
    (WireType::Str, "StrProperty"),
    (WireType::Text, "TextProperty"),
    (WireType::Object, "ObjectProperty"),
    (WireType::WeakObject, "WeakObjectProperty"),
    (WireType::SoftObject, "SoftObjectProperty"),
    (WireType::Struct, "StructProperty"),
    (WireType::Array, "ArrayProperty"),
];

impl WireType {
    pub fn as_str(self) -> &'static str {
        WIRE_NAMES
            .iter()
            .find(|(wire, _)| *wire == self)
            .map(|(_, name)| *name)
            .unwrap_or("UnknownProperty")
    }

    pub fn parse(text: &str) -> Option<WireType> {
        WIRE_NAMES
            .iter()
            .find(|(_, name)| *name == text)
            .map(|(wire, _)| *wire)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PropertyKind {
    pub fn byte() -> Self {
        PropertyKind::Byte { enum_name: None }
    }

    pub fn enum_byte(enum_name: impl Into<String>) -> Self {
        PropertyKind::Byte {
            enum_name: Some(enum_name.into()),
        }
    }

    pub fn structure(type_name: impl Into<String>) -> Self {
        PropertyKind::Struct {
            type_name: type_name.into(),
        }
    }

    pub fn array(inner: PropertyKind) -> Self {
        PropertyKind::Array {
            inner: Box::new(inner),
        }
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            PropertyKind::Bool => WireType::Bool,
            PropertyKind::Byte { .. } => WireType::Byte,
            PropertyKind::Int8 => WireType::Int8,
            PropertyKind::Int16 => WireType::Int16,
            PropertyKind::Int => WireType::Int,
            PropertyKind::Int64 => WireType::Int64,
            PropertyKind::UInt16 => WireType::UInt16,
            PropertyKind::UInt32 => WireType::UInt32,
            PropertyKind::UInt64 => WireType::UInt64,
            PropertyKind::Float => WireType::Float,
            PropertyKind::Double => WireType::Double,
            PropertyKind::Name => WireType::Name,
            PropertyKind::Str => WireType::Str,
            PropertyKind::Text => WireType::Text,
            PropertyKind::Object => WireType::Object,
            PropertyKind::WeakObject => WireType::WeakObject,
            PropertyKind::SoftObject => WireType::SoftObject,
            PropertyKind::Struct { .. } => WireType::Struct,
            PropertyKind::Array { .. } => WireType::Array,
        }
    }

    /// `(size, alignment)` of one element, `None` for structs (layout comes
    /// from the linked struct type).
    pub fn primitive_layout(&self) -> Option<(usize, usize)> {
        let layout = match self {
            PropertyKind::Bool | PropertyKind::Byte { .. } | PropertyKind::Int8 => (1, 1),
            PropertyKind::Int16 | PropertyKind::UInt16 => (2, 2),
            PropertyKind::Int | PropertyKind::UInt32 | PropertyKind::Float => (4, 4),
            PropertyKind::Name => (4, 4),
            PropertyKind::Int64 | PropertyKind::UInt64 | PropertyKind::Double => (8, 8),
            PropertyKind::Object | PropertyKind::WeakObject | PropertyKind::SoftObject => {
                (OBJECT_REF_SIZE, OBJECT_REF_SIZE)
            }
            PropertyKind::Str | PropertyKind::Text | PropertyKind::Array { .. } => {
                (HANDLE_SIZE, HANDLE_SIZE)
            }
            PropertyKind::Struct { .. } => return None,
        };
        Some(layout)
    }

    /// Value lives in the instance heap behind a handle.
    pub fn is_heap_backed(&self) -> bool {
        matches!(
            self,
            PropertyKind::Str | PropertyKind::Text | PropertyKind::Array { .. }
        )
    }

    /// Strong or legacy references, looking through arrays (not structs).
    pub fn holds_object_reference(&self) -> bool {
        match self {
            PropertyKind::Object | PropertyKind::SoftObject => true,
            PropertyKind::Array { inner } => inner.holds_object_reference(),
            _ => false,
        }
    }

    pub fn holds_weak_reference(&self) -> bool {
        match self {
            PropertyKind::WeakObject => true,
            PropertyKind::Array { inner } => inner.holds_weak_reference(),
            _ => false,
        }
    }

    /// Struct type named by this kind or by its array element.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            PropertyKind::Struct { type_name } => Some(type_name),
            PropertyKind::Array { inner } => inner.struct_name(),
            _ => None,
        }
    }

    pub fn enum_name(&self) -> Option<&str> {
        match self {
            PropertyKind::Byte { enum_name } => enum_name.as_deref(),
            _ => None,
        }
    }

    pub fn inner(&self) -> Option<&PropertyKind> {
        match self {
            PropertyKind::Array { inner } => Some(inner),
            _ => None,
        }
    }

    /// Parse the schema spelling, e.g. `int`, `Byte<EColor>`, `Array<Struct<Vector>>`.
    pub fn parse(text: &str) -> Option<PropertyKind> {
        let text = text.trim();
        if let Some((head, rest)) = text.split_once('<') {
            let arg = rest.strip_suffix('>')?.trim();
            if arg.is_empty() {
                return None;
            }
            return match head.trim() {
                "Byte" | "Enum" => Some(PropertyKind::enum_byte(arg)),
                "Struct" => Some(PropertyKind::structure(arg)),
                "Array" => PropertyKind::parse(arg).map(PropertyKind::array),
                _ => None,
            };
        }
        let kind = match text {
            "bool" => PropertyKind::Bool,
            "byte" | "u8" => PropertyKind::byte(),
            "int8" | "i8" => PropertyKind::Int8,
            "int16" | "i16" => PropertyKind::Int16,
            "int" | "i32" => PropertyKind::Int,
            "int64" | "i64" => PropertyKind::Int64,
            "uint16" | "u16" => PropertyKind::UInt16,
            "uint32" | "u32" => PropertyKind::UInt32,
            "uint64" | "u64" => PropertyKind::UInt64,
            "float" | "f32" => PropertyKind::Float,
            "double" | "f64" => PropertyKind::Double,
            "name" => PropertyKind::Name,
            "str" | "string" => PropertyKind::Str,
            "text" => PropertyKind::Text,
            "object" => PropertyKind::Object,
            "weak_object" => PropertyKind::WeakObject,
            "soft_object" => PropertyKind::SoftObject,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Bool => f.write_str("bool"),
            PropertyKind::Byte { enum_name: None } => f.write_str("byte"),
            PropertyKind::Byte {
                enum_name: Some(name),
            } => write!(f, "Byte<{}>", name),
            PropertyKind::Int8 => f.write_str("int8"),
            PropertyKind::Int16 => f.write_str("int16"),
            PropertyKind::Int => f.write_str("int"),
            PropertyKind::Int64 => f.write_str("int64"),
            PropertyKind::UInt16 => f.write_str("uint16"),
            PropertyKind::UInt32 => f.write_str("uint32"),
            PropertyKind::UInt64 => f.write_str("uint64"),
            PropertyKind::Float => f.write_str("float"),
            PropertyKind::Double => f.write_str("double"),
            PropertyKind::Name => f.write_str("name"),
            PropertyKind::Str => f.write_str("str"),
            PropertyKind::Text => f.write_str("text"),
            PropertyKind::Object => f.write_str("object"),
            PropertyKind::WeakObject => f.write_str("weak_object"),
            PropertyKind::SoftObject => f.write_str("soft_object"),
            PropertyKind::Struct { type_name } => write!(f, "Struct<{}>", type_name),
            PropertyKind::Array { inner } => write!(f, "Array<{}>", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for (wire, name) in WIRE_NAMES {
            assert_eq!(WireType::parse(name), Some(*wire));
            assert_eq!(wire.as_str(), *name);
        }
        assert_eq!(WireType::parse("MapProperty"), None);
    }

    #[test]
    fn test_parse_nested_kinds() {
        assert_eq!(
            PropertyKind::parse("Array<Struct<Vector>>"),
            Some(PropertyKind::array(PropertyKind::structure("Vector")))
        );
        assert_eq!(
            PropertyKind::parse("Byte<EColor>"),
            Some(PropertyKind::enum_byte("EColor"))
        );
        assert_eq!(PropertyKind::parse("Array<>"), None);
        assert_eq!(PropertyKind::parse("quaternion"), None);

        let kind = PropertyKind::array(PropertyKind::enum_byte("EColor"));
        assert_eq!(PropertyKind::parse(&kind.to_string()), Some(kind));
    }

    #[test]
    fn test_reference_detection_looks_through_arrays() {
        assert!(PropertyKind::array(PropertyKind::Object).holds_object_reference());
        assert!(PropertyKind::SoftObject.holds_object_reference());
        assert!(!PropertyKind::WeakObject.holds_object_reference());
        assert!(PropertyKind::array(PropertyKind::WeakObject).holds_weak_reference());
        assert!(!PropertyKind::Str.holds_object_reference());
    }

    #[test]
    fn test_layouts() {
        assert_eq!(PropertyKind::Bool.primitive_layout(), Some((1, 1)));
        assert_eq!(PropertyKind::Double.primitive_layout(), Some((8, 8)));
        assert_eq!(PropertyKind::Str.primitive_layout(), Some((HANDLE_SIZE, HANDLE_SIZE)));
        assert_eq!(PropertyKind::structure("Vector").primitive_layout(), None);
    }
}
