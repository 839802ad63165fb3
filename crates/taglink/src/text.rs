// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Text form of single property values, for tooling and debug output.
//!
//! ```text
//! bool      True | False
//! numbers   42, -7, 0.5
//! enum byte Entry (or the number when the value has no entry)
//! name      Bare or "quoted"
//! str/text  "quoted with \" and \\ escapes"
//! object    None | 1234
//! array     (1,2,3)
//! struct    (X=1,Y=2,Scores[1]=3)
//! ```
//!
//! Structs whose native ops export or import text use their own form for the
//! whole value, nested or not.

use crate::error::{Error, Result};
use crate::instance::heap::{read_handle, Heap};
use crate::instance::ops::element_layout;
use crate::instance::value::{new_array, read_value, write_value};
use crate::instance::Value;
use crate::name::Name;
use crate::property::{PropertyKind, StructFlags};
use crate::types::{TypeId, TypeRegistry};
use std::fmt::Write as _;

/// Export one element of `kind`. `scope` is the type owning the property,
/// used to find enums declared inside it.
pub(crate) fn export_text(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    scope: Option<TypeId>,
    slot: &[u8],
    heap: &Heap,
) -> String {
    let mut out = String::new();
    export_into(registry, kind, struct_id, scope, slot, heap, &mut out);
    out
}

fn export_into(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    scope: Option<TypeId>,
    slot: &[u8],
    heap: &Heap,
    out: &mut String,
) {
    match kind {
        PropertyKind::Bool => out.push_str(if slot[0] != 0 { "True" } else { "False" }),
        PropertyKind::Byte { enum_name } => {
            let entry = enum_name
                .as_deref()
                .and_then(|e| registry.find_enum(scope, e))
                .and_then(|def| def.name_by_value(i64::from(slot[0])));
            match entry {
                Some(entry) => out.push_str(entry),
                None => {
                    let _ = write!(out, "{}", slot[0]);
                }
            }
        }
        PropertyKind::Name => {
            let index = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
            let text = Name::from_index(index).unwrap_or(Name::NONE).text();
            if is_bare(&text) {
                out.push_str(&text);
            } else {
                push_quoted(&text, out);
            }
        }
        PropertyKind::Str => push_quoted(heap.str(read_handle(slot)), out),
        PropertyKind::Text => push_quoted(heap.text(read_handle(slot)).map_or("", |t| t.source.as_str()), out),
        PropertyKind::Object | PropertyKind::WeakObject | PropertyKind::SoftObject => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&slot[..8]);
            match u64::from_le_bytes(bytes) {
                0 => out.push_str("None"),
                id => {
                    let _ = write!(out, "{}", id);
                }
            }
        }
        PropertyKind::Array { inner } => {
            out.push('(');
            if let Some(array) = heap.array(read_handle(slot)) {
                let (element_size, _) = element_layout(registry, inner, struct_id);
                for index in 0..array.count {
                    if index > 0 {
                        out.push(',');
                    }
                    export_into(registry, inner, struct_id, scope, array.element(index, element_size), heap, out);
                }
            }
            out.push(')');
        }
        PropertyKind::Struct { .. } => export_struct(registry, struct_id, slot, heap, out),
        scalar => {
            let text = match read_value(registry, scalar, struct_id, slot, heap) {
                Value::Int8(v) => v.to_string(),
                Value::Int16(v) => v.to_string(),
                Value::Int(v) => v.to_string(),
                Value::Int64(v) => v.to_string(),
                Value::UInt16(v) => v.to_string(),
                Value::UInt32(v) => v.to_string(),
                Value::UInt64(v) => v.to_string(),
                Value::Float(v) => v.to_string(),
                Value::Double(v) => v.to_string(),
                other => other.kind_name().to_string(),
            };
            out.push_str(&text);
        }
    }
}

fn export_struct(registry: &TypeRegistry, struct_id: Option<TypeId>, slot: &[u8], heap: &Heap, out: &mut String) {
    let Some(ty) = struct_id.and_then(|id| registry.get(id)) else {
        out.push_str("()");
        return;
    };
    if ty.struct_flags().contains(StructFlags::EXPORT_TEXT_ITEM_NATIVE) {
        if let Some(ops) = ty.ops() {
            let native = ops.size().min(slot.len());
            if let Some(text) = ops.export_text(&slot[..native]) {
                out.push_str(&text);
                return;
            }
        }
    }
    out.push('(');
    let mut first = true;
    for prop_ref in &ty.chains().general {
        let Some(prop) = registry.property(*prop_ref) else {
            continue;
        };
        for index in 0..prop.array_dim() {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(prop.name());
            if prop.array_dim() > 1 {
                let _ = write!(out, "[{}]", index);
            }
            out.push('=');
            let start = prop.value_offset(index);
            export_into(
                registry,
                prop.kind(),
                prop.struct_id(),
                Some(prop_ref.owner),
                &slot[start..start + prop.element_size()],
                heap,
                out,
            );
        }
    }
    out.push(')');
}

fn is_bare(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/'))
}

fn push_quoted(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
}

// ============================================================================
// Import
// ============================================================================

/// Parse `text` into one element of `kind`. The slot is only modified when
/// the whole text parses.
pub(crate) fn import_text(
    registry: &TypeRegistry,
    kind: &PropertyKind,
    struct_id: Option<TypeId>,
    scope: Option<TypeId>,
    slot: &mut [u8],
    heap: &mut Heap,
    text: &str,
) -> Result<()> {
    let mut parser = Parser { text, pos: 0 };
    // Parse into a scratch slot first so a failure leaves the value alone.
    let mut scratch = slot.to_vec();
    let mut scratch_heap = heap.clone();
    parser.value(registry, kind, struct_id, scope, &mut scratch, &mut scratch_heap)?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.mismatch(kind, "end of input"));
    }
    slot.copy_from_slice(&scratch);
    *heap = scratch_heap;
    Ok(())
}

struct Parser<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Parser<'t> {
    fn rest(&self) -> &'t str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn mismatch(&self, kind: &PropertyKind, wanted: &str) -> Error {
        let got: String = self.rest().chars().take(24).collect();
        Error::ValueMismatch {
            property: String::new(),
            expected: format!("{} ({})", kind, wanted),
            got: if got.is_empty() { "end of input".to_string() } else { got },
        }
    }

    /// Unquoted token up to the next delimiter.
    fn token(&mut self) -> &'t str {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| matches!(c, ',' | ')' | '(' | '=' | '"') || c.is_whitespace())
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn quoted(&mut self, kind: &PropertyKind) -> Result<String> {
        if !self.eat('"') {
            return Err(self.mismatch(kind, "quoted string"));
        }
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(self.mismatch(kind, "closing quote"))
    }

    fn string(&mut self, kind: &PropertyKind) -> Result<String> {
        self.skip_ws();
        if self.peek() == Some('"') {
            self.quoted(kind)
        } else {
            Ok(self.token().to_string())
        }
    }

    /// Raw text of one value, balanced over parentheses and quotes.
    fn segment(&mut self) -> &'t str {
        self.skip_ws();
        let rest = self.rest();
        let mut depth = 0usize;
        let mut quoted = false;
        let mut escaped = false;
        let mut end = rest.len();
        for (i, c) in rest.char_indices() {
            if quoted {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => quoted = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => quoted = true,
                '(' => depth += 1,
                ')' if depth == 0 => {
                    end = i;
                    break;
                }
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }
        self.pos += end;
        rest[..end].trim_end()
    }

    fn number<T: std::str::FromStr>(&mut self, kind: &PropertyKind) -> Result<T> {
        let start = self.pos;
        let token = self.token();
        token.parse::<T>().map_err(|_| {
            self.pos = start;
            self.mismatch(kind, "number")
        })
    }

    fn value(
        &mut self,
        registry: &TypeRegistry,
        kind: &PropertyKind,
        struct_id: Option<TypeId>,
        scope: Option<TypeId>,
        slot: &mut [u8],
        heap: &mut Heap,
    ) -> Result<()> {
        let value = match kind {
            PropertyKind::Bool => {
                let start = self.pos;
                match self.token().to_ascii_lowercase().as_str() {
                    "true" | "1" => Value::Bool(true),
                    "false" | "0" => Value::Bool(false),
                    _ => {
                        self.pos = start;
                        return Err(self.mismatch(kind, "True or False"));
                    }
                }
            }
            PropertyKind::Byte { enum_name } => {
                let start = self.pos;
                let token = self.token();
                match token.parse::<u8>() {
                    Ok(v) => Value::Byte(v),
                    Err(_) => {
                        let entry = token.rsplit("::").next().unwrap_or(token);
                        let value = enum_name
                            .as_deref()
                            .and_then(|e| registry.find_enum(scope, e))
                            .and_then(|def| def.value_by_name(entry))
                            .and_then(|v| u8::try_from(v).ok());
                        match value {
                            Some(v) => Value::Byte(v),
                            None => {
                                self.pos = start;
                                return Err(self.mismatch(kind, "enum entry or byte"));
                            }
                        }
                    }
                }
            }
            PropertyKind::Int8 => Value::Int8(self.number(kind)?),
            PropertyKind::Int16 => Value::Int16(self.number(kind)?),
            PropertyKind::Int => Value::Int(self.number(kind)?),
            PropertyKind::Int64 => Value::Int64(self.number(kind)?),
            PropertyKind::UInt16 => Value::UInt16(self.number(kind)?),
            PropertyKind::UInt32 => Value::UInt32(self.number(kind)?),
            PropertyKind::UInt64 => Value::UInt64(self.number(kind)?),
            PropertyKind::Float => Value::Float(self.number(kind)?),
            PropertyKind::Double => Value::Double(self.number(kind)?),
            PropertyKind::Name => Value::Name(self.string(kind)?),
            PropertyKind::Str => Value::Str(self.string(kind)?),
            PropertyKind::Text => Value::Text(self.string(kind)?),
            PropertyKind::Object | PropertyKind::WeakObject | PropertyKind::SoftObject => {
                let start = self.pos;
                let token = self.token();
                let id = if token.eq_ignore_ascii_case("none") {
                    0
                } else {
                    token.parse::<u64>().map_err(|_| {
                        self.pos = start;
                        self.mismatch(kind, "object id or None")
                    })?
                };
                let r = crate::instance::ObjectRef(id);
                match kind {
                    PropertyKind::Object => Value::Object(r),
                    PropertyKind::WeakObject => Value::WeakObject(r),
                    _ => Value::SoftObject(r),
                }
            }
            PropertyKind::Array { inner } => return self.array(registry, kind, inner, struct_id, scope, slot, heap),
            PropertyKind::Struct { .. } => return self.structure(registry, kind, struct_id, slot, heap),
        };
        write_value(registry, kind, struct_id, slot, heap, &value)
    }

    #[allow(clippy::too_many_arguments)]
    fn array(
        &mut self,
        registry: &TypeRegistry,
        kind: &PropertyKind,
        inner: &PropertyKind,
        struct_id: Option<TypeId>,
        scope: Option<TypeId>,
        slot: &mut [u8],
        heap: &mut Heap,
    ) -> Result<()> {
        if !self.eat('(') {
            return Err(self.mismatch(kind, "'('"));
        }
        let (element_size, _) = element_layout(registry, inner, struct_id);
        // Elements are parsed into a standalone array, then installed whole.
        let mut elements: Vec<Vec<u8>> = Vec::new();
        if !self.eat(')') {
            loop {
                let mut element = new_array(registry, inner, struct_id, 1, element_size).data;
                self.value(registry, inner, struct_id, scope, &mut element, heap)?;
                elements.push(element);
                if self.eat(',') {
                    continue;
                }
                if self.eat(')') {
                    break;
                }
                return Err(self.mismatch(kind, "',' or ')'"));
            }
        }
        let mut array = new_array(registry, inner, struct_id, 0, element_size);
        array.count = elements.len();
        array.data = elements.concat();
        crate::tagged::item::replace_heap_value(
            registry,
            kind,
            struct_id,
            slot,
            heap,
            crate::instance::heap::HeapValue::Array(array),
        );
        Ok(())
    }

    fn structure(
        &mut self,
        registry: &TypeRegistry,
        kind: &PropertyKind,
        struct_id: Option<TypeId>,
        slot: &mut [u8],
        heap: &mut Heap,
    ) -> Result<()> {
        let ty = struct_id
            .and_then(|id| registry.get(id))
            .ok_or_else(|| Error::NotLinked(kind.to_string()))?;
        if ty.struct_flags().contains(StructFlags::IMPORT_TEXT_ITEM_NATIVE) {
            if let Some(ops) = ty.ops() {
                let segment = self.segment();
                let native = ops.size().min(slot.len());
                return match ops.import_text(segment, &mut slot[..native]) {
                    Some(true) => Ok(()),
                    _ => Err(Error::ValueMismatch {
                        property: String::new(),
                        expected: ty.name().to_string(),
                        got: segment.to_string(),
                    }),
                };
            }
        }
        if !self.eat('(') {
            return Err(self.mismatch(kind, "'('"));
        }
        if self.eat(')') {
            return Ok(());
        }
        loop {
            let key = self.token();
            let (field, index) = match key.split_once('[') {
                Some((field, index)) => {
                    let index = index
                        .strip_suffix(']')
                        .and_then(|i| i.parse::<usize>().ok())
                        .ok_or_else(|| self.mismatch(kind, "field index"))?;
                    (field, index)
                }
                None => (key, 0),
            };
            let prop_ref = registry
                .find_property(ty.id(), field)
                .ok_or_else(|| Error::UnknownProperty {
                    type_name: ty.name().to_string(),
                    property: field.to_string(),
                })?;
            let Some(prop) = registry.property(prop_ref) else {
                return Err(self.mismatch(kind, "field"));
            };
            if index >= prop.array_dim() {
                return Err(Error::IndexOutOfRange {
                    property: field.to_string(),
                    index,
                    len: prop.array_dim(),
                });
            }
            if !self.eat('=') {
                return Err(self.mismatch(kind, "'='"));
            }
            let start = prop.value_offset(index);
            self.value(
                registry,
                prop.kind(),
                prop.struct_id(),
                Some(prop_ref.owner),
                &mut slot[start..start + prop.element_size()],
                heap,
            )?;
            if self.eat(',') {
                continue;
            }
            if self.eat(')') {
                return Ok(());
            }
            return Err(self.mismatch(kind, "',' or ')'"));
        }
    }
}
