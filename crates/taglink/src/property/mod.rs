// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Property descriptors.
//!
//! A [`Property`] is the data-member form of a field: declared name, kind,
//! flags and static array dimension, plus the layout facts computed when the
//! owning type links (offset, element size, alignment, capability flags).

pub mod flags;
pub mod kind;

pub use flags::{ClassFlags, PropertyFlags, StructFlags};
pub use kind::{PropertyKind, WireType, HANDLE_SIZE, OBJECT_REF_SIZE};

use crate::archive::ArchiveContext;
use crate::types::TypeId;

/// Round `value` up to a multiple of `alignment` (power of two or 1).
pub fn align_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return value;
    }
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Facts about the struct a property refers to, resolved by the linker.
#[derive(Debug, Clone)]
pub struct ResolvedStruct {
    pub id: TypeId,
    pub name: String,
    pub size: usize,
    pub alignment: usize,
    pub flags: StructFlags,
    pub contains_object_reference: bool,
    pub contains_weak_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    kind: PropertyKind,
    flags: PropertyFlags,
    array_dim: usize,

    // Computed by `link`
    offset: usize,
    element_size: usize,
    alignment: usize,
    struct_id: Option<TypeId>,
    contains_object_reference: bool,
    contains_weak_reference: bool,
    rep_index: Option<usize>,
    linked: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::empty(),
            array_dim: 1,
            offset: 0,
            element_size: 0,
            alignment: 1,
            struct_id: None,
            contains_object_reference: false,
            contains_weak_reference: false,
            rep_index: None,
            linked: false,
        }
    }

    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    /// Static array dimension (clamped to at least 1).
    pub fn with_array_dim(mut self, array_dim: usize) -> Self {
        self.array_dim = array_dim.max(1);
        self
    }

    // ------------------------------------------------------------------------
    // Declared
    // ------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn array_dim(&self) -> usize {
        self.array_dim
    }

    pub fn wire_type(&self) -> WireType {
        self.kind.wire_type()
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_flags(&mut self, flags: PropertyFlags, on: bool) {
        self.flags.set(flags, on);
    }

    /// Point a struct (or array-of-struct) property at a renamed struct type.
    pub(crate) fn retarget_struct(&mut self, new_name: &str) {
        fn retarget(kind: &mut PropertyKind, new_name: &str) {
            match kind {
                PropertyKind::Struct { type_name } => *type_name = new_name.to_string(),
                PropertyKind::Array { inner } => retarget(inner, new_name),
                _ => {}
            }
        }
        retarget(&mut self.kind, new_name);
    }

    // ------------------------------------------------------------------------
    // Computed
    // ------------------------------------------------------------------------

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Total bytes occupied: `element_size * array_dim`.
    pub fn size(&self) -> usize {
        self.element_size * self.array_dim
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Byte offset of static array element `index`.
    pub fn value_offset(&self, index: usize) -> usize {
        self.offset + index * self.element_size
    }

    pub fn struct_id(&self) -> Option<TypeId> {
        self.struct_id
    }

    pub fn rep_index(&self) -> Option<usize> {
        self.rep_index
    }

    pub(crate) fn set_rep_index(&mut self, rep_index: Option<usize>) {
        self.rep_index = rep_index;
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn contains_object_reference(&self) -> bool {
        self.contains_object_reference
    }

    pub fn contains_weak_reference(&self) -> bool {
        self.contains_weak_reference
    }

    pub fn is_editor_only(&self) -> bool {
        self.flags.contains(PropertyFlags::EDITOR_ONLY)
    }

    pub fn is_net(&self) -> bool {
        self.flags.contains(PropertyFlags::NET)
    }

    pub fn is_transient(&self) -> bool {
        self.flags.contains(PropertyFlags::TRANSIENT)
    }

    /// Trivially destructible: no heap handles to release.
    pub fn needs_destructor(&self) -> bool {
        !self
            .flags
            .intersects(PropertyFlags::IS_PLAIN_OLD_DATA | PropertyFlags::NO_DESTRUCTOR)
    }

    /// Offset `(offset, size)` range fits inside `[0, container_size)`.
    pub fn is_in_container(&self, container_size: usize) -> bool {
        self.offset + self.size() <= container_size
    }

    /// Whether this property takes part in the given archive.
    pub fn should_serialize(&self, ctx: &ArchiveContext, saving: bool) -> bool {
        if self.flags.contains(PropertyFlags::SKIP_SERIALIZATION) {
            return false;
        }
        if self.flags.contains(PropertyFlags::TRANSIENT) && ctx.persistent {
            return false;
        }
        if self.flags.contains(PropertyFlags::DEPRECATED) && saving {
            return false;
        }
        if ctx.save_game && !self.flags.contains(PropertyFlags::SAVE_GAME) {
            return false;
        }
        if saving && ctx.filter_editor_only && self.is_editor_only() {
            return false;
        }
        true
    }

    /// Place the property after `cumulative` bytes and return the new
    /// cumulative size. `resolved` is the struct this property (or its array
    /// element) refers to, if any.
    pub(crate) fn link(&mut self, cumulative: usize, resolved: Option<&ResolvedStruct>) -> usize {
        let (size, alignment) = self.element_layout(resolved);
        self.element_size = size;
        self.alignment = alignment;
        self.offset = align_up(cumulative, alignment);
        self.refresh_capabilities(resolved);
        self.linked = true;
        self.offset + self.size()
    }

    /// Recompute the element size without moving the property. Returns the
    /// previous size when it changed.
    pub(crate) fn link_without_changing_offset(
        &mut self,
        resolved: Option<&ResolvedStruct>,
    ) -> Option<usize> {
        let (size, alignment) = self.element_layout(resolved);
        let previous = self.element_size;
        self.element_size = size;
        self.alignment = alignment;
        self.refresh_capabilities(resolved);
        self.linked = true;
        (previous != size).then_some(previous)
    }

    fn element_layout(&self, resolved: Option<&ResolvedStruct>) -> (usize, usize) {
        match (&self.kind, resolved) {
            (PropertyKind::Struct { .. }, Some(info)) => (info.size, info.alignment.max(1)),
            (PropertyKind::Struct { .. }, None) => (0, 1),
            (kind, _) => kind.primitive_layout().unwrap_or((0, 1)),
        }
    }

    fn refresh_capabilities(&mut self, resolved: Option<&ResolvedStruct>) {
        self.flags.remove(PropertyFlags::COMPUTED);
        self.struct_id = resolved.map(|info| info.id);

        let plain = PropertyFlags::IS_PLAIN_OLD_DATA
            | PropertyFlags::NO_DESTRUCTOR
            | PropertyFlags::ZERO_CONSTRUCTOR;
        match &self.kind {
            PropertyKind::Str | PropertyKind::Text | PropertyKind::Array { .. } => {
                self.flags.insert(PropertyFlags::ZERO_CONSTRUCTOR);
            }
            PropertyKind::Struct { .. } => {
                if let Some(info) = resolved {
                    self.flags.set(
                        PropertyFlags::ZERO_CONSTRUCTOR,
                        info.flags.contains(StructFlags::ZERO_CONSTRUCTOR),
                    );
                    self.flags.set(
                        PropertyFlags::IS_PLAIN_OLD_DATA,
                        info.flags.contains(StructFlags::IS_PLAIN_OLD_DATA),
                    );
                    self.flags.set(
                        PropertyFlags::NO_DESTRUCTOR,
                        info.flags.contains(StructFlags::NO_DESTRUCTOR),
                    );
                    // A property of a never-persisted type can't be persisted either.
                    if info.flags.contains(StructFlags::TRANSIENT) {
                        self.flags.insert(PropertyFlags::TRANSIENT);
                    }
                }
            }
            _ => self.flags.insert(plain),
        }

        let through_struct = |f: fn(&ResolvedStruct) -> bool| resolved.map(f).unwrap_or(false);
        self.contains_object_reference = self.kind.holds_object_reference()
            || through_struct(|info| info.contains_object_reference);
        self.contains_weak_reference = self.kind.holds_weak_reference()
            || through_struct(|info| info.contains_weak_reference);
    }
}
