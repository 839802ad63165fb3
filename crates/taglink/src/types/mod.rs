// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Composite types (structs and classes) and the registry that owns them.
//!
//! A [`CompositeType`] owns its declared [`Field`]s in declaration order and,
//! once linked, the four traversal chains. Chains are plain vectors of
//! [`PropRef`]s rebuilt on every link, so relinking never leaves a dangling link.

pub mod registry;

pub use registry::{LinkFixup, TypeRegistry};

use crate::field::Field;
use crate::guid::Guid;
use crate::ops::StructOps;
use crate::property::{align_up, ClassFlags, Property, StructFlags};
use std::fmt;
use std::sync::Arc;

/// Index of a composite type inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A property addressed by owning type and field index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropRef {
    pub owner: TypeId,
    pub field: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Struct,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Unlinked,
    /// Link in progress; seeing this state again means a by-value cycle.
    Linking,
    Linked,
}

/// The four traversal chains, parent properties first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chains {
    /// Every property
    pub general: Vec<PropRef>,
    /// Properties that must be destroyed explicitly
    pub destructor: Vec<PropRef>,
    /// Properties that may hold strong or weak object references
    pub reference: Vec<PropRef>,
    /// Properties copied from the class default after construction
    pub post_construct: Vec<PropRef>,
}

/// One replicated slot: a net property and one of its static array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepRecord {
    pub property: PropRef,
    pub index: usize,
}

#[derive(Clone)]
pub struct CompositeType {
    pub(crate) id: TypeId,
    pub(crate) name: String,
    pub(crate) kind: CompositeKind,
    pub(crate) parent: Option<TypeId>,
    pub(crate) fields: Vec<Field>,
    pub(crate) struct_flags: StructFlags,
    pub(crate) class_flags: ClassFlags,
    pub(crate) custom_guid: Option<Guid>,

    // Computed by the linker
    pub(crate) properties_size: usize,
    pub(crate) min_alignment: usize,
    /// Parent's properties size at the last full link
    pub(crate) base_size: usize,
    pub(crate) layout_fingerprint: u64,
    pub(crate) chains: Chains,
    pub(crate) ops: Option<Arc<StructOps>>,
    pub(crate) ops_inherited: bool,
    pub(crate) link_state: LinkState,
    pub(crate) net_fields: Vec<PropRef>,
    pub(crate) class_reps: Vec<RepRecord>,
    /// Successful links so far
    pub(crate) link_generation: u32,
}

impl CompositeType {
    pub(crate) fn new(id: TypeId, name: &str, kind: CompositeKind, parent: Option<TypeId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            parent,
            fields: Vec::new(),
            struct_flags: StructFlags::empty(),
            class_flags: ClassFlags::empty(),
            custom_guid: None,
            properties_size: 0,
            min_alignment: 1,
            base_size: 0,
            layout_fingerprint: 0,
            chains: Chains::default(),
            ops: None,
            ops_inherited: false,
            link_state: LinkState::Unlinked,
            net_fields: Vec::new(),
            class_reps: Vec::new(),
            link_generation: 0,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    pub fn is_class(&self) -> bool {
        self.kind == CompositeKind::Class
    }

    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Own properties in declaration order, with their field index.
    pub fn own_properties(&self) -> impl Iterator<Item = (usize, &Property)> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(i, field)| field.as_property().map(|p| (i, p)))
    }

    pub fn struct_flags(&self) -> StructFlags {
        self.struct_flags
    }

    pub fn class_flags(&self) -> ClassFlags {
        self.class_flags
    }

    /// Identity used to accept records saved under another struct name.
    /// Invalid (zero) unless one was assigned.
    pub fn custom_guid(&self) -> Guid {
        self.custom_guid.unwrap_or_default()
    }

    /// Size of the property area, before tail padding.
    pub fn properties_size(&self) -> usize {
        self.properties_size
    }

    pub fn min_alignment(&self) -> usize {
        self.min_alignment
    }

    /// Bytes per instance: properties size rounded up to the alignment.
    pub fn structure_size(&self) -> usize {
        align_up(self.properties_size, self.min_alignment)
    }

    pub fn chains(&self) -> &Chains {
        &self.chains
    }

    pub fn ops(&self) -> Option<&Arc<StructOps>> {
        self.ops.as_ref()
    }

    /// The bound ops came from a base struct.
    pub fn ops_inherited(&self) -> bool {
        self.ops_inherited
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn is_linked(&self) -> bool {
        self.link_state == LinkState::Linked
    }

    /// Number of successful links, 0 for a type never linked.
    /// Digest of every property's name, kind and placement as of the last link.
    /// Equal fingerprints mean instance bytes are interchangeable.
    pub fn layout_fingerprint(&self) -> u64 {
        self.layout_fingerprint
    }

    pub fn link_generation(&self) -> u32 {
        self.link_generation
    }

    /// Own net properties, sorted by name.
    pub fn net_fields(&self) -> &[PropRef] {
        &self.net_fields
    }

    /// Replication records: parent records, then own net properties by offset.
    pub fn class_reps(&self) -> &[RepRecord] {
        &self.class_reps
    }

    /// Owned by a native or intrinsic class: the native destructor covers it.
    pub(crate) fn is_native_class(&self) -> bool {
        self.kind == CompositeKind::Class
            && self
                .class_flags
                .intersects(ClassFlags::NATIVE | ClassFlags::INTRINSIC)
    }

    /// Copies config properties from the class default.
    pub(crate) fn copies_config_from_default(&self) -> bool {
        self.kind == CompositeKind::Class && !self.class_flags.contains(ClassFlags::PER_OBJECT_CONFIG)
    }

    /// Serialized through native ops or as an untagged blob.
    pub fn uses_binary_or_native_serialization(&self) -> bool {
        self.struct_flags
            .intersects(StructFlags::SERIALIZE_NATIVE | StructFlags::IMMUTABLE)
    }
}

impl fmt::Debug for CompositeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("fields", &self.fields.len())
            .field("properties_size", &self.properties_size)
            .field("min_alignment", &self.min_alignment)
            .field("link_state", &self.link_state)
            .field("link_generation", &self.link_generation)
            .field("has_ops", &self.ops.is_some())
            .finish()
    }
}
