// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: owns every composite type, global enums, redirect tables,
//! class default instances and the hierarchy index.
//!
//! Declaration and linking need `&mut TypeRegistry` (single writer). Once the
//! types a caller needs are linked, the registry can be shared behind an
//! `Arc` for concurrent serialization.

use super::{CompositeKind, CompositeType, LinkState, PropRef, TypeId};
use crate::error::{Error, Result};
use crate::field::{EnumDef, Field};
use crate::guid::Guid;
use crate::hierarchy::HierarchyIndex;
use crate::instance::Instance;
use crate::link::{self, LinkOutcome};
use crate::ops::StructOpsRegistry;
use crate::property::{ClassFlags, Property, ResolvedStruct, StructFlags};
use crate::redirect::RedirectTable;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Hook run on every own property of a type at each link pass. It may rename
/// or re-flag the property; either change restarts the pass.
pub type LinkFixup = Arc<dyn Fn(&str, &mut Property) + Send + Sync>;

pub struct TypeRegistry {
    types: Vec<Option<CompositeType>>,
    by_name: HashMap<String, TypeId>,
    enums: HashMap<String, EnumDef>,
    redirects: RedirectTable,
    hierarchy: HierarchyIndex,
    ops: Arc<StructOpsRegistry>,
    defaults: HashMap<TypeId, Instance>,
    link_fixup: Option<LinkFixup>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Registry bound to the process-wide struct-ops table.
    pub fn new() -> Self {
        Self::with_ops(StructOpsRegistry::global())
    }

    /// Registry bound to a private struct-ops table.
    pub fn with_ops(ops: Arc<StructOpsRegistry>) -> Self {
        Self {
            types: Vec::new(),
            by_name: HashMap::new(),
            enums: HashMap::new(),
            redirects: RedirectTable::new(),
            hierarchy: HierarchyIndex::new(),
            ops,
            defaults: HashMap::new(),
            link_fixup: None,
        }
    }

    // ------------------------------------------------------------------------
    // Declaration
    // ------------------------------------------------------------------------

    pub fn declare_struct(&mut self, name: &str, parent: Option<&str>) -> Result<TypeId> {
        self.declare(name, CompositeKind::Struct, parent)
    }

    pub fn declare_class(&mut self, name: &str, parent: Option<&str>) -> Result<TypeId> {
        self.declare(name, CompositeKind::Class, parent)
    }

    fn declare(&mut self, name: &str, kind: CompositeKind, parent: Option<&str>) -> Result<TypeId> {
        if name.is_empty() {
            return Err(Error::Declaration("type name must not be empty".into()));
        }
        if self.by_name.contains_key(name) {
            return Err(Error::Declaration(format!("type '{}' already declared", name)));
        }
        let parent_id = match parent {
            Some(parent_name) => {
                let pid = self.require(parent_name)?;
                let parent_kind = self.type_ref(pid)?.kind();
                if parent_kind != kind {
                    return Err(Error::Declaration(format!(
                        "'{}' cannot derive from '{}' of a different kind",
                        name, parent_name
                    )));
                }
                Some(pid)
            }
            None => None,
        };

        let id = TypeId::from_index(self.types.len() as u32);
        self.types
            .push(Some(CompositeType::new(id, name, kind, parent_id)));
        self.by_name.insert(name.to_string(), id);
        self.hierarchy.register(id, parent_id);
        log::debug!("[types] declared {:?} '{}' as {}", kind, name, id);
        Ok(id)
    }

    /// Append a property to `id`. Returns its field index.
    pub fn add_property(&mut self, id: TypeId, property: Property) -> Result<usize> {
        let ty = self.type_mut(id)?;
        if ty.fields.iter().any(|f| f.name() == property.name()) {
            return Err(Error::Declaration(format!(
                "'{}' already has a field named '{}'",
                ty.name,
                property.name()
            )));
        }
        ty.fields.push(Field::Property(property));
        let index = ty.fields.len() - 1;
        self.invalidate(id);
        Ok(index)
    }

    /// Remove a property by name. Inherited properties are untouched.
    pub fn remove_property(&mut self, id: TypeId, name: &str) -> Result<Property> {
        let ty = self.type_mut(id)?;
        let position = ty
            .fields
            .iter()
            .position(|f| f.as_property().is_some_and(|p| p.name() == name))
            .ok_or_else(|| Error::UnknownProperty {
                type_name: ty.name.clone(),
                property: name.to_string(),
            })?;
        let removed = ty.fields.remove(position);
        self.invalidate(id);
        match removed {
            Field::Property(property) => Ok(property),
            Field::Enum(_) => Err(Error::Declaration(format!("'{}' is an enum", name))),
        }
    }

    /// Mutable access to one own property. Marks the type unlinked.
    pub fn property_mut(&mut self, id: TypeId, name: &str) -> Result<&mut Property> {
        self.invalidate(id);
        let ty = self.type_mut(id)?;
        let type_name = ty.name.clone();
        ty.fields
            .iter_mut()
            .filter_map(Field::as_property_mut)
            .find(|p| p.name() == name)
            .ok_or(Error::UnknownProperty {
                type_name,
                property: name.to_string(),
            })
    }

    /// Register an enum, scoped to `scope` or global when `None`.
    pub fn add_enum(&mut self, scope: Option<TypeId>, def: EnumDef) -> Result<()> {
        match scope {
            Some(id) => {
                let ty = self.type_mut(id)?;
                if ty.fields.iter().any(|f| f.name() == def.name()) {
                    return Err(Error::Declaration(format!(
                        "'{}' already has a field named '{}'",
                        ty.name,
                        def.name()
                    )));
                }
                ty.fields.push(Field::Enum(def));
            }
            None => {
                self.enums.insert(def.name().to_string(), def);
            }
        }
        Ok(())
    }

    pub fn set_struct_flags(&mut self, id: TypeId, flags: StructFlags) -> Result<()> {
        let ty = self.type_mut(id)?;
        // Only declared bits are caller-owned; computed ones belong to the linker.
        let computed = StructFlags::from_bits(ty.struct_flags.bits() & StructFlags::COMPUTED.bits());
        let declared = StructFlags::from_bits(flags.bits() & !StructFlags::COMPUTED.bits());
        ty.struct_flags = declared | computed;
        self.invalidate(id);
        Ok(())
    }

    pub fn set_class_flags(&mut self, id: TypeId, flags: ClassFlags) -> Result<()> {
        self.type_mut(id)?.class_flags = flags;
        self.invalidate(id);
        Ok(())
    }

    /// Identity under which records saved with another struct name are accepted.
    pub fn set_custom_guid(&mut self, id: TypeId, guid: Guid) -> Result<()> {
        self.type_mut(id)?.custom_guid = Some(guid);
        Ok(())
    }

    /// Re-parent `id`. The hierarchy index entry is removed and registered again.
    pub fn set_parent(&mut self, id: TypeId, parent: Option<TypeId>) -> Result<()> {
        if let Some(pid) = parent {
            let kind = self.type_ref(id)?.kind();
            if self.type_ref(pid)?.kind() != kind {
                return Err(Error::Declaration(format!(
                    "'{}' cannot derive from a type of a different kind",
                    self.type_ref(id)?.name
                )));
            }
            if self.ancestry(pid).contains(&id) {
                return Err(Error::Declaration(format!(
                    "'{}' cannot derive from its own descendant '{}'",
                    self.type_ref(id)?.name,
                    self.type_ref(pid)?.name
                )));
            }
        }
        self.type_mut(id)?.parent = parent;
        self.hierarchy.unregister(id);
        self.hierarchy.register(id, parent);
        self.invalidate(id);
        Ok(())
    }

    /// Unload a type. Subtypes stay declared and become hierarchy orphans.
    pub fn remove_type(&mut self, id: TypeId) -> Result<CompositeType> {
        self.invalidate(id);
        let ty = self
            .types
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| Error::UnknownType(id.to_string()))?;
        self.by_name.remove(&ty.name);
        self.defaults.remove(&id);
        self.hierarchy.unregister(id);
        log::debug!("[types] removed '{}'", ty.name);
        Ok(ty)
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<TypeId> {
        self.find(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn get(&self, id: TypeId) -> Option<&CompositeType> {
        self.types.get(id.index()).and_then(Option::as_ref)
    }

    pub fn type_ref(&self, id: TypeId) -> Result<&CompositeType> {
        self.get(id)
            .ok_or_else(|| Error::UnknownType(id.to_string()))
    }

    pub(crate) fn get_mut(&mut self, id: TypeId) -> Option<&mut CompositeType> {
        self.types.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn type_mut(&mut self, id: TypeId) -> Result<&mut CompositeType> {
        self.get_mut(id)
            .ok_or_else(|| Error::UnknownType(id.to_string()))
    }

    /// Live type ids in declaration order.
    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types.iter().flatten().map(CompositeType::id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// `id` followed by its ancestors, most-derived first.
    pub fn ancestry(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            // Guard against a malformed parent cycle.
            if chain.contains(&cid) {
                break;
            }
            match self.get(cid) {
                Some(ty) => {
                    chain.push(cid);
                    current = ty.parent;
                }
                None => break,
            }
        }
        chain
    }

    /// Names of `id` and its ancestors, most-derived first.
    pub fn owner_names(&self, id: TypeId) -> Vec<&str> {
        self.ancestry(id)
            .into_iter()
            .filter_map(|t| self.get(t).map(CompositeType::name))
            .collect()
    }

    /// Every property of `id`, parent properties first.
    pub fn all_properties(&self, id: TypeId) -> Vec<PropRef> {
        let mut refs = Vec::new();
        for owner in self.ancestry(id).into_iter().rev() {
            if let Some(ty) = self.get(owner) {
                refs.extend(ty.own_properties().map(|(field, _)| PropRef { owner, field }));
            }
        }
        refs
    }

    pub fn property(&self, prop: PropRef) -> Option<&Property> {
        self.get(prop.owner)
            .and_then(|ty| ty.fields.get(prop.field))
            .and_then(Field::as_property)
    }

    pub(crate) fn property_at_mut(&mut self, prop: PropRef) -> Option<&mut Property> {
        self.get_mut(prop.owner)
            .and_then(|ty| ty.fields.get_mut(prop.field))
            .and_then(Field::as_property_mut)
    }

    /// Property named `name` on `id` or an ancestor, most-derived first.
    pub fn find_property(&self, id: TypeId, name: &str) -> Option<PropRef> {
        self.ancestry(id).into_iter().find_map(|owner| {
            self.get(owner)?
                .own_properties()
                .find(|(_, p)| p.name() == name)
                .map(|(field, _)| PropRef { owner, field })
        })
    }

    /// Enum visible from `scope`: the type and its ancestors first, then globals.
    pub fn find_enum(&self, scope: Option<TypeId>, name: &str) -> Option<&EnumDef> {
        let scoped = scope.and_then(|id| {
            self.ancestry(id).into_iter().find_map(|owner| {
                self.get(owner)?
                    .fields
                    .iter()
                    .filter_map(Field::as_enum)
                    .find(|def| def.name() == name)
            })
        });
        scoped.or_else(|| self.enums.get(name))
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDef> {
        self.enums.values()
    }

    /// Layout facts of a linked struct, as seen by properties that embed it.
    pub fn struct_info(&self, id: TypeId) -> Option<ResolvedStruct> {
        let ty = self.get(id)?;
        let (object, weak) = ty.chains.reference.iter().fold((false, false), |acc, r| {
            match self.property(*r) {
                Some(p) => (
                    acc.0 || p.contains_object_reference(),
                    acc.1 || p.contains_weak_reference(),
                ),
                None => acc,
            }
        });
        Some(ResolvedStruct {
            id,
            name: ty.name.clone(),
            size: ty.structure_size(),
            alignment: ty.min_alignment,
            flags: ty.struct_flags,
            contains_object_reference: object
                || ty.struct_flags.contains(StructFlags::ADD_STRUCT_REFERENCED_OBJECTS),
            contains_weak_reference: weak,
        })
    }

    pub fn is_child_of(&self, child: TypeId, parent: TypeId) -> bool {
        self.hierarchy.is_child_of(child, parent)
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    // ------------------------------------------------------------------------
    // Redirects, ops, hooks
    // ------------------------------------------------------------------------

    pub fn redirects(&self) -> &RedirectTable {
        &self.redirects
    }

    pub fn redirects_mut(&mut self) -> &mut RedirectTable {
        &mut self.redirects
    }

    pub fn ops_registry(&self) -> &Arc<StructOpsRegistry> {
        &self.ops
    }

    pub fn set_link_fixup(&mut self, fixup: Option<LinkFixup>) {
        self.link_fixup = fixup;
    }

    pub(crate) fn link_fixup(&self) -> Option<LinkFixup> {
        self.link_fixup.clone()
    }

    // ------------------------------------------------------------------------
    // Linking
    // ------------------------------------------------------------------------

    /// Link one type. See [`link::link_type`].
    pub fn link(&mut self, id: TypeId, relink_existing: bool) -> Result<LinkOutcome> {
        Ok(link::link_type(self, id, relink_existing)?)
    }

    pub fn link_by_name(&mut self, name: &str) -> Result<LinkOutcome> {
        let id = self.require(name)?;
        self.link(id, true)
    }

    /// Fully link every type not currently linked, in declaration order.
    pub fn link_all(&mut self) -> Result<Vec<(TypeId, LinkOutcome)>> {
        let ids: Vec<TypeId> = self.type_ids().collect();
        let mut outcomes = Vec::new();
        for id in ids {
            if !self.type_ref(id)?.is_linked() {
                outcomes.push((id, self.link(id, true)?));
            }
        }
        Ok(outcomes)
    }

    /// Mark `id` and everything whose layout depends on it as unlinked.
    pub(crate) fn invalidate(&mut self, id: TypeId) {
        if let Some(ty) = self.get_mut(id) {
            ty.link_state = LinkState::Unlinked;
        }
        self.invalidate_dependents(id);
    }

    /// Unlink subtypes and types that embed `id` by value, transitively.
    pub(crate) fn invalidate_dependents(&mut self, id: TypeId) {
        let mut pending = vec![id];
        let mut seen = vec![id];
        while let Some(changed) = pending.pop() {
            let Some(changed_name) = self.get(changed).map(|t| t.name.clone()) else {
                continue;
            };
            let dependents: Vec<TypeId> = self
                .types
                .iter()
                .flatten()
                .filter(|ty| !seen.contains(&ty.id))
                .filter(|ty| {
                    ty.parent == Some(changed)
                        || ty.own_properties().any(|(_, p)| {
                            p.kind()
                                .struct_name()
                                .is_some_and(|s| self.redirects.resolve_struct(s) == changed_name)
                        })
                })
                .map(CompositeType::id)
                .collect();
            for dep in dependents {
                seen.push(dep);
                if let Some(ty) = self.get_mut(dep) {
                    if ty.link_state == LinkState::Linked {
                        log::debug!("[types] '{}' unlinked: depends on '{}'", ty.name, changed_name);
                        ty.link_state = LinkState::Unlinked;
                    }
                }
                pending.push(dep);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Class defaults
    // ------------------------------------------------------------------------

    /// Store the canonical default instance of a class.
    pub fn set_default_instance(&mut self, instance: Instance) -> Result<()> {
        let id = instance.type_id();
        self.type_ref(id)?;
        self.defaults.insert(id, instance);
        Ok(())
    }

    pub fn default_instance(&self, id: TypeId) -> Option<&Instance> {
        self.defaults.get(&id)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .field("enums", &self.enums.len())
            .field("redirects", &self.redirects)
            .field("defaults", &self.defaults.len())
            .field("link_fixup", &self.link_fixup.is_some())
            .finish()
    }
}
