// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-only view of linked layouts for debug and editor tooling.

use crate::error::{Error, Result};
use crate::property::{Property, PropertyFlags, WireType};
use crate::types::{TypeId, TypeRegistry};
use std::fmt;

/// One row of [`describe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    /// Type that declares the property
    pub owner: String,
    pub offset: usize,
    pub element_size: usize,
    pub array_dim: usize,
    pub wire_type: WireType,
    pub flags: PropertyFlags,
}

impl PropertyInfo {
    pub fn size(&self) -> usize {
        self.element_size * self.array_dim
    }
}

impl fmt::Display for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}  {:<24} {:<18}", self.offset, self.name, self.wire_type.as_str())?;
        if self.array_dim > 1 {
            write!(f, " [{} x {}]", self.array_dim, self.element_size)?;
        } else {
            write!(f, " {}", self.element_size)?;
        }
        write!(f, "  ({})", self.owner)?;
        let names = self.flags.names();
        if !names.is_empty() {
            write!(f, " {}", names.join("|"))?;
        }
        Ok(())
    }
}

/// Properties of a linked type in general-chain order, inherited ones first.
pub fn describe(registry: &TypeRegistry, id: TypeId) -> Result<Vec<PropertyInfo>> {
    let ty = registry.type_ref(id)?;
    if !ty.is_linked() {
        return Err(Error::NotLinked(ty.name().to_string()));
    }
    Ok(ty
        .chains()
        .general
        .iter()
        .filter_map(|r| {
            let prop = registry.property(*r)?;
            let owner = registry.get(r.owner)?;
            Some(PropertyInfo {
                name: prop.name().to_string(),
                owner: owner.name().to_string(),
                offset: prop.offset(),
                element_size: prop.element_size(),
                array_dim: prop.array_dim(),
                wire_type: prop.wire_type(),
                flags: prop.flags(),
            })
        })
        .collect())
}

/// Same storage: kind, offset, element size, dimension and declared flags.
/// Names only matter when `check_names` is set.
pub fn properties_same(a: &Property, b: &Property, check_names: bool) -> bool {
    let declared = |p: &Property| p.flags().bits() & !PropertyFlags::COMPUTED.bits();
    (!check_names || a.name() == b.name())
        && a.kind() == b.kind()
        && a.offset() == b.offset()
        && a.element_size() == b.element_size()
        && a.array_dim() == b.array_dim()
        && declared(a) == declared(b)
}

/// Two linked types store their values identically: same structure size and
/// pairwise matching properties in general-chain order.
pub fn same_layout(registry: &TypeRegistry, a: TypeId, b: TypeId, check_names: bool) -> Result<bool> {
    let ta = registry.type_ref(a)?;
    let tb = registry.type_ref(b)?;
    for ty in [ta, tb] {
        if !ty.is_linked() {
            return Err(Error::NotLinked(ty.name().to_string()));
        }
    }
    if ta.structure_size() != tb.structure_size() || ta.chains().general.len() != tb.chains().general.len() {
        return Ok(false);
    }
    Ok(ta
        .chains()
        .general
        .iter()
        .zip(&tb.chains().general)
        .all(|(ra, rb)| match (registry.property(*ra), registry.property(*rb)) {
            (Some(pa), Some(pb)) => properties_same(pa, pb, check_names),
            _ => false,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyKind;

    #[test]
    fn test_describe_lists_inherited_first() {
        let mut reg = TypeRegistry::new();
        let base = reg.declare_class("Actor", None).expect("declare");
        reg.add_property(base, Property::new("Tick", PropertyKind::Bool)).expect("add");
        let pawn = reg.declare_class("Pawn", Some("Actor")).expect("declare");
        reg.add_property(pawn, Property::new("Speed", PropertyKind::Double)).expect("add");
        reg.link_all().expect("link");

        let rows = describe(&reg, pawn).expect("describe");
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].name.as_str(), rows[0].owner.as_str()), ("Tick", "Actor"));
        assert_eq!(rows[1].offset, 8);
        assert_eq!(rows[1].wire_type, WireType::Double);
        assert!(rows[1].to_string().contains("DoubleProperty"));
    }

    #[test]
    fn test_same_layout_with_and_without_names() {
        let mut reg = TypeRegistry::new();
        let a = reg.declare_struct("A", None).expect("declare");
        reg.add_property(a, Property::new("X", PropertyKind::Float)).expect("add");
        reg.add_property(a, Property::new("Y", PropertyKind::Float)).expect("add");
        let b = reg.declare_struct("B", None).expect("declare");
        reg.add_property(b, Property::new("U", PropertyKind::Float)).expect("add");
        reg.add_property(b, Property::new("V", PropertyKind::Float)).expect("add");
        let c = reg.declare_struct("C", None).expect("declare");
        reg.add_property(c, Property::new("X", PropertyKind::Int)).expect("add");
        reg.add_property(c, Property::new("Y", PropertyKind::Float)).expect("add");
        reg.link_all().expect("link");

        assert!(same_layout(&reg, a, b, false).expect("compare"));
        assert!(!same_layout(&reg, a, b, true).expect("compare"));
        assert!(!same_layout(&reg, a, c, false).expect("compare"));
    }

    #[test]
    fn test_unlinked_type_is_rejected() {
        let mut reg = TypeRegistry::new();
        let id = reg.declare_struct("Later", None).expect("declare");
        assert!(matches!(describe(&reg, id), Err(Error::NotLinked(_))));
    }
}
