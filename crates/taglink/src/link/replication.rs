// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-class replication tables built at link time.

use crate::types::{CompositeKind, PropRef, RepRecord, TypeId, TypeRegistry};

/// Rebuild `net_fields` and `class_reps` of a class and assign `rep_index`
/// to its own net properties. Structs get empty tables.
pub(crate) fn build(registry: &mut TypeRegistry, id: TypeId) {
    let Some(ty) = registry.get(id) else {
        return;
    };
    if ty.kind != CompositeKind::Class {
        if let Some(ty) = registry.get_mut(id) {
            ty.net_fields.clear();
            ty.class_reps.clear();
        }
        return;
    }

    let mut reps = ty
        .parent
        .and_then(|pid| registry.get(pid))
        .map(|parent| parent.class_reps.clone())
        .unwrap_or_default();

    // (name, offset, array_dim, field)
    let mut net: Vec<(String, usize, usize, usize)> = ty
        .own_properties()
        .filter(|(_, p)| p.is_net())
        .map(|(field, p)| (p.name().to_string(), p.offset(), p.array_dim(), field))
        .collect();

    let mut by_name = net.clone();
    by_name.sort_by(|a, b| a.0.cmp(&b.0));
    let net_fields: Vec<PropRef> = by_name
        .iter()
        .map(|(_, _, _, field)| PropRef { owner: id, field: *field })
        .collect();

    // Records follow memory order so replication walks the object linearly.
    net.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    let mut rep_indices = Vec::with_capacity(net.len());
    for (_, _, array_dim, field) in &net {
        let property = PropRef { owner: id, field: *field };
        rep_indices.push((property, reps.len()));
        reps.extend((0..*array_dim).map(|index| RepRecord { property, index }));
    }

    let own_fields: Vec<usize> = ty.own_properties().map(|(field, _)| field).collect();
    for field in own_fields {
        if let Some(prop) = registry.property_at_mut(PropRef { owner: id, field }) {
            prop.set_rep_index(None);
        }
    }
    for (property, rep_index) in rep_indices {
        if let Some(prop) = registry.property_at_mut(property) {
            prop.set_rep_index(Some(rep_index));
        }
    }
    if let Some(ty) = registry.get_mut(id) {
        ty.net_fields = net_fields;
        ty.class_reps = reps;
    }
}
