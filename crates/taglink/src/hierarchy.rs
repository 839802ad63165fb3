// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fast "is subtype of" index.
//!
//! Every registered type occupies one slot of a dense array; its subtypes
//! occupy the `num_children` slots right after it. `is_child_of(a, b)` is then
//! a range check.
//!
//! Types whose parent is not registered yet are kept as orphans and inserted
//! automatically when the parent arrives. Unregistering a type orphans its
//! whole subtree.
//!
//! Mutations take the write lock. Queries take the shared read lock, so they
//! never contend with each other.

use crate::types::TypeId;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    id: TypeId,
    parent: Option<TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    index: usize,
    num_children: usize,
}

#[derive(Debug, Default)]
struct TreeState {
    entries: Vec<Entry>,
    slots: HashMap<TypeId, Slot>,
    /// orphan -> its declared parent
    orphans: HashMap<TypeId, Option<TypeId>>,
}

/// Result of [`HierarchyIndex::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Inserted into the index (with `reattached` former orphans).
    Registered { reattached: usize },
    /// Parent missing; parked until it registers.
    Orphaned,
    AlreadyPresent,
}

#[derive(Debug, Default)]
pub struct HierarchyIndex {
    state: RwLock<TreeState>,
}

impl HierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: TypeId, parent: Option<TypeId>) -> Registration {
        let mut state = self.state.write();
        if state.slots.contains_key(&id) || state.orphans.contains_key(&id) {
            log::debug!("[hierarchy] {} already registered", id);
            return Registration::AlreadyPresent;
        }

        if !state.insert(id, parent) {
            log::debug!("[hierarchy] {} orphaned until {:?} registers", id, parent);
            return Registration::Orphaned;
        }

        // Re-register orphans waiting on anything we just inserted.
        let mut reattached = 0;
        let mut ready = vec![id];
        while let Some(arrived) = ready.pop() {
            let waiting: Vec<TypeId> = state
                .orphans
                .iter()
                .filter(|(_, parent)| **parent == Some(arrived))
                .map(|(orphan, _)| *orphan)
                .collect();
            for orphan in waiting {
                state.orphans.remove(&orphan);
                if state.insert(orphan, Some(arrived)) {
                    reattached += 1;
                    ready.push(orphan);
                }
            }
        }
        Registration::Registered { reattached }
    }

    /// Remove `id`; its registered subtypes become orphans. Returns `false`
    /// when `id` was unknown.
    pub fn unregister(&self, id: TypeId) -> bool {
        let mut state = self.state.write();
        if state.orphans.remove(&id).is_some() {
            return true;
        }
        let Some(slot) = state.slots.get(&id).copied() else {
            return false;
        };

        let start = slot.index;
        let removed = slot.num_children + 1;
        let parent = state.entries[start].parent;

        for entry in state.entries[start + 1..start + removed].to_vec() {
            state.slots.remove(&entry.id);
            state.orphans.insert(entry.id, entry.parent);
        }
        state.slots.remove(&id);

        for entry in state.entries[start + removed..].to_vec() {
            if let Some(s) = state.slots.get_mut(&entry.id) {
                s.index -= removed;
            }
        }

        let mut ancestor = parent;
        while let Some(a) = ancestor {
            ancestor = state.parent_of_registered(a);
            if let Some(s) = state.slots.get_mut(&a) {
                s.num_children -= removed;
            }
        }

        state.entries.drain(start..start + removed);
        true
    }

    /// `a` is `b` or derives from it. Unregistered and orphaned types are only
    /// children of themselves.
    pub fn is_child_of(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let state = self.state.read();
        match (state.slots.get(&a), state.slots.get(&b)) {
            (Some(sa), Some(sb)) => {
                sa.index >= sb.index && sa.index - sb.index <= sb.num_children
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.state.read().slots.contains_key(&id)
    }

    pub fn is_orphan(&self, id: TypeId) -> bool {
        self.state.read().orphans.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn orphan_count(&self) -> usize {
        self.state.read().orphans.len()
    }

    /// `(index, num_children)` of a registered type.
    pub fn slot(&self, id: TypeId) -> Option<(usize, usize)> {
        self.state
            .read()
            .slots
            .get(&id)
            .map(|s| (s.index, s.num_children))
    }

    /// `id` and all of its registered subtypes, in index order.
    pub fn subtree(&self, id: TypeId) -> Vec<TypeId> {
        let state = self.state.read();
        match state.slots.get(&id) {
            Some(s) => state.entries[s.index..=s.index + s.num_children]
                .iter()
                .map(|e| e.id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Most-derived type both `a` and `b` derive from.
    pub fn find_common_base(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let mut common = Some(a);
        while let Some(candidate) = common {
            if self.is_child_of(b, candidate) {
                return Some(candidate);
            }
            common = self.state.read().parent_of_registered(candidate);
        }
        None
    }

    /// Common base of every type in `ids`.
    pub fn find_common_base_of(&self, ids: &[TypeId]) -> Option<TypeId> {
        let (first, rest) = ids.split_first()?;
        rest.iter()
            .try_fold(*first, |common, id| self.find_common_base(common, *id))
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), String> {
        let state = self.state.read();
        if state.entries.len() != state.slots.len() {
            return Err(format!(
                "{} entries but {} slots",
                state.entries.len(),
                state.slots.len()
            ));
        }
        for (position, entry) in state.entries.iter().enumerate() {
            let slot = state
                .slots
                .get(&entry.id)
                .ok_or_else(|| format!("{} has no slot", entry.id))?;
            if slot.index != position {
                return Err(format!(
                    "{} thinks it is at {} but sits at {}",
                    entry.id, slot.index, position
                ));
            }
            if state.orphans.contains_key(&entry.id) {
                return Err(format!("{} is both registered and orphaned", entry.id));
            }
            if position + slot.num_children >= state.entries.len() + usize::from(slot.num_children == 0) {
                return Err(format!("{} subtree runs past the end", entry.id));
            }
            if let Some(parent) = entry.parent {
                let ps = state
                    .slots
                    .get(&parent)
                    .ok_or_else(|| format!("parent {} of {} is not registered", parent, entry.id))?;
                if position <= ps.index || position - ps.index > ps.num_children {
                    return Err(format!("{} is outside the range of parent {}", entry.id, parent));
                }
            }
        }
        Ok(())
    }
}

impl TreeState {
    /// Insert a type whose parent (if any) is registered. Returns `false` and
    /// parks the type as an orphan otherwise.
    fn insert(&mut self, id: TypeId, parent: Option<TypeId>) -> bool {
        let new_index = match parent {
            Some(p) => match self.slots.get(&p) {
                Some(ps) if !self.orphans.contains_key(&p) => ps.index + ps.num_children + 1,
                _ => {
                    self.orphans.insert(id, parent);
                    return false;
                }
            },
            None => self.entries.len(),
        };

        for entry in &self.entries[new_index..] {
            if let Some(s) = self.slots.get_mut(&entry.id) {
                s.index += 1;
            }
        }

        let mut ancestor = parent;
        while let Some(a) = ancestor {
            ancestor = self.parent_of_registered(a);
            if let Some(s) = self.slots.get_mut(&a) {
                s.num_children += 1;
            }
        }

        self.entries.insert(new_index, Entry { id, parent });
        self.slots.insert(
            id,
            Slot {
                index: new_index,
                num_children: 0,
            },
        );
        true
    }

    fn parent_of_registered(&self, id: TypeId) -> Option<TypeId> {
        self.slots
            .get(&id)
            .and_then(|s| self.entries.get(s.index))
            .and_then(|e| e.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> TypeId {
        TypeId::from_index(n)
    }

    #[test]
    fn test_register_builds_contiguous_subtrees() {
        let index = HierarchyIndex::new();
        index.register(id(0), None);
        index.register(id(1), Some(id(0)));
        index.register(id(2), Some(id(0)));
        index.register(id(3), Some(id(1)));

        assert!(index.is_child_of(id(3), id(0)));
        assert!(index.is_child_of(id(3), id(1)));
        assert!(!index.is_child_of(id(3), id(2)));
        assert!(!index.is_child_of(id(0), id(1)));
        assert_eq!(index.slot(id(0)), Some((0, 3)));
        assert_eq!(index.subtree(id(1)), vec![id(1), id(3)]);
        index.validate().expect("valid tree");
    }

    #[test]
    fn test_orphans_reattach_when_parent_arrives() {
        let index = HierarchyIndex::new();
        assert_eq!(index.register(id(2), Some(id(1))), Registration::Orphaned);
        assert_eq!(index.register(id(3), Some(id(2))), Registration::Orphaned);
        assert_eq!(index.register(id(1), Some(id(0))), Registration::Orphaned);
        assert_eq!(
            index.register(id(0), None),
            Registration::Registered { reattached: 3 }
        );
        assert!(index.is_child_of(id(3), id(0)));
        assert_eq!(index.orphan_count(), 0);
        index.validate().expect("valid tree");
    }

    #[test]
    fn test_unregister_orphans_subtree() {
        let index = HierarchyIndex::new();
        index.register(id(0), None);
        index.register(id(1), Some(id(0)));
        index.register(id(2), Some(id(1)));
        index.register(id(3), Some(id(0)));

        assert!(index.unregister(id(1)));
        assert!(index.is_orphan(id(2)));
        assert!(!index.is_child_of(id(2), id(0)));
        assert_eq!(index.slot(id(0)), Some((0, 1)));
        assert_eq!(index.slot(id(3)), Some((1, 0)));
        index.validate().expect("valid after removal");

        index.register(id(1), Some(id(0)));
        assert!(index.is_child_of(id(2), id(0)));
        assert!(!index.unregister(id(42)));
    }

    #[test]
    fn test_common_base() {
        let index = HierarchyIndex::new();
        index.register(id(0), None);
        index.register(id(1), Some(id(0)));
        index.register(id(2), Some(id(1)));
        index.register(id(3), Some(id(1)));
        index.register(id(4), Some(id(0)));

        assert_eq!(index.find_common_base(id(2), id(3)), Some(id(1)));
        assert_eq!(index.find_common_base(id(2), id(4)), Some(id(0)));
        assert_eq!(index.find_common_base(id(1), id(2)), Some(id(1)));
        assert_eq!(index.find_common_base_of(&[id(2), id(3), id(4)]), Some(id(0)));
        assert_eq!(index.find_common_base_of(&[]), None);
    }
}
