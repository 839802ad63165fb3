// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide interned names.
//!
//! Name-typed property values are stored as a 32-bit index into this table, so
//! they are plain data inside an instance. Index 0 is `None`; the empty string
//! and the literal `"None"` both map to it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

const NONE_TEXT: &str = "None";

struct NameTable {
    by_text: HashMap<Arc<str>, u32>,
    entries: Vec<Arc<str>>,
}

impl NameTable {
    fn new() -> Self {
        let none: Arc<str> = Arc::from(NONE_TEXT);
        let mut by_text = HashMap::new();
        by_text.insert(Arc::clone(&none), 0);
        Self {
            by_text,
            entries: vec![none],
        }
    }
}

static NAMES: OnceLock<RwLock<NameTable>> = OnceLock::new();

fn table() -> &'static RwLock<NameTable> {
    NAMES.get_or_init(|| RwLock::new(NameTable::new()))
}

/// Interned, case-sensitive name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    pub const NONE: Name = Name(0);

    /// Intern `text`, returning the existing entry when already present.
    pub fn new(text: &str) -> Name {
        if text.is_empty() {
            return Name::NONE;
        }
        if let Some(index) = table().read().by_text.get(text) {
            return Name(*index);
        }
        let mut names = table().write();
        if let Some(index) = names.by_text.get(text) {
            return Name(*index);
        }
        let index = names.entries.len() as u32;
        let entry: Arc<str> = Arc::from(text);
        names.entries.push(Arc::clone(&entry));
        names.by_text.insert(entry, index);
        Name(index)
    }

    /// Look a name up without interning it.
    pub fn find(text: &str) -> Option<Name> {
        if text.is_empty() {
            return Some(Name::NONE);
        }
        table().read().by_text.get(text).map(|index| Name(*index))
    }

    /// Rebuild a name from a raw index read back from instance memory.
    pub fn from_index(index: u32) -> Option<Name> {
        if (index as usize) < table().read().entries.len() {
            Some(Name(index))
        } else {
            None
        }
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn text(self) -> Arc<str> {
        let names = table().read();
        names
            .entries
            .get(self.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from(NONE_TEXT))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.text())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}
