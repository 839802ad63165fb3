// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive cursors and the per-stream context that gates legacy behavior.

pub mod cursor;

pub use cursor::{ArchiveReader, ArchiveWriter, MAX_STRING_LEN};

/// Stream format version.
///
/// Records carry no version of their own; the enclosing stream does, and it
/// only gates a few legacy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion(pub u32);

impl FormatVersion {
    pub const INITIAL: Self = Self(0);

    /// Class flag bit 'placeable' became 'not placeable'.
    pub const CLASS_NOTPLACEABLE_ADDED: Self = Self(1);

    /// Array tags carry their inner wire type.
    pub const ARRAY_PROPERTY_INNER_TAGS: Self = Self(2);

    /// Struct tags carry the struct GUID.
    pub const STRUCT_GUID_IN_PROPERTY_TAG: Self = Self(3);

    pub const LATEST: Self = Self::STRUCT_GUID_IN_PROPERTY_TAG;
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

/// Flags forwarded to value comparison hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct PortFlags(pub u32);

impl PortFlags {
    pub const NONE: Self = Self(0);

    /// Comparison made to decide whether a value differs from its default.
    pub const DELTA_COMPARISON: Self = Self(0x0000_0001);

    pub const fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0
    }
}

/// Settings of one serialization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveContext {
    pub version: FormatVersion,
    /// Persistent archives never carry transient properties.
    pub persistent: bool,
    /// Save-game archives only carry `SAVE_GAME` properties.
    pub save_game: bool,
    /// Skip properties equal to their default when saving.
    pub delta: bool,
    /// Apply editor-only properties when loading.
    pub load_editor_only: bool,
    /// Drop editor-only properties when saving.
    pub filter_editor_only: bool,
    /// Name used in diagnostics.
    pub name: String,
}

impl Default for ArchiveContext {
    fn default() -> Self {
        Self {
            version: FormatVersion::LATEST,
            persistent: true,
            save_game: false,
            delta: true,
            load_editor_only: true,
            filter_editor_only: false,
            name: String::from("<memory>"),
        }
    }
}

impl ArchiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_delta(mut self, delta: bool) -> Self {
        self.delta = delta;
        self
    }

    pub fn for_save_game(mut self) -> Self {
        self.save_game = true;
        self
    }

    /// Cooked-style context: editor-only data is neither saved nor loaded.
    pub fn without_editor_data(mut self) -> Self {
        self.load_editor_only = false;
        self.filter_editor_only = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
