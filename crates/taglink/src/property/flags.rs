// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Property, struct and class flag sets.

use std::ops::{BitOr, BitOrAssign};

macro_rules! impl_flag_set {
    ($name:ident, $repr:ty, [$(($text:literal, $flag:ident)),* $(,)?]) => {
        impl $name {
            const NAMED: &'static [(&'static str, $name)] = &[$(($text, $name::$flag)),*];

            /// Empty flags
            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Declared flag by its schema spelling (`"transient"`, `"native"`, ...).
            pub fn from_name(name: &str) -> Option<Self> {
                Self::NAMED
                    .iter()
                    .find(|(text, _)| text.eq_ignore_ascii_case(name))
                    .map(|(_, flag)| *flag)
            }

            /// Schema spellings of every declared flag that is set.
            pub fn names(self) -> Vec<&'static str> {
                Self::NAMED
                    .iter()
                    .filter(|(_, flag)| self.contains(*flag))
                    .map(|(text, _)| *text)
                    .collect()
            }

            /// All bits of `flag` are set
            pub const fn contains(self, flag: Self) -> bool {
                (self.0 & flag.0) == flag.0
            }

            /// Any bit of `flag` is set
            pub const fn intersects(self, flag: Self) -> bool {
                (self.0 & flag.0) != 0
            }

            pub fn insert(&mut self, flag: Self) {
                self.0 |= flag.0;
            }

            pub fn remove(&mut self, flag: Self) {
                self.0 &= !flag.0;
            }

            pub fn set(&mut self, flag: Self, on: bool) {
                if on {
                    self.insert(flag);
                } else {
                    self.remove(flag);
                }
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

/// PropertyFlags - declared and link-computed property flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct PropertyFlags(pub u64);

impl PropertyFlags {
    /// Editable in tooling
    pub const EDIT: Self = Self(1 << 0);

    /// Value comes from configuration and is copied from the class default
    pub const CONFIG: Self = Self(1 << 1);

    /// Never written to persistent archives
    pub const TRANSIENT: Self = Self(1 << 2);

    /// Replicated
    pub const NET: Self = Self(1 << 3);

    /// Only present with editor data
    pub const EDITOR_ONLY: Self = Self(1 << 4);

    /// Loaded but never saved
    pub const DEPRECATED: Self = Self(1 << 5);

    /// Part of save-game archives
    pub const SAVE_GAME: Self = Self(1 << 6);

    pub const SKIP_SERIALIZATION: Self = Self(1 << 7);

    // Computed at link time.
    pub const ZERO_CONSTRUCTOR: Self = Self(1 << 16);
    pub const IS_PLAIN_OLD_DATA: Self = Self(1 << 17);
    pub const NO_DESTRUCTOR: Self = Self(1 << 18);

    pub const COMPUTED: Self =
        Self(Self::ZERO_CONSTRUCTOR.0 | Self::IS_PLAIN_OLD_DATA.0 | Self::NO_DESTRUCTOR.0);
}

impl_flag_set!(
    PropertyFlags,
    u64,
    [
        ("edit", EDIT),
        ("config", CONFIG),
        ("transient", TRANSIENT),
        ("net", NET),
        ("editor_only", EDITOR_ONLY),
        ("deprecated", DEPRECATED),
        ("save_game", SAVE_GAME),
        ("skip_serialization", SKIP_SERIALIZATION),
    ]
);

/// StructFlags - declared and computed composite flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct StructFlags(pub u32);

impl StructFlags {
    /// Backed by a native ops bundle
    pub const NATIVE: Self = Self(1 << 0);

    /// Core fixed-layout type
    pub const INTRINSIC: Self = Self(1 << 1);

    /// Serialized as a whole when any field differs
    pub const ATOMIC: Self = Self(1 << 2);

    /// Serialized as an untagged binary payload
    pub const IMMUTABLE: Self = Self(1 << 3);

    /// Values of this type are never persisted
    pub const TRANSIENT: Self = Self(1 << 4);

    pub const ZERO_CONSTRUCTOR: Self = Self(1 << 8);
    pub const NO_DESTRUCTOR: Self = Self(1 << 9);
    pub const IS_PLAIN_OLD_DATA: Self = Self(1 << 10);
    pub const SERIALIZE_NATIVE: Self = Self(1 << 11);
    pub const POST_SERIALIZE_NATIVE: Self = Self(1 << 12);
    pub const NET_SERIALIZE_NATIVE: Self = Self(1 << 13);
    pub const COPY_NATIVE: Self = Self(1 << 14);
    pub const IDENTICAL_NATIVE: Self = Self(1 << 15);
    pub const ADD_STRUCT_REFERENCED_OBJECTS: Self = Self(1 << 16);
    pub const EXPORT_TEXT_ITEM_NATIVE: Self = Self(1 << 17);
    pub const IMPORT_TEXT_ITEM_NATIVE: Self = Self(1 << 18);
    pub const SERIALIZE_FROM_MISMATCHED_TAG: Self = Self(1 << 19);

    /// Bits recomputed on every full link
    pub const COMPUTED: Self = Self(0x000F_FF00);
}

impl_flag_set!(
    StructFlags,
    u32,
    [
        ("native", NATIVE),
        ("intrinsic", INTRINSIC),
        ("atomic", ATOMIC),
        ("immutable", IMMUTABLE),
        ("transient", TRANSIENT),
    ]
);

/// ClassFlags - class-only flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ClassFlags(pub u32);

impl ClassFlags {
    pub const NATIVE: Self = Self(1 << 0);
    pub const INTRINSIC: Self = Self(1 << 1);

    /// Config values are per instance, not copied from the class default
    pub const PER_OBJECT_CONFIG: Self = Self(1 << 2);

    pub const NOT_PLACEABLE: Self = Self(1 << 3);
    pub const ABSTRACT: Self = Self(1 << 4);
}

impl_flag_set!(
    ClassFlags,
    u32,
    [
        ("native", NATIVE),
        ("intrinsic", INTRINSIC),
        ("per_object_config", PER_OBJECT_CONFIG),
        ("not_placeable", NOT_PLACEABLE),
        ("abstract", ABSTRACT),
    ]
);
