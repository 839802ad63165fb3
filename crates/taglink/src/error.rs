// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.
//!
//! Three layers, mirroring the three kinds of failure the engine knows about:
//!
//! - [`ArchiveError`]: the byte cursor ran out of data or was asked to seek
//!   somewhere impossible. Always fatal for the current read or write.
//! - [`LinkError`]: a fatal consistency error found while computing a type's
//!   layout. The type keeps its previous state and the load is aborted.
//! - [`Error`]: the crate-wide error returned by public entry points.
//!
//! Recoverable mismatches found while loading tagged data are *not* errors;
//! they are logged and collected in a [`LoadReport`](crate::tagged::LoadReport).

use std::fmt;

// ============================================================================
// Archive layer
// ============================================================================

/// Failure of the low-level archive cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    SeekFailed { offset: usize, len: usize },
    InvalidData { offset: usize, reason: String },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {}: {}", offset, reason)
            }
            ArchiveError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            ArchiveError::SeekFailed { offset, len } => {
                write!(f, "seek to {} outside archive of {} bytes", offset, len)
            }
            ArchiveError::InvalidData { offset, reason } => {
                write!(f, "invalid data at offset {}: {}", offset, reason)
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

pub type ArchiveResult<T> = core::result::Result<T, ArchiveError>;

// ============================================================================
// Link layer
// ============================================================================

/// Fatal consistency error raised while linking a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A fixed-layout core type does not have its expected size/alignment.
    IntrinsicLayoutMismatch {
        type_name: String,
        expected_size: usize,
        expected_alignment: usize,
        size: usize,
        alignment: usize,
    },
    /// A struct holds a dynamic array of itself.
    RecursiveArrayStruct { type_name: String, property: String },
    /// A struct contains itself by value, directly or through other structs.
    RecursiveLayout { type_name: String, via: String },
    /// A type flagged native has no registered struct-ops bundle.
    MissingNativeOps { type_name: String },
    /// A type inherits from a native base but no ops could be bound.
    MissingNativeBase { type_name: String, base: String },
    /// Property links kept mutating the type past the iteration cap.
    RelinkLoopExceeded { type_name: String, passes: usize },
    /// A property refers to a type that is not declared.
    UnknownType { type_name: String, referenced: String },
    /// In-place revalidation found a property that no longer fits its slot.
    LayoutDrift {
        type_name: String,
        property: String,
        old_size: usize,
        new_size: usize,
    },
    /// In-place revalidation found the parent's data area resized under the type.
    BaseDrift {
        type_name: String,
        parent: String,
        old_size: usize,
        new_size: usize,
    },
    /// Intrinsic classes have a fixed layout and cannot be fully relinked.
    RelinkIntrinsic { type_name: String },
    /// Native ops declare fewer bytes than the reflected properties occupy.
    NativeSizeTooSmall {
        type_name: String,
        native_size: usize,
        properties_size: usize,
    },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::IntrinsicLayoutMismatch {
                type_name,
                expected_size,
                expected_alignment,
                size,
                alignment,
            } => write!(
                f,
                "intrinsic type '{}' must be {} bytes aligned to {}, linked as {} bytes aligned to {}",
                type_name, expected_size, expected_alignment, size, alignment
            ),
            LinkError::RecursiveArrayStruct {
                type_name,
                property,
            } => write!(
                f,
                "struct recursion via arrays is unsupported ('{}' in '{}')",
                property, type_name
            ),
            LinkError::RecursiveLayout { type_name, via } => {
                write!(f, "type '{}' contains itself by value via '{}'", type_name, via)
            }
            LinkError::MissingNativeOps { type_name } => {
                write!(f, "couldn't bind to native struct '{}'", type_name)
            }
            LinkError::MissingNativeBase { type_name, base } => {
                write!(f, "couldn't bind to native base struct '{}' of '{}'", base, type_name)
            }
            LinkError::RelinkLoopExceeded { type_name, passes } => write!(
                f,
                "linking '{}' did not settle after {} passes",
                type_name, passes
            ),
            LinkError::UnknownType {
                type_name,
                referenced,
            } => write!(f, "'{}' references unknown type '{}'", type_name, referenced),
            LinkError::LayoutDrift {
                type_name,
                property,
                old_size,
                new_size,
            } => write!(
                f,
                "property '{}' of '{}' changed size in place ({} -> {})",
                property, type_name, old_size, new_size
            ),
            LinkError::BaseDrift {
                type_name,
                parent,
                old_size,
                new_size,
            } => write!(
                f,
                "parent '{}' of '{}' changed size in place ({} -> {})",
                parent, type_name, old_size, new_size
            ),
            LinkError::RelinkIntrinsic { type_name } => {
                write!(f, "intrinsic class '{}' cannot be relinked", type_name)
            }
            LinkError::NativeSizeTooSmall {
                type_name,
                native_size,
                properties_size,
            } => write!(
                f,
                "native struct '{}' is {} bytes but its properties need {}",
                type_name, native_size, properties_size
            ),
        }
    }
}

impl std::error::Error for LinkError {}

// ============================================================================
// Crate level
// ============================================================================

/// Crate-wide error.
#[derive(Debug)]
pub enum Error {
    Archive(ArchiveError),
    Link(LinkError),
    /// No type with this name or id is registered.
    UnknownType(String),
    /// The type has no property with this name.
    UnknownProperty { type_name: String, property: String },
    /// A value of the wrong shape was supplied for a property.
    ValueMismatch { property: String, expected: String, got: String },
    /// Static array index outside `[0, array_dim)`.
    IndexOutOfRange { property: String, index: usize, len: usize },
    /// The type must be linked before instances can be built or serialized.
    NotLinked(String),
    /// The instance was built for a layout that has since been relinked
    /// differently. `built` and `current` may be equal when only offsets moved.
    StaleInstance { type_name: String, built: usize, current: usize },
    /// Invalid type declaration (duplicate names, bad parent, ...).
    Declaration(String),
    /// Invalid configuration entry.
    Config(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Archive(e) => write!(f, "archive error: {}", e),
            Error::Link(e) => write!(f, "link error: {}", e),
            Error::UnknownType(name) => write!(f, "unknown type '{}'", name),
            Error::UnknownProperty {
                type_name,
                property,
            } => write!(f, "type '{}' has no property '{}'", type_name, property),
            Error::ValueMismatch {
                property,
                expected,
                got,
            } => write!(
                f,
                "value mismatch for '{}': expected {}, got {}",
                property, expected, got
            ),
            Error::IndexOutOfRange {
                property,
                index,
                len,
            } => write!(f, "index {} out of range for '{}' (len {})", index, property, len),
            Error::NotLinked(name) => write!(f, "type '{}' is not linked", name),
            Error::StaleInstance {
                type_name,
                built,
                current,
            } => write!(
                f,
                "instance of '{}' was built for another layout ({} bytes, now {} bytes)",
                type_name, built, current
            ),
            Error::Declaration(msg) => write!(f, "declaration error: {}", msg),
            Error::Config(msg) => write!(f, "config error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Archive(e) => Some(e),
            Error::Link(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArchiveError> for Error {
    fn from(e: ArchiveError) -> Self {
        Error::Archive(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for API results using the crate [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_error_display() {
        let err = ArchiveError::ReadFailed {
            offset: 4,
            reason: "unexpected end of archive".into(),
        };
        assert_eq!(
            err.to_string(),
            "read failed at offset 4: unexpected end of archive"
        );
    }

    #[test]
    fn test_link_error_wraps_into_error() {
        let err: Error = LinkError::MissingNativeOps {
            type_name: "Vector".into(),
        }
        .into();
        assert!(matches!(err, Error::Link(LinkError::MissingNativeOps { .. })));
        assert_eq!(
            err.to_string(),
            "link error: couldn't bind to native struct 'Vector'"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
