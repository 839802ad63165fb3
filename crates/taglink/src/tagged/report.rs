// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recoverable anomalies collected while loading tagged data.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// No property of that name (after redirects)
    UnknownProperty,
    /// Wire type differs and no coercion applies
    TypeMismatch,
    /// Static array index outside `[0, array_dim)`
    ArrayIndexOutOfRange,
    /// Struct saved under another name without an identity match
    StructNameMismatch,
    /// Property exists but no longer takes part in this archive
    NotSerializable,
    /// Editor-only data while editor data is not loaded
    EditorOnlySkipped,
    /// Payload consumed a different number of bytes than the tag declared
    SizeMismatch,
    /// Integer coerced to bool was neither 0 nor 1
    SuspiciousBool,
    /// Enum entry name no longer defined; the enum's maximum was used
    UnknownEnumValue,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnknownProperty => "unknown property",
            DiagnosticKind::TypeMismatch => "type mismatch",
            DiagnosticKind::ArrayIndexOutOfRange => "array index out of range",
            DiagnosticKind::StructNameMismatch => "struct name mismatch",
            DiagnosticKind::NotSerializable => "not serializable",
            DiagnosticKind::EditorOnlySkipped => "editor-only skipped",
            DiagnosticKind::SizeMismatch => "size mismatch",
            DiagnosticKind::SuspiciousBool => "suspicious bool",
            DiagnosticKind::UnknownEnumValue => "unknown enum value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDiagnostic {
    pub kind: DiagnosticKind,
    /// Type being loaded when the record was read
    pub type_name: String,
    /// Property name as written in the record
    pub property: String,
    pub detail: String,
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}.{}': {}",
            self.kind.as_str(),
            self.type_name,
            self.property,
            self.detail
        )
    }
}

/// Outcome of one tagged load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub diagnostics: Vec<LoadDiagnostic>,
    /// Records read, nested ones included
    pub records: usize,
    /// Records that went through a coercion rule
    pub coerced: usize,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Record and log one anomaly.
    pub(crate) fn push(
        &mut self,
        kind: DiagnosticKind,
        type_name: &str,
        property: &str,
        detail: impl Into<String>,
    ) {
        let diagnostic = LoadDiagnostic {
            kind,
            type_name: type_name.to_string(),
            property: property.to_string(),
            detail: detail.into(),
        };
        log::warn!("[tagged] {}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_count() {
        let mut report = LoadReport::new();
        assert!(report.is_clean());
        report.push(DiagnosticKind::UnknownProperty, "Point", "Z", "skipped 4 bytes");
        report.push(DiagnosticKind::UnknownProperty, "Point", "W", "skipped 4 bytes");
        report.push(DiagnosticKind::SuspiciousBool, "Point", "Visible", "value 7");
        assert_eq!(report.count(DiagnosticKind::UnknownProperty), 2);
        assert_eq!(
            report.diagnostics[2].to_string(),
            "suspicious bool 'Point.Visible': value 7"
        );
    }
}
