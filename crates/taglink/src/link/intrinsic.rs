// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed layouts of the core intrinsic structs.

use crate::error::LinkError;
use crate::property::StructFlags;

/// `(name, size, alignment)` every intrinsic struct of that name must link to.
pub const INTRINSIC_LAYOUTS: &[(&str, usize, usize)] = &[
    ("Matrix", 64, 16),
    ("Plane", 16, 16),
    ("Vector4", 16, 16),
    ("Quat", 16, 16),
    ("Double", 8, 8),
    ("Color", 4, 4),
];

pub fn expected_layout(type_name: &str) -> Option<(usize, usize)> {
    INTRINSIC_LAYOUTS
        .iter()
        .find(|(name, _, _)| *name == type_name)
        .map(|(_, size, alignment)| (*size, *alignment))
}

/// Reject an intrinsic struct whose linked layout differs from the table.
/// Types not flagged intrinsic, or absent from the table, always pass.
pub fn check(type_name: &str, flags: StructFlags, size: usize, alignment: usize) -> Result<(), LinkError> {
    if !flags.contains(StructFlags::INTRINSIC) {
        return Ok(());
    }
    match expected_layout(type_name) {
        Some((expected_size, expected_alignment))
            if expected_size != size || expected_alignment != alignment =>
        {
            Err(LinkError::IntrinsicLayoutMismatch {
                type_name: type_name.to_string(),
                expected_size,
                expected_alignment,
                size,
                alignment,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        assert_eq!(expected_layout("Matrix"), Some((64, 16)));
        assert_eq!(expected_layout("Vector"), None);
    }

    #[test]
    fn test_check_only_applies_to_intrinsic() {
        assert!(check("Color", StructFlags::empty(), 3, 1).is_ok());
        assert!(check("Color", StructFlags::INTRINSIC, 4, 4).is_ok());
        assert!(check("Rotator", StructFlags::INTRINSIC, 12, 4).is_ok());
        let err = check("Quat", StructFlags::INTRINSIC, 16, 4).expect_err("misaligned");
        assert!(matches!(
            err,
            LinkError::IntrinsicLayoutMismatch {
                expected_alignment: 16,
                alignment: 4,
                ..
            }
        ));
    }
}
