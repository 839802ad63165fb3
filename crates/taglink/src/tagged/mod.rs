// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tagged property serialization.
//!
//! Every property element that differs from its default is written as a
//! self-describing record (see [`PropertyTag`]) and the stream ends with an
//! empty name. Readers match records by name, so fields can be added, removed,
//! reordered, renamed through the redirect table, or change type within the
//! coercion rules of [`coerce`] without breaking old data.
//!
//! ```text
//! package:  magic: u32 | version: u32 | root type: string | tagged body
//! body:     record* terminator
//! ```

mod coerce;
pub(crate) mod item;
mod load;
mod report;
mod save;
mod tag;

pub use coerce::can_coerce;
pub use report::{DiagnosticKind, LoadDiagnostic, LoadReport};
pub use tag::PropertyTag;

use crate::archive::{ArchiveContext, ArchiveReader, ArchiveWriter, FormatVersion};
use crate::error::{ArchiveError, Error, Result};
use crate::instance::Instance;
use crate::types::TypeRegistry;
use item::ItemCodec;

/// Leading bytes of a package file ("TGLK").
pub const PACKAGE_MAGIC: u32 = 0x4B4C_4754;

/// Save `instance` as tagged records into `writer`.
///
/// With `ctx.delta` the values are compared against the registered default
/// instance of the type, or a freshly constructed one when none is registered.
pub fn save_tagged_into(
    registry: &TypeRegistry,
    instance: &Instance,
    ctx: &ArchiveContext,
    writer: &mut ArchiveWriter,
) -> Result<()> {
    instance.check(registry)?;
    let id = instance.type_id();
    let codec = ItemCodec::tagged(registry, ctx);

    let fresh;
    let default = if ctx.delta {
        match registry.default_instance(id) {
            Some(default) => {
                default.check(registry)?;
                Some(default)
            }
            None => {
                fresh = Instance::new(registry, id)?;
                Some(&fresh)
            }
        }
    } else {
        None
    };

    log::debug!(
        "[tagged] saving '{}' to {} (delta={})",
        instance.type_name(),
        ctx.name,
        ctx.delta
    );
    codec.save_struct_tagged(
        id,
        instance.data(),
        instance.heap(),
        default.map(|d| (d.data(), d.heap())),
        writer,
    )
}

pub fn save_tagged(registry: &TypeRegistry, instance: &Instance, ctx: &ArchiveContext) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::with_capacity(256);
    save_tagged_into(registry, instance, ctx, &mut writer)?;
    Ok(writer.into_inner())
}

/// Load tagged records from `reader` into `instance`.
///
/// The instance is only modified when the whole stream decodes; recoverable
/// anomalies are collected in the returned report.
pub fn load_tagged_from(
    registry: &TypeRegistry,
    instance: &mut Instance,
    reader: &mut ArchiveReader<'_>,
    ctx: &ArchiveContext,
) -> Result<LoadReport> {
    instance.check(registry)?;
    let codec = ItemCodec::tagged(registry, ctx);
    let mut report = LoadReport::new();
    let mut staged = instance.clone();
    {
        let id = staged.type_id();
        let (data, heap) = staged.parts_mut();
        codec.load_struct_tagged(id, data, heap, reader, &mut report)?;
    }
    *instance = staged;

    if report.is_clean() {
        log::debug!("[tagged] loaded {} records into '{}'", report.records, instance.type_name());
    } else {
        log::warn!(
            "[tagged] loaded '{}' from {} with {} diagnostics",
            instance.type_name(),
            ctx.name,
            report.diagnostics.len()
        );
    }
    Ok(report)
}

pub fn load_tagged(
    registry: &TypeRegistry,
    instance: &mut Instance,
    bytes: &[u8],
    ctx: &ArchiveContext,
) -> Result<LoadReport> {
    let mut reader = ArchiveReader::new(bytes);
    load_tagged_from(registry, instance, &mut reader, ctx)
}

/// Write a self-contained package: header followed by the tagged body.
pub fn write_package(registry: &TypeRegistry, instance: &Instance, ctx: &ArchiveContext) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::with_capacity(256);
    writer.write_u32(PACKAGE_MAGIC)?;
    writer.write_u32(ctx.version.0)?;
    writer.write_string(instance.type_name())?;
    save_tagged_into(registry, instance, ctx, &mut writer)?;
    Ok(writer.into_inner())
}

/// Read a package written by [`write_package`].
///
/// The stream version in the header overrides `ctx.version`. The root type
/// name goes through the struct redirects and the instance starts from the
/// class defaults.
pub fn read_package(registry: &TypeRegistry, bytes: &[u8], ctx: &ArchiveContext) -> Result<(Instance, LoadReport)> {
    let mut reader = ArchiveReader::new(bytes);
    let magic = reader.read_u32()?;
    if magic != PACKAGE_MAGIC {
        return Err(ArchiveError::InvalidData {
            offset: 0,
            reason: format!("bad package magic 0x{:08X}", magic),
        }
        .into());
    }
    let version_offset = reader.tell();
    let version = FormatVersion(reader.read_u32()?);
    if version > FormatVersion::LATEST {
        return Err(ArchiveError::InvalidData {
            offset: version_offset,
            reason: format!("format version {} is newer than {}", version.0, FormatVersion::LATEST.0),
        }
        .into());
    }
    let saved_root = reader.read_string()?;
    let root = registry.redirects().resolve_struct(&saved_root);
    let id = registry
        .find(root)
        .ok_or_else(|| Error::UnknownType(saved_root.clone()))?;

    let ctx = ArchiveContext {
        version,
        ..ctx.clone()
    };
    let mut instance = Instance::construct_with_defaults(registry, id)?;
    let report = load_tagged_from(registry, &mut instance, &mut reader, &ctx)?;
    Ok((instance, report))
}

/// Bytes left over after a package body are allowed; this reports whether a
/// package header is present at all.
pub fn is_package(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) == PACKAGE_MAGIC
}
