// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type declarations as data.
//!
//! A [`TypeDecl`] describes one struct or class before it is declared in a
//! registry. Declarations can be stored as binary records:
//!
//! ```text
//! name: string | is_class: u8 | parent: string (empty = none)
//! struct_flags: u32 | class_flags: u32 | guid: [u8; 16]
//! enum count: u32 | (name: string | entry count: u32 | (entry: string | value: i64)*)*
//! property count: u32 | (name: string | kind: string | flags: u64 | array_dim: u32)*
//! ```
//!
//! Streams older than `CLASS_NOTPLACEABLE_ADDED` stored a *placeable* bit in
//! the position now used by `NOT_PLACEABLE`; it is inverted on load. A class
//! whose parent is not placeable is never placeable either.

#[cfg(feature = "config-loaders")]
pub mod yaml;

use crate::archive::{ArchiveReader, ArchiveWriter, FormatVersion};
use crate::error::{ArchiveError, Error, Result};
use crate::field::EnumDef;
use crate::guid::Guid;
use crate::property::{ClassFlags, Property, PropertyFlags, PropertyKind, StructFlags};
use crate::types::{TypeId, TypeRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub kind: PropertyKind,
    pub flags: PropertyFlags,
    pub array_dim: usize,
}

impl PropertyDecl {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::empty(),
            array_dim: 1,
        }
    }

    pub fn to_property(&self) -> Property {
        Property::new(self.name.clone(), self.kind.clone())
            .with_flags(self.flags)
            .with_array_dim(self.array_dim)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub is_class: bool,
    pub parent: Option<String>,
    pub struct_flags: StructFlags,
    pub class_flags: ClassFlags,
    /// Custom struct identity; the zero GUID when unset
    pub guid: Guid,
    pub enums: Vec<EnumDef>,
    pub properties: Vec<PropertyDecl>,
}

impl TypeDecl {
    pub fn new_struct(name: impl Into<String>, parent: Option<&str>) -> Self {
        Self::new(name, false, parent)
    }

    pub fn new_class(name: impl Into<String>, parent: Option<&str>) -> Self {
        Self::new(name, true, parent)
    }

    fn new(name: impl Into<String>, is_class: bool, parent: Option<&str>) -> Self {
        Self {
            name: name.into(),
            is_class,
            parent: parent.map(str::to_string),
            struct_flags: StructFlags::empty(),
            class_flags: ClassFlags::empty(),
            guid: Guid::default(),
            enums: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare the type, its scoped enums and its properties. The parent must
    /// already be declared. Linking is left to the caller.
    pub fn declare(&self, registry: &mut TypeRegistry) -> Result<TypeId> {
        let parent = self.parent.as_deref();
        let id = if self.is_class {
            registry.declare_class(&self.name, parent)?
        } else {
            registry.declare_struct(&self.name, parent)?
        };
        for def in &self.enums {
            registry.add_enum(Some(id), def.clone())?;
        }
        for property in &self.properties {
            registry.add_property(id, property.to_property())?;
        }
        registry.set_struct_flags(id, self.struct_flags)?;
        if self.is_class {
            registry.set_class_flags(id, self.class_flags)?;
        }
        if self.guid.is_valid() {
            registry.set_custom_guid(id, self.guid)?;
        }
        Ok(id)
    }

    pub fn write(&self, writer: &mut ArchiveWriter, version: FormatVersion) -> Result<()> {
        writer.write_string(&self.name)?;
        writer.write_u8(u8::from(self.is_class))?;
        writer.write_string(self.parent.as_deref().unwrap_or(""))?;
        writer.write_u32(self.struct_flags.bits())?;
        let mut class_bits = self.class_flags.bits();
        if version < FormatVersion::CLASS_NOTPLACEABLE_ADDED {
            class_bits ^= ClassFlags::NOT_PLACEABLE.bits();
        }
        writer.write_u32(class_bits)?;
        writer.write_bytes(self.guid.as_bytes())?;

        writer.write_u32(count_u32(self.enums.len(), writer.tell())?)?;
        for def in &self.enums {
            writer.write_string(def.name())?;
            writer.write_u32(count_u32(def.entries().len(), writer.tell())?)?;
            for (entry, value) in def.entries() {
                writer.write_string(entry)?;
                writer.write_i64(*value)?;
            }
        }

        writer.write_u32(count_u32(self.properties.len(), writer.tell())?)?;
        for property in &self.properties {
            writer.write_string(&property.name)?;
            writer.write_string(&property.kind.to_string())?;
            writer.write_u64(property.flags.bits() & !PropertyFlags::COMPUTED.bits())?;
            writer.write_u32(count_u32(property.array_dim, writer.tell())?)?;
        }
        Ok(())
    }

    /// Read one record. `registry` is consulted for the parent's class flags.
    pub fn read(reader: &mut ArchiveReader<'_>, version: FormatVersion, registry: &TypeRegistry) -> Result<Self> {
        let name = reader.read_string()?;
        let is_class = reader.read_u8()? != 0;
        let parent = Some(reader.read_string()?).filter(|p| !p.is_empty());
        let struct_flags = StructFlags::from_bits(reader.read_u32()? & !StructFlags::COMPUTED.bits());
        let mut class_flags = ClassFlags::from_bits(reader.read_u32()?);
        if version < FormatVersion::CLASS_NOTPLACEABLE_ADDED {
            class_flags = ClassFlags::from_bits(class_flags.bits() ^ ClassFlags::NOT_PLACEABLE.bits());
        }
        if is_class {
            let parent_not_placeable = parent
                .as_deref()
                .and_then(|p| registry.find(p))
                .and_then(|pid| registry.get(pid))
                .is_some_and(|p| p.class_flags().contains(ClassFlags::NOT_PLACEABLE));
            if parent_not_placeable {
                class_flags.insert(ClassFlags::NOT_PLACEABLE);
            }
        }
        let mut guid_bytes = [0u8; 16];
        guid_bytes.copy_from_slice(reader.read_bytes(16)?);

        let enum_count = read_count(reader)?;
        let mut enums = Vec::with_capacity(enum_count);
        for _ in 0..enum_count {
            let enum_name = reader.read_string()?;
            let entry_count = read_count(reader)?;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                let entry = reader.read_string()?;
                entries.push((entry, reader.read_i64()?));
            }
            enums.push(EnumDef::new(enum_name, entries));
        }

        let property_count = read_count(reader)?;
        let mut properties = Vec::with_capacity(property_count);
        for _ in 0..property_count {
            let property_name = reader.read_string()?;
            let kind_offset = reader.tell();
            let kind_text = reader.read_string()?;
            let kind = PropertyKind::parse(&kind_text).ok_or_else(|| ArchiveError::InvalidData {
                offset: kind_offset,
                reason: format!("unknown property kind '{}' for '{}'", kind_text, property_name),
            })?;
            let flags = PropertyFlags::from_bits(reader.read_u64()? & !PropertyFlags::COMPUTED.bits());
            let array_dim = reader.read_u32()? as usize;
            if array_dim == 0 {
                return Err(Error::Declaration(format!("'{}.{}' has array_dim 0", name, property_name)));
            }
            properties.push(PropertyDecl {
                name: property_name,
                kind,
                flags,
                array_dim,
            });
        }

        Ok(Self {
            name,
            is_class,
            parent,
            struct_flags,
            class_flags: if is_class { class_flags } else { ClassFlags::empty() },
            guid: Guid::from_bytes(guid_bytes),
            enums,
            properties,
        })
    }
}

/// Write declarations, parents before children as given.
pub fn write_decls(decls: &[TypeDecl], version: FormatVersion) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new();
    writer.write_u32(version.0)?;
    writer.write_u32(count_u32(decls.len(), 0)?)?;
    for decl in decls {
        decl.write(&mut writer, version)?;
    }
    Ok(writer.into_inner())
}

/// Read and declare every record of a stream written by [`write_decls`].
/// Each type is declared before the next record is read, so a child sees the
/// final flags of its parent.
pub fn read_and_declare(registry: &mut TypeRegistry, bytes: &[u8]) -> Result<Vec<TypeId>> {
    let mut reader = ArchiveReader::new(bytes);
    let version = FormatVersion(reader.read_u32()?);
    if version > FormatVersion::LATEST {
        return Err(ArchiveError::InvalidData {
            offset: 0,
            reason: format!("schema version {} is newer than {}", version.0, FormatVersion::LATEST.0),
        }
        .into());
    }
    let count = read_count(&mut reader)?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let decl = TypeDecl::read(&mut reader, version, registry)?;
        ids.push(decl.declare(registry)?);
    }
    log::debug!("[schema] declared {} types from version {} stream", ids.len(), version.0);
    Ok(ids)
}

fn count_u32(count: usize, offset: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| {
        ArchiveError::WriteFailed {
            offset,
            reason: format!("count {} exceeds u32", count),
        }
        .into()
    })
}

fn read_count(reader: &mut ArchiveReader<'_>) -> Result<usize> {
    let offset = reader.tell();
    let count = reader.read_u32()? as usize;
    if count > reader.remaining() {
        return Err(ArchiveError::InvalidData {
            offset,
            reason: format!("count {} with {} bytes left", count, reader.remaining()),
        }
        .into());
    }
    Ok(count)
}
