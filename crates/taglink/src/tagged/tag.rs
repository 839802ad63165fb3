// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tagged record header.
//!
//! ```text
//! name: string            empty name terminates the stream
//! type: string            wire type, e.g. "IntProperty"
//! size: i32               payload bytes, back-patched after writing
//! array_index: i32
//! StructProperty:  struct_name: string, struct_guid: [u8; 16] (>= STRUCT_GUID_IN_PROPERTY_TAG)
//! BoolProperty:    value: u8 (payload size is 0)
//! ByteProperty:    enum_name: string (empty for plain bytes)
//! ArrayProperty:   inner_type: string (>= ARRAY_PROPERTY_INNER_TAGS)
//! ```

use crate::archive::{ArchiveReader, ArchiveWriter, FormatVersion};
use crate::error::{ArchiveError, ArchiveResult};
use crate::guid::Guid;
use crate::property::WireType;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyTag {
    pub name: String,
    /// Wire type as written; may name a type this build does not know
    pub type_name: String,
    pub size: i32,
    pub array_index: i32,
    pub struct_name: String,
    pub struct_guid: Guid,
    pub bool_value: bool,
    pub enum_name: String,
    pub inner_type: String,
}

impl PropertyTag {
    pub fn new(name: &str, wire: WireType, array_index: usize) -> Self {
        Self {
            name: name.to_string(),
            type_name: wire.as_str().to_string(),
            array_index: array_index as i32,
            ..Self::default()
        }
    }

    pub fn wire_type(&self) -> Option<WireType> {
        WireType::parse(&self.type_name)
    }

    pub fn inner_wire_type(&self) -> Option<WireType> {
        WireType::parse(&self.inner_type)
    }

    /// Write the header with a zero size. Returns the offset of the size
    /// field for [`PropertyTag::patch_size`].
    pub fn write(&self, writer: &mut ArchiveWriter, version: FormatVersion) -> ArchiveResult<usize> {
        writer.write_string(&self.name)?;
        writer.write_string(&self.type_name)?;
        let size_offset = writer.tell();
        writer.write_i32(self.size)?;
        writer.write_i32(self.array_index)?;
        match self.wire_type() {
            Some(WireType::Struct) => {
                writer.write_string(&self.struct_name)?;
                if version >= FormatVersion::STRUCT_GUID_IN_PROPERTY_TAG {
                    writer.write_bytes(self.struct_guid.as_bytes())?;
                }
            }
            Some(WireType::Bool) => writer.write_bool(self.bool_value)?,
            Some(WireType::Byte) => writer.write_string(&self.enum_name)?,
            Some(WireType::Array) => {
                if version >= FormatVersion::ARRAY_PROPERTY_INNER_TAGS {
                    writer.write_string(&self.inner_type)?;
                }
            }
            _ => {}
        }
        Ok(size_offset)
    }

    /// Fill in the size of the payload written since `payload_start`.
    pub fn patch_size(writer: &mut ArchiveWriter, size_offset: usize, payload_start: usize) -> ArchiveResult<()> {
        let end = writer.tell();
        let size = end - payload_start;
        let size = i32::try_from(size).map_err(|_| ArchiveError::WriteFailed {
            offset: size_offset,
            reason: format!("payload of {} bytes exceeds record limit", size),
        })?;
        writer.seek(size_offset)?;
        writer.write_i32(size)?;
        writer.seek(end)
    }

    pub fn write_terminator(writer: &mut ArchiveWriter) -> ArchiveResult<()> {
        writer.write_string("")
    }

    /// Read one header; `None` at the terminator.
    pub fn read(reader: &mut ArchiveReader<'_>, version: FormatVersion) -> ArchiveResult<Option<Self>> {
        let name = reader.read_string()?;
        if name.is_empty() {
            return Ok(None);
        }
        let mut tag = PropertyTag {
            name,
            type_name: reader.read_string()?,
            ..Self::default()
        };
        let size_offset = reader.tell();
        tag.size = reader.read_i32()?;
        tag.array_index = reader.read_i32()?;
        if tag.size < 0 {
            return Err(ArchiveError::InvalidData {
                offset: size_offset,
                reason: format!("negative record size {} for '{}'", tag.size, tag.name),
            });
        }
        match tag.wire_type() {
            Some(WireType::Struct) => {
                tag.struct_name = reader.read_string()?;
                if version >= FormatVersion::STRUCT_GUID_IN_PROPERTY_TAG {
                    let mut bytes = [0u8; 16];
                    bytes.copy_from_slice(reader.read_bytes(16)?);
                    tag.struct_guid = Guid::from_bytes(bytes);
                }
            }
            Some(WireType::Bool) => tag.bool_value = reader.read_bool()?,
            Some(WireType::Byte) => tag.enum_name = reader.read_string()?,
            Some(WireType::Array) => {
                if version >= FormatVersion::ARRAY_PROPERTY_INNER_TAGS {
                    tag.inner_type = reader.read_string()?;
                }
            }
            _ => {}
        }
        Ok(Some(tag))
    }
}
