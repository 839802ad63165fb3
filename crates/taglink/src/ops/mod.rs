// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native struct operations.
//!
//! A [`StructOps`] bundle lets a hand-written type take over construction,
//! destruction, copying, comparison, text export/import and serialization for
//! a composite type. Every hook is optional; the generic property-driven path
//! is used for whatever is missing.
//!
//! Hooks operate on the raw bytes of one struct value.

pub mod registry;

pub use registry::StructOpsRegistry;

use crate::archive::{ArchiveReader, ArchiveWriter, PortFlags};
use crate::error::ArchiveResult;
use crate::instance::ObjectRef;
use crate::tagged::PropertyTag;
use std::fmt;
use std::sync::Arc;

pub type ConstructFn = Arc<dyn Fn(&mut [u8]) + Send + Sync>;
pub type DestructFn = Arc<dyn Fn(&mut [u8]) + Send + Sync>;
/// Returns `false` to fall back to the generic copy.
pub type CopyFn = Arc<dyn Fn(&mut [u8], &[u8]) -> bool + Send + Sync>;
/// Returns `None` to fall back to the generic comparison.
pub type IdenticalFn = Arc<dyn Fn(&[u8], &[u8], PortFlags) -> Option<bool> + Send + Sync>;
pub type SaveFn = Arc<dyn Fn(&[u8], &mut ArchiveWriter) -> ArchiveResult<()> + Send + Sync>;
pub type LoadFn = Arc<dyn Fn(&mut [u8], &mut ArchiveReader<'_>) -> ArchiveResult<()> + Send + Sync>;
pub type PostSerializeFn = Arc<dyn Fn(&mut [u8]) + Send + Sync>;
pub type ExportTextFn = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;
/// Returns `false` when the text could not be parsed.
pub type ImportTextFn = Arc<dyn Fn(&str, &mut [u8]) -> bool + Send + Sync>;
/// Returns `Ok(false)` when the record could not be converted.
pub type MismatchedTagFn = Arc<
    dyn Fn(&PropertyTag, &mut ArchiveReader<'_>, &mut [u8]) -> ArchiveResult<bool> + Send + Sync,
>;
pub type ReferencedObjectsFn = Arc<dyn Fn(&[u8], &mut Vec<ObjectRef>) + Send + Sync>;

/// Save/load pair for a custom binary encoding.
#[derive(Clone)]
pub struct NativeSerializer {
    pub save: SaveFn,
    pub load: LoadFn,
}

/// Natively supplied behavior bundle for one composite type.
#[derive(Clone)]
pub struct StructOps {
    size: usize,
    alignment: usize,
    plain_old_data: bool,
    zero_constructor: bool,
    construct: Option<ConstructFn>,
    destruct: Option<DestructFn>,
    copy: Option<CopyFn>,
    identical: Option<IdenticalFn>,
    serializer: Option<NativeSerializer>,
    post_serialize: Option<PostSerializeFn>,
    net_serializer: Option<NativeSerializer>,
    export_text: Option<ExportTextFn>,
    import_text: Option<ImportTextFn>,
    mismatched_tag: Option<MismatchedTagFn>,
    referenced_objects: Option<ReferencedObjectsFn>,
}

impl StructOps {
    pub fn new(size: usize, alignment: usize) -> Self {
        Self {
            size,
            alignment: alignment.max(1),
            plain_old_data: false,
            zero_constructor: false,
            construct: None,
            destruct: None,
            copy: None,
            identical: None,
            serializer: None,
            post_serialize: None,
            net_serializer: None,
            export_text: None,
            import_text: None,
            mismatched_tag: None,
            referenced_objects: None,
        }
    }

    // ------------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------------

    /// Declare the type trivially copyable and destructible.
    pub fn plain_old_data(mut self) -> Self {
        self.plain_old_data = true;
        self
    }

    /// Declare that all-zero bytes are a constructed value.
    pub fn zero_constructor(mut self) -> Self {
        self.zero_constructor = true;
        self
    }

    pub fn with_construct(mut self, f: impl Fn(&mut [u8]) + Send + Sync + 'static) -> Self {
        self.construct = Some(Arc::new(f));
        self
    }

    pub fn with_destruct(mut self, f: impl Fn(&mut [u8]) + Send + Sync + 'static) -> Self {
        self.destruct = Some(Arc::new(f));
        self
    }

    pub fn with_copy(mut self, f: impl Fn(&mut [u8], &[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.copy = Some(Arc::new(f));
        self
    }

    pub fn with_identical(
        mut self,
        f: impl Fn(&[u8], &[u8], PortFlags) -> Option<bool> + Send + Sync + 'static,
    ) -> Self {
        self.identical = Some(Arc::new(f));
        self
    }

    pub fn with_serializer(mut self, save: SaveFn, load: LoadFn) -> Self {
        self.serializer = Some(NativeSerializer { save, load });
        self
    }

    pub fn with_post_serialize(mut self, f: impl Fn(&mut [u8]) + Send + Sync + 'static) -> Self {
        self.post_serialize = Some(Arc::new(f));
        self
    }

    pub fn with_net_serializer(mut self, save: SaveFn, load: LoadFn) -> Self {
        self.net_serializer = Some(NativeSerializer { save, load });
        self
    }

    pub fn with_export_text(mut self, f: impl Fn(&[u8]) -> String + Send + Sync + 'static) -> Self {
        self.export_text = Some(Arc::new(f));
        self
    }

    pub fn with_import_text(
        mut self,
        f: impl Fn(&str, &mut [u8]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.import_text = Some(Arc::new(f));
        self
    }

    pub fn with_mismatched_tag(mut self, f: MismatchedTagFn) -> Self {
        self.mismatched_tag = Some(f);
        self
    }

    pub fn with_referenced_objects(
        mut self,
        f: impl Fn(&[u8], &mut Vec<ObjectRef>) + Send + Sync + 'static,
    ) -> Self {
        self.referenced_objects = Some(Arc::new(f));
        self
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn is_plain_old_data(&self) -> bool {
        self.plain_old_data
    }

    pub fn has_zero_constructor(&self) -> bool {
        self.zero_constructor
    }

    pub fn has_destructor(&self) -> bool {
        self.destruct.is_some()
    }

    pub fn has_copy(&self) -> bool {
        self.copy.is_some()
    }

    pub fn has_identical(&self) -> bool {
        self.identical.is_some()
    }

    pub fn has_serializer(&self) -> bool {
        self.serializer.is_some()
    }

    pub fn has_post_serialize(&self) -> bool {
        self.post_serialize.is_some()
    }

    pub fn has_net_serializer(&self) -> bool {
        self.net_serializer.is_some()
    }

    pub fn has_export_text(&self) -> bool {
        self.export_text.is_some()
    }

    pub fn has_import_text(&self) -> bool {
        self.import_text.is_some()
    }

    pub fn has_mismatched_tag(&self) -> bool {
        self.mismatched_tag.is_some()
    }

    pub fn has_referenced_objects(&self) -> bool {
        self.referenced_objects.is_some()
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Run the native constructor; zero bytes stand in when there is none.
    pub fn construct(&self, data: &mut [u8]) {
        if let Some(f) = &self.construct {
            f(data);
        }
    }

    pub fn destruct(&self, data: &mut [u8]) {
        if let Some(f) = &self.destruct {
            f(data);
        }
    }

    pub fn copy(&self, dest: &mut [u8], src: &[u8]) -> bool {
        self.copy.as_ref().map(|f| f(dest, src)).unwrap_or(false)
    }

    pub fn identical(&self, a: &[u8], b: &[u8], port_flags: PortFlags) -> Option<bool> {
        self.identical.as_ref().and_then(|f| f(a, b, port_flags))
    }

    pub fn serializer(&self) -> Option<&NativeSerializer> {
        self.serializer.as_ref()
    }

    pub fn net_serializer(&self) -> Option<&NativeSerializer> {
        self.net_serializer.as_ref()
    }

    pub fn post_serialize(&self, data: &mut [u8]) {
        if let Some(f) = &self.post_serialize {
            f(data);
        }
    }

    pub fn export_text(&self, data: &[u8]) -> Option<String> {
        self.export_text.as_ref().map(|f| f(data))
    }

    pub fn import_text(&self, text: &str, data: &mut [u8]) -> Option<bool> {
        self.import_text.as_ref().map(|f| f(text, data))
    }

    pub fn serialize_from_mismatched_tag(
        &self,
        tag: &PropertyTag,
        reader: &mut ArchiveReader<'_>,
        data: &mut [u8],
    ) -> ArchiveResult<bool> {
        match &self.mismatched_tag {
            Some(f) => f(tag, reader, data),
            None => Ok(false),
        }
    }

    pub fn add_referenced_objects(&self, data: &[u8], out: &mut Vec<ObjectRef>) {
        if let Some(f) = &self.referenced_objects {
            f(data, out);
        }
    }
}

impl fmt::Debug for StructOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructOps")
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("plain_old_data", &self.plain_old_data)
            .field("zero_constructor", &self.zero_constructor)
            .field("construct", &self.construct.is_some())
            .field("destruct", &self.destruct.is_some())
            .field("serializer", &self.serializer.is_some())
            .field("mismatched_tag", &self.mismatched_tag.is_some())
            .finish()
    }
}
