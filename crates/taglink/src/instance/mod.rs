// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instances of linked composite types.
//!
//! An [`Instance`] owns the raw bytes laid out by the linker plus a private
//! [`Heap`] for strings, text and dynamic arrays. Cloning an instance is a
//! deep copy. Instances do not hold the registry: every operation takes it
//! as an argument, and native destructors only run through
//! [`Instance::destroy`] or [`Instance::clear`].

pub mod heap;
pub(crate) mod ops;
pub mod value;

pub use heap::{ArrayValue, Heap, HeapValue, TextValue, TEXT_CONVERTED_FROM_STRING};
pub use value::{FromValue, Value};

use crate::archive::PortFlags;
use crate::error::{Error, Result};
use crate::property::Property;
use crate::types::{CompositeType, PropRef, TypeId, TypeRegistry};
use std::fmt;

/// Identifier of a heap object held by reference properties. 0 is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectRef(pub u64);

impl ObjectRef {
    pub const NULL: ObjectRef = ObjectRef(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "obj#{}", self.0)
        }
    }
}

#[derive(Clone)]
pub struct Instance {
    type_id: TypeId,
    type_name: String,
    data: Vec<u8>,
    heap: Heap,
    /// Structure size of the layout the bytes were built for
    built_size: usize,
    built_fingerprint: u64,
}

impl Instance {
    /// Construct a default instance of a linked type.
    pub fn new(registry: &TypeRegistry, id: TypeId) -> Result<Self> {
        let ty = registry.type_ref(id)?;
        if !ty.is_linked() {
            return Err(Error::NotLinked(ty.name().to_string()));
        }
        let size = ty.structure_size();
        let mut data = vec![0u8; size];
        ops::initialize_struct(registry, id, &mut data);
        Ok(Self {
            type_id: id,
            type_name: ty.name().to_string(),
            data,
            heap: Heap::new(),
            built_size: size,
            built_fingerprint: ty.layout_fingerprint(),
        })
    }

    pub fn by_name(registry: &TypeRegistry, type_name: &str) -> Result<Self> {
        Self::new(registry, registry.require(type_name)?)
    }

    /// Construct, then copy the post-construct chain from the registered
    /// class default instance, if any.
    pub fn construct_with_defaults(registry: &TypeRegistry, id: TypeId) -> Result<Self> {
        let mut instance = Self::new(registry, id)?;
        let Some(default) = registry.default_instance(id) else {
            return Ok(instance);
        };
        default.check(registry)?;
        let ty = registry.type_ref(id)?;
        ops::copy_properties(
            registry,
            &ty.chains().post_construct,
            0,
            &mut instance.data,
            &mut instance.heap,
            &default.data,
            &default.heap,
        );
        Ok(instance)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [u8], &mut Heap) {
        (&mut self.data, &mut self.heap)
    }

    /// Structure size this instance was built for.
    pub fn built_size(&self) -> usize {
        self.built_size
    }

    /// The type, if the instance still matches its current layout. A relink
    /// that moves, renames or retypes any property makes the instance stale,
    /// even at the same size.
    pub fn check<'r>(&self, registry: &'r TypeRegistry) -> Result<&'r CompositeType> {
        let ty = registry.type_ref(self.type_id)?;
        if !ty.is_linked() {
            return Err(Error::NotLinked(ty.name().to_string()));
        }
        if ty.layout_fingerprint() != self.built_fingerprint || ty.structure_size() != self.built_size {
            return Err(Error::StaleInstance {
                type_name: ty.name().to_string(),
                built: self.built_size,
                current: ty.structure_size(),
            });
        }
        Ok(ty)
    }

    fn check_same_type(&self, other: &Instance) -> Result<()> {
        if self.type_id != other.type_id {
            return Err(Error::ValueMismatch {
                property: String::from("<instance>"),
                expected: self.type_name.clone(),
                got: other.type_name.clone(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Whole-struct operations
    // ------------------------------------------------------------------------

    /// Deep copy every property of `src` into `self`.
    pub fn copy_from(&mut self, registry: &TypeRegistry, src: &Instance) -> Result<()> {
        self.check_same_type(src)?;
        self.check(registry)?;
        src.check(registry)?;
        ops::copy_struct(
            registry,
            self.type_id,
            &mut self.data,
            &mut self.heap,
            &src.data,
            &src.heap,
        );
        Ok(())
    }

    pub fn identical(&self, registry: &TypeRegistry, other: &Instance, port_flags: PortFlags) -> Result<bool> {
        self.check_same_type(other)?;
        self.check(registry)?;
        other.check(registry)?;
        Ok(ops::identical_struct(
            registry,
            self.type_id,
            &self.data,
            &self.heap,
            &other.data,
            &other.heap,
            port_flags,
        ))
    }

    /// Destroy then re-initialize.
    pub fn clear(&mut self, registry: &TypeRegistry) -> Result<()> {
        self.check(registry)?;
        ops::destroy_struct(registry, self.type_id, &mut self.data, &mut self.heap);
        ops::initialize_struct(registry, self.type_id, &mut self.data);
        self.heap = Heap::new();
        Ok(())
    }

    /// Run native destructors and release every heap value.
    pub fn destroy(mut self, registry: &TypeRegistry) -> Result<()> {
        self.check(registry)?;
        ops::destroy_struct(registry, self.type_id, &mut self.data, &mut self.heap);
        Ok(())
    }

    /// Non-null object references held anywhere in the instance.
    pub fn referenced_objects(&self, registry: &TypeRegistry) -> Result<Vec<ObjectRef>> {
        self.check(registry)?;
        let mut out = Vec::new();
        ops::collect_references(registry, self.type_id, &self.data, &self.heap, &mut out);
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Property access
    // ------------------------------------------------------------------------

    fn resolve<'r>(&self, registry: &'r TypeRegistry, name: &str) -> Result<(PropRef, &'r Property)> {
        self.check(registry)?;
        registry
            .find_property(self.type_id, name)
            .and_then(|r| registry.property(r).map(|p| (r, p)))
            .ok_or_else(|| Error::UnknownProperty {
                type_name: self.type_name.clone(),
                property: name.to_string(),
            })
    }

    fn element_range(prop: &Property, index: usize) -> Result<std::ops::Range<usize>> {
        if index >= prop.array_dim() {
            return Err(Error::IndexOutOfRange {
                property: prop.name().to_string(),
                index,
                len: prop.array_dim(),
            });
        }
        let start = prop.value_offset(index);
        Ok(start..start + prop.element_size())
    }

    /// Whole property: the element itself, or an `Array` for static arrays.
    pub fn get_value(&self, registry: &TypeRegistry, name: &str) -> Result<Value> {
        let (_, prop) = self.resolve(registry, name)?;
        if prop.array_dim() == 1 {
            return self.get_value_at(registry, name, 0);
        }
        let items = (0..prop.array_dim())
            .map(|index| self.get_value_at(registry, name, index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(items))
    }

    pub fn get_value_at(&self, registry: &TypeRegistry, name: &str, index: usize) -> Result<Value> {
        let (_, prop) = self.resolve(registry, name)?;
        let range = Self::element_range(prop, index)?;
        Ok(value::read_value(
            registry,
            prop.kind(),
            prop.struct_id(),
            &self.data[range],
            &self.heap,
        ))
    }

    /// Set a whole property. Static arrays take an `Array` of at most
    /// `array_dim` elements.
    pub fn set_value(&mut self, registry: &TypeRegistry, name: &str, value: Value) -> Result<()> {
        let (_, prop) = self.resolve(registry, name)?;
        match value {
            Value::Array(items) if prop.array_dim() > 1 => {
                for (index, item) in items.into_iter().enumerate() {
                    self.set_value_at(registry, name, index, item)?;
                }
                Ok(())
            }
            other => self.set_value_at(registry, name, 0, other),
        }
    }

    pub fn set_value_at(&mut self, registry: &TypeRegistry, name: &str, index: usize, value: Value) -> Result<()> {
        let (_, prop) = self.resolve(registry, name)?;
        let range = Self::element_range(prop, index)?;
        value::write_value(
            registry,
            prop.kind(),
            prop.struct_id(),
            &mut self.data[range],
            &mut self.heap,
            &value,
        )
        .map_err(|err| name_mismatch(err, name))
    }

    pub fn get<T: FromValue>(&self, registry: &TypeRegistry, name: &str) -> Result<T> {
        T::from_value(&self.get_value(registry, name)?).map_err(|err| name_mismatch(err, name))
    }

    pub fn get_at<T: FromValue>(&self, registry: &TypeRegistry, name: &str, index: usize) -> Result<T> {
        T::from_value(&self.get_value_at(registry, name, index)?).map_err(|err| name_mismatch(err, name))
    }

    pub fn set<T: Into<Value>>(&mut self, registry: &TypeRegistry, name: &str, value: T) -> Result<()> {
        self.set_value(registry, name, value.into())
    }

    pub fn set_at<T: Into<Value>>(
        &mut self,
        registry: &TypeRegistry,
        name: &str,
        index: usize,
        value: T,
    ) -> Result<()> {
        self.set_value_at(registry, name, index, value.into())
    }

    /// Text form of one property element.
    pub fn export_property(&self, registry: &TypeRegistry, name: &str, index: usize) -> Result<String> {
        let (prop_ref, prop) = self.resolve(registry, name)?;
        let range = Self::element_range(prop, index)?;
        Ok(crate::text::export_text(
            registry,
            prop.kind(),
            prop.struct_id(),
            Some(prop_ref.owner),
            &self.data[range],
            &self.heap,
        ))
    }

    /// Parse `text` into one property element.
    pub fn import_property(
        &mut self,
        registry: &TypeRegistry,
        name: &str,
        index: usize,
        text: &str,
    ) -> Result<()> {
        let (prop_ref, prop) = self.resolve(registry, name)?;
        let range = Self::element_range(prop, index)?;
        crate::text::import_text(
            registry,
            prop.kind(),
            prop.struct_id(),
            Some(prop_ref.owner),
            &mut self.data[range],
            &mut self.heap,
            text,
        )
        .map_err(|err| name_mismatch(err, name))
    }
}

/// Fill in the property name of a value mismatch raised below the instance.
fn name_mismatch(err: Error, name: &str) -> Error {
    match err {
        Error::ValueMismatch {
            property,
            expected,
            got,
        } if property.is_empty() => Error::ValueMismatch {
            property: name.to_string(),
            expected,
            got,
        },
        other => other,
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("size", &self.data.len())
            .field("heap_values", &self.heap.live())
            .finish()
    }
}
