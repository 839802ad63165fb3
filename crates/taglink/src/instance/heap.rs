// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-instance storage for values that do not fit in a fixed-size slot.
//!
//! Strings, text and dynamic arrays live here. The instance bytes only hold a
//! 32-bit handle; handle 0 is the empty value, so zero-filled memory is a
//! valid constructed state.

use crate::property::HANDLE_SIZE;

/// Text flag set when the value was converted from a plain string on load.
pub const TEXT_CONVERTED_FROM_STRING: u32 = 1 << 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextValue {
    pub flags: u32,
    pub source: String,
}

/// Dynamic array payload: `count` elements packed in `data`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayValue {
    pub data: Vec<u8>,
    pub count: usize,
}

impl ArrayValue {
    pub fn zeroed(count: usize, element_size: usize) -> Self {
        Self {
            data: vec![0u8; count * element_size],
            count,
        }
    }

    pub fn element(&self, index: usize, element_size: usize) -> &[u8] {
        &self.data[index * element_size..(index + 1) * element_size]
    }

    pub fn element_mut(&mut self, index: usize, element_size: usize) -> &mut [u8] {
        &mut self.data[index * element_size..(index + 1) * element_size]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapValue {
    Str(String),
    Text(TextValue),
    Array(ArrayValue),
}

#[derive(Debug, Clone, Default)]
pub struct Heap {
    slots: Vec<Option<HeapValue>>,
    free: Vec<u32>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning its (non-zero) handle.
    pub fn alloc(&mut self, value: HeapValue) -> u32 {
        match self.free.pop() {
            Some(handle) => {
                self.slots[handle as usize - 1] = Some(value);
                handle
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() as u32
            }
        }
    }

    pub fn get(&self, handle: u32) -> Option<&HeapValue> {
        if handle == 0 {
            return None;
        }
        self.slots.get(handle as usize - 1).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: u32) -> Option<&mut HeapValue> {
        if handle == 0 {
            return None;
        }
        self.slots.get_mut(handle as usize - 1).and_then(Option::as_mut)
    }

    /// Release `handle`, returning the value it held.
    pub fn release(&mut self, handle: u32) -> Option<HeapValue> {
        if handle == 0 {
            return None;
        }
        let value = self.slots.get_mut(handle as usize - 1)?.take()?;
        self.free.push(handle);
        Some(value)
    }

    /// Live values.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn str(&self, handle: u32) -> &str {
        match self.get(handle) {
            Some(HeapValue::Str(s)) => s,
            _ => "",
        }
    }

    pub fn text(&self, handle: u32) -> Option<&TextValue> {
        match self.get(handle) {
            Some(HeapValue::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn array(&self, handle: u32) -> Option<&ArrayValue> {
        match self.get(handle) {
            Some(HeapValue::Array(a)) => Some(a),
            _ => None,
        }
    }
}

pub fn read_handle(slot: &[u8]) -> u32 {
    let mut bytes = [0u8; HANDLE_SIZE];
    bytes.copy_from_slice(&slot[..HANDLE_SIZE]);
    u32::from_le_bytes(bytes)
}

pub fn write_handle(slot: &mut [u8], handle: u32) {
    slot[..HANDLE_SIZE].copy_from_slice(&handle.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_release_reuses_slots() {
        let mut heap = Heap::new();
        let a = heap.alloc(HeapValue::Str("alpha".into()));
        let b = heap.alloc(HeapValue::Str("beta".into()));
        assert_ne!(a, 0);
        assert_eq!(heap.str(b), "beta");
        assert_eq!(heap.live(), 2);

        assert_eq!(heap.release(a), Some(HeapValue::Str("alpha".into())));
        assert_eq!(heap.release(a), None);
        let c = heap.alloc(HeapValue::Str("gamma".into()));
        assert_eq!(c, a);
        assert_eq!(heap.live(), 2);
        assert_eq!(heap.str(0), "");
    }

    #[test]
    fn test_handle_bytes() {
        let mut slot = [0u8; 4];
        write_handle(&mut slot, 0x0102_0304);
        assert_eq!(read_handle(&slot), 0x0102_0304);
    }
}
