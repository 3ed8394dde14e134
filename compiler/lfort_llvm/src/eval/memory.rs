//! Byte-addressed memory made of separate allocations.
//!
//! A pointer is `(allocation << 32) | offset`; allocation `0` is never handed
//! out, so the null pointer is `0`. Every access is bounds-checked against
//! its allocation and rejected once the allocation is freed.

use crate::ir::types::sign_extend;
use crate::ir::{IrType, TypeTable};

use super::value::RtValue;
use super::Trap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Region {
    Global,
    Stack,
    Heap,
}

#[derive(Debug)]
struct Allocation {
    bytes: Vec<u8>,
    region: Region,
    live: bool,
}

#[derive(Debug, Default)]
pub struct Memory {
    allocs: Vec<Allocation>,
}

#[inline]
fn split(ptr: u64) -> (usize, usize) {
    ((ptr >> 32) as usize, (ptr & 0xFFFF_FFFF) as usize)
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            allocs: vec![Allocation {
                bytes: Vec::new(),
                region: Region::Global,
                live: false,
            }],
        }
    }

    /// Fresh zeroed allocation of `size` bytes.
    pub fn alloc(&mut self, size: usize, region: Region) -> u64 {
        let id = self.allocs.len() as u64;
        self.allocs.push(Allocation {
            bytes: vec![0; size],
            region,
            live: true,
        });
        id << 32
    }

    /// Release a heap allocation. Freeing null is a no-op.
    pub fn free(&mut self, ptr: u64) -> Result<(), Trap> {
        if ptr == 0 {
            return Ok(());
        }
        let (id, offset) = split(ptr);
        match self.allocs.get_mut(id) {
            Some(a) if a.live && a.region == Region::Heap && offset == 0 => {
                a.live = false;
                a.bytes = Vec::new();
                Ok(())
            }
            _ => Err(Trap::InvalidFree { addr: ptr }),
        }
    }

    /// Release a stack slot when its frame returns.
    pub(crate) fn release_stack(&mut self, ptr: u64) {
        let (id, _) = split(ptr);
        if let Some(a) = self.allocs.get_mut(id) {
            a.live = false;
            a.bytes = Vec::new();
        }
    }

    /// Grow or shrink a heap allocation in place; null behaves like malloc.
    pub fn realloc(&mut self, ptr: u64, size: usize) -> Result<u64, Trap> {
        if ptr == 0 {
            return Ok(self.alloc(size, Region::Heap));
        }
        let (id, offset) = split(ptr);
        match self.allocs.get_mut(id) {
            Some(a) if a.live && a.region == Region::Heap && offset == 0 => {
                a.bytes.resize(size, 0);
                Ok(ptr)
            }
            _ => Err(Trap::InvalidFree { addr: ptr }),
        }
    }

    /// Number of live heap allocations.
    pub fn live_heap_allocations(&self) -> usize {
        self.allocs
            .iter()
            .filter(|a| a.live && a.region == Region::Heap)
            .count()
    }

    pub fn bytes(&self, ptr: u64, len: usize) -> Result<&[u8], Trap> {
        let (id, offset) = split(ptr);
        match self.allocs.get(id) {
            Some(a) if a.live && offset + len <= a.bytes.len() => {
                Ok(&a.bytes[offset..offset + len])
            }
            _ => Err(Trap::InvalidAccess { addr: ptr }),
        }
    }

    pub fn bytes_mut(&mut self, ptr: u64, len: usize) -> Result<&mut [u8], Trap> {
        let (id, offset) = split(ptr);
        match self.allocs.get_mut(id) {
            Some(a) if a.live && offset + len <= a.bytes.len() => {
                Ok(&mut a.bytes[offset..offset + len])
            }
            _ => Err(Trap::InvalidAccess { addr: ptr }),
        }
    }

    /// Copy `len` bytes; the ranges may overlap.
    pub fn copy(&mut self, dst: u64, src: u64, len: usize) -> Result<(), Trap> {
        if len == 0 {
            return Ok(());
        }
        let data = self.bytes(src, len)?.to_vec();
        self.bytes_mut(dst, len)?.copy_from_slice(&data);
        Ok(())
    }

    /// Bytes of the NUL-terminated string at `ptr`, without the NUL.
    pub fn c_string(&self, ptr: u64) -> Result<Vec<u8>, Trap> {
        let (id, offset) = split(ptr);
        let a = match self.allocs.get(id) {
            Some(a) if a.live && offset <= a.bytes.len() => a,
            _ => return Err(Trap::InvalidAccess { addr: ptr }),
        };
        let tail = &a.bytes[offset..];
        match tail.iter().position(|b| *b == 0) {
            Some(end) => Ok(tail[..end].to_vec()),
            None => Err(Trap::InvalidAccess {
                addr: ptr + tail.len() as u64,
            }),
        }
    }

    /// Heap copy of `text` with a trailing NUL.
    pub fn alloc_c_string(&mut self, text: &str) -> u64 {
        let ptr = self.alloc(text.len() + 1, Region::Heap);
        if let Ok(bytes) = self.bytes_mut(ptr, text.len()) {
            bytes.copy_from_slice(text.as_bytes());
        }
        ptr
    }

    /// Read a value of type `ty` at `ptr`.
    pub fn load(&self, types: &TypeTable, ty: &IrType, ptr: u64) -> Result<RtValue, Trap> {
        Ok(match ty {
            IrType::Void => RtValue::Void,
            IrType::I1 => RtValue::Int(i64::from(self.bytes(ptr, 1)?[0] & 1)),
            IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64 => {
                let bits = ty.int_bits().unwrap_or(64);
                let len = (bits / 8) as usize;
                let mut raw = [0u8; 8];
                raw[..len].copy_from_slice(self.bytes(ptr, len)?);
                RtValue::Int(sign_extend(i64::from_le_bytes(raw), bits))
            }
            IrType::Float => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(self.bytes(ptr, 4)?);
                RtValue::Float(f64::from(f32::from_le_bytes(raw)))
            }
            IrType::Double => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.bytes(ptr, 8)?);
                RtValue::Float(f64::from_le_bytes(raw))
            }
            IrType::Ptr => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.bytes(ptr, 8)?);
                RtValue::Ptr(u64::from_le_bytes(raw))
            }
            IrType::Array(n, el) => {
                let stride = types.size_of(el);
                let mut items = Vec::new();
                for i in 0..*n {
                    items.push(self.load(types, el, ptr + i * stride)?);
                }
                RtValue::Agg(items)
            }
            IrType::Vector(n, el) => {
                let stride = types.size_of(el);
                let mut items = Vec::new();
                for i in 0..u64::from(*n) {
                    items.push(self.load(types, el, ptr + i * stride)?);
                }
                RtValue::Agg(items)
            }
            IrType::Struct(_) | IrType::Named(_) => {
                let fields = types.fields(ty).unwrap_or(&[]);
                let mut items = Vec::with_capacity(fields.len());
                for (i, f) in fields.iter().enumerate() {
                    let offset = types.field_offset(ty, i as u32);
                    items.push(self.load(types, f, ptr + offset)?);
                }
                RtValue::Agg(items)
            }
        })
    }

    /// Write `value` of type `ty` at `ptr`.
    pub fn store(
        &mut self,
        types: &TypeTable,
        ty: &IrType,
        ptr: u64,
        value: &RtValue,
    ) -> Result<(), Trap> {
        match (ty, value) {
            (IrType::Void, _) => {}
            (IrType::I1, v) => {
                let b = u8::from(v.as_bool().unwrap_or(false));
                self.bytes_mut(ptr, 1)?[0] = b;
            }
            (IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64, v) => {
                let len = (ty.int_bits().unwrap_or(64) / 8) as usize;
                let n = v.as_int().unwrap_or(0);
                self.bytes_mut(ptr, len)?
                    .copy_from_slice(&n.to_le_bytes()[..len]);
            }
            (IrType::Float, v) => {
                let x = v.as_float().unwrap_or(0.0) as f32;
                self.bytes_mut(ptr, 4)?.copy_from_slice(&x.to_le_bytes());
            }
            (IrType::Double, v) => {
                let x = v.as_float().unwrap_or(0.0);
                self.bytes_mut(ptr, 8)?.copy_from_slice(&x.to_le_bytes());
            }
            (IrType::Ptr, v) => {
                let p = v.as_ptr().unwrap_or(0);
                self.bytes_mut(ptr, 8)?.copy_from_slice(&p.to_le_bytes());
            }
            (IrType::Array(_, el) | IrType::Vector(_, el), RtValue::Agg(items)) => {
                let stride = types.size_of(el);
                for (i, item) in items.iter().enumerate() {
                    self.store(types, el, ptr + i as u64 * stride, item)?;
                }
            }
            (IrType::Struct(_) | IrType::Named(_), RtValue::Agg(items)) => {
                let fields = types.fields(ty).unwrap_or(&[]);
                for (i, (f, item)) in fields.iter().zip(items).enumerate() {
                    let offset = types.field_offset(ty, i as u32);
                    self.store(types, f, ptr + offset, item)?;
                }
            }
            (_, other) => {
                return Err(Trap::Malformed(format!(
                    "cannot store `{other}` as an aggregate"
                )))
            }
        }
        Ok(())
    }
}
