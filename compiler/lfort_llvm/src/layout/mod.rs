//! Type-layout resolver.
//!
//! Maps semantic types onto IR storage types:
//!
//! | Semantic type | Storage |
//! |---------------|---------|
//! | `integer(k)`, `unsigned(k)` | `i8`..`i64` by kind |
//! | `real(4)`, `real(8)` | `float`, `double` |
//! | `complex(k)` | `{ T, T }` |
//! | `logical` | `i1` |
//! | `character` | `ptr` to a NUL-terminated heap string |
//! | derived type | named struct, parent embedded as field 0 |
//! | `class(T)`, pointer, `c_ptr`, procedure | `ptr` |
//! | array | descriptor, bare `ptr`, `[N x T]` or `<N x T>` |
//! | list, dict, set | named container record |
//! | tuple | literal struct of its element storage types |
//!
//! Derived types are resolved parent first. A derived type that reaches
//! itself through its member graph gets the named placeholder already on
//! the resolution stack instead of being resolved again.

#[cfg(test)]
mod tests;

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use lfort_ir::{Abi, ArrayPhysicalType, ArrayType, Span, StructKind, SymbolId, Ty};

use crate::abi::{complex_argument, complex_type, ComplexAbi};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::IrType;

/// Field indices of a dimension entry of an array descriptor.
pub const DIM_LOWER: u32 = 0;
pub const DIM_LENGTH: u32 = 1;
pub const DIM_STRIDE: u32 = 2;

/// Field indices of an array descriptor.
pub const DESC_DATA: u32 = 0;
pub const DESC_OFFSET: u32 = 1;
pub const DESC_DIMS: u32 = 2;
pub const DESC_ALLOCATED: u32 = 3;

/// Where a type is used, for [`CodegenCx::type_layout`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UseSite {
    /// Variable, temporary or return value.
    Value,
    /// Dummy argument; `by_value` for the `value` attribute.
    Argument { by_value: bool },
}

/// Concrete layout of a type at one use site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeLayout {
    /// Type of the value as it crosses the use site.
    pub ty: IrType,
    /// Storage type of the value itself.
    pub storage: IrType,
    /// Byte size of one element (of the value itself for scalars).
    pub element_size: u64,
    /// Passed as a pointer at this boundary.
    pub by_reference: bool,
    /// The storage is an array descriptor.
    pub is_descriptor: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct StructLayout {
    pub ty: IrType,
    pub kind: StructKind,
    pub parent: Option<SymbolId>,
    fields: FxHashMap<String, u32>,
}

impl StructLayout {
    /// Field index of an own member (parents are reached through field 0).
    pub fn field(&self, member: &str) -> Option<u32> {
        self.fields.get(member).copied()
    }
}

/// Struct layouts resolved so far, plus the resolution stack.
#[derive(Debug, Default)]
pub(crate) struct LayoutCache {
    structs: FxHashMap<SymbolId, StructLayout>,
    resolving: Vec<(SymbolId, IrType)>,
    descriptors: FxHashMap<usize, IrType>,
}

impl CodegenCx<'_> {
    /// Storage type of a value of type `ty`.
    pub fn storage_type(&mut self, ty: &Ty, span: Span) -> CodegenResult<IrType> {
        Ok(match ty {
            Ty::Integer { kind } | Ty::UnsignedInteger { kind } => int_type(*kind, span)?,
            Ty::Real { kind } => real_type(*kind, span)?,
            Ty::Complex { kind } => {
                real_type(*kind, span)?;
                complex_type(*kind)
            }
            Ty::Logical { .. } => IrType::I1,
            Ty::Character { .. }
            | Ty::Class(_)
            | Ty::Pointer(_)
            | Ty::CPtr
            | Ty::FunctionType(_) => IrType::Ptr,
            Ty::Enum(_) => IrType::I32,
            Ty::Allocatable(inner) => self.storage_type(inner, span)?,
            Ty::Struct(id) | Ty::Union(id) => self.struct_layout(*id, span)?.ty,
            Ty::Array(arr) => self.array_storage(arr, span)?,
            Ty::List(_) | Ty::Dict(..) | Ty::Set(_) => self.container_layout(ty, span)?.ty,
            Ty::Tuple(elements) => {
                let mut fields = Vec::with_capacity(elements.len());
                for el in elements {
                    fields.push(self.storage_type(el, span)?);
                }
                IrType::Struct(fields)
            }
        })
    }

    /// Layout of `ty` at a use site of a procedure with `abi`.
    ///
    /// Dummy arguments travel by reference unless declared `value`. A
    /// by-value complex of a `bind(c)` procedure follows the platform
    /// policy of [`complex_argument`].
    pub fn type_layout(
        &mut self,
        ty: &Ty,
        abi: Abi,
        site: UseSite,
        span: Span,
    ) -> CodegenResult<TypeLayout> {
        let storage = self.storage_type(ty, span)?;
        let element_size = match ty.as_array() {
            Some(arr) => {
                let el = self.storage_type(&arr.element, span)?;
                self.module.types.size_of(&el)
            }
            None => self.module.types.size_of(&storage),
        };
        let is_descriptor = ty
            .as_array()
            .is_some_and(|a| a.physical == ArrayPhysicalType::DescriptorArray);
        let (boundary, by_reference) = match (site, ty.strip(), abi) {
            (UseSite::Argument { by_value: false }, ..) => (IrType::Ptr, true),
            (UseSite::Argument { by_value: true }, Ty::Complex { kind }, Abi::BindC) => {
                match complex_argument(self.options.platform, *kind) {
                    ComplexAbi::ByReference => (IrType::Ptr, true),
                    other => (other.boundary_type(&storage).unwrap_or_else(|| storage.clone()), false),
                }
            }
            _ => (storage.clone(), false),
        };
        Ok(TypeLayout {
            ty: boundary,
            storage,
            element_size,
            by_reference,
            is_descriptor,
        })
    }

    /// Layout of the derived type `sym`, resolving it on first use.
    pub(crate) fn struct_layout(&mut self, sym: SymbolId, span: Span) -> CodegenResult<StructLayout> {
        if let Some(layout) = self.layouts.structs.get(&sym) {
            return Ok(layout.clone());
        }
        if let Some((_, placeholder)) = self.layouts.resolving.iter().find(|(s, _)| *s == sym) {
            warn!(
                name = self.name(sym),
                "recursive derived type, using its placeholder"
            );
            let st = self.unit.symbols.struct_type(sym);
            return Ok(StructLayout {
                ty: placeholder.clone(),
                kind: st.map_or(StructKind::Struct, |s| s.kind),
                parent: st.and_then(|s| s.parent),
                fields: FxHashMap::default(),
            });
        }
        let unit = self.unit;
        let st = unit
            .symbols
            .struct_type(sym)
            .ok_or_else(|| CodegenError::internal(format!("`{}` is not a derived type", self.name(sym))))?;

        let mut name = match st.kind {
            StructKind::Union => Ty::Union(sym).mangled_code(&unit.symbols),
            _ => Ty::Struct(sym).mangled_code(&unit.symbols),
        };
        if self.module.types.lookup(&name).is_some() {
            name = format!("{name}.{}", sym.index());
        }
        let id = self.module.types.declare(&name);
        let placeholder = IrType::Named(id);
        self.layouts.resolving.push((sym, placeholder.clone()));
        let resolved = self.resolve_struct_body(sym, span);
        self.layouts.resolving.pop();
        let (body, fields) = resolved?;
        self.module.types.set_body(id, body);
        trace!(name = %name, "resolved derived type layout");

        let layout = StructLayout {
            ty: placeholder,
            kind: st.kind,
            parent: st.parent,
            fields,
        };
        self.layouts.structs.insert(sym, layout.clone());
        Ok(layout)
    }

    fn resolve_struct_body(
        &mut self,
        sym: SymbolId,
        span: Span,
    ) -> CodegenResult<(Vec<IrType>, FxHashMap<String, u32>)> {
        let unit = self.unit;
        let Some(st) = unit.symbols.struct_type(sym) else {
            return Err(CodegenError::internal("derived type vanished"));
        };
        let mut body = Vec::new();
        let mut fields = FxHashMap::default();
        if let Some(parent) = st.parent {
            body.push(self.struct_layout(parent, span)?.ty);
        }
        let mut largest = 0;
        for member in unit.symbols.struct_members(sym) {
            let var = self.variable(member)?;
            let ty = self.storage_type(&var.ty, span)?;
            if st.kind == StructKind::Union {
                largest = largest.max(self.module.types.size_of(&ty));
                fields.insert(var.name.clone(), 0);
                continue;
            }
            let index = u32::try_from(body.len()).unwrap_or(u32::MAX);
            fields.insert(var.name.clone(), index);
            body.push(ty);
        }
        if st.kind == StructKind::Union {
            body = vec![IrType::array(largest.div_ceil(8).max(1), IrType::I64)];
        }
        Ok((body, fields))
    }

    /// `{ i32 lower, i32 length, i32 stride }`.
    pub(crate) fn dimension_descriptor(&mut self) -> IrType {
        self.module.types.define(
            "dimension_descriptor",
            vec![IrType::I32, IrType::I32, IrType::I32],
        )
    }

    /// `{ ptr data, i32 offset, [R x dimension_descriptor], i1 allocated }`.
    pub(crate) fn array_descriptor(&mut self, rank: usize) -> IrType {
        if let Some(ty) = self.layouts.descriptors.get(&rank) {
            return ty.clone();
        }
        let dim = self.dimension_descriptor();
        let ty = self.module.types.define(
            &format!("array_descriptor_{rank}"),
            vec![
                IrType::Ptr,
                IrType::I32,
                IrType::array(rank as u64, dim),
                IrType::I1,
            ],
        );
        self.layouts.descriptors.insert(rank, ty.clone());
        ty
    }

    fn array_storage(&mut self, arr: &ArrayType, span: Span) -> CodegenResult<IrType> {
        let element = self.storage_type(&arr.element, span)?;
        Ok(match arr.physical {
            ArrayPhysicalType::DescriptorArray => self.array_descriptor(arr.rank()),
            ArrayPhysicalType::PointerToDataArray
            | ArrayPhysicalType::UnboundedPointerToDataArray
            | ArrayPhysicalType::CharacterArraySinglePointer => IrType::Ptr,
            ArrayPhysicalType::FixedSizeArray => {
                let len = self.fixed_length(arr).ok_or_else(|| {
                    CodegenError::unsupported(
                        "Fixed size array with non-constant extents",
                        span,
                    )
                })?;
                IrType::array(len, element)
            }
            ArrayPhysicalType::SimdArray => {
                let len = self
                    .fixed_length(arr)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        CodegenError::unsupported("SIMD array with non-constant length", span)
                    })?;
                IrType::vector(len, element)
            }
        })
    }

    /// Constant `(lower, extent)` of every dimension, if all are known.
    pub(crate) fn constant_bounds(&self, arr: &ArrayType) -> Option<Vec<(i64, i64)>> {
        let exprs = &self.unit.exprs;
        arr.dims
            .iter()
            .map(|d| {
                let lower = match d.start {
                    Some(s) => exprs.int_constant(s)?,
                    None => 1,
                };
                let upper = exprs.int_constant(d.end?)?;
                Some((lower, (upper - lower + 1).max(0)))
            })
            .collect()
    }

    /// Number of elements of an array whose extents are all constant.
    pub(crate) fn fixed_length(&self, arr: &ArrayType) -> Option<u64> {
        let bounds = self.constant_bounds(arr)?;
        bounds
            .iter()
            .try_fold(1u64, |acc, (_, extent)| acc.checked_mul(u64::try_from(*extent).ok()?))
    }
}

fn int_type(kind: u8, span: Span) -> CodegenResult<IrType> {
    match kind {
        1 => Ok(IrType::I8),
        2 => Ok(IrType::I16),
        4 => Ok(IrType::I32),
        8 => Ok(IrType::I64),
        _ => Err(CodegenError::unsupported(
            format!("Only 8, 16, 32, and 64 bit integer kinds are supported, found kind {kind}"),
            span,
        )),
    }
}

fn real_type(kind: u8, span: Span) -> CodegenResult<IrType> {
    match kind {
        4 => Ok(IrType::Float),
        8 => Ok(IrType::Double),
        _ => Err(CodegenError::unsupported(
            format!("Only 32 and 64 bit real kinds are supported, found kind {kind}"),
            span,
        )),
    }
}
