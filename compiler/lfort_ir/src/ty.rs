//! Semantic type descriptors.
//!
//! [`Ty`] is the fully resolved type attached to every ASR expression and
//! variable. The code generators dispatch on it to pick machine layouts,
//! container signatures and calling conventions.
//!
//! # Invariants
//!
//! - `Pointer` and `Allocatable` wrap exactly one type and never wrap each
//!   other twice in a row (the constructors collapse `Pointer(Pointer(t))`).
//! - An array's element type is never itself an unwrapped `Array`:
//!   [`Ty::array`] folds nested arrays into a single dimension list.

use std::fmt::Write as _;

use smallvec::SmallVec;

use crate::symbol::{Abi, SymbolTable};
use crate::{ExprId, SymbolId};

/// Concrete in-memory representation chosen for an array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayPhysicalType {
    /// Runtime descriptor: data pointer, offset, per-dimension bounds, rank.
    DescriptorArray,
    /// Bare pointer to the first element, bounds known elsewhere.
    PointerToDataArray,
    /// Bare pointer with at least one unknown extent (assumed size).
    UnboundedPointerToDataArray,
    /// Inline `[N x T]` storage, all extents compile-time constants.
    FixedSizeArray,
    /// Array of characters passed as one `char*`.
    CharacterArraySinglePointer,
    /// Short vector register type.
    SimdArray,
}

/// One array dimension: optional lower bound and upper bound expressions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Dimension {
    pub start: Option<ExprId>,
    pub end: Option<ExprId>,
}

impl Dimension {
    pub const fn new(start: Option<ExprId>, end: Option<ExprId>) -> Self {
        Dimension { start, end }
    }

    /// Dimension with neither bound known (`:` or `*`).
    pub const fn deferred() -> Self {
        Dimension {
            start: None,
            end: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: Ty,
    pub dims: SmallVec<[Dimension; 2]>,
    pub physical: ArrayPhysicalType,
}

impl ArrayType {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// Type of a procedure value (procedure pointers, callbacks).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub params: Vec<Ty>,
    pub ret: Option<Ty>,
    pub abi: Abi,
}

/// Semantic type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Integer { kind: u8 },
    UnsignedInteger { kind: u8 },
    Real { kind: u8 },
    Complex { kind: u8 },
    Logical { kind: u8 },
    /// `len == None` means deferred (allocatable) length.
    Character { kind: u8, len: Option<i64> },
    Struct(SymbolId),
    Union(SymbolId),
    /// Polymorphic `class(T)` reference.
    Class(SymbolId),
    Pointer(Box<Ty>),
    Allocatable(Box<Ty>),
    Array(Box<ArrayType>),
    List(Box<Ty>),
    Dict(Box<Ty>, Box<Ty>),
    Set(Box<Ty>),
    Tuple(Vec<Ty>),
    CPtr,
    Enum(SymbolId),
    FunctionType(Box<FunctionSignature>),
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

impl Ty {
    pub const fn integer(kind: u8) -> Ty {
        Ty::Integer { kind }
    }

    pub const fn i32() -> Ty {
        Ty::Integer { kind: 4 }
    }

    pub const fn i64() -> Ty {
        Ty::Integer { kind: 8 }
    }

    pub const fn real(kind: u8) -> Ty {
        Ty::Real { kind }
    }

    pub const fn f32() -> Ty {
        Ty::Real { kind: 4 }
    }

    pub const fn f64() -> Ty {
        Ty::Real { kind: 8 }
    }

    pub const fn complex(kind: u8) -> Ty {
        Ty::Complex { kind }
    }

    pub const fn logical() -> Ty {
        Ty::Logical { kind: 4 }
    }

    /// Deferred-length default-kind character string.
    pub const fn string() -> Ty {
        Ty::Character { kind: 1, len: None }
    }

    pub fn list(element: Ty) -> Ty {
        Ty::List(Box::new(element))
    }

    pub fn set(element: Ty) -> Ty {
        Ty::Set(Box::new(element))
    }

    pub fn dict(key: Ty, value: Ty) -> Ty {
        Ty::Dict(Box::new(key), Box::new(value))
    }

    pub fn tuple(elements: Vec<Ty>) -> Ty {
        Ty::Tuple(elements)
    }

    /// Pointer to `inner`; an existing pointer is not wrapped again.
    pub fn pointer(inner: Ty) -> Ty {
        match inner {
            Ty::Pointer(_) => inner,
            other => Ty::Pointer(Box::new(other)),
        }
    }

    /// Allocatable `inner`; an existing allocatable is not wrapped again.
    pub fn allocatable(inner: Ty) -> Ty {
        match inner {
            Ty::Allocatable(_) => inner,
            other => Ty::Allocatable(Box::new(other)),
        }
    }

    /// Array of `element`.
    ///
    /// If `element` is itself an array, its dimensions are appended after
    /// `dims` and its element type becomes the element type.
    pub fn array(element: Ty, dims: impl IntoIterator<Item = Dimension>, physical: ArrayPhysicalType) -> Ty {
        let mut all: SmallVec<[Dimension; 2]> = dims.into_iter().collect();
        let element = match element {
            Ty::Array(inner) => {
                let inner = *inner;
                all.extend(inner.dims);
                inner.element
            }
            other => other,
        };
        Ty::Array(Box::new(ArrayType {
            element,
            dims: all,
            physical,
        }))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Ty {
    /// Scalar kind (byte width), if this is a numeric/logical/character scalar.
    pub fn kind(&self) -> Option<u8> {
        match self {
            Ty::Integer { kind }
            | Ty::UnsignedInteger { kind }
            | Ty::Real { kind }
            | Ty::Complex { kind }
            | Ty::Logical { kind }
            | Ty::Character { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Peel `Pointer` and `Allocatable` wrappers.
    pub fn strip(&self) -> &Ty {
        match self {
            Ty::Pointer(inner) | Ty::Allocatable(inner) => inner.strip(),
            other => other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.strip(), Ty::Integer { .. })
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self.strip(), Ty::UnsignedInteger { .. })
    }

    pub fn is_real(&self) -> bool {
        matches!(self.strip(), Ty::Real { .. })
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.strip(), Ty::Complex { .. })
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.strip(), Ty::Logical { .. })
    }

    pub fn is_character(&self) -> bool {
        matches!(self.strip(), Ty::Character { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.strip(), Ty::Array(_))
    }

    /// Integer, unsigned, real or complex.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.strip(),
            Ty::Integer { .. } | Ty::UnsignedInteger { .. } | Ty::Real { .. } | Ty::Complex { .. }
        )
    }

    /// List, dict, set or tuple.
    pub fn is_container(&self) -> bool {
        matches!(
            self.strip(),
            Ty::List(_) | Ty::Dict(..) | Ty::Set(_) | Ty::Tuple(_)
        )
    }

    /// Values of this type own heap storage that a block copy would alias.
    pub fn needs_deepcopy(&self) -> bool {
        matches!(
            self.strip(),
            Ty::Struct(_) | Ty::List(_) | Ty::Dict(..) | Ty::Set(_) | Ty::Tuple(_)
        )
    }

    /// Array element type, or `self` for scalars.
    pub fn element(&self) -> &Ty {
        match self.strip() {
            Ty::Array(arr) => &arr.element,
            other => other,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self.strip() {
            Ty::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Same scalar category and kind, ignoring character lengths.
    pub fn same_kind_as(&self, other: &Ty) -> bool {
        match (self.strip(), other.strip()) {
            (Ty::Character { kind: a, .. }, Ty::Character { kind: b, .. }) => a == b,
            (a, b) => a == b,
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

impl Ty {
    /// Canonical signature string, e.g. `list[i32]` or `dict[str, r64]`.
    ///
    /// Container layouts are memoized by this string.
    pub fn type_code(&self, symbols: &SymbolTable) -> String {
        let mut out = String::new();
        self.write_code(symbols, &mut out);
        out
    }

    fn write_code(&self, symbols: &SymbolTable, out: &mut String) {
        match self {
            Ty::Integer { kind } => {
                let _ = write!(out, "i{}", u32::from(*kind) * 8);
            }
            Ty::UnsignedInteger { kind } => {
                let _ = write!(out, "u{}", u32::from(*kind) * 8);
            }
            Ty::Real { kind } => {
                let _ = write!(out, "r{}", u32::from(*kind) * 8);
            }
            Ty::Complex { kind } => {
                let _ = write!(out, "c{}", u32::from(*kind) * 8);
            }
            Ty::Logical { .. } => out.push_str("bool"),
            Ty::Character { .. } => out.push_str("str"),
            Ty::Struct(id) => {
                out.push_str("struct ");
                out.push_str(symbols.name(*id));
            }
            Ty::Union(id) => {
                out.push_str("union ");
                out.push_str(symbols.name(*id));
            }
            Ty::Class(id) => {
                out.push_str("class ");
                out.push_str(symbols.name(*id));
            }
            Ty::Enum(id) => {
                out.push_str("enum ");
                out.push_str(symbols.name(*id));
            }
            Ty::Pointer(inner) => {
                out.push_str("ptr[");
                inner.write_code(symbols, out);
                out.push(']');
            }
            Ty::Allocatable(inner) => {
                out.push_str("alloc[");
                inner.write_code(symbols, out);
                out.push(']');
            }
            Ty::Array(arr) => {
                out.push_str("array[");
                arr.element.write_code(symbols, out);
                let _ = write!(out, "; {}]", arr.rank());
            }
            Ty::List(el) => {
                out.push_str("list[");
                el.write_code(symbols, out);
                out.push(']');
            }
            Ty::Set(el) => {
                out.push_str("set[");
                el.write_code(symbols, out);
                out.push(']');
            }
            Ty::Dict(k, v) => {
                out.push_str("dict[");
                k.write_code(symbols, out);
                out.push_str(", ");
                v.write_code(symbols, out);
                out.push(']');
            }
            Ty::Tuple(elements) => {
                out.push_str("tuple[");
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    el.write_code(symbols, out);
                }
                out.push(']');
            }
            Ty::CPtr => out.push_str("cptr"),
            Ty::FunctionType(sig) => {
                out.push_str("fn(");
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    p.write_code(symbols, out);
                }
                out.push(')');
                if let Some(ret) = &sig.ret {
                    out.push_str(" -> ");
                    ret.write_code(symbols, out);
                }
            }
        }
    }

    /// Signature usable as an LLVM identifier fragment, e.g. `list_i32`,
    /// `dict_str_r64`, `tuple2_i32_bool`.
    ///
    /// Tuples carry their arity so that differently nested tuples never
    /// mangle to the same string.
    pub fn mangled_code(&self, symbols: &SymbolTable) -> String {
        let mut out = String::new();
        self.write_mangled(symbols, &mut out);
        out
    }

    fn write_mangled(&self, symbols: &SymbolTable, out: &mut String) {
        match self {
            Ty::Struct(id) | Ty::Union(id) | Ty::Class(id) | Ty::Enum(id) => {
                let prefix = match self {
                    Ty::Struct(_) => "struct_",
                    Ty::Union(_) => "union_",
                    Ty::Class(_) => "class_",
                    _ => "enum_",
                };
                out.push_str(prefix);
                out.extend(symbols.name(*id).chars().map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c
                    } else {
                        '_'
                    }
                }));
            }
            Ty::Pointer(inner) => {
                out.push_str("ptr_");
                inner.write_mangled(symbols, out);
            }
            Ty::Allocatable(inner) => {
                out.push_str("alloc_");
                inner.write_mangled(symbols, out);
            }
            Ty::Array(arr) => {
                let _ = write!(out, "array{}_", arr.rank());
                arr.element.write_mangled(symbols, out);
            }
            Ty::List(el) => {
                out.push_str("list_");
                el.write_mangled(symbols, out);
            }
            Ty::Set(el) => {
                out.push_str("set_");
                el.write_mangled(symbols, out);
            }
            Ty::Dict(k, v) => {
                out.push_str("dict_");
                k.write_mangled(symbols, out);
                out.push('_');
                v.write_mangled(symbols, out);
            }
            Ty::Tuple(elements) => {
                let _ = write!(out, "tuple{}", elements.len());
                for el in elements {
                    out.push('_');
                    el.write_mangled(symbols, out);
                }
            }
            Ty::FunctionType(sig) => {
                let _ = write!(out, "fn{}", sig.params.len());
                for p in &sig.params {
                    out.push('_');
                    p.write_mangled(symbols, out);
                }
            }
            scalar => scalar.write_code(symbols, out),
        }
    }
}
