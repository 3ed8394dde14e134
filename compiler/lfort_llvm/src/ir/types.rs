//! IR types and the named-struct table.
//!
//! Pointers are opaque (`ptr`), so a type never refers to the type it points
//! to. Named structs may be declared before their body is known; a struct
//! that (indirectly) contains itself is broken by the layout resolver, not
//! here.
//!
//! Sizes follow natural alignment, matching the x86-64 and AArch64 data
//! layouts for every type this backend emits.

use std::fmt;

use rustc_hash::FxHashMap;

/// Handle to a named struct in a [`TypeTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructId(u32);

impl StructId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Ptr,
    Array(u64, Box<IrType>),
    Vector(u32, Box<IrType>),
    /// Literal (anonymous) struct.
    Struct(Vec<IrType>),
    Named(StructId),
}

impl IrType {
    /// Integer type of `bits` width (1, 8, 16, 32 or 64).
    pub fn int(bits: u32) -> IrType {
        match bits {
            1 => IrType::I1,
            8 => IrType::I8,
            16 => IrType::I16,
            32 => IrType::I32,
            _ => IrType::I64,
        }
    }

    pub fn array(len: u64, element: IrType) -> IrType {
        IrType::Array(len, Box::new(element))
    }

    pub fn vector(len: u32, element: IrType) -> IrType {
        IrType::Vector(len, Box::new(element))
    }

    /// Bit width of an integer type.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            IrType::I1 => Some(1),
            IrType::I8 => Some(8),
            IrType::I16 => Some(16),
            IrType::I32 => Some(32),
            IrType::I64 => Some(64),
            _ => None,
        }
    }

    pub fn is_int(&self) -> bool {
        self.int_bits().is_some()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float | IrType::Double)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, IrType::Ptr)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    /// Field type of a literal aggregate.
    pub fn field(&self, index: u32) -> Option<&IrType> {
        match self {
            IrType::Struct(fields) => fields.get(index as usize),
            IrType::Array(_, el) | IrType::Vector(_, el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct NamedStruct {
    name: String,
    body: Option<Vec<IrType>>,
}

/// Named struct bodies of one module.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    structs: Vec<NamedStruct>,
    by_name: FxHashMap<String, StructId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an opaque named struct, or return the existing one.
    pub fn declare(&mut self, name: &str) -> StructId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = StructId(u32::try_from(self.structs.len()).unwrap_or(u32::MAX));
        self.structs.push(NamedStruct {
            name: name.to_string(),
            body: None,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn set_body(&mut self, id: StructId, fields: Vec<IrType>) {
        if let Some(s) = self.structs.get_mut(id.index()) {
            s.body = Some(fields);
        }
    }

    /// Declare `name` with `fields` as its body.
    pub fn define(&mut self, name: &str, fields: Vec<IrType>) -> IrType {
        let id = self.declare(name);
        self.set_body(id, fields);
        IrType::Named(id)
    }

    pub fn lookup(&self, name: &str) -> Option<StructId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: StructId) -> &str {
        self.structs.get(id.index()).map_or("", |s| s.name.as_str())
    }

    pub fn body(&self, id: StructId) -> Option<&[IrType]> {
        self.structs.get(id.index()).and_then(|s| s.body.as_deref())
    }

    pub fn is_opaque(&self, id: StructId) -> bool {
        self.body(id).is_none()
    }

    /// Named structs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (StructId, &str, Option<&[IrType]>)> {
        self.structs.iter().enumerate().map(|(i, s)| {
            (
                StructId(u32::try_from(i).unwrap_or(u32::MAX)),
                s.name.as_str(),
                s.body.as_deref(),
            )
        })
    }

    /// Fields of a struct type (literal or named).
    pub fn fields<'a>(&'a self, ty: &'a IrType) -> Option<&'a [IrType]> {
        match ty {
            IrType::Struct(fields) => Some(fields),
            IrType::Named(id) => self.body(*id),
            _ => None,
        }
    }

    /// Type of field `index` of an aggregate.
    pub fn field_type<'a>(&'a self, ty: &'a IrType, index: u32) -> Option<&'a IrType> {
        match ty {
            IrType::Named(id) => self.body(*id)?.get(index as usize),
            other => other.field(index),
        }
    }

    pub fn size_of(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Void => 0,
            IrType::I1 | IrType::I8 => 1,
            IrType::I16 => 2,
            IrType::I32 | IrType::Float => 4,
            IrType::I64 | IrType::Double | IrType::Ptr => 8,
            IrType::Array(n, el) => n * self.size_of(el),
            IrType::Vector(n, el) => {
                let raw = u64::from(*n) * self.size_of(el);
                raw.next_power_of_two()
            }
            IrType::Struct(_) | IrType::Named(_) => {
                let fields = self.fields(ty).unwrap_or(&[]);
                let mut offset = 0;
                for f in fields {
                    offset = align_to(offset, self.align_of(f)) + self.size_of(f);
                }
                align_to(offset, self.align_of(ty))
            }
        }
    }

    pub fn align_of(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Void | IrType::I1 | IrType::I8 => 1,
            IrType::Array(_, el) => self.align_of(el),
            IrType::Vector(..) => self.size_of(ty).max(1),
            IrType::Struct(_) | IrType::Named(_) => self
                .fields(ty)
                .unwrap_or(&[])
                .iter()
                .map(|f| self.align_of(f))
                .max()
                .unwrap_or(1),
            scalar => self.size_of(scalar),
        }
    }

    /// Byte offset of field `index` within a struct, or of element `index`
    /// within an array or vector.
    pub fn field_offset(&self, ty: &IrType, index: u32) -> u64 {
        match ty {
            IrType::Array(_, el) | IrType::Vector(_, el) => u64::from(index) * self.size_of(el),
            _ => {
                let fields = self.fields(ty).unwrap_or(&[]);
                let mut offset = 0;
                for (i, f) in fields.iter().enumerate() {
                    offset = align_to(offset, self.align_of(f));
                    if i == index as usize {
                        return offset;
                    }
                    offset += self.size_of(f);
                }
                offset
            }
        }
    }

    /// Displayable form of `ty` in LLVM syntax.
    pub fn display<'a>(&'a self, ty: &'a IrType) -> TypeDisplay<'a> {
        TypeDisplay { table: self, ty }
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        offset
    } else {
        offset.div_ceil(align) * align
    }
}

/// Sign-extend the low `bits` bits of `value`. `i1` values stay `0` or `1`.
pub fn sign_extend(value: i64, bits: u32) -> i64 {
    if bits >= 64 {
        return value;
    }
    if bits == 1 {
        return value & 1;
    }
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// The low `bits` bits of `value`, zero-extended.
pub fn zero_extend(value: i64, bits: u32) -> u64 {
    if bits >= 64 {
        value as u64
    } else {
        (value as u64) & ((1u64 << bits) - 1)
    }
}

/// `%name` or `"%quoted name"` style identifier.
pub(crate) fn local_ident(name: &str) -> String {
    if is_plain_ident(name) {
        name.to_string()
    } else {
        format!("\"{name}\"")
    }
}

pub(crate) fn is_plain_ident(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '$' | '-'))
}

pub struct TypeDisplay<'a> {
    table: &'a TypeTable,
    ty: &'a IrType,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |ty| self.table.display(ty);
        match self.ty {
            IrType::Void => f.write_str("void"),
            IrType::I1 => f.write_str("i1"),
            IrType::I8 => f.write_str("i8"),
            IrType::I16 => f.write_str("i16"),
            IrType::I32 => f.write_str("i32"),
            IrType::I64 => f.write_str("i64"),
            IrType::Float => f.write_str("float"),
            IrType::Double => f.write_str("double"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::Array(n, el) => write!(f, "[{n} x {}]", show(el)),
            IrType::Vector(n, el) => write!(f, "<{n} x {}>", show(el)),
            IrType::Struct(fields) => {
                if fields.is_empty() {
                    return f.write_str("{}");
                }
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", show(field))?;
                }
                f.write_str(" }")
            }
            IrType::Named(id) => write!(f, "%{}", local_ident(self.table.name(*id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_record_layout() {
        let mut table = TypeTable::new();
        let list = table.define("list_i32", vec![IrType::I32, IrType::I32, IrType::Ptr]);
        assert_eq!(table.size_of(&list), 16);
        assert_eq!(table.field_offset(&list, 2), 8);
        assert_eq!(table.display(&list).to_string(), "%list_i32");
    }

    #[test]
    fn padding_follows_natural_alignment() {
        let table = TypeTable::new();
        let node = IrType::Struct(vec![IrType::I8, IrType::Double, IrType::I1]);
        assert_eq!(table.field_offset(&node, 1), 8);
        assert_eq!(table.field_offset(&node, 2), 16);
        assert_eq!(table.size_of(&node), 24);
        assert_eq!(table.display(&node).to_string(), "{ i8, double, i1 }");
    }

    #[test]
    fn complex_abi_shapes() {
        let table = TypeTable::new();
        let vec2 = IrType::vector(2, IrType::Float);
        let arr2 = IrType::array(2, IrType::Float);
        assert_eq!(table.size_of(&vec2), 8);
        assert_eq!(table.align_of(&vec2), 8);
        assert_eq!(table.size_of(&arr2), 8);
        assert_eq!(table.align_of(&arr2), 4);
        assert_eq!(table.display(&vec2).to_string(), "<2 x float>");
    }

    #[test]
    fn opaque_until_defined() {
        let mut table = TypeTable::new();
        let id = table.declare("node");
        assert!(table.is_opaque(id));
        assert_eq!(table.declare("node"), id);
        table.set_body(id, vec![IrType::I64, IrType::Ptr]);
        assert_eq!(table.size_of(&IrType::Named(id)), 16);
        assert_eq!(local_ident("dict_str_i32.lp"), "dict_str_i32.lp");
        assert_eq!(local_ident("struct point"), "\"struct point\"");
    }
}
