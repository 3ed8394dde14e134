//! Value-level helpers of scalars, strings and derived types.
//!
//! Containers call these for their elements and keys. Everything is passed
//! by pointer, so a helper body starts by loading what it needs.

use lfort_ir::{Span, StructKind, SymbolId, Ty};

use super::{for_range, move_bytes, HelperOp};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FloatPredicate, FunctionBuilder, IntPredicate, IrType, ValueId};
use crate::runtime;

/// Modulus of the polynomial string hash.
pub const STRING_HASH_MODULUS: i64 = 100_000_009;

/// Where a value is being printed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrintStyle {
    /// An item of a `print` statement.
    Statement,
    /// An element inside a printed container.
    Element,
}

pub(super) fn generate(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    ty: &Ty,
    op: HelperOp,
    span: Span,
) -> CodegenResult<()> {
    match (ty, op) {
        (Ty::Character { .. }, HelperOp::Dup) => string_dup(fb),
        (Ty::Character { .. }, HelperOp::Concat) => string_concat(fb),
        (Ty::Struct(sym), _) => return struct_op(cx, fb, *sym, op, span),
        (Ty::Union(_), HelperOp::DeepCopy) => {
            let size = cx.size_of(ty, span)?;
            let (src, dst) = (fb.param(0), fb.param(1));
            move_bytes(fb, dst, src, size);
            fb.ret_void();
        }
        (_, HelperOp::Eq) => {
            let (a, b) = load_pair(cx, fb, ty, span)?;
            let eq = scalar_eq(cx, fb, ty, a, b, span)?;
            fb.ret(eq);
        }
        (_, HelperOp::Cmp) => {
            let (a, b) = load_pair(cx, fb, ty, span)?;
            let ord = scalar_cmp(fb, ty, a, b, span)?;
            fb.ret(ord);
        }
        (_, HelperOp::Hash) => {
            let storage = cx.storage_type(ty, span)?;
            let key = fb.load(storage, fb.param(0));
            let capacity = fb.param(1);
            let h = scalar_hash(fb, ty, key, capacity, span)?;
            fb.ret(h);
        }
        (_, HelperOp::DeepCopy) => {
            let storage = cx.storage_type(ty, span)?;
            let value = fb.load(storage, fb.param(0));
            let value = if ty.is_character() {
                fb.call(&string_helper(cx, HelperOp::Dup, span)?, IrType::Ptr, &[value])
            } else {
                value
            };
            fb.store(value, fb.param(1));
            fb.ret_void();
        }
        (_, HelperOp::Print) => {
            let storage = cx.storage_type(ty, span)?;
            let value = fb.load(storage, fb.param(0));
            let (format, args) = printf_arg(cx, fb, ty, value, PrintStyle::Element, span)?;
            cx.printf(fb, &format, &args);
            fb.ret_void();
        }
        _ => {
            return Err(CodegenError::not_implemented(
                format!(
                    "`{}` on values of type {}",
                    op.suffix(),
                    ty.type_code(&cx.unit.symbols)
                ),
                span,
            ))
        }
    }
    Ok(())
}

fn string_helper(cx: &mut CodegenCx<'_>, op: HelperOp, span: Span) -> CodegenResult<String> {
    Ok(cx.helper(&Ty::string(), op, span)?.name)
}

fn load_pair(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    ty: &Ty,
    span: Span,
) -> CodegenResult<(ValueId, ValueId)> {
    let storage = cx.storage_type(ty, span)?;
    let a = fb.load(storage.clone(), fb.param(0));
    let b = fb.load(storage, fb.param(1));
    Ok((a, b))
}

/// Equality of two loaded scalar values.
pub(crate) fn scalar_eq(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    ty: &Ty,
    a: ValueId,
    b: ValueId,
    span: Span,
) -> CodegenResult<ValueId> {
    Ok(match ty.strip() {
        Ty::Integer { .. } | Ty::UnsignedInteger { .. } | Ty::Logical { .. } | Ty::Enum(_) => {
            fb.icmp_eq(a, b)
        }
        Ty::Real { .. } => fb.fcmp(FloatPredicate::Oeq, a, b),
        Ty::Complex { .. } => {
            let (ar, ai) = (fb.extract_value(a, 0), fb.extract_value(a, 1));
            let (br, bi) = (fb.extract_value(b, 0), fb.extract_value(b, 1));
            let re = fb.fcmp(FloatPredicate::Oeq, ar, br);
            let im = fb.fcmp(FloatPredicate::Oeq, ai, bi);
            fb.and(re, im)
        }
        Ty::Character { .. } => {
            let ord = fb.call(runtime::STRCMP, IrType::I32, &[a, b]);
            let zero = fb.const_i32(0);
            fb.icmp_eq(ord, zero)
        }
        other => {
            return Err(CodegenError::not_implemented(
                format!("equality of {}", other.type_code(&cx.unit.symbols)),
                span,
            ))
        }
    })
}

/// Three-way comparison of two loaded scalar values as `i8` -1, 0 or 1.
fn scalar_cmp(
    fb: &mut FunctionBuilder,
    ty: &Ty,
    a: ValueId,
    b: ValueId,
    span: Span,
) -> CodegenResult<ValueId> {
    let (lt, gt) = match ty.strip() {
        Ty::Integer { .. } | Ty::Enum(_) => (
            fb.icmp(IntPredicate::Slt, a, b),
            fb.icmp(IntPredicate::Sgt, a, b),
        ),
        Ty::UnsignedInteger { .. } | Ty::Logical { .. } => (
            fb.icmp(IntPredicate::Ult, a, b),
            fb.icmp(IntPredicate::Ugt, a, b),
        ),
        Ty::Real { .. } => (
            fb.fcmp(FloatPredicate::Olt, a, b),
            fb.fcmp(FloatPredicate::Ogt, a, b),
        ),
        Ty::Character { .. } => {
            let ord = fb.call(runtime::STRCMP, IrType::I32, &[a, b]);
            let zero = fb.const_i32(0);
            (fb.icmp_slt(ord, zero), fb.icmp_sgt(ord, zero))
        }
        _ => {
            return Err(CodegenError::not_implemented(
                "ordering of this type",
                span,
            ))
        }
    };
    Ok(ordering(fb, lt, gt))
}

/// `lt ? -1 : (gt ? 1 : 0)` as `i8`.
pub(crate) fn ordering(fb: &mut FunctionBuilder, lt: ValueId, gt: ValueId) -> ValueId {
    let minus = fb.const_i8(-1);
    let plus = fb.const_i8(1);
    let zero = fb.const_i8(0);
    let rest = fb.select(gt, plus, zero);
    fb.select(lt, minus, rest)
}

/// Bucket of a loaded key for a table of `capacity` (an `i32`) slots.
fn scalar_hash(
    fb: &mut FunctionBuilder,
    ty: &Ty,
    key: ValueId,
    capacity: ValueId,
    span: Span,
) -> CodegenResult<ValueId> {
    Ok(match ty.strip() {
        Ty::Integer { .. } | Ty::Enum(_) => {
            let k = fb.int_cast(key, IrType::I64, true);
            let cap = fb.sext(capacity, IrType::I64);
            let r = fb.srem(k, cap);
            let r = fb.add(r, cap);
            let r = fb.srem(r, cap);
            fb.trunc(r, IrType::I32)
        }
        Ty::UnsignedInteger { .. } => {
            let k = fb.int_cast(key, IrType::I64, false);
            let cap = fb.zext(capacity, IrType::I64);
            let r = fb.urem(k, cap);
            fb.trunc(r, IrType::I32)
        }
        Ty::Logical { .. } => {
            let k = fb.zext(key, IrType::I32);
            fb.urem(k, capacity)
        }
        Ty::Character { .. } => string_hash(fb, key, capacity)?,
        Ty::Real { .. } | Ty::Complex { .. } => {
            return Err(CodegenError::not_implemented(
                "hashing of real and complex keys",
                span,
            ))
        }
        _ => return Err(CodegenError::not_implemented("hashing of this type", span)),
    })
}

/// `h = (h * 31 + byte) mod 100000009` over the bytes, then `h mod capacity`.
fn string_hash(
    fb: &mut FunctionBuilder,
    key: ValueId,
    capacity: ValueId,
) -> CodegenResult<ValueId> {
    let len = fb.call(runtime::STRLEN, IrType::I64, &[key]);
    let len = fb.trunc(len, IrType::I32);
    let zero = fb.const_i64(0);
    let acc = fb.alloca_init(zero);
    let start = fb.const_i32(0);
    for_range(fb, start, len, |fb, i| {
        let byte_ptr = fb.element_ptr(&IrType::I8, key, i);
        let byte = fb.load(IrType::I8, byte_ptr);
        let byte = fb.zext(byte, IrType::I64);
        let h = fb.load(IrType::I64, acc);
        let base = fb.const_i64(31);
        let h = fb.mul(h, base);
        let h = fb.add(h, byte);
        let modulus = fb.const_i64(STRING_HASH_MODULUS);
        let h = fb.srem(h, modulus);
        fb.store(h, acc);
        Ok(())
    })?;
    let h = fb.load(IrType::I64, acc);
    let cap = fb.sext(capacity, IrType::I64);
    let h = fb.srem(h, cap);
    Ok(fb.trunc(h, IrType::I32))
}

/// Heap copy of a string; null stays null.
fn string_dup(fb: &mut FunctionBuilder) {
    let src = fb.param(0);
    let null = fb.is_null(src);
    let done = fb.append_block("null");
    let copy = fb.append_block("copy");
    fb.cond_br(null, done, copy);
    fb.position_at_end(done);
    let nothing = fb.const_null();
    fb.ret(nothing);

    fb.position_at_end(copy);
    let len = fb.call(runtime::STRLEN, IrType::I64, &[src]);
    let len = fb.trunc(len, IrType::I32);
    let size = fb.add_const(len, 1);
    let dst = fb.call(runtime::MALLOC, IrType::Ptr, &[size]);
    fb.memcpy(dst, src, size);
    fb.ret(dst);
}

/// Fresh heap string holding `a` followed by `b`.
fn string_concat(fb: &mut FunctionBuilder) {
    let (a, b) = (fb.param(0), fb.param(1));
    let la = fb.call(runtime::STRLEN, IrType::I64, &[a]);
    let la = fb.trunc(la, IrType::I32);
    let lb = fb.call(runtime::STRLEN, IrType::I64, &[b]);
    let lb = fb.trunc(lb, IrType::I32);
    let total = fb.add(la, lb);
    let size = fb.add_const(total, 1);
    let dst = fb.call(runtime::MALLOC, IrType::Ptr, &[size]);
    fb.memcpy(dst, a, la);
    let tail = fb.element_ptr(&IrType::I8, dst, la);
    let tail_len = fb.add_const(lb, 1);
    fb.memcpy(tail, b, tail_len);
    fb.ret(dst);
}

/// Format directive and promoted arguments printing `value` of type `ty`.
pub(crate) fn printf_arg(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    ty: &Ty,
    value: ValueId,
    style: PrintStyle,
    span: Span,
) -> CodegenResult<(String, Vec<ValueId>)> {
    let direct = |f: &str| (f.to_string(), vec![value]);
    Ok(match ty.strip() {
        Ty::Integer { kind: 8 } => direct("%lld"),
        Ty::Integer { .. } | Ty::Enum(_) => {
            let v = fb.int_cast(value, IrType::I32, true);
            ("%d".to_string(), vec![v])
        }
        Ty::UnsignedInteger { kind: 8 } => direct("%llu"),
        Ty::UnsignedInteger { .. } => {
            let v = fb.int_cast(value, IrType::I32, false);
            ("%u".to_string(), vec![v])
        }
        Ty::Logical { .. } => {
            let v = fb.zext(value, IrType::I32);
            ("%d".to_string(), vec![v])
        }
        Ty::Real { kind } => {
            let v = fb.float_cast(value, IrType::Double);
            let format = match (style, kind) {
                (PrintStyle::Statement, 8) => "%23.17f",
                _ => "%f",
            };
            (format.to_string(), vec![v])
        }
        Ty::Complex { .. } => {
            let re = fb.extract_value(value, 0);
            let im = fb.extract_value(value, 1);
            let re = fb.float_cast(re, IrType::Double);
            let im = fb.float_cast(im, IrType::Double);
            ("(%f,%f)".to_string(), vec![re, im])
        }
        Ty::Character { .. } => match style {
            PrintStyle::Statement => direct("%s"),
            PrintStyle::Element => direct("'%s'"),
        },
        other => {
            return Err(CodegenError::not_implemented(
                format!("printing {}", other.type_code(&cx.unit.symbols)),
                span,
            ))
        }
    })
}

/// Eq and deep copy of derived types, field by field. The parent part is
/// field 0 and is handled by the parent's own helper.
fn struct_op(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    sym: SymbolId,
    op: HelperOp,
    span: Span,
) -> CodegenResult<()> {
    let layout = cx.struct_layout(sym, span)?;
    if !matches!(op, HelperOp::Eq | HelperOp::DeepCopy) || layout.kind == StructKind::Union {
        return Err(CodegenError::not_implemented(
            format!("`{}` on derived type `{}`", op.suffix(), cx.name(sym)),
            span,
        ));
    }
    let (a, b) = (fb.param(0), fb.param(1));
    let mut parts: Vec<(Ty, u32)> = Vec::new();
    if let Some(parent) = layout.parent {
        parts.push((Ty::Struct(parent), 0));
    }
    for member in cx.unit.symbols.struct_members(sym) {
        let var = cx.variable(member)?;
        let index = layout.field(&var.name).ok_or_else(|| {
            CodegenError::internal(format!("member `{}` missing from its layout", var.name))
        })?;
        parts.push((var.ty.clone(), index));
    }

    match op {
        HelperOp::Eq => {
            let unequal = fb.append_block("unequal");
            for (ty, index) in &parts {
                let fa = fb.struct_gep(&layout.ty, a, *index);
                let fbp = fb.struct_gep(&layout.ty, b, *index);
                let eq = cx.helper(ty, HelperOp::Eq, span)?.call(fb, &[fa, fbp]);
                let next = fb.append_block("field");
                fb.cond_br(eq, next, unequal);
                fb.position_at_end(next);
            }
            let yes = fb.const_bool(true);
            fb.ret(yes);
            fb.position_at_end(unequal);
            let no = fb.const_bool(false);
            fb.ret(no);
        }
        _ => {
            for (ty, index) in &parts {
                let src = fb.struct_gep(&layout.ty, a, *index);
                let dst = fb.struct_gep(&layout.ty, b, *index);
                cx.copy_value(fb, ty, src, dst, span)?;
            }
            fb.ret_void();
        }
    }
    Ok(())
}
