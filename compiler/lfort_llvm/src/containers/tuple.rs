//! Tuple helpers. A tuple is a literal struct of its element storages, so
//! every helper walks the fields in order.

use lfort_ir::{Span, Ty};

use super::{if_then, HelperOp};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{CastOp, FunctionBuilder, IrType, ValueId};
use crate::runtime;

pub(super) fn generate(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    ty: &Ty,
    elements: &[Ty],
    op: HelperOp,
    span: Span,
) -> CodegenResult<()> {
    let record = cx.storage_type(ty, span)?;
    let (a, b) = (fb.param(0), fb.param(1));
    match op {
        HelperOp::Eq => {
            let unequal = fb.append_block("unequal");
            for (i, el) in fields(elements) {
                let eq = cx.helper(el, HelperOp::Eq, span)?;
                let x = fb.struct_gep(&record, a, i);
                let y = fb.struct_gep(&record, b, i);
                let same = eq.call(fb, &[x, y]);
                let next = fb.append_block("field");
                fb.cond_br(same, next, unequal);
                fb.position_at_end(next);
            }
            let yes = fb.const_bool(true);
            fb.ret(yes);
            fb.position_at_end(unequal);
            let no = fb.const_bool(false);
            fb.ret(no);
        }
        HelperOp::Cmp => {
            for (i, el) in fields(elements) {
                let cmp = cx.helper(el, HelperOp::Cmp, span)?;
                let x = fb.struct_gep(&record, a, i);
                let y = fb.struct_gep(&record, b, i);
                let ord = cmp.call(fb, &[x, y]);
                let tie = fb.const_i8(0);
                let decided = fb.icmp_ne(ord, tie);
                if_then(fb, decided, |fb| {
                    fb.ret(ord);
                    Ok(())
                })?;
            }
            let tie = fb.const_i8(0);
            fb.ret(tie);
        }
        HelperOp::Hash => {
            // Sum of the element buckets, reduced once more.
            let capacity = fb.param(1);
            let mut acc = fb.const_i32(0);
            for (i, el) in fields(elements) {
                let hash = cx.helper(el, HelperOp::Hash, span)?;
                let x = fb.struct_gep(&record, a, i);
                let h = hash.call(fb, &[x, capacity]);
                let sum = fb.add(acc, h);
                acc = fb.srem(sum, capacity);
            }
            fb.ret(acc);
        }
        HelperOp::DeepCopy => {
            for (i, el) in fields(elements) {
                let x = fb.struct_gep(&record, a, i);
                let y = fb.struct_gep(&record, b, i);
                cx.copy_value(fb, el, x, y, span)?;
            }
            fb.ret_void();
        }
        HelperOp::Print => {
            cx.print_literal(fb, "(");
            for (i, el) in fields(elements) {
                if i > 0 {
                    cx.print_literal(fb, ", ");
                }
                let show = cx.helper(el, HelperOp::Print, span)?;
                let x = fb.struct_gep(&record, a, i);
                show.call(fb, &[x]);
            }
            cx.print_literal(fb, ")");
            fb.ret_void();
        }
        other => {
            return Err(CodegenError::internal(format!(
                "`{}` is not a tuple operation",
                other.suffix()
            )))
        }
    }
    Ok(())
}

fn fields(elements: &[Ty]) -> impl Iterator<Item = (u32, &Ty)> {
    elements
        .iter()
        .enumerate()
        .map(|(i, el)| (u32::try_from(i).unwrap_or(u32::MAX), el))
}

impl CodegenCx<'_> {
    /// `out = a + b` for tuple values at `a` and `b`, deep copying the
    /// elements into the tuple at `out`.
    pub(crate) fn tuple_concat(
        &mut self,
        fb: &mut FunctionBuilder,
        (a, a_ty): (ValueId, &Ty),
        (b, b_ty): (ValueId, &Ty),
        (out, out_ty): (ValueId, &Ty),
        span: Span,
    ) -> CodegenResult<()> {
        let (Ty::Tuple(left), Ty::Tuple(right)) = (a_ty.strip(), b_ty.strip()) else {
            return Err(CodegenError::internal("tuple concatenation of non-tuples"));
        };
        let a_rec = self.storage_type(a_ty, span)?;
        let b_rec = self.storage_type(b_ty, span)?;
        let out_rec = self.storage_type(out_ty, span)?;
        let sources = fields(left)
            .map(|(i, el)| (a, &a_rec, i, el))
            .chain(fields(right).map(|(i, el)| (b, &b_rec, i, el)));
        for (target, (base, rec, i, el)) in sources.enumerate() {
            let target = u32::try_from(target).unwrap_or(u32::MAX);
            let src = fb.struct_gep(rec, base, i);
            let dst = fb.struct_gep(&out_rec, out, target);
            self.copy_value(fb, el, src, dst, span)?;
        }
        Ok(())
    }

    /// `(before, sep, after)` of `s.partition(sep)` into the tuple at `out`.
    /// Without a match the tuple is `(s, "", "")`.
    pub(crate) fn string_partition(
        &mut self,
        fb: &mut FunctionBuilder,
        s: ValueId,
        sep: ValueId,
        out: ValueId,
        span: Span,
    ) -> CodegenResult<()> {
        let record = IrType::Struct(vec![IrType::Ptr, IrType::Ptr, IrType::Ptr]);
        let dup = self.helper(&Ty::string(), HelperOp::Dup, span)?;
        let empty = self.module.string_constant("");
        let empty = fb.global(&empty);

        let at = fb.call(runtime::STRSTR, IrType::Ptr, &[s, sep]);
        let missing = fb.is_null(at);
        let found = fb.append_block("partition.found");
        let absent = fb.append_block("partition.absent");
        let done = fb.append_block("partition.end");
        fb.cond_br(missing, absent, found);

        fb.position_at_end(absent);
        for (field, value) in [(0, s), (1, empty), (2, empty)] {
            let copy = dup.call(fb, &[value]);
            fb.store_field(&record, out, field, copy);
        }
        fb.br(done);

        fb.position_at_end(found);
        let start = fb.cast(CastOp::PtrToInt, s, IrType::I64);
        let hit = fb.cast(CastOp::PtrToInt, at, IrType::I64);
        let before_len = fb.sub(hit, start);
        let before_len = fb.trunc(before_len, IrType::I32);
        let size = fb.add_const(before_len, 1);
        let before = fb.call(runtime::MALLOC, IrType::Ptr, &[size]);
        fb.memcpy(before, s, before_len);
        let nul_at = fb.element_ptr(&IrType::I8, before, before_len);
        let nul = fb.const_i8(0);
        fb.store(nul, nul_at);
        fb.store_field(&record, out, 0, before);
        let sep_copy = dup.call(fb, &[sep]);
        fb.store_field(&record, out, 1, sep_copy);
        let sep_len = fb.call(runtime::STRLEN, IrType::I64, &[sep]);
        let sep_len = fb.trunc(sep_len, IrType::I32);
        let rest = fb.element_ptr(&IrType::I8, at, sep_len);
        let after = dup.call(fb, &[rest]);
        fb.store_field(&record, out, 2, after);
        fb.br(done);

        fb.position_at_end(done);
        Ok(())
    }
}
