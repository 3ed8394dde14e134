//! Growable list helpers over `{ i32 len, i32 cap, ptr data }`.
//!
//! `data` holds `cap` elements back to back. A full list grows to
//! `2 * cap + 1` through `realloc`, so appends are amortized O(1).

use lfort_ir::{Span, Ty};

use super::{
    byte_offset, for_range, if_then, move_bytes, HelperOp, INDEX_END, LIST_CAP, LIST_DATA,
    LIST_LEN,
};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FunctionBuilder, IrType, ValueId};
use crate::runtime;

/// Element type facts a list helper needs.
struct Elements {
    list: Ty,
    record: IrType,
    element: Ty,
    storage: IrType,
    size: u64,
}

impl Elements {
    fn len(&self, fb: &mut FunctionBuilder, list: ValueId) -> ValueId {
        fb.load_field(&self.record, IrType::I32, list, LIST_LEN)
    }

    fn cap(&self, fb: &mut FunctionBuilder, list: ValueId) -> ValueId {
        fb.load_field(&self.record, IrType::I32, list, LIST_CAP)
    }

    fn data(&self, fb: &mut FunctionBuilder, list: ValueId) -> ValueId {
        fb.load_field(&self.record, IrType::Ptr, list, LIST_DATA)
    }

    fn set_len(&self, fb: &mut FunctionBuilder, list: ValueId, len: ValueId) {
        fb.store_field(&self.record, list, LIST_LEN, len);
    }

    /// Address of element `index`.
    fn slot(&self, fb: &mut FunctionBuilder, list: ValueId, index: ValueId) -> ValueId {
        let data = self.data(fb, list);
        byte_offset(fb, data, index, self.size)
    }
}

pub(super) fn generate(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    element: &Ty,
    op: HelperOp,
    span: Span,
) -> CodegenResult<()> {
    let list = Ty::list(element.clone());
    let el = Elements {
        record: cx.container_layout(&list, span)?.ty,
        storage: cx.storage_type(element, span)?,
        size: cx.size_of(element, span)?,
        element: element.clone(),
        list,
    };
    let this = fb.param(0);
    match op {
        HelperOp::Init => {
            let capacity = fb.param(1);
            init(fb, &el, this, capacity);
        }
        HelperOp::Len => {
            let len = el.len(fb, this);
            fb.ret(len);
        }
        HelperOp::Append => append(cx, fb, &el, span)?,
        HelperOp::Insert => insert(cx, fb, &el, span)?,
        HelperOp::Read => {
            let pos = fb.param(1);
            check_index(cx, fb, &el, this, pos)?;
            let slot = el.slot(fb, this, pos);
            fb.ret(slot);
        }
        HelperOp::Write => {
            let (pos, item) = (fb.param(1), fb.param(2));
            check_index(cx, fb, &el, this, pos)?;
            let slot = el.slot(fb, this, pos);
            release(fb, &el, slot);
            cx.copy_value(fb, &el.element, item, slot, span)?;
            fb.ret_void();
        }
        HelperOp::PopLast => pop_last(cx, fb, &el)?,
        HelperOp::Pop => pop_at(cx, fb, &el)?,
        HelperOp::Remove => remove(cx, fb, &el, span)?,
        HelperOp::Index => {
            let (item, start, end) = (fb.param(1), fb.param(2), fb.param(3));
            let found = find(cx, fb, &el, this, item, start, end, span)?;
            let missing = fb.const_i32(-1);
            let absent = fb.icmp_eq(found, missing);
            if_then(fb, absent, |fb| not_found(cx, fb, &el, item))?;
            fb.ret(found);
        }
        HelperOp::Contains => {
            let item = fb.param(1);
            let start = fb.const_i32(0);
            let end = el.len(fb, this);
            let found = find(cx, fb, &el, this, item, start, end, span)?;
            let missing = fb.const_i32(-1);
            let present = fb.icmp_ne(found, missing);
            fb.ret(present);
        }
        HelperOp::Count => count(cx, fb, &el, span)?,
        HelperOp::Reverse => reverse(fb, &el)?,
        HelperOp::Clear => {
            if el.element.is_character() {
                let start = fb.const_i32(0);
                let len = el.len(fb, this);
                for_range(fb, start, len, |fb, i| {
                    let slot = el.slot(fb, this, i);
                    release(fb, &el, slot);
                    Ok(())
                })?;
            }
            let zero = fb.const_i32(0);
            el.set_len(fb, this, zero);
            fb.ret_void();
        }
        HelperOp::Concat => concat(cx, fb, &el, span)?,
        HelperOp::DeepCopy => deepcopy(cx, fb, &el, span)?,
        HelperOp::Eq => equal(cx, fb, &el, span)?,
        HelperOp::Cmp => compare(cx, fb, &el, span)?,
        HelperOp::Print => print(cx, fb, &el, span)?,
        HelperOp::Hash => {
            return Err(CodegenError::unsupported("unhashable type: 'list'", span));
        }
        other => {
            return Err(CodegenError::internal(format!(
                "`{}` is not a list operation",
                other.suffix()
            )))
        }
    }
    Ok(())
}

fn init(fb: &mut FunctionBuilder, el: &Elements, this: ValueId, capacity: ValueId) {
    let zero = fb.const_i32(0);
    el.set_len(fb, this, zero);
    fb.store_field(&el.record, this, LIST_CAP, capacity);
    let size = fb.const_i32(i32::try_from(el.size).unwrap_or(i32::MAX));
    let bytes = fb.mul(capacity, size);
    let data = fb.call(runtime::MALLOC, IrType::Ptr, &[bytes]);
    fb.store_field(&el.record, this, LIST_DATA, data);
    fb.ret_void();
}

/// Make room for one more element, growing to `2 * cap + 1` when full.
fn reserve_one(fb: &mut FunctionBuilder, el: &Elements, this: ValueId) -> CodegenResult<()> {
    let len = el.len(fb, this);
    let cap = el.cap(fb, this);
    let full = fb.icmp_sge(len, cap);
    if_then(fb, full, |fb| {
        let cap = el.cap(fb, this);
        let two = fb.const_i32(2);
        let doubled = fb.mul(cap, two);
        let new_cap = fb.add_const(doubled, 1);
        let size = fb.const_i32(i32::try_from(el.size).unwrap_or(i32::MAX));
        let bytes = fb.mul(new_cap, size);
        let data = el.data(fb, this);
        let grown = fb.call(runtime::REALLOC, IrType::Ptr, &[data, bytes]);
        fb.store_field(&el.record, this, LIST_DATA, grown);
        fb.store_field(&el.record, this, LIST_CAP, new_cap);
        Ok(())
    })
}

fn append(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (this, item) = (fb.param(0), fb.param(1));
    reserve_one(fb, el, this)?;
    let len = el.len(fb, this);
    let slot = el.slot(fb, this, len);
    cx.copy_value(fb, &el.element, item, slot, span)?;
    let len = fb.add_const(len, 1);
    el.set_len(fb, this, len);
    fb.ret_void();
    Ok(())
}

/// `insert(pos, item)`: negative positions count from the end; positions
/// outside the list clamp to its ends.
fn insert(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (this, pos, item) = (fb.param(0), fb.param(1), fb.param(2));
    reserve_one(fb, el, this)?;
    let len = el.len(fb, this);
    let pos = clamp_bound(fb, pos, len);

    // Shift [pos, len) one slot right, starting from the tail.
    let cursor = fb.alloca_init(len);
    let head = fb.append_block("shift.head");
    let body = fb.append_block("shift.body");
    let done = fb.append_block("shift.end");
    fb.br(head);
    fb.position_at_end(head);
    let i = fb.load(IrType::I32, cursor);
    let more = fb.icmp_sgt(i, pos);
    fb.cond_br(more, body, done);
    fb.position_at_end(body);
    let i = fb.load(IrType::I32, cursor);
    let prev = fb.add_const(i, -1);
    let from = el.slot(fb, this, prev);
    let to = el.slot(fb, this, i);
    move_bytes(fb, to, from, el.size);
    fb.store(prev, cursor);
    fb.br(head);

    fb.position_at_end(done);
    let slot = el.slot(fb, this, pos);
    cx.copy_value(fb, &el.element, item, slot, span)?;
    let len = fb.add_const(len, 1);
    el.set_len(fb, this, len);
    fb.ret_void();
    Ok(())
}

fn check_index(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    this: ValueId,
    pos: ValueId,
) -> CodegenResult<()> {
    let len = el.len(fb, this);
    let zero = fb.const_i32(0);
    let low = fb.icmp_slt(pos, zero);
    let high = fb.icmp_sge(pos, len);
    let bad = fb.or(low, high);
    if_then(fb, bad, |fb| {
        let last = fb.add_const(len, -1);
        cx.runtime_error(
            fb,
            "IndexError: List index is out of range. Index range is (0, %d), but index is %d",
            &[last, pos],
        );
        Ok(())
    })
}

/// Free what the element at `slot` owns before it is overwritten.
fn release(fb: &mut FunctionBuilder, el: &Elements, slot: ValueId) {
    if el.element.is_character() {
        let old = fb.load(IrType::Ptr, slot);
        fb.call(runtime::FREE, IrType::Void, &[old]);
    }
}

/// Python slice bound: negative `pos` counts from `len`, then the result
/// is clamped to `[0, len]`.
fn clamp_bound(fb: &mut FunctionBuilder, pos: ValueId, len: ValueId) -> ValueId {
    let zero = fb.const_i32(0);
    let negative = fb.icmp_slt(pos, zero);
    let from_end = fb.add(pos, len);
    let pos = fb.select(negative, from_end, pos);
    let below = fb.icmp_slt(pos, zero);
    let pos = fb.select(below, zero, pos);
    let above = fb.icmp_sgt(pos, len);
    fb.select(above, len, pos)
}

/// `out = pop()`: move the last element out.
fn pop_last(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, el: &Elements) -> CodegenResult<()> {
    let (this, out) = (fb.param(0), fb.param(1));
    let len = el.len(fb, this);
    check_not_empty(cx, fb, len)?;
    let last = fb.add_const(len, -1);
    let slot = el.slot(fb, this, last);
    move_bytes(fb, out, slot, el.size);
    el.set_len(fb, this, last);
    fb.ret_void();
    Ok(())
}

fn check_not_empty(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, len: ValueId) -> CodegenResult<()> {
    let zero = fb.const_i32(0);
    let empty = fb.icmp_eq(len, zero);
    if_then(fb, empty, |fb| {
        cx.runtime_error(fb, "IndexError: pop from empty list", &[]);
        Ok(())
    })
}

/// `out = pop(pos)`: move element `pos` out and close the gap.
fn pop_at(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, el: &Elements) -> CodegenResult<()> {
    let (this, pos, out) = (fb.param(0), fb.param(1), fb.param(2));
    let len = el.len(fb, this);
    check_not_empty(cx, fb, len)?;
    let zero = fb.const_i32(0);
    let negative = fb.icmp_slt(pos, zero);
    let from_end = fb.add(pos, len);
    let pos = fb.select(negative, from_end, pos);
    check_index(cx, fb, el, this, pos)?;
    let slot = el.slot(fb, this, pos);
    move_bytes(fb, out, slot, el.size);
    close_gap(fb, el, this, pos)?;
    fb.ret_void();
    Ok(())
}

/// Shift `(pos, len)` one slot left and shrink the list by one.
fn close_gap(
    fb: &mut FunctionBuilder,
    el: &Elements,
    this: ValueId,
    pos: ValueId,
) -> CodegenResult<()> {
    let len = el.len(fb, this);
    let last = fb.add_const(len, -1);
    for_range(fb, pos, last, |fb, i| {
        let next = fb.add_const(i, 1);
        let from = el.slot(fb, this, next);
        let to = el.slot(fb, this, i);
        move_bytes(fb, to, from, el.size);
        Ok(())
    })?;
    el.set_len(fb, this, last);
    Ok(())
}

/// First index in `[start, end)` holding `item`, or -1. Negative bounds
/// count from the end; both are clamped to `[0, len]`.
#[allow(clippy::too_many_arguments, reason = "builder plus the search window")]
fn find(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    this: ValueId,
    item: ValueId,
    start: ValueId,
    end: ValueId,
    span: Span,
) -> CodegenResult<ValueId> {
    let eq = cx.helper(&el.element, HelperOp::Eq, span)?;
    let len = el.len(fb, this);
    let start = clamp_bound(fb, start, len);
    let end = clamp_bound(fb, end, len);
    let missing = fb.const_i32(-1);
    let result = fb.alloca_init(missing);
    let exit = fb.append_block("found");
    for_range(fb, start, end, |fb, i| {
        let slot = el.slot(fb, this, i);
        let same = eq.call(fb, &[slot, item]);
        if_then(fb, same, |fb| {
            fb.store(i, result);
            fb.br(exit);
            Ok(())
        })
    })?;
    fb.br(exit);
    fb.position_at_end(exit);
    Ok(fb.load(IrType::I32, result))
}

fn not_found(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    item: ValueId,
) -> CodegenResult<()> {
    let message = "ValueError: The list does not contain the element";
    match el.element.strip() {
        Ty::Integer { kind: 8 } => {
            let v = fb.load(IrType::I64, item);
            cx.runtime_error(fb, &format!("{message}: %lld"), &[v]);
        }
        Ty::Integer { .. } => {
            let v = fb.load(el.storage.clone(), item);
            let v = fb.int_cast(v, IrType::I32, true);
            cx.runtime_error(fb, &format!("{message}: %d"), &[v]);
        }
        Ty::Character { .. } => {
            let v = fb.load(IrType::Ptr, item);
            cx.runtime_error(fb, &format!("{message}: %s"), &[v]);
        }
        _ => cx.runtime_error(fb, message, &[]),
    }
    Ok(())
}

fn remove(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (this, item) = (fb.param(0), fb.param(1));
    let start = fb.const_i32(0);
    let end = fb.const_i32(INDEX_END);
    let found = find(cx, fb, el, this, item, start, end, span)?;
    let missing = fb.const_i32(-1);
    let absent = fb.icmp_eq(found, missing);
    if_then(fb, absent, |fb| not_found(cx, fb, el, item))?;
    let slot = el.slot(fb, this, found);
    release(fb, el, slot);
    close_gap(fb, el, this, found)?;
    fb.ret_void();
    Ok(())
}

fn count(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (this, item) = (fb.param(0), fb.param(1));
    let eq = cx.helper(&el.element, HelperOp::Eq, span)?;
    let zero = fb.const_i32(0);
    let total = fb.alloca_init(zero);
    let len = el.len(fb, this);
    for_range(fb, zero, len, |fb, i| {
        let slot = el.slot(fb, this, i);
        let same = eq.call(fb, &[slot, item]);
        if_then(fb, same, |fb| {
            let n = fb.load(IrType::I32, total);
            let n = fb.add_const(n, 1);
            fb.store(n, total);
            Ok(())
        })
    })?;
    let n = fb.load(IrType::I32, total);
    fb.ret(n);
    Ok(())
}

fn reverse(fb: &mut FunctionBuilder, el: &Elements) -> CodegenResult<()> {
    let this = fb.param(0);
    let tmp = fb.alloca(el.storage.clone());
    let len = el.len(fb, this);
    let two = fb.const_i32(2);
    let half = fb.sdiv(len, two);
    let zero = fb.const_i32(0);
    for_range(fb, zero, half, |fb, i| {
        let len = el.len(fb, this);
        let last = fb.add_const(len, -1);
        let j = fb.sub(last, i);
        let a = el.slot(fb, this, i);
        let b = el.slot(fb, this, j);
        move_bytes(fb, tmp, a, el.size);
        move_bytes(fb, a, b, el.size);
        move_bytes(fb, b, tmp, el.size);
        Ok(())
    })?;
    fb.ret_void();
    Ok(())
}

/// `out = a + b` as a fresh list.
fn concat(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (a, b, out) = (fb.param(0), fb.param(1), fb.param(2));
    let init = cx.helper(&el.list, HelperOp::Init, span)?;
    let append = cx.helper(&el.list, HelperOp::Append, span)?;
    let la = el.len(fb, a);
    let lb = el.len(fb, b);
    let total = fb.add(la, lb);
    let capacity = fb.add_const(total, 1);
    init.call(fb, &[out, capacity]);
    for source in [a, b] {
        let zero = fb.const_i32(0);
        let len = el.len(fb, source);
        for_range(fb, zero, len, |fb, i| {
            let slot = el.slot(fb, source, i);
            append.call(fb, &[out, slot]);
            Ok(())
        })?;
    }
    fb.ret_void();
    Ok(())
}

/// Fill the uninitialised list `dst` with an independent copy of `src`.
fn deepcopy(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (src, dst) = (fb.param(0), fb.param(1));
    let len = el.len(fb, src);
    let cap = el.cap(fb, src);
    el.set_len(fb, dst, len);
    fb.store_field(&el.record, dst, LIST_CAP, cap);
    let size = fb.const_i32(i32::try_from(el.size).unwrap_or(i32::MAX));
    let bytes = fb.mul(cap, size);
    let data = fb.call(runtime::MALLOC, IrType::Ptr, &[bytes]);
    fb.store_field(&el.record, dst, LIST_DATA, data);

    if el.element.needs_deepcopy() || el.element.is_character() {
        let zero = fb.const_i32(0);
        for_range(fb, zero, len, |fb, i| {
            let from = el.slot(fb, src, i);
            let to = el.slot(fb, dst, i);
            cx.copy_value(fb, &el.element, from, to, span)
        })?;
    } else {
        let from = el.data(fb, src);
        fb.memcpy(data, from, bytes);
    }
    fb.ret_void();
    Ok(())
}

/// Same length and pairwise equal elements.
fn equal(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (a, b) = (fb.param(0), fb.param(1));
    let eq = cx.helper(&el.element, HelperOp::Eq, span)?;
    let unequal = fb.append_block("unequal");
    let la = el.len(fb, a);
    let lb = el.len(fb, b);
    let same_len = fb.icmp_eq(la, lb);
    let compare = fb.append_block("elements");
    fb.cond_br(same_len, compare, unequal);
    fb.position_at_end(compare);
    let zero = fb.const_i32(0);
    for_range(fb, zero, la, |fb, i| {
        let x = el.slot(fb, a, i);
        let y = el.slot(fb, b, i);
        let same = eq.call(fb, &[x, y]);
        let different = fb.not(same);
        if_then(fb, different, |fb| {
            fb.br(unequal);
            Ok(())
        })
    })?;
    let yes = fb.const_bool(true);
    fb.ret(yes);
    fb.position_at_end(unequal);
    let no = fb.const_bool(false);
    fb.ret(no);
    Ok(())
}

/// Lexicographic order, a proper prefix ordering first.
fn compare(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let (a, b) = (fb.param(0), fb.param(1));
    let cmp = cx.helper(&el.element, HelperOp::Cmp, span)?;
    let la = el.len(fb, a);
    let lb = el.len(fb, b);
    let shorter = fb.icmp_slt(la, lb);
    let common = fb.select(shorter, la, lb);
    let zero = fb.const_i32(0);
    for_range(fb, zero, common, |fb, i| {
        let x = el.slot(fb, a, i);
        let y = el.slot(fb, b, i);
        let ord = cmp.call(fb, &[x, y]);
        let tie = fb.const_i8(0);
        let decided = fb.icmp_ne(ord, tie);
        if_then(fb, decided, |fb| {
            fb.ret(ord);
            Ok(())
        })
    })?;
    let lt = fb.icmp_slt(la, lb);
    let gt = fb.icmp_sgt(la, lb);
    let ord = super::value_ops::ordering(fb, lt, gt);
    fb.ret(ord);
    Ok(())
}

/// `[a, b, c]`.
fn print(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    el: &Elements,
    span: Span,
) -> CodegenResult<()> {
    let this = fb.param(0);
    let show = cx.helper(&el.element, HelperOp::Print, span)?;
    cx.print_literal(fb, "[");
    let len = el.len(fb, this);
    let zero = fb.const_i32(0);
    for_range(fb, zero, len, |fb, i| {
        let first = fb.icmp_eq(i, zero);
        let later = fb.not(first);
        if_then(fb, later, |fb| {
            cx.print_literal(fb, ", ");
            Ok(())
        })?;
        let slot = el.slot(fb, this, i);
        show.call(fb, &[slot]);
        Ok(())
    })?;
    cx.print_literal(fb, "]");
    fb.ret_void();
    Ok(())
}
