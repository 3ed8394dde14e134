//! Separate-chaining dicts and sets.
//!
//! Record: `{ i32 occupancy, i32 filled, i32 capacity, ptr buckets,
//! ptr mask, i1 rehash }`. `buckets` holds one node inline per bucket;
//! further nodes of a chain are heap allocated and linked through the
//! node's trailing `next` pointer. A bucket's mask byte is 1 while its
//! chain is non-empty.
//!
//! The `rehash` flag latches off for good when an allocation fails, after
//! which the table keeps working at its current capacity.

use lfort_ir::{Span, Ty};

use super::{
    branch_off, for_range, if_then, move_bytes, ContainerKind, ContainerLayout, Helper, HelperOp,
};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FunctionBuilder, IrType, ValueId};
use crate::runtime;

const OCCUPANCY: u32 = 0;
const FILLED: u32 = 1;
const CAPACITY: u32 = 2;
const BUCKETS: u32 = 3;
const MASK: u32 = 4;
const REHASH: u32 = 5;

struct Table {
    ty: Ty,
    record: IrType,
    node: IrType,
    node_size: u64,
    key: Ty,
    value: Option<Ty>,
    key_size: u64,
    value_size: u64,
}

impl Table {
    fn next_field(&self) -> u32 {
        if self.value.is_some() {
            2
        } else {
            1
        }
    }

    fn field(&self, fb: &mut FunctionBuilder, this: ValueId, field: u32, ty: IrType) -> ValueId {
        fb.load_field(&self.record, ty, this, field)
    }

    fn bump(&self, fb: &mut FunctionBuilder, this: ValueId, field: u32, delta: i64) {
        let n = self.field(fb, this, field, IrType::I32);
        let n = fb.add_const(n, delta);
        fb.store_field(&self.record, this, field, n);
    }

    fn capacity(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        self.field(fb, this, CAPACITY, IrType::I32)
    }

    /// Inline head node of bucket `i`.
    fn bucket(&self, fb: &mut FunctionBuilder, this: ValueId, i: ValueId) -> ValueId {
        let buckets = self.field(fb, this, BUCKETS, IrType::Ptr);
        fb.element_ptr(&self.node, buckets, i)
    }

    fn mask_at(&self, fb: &mut FunctionBuilder, this: ValueId, i: ValueId) -> ValueId {
        let mask = self.field(fb, this, MASK, IrType::Ptr);
        fb.element_ptr(&IrType::I8, mask, i)
    }

    fn is_filled(&self, fb: &mut FunctionBuilder, this: ValueId, i: ValueId) -> ValueId {
        let m = self.mask_at(fb, this, i);
        let m = fb.load(IrType::I8, m);
        let zero = fb.const_i8(0);
        fb.icmp_ne(m, zero)
    }

    fn key_of(&self, fb: &mut FunctionBuilder, node: ValueId) -> ValueId {
        fb.struct_gep(&self.node, node, 0)
    }

    fn value_of(&self, fb: &mut FunctionBuilder, node: ValueId) -> ValueId {
        fb.struct_gep(&self.node, node, 1)
    }

    fn next_of(&self, fb: &mut FunctionBuilder, node: ValueId) -> ValueId {
        fb.load_field(&self.node, IrType::Ptr, node, self.next_field())
    }

    fn set_next(&self, fb: &mut FunctionBuilder, node: ValueId, next: ValueId) {
        fb.store_field(&self.node, node, self.next_field(), next);
    }

    fn is_dict(&self) -> bool {
        self.value.is_some()
    }
}

pub(super) fn generate(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    layout: &ContainerLayout,
    op: HelperOp,
    span: Span,
) -> CodegenResult<()> {
    let (ty, key, value) = match &layout.kind {
        ContainerKind::Dict { key, value, .. } => (
            Ty::dict(key.clone(), value.clone()),
            key.clone(),
            Some(value.clone()),
        ),
        ContainerKind::Set { element, .. } => (Ty::set(element.clone()), element.clone(), None),
        ContainerKind::List { .. } => {
            return Err(CodegenError::internal("list layout given to the hash table generator"))
        }
    };
    let mut fields = vec![cx.storage_type(&key, span)?];
    if let Some(v) = &value {
        fields.push(cx.storage_type(v, span)?);
    }
    fields.push(IrType::Ptr);
    let node = cx.module.types.define(&format!("{}_node", layout.prefix), fields);
    let t = Table {
        node_size: cx.module.types.size_of(&node),
        key_size: cx.size_of(&key, span)?,
        value_size: match &value {
            Some(v) => cx.size_of(v, span)?,
            None => 0,
        },
        record: layout.ty.clone(),
        node,
        ty,
        key,
        value,
    };

    let this = fb.param(0);
    match op {
        HelperOp::Init => {
            let capacity = fb.param(1);
            init(fb, &t, this, capacity);
            fb.ret_void();
        }
        HelperOp::Len => {
            let n = t.field(fb, this, OCCUPANCY, IrType::I32);
            fb.ret(n);
        }
        HelperOp::FindNode => find_node(cx, fb, &t, span)?,
        HelperOp::Insert | HelperOp::Add => insert(cx, fb, &t, span)?,
        HelperOp::Rehash => rehash(cx, fb, &t, span)?,
        HelperOp::Contains => {
            let key = fb.param(1);
            let node = find(cx, &t, span)?.call(fb, &[this, key]);
            let found = fb.is_not_null(node);
            fb.ret(found);
        }
        HelperOp::Read => {
            let key = fb.param(1);
            let node = find(cx, &t, span)?.call(fb, &[this, key]);
            let absent = fb.is_null(node);
            if_then(fb, absent, |fb| {
                cx.runtime_error(fb, "KeyError: The dict does not contain the specified key", &[]);
                Ok(())
            })?;
            let value = t.value_of(fb, node);
            fb.ret(value);
        }
        HelperOp::Get => {
            let (key, default) = (fb.param(1), fb.param(2));
            let node = find(cx, &t, span)?.call(fb, &[this, key]);
            let absent = fb.is_null(node);
            let fallback = branch_off(fb, absent, "get.default");
            let value = t.value_of(fb, node);
            fb.ret(value);
            fb.position_at_end(fallback);
            fb.ret(default);
        }
        HelperOp::Pop if t.is_dict() => {
            let (key, out) = (fb.param(1), fb.param(2));
            unlink(cx, fb, &t, this, key, Some(out), true, span)?;
        }
        HelperOp::Remove | HelperOp::Discard => {
            let key = fb.param(1);
            unlink(cx, fb, &t, this, key, None, op == HelperOp::Remove, span)?;
        }
        HelperOp::Keys | HelperOp::Values => collect(cx, fb, &t, op == HelperOp::Keys, span)?,
        HelperOp::Print => print(cx, fb, &t, span)?,
        HelperOp::DeepCopy => deepcopy(cx, fb, &t, span)?,
        HelperOp::Hash => {
            let what = if t.is_dict() { "dict" } else { "set" };
            return Err(CodegenError::unsupported(
                format!("unhashable type: '{what}'"),
                span,
            ));
        }
        other => {
            return Err(CodegenError::not_implemented(
                format!(
                    "`{}` on {}",
                    other.suffix(),
                    t.ty.type_code(&cx.unit.symbols)
                ),
                span,
            ))
        }
    }
    Ok(())
}

fn find(cx: &mut CodegenCx<'_>, t: &Table, span: Span) -> CodegenResult<Helper> {
    cx.helper(&t.ty, HelperOp::FindNode, span)
}

/// Empty table of at least one bucket. Clears the rehash flag when either
/// allocation fails.
fn init(fb: &mut FunctionBuilder, t: &Table, this: ValueId, capacity: ValueId) {
    let one = fb.const_i32(1);
    let too_small = fb.icmp_slt(capacity, one);
    let capacity = fb.select(too_small, one, capacity);
    let zero = fb.const_i32(0);
    fb.store_field(&t.record, this, OCCUPANCY, zero);
    fb.store_field(&t.record, this, FILLED, zero);
    fb.store_field(&t.record, this, CAPACITY, capacity);
    let node_size = fb.const_i32(i32::try_from(t.node_size).unwrap_or(i32::MAX));
    let buckets = fb.call(runtime::CALLOC, IrType::Ptr, &[capacity, node_size]);
    let mask = fb.call(runtime::CALLOC, IrType::Ptr, &[capacity, one]);
    fb.store_field(&t.record, this, BUCKETS, buckets);
    fb.store_field(&t.record, this, MASK, mask);
    let a = fb.is_not_null(buckets);
    let b = fb.is_not_null(mask);
    let ok = fb.and(a, b);
    fb.store_field(&t.record, this, REHASH, ok);
}

/// Visit every node of the chain starting at `head`. The successor is
/// read before `body` runs, so `body` may free the node.
fn walk_chain(
    fb: &mut FunctionBuilder,
    t: &Table,
    head: ValueId,
    mut body: impl FnMut(&mut FunctionBuilder, ValueId) -> CodegenResult<()>,
) -> CodegenResult<()> {
    let cursor = fb.alloca_init(head);
    let test = fb.append_block("chain.head");
    let step = fb.append_block("chain.node");
    let done = fb.append_block("chain.end");
    fb.br(test);
    fb.position_at_end(test);
    let node = fb.load(IrType::Ptr, cursor);
    let end = fb.is_null(node);
    fb.cond_br(end, done, step);
    fb.position_at_end(step);
    let node = fb.load(IrType::Ptr, cursor);
    let next = t.next_of(fb, node);
    fb.store(next, cursor);
    body(fb, node)?;
    fb.br_if_open(test);
    fb.position_at_end(done);
    Ok(())
}

/// Visit every node of every filled bucket.
fn walk_all(
    fb: &mut FunctionBuilder,
    t: &Table,
    this: ValueId,
    mut body: impl FnMut(&mut FunctionBuilder, ValueId) -> CodegenResult<()>,
) -> CodegenResult<()> {
    let capacity = t.capacity(fb, this);
    let zero = fb.const_i32(0);
    for_range(fb, zero, capacity, |fb, i| {
        let filled = t.is_filled(fb, this, i);
        if_then(fb, filled, |fb| {
            let head = t.bucket(fb, this, i);
            walk_chain(fb, t, head, &mut body)
        })
    })
}

/// `find_node(table, key) -> ptr`: node holding `key`, or null.
fn find_node(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    span: Span,
) -> CodegenResult<()> {
    let (this, key) = (fb.param(0), fb.param(1));
    let hash = cx.helper(&t.key, HelperOp::Hash, span)?;
    let eq = cx.helper(&t.key, HelperOp::Eq, span)?;
    let null = fb.const_null();
    let capacity = t.capacity(fb, this);
    let h = hash.call(fb, &[key, capacity]);
    let filled = t.is_filled(fb, this, h);
    let empty = fb.not(filled);
    if_then(fb, empty, |fb| {
        fb.ret(null);
        Ok(())
    })?;
    let head = t.bucket(fb, this, h);
    walk_chain(fb, t, head, |fb, node| {
        let candidate = t.key_of(fb, node);
        let same = eq.call(fb, &[candidate, key]);
        if_then(fb, same, |fb| {
            fb.ret(node);
            Ok(())
        })
    })?;
    fb.ret(null);
    Ok(())
}

/// Rehash when the flag allows and chains average two nodes or more.
fn maybe_rehash(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    this: ValueId,
    span: Span,
) -> CodegenResult<()> {
    let rehash = cx.helper(&t.ty, HelperOp::Rehash, span)?;
    let allowed = t.field(fb, this, REHASH, IrType::I1);
    let occupancy = t.field(fb, this, OCCUPANCY, IrType::I32);
    let filled = t.field(fb, this, FILLED, IrType::I32);
    let zero = fb.const_i32(0);
    let nonempty = fb.icmp_sgt(occupancy, zero);
    let two = fb.const_i32(2);
    let twice = fb.mul(filled, two);
    let long_chains = fb.icmp_sge(occupancy, twice);
    let due = fb.and(nonempty, long_chains);
    let due = fb.and(allowed, due);
    if_then(fb, due, |fb| {
        rehash.call(fb, &[this]);
        Ok(())
    })
}

/// Add a new entry to the chain of its bucket: into the inline head when
/// the bucket is empty, otherwise as a fresh node at the tail.
#[allow(clippy::too_many_arguments, reason = "builder plus the entry being placed")]
fn place(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    this: ValueId,
    key: ValueId,
    value: Option<ValueId>,
    copy: bool,
    span: Span,
) -> CodegenResult<()> {
    let hash = cx.helper(&t.key, HelperOp::Hash, span)?;
    let capacity = t.capacity(fb, this);
    let h = hash.call(fb, &[key, capacity]);
    let head = t.bucket(fb, this, h);
    let filled = t.is_filled(fb, this, h);
    let target = fb.alloca(IrType::Ptr);

    let chained = branch_off(fb, filled, "place.chain");
    // Empty bucket: the inline head takes the entry.
    fb.store(head, target);
    let at = t.mask_at(fb, this, h);
    let one = fb.const_i8(1);
    fb.store(one, at);
    t.bump(fb, this, FILLED, 1);
    let write = fb.append_block("place.write");
    fb.br(write);

    fb.position_at_end(chained);
    let node_size = fb.const_i32(i32::try_from(t.node_size).unwrap_or(i32::MAX));
    let fresh = fb.call(runtime::MALLOC, IrType::Ptr, &[node_size]);
    let tail = fb.alloca_init(head);
    let test = fb.append_block("tail.head");
    let step = fb.append_block("tail.next");
    let link = fb.append_block("tail.end");
    fb.br(test);
    fb.position_at_end(test);
    let node = fb.load(IrType::Ptr, tail);
    let next = t.next_of(fb, node);
    let at_end = fb.is_null(next);
    fb.cond_br(at_end, link, step);
    fb.position_at_end(step);
    fb.store(next, tail);
    fb.br(test);
    fb.position_at_end(link);
    let last = fb.load(IrType::Ptr, tail);
    t.set_next(fb, last, fresh);
    fb.store(fresh, target);
    fb.br(write);

    fb.position_at_end(write);
    let node = fb.load(IrType::Ptr, target);
    let null = fb.const_null();
    t.set_next(fb, node, null);
    let key_dst = t.key_of(fb, node);
    let mut entries = vec![(key, key_dst, t.key.clone(), t.key_size)];
    if let (Some(value), Some(value_ty)) = (value, &t.value) {
        let value_dst = t.value_of(fb, node);
        entries.push((value, value_dst, value_ty.clone(), t.value_size));
    }
    for (src, dst, ty, size) in entries {
        if copy {
            cx.copy_value(fb, &ty, src, dst, span)?;
        } else {
            move_bytes(fb, dst, src, size);
        }
    }
    t.bump(fb, this, OCCUPANCY, 1);
    Ok(())
}

fn insert(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let (this, key) = (fb.param(0), fb.param(1));
    let value = t.is_dict().then(|| fb.param(2));
    maybe_rehash(cx, fb, t, this, span)?;
    let node = find(cx, t, span)?.call(fb, &[this, key]);
    let present = fb.is_not_null(node);
    let overwrite = branch_off(fb, present, "insert.overwrite");

    place(cx, fb, t, this, key, value, true, span)?;
    fb.ret_void();

    fb.position_at_end(overwrite);
    if let (Some(value), Some(value_ty)) = (value, &t.value) {
        let dst = t.value_of(fb, node);
        if value_ty.is_character() {
            let old = fb.load(IrType::Ptr, dst);
            fb.call(runtime::FREE, IrType::Void, &[old]);
        }
        cx.copy_value(fb, value_ty, value, dst, span)?;
    }
    fb.ret_void();
    Ok(())
}

/// Grow to `3 * capacity + 1` buckets and move every node over.
fn rehash(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let this = fb.param(0);
    let old_capacity = t.capacity(fb, this);
    let old_buckets = t.field(fb, this, BUCKETS, IrType::Ptr);
    let old_mask = t.field(fb, this, MASK, IrType::Ptr);

    let three = fb.const_i32(3);
    let tripled = fb.mul(old_capacity, three);
    let capacity = fb.add_const(tripled, 1);
    let node_size = fb.const_i32(i32::try_from(t.node_size).unwrap_or(i32::MAX));
    let one = fb.const_i32(1);
    let buckets = fb.call(runtime::CALLOC, IrType::Ptr, &[capacity, node_size]);
    let mask = fb.call(runtime::CALLOC, IrType::Ptr, &[capacity, one]);
    let a = fb.is_null(buckets);
    let b = fb.is_null(mask);
    let failed = fb.or(a, b);
    if_then(fb, failed, |fb| {
        fb.call(runtime::FREE, IrType::Void, &[buckets]);
        fb.call(runtime::FREE, IrType::Void, &[mask]);
        let off = fb.const_bool(false);
        fb.store_field(&t.record, this, REHASH, off);
        fb.ret_void();
        Ok(())
    })?;

    let zero = fb.const_i32(0);
    fb.store_field(&t.record, this, OCCUPANCY, zero);
    fb.store_field(&t.record, this, FILLED, zero);
    fb.store_field(&t.record, this, CAPACITY, capacity);
    fb.store_field(&t.record, this, BUCKETS, buckets);
    fb.store_field(&t.record, this, MASK, mask);

    for_range(fb, zero, old_capacity, |fb, i| {
        let m = fb.element_ptr(&IrType::I8, old_mask, i);
        let m = fb.load(IrType::I8, m);
        let none = fb.const_i8(0);
        let filled = fb.icmp_ne(m, none);
        if_then(fb, filled, |fb| {
            let head = fb.element_ptr(&t.node, old_buckets, i);
            walk_chain(fb, t, head, |fb, node| {
                let key = t.key_of(fb, node);
                let value = t.is_dict().then(|| t.value_of(fb, node));
                place(cx, fb, t, this, key, value, false, span)?;
                let overflow = fb.icmp_ne(node, head);
                if_then(fb, overflow, |fb| {
                    fb.call(runtime::FREE, IrType::Void, &[node]);
                    Ok(())
                })
            })
        })
    })?;
    fb.call(runtime::FREE, IrType::Void, &[old_buckets]);
    fb.call(runtime::FREE, IrType::Void, &[old_mask]);
    fb.ret_void();
    Ok(())
}

/// Take the entry of `key` out of its chain. With `out`, its value moves
/// there first. A missing key is a KeyError when `strict`.
#[allow(clippy::too_many_arguments, reason = "builder plus the removal mode")]
fn unlink(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    this: ValueId,
    key: ValueId,
    out: Option<ValueId>,
    strict: bool,
    span: Span,
) -> CodegenResult<()> {
    let hash = cx.helper(&t.key, HelperOp::Hash, span)?;
    let eq = cx.helper(&t.key, HelperOp::Eq, span)?;
    let missing = fb.append_block("unlink.missing");
    let capacity = t.capacity(fb, this);
    let h = hash.call(fb, &[key, capacity]);
    let filled = t.is_filled(fb, this, h);
    let empty = fb.not(filled);
    if_then(fb, empty, |fb| {
        fb.br(missing);
        Ok(())
    })?;

    let head = t.bucket(fb, this, h);
    let null = fb.const_null();
    let prev = fb.alloca_init(null);
    let found = fb.alloca(IrType::Ptr);
    let unlink_block = fb.append_block("unlink.found");
    walk_chain(fb, t, head, |fb, node| {
        let candidate = t.key_of(fb, node);
        let same = eq.call(fb, &[candidate, key]);
        if_then(fb, same, |fb| {
            fb.store(node, found);
            fb.br(unlink_block);
            Ok(())
        })?;
        fb.store(node, prev);
        Ok(())
    })?;
    fb.br(missing);

    fb.position_at_end(missing);
    if strict {
        let message = if t.is_dict() {
            "KeyError: The dict does not contain the specified key"
        } else {
            "KeyError: The set does not contain the specified element"
        };
        cx.runtime_error(fb, message, &[]);
    } else {
        fb.ret_void();
    }

    fb.position_at_end(unlink_block);
    let node = fb.load(IrType::Ptr, found);
    if let Some(out) = out {
        let value = t.value_of(fb, node);
        move_bytes(fb, out, value, t.value_size);
    }
    if t.key.is_character() {
        let k = t.key_of(fb, node);
        let k = fb.load(IrType::Ptr, k);
        fb.call(runtime::FREE, IrType::Void, &[k]);
    }
    let before = fb.load(IrType::Ptr, prev);
    let has_prev = fb.is_not_null(before);
    let no_prev = fb.not(has_prev);
    let at_head = branch_off(fb, no_prev, "unlink.head");
    // Inside the chain: splice out and free.
    let after = t.next_of(fb, node);
    t.set_next(fb, before, after);
    fb.call(runtime::FREE, IrType::Void, &[node]);
    let done = fb.append_block("unlink.done");
    fb.br(done);

    fb.position_at_end(at_head);
    let successor = t.next_of(fb, node);
    let has_successor = fb.is_not_null(successor);
    let promote = branch_off(fb, has_successor, "unlink.promote");
    let at = t.mask_at(fb, this, h);
    let zero = fb.const_i8(0);
    fb.store(zero, at);
    t.bump(fb, this, FILLED, -1);
    fb.br(done);

    fb.position_at_end(promote);
    move_bytes(fb, node, successor, t.node_size);
    fb.call(runtime::FREE, IrType::Void, &[successor]);
    fb.br(done);

    fb.position_at_end(done);
    t.bump(fb, this, OCCUPANCY, -1);
    fb.ret_void();
    Ok(())
}

fn collect(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    keys: bool,
    span: Span,
) -> CodegenResult<()> {
    let (this, out) = (fb.param(0), fb.param(1));
    let element = if keys {
        t.key.clone()
    } else {
        t.value
            .clone()
            .ok_or_else(|| CodegenError::internal("values of a set"))?
    };
    let list = Ty::list(element);
    let init = cx.helper(&list, HelperOp::Init, span)?;
    let append = cx.helper(&list, HelperOp::Append, span)?;
    let occupancy = t.field(fb, this, OCCUPANCY, IrType::I32);
    init.call(fb, &[out, occupancy]);
    walk_all(fb, t, this, |fb, node| {
        let slot = if keys {
            t.key_of(fb, node)
        } else {
            t.value_of(fb, node)
        };
        append.call(fb, &[out, slot]);
        Ok(())
    })?;
    fb.ret_void();
    Ok(())
}

fn print(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let this = fb.param(0);
    let show_key = cx.helper(&t.key, HelperOp::Print, span)?;
    let show_value = match &t.value {
        Some(v) => Some(cx.helper(v, HelperOp::Print, span)?),
        None => None,
    };
    cx.print_literal(fb, "{");
    let yes = fb.const_bool(true);
    let first = fb.alloca_init(yes);
    walk_all(fb, t, this, |fb, node| {
        let is_first = fb.load(IrType::I1, first);
        let later = fb.not(is_first);
        if_then(fb, later, |fb| {
            cx.print_literal(fb, ", ");
            Ok(())
        })?;
        let no = fb.const_bool(false);
        fb.store(no, first);
        let key = t.key_of(fb, node);
        show_key.call(fb, &[key]);
        if let Some(show_value) = &show_value {
            cx.print_literal(fb, ": ");
            let value = t.value_of(fb, node);
            show_value.call(fb, &[value]);
        }
        Ok(())
    })?;
    cx.print_literal(fb, "}");
    fb.ret_void();
    Ok(())
}

/// Copy with the same capacity and chain shapes: bucket heads land in the
/// fresh inline array, every overflow node gets its own allocation so a
/// later pop can free it on its own.
fn deepcopy(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let (src, dst) = (fb.param(0), fb.param(1));
    let capacity = t.capacity(fb, src);
    init(fb, t, dst, capacity);
    for field in [OCCUPANCY, FILLED] {
        let n = t.field(fb, src, field, IrType::I32);
        fb.store_field(&t.record, dst, field, n);
    }
    let from = t.field(fb, src, MASK, IrType::Ptr);
    let to = t.field(fb, dst, MASK, IrType::Ptr);
    fb.memcpy(to, from, capacity);

    let tail = fb.alloca(IrType::Ptr);
    let zero = fb.const_i32(0);
    for_range(fb, zero, capacity, |fb, i| {
        let filled = t.is_filled(fb, src, i);
        if_then(fb, filled, |fb| {
            let null = fb.const_null();
            fb.store(null, tail);
            let source_head = t.bucket(fb, src, i);
            let dest_head = t.bucket(fb, dst, i);
            walk_chain(fb, t, source_head, |fb, node| {
                let previous = fb.load(IrType::Ptr, tail);
                let chained = fb.is_not_null(previous);
                let target = fb.alloca(IrType::Ptr);
                let overflow = branch_off(fb, chained, "copy.overflow");
                fb.store(dest_head, target);
                let write = fb.append_block("copy.write");
                fb.br(write);
                fb.position_at_end(overflow);
                let node_size = fb.const_i32(i32::try_from(t.node_size).unwrap_or(i32::MAX));
                let fresh = fb.call(runtime::MALLOC, IrType::Ptr, &[node_size]);
                t.set_next(fb, previous, fresh);
                fb.store(fresh, target);
                fb.br(write);

                fb.position_at_end(write);
                let copy = fb.load(IrType::Ptr, target);
                let null = fb.const_null();
                t.set_next(fb, copy, null);
                let (k_src, k_dst) = (t.key_of(fb, node), t.key_of(fb, copy));
                cx.copy_value(fb, &t.key, k_src, k_dst, span)?;
                if let Some(value_ty) = &t.value {
                    let (v_src, v_dst) = (t.value_of(fb, node), t.value_of(fb, copy));
                    cx.copy_value(fb, value_ty, v_src, v_dst, span)?;
                }
                fb.store(copy, tail);
                Ok(())
            })
        })
    })?;
    fb.ret_void();
    Ok(())
}
