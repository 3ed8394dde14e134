//! Open-addressing dicts and sets with linear probing.
//!
//! Dict record: `{ i32 occupancy, list keys, list values, ptr mask }`.
//! Set record: `{ i32 occupancy, list elements, ptr mask }`.
//!
//! The key list's `cap` is the table capacity; `data` of both lists holds
//! one slot per bucket. The mask has one byte per bucket:
//!
//! | Mask | Bucket |
//! |------|--------|
//! | 0 | empty |
//! | 1 | occupied, never probed past |
//! | 2 | occupied, part of a probe chain |
//! | 3 | tombstone |
//!
//! A bucket marked 1 answers a lookup in a single comparison. Tombstones
//! keep probe chains intact until the next rehash drops them.

use lfort_ir::{Span, Ty};

use super::{
    branch_off, byte_offset, for_range, if_then, move_bytes, ContainerKind, ContainerLayout,
    HelperOp, LIST_CAP, LIST_DATA, LIST_LEN,
};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FunctionBuilder, IrType, ValueId};
use crate::runtime;

pub const MASK_EMPTY: i8 = 0;
pub const MASK_SINGLE: i8 = 1;
pub const MASK_PROBED: i8 = 2;
pub const MASK_TOMBSTONE: i8 = 3;

const OCCUPANCY: u32 = 0;
const KEYS: u32 = 1;
const VALUES: u32 = 2;

struct Table {
    ty: Ty,
    record: IrType,
    key: Ty,
    value: Option<Ty>,
    list_record: IrType,
    key_size: u64,
    value_size: u64,
    mask_field: u32,
}

impl Table {
    fn keys(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        fb.struct_gep(&self.record, this, KEYS)
    }

    fn values(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        fb.struct_gep(&self.record, this, VALUES)
    }

    fn capacity(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        let keys = self.keys(fb, this);
        fb.load_field(&self.list_record, IrType::I32, keys, LIST_CAP)
    }

    fn occupancy(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        fb.load_field(&self.record, IrType::I32, this, OCCUPANCY)
    }

    fn set_occupancy(&self, fb: &mut FunctionBuilder, this: ValueId, n: ValueId) {
        fb.store_field(&self.record, this, OCCUPANCY, n);
    }

    fn bump_occupancy(&self, fb: &mut FunctionBuilder, this: ValueId, delta: i64) {
        let n = self.occupancy(fb, this);
        let n = fb.add_const(n, delta);
        self.set_occupancy(fb, this, n);
    }

    fn key_data(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        let keys = self.keys(fb, this);
        fb.load_field(&self.list_record, IrType::Ptr, keys, LIST_DATA)
    }

    fn value_data(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        let values = self.values(fb, this);
        fb.load_field(&self.list_record, IrType::Ptr, values, LIST_DATA)
    }

    fn key_slot(&self, fb: &mut FunctionBuilder, this: ValueId, i: ValueId) -> ValueId {
        let data = self.key_data(fb, this);
        byte_offset(fb, data, i, self.key_size)
    }

    fn value_slot(&self, fb: &mut FunctionBuilder, this: ValueId, i: ValueId) -> ValueId {
        let data = self.value_data(fb, this);
        byte_offset(fb, data, i, self.value_size)
    }

    fn mask(&self, fb: &mut FunctionBuilder, this: ValueId) -> ValueId {
        fb.load_field(&self.record, IrType::Ptr, this, self.mask_field)
    }

    fn mask_at(&self, fb: &mut FunctionBuilder, this: ValueId, i: ValueId) -> ValueId {
        let mask = self.mask(fb, this);
        fb.element_ptr(&IrType::I8, mask, i)
    }

    fn is_dict(&self) -> bool {
        self.value.is_some()
    }

    fn missing_message(&self) -> &'static str {
        if self.is_dict() {
            "KeyError: The dict does not contain the specified key"
        } else {
            "KeyError: The set does not contain the specified element"
        }
    }
}

/// `mask == 1 || mask == 2`.
fn is_live(fb: &mut FunctionBuilder, mask: ValueId) -> ValueId {
    let single = fb.const_i8(MASK_SINGLE);
    let probed = fb.const_i8(MASK_PROBED);
    let a = fb.icmp_eq(mask, single);
    let b = fb.icmp_eq(mask, probed);
    fb.or(a, b)
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
    let t = Table {
        list_record: cx.container_layout(&Ty::list(key.clone()), span)?.ty,
        key_size: cx.size_of(&key, span)?,
        value_size: match &value {
            Some(v) => cx.size_of(v, span)?,
            None => 0,
        },
        mask_field: if value.is_some() { 3 } else { 2 },
        record: layout.ty.clone(),
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
            let n = t.occupancy(fb, this);
            fb.ret(n);
        }
        HelperOp::Find => find(cx, fb, &t, span)?,
        HelperOp::Insert | HelperOp::Add => insert(cx, fb, &t, span)?,
        HelperOp::Rehash => rehash(cx, fb, &t, span)?,
        HelperOp::Contains => {
            let key = fb.param(1);
            let slot = cx.helper(&t.ty, HelperOp::Find, span)?.call(fb, &[this, key]);
            let missing = fb.const_i32(-1);
            let found = fb.icmp_ne(slot, missing);
            fb.ret(found);
        }
        HelperOp::Read => {
            let key = fb.param(1);
            let slot = lookup(cx, fb, &t, this, key, span)?;
            let ptr = t.value_slot(fb, this, slot);
            fb.ret(ptr);
        }
        HelperOp::Get => {
            let (key, default) = (fb.param(1), fb.param(2));
            let slot = cx.helper(&t.ty, HelperOp::Find, span)?.call(fb, &[this, key]);
            let missing = fb.const_i32(-1);
            let absent = fb.icmp_eq(slot, missing);
            let fallback = branch_off(fb, absent, "get.default");
            let ptr = t.value_slot(fb, this, slot);
            fb.ret(ptr);
            fb.position_at_end(fallback);
            fb.ret(default);
        }
        HelperOp::Pop if t.is_dict() => {
            let (key, out) = (fb.param(1), fb.param(2));
            let slot = lookup(cx, fb, &t, this, key, span)?;
            let from = t.value_slot(fb, this, slot);
            move_bytes(fb, out, from, t.value_size);
            bury(fb, &t, this, slot);
            fb.ret_void();
        }
        HelperOp::Remove => {
            let key = fb.param(1);
            let slot = lookup(cx, fb, &t, this, key, span)?;
            bury(fb, &t, this, slot);
            fb.ret_void();
        }
        HelperOp::Discard => {
            let key = fb.param(1);
            let slot = cx.helper(&t.ty, HelperOp::Find, span)?.call(fb, &[this, key]);
            let missing = fb.const_i32(-1);
            let present = fb.icmp_ne(slot, missing);
            if_then(fb, present, |fb| {
                bury(fb, &t, this, slot);
                Ok(())
            })?;
            fb.ret_void();
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

/// Empty table of `capacity` buckets.
fn init(fb: &mut FunctionBuilder, t: &Table, this: ValueId, capacity: ValueId) {
    let zero = fb.const_i32(0);
    t.set_occupancy(fb, this, zero);
    let lists = if t.is_dict() {
        vec![(t.keys(fb, this), t.key_size), (t.values(fb, this), t.value_size)]
    } else {
        vec![(t.keys(fb, this), t.key_size)]
    };
    for (list, size) in lists {
        fb.store_field(&t.list_record, list, LIST_LEN, capacity);
        fb.store_field(&t.list_record, list, LIST_CAP, capacity);
        let size = fb.const_i32(i32::try_from(size).unwrap_or(i32::MAX));
        let bytes = fb.mul(capacity, size);
        let data = fb.call(runtime::MALLOC, IrType::Ptr, &[bytes]);
        fb.store_field(&t.list_record, list, LIST_DATA, data);
    }
    let one = fb.const_i32(1);
    let mask = fb.call(runtime::CALLOC, IrType::Ptr, &[capacity, one]);
    fb.store_field(&t.record, this, t.mask_field, mask);
}

/// `find(table, key) -> i32`: bucket holding `key`, or -1.
fn find(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let (this, key) = (fb.param(0), fb.param(1));
    let hash = cx.helper(&t.key, HelperOp::Hash, span)?;
    let eq = cx.helper(&t.key, HelperOp::Eq, span)?;
    let missing = fb.const_i32(-1);
    let capacity = t.capacity(fb, this);
    let zero = fb.const_i32(0);
    let no_buckets = fb.icmp_eq(capacity, zero);
    if_then(fb, no_buckets, |fb| {
        fb.ret(missing);
        Ok(())
    })?;

    let h = hash.call(fb, &[key, capacity]);
    let mask_h = t.mask_at(fb, this, h);
    let mask_h = fb.load(IrType::I8, mask_h);
    let single = fb.const_i8(MASK_SINGLE);
    let is_single = fb.icmp_eq(mask_h, single);
    let direct = branch_off(fb, is_single, "find.direct");

    // Probe until an empty bucket or a full lap.
    let pos = fb.alloca_init(h);
    for_range(fb, zero, capacity, |fb, _| {
        let p = fb.load(IrType::I32, pos);
        let m = t.mask_at(fb, this, p);
        let m = fb.load(IrType::I8, m);
        let empty = fb.const_i8(MASK_EMPTY);
        let is_empty = fb.icmp_eq(m, empty);
        if_then(fb, is_empty, |fb| {
            fb.ret(missing);
            Ok(())
        })?;
        let live = is_live(fb, m);
        if_then(fb, live, |fb| {
            let slot = t.key_slot(fb, this, p);
            let same = eq.call(fb, &[slot, key]);
            if_then(fb, same, |fb| {
                fb.ret(p);
                Ok(())
            })
        })?;
        let next = fb.add_const(p, 1);
        let next = fb.srem(next, capacity);
        fb.store(next, pos);
        Ok(())
    })?;
    fb.ret(missing);

    fb.position_at_end(direct);
    let slot = t.key_slot(fb, this, h);
    let same = eq.call(fb, &[slot, key]);
    let found = fb.select(same, h, missing);
    fb.ret(found);
    Ok(())
}

/// Bucket of `key`, exiting with a KeyError when it is absent.
fn lookup(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    this: ValueId,
    key: ValueId,
    span: Span,
) -> CodegenResult<ValueId> {
    let slot = cx.helper(&t.ty, HelperOp::Find, span)?.call(fb, &[this, key]);
    let missing = fb.const_i32(-1);
    let absent = fb.icmp_eq(slot, missing);
    if_then(fb, absent, |fb| {
        cx.runtime_error(fb, t.missing_message(), &[]);
        Ok(())
    })?;
    Ok(slot)
}

/// Turn bucket `slot` into a tombstone.
fn bury(fb: &mut FunctionBuilder, t: &Table, this: ValueId, slot: ValueId) {
    if t.key.is_character() {
        let key = t.key_slot(fb, this, slot);
        let key = fb.load(IrType::Ptr, key);
        fb.call(runtime::FREE, IrType::Void, &[key]);
    }
    let at = t.mask_at(fb, this, slot);
    let tomb = fb.const_i8(MASK_TOMBSTONE);
    fb.store(tomb, at);
    t.bump_occupancy(fb, this, -1);
}

/// Rehash when `5 * occupancy >= 3 * capacity`.
fn maybe_rehash(
    cx: &mut CodegenCx<'_>,
    fb: &mut FunctionBuilder,
    t: &Table,
    this: ValueId,
    span: Span,
) -> CodegenResult<()> {
    let rehash = cx.helper(&t.ty, HelperOp::Rehash, span)?;
    let occupancy = t.occupancy(fb, this);
    let capacity = t.capacity(fb, this);
    let five = fb.const_i32(5);
    let three = fb.const_i32(3);
    let load = fb.mul(occupancy, five);
    let limit = fb.mul(capacity, three);
    let crowded = fb.icmp_sge(load, limit);
    if_then(fb, crowded, |fb| {
        rehash.call(fb, &[this]);
        Ok(())
    })
}

/// Put `key` (and `value`) into the first empty or tombstone bucket of its
/// probe chain. `copy` deep copies them; otherwise their bytes move.
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
    let pos = fb.alloca_init(h);

    let head = fb.append_block("probe.head");
    let step = fb.append_block("probe.next");
    let done = fb.append_block("probe.end");
    fb.br(head);
    fb.position_at_end(head);
    let p = fb.load(IrType::I32, pos);
    let m = t.mask_at(fb, this, p);
    let m = fb.load(IrType::I8, m);
    let busy = is_live(fb, m);
    fb.cond_br(busy, step, done);
    fb.position_at_end(step);
    let next = fb.add_const(p, 1);
    let next = fb.srem(next, capacity);
    fb.store(next, pos);
    fb.br(head);

    fb.position_at_end(done);
    let p = fb.load(IrType::I32, pos);
    let at = t.mask_at(fb, this, p);
    let old = fb.load(IrType::I8, at);
    let moved = fb.icmp_ne(p, h);
    let tomb = fb.const_i8(MASK_TOMBSTONE);
    let was_tomb = fb.icmp_eq(old, tomb);
    let chained = fb.or(moved, was_tomb);
    let probed = fb.const_i8(MASK_PROBED);
    let single = fb.const_i8(MASK_SINGLE);
    let flag = fb.select(chained, probed, single);
    fb.store(flag, at);
    if_then(fb, moved, |fb| {
        let home = t.mask_at(fb, this, h);
        let probed = fb.const_i8(MASK_PROBED);
        fb.store(probed, home);
        Ok(())
    })?;

    let key_dst = t.key_slot(fb, this, p);
    let mut entries = vec![(key, key_dst, t.key.clone(), t.key_size)];
    if let (Some(value), Some(value_ty)) = (value, &t.value) {
        let value_dst = t.value_slot(fb, this, p);
        entries.push((value, value_dst, value_ty.clone(), t.value_size));
    }
    for (src, dst, ty, size) in entries {
        if copy {
            cx.copy_value(fb, &ty, src, dst, span)?;
        } else {
            move_bytes(fb, dst, src, size);
        }
    }
    t.bump_occupancy(fb, this, 1);
    Ok(())
}

/// `insert(d, k, v)` / `add(s, k)`: overwrite the value of a present key,
/// otherwise place a copy of the entry.
fn insert(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let (this, key) = (fb.param(0), fb.param(1));
    let value = t.is_dict().then(|| fb.param(2));
    maybe_rehash(cx, fb, t, this, span)?;
    let slot = cx.helper(&t.ty, HelperOp::Find, span)?.call(fb, &[this, key]);
    let missing = fb.const_i32(-1);
    let present = fb.icmp_ne(slot, missing);
    let overwrite = branch_off(fb, present, "insert.overwrite");

    place(cx, fb, t, this, key, value, true, span)?;
    maybe_rehash(cx, fb, t, this, span)?;
    fb.ret_void();

    fb.position_at_end(overwrite);
    if let (Some(value), Some(value_ty)) = (value, &t.value) {
        let dst = t.value_slot(fb, this, slot);
        if value_ty.is_character() {
            let old = fb.load(IrType::Ptr, dst);
            fb.call(runtime::FREE, IrType::Void, &[old]);
        }
        cx.copy_value(fb, value_ty, value, dst, span)?;
    }
    fb.ret_void();
    Ok(())
}

/// Grow to `2 * capacity + 1` buckets and re-place every live entry.
fn rehash(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let this = fb.param(0);
    let init = cx.helper(&t.ty, HelperOp::Init, span)?;
    let old_capacity = t.capacity(fb, this);
    let old_keys = t.key_data(fb, this);
    let old_values = if t.is_dict() {
        Some(t.value_data(fb, this))
    } else {
        None
    };
    let old_mask = t.mask(fb, this);

    let two = fb.const_i32(2);
    let doubled = fb.mul(old_capacity, two);
    let capacity = fb.add_const(doubled, 1);
    init.call(fb, &[this, capacity]);

    let zero = fb.const_i32(0);
    for_range(fb, zero, old_capacity, |fb, i| {
        let m = fb.element_ptr(&IrType::I8, old_mask, i);
        let m = fb.load(IrType::I8, m);
        let live = is_live(fb, m);
        if_then(fb, live, |fb| {
            let key = byte_offset(fb, old_keys, i, t.key_size);
            let value = old_values.map(|values| byte_offset(fb, values, i, t.value_size));
            place(cx, fb, t, this, key, value, false, span)
        })
    })?;

    for old in std::iter::once(old_keys).chain(old_values).chain(std::iter::once(old_mask)) {
        fb.call(runtime::FREE, IrType::Void, &[old]);
    }
    fb.ret_void();
    Ok(())
}

/// `keys(d, out)` / `values(d, out)`: a fresh list in bucket order.
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
    let occupancy = t.occupancy(fb, this);
    init.call(fb, &[out, occupancy]);
    let capacity = t.capacity(fb, this);
    let zero = fb.const_i32(0);
    for_range(fb, zero, capacity, |fb, i| {
        let m = t.mask_at(fb, this, i);
        let m = fb.load(IrType::I8, m);
        let live = is_live(fb, m);
        if_then(fb, live, |fb| {
            let slot = if keys {
                t.key_slot(fb, this, i)
            } else {
                t.value_slot(fb, this, i)
            };
            append.call(fb, &[out, slot]);
            Ok(())
        })
    })?;
    fb.ret_void();
    Ok(())
}

/// `{k: v, ...}` / `{e, ...}` in bucket order.
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
    let capacity = t.capacity(fb, this);
    let zero = fb.const_i32(0);
    for_range(fb, zero, capacity, |fb, i| {
        let m = t.mask_at(fb, this, i);
        let m = fb.load(IrType::I8, m);
        let live = is_live(fb, m);
        if_then(fb, live, |fb| {
            let is_first = fb.load(IrType::I1, first);
            let later = fb.not(is_first);
            if_then(fb, later, |fb| {
                cx.print_literal(fb, ", ");
                Ok(())
            })?;
            let no = fb.const_bool(false);
            fb.store(no, first);
            let key = t.key_slot(fb, this, i);
            show_key.call(fb, &[key]);
            if let Some(show_value) = &show_value {
                cx.print_literal(fb, ": ");
                let value = t.value_slot(fb, this, i);
                show_value.call(fb, &[value]);
            }
            Ok(())
        })
    })?;
    cx.print_literal(fb, "}");
    fb.ret_void();
    Ok(())
}

/// Same capacity, mask and bucket positions; live entries deep copied.
fn deepcopy(cx: &mut CodegenCx<'_>, fb: &mut FunctionBuilder, t: &Table, span: Span) -> CodegenResult<()> {
    let (src, dst) = (fb.param(0), fb.param(1));
    let init = cx.helper(&t.ty, HelperOp::Init, span)?;
    let capacity = t.capacity(fb, src);
    init.call(fb, &[dst, capacity]);
    let occupancy = t.occupancy(fb, src);
    t.set_occupancy(fb, dst, occupancy);
    let from = t.mask(fb, src);
    let to = t.mask(fb, dst);
    fb.memcpy(to, from, capacity);

    let zero = fb.const_i32(0);
    for_range(fb, zero, capacity, |fb, i| {
        let m = t.mask_at(fb, src, i);
        let m = fb.load(IrType::I8, m);
        let live = is_live(fb, m);
        if_then(fb, live, |fb| {
            let from = t.key_slot(fb, src, i);
            let to = t.key_slot(fb, dst, i);
            cx.copy_value(fb, &t.key, from, to, span)?;
            if let Some(value_ty) = &t.value {
                let from = t.value_slot(fb, src, i);
                let to = t.value_slot(fb, dst, i);
                cx.copy_value(fb, value_ty, from, to, span)?;
            }
            Ok(())
        })
    })?;
    fb.ret_void();
    Ok(())
}
