//! Runtime container generators.
//!
//! Every list, dict, set and tuple signature met during lowering gets one
//! record type and, on demand, one internal function per operation. Both
//! are memoized for the rest of the session, so all call sites sharing a
//! signature share one layout and one helper.
//!
//! Helpers take containers, elements and keys by pointer and are named
//! `<signature>.<op>`, e.g. `list_i32.append` or `dict_str_i32_lp.insert`.
//! The value-level helpers (`eq`, `cmp`, `hash`, `deepcopy`, `print`)
//! exist for every element type, scalars included, so container helpers
//! can recurse into nested element types uniformly.
//!
//! Dicts and sets come in two strategies (see [`HashStrategy`]):
//! [`hash_lp`] (open addressing with tombstones) and [`hash_sc`]
//! (separate chaining). The strategy is part of the signature.

mod hash_lp;
mod hash_sc;
mod list;
mod tuple;
pub(crate) mod value_ops;

#[cfg(test)]
mod tests;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use lfort_ir::{Span, Ty};

use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{BlockId, FunctionBuilder, IrType, Linkage, ValueId};
use crate::options::HashStrategy;
use crate::runtime;

/// Field indices of a list record.
pub const LIST_LEN: u32 = 0;
pub const LIST_CAP: u32 = 1;
pub const LIST_DATA: u32 = 2;

/// Largest position accepted as "to the end" by `index`.
pub const INDEX_END: i32 = i32::MAX;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    List { element: Ty },
    Dict { key: Ty, value: Ty, strategy: HashStrategy },
    Set { element: Ty, strategy: HashStrategy },
}

/// Record type and helper prefix of one container signature.
#[derive(Clone, Debug)]
pub(crate) struct ContainerLayout {
    pub ty: IrType,
    pub prefix: String,
    pub kind: ContainerKind,
}

#[derive(Debug, Default)]
pub(crate) struct ContainerRegistry {
    layouts: FxHashMap<String, ContainerLayout>,
    generated: FxHashSet<String>,
}

impl ContainerRegistry {
    /// Record that `name` is (being) generated; false if it already was.
    fn claim(&mut self, name: &str) -> bool {
        self.generated.insert(name.to_string())
    }
}

/// Operation of a generated helper.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HelperOp {
    Eq,
    Cmp,
    Hash,
    DeepCopy,
    Print,
    Init,
    Len,
    Contains,
    Rehash,
    Append,
    Insert,
    Read,
    Write,
    Remove,
    PopLast,
    Pop,
    Index,
    Count,
    Reverse,
    Clear,
    Concat,
    Get,
    Keys,
    Values,
    Add,
    Discard,
    /// Slot of a key, -1 when absent.
    Find,
    /// Chain node of a key, null when absent.
    FindNode,
    /// Heap copy of a string.
    Dup,
}

impl HelperOp {
    pub const fn suffix(self) -> &'static str {
        match self {
            HelperOp::Eq => "eq",
            HelperOp::Cmp => "cmp",
            HelperOp::Hash => "hash",
            HelperOp::DeepCopy => "deepcopy",
            HelperOp::Print => "print",
            HelperOp::Init => "init",
            HelperOp::Len => "len",
            HelperOp::Contains => "contains",
            HelperOp::Rehash => "rehash",
            HelperOp::Append => "append",
            HelperOp::Insert => "insert",
            HelperOp::Read => "read",
            HelperOp::Write => "write",
            HelperOp::Remove => "remove",
            HelperOp::PopLast => "pop_last",
            HelperOp::Pop => "pop",
            HelperOp::Index => "index",
            HelperOp::Count => "count",
            HelperOp::Reverse => "reverse",
            HelperOp::Clear => "clear",
            HelperOp::Concat => "concat",
            HelperOp::Get => "get",
            HelperOp::Keys => "keys",
            HelperOp::Values => "values",
            HelperOp::Add => "add",
            HelperOp::Discard => "discard",
            HelperOp::Find => "find",
            HelperOp::FindNode => "find_node",
            HelperOp::Dup => "dup",
        }
    }
}

/// A generated helper ready to be called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Helper {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret: IrType,
}

impl Helper {
    pub fn call(&self, fb: &mut FunctionBuilder, args: &[ValueId]) -> ValueId {
        fb.call(&self.name, self.ret.clone(), args)
    }
}

/// Parameter and return types of `op` on a value of type `ty`.
fn signature(ty: &Ty, op: HelperOp) -> (Vec<IrType>, IrType) {
    use IrType::{Ptr, Void, I1, I32, I8};
    let hashed = matches!(ty, Ty::Dict(..));
    match op {
        HelperOp::Eq | HelperOp::Contains => (vec![Ptr, Ptr], I1),
        HelperOp::Cmp => (vec![Ptr, Ptr], I8),
        HelperOp::Hash => (vec![Ptr, I32], I32),
        HelperOp::DeepCopy
        | HelperOp::Append
        | HelperOp::Remove
        | HelperOp::PopLast
        | HelperOp::Keys
        | HelperOp::Values
        | HelperOp::Add
        | HelperOp::Discard => (vec![Ptr, Ptr], Void),
        HelperOp::Print | HelperOp::Rehash | HelperOp::Reverse | HelperOp::Clear => {
            (vec![Ptr], Void)
        }
        HelperOp::Init => (vec![Ptr, I32], Void),
        HelperOp::Len => (vec![Ptr], I32),
        HelperOp::Insert | HelperOp::Pop if hashed => (vec![Ptr, Ptr, Ptr], Void),
        HelperOp::Insert | HelperOp::Write | HelperOp::Pop => (vec![Ptr, I32, Ptr], Void),
        HelperOp::Read if hashed => (vec![Ptr, Ptr], Ptr),
        HelperOp::Read => (vec![Ptr, I32], Ptr),
        HelperOp::Index => (vec![Ptr, Ptr, I32, I32], I32),
        HelperOp::Count => (vec![Ptr, Ptr], I32),
        HelperOp::Concat if ty.is_character() => (vec![Ptr, Ptr], Ptr),
        HelperOp::Concat => (vec![Ptr, Ptr, Ptr], Void),
        HelperOp::Get => (vec![Ptr, Ptr, Ptr], Ptr),
        HelperOp::Find => (vec![Ptr, Ptr], I32),
        HelperOp::FindNode => (vec![Ptr, Ptr], Ptr),
        HelperOp::Dup => (vec![Ptr], Ptr),
    }
}

/// Canonical form of `ty` for helper generation: wrappers stripped and
/// every character type folded into one.
pub(crate) fn canonical(ty: &Ty) -> Ty {
    match ty.strip() {
        Ty::Character { .. } => Ty::string(),
        Ty::List(el) => Ty::list(canonical(el)),
        Ty::Set(el) => Ty::set(canonical(el)),
        Ty::Dict(k, v) => Ty::dict(canonical(k), canonical(v)),
        Ty::Tuple(els) => Ty::tuple(els.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

impl CodegenCx<'_> {
    /// Names of the helpers generated so far, sorted.
    pub fn generated_helpers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.containers.generated.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Record layout of a list, dict or set type, created on first use.
    pub(crate) fn container_layout(&mut self, ty: &Ty, span: Span) -> CodegenResult<ContainerLayout> {
        let ty = canonical(ty);
        let (kind, strategy) = match &ty {
            Ty::List(el) => (ContainerKind::List { element: (**el).clone() }, None),
            Ty::Dict(k, v) => {
                let strategy = self.options.dict_strategy;
                (
                    ContainerKind::Dict {
                        key: (**k).clone(),
                        value: (**v).clone(),
                        strategy,
                    },
                    Some(strategy),
                )
            }
            Ty::Set(el) => {
                let strategy = self.options.set_strategy;
                (
                    ContainerKind::Set {
                        element: (**el).clone(),
                        strategy,
                    },
                    Some(strategy),
                )
            }
            other => {
                return Err(CodegenError::internal(format!(
                    "`{}` is not a list, dict or set",
                    other.type_code(&self.unit.symbols)
                )))
            }
        };
        let code = match strategy {
            Some(s) => format!("{} {}", ty.type_code(&self.unit.symbols), s.suffix()),
            None => ty.type_code(&self.unit.symbols),
        };
        if let Some(layout) = self.containers.layouts.get(&code) {
            return Ok(layout.clone());
        }

        let prefix = self.helper_prefix(&ty);
        let fields = match &kind {
            ContainerKind::List { .. } => vec![IrType::I32, IrType::I32, IrType::Ptr],
            ContainerKind::Dict { key, value, strategy: HashStrategy::LinearProbing } => {
                let keys = self.container_layout(&Ty::list(key.clone()), span)?.ty;
                let values = self.container_layout(&Ty::list(value.clone()), span)?.ty;
                vec![IrType::I32, keys, values, IrType::Ptr]
            }
            ContainerKind::Set { element, strategy: HashStrategy::LinearProbing } => {
                let elements = self.container_layout(&Ty::list(element.clone()), span)?.ty;
                vec![IrType::I32, elements, IrType::Ptr]
            }
            ContainerKind::Dict { strategy: HashStrategy::SeparateChaining, .. }
            | ContainerKind::Set { strategy: HashStrategy::SeparateChaining, .. } => vec![
                IrType::I32,
                IrType::I32,
                IrType::I32,
                IrType::Ptr,
                IrType::Ptr,
                IrType::I1,
            ],
        };
        let record = self.module.types.define(&prefix, fields);
        debug!(signature = %code, record = %prefix, "materialized container layout");
        let layout = ContainerLayout {
            ty: record,
            prefix,
            kind,
        };
        self.containers.layouts.insert(code, layout.clone());
        Ok(layout)
    }

    /// Name prefix of the helpers of `ty` (already canonical).
    fn helper_prefix(&self, ty: &Ty) -> String {
        let mangled = ty.mangled_code(&self.unit.symbols);
        match ty {
            Ty::Dict(..) => format!("{mangled}_{}", self.options.dict_strategy.suffix()),
            Ty::Set(_) => format!("{mangled}_{}", self.options.set_strategy.suffix()),
            _ => mangled,
        }
    }

    /// The helper performing `op` on values of type `ty`, generated on first
    /// request.
    pub(crate) fn helper(&mut self, ty: &Ty, op: HelperOp, span: Span) -> CodegenResult<Helper> {
        let ty = canonical(ty);
        let name = format!("{}.{}", self.helper_prefix(&ty), op.suffix());
        let (params, ret) = signature(&ty, op);
        let helper = Helper { name, params, ret };
        if !self.containers.claim(&helper.name) {
            return Ok(helper);
        }
        trace!(helper = %helper.name, "generating container helper");
        let mut fb = FunctionBuilder::new(helper.name.clone(), helper.params.clone(), helper.ret.clone())
            .with_linkage(Linkage::Internal);
        match &ty {
            Ty::List(el) => list::generate(self, &mut fb, el, op, span)?,
            Ty::Tuple(els) => tuple::generate(self, &mut fb, &ty, els, op, span)?,
            Ty::Dict(..) | Ty::Set(_) => {
                let layout = self.container_layout(&ty, span)?;
                match layout.kind {
                    ContainerKind::Dict { strategy: HashStrategy::LinearProbing, .. }
                    | ContainerKind::Set { strategy: HashStrategy::LinearProbing, .. } => {
                        hash_lp::generate(self, &mut fb, &layout, op, span)?;
                    }
                    _ => hash_sc::generate(self, &mut fb, &layout, op, span)?,
                }
            }
            _ => value_ops::generate(self, &mut fb, &ty, op, span)?,
        }
        self.finish_function(fb);
        Ok(helper)
    }

    /// Size in bytes of the storage of `ty`.
    pub(crate) fn size_of(&mut self, ty: &Ty, span: Span) -> CodegenResult<u64> {
        let storage = self.storage_type(ty, span)?;
        Ok(self.module.types.size_of(&storage))
    }

    /// Write the value at `src` into `dst` (uninitialised storage), deep
    /// copying whatever owns heap memory.
    pub(crate) fn copy_value(
        &mut self,
        fb: &mut FunctionBuilder,
        ty: &Ty,
        src: ValueId,
        dst: ValueId,
        span: Span,
    ) -> CodegenResult<()> {
        if ty.needs_deepcopy() || ty.is_character() {
            let copy = self.helper(ty, HelperOp::DeepCopy, span)?;
            copy.call(fb, &[src, dst]);
        } else {
            let storage = self.storage_type(ty, span)?;
            let size = self.module.types.size_of(&storage);
            move_bytes(fb, dst, src, size);
        }
        Ok(())
    }

    /// `_lfortran_printf(text)` for a literal.
    pub(crate) fn print_literal(&mut self, fb: &mut FunctionBuilder, text: &str) {
        let fmt = self.module.string_constant(text);
        let fmt = fb.global(&fmt);
        fb.call(runtime::PRINTF, IrType::Void, &[fmt]);
    }

    /// `_lfortran_printf(format, args...)`.
    pub(crate) fn printf(&mut self, fb: &mut FunctionBuilder, format: &str, args: &[ValueId]) {
        let fmt = self.module.string_constant(format);
        let fmt = fb.global(&fmt);
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(fmt);
        all.extend_from_slice(args);
        fb.call(runtime::PRINTF, IrType::Void, &all);
    }

    /// Write `message` (a printf format) plus a newline to standard error
    /// and exit with status 1. Code after this point goes into a fresh
    /// block the caller never reaches.
    pub(crate) fn runtime_error(&mut self, fb: &mut FunctionBuilder, message: &str, args: &[ValueId]) {
        let fmt = self.module.string_constant(&format!("{message}\n"));
        let fmt = fb.global(&fmt);
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(fmt);
        all.extend_from_slice(args);
        fb.call(runtime::PRINT_ERROR, IrType::Void, &all);
        let one = fb.const_i32(1);
        fb.call(runtime::EXIT, IrType::Void, &[one]);
        fb.unreachable();
    }
}

/// Copy `size` bytes from `src` to `dst`.
pub(crate) fn move_bytes(fb: &mut FunctionBuilder, dst: ValueId, src: ValueId, size: u64) {
    let len = fb.const_i32(i32::try_from(size).unwrap_or(i32::MAX));
    fb.memcpy(dst, src, len);
}

/// `base + index * size` as a byte address.
pub(crate) fn byte_offset(fb: &mut FunctionBuilder, base: ValueId, index: ValueId, size: u64) -> ValueId {
    let size = fb.const_i32(i32::try_from(size).unwrap_or(i32::MAX));
    let offset = fb.mul(index, size);
    fb.element_ptr(&IrType::I8, base, offset)
}

/// Emit `for i in start..end { body(i) }` over `i32` counters.
pub(crate) fn for_range(
    fb: &mut FunctionBuilder,
    start: ValueId,
    end: ValueId,
    mut body: impl FnMut(&mut FunctionBuilder, ValueId) -> CodegenResult<()>,
) -> CodegenResult<()> {
    let counter = fb.alloca_init(start);
    let head = fb.append_block("loop.head");
    let body_block = fb.append_block("loop.body");
    let exit = fb.append_block("loop.end");
    fb.br(head);

    fb.position_at_end(head);
    let i = fb.load(IrType::I32, counter);
    let more = fb.icmp_slt(i, end);
    fb.cond_br(more, body_block, exit);

    fb.position_at_end(body_block);
    let i = fb.load(IrType::I32, counter);
    body(fb, i)?;
    if !fb.is_terminated() {
        let current = fb.load(IrType::I32, counter);
        let next = fb.add_const(current, 1);
        fb.store(next, counter);
        fb.br(head);
    }

    fb.position_at_end(exit);
    Ok(())
}

/// Emit `if cond { then(); }` and continue after it.
pub(crate) fn if_then(
    fb: &mut FunctionBuilder,
    cond: ValueId,
    then: impl FnOnce(&mut FunctionBuilder) -> CodegenResult<()>,
) -> CodegenResult<()> {
    let then_block = fb.append_block("then");
    let merge = fb.append_block("ifcont");
    fb.cond_br(cond, then_block, merge);
    fb.position_at_end(then_block);
    then(fb)?;
    fb.br_if_open(merge);
    fb.position_at_end(merge);
    Ok(())
}

/// Split the current block on `cond`: returns the block taken when it
/// holds, leaving the builder in the other one.
pub(crate) fn branch_off(fb: &mut FunctionBuilder, cond: ValueId, label: &str) -> BlockId {
    let taken = fb.append_block(label);
    let rest = fb.append_block("cont");
    fb.cond_br(cond, taken, rest);
    fb.position_at_end(rest);
    taken
}
