//! ID-based instruction builder.
//!
//! `FunctionBuilder` owns the [`Function`] under construction and hands out
//! `Copy` handles ([`ValueId`], [`BlockId`]) only. Several builders can be
//! alive at once: container helpers are generated into their own builder
//! while the caller's function is still open.
//!
//! # Method Organization
//!
//! | Category | Methods |
//! |----------|---------|
//! | Constants | `const_int`, `const_i32`, `const_f64`, `const_bool`, `const_null`, `zero`, `global` |
//! | Memory | `alloca`, `load`, `store`, `gep`, `struct_gep`, `element_ptr`, `memcpy` |
//! | Arithmetic | `add`, `sub`, `mul`, `sdiv`, `srem`, `neg`, `fadd`, `fneg`, ... |
//! | Comparisons | `icmp`, `icmp_eq`, `icmp_slt`, `fcmp`, `is_null`, ... |
//! | Conversions | `cast`, `int_cast`, `float_cast`, `trunc`, `sext`, `zext`, `si_to_fp`, ... |
//! | Control flow | `br`, `cond_br`, `switch`, `select`, `ret`, `ret_void`, `unreachable` |
//! | Aggregates | `extract_value`, `insert_value` |
//! | Calls | `call` |
//! | Phi nodes | `phi` |
//! | Blocks | `append_block`, `position_at_end`, `current_block`, `is_terminated` |
//!
//! Type mismatches do not panic: the builder logs them, counts them in
//! `codegen_error_count`, and keeps going. The driver refuses to hand out a
//! module built with a non-zero count.

mod aggregates;
mod arithmetic;
mod calls;
mod comparisons;
mod constants;
mod control_flow;
mod conversions;
pub(crate) mod memory;

#[cfg(test)]
mod tests;

use super::module::{Function, Linkage};
use super::types::IrType;
use super::value::{Block, BlockId, Instr, InstrNode, Terminator, Value, ValueId, ValueKind};

pub struct FunctionBuilder {
    func: Function,
    current: BlockId,
    /// Allocas are kept at the head of the entry block.
    alloca_count: usize,
    codegen_errors: u32,
}

impl FunctionBuilder {
    /// Start a function with an `entry` block and the builder positioned in
    /// it.
    pub fn new(name: impl Into<String>, params: Vec<IrType>, ret: IrType) -> Self {
        let values = params
            .iter()
            .enumerate()
            .map(|(i, ty)| Value {
                ty: ty.clone(),
                kind: ValueKind::Param(u32::try_from(i).unwrap_or(u32::MAX)),
            })
            .collect();
        FunctionBuilder {
            func: Function {
                name: name.into(),
                params,
                ret,
                linkage: Linkage::External,
                values,
                blocks: vec![Block {
                    label: "entry".to_string(),
                    instrs: Vec::new(),
                    terminator: None,
                }],
            },
            current: BlockId::from_index(0),
            alloca_count: 0,
            codegen_errors: 0,
        }
    }

    #[must_use]
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.func.linkage = linkage;
        self
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    pub fn ret_type(&self) -> &IrType {
        &self.func.ret
    }

    /// Value of parameter `index`.
    pub fn param(&self, index: usize) -> ValueId {
        ValueId::from_index(index)
    }

    pub fn type_of(&self, value: ValueId) -> &IrType {
        &self.func.values[value.index()].ty
    }

    pub fn value(&self, value: ValueId) -> &Value {
        &self.func.values[value.index()]
    }

    /// Integer constant behind `value`, if it is one.
    pub fn const_value(&self, value: ValueId) -> Option<i64> {
        match self.value(value).kind {
            ValueKind::ConstInt(n) => Some(n),
            _ => None,
        }
    }

    /// Finish the function. Blocks left without a terminator are dead and
    /// get `unreachable`.
    pub fn finish(mut self) -> Function {
        for block in &mut self.func.blocks {
            if block.terminator.is_none() {
                block.terminator = Some(Terminator::Unreachable);
            }
        }
        self.func
    }

    /// Number of type mismatches met while building.
    pub fn codegen_error_count(&self) -> u32 {
        self.codegen_errors
    }

    pub(crate) fn record_codegen_error(&mut self, what: &str) {
        tracing::error!(function = %self.func.name, "{what}");
        self.codegen_errors += 1;
    }

    // -- Arena --

    pub(crate) fn push_value(&mut self, ty: IrType, kind: ValueKind) -> ValueId {
        let id = ValueId::from_index(self.func.values.len());
        self.func.values.push(Value { ty, kind });
        id
    }

    /// Append `instr` producing a value of type `ty` to the current block.
    pub(crate) fn push_instr(&mut self, instr: Instr, ty: IrType) -> ValueId {
        let defines = !ty.is_void() && !matches!(instr, Instr::Store { .. });
        let id = self.push_value(ty, ValueKind::Inst);
        if self.is_terminated() {
            self.record_codegen_error("instruction after terminator");
        }
        let node = InstrNode {
            result: defines.then_some(id),
            instr,
        };
        self.func.blocks[self.current.index()].instrs.push(node);
        id
    }

    // -- Blocks --

    /// Add a block with a unique label derived from `label`.
    pub fn append_block(&mut self, label: &str) -> BlockId {
        let id = BlockId::from_index(self.func.blocks.len());
        self.func.blocks.push(Block {
            label: format!("{label}.{}", id.index()),
            instrs: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn is_terminated(&self) -> bool {
        self.func.blocks[self.current.index()].terminator.is_some()
    }

    pub(crate) fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.func.blocks[self.current.index()];
        if block.terminator.is_some() {
            self.record_codegen_error("block terminated twice");
            return;
        }
        block.terminator = Some(terminator);
    }
}
