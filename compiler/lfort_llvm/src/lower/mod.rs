//! ASR lowering visitor.
//!
//! Expressions lower in one of two modes:
//!
//! - [`CodegenCx::lower_value`] yields the value in its storage type.
//! - [`CodegenCx::lower_addr`] yields a pointer to storage holding the
//!   value. Variables, array items, members and container items give their
//!   real address; any other expression is materialized into a temporary.
//!
//! Containers, tuples and derived types are always handled through
//! addresses; their helpers take pointers.

pub(crate) mod call;
mod expr;
mod intrinsic;
mod print;
mod stmt;
pub(crate) mod unit;

use rustc_hash::FxHashMap;

use lfort_ir::{Span, SymbolId};

use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{BlockId, FunctionBuilder, ValueId};

/// Branch targets of the innermost enclosing loop.
#[derive(Copy, Clone, Debug)]
struct LoopTargets {
    /// `cycle` lands here.
    next: BlockId,
    /// `exit` lands here.
    done: BlockId,
}

/// State of the procedure body being lowered.
pub(crate) struct FnLowering {
    pub fb: FunctionBuilder,
    slots: FxHashMap<SymbolId, ValueId>,
    loops: Vec<LoopTargets>,
    /// Epilogue block every `return` branches to.
    epilogue: BlockId,
}

impl FnLowering {
    pub(crate) fn new(mut fb: FunctionBuilder) -> Self {
        let epilogue = fb.append_block("return");
        FnLowering {
            fb,
            slots: FxHashMap::default(),
            loops: Vec::new(),
            epilogue,
        }
    }

    /// Storage of `sym` in this body is at `slot`.
    pub(crate) fn bind(&mut self, sym: SymbolId, slot: ValueId) {
        self.slots.insert(sym, slot);
    }

    fn slot(&self, sym: SymbolId) -> Option<ValueId> {
        self.slots.get(&sym).copied()
    }
}

impl CodegenCx<'_> {
    /// Address of the variable `sym`: its slot in the current body, else
    /// its global.
    fn variable_addr(&mut self, fx: &mut FnLowering, sym: SymbolId, span: Span) -> CodegenResult<ValueId> {
        if let Some(slot) = fx.slot(sym) {
            return Ok(slot);
        }
        match self.global_name(sym) {
            Some(name) => {
                let name = name.to_string();
                Ok(fx.fb.global(&name))
            }
            None => Err(CodegenError::unknown_symbol(self.name(sym), span)),
        }
    }
}
