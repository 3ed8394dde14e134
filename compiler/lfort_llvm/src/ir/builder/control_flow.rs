//! Terminators and `select` for `FunctionBuilder`.

use super::FunctionBuilder;
use crate::ir::value::{BlockId, Instr, Terminator, ValueId};

impl FunctionBuilder {
    pub fn br(&mut self, dest: BlockId) {
        self.terminate(Terminator::Br(dest));
    }

    pub fn cond_br(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        if !matches!(self.type_of(cond), crate::ir::IrType::I1) {
            tracing::error!(cond_type = ?self.type_of(cond), "branch condition is not i1");
            self.record_codegen_error("branch condition is not i1");
        }
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn switch(&mut self, value: ValueId, default: BlockId, cases: Vec<(i64, BlockId)>) {
        self.terminate(Terminator::Switch {
            value,
            default,
            cases,
        });
    }

    pub fn ret(&mut self, value: ValueId) {
        if self.type_of(value) != self.ret_type() {
            tracing::error!(value_type = ?self.type_of(value), ret_type = ?self.ret_type(), "return type mismatch");
            self.record_codegen_error("return type mismatch");
        }
        self.terminate(Terminator::Ret(Some(value)));
    }

    pub fn ret_void(&mut self) {
        self.terminate(Terminator::Ret(None));
    }

    pub fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    /// Branch to `dest` unless the current block is already terminated.
    pub fn br_if_open(&mut self, dest: BlockId) {
        if !self.is_terminated() {
            self.br(dest);
        }
    }

    pub fn select(&mut self, cond: ValueId, then_value: ValueId, else_value: ValueId) -> ValueId {
        let ty = self.type_of(then_value).clone();
        if *self.type_of(else_value) != ty {
            tracing::error!(then_type = ?ty, else_type = ?self.type_of(else_value), "select arm mismatch");
            self.record_codegen_error("select arm mismatch");
            return then_value;
        }
        self.push_instr(
            Instr::Select {
                cond,
                then_value,
                else_value,
            },
            ty,
        )
    }
}
