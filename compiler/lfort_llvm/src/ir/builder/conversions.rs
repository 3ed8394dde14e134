//! Numeric and pointer conversions for `FunctionBuilder`.

use std::cmp::Ordering;

use super::FunctionBuilder;
use crate::ir::types::IrType;
use crate::ir::value::{CastOp, Instr, ValueId};

impl FunctionBuilder {
    /// Raw cast instruction. Operand and target must suit `op`.
    pub fn cast(&mut self, op: CastOp, value: ValueId, to: IrType) -> ValueId {
        let from = self.type_of(value);
        let ok = match op {
            CastOp::Trunc | CastOp::ZExt | CastOp::SExt => from.is_int() && to.is_int(),
            CastOp::FPTrunc | CastOp::FPExt => from.is_float() && to.is_float(),
            CastOp::FPToSI | CastOp::FPToUI => from.is_float() && to.is_int(),
            CastOp::SIToFP | CastOp::UIToFP => from.is_int() && to.is_float(),
            CastOp::PtrToInt => from.is_ptr() && to.is_int(),
            CastOp::IntToPtr => from.is_int() && to.is_ptr(),
            CastOp::Bitcast => true,
        };
        if !ok {
            tracing::error!(op = op.mnemonic(), from = ?from, to = ?to, "invalid cast");
            self.record_codegen_error("invalid cast");
            return self.zero(to);
        }
        self.push_instr(
            Instr::Cast {
                op,
                value,
                to: to.clone(),
            },
            to,
        )
    }

    /// Resize an integer: truncate, or extend by sign (`signed`) or zero.
    /// Returns `value` unchanged when widths agree.
    pub fn int_cast(&mut self, value: ValueId, to: IrType, signed: bool) -> ValueId {
        let from_bits = self.type_of(value).int_bits().unwrap_or(0);
        let to_bits = to.int_bits().unwrap_or(0);
        match from_bits.cmp(&to_bits) {
            Ordering::Equal => value,
            Ordering::Greater => self.cast(CastOp::Trunc, value, to),
            Ordering::Less if signed => self.cast(CastOp::SExt, value, to),
            Ordering::Less => self.cast(CastOp::ZExt, value, to),
        }
    }

    /// Resize a float between `float` and `double`.
    pub fn float_cast(&mut self, value: ValueId, to: IrType) -> ValueId {
        match (self.type_of(value), &to) {
            (IrType::Float, IrType::Double) => self.cast(CastOp::FPExt, value, to),
            (IrType::Double, IrType::Float) => self.cast(CastOp::FPTrunc, value, to),
            _ => value,
        }
    }

    pub fn trunc(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::Trunc, value, to)
    }

    pub fn zext(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::ZExt, value, to)
    }

    pub fn sext(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::SExt, value, to)
    }

    pub fn fp_ext(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::FPExt, value, to)
    }

    pub fn fp_to_si(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::FPToSI, value, to)
    }

    pub fn fp_to_ui(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::FPToUI, value, to)
    }

    pub fn si_to_fp(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::SIToFP, value, to)
    }

    pub fn ui_to_fp(&mut self, value: ValueId, to: IrType) -> ValueId {
        self.cast(CastOp::UIToFP, value, to)
    }
}
