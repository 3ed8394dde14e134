//! Integer, float and bitwise arithmetic for `FunctionBuilder`.

use super::FunctionBuilder;
use crate::ir::value::{BinaryOp, Instr, ValueId};

impl FunctionBuilder {
    /// Binary operation; both operands must have the same type, integer for
    /// the integer ops and floating for the `F*` ops.
    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let lt = self.type_of(lhs).clone();
        let rt = self.type_of(rhs);
        let operands_ok = if op.is_float() {
            lt.is_float()
        } else {
            lt.is_int()
        };
        if !operands_ok || lt != *rt {
            tracing::error!(op = op.mnemonic(), lhs_type = ?lt, rhs_type = ?rt, "operand type mismatch");
            self.record_codegen_error("binary operand type mismatch");
            return self.zero(lt);
        }
        self.push_instr(Instr::Binary { op, lhs, rhs }, lt)
    }

    // -- Integer --

    pub fn add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn sdiv(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::SDiv, lhs, rhs)
    }

    pub fn udiv(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::UDiv, lhs, rhs)
    }

    pub fn srem(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::SRem, lhs, rhs)
    }

    pub fn urem(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::URem, lhs, rhs)
    }

    /// `0 - value`.
    pub fn neg(&mut self, value: ValueId) -> ValueId {
        let ty = self.type_of(value).clone();
        let zero = self.zero(ty);
        self.sub(zero, value)
    }

    /// Add the constant `n` to an integer value.
    pub fn add_const(&mut self, value: ValueId, n: i64) -> ValueId {
        let ty = self.type_of(value).clone();
        let c = self.const_int(ty, n);
        self.add(value, c)
    }

    // -- Bitwise --

    pub fn and(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Xor, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Shl, lhs, rhs)
    }

    pub fn lshr(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::LShr, lhs, rhs)
    }

    pub fn ashr(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::AShr, lhs, rhs)
    }

    /// Bitwise complement (logical negation for `i1`).
    pub fn not(&mut self, value: ValueId) -> ValueId {
        let ty = self.type_of(value).clone();
        let ones = self.const_int(ty, -1);
        self.xor(value, ones)
    }

    // -- Float --

    pub fn fadd(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::FAdd, lhs, rhs)
    }

    pub fn fsub(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::FSub, lhs, rhs)
    }

    pub fn fmul(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::FMul, lhs, rhs)
    }

    pub fn fdiv(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::FDiv, lhs, rhs)
    }

    pub fn frem(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::FRem, lhs, rhs)
    }

    pub fn fneg(&mut self, value: ValueId) -> ValueId {
        let ty = self.type_of(value).clone();
        if !ty.is_float() {
            tracing::error!(?ty, "fneg on non-float operand");
            self.record_codegen_error("fneg on non-float operand");
            return self.zero(ty);
        }
        self.push_instr(Instr::FNeg { value }, ty)
    }
}
