//! Integer, float and pointer comparisons for `FunctionBuilder`.

use super::FunctionBuilder;
use crate::ir::types::IrType;
use crate::ir::value::{FloatPredicate, Instr, IntPredicate, ValueId};

impl FunctionBuilder {
    /// `icmp`; operands are integers or pointers of one type.
    pub fn icmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        let lt = self.type_of(lhs);
        let rt = self.type_of(rhs);
        if lt != rt || !(lt.is_int() || lt.is_ptr()) {
            tracing::error!(pred = pred.mnemonic(), lhs_type = ?lt, rhs_type = ?rt, "icmp type mismatch");
            self.record_codegen_error("icmp type mismatch");
            return self.const_bool(false);
        }
        self.push_instr(Instr::ICmp { pred, lhs, rhs }, IrType::I1)
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        let lt = self.type_of(lhs);
        let rt = self.type_of(rhs);
        if lt != rt || !lt.is_float() {
            tracing::error!(pred = pred.mnemonic(), lhs_type = ?lt, rhs_type = ?rt, "fcmp type mismatch");
            self.record_codegen_error("fcmp type mismatch");
            return self.const_bool(false);
        }
        self.push_instr(Instr::FCmp { pred, lhs, rhs }, IrType::I1)
    }

    pub fn icmp_eq(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.icmp(IntPredicate::Eq, lhs, rhs)
    }

    pub fn icmp_ne(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.icmp(IntPredicate::Ne, lhs, rhs)
    }

    pub fn icmp_slt(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.icmp(IntPredicate::Slt, lhs, rhs)
    }

    pub fn icmp_sle(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.icmp(IntPredicate::Sle, lhs, rhs)
    }

    pub fn icmp_sgt(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.icmp(IntPredicate::Sgt, lhs, rhs)
    }

    pub fn icmp_sge(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.icmp(IntPredicate::Sge, lhs, rhs)
    }

    /// `ptr == null`.
    pub fn is_null(&mut self, ptr: ValueId) -> ValueId {
        let null = self.const_null();
        self.icmp_eq(ptr, null)
    }

    /// `ptr != null`.
    pub fn is_not_null(&mut self, ptr: ValueId) -> ValueId {
        let null = self.const_null();
        self.icmp_ne(ptr, null)
    }
}
