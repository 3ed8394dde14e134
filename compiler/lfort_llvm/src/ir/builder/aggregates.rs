//! Aggregate values and phi nodes for `FunctionBuilder`.

use super::FunctionBuilder;
use crate::ir::types::IrType;
use crate::ir::value::{BlockId, Instr, InstrNode, ValueId};

impl FunctionBuilder {
    /// Field `index` of a literal struct, array or vector value.
    pub fn extract_value(&mut self, agg: ValueId, index: u32) -> ValueId {
        let Some(field) = self.type_of(agg).field(index).cloned() else {
            tracing::error!(agg_type = ?self.type_of(agg), index, "extract_value out of range");
            self.record_codegen_error("extract_value out of range");
            return self.undef(IrType::I32);
        };
        self.push_instr(Instr::ExtractValue { agg, index }, field)
    }

    pub fn insert_value(&mut self, agg: ValueId, value: ValueId, index: u32) -> ValueId {
        let ty = self.type_of(agg).clone();
        if ty.field(index) != Some(self.type_of(value)) {
            tracing::error!(agg_type = ?ty, value_type = ?self.type_of(value), index, "insert_value type mismatch");
            self.record_codegen_error("insert_value type mismatch");
            return agg;
        }
        self.push_instr(Instr::InsertValue { agg, value, index }, ty)
    }

    /// Build a literal struct value from `fields`.
    pub fn build_struct(&mut self, fields: &[ValueId]) -> ValueId {
        let ty = IrType::Struct(fields.iter().map(|f| self.type_of(*f).clone()).collect());
        let mut agg = self.undef(ty);
        for (i, field) in fields.iter().enumerate() {
            agg = self.insert_value(agg, *field, u32::try_from(i).unwrap_or(u32::MAX));
        }
        agg
    }

    /// Phi node of type `ty`, placed after any phis already in the current
    /// block.
    pub fn phi(&mut self, ty: IrType, incoming: &[(ValueId, BlockId)]) -> ValueId {
        if let Some((bad, _)) = incoming.iter().find(|(v, _)| *self.type_of(*v) != ty) {
            tracing::error!(phi_type = ?ty, incoming_type = ?self.type_of(*bad), "phi incoming mismatch");
            self.record_codegen_error("phi incoming mismatch");
        }
        let id = self.push_value(ty, crate::ir::value::ValueKind::Inst);
        let block = &mut self.func.blocks[self.current.index()];
        let at = block
            .instrs
            .iter()
            .take_while(|n| matches!(n.instr, Instr::Phi { .. }))
            .count();
        block.instrs.insert(
            at,
            InstrNode {
                result: Some(id),
                instr: Instr::Phi {
                    incoming: incoming.to_vec(),
                },
            },
        );
        id
    }
}
