//! Memory operations for `FunctionBuilder`.

use smallvec::SmallVec;

use super::FunctionBuilder;
use crate::ir::types::IrType;
use crate::ir::value::{Instr, InstrNode, ValueId, ValueKind};

/// Intrinsic used for byte copies.
pub const MEMCPY: &str = "llvm.memcpy.p0.p0.i32";

impl FunctionBuilder {
    /// Stack slot for a `ty`, placed in the entry block ahead of every other
    /// instruction so it dominates all uses.
    pub fn alloca(&mut self, ty: IrType) -> ValueId {
        let id = self.push_value(IrType::Ptr, ValueKind::Inst);
        let entry = &mut self.func.blocks[0];
        let at = self.alloca_count.min(entry.instrs.len());
        entry.instrs.insert(
            at,
            InstrNode {
                result: Some(id),
                instr: Instr::Alloca { ty },
            },
        );
        self.alloca_count += 1;
        id
    }

    /// Stack slot initialised with `value`.
    pub fn alloca_init(&mut self, value: ValueId) -> ValueId {
        let ty = self.type_of(value).clone();
        let slot = self.alloca(ty);
        self.store(value, slot);
        slot
    }

    pub fn load(&mut self, ty: IrType, ptr: ValueId) -> ValueId {
        if !self.type_of(ptr).is_ptr() {
            tracing::error!(ptr_type = ?self.type_of(ptr), "load through non-pointer");
            self.record_codegen_error("load through non-pointer");
            return self.zero(ty);
        }
        self.push_instr(Instr::Load { ty: ty.clone(), ptr }, ty)
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        if !self.type_of(ptr).is_ptr() {
            tracing::error!(ptr_type = ?self.type_of(ptr), "store through non-pointer");
            self.record_codegen_error("store through non-pointer");
            return;
        }
        self.push_instr(Instr::Store { value, ptr }, IrType::Void);
    }

    /// `getelementptr elem_ty, ptr base, indices...`.
    pub fn gep(&mut self, elem_ty: IrType, base: ValueId, indices: &[ValueId]) -> ValueId {
        if !self.type_of(base).is_ptr() {
            tracing::error!(base_type = ?self.type_of(base), "gep on non-pointer");
            self.record_codegen_error("gep on non-pointer");
            return self.const_null();
        }
        if let Some(bad) = indices.iter().find(|i| !self.type_of(**i).is_int()) {
            tracing::error!(index_type = ?self.type_of(*bad), "gep with non-integer index");
            self.record_codegen_error("gep with non-integer index");
            return self.const_null();
        }
        self.push_instr(
            Instr::Gep {
                elem_ty,
                base,
                indices: SmallVec::from_slice(indices),
            },
            IrType::Ptr,
        )
    }

    /// Address of field `field` of the struct at `base`.
    pub fn struct_gep(&mut self, struct_ty: &IrType, base: ValueId, field: u32) -> ValueId {
        let zero = self.const_i32(0);
        let index = self.const_i32(i32::try_from(field).unwrap_or(i32::MAX));
        self.gep(struct_ty.clone(), base, &[zero, index])
    }

    /// Address of element `index` of an array of `elem_ty` starting at
    /// `base`.
    pub fn element_ptr(&mut self, elem_ty: &IrType, base: ValueId, index: ValueId) -> ValueId {
        self.gep(elem_ty.clone(), base, &[index])
    }

    /// Load field `field` of the struct at `base`.
    pub fn load_field(
        &mut self,
        struct_ty: &IrType,
        field_ty: IrType,
        base: ValueId,
        field: u32,
    ) -> ValueId {
        let ptr = self.struct_gep(struct_ty, base, field);
        self.load(field_ty, ptr)
    }

    /// Store `value` into field `field` of the struct at `base`.
    pub fn store_field(&mut self, struct_ty: &IrType, base: ValueId, field: u32, value: ValueId) {
        let ptr = self.struct_gep(struct_ty, base, field);
        self.store(value, ptr);
    }

    /// Copy `len` (an `i32`) bytes from `src` to `dst`.
    pub fn memcpy(&mut self, dst: ValueId, src: ValueId, len: ValueId) {
        let volatile = self.const_bool(false);
        self.call(MEMCPY, IrType::Void, &[dst, src, len, volatile]);
    }
}
