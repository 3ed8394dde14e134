//! Direct calls for `FunctionBuilder`.

use super::FunctionBuilder;
use crate::ir::types::IrType;
use crate::ir::value::{Instr, ValueId};

impl FunctionBuilder {
    /// Call `callee` returning `ret`. The result id of a `void` call must not
    /// be used.
    pub fn call(&mut self, callee: &str, ret: IrType, args: &[ValueId]) -> ValueId {
        self.push_instr(
            Instr::Call {
                callee: callee.to_string(),
                ret: ret.clone(),
                args: args.to_vec(),
            },
            ret,
        )
    }
}
