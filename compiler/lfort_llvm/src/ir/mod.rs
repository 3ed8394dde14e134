//! A small SSA IR with LLVM's type system and textual syntax.
//!
//! Lowering builds functions through [`FunctionBuilder`], collects them in a
//! [`Module`], and prints the result with [`Module::to_llvm_ir`]. The same
//! module can be executed in-process by [`crate::eval::Machine`].

pub mod builder;
pub mod module;
mod printer;
pub mod types;
pub mod value;

#[cfg(test)]
mod tests;

pub use builder::FunctionBuilder;
pub use module::{Declaration, Function, Global, GlobalInit, Linkage, Module, Signature};
pub use types::{IrType, StructId, TypeTable};
pub use value::{
    BinaryOp, Block, BlockId, CastOp, FloatPredicate, Instr, InstrNode, IntPredicate,
    Terminator, Value, ValueId, ValueKind,
};
