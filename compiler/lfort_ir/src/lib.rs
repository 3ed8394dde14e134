//! Abstract Semantic Representation (ASR) for the lfort code generators.
//!
//! The ASR is the fully type-resolved tree produced by semantic analysis.
//! The backends in `lfort_codegen` and `lfort_llvm` only read it.
//!
//! # Layout
//!
//! - Expressions: flat [`ExprArena`] indexed by [`ExprId`]
//! - Statements: owned [`Stmt`] trees inside procedure and program bodies
//! - Symbols: one [`SymbolTable`] arena indexed by [`SymbolId`], with
//!   per-procedure/module/type scopes indexed by [`ScopeId`]
//!
//! Ids are assigned at allocation time and never reused, so side tables
//! keyed by them stay valid for the lifetime of the unit.

mod builder;
mod expr;
mod ids;
mod intrinsic;
mod span;
mod stack;
mod stmt;
mod symbol;
mod ty;
mod unit;

pub use builder::AsrBuilder;
pub use expr::{BinOp, CastKind, CmpOp, Expr, ExprArena, ExprKind, LogicalOp};
pub use ids::{ExprId, ScopeId, SymbolId};
pub use intrinsic::{InquiryId, IntrinsicId};
pub use span::Span;
pub use stack::ensure_sufficient_stack;
pub use stmt::{DoLoopHead, Stmt, StmtKind};
pub use symbol::{
    Abi, DefType, EnumType, Function, Intent, Module, Program, Scope, Storage, StructKind,
    StructType, Symbol, SymbolTable, Variable,
};
pub use ty::{ArrayPhysicalType, ArrayType, Dimension, FunctionSignature, Ty};
pub use unit::{is_intrinsic_module_name, DependencyCycle, TranslationUnit, INTRINSIC_MODULE_PREFIX};
