//! Value and block handles, instructions and terminators.
//!
//! Every value of a function (parameters, constants, instruction results)
//! lives in the function's value arena and is referenced by a `Copy`
//! [`ValueId`]. Blocks are referenced by [`BlockId`].

use smallvec::SmallVec;

use super::types::IrType;

/// Opaque handle to a value of one function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueId(u32);

/// Opaque handle to a basic block of one function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

impl ValueId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        ValueId(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl BlockId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        BlockId(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Param(u32),
    ConstInt(i64),
    ConstFloat(f64),
    Null,
    Undef,
    /// `zeroinitializer` (or `0`, `0.0`, `null` for scalars).
    Zero,
    /// Address of a global variable or string constant.
    Global(String),
    /// Result of an instruction.
    Inst,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub ty: IrType,
    pub kind: ValueKind,
}

impl Value {
    pub fn is_constant(&self) -> bool {
        !matches!(self.kind, ValueKind::Param(_) | ValueKind::Inst)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinaryOp {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SRem => "srem",
            BinaryOp::URem => "urem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::FRem => "frem",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl IntPredicate {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
        }
    }
}

/// Ordered float predicates (false when either operand is NaN), plus `une`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    Une,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPredicate {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Une => "une",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    FPToSI,
    FPToUI,
    SIToFP,
    UIToFP,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

impl CastOp {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::FPToSI => "fptosi",
            CastOp::FPToUI => "fptoui",
            CastOp::SIToFP => "sitofp",
            CastOp::UIToFP => "uitofp",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::Bitcast => "bitcast",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Alloca {
        ty: IrType,
    },
    Load {
        ty: IrType,
        ptr: ValueId,
    },
    Store {
        value: ValueId,
        ptr: ValueId,
    },
    /// `getelementptr <elem_ty>, ptr <base>, <indices>`.
    Gep {
        elem_ty: IrType,
        base: ValueId,
        indices: SmallVec<[ValueId; 2]>,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    FNeg {
        value: ValueId,
    },
    ICmp {
        pred: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    Cast {
        op: CastOp,
        value: ValueId,
        to: IrType,
    },
    Select {
        cond: ValueId,
        then_value: ValueId,
        else_value: ValueId,
    },
    Call {
        callee: String,
        ret: IrType,
        args: Vec<ValueId>,
    },
    ExtractValue {
        agg: ValueId,
        index: u32,
    },
    InsertValue {
        agg: ValueId,
        value: ValueId,
        index: u32,
    },
    Phi {
        incoming: Vec<(ValueId, BlockId)>,
    },
}

/// An instruction and the value it defines (`None` for `store` and void
/// calls).
#[derive(Clone, Debug, PartialEq)]
pub struct InstrNode {
    pub result: Option<ValueId>,
    pub instr: Instr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Ret(Option<ValueId>),
    Br(BlockId),
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        value: ValueId,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    },
    Unreachable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<InstrNode>,
    pub terminator: Option<Terminator>,
}
