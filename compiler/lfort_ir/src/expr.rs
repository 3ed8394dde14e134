//! ASR expressions.
//!
//! Expressions are stored flat in an [`ExprArena`] and referenced by
//! [`ExprId`]. Every expression carries its resolved [`Ty`] and, when the
//! front end or an intrinsic builder folded it, a compile-time `value`.

use crate::intrinsic::{InquiryId, IntrinsicId};
use crate::ty::Ty;
use crate::{ExprId, Span, SymbolId};

/// Arithmetic operator on integer, real or complex operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl CmpOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Eqv,
    NEqv,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CastKind {
    IntegerToReal,
    RealToInteger,
    RealToReal,
    IntegerToInteger,
    IntegerToComplex,
    RealToComplex,
    ComplexToReal,
    ComplexToComplex,
    LogicalToInteger,
    IntegerToLogical,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    // -- Constants --
    IntegerConstant(i64),
    RealConstant(f64),
    ComplexConstant(f64, f64),
    LogicalConstant(bool),
    StringConstant(String),

    Var(SymbolId),

    // -- Operators --
    BinOp {
        left: ExprId,
        op: BinOp,
        right: ExprId,
    },
    UnaryMinus(ExprId),
    LogicalNot(ExprId),
    BitNot(ExprId),
    Compare {
        left: ExprId,
        op: CmpOp,
        right: ExprId,
    },
    LogicalBinOp {
        left: ExprId,
        op: LogicalOp,
        right: ExprId,
    },
    StringConcat {
        left: ExprId,
        right: ExprId,
    },
    StringLen(ExprId),
    IfExp {
        test: ExprId,
        body: ExprId,
        orelse: ExprId,
    },
    Cast {
        arg: ExprId,
        kind: CastKind,
    },

    // -- Calls --
    /// Call of a user or intrinsic-module function; `None` marks an omitted
    /// optional argument.
    FunctionCall {
        func: SymbolId,
        args: Vec<Option<ExprId>>,
    },
    IntrinsicElementalFunction {
        id: IntrinsicId,
        args: Vec<ExprId>,
        overload: u32,
    },
    TypeInquiry {
        id: InquiryId,
        arg_ty: Ty,
        arg: ExprId,
    },

    // -- Arrays and derived types --
    ArrayItem {
        array: ExprId,
        indices: Vec<ExprId>,
    },
    ArraySize {
        array: ExprId,
        dim: Option<ExprId>,
    },
    StructMember {
        base: ExprId,
        member: SymbolId,
    },

    // -- Lists --
    ListConstant(Vec<ExprId>),
    ListLen(ExprId),
    ListItem {
        list: ExprId,
        index: ExprId,
    },
    ListConcat {
        left: ExprId,
        right: ExprId,
    },
    /// `list.pop()` or `list.pop(index)`.
    ListPop {
        list: ExprId,
        index: Option<ExprId>,
    },
    /// `list.index(element, start, end)`.
    ListIndex {
        list: ExprId,
        element: ExprId,
        start: Option<ExprId>,
        end: Option<ExprId>,
    },
    ListCount {
        list: ExprId,
        element: ExprId,
    },
    ListContains {
        list: ExprId,
        element: ExprId,
    },

    // -- Tuples --
    TupleConstant(Vec<ExprId>),
    /// Constant positional read; tuples have no dynamic indexing.
    TupleItem {
        tuple: ExprId,
        index: usize,
    },
    TupleConcat {
        left: ExprId,
        right: ExprId,
    },
    /// `str.partition(sep)`, a three-element tuple of strings.
    StringPartition {
        string: ExprId,
        separator: ExprId,
    },

    // -- Dicts --
    DictConstant {
        keys: Vec<ExprId>,
        values: Vec<ExprId>,
    },
    /// `d[key]` (fatal on a missing key) or `d.get(key, default)`.
    DictItem {
        dict: ExprId,
        key: ExprId,
        default: Option<ExprId>,
    },
    DictPop {
        dict: ExprId,
        key: ExprId,
    },
    DictLen(ExprId),
    DictContains {
        dict: ExprId,
        key: ExprId,
    },
    DictKeys(ExprId),
    DictValues(ExprId),

    // -- Sets --
    SetConstant(Vec<ExprId>),
    SetLen(ExprId),
    SetContains {
        set: ExprId,
        element: ExprId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Ty,
    /// Folded compile-time value, itself a constant expression.
    pub value: Option<ExprId>,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Ty, span: Span) -> Self {
        Expr {
            kind,
            ty,
            value: None,
            span,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::IntegerConstant(_)
                | ExprKind::RealConstant(_)
                | ExprKind::ComplexConstant(..)
                | ExprKind::LogicalConstant(_)
                | ExprKind::StringConstant(_)
        )
    }
}

/// Flat storage for expressions.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::from_len(self.exprs.len());
        self.exprs.push(expr);
        id
    }

    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    #[inline]
    pub fn ty(&self, id: ExprId) -> &Ty {
        &self.get(id).ty
    }

    #[inline]
    pub fn span(&self, id: ExprId) -> Span {
        self.get(id).span
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExprId, &Expr)> {
        self.exprs
            .iter()
            .enumerate()
            .map(|(i, e)| (ExprId::from_len(i), e))
    }

    /// The expression itself if it is a constant, otherwise its folded value.
    pub fn constant(&self, id: ExprId) -> Option<&Expr> {
        let expr = self.get(id);
        if expr.is_constant() {
            return Some(expr);
        }
        expr.value.map(|v| self.get(v)).filter(|v| v.is_constant())
    }

    /// Compile-time integer value, looking through a leading unary minus and
    /// through folded values.
    pub fn int_constant(&self, id: ExprId) -> Option<i64> {
        let expr = self.get(id);
        match &expr.kind {
            ExprKind::IntegerConstant(n) => Some(*n),
            ExprKind::UnaryMinus(inner) => self.int_constant(*inner).map(i64::wrapping_neg),
            _ => expr.value.and_then(|v| self.int_constant(v)),
        }
    }

    /// Compile-time real value (integers widen).
    #[allow(clippy::cast_precision_loss)]
    pub fn real_constant(&self, id: ExprId) -> Option<f64> {
        let expr = self.get(id);
        match &expr.kind {
            ExprKind::RealConstant(x) => Some(*x),
            ExprKind::IntegerConstant(n) => Some(*n as f64),
            ExprKind::UnaryMinus(inner) => self.real_constant(*inner).map(|x| -x),
            _ => expr.value.and_then(|v| self.real_constant(v)),
        }
    }
}
