//! ASR statements.
//!
//! Statements are owned trees; their expressions point into the
//! translation unit's [`ExprArena`](crate::ExprArena).

use crate::{ExprId, Span, SymbolId};

/// Header of a counted loop: `do v = start, end, increment`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DoLoopHead {
    /// Loop variable, always a `Var` expression.
    pub var: ExprId,
    pub start: ExprId,
    pub end: ExprId,
    /// `None` means an increment of one.
    pub increment: Option<ExprId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Assignment {
        target: ExprId,
        value: ExprId,
    },
    Print {
        values: Vec<ExprId>,
    },
    If {
        test: ExprId,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    WhileLoop {
        test: ExprId,
        body: Vec<Stmt>,
    },
    DoLoop {
        head: DoLoopHead,
        body: Vec<Stmt>,
    },
    DoConcurrentLoop {
        head: DoLoopHead,
        body: Vec<Stmt>,
    },
    Exit,
    Cycle,
    Return,
    Stop {
        code: Option<ExprId>,
    },
    ErrorStop {
        code: Option<ExprId>,
    },
    Assert {
        test: ExprId,
        msg: Option<ExprId>,
    },
    SubroutineCall {
        sub: SymbolId,
        args: Vec<Option<ExprId>>,
    },

    // -- Container mutation --
    ListAppend {
        list: ExprId,
        element: ExprId,
    },
    ListInsert {
        list: ExprId,
        index: ExprId,
        element: ExprId,
    },
    ListRemove {
        list: ExprId,
        element: ExprId,
    },
    ListReverse(ExprId),
    ListClear(ExprId),
    DictInsert {
        dict: ExprId,
        key: ExprId,
        value: ExprId,
    },
    SetAdd {
        set: ExprId,
        element: ExprId,
    },
    SetRemove {
        set: ExprId,
        element: ExprId,
    },
    SetDiscard {
        set: ExprId,
        element: ExprId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            kind,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return)
    }

    // -- Shorthand constructors --

    pub fn assign(target: ExprId, value: ExprId) -> Self {
        Stmt::new(StmtKind::Assignment { target, value })
    }

    pub fn print(values: Vec<ExprId>) -> Self {
        Stmt::new(StmtKind::Print { values })
    }

    pub fn if_else(test: ExprId, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::If { test, body, orelse })
    }

    pub fn while_loop(test: ExprId, body: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::WhileLoop { test, body })
    }

    pub fn do_loop(head: DoLoopHead, body: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::DoLoop { head, body })
    }

    pub fn do_concurrent(head: DoLoopHead, body: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::DoConcurrentLoop { head, body })
    }

    pub fn ret() -> Self {
        Stmt::new(StmtKind::Return)
    }

    pub fn call(sub: SymbolId, args: Vec<Option<ExprId>>) -> Self {
        Stmt::new(StmtKind::SubroutineCall { sub, args })
    }
}
