//! Convenience constructors for ASR nodes.
//!
//! Used by the intrinsic builders to materialize folded constants and by
//! tests to assemble translation units without a front end. Result types
//! follow the Fortran rules the front end would apply: arithmetic takes the
//! left operand's type, comparisons are default logical.

use crate::expr::{BinOp, CastKind, CmpOp, Expr, ExprKind, LogicalOp};
use crate::stmt::DoLoopHead;
use crate::symbol::{
    Abi, DefType, EnumType, Function, Intent, Module, Program, StructKind, StructType, Symbol,
    Variable,
};
use crate::ty::Ty;
use crate::unit::TranslationUnit;
use crate::{ExprId, ScopeId, Span, Stmt, SymbolId};

pub struct AsrBuilder {
    unit: TranslationUnit,
    span: Span,
}

impl Default for AsrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AsrBuilder {
    pub fn new() -> Self {
        AsrBuilder {
            unit: TranslationUnit::new(),
            span: Span::DUMMY,
        }
    }

    /// Continue building on an existing unit.
    pub fn from_unit(unit: TranslationUnit) -> Self {
        AsrBuilder {
            unit,
            span: Span::DUMMY,
        }
    }

    pub fn finish(self) -> TranslationUnit {
        self.unit
    }

    pub fn unit(&self) -> &TranslationUnit {
        &self.unit
    }

    pub fn unit_mut(&mut self) -> &mut TranslationUnit {
        &mut self.unit
    }

    /// Span attached to subsequently built expressions.
    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn global(&self) -> ScopeId {
        self.unit.global_scope
    }

    pub fn ty(&self, id: ExprId) -> &Ty {
        self.unit.exprs.ty(id)
    }

    pub fn expr(&mut self, kind: ExprKind, ty: Ty) -> ExprId {
        self.unit.exprs.alloc(Expr::new(kind, ty, self.span))
    }

    /// Attach a folded value to `id`.
    pub fn set_value(&mut self, id: ExprId, value: ExprId) {
        self.unit.exprs.get_mut(id).value = Some(value);
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    pub fn int(&mut self, n: i64, kind: u8) -> ExprId {
        self.expr(ExprKind::IntegerConstant(n), Ty::integer(kind))
    }

    pub fn i32(&mut self, n: i64) -> ExprId {
        self.int(n, 4)
    }

    pub fn i64(&mut self, n: i64) -> ExprId {
        self.int(n, 8)
    }

    pub fn real(&mut self, x: f64, kind: u8) -> ExprId {
        self.expr(ExprKind::RealConstant(x), Ty::real(kind))
    }

    pub fn f64(&mut self, x: f64) -> ExprId {
        self.real(x, 8)
    }

    pub fn complex(&mut self, re: f64, im: f64, kind: u8) -> ExprId {
        self.expr(ExprKind::ComplexConstant(re, im), Ty::complex(kind))
    }

    pub fn logical(&mut self, b: bool) -> ExprId {
        self.expr(ExprKind::LogicalConstant(b), Ty::logical())
    }

    pub fn string(&mut self, s: &str) -> ExprId {
        let len = i64::try_from(s.len()).ok();
        self.expr(
            ExprKind::StringConstant(s.to_string()),
            Ty::Character { kind: 1, len },
        )
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    pub fn var(&mut self, sym: SymbolId) -> ExprId {
        let ty = match self.unit.symbols.get(sym) {
            Symbol::Variable(v) => v.ty.clone(),
            Symbol::Function(f) => f
                .return_var
                .and_then(|r| self.unit.symbols.variable(r))
                .map_or(Ty::i32(), |v| v.ty.clone()),
            _ => Ty::i32(),
        };
        self.expr(ExprKind::Var(sym), ty)
    }

    pub fn binop(&mut self, left: ExprId, op: BinOp, right: ExprId) -> ExprId {
        let ty = self.ty(left).clone();
        self.expr(ExprKind::BinOp { left, op, right }, ty)
    }

    pub fn add(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binop(left, BinOp::Add, right)
    }

    pub fn sub(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binop(left, BinOp::Sub, right)
    }

    pub fn mul(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binop(left, BinOp::Mul, right)
    }

    pub fn div(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binop(left, BinOp::Div, right)
    }

    pub fn pow(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binop(left, BinOp::Pow, right)
    }

    pub fn neg(&mut self, operand: ExprId) -> ExprId {
        let ty = self.ty(operand).clone();
        self.expr(ExprKind::UnaryMinus(operand), ty)
    }

    pub fn not(&mut self, operand: ExprId) -> ExprId {
        self.expr(ExprKind::LogicalNot(operand), Ty::logical())
    }

    pub fn bitnot(&mut self, operand: ExprId) -> ExprId {
        let ty = self.ty(operand).clone();
        self.expr(ExprKind::BitNot(operand), ty)
    }

    pub fn compare(&mut self, left: ExprId, op: CmpOp, right: ExprId) -> ExprId {
        self.expr(ExprKind::Compare { left, op, right }, Ty::logical())
    }

    pub fn logical_op(&mut self, left: ExprId, op: LogicalOp, right: ExprId) -> ExprId {
        self.expr(ExprKind::LogicalBinOp { left, op, right }, Ty::logical())
    }

    pub fn concat(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::StringConcat { left, right }, Ty::string())
    }

    pub fn if_exp(&mut self, test: ExprId, body: ExprId, orelse: ExprId) -> ExprId {
        let ty = self.ty(body).clone();
        self.expr(ExprKind::IfExp { test, body, orelse }, ty)
    }

    pub fn cast(&mut self, arg: ExprId, kind: CastKind, ty: Ty) -> ExprId {
        self.expr(ExprKind::Cast { arg, kind }, ty)
    }

    pub fn call(&mut self, func: SymbolId, args: Vec<Option<ExprId>>) -> ExprId {
        let ty = self
            .unit
            .symbols
            .function(func)
            .and_then(|f| f.return_var)
            .and_then(|r| self.unit.symbols.variable(r))
            .map_or(Ty::i32(), |v| v.ty.clone());
        self.expr(ExprKind::FunctionCall { func, args }, ty)
    }

    pub fn member(&mut self, base: ExprId, member: SymbolId) -> ExprId {
        let ty = self
            .unit
            .symbols
            .variable(member)
            .map_or(Ty::i32(), |v| v.ty.clone());
        self.expr(ExprKind::StructMember { base, member }, ty)
    }

    pub fn array_item(&mut self, array: ExprId, indices: Vec<ExprId>) -> ExprId {
        let ty = self.ty(array).element().clone();
        self.expr(ExprKind::ArrayItem { array, indices }, ty)
    }

    pub fn array_size(&mut self, array: ExprId, dim: Option<ExprId>) -> ExprId {
        self.expr(ExprKind::ArraySize { array, dim }, Ty::i32())
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    pub fn list(&mut self, elements: Vec<ExprId>, element_ty: Ty) -> ExprId {
        self.expr(ExprKind::ListConstant(elements), Ty::list(element_ty))
    }

    pub fn list_item(&mut self, list: ExprId, index: ExprId) -> ExprId {
        let ty = match self.ty(list).strip() {
            Ty::List(el) => (**el).clone(),
            other => other.clone(),
        };
        self.expr(ExprKind::ListItem { list, index }, ty)
    }

    pub fn list_len(&mut self, list: ExprId) -> ExprId {
        self.expr(ExprKind::ListLen(list), Ty::i32())
    }

    pub fn tuple(&mut self, elements: Vec<ExprId>) -> ExprId {
        let tys = elements.iter().map(|e| self.ty(*e).clone()).collect();
        self.expr(ExprKind::TupleConstant(elements), Ty::tuple(tys))
    }

    pub fn tuple_item(&mut self, tuple: ExprId, index: usize) -> ExprId {
        let ty = match self.ty(tuple).strip() {
            Ty::Tuple(tys) => tys.get(index).cloned().unwrap_or(Ty::i32()),
            _ => Ty::i32(),
        };
        self.expr(ExprKind::TupleItem { tuple, index }, ty)
    }

    pub fn dict(&mut self, keys: Vec<ExprId>, values: Vec<ExprId>, key_ty: Ty, value_ty: Ty) -> ExprId {
        self.expr(
            ExprKind::DictConstant { keys, values },
            Ty::dict(key_ty, value_ty),
        )
    }

    pub fn dict_item(&mut self, dict: ExprId, key: ExprId, default: Option<ExprId>) -> ExprId {
        let ty = match self.ty(dict).strip() {
            Ty::Dict(_, v) => (**v).clone(),
            other => other.clone(),
        };
        self.expr(ExprKind::DictItem { dict, key, default }, ty)
    }

    pub fn set(&mut self, elements: Vec<ExprId>, element_ty: Ty) -> ExprId {
        self.expr(ExprKind::SetConstant(elements), Ty::set(element_ty))
    }

    // -----------------------------------------------------------------------
    // Symbols
    // -----------------------------------------------------------------------

    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.unit.symbols.new_scope(Some(parent))
    }

    pub fn add_symbol(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        self.unit.symbols.add(scope, symbol)
    }

    pub fn variable(&mut self, scope: ScopeId, name: &str, ty: Ty) -> SymbolId {
        self.add_symbol(scope, Symbol::Variable(Variable::new(name, ty, Intent::Local)))
    }

    pub fn argument(&mut self, scope: ScopeId, name: &str, ty: Ty, intent: Intent) -> SymbolId {
        self.add_symbol(scope, Symbol::Variable(Variable::new(name, ty, intent)))
    }

    pub fn return_var(&mut self, scope: ScopeId, name: &str, ty: Ty) -> SymbolId {
        self.add_symbol(
            scope,
            Symbol::Variable(Variable::new(name, ty, Intent::ReturnVar)),
        )
    }

    /// Add a procedure whose locals already live in `scope`.
    pub fn function(
        &mut self,
        parent: ScopeId,
        name: &str,
        scope: ScopeId,
        args: Vec<SymbolId>,
        return_var: Option<SymbolId>,
        body: Vec<Stmt>,
    ) -> SymbolId {
        self.add_symbol(
            parent,
            Symbol::Function(Function {
                name: name.to_string(),
                scope,
                args,
                return_var,
                body,
                abi: Abi::Source,
                deftype: DefType::Implementation,
                elemental: false,
                dependencies: Vec::new(),
            }),
        )
    }

    /// Replace the body of an already declared procedure or program
    /// (bodies often reference the procedure's own symbol).
    pub fn set_body(&mut self, id: SymbolId, body: Vec<Stmt>) {
        match self.unit.symbols.get_mut(id) {
            Symbol::Function(f) => f.body = body,
            Symbol::Program(p) => p.body = body,
            _ => {}
        }
    }

    pub fn module(&mut self, name: &str, dependencies: &[&str]) -> (SymbolId, ScopeId) {
        let global = self.global();
        let scope = self.new_scope(global);
        let id = self.add_symbol(
            global,
            Symbol::Module(Module {
                name: name.to_string(),
                scope,
                dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
                intrinsic: crate::unit::is_intrinsic_module_name(name),
            }),
        );
        (id, scope)
    }

    pub fn program(&mut self, name: &str, scope: ScopeId, body: Vec<Stmt>) -> SymbolId {
        let global = self.global();
        self.add_symbol(
            global,
            Symbol::Program(Program {
                name: name.to_string(),
                scope,
                body,
                dependencies: Vec::new(),
            }),
        )
    }

    /// Declare a derived type with the given members; returns the type
    /// symbol and the member symbols in order.
    pub fn struct_type(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: StructKind,
        parent: Option<SymbolId>,
        members: Vec<(&str, Ty)>,
    ) -> (SymbolId, Vec<SymbolId>) {
        let own = self.new_scope(scope);
        let mut ids = Vec::with_capacity(members.len());
        let mut names = Vec::with_capacity(members.len());
        for (member, ty) in members {
            ids.push(self.variable(own, member, ty));
            names.push(member.to_string());
        }
        let id = self.add_symbol(
            scope,
            Symbol::Struct(StructType {
                name: name.to_string(),
                scope: own,
                members: names,
                parent,
                kind,
                abi: Abi::Source,
            }),
        );
        (id, ids)
    }

    pub fn enum_type(&mut self, scope: ScopeId, name: &str, members: Vec<(&str, i64)>) -> SymbolId {
        self.add_symbol(
            scope,
            Symbol::Enum(EnumType {
                name: name.to_string(),
                members: members
                    .into_iter()
                    .map(|(n, v)| (n.to_string(), v))
                    .collect(),
            }),
        )
    }

    pub fn do_head(&mut self, var: SymbolId, start: ExprId, end: ExprId, increment: Option<ExprId>) -> DoLoopHead {
        let var = self.var(var);
        DoLoopHead {
            var,
            start,
            end,
            increment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_takes_left_type() {
        let mut b = AsrBuilder::new();
        let x = b.f64(1.5);
        let y = b.f64(2.0);
        let sum = b.add(x, y);
        assert_eq!(b.ty(sum), &Ty::f64());
        let cmp = b.compare(x, CmpOp::Lt, y);
        assert_eq!(b.ty(cmp), &Ty::logical());
    }

    #[test]
    fn call_uses_return_variable_type() {
        let mut b = AsrBuilder::new();
        let global = b.global();
        let scope = b.new_scope(global);
        let r = b.return_var(scope, "r", Ty::i64());
        let f = b.function(global, "f", scope, vec![], Some(r), vec![]);
        let call = b.call(f, vec![]);
        assert_eq!(b.ty(call), &Ty::i64());
        assert!(matches!(
            b.unit().exprs.get(call).kind,
            ExprKind::FunctionCall { .. }
        ));
    }

    #[test]
    fn struct_members_keep_order() {
        let mut b = AsrBuilder::new();
        let global = b.global();
        let (point, members) = b.struct_type(
            global,
            "point",
            StructKind::Struct,
            None,
            vec![("x", Ty::f64()), ("y", Ty::f64())],
        );
        assert_eq!(b.unit().symbols.struct_members(point), members);
    }
}
