//! Expression lowering.

use lfort_intrinsics::{inquiry_value, Const};
use lfort_ir::{
    ensure_sufficient_stack, ArrayPhysicalType, ArrayType, BinOp, CastKind, CmpOp, ExprId,
    ExprKind, LogicalOp, Span, StructKind, SymbolId, Ty,
};

use super::FnLowering;
use crate::containers::{value_ops, HelperOp, INDEX_END};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FloatPredicate, FunctionBuilder, IntPredicate, IrType, ValueId};
use crate::layout::{DESC_DATA, DESC_DIMS, DESC_OFFSET, DIM_LENGTH, DIM_LOWER, DIM_STRIDE};
use crate::runtime;

impl CodegenCx<'_> {
    /// Value of `id` in its storage type.
    pub(crate) fn lower_value(&mut self, fx: &mut FnLowering, id: ExprId) -> CodegenResult<ValueId> {
        ensure_sufficient_stack(|| self.lower_value_inner(fx, id))
    }

    /// Pointer to storage holding the value of `id`.
    pub(crate) fn lower_addr(&mut self, fx: &mut FnLowering, id: ExprId) -> CodegenResult<ValueId> {
        ensure_sufficient_stack(|| self.lower_addr_inner(fx, id))
    }

    fn lower_value_inner(&mut self, fx: &mut FnLowering, id: ExprId) -> CodegenResult<ValueId> {
        let expr = self.expr(id);
        let span = expr.span;
        if let Some(folded) = self.unit.exprs.constant(id) {
            if let Some(v) = self.lower_constant(fx, &folded.kind, &expr.ty, span)? {
                return Ok(v);
            }
        }
        match &expr.kind {
            ExprKind::BinOp { left, op, right } => self.binop(fx, *left, *op, *right, &expr.ty, span),
            ExprKind::UnaryMinus(operand) => {
                let v = self.lower_value(fx, *operand)?;
                let fb = &mut fx.fb;
                Ok(match expr.ty.strip() {
                    Ty::Real { .. } => fb.fneg(v),
                    Ty::Complex { .. } => {
                        let (re, im) = parts(fb, v);
                        let (re, im) = (fb.fneg(re), fb.fneg(im));
                        fb.build_struct(&[re, im])
                    }
                    _ => fb.neg(v),
                })
            }
            ExprKind::LogicalNot(operand) | ExprKind::BitNot(operand) => {
                let v = self.lower_value(fx, *operand)?;
                Ok(fx.fb.not(v))
            }
            ExprKind::Compare { left, op, right } => self.compare(fx, *left, *op, *right, span),
            ExprKind::LogicalBinOp { left, op, right } => {
                let a = self.lower_value(fx, *left)?;
                let b = self.lower_value(fx, *right)?;
                let fb = &mut fx.fb;
                Ok(match op {
                    LogicalOp::And => fb.and(a, b),
                    LogicalOp::Or => fb.or(a, b),
                    LogicalOp::Eqv => fb.icmp_eq(a, b),
                    LogicalOp::NEqv => fb.xor(a, b),
                })
            }
            ExprKind::StringConcat { left, right } => {
                let a = self.lower_value(fx, *left)?;
                let b = self.lower_value(fx, *right)?;
                let concat = self.helper(&Ty::string(), HelperOp::Concat, span)?;
                Ok(concat.call(&mut fx.fb, &[a, b]))
            }
            ExprKind::StringLen(s) => {
                let s = self.lower_value(fx, *s)?;
                let result = self.storage_type(&expr.ty, span)?;
                let len = fx.fb.call(runtime::STRLEN, IrType::I64, &[s]);
                Ok(fx.fb.int_cast(len, result, true))
            }
            ExprKind::IfExp { test, body, orelse } => self.if_exp(fx, *test, *body, *orelse, &expr.ty, span),
            ExprKind::Cast { arg, kind } => self.cast(fx, *arg, *kind, &expr.ty, span),
            ExprKind::FunctionCall { func, args } => self
                .lower_call(fx, *func, args, span)?
                .ok_or_else(|| {
                    CodegenError::internal(format!("`{}` returns no value", self.name(*func)))
                }),
            ExprKind::IntrinsicElementalFunction { id: intrinsic, args, .. } => {
                self.lower_intrinsic(fx, *intrinsic, args, &expr.ty, span)
            }
            ExprKind::TypeInquiry { id: inquiry, arg_ty, .. } => {
                let value = inquiry_value(*inquiry, arg_ty)
                    .map_err(|why| CodegenError::unsupported(why, span))?;
                self.lower_const(fx, &value, &expr.ty, span)
            }
            ExprKind::ArraySize { array, dim } => self.array_size(fx, *array, *dim, &expr.ty, span),
            ExprKind::ListLen(c) | ExprKind::DictLen(c) | ExprKind::SetLen(c) => {
                let container = self.lower_addr(fx, *c)?;
                let n = self.helper(self.ty(*c), HelperOp::Len, span)?.call(&mut fx.fb, &[container]);
                self.result_int(fx, n, &expr.ty, span)
            }
            ExprKind::ListIndex { list, element, start, end } => {
                let container = self.lower_addr(fx, *list)?;
                let el = self.lower_addr(fx, *element)?;
                let start = match start {
                    Some(s) => self.index_i32(fx, *s)?,
                    None => fx.fb.const_i32(0),
                };
                let end = match end {
                    Some(e) => self.index_i32(fx, *e)?,
                    None => fx.fb.const_i32(INDEX_END),
                };
                let index = self.helper(self.ty(*list), HelperOp::Index, span)?;
                let at = index.call(&mut fx.fb, &[container, el, start, end]);
                self.result_int(fx, at, &expr.ty, span)
            }
            ExprKind::ListCount { list, element } => {
                let container = self.lower_addr(fx, *list)?;
                let el = self.lower_addr(fx, *element)?;
                let n = self.helper(self.ty(*list), HelperOp::Count, span)?.call(&mut fx.fb, &[container, el]);
                self.result_int(fx, n, &expr.ty, span)
            }
            ExprKind::ListContains { list: c, element: el }
            | ExprKind::DictContains { dict: c, key: el }
            | ExprKind::SetContains { set: c, element: el } => {
                let container = self.lower_addr(fx, *c)?;
                let el = self.lower_addr(fx, *el)?;
                let contains = self.helper(self.ty(*c), HelperOp::Contains, span)?;
                Ok(contains.call(&mut fx.fb, &[container, el]))
            }
            ExprKind::Var(_)
            | ExprKind::ArrayItem { .. }
            | ExprKind::StructMember { .. }
            | ExprKind::ListConstant(_)
            | ExprKind::ListItem { .. }
            | ExprKind::ListConcat { .. }
            | ExprKind::ListPop { .. }
            | ExprKind::TupleConstant(_)
            | ExprKind::TupleItem { .. }
            | ExprKind::TupleConcat { .. }
            | ExprKind::StringPartition { .. }
            | ExprKind::DictConstant { .. }
            | ExprKind::DictItem { .. }
            | ExprKind::DictPop { .. }
            | ExprKind::DictKeys(_)
            | ExprKind::DictValues(_)
            | ExprKind::SetConstant(_) => {
                let addr = self.lower_addr(fx, id)?;
                let storage = self.storage_type(&expr.ty, span)?;
                Ok(fx.fb.load(storage, addr))
            }
            ExprKind::IntegerConstant(_)
            | ExprKind::RealConstant(_)
            | ExprKind::ComplexConstant(..)
            | ExprKind::LogicalConstant(_)
            | ExprKind::StringConstant(_) => Err(CodegenError::internal(format!(
                "constant of type {} has no lowering",
                expr.ty.type_code(&self.unit.symbols)
            ))),
        }
    }

    fn lower_addr_inner(&mut self, fx: &mut FnLowering, id: ExprId) -> CodegenResult<ValueId> {
        let expr = self.expr(id);
        let span = expr.span;
        let ty = &expr.ty;
        match &expr.kind {
            ExprKind::Var(sym) => self.variable_addr(fx, *sym, span),
            ExprKind::ArrayItem { array, indices } => self.array_item_addr(fx, *array, indices, span),
            ExprKind::StructMember { base, member } => self.member_addr(fx, *base, *member, span),
            ExprKind::ListItem { list, index } => {
                let container = self.lower_addr(fx, *list)?;
                let index = self.index_i32(fx, *index)?;
                let read = self.helper(self.ty(*list), HelperOp::Read, span)?;
                Ok(read.call(&mut fx.fb, &[container, index]))
            }
            ExprKind::TupleItem { tuple, index } => {
                let record = self.storage_type(self.ty(*tuple), span)?;
                let base = self.lower_addr(fx, *tuple)?;
                let field = u32::try_from(*index)
                    .map_err(|_| CodegenError::internal("tuple index out of range"))?;
                Ok(fx.fb.struct_gep(&record, base, field))
            }
            ExprKind::DictItem { dict, key, default } => {
                let container = self.lower_addr(fx, *dict)?;
                let key = self.lower_addr(fx, *key)?;
                match default {
                    Some(default) => {
                        let fallback = self.lower_addr(fx, *default)?;
                        let get = self.helper(self.ty(*dict), HelperOp::Get, span)?;
                        Ok(get.call(&mut fx.fb, &[container, key, fallback]))
                    }
                    None => {
                        let read = self.helper(self.ty(*dict), HelperOp::Read, span)?;
                        Ok(read.call(&mut fx.fb, &[container, key]))
                    }
                }
            }
            ExprKind::ListConstant(elements) => {
                let out = self.temporary(fx, ty, span)?;
                let capacity = i32::try_from(elements.len()).unwrap_or(i32::MAX);
                self.init_container(fx, ty, out, capacity, span)?;
                let append = self.helper(ty, HelperOp::Append, span)?;
                for &el in elements {
                    let el = self.lower_addr(fx, el)?;
                    append.call(&mut fx.fb, &[out, el]);
                }
                Ok(out)
            }
            ExprKind::SetConstant(elements) => {
                let out = self.temporary(fx, ty, span)?;
                let capacity = self.options.initial_hash_capacity;
                self.init_container(fx, ty, out, capacity, span)?;
                let add = self.helper(ty, HelperOp::Add, span)?;
                for &el in elements {
                    let el = self.lower_addr(fx, el)?;
                    add.call(&mut fx.fb, &[out, el]);
                }
                Ok(out)
            }
            ExprKind::DictConstant { keys, values } => {
                let out = self.temporary(fx, ty, span)?;
                let capacity = self.options.initial_hash_capacity;
                self.init_container(fx, ty, out, capacity, span)?;
                let insert = self.helper(ty, HelperOp::Insert, span)?;
                for (&k, &v) in keys.iter().zip(values) {
                    let k = self.lower_addr(fx, k)?;
                    let v = self.lower_addr(fx, v)?;
                    insert.call(&mut fx.fb, &[out, k, v]);
                }
                Ok(out)
            }
            ExprKind::TupleConstant(elements) => {
                let record = self.storage_type(ty, span)?;
                let out = fx.fb.alloca(record.clone());
                for (i, &el) in elements.iter().enumerate() {
                    let src = self.lower_addr(fx, el)?;
                    let field = u32::try_from(i).unwrap_or(u32::MAX);
                    let dst = fx.fb.struct_gep(&record, out, field);
                    self.copy_value(&mut fx.fb, self.ty(el), src, dst, span)?;
                }
                Ok(out)
            }
            ExprKind::ListConcat { left, right } => {
                let a = self.lower_addr(fx, *left)?;
                let b = self.lower_addr(fx, *right)?;
                let out = self.temporary(fx, ty, span)?;
                let concat = self.helper(ty, HelperOp::Concat, span)?;
                concat.call(&mut fx.fb, &[a, b, out]);
                Ok(out)
            }
            ExprKind::ListPop { list, index } => {
                let container = self.lower_addr(fx, *list)?;
                let out = self.temporary(fx, ty, span)?;
                let list_ty = self.ty(*list);
                match index {
                    Some(index) => {
                        let index = self.index_i32(fx, *index)?;
                        let pop = self.helper(list_ty, HelperOp::Pop, span)?;
                        pop.call(&mut fx.fb, &[container, index, out]);
                    }
                    None => {
                        let pop = self.helper(list_ty, HelperOp::PopLast, span)?;
                        pop.call(&mut fx.fb, &[container, out]);
                    }
                }
                Ok(out)
            }
            ExprKind::DictPop { dict, key } => {
                let container = self.lower_addr(fx, *dict)?;
                let key = self.lower_addr(fx, *key)?;
                let out = self.temporary(fx, ty, span)?;
                let pop = self.helper(self.ty(*dict), HelperOp::Pop, span)?;
                pop.call(&mut fx.fb, &[container, key, out]);
                Ok(out)
            }
            ExprKind::DictKeys(dict) | ExprKind::DictValues(dict) => {
                let op = if matches!(expr.kind, ExprKind::DictKeys(_)) {
                    HelperOp::Keys
                } else {
                    HelperOp::Values
                };
                let container = self.lower_addr(fx, *dict)?;
                let out = self.temporary(fx, ty, span)?;
                let collect = self.helper(self.ty(*dict), op, span)?;
                collect.call(&mut fx.fb, &[container, out]);
                Ok(out)
            }
            ExprKind::TupleConcat { left, right } => {
                let a = self.lower_addr(fx, *left)?;
                let b = self.lower_addr(fx, *right)?;
                let out = self.temporary(fx, ty, span)?;
                let (a_ty, b_ty) = (self.ty(*left), self.ty(*right));
                self.tuple_concat(&mut fx.fb, (a, a_ty), (b, b_ty), (out, ty), span)?;
                Ok(out)
            }
            ExprKind::StringPartition { string, separator } => {
                let s = self.lower_value(fx, *string)?;
                let sep = self.lower_value(fx, *separator)?;
                let out = self.temporary(fx, ty, span)?;
                self.string_partition(&mut fx.fb, s, sep, out, span)?;
                Ok(out)
            }
            _ => {
                let v = self.lower_value(fx, id)?;
                Ok(fx.fb.alloca_init(v))
            }
        }
    }

    /// Uninitialised stack storage for a value of type `ty`.
    pub(super) fn temporary(&mut self, fx: &mut FnLowering, ty: &Ty, span: Span) -> CodegenResult<ValueId> {
        let storage = self.storage_type(ty, span)?;
        Ok(fx.fb.alloca(storage))
    }

    /// Empty list, dict or set at `slot` with room for `capacity` items.
    pub(super) fn init_container(
        &mut self,
        fx: &mut FnLowering,
        ty: &Ty,
        slot: ValueId,
        capacity: i32,
        span: Span,
    ) -> CodegenResult<()> {
        let init = self.helper(ty, HelperOp::Init, span)?;
        let capacity = fx.fb.const_i32(capacity);
        init.call(&mut fx.fb, &[slot, capacity]);
        Ok(())
    }

    /// Value of an integer expression as an `i32` position.
    pub(super) fn index_i32(&mut self, fx: &mut FnLowering, id: ExprId) -> CodegenResult<ValueId> {
        let v = self.lower_value(fx, id)?;
        Ok(fx.fb.int_cast(v, IrType::I32, !self.ty(id).is_unsigned()))
    }

    fn result_int(&mut self, fx: &mut FnLowering, v: ValueId, ty: &Ty, span: Span) -> CodegenResult<ValueId> {
        let result = self.storage_type(ty, span)?;
        Ok(fx.fb.int_cast(v, result, true))
    }

    /// A literal (or folded) scalar, or `None` when `ty` does not take it.
    fn lower_constant(
        &mut self,
        fx: &mut FnLowering,
        kind: &ExprKind,
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<Option<ValueId>> {
        let storage = self.storage_type(ty, span)?;
        let fb = &mut fx.fb;
        Ok(match kind {
            ExprKind::IntegerConstant(n) if storage.is_int() => Some(fb.const_int(storage, *n)),
            ExprKind::IntegerConstant(n) if storage.is_float() => Some(fb.const_float(storage, *n as f64)),
            ExprKind::RealConstant(x) if storage.is_float() => Some(fb.const_float(storage, *x)),
            ExprKind::ComplexConstant(re, im) if ty.is_complex() => {
                let part = storage.field(0).cloned().unwrap_or(IrType::Double);
                let re = fb.const_float(part.clone(), *re);
                let im = fb.const_float(part, *im);
                Some(fb.build_struct(&[re, im]))
            }
            ExprKind::LogicalConstant(b) if storage.is_int() => Some(fb.const_int(storage, i64::from(*b))),
            ExprKind::StringConstant(s) if ty.is_character() => {
                let name = self.module.string_constant(s);
                Some(fb.global(&name))
            }
            _ => None,
        })
    }

    /// A value computed at compile time by the intrinsic tables.
    pub(super) fn lower_const(
        &mut self,
        fx: &mut FnLowering,
        value: &Const,
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let kind = match value {
            Const::Int(n) => ExprKind::IntegerConstant(*n),
            Const::Real(x) => ExprKind::RealConstant(*x),
            Const::Complex(z) => ExprKind::ComplexConstant(z.re, z.im),
            Const::Logical(b) => ExprKind::LogicalConstant(*b),
            Const::Str(s) => ExprKind::StringConstant(s.clone()),
        };
        self.lower_constant(fx, &kind, ty, span)?.ok_or_else(|| {
            CodegenError::internal(format!(
                "constant does not fit type {}",
                ty.type_code(&self.unit.symbols)
            ))
        })
    }

    fn binop(
        &mut self,
        fx: &mut FnLowering,
        left: ExprId,
        op: BinOp,
        right: ExprId,
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let a = self.lower_value(fx, left)?;
        let b = self.lower_value(fx, right)?;
        match ty.strip() {
            Ty::Integer { .. } | Ty::UnsignedInteger { .. } => {
                let unsigned = ty.is_unsigned();
                let fb = &mut fx.fb;
                Ok(match op {
                    BinOp::Add => fb.add(a, b),
                    BinOp::Sub => fb.sub(a, b),
                    BinOp::Mul => fb.mul(a, b),
                    BinOp::Div if unsigned => fb.udiv(a, b),
                    BinOp::Div => fb.sdiv(a, b),
                    BinOp::Pow => {
                        let to = fb.type_of(a).clone();
                        let b = fb.int_cast(b, to, !self.ty(right).is_unsigned());
                        int_pow(fb, a, b)
                    }
                })
            }
            Ty::Real { .. } => {
                let storage = self.storage_type(ty, span)?;
                if op == BinOp::Pow {
                    return Ok(self.real_pow(fx, a, b, self.ty(right), &storage));
                }
                let fb = &mut fx.fb;
                Ok(match op {
                    BinOp::Add => fb.fadd(a, b),
                    BinOp::Sub => fb.fsub(a, b),
                    BinOp::Mul => fb.fmul(a, b),
                    _ => fb.fdiv(a, b),
                })
            }
            Ty::Complex { .. } => {
                let fb = &mut fx.fb;
                let ((ar, ai), (br, bi)) = (parts(fb, a), parts(fb, b));
                let (re, im) = match op {
                    BinOp::Add => (fb.fadd(ar, br), fb.fadd(ai, bi)),
                    BinOp::Sub => (fb.fsub(ar, br), fb.fsub(ai, bi)),
                    BinOp::Mul => {
                        let (rr, ii) = (fb.fmul(ar, br), fb.fmul(ai, bi));
                        let (ri, ir) = (fb.fmul(ar, bi), fb.fmul(ai, br));
                        (fb.fsub(rr, ii), fb.fadd(ri, ir))
                    }
                    BinOp::Div => {
                        let (cc, dd) = (fb.fmul(br, br), fb.fmul(bi, bi));
                        let den = fb.fadd(cc, dd);
                        let (ac, bd) = (fb.fmul(ar, br), fb.fmul(ai, bi));
                        let (bc, ad) = (fb.fmul(ai, br), fb.fmul(ar, bi));
                        let (re, im) = (fb.fadd(ac, bd), fb.fsub(bc, ad));
                        (fb.fdiv(re, den), fb.fdiv(im, den))
                    }
                    BinOp::Pow => {
                        return Err(CodegenError::not_implemented("complex exponentiation", span))
                    }
                };
                Ok(fb.build_struct(&[re, im]))
            }
            other => Err(CodegenError::unsupported(
                format!(
                    "operator `{}` on {}",
                    op.symbol(),
                    other.type_code(&self.unit.symbols)
                ),
                span,
            )),
        }
    }

    /// `a ** b` for a real base: `llvm.powi` for integer exponents,
    /// `llvm.pow` otherwise.
    fn real_pow(&mut self, fx: &mut FnLowering, a: ValueId, b: ValueId, exp_ty: &Ty, storage: &IrType) -> ValueId {
        if exp_ty.is_integer() {
            let name = format!("{}.i32", runtime::intrinsic_name("powi", storage));
            self.module
                .declare(&name, storage.clone(), vec![storage.clone(), IrType::I32], false);
            let b = fx.fb.int_cast(b, IrType::I32, true);
            return fx.fb.call(&name, storage.clone(), &[a, b]);
        }
        let name = runtime::intrinsic_name("pow", storage);
        self.module
            .declare(&name, storage.clone(), vec![storage.clone(), storage.clone()], false);
        let b = fx.fb.float_cast(b, storage.clone());
        fx.fb.call(&name, storage.clone(), &[a, b])
    }

    fn compare(
        &mut self,
        fx: &mut FnLowering,
        left: ExprId,
        op: CmpOp,
        right: ExprId,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let ty = self.ty(left);
        if ty.needs_deepcopy() {
            return self.compare_aggregate(fx, left, op, right, span);
        }
        let a = self.lower_value(fx, left)?;
        let b = self.lower_value(fx, right)?;
        match ty.strip() {
            Ty::Integer { .. } | Ty::Enum(_) => Ok(fx.fb.icmp(signed_predicate(op), a, b)),
            Ty::UnsignedInteger { .. } | Ty::Logical { .. } => {
                Ok(fx.fb.icmp(unsigned_predicate(op), a, b))
            }
            Ty::Real { .. } => Ok(fx.fb.fcmp(float_predicate(op), a, b)),
            Ty::Complex { .. } => {
                let eq = value_ops::scalar_eq(self, &mut fx.fb, ty, a, b, span)?;
                match op {
                    CmpOp::Eq => Ok(eq),
                    CmpOp::NotEq => Ok(fx.fb.not(eq)),
                    _ => Err(CodegenError::unsupported(
                        format!("operator `{}` on complex numbers", op.symbol()),
                        span,
                    )),
                }
            }
            Ty::Character { .. } => {
                let ord = fx.fb.call(runtime::STRCMP, IrType::I32, &[a, b]);
                let zero = fx.fb.const_i32(0);
                Ok(fx.fb.icmp(signed_predicate(op), ord, zero))
            }
            other => Err(CodegenError::unsupported(
                format!(
                    "comparison of {}",
                    other.type_code(&self.unit.symbols)
                ),
                span,
            )),
        }
    }

    /// Lists, tuples, dicts, sets and derived types compare through their
    /// `eq` and `cmp` helpers.
    fn compare_aggregate(
        &mut self,
        fx: &mut FnLowering,
        left: ExprId,
        op: CmpOp,
        right: ExprId,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let ty = self.ty(left);
        let a = self.lower_addr(fx, left)?;
        let b = self.lower_addr(fx, right)?;
        match op {
            CmpOp::Eq | CmpOp::NotEq => {
                let eq = self.helper(ty, HelperOp::Eq, span)?.call(&mut fx.fb, &[a, b]);
                Ok(if op == CmpOp::Eq { eq } else { fx.fb.not(eq) })
            }
            _ => {
                let ord = self.helper(ty, HelperOp::Cmp, span)?.call(&mut fx.fb, &[a, b]);
                let tie = fx.fb.const_i8(0);
                Ok(fx.fb.icmp(signed_predicate(op), ord, tie))
            }
        }
    }

    fn if_exp(
        &mut self,
        fx: &mut FnLowering,
        test: ExprId,
        body: ExprId,
        orelse: ExprId,
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let cond = self.lower_value(fx, test)?;
        let then_block = fx.fb.append_block("ifexp.then");
        let else_block = fx.fb.append_block("ifexp.else");
        let merge = fx.fb.append_block("ifexp.end");
        fx.fb.cond_br(cond, then_block, else_block);

        fx.fb.position_at_end(then_block);
        let a = self.lower_value(fx, body)?;
        let a_end = fx.fb.current_block();
        fx.fb.br(merge);

        fx.fb.position_at_end(else_block);
        let b = self.lower_value(fx, orelse)?;
        let b_end = fx.fb.current_block();
        fx.fb.br(merge);

        fx.fb.position_at_end(merge);
        let storage = self.storage_type(ty, span)?;
        Ok(fx.fb.phi(storage, &[(a, a_end), (b, b_end)]))
    }

    fn cast(
        &mut self,
        fx: &mut FnLowering,
        arg: ExprId,
        kind: CastKind,
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let source = self.ty(arg);
        let v = self.lower_value(fx, arg)?;
        let to = self.storage_type(ty, span)?;
        let part = to.field(0).cloned().unwrap_or(IrType::Double);
        let fb = &mut fx.fb;
        Ok(match kind {
            CastKind::IntegerToReal if source.is_unsigned() => fb.ui_to_fp(v, to),
            CastKind::IntegerToReal => fb.si_to_fp(v, to),
            CastKind::RealToInteger if ty.is_unsigned() => fb.fp_to_ui(v, to),
            CastKind::RealToInteger => fb.fp_to_si(v, to),
            CastKind::RealToReal => fb.float_cast(v, to),
            CastKind::IntegerToInteger => fb.int_cast(v, to, !source.is_unsigned()),
            CastKind::IntegerToComplex => {
                let re = fb.si_to_fp(v, part.clone());
                let im = fb.const_float(part, 0.0);
                fb.build_struct(&[re, im])
            }
            CastKind::RealToComplex => {
                let re = fb.float_cast(v, part.clone());
                let im = fb.const_float(part, 0.0);
                fb.build_struct(&[re, im])
            }
            CastKind::ComplexToReal => {
                let re = fb.extract_value(v, 0);
                fb.float_cast(re, to)
            }
            CastKind::ComplexToComplex => {
                let (re, im) = parts(fb, v);
                let re = fb.float_cast(re, part.clone());
                let im = fb.float_cast(im, part);
                fb.build_struct(&[re, im])
            }
            CastKind::LogicalToInteger => fb.int_cast(v, to, false),
            CastKind::IntegerToLogical => {
                let zero = fb.zero(fb.type_of(v).clone());
                fb.icmp_ne(v, zero)
            }
        })
    }

    /// Address of a member of a derived-type value. Members of ancestors
    /// are reached through the embedded parent in field 0; every member
    /// of a union sits at the union's own address.
    fn member_addr(
        &mut self,
        fx: &mut FnLowering,
        base: ExprId,
        member: SymbolId,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let base_ty = self.ty(base);
        let mut owner = match base_ty.strip() {
            Ty::Struct(id) | Ty::Union(id) | Ty::Class(id) => *id,
            other => {
                return Err(CodegenError::internal(format!(
                    "member access on {}",
                    other.type_code(&self.unit.symbols)
                )))
            }
        };
        let slot = self.lower_addr(fx, base)?;
        let mut ptr = match base_ty {
            Ty::Pointer(_) | Ty::Class(_) => fx.fb.load(IrType::Ptr, slot),
            _ => slot,
        };
        let name = self.name(member);
        loop {
            let layout = self.struct_layout(owner, span)?;
            if let Some(field) = layout.field(name) {
                if layout.kind == StructKind::Union {
                    return Ok(ptr);
                }
                return Ok(fx.fb.struct_gep(&layout.ty, ptr, field));
            }
            match layout.parent {
                Some(parent) => {
                    ptr = fx.fb.struct_gep(&layout.ty, ptr, 0);
                    owner = parent;
                }
                None => return Err(CodegenError::unknown_symbol(name, span)),
            }
        }
    }

    /// Address of `array(indices...)`, column-major, no bounds checks.
    fn array_item_addr(
        &mut self,
        fx: &mut FnLowering,
        array: ExprId,
        indices: &[ExprId],
        span: Span,
    ) -> CodegenResult<ValueId> {
        let Some(arr) = self.ty(array).as_array() else {
            return Err(CodegenError::internal("subscript of a non-array"));
        };
        let element = self.storage_type(&arr.element, span)?;
        let base = self.lower_addr(fx, array)?;
        let mut subscripts = Vec::with_capacity(indices.len());
        for &i in indices {
            subscripts.push(self.index_i32(fx, i)?);
        }

        if arr.physical == ArrayPhysicalType::DescriptorArray {
            let desc = self.array_descriptor(arr.rank());
            let dim_ty = self.dimension_descriptor();
            let fb = &mut fx.fb;
            let data = fb.load_field(&desc, IrType::Ptr, base, DESC_DATA);
            let mut offset = fb.load_field(&desc, IrType::I32, base, DESC_OFFSET);
            let dims = fb.struct_gep(&desc, base, DESC_DIMS);
            for (k, &sub) in subscripts.iter().enumerate() {
                let k = fb.const_i32(i32::try_from(k).unwrap_or(i32::MAX));
                let dim = fb.element_ptr(&dim_ty, dims, k);
                let lower = fb.load_field(&dim_ty, IrType::I32, dim, DIM_LOWER);
                let stride = fb.load_field(&dim_ty, IrType::I32, dim, DIM_STRIDE);
                let rel = fb.sub(sub, lower);
                let scaled = fb.mul(rel, stride);
                offset = fb.add(offset, scaled);
            }
            return Ok(fb.element_ptr(&element, data, offset));
        }

        let data = match arr.physical {
            ArrayPhysicalType::FixedSizeArray | ArrayPhysicalType::SimdArray => base,
            _ => fx.fb.load(IrType::Ptr, base),
        };
        // The extent of the last dimension never enters the offset, so
        // assumed-size arrays index fine.
        let mut strides = Vec::with_capacity(subscripts.len());
        let mut stride = 1i64;
        for (k, dim) in arr.dims.iter().enumerate() {
            let lower = match dim.start {
                Some(s) => self.unit.exprs.int_constant(s),
                None => Some(1),
            };
            let Some(lower) = lower else {
                return Err(CodegenError::unsupported("array with a non-constant lower bound", span));
            };
            strides.push((lower, stride));
            if k + 1 < arr.dims.len() {
                let upper = dim
                    .end
                    .and_then(|e| self.unit.exprs.int_constant(e))
                    .ok_or_else(|| CodegenError::unsupported("array with non-constant extents", span))?;
                stride *= (upper - lower + 1).max(0);
            }
        }
        let fb = &mut fx.fb;
        let mut offset = fb.const_i32(0);
        for (&sub, &(lower, stride)) in subscripts.iter().zip(&strides) {
            let rel = fb.add_const(sub, -lower);
            let stride = fb.const_i32(i32::try_from(stride).unwrap_or(i32::MAX));
            let scaled = fb.mul(rel, stride);
            offset = fb.add(offset, scaled);
        }
        Ok(fb.element_ptr(&element, data, offset))
    }

    /// `size(array)` or `size(array, dim)` with a constant `dim`.
    fn array_size(
        &mut self,
        fx: &mut FnLowering,
        array: ExprId,
        dim: Option<ExprId>,
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let Some(arr) = self.ty(array).as_array() else {
            return Err(CodegenError::internal("size of a non-array"));
        };
        let result = self.storage_type(ty, span)?;
        let dim = match dim {
            Some(d) => {
                let k = self
                    .unit
                    .exprs
                    .int_constant(d)
                    .ok_or_else(|| CodegenError::not_implemented("size with a non-constant dim", span))?;
                let k = usize::try_from(k)
                    .ok()
                    .filter(|k| (1..=arr.rank()).contains(k))
                    .ok_or_else(|| {
                        CodegenError::unsupported(format!("dim {k} of a rank {} array", arr.rank()), span)
                    })?;
                Some(k - 1)
            }
            None => None,
        };

        if arr.physical == ArrayPhysicalType::DescriptorArray {
            return self.descriptor_size(fx, array, arr, dim, result);
        }
        let bounds = self
            .constant_bounds(arr)
            .ok_or_else(|| CodegenError::unsupported("size of an array with non-constant extents", span))?;
        let n = match dim {
            Some(k) => bounds[k].1,
            None => bounds.iter().map(|(_, extent)| extent).product(),
        };
        Ok(fx.fb.const_int(result, n))
    }

    fn descriptor_size(
        &mut self,
        fx: &mut FnLowering,
        array: ExprId,
        arr: &ArrayType,
        dim: Option<usize>,
        result: IrType,
    ) -> CodegenResult<ValueId> {
        let desc = self.array_descriptor(arr.rank());
        let dim_ty = self.dimension_descriptor();
        let base = self.lower_addr(fx, array)?;
        let fb = &mut fx.fb;
        let dims = fb.struct_gep(&desc, base, DESC_DIMS);
        let length = |fb: &mut FunctionBuilder, k: usize| {
            let k = fb.const_i32(i32::try_from(k).unwrap_or(i32::MAX));
            let entry = fb.element_ptr(&dim_ty, dims, k);
            fb.load_field(&dim_ty, IrType::I32, entry, DIM_LENGTH)
        };
        let n = match dim {
            Some(k) => length(fb, k),
            None => {
                let mut n = fb.const_i32(1);
                for k in 0..arr.rank() {
                    let len = length(fb, k);
                    n = fb.mul(n, len);
                }
                n
            }
        };
        Ok(fb.int_cast(n, result, true))
    }
}

/// Real and imaginary parts of a complex value.
pub(super) fn parts(fb: &mut FunctionBuilder, v: ValueId) -> (ValueId, ValueId) {
    (fb.extract_value(v, 0), fb.extract_value(v, 1))
}

/// `base ** exp` for integers of one type. A negative exponent truncates
/// to zero unless `|base| == 1`.
fn int_pow(fb: &mut FunctionBuilder, base: ValueId, exp: ValueId) -> ValueId {
    let ty = fb.type_of(base).clone();
    let zero = fb.const_int(ty.clone(), 0);
    let one = fb.const_int(ty.clone(), 1);
    let negative = fb.icmp_slt(exp, zero);
    let flipped = fb.neg(exp);
    let count = fb.select(negative, flipped, exp);
    let acc = fb.alloca_init(one);
    let left = fb.alloca_init(count);

    let head = fb.append_block("pow.head");
    let body = fb.append_block("pow.body");
    let done = fb.append_block("pow.end");
    fb.br(head);

    fb.position_at_end(head);
    let n = fb.load(ty.clone(), left);
    let more = fb.icmp_sgt(n, zero);
    fb.cond_br(more, body, done);

    fb.position_at_end(body);
    let current = fb.load(ty.clone(), acc);
    let next = fb.mul(current, base);
    fb.store(next, acc);
    let n = fb.load(ty.clone(), left);
    let n = fb.add_const(n, -1);
    fb.store(n, left);
    fb.br(head);

    fb.position_at_end(done);
    let power = fb.load(ty.clone(), acc);
    let minus_one = fb.const_int(ty, -1);
    let is_one = fb.icmp_eq(base, one);
    let is_minus_one = fb.icmp_eq(base, minus_one);
    let unit = fb.or(is_one, is_minus_one);
    let not_unit = fb.not(unit);
    let vanishes = fb.and(negative, not_unit);
    fb.select(vanishes, zero, power)
}

fn signed_predicate(op: CmpOp) -> IntPredicate {
    match op {
        CmpOp::Eq => IntPredicate::Eq,
        CmpOp::NotEq => IntPredicate::Ne,
        CmpOp::Lt => IntPredicate::Slt,
        CmpOp::LtE => IntPredicate::Sle,
        CmpOp::Gt => IntPredicate::Sgt,
        CmpOp::GtE => IntPredicate::Sge,
    }
}

fn unsigned_predicate(op: CmpOp) -> IntPredicate {
    match op {
        CmpOp::Eq => IntPredicate::Eq,
        CmpOp::NotEq => IntPredicate::Ne,
        CmpOp::Lt => IntPredicate::Ult,
        CmpOp::LtE => IntPredicate::Ule,
        CmpOp::Gt => IntPredicate::Ugt,
        CmpOp::GtE => IntPredicate::Uge,
    }
}

fn float_predicate(op: CmpOp) -> FloatPredicate {
    match op {
        CmpOp::Eq => FloatPredicate::Oeq,
        CmpOp::NotEq => FloatPredicate::Une,
        CmpOp::Lt => FloatPredicate::Olt,
        CmpOp::LtE => FloatPredicate::Ole,
        CmpOp::Gt => FloatPredicate::Ogt,
        CmpOp::GtE => FloatPredicate::Oge,
    }
}
