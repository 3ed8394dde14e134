//! Statement lowering.

use lfort_ir::{DoLoopHead, ExprId, ExprKind, Span, Stmt, StmtKind, Ty};

use super::{FnLowering, LoopTargets};
use crate::containers::{move_bytes, HelperOp};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::IrType;
use crate::runtime;

impl CodegenCx<'_> {
    /// Lower `body` into the current block. Statements after one that
    /// leaves the block (`return`, `exit`, `stop`, ...) are unreachable
    /// and skipped.
    pub(crate) fn lower_body(&mut self, fx: &mut FnLowering, body: &[Stmt]) -> CodegenResult<()> {
        for stmt in body {
            if fx.fb.is_terminated() {
                break;
            }
            self.lower_stmt(fx, stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, fx: &mut FnLowering, stmt: &Stmt) -> CodegenResult<()> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Assignment { target, value } => {
                if let ExprKind::ListItem { list, index } = self.expr(*target).kind {
                    let container = self.lower_addr(fx, list)?;
                    let index = self.index_i32(fx, index)?;
                    let item = self.operand_addr(fx, *value, span)?;
                    let write = self.helper(self.ty(list), HelperOp::Write, span)?;
                    write.call(&mut fx.fb, &[container, index, item]);
                    return Ok(());
                }
                let ty = self.ty(*target);
                let dst = self.lower_addr(fx, *target)?;
                self.assign_to(fx, ty, dst, *value, span)
            }
            StmtKind::Print { values } => self.lower_print(fx, values, span),
            StmtKind::If { test, body, orelse } => {
                let cond = self.lower_value(fx, *test)?;
                let then_block = fx.fb.append_block("if.then");
                let else_block = fx.fb.append_block("if.else");
                let merge = fx.fb.append_block("if.end");
                fx.fb.cond_br(cond, then_block, else_block);
                fx.fb.position_at_end(then_block);
                self.lower_body(fx, body)?;
                fx.fb.br_if_open(merge);
                fx.fb.position_at_end(else_block);
                self.lower_body(fx, orelse)?;
                fx.fb.br_if_open(merge);
                fx.fb.position_at_end(merge);
                Ok(())
            }
            StmtKind::WhileLoop { test, body } => {
                let head = fx.fb.append_block("while.head");
                let body_block = fx.fb.append_block("while.body");
                let done = fx.fb.append_block("while.end");
                fx.fb.br(head);
                fx.fb.position_at_end(head);
                let cond = self.lower_value(fx, *test)?;
                fx.fb.cond_br(cond, body_block, done);
                fx.fb.position_at_end(body_block);
                self.loop_body(fx, LoopTargets { next: head, done }, body)?;
                fx.fb.br_if_open(head);
                fx.fb.position_at_end(done);
                Ok(())
            }
            // Iterations run in order; nothing here depends on them being
            // independent.
            StmtKind::DoLoop { head, body } | StmtKind::DoConcurrentLoop { head, body } => {
                self.do_loop(fx, head, body, span)
            }
            StmtKind::Exit | StmtKind::Cycle => {
                let Some(targets) = fx.loops.last().copied() else {
                    return Err(CodegenError::unsupported("`exit` or `cycle` outside a loop", span));
                };
                let dest = if matches!(stmt.kind, StmtKind::Exit) {
                    targets.done
                } else {
                    targets.next
                };
                fx.fb.br(dest);
                Ok(())
            }
            StmtKind::Return => {
                fx.fb.br(fx.epilogue);
                Ok(())
            }
            StmtKind::Stop { code } => {
                self.print_literal(&mut fx.fb, "STOP\n");
                let status = match code {
                    Some(code) if self.ty(*code).is_integer() => {
                        let v = self.lower_value(fx, *code)?;
                        fx.fb.int_cast(v, IrType::I32, true)
                    }
                    _ => fx.fb.const_i32(0),
                };
                fx.fb.call(runtime::EXIT, IrType::Void, &[status]);
                fx.fb.unreachable();
                Ok(())
            }
            StmtKind::ErrorStop { .. } => {
                self.print_literal(&mut fx.fb, "ERROR STOP\n");
                exit_failure(fx);
                Ok(())
            }
            StmtKind::Assert { test, msg } => {
                let cond = self.lower_value(fx, *test)?;
                let fail = fx.fb.append_block("assert.fail");
                let ok = fx.fb.append_block("assert.ok");
                fx.fb.cond_br(cond, ok, fail);
                fx.fb.position_at_end(fail);
                match msg {
                    Some(msg) if self.ty(*msg).is_character() => {
                        let text = self.lower_value(fx, *msg)?;
                        self.printf(&mut fx.fb, "Assertion failed: %s\n", &[text]);
                    }
                    _ => self.print_literal(&mut fx.fb, "Assertion failed\n"),
                }
                exit_failure(fx);
                fx.fb.position_at_end(ok);
                Ok(())
            }
            StmtKind::SubroutineCall { sub, args } => {
                self.lower_call(fx, *sub, args, span)?;
                Ok(())
            }
            StmtKind::ListAppend { list: c, element: el }
            | StmtKind::ListRemove { list: c, element: el }
            | StmtKind::SetAdd { set: c, element: el }
            | StmtKind::SetRemove { set: c, element: el }
            | StmtKind::SetDiscard { set: c, element: el } => {
                let op = match stmt.kind {
                    StmtKind::ListAppend { .. } => HelperOp::Append,
                    StmtKind::SetAdd { .. } => HelperOp::Add,
                    StmtKind::SetDiscard { .. } => HelperOp::Discard,
                    _ => HelperOp::Remove,
                };
                let container = self.lower_addr(fx, *c)?;
                let el = if matches!(op, HelperOp::Append | HelperOp::Add) {
                    self.operand_addr(fx, *el, span)?
                } else {
                    self.lower_addr(fx, *el)?
                };
                let helper = self.helper(self.ty(*c), op, span)?;
                helper.call(&mut fx.fb, &[container, el]);
                Ok(())
            }
            StmtKind::ListInsert { list, index, element } => {
                let container = self.lower_addr(fx, *list)?;
                let index = self.index_i32(fx, *index)?;
                let el = self.operand_addr(fx, *element, span)?;
                let insert = self.helper(self.ty(*list), HelperOp::Insert, span)?;
                insert.call(&mut fx.fb, &[container, index, el]);
                Ok(())
            }
            StmtKind::ListReverse(list) | StmtKind::ListClear(list) => {
                let op = if matches!(stmt.kind, StmtKind::ListReverse(_)) {
                    HelperOp::Reverse
                } else {
                    HelperOp::Clear
                };
                let container = self.lower_addr(fx, *list)?;
                let helper = self.helper(self.ty(*list), op, span)?;
                helper.call(&mut fx.fb, &[container]);
                Ok(())
            }
            StmtKind::DictInsert { dict, key, value } => {
                let container = self.lower_addr(fx, *dict)?;
                let key = self.operand_addr(fx, *key, span)?;
                let value = self.operand_addr(fx, *value, span)?;
                let insert = self.helper(self.ty(*dict), HelperOp::Insert, span)?;
                insert.call(&mut fx.fb, &[container, key, value]);
                Ok(())
            }
        }
    }

    fn loop_body(&mut self, fx: &mut FnLowering, targets: LoopTargets, body: &[Stmt]) -> CodegenResult<()> {
        fx.loops.push(targets);
        let lowered = self.lower_body(fx, body);
        fx.loops.pop();
        lowered
    }

    /// `do v = start, end, step`: the step must be a nonzero constant; its
    /// sign picks the exit comparison. `end` is evaluated once.
    fn do_loop(&mut self, fx: &mut FnLowering, head: &DoLoopHead, body: &[Stmt], span: Span) -> CodegenResult<()> {
        let step = match head.increment {
            None => 1,
            Some(inc) => self.unit.exprs.int_constant(inc).ok_or_else(|| {
                CodegenError::not_implemented("do loop with a non-constant increment", span)
            })?,
        };
        if step == 0 {
            return Err(CodegenError::unsupported("do loop with a zero increment", span));
        }
        let counter = self.storage_type(self.ty(head.var), span)?;
        let var = self.lower_addr(fx, head.var)?;
        let start = self.lower_value(fx, head.start)?;
        let end = self.lower_value(fx, head.end)?;
        let fb = &mut fx.fb;
        let start = fb.int_cast(start, counter.clone(), true);
        let end = fb.int_cast(end, counter.clone(), true);
        let end = fb.alloca_init(end);
        fb.store(start, var);

        let check = fb.append_block("do.head");
        let body_block = fb.append_block("do.body");
        let latch = fb.append_block("do.latch");
        let done = fb.append_block("do.end");
        fb.br(check);

        fb.position_at_end(check);
        let i = fb.load(counter.clone(), var);
        let last = fb.load(counter.clone(), end);
        let more = if step > 0 {
            fb.icmp_sle(i, last)
        } else {
            fb.icmp_sge(i, last)
        };
        fb.cond_br(more, body_block, done);

        fb.position_at_end(body_block);
        self.loop_body(fx, LoopTargets { next: latch, done }, body)?;
        fx.fb.br_if_open(latch);

        fx.fb.position_at_end(latch);
        let i = fx.fb.load(counter, var);
        let next = fx.fb.add_const(i, step);
        fx.fb.store(next, var);
        fx.fb.br(check);

        fx.fb.position_at_end(done);
        Ok(())
    }

    /// Pointer to a value an insertion helper copies in. A place may live
    /// inside the container being grown, so it is copied out first.
    fn operand_addr(&mut self, fx: &mut FnLowering, id: ExprId, span: Span) -> CodegenResult<crate::ir::ValueId> {
        let src = self.lower_addr(fx, id)?;
        if !is_place(&self.expr(id).kind) {
            return Ok(src);
        }
        let ty = self.ty(id);
        let tmp = self.temporary(fx, ty, span)?;
        self.copy_value(&mut fx.fb, ty, src, tmp, span)?;
        Ok(tmp)
    }

    /// Assign the value of `value` to the initialised storage of type `ty`
    /// at `dst`. Strings and containers get private copies; the old string
    /// is freed after the new one is made, so `s = s` is safe.
    pub(super) fn assign_to(
        &mut self,
        fx: &mut FnLowering,
        ty: &Ty,
        dst: crate::ir::ValueId,
        value: ExprId,
        span: Span,
    ) -> CodegenResult<()> {
        if ty.is_character() {
            let v = self.lower_value(fx, value)?;
            let dup = self.helper(&Ty::string(), HelperOp::Dup, span)?;
            let copy = dup.call(&mut fx.fb, &[v]);
            let old = fx.fb.load(IrType::Ptr, dst);
            fx.fb.call(runtime::FREE, IrType::Void, &[old]);
            fx.fb.store(copy, dst);
            return Ok(());
        }
        if ty.needs_deepcopy() {
            let size = self.size_of(ty, span)?;
            let src = self.lower_addr(fx, value)?;
            if is_place(&self.expr(value).kind) {
                // Copy out first: the source may alias the target.
                let tmp = self.temporary(fx, ty, span)?;
                self.copy_value(&mut fx.fb, ty, src, tmp, span)?;
                move_bytes(&mut fx.fb, dst, tmp, size);
            } else {
                move_bytes(&mut fx.fb, dst, src, size);
            }
            return Ok(());
        }
        match ty.as_array() {
            Some(arr) if arr.physical == lfort_ir::ArrayPhysicalType::FixedSizeArray => {
                let size = self.size_of(ty, span)?;
                let src = self.lower_addr(fx, value)?;
                move_bytes(&mut fx.fb, dst, src, size);
                Ok(())
            }
            Some(_) => Err(CodegenError::not_implemented("whole-array assignment", span)),
            None => {
                let v = self.lower_value(fx, value)?;
                fx.fb.store(v, dst);
                Ok(())
            }
        }
    }
}

/// Expressions naming existing storage, as opposed to fresh temporaries.
fn is_place(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::Var(_)
            | ExprKind::ArrayItem { .. }
            | ExprKind::StructMember { .. }
            | ExprKind::ListItem { .. }
            | ExprKind::TupleItem { .. }
            | ExprKind::DictItem { .. }
    )
}

fn exit_failure(fx: &mut FnLowering) {
    let one = fx.fb.const_i32(1);
    fx.fb.call(runtime::EXIT, IrType::Void, &[one]);
    fx.fb.unreachable();
}
