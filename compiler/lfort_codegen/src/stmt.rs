//! Statement emission.

use lfort_ir::{ensure_sufficient_stack, DoLoopHead, ExprKind, Span, Stmt, StmtKind};

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::expr::{emit_call_args, emit_expr};
use crate::precedence::{left_operand, right_operand, Assoc, RELATIONAL, SHIFT};
use crate::types::procedure_name;

/// Emit every statement of `body` at the current indentation.
pub fn emit_body(ctx: &mut CodegenContext<'_>, body: &[Stmt]) -> CodegenResult<()> {
    for stmt in body {
        emit_stmt(ctx, stmt)?;
    }
    Ok(())
}

pub fn emit_stmt(ctx: &mut CodegenContext<'_>, stmt: &Stmt) -> CodegenResult<()> {
    ensure_sufficient_stack(|| emit_stmt_inner(ctx, stmt))
}

fn emit_stmt_inner(ctx: &mut CodegenContext<'_>, stmt: &Stmt) -> CodegenResult<()> {
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Assignment { target, value } => {
            let t = emit_expr(ctx, *target)?;
            let v = emit_expr(ctx, *value)?;
            ctx.writeln(&format!("{} = {};", t.text, v.text));
        }
        StmtKind::Print { values } => {
            let mut line = String::from("std::cout");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    line.push_str(" << \" \"");
                }
                let v = emit_expr(ctx, *value)?;
                line.push_str(" << ");
                line.push_str(&left_operand(&v, SHIFT));
            }
            line.push_str(" << std::endl;");
            ctx.writeln(&line);
        }
        StmtKind::If { test, body, orelse } => {
            let t = emit_expr(ctx, *test)?;
            ctx.writeln(&format!("if ({}) {{", t.text));
            emit_block(ctx, body)?;
            if orelse.is_empty() {
                ctx.writeln("}");
            } else {
                ctx.writeln("} else {");
                emit_block(ctx, orelse)?;
                ctx.writeln("}");
            }
        }
        StmtKind::WhileLoop { test, body } => {
            let t = emit_expr(ctx, *test)?;
            ctx.writeln(&format!("while ({}) {{", t.text));
            emit_block(ctx, body)?;
            ctx.writeln("}");
        }
        StmtKind::DoLoop { head, body } => emit_do_loop(ctx, head, body, span)?,
        StmtKind::DoConcurrentLoop { head, body } => emit_do_concurrent(ctx, head, body, span)?,
        StmtKind::Exit => ctx.writeln("break;"),
        StmtKind::Cycle => ctx.writeln("continue;"),
        StmtKind::Return => {
            let ret = ctx
                .current_function
                .and_then(|f| ctx.unit.symbols.function(f))
                .and_then(|f| f.return_var);
            match ret {
                Some(r) => {
                    let name = ctx.name(r);
                    ctx.writeln(&format!("return {name};"));
                }
                None => ctx.writeln("return;"),
            }
        }
        StmtKind::Stop { code } => {
            let code = match code {
                Some(c) => emit_expr(ctx, *c)?.text,
                None => "0".to_string(),
            };
            ctx.writeln(&format!("exit({code});"));
        }
        StmtKind::ErrorStop { .. } => {
            ctx.writeln("std::cerr << \"ERROR STOP\" << std::endl;");
            ctx.writeln("exit(1);");
        }
        StmtKind::Assert { test, msg } => {
            let t = emit_expr(ctx, *test)?;
            match msg {
                Some(m) => {
                    let m = emit_expr(ctx, *m)?;
                    ctx.writeln(&format!("assert (({}, {}));", m.text, t.text));
                }
                None => ctx.writeln(&format!("assert ({});", t.text)),
            }
        }
        StmtKind::SubroutineCall { sub, args } => {
            let name = procedure_name(ctx.name(*sub));
            let args = emit_call_args(ctx, args, span)?;
            ctx.writeln(&format!("{name}({args});"));
        }
        StmtKind::ListAppend { .. }
        | StmtKind::ListInsert { .. }
        | StmtKind::ListRemove { .. }
        | StmtKind::ListReverse(_)
        | StmtKind::ListClear(_)
        | StmtKind::DictInsert { .. }
        | StmtKind::SetAdd { .. }
        | StmtKind::SetRemove { .. }
        | StmtKind::SetDiscard { .. } => {
            return Err(CodegenError::not_implemented(
                format!(
                    "{} is not implemented by the C++ backend",
                    container_stmt_name(&stmt.kind)
                ),
                span,
            ))
        }
    }
    Ok(())
}

fn emit_block(ctx: &mut CodegenContext<'_>, body: &[Stmt]) -> CodegenResult<()> {
    ctx.indent();
    let result = emit_body(ctx, body);
    ctx.dedent();
    result
}

/// `for (i=s; i<=e; i++) {`, with the comparison and update chosen from
/// the sign of the constant increment.
fn emit_do_loop(
    ctx: &mut CodegenContext<'_>,
    head: &DoLoopHead,
    body: &[Stmt],
    span: Span,
) -> CodegenResult<()> {
    let step = match head.increment {
        None => 1,
        Some(inc) => ctx.unit.exprs.int_constant(inc).ok_or_else(|| {
            CodegenError::not_implemented("Do loop increment type not supported", span)
        })?,
    };
    if step == 0 {
        return Err(CodegenError::unsupported(
            "Do loop increment must not be zero",
            span,
        ));
    }
    let var = emit_expr(ctx, head.var)?.text;
    let start = emit_expr(ctx, head.start)?.text;
    let end = emit_expr(ctx, head.end)?;
    let end = right_operand(&end, RELATIONAL, Assoc::LeftOnly);
    let (cmp, update) = match step {
        1 => ("<=", "++".to_string()),
        -1 => (">=", "--".to_string()),
        n if n > 0 => ("<=", format!("+={n}")),
        n => (">=", format!("-={}", -n)),
    };
    ctx.writeln(&format!(
        "for ({var}={start}; {var}{cmp}{end}; {var}{update}) {{"
    ));
    emit_block(ctx, body)?;
    ctx.writeln("}");
    Ok(())
}

/// `do concurrent` becomes a Kokkos parallel loop over `[start, end]`; the
/// loop variable is the lambda parameter and is not declared as a local.
fn emit_do_concurrent(
    ctx: &mut CodegenContext<'_>,
    head: &DoLoopHead,
    body: &[Stmt],
    span: Span,
) -> CodegenResult<()> {
    if !ctx.options.kokkos {
        return emit_do_loop(ctx, head, body, span);
    }
    if let Some(inc) = head.increment {
        if ctx.unit.exprs.int_constant(inc) != Some(1) {
            return Err(CodegenError::not_implemented(
                "Do concurrent increment other than 1 is not implemented",
                span,
            ));
        }
    }
    let &ExprKind::Var(sym) = &ctx.expr(head.var).kind else {
        return Err(CodegenError::internal("do concurrent variable is not a name"));
    };
    ctx.info_mut(sym).needs_declaration = false;
    let var = ctx.name(sym);
    let start = emit_expr(ctx, head.start)?.text;
    let end = emit_expr(ctx, head.end)?;
    let end = left_operand(&end, crate::precedence::ADDITIVE);
    ctx.writeln(&format!(
        "Kokkos::parallel_for(Kokkos::RangePolicy<Kokkos::DefaultExecutionSpace>({start}, {end}+1), KOKKOS_LAMBDA(const long {var}) {{"
    ));
    emit_block(ctx, body)?;
    ctx.writeln("});");
    Ok(())
}

fn container_stmt_name(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::ListAppend { .. } => "ListAppend",
        StmtKind::ListInsert { .. } => "ListInsert",
        StmtKind::ListRemove { .. } => "ListRemove",
        StmtKind::ListReverse(_) => "ListReverse",
        StmtKind::ListClear(_) => "ListClear",
        StmtKind::DictInsert { .. } => "DictInsert",
        StmtKind::SetAdd { .. } => "SetAdd",
        StmtKind::SetRemove { .. } => "SetRemove",
        _ => "SetDiscard",
    }
}
