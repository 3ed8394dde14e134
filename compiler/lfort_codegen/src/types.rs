//! C++ spellings of ASR types and variable declarations.
//!
//! Scalars map to builtin types, characters to `std::string`, complex to
//! `std::complex`. Arrays become `Kokkos::View`s: compile-time extents are
//! written into the view type (`double[10]`), all other extents become
//! runtime dimensions (`*`) passed to the view constructor.

use lfort_ir::{Dimension, ExprId, ExprKind, Intent, Span, Storage, StructKind, SymbolId, Ty};

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::expr::emit_expr;
use crate::precedence::{left_operand, ADDITIVE};

/// Procedures that would collide with the C++ entry point are renamed.
pub fn procedure_name(name: &str) -> String {
    if name == "main" {
        "_lfort_main".to_string()
    } else {
        name.to_string()
    }
}

/// C++ type of a scalar (or pointer to scalar).
pub fn scalar_type(ctx: &CodegenContext<'_>, ty: &Ty, span: Span) -> CodegenResult<String> {
    let name = match ty {
        Ty::Integer { kind: 8 } => "long long".to_string(),
        Ty::Integer { .. } | Ty::Enum(_) => "int".to_string(),
        Ty::UnsignedInteger { kind: 8 } => "unsigned long long".to_string(),
        Ty::UnsignedInteger { .. } => "unsigned int".to_string(),
        Ty::Real { kind: 4 } => "float".to_string(),
        Ty::Real { .. } => "double".to_string(),
        Ty::Complex { kind: 4 } => "std::complex<float>".to_string(),
        Ty::Complex { .. } => "std::complex<double>".to_string(),
        Ty::Logical { .. } => "bool".to_string(),
        Ty::Character { .. } => "std::string".to_string(),
        Ty::Struct(id) | Ty::Union(id) | Ty::Class(id) => ctx.name(*id).to_string(),
        Ty::CPtr => "void *".to_string(),
        Ty::Pointer(inner) if !inner.is_array() => {
            format!("{} *", scalar_type(ctx, inner, span)?)
        }
        Ty::Allocatable(inner) if !inner.is_array() => scalar_type(ctx, inner, span)?,
        other => {
            return Err(CodegenError::unsupported(
                format!(
                    "Type '{}' not supported",
                    other.type_code(&ctx.unit.symbols)
                ),
                span,
            ))
        }
    };
    Ok(name)
}

/// View dimension suffix (`*`, `[10]`, `*[3]`) and the runtime extents to
/// pass to the view constructor.
///
/// Kokkos requires every runtime dimension to precede the compile-time
/// ones, so a constant extent left of a runtime extent is made runtime too.
pub fn convert_dims(
    ctx: &mut CodegenContext<'_>,
    dims: &[Dimension],
    span: Span,
) -> CodegenResult<(String, Vec<String>)> {
    enum Extent {
        Fixed(i64),
        Runtime(String),
        Deferred,
    }
    let mut extents = Vec::with_capacity(dims.len());
    for dim in dims {
        let start = match dim.start {
            Some(s) => ctx.unit.exprs.int_constant(s),
            None => Some(1),
        };
        let extent = match (dim.start, dim.end) {
            (None, None) | (Some(_), None) => Extent::Deferred,
            (_, Some(end)) => match (start, ctx.unit.exprs.int_constant(end)) {
                (Some(s), Some(e)) => Extent::Fixed((e - s + 1).max(0)),
                (Some(1), None) => Extent::Runtime(emit_expr(ctx, end)?.text),
                (Some(s), None) => {
                    let end = emit_expr(ctx, end)?;
                    let end = left_operand(&end, ADDITIVE);
                    Extent::Runtime(if s < 1 {
                        format!("{end} + {}", 1 - s)
                    } else {
                        format!("{end} - {}", s - 1)
                    })
                }
                (None, _) => {
                    return Err(CodegenError::not_implemented(
                        "Symbolic lower bounds are not implemented",
                        span,
                    ))
                }
            },
        };
        extents.push(extent);
    }

    let last_runtime = extents
        .iter()
        .rposition(|e| !matches!(e, Extent::Fixed(_)));
    let mut suffix = String::new();
    let mut runtime = Vec::new();
    for (i, extent) in extents.into_iter().enumerate() {
        let force_runtime = last_runtime.is_some_and(|last| i <= last);
        match extent {
            Extent::Fixed(n) if force_runtime => {
                suffix.push('*');
                runtime.push(n.to_string());
            }
            Extent::Fixed(n) => suffix.push_str(&format!("[{n}]")),
            Extent::Runtime(text) => {
                suffix.push('*');
                runtime.push(text);
            }
            Extent::Deferred => suffix.push('*'),
        }
    }
    Ok((suffix, runtime))
}

/// Declaration of variable `sym` as a local, a dummy argument or a global.
pub fn variable_decl(ctx: &mut CodegenContext<'_>, sym: SymbolId) -> CodegenResult<String> {
    let var = ctx.variable(sym)?;
    let span = var
        .init
        .map_or(Span::DUMMY, |e| ctx.unit.exprs.span(e));
    let use_ref = matches!(var.intent, Intent::Out | Intent::InOut);
    let dummy = var.intent.is_argument();
    let name = var.name.as_str();

    if let Some(arr) = var.ty.as_array() {
        let element = scalar_type(ctx, &arr.element, span)?;
        if dummy {
            let suffix = "*".repeat(arr.rank());
            let constness = if use_ref { "" } else { "const " };
            return Ok(format!(
                "const Kokkos::View<{constness}{element}{suffix}> &{name}"
            ));
        }
        let (suffix, runtime) = convert_dims(ctx, &arr.dims, span)?;
        let mut decl = format!("Kokkos::View<{element}{suffix}> {name}(\"{name}\"");
        for extent in runtime {
            decl.push_str(", ");
            decl.push_str(&extent);
        }
        decl.push(')');
        return Ok(decl);
    }

    let ty = scalar_type(ctx, &var.ty, span)?;
    let reference = if use_ref { "&" } else { "" };
    let mut decl = if ty.ends_with('*') {
        format!("{ty}{reference}{name}")
    } else {
        format!("{ty} {reference}{name}")
    };
    match var.storage {
        Storage::Save if !dummy => decl.insert_str(0, "static "),
        Storage::Parameter => decl.insert_str(0, "const "),
        _ => {}
    }
    if !dummy {
        if let Some(init) = var.init.or(var.value) {
            let value = emit_expr(ctx, init)?;
            decl.push('=');
            decl.push_str(&value.text);
        }
    }
    Ok(decl)
}

/// `double f(int x, double &y)` or `void s(...)`.
pub fn function_signature(ctx: &mut CodegenContext<'_>, func: SymbolId) -> CodegenResult<String> {
    let f = ctx.function(func)?;
    let ret = match f.return_var {
        Some(r) => {
            let ty = &ctx.variable(r)?.ty;
            if ty.is_array() {
                return Err(CodegenError::unsupported(
                    "Return type not supported",
                    Span::DUMMY,
                ));
            }
            scalar_type(ctx, ty, Span::DUMMY)?
        }
        None => "void".to_string(),
    };
    let mut sig = format!("{ret} {}(", procedure_name(&f.name));
    for (i, arg) in f.args.iter().enumerate() {
        if i > 0 {
            sig.push_str(", ");
        }
        sig.push_str(&variable_decl(ctx, *arg)?);
    }
    sig.push(')');
    Ok(sig)
}

/// `struct Name : public Parent { members };`
pub fn struct_definition(ctx: &mut CodegenContext<'_>, id: SymbolId) -> CodegenResult<String> {
    let Some(st) = ctx.unit.symbols.struct_type(id) else {
        return Err(CodegenError::internal(format!(
            "`{}` is not a derived type",
            ctx.name(id)
        )));
    };
    let keyword = match st.kind {
        StructKind::Union => "union",
        _ => "struct",
    };
    let mut out = format!("{keyword} {}", st.name);
    if let Some(parent) = st.parent {
        out.push_str(" : public ");
        out.push_str(ctx.name(parent));
    }
    out.push_str(" {\n");
    for member in ctx.unit.symbols.struct_members(id) {
        let var = ctx.variable(member)?;
        if var.ty.is_array() {
            return Err(CodegenError::not_implemented(
                format!("Array member `{}` of derived type `{}`", var.name, st.name),
                Span::DUMMY,
            ));
        }
        let ty = scalar_type(ctx, &var.ty, Span::DUMMY)?;
        out.push_str(&format!("    {ty} {};\n", var.name));
    }
    out.push_str("};\n");
    Ok(out)
}

/// Whether `expr` names a pointer variable, for `->` member access.
pub fn is_pointer_var(ctx: &CodegenContext<'_>, expr: ExprId) -> bool {
    match &ctx.expr(expr).kind {
        ExprKind::Var(sym) => ctx
            .unit
            .symbols
            .variable(*sym)
            .is_some_and(|v| matches!(v.ty, Ty::Pointer(_))),
        _ => false,
    }
}

#[cfg(test)]
mod tests;
