//! Translation-unit driver.
//!
//! Output order: headers, helper templates, derived types, forward
//! declarations, then implementations (intrinsic modules in build order,
//! free procedures, remaining modules in build order, the program last).

use rustc_hash::FxHashSet;
use tracing::{debug, instrument};

use lfort_ir::{Abi, DefType, ScopeId, Symbol, SymbolId};

use crate::context::CodegenContext;
use crate::error::CodegenResult;
use crate::intrinsic::NATIVE_MODULE_FUNCTIONS;
use crate::stmt::emit_body;
use crate::types::{function_signature, struct_definition, variable_decl};

const HEADERS: &str = "#include <iostream>
#include <string>
#include <vector>
#include <cassert>
#include <cstdlib>
#include <cmath>
#include <complex>
#include <algorithm>
#include <type_traits>
#include <Kokkos_Core.hpp>
#include <lfortran_intrinsics.h>

template <typename T>
Kokkos::View<T*> from_std_vector(const std::vector<T> &v)
{
    Kokkos::View<T*> r(\"r\", v.size());
    for (size_t i=0; i < v.size(); i++) {
        r(i) = v[i];
    }
    return r;
}
";

/// Lower the whole unit held by `ctx` to one C++ source file.
#[instrument(level = "debug", skip_all, fields(items = ctx.unit.items().len()))]
pub fn lower_unit(ctx: &mut CodegenContext<'_>) -> CodegenResult<String> {
    let unit = ctx.unit;
    mark_intrinsic_functions(ctx);
    let order = unit.module_build_order()?;

    let structs = emit_struct_definitions(ctx)?;
    let declarations = emit_forward_declarations(ctx)?;

    let mut implementations = String::new();
    let (intrinsic, user): (Vec<SymbolId>, Vec<SymbolId>) = order
        .into_iter()
        .partition(|id| unit.symbols.module(*id).is_some_and(|m| m.intrinsic));
    for module in intrinsic {
        implementations.push_str(&emit_module(ctx, module)?);
    }
    for &item in unit.items() {
        if is_implementation(ctx, item) {
            implementations.push_str(&emit_procedure(ctx, item)?);
        }
    }
    for module in user {
        implementations.push_str(&emit_module(ctx, module)?);
    }
    for &item in unit.items() {
        if matches!(unit.symbols.get(item), Symbol::Program(_)) {
            implementations.push_str(&emit_program(ctx, item)?);
        }
    }

    let mut out = String::from(HEADERS);
    if !ctx.helpers().is_empty() {
        out.push_str("\n// Intrinsic helpers\n");
        for helper in ctx.helpers() {
            out.push_str(helper);
            out.push('\n');
        }
    }
    if !structs.is_empty() {
        out.push_str("\n// Derived types\n");
        out.push_str(&structs);
    }
    out.push_str("\n// Forward declarations\n");
    out.push_str(&declarations);
    out.push_str("\n// Implementations\n");
    out.push_str(&implementations);
    Ok(out)
}

/// Functions of intrinsic modules that lower to native C++ forms are
/// never emitted; calls to them are expanded in place.
fn mark_intrinsic_functions(ctx: &mut CodegenContext<'_>) {
    let unit = ctx.unit;
    for &item in unit.items() {
        let Some(module) = unit.symbols.module(item) else {
            continue;
        };
        if !module.intrinsic {
            continue;
        }
        for &sym in unit.symbols.scope(module.scope).symbols() {
            if unit.symbols.function(sym).is_some()
                && NATIVE_MODULE_FUNCTIONS.contains(&unit.symbols.name(sym))
            {
                ctx.info_mut(sym).intrinsic_function = true;
            }
        }
    }
}

fn is_implementation(ctx: &CodegenContext<'_>, sym: SymbolId) -> bool {
    ctx.unit
        .symbols
        .function(sym)
        .is_some_and(|f| f.deftype == DefType::Implementation)
        && !ctx.info(sym).intrinsic_function
}

/// Procedures declared directly in `scope`, in declaration order.
fn procedures_in(ctx: &CodegenContext<'_>, scope: ScopeId) -> Vec<SymbolId> {
    ctx.unit
        .symbols
        .scope(scope)
        .symbols()
        .iter()
        .copied()
        .filter(|s| ctx.unit.symbols.function(*s).is_some())
        .collect()
}

/// Derived types of every scope, parents before their extensions.
fn emit_struct_definitions(ctx: &mut CodegenContext<'_>) -> CodegenResult<String> {
    let unit = ctx.unit;
    let mut scopes = vec![unit.global_scope];
    for &item in unit.items() {
        match unit.symbols.get(item) {
            Symbol::Module(m) => scopes.push(m.scope),
            Symbol::Program(p) => scopes.push(p.scope),
            _ => {}
        }
    }
    let mut done = FxHashSet::default();
    let mut out = String::new();
    for scope in scopes {
        for &sym in unit.symbols.scope(scope).symbols() {
            emit_struct_with_parents(ctx, sym, &mut done, &mut out)?;
        }
    }
    Ok(out)
}

fn emit_struct_with_parents(
    ctx: &mut CodegenContext<'_>,
    sym: SymbolId,
    done: &mut FxHashSet<SymbolId>,
    out: &mut String,
) -> CodegenResult<()> {
    let Some(st) = ctx.unit.symbols.struct_type(sym) else {
        return Ok(());
    };
    if !done.insert(sym) {
        return Ok(());
    }
    if let Some(parent) = st.parent {
        emit_struct_with_parents(ctx, parent, done, out)?;
    }
    out.push_str(&struct_definition(ctx, sym)?);
    out.push('\n');
    Ok(())
}

fn emit_forward_declarations(ctx: &mut CodegenContext<'_>) -> CodegenResult<String> {
    let unit = ctx.unit;
    let mut out = String::new();
    let mut program_decls = String::new();
    for &item in unit.items() {
        match unit.symbols.get(item) {
            Symbol::Function(f) => {
                let sig = function_signature(ctx, item)?;
                match (f.deftype, f.abi) {
                    (DefType::Interface, Abi::BindC) => {
                        out.push_str(&format!("extern \"C\" {sig};\n"));
                    }
                    (DefType::Interface, _) => {}
                    (DefType::Implementation, _) => out.push_str(&format!("{sig};\n")),
                }
            }
            Symbol::Module(m) => {
                for sym in procedures_in(ctx, m.scope) {
                    if is_implementation(ctx, sym) {
                        let sig = function_signature(ctx, sym)?;
                        out.push_str(&format!("{sig};\n"));
                    }
                }
            }
            Symbol::Program(p) => {
                for sym in procedures_in(ctx, p.scope) {
                    if is_implementation(ctx, sym) {
                        let sig = function_signature(ctx, sym)?;
                        program_decls.push_str(&format!("{sig};\n"));
                    }
                }
            }
            _ => {}
        }
    }
    if !program_decls.is_empty() {
        out.push_str("namespace {\n");
        out.push_str(&program_decls);
        out.push_str("}\n");
    }
    Ok(out)
}

/// Module variables become globals, followed by the module's procedures.
#[instrument(level = "debug", skip_all, fields(name = ctx.name(id)))]
fn emit_module(ctx: &mut CodegenContext<'_>, id: SymbolId) -> CodegenResult<String> {
    let Some(module) = ctx.unit.symbols.module(id) else {
        return Ok(String::new());
    };
    let mut out = String::new();
    for &sym in ctx.unit.symbols.scope(module.scope).symbols() {
        if ctx.unit.symbols.variable(sym).is_some() {
            out.push_str(&variable_decl(ctx, sym)?);
            out.push_str(";\n");
        }
    }
    if !out.is_empty() {
        out.push('\n');
    }
    for sym in procedures_in(ctx, module.scope) {
        if is_implementation(ctx, sym) {
            out.push_str(&emit_procedure(ctx, sym)?);
        }
    }
    Ok(out)
}

/// `sig\n{\n<declarations><body>}\n\n`.
///
/// The body is generated before the declarations so that locals bound by
/// a parallel loop can opt out of being declared.
#[instrument(level = "debug", skip_all, fields(name = ctx.name(id)))]
fn emit_procedure(ctx: &mut CodegenContext<'_>, id: SymbolId) -> CodegenResult<String> {
    let func = ctx.function(id)?;
    let sig = function_signature(ctx, id)?;
    let outer = ctx.current_function.replace(id);

    ctx.indent();
    let body = ctx.capture(|ctx| {
        emit_body(ctx, &func.body)?;
        if let Some(ret) = func.return_var {
            if !func.body.last().is_some_and(lfort_ir::Stmt::is_return) {
                let name = ctx.name(ret);
                ctx.writeln(&format!("return {name};"));
            }
        }
        Ok(())
    });
    let decls = body.and_then(|body| {
        let decls = local_declarations(ctx, func.scope, &func.args)?;
        Ok((decls, body))
    });
    ctx.dedent();
    ctx.current_function = outer;
    let (decls, body) = decls?;

    debug!(bytes = body.len(), "emitted procedure body");
    Ok(format!("{sig}\n{{\n{decls}{body}}}\n\n"))
}

/// Declarations of the locals of `scope` still needing one, at the
/// current indentation.
fn local_declarations(
    ctx: &mut CodegenContext<'_>,
    scope: ScopeId,
    args: &[SymbolId],
) -> CodegenResult<String> {
    ctx.capture(|ctx| {
        for &sym in ctx.unit.symbols.scope(scope).symbols() {
            if args.contains(&sym)
                || ctx.unit.symbols.variable(sym).is_none()
                || !ctx.info(sym).needs_declaration
            {
                continue;
            }
            let decl = variable_decl(ctx, sym)?;
            ctx.writeln(&format!("{decl};"));
        }
        Ok(())
    })
}

/// Contained procedures and `main2` live in an anonymous namespace; the
/// real `main` wraps `main2` in the Kokkos runtime lifetime.
#[instrument(level = "debug", skip_all, fields(name = ctx.name(id)))]
fn emit_program(ctx: &mut CodegenContext<'_>, id: SymbolId) -> CodegenResult<String> {
    let Symbol::Program(program) = ctx.symbol(id) else {
        return Ok(String::new());
    };
    let mut contains = String::new();
    for sym in procedures_in(ctx, program.scope) {
        if is_implementation(ctx, sym) {
            contains.push_str(&emit_procedure(ctx, sym)?);
        }
    }

    let outer = ctx.current_function.take();
    ctx.indent();
    let body = ctx.capture(|ctx| emit_body(ctx, &program.body));
    let decls = body.and_then(|body| {
        let decls = local_declarations(ctx, program.scope, &[])?;
        Ok((decls, body))
    });
    ctx.dedent();
    ctx.current_function = outer;
    let (decls, body) = decls?;

    let mut out = format!("namespace {{\n{contains}\nvoid main2() {{\n{decls}{body}}}\n\n}}\n");
    out.push_str("int main(int argc, char* argv[])\n{\n");
    if ctx.options.kokkos {
        out.push_str("    Kokkos::initialize(argc, argv);\n    main2();\n    Kokkos::finalize();\n");
    } else {
        out.push_str("    (void)argc;\n    (void)argv;\n    main2();\n");
    }
    out.push_str("    return 0;\n}\n");
    Ok(out)
}
