use lfort_ir::{ArrayPhysicalType, AsrBuilder, Intent, Symbol, Variable};
use pretty_assertions::assert_eq;

use super::*;
use crate::CppOptions;

fn with_ctx<T>(b: AsrBuilder, f: impl FnOnce(&mut CodegenContext<'_>) -> CodegenResult<T>) -> T {
    let unit = b.finish();
    let options = CppOptions::default();
    let mut ctx = CodegenContext::new(&unit, &options);
    f(&mut ctx).unwrap_or_else(|e| panic!("{e}"))
}

fn fixed(b: &mut AsrBuilder, n: i64) -> Dimension {
    let one = b.i32(1);
    let end = b.i32(n);
    Dimension::new(Some(one), Some(end))
}

#[test]
fn scalar_spellings() {
    let b = AsrBuilder::new();
    with_ctx(b, |ctx| {
        let ctx: &CodegenContext<'_> = ctx;
        let s = |ty: Ty| scalar_type(ctx, &ty, Span::DUMMY);
        assert_eq!(s(Ty::i32())?, "int");
        assert_eq!(s(Ty::i64())?, "long long");
        assert_eq!(s(Ty::UnsignedInteger { kind: 8 })?, "unsigned long long");
        assert_eq!(s(Ty::f32())?, "float");
        assert_eq!(s(Ty::complex(8))?, "std::complex<double>");
        assert_eq!(s(Ty::logical())?, "bool");
        assert_eq!(s(Ty::string())?, "std::string");
        assert_eq!(s(Ty::pointer(Ty::f64()))?, "double *");
        assert_eq!(s(Ty::CPtr)?, "void *");
        Ok(())
    });
}

#[test]
fn list_type_is_unsupported() {
    let b = AsrBuilder::new();
    let unit = b.finish();
    let options = CppOptions::default();
    let ctx = CodegenContext::new(&unit, &options);
    let err = scalar_type(&ctx, &Ty::list(Ty::i32()), Span::DUMMY);
    assert_eq!(
        err.map_err(|e| e.to_string()),
        Err("Type 'list[i32]' not supported".to_string())
    );
}

#[test]
fn runtime_extents_move_left() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let n = b.variable(global, "n", Ty::i32());
    let d3 = fixed(&mut b, 3);
    let one = b.i32(1);
    let nv = b.var(n);
    let dn = Dimension::new(Some(one), Some(nv));
    let d4 = fixed(&mut b, 4);
    let dims = vec![d3, dn, d4];
    let (suffix, runtime) = with_ctx(b, |ctx| convert_dims(ctx, &dims, Span::DUMMY));
    assert_eq!(suffix, "**[4]");
    assert_eq!(runtime, vec!["3".to_string(), "n".to_string()]);
}

#[test]
fn shifted_lower_bound_extent() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let n = b.variable(global, "n", Ty::i32());
    let zero = b.i32(0);
    let nv = b.var(n);
    let dims = vec![Dimension::new(Some(zero), Some(nv))];
    let (suffix, runtime) = with_ctx(b, |ctx| convert_dims(ctx, &dims, Span::DUMMY));
    assert_eq!(suffix, "*");
    assert_eq!(runtime, vec!["n + 1".to_string()]);
}

#[test]
fn local_and_dummy_arrays() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let d10 = fixed(&mut b, 10);
    let local = b.variable(
        global,
        "a",
        Ty::array(Ty::f64(), [d10], ArrayPhysicalType::FixedSizeArray),
    );
    let d5 = fixed(&mut b, 5);
    let dummy_in = b.argument(
        global,
        "x",
        Ty::array(Ty::i32(), [d5, d5], ArrayPhysicalType::DescriptorArray),
        Intent::In,
    );
    let dummy_out = b.argument(
        global,
        "y",
        Ty::array(Ty::f32(), [d5], ArrayPhysicalType::DescriptorArray),
        Intent::Out,
    );
    with_ctx(b, |ctx| {
        assert_eq!(
            variable_decl(ctx, local)?,
            "Kokkos::View<double[10]> a(\"a\")"
        );
        assert_eq!(
            variable_decl(ctx, dummy_in)?,
            "const Kokkos::View<const int**> &x"
        );
        assert_eq!(
            variable_decl(ctx, dummy_out)?,
            "const Kokkos::View<float*> &y"
        );
        Ok(())
    });
}

#[test]
fn scalar_declarations() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let three = b.i32(3);
    let pi = b.f64(3.5);
    let counter = b.add_symbol(
        global,
        Symbol::Variable(
            Variable::new("counter", Ty::i32(), Intent::Local)
                .with_storage(Storage::Save)
                .with_init(three),
        ),
    );
    let limit = b.add_symbol(
        global,
        Symbol::Variable(
            Variable::new("limit", Ty::f64(), Intent::Local)
                .with_storage(Storage::Parameter)
                .with_init(pi),
        ),
    );
    let out = b.argument(global, "r", Ty::f64(), Intent::InOut);
    let arg = b.argument(global, "k", Ty::i64(), Intent::In);
    with_ctx(b, |ctx| {
        assert_eq!(variable_decl(ctx, counter)?, "static int counter=3");
        assert_eq!(variable_decl(ctx, limit)?, "const double limit=3.5");
        assert_eq!(variable_decl(ctx, out)?, "double &r");
        assert_eq!(variable_decl(ctx, arg)?, "long long k");
        Ok(())
    });
}

#[test]
fn signatures() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let scope = b.new_scope(global);
    let x = b.argument(scope, "x", Ty::f64(), Intent::In);
    let y = b.argument(scope, "y", Ty::f64(), Intent::Out);
    let r = b.return_var(scope, "r", Ty::f64());
    let f = b.function(global, "f", scope, vec![x, y], Some(r), vec![]);
    let sub_scope = b.new_scope(global);
    let s = b.function(global, "s", sub_scope, vec![], None, vec![]);
    with_ctx(b, |ctx| {
        assert_eq!(function_signature(ctx, f)?, "double f(double x, double &y)");
        assert_eq!(function_signature(ctx, s)?, "void s()");
        Ok(())
    });
}

#[test]
fn derived_type_with_parent() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let (base, _) = b.struct_type(global, "base", StructKind::Struct, None, vec![("id", Ty::i32())]);
    let (derived, _) = b.struct_type(
        global,
        "derived",
        StructKind::Struct,
        Some(base),
        vec![("w", Ty::f64()), ("name", Ty::string())],
    );
    let text = with_ctx(b, |ctx| struct_definition(ctx, derived));
    assert_eq!(
        text,
        "struct derived : public base {\n    double w;\n    std::string name;\n};\n"
    );
}

#[test]
fn main_is_renamed() {
    assert_eq!(procedure_name("main"), "_lfort_main");
    assert_eq!(procedure_name("solve"), "solve");
}
