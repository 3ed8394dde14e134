//! Whole-unit C++ generation through the public entry point.

use lfort_codegen::{asr_to_cpp, CppOptions};
use lfort_diagnostic::{Diagnostics, ErrorCode};
use lfort_ir::{AsrBuilder, CastKind, ScopeId, Stmt, SymbolId, Ty};
use pretty_assertions::assert_eq;

fn generate(b: AsrBuilder, options: &CppOptions) -> String {
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    match asr_to_cpp(&unit, options, &mut diags) {
        Ok(source) => source,
        Err(_) => panic!("{}", diags.render()),
    }
}

fn generate_err(b: AsrBuilder) -> Diagnostics {
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    if let Ok(source) = asr_to_cpp(&unit, &CppOptions::default(), &mut diags) {
        panic!("expected an error, got:\n{source}");
    }
    diags
}

fn implementations(source: &str) -> &str {
    source
        .split_once("// Implementations\n")
        .map_or("", |(_, rest)| rest)
}

/// Program `p` with locals `i: integer` and `x: real(8)`.
fn program_scope(b: &mut AsrBuilder) -> (ScopeId, SymbolId, SymbolId) {
    let global = b.global();
    let scope = b.new_scope(global);
    let i = b.variable(scope, "i", Ty::i32());
    let x = b.variable(scope, "x", Ty::f64());
    (scope, i, x)
}

const KOKKOS_MAIN: &str = "int main(int argc, char* argv[])
{
    Kokkos::initialize(argc, argv);
    main2();
    Kokkos::finalize();
    return 0;
}
";

#[test]
fn program_with_counted_loop() {
    let mut b = AsrBuilder::new();
    let (scope, i, x) = program_scope(&mut b);
    let xv = b.var(x);
    let zero = b.f64(0.0);
    let init = Stmt::assign(xv, zero);
    let step = b.f64(1.5);
    let sum = b.add(xv, step);
    let update = Stmt::assign(xv, sum);
    let (one, ten) = (b.i32(1), b.i32(10));
    let head = b.do_head(i, one, ten, None);
    let iv = b.var(i);
    let body = vec![
        init,
        Stmt::do_loop(head, vec![update]),
        Stmt::print(vec![xv, iv]),
    ];
    b.program("p", scope, body);

    let source = generate(b, &CppOptions::default());
    assert!(source.starts_with("#include <iostream>\n"));
    assert!(source.contains("#include <Kokkos_Core.hpp>\n"));
    assert!(source.contains("Kokkos::View<T*> from_std_vector(const std::vector<T> &v)"));
    let expected = format!(
        "namespace {{

void main2() {{
    int i;
    double x;
    x = 0.0;
    for (i=1; i<=10; i++) {{
        x = x + 1.5;
    }}
    std::cout << x << \" \" << i << std::endl;
}}

}}
{KOKKOS_MAIN}"
    );
    assert_eq!(implementations(&source), expected);
}

#[test]
fn module_function_is_declared_and_defined() {
    let mut b = AsrBuilder::new();
    let (_, mscope) = b.module("geometry", &[]);
    let fscope = b.new_scope(mscope);
    let x = b.argument(fscope, "x", Ty::f64(), lfort_ir::Intent::In);
    let r = b.return_var(fscope, "r", Ty::f64());
    let rv = b.var(r);
    let xv = b.var(x);
    let two = b.f64(2.0);
    let twice = b.mul(xv, two);
    let f = b.function(
        mscope,
        "twice",
        fscope,
        vec![x],
        Some(r),
        vec![Stmt::assign(rv, twice)],
    );

    let global = b.global();
    let pscope = b.new_scope(global);
    let y = b.variable(pscope, "y", Ty::f64());
    let yv = b.var(y);
    let three = b.f64(3.0);
    let call = b.call(f, vec![Some(three)]);
    b.program("p", pscope, vec![Stmt::assign(yv, call)]);

    let source = generate(b, &CppOptions::default());
    assert!(source.contains("// Forward declarations\ndouble twice(double x);\n"));
    let expected = format!(
        "double twice(double x)
{{
    double r;
    r = x*2.0;
    return r;
}}

namespace {{

void main2() {{
    double y;
    y = twice(3.0);
}}

}}
{KOKKOS_MAIN}"
    );
    assert_eq!(implementations(&source), expected);
}

#[test]
fn explicit_return_is_not_repeated() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let fscope = b.new_scope(global);
    let r = b.return_var(fscope, "r", Ty::i32());
    let rv = b.var(r);
    let seven = b.i32(7);
    b.function(
        global,
        "seven",
        fscope,
        vec![],
        Some(r),
        vec![Stmt::assign(rv, seven), Stmt::ret()],
    );
    let source = generate(b, &CppOptions::default());
    assert_eq!(
        implementations(&source),
        "int seven()\n{\n    int r;\n    r = 7;\n    return r;\n}\n\n"
    );
}

fn loop_with_step(step: i64) -> String {
    let mut b = AsrBuilder::new();
    let (scope, i, x) = program_scope(&mut b);
    let (start, end, inc) = (b.i32(10), b.i32(1), b.i32(step));
    let head = b.do_head(i, start, end, Some(inc));
    let xv = b.var(x);
    let iv = b.var(i);
    let real = b.cast(iv, CastKind::IntegerToReal, Ty::f64());
    b.program("p", scope, vec![Stmt::do_loop(head, vec![Stmt::assign(xv, real)])]);
    generate(b, &CppOptions::default())
}

#[test]
fn loop_direction_follows_increment_sign() {
    let down = loop_with_step(-1);
    assert!(down.contains("    for (i=10; i>=1; i--) {\n        x = static_cast<double>(i);\n    }\n"));
    let up = loop_with_step(2);
    assert!(up.contains("    for (i=10; i<=1; i+=2) {\n"));
    let down3 = loop_with_step(-3);
    assert!(down3.contains("    for (i=10; i>=1; i-=3) {\n"));
}

#[test]
fn non_constant_increment_is_reported() {
    let mut b = AsrBuilder::new();
    let (scope, i, x) = program_scope(&mut b);
    let n = b.variable(scope, "n", Ty::i32());
    let (start, end) = (b.i32(1), b.i32(10));
    let nv = b.var(n);
    let head = b.do_head(i, start, end, Some(nv));
    let xv = b.var(x);
    let one = b.f64(1.0);
    b.program("p", scope, vec![Stmt::do_loop(head, vec![Stmt::assign(xv, one)])]);

    let diags = generate_err(b);
    assert_eq!(diags.error_count(), 1);
    let diag = diags.iter().next().map(|d| (d.code, d.message.clone()));
    assert_eq!(
        diag,
        Some((ErrorCode::E3001, "Do loop increment type not supported".to_string()))
    );
}

fn concurrent_program(options: &CppOptions) -> String {
    let mut b = AsrBuilder::new();
    let (scope, i, x) = program_scope(&mut b);
    let (one, n) = (b.i32(1), b.i32(100));
    let head = b.do_head(i, one, n, None);
    let xv = b.var(x);
    let half = b.f64(0.5);
    b.program(
        "p",
        scope,
        vec![Stmt::do_concurrent(head, vec![Stmt::assign(xv, half)])],
    );
    generate(b, options)
}

#[test]
fn do_concurrent_becomes_parallel_for() {
    let source = concurrent_program(&CppOptions::default());
    let expected = format!(
        "namespace {{

void main2() {{
    double x;
    Kokkos::parallel_for(Kokkos::RangePolicy<Kokkos::DefaultExecutionSpace>(1, 100+1), KOKKOS_LAMBDA(const long i) {{
        x = 0.5;
    }});
}}

}}
{KOKKOS_MAIN}"
    );
    assert_eq!(implementations(&source), expected);
}

#[test]
fn do_concurrent_without_kokkos_is_serial() {
    let source = concurrent_program(&CppOptions::default().with_kokkos(false));
    let body = implementations(&source);
    assert!(body.contains("    int i;\n"));
    assert!(body.contains("    for (i=1; i<=100; i++) {\n"));
    assert!(!body.contains("Kokkos::initialize"));
}

#[test]
fn containers_are_hard_errors() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let scope = b.new_scope(global);
    let l = b.variable(scope, "l", Ty::list(Ty::i32()));
    let lv = b.var(l);
    let one = b.i32(1);
    b.program(
        "p",
        scope,
        vec![Stmt::new(lfort_ir::StmtKind::ListAppend {
            list: lv,
            element: one,
        })],
    );
    let diags = generate_err(b);
    assert_eq!(diags.error_count(), 1);
    assert!(diags.render().contains("not implemented by the C++ backend"));
}

#[test]
fn module_cycle_is_a_driver_error() {
    let mut b = AsrBuilder::new();
    b.module("a", &["b"]);
    b.module("b", &["a"]);
    let diags = generate_err(b);
    let codes: Vec<ErrorCode> = diags.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E4001]);
    assert!(diags.render().contains("a -> b -> a"));
}
