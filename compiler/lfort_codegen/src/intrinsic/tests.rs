use lfort_diagnostic::Diagnostics;
use lfort_intrinsics::create_intrinsic;
use lfort_ir::{ArrayPhysicalType, AsrBuilder, Dimension, ExprKind};
use pretty_assertions::assert_eq;

use super::*;
use crate::CppOptions;

struct Built {
    b: AsrBuilder,
    diags: Diagnostics,
}

impl Built {
    fn new() -> Self {
        Built {
            b: AsrBuilder::new(),
            diags: Diagnostics::new(),
        }
    }

    fn var(&mut self, name: &str, ty: Ty) -> ExprId {
        let global = self.b.global();
        let sym = self.b.variable(global, name, ty);
        self.b.var(sym)
    }

    fn call(&mut self, id: IntrinsicId, args: &[ExprId]) -> ExprId {
        let args: Vec<Option<ExprId>> = args.iter().copied().map(Some).collect();
        create_intrinsic(&mut self.b, id, &args, Span::DUMMY, &mut self.diags)
            .unwrap_or_else(|| panic!("{}", self.diags.render()))
    }
}

/// Emitted text of `id` and the helper definitions it pulled in.
fn emit(built: Built, id: ExprId) -> (String, Vec<String>) {
    let unit = built.b.finish();
    let options = CppOptions::default();
    let mut ctx = CodegenContext::new(&unit, &options);
    let text = emit_expr(&mut ctx, id)
        .map(|f| f.text)
        .unwrap_or_else(|e| panic!("{e}"));
    (text, ctx.helpers().to_vec())
}

#[test]
fn math_functions_map_to_std() {
    let mut t = Built::new();
    let x = t.var("x", Ty::f64());
    let sin = t.call(IntrinsicId::Sin, &[x]);
    let gamma = t.call(IntrinsicId::Gamma, &[sin]);
    assert_eq!(emit(t, gamma).0, "std::tgamma(std::sin(x))");
}

#[test]
fn floor_casts_to_result_kind() {
    let mut t = Built::new();
    let x = t.var("x", Ty::f64());
    let floor = t.call(IntrinsicId::Floor, &[x]);
    assert_eq!(emit(t, floor).0, "static_cast<int>(std::floor(x))");
}

#[test]
fn integer_mod_is_an_operator() {
    let mut t = Built::new();
    let a = t.var("a", Ty::i32());
    let b = t.var("b", Ty::i32());
    let sum = t.b.add(a, b);
    let m = t.call(IntrinsicId::Mod, &[sum, b]);
    let (text, helpers) = emit(t, m);
    assert_eq!(text, "(a + b) % b");
    assert!(helpers.is_empty());
}

#[test]
fn real_mod_is_fmod() {
    let mut t = Built::new();
    let x = t.var("x", Ty::f64());
    let y = t.var("y", Ty::f64());
    let m = t.call(IntrinsicId::Mod, &[x, y]);
    assert_eq!(emit(t, m).0, "std::fmod(x, y)");
}

#[test]
fn modulo_pulls_in_one_helper() {
    let mut t = Built::new();
    let a = t.var("a", Ty::i32());
    let b = t.var("b", Ty::i32());
    let inner = t.call(IntrinsicId::Modulo, &[a, b]);
    let outer = t.call(IntrinsicId::Modulo, &[inner, b]);
    let (text, helpers) = emit(t, outer);
    assert_eq!(text, "lfort_modulo(lfort_modulo(a, b), b)");
    assert_eq!(helpers.len(), 1);
    assert!(helpers[0].contains("T lfort_modulo(T a, T p)"));
}

#[test]
fn variadic_max() {
    let mut t = Built::new();
    let a = t.var("a", Ty::i32());
    let b = t.var("b", Ty::i32());
    let c = t.var("c", Ty::i32());
    let two = t.call(IntrinsicId::Max, &[a, b]);
    let three = t.call(IntrinsicId::Min, &[a, b, c]);
    let sum = t.b.add(two, three);
    assert_eq!(emit(t, sum).0, "std::max(a, b) + std::min({a, b, c})");
}

#[test]
fn bit_operations() {
    let mut t = Built::new();
    let a = t.var("a", Ty::i32());
    let b = t.var("b", Ty::i32());
    let and = t.call(IntrinsicId::Iand, &[a, b]);
    let or = t.call(IntrinsicId::Ior, &[and, b]);
    let not = t.call(IntrinsicId::Not, &[or]);
    assert_eq!(emit(t, not).0, "~(a & b | b)");
}

#[test]
fn digits_folds_from_the_type() {
    let mut t = Built::new();
    let x = t.var("x", Ty::f64());
    let node = t.b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Digits,
            args: vec![x],
            overload: 0,
        },
        Ty::i32(),
    );
    assert_eq!(emit(t, node).0, "53");
}

#[test]
fn array_arguments_are_not_implemented() {
    let mut t = Built::new();
    let ty = Ty::array(
        Ty::f64(),
        [Dimension::deferred()],
        ArrayPhysicalType::DescriptorArray,
    );
    let v = t.var("v", ty);
    let node = t.b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Sqrt,
            args: vec![v],
            overload: 0,
        },
        Ty::f64(),
    );
    let unit = t.b.finish();
    let options = CppOptions::default();
    let mut ctx = CodegenContext::new(&unit, &options);
    let err = emit_expr(&mut ctx, node).map(|f| f.text);
    assert!(matches!(err, Err(CodegenError::NotImplemented { .. })));
}

#[test]
fn intrinsic_module_size_and_len() {
    let mut b = AsrBuilder::new();
    let (_, scope) = b.module("lfortran_intrinsic_builtin", &[]);
    let size_scope = b.new_scope(scope);
    let r = b.return_var(size_scope, "r", Ty::i32());
    let size = b.function(scope, "size", size_scope, vec![], Some(r), vec![]);
    let len_scope = b.new_scope(scope);
    let r = b.return_var(len_scope, "r", Ty::i32());
    let len = b.function(scope, "len", len_scope, vec![], Some(r), vec![]);

    let global = b.global();
    let ty = Ty::array(
        Ty::f64(),
        [Dimension::deferred(), Dimension::deferred()],
        ArrayPhysicalType::DescriptorArray,
    );
    let a = b.variable(global, "a", ty);
    let s = b.variable(global, "s", Ty::string());
    let av = b.var(a);
    let sv = b.var(s);
    let two = b.i32(2);

    let unit = b.finish();
    let options = CppOptions::default();
    let mut ctx = CodegenContext::new(&unit, &options);
    let size_text = emit_intrinsic_module_call(&mut ctx, size, &[Some(av), Some(two)], Span::DUMMY)
        .map(|f| f.text);
    assert_eq!(size_text, Ok("a.extent(2-1)".to_string()));
    let len_text =
        emit_intrinsic_module_call(&mut ctx, len, &[Some(sv)], Span::DUMMY).map(|f| f.text);
    assert_eq!(
        len_text,
        Ok("static_cast<int>(std::string(s).size())".to_string())
    );
}
