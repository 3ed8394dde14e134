use super::*;
use crate::AsrBuilder;
use pretty_assertions::assert_eq;

fn names(unit: &TranslationUnit, ids: &[SymbolId]) -> Vec<String> {
    ids.iter().map(|id| unit.symbols.name(*id).to_string()).collect()
}

#[test]
fn dependencies_come_first() {
    let mut b = AsrBuilder::new();
    b.module("app", &["physics", "io"]);
    b.module("physics", &["constants"]);
    b.module("io", &[]);
    b.module("constants", &[]);
    let unit = b.finish();
    let order = unit.module_build_order().unwrap_or_default();
    assert_eq!(names(&unit, &order), vec!["constants", "physics", "io", "app"]);
}

#[test]
fn unknown_dependencies_are_skipped() {
    let mut b = AsrBuilder::new();
    b.module("app", &["iso_c_binding"]);
    let unit = b.finish();
    let order = unit.module_build_order();
    assert_eq!(order.map(|o| names(&unit, &o)), Ok(vec!["app".to_string()]));
}

#[test]
fn cycle_is_reported_with_path() {
    let mut b = AsrBuilder::new();
    b.module("a", &["b"]);
    b.module("b", &["c"]);
    b.module("c", &["a"]);
    let unit = b.finish();
    let err = unit.module_build_order().err();
    assert_eq!(
        err,
        Some(DependencyCycle {
            path: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        })
    );
    assert_eq!(
        err.map(|e| e.to_string()),
        Some("module dependency cycle: a -> b -> c -> a".to_string())
    );
}

#[test]
fn intrinsic_modules_are_flagged() {
    let mut b = AsrBuilder::new();
    let (m, _) = b.module("lfortran_intrinsic_math", &[]);
    let unit = b.finish();
    assert_eq!(unit.symbols.module(m).map(|m| m.intrinsic), Some(true));
    assert!(!is_intrinsic_module_name("physics"));
}

#[test]
fn intrinsic_modules_sort_first() {
    let mut b = AsrBuilder::new();
    b.module("app", &[]);
    b.module("lfortran_intrinsic_math", &[]);
    b.module("lfortran_intrinsic_iso", &["lfortran_intrinsic_math"]);
    let unit = b.finish();
    let order = unit.module_build_order().unwrap_or_default();
    assert_eq!(
        names(&unit, &order),
        vec!["lfortran_intrinsic_math", "lfortran_intrinsic_iso", "app"]
    );
}
