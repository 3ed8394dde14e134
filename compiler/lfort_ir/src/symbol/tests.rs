use super::*;
use crate::{AsrBuilder, StructKind, Ty};

#[test]
fn resolve_walks_parent_scopes() {
    let mut table = SymbolTable::new();
    let global = table.new_scope(None);
    let inner = table.new_scope(Some(global));
    let x = table.add(global, Symbol::Variable(Variable::new("x", Ty::i32(), Intent::Local)));
    assert_eq!(table.resolve(inner, "x"), Some(x));
    assert_eq!(table.lookup_local(inner, "x"), None);
}

#[test]
fn shadowing_keeps_single_order_entry() {
    let mut table = SymbolTable::new();
    let global = table.new_scope(None);
    table.add(global, Symbol::Variable(Variable::new("x", Ty::i32(), Intent::Local)));
    let y = table.add(global, Symbol::Variable(Variable::new("y", Ty::i32(), Intent::Local)));
    let x2 = table.add(global, Symbol::Variable(Variable::new("x", Ty::f64(), Intent::Local)));
    assert_eq!(table.scope(global).symbols(), &[y, x2]);
    assert_eq!(table.variable(x2).map(|v| &v.ty), Some(&Ty::f64()));
}

#[test]
fn find_member_counts_parent_hops() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let (base, base_members) = b.struct_type(global, "base", StructKind::Struct, None, vec![("id", Ty::i32())]);
    let (derived, derived_members) =
        b.struct_type(global, "derived", StructKind::Struct, Some(base), vec![("w", Ty::f64())]);
    let unit = b.finish();
    assert_eq!(
        unit.symbols.find_member(derived, "w"),
        Some((derived, derived_members[0], 0))
    );
    assert_eq!(
        unit.symbols.find_member(derived, "id"),
        Some((base, base_members[0], 1))
    );
    assert_eq!(unit.symbols.find_member(derived, "missing"), None);
}

#[test]
fn intent_argument_classification() {
    assert!(Intent::In.is_argument());
    assert!(Intent::InOut.is_argument());
    assert!(!Intent::Local.is_argument());
    assert!(!Intent::ReturnVar.is_argument());
}
