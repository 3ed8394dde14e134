use pretty_assertions::assert_eq;

use lfort_ir::{Span, TranslationUnit, Ty};

use super::HelperOp;
use crate::context::CodegenCx;
use crate::eval::{Machine, RtValue, Trap};
use crate::ir::{IrType, Module};
use crate::options::{HashStrategy, LoweringOptions};

/// Generate the helpers for `requests` into a fresh module; returns the
/// module and the helper names in request order.
fn generate(options: &LoweringOptions, requests: &[(Ty, HelperOp)]) -> (Module, Vec<String>) {
    let unit = TranslationUnit::new();
    let mut cx = CodegenCx::new(&unit, options);
    let names = requests
        .iter()
        .map(|(ty, op)| cx.helper(ty, *op, Span::DUMMY).map(|h| h.name))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(cx.codegen_error_count(), 0);
    (cx.into_module(), names)
}

fn int_cell(m: &mut Machine<'_>, ty: &IrType, n: i64) -> RtValue {
    let cell = m.alloc(8);
    m.store(ty, cell, &RtValue::Int(n)).unwrap();
    RtValue::Ptr(cell)
}

fn load_i32(m: &Machine<'_>, ptr: u64) -> i64 {
    m.load(&IrType::I32, ptr).unwrap().as_int().unwrap()
}

fn deref_i32(m: &Machine<'_>, ptr: &RtValue) -> i64 {
    load_i32(m, ptr.as_ptr().unwrap())
}

#[test]
fn helpers_are_generated_once_per_signature() {
    let options = LoweringOptions::default();
    let unit = TranslationUnit::new();
    let mut cx = CodegenCx::new(&unit, &options);
    let list = Ty::list(Ty::i32());
    let first = cx.helper(&list, HelperOp::Append, Span::DUMMY).unwrap();
    let again = cx.helper(&list, HelperOp::Append, Span::DUMMY).unwrap();
    assert_eq!(first.name, "list_i32.append");
    assert_eq!(first.name, again.name);
    let generated = cx.generated_helpers();
    assert_eq!(generated.iter().filter(|n| **n == "list_i32.append").count(), 1);
    assert!(!generated.contains(&"str.deepcopy"));

    // String elements are copied through their value helper.
    cx.helper(&Ty::list(Ty::string()), HelperOp::Append, Span::DUMMY).unwrap();
    assert!(cx.generated_helpers().contains(&"str.deepcopy"));
    let module = cx.into_module();
    assert_eq!(
        module.functions().iter().filter(|f| f.name == "list_i32.append").count(),
        1
    );
}

#[test]
fn character_kinds_share_string_helpers() {
    let options = LoweringOptions::default();
    let (_, names) = generate(
        &options,
        &[
            (Ty::list(Ty::Character { kind: 1, len: Some(3) }), HelperOp::Init),
            (Ty::list(Ty::string()), HelperOp::Init),
        ],
    );
    assert_eq!(names[0], names[1]);
}

#[test]
fn strategy_is_part_of_the_helper_name() {
    let lp = LoweringOptions::default().with_dict_strategy(HashStrategy::LinearProbing);
    let sc = LoweringOptions::default().with_dict_strategy(HashStrategy::SeparateChaining);
    let dict = Ty::dict(Ty::i32(), Ty::f64());
    let (_, lp_names) = generate(&lp, &[(dict.clone(), HelperOp::Insert)]);
    let (_, sc_names) = generate(&sc, &[(dict, HelperOp::Insert)]);
    assert_ne!(lp_names[0], sc_names[0]);
    assert!(lp_names[0].ends_with(".insert"));
    assert!(sc_names[0].ends_with(".insert"));
}

#[test]
fn list_grows_to_twice_plus_one() {
    let list = Ty::list(Ty::i32());
    let (module, names) = generate(
        &LoweringOptions::default(),
        &[(list.clone(), HelperOp::Init), (list.clone(), HelperOp::Append), (list, HelperOp::Read)],
    );
    let mut m = Machine::new(&module);
    let l = m.alloc(16);
    m.call(&names[0], vec![RtValue::Ptr(l), RtValue::Int(0)]).unwrap();

    let mut capacities = Vec::new();
    for i in 0..10 {
        let item = int_cell(&mut m, &IrType::I32, i * 10);
        m.call(&names[1], vec![RtValue::Ptr(l), item]).unwrap();
        assert_eq!(load_i32(&m, l), i + 1);
        capacities.push(load_i32(&m, l + 4));
    }
    assert_eq!(capacities, vec![1, 3, 3, 7, 7, 7, 7, 15, 15, 15]);
    for i in 0..10 {
        let slot = m.call(&names[2], vec![RtValue::Ptr(l), RtValue::Int(i)]).unwrap();
        assert_eq!(deref_i32(&m, &slot), i * 10);
    }
}

#[test]
fn list_read_out_of_range_exits_with_index_error() {
    let list = Ty::list(Ty::i32());
    let (module, names) = generate(
        &LoweringOptions::default(),
        &[(list.clone(), HelperOp::Init), (list.clone(), HelperOp::Append), (list, HelperOp::Read)],
    );
    let mut m = Machine::new(&module);
    let l = m.alloc(16);
    m.call(&names[0], vec![RtValue::Ptr(l), RtValue::Int(0)]).unwrap();
    let item = int_cell(&mut m, &IrType::I32, 7);
    m.call(&names[1], vec![RtValue::Ptr(l), item]).unwrap();

    let err = m.call(&names[2], vec![RtValue::Ptr(l), RtValue::Int(3)]).unwrap_err();
    assert_eq!(err, Trap::Exit(1));
    assert_eq!(
        m.stderr(),
        "IndexError: List index is out of range. Index range is (0, 0), but index is 3\n"
    );
}

#[test]
fn pop_from_empty_list_exits() {
    let list = Ty::list(Ty::i64());
    let (module, names) = generate(
        &LoweringOptions::default(),
        &[(list.clone(), HelperOp::Init), (list, HelperOp::PopLast)],
    );
    let mut m = Machine::new(&module);
    let l = m.alloc(16);
    let out = m.alloc(8);
    m.call(&names[0], vec![RtValue::Ptr(l), RtValue::Int(4)]).unwrap();
    let err = m.call(&names[1], vec![RtValue::Ptr(l), RtValue::Ptr(out)]).unwrap_err();
    assert_eq!(err, Trap::Exit(1));
    assert_eq!(m.stderr(), "IndexError: pop from empty list\n");
}

/// Insert `0..n` mapped to `k * 3`, read every key back, return the
/// occupancy field.
fn dict_round_trip(strategy: HashStrategy, n: i64) -> i64 {
    let options = LoweringOptions::default().with_dict_strategy(strategy);
    let dict = Ty::dict(Ty::i32(), Ty::i32());
    let (module, names) = generate(
        &options,
        &[
            (dict.clone(), HelperOp::Init),
            (dict.clone(), HelperOp::Insert),
            (dict.clone(), HelperOp::Read),
            (dict, HelperOp::Len),
        ],
    );
    let mut m = Machine::new(&module);
    let d = m.alloc(64);
    m.call(&names[0], vec![RtValue::Ptr(d), RtValue::Int(options.initial_hash_capacity.into())])
        .unwrap();
    for k in 0..n {
        let key = int_cell(&mut m, &IrType::I32, k);
        let value = int_cell(&mut m, &IrType::I32, k * 3);
        m.call(&names[1], vec![RtValue::Ptr(d), key, value]).unwrap();
    }
    for k in 0..n {
        let key = int_cell(&mut m, &IrType::I32, k);
        let slot = m.call(&names[2], vec![RtValue::Ptr(d), key]).unwrap();
        assert_eq!(deref_i32(&m, &slot), k * 3, "key {k}");
    }
    let len = m.call(&names[3], vec![RtValue::Ptr(d)]).unwrap();
    assert_eq!(len.as_int(), Some(n));
    load_i32(&m, d)
}

#[test]
fn linear_probing_dict_survives_rehash() {
    assert_eq!(dict_round_trip(HashStrategy::LinearProbing, 100), 100);
}

#[test]
fn separate_chaining_dict_survives_rehash() {
    assert_eq!(dict_round_trip(HashStrategy::SeparateChaining, 100), 100);
}

#[test]
fn missing_key_is_a_key_error() {
    for strategy in [HashStrategy::LinearProbing, HashStrategy::SeparateChaining] {
        let options = LoweringOptions::default().with_dict_strategy(strategy);
        let dict = Ty::dict(Ty::i32(), Ty::i32());
        let (module, names) = generate(
            &options,
            &[(dict.clone(), HelperOp::Init), (dict, HelperOp::Read)],
        );
        let mut m = Machine::new(&module);
        let d = m.alloc(64);
        m.call(&names[0], vec![RtValue::Ptr(d), RtValue::Int(8)]).unwrap();
        let key = int_cell(&mut m, &IrType::I32, 5);
        assert_eq!(m.call(&names[1], vec![RtValue::Ptr(d), key]), Err(Trap::Exit(1)));
        assert_eq!(m.stderr(), "KeyError: The dict does not contain the specified key\n");
    }
}

#[test]
fn set_remove_of_absent_element_is_a_key_error() {
    for strategy in [HashStrategy::LinearProbing, HashStrategy::SeparateChaining] {
        let options = LoweringOptions::default().with_set_strategy(strategy);
        let set = Ty::set(Ty::i64());
        let (module, names) = generate(
            &options,
            &[
                (set.clone(), HelperOp::Init),
                (set.clone(), HelperOp::Add),
                (set.clone(), HelperOp::Discard),
                (set.clone(), HelperOp::Contains),
                (set, HelperOp::Remove),
            ],
        );
        let mut m = Machine::new(&module);
        let s = m.alloc(64);
        m.call(&names[0], vec![RtValue::Ptr(s), RtValue::Int(8)]).unwrap();
        let two = int_cell(&mut m, &IrType::I64, 2);
        m.call(&names[1], vec![RtValue::Ptr(s), two.clone()]).unwrap();
        m.call(&names[1], vec![RtValue::Ptr(s), two.clone()]).unwrap();
        assert_eq!(m.call(&names[3], vec![RtValue::Ptr(s), two.clone()]).unwrap().as_bool(), Some(true));
        // Discarding is silent either way.
        m.call(&names[2], vec![RtValue::Ptr(s), two.clone()]).unwrap();
        m.call(&names[2], vec![RtValue::Ptr(s), two.clone()]).unwrap();
        assert_eq!(m.call(&names[3], vec![RtValue::Ptr(s), two.clone()]).unwrap().as_bool(), Some(false));
        assert_eq!(m.call(&names[4], vec![RtValue::Ptr(s), two]), Err(Trap::Exit(1)));
        assert_eq!(m.stderr(), "KeyError: The set does not contain the specified element\n");
    }
}

#[test]
fn string_dup_is_an_independent_copy() {
    let (module, names) = generate(&LoweringOptions::default(), &[(Ty::string(), HelperOp::Dup)]);
    let mut m = Machine::new(&module);
    let original = m.memory_mut().alloc_c_string("hello");
    let copy = m.call(&names[0], vec![RtValue::Ptr(original)]).unwrap().as_ptr().unwrap();
    assert_ne!(copy, original);
    m.memory_mut().bytes_mut(original, 1).unwrap()[0] = b'j';
    assert_eq!(m.memory().c_string(copy).unwrap(), b"hello".to_vec());
}
