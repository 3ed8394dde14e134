//! Whole programs lowered through `asr_to_llvm` and run in the evaluator.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use lfort_diagnostic::{Diagnostics, ErrorCode};
use lfort_ir::{AsrBuilder, CastKind, CmpOp, ExprKind, Intent, ScopeId, Stmt, StmtKind, Ty};
use lfort_llvm::{asr_to_llvm, HashStrategy, LoweringOptions, Machine, Module, RunOutcome};
use pretty_assertions::assert_eq;

fn lower(b: AsrBuilder, options: &LoweringOptions) -> Module {
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    match asr_to_llvm(&unit, options, &mut diags) {
        Ok(module) => module,
        Err(_) => panic!("{}", diags.render()),
    }
}

fn run_with(b: AsrBuilder, options: &LoweringOptions) -> RunOutcome {
    let module = lower(b, options);
    Machine::new(&module)
        .run_main()
        .unwrap_or_else(|trap| panic!("{trap}\n{}", module.to_llvm_ir()))
}

fn run(b: AsrBuilder) -> RunOutcome {
    run_with(b, &LoweringOptions::default())
}

fn program_scope(b: &mut AsrBuilder) -> ScopeId {
    let global = b.global();
    b.new_scope(global)
}

#[test]
fn hello_world() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let hello = b.string("Hello, World!");
    b.program("hello", scope, vec![Stmt::print(vec![hello])]);

    let module = lower(b, &LoweringOptions::default());
    assert!(module.to_llvm_ir().contains("define i32 @main() {"));
    let out = Machine::new(&module).run_main().unwrap();
    assert_eq!(out.exit_code, 0);
    assert_eq!(out.stdout, "Hello, World!\n");
    assert_eq!(out.stderr, "");
}

#[test]
fn print_items_are_space_separated() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let i = b.variable(scope, "i", Ty::i32());
    let iv = b.var(i);
    let forty_two = b.i32(42);
    let label = b.string("i =");
    let big = b.i64(1 << 40);
    let yes = b.logical(true);
    b.program(
        "p",
        scope,
        vec![Stmt::assign(iv, forty_two), Stmt::print(vec![label, iv, big, yes])],
    );
    assert_eq!(run(b).stdout, "i = 42 1099511627776 1\n");
}

#[test]
fn counted_loops_honour_their_step() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let i = b.variable(scope, "i", Ty::i32());
    let iv = b.var(i);

    let (three, one, minus_one) = (b.i32(3), b.i32(1), b.i32(-1));
    let down = b.do_head(i, three, one, Some(minus_one));
    let (start, end, two) = (b.i32(1), b.i32(8), b.i32(2));
    let up = b.do_head(i, start, end, Some(two));
    // Empty: the start is already past the end.
    let (five, four) = (b.i32(5), b.i32(4));
    let empty = b.do_head(i, five, four, None);
    let done = b.string("done");
    b.program(
        "loops",
        scope,
        vec![
            Stmt::do_loop(down, vec![Stmt::print(vec![iv])]),
            Stmt::do_loop(up, vec![Stmt::print(vec![iv])]),
            Stmt::do_loop(empty, vec![Stmt::print(vec![iv])]),
            Stmt::print(vec![done, iv]),
        ],
    );
    assert_eq!(run(b).stdout, "3\n2\n1\n1\n3\n5\n7\ndone 5\n");
}

#[test]
fn exit_and_cycle_leave_the_innermost_loop() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let i = b.variable(scope, "i", Ty::i32());
    let iv = b.var(i);
    let (one, ten) = (b.i32(1), b.i32(10));
    let head = b.do_head(i, one, ten, None);
    let two = b.i32(2);
    let is_two = b.compare(iv, CmpOp::Eq, two);
    let four = b.i32(4);
    let past_four = b.compare(iv, CmpOp::Gt, four);
    b.program(
        "p",
        scope,
        vec![Stmt::do_loop(
            head,
            vec![
                Stmt::if_else(is_two, vec![Stmt::new(StmtKind::Cycle)], vec![]),
                Stmt::if_else(past_four, vec![Stmt::new(StmtKind::Exit)], vec![]),
                Stmt::print(vec![iv]),
            ],
        )],
    );
    assert_eq!(run(b).stdout, "1\n3\n4\n");
}

#[test]
fn while_loop_counts_down() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let n = b.variable(scope, "n", Ty::i32());
    let nv = b.var(n);
    let three = b.i32(3);
    let zero = b.i32(0);
    let positive = b.compare(nv, CmpOp::Gt, zero);
    let one = b.i32(1);
    let less = b.sub(nv, one);
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(nv, three),
            Stmt::while_loop(positive, vec![Stmt::print(vec![nv]), Stmt::assign(nv, less)]),
        ],
    );
    assert_eq!(run(b).stdout, "3\n2\n1\n");
}

#[test]
fn functions_take_arguments_by_reference() {
    let mut b = AsrBuilder::new();
    let global = b.global();

    let fscope = b.new_scope(global);
    let x = b.argument(fscope, "x", Ty::i32(), Intent::In);
    let r = b.return_var(fscope, "r", Ty::i32());
    let (xv, rv) = (b.var(x), b.var(r));
    let square = b.mul(xv, xv);
    let f = b.function(global, "square", fscope, vec![x], Some(r), vec![Stmt::assign(rv, square)]);

    let sscope = b.new_scope(global);
    let y = b.argument(sscope, "y", Ty::i32(), Intent::InOut);
    let yv = b.var(y);
    let one = b.i32(1);
    let bumped = b.add(yv, one);
    let bump = b.function(global, "bump", sscope, vec![y], None, vec![Stmt::assign(yv, bumped)]);

    let scope = program_scope(&mut b);
    let k = b.variable(scope, "k", Ty::i32());
    let kv = b.var(k);
    let seven = b.i32(7);
    let squared = b.call(f, vec![Some(seven)]);
    let start = b.i32(10);
    b.program(
        "p",
        scope,
        vec![
            Stmt::print(vec![squared]),
            Stmt::assign(kv, start),
            Stmt::call(bump, vec![Some(kv)]),
            Stmt::call(bump, vec![Some(kv)]),
            Stmt::print(vec![kv]),
        ],
    );
    assert_eq!(run(b).stdout, "49\n12\n");
}

#[test]
fn early_return_skips_the_rest_of_the_body() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let fscope = b.new_scope(global);
    let x = b.argument(fscope, "x", Ty::i32(), Intent::In);
    let r = b.return_var(fscope, "r", Ty::i32());
    let (xv, rv) = (b.var(x), b.var(r));
    let zero = b.i32(0);
    let negative = b.compare(xv, CmpOp::Lt, zero);
    let flipped = b.neg(xv);
    let f = b.function(
        global,
        "magnitude",
        fscope,
        vec![x],
        Some(r),
        vec![
            Stmt::assign(rv, xv),
            Stmt::if_else(negative, vec![Stmt::assign(rv, flipped), Stmt::ret()], vec![]),
        ],
    );

    let scope = program_scope(&mut b);
    let (minus, plus) = (b.i32(-5), b.i32(6));
    let a = b.call(f, vec![Some(minus)]);
    let c = b.call(f, vec![Some(plus)]);
    b.program("p", scope, vec![Stmt::print(vec![a, c])]);
    assert_eq!(run(b).stdout, "5 6\n");
}

#[test]
fn module_variables_are_shared_globals() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let (_, mscope) = b.module("counters", &[]);
    let total = b.variable(mscope, "total", Ty::i64());
    let tv = b.var(total);

    let sscope = b.new_scope(mscope);
    let n = b.argument(sscope, "n", Ty::i64(), Intent::In);
    let nv = b.var(n);
    let sum = b.add(tv, nv);
    let add = b.function(mscope, "add", sscope, vec![n], None, vec![Stmt::assign(tv, sum)]);

    let scope = b.new_scope(global);
    let (five, six) = (b.i64(5), b.i64(6));
    b.program(
        "p",
        scope,
        vec![
            Stmt::call(add, vec![Some(five)]),
            Stmt::call(add, vec![Some(six)]),
            Stmt::print(vec![tv]),
        ],
    );
    assert_eq!(run(b).stdout, "11\n");
}

#[test]
fn stop_prints_and_exits_with_its_code() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let before = b.string("before");
    let after = b.string("after");
    let three = b.i32(3);
    b.program(
        "p",
        scope,
        vec![
            Stmt::print(vec![before]),
            Stmt::new(StmtKind::Stop { code: Some(three) }),
            Stmt::print(vec![after]),
        ],
    );
    let out = run(b);
    assert_eq!(out.stdout, "before\nSTOP\n");
    assert_eq!(out.exit_code, 3);
}

#[test]
fn error_stop_exits_with_failure() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    b.program("p", scope, vec![Stmt::new(StmtKind::ErrorStop { code: None })]);
    let out = run(b);
    assert_eq!(out.stdout, "ERROR STOP\n");
    assert_eq!(out.exit_code, 1);
}

#[test]
fn failed_assertion_reports_its_message() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let (one, two) = (b.i32(1), b.i32(2));
    let holds = b.compare(one, CmpOp::Lt, two);
    let fails = b.compare(two, CmpOp::Lt, one);
    let msg = b.string("two is not small");
    b.program(
        "p",
        scope,
        vec![
            Stmt::new(StmtKind::Assert { test: holds, msg: None }),
            Stmt::new(StmtKind::Assert { test: fails, msg: Some(msg) }),
        ],
    );
    let out = run(b);
    assert_eq!(out.stdout, "Assertion failed: two is not small\n");
    assert_eq!(out.exit_code, 1);
}

#[test]
fn strings_are_copied_on_assignment() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let s = b.variable(scope, "s", Ty::string());
    let t = b.variable(scope, "t", Ty::string());
    let (sv, tv) = (b.var(s), b.var(t));
    let abc = b.string("abc");
    let xyz = b.string("xyz");
    let joined = b.concat(sv, tv);
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(sv, abc),
            Stmt::assign(tv, sv),
            Stmt::assign(sv, xyz),
            Stmt::print(vec![sv, tv]),
            Stmt::assign(sv, joined),
            Stmt::print(vec![sv]),
        ],
    );
    assert_eq!(run(b).stdout, "xyz abc\nxyzabc\n");
}

#[test]
fn list_assignment_is_a_deep_copy() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let nested = Ty::list(Ty::list(Ty::i32()));
    let a = b.variable(scope, "a", nested.clone());
    let c = b.variable(scope, "c", nested);
    let (av, cv) = (b.var(a), b.var(c));
    let (one, two, three) = (b.i32(1), b.i32(2), b.i32(3));
    let inner = b.list(vec![one, two], Ty::i32());
    let outer = b.list(vec![inner], Ty::list(Ty::i32()));
    let zero = b.i32(0);
    let first = b.list_item(cv, zero);
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(av, outer),
            Stmt::assign(cv, av),
            Stmt::new(StmtKind::ListAppend { list: first, element: three }),
            Stmt::print(vec![av, cv]),
        ],
    );
    assert_eq!(run(b).stdout, "[[1, 2]] [[1, 2, 3]]\n");
}

#[test]
fn list_statements_edit_in_place() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let l = b.variable(scope, "l", Ty::list(Ty::i32()));
    let lv = b.var(l);
    let items: Vec<_> = [4, 5, 6].into_iter().map(|n| b.i32(n)).collect();
    let literal = b.list(items, Ty::i32());
    let (zero, nine, five) = (b.i32(0), b.i32(9), b.i32(5));
    let len = b.list_len(lv);
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(lv, literal),
            Stmt::new(StmtKind::ListInsert { list: lv, index: zero, element: nine }),
            Stmt::new(StmtKind::ListRemove { list: lv, element: five }),
            Stmt::new(StmtKind::ListReverse(lv)),
            Stmt::print(vec![lv, len]),
            Stmt::new(StmtKind::ListClear(lv)),
            Stmt::print(vec![lv, len]),
        ],
    );
    assert_eq!(run(b).stdout, "[6, 4, 9] 3\n[] 0\n");
}

#[test]
fn list_index_out_of_range_is_a_runtime_error() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let l = b.variable(scope, "l", Ty::list(Ty::i32()));
    let lv = b.var(l);
    let one = b.i32(1);
    let literal = b.list(vec![one], Ty::i32());
    let two = b.i32(2);
    let item = b.list_item(lv, two);
    b.program(
        "p",
        scope,
        vec![Stmt::assign(lv, literal), Stmt::print(vec![item])],
    );
    let out = run(b);
    assert_eq!(out.exit_code, 1);
    assert_eq!(out.stdout, "");
    assert_eq!(
        out.stderr,
        "IndexError: List index is out of range. Index range is (0, 0), but index is 2\n"
    );
}

/// `d[k] = k * k` for `k` in `1..=n`, then print `d[n]`, `len(d)` and the
/// membership of `0`.
fn squares_program(n: i64) -> AsrBuilder {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let d = b.variable(scope, "d", Ty::dict(Ty::i32(), Ty::i64()));
    let k = b.variable(scope, "k", Ty::i32());
    let sq = b.variable(scope, "sq", Ty::i64());
    let (dv, kv, sqv) = (b.var(d), b.var(k), b.var(sq));
    let (one, last) = (b.i32(1), b.i32(n));
    let head = b.do_head(k, one, last, None);
    let wide = b.cast(kv, CastKind::IntegerToInteger, Ty::i64());
    let square = b.mul(wide, wide);
    let item = b.dict_item(dv, last, None);
    let len = b.expr(ExprKind::DictLen(dv), Ty::i32());
    let zero = b.i32(0);
    let has_zero = b.expr(ExprKind::DictContains { dict: dv, key: zero }, Ty::logical());
    b.program(
        "p",
        scope,
        vec![
            Stmt::do_loop(
                head,
                vec![
                    Stmt::assign(sqv, square),
                    Stmt::new(StmtKind::DictInsert { dict: dv, key: kv, value: sqv }),
                ],
            ),
            Stmt::print(vec![item, len, has_zero]),
        ],
    );
    b
}

#[test]
fn dicts_grow_under_both_strategies() {
    for strategy in [HashStrategy::LinearProbing, HashStrategy::SeparateChaining] {
        let options = LoweringOptions::default().with_dict_strategy(strategy);
        let out = run_with(squares_program(200), &options);
        assert_eq!(out.stdout, "40000 200 0\n", "{strategy:?}");
    }
}

#[test]
fn missing_dict_key_is_a_runtime_error() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let d = b.variable(scope, "d", Ty::dict(Ty::string(), Ty::i32()));
    let dv = b.var(d);
    let key = b.string("a");
    let one = b.i32(1);
    let literal = b.dict(vec![key], vec![one], Ty::string(), Ty::i32());
    let other = b.string("b");
    let item = b.dict_item(dv, other, None);
    let fallback = b.i32(-1);
    let defaulted = b.dict_item(dv, other, Some(fallback));
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(dv, literal),
            Stmt::print(vec![defaulted]),
            Stmt::print(vec![item]),
        ],
    );
    let out = run(b);
    assert_eq!(out.stdout, "-1\n");
    assert_eq!(out.exit_code, 1);
    assert_eq!(out.stderr, "KeyError: The dict does not contain the specified key\n");
}

#[test]
fn sets_ignore_duplicates() {
    for strategy in [HashStrategy::LinearProbing, HashStrategy::SeparateChaining] {
        let mut b = AsrBuilder::new();
        let scope = program_scope(&mut b);
        let s = b.variable(scope, "s", Ty::set(Ty::i32()));
        let sv = b.var(s);
        let items: Vec<_> = [1, 2, 2, 3, 1].into_iter().map(|n| b.i32(n)).collect();
        let literal = b.set(items, Ty::i32());
        let (two, seven) = (b.i32(2), b.i32(7));
        let len = b.expr(ExprKind::SetLen(sv), Ty::i32());
        let has_two = b.expr(ExprKind::SetContains { set: sv, element: two }, Ty::logical());
        b.program(
            "p",
            scope,
            vec![
                Stmt::assign(sv, literal),
                Stmt::new(StmtKind::SetAdd { set: sv, element: seven }),
                Stmt::new(StmtKind::SetDiscard { set: sv, element: two }),
                Stmt::print(vec![len, has_two]),
            ],
        );
        let options = LoweringOptions::default().with_set_strategy(strategy);
        assert_eq!(run_with(b, &options).stdout, "3 0\n", "{strategy:?}");
    }
}

#[test]
fn tuples_print_their_elements() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let one = b.i32(1);
    let name = b.string("x");
    let pair = b.tuple(vec![one, name]);
    let pair_ty = b.ty(pair).clone();
    let t = b.variable(scope, "t", pair_ty);
    let tv = b.var(t);
    let first = b.tuple_item(tv, 0);
    b.program(
        "p",
        scope,
        vec![Stmt::assign(tv, pair), Stmt::print(vec![tv]), Stmt::print(vec![first])],
    );
    assert_eq!(run(b).stdout, "(1, 'x')\n1\n");
}

#[test]
fn dict_insert_reads_its_value_from_the_same_dict() {
    for strategy in [HashStrategy::LinearProbing, HashStrategy::SeparateChaining] {
        let mut b = AsrBuilder::new();
        let scope = program_scope(&mut b);
        let d = b.variable(scope, "d", Ty::dict(Ty::i32(), Ty::i32()));
        let k = b.variable(scope, "k", Ty::i32());
        let (dv, kv) = (b.var(d), b.var(k));
        let (one, seven, two, forty) = (b.i32(1), b.i32(7), b.i32(2), b.i32(40));
        let first = b.dict_item(dv, one, None);
        let head = b.do_head(k, two, forty, None);
        let last = b.dict_item(dv, forty, None);
        b.program(
            "p",
            scope,
            vec![
                Stmt::new(StmtKind::DictInsert { dict: dv, key: one, value: seven }),
                Stmt::do_loop(
                    head,
                    vec![Stmt::new(StmtKind::DictInsert { dict: dv, key: kv, value: first })],
                ),
                Stmt::print(vec![last]),
            ],
        );
        let options = LoweringOptions::default().with_dict_strategy(strategy);
        assert_eq!(run_with(b, &options).stdout, "7\n", "{strategy:?}");
    }
}

#[test]
fn list_growth_reads_its_element_from_the_same_list() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let l = b.variable(scope, "l", Ty::list(Ty::string()));
    let k = b.variable(scope, "k", Ty::i32());
    let lv = b.var(l);
    let a = b.string("a");
    let literal = b.list(vec![a], Ty::string());
    let (zero, one, twenty) = (b.i32(0), b.i32(1), b.i32(20));
    let front = b.list_item(lv, zero);
    let head = b.do_head(k, one, twenty, None);
    let back = b.list_item(lv, twenty);
    let len = b.list_len(lv);
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(lv, literal),
            Stmt::do_loop(
                head,
                vec![
                    Stmt::new(StmtKind::ListAppend { list: lv, element: front }),
                    Stmt::new(StmtKind::ListInsert { list: lv, index: one, element: front }),
                ],
            ),
            Stmt::print(vec![len, back]),
        ],
    );
    let options = LoweringOptions::default().with_initial_list_capacity(1);
    assert_eq!(run_with(b, &options).stdout, "41 a\n");
}

#[test]
fn list_item_assignment_replaces_one_element() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let l = b.variable(scope, "l", Ty::list(Ty::string()));
    let lv = b.var(l);
    let (a, bee, z) = (b.string("a"), b.string("b"), b.string("z"));
    let literal = b.list(vec![a, bee], Ty::string());
    let (zero, one) = (b.i32(0), b.i32(1));
    let (first, second) = (b.list_item(lv, zero), b.list_item(lv, one));
    let len = b.list_len(lv);
    b.program(
        "p",
        scope,
        vec![
            Stmt::assign(lv, literal),
            Stmt::assign(second, first),
            Stmt::assign(first, z),
            Stmt::assign(first, first),
            Stmt::print(vec![lv]),
            Stmt::new(StmtKind::ListClear(lv)),
            Stmt::print(vec![lv, len]),
        ],
    );
    assert_eq!(run(b).stdout, "['z', 'a']\n[] 0\n");
}

#[test]
fn list_item_assignment_checks_its_index() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let l = b.variable(scope, "l", Ty::list(Ty::i32()));
    let lv = b.var(l);
    let one = b.i32(1);
    let literal = b.list(vec![one], Ty::i32());
    let five = b.i32(5);
    let slot = b.list_item(lv, five);
    b.program("p", scope, vec![Stmt::assign(lv, literal), Stmt::assign(slot, one)]);
    let out = run(b);
    assert_eq!(out.exit_code, 1);
    assert_eq!(
        out.stderr,
        "IndexError: List index is out of range. Index range is (0, 0), but index is 5\n"
    );
}

#[test]
fn list_index_accepts_negative_bounds() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    let l = b.variable(scope, "l", Ty::list(Ty::i32()));
    let lv = b.var(l);
    let items: Vec<_> = [4, 5, 6].into_iter().map(|n| b.i32(n)).collect();
    let literal = b.list(items, Ty::i32());
    let (four, five, six) = (b.i32(4), b.i32(5), b.i32(6));
    let (minus_one, minus_two, minus_nine) = (b.i32(-1), b.i32(-2), b.i32(-9));
    let from_end = b.expr(
        ExprKind::ListIndex { list: lv, element: six, start: Some(minus_two), end: None },
        Ty::i32(),
    );
    let clamped = b.expr(
        ExprKind::ListIndex { list: lv, element: four, start: Some(minus_nine), end: None },
        Ty::i32(),
    );
    let window = b.expr(
        ExprKind::ListIndex {
            list: lv,
            element: five,
            start: Some(minus_nine),
            end: Some(minus_one),
        },
        Ty::i32(),
    );
    b.program(
        "p",
        scope,
        vec![Stmt::assign(lv, literal), Stmt::print(vec![from_end, clamped, window])],
    );
    assert_eq!(run(b).stdout, "2 0 1\n");
}

#[test]
fn module_cycles_are_reported() {
    let mut b = AsrBuilder::new();
    b.module("a", &["b"]);
    b.module("b", &["a"]);
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    assert!(asr_to_llvm(&unit, &LoweringOptions::default(), &mut diags).is_err());
    assert_eq!(diags.error_count(), 1);
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.code, ErrorCode::E4001);
    assert_eq!(diag.message, "module dependency cycle: a -> b -> a");
    assert_eq!(diag.notes, vec!["`a` depends on itself".to_string()]);
}

#[test]
fn unsupported_constructs_are_diagnosed_not_panicked() {
    let mut b = AsrBuilder::new();
    let scope = program_scope(&mut b);
    b.program("p", scope, vec![Stmt::new(StmtKind::Exit)]);
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    assert!(asr_to_llvm(&unit, &LoweringOptions::default(), &mut diags).is_err());
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.code, ErrorCode::E3002);
    assert!(diag.message.contains("outside a loop"), "{}", diag.message);
}
