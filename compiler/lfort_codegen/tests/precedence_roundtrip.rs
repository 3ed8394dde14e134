//! Printed integer expressions re-parse to the value of the tree they came
//! from, so every dropped parenthesis was redundant.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use lfort_codegen::expr::emit_expr;
use lfort_codegen::{asr_to_cpp, CodegenContext, CppOptions};
use lfort_diagnostic::Diagnostics;
use lfort_ir::{AsrBuilder, ExprId, Stmt, Ty};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Add,
    Sub,
    Mul,
}

#[derive(Clone, Debug)]
enum Tree {
    Lit(i64),
    Neg(Box<Tree>),
    Bin(Op, Box<Tree>, Box<Tree>),
}

impl Tree {
    fn eval(&self) -> i64 {
        match self {
            Tree::Lit(n) => *n,
            Tree::Neg(t) => t.eval().wrapping_neg(),
            Tree::Bin(op, l, r) => {
                let (l, r) = (l.eval(), r.eval());
                match op {
                    Op::Add => l.wrapping_add(r),
                    Op::Sub => l.wrapping_sub(r),
                    Op::Mul => l.wrapping_mul(r),
                }
            }
        }
    }

    fn build(&self, b: &mut AsrBuilder) -> ExprId {
        match self {
            Tree::Lit(n) => b.i64(*n),
            Tree::Neg(t) => {
                let inner = t.build(b);
                b.neg(inner)
            }
            Tree::Bin(op, l, r) => {
                let l = l.build(b);
                let r = r.build(b);
                match op {
                    Op::Add => b.add(l, r),
                    Op::Sub => b.sub(l, r),
                    Op::Mul => b.mul(l, r),
                }
            }
        }
    }
}

fn tree_strategy() -> impl Strategy<Value = Tree> {
    let leaf = (-50i64..50).prop_map(Tree::Lit);
    leaf.prop_recursive(6, 48, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| Tree::Neg(Box::new(t))),
            (
                prop_oneof![Just(Op::Add), Just(Op::Sub), Just(Op::Mul)],
                inner.clone(),
                inner
            )
                .prop_map(|(op, l, r)| Tree::Bin(op, Box::new(l), Box::new(r))),
        ]
    })
}

/// Recursive-descent evaluator for the C++ subset the printer produces.
struct Parser<'s> {
    src: &'s [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&mut self) -> Option<u8> {
        while self.src.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        self.src.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) {
        assert_eq!(self.peek(), Some(c), "at byte {}", self.pos);
        self.pos += 1;
    }

    fn additive(&mut self) -> i64 {
        let mut acc = self.multiplicative();
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    acc = acc.wrapping_add(self.multiplicative());
                }
                Some(b'-') => {
                    self.pos += 1;
                    acc = acc.wrapping_sub(self.multiplicative());
                }
                _ => return acc,
            }
        }
    }

    fn multiplicative(&mut self) -> i64 {
        let mut acc = self.unary();
        while self.peek() == Some(b'*') {
            self.pos += 1;
            acc = acc.wrapping_mul(self.unary());
        }
        acc
    }

    fn unary(&mut self) -> i64 {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                self.unary().wrapping_neg()
            }
            Some(b'(') => {
                self.pos += 1;
                let v = self.additive();
                self.expect(b')');
                v
            }
            _ => {
                let start = self.pos;
                while self.src.get(self.pos).is_some_and(u8::is_ascii_digit) {
                    self.pos += 1;
                }
                std::str::from_utf8(&self.src[start..self.pos])
                    .unwrap()
                    .parse()
                    .unwrap()
            }
        }
    }
}

fn parse(text: &str) -> i64 {
    let mut p = Parser {
        src: text.as_bytes(),
        pos: 0,
    };
    let v = p.additive();
    assert_eq!(p.peek(), None, "trailing input in `{text}`");
    v
}

fn print(tree: &Tree) -> String {
    let mut b = AsrBuilder::new();
    let id = tree.build(&mut b);
    let unit = b.finish();
    let options = CppOptions::default();
    let mut ctx = CodegenContext::new(&unit, &options);
    emit_expr(&mut ctx, id).unwrap().text
}

#[test]
fn known_shapes() {
    let lit = |n| Box::new(Tree::Lit(n));
    let t = Tree::Bin(
        Op::Sub,
        lit(1),
        Box::new(Tree::Bin(Op::Sub, lit(2), Box::new(Tree::Neg(lit(-3))))),
    );
    assert_eq!(print(&t), "1 - (2 - (-(-3)))");
    assert_eq!(parse(&print(&t)), t.eval());
}

#[test]
fn conditional_loop_bound_stays_one_operand() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let scope = b.new_scope(global);
    let i = b.variable(scope, "i", Ty::i32());
    let f = b.variable(scope, "f", Ty::logical());
    let fv = b.var(f);
    let (three, five) = (b.i32(3), b.i32(5));
    let bound = b.if_exp(fv, three, five);
    let one = b.i32(1);
    let head = b.do_head(i, one, bound, None);
    b.program("p", scope, vec![Stmt::do_loop(head, vec![])]);

    let unit = b.finish();
    let mut diags = Diagnostics::new();
    let source = asr_to_cpp(&unit, &CppOptions::default(), &mut diags).unwrap();
    assert!(
        source.contains("for (i=1; i<=((f) ? (3) : (5)); i++) {"),
        "{source}"
    );
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        ..ProptestConfig::default()
    })]

    #[test]
    fn printed_expressions_keep_their_value(tree in tree_strategy()) {
        let text = print(&tree);
        prop_assert!(!text.contains("--"), "decrement token in `{}`", text);
        prop_assert_eq!(parse(&text), tree.eval(), "printed as `{}`", text);
    }
}
