//! C++ operator precedence and parenthesization.
//!
//! Numbers follow the cppreference precedence table: a smaller number binds
//! tighter. Every emitted expression carries its own precedence so the
//! parent can decide whether the child needs parentheses.

/// Literals, names, calls, casts, subscripts.
pub const ATOM: u8 = 2;
/// Unary `-`, `!`, `~`.
pub const UNARY: u8 = 3;
pub const MULTIPLICATIVE: u8 = 5;
pub const ADDITIVE: u8 = 6;
pub const SHIFT: u8 = 7;
/// `<`, `<=`, `>`, `>=`.
pub const RELATIONAL: u8 = 9;
/// `==`, `!=`.
pub const EQUALITY: u8 = 10;
pub const BIT_AND: u8 = 11;
pub const BIT_XOR: u8 = 12;
pub const BIT_OR: u8 = 13;
pub const LOGICAL_AND: u8 = 14;
pub const LOGICAL_OR: u8 = 15;
/// `?:`.
pub const CONDITIONAL: u8 = 16;

/// An emitted expression and the precedence of its outermost operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub prec: u8,
}

impl Fragment {
    pub fn new(text: impl Into<String>, prec: u8) -> Self {
        Fragment {
            text: text.into(),
            prec,
        }
    }

    pub fn atom(text: impl Into<String>) -> Self {
        Fragment::new(text, ATOM)
    }

    pub fn parenthesized(&self) -> String {
        format!("({})", self.text)
    }
}

/// Whether a binary operator is associative for the purpose of dropping
/// parentheses around an equal-precedence right operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Assoc {
    /// `a + (b + c)` may print as `a + b + c`.
    Associative,
    /// `a - (b - c)` must keep its parentheses.
    LeftOnly,
}

/// Left operand of an infix operator of precedence `parent`.
///
/// Unary operands are always wrapped so that `-a * b` prints as `(-a)*b`.
pub fn left_operand(child: &Fragment, parent: u8) -> String {
    if child.prec == UNARY || child.prec > parent {
        child.parenthesized()
    } else {
        child.text.clone()
    }
}

/// Right operand of an infix operator of precedence `parent`.
pub fn right_operand(child: &Fragment, parent: u8, assoc: Assoc) -> String {
    let wrap = match assoc {
        _ if child.prec == UNARY => true,
        Assoc::Associative => child.prec > parent,
        Assoc::LeftOnly => child.prec >= parent,
    };
    if wrap {
        child.parenthesized()
    } else {
        child.text.clone()
    }
}

/// `left op right` with both operands parenthesized as needed.
pub fn infix(left: &Fragment, op: &str, right: &Fragment, prec: u8, assoc: Assoc) -> Fragment {
    Fragment::new(
        format!(
            "{}{op}{}",
            left_operand(left, prec),
            right_operand(right, prec, assoc)
        ),
        prec,
    )
}

/// Prefix operator applied to `operand`.
///
/// A unary operand under `-` is wrapped as well, so `-(-x)` never becomes
/// the decrement token `--x`.
pub fn prefix(op: &str, operand: &Fragment) -> Fragment {
    let wrap = operand.prec > UNARY || (op == "-" && operand.prec == UNARY);
    let text = if wrap {
        format!("{op}{}", operand.parenthesized())
    } else {
        format!("{op}{}", operand.text)
    };
    Fragment::new(text, UNARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_keeps_right_parens() {
        let a = Fragment::atom("a");
        let bc = Fragment::new("b - c", ADDITIVE);
        assert_eq!(infix(&a, " - ", &bc, ADDITIVE, Assoc::LeftOnly).text, "a - (b - c)");
        assert_eq!(infix(&a, " + ", &bc, ADDITIVE, Assoc::Associative).text, "a + b - c");
        assert_eq!(infix(&bc, " - ", &a, ADDITIVE, Assoc::LeftOnly).text, "b - c - a");
    }

    #[test]
    fn looser_children_are_wrapped() {
        let sum = Fragment::new("a + b", ADDITIVE);
        let c = Fragment::atom("c");
        assert_eq!(infix(&sum, "*", &c, MULTIPLICATIVE, Assoc::Associative).text, "(a + b)*c");
        assert_eq!(infix(&c, "*", &sum, MULTIPLICATIVE, Assoc::Associative).text, "c*(a + b)");
    }

    #[test]
    fn unary_operands() {
        let x = Fragment::atom("x");
        let neg = prefix("-", &x);
        assert_eq!(neg.text, "-x");
        assert_eq!(prefix("-", &neg).text, "-(-x)");
        assert_eq!(prefix("!", &prefix("!", &x)).text, "!!x");
        assert_eq!(infix(&neg, "*", &x, MULTIPLICATIVE, Assoc::Associative).text, "(-x)*x");
        let sum = Fragment::new("a + b", ADDITIVE);
        assert_eq!(prefix("~", &sum).text, "~(a + b)");
    }
}
