//! Predicate AST and evaluation.

use std::fmt;

use rust_decimal::Decimal;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Le => write!(f, "<="),
            CmpOp::Gt => write!(f, ">"),
            CmpOp::Ge => write!(f, ">="),
            CmpOp::Eq => write!(f, "=="),
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The `price` variable.
    Price,
    /// The `time` variable (minutes since local midnight).
    Time,
    /// A numeric literal.
    Number(Decimal),
    /// An `HH:MM` literal, stored as minutes since midnight.
    TimeOfDay(u32),
}

impl Operand {
    /// Parse-time kind of the operand. Comparisons must not mix kinds.
    pub(crate) fn kind(&self) -> OperandKind {
        match self {
            Operand::Price | Operand::Number(_) => OperandKind::Numeric,
            Operand::Time | Operand::TimeOfDay(_) => OperandKind::Time,
        }
    }

    fn value(&self, env: &Env) -> Decimal {
        match self {
            Operand::Price => env.price,
            Operand::Time => Decimal::from(env.time_minutes),
            Operand::Number(n) => *n,
            Operand::TimeOfDay(minutes) => Decimal::from(*minutes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperandKind {
    Numeric,
    Time,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Numeric => write!(f, "a numeric value"),
            OperandKind::Time => write!(f, "a time value"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Price => write!(f, "price"),
            Operand::Time => write!(f, "time"),
            Operand::Number(n) => write!(f, "{}", n),
            Operand::TimeOfDay(minutes) => write!(f, "{}:{:02}", minutes / 60, minutes % 60),
        }
    }
}

/// The variable environment a predicate is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Env {
    pub price: Decimal,
    pub time_minutes: u32,
}

/// A parsed predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Evaluate against `env`. Infallible: type mixing is rejected at parse
    /// time, and every comparison reduces to a `Decimal` comparison.
    pub fn eval(&self, env: &Env) -> bool {
        match self {
            Predicate::Compare { lhs, op, rhs } => {
                let l = lhs.value(env);
                let r = rhs.value(env);
                match op {
                    CmpOp::Lt => l < r,
                    CmpOp::Le => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::Ge => l >= r,
                    CmpOp::Eq => l == r,
                }
            }
            Predicate::And(l, r) => l.eval(env) && r.eval(env),
            Predicate::Or(l, r) => l.eval(env) || r.eval(env),
        }
    }

    /// True if any comparison tests `price` with `==`. Exact decimal
    /// equality on a simulated price almost never fires, so the
    /// orchestrator warns about these at startup.
    pub fn uses_price_equality(&self) -> bool {
        match self {
            Predicate::Compare { lhs, op, rhs } => {
                *op == CmpOp::Eq && (*lhs == Operand::Price || *rhs == Operand::Price)
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.uses_price_equality() || r.uses_price_equality()
            }
        }
    }

    /// The literal of the leftmost price-vs-number comparison, if any.
    /// Used to seed the simulator's starting price for an instrument.
    pub fn first_price_literal(&self) -> Option<Decimal> {
        match self {
            Predicate::Compare { lhs, rhs, .. } => match (lhs, rhs) {
                (Operand::Price, Operand::Number(n)) | (Operand::Number(n), Operand::Price) => {
                    Some(*n)
                }
                _ => None,
            },
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.first_price_literal().or_else(|| r.first_price_literal())
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Predicate::And(l, r) => {
                fmt_and_child(l, f)?;
                write!(f, " AND ")?;
                fmt_and_child(r, f)
            }
            Predicate::Or(l, r) => write!(f, "{} OR {}", l, r),
        }
    }
}

/// `AND` children that are `OR` nodes need parentheses to survive the
/// precedence of a reparse.
fn fmt_and_child(child: &Predicate, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if matches!(child, Predicate::Or(_, _)) {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn env(price: Decimal, time_minutes: u32) -> Env {
        Env {
            price,
            time_minutes,
        }
    }

    #[test]
    fn test_compare_eval() {
        let p = Predicate::Compare {
            lhs: Operand::Price,
            op: CmpOp::Gt,
            rhs: Operand::Number(dec!(100)),
        };
        assert!(p.eval(&env(dec!(101), 0)));
        assert!(!p.eval(&env(dec!(100), 0)));
    }

    #[test]
    fn test_time_compare_eval() {
        let p = Predicate::Compare {
            lhs: Operand::Time,
            op: CmpOp::Ge,
            rhs: Operand::TimeOfDay(15 * 60 + 20),
        };
        assert!(p.eval(&env(dec!(0), 920)));
        assert!(!p.eval(&env(dec!(0), 919)));
    }

    #[test]
    fn test_uses_price_equality() {
        let eq = Predicate::Compare {
            lhs: Operand::Price,
            op: CmpOp::Eq,
            rhs: Operand::Number(dec!(100)),
        };
        let ge = Predicate::Compare {
            lhs: Operand::Price,
            op: CmpOp::Ge,
            rhs: Operand::Number(dec!(100)),
        };
        assert!(eq.uses_price_equality());
        assert!(!ge.uses_price_equality());
        assert!(Predicate::Or(Box::new(ge), Box::new(eq)).uses_price_equality());
    }

    #[test]
    fn test_first_price_literal() {
        let time_cmp = Predicate::Compare {
            lhs: Operand::Time,
            op: CmpOp::Ge,
            rhs: Operand::TimeOfDay(570),
        };
        let price_cmp = Predicate::Compare {
            lhs: Operand::Price,
            op: CmpOp::Gt,
            rhs: Operand::Number(dec!(20100)),
        };
        let p = Predicate::And(Box::new(time_cmp.clone()), Box::new(price_cmp));
        assert_eq!(p.first_price_literal(), Some(dec!(20100)));
        assert_eq!(time_cmp.first_price_literal(), None);
    }

    #[test]
    fn test_time_of_day_display() {
        assert_eq!(Operand::TimeOfDay(920).to_string(), "15:20");
        assert_eq!(Operand::TimeOfDay(9 * 60 + 5).to_string(), "9:05");
    }
}
