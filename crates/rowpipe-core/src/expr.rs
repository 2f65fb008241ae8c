//! Resolved expression trees.
//!
//! The planner hands us expressions already bound to input column positions.
//! Evaluation lives in `rowpipe-operators::expr`; this module is pure data.

use serde::{Deserialize, Serialize};

use crate::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarFunction {
    /// `concat(a, b, ...)`: nulls are skipped.
    Concat,
    /// `concat_ws(sep, a, b, ...)`: null separator yields null, null args are skipped.
    ConcatWs,
    /// `exp(x)` as double precision.
    Exp,
    /// `quote_ident(text)`: quotes the identifier if it is not a plain lowercase name.
    QuoteIdent,
}

impl ScalarFunction {
    pub fn name(self) -> &'static str {
        match self {
            ScalarFunction::Concat => "concat",
            ScalarFunction::ConcatWs => "concat_ws",
            ScalarFunction::Exp => "exp",
            ScalarFunction::QuoteIdent => "quote_ident",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Value at the given input column position.
    Column(usize),
    Literal(Scalar),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    Call {
        function: ScalarFunction,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn col(idx: usize) -> Self {
        Expr::Column(idx)
    }

    pub fn lit(value: impl Into<Scalar>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expr, right: Expr) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn negate(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    pub fn is_null(inner: Expr) -> Self {
        Expr::IsNull(Box::new(inner))
    }

    pub fn call(function: ScalarFunction, args: Vec<Expr>) -> Self {
        Expr::Call { function, args }
    }

    /// `[Column(0), .., Column(n - 1)]`.
    pub fn identity(n: usize) -> Vec<Expr> {
        (0..n).map(Expr::Column).collect()
    }

    /// True if `outputs` selects every input column in order and nothing else,
    /// given the input arity is `outputs.len()`.
    pub fn is_identity(outputs: &[Expr]) -> bool {
        outputs
            .iter()
            .enumerate()
            .all(|(i, e)| matches!(e, Expr::Column(c) if *c == i))
    }
}
