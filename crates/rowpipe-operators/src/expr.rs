//! Expression evaluation against a row.
//!
//! SQL three-valued logic: comparisons with `NULL` yield `NULL`, `AND`/`OR`
//! short-circuit on a dominating operand, and only `Bool(true)` passes a
//! predicate. Operand type errors are reported as [`OpError::Evaluation`].

use std::cmp::Ordering;

use rowpipe_core::expr::{CompareOp, Expr, ScalarFunction};
use rowpipe_core::row::{OwnedRow, Row};
use rowpipe_core::types::{compare_values, Scalar};
use rowpipe_mem::{MemoryManager, ScratchBuffer};

use crate::traits::OpError;

/// Evaluates expressions; owns the scratch buffer string functions write into.
pub struct Evaluator {
    scratch: ScratchBuffer,
}

impl Evaluator {
    pub fn new(memory: &MemoryManager, label: &'static str) -> Self {
        Self {
            scratch: memory.scratch(label),
        }
    }

    pub fn eval(&mut self, expr: &Expr, row: &Row) -> Result<Scalar, OpError> {
        match expr {
            Expr::Column(idx) => row.get(*idx).cloned().ok_or_else(|| {
                OpError::Evaluation(format!(
                    "input column {idx} out of bounds for row of arity {}",
                    row.len()
                ))
            }),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Compare { op, left, right } => {
                let l = self.eval(left, row)?;
                let r = self.eval(right, row)?;
                compare(*op, &l, &r)
            }
            Expr::And(left, right) => {
                let l = as_bool(self.eval(left, row)?, "AND")?;
                if l == Some(false) {
                    return Ok(Scalar::Bool(false));
                }
                let r = as_bool(self.eval(right, row)?, "AND")?;
                Ok(match (l, r) {
                    (_, Some(false)) => Scalar::Bool(false),
                    (Some(true), Some(true)) => Scalar::Bool(true),
                    _ => Scalar::Null,
                })
            }
            Expr::Or(left, right) => {
                let l = as_bool(self.eval(left, row)?, "OR")?;
                if l == Some(true) {
                    return Ok(Scalar::Bool(true));
                }
                let r = as_bool(self.eval(right, row)?, "OR")?;
                Ok(match (l, r) {
                    (_, Some(true)) => Scalar::Bool(true),
                    (Some(false), Some(false)) => Scalar::Bool(false),
                    _ => Scalar::Null,
                })
            }
            Expr::Not(inner) => Ok(match as_bool(self.eval(inner, row)?, "NOT")? {
                Some(b) => Scalar::Bool(!b),
                None => Scalar::Null,
            }),
            Expr::IsNull(inner) => Ok(Scalar::Bool(self.eval(inner, row)?.is_null())),
            Expr::Call { function, args } => self.call(*function, args, row),
        }
    }

    /// `true` only if the predicate evaluates to `Bool(true)`.
    pub fn eval_predicate(&mut self, predicate: &Expr, row: &Row) -> Result<bool, OpError> {
        Ok(as_bool(self.eval(predicate, row)?, "WHERE")? == Some(true))
    }

    fn call(
        &mut self,
        function: ScalarFunction,
        args: &[Expr],
        row: &Row,
    ) -> Result<Scalar, OpError> {
        let values = args
            .iter()
            .map(|a| self.eval(a, row))
            .collect::<Result<Vec<_>, _>>()?;
        match function {
            ScalarFunction::Concat => self.join_strings("", &values),
            ScalarFunction::ConcatWs => {
                let (sep, rest) = values.split_first().ok_or_else(|| arity(function, 1))?;
                match sep {
                    Scalar::Null => Ok(Scalar::Null),
                    Scalar::Str(sep) => self.join_strings(sep, rest),
                    other => Err(OpError::Evaluation(format!(
                        "concat_ws separator must be text, got {}",
                        other.data_type()
                    ))),
                }
            }
            ScalarFunction::Exp => {
                let [value] = values.as_slice() else {
                    return Err(arity(function, 1));
                };
                match value {
                    Scalar::Null => Ok(Scalar::Null),
                    v => v.as_f64().map(|x| Scalar::F64(x.exp())).ok_or_else(|| {
                        OpError::Evaluation(format!("exp expects a number, got {}", v.data_type()))
                    }),
                }
            }
            ScalarFunction::QuoteIdent => {
                let [value] = values.as_slice() else {
                    return Err(arity(function, 1));
                };
                match value {
                    Scalar::Null => Ok(Scalar::Null),
                    Scalar::Str(s) => self.quote_ident(s),
                    v => Err(OpError::Evaluation(format!(
                        "quote_ident expects text, got {}",
                        v.data_type()
                    ))),
                }
            }
        }
    }

    /// Concatenate the text form of every non-null value.
    fn join_strings(&mut self, sep: &str, values: &[Scalar]) -> Result<Scalar, OpError> {
        self.scratch.clear();
        let mut first = true;
        for value in values.iter().filter(|v| !v.is_null()) {
            if !first {
                self.scratch.push_str(sep)?;
            }
            first = false;
            match value {
                Scalar::Str(s) => self.scratch.push_str(s)?,
                other => self.scratch.push_str(&other.to_string())?,
            }
        }
        Ok(Scalar::Str(self.scratch.as_str().to_owned()))
    }

    fn quote_ident(&mut self, ident: &str) -> Result<Scalar, OpError> {
        if is_plain_identifier(ident) {
            return Ok(Scalar::Str(ident.to_owned()));
        }
        self.scratch.clear();
        self.scratch.push_char('"')?;
        for c in ident.chars() {
            if c == '"' {
                self.scratch.push_char('"')?;
            }
            self.scratch.push_char(c)?;
        }
        self.scratch.push_char('"')?;
        Ok(Scalar::Str(self.scratch.as_str().to_owned()))
    }

    /// Hand back the scratch memory.
    pub fn release(&mut self) {
        self.scratch.release();
    }
}

fn arity(function: ScalarFunction, expected: usize) -> OpError {
    OpError::Evaluation(format!(
        "{} expects {expected} argument(s)",
        function.name()
    ))
}

/// Reserved words that must be quoted even when lowercase. Sorted.
const RESERVED_KEYWORDS: &[&str] = &[
    "add", "all", "alter", "and", "any", "array", "as", "asc", "between", "by", "called",
    "case", "cast", "column", "constraint", "costs", "create", "cross", "current_date",
    "current_schema", "current_time", "current_timestamp", "current_user", "default",
    "delete", "deny", "desc", "describe", "directory", "distinct", "drop", "else", "end",
    "escape", "except", "exists", "extract", "false", "first", "for", "from", "full",
    "function", "grant", "group", "having", "if", "in", "index", "inner", "input", "insert",
    "intersect", "into", "is", "join", "last", "left", "like", "limit", "match", "natural",
    "not", "null", "nulls", "object", "offset", "on", "or", "order", "outer", "persistent",
    "recursive", "reset", "returns", "revoke", "right", "select", "session_user", "set",
    "some", "stratify", "table", "then", "transient", "true", "try_cast", "unbounded",
    "union", "update", "user", "using", "when", "where", "with",
];

/// Lowercase ASCII identifier, not a reserved word, that never needs quoting.
fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && RESERVED_KEYWORDS.binary_search(&s).is_err()
}

fn as_bool(value: Scalar, context: &str) -> Result<Option<bool>, OpError> {
    match value {
        Scalar::Null => Ok(None),
        Scalar::Bool(b) => Ok(Some(b)),
        other => Err(OpError::Evaluation(format!(
            "{context} operand must be boolean, got {}",
            other.data_type()
        ))),
    }
}

fn compare(op: CompareOp, l: &Scalar, r: &Scalar) -> Result<Scalar, OpError> {
    if l.is_null() || r.is_null() {
        return Ok(Scalar::Null);
    }
    let (lt, rt) = (l.data_type(), r.data_type());
    if lt != rt && !(lt.is_numeric() && rt.is_numeric()) {
        return Err(OpError::Evaluation(format!("cannot compare {lt} with {rt}")));
    }
    let ord = compare_values(l, r);
    let result = match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::NotEq => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::LtEq => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::GtEq => ord != Ordering::Less,
    };
    Ok(Scalar::Bool(result))
}

/// Output column list of a stage. Identity outputs pass rows through untouched.
pub struct OutputProjection {
    outputs: Vec<Expr>,
    identity: bool,
    evaluator: Evaluator,
    row: OwnedRow,
}

impl OutputProjection {
    pub fn new(outputs: Vec<Expr>, evaluator: Evaluator) -> Self {
        let identity = Expr::is_identity(&outputs);
        Self {
            row: Vec::with_capacity(outputs.len()),
            outputs,
            identity,
            evaluator,
        }
    }

    fn passes_through(&self, input: &Row) -> bool {
        self.identity && input.len() == self.outputs.len()
    }

    /// Evaluate into the internal buffer; read it back with [`Self::row`].
    pub fn project(&mut self, input: &Row) -> Result<(), OpError> {
        if self.passes_through(input) {
            return Ok(());
        }
        self.row.clear();
        for expr in &self.outputs {
            let value = self.evaluator.eval(expr, input)?;
            self.row.push(value);
        }
        Ok(())
    }

    /// The projected row for the `input` last passed to [`Self::project`].
    pub fn row<'a>(&'a self, input: &'a Row) -> &'a Row {
        if self.passes_through(input) {
            input
        } else {
            &self.row
        }
    }

    /// Project an owned row, reusing it when outputs are the identity.
    pub fn project_owned(&mut self, input: OwnedRow) -> Result<OwnedRow, OpError> {
        if self.passes_through(&input) {
            return Ok(input);
        }
        self.outputs
            .iter()
            .map(|expr| self.evaluator.eval(expr, &input))
            .collect()
    }

    pub fn release(&mut self) {
        self.row = Vec::new();
        self.evaluator.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::row;
    use rowpipe_mem::RamAccounting;

    fn evaluator() -> Evaluator {
        Evaluator::new(&MemoryManager::new(RamAccounting::no_accounting()), "test")
    }

    #[test]
    fn null_comparison_is_not_true() {
        let mut ev = evaluator();
        let pred = Expr::equals(Expr::col(0), Expr::lit(1));
        assert!(!ev.eval_predicate(&pred, &row![Scalar::Null]).unwrap());
        assert!(ev.eval_predicate(&pred, &row![1i64]).unwrap());
    }

    #[test]
    fn three_valued_and_or() {
        let mut ev = evaluator();
        let null_and_false = Expr::and(Expr::lit(Scalar::Null), Expr::lit(false));
        assert_eq!(ev.eval(&null_and_false, &[]).unwrap(), Scalar::Bool(false));
        let null_or_true = Expr::or(Expr::lit(Scalar::Null), Expr::lit(true));
        assert_eq!(ev.eval(&null_or_true, &[]).unwrap(), Scalar::Bool(true));
        let null_and_true = Expr::and(Expr::lit(Scalar::Null), Expr::lit(true));
        assert_eq!(ev.eval(&null_and_true, &[]).unwrap(), Scalar::Null);
    }

    #[test]
    fn comparing_text_with_number_is_an_error() {
        let mut ev = evaluator();
        let pred = Expr::equals(Expr::col(0), Expr::lit(2));
        assert!(matches!(
            ev.eval_predicate(&pred, &row!["two"]),
            Err(OpError::Evaluation(_))
        ));
    }

    #[test]
    fn concat_ws_skips_nulls() {
        let mut ev = evaluator();
        let e = Expr::call(
            ScalarFunction::ConcatWs,
            vec![Expr::lit(", "), Expr::col(0), Expr::col(1), Expr::col(2)],
        );
        let out = ev.eval(&e, &row!["a", Scalar::Null, 3]).unwrap();
        assert_eq!(out, Scalar::from("a, 3"));

        let null_sep = Expr::call(ScalarFunction::ConcatWs, vec![Expr::lit(Scalar::Null), Expr::col(0)]);
        assert_eq!(ev.eval(&null_sep, &row!["a"]).unwrap(), Scalar::Null);
    }

    #[test]
    fn quote_ident_quotes_only_when_needed() {
        let mut ev = evaluator();
        let e = Expr::call(ScalarFunction::QuoteIdent, vec![Expr::col(0)]);
        assert_eq!(ev.eval(&e, &row!["users"]).unwrap(), Scalar::from("users"));
        assert_eq!(ev.eval(&e, &row!["Users"]).unwrap(), Scalar::from("\"Users\""));
        assert_eq!(ev.eval(&e, &row!["a\"b"]).unwrap(), Scalar::from("\"a\"\"b\""));
    }

    #[test]
    fn quote_ident_quotes_reserved_words() {
        let mut ev = evaluator();
        let e = Expr::call(ScalarFunction::QuoteIdent, vec![Expr::col(0)]);
        assert_eq!(ev.eval(&e, &row!["select"]).unwrap(), Scalar::from("\"select\""));
        assert_eq!(ev.eval(&e, &row!["order"]).unwrap(), Scalar::from("\"order\""));
        assert_eq!(ev.eval(&e, &row!["selected"]).unwrap(), Scalar::from("selected"));
    }

    #[test]
    fn reserved_words_are_sorted() {
        assert!(RESERVED_KEYWORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn exp_of_zero_is_one() {
        let mut ev = evaluator();
        let e = Expr::call(ScalarFunction::Exp, vec![Expr::col(0)]);
        assert_eq!(ev.eval(&e, &row![0]).unwrap(), Scalar::F64(1.0));
        assert_eq!(ev.eval(&e, &row![Scalar::Null]).unwrap(), Scalar::Null);
    }

    #[test]
    fn scratch_memory_fails_when_quota_is_exhausted() {
        use rowpipe_core::id::JobId;
        use rowpipe_mem::CircuitBreaker;

        let ram = RamAccounting::new(JobId::random(), CircuitBreaker::new("query", 1 << 20), Some(100));
        let mut ev = Evaluator::new(&MemoryManager::new(ram), "concat");
        let e = Expr::call(ScalarFunction::Concat, vec![Expr::col(0), Expr::col(0)]);
        let long = "x".repeat(80);
        assert!(matches!(
            ev.eval(&e, &row![long.as_str()]),
            Err(OpError::Memory(_))
        ));
    }
}
