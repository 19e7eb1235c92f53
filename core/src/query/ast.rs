//! Parsed form of a query expression.

use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Records satisfying every comparison.
    Filter(Predicate),
    /// Total of a numeric field over the optionally filtered records.
    Sum {
        field: FieldRef,
        filter: Option<Predicate>,
    },
    /// Number of optionally filtered records.
    Count { filter: Option<Predicate> },
}

/// Conjunction of comparisons. Most real queries have one or two.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub comparisons: SmallVec<[Comparison; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: FieldRef,
    pub op: CompareOp,
    pub literal: Literal,
}

/// A field name as written, with its offset for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub name: String,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    StartsWith,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::StartsWith => "starts-with",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number { text: String, value: f64 },
}

impl Literal {
    /// Source text of the literal, without quotes.
    pub fn text(&self) -> &str {
        match self {
            Literal::String(value) => value,
            Literal::Number { text, .. } => text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number { value, .. } => Some(*value),
            Literal::String(_) => None,
        }
    }
}
