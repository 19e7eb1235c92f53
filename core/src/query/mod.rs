//! Restricted query language
//!
//! A closed grammar of predicate filters and `sum`/`count` aggregates:
//!
//! ```text
//! predicate  := comparison | predicate 'and' predicate
//! comparison := field op literal
//! op         := '=' | '!=' | '<' | '>' | 'starts-with'
//! aggregate  := 'sum(' field ['[' predicate ']'] ')' | 'count(' ['[' predicate ']'] ')'
//! ```
//!
//! This module only turns text into an [`Expression`]; field resolution and
//! evaluation live in the executor.

pub mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::{CompareOp, Comparison, Expression, FieldRef, Literal, Predicate};
pub use error::{ParseError, ParseResult};
pub use parser::Parser;

pub fn parse(input: &str) -> ParseResult<Expression> {
    Parser::new(input)?.parse()
}
