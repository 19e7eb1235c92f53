//! Binding and evaluation of restricted query expressions.
//!
//! Field names and operand types are checked once, before the scan, so an
//! invalid expression fails the same way whether or not any record would
//! have matched. The scan itself is a single pass over the store.

use crate::executor::error::{EngineResult, QueryError};
use crate::executor::result::Evaluation;
use crate::query::{self, CompareOp, Comparison, Expression, FieldRef, Literal, Predicate};
use crate::storage::{RecordStore, SalesField, SalesRecord};
use smallvec::SmallVec;

pub struct ExpressionEvaluator<'a> {
    store: &'a RecordStore,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    pub fn evaluate(&self, input: &str) -> EngineResult<Evaluation<'a>> {
        let expression = query::parse(input)?;
        self.execute(&expression)
    }

    pub fn execute(&self, expression: &Expression) -> EngineResult<Evaluation<'a>> {
        let records = self.store.all();

        match expression {
            Expression::Filter(predicate) => {
                let filter = BoundPredicate::bind(Some(predicate))?;
                Ok(Evaluation::Records(
                    records.iter().filter(|r| filter.matches(r)).collect(),
                ))
            }
            Expression::Sum { field, filter } => {
                let target = numeric_field(field, "sum")?;
                let filter = BoundPredicate::bind(filter.as_ref())?;
                let total = records
                    .iter()
                    .filter(|r| filter.matches(r))
                    .fold(0.0, |total, r| total + r.number(target).unwrap_or(0.0));
                Ok(Evaluation::Sum(total))
            }
            Expression::Count { filter } => {
                let filter = BoundPredicate::bind(filter.as_ref())?;
                let count = records.iter().filter(|r| filter.matches(r)).count();
                Ok(Evaluation::Count(count as u64))
            }
        }
    }
}

/// A predicate with resolved fields and typed operands.
#[derive(Debug)]
struct BoundPredicate {
    tests: SmallVec<[FieldTest; 4]>,
}

#[derive(Debug)]
enum FieldTest {
    TextEq {
        field: SalesField,
        value: String,
        negate: bool,
    },
    NumberEq {
        field: SalesField,
        value: f64,
        negate: bool,
    },
    Less {
        field: SalesField,
        value: f64,
    },
    Greater {
        field: SalesField,
        value: f64,
    },
    StartsWith {
        field: SalesField,
        prefix: String,
    },
}

impl BoundPredicate {
    /// An absent predicate matches every record.
    fn bind(predicate: Option<&Predicate>) -> EngineResult<Self> {
        let tests = match predicate {
            Some(predicate) => predicate
                .comparisons
                .iter()
                .map(FieldTest::bind)
                .collect::<EngineResult<_>>()?,
            None => SmallVec::new(),
        };
        Ok(Self { tests })
    }

    fn matches(&self, record: &SalesRecord) -> bool {
        self.tests.iter().all(|test| test.matches(record))
    }
}

impl FieldTest {
    fn bind(comparison: &Comparison) -> EngineResult<Self> {
        let field = SalesField::resolve(&comparison.field.name)?;
        let literal = &comparison.literal;

        let test = match comparison.op {
            CompareOp::Eq | CompareOp::NotEq => {
                let negate = comparison.op == CompareOp::NotEq;
                match literal {
                    Literal::Number { value, .. } if field.is_numeric() => FieldTest::NumberEq {
                        field,
                        value: *value,
                        negate,
                    },
                    _ => FieldTest::TextEq {
                        field,
                        value: literal.text().to_string(),
                        negate,
                    },
                }
            }
            CompareOp::Lt => FieldTest::Less {
                field: numeric_field(&comparison.field, "'<'")?,
                value: numeric_operand(comparison)?,
            },
            CompareOp::Gt => FieldTest::Greater {
                field: numeric_field(&comparison.field, "'>'")?,
                value: numeric_operand(comparison)?,
            },
            CompareOp::StartsWith => FieldTest::StartsWith {
                field,
                prefix: literal.text().to_string(),
            },
        };

        Ok(test)
    }

    fn matches(&self, record: &SalesRecord) -> bool {
        match self {
            FieldTest::TextEq {
                field,
                value,
                negate,
            } => (record.text(*field) == value.as_str()) != *negate,
            FieldTest::NumberEq {
                field,
                value,
                negate,
            } => (number(record, *field) == *value) != *negate,
            FieldTest::Less { field, value } => number(record, *field) < *value,
            FieldTest::Greater { field, value } => number(record, *field) > *value,
            FieldTest::StartsWith { field, prefix } => {
                record.text(*field).starts_with(prefix.as_str())
            }
        }
    }
}

fn number(record: &SalesRecord, field: SalesField) -> f64 {
    record.number(field).unwrap_or(0.0)
}

fn numeric_field(field: &FieldRef, context: &str) -> EngineResult<SalesField> {
    let resolved = SalesField::resolve(&field.name)?;
    if resolved.is_numeric() {
        Ok(resolved)
    } else {
        Err(QueryError::TypeMismatch {
            field: field.name.clone(),
            reason: format!("{} requires a numeric field", context),
        })
    }
}

/// Numeric literal, or a quoted literal whose text is a finite number.
fn numeric_operand(comparison: &Comparison) -> EngineResult<f64> {
    let literal = &comparison.literal;
    literal
        .as_number()
        .or_else(|| {
            literal
                .text()
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
        })
        .ok_or_else(|| QueryError::TypeMismatch {
            field: comparison.field.name.clone(),
            reason: format!(
                "'{}' cannot be compared with {}",
                literal.text(),
                comparison.op
            ),
        })
}
