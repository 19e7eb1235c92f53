use super::ast::*;
use super::error::{ParseError, ParseResult};
use super::lexer::{Lexer, Token};
use smallvec::SmallVec;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let (current_token, position) = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
            position,
        })
    }

    /// Parse exactly one expression; anything left over is an error.
    pub fn parse(mut self) -> ParseResult<Expression> {
        let expression = match self.current_token {
            Token::Sum => self.parse_sum()?,
            Token::Count => self.parse_count()?,
            _ => Expression::Filter(self.parse_predicate()?),
        };

        if self.current_token != Token::Eof {
            return Err(self.unexpected_token("end of input"));
        }

        Ok(expression)
    }

    fn parse_sum(&mut self) -> ParseResult<Expression> {
        self.expect(Token::Sum)?;
        self.expect(Token::LeftParen)?;

        let field = self.parse_field()?;
        let filter = self.parse_scope()?;

        self.expect(Token::RightParen)?;
        Ok(Expression::Sum { field, filter })
    }

    fn parse_count(&mut self) -> ParseResult<Expression> {
        self.expect(Token::Count)?;
        self.expect(Token::LeftParen)?;

        let filter = self.parse_scope()?;

        self.expect(Token::RightParen)?;
        Ok(Expression::Count { filter })
    }

    /// Optional `[predicate]` narrowing an aggregate.
    fn parse_scope(&mut self) -> ParseResult<Option<Predicate>> {
        if self.current_token != Token::LeftBracket {
            return Ok(None);
        }

        self.advance()?;
        let predicate = self.parse_predicate()?;
        self.expect(Token::RightBracket)?;

        Ok(Some(predicate))
    }

    fn parse_predicate(&mut self) -> ParseResult<Predicate> {
        let mut comparisons = SmallVec::new();
        comparisons.push(self.parse_comparison()?);

        while self.current_token == Token::And {
            self.advance()?;
            comparisons.push(self.parse_comparison()?);
        }

        Ok(Predicate { comparisons })
    }

    fn parse_comparison(&mut self) -> ParseResult<Comparison> {
        let field = self.parse_field()?;

        let op = match &self.current_token {
            Token::Equal => CompareOp::Eq,
            Token::NotEqual => CompareOp::NotEq,
            Token::Less => CompareOp::Lt,
            Token::Greater => CompareOp::Gt,
            Token::StartsWith => CompareOp::StartsWith,
            _ => return Err(self.unexpected_token("comparison operator")),
        };
        self.advance()?;

        let literal = self.parse_literal()?;

        Ok(Comparison { field, op, literal })
    }

    fn parse_field(&mut self) -> ParseResult<FieldRef> {
        match &self.current_token {
            Token::Identifier(name) => {
                let field = FieldRef {
                    name: name.clone(),
                    position: self.position,
                };
                self.advance()?;
                Ok(field)
            }
            _ => Err(self.unexpected_token("field name")),
        }
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        let literal = match &self.current_token {
            Token::StringLiteral(value) => Literal::String(value.clone()),
            Token::NumberLiteral { text, value } => Literal::Number {
                text: text.clone(),
                value: *value,
            },
            _ => return Err(self.unexpected_token("literal")),
        };

        self.advance()?;
        Ok(literal)
    }

    fn advance(&mut self) -> ParseResult<()> {
        let (token, position) = self.lexer.next_token()?;
        self.current_token = token;
        self.position = position;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if std::mem::discriminant(&self.current_token) == std::mem::discriminant(&expected) {
            self.advance()
        } else {
            Err(self.unexpected_token(&expected.to_string()))
        }
    }

    fn unexpected_token(&self, expected: &str) -> ParseError {
        if self.current_token == Token::Eof {
            return ParseError::UnexpectedEof {
                expected: expected.to_string(),
            };
        }

        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_token.to_string(),
            position: self.position,
        }
    }
}
