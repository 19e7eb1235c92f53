use crate::query::error::{ParseError, ParseResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    And,
    StartsWith,
    Sum,
    Count,

    // Literals
    StringLiteral(String),
    NumberLiteral { text: String, value: f64 },

    // Identifiers
    Identifier(String),

    // Symbols
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Equal,        // =
    NotEqual,     // !=
    Less,         // <
    Greater,      // >

    // Special
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::And => f.write_str("'and'"),
            Token::StartsWith => f.write_str("'starts-with'"),
            Token::Sum => f.write_str("'sum'"),
            Token::Count => f.write_str("'count'"),
            Token::StringLiteral(value) => write!(f, "string '{}'", value),
            Token::NumberLiteral { text, .. } => write!(f, "number {}", text),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::LeftParen => f.write_str("'('"),
            Token::RightParen => f.write_str("')'"),
            Token::LeftBracket => f.write_str("'['"),
            Token::RightBracket => f.write_str("']'"),
            Token::Equal => f.write_str("'='"),
            Token::NotEqual => f.write_str("'!='"),
            Token::Less => f.write_str("'<'"),
            Token::Greater => f.write_str("'>'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Tokenizer over an expression string. Positions are byte offsets.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    current_char: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            current_char: input.chars().next(),
        }
    }

    /// Next token together with the offset it starts at.
    pub fn next_token(&mut self) -> ParseResult<(Token, usize)> {
        self.skip_whitespace();
        let start = self.position;

        let token = match self.current_char {
            None => Token::Eof,
            Some(ch) => match ch {
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                '[' => self.single(Token::LeftBracket),
                ']' => self.single(Token::RightBracket),
                '=' => self.single(Token::Equal),
                '<' => self.single(Token::Less),
                '>' => self.single(Token::Greater),
                '!' => {
                    self.advance();
                    if self.current_char == Some('=') {
                        self.advance();
                        Token::NotEqual
                    } else {
                        return Err(ParseError::UnexpectedChar('!', start));
                    }
                }
                '\'' | '"' => self.read_string(ch)?,
                '-' | '0'..='9' => self.read_number()?,
                c if c.is_alphabetic() || c == '_' => self.read_identifier(),
                _ => return Err(ParseError::UnexpectedChar(ch, start)),
            },
        };

        Ok((token, start))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char {
            self.position += ch.len_utf8();
        }
        self.current_char = self.input[self.position..].chars().next();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, quote: char) -> ParseResult<Token> {
        let start = self.position;
        self.advance(); // skip opening quote

        let mut value = String::new();
        loop {
            match self.current_char {
                None => return Err(ParseError::UnterminatedString(start)),
                Some(ch) if ch == quote => break,
                Some('\\') => {
                    let escape_at = self.position;
                    self.advance();
                    match self.current_char {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some(q) if q == '\'' || q == '"' => value.push(q),
                        None => return Err(ParseError::UnterminatedString(start)),
                        Some(_) => return Err(ParseError::InvalidEscape(escape_at)),
                    }
                }
                Some(ch) => value.push(ch),
            }
            self.advance();
        }

        self.advance(); // skip closing quote
        Ok(Token::StringLiteral(value))
    }

    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;

        if self.current_char == Some('-') {
            self.advance();
            if !matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
                return Err(ParseError::InvalidNumber(start));
            }
        }

        self.skip_digits();
        if self.current_char == Some('.') {
            self.advance();
            if !matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
                return Err(ParseError::InvalidNumber(start));
            }
            self.skip_digits();
        }

        let text = &self.input[start..self.position];
        match text.parse::<f64>() {
            Ok(value) => Ok(Token::NumberLiteral {
                text: text.to_string(),
                value,
            }),
            Err(_) => Err(ParseError::InvalidNumber(start)),
        }
    }

    fn skip_digits(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                self.advance();
            } else {
                break;
            }
        }

        classify_identifier(&self.input[start..self.position])
    }
}

fn classify_identifier(text: &str) -> Token {
    match text.to_lowercase().as_str() {
        "and" => Token::And,
        "starts-with" => Token::StartsWith,
        "sum" => Token::Sum,
        "count" => Token::Count,
        _ => Token::Identifier(text.to_string()),
    }
}
