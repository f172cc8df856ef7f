//! Lexer for query string syntax
//!
//! Tokenizes Lucene-style query strings into a stream of tokens. Every token
//! remembers the char offset it started at, so parse errors can point at it.

use crate::error::ShowdexError;
use crate::Result;

/// Token types for query string parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare word: field name, term, number, date or facet path
    Term(String),
    /// A quoted string (phrase)
    QuotedString(String),

    /// AND operator
    And,
    /// OR operator
    Or,
    /// NOT operator
    Not,
    /// Colon separator (field:value)
    Colon,

    /// Asterisk (all documents, or an unbounded range side)
    Asterisk,

    /// Tilde with optional phrase slop
    Tilde(Option<u32>),
    /// Caret for boosting with optional boost value
    Caret(Option<f32>),

    /// Left square bracket (inclusive range start)
    LeftBracket,
    /// Right square bracket (inclusive range end)
    RightBracket,
    /// Left curly brace (exclusive range start)
    LeftBrace,
    /// Right curly brace (exclusive range end)
    RightBrace,
    /// TO keyword for ranges
    To,

    /// Left parenthesis (grouping)
    LeftParen,
    /// Right parenthesis (grouping)
    RightParen,

    /// Plus sign (required clause)
    Plus,
    /// Minus sign (excluded clause, or the sign of a number)
    Minus,

    /// End of input
    Eof,
}

impl Token {
    /// Short human form used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Term(t) => format!("'{}'", t),
            Token::QuotedString(s) => format!("\"{}\"", s),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Asterisk => "'*'".to_string(),
            Token::Tilde(_) => "'~'".to_string(),
            Token::Caret(_) => "'^'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::To => "TO".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Eof => "end of query".to_string(),
        }
    }
}

/// Lexer for tokenizing query strings
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    token_start: usize,
}

impl Lexer {
    /// Create a new lexer for the given input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    /// Char offset where the most recently returned token starts
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        self.token_start = self.position;

        if self.position >= self.input.len() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();

        let simple = match ch {
            ':' => Some(Token::Colon),
            '*' => Some(Token::Asterisk),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            _ => None,
        };
        if let Some(token) = simple {
            self.advance();
            return Ok(token);
        }

        match ch {
            '~' => {
                self.advance();
                Ok(Token::Tilde(self.read_unsigned_int()))
            }
            '^' => {
                self.advance();
                Ok(Token::Caret(self.read_float()))
            }
            '"' => {
                self.advance();
                self.read_quoted_string()
            }
            _ if ch.is_ascii_digit() => Ok(self.read_numeric_term()),
            _ if Self::is_term_start(ch) => Ok(self.read_term()),
            _ => Err(ShowdexError::syntax(
                self.position,
                format!("unexpected character '{}'", ch),
            )),
        }
    }

    /// Peek at the next token without consuming it
    pub fn peek_token(&mut self) -> Result<Token> {
        let saved = (self.position, self.token_start);
        let token = self.next_token();
        (self.position, self.token_start) = saved;
        token
    }

    /// Check if the lexer has reached the end of input
    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn read_term(&mut self) -> Token {
        let mut term = String::new();

        while self.position < self.input.len() {
            let ch = self.current_char();
            if ch == '\\' {
                // Escapes are kept for the value parser (facet paths use them)
                term.push(ch);
                self.advance();
                if self.position < self.input.len() {
                    term.push(self.current_char());
                    self.advance();
                }
            } else if Self::is_term_char(ch) {
                term.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Keywords are case-insensitive
        match term.to_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "TO" => Token::To,
            _ => Token::Term(term),
        }
    }

    /// Read a term that starts with a digit
    ///
    /// Besides the usual term chars this accepts `:` and `+` when a digit
    /// follows, so `2024-01-15T10:30:00+02:00` lexes as a single term.
    fn read_numeric_term(&mut self) -> Token {
        let mut term = String::new();

        while self.position < self.input.len() {
            let ch = self.current_char();
            let digit_next = self.peek().is_some_and(|c| c.is_ascii_digit());
            if Self::is_term_char(ch) || ((ch == ':' || ch == '+') && digit_next) {
                term.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::Term(term)
    }

    fn read_quoted_string(&mut self) -> Result<Token> {
        let start = self.token_start;
        let mut s = String::new();

        while self.position < self.input.len() {
            let ch = self.current_char();
            if ch == '"' {
                self.advance();
                return Ok(Token::QuotedString(s));
            }
            if ch == '\\' {
                self.advance();
                if self.position < self.input.len() {
                    let escaped = self.current_char();
                    match escaped {
                        '"' => s.push(escaped),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        _ => {
                            s.push('\\');
                            s.push(escaped);
                        }
                    }
                    self.advance();
                }
            } else {
                s.push(ch);
                self.advance();
            }
        }

        Err(ShowdexError::syntax(start, "unterminated quoted string"))
    }

    fn read_unsigned_int(&mut self) -> Option<u32> {
        let mut num_str = String::new();

        while self.position < self.input.len() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        num_str.parse().ok()
    }

    fn read_float(&mut self) -> Option<f32> {
        let mut num_str = String::new();
        let mut has_dot = false;

        while self.position < self.input.len() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        num_str.parse().ok()
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Check if a character can start a term
    fn is_term_start(ch: char) -> bool {
        ch.is_alphanumeric() || matches!(ch, '_' | '@' | '#' | '/' | '\\' | '.')
    }

    /// Check if a character can be part of a term
    fn is_term_char(ch: char) -> bool {
        ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '@' | '#' | '/' | '\'' | '*')
    }
}
