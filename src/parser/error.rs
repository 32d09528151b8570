use thiserror::Error;

use crate::lexer::{LexerError, Token};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParserError {
    #[error("line {line}: expected token {expected:?}, found {found:?}")]
    ExpectedToken {
        expected: Token,
        found: Token,
        line: usize,
    },
    #[error("line {line}: unexpected token {token:?}")]
    UnexpectedToken { token: Token, line: usize },
    #[error("line {line}: {message}")]
    SyntaxError { message: String, line: usize },
    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl ParserError {
    pub fn syntax_error(message: impl Into<String>, line: usize) -> Self {
        Self::SyntaxError {
            message: message.into(),
            line,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ParserError::ExpectedToken { line, .. }
            | ParserError::UnexpectedToken { line, .. }
            | ParserError::SyntaxError { line, .. } => *line,
            ParserError::Lexer(e) => e.line(),
        }
    }

    /// The message without its line prefix, for reporting alongside a path.
    pub fn message(&self) -> String {
        match self {
            ParserError::ExpectedToken {
                expected, found, ..
            } => format!("expected token {expected:?}, found {found:?}"),
            ParserError::UnexpectedToken { token, .. } => format!("unexpected token {token:?}"),
            ParserError::SyntaxError { message, .. } => message.clone(),
            ParserError::Lexer(e) => match e {
                LexerError::UnexpectedCharacter { character, .. } => {
                    format!("unexpected character {character:?}")
                }
                LexerError::InvalidToken { token, .. } => format!("invalid token: {token}"),
                LexerError::UnterminatedString { .. } => "unterminated string literal".into(),
                LexerError::InconsistentDedent { .. } => {
                    "unindent does not match any outer indentation level".into()
                }
            },
        }
    }
}
