use crate::{
    core::{log, LogLevel},
    domain::Identifier,
    lexer::{SpannedToken, Token},
    parser::{types::Ast, ParserError, TokenBuffer},
};

mod block;
mod expr;
mod fstring;
mod import;
mod signature;
mod stmt;

/// A recursive-descent parser over the Python subset found in build descriptors.
pub struct Parser<'a> {
    tokens: TokenBuffer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Parser {
            tokens: TokenBuffer::new(tokens),
        }
    }

    /// Return the full AST. This will consume all the tokens.
    pub fn parse(&mut self) -> Result<Ast, ParserError> {
        self.consume_newlines();

        let stmts = self.parse_statement_list_until(
            |tok| matches!(tok, Token::Eof),
            |tok| matches!(tok, Token::Newline | Token::Semicolon),
        )?;
        self.consume(&Token::Eof)?;

        Ok(stmts)
    }

    pub fn consume_newlines(&mut self) {
        while self.current_token() == &Token::Newline {
            self.consume_current();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tokens.is_exhausted()
    }

    fn current_token(&self) -> &Token {
        self.tokens.peek(0)
    }

    fn line_number(&self) -> usize {
        self.tokens.line()
    }

    fn end_of_statement(&self) -> bool {
        self.is_finished() || matches!(self.current_token(), Token::Newline | Token::Semicolon)
    }

    fn consume_current(&mut self) {
        log(LogLevel::Trace, || format!("Token: {:?}", self.current_token()));
        self.tokens.consume();
    }

    fn consume(&mut self, expected: &Token) -> Result<(), ParserError> {
        let current = self.current_token();

        log(LogLevel::Trace, || format!("Token: {current:?}"));

        if current != expected {
            return Err(ParserError::ExpectedToken {
                expected: expected.clone(),
                found: current.clone(),
                line: self.line_number(),
            });
        }

        self.tokens.consume();
        Ok(())
    }

    /// Consume `expected` if it is the current token, reporting whether it was there.
    fn consume_optional(&mut self, expected: &Token) -> bool {
        if self.current_token() == expected {
            self.tokens.consume();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ParserError {
        ParserError::UnexpectedToken {
            token: self.current_token().clone(),
            line: self.line_number(),
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParserError {
        ParserError::syntax_error(message, self.line_number())
    }

    /// Parse a `Token::Identifier` without any semantic analysis.
    fn parse_identifier(&mut self) -> Result<Identifier, ParserError> {
        match self.current_token().clone() {
            Token::Identifier(ident) => {
                self.consume_current();
                Ok(ident)
            }
            _ => Err(self.syntax_error("invalid identifier")),
        }
    }

    fn parse_identifiers(&mut self) -> Result<Vec<Identifier>, ParserError> {
        let mut identifiers = vec![self.parse_identifier()?];
        while self.consume_optional(&Token::Comma) {
            identifiers.push(self.parse_identifier()?);
        }
        Ok(identifiers)
    }
}
