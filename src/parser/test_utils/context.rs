use crate::{
    domain::Text,
    lexer::{Lexer, SpannedToken},
    parser::{
        types::{Ast, Expr},
        Parser, ParserError,
    },
};

pub struct ParseContext {
    tokens: Result<Vec<SpannedToken>, ParserError>,
}

impl ParseContext {
    pub fn new(text: &Text) -> Self {
        Self {
            tokens: Lexer::new(text).tokenize().map_err(ParserError::from),
        }
    }

    pub fn parse_all(&self) -> Result<Ast, ParserError> {
        let tokens = self.tokens.as_ref().map_err(Clone::clone)?;
        Parser::new(tokens).parse()
    }

    /// Parse a single expression, which must make up the whole input.
    pub fn parse_expr(&self) -> Result<Expr, ParserError> {
        let tokens = self.tokens.as_ref().map_err(Clone::clone)?;
        let mut parser = Parser::new(tokens);
        let expr = parser.parse_expr()?;
        parser.consume_newlines();
        if !parser.is_finished() {
            return Err(ParserError::syntax_error("trailing input", 0));
        }
        Ok(expr)
    }
}
