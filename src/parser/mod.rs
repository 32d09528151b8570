mod error;
#[allow(clippy::module_inception)]
mod parser;
#[cfg(test)]
pub mod test_utils;
mod token_buffer;
pub mod types;

pub use error::ParserError;
pub use parser::Parser;
pub use token_buffer::TokenBuffer;

use crate::{
    core::{log, LogLevel},
    domain::Text,
    lexer::Lexer,
};

/// Lex and parse a whole module.
pub fn parse(text: &Text) -> Result<types::Ast, ParserError> {
    let tokens = Lexer::new(text).tokenize()?;
    let ast = Parser::new(&tokens).parse()?;
    log(LogLevel::Trace, || {
        format!("Parsed {} top-level statements", ast.len())
    });
    Ok(ast)
}
