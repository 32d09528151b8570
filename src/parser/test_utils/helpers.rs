use crate::{
    domain::Text,
    parser::types::{Ast, Statement},
    sanitizer::Transformer,
};

use super::ParseContext;

pub fn init(text: &str) -> ParseContext {
    ParseContext::new(&Text::new(text))
}

struct EraseLines;

impl Transformer for EraseLines {
    fn visit_statement(&mut self, mut stmt: Statement) -> Statement {
        stmt.line = 0;
        stmt
    }
}

/// Zero every line number, nested blocks included, so trees compare by shape alone.
pub fn without_lines(ast: Ast) -> Ast {
    EraseLines.transform(ast)
}

macro_rules! expect_error {
    ($input:expr) => {
        match init($input).parse_all() {
            Ok(_) => panic!("Expected a ParserError!"),
            Err(e) => e,
        }
    };
}

macro_rules! parse {
    ($input:expr) => {
        match init($input).parse_all() {
            Err(e) => panic!("Parser error: {:?}", e),
            Ok(ast) => ast,
        }
    };
}

macro_rules! parse_expr {
    ($input:expr) => {
        match init($input).parse_expr() {
            Err(e) => panic!("Parser error: {:?}", e),
            Ok(expr) => expr,
        }
    };
}

/// Compare trees by shape, ignoring line numbers at every depth.
macro_rules! assert_ast_eq {
    ($input:expr, $expected:expr) => {
        assert_eq!(without_lines(parse!($input)), without_lines($expected));
    };
}

macro_rules! assert_stmt_eq {
    ($input:expr, $expected:expr) => {
        let ast = without_lines(parse!($input));
        assert_eq!(ast.len(), 1, "expected a single statement, found {:?}", ast);
        assert_eq!(ast[0].kind, $expected);
    };
}

macro_rules! assert_expr_eq {
    ($input:expr, $expected:expr) => {
        assert_eq!(parse_expr!($input), $expected);
    };
}

pub(crate) use assert_ast_eq;
pub(crate) use assert_expr_eq;
pub(crate) use assert_stmt_eq;
pub(crate) use expect_error;
pub(crate) use parse;
pub(crate) use parse_expr;
