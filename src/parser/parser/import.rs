use crate::{
    domain::{FromImportPath, Identifier, ModulePath},
    lexer::Token,
    parser::{
        types::{FromImportItem, FromImportMode, RegularImport, StatementKind},
        Parser, ParserError,
    },
};

impl Parser<'_> {
    pub fn parse_regular_import(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Import)?;

        let mut items = vec![];
        loop {
            let module_path = self.parse_module_path()?;
            if module_path.is_empty() {
                return Err(self.syntax_error("expected a module name"));
            }
            let alias = self.parse_optional_alias()?;
            items.push(RegularImport { module_path, alias });

            if !self.consume_optional(&Token::Comma) {
                break;
            }
        }

        Ok(StatementKind::RegularImport(items))
    }

    pub fn parse_selective_import(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::From)?;
        let import_path = self.parse_import_path()?;
        self.consume(&Token::Import)?;

        if self.consume_optional(&Token::Asterisk) {
            return Ok(StatementKind::SelectiveImport {
                import_path,
                mode: FromImportMode::All,
            });
        }

        let parenthesized = self.consume_optional(&Token::LParen);

        let mut items = Vec::new();
        loop {
            let symbol = self.parse_identifier()?;
            let item = match self.parse_optional_alias()? {
                Some(alias) => FromImportItem::aliased(symbol, alias),
                None => FromImportItem::direct(symbol),
            };
            items.push(item);

            if !self.consume_optional(&Token::Comma) {
                break;
            }
            // A trailing comma is only legal inside parentheses.
            if parenthesized && self.current_token() == &Token::RParen {
                break;
            }
        }

        if parenthesized {
            self.consume(&Token::RParen)?;
        }

        Ok(StatementKind::SelectiveImport {
            import_path,
            mode: FromImportMode::List(items),
        })
    }

    fn parse_module_path(&mut self) -> Result<ModulePath, ParserError> {
        if !matches!(self.current_token(), Token::Identifier(_)) {
            return Ok(ModulePath::default());
        }

        let mut path = vec![self.parse_identifier()?];
        while self.consume_optional(&Token::Dot) {
            path.push(self.parse_identifier()?);
        }
        Ok(ModulePath::new(path))
    }

    fn parse_import_path(&mut self) -> Result<FromImportPath, ParserError> {
        let mut levels = 0;
        loop {
            match self.current_token() {
                Token::Dot => levels += 1,
                // `from ... import x` lexes as a single ellipsis.
                Token::Ellipsis => levels += 3,
                _ => break,
            }
            self.consume_current();
        }

        let path = self.parse_module_path()?;
        if levels > 0 {
            Ok(FromImportPath::Relative(levels, path))
        } else if path.is_empty() {
            Err(self.syntax_error("expected a module name"))
        } else {
            Ok(FromImportPath::Absolute(path))
        }
    }

    pub fn parse_optional_alias(&mut self) -> Result<Option<Identifier>, ParserError> {
        if self.consume_optional(&Token::As) {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::parser::test_utils::*;

    fn path(segments: &[&str]) -> ModulePath {
        ModulePath::new(segments.iter().map(|s| ident!(*s)).collect())
    }

    #[test]
    fn regular_import() {
        assert_stmt_eq!(
            "import os.path, numpy as np",
            StatementKind::RegularImport(vec![
                RegularImport {
                    module_path: path(&["os", "path"]),
                    alias: None,
                },
                RegularImport {
                    module_path: path(&["numpy"]),
                    alias: Some(ident!("np")),
                },
            ])
        );
    }

    #[test]
    fn selective_import_parenthesized() {
        let input = "
from setuptools import (
    setup,
    find_packages as fp,
)
";
        assert_stmt_eq!(
            input,
            StatementKind::SelectiveImport {
                import_path: FromImportPath::Absolute(path(&["setuptools"])),
                mode: FromImportMode::List(vec![
                    FromImportItem::direct(ident!("setup")),
                    FromImportItem::aliased(ident!("find_packages"), ident!("fp")),
                ]),
            }
        );
    }

    #[test]
    fn relative_and_star_imports() {
        let input = "
from . import version
from ..pkg.mod import *
";
        let expected = ast![
            stmt!(StatementKind::SelectiveImport {
                import_path: FromImportPath::Relative(1, ModulePath::default()),
                mode: FromImportMode::List(vec![FromImportItem::direct(ident!("version"))]),
            }),
            stmt!(StatementKind::SelectiveImport {
                import_path: FromImportPath::Relative(2, path(&["pkg", "mod"])),
                mode: FromImportMode::All,
            }),
        ];
        assert_ast_eq!(input, expected);
    }

    #[test]
    fn bound_names() {
        let ast = parse!("import a.b.c");
        let StatementKind::RegularImport(items) = &ast[0].kind else {
            panic!("expected import");
        };
        assert_eq!(items[0].bound_name(), Some(&ident!("a")));
    }

    #[test]
    fn trailing_comma_outside_parentheses() {
        assert!(matches!(
            expect_error!("from a import b,"),
            ParserError::SyntaxError { .. }
        ));
    }
}
