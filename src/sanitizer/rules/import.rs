use crate::{
    core::{log, LogLevel},
    domain::{FromImportPath, Identifier},
    parser::types::{CallArgs, Expr, FromImportMode, Statement, StatementKind},
    sanitizer::{AvailabilityProber, NodeShape, RewriteRule, STUB_FACTORY},
};

/// Replaces an import of anything unavailable with stub bindings for every name it would bind.
/// A statement is either kept whole or stubbed whole.
pub struct ImportRule<'a> {
    prober: &'a dyn AvailabilityProber,
}

impl<'a> ImportRule<'a> {
    pub fn new(prober: &'a dyn AvailabilityProber) -> Self {
        Self { prober }
    }

    fn all_available(&self, kind: &StatementKind) -> bool {
        match kind {
            StatementKind::RegularImport(items) => items
                .iter()
                .all(|item| self.prober.is_path_available(&item.module_path.to_string())),
            StatementKind::SelectiveImport { import_path, .. } => match import_path {
                FromImportPath::Absolute(path) => self.prober.is_path_available(&path.to_string()),
                // There is no package around the script, so relative imports never resolve.
                FromImportPath::Relative(..) => false,
            },
            _ => true,
        }
    }
}

/// The local names an import statement binds, in order. `None` for a star import.
fn bound_names(kind: &StatementKind) -> Option<Vec<Identifier>> {
    match kind {
        StatementKind::RegularImport(items) => Some(
            items
                .iter()
                .filter_map(|item| item.bound_name().cloned())
                .collect(),
        ),
        StatementKind::SelectiveImport { mode, .. } => match mode {
            FromImportMode::All => None,
            FromImportMode::List(items) => Some(
                items
                    .iter()
                    .map(|item| item.bound_name().clone())
                    .collect(),
            ),
        },
        _ => Some(vec![]),
    }
}

/// `__sandbox_stub__("name")`
pub fn stub_constructor(name: &str) -> Expr {
    Expr::call(
        Expr::Variable(Identifier::internal(STUB_FACTORY)),
        CallArgs::positional(vec![Expr::StringLiteral(name.to_string())]),
    )
}

impl RewriteRule for ImportRule<'_> {
    fn name(&self) -> &'static str {
        "import"
    }

    fn applies_to(&self, shape: NodeShape<'_>) -> bool {
        shape == NodeShape::Import
    }

    fn rewrite_statement(&self, stmt: Statement) -> Statement {
        if self.all_available(&stmt.kind) {
            return stmt;
        }

        let kind = match bound_names(&stmt.kind) {
            None => {
                log(LogLevel::Debug, || {
                    format!("Line {}: dropping star import of an unavailable module", stmt.line)
                });
                StatementKind::Pass
            }
            Some(names) => {
                log(LogLevel::Debug, || {
                    let names: Vec<&str> = names.iter().map(Identifier::as_str).collect();
                    format!("Line {}: stubbing import of {}", stmt.line, names.join(", "))
                });
                StatementKind::UnpackingAssignment {
                    right: Expr::Tuple(names.iter().map(|n| stub_constructor(n)).collect()),
                    left: names.into_iter().map(Expr::Variable).collect(),
                }
            }
        };

        Statement::new(stmt.line, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{domain::Text, parser::parse};

    fn rewrite(input: &str, available: &[&str]) -> StatementKind {
        let prober = |root: &str| available.contains(&root);
        let rule = ImportRule::new(&prober);
        let mut ast = parse(&Text::new(input)).expect("Failed to parse");
        rule.rewrite_statement(ast.remove(0)).kind
    }

    fn stubbed(names: &[&str]) -> StatementKind {
        StatementKind::UnpackingAssignment {
            left: names
                .iter()
                .map(|n| Expr::Variable(Identifier::new(*n).expect("valid")))
                .collect(),
            right: Expr::Tuple(names.iter().map(|n| stub_constructor(n)).collect()),
        }
    }

    #[test]
    fn available_imports_are_untouched() {
        let input = "import os.path, sys as system";
        let original = parse(&Text::new(input)).expect("Failed to parse").remove(0).kind;
        assert_eq!(rewrite(input, &["os", "sys"]), original);
    }

    #[test]
    fn one_unavailable_module_stubs_every_name() {
        assert_eq!(
            rewrite("import os, numpy.linalg, pandas as pd", &["os"]),
            stubbed(&["os", "numpy", "pd"])
        );
    }

    #[test]
    fn selective_import_binds_aliases() {
        assert_eq!(
            rewrite("from setuptools import setup, find_packages as fp", &[]),
            stubbed(&["setup", "fp"])
        );
    }

    #[test]
    fn relative_imports_are_always_stubbed() {
        assert_eq!(
            rewrite("from .version import __version__", &["version"]),
            stubbed(&["__version__"])
        );
    }

    #[test]
    fn star_import_from_unavailable_module_becomes_pass() {
        assert_eq!(rewrite("from distutils.core import *", &[]), StatementKind::Pass);
    }

    #[test]
    fn rewritten_statement_keeps_line() {
        let prober = |_: &str| false;
        let rule = ImportRule::new(&prober);
        let ast = parse(&Text::new("\n\nimport foo")).expect("Failed to parse");
        assert_eq!(rule.rewrite_statement(ast[0].clone()).line, 3);
    }
}
