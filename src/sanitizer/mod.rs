//! The side-effect neutralizer: a rewrite pass that replaces imports of unavailable modules,
//! read-mode file opens, and the registration call before a descriptor is executed.

mod prober;
pub mod rules;
mod shape;
mod transformer;

pub use prober::{root_of, AvailabilityProber, HostModules, NATIVE_MODULES};
pub use rules::RewriteRule;
pub use shape::{CallTarget, NodeShape};
pub use transformer::{walk_ast, walk_expr, walk_statement, Transformer};

use std::collections::HashSet;

use crate::{
    config::ExtractConfig,
    core::{log, LogLevel},
    parser::types::{Ast, Expr, FromImportMode, Statement, StatementKind},
};

use rules::{ImportRule, ReadOpenRule, RegistrationRule};

/// Builds the placeholder bound to each name of a stubbed import.
pub const STUB_FACTORY: &str = "__sandbox_stub__";
/// Builds the in-memory stream that replaces a read-mode `open()`.
pub const STRING_IO_FACTORY: &str = "__sandbox_string_io__";
/// Receives the arguments of the registration call.
pub const REGISTRATION_INTERCEPTOR: &str = "__sandbox_register__";

pub struct Sanitizer<'a> {
    rules: Vec<Box<dyn RewriteRule + 'a>>,
    module_roots: HashSet<String>,
    rewrites: usize,
}

impl<'a> Sanitizer<'a> {
    pub fn new(rules: Vec<Box<dyn RewriteRule + 'a>>) -> Self {
        Self {
            rules,
            module_roots: HashSet::new(),
            rewrites: 0,
        }
    }

    /// The three standard rules, in the order they are consulted.
    pub fn standard(prober: &'a dyn AvailabilityProber, config: &ExtractConfig) -> Self {
        Self::new(vec![
            Box::new(ImportRule::new(prober)),
            Box::new(ReadOpenRule::new(config.sentinel.clone())),
            Box::new(RegistrationRule::new(config.registration_names.clone())),
        ])
    }

    /// How many nodes the pass has replaced so far.
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    fn rule_for(&self, shape: NodeShape<'_>) -> Option<usize> {
        match shape {
            NodeShape::Other => return None,
            // `self.setup()` is a method, not the registration call.
            NodeShape::CallOf(CallTarget::Dotted { root, .. })
                if !self.module_roots.contains(root) =>
            {
                return None
            }
            _ => {}
        }
        self.rules.iter().position(|rule| rule.applies_to(shape))
    }
}

/// Every name an import statement binds anywhere in the tree.
#[derive(Default)]
struct ImportedNames(HashSet<String>);

impl Transformer for ImportedNames {
    fn visit_statement(&mut self, stmt: Statement) -> Statement {
        match &stmt.kind {
            StatementKind::RegularImport(imports) => self.0.extend(
                imports
                    .iter()
                    .filter_map(|import| import.bound_name())
                    .map(|name| name.as_str().to_string()),
            ),
            StatementKind::SelectiveImport {
                mode: FromImportMode::List(items),
                ..
            } => self.0.extend(
                items
                    .iter()
                    .map(|item| item.bound_name().as_str().to_string()),
            ),
            _ => {}
        }
        stmt
    }
}

impl Transformer for Sanitizer<'_> {
    fn transform(&mut self, ast: Ast) -> Ast {
        let mut imported = ImportedNames::default();
        let ast = imported.transform(ast);
        self.module_roots.extend(imported.0);
        walk_ast(self, ast)
    }

    fn visit_statement(&mut self, stmt: Statement) -> Statement {
        let Some(index) = self.rule_for(NodeShape::of_statement(&stmt.kind)) else {
            return stmt;
        };

        let rule = &self.rules[index];
        let before = stmt.clone();
        let after = rule.rewrite_statement(stmt);
        if after != before {
            self.rewrites += 1;
            log(LogLevel::Trace, || {
                format!("Rule {} rewrote statement on line {}", rule.name(), after.line)
            });
        }
        after
    }

    fn visit_expr(&mut self, expr: Expr) -> Expr {
        let Some(index) = self.rule_for(NodeShape::of_expr(&expr)) else {
            return expr;
        };

        let rule = &self.rules[index];
        let before = expr.clone();
        let after = rule.rewrite_expr(expr);
        if after != before {
            self.rewrites += 1;
            log(LogLevel::Trace, || format!("Rule {} rewrote a call", rule.name()));
        }
        after
    }
}

/// Rewrite `ast` with the standard rules.
pub fn neutralize(ast: Ast, prober: &dyn AvailabilityProber, config: &ExtractConfig) -> Ast {
    let mut sanitizer = Sanitizer::standard(prober, config);
    let ast = sanitizer.transform(ast);
    log(LogLevel::Debug, || {
        format!("Neutralizer replaced {} node(s)", sanitizer.rewrites())
    });
    ast
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        domain::{Identifier, Text},
        parser::{
            parse,
            types::{CallArgs, StatementKind},
        },
    };

    fn neutralized(input: &str) -> Ast {
        let ast = parse(&Text::new(input)).expect("Failed to parse");
        neutralize(ast, &HostModules::default(), &ExtractConfig::default())
    }

    fn calls_to(ast: &Ast, name: &str) -> usize {
        struct Counter<'n> {
            name: &'n str,
            count: usize,
        }
        impl Transformer for Counter<'_> {
            fn visit_expr(&mut self, expr: Expr) -> Expr {
                if let Expr::FunctionCall { callee, .. } = &expr {
                    if callee.as_variable().map(Identifier::as_str) == Some(self.name) {
                        self.count += 1;
                    }
                }
                expr
            }
        }
        let mut counter = Counter { name, count: 0 };
        counter.transform(ast.clone());
        counter.count
    }

    #[test]
    fn typical_descriptor() {
        let input = r#"
import os
from setuptools import setup, find_packages

here = os.path.abspath(os.path.dirname(__file__))
with open(os.path.join(here, 'README.md')) as f:
    long_description = f.read()

def main():
    setup(
        name='pkg',
        packages=find_packages(),
        install_requires=['requests>=2'],
    )

if __name__ == '__main__':
    main()
"#;
        let ast = neutralized(input);

        assert!(matches!(ast[0].kind, StatementKind::RegularImport(_)));
        assert!(matches!(
            ast[1].kind,
            StatementKind::UnpackingAssignment { .. }
        ));
        assert_eq!(calls_to(&ast, STUB_FACTORY), 2);
        assert_eq!(calls_to(&ast, STRING_IO_FACTORY), 1);
        assert_eq!(calls_to(&ast, REGISTRATION_INTERCEPTOR), 1);
        assert_eq!(calls_to(&ast, "setup"), 0);
        assert_eq!(calls_to(&ast, "open"), 0);
    }

    #[test]
    fn nested_rewrites_inside_registration_arguments() {
        let ast = neutralized("setup(long_description=open('README').read())");
        assert_eq!(calls_to(&ast, REGISTRATION_INTERCEPTOR), 1);
        assert_eq!(calls_to(&ast, STRING_IO_FACTORY), 1);
    }

    #[test]
    fn imports_inside_blocks_are_rewritten() {
        let input = "
try:
    import numpy
except ImportError:
    numpy = None
";
        let ast = neutralized(input);
        let StatementKind::TryExcept { try_block, .. } = &ast[0].kind else {
            panic!("expected try");
        };
        assert_eq!(
            try_block[0].kind,
            StatementKind::UnpackingAssignment {
                left: vec![Expr::Variable(Identifier::new("numpy").expect("valid"))],
                right: Expr::Tuple(vec![Expr::call(
                    Expr::Variable(Identifier::internal(STUB_FACTORY)),
                    CallArgs::positional(vec![Expr::StringLiteral("numpy".into())]),
                )]),
            }
        );
        assert_eq!(try_block[0].line, 3);
    }

    #[test]
    fn registration_through_a_module_path() {
        let input = "
import setuptools
from distutils import core as dcore

class Build:
    def run(self, obj):
        self.setup()
        obj.setup()

setuptools.setup(install_requires=['a'])
dcore.setup(install_requires=['b'])
";
        let ast = neutralized(input);
        assert_eq!(calls_to(&ast, REGISTRATION_INTERCEPTOR), 2);

        let StatementKind::ClassDef { body, .. } = &ast[2].kind else {
            panic!("expected class");
        };
        let StatementKind::FunctionDef { body, .. } = &body[0].kind else {
            panic!("expected method");
        };
        for stmt in body {
            let StatementKind::Expression(Expr::FunctionCall { callee, .. }) = &stmt.kind else {
                panic!("expected call");
            };
            assert!(matches!(callee.as_ref(), Expr::MemberAccess { .. }));
        }
    }

    #[test]
    fn untouched_script_is_identical() {
        let input = "
import sys
x = [i * 2 for i in range(3)]
print(x, file=sys.stderr)
";
        let ast = parse(&Text::new(input)).expect("Failed to parse");
        let host = HostModules::default();
        let mut sanitizer = Sanitizer::standard(&host, &ExtractConfig::default());
        let rewritten = sanitizer.transform(ast.clone());
        assert_eq!(rewritten, ast);
        assert_eq!(sanitizer.rewrites(), 0);
    }
}
