use crate::{
    core::{log, LogLevel},
    domain::Identifier,
    parser::types::{CallArgs, Expr},
    sanitizer::{CallTarget, NodeShape, RewriteRule, STRING_IO_FACTORY},
};

const WRITING_MODES: [char; 4] = ['w', 'a', 'x', '+'];

/// Turns `open(path)` and `open(path, "r")` into an in-memory text stream holding the sentinel.
/// Opens for writing, and opens whose mode is only known at runtime, are left alone.
pub struct ReadOpenRule {
    sentinel: String,
}

impl ReadOpenRule {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }
}

fn is_read_mode(args: &CallArgs) -> bool {
    if args.has_unpacking() {
        return false;
    }

    match args.positional_at(1).or_else(|| args.keyword("mode")) {
        None => true,
        Some(Expr::StringLiteral(mode)) => !mode.contains(WRITING_MODES),
        Some(_) => false,
    }
}

impl RewriteRule for ReadOpenRule {
    fn name(&self) -> &'static str {
        "read-open"
    }

    fn applies_to(&self, shape: NodeShape<'_>) -> bool {
        matches!(shape, NodeShape::CallOf(CallTarget::Bare("open")))
    }

    fn rewrite_expr(&self, expr: Expr) -> Expr {
        let Expr::FunctionCall { args, .. } = &expr else {
            return expr;
        };
        if !is_read_mode(args) {
            log(LogLevel::Debug, || {
                "Leaving a non-read open() call in place".to_string()
            });
            return expr;
        }

        Expr::call(
            Expr::Variable(Identifier::internal(STRING_IO_FACTORY)),
            CallArgs::positional(vec![Expr::StringLiteral(self.sentinel.clone())]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        domain::Text,
        parser::{parse, types::StatementKind},
    };

    fn rewrite(input: &str) -> Expr {
        let ast = parse(&Text::new(input)).expect("Failed to parse");
        let StatementKind::Expression(expr) = ast[0].kind.clone() else {
            panic!("expected expression");
        };
        ReadOpenRule::new("FIXME").rewrite_expr(expr)
    }

    fn string_io() -> Expr {
        Expr::call(
            Expr::Variable(Identifier::internal(STRING_IO_FACTORY)),
            CallArgs::positional(vec![Expr::StringLiteral("FIXME".into())]),
        )
    }

    #[test]
    fn read_modes_are_rewritten() {
        for input in [
            "open('README.rst')",
            "open('README.rst', 'r')",
            "open('README.rst', 'rb')",
            "open('README.rst', mode='rt')",
            "open(os.path.join(here, 'x'), encoding='utf-8')",
        ] {
            assert_eq!(rewrite(input), string_io(), "{input}");
        }
    }

    #[test]
    fn writing_modes_are_kept() {
        for input in [
            "open('out', 'w')",
            "open('out', 'a')",
            "open('out', mode='x')",
            "open('out', 'r+')",
            "open('out', mode)",
            "open(*args)",
        ] {
            let original = {
                let ast = parse(&Text::new(input)).expect("Failed to parse");
                let StatementKind::Expression(expr) = ast[0].kind.clone() else {
                    panic!("expected expression");
                };
                expr
            };
            assert_eq!(rewrite(input), original, "{input}");
        }
    }

    #[test]
    fn only_the_bare_name_applies() {
        let rule = ReadOpenRule::new("FIXME");
        assert!(rule.applies_to(NodeShape::CallOf(CallTarget::Bare("open"))));
        assert!(!rule.applies_to(NodeShape::CallOf(CallTarget::Dotted {
            root: "io",
            name: "open"
        })));
    }
}
