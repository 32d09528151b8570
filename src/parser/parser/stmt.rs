use crate::{
    lexer::Token,
    parser::{
        types::{
            BinOp, CallArg, ConditionalAst, ExceptHandler, Expr, RaiseKind, Statement,
            StatementKind, WithItem,
        },
        Parser, ParserError,
    },
};

impl Parser<'_> {
    pub fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        self.consume_newlines();
        let start_line = self.line_number();
        let stmt = match self.current_token() {
            Token::Del => self.parse_delete(),
            Token::Def | Token::AtSign | Token::Async => self.parse_decorated(),
            Token::Assert => self.parse_assert(),
            Token::Class => self.parse_class_definition(vec![]),
            Token::Return => self.parse_return(),
            Token::Pass => {
                self.consume(&Token::Pass)?;
                Ok(StatementKind::Pass)
            }
            Token::Break => {
                self.consume(&Token::Break)?;
                Ok(StatementKind::Break)
            }
            Token::Continue => {
                self.consume(&Token::Continue)?;
                Ok(StatementKind::Continue)
            }
            Token::Nonlocal => {
                self.consume(&Token::Nonlocal)?;
                let identifiers = self.parse_identifiers()?;
                Ok(StatementKind::Nonlocal(identifiers))
            }
            Token::Global => {
                self.consume(&Token::Global)?;
                let identifiers = self.parse_identifiers()?;
                Ok(StatementKind::Global(identifiers))
            }
            Token::If => self.parse_if_else(),
            Token::While => self.parse_while_loop(),
            Token::For => self.parse_for_in_loop(),
            Token::Import => self.parse_regular_import(),
            Token::From => self.parse_selective_import(),
            Token::Try => self.parse_try_except(),
            Token::Raise => self.parse_raise(),
            Token::With => self.parse_context_manager(),
            _ => self.parse_statement_without_starting_keyword(),
        }?;

        Ok(Statement::new(start_line, stmt))
    }

    fn parse_statement_without_starting_keyword(&mut self) -> Result<StatementKind, ParserError> {
        let left = self.parse_expr()?;

        match self.current_token() {
            Token::Assign => self.parse_assignment(left),
            Token::Colon => {
                self.consume(&Token::Colon)?;
                let annotation = self.parse_simple_expr()?;
                let value = if self.consume_optional(&Token::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                if !left.is_assignable() {
                    return Err(self.syntax_error("illegal target for annotation"));
                }
                Ok(StatementKind::AnnotatedAssignment {
                    target: left,
                    annotation,
                    value,
                })
            }
            token if token.is_compound_assign() => {
                let operator = BinOp::from_compound(token).ok_or_else(|| self.unexpected())?;
                self.consume_current();

                if !matches!(
                    left,
                    Expr::Variable(_) | Expr::MemberAccess { .. } | Expr::IndexAccess { .. }
                ) {
                    return Err(self.syntax_error(
                        "illegal expression for augmented assignment",
                    ));
                }

                let value = self.parse_expr()?;
                Ok(StatementKind::CompoundAssignment {
                    operator,
                    target: Box::new(left),
                    value: Box::new(value),
                })
            }
            _ => Ok(StatementKind::Expression(left)),
        }
    }

    fn parse_assignment(&mut self, left: Expr) -> Result<StatementKind, ParserError> {
        let mut targets = vec![left];
        self.consume(&Token::Assign)?;
        let mut right = self.parse_expr()?;
        while self.consume_optional(&Token::Assign) {
            targets.push(right);
            right = self.parse_expr()?;
        }

        if let Some(bad) = targets.iter().find(|t| !t.is_assignable()) {
            let message = format!("cannot assign to {}", describe(bad));
            return Err(self.syntax_error(message));
        }

        if targets.len() > 1 {
            return Ok(StatementKind::MultipleAssignment {
                left: targets,
                right,
            });
        }

        match targets.remove(0) {
            Expr::Tuple(items) | Expr::List(items) => {
                Ok(StatementKind::UnpackingAssignment { left: items, right })
            }
            left => Ok(StatementKind::Assignment { left, right }),
        }
    }

    fn parse_assert(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Assert)?;
        let test = self.parse_simple_expr()?;
        let message = if self.consume_optional(&Token::Comma) {
            Some(self.parse_simple_expr()?)
        } else {
            None
        };
        Ok(StatementKind::Assert { test, message })
    }

    fn parse_delete(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Del)?;
        let targets = match self.parse_expr()? {
            Expr::Tuple(items) => items,
            single => vec![single],
        };
        Ok(StatementKind::Delete(targets))
    }

    fn parse_return(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Return)?;
        let expr = if self.end_of_statement() {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(StatementKind::Return(expr))
    }

    /// Decorators may precede either a function or a class.
    fn parse_decorated(&mut self) -> Result<StatementKind, ParserError> {
        let mut decorators: Vec<Expr> = vec![];

        while self.current_token() == &Token::AtSign {
            self.consume(&Token::AtSign)?;
            decorators.push(self.parse_simple_expr()?);

            // Each decorator must be ended by 1 and only 1 newline
            self.consume(&Token::Newline)?;
        }

        if self.current_token() == &Token::Class {
            return self.parse_class_definition(decorators);
        }

        let is_async = self.consume_optional(&Token::Async);

        self.consume(&Token::Def)?;
        let name = self.parse_identifier()?;
        self.consume(&Token::LParen)?;
        let args = self.parse_function_def_args(&Token::RParen)?;
        self.consume(&Token::RParen)?;

        // Return annotations are parsed and dropped.
        if self.consume_optional(&Token::ReturnTypeArrow) {
            let _ = self.parse_simple_expr()?;
        }

        self.consume(&Token::Colon)?;
        let body = self.parse_block()?;

        Ok(StatementKind::FunctionDef {
            name,
            args,
            body,
            decorators,
            is_async,
        })
    }

    fn parse_class_definition(
        &mut self,
        decorators: Vec<Expr>,
    ) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Class)?;
        let name = self.parse_identifier()?;

        let mut parents = vec![];
        let mut keywords = vec![];

        if self.current_token() == &Token::LParen {
            for arg in self.parse_function_call_args()?.args {
                match arg {
                    CallArg::Positional(parent) => parents.push(parent),
                    CallArg::Keyword { arg, expr } => keywords.push((arg, expr)),
                    CallArg::Unpack(_) | CallArg::KwargsUnpack(_) => {
                        return Err(self.syntax_error("unpacking in class bases is not supported"));
                    }
                }
            }
        }

        self.consume(&Token::Colon)?;
        let body = self.parse_block()?;

        Ok(StatementKind::ClassDef {
            name,
            parents,
            keywords,
            body,
            decorators,
        })
    }

    fn parse_if_else(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::If)?;
        let condition = self.parse_simple_expr()?;
        self.consume(&Token::Colon)?;
        let if_part = ConditionalAst {
            condition,
            ast: self.parse_block()?,
        };

        let mut elif_parts = vec![];
        while self.current_token() == &Token::Elif {
            self.consume(&Token::Elif)?;
            let condition = self.parse_simple_expr()?;
            self.consume(&Token::Colon)?;

            // We must use push because these will be evaluated in order
            elif_parts.push(ConditionalAst {
                condition,
                ast: self.parse_block()?,
            });
        }

        let else_part = self.parse_optional_else()?;

        Ok(StatementKind::IfElse {
            if_part,
            elif_parts,
            else_part,
        })
    }

    fn parse_while_loop(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::While)?;
        let condition = self.parse_simple_expr()?;
        self.consume(&Token::Colon)?;
        let ast = self.parse_block()?;
        let else_block = self.parse_optional_else()?;

        Ok(StatementKind::WhileLoop {
            body: ConditionalAst { condition, ast },
            else_block,
        })
    }

    fn parse_for_in_loop(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::For)?;
        let index = self.parse_target_list()?;
        self.consume(&Token::In)?;
        let iterable = self.parse_expr()?;
        self.consume(&Token::Colon)?;
        let body = self.parse_block()?;
        let else_block = self.parse_optional_else()?;

        Ok(StatementKind::ForInLoop {
            index,
            iterable,
            body,
            else_block,
        })
    }

    fn parse_try_except(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Try)?;
        self.consume(&Token::Colon)?;
        let try_block = self.parse_block()?;

        let mut handlers: Vec<ExceptHandler> = vec![];
        while self.current_token() == &Token::Except {
            self.consume(&Token::Except)?;
            if self.consume_optional(&Token::Colon) {
                let block = self.parse_block()?;
                handlers.push(ExceptHandler::default(block));
            } else {
                let expr = self.parse_simple_expr()?;
                let alias = self.parse_optional_alias()?;
                self.consume(&Token::Colon)?;
                let block = self.parse_block()?;
                handlers.push(ExceptHandler::typed(expr, alias, block));
            }
        }

        if handlers
            .iter()
            .take(handlers.len().saturating_sub(1))
            .any(|h| h.is_default())
        {
            return Err(self.syntax_error("default 'except:' must be last"));
        }

        let else_block = self.parse_optional_else()?;

        let finally_block = if self.consume_optional(&Token::Finally) {
            self.consume(&Token::Colon)?;
            Some(self.parse_block()?)
        } else {
            None
        };

        if handlers.is_empty() && finally_block.is_none() {
            return Err(self.syntax_error("expected 'except' or 'finally' block"));
        }

        Ok(StatementKind::TryExcept {
            try_block,
            handlers,
            else_block,
            finally_block,
        })
    }

    fn parse_context_manager(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::With)?;

        let mut items = vec![];
        loop {
            let expr = self.parse_simple_expr()?;
            let target = if self.consume_optional(&Token::As) {
                Some(self.parse_target()?)
            } else {
                None
            };
            items.push(WithItem { expr, target });

            if !self.consume_optional(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::Colon)?;
        let block = self.parse_block()?;

        Ok(StatementKind::ContextManager { items, block })
    }

    fn parse_raise(&mut self) -> Result<StatementKind, ParserError> {
        self.consume(&Token::Raise)?;

        if self.end_of_statement() {
            return Ok(StatementKind::Raise(RaiseKind::Reraise));
        }

        let exception = self.parse_simple_expr()?;

        if self.consume_optional(&Token::From) {
            let cause = self.parse_simple_expr()?;
            Ok(StatementKind::Raise(RaiseKind::RaiseFrom { exception, cause }))
        } else {
            Ok(StatementKind::Raise(RaiseKind::Raise(exception)))
        }
    }
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::FunctionCall { .. } => "function call",
        Expr::StringLiteral(_)
        | Expr::Integer(_)
        | Expr::Float(_)
        | Expr::Boolean(_)
        | Expr::None
        | Expr::BytesLiteral(_) => "literal",
        Expr::BinaryOperation { .. } | Expr::UnaryOperation { .. } => "expression",
        _ => "this expression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::parser::{
        test_utils::*,
        types::{CallArgs, CompareOp, ForClause, Param, Params},
    };

    #[test]
    fn assignment_targets() {
        let input = r#"
a = 1
a.b = 2
a[0] = 3
x, y = 4, 5
[p, q] = r
m = n = 6
"#;
        let expected = ast![
            stmt_assign!(var!("a"), int!(1)),
            stmt_assign!(member_access!(var!("a"), "b"), int!(2)),
            stmt_assign!(
                Expr::IndexAccess {
                    object: Box::new(var!("a")),
                    index: Box::new(int!(0)),
                },
                int!(3)
            ),
            stmt!(StatementKind::UnpackingAssignment {
                left: vec![var!("x"), var!("y")],
                right: tuple![int!(4), int!(5)],
            }),
            stmt!(StatementKind::UnpackingAssignment {
                left: vec![var!("p"), var!("q")],
                right: var!("r"),
            }),
            stmt!(StatementKind::MultipleAssignment {
                left: vec![var!("m"), var!("n")],
                right: int!(6),
            }),
        ];
        assert_ast_eq!(input, expected);
    }

    #[test]
    fn starred_unpacking_target() {
        assert_stmt_eq!(
            "first, *rest = items",
            StatementKind::UnpackingAssignment {
                left: vec![var!("first"), Expr::Starred(Box::new(var!("rest")))],
                right: var!("items"),
            }
        );
    }

    #[test]
    fn invalid_assignment_target() {
        let e = expect_error!("f() = 1");
        assert_eq!(
            e,
            ParserError::syntax_error("cannot assign to function call", 1)
        );
    }

    #[test]
    fn compound_and_annotated_assignment() {
        let input = "
x += 1
reqs: list = []
";
        let expected = ast![
            stmt!(StatementKind::CompoundAssignment {
                operator: BinOp::Add,
                target: Box::new(var!("x")),
                value: Box::new(int!(1)),
            }),
            stmt!(StatementKind::AnnotatedAssignment {
                target: var!("reqs"),
                annotation: var!("list"),
                value: Some(list![]),
            }),
        ];
        assert_ast_eq!(input, expected);
    }

    #[test]
    fn statements_record_their_line() {
        let input = "
a = 1

def f():
    return 2
b = '''x
y'''
c = 3
";
        let ast = parse!(input);
        let lines: Vec<usize> = ast.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 4, 6, 8]);
    }

    #[test]
    fn function_definition() {
        let input = "
@decorator
def read(*parts, encoding='utf-8', **kwargs) -> str:
    return parts
";
        let expected = StatementKind::FunctionDef {
            name: ident!("read"),
            args: Params {
                args: vec![],
                args_var: Some(ident!("parts")),
                kwonly_args: vec![Param {
                    arg: ident!("encoding"),
                    default: Some(str!("utf-8")),
                }],
                kwargs_var: Some(ident!("kwargs")),
            },
            body: ast![stmt!(StatementKind::Return(Some(var!("parts"))))],
            decorators: vec![var!("decorator")],
            is_async: false,
        };
        assert_stmt_eq!(input, expected);
    }

    #[test]
    fn class_definition() {
        let input = "
class Build(build_py, object, metaclass=Meta):
    pass
";
        let expected = StatementKind::ClassDef {
            name: ident!("Build"),
            parents: vec![var!("build_py"), var!("object")],
            keywords: vec![(ident!("metaclass"), var!("Meta"))],
            body: ast![stmt!(StatementKind::Pass)],
            decorators: vec![],
        };
        assert_stmt_eq!(input, expected);
    }

    #[test]
    fn if_elif_else() {
        let input = "
if sys.version_info < (3, 8):
    a = 1
elif PY2:
    a = 2
else:
    a = 3
";
        let expected = StatementKind::IfElse {
            if_part: ConditionalAst {
                condition: Expr::ComparisonChain {
                    left: Box::new(member_access!(var!("sys"), "version_info")),
                    ops: vec![(CompareOp::LessThan, tuple![int!(3), int!(8)])],
                },
                ast: ast![stmt_assign!(var!("a"), int!(1))],
            },
            elif_parts: vec![ConditionalAst {
                condition: var!("PY2"),
                ast: ast![stmt_assign!(var!("a"), int!(2))],
            }],
            else_part: Some(ast![stmt_assign!(var!("a"), int!(3))]),
        };
        assert_stmt_eq!(input, expected);
    }

    #[test]
    fn for_loop_with_tuple_target_and_else() {
        let input = "
for k, v in items:
    pass
else:
    done = True
";
        let expected = StatementKind::ForInLoop {
            index: tuple![var!("k"), var!("v")],
            iterable: var!("items"),
            body: ast![stmt!(StatementKind::Pass)],
            else_block: Some(ast![stmt_assign!(var!("done"), bool!(true))]),
        };
        assert_stmt_eq!(input, expected);
    }

    #[test]
    fn while_loop() {
        let input = "
while i < 3:
    i += 1
";
        let ast = parse!(input);
        assert!(matches!(
            ast[0].kind,
            StatementKind::WhileLoop {
                else_block: None,
                ..
            }
        ));
    }

    #[test]
    fn try_except_finally() {
        let input = "
try:
    import numpy
except (ImportError, OSError) as e:
    numpy = None
except:
    raise
else:
    pass
finally:
    cleanup()
";
        let ast = parse!(input);
        let StatementKind::TryExcept {
            handlers,
            else_block,
            finally_block,
            ..
        } = &ast[0].kind
        else {
            panic!("expected try/except, found {:?}", ast[0]);
        };

        assert_eq!(
            handlers,
            &vec![
                ExceptHandler::typed(
                    tuple![var!("ImportError"), var!("OSError")],
                    Some(ident!("e")),
                    ast![Statement::new(
                        5,
                        StatementKind::Assignment {
                            left: var!("numpy"),
                            right: Expr::None,
                        }
                    )],
                ),
                ExceptHandler::default(ast![Statement::new(
                    7,
                    StatementKind::Raise(RaiseKind::Reraise)
                )]),
            ]
        );
        assert_eq!(
            else_block,
            &Some(ast![Statement::new(9, StatementKind::Pass)])
        );
        assert_eq!(
            finally_block,
            &Some(ast![Statement::new(
                11,
                StatementKind::Expression(call!(var!("cleanup")))
            )])
        );
    }

    #[test]
    fn default_except_must_be_last() {
        let input = "
try:
    pass
except:
    pass
except ValueError:
    pass
";
        let e = expect_error!(input);
        assert!(matches!(e, ParserError::SyntaxError { .. }));
    }

    #[test]
    fn try_without_handlers() {
        let input = "
try:
    pass
x = 1
";
        assert!(matches!(
            expect_error!(input),
            ParserError::SyntaxError { .. }
        ));
    }

    #[test]
    fn with_multiple_items() {
        let input = "
with open('a') as f, lock:
    pass
";
        let ast = parse!(input);
        let StatementKind::ContextManager { items, .. } = &ast[0].kind else {
            panic!("expected with statement, found {:?}", ast[0]);
        };
        assert_eq!(
            items,
            &vec![
                WithItem {
                    expr: call!(var!("open"), CallArgs::positional(vec![str!("a")])),
                    target: Some(var!("f")),
                },
                WithItem {
                    expr: var!("lock"),
                    target: None,
                },
            ]
        );
    }

    #[test]
    fn raise_from() {
        assert_stmt_eq!(
            "raise RuntimeError('x') from err",
            StatementKind::Raise(RaiseKind::RaiseFrom {
                exception: call!(
                    var!("RuntimeError"),
                    CallArgs::positional(vec![str!("x")])
                ),
                cause: var!("err"),
            })
        );
    }

    #[test]
    fn simple_statements() {
        let input = "
global a, b
del a[0], b
assert x, 'message'
";
        let expected = ast![
            stmt!(StatementKind::Global(vec![ident!("a"), ident!("b")])),
            stmt!(StatementKind::Delete(vec![
                Expr::IndexAccess {
                    object: Box::new(var!("a")),
                    index: Box::new(int!(0)),
                },
                var!("b"),
            ])),
            stmt!(StatementKind::Assert {
                test: var!("x"),
                message: Some(str!("message")),
            }),
        ];
        assert_ast_eq!(input, expected);
    }

    #[test]
    fn comprehension_in_statement() {
        let input = "reqs = [r for r in base if r]";
        assert_stmt_eq!(
            input,
            StatementKind::Assignment {
                left: var!("reqs"),
                right: Expr::ListComprehension {
                    body: Box::new(var!("r")),
                    clauses: vec![ForClause {
                        target: var!("r"),
                        iterable: var!("base"),
                        conditions: vec![var!("r")],
                    }],
                },
            }
        );
    }
}
