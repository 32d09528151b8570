use crate::parser::types::{
    Ast, CallArg, CallArgs, ConditionalAst, DictOperation, ExceptHandler, Expr, ExprFormat,
    FStringPart, ForClause, Param, Params, RaiseKind, SliceParams, Statement, StatementKind,
    WithItem,
};

/// A rewrite pass over the syntax tree. The walk visits children before their parent, so a hook
/// always sees a node whose subtrees have already been rewritten.
pub trait Transformer {
    fn visit_statement(&mut self, stmt: Statement) -> Statement {
        stmt
    }

    fn visit_expr(&mut self, expr: Expr) -> Expr {
        expr
    }

    fn transform(&mut self, ast: Ast) -> Ast
    where
        Self: Sized,
    {
        walk_ast(self, ast)
    }
}

pub fn walk_ast<T: Transformer>(t: &mut T, ast: Ast) -> Ast {
    ast.into_iter().map(|stmt| walk_statement(t, stmt)).collect()
}

pub fn walk_statement<T: Transformer>(t: &mut T, stmt: Statement) -> Statement {
    let line = stmt.line;
    let kind = match stmt.kind {
        StatementKind::Expression(expr) => StatementKind::Expression(walk_expr(t, expr)),
        StatementKind::Assignment { left, right } => StatementKind::Assignment {
            left: walk_expr(t, left),
            right: walk_expr(t, right),
        },
        StatementKind::MultipleAssignment { left, right } => StatementKind::MultipleAssignment {
            left: walk_exprs(t, left),
            right: walk_expr(t, right),
        },
        StatementKind::UnpackingAssignment { left, right } => {
            StatementKind::UnpackingAssignment {
                left: walk_exprs(t, left),
                right: walk_expr(t, right),
            }
        }
        StatementKind::CompoundAssignment {
            operator,
            target,
            value,
        } => StatementKind::CompoundAssignment {
            operator,
            target: walk_boxed(t, target),
            value: walk_boxed(t, value),
        },
        StatementKind::AnnotatedAssignment {
            target,
            annotation,
            value,
        } => StatementKind::AnnotatedAssignment {
            target: walk_expr(t, target),
            annotation: walk_expr(t, annotation),
            value: value.map(|v| walk_expr(t, v)),
        },
        StatementKind::IfElse {
            if_part,
            elif_parts,
            else_part,
        } => StatementKind::IfElse {
            if_part: walk_conditional(t, if_part),
            elif_parts: elif_parts
                .into_iter()
                .map(|part| walk_conditional(t, part))
                .collect(),
            else_part: else_part.map(|block| walk_ast(t, block)),
        },
        StatementKind::WhileLoop { body, else_block } => StatementKind::WhileLoop {
            body: walk_conditional(t, body),
            else_block: else_block.map(|block| walk_ast(t, block)),
        },
        StatementKind::ForInLoop {
            index,
            iterable,
            body,
            else_block,
        } => StatementKind::ForInLoop {
            index: walk_expr(t, index),
            iterable: walk_expr(t, iterable),
            body: walk_ast(t, body),
            else_block: else_block.map(|block| walk_ast(t, block)),
        },
        StatementKind::FunctionDef {
            name,
            args,
            body,
            decorators,
            is_async,
        } => StatementKind::FunctionDef {
            name,
            args: walk_params(t, args),
            body: walk_ast(t, body),
            decorators: walk_exprs(t, decorators),
            is_async,
        },
        StatementKind::ClassDef {
            name,
            parents,
            keywords,
            body,
            decorators,
        } => StatementKind::ClassDef {
            name,
            parents: walk_exprs(t, parents),
            keywords: keywords
                .into_iter()
                .map(|(key, value)| (key, walk_expr(t, value)))
                .collect(),
            body: walk_ast(t, body),
            decorators: walk_exprs(t, decorators),
        },
        StatementKind::Return(expr) => StatementKind::Return(expr.map(|e| walk_expr(t, e))),
        StatementKind::Delete(targets) => StatementKind::Delete(walk_exprs(t, targets)),
        StatementKind::Assert { test, message } => StatementKind::Assert {
            test: walk_expr(t, test),
            message: message.map(|m| walk_expr(t, m)),
        },
        StatementKind::TryExcept {
            try_block,
            handlers,
            else_block,
            finally_block,
        } => StatementKind::TryExcept {
            try_block: walk_ast(t, try_block),
            handlers: handlers
                .into_iter()
                .map(|handler| ExceptHandler {
                    exception: handler.exception.map(|e| walk_expr(t, e)),
                    alias: handler.alias,
                    block: walk_ast(t, handler.block),
                })
                .collect(),
            else_block: else_block.map(|block| walk_ast(t, block)),
            finally_block: finally_block.map(|block| walk_ast(t, block)),
        },
        StatementKind::Raise(kind) => StatementKind::Raise(match kind {
            RaiseKind::Reraise => RaiseKind::Reraise,
            RaiseKind::Raise(e) => RaiseKind::Raise(walk_expr(t, e)),
            RaiseKind::RaiseFrom { exception, cause } => RaiseKind::RaiseFrom {
                exception: walk_expr(t, exception),
                cause: walk_expr(t, cause),
            },
        }),
        StatementKind::ContextManager { items, block } => StatementKind::ContextManager {
            items: items
                .into_iter()
                .map(|item| WithItem {
                    expr: walk_expr(t, item.expr),
                    target: item.target.map(|target| walk_expr(t, target)),
                })
                .collect(),
            block: walk_ast(t, block),
        },
        kind @ (StatementKind::Pass
        | StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Global(_)
        | StatementKind::Nonlocal(_)
        | StatementKind::RegularImport(_)
        | StatementKind::SelectiveImport { .. }) => kind,
    };

    t.visit_statement(Statement::new(line, kind))
}

pub fn walk_expr<T: Transformer>(t: &mut T, expr: Expr) -> Expr {
    let expr = match expr {
        Expr::FString(parts) => Expr::FString(
            parts
                .into_iter()
                .map(|part| match part {
                    FStringPart::String(s) => FStringPart::String(s),
                    FStringPart::Expr(format) => FStringPart::Expr(ExprFormat {
                        expr: walk_boxed(t, format.expr),
                        format: format.format,
                        spec: format.spec,
                    }),
                })
                .collect(),
        ),
        Expr::List(items) => Expr::List(walk_exprs(t, items)),
        Expr::Tuple(items) => Expr::Tuple(walk_exprs(t, items)),
        Expr::Set(items) => Expr::Set(walk_exprs(t, items)),
        Expr::Dict(ops) => Expr::Dict(
            ops.into_iter()
                .map(|op| match op {
                    DictOperation::Pair(key, value) => {
                        DictOperation::Pair(walk_expr(t, key), walk_expr(t, value))
                    }
                    DictOperation::Unpack(mapping) => DictOperation::Unpack(walk_expr(t, mapping)),
                })
                .collect(),
        ),
        Expr::Starred(inner) => Expr::Starred(walk_boxed(t, inner)),
        Expr::MemberAccess { object, field } => Expr::MemberAccess {
            object: walk_boxed(t, object),
            field,
        },
        Expr::IndexAccess { object, index } => Expr::IndexAccess {
            object: walk_boxed(t, object),
            index: walk_boxed(t, index),
        },
        Expr::SliceOperation { object, params } => {
            let SliceParams { start, stop, step } = *params;
            Expr::SliceOperation {
                object: walk_boxed(t, object),
                params: Box::new(SliceParams {
                    start: start.map(|e| walk_expr(t, e)),
                    stop: stop.map(|e| walk_expr(t, e)),
                    step: step.map(|e| walk_expr(t, e)),
                }),
            }
        }
        Expr::FunctionCall { callee, args } => Expr::FunctionCall {
            callee: walk_boxed(t, callee),
            args: walk_call_args(t, args),
        },
        Expr::UnaryOperation { op, right } => Expr::UnaryOperation {
            op,
            right: walk_boxed(t, right),
        },
        Expr::BinaryOperation { left, op, right } => Expr::BinaryOperation {
            left: walk_boxed(t, left),
            op,
            right: walk_boxed(t, right),
        },
        Expr::LogicalOperation { left, op, right } => Expr::LogicalOperation {
            left: walk_boxed(t, left),
            op,
            right: walk_boxed(t, right),
        },
        Expr::ComparisonChain { left, ops } => Expr::ComparisonChain {
            left: walk_boxed(t, left),
            ops: ops
                .into_iter()
                .map(|(op, right)| (op, walk_expr(t, right)))
                .collect(),
        },
        Expr::TernaryOp {
            condition,
            if_value,
            else_value,
        } => Expr::TernaryOp {
            condition: walk_boxed(t, condition),
            if_value: walk_boxed(t, if_value),
            else_value: walk_boxed(t, else_value),
        },
        Expr::Lambda { args, expr } => Expr::Lambda {
            args: walk_params(t, args),
            expr: walk_boxed(t, expr),
        },
        Expr::NamedExpr { target, value } => Expr::NamedExpr {
            target,
            value: walk_boxed(t, value),
        },
        Expr::ListComprehension { body, clauses } => Expr::ListComprehension {
            body: walk_boxed(t, body),
            clauses: walk_clauses(t, clauses),
        },
        Expr::SetComprehension { body, clauses } => Expr::SetComprehension {
            body: walk_boxed(t, body),
            clauses: walk_clauses(t, clauses),
        },
        Expr::GeneratorComprehension { body, clauses } => Expr::GeneratorComprehension {
            body: walk_boxed(t, body),
            clauses: walk_clauses(t, clauses),
        },
        Expr::DictComprehension {
            key_body,
            value_body,
            clauses,
        } => Expr::DictComprehension {
            key_body: walk_boxed(t, key_body),
            value_body: walk_boxed(t, value_body),
            clauses: walk_clauses(t, clauses),
        },
        Expr::Yield(value) => Expr::Yield(value.map(|v| walk_boxed(t, v))),
        Expr::YieldFrom(value) => Expr::YieldFrom(walk_boxed(t, value)),
        leaf @ (Expr::None
        | Expr::Ellipsis
        | Expr::Boolean(_)
        | Expr::Integer(_)
        | Expr::Float(_)
        | Expr::StringLiteral(_)
        | Expr::BytesLiteral(_)
        | Expr::Variable(_)) => leaf,
    };

    t.visit_expr(expr)
}

fn walk_boxed<T: Transformer>(t: &mut T, expr: Box<Expr>) -> Box<Expr> {
    Box::new(walk_expr(t, *expr))
}

fn walk_exprs<T: Transformer>(t: &mut T, exprs: Vec<Expr>) -> Vec<Expr> {
    exprs.into_iter().map(|e| walk_expr(t, e)).collect()
}

fn walk_conditional<T: Transformer>(t: &mut T, part: ConditionalAst) -> ConditionalAst {
    ConditionalAst {
        condition: walk_expr(t, part.condition),
        ast: walk_ast(t, part.ast),
    }
}

fn walk_call_args<T: Transformer>(t: &mut T, args: CallArgs) -> CallArgs {
    CallArgs {
        args: args
            .args
            .into_iter()
            .map(|arg| match arg {
                CallArg::Positional(e) => CallArg::Positional(walk_expr(t, e)),
                CallArg::Keyword { arg, expr } => CallArg::Keyword {
                    arg,
                    expr: walk_expr(t, expr),
                },
                CallArg::Unpack(e) => CallArg::Unpack(walk_expr(t, e)),
                CallArg::KwargsUnpack(e) => CallArg::KwargsUnpack(walk_expr(t, e)),
            })
            .collect(),
    }
}

fn walk_params<T: Transformer>(t: &mut T, params: Params) -> Params {
    let mut walk_list = |list: Vec<Param>| -> Vec<Param> {
        list.into_iter()
            .map(|param| Param {
                arg: param.arg,
                default: param.default.map(|d| walk_expr(t, d)),
            })
            .collect()
    };
    let args = walk_list(params.args);
    let kwonly_args = walk_list(params.kwonly_args);
    Params {
        args,
        args_var: params.args_var,
        kwonly_args,
        kwargs_var: params.kwargs_var,
    }
}

fn walk_clauses<T: Transformer>(t: &mut T, clauses: Vec<ForClause>) -> Vec<ForClause> {
    clauses
        .into_iter()
        .map(|clause| ForClause {
            target: walk_expr(t, clause.target),
            iterable: walk_expr(t, clause.iterable),
            conditions: walk_exprs(t, clause.conditions),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{domain::Text, parser::parse};

    /// Records every string literal it sees, in visiting order.
    #[derive(Default)]
    struct Collector {
        seen: Vec<String>,
    }

    impl Transformer for Collector {
        fn visit_expr(&mut self, expr: Expr) -> Expr {
            if let Expr::StringLiteral(s) = &expr {
                self.seen.push(s.clone());
            }
            expr
        }
    }

    struct Upper;

    impl Transformer for Upper {
        fn visit_expr(&mut self, expr: Expr) -> Expr {
            match expr {
                Expr::StringLiteral(s) => Expr::StringLiteral(s.to_uppercase()),
                other => other,
            }
        }
    }

    #[test]
    fn identity_walk_preserves_tree() {
        let input = "
def f(a=['x'], *, b={'k': 'v'}):
    with open('p') as fh:
        return [c for c in fh if c]
try:
    import foo
except ImportError as e:
    raise RuntimeError(f'{e!r}') from e
";
        let ast = parse(&Text::new(input)).expect("Failed to parse");
        let mut collector = Collector::default();
        let rewritten = collector.transform(ast.clone());
        assert_eq!(rewritten, ast);
        assert_eq!(collector.seen, vec!["x", "k", "v", "p"]);
    }

    #[test]
    fn rewrites_nested_nodes() {
        let ast = parse(&Text::new("if x:\n    y = ('a', ['b'])\n")).expect("Failed to parse");
        let rewritten = Upper.transform(ast);
        let expected = parse(&Text::new("if x:\n    y = ('A', ['B'])\n")).expect("Failed to parse");
        assert_eq!(rewritten, expected);
    }
}
