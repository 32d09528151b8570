//! The structural checks CPython's `compile()` performs before a module runs, plus the location
//! fix-up applied to rewritten trees.

use thiserror::Error;

use crate::parser::types::{Ast, Expr, RaiseKind, Statement, StatementKind};

#[derive(Debug, Error, PartialEq, Clone)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub line: usize,
}

impl CompileError {
    fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

#[derive(Clone, Copy)]
struct BlockContext {
    in_function: bool,
    in_loop: bool,
    at_module: bool,
}

/// Reject the constructs Python refuses to compile.
pub fn compile(ast: &Ast) -> Result<(), CompileError> {
    let context = BlockContext {
        in_function: false,
        in_loop: false,
        at_module: true,
    };
    check_block(ast, context)
}

fn check_block(block: &Ast, context: BlockContext) -> Result<(), CompileError> {
    block
        .iter()
        .try_for_each(|stmt| check_statement(stmt, context))
}

fn check_statement(stmt: &Statement, context: BlockContext) -> Result<(), CompileError> {
    let line = stmt.line;
    match &stmt.kind {
        StatementKind::Return(_) if !context.in_function => {
            return Err(CompileError::new("'return' outside function", line))
        }
        StatementKind::Break if !context.in_loop => {
            return Err(CompileError::new("'break' outside loop", line))
        }
        StatementKind::Continue if !context.in_loop => {
            return Err(CompileError::new("'continue' not properly in loop", line))
        }
        StatementKind::Nonlocal(_) if context.at_module => {
            return Err(CompileError::new(
                "nonlocal declaration not allowed at module level",
                line,
            ))
        }
        _ => {}
    }

    if !context.in_function && statement_exprs(&stmt.kind).into_iter().any(expr_yields) {
        return Err(CompileError::new("'yield' outside function", line));
    }

    match &stmt.kind {
        StatementKind::FunctionDef { body, .. } => check_block(
            body,
            BlockContext {
                in_function: true,
                in_loop: false,
                at_module: false,
            },
        ),
        StatementKind::ClassDef { body, .. } => check_block(
            body,
            BlockContext {
                in_function: false,
                in_loop: false,
                at_module: false,
            },
        ),
        StatementKind::WhileLoop { body, else_block } => {
            check_block(&body.ast, BlockContext { in_loop: true, ..context })?;
            else_block
                .iter()
                .try_for_each(|block| check_block(block, context))
        }
        StatementKind::ForInLoop {
            body, else_block, ..
        } => {
            check_block(body, BlockContext { in_loop: true, ..context })?;
            else_block
                .iter()
                .try_for_each(|block| check_block(block, context))
        }
        kind => nested_blocks(kind)
            .into_iter()
            .try_for_each(|block| check_block(block, context)),
    }
}

/// Whether a function body yields, which makes the function a generator. Nested functions and
/// classes are their own scopes and do not count.
pub fn contains_yield(body: &Ast) -> bool {
    body.iter().any(|stmt| {
        statement_exprs(&stmt.kind).into_iter().any(expr_yields)
            || nested_blocks(&stmt.kind).into_iter().any(contains_yield)
    })
}

fn expr_yields(expr: &Expr) -> bool {
    matches!(expr, Expr::Yield(_) | Expr::YieldFrom(_)) || expr.children().into_iter().any(expr_yields)
}

/// The expressions evaluated directly by a statement, not counting nested blocks.
fn statement_exprs(kind: &StatementKind) -> Vec<&Expr> {
    match kind {
        StatementKind::Expression(expr) => vec![expr],
        StatementKind::Assignment { left, right } => vec![left, right],
        StatementKind::MultipleAssignment { left, right }
        | StatementKind::UnpackingAssignment { left, right } => {
            left.iter().chain(std::iter::once(right)).collect()
        }
        StatementKind::CompoundAssignment { target, value, .. } => {
            vec![target.as_ref(), value.as_ref()]
        }
        StatementKind::AnnotatedAssignment {
            target,
            annotation,
            value,
        } => {
            let mut exprs = vec![target, annotation];
            exprs.extend(value.iter());
            exprs
        }
        StatementKind::IfElse {
            if_part,
            elif_parts,
            ..
        } => std::iter::once(&if_part.condition)
            .chain(elif_parts.iter().map(|part| &part.condition))
            .collect(),
        StatementKind::WhileLoop { body, .. } => vec![&body.condition],
        StatementKind::ForInLoop {
            index, iterable, ..
        } => vec![index, iterable],
        StatementKind::FunctionDef {
            args, decorators, ..
        } => decorators
            .iter()
            .chain(
                args.args
                    .iter()
                    .chain(args.kwonly_args.iter())
                    .filter_map(|param| param.default.as_ref()),
            )
            .collect(),
        StatementKind::ClassDef {
            parents,
            keywords,
            decorators,
            ..
        } => parents
            .iter()
            .chain(keywords.iter().map(|(_, expr)| expr))
            .chain(decorators.iter())
            .collect(),
        StatementKind::Return(value) => value.iter().collect(),
        StatementKind::Delete(targets) => targets.iter().collect(),
        StatementKind::Assert { test, message } => {
            std::iter::once(test).chain(message.iter()).collect()
        }
        StatementKind::TryExcept { handlers, .. } => handlers
            .iter()
            .filter_map(|handler| handler.exception.as_ref())
            .collect(),
        StatementKind::Raise(kind) => match kind {
            RaiseKind::Reraise => vec![],
            RaiseKind::Raise(exception) => vec![exception],
            RaiseKind::RaiseFrom { exception, cause } => vec![exception, cause],
        },
        StatementKind::ContextManager { items, .. } => items
            .iter()
            .flat_map(|item| std::iter::once(&item.expr).chain(item.target.iter()))
            .collect(),
        StatementKind::Pass
        | StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Global(_)
        | StatementKind::Nonlocal(_)
        | StatementKind::RegularImport(_)
        | StatementKind::SelectiveImport { .. } => vec![],
    }
}

/// Blocks that run in the same scope as the statement itself.
fn nested_blocks(kind: &StatementKind) -> Vec<&Ast> {
    match kind {
        StatementKind::IfElse {
            if_part,
            elif_parts,
            else_part,
        } => std::iter::once(&if_part.ast)
            .chain(elif_parts.iter().map(|part| &part.ast))
            .chain(else_part.iter())
            .collect(),
        StatementKind::WhileLoop { body, else_block } => {
            std::iter::once(&body.ast).chain(else_block.iter()).collect()
        }
        StatementKind::ForInLoop {
            body, else_block, ..
        } => std::iter::once(body).chain(else_block.iter()).collect(),
        StatementKind::TryExcept {
            try_block,
            handlers,
            else_block,
            finally_block,
        } => std::iter::once(try_block)
            .chain(handlers.iter().map(|handler| &handler.block))
            .chain(else_block.iter())
            .chain(finally_block.iter())
            .collect(),
        StatementKind::ContextManager { block, .. } => vec![block],
        _ => vec![],
    }
}

/// Give every statement without a line the line of the statement before it, or of its parent
/// when it is first in its block.
pub fn fix_missing_locations(ast: &mut Ast) {
    fix_block(ast, 1);
}

fn fix_block(block: &mut Ast, parent_line: usize) {
    let mut previous = parent_line;
    for stmt in block.iter_mut() {
        if stmt.line == 0 {
            stmt.line = previous;
        }
        previous = stmt.line;
        let line = stmt.line;
        for nested in blocks_mut(&mut stmt.kind) {
            fix_block(nested, line);
        }
    }
}

fn blocks_mut(kind: &mut StatementKind) -> Vec<&mut Ast> {
    match kind {
        StatementKind::IfElse {
            if_part,
            elif_parts,
            else_part,
        } => std::iter::once(&mut if_part.ast)
            .chain(elif_parts.iter_mut().map(|part| &mut part.ast))
            .chain(else_part.iter_mut())
            .collect(),
        StatementKind::WhileLoop { body, else_block } => std::iter::once(&mut body.ast)
            .chain(else_block.iter_mut())
            .collect(),
        StatementKind::ForInLoop {
            body, else_block, ..
        } => std::iter::once(body).chain(else_block.iter_mut()).collect(),
        StatementKind::TryExcept {
            try_block,
            handlers,
            else_block,
            finally_block,
        } => std::iter::once(try_block)
            .chain(handlers.iter_mut().map(|handler| &mut handler.block))
            .chain(else_block.iter_mut())
            .chain(finally_block.iter_mut())
            .collect(),
        StatementKind::ContextManager { block, .. }
        | StatementKind::FunctionDef { body: block, .. }
        | StatementKind::ClassDef { body: block, .. } => vec![block],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{domain::Text, parser::parse};

    fn check(input: &str) -> Result<(), CompileError> {
        compile(&parse(&Text::new(input)).expect("Failed to parse"))
    }

    #[test]
    fn valid_module() {
        let input = "
def gen():
    for i in range(3):
        if i:
            continue
        yield i
    return

while True:
    break
";
        assert_eq!(check(input), Ok(()));
    }

    #[test]
    fn return_outside_function() {
        assert_eq!(
            check("x = 1\nif x:\n    return x\n"),
            Err(CompileError::new("'return' outside function", 3))
        );
        assert!(check("class A:\n    return 1\n").is_err());
    }

    #[test]
    fn loop_control_outside_loop() {
        assert_eq!(
            check("break"),
            Err(CompileError::new("'break' outside loop", 1))
        );
        let input = "
for i in x:
    def f():
        continue
";
        assert_eq!(
            check(input),
            Err(CompileError::new("'continue' not properly in loop", 4))
        );
        assert_eq!(check("for i in x:\n    pass\nelse:\n    break\n").map_err(|e| e.line), Err(4));
    }

    #[test]
    fn module_level_nonlocal() {
        assert!(check("nonlocal x").is_err());
        assert!(check("def f():\n    x = 1\n    def g():\n        nonlocal x\n").is_ok());
    }

    #[test]
    fn module_level_yield() {
        assert_eq!(
            check("x = yield 1"),
            Err(CompileError::new("'yield' outside function", 1))
        );
    }

    #[test]
    fn generator_detection() {
        let ast = parse(&Text::new("yield 1\ndef inner():\n    pass\n")).expect("Failed to parse");
        assert!(contains_yield(&ast));
        let ast = parse(&Text::new("def inner():\n    yield 1\nx = lambda: 2\n"))
            .expect("Failed to parse");
        assert!(!contains_yield(&ast));
    }

    #[test]
    fn missing_lines_are_inherited() {
        let mut ast = parse(&Text::new("if x:\n    pass\n    pass\n")).expect("Failed to parse");
        let StatementKind::IfElse { if_part, .. } = &mut ast[0].kind else {
            panic!("expected if");
        };
        if_part.ast[1].line = 0;
        if_part.ast.push(Statement::new(0, StatementKind::Pass));

        fix_missing_locations(&mut ast);
        let StatementKind::IfElse { if_part, .. } = &ast[0].kind else {
            panic!("expected if");
        };
        let lines: Vec<_> = if_part.ast.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 2, 2]);
    }
}
