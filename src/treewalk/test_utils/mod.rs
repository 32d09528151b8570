mod errors;

pub(crate) use errors::*;

use crate::{
    config::ExtractConfig,
    domain::Text,
    parser::{parse, types::StatementKind},
    sanitizer::HostModules,
    treewalk::{RaisedException, TreewalkInterpreter, TreewalkValue},
};

/// Scripts run by the helpers see `__file__` as this path.
pub(crate) const TEST_PATH: &str = "setup.py";

fn interpreter_with_limit(recursion_limit: usize) -> TreewalkInterpreter<'static> {
    let config: &'static ExtractConfig = Box::leak(Box::new(ExtractConfig {
        recursion_limit,
        ..ExtractConfig::default()
    }));
    let prober: &'static HostModules = Box::leak(Box::new(HostModules::default()));
    TreewalkInterpreter::new(config, prober, TEST_PATH)
}

fn try_run(input: &str, recursion_limit: usize) -> (TreewalkInterpreter<'static>, Result<(), RaisedException>) {
    let ast = match parse(&Text::new(input)) {
        Ok(ast) => ast,
        Err(e) => panic!("Parser error: {e:?}"),
    };
    let interpreter = interpreter_with_limit(recursion_limit);
    let result = interpreter.execute(&ast);
    (interpreter, result)
}

/// Execute `input` as-is, without neutralizing it first, and panic if it raises.
pub(crate) fn run(input: &str) -> TreewalkInterpreter<'static> {
    let (interpreter, result) = try_run(input, ExtractConfig::default().recursion_limit);
    if let Err(e) = result {
        panic!("Interpreter error: {} {:?}", e, e.exception.payload);
    }
    interpreter
}

pub(crate) fn run_expect_error(input: &str) -> RaisedException {
    run_expect_error_with_limit(input, ExtractConfig::default().recursion_limit)
}

pub(crate) fn run_expect_error_with_limit(input: &str, recursion_limit: usize) -> RaisedException {
    match try_run(input, recursion_limit).1 {
        Ok(()) => panic!("Expected an exception from:\n{input}"),
        Err(e) => e,
    }
}

pub(crate) fn read(interpreter: &TreewalkInterpreter, name: &str) -> TreewalkValue {
    match interpreter.read_global(name) {
        Some(value) => value,
        None => panic!("Failed to read var: {name}"),
    }
}

/// Evaluate a single expression against a fresh interpreter.
pub(crate) fn eval(input: &str) -> TreewalkValue {
    eval_in(&interpreter_with_limit(ExtractConfig::default().recursion_limit), input)
}

/// Evaluate a single expression in the globals of an interpreter that has already run.
pub(crate) fn eval_in(interpreter: &TreewalkInterpreter, input: &str) -> TreewalkValue {
    let ast = match parse(&Text::new(input)) {
        Ok(ast) => ast,
        Err(e) => panic!("Parser error: {e:?}"),
    };
    let [statement] = ast.as_slice() else {
        panic!("Expected a single expression: {input}");
    };
    let StatementKind::Expression(expr) = &statement.kind else {
        panic!("Expected an expression: {input}");
    };
    match interpreter.evaluate_expr(expr) {
        Ok(value) => value,
        Err(e) => panic!("Interpreter error: {} {:?}", e, e.exception.payload),
    }
}

pub(crate) fn list_of_ints(items: &[i64]) -> TreewalkValue {
    TreewalkValue::list(items.iter().copied().map(TreewalkValue::Int).collect())
}

pub(crate) fn list_of_strs(items: &[&str]) -> TreewalkValue {
    TreewalkValue::list(items.iter().copied().map(TreewalkValue::str).collect())
}
