use std::rc::Rc;

use crate::{
    core::{log, Container, LogLevel},
    domain::{FromImportPath, ModuleName},
    parser::types::{
        Ast, ConditionalAst, ExceptHandler, Expr, FromImportMode, Params, RaiseKind,
        RegularImport, Statement, StatementKind, WithItem,
    },
    treewalk::{
        compile::contains_yield,
        interpreter::{Frame, FrameKind},
        types::{Class, Exception, Function, FunctionBody},
        utils::Args,
        Raise, RaisedException, Scope, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

/// How a block finished.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(TreewalkValue),
}

impl TreewalkInterpreter<'_> {
    pub(crate) fn execute_block(&self, block: &Ast) -> TreewalkResult<Flow> {
        for stmt in block {
            match self.execute_statement(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_statement(&self, stmt: &Statement) -> TreewalkResult<Flow> {
        self.set_line(stmt.line);
        log(LogLevel::Trace, || format!("Line {}: {:?}", stmt.line, stmt.kind));

        match &stmt.kind {
            StatementKind::Expression(expr) => {
                self.evaluate_expr(expr)?;
            }
            StatementKind::Assignment { left, right } => {
                let value = self.evaluate_expr(right)?;
                self.assign(left, value)?;
            }
            StatementKind::MultipleAssignment { left, right } => {
                let value = self.evaluate_expr(right)?;
                for target in left {
                    self.assign(target, value.clone())?;
                }
            }
            StatementKind::UnpackingAssignment { left, right } => {
                let value = self.evaluate_expr(right)?;
                self.unpack(left, value)?;
            }
            StatementKind::CompoundAssignment {
                operator,
                target,
                value,
            } => {
                let value = self.evaluate_expr(value)?;
                self.compound_assign(*operator, target, value)?;
            }
            StatementKind::AnnotatedAssignment { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.evaluate_expr(value)?;
                    self.assign(target, value)?;
                }
            }
            StatementKind::IfElse {
                if_part,
                elif_parts,
                else_part,
            } => return self.execute_if(if_part, elif_parts, else_part.as_ref()),
            StatementKind::WhileLoop { body, else_block } => {
                return self.execute_while(body, else_block.as_ref())
            }
            StatementKind::ForInLoop {
                index,
                iterable,
                body,
                else_block,
            } => return self.execute_for(index, iterable, body, else_block.as_ref()),
            StatementKind::FunctionDef {
                name,
                args,
                body,
                decorators,
                ..
            } => {
                let decorators = self.evaluate_all(decorators)?;
                let body = FunctionBody::Block(Rc::new(body.clone()));
                let function = self.define_function(name, args, body)?;
                let value = self.apply_decorators(decorators, function)?;
                self.store_var(name, value);
            }
            StatementKind::ClassDef {
                name,
                parents,
                body,
                decorators,
                ..
            } => {
                let decorators = self.evaluate_all(decorators)?;
                let class = self.define_class(name, parents, body)?;
                let value = self.apply_decorators(decorators, class)?;
                self.store_var(name, value);
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => TreewalkValue::None,
                };
                return Ok(Flow::Return(value));
            }
            StatementKind::Pass => {}
            StatementKind::Break => return Ok(Flow::Break),
            StatementKind::Continue => return Ok(Flow::Continue),
            StatementKind::Global(names) => {
                let frame = self.current_frame();
                for name in names {
                    frame.locals.borrow_mut().mark_global(name);
                }
            }
            StatementKind::Nonlocal(names) => {
                let frame = self.current_frame();
                for name in names {
                    frame.locals.borrow_mut().mark_nonlocal(name);
                }
            }
            StatementKind::Delete(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
            }
            StatementKind::Assert { test, message } => {
                let test = self.evaluate_expr(test)?;
                if !self.is_truthy(&test)? {
                    let payload = match message {
                        Some(message) => vec![self.evaluate_expr(message)?],
                        None => vec![],
                    };
                    return Exception::assertion_error(payload).raise(self);
                }
            }
            StatementKind::TryExcept {
                try_block,
                handlers,
                else_block,
                finally_block,
            } => {
                return self.execute_try(
                    try_block,
                    handlers,
                    else_block.as_ref(),
                    finally_block.as_ref(),
                )
            }
            StatementKind::Raise(kind) => return self.execute_raise(kind),
            StatementKind::ContextManager { items, block } => {
                return self.execute_with(items, block)
            }
            StatementKind::RegularImport(imports) => {
                for import in imports {
                    self.execute_import(import)?;
                }
            }
            StatementKind::SelectiveImport { import_path, mode } => {
                self.execute_from_import(import_path, mode)?;
            }
        }

        Ok(Flow::Normal)
    }

    pub(crate) fn evaluate_all(&self, exprs: &[Expr]) -> TreewalkResult<Vec<TreewalkValue>> {
        exprs.iter().map(|expr| self.evaluate_expr(expr)).collect()
    }

    fn execute_if(
        &self,
        if_part: &ConditionalAst,
        elif_parts: &[ConditionalAst],
        else_part: Option<&Ast>,
    ) -> TreewalkResult<Flow> {
        for part in std::iter::once(if_part).chain(elif_parts) {
            let condition = self.evaluate_expr(&part.condition)?;
            if self.is_truthy(&condition)? {
                return self.execute_block(&part.ast);
            }
        }
        match else_part {
            Some(block) => self.execute_block(block),
            None => Ok(Flow::Normal),
        }
    }

    fn execute_while(
        &self,
        body: &ConditionalAst,
        else_block: Option<&Ast>,
    ) -> TreewalkResult<Flow> {
        loop {
            let condition = self.evaluate_expr(&body.condition)?;
            if !self.is_truthy(&condition)? {
                break;
            }
            match self.execute_block(&body.ast)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        match else_block {
            Some(block) => self.execute_block(block),
            None => Ok(Flow::Normal),
        }
    }

    fn execute_for(
        &self,
        index: &Expr,
        iterable: &Expr,
        body: &Ast,
        else_block: Option<&Ast>,
    ) -> TreewalkResult<Flow> {
        let iterable = self.evaluate_expr(iterable)?;
        let iterator = self.iterate(&iterable)?;
        loop {
            let item = iterator.borrow_mut().next();
            let Some(item) = item else {
                break;
            };
            self.assign(index, item)?;
            match self.execute_block(body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        match else_block {
            Some(block) => self.execute_block(block),
            None => Ok(Flow::Normal),
        }
    }

    /// Evaluate defaults in the defining scope and capture the closure.
    pub(crate) fn define_function(
        &self,
        name: &str,
        params: &Params,
        body: FunctionBody,
    ) -> TreewalkResult<TreewalkValue> {
        let defaults = params
            .args
            .iter()
            .map(|param| param.default.as_ref().map(|d| self.evaluate_expr(d)).transpose())
            .collect::<TreewalkResult<Vec<_>>>()?;
        let kwonly_defaults = params
            .kwonly_args
            .iter()
            .map(|param| param.default.as_ref().map(|d| self.evaluate_expr(d)).transpose())
            .collect::<TreewalkResult<Vec<_>>>()?;

        let is_generator = match &body {
            FunctionBody::Block(block) => contains_yield(block),
            FunctionBody::Expr(_) => false,
        };

        let frame = self.current_frame();
        let function = Function {
            name: name.to_string(),
            params: params.clone(),
            defaults,
            kwonly_defaults,
            body,
            is_generator,
            globals: frame.globals.clone(),
            closure: frame.closure(),
            class: None,
        };
        Ok(TreewalkValue::Function(Container::new(function)))
    }

    fn define_class(
        &self,
        name: &str,
        parents: &[Expr],
        body: &Ast,
    ) -> TreewalkResult<TreewalkValue> {
        let mut bases = vec![];
        for parent in parents {
            match parent {
                Expr::Starred(inner) => {
                    let value = self.evaluate_expr(inner)?;
                    bases.extend(self.collect(&value)?);
                }
                _ => bases.push(self.evaluate_expr(parent)?),
            }
        }

        let frame = self.current_frame();
        let mut namespace = Scope::default();
        namespace
            .insert("__module__", TreewalkValue::str("__main__"))
            .insert("__qualname__", TreewalkValue::str(name));
        let namespace = Container::new(namespace);
        let class_frame = Frame {
            kind: FrameKind::Class,
            locals: namespace.clone(),
            enclosing: frame.closure(),
            globals: frame.globals.clone(),
            function: None,
            yielded: None,
        };
        self.with_frame(class_frame, || self.execute_block(body))?;

        let namespace = namespace.borrow().clone();
        let class = Container::new(Class::new(name, &bases, namespace).raise(self)?);

        // Methods learn their class here so zero-argument `super()` can find it.
        let members: Vec<TreewalkValue> = class
            .borrow()
            .namespace
            .into_iter()
            .map(|(_, value)| value.clone())
            .collect();
        for member in members {
            let function = match member {
                TreewalkValue::Function(f) => Some(f),
                TreewalkValue::Staticmethod(inner)
                | TreewalkValue::Classmethod(inner)
                | TreewalkValue::Property(inner) => inner.as_function().ok(),
                _ => None,
            };
            if let Some(function) = function {
                function.borrow_mut().class = Some(class.clone());
            }
        }

        log(LogLevel::Debug, || format!("Defined class {name}"));
        Ok(TreewalkValue::Class(class))
    }

    fn apply_decorators(
        &self,
        decorators: Vec<TreewalkValue>,
        value: TreewalkValue,
    ) -> TreewalkResult<TreewalkValue> {
        decorators
            .into_iter()
            .rev()
            .try_fold(value, |value, decorator| {
                self.call(&decorator, Args::positional(vec![value]))
            })
    }

    fn execute_try(
        &self,
        try_block: &Ast,
        handlers: &[ExceptHandler],
        else_block: Option<&Ast>,
        finally_block: Option<&Ast>,
    ) -> TreewalkResult<Flow> {
        let outcome = match self.execute_block(try_block) {
            Ok(Flow::Normal) => match else_block {
                Some(block) => self.execute_block(block),
                None => Ok(Flow::Normal),
            },
            Ok(flow) => Ok(flow),
            Err(raised) => self.handle_exception(raised, handlers),
        };

        match finally_block {
            Some(block) => match self.execute_block(block)? {
                Flow::Normal => outcome,
                flow => Ok(flow),
            },
            None => outcome,
        }
    }

    fn handle_exception(
        &self,
        raised: RaisedException,
        handlers: &[ExceptHandler],
    ) -> TreewalkResult<Flow> {
        for handler in handlers {
            let matches = match &handler.exception {
                None => true,
                Some(expr) => {
                    let filter = self.evaluate_expr(expr)?;
                    self.exception_matches(&raised.exception, &filter)?
                }
            };
            if !matches {
                continue;
            }

            log(LogLevel::Debug, || {
                format!(
                    "Handled {} raised on line {}",
                    raised.exception.type_name(),
                    raised.line
                )
            });
            if let Some(alias) = &handler.alias {
                self.store_var(alias, raised.exception.as_value());
            }
            self.push_handling(raised.clone());
            let result = self.execute_block(&handler.block);
            self.pop_handling();
            if let Some(alias) = &handler.alias {
                let _ = self.delete_var(alias);
            }
            return result;
        }
        Err(raised)
    }

    /// Whether an `except` clause naming `filter` catches `exception`.
    pub(crate) fn exception_matches(
        &self,
        exception: &Exception,
        filter: &TreewalkValue,
    ) -> TreewalkResult<bool> {
        match filter {
            TreewalkValue::ExceptionType(kind) => Ok(exception.kind.is_subclass_of(kind)),
            TreewalkValue::Class(class) => Ok(match &exception.instance {
                Some(object) => Class::is_subclass_of(&object.borrow().class, class),
                None => false,
            }),
            TreewalkValue::Tuple(filters) => {
                for filter in filters.iter() {
                    if self.exception_matches(exception, filter)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            // An `except` naming a stubbed import never matches anything.
            TreewalkValue::Stub(_) => Ok(false),
            _ => Exception::type_error(
                "catching classes that do not inherit from BaseException is not allowed",
            )
            .raise(self),
        }
    }

    fn execute_raise(&self, kind: &RaiseKind) -> TreewalkResult<Flow> {
        let exception = match kind {
            RaiseKind::Reraise => match self.active_exception() {
                Some(raised) => return Err(raised),
                None => Exception::runtime_error("No active exception to reraise"),
            },
            RaiseKind::Raise(expr) => {
                let value = self.evaluate_expr(expr)?;
                self.to_exception(value)?
            }
            RaiseKind::RaiseFrom { exception, cause } => {
                let value = self.evaluate_expr(exception)?;
                self.evaluate_expr(cause)?;
                self.to_exception(value)?
            }
        };
        log(LogLevel::Debug, || {
            format!("Raising {} on line {}", exception.type_name(), self.line())
        });
        exception.raise(self)
    }

    /// The exception a `raise` of `value` throws.
    pub(crate) fn to_exception(&self, value: TreewalkValue) -> TreewalkResult<Exception> {
        match value {
            TreewalkValue::ExceptionType(kind) => Ok(Exception::new(kind, vec![])),
            TreewalkValue::Exception(exception) => Ok(exception),
            TreewalkValue::Class(ref class) if class.borrow().exception_kind.is_some() => {
                let instance = self.call(&value, Args::default())?;
                self.to_exception(instance)
            }
            TreewalkValue::Object(object) => {
                let kind = object.borrow().class.borrow().exception_kind;
                match kind {
                    Some(kind) => {
                        let payload = match object.borrow().attrs.get("args") {
                            Some(TreewalkValue::Tuple(args)) => args.into_items(),
                            _ => vec![],
                        };
                        Ok(Exception::from_instance(kind, payload, object))
                    }
                    None => Exception::type_error("exceptions must derive from BaseException")
                        .raise(self),
                }
            }
            _ => Exception::type_error("exceptions must derive from BaseException").raise(self),
        }
    }

    fn execute_with(&self, items: &[WithItem], block: &Ast) -> TreewalkResult<Flow> {
        let Some((item, rest)) = items.split_first() else {
            return self.execute_block(block);
        };

        let manager = self.evaluate_expr(&item.expr)?;
        let entered = self.enter_context(&manager)?;
        if let Some(target) = &item.target {
            self.assign(target, entered)?;
        }

        match self.execute_with(rest, block) {
            Ok(flow) => {
                self.exit_context(&manager, None)?;
                Ok(flow)
            }
            Err(raised) => {
                if self.exit_context(&manager, Some(&raised.exception))? {
                    Ok(Flow::Normal)
                } else {
                    Err(raised)
                }
            }
        }
    }

    fn execute_import(&self, import: &RegularImport) -> TreewalkResult<()> {
        let Some(name) = ModuleName::from_path(&import.module_path) else {
            return Ok(());
        };
        let module = self.import_module(&name)?;
        match &import.alias {
            Some(alias) => self.store_var(alias, TreewalkValue::Module(module)),
            None => {
                let head = ModuleName::from_dotted(name.head());
                let root = self.import_module(&head)?;
                self.store_var(name.head(), TreewalkValue::Module(root));
            }
        }
        Ok(())
    }

    fn execute_from_import(
        &self,
        import_path: &FromImportPath,
        mode: &FromImportMode,
    ) -> TreewalkResult<()> {
        let path = match import_path {
            FromImportPath::Absolute(path) => path,
            FromImportPath::Relative(..) => {
                return Exception::import_error(
                    "attempted relative import with no known parent package",
                )
                .raise(self)
            }
        };
        let Some(name) = ModuleName::from_path(path) else {
            return Ok(());
        };
        let module = self.import_module(&name)?;

        match mode {
            FromImportMode::All => {
                let symbols = module.borrow().public_symbols();
                for (symbol, value) in symbols {
                    self.store_var(&symbol, value);
                }
            }
            FromImportMode::List(items) => {
                for item in items {
                    let value = module.borrow().get(&item.symbol);
                    let value = match value {
                        Some(value) => value,
                        None => {
                            // A submodule not yet loaded, e.g. `from os import path`.
                            let child = ModuleName::from_dotted(&format!(
                                "{}.{}",
                                name.as_str(),
                                item.symbol
                            ));
                            match self.import_module(&child) {
                                Ok(module) => TreewalkValue::Module(module),
                                Err(_) => {
                                    return Exception::import_error(format!(
                                        "cannot import name '{}' from '{}'",
                                        item.symbol, name
                                    ))
                                    .raise(self)
                                }
                            }
                        }
                    };
                    self.store_var(item.bound_name(), value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::ExceptionKind,
        treewalk::{test_utils::*, TreewalkValue},
    };

    #[test]
    fn loops_with_else() {
        let input = r#"
found = None
for i in range(10):
    if i * i > 20:
        found = i
        break
else:
    found = -1

n = 0
while n < 3:
    n += 1
else:
    n = n * 10

evens = []
for i in range(6):
    if i % 2:
        continue
    evens.append(i)
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "found"), TreewalkValue::Int(5));
        assert_eq!(read(&interpreter, "n"), TreewalkValue::Int(30));
        assert_eq!(read(&interpreter, "evens"), list_of_ints(&[0, 2, 4]));
    }

    #[test]
    fn unpacking_targets() {
        let input = r#"
a, b = 1, 2
a, b = b, a
first, *rest = [1, 2, 3, 4]
(x, y), z = (5, 6), 7
p = q = "same"
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "a"), TreewalkValue::Int(2));
        assert_eq!(read(&interpreter, "b"), TreewalkValue::Int(1));
        assert_eq!(read(&interpreter, "rest"), list_of_ints(&[2, 3, 4]));
        assert_eq!(read(&interpreter, "y"), TreewalkValue::Int(6));
        assert_eq!(read(&interpreter, "z"), TreewalkValue::Int(7));
        assert_eq!(read(&interpreter, "q"), TreewalkValue::str("same"));
    }

    #[test]
    fn unpacking_count_mismatch() {
        let error = run_expect_error("a, b = [1, 2, 3]");
        assert_eq!(error.exception.kind, ExceptionKind::ValueError);
    }

    #[test]
    fn try_except_finally() {
        let input = r#"
log = []
try:
    import missing_module
except ImportError as e:
    log.append("import")
else:
    log.append("else")
finally:
    log.append("finally")

try:
    {}["key"]
except (TypeError, LookupError):
    log.append("lookup")

def f():
    try:
        return "body"
    finally:
        log.append("cleanup")
result = f()
"#;
        let interpreter = run(input);
        assert_eq!(
            read(&interpreter, "log"),
            list_of_strs(&["import", "finally", "lookup", "cleanup"])
        );
        assert_eq!(read(&interpreter, "result"), TreewalkValue::str("body"));
    }

    #[test]
    fn bare_raise_rethrows_handled_exception() {
        let input = r#"
try:
    raise ValueError("inner")
except ValueError:
    raise
"#;
        let error = run_expect_error(input);
        assert_eq!(error.exception.kind, ExceptionKind::ValueError);
        assert_eq!(error.exception.payload, vec![TreewalkValue::str("inner")]);
        assert_eq!(error.line, 3);
    }

    #[test]
    fn user_exceptions() {
        let input = r#"
class BuildError(RuntimeError):
    def __init__(self, step):
        super().__init__("failed at " + step)
        self.step = step

try:
    raise BuildError("compile")
except RuntimeError as e:
    caught = e.step
    message = str(e)
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "caught"), TreewalkValue::str("compile"));
        assert_eq!(
            read(&interpreter, "message"),
            TreewalkValue::str("failed at compile")
        );
    }

    #[test]
    fn assert_statement() {
        let error = run_expect_error("assert 1 == 2, 'math is broken'");
        assert_eq!(error.exception.kind, ExceptionKind::AssertionError);
        assert_eq!(
            error.exception.payload,
            vec![TreewalkValue::str("math is broken")]
        );
    }

    #[test]
    fn with_statement() {
        let input = r#"
class Manager:
    def __init__(self):
        self.events = []
    def __enter__(self):
        self.events.append("enter")
        return "resource"
    def __exit__(self, kind, value, tb):
        self.events.append("exit")
        return True

m = Manager()
with m as r:
    got = r
    raise ValueError("swallowed")

import io
with io.StringIO("text") as stream:
    content = stream.read()
closed = stream.closed
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "got"), TreewalkValue::str("resource"));
        assert_eq!(read(&interpreter, "content"), TreewalkValue::str("text"));
        assert_eq!(read(&interpreter, "closed"), TreewalkValue::Bool(true));
    }

    #[test]
    fn decorators_apply_bottom_up() {
        let input = r#"
def twice(f):
    return lambda: f() * 2

def plus_one(f):
    return lambda: f() + 1

@twice
@plus_one
def base():
    return 10

value = base()
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "value"), TreewalkValue::Int(22));
    }

    #[test]
    fn from_imports() {
        let input = r#"
from os import path, sep
from os.path import join as j
from sys import *
joined = j("a", "b")
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "joined"), TreewalkValue::str("a/b"));
        assert_eq!(read(&interpreter, "sep"), TreewalkValue::str("/"));
        assert_eq!(read(&interpreter, "platform"), TreewalkValue::str("linux"));
    }

    #[test]
    fn missing_from_import_name() {
        let error = run_expect_error("from os import nonexistent");
        assert_eq!(error.exception.kind, ExceptionKind::ImportError);
    }

    #[test]
    fn delete_statement() {
        let input = r#"
x = 1
items = [1, 2, 3]
config = {"a": 1, "b": 2}
del items[0], config["a"]
del x
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "items"), list_of_ints(&[2, 3]));
        assert!(interpreter.read_global("x").is_none());
    }
}
