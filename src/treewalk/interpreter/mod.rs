mod call;
mod expr;
mod format;
mod object;
mod ops;
mod stmt;

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use crate::{
    capture::CaptureBuffer,
    config::ExtractConfig,
    core::{log, Container, LogLevel},
    domain::ModuleName,
    parser::types::Ast,
    sanitizer::AvailabilityProber,
    treewalk::{
        builtins,
        types::{Class, Dict, Exception, Function, Module},
        RaisedException, Scope, TreewalkResult, TreewalkValue,
    },
};

pub(crate) use stmt::Flow;

/// Free stack required before entering another call frame. Below it, the frame runs on a fresh
/// `STACK_SEGMENT`-sized segment so deep recursion reaches `RecursionError` instead of overflowing.
const STACK_RED_ZONE: usize = 1024 * 1024;
const STACK_SEGMENT: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FrameKind {
    Module,
    Function,
    Class,
}

/// One activation: the namespace names are stored into, plus everything needed to resolve the
/// names it does not define.
#[derive(Clone)]
pub(crate) struct Frame {
    pub kind: FrameKind,
    pub locals: Container<Scope>,
    /// Enclosing function scopes, outermost first.
    pub enclosing: Vec<Container<Scope>>,
    pub globals: Container<Scope>,
    pub function: Option<Container<Function>>,
    /// Present while a generator body runs; `yield` appends here.
    pub yielded: Option<Container<Vec<TreewalkValue>>>,
}

impl Frame {
    pub fn module(globals: Container<Scope>) -> Self {
        Self {
            kind: FrameKind::Module,
            locals: globals.clone(),
            enclosing: vec![],
            globals,
            function: None,
            yielded: None,
        }
    }

    /// The scopes a function or class defined in this frame closes over. Class bodies are not
    /// visible to the functions nested in them.
    pub fn closure(&self) -> Vec<Container<Scope>> {
        match self.kind {
            FrameKind::Module => vec![],
            FrameKind::Function => {
                let mut closure = self.enclosing.clone();
                closure.push(self.locals.clone());
                closure
            }
            FrameKind::Class => self.enclosing.clone(),
        }
    }
}

/// Executes a neutralized descriptor. Every piece of mutable state lives behind a cell so that
/// builtins, which only receive `&self`, can call back into the interpreter.
pub struct TreewalkInterpreter<'a> {
    config: &'a ExtractConfig,
    prober: &'a dyn AvailabilityProber,
    path: String,
    capture: RefCell<CaptureBuffer>,
    builtins: Container<Scope>,
    main: Frame,
    frames: RefCell<Vec<Frame>>,
    modules: RefCell<HashMap<String, Container<Module>>>,
    sys_modules: Container<Dict>,
    object_class: Container<Class>,
    /// Exceptions currently being handled, innermost last, for a bare `raise`.
    handling: RefCell<Vec<RaisedException>>,
    line: Cell<usize>,
    depth: Cell<usize>,
}

impl<'a> TreewalkInterpreter<'a> {
    pub fn new(config: &'a ExtractConfig, prober: &'a dyn AvailabilityProber, path: &str) -> Self {
        let mut globals = Scope::default();
        globals
            .insert("__name__", TreewalkValue::str("__main__"))
            .insert("__file__", TreewalkValue::str(path))
            .insert("__doc__", TreewalkValue::None)
            .insert("__package__", TreewalkValue::None);

        let object_class = Container::new(Class {
            name: "object".to_string(),
            bases: vec![],
            mro: vec![],
            namespace: Scope::default(),
            exception_kind: None,
            stub_base: None,
        });

        Self {
            config,
            prober,
            path: path.to_string(),
            capture: RefCell::new(CaptureBuffer::new()),
            builtins: Container::new(builtins::builtin_scope()),
            main: Frame::module(Container::new(globals)),
            frames: RefCell::new(vec![]),
            modules: RefCell::new(HashMap::new()),
            sys_modules: Container::new(Dict::default()),
            object_class,
            handling: RefCell::new(vec![]),
            line: Cell::new(1),
            depth: Cell::new(0),
        }
    }

    pub fn config(&self) -> &ExtractConfig {
        self.config
    }

    pub fn prober(&self) -> &dyn AvailabilityProber {
        self.prober
    }

    /// The path the script reports as `__file__`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Attach the current line to an exception so it can propagate.
    pub fn raise(&self, exception: Exception) -> RaisedException {
        RaisedException::new(self.line.get(), exception)
    }

    pub fn line(&self) -> usize {
        self.line.get()
    }

    /// Run a module body in the main namespace.
    pub fn execute(&self, ast: &Ast) -> TreewalkResult<()> {
        log(LogLevel::Debug, || {
            format!("Executing {} top-level statement(s)", ast.len())
        });
        self.execute_block(ast)?;
        Ok(())
    }

    /// Read a name from the main module namespace.
    pub fn read_global(&self, name: &str) -> Option<TreewalkValue> {
        self.main.globals.borrow().get(name)
    }

    pub fn capture(&self) -> &RefCell<CaptureBuffer> {
        &self.capture
    }

    /// Hand the capture buffer to the caller, leaving an empty one behind.
    pub fn take_capture(&self) -> CaptureBuffer {
        self.capture.take()
    }

    pub(crate) fn object_class(&self) -> Container<Class> {
        self.object_class.clone()
    }

    pub(crate) fn sys_modules(&self) -> Container<Dict> {
        self.sys_modules.clone()
    }

    pub(crate) fn current_frame(&self) -> Frame {
        self.frames
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| self.main.clone())
    }

    pub(crate) fn with_frame<T>(
        &self,
        frame: Frame,
        body: impl FnOnce() -> TreewalkResult<T>,
    ) -> TreewalkResult<T> {
        self.frames.borrow_mut().push(frame);
        let result = body();
        self.frames.borrow_mut().pop();
        result
    }

    /// Track call depth around `body`, raising `RecursionError` past the configured limit.
    pub(crate) fn with_depth<T>(
        &self,
        body: impl FnOnce() -> TreewalkResult<T>,
    ) -> TreewalkResult<T> {
        let depth = self.depth.get();
        if depth >= self.config.recursion_limit {
            return Err(self.raise(Exception::recursion_error()));
        }
        self.depth.set(depth + 1);
        let line = self.line.get();
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, body);
        self.depth.set(depth);
        self.line.set(line);
        result
    }

    pub(crate) fn set_line(&self, line: usize) {
        if line > 0 {
            self.line.set(line);
        }
    }

    pub(crate) fn push_handling(&self, raised: RaisedException) {
        self.handling.borrow_mut().push(raised);
    }

    pub(crate) fn pop_handling(&self) {
        self.handling.borrow_mut().pop();
    }

    /// The exception being handled, with the line it was first raised on.
    pub(crate) fn active_exception(&self) -> Option<RaisedException> {
        self.handling.borrow().last().cloned()
    }

    pub fn load_var(&self, name: &str) -> TreewalkResult<TreewalkValue> {
        let frame = self.current_frame();
        self.lookup_in(&frame, name)
            .ok_or_else(|| self.raise(Exception::name_error(name)))
    }

    fn lookup_in(&self, frame: &Frame, name: &str) -> Option<TreewalkValue> {
        if frame.kind != FrameKind::Module {
            let locals = frame.locals.borrow();
            if !locals.has_global(name) {
                if !locals.has_nonlocal(name) {
                    if let Some(value) = locals.get(name) {
                        return Some(value);
                    }
                }
                if let Some(value) = frame
                    .enclosing
                    .iter()
                    .rev()
                    .find_map(|scope| scope.borrow().get(name))
                {
                    return Some(value);
                }
            }
        }

        frame
            .globals
            .borrow()
            .get(name)
            .or_else(|| self.builtins.borrow().get(name))
    }

    /// The scope a store or delete of `name` targets in `frame`.
    fn binding_scope(&self, frame: &Frame, name: &str) -> Container<Scope> {
        if frame.kind == FrameKind::Module {
            return frame.globals.clone();
        }

        let (is_global, is_nonlocal) = {
            let locals = frame.locals.borrow();
            (locals.has_global(name), locals.has_nonlocal(name))
        };

        if is_global {
            frame.globals.clone()
        } else if is_nonlocal {
            frame
                .enclosing
                .iter()
                .rev()
                .find(|scope| scope.borrow().contains(name))
                .or(frame.enclosing.last())
                .cloned()
                .unwrap_or_else(|| frame.locals.clone())
        } else {
            frame.locals.clone()
        }
    }

    pub fn store_var(&self, name: &str, value: TreewalkValue) {
        let frame = self.current_frame();
        self.binding_scope(&frame, name)
            .borrow_mut()
            .insert(name, value);
    }

    pub fn delete_var(&self, name: &str) -> TreewalkResult<()> {
        let frame = self.current_frame();
        let removed = self.binding_scope(&frame, name).borrow_mut().delete(name);
        match removed {
            Some(_) => Ok(()),
            None => Err(self.raise(Exception::name_error(name))),
        }
    }

    /// Load a module and its parents, caching each one. Host modules are built on first use;
    /// roots the prober reports as available but the sandbox does not implement load empty.
    pub fn import_module(&self, name: &ModuleName) -> TreewalkResult<Container<Module>> {
        if let Some(module) = self.cached_module(name) {
            return Ok(module);
        }

        let parent = match name.parent() {
            Some(parent) => Some(self.import_module(&parent)?),
            None => None,
        };
        if let Some(module) = self.cached_module(name) {
            return Ok(module);
        }

        let module = match builtins::modules::host_module(self, name) {
            Some(module) => module,
            None if builtins::modules::is_native_root(name.head()) => {
                return Err(self.raise(Exception::module_not_found(&name.as_str())))
            }
            None if self.prober.is_path_available(&name.as_str()) => Module::new(name.clone()),
            None => return Err(self.raise(Exception::module_not_found(&name.as_str()))),
        };
        let module = Container::new(module);

        log(LogLevel::Debug, || format!("Loaded module {name}"));
        self.modules
            .borrow_mut()
            .insert(name.as_str(), module.clone());
        self.sys_modules
            .borrow_mut()
            .insert(
                TreewalkValue::str(name.as_str()),
                TreewalkValue::Module(module.clone()),
            )
            .map_err(|e| self.raise(e))?;

        if let Some(parent) = parent {
            parent
                .borrow_mut()
                .insert(name.tail(), TreewalkValue::Module(module.clone()));
        }
        for child in builtins::modules::eager_children(name) {
            self.import_module(&child)?;
        }

        Ok(module)
    }

    fn cached_module(&self, name: &ModuleName) -> Option<Container<Module>> {
        self.modules.borrow().get(&name.as_str()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::ExceptionKind,
        treewalk::{test_utils::*, TreewalkValue},
    };

    #[test]
    fn closures_and_scopes() {
        let input = r#"
counter = 0

def bump():
    global counter
    counter += 1

def make_adder(n):
    def add(x):
        return x + n
    return add

def make_counter():
    count = 0
    def inc():
        nonlocal count
        count += 1
        return count
    return inc

bump()
bump()
add_two = make_adder(2)
inc = make_counter()
inc()
total = inc()
result = add_two(5)
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "counter"), TreewalkValue::Int(2));
        assert_eq!(read(&interpreter, "result"), TreewalkValue::Int(7));
        assert_eq!(read(&interpreter, "total"), TreewalkValue::Int(2));
    }

    #[test]
    fn class_scope_is_not_a_closure() {
        let input = r#"
x = "global"
class A:
    x = "class"
    def get(self):
        return x
value = A().get()
attr = A.x
"#;
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "value"), TreewalkValue::str("global"));
        assert_eq!(read(&interpreter, "attr"), TreewalkValue::str("class"));
    }

    #[test]
    fn undefined_name() {
        let error = run_expect_error("print(missing)");
        assert_eq!(error.exception.kind, ExceptionKind::NameError);
        assert_eq!(error.line, 1);
    }

    #[test]
    fn recursion_limit() {
        let input = "
def forever(n):
    return forever(n + 1)
forever(0)
";
        let error = run_expect_error_with_limit(input, 40);
        assert_eq!(error.exception.kind, ExceptionKind::RecursionError);
        assert_eq!(error.line, 3);
    }

    #[test]
    fn deep_recursion_stays_on_the_stack_budget() {
        let error = run_expect_error("def f(n):\n    return f(n + 1)\nf(0)\n");
        assert_eq!(error.exception.kind, ExceptionKind::RecursionError);

        let interpreter = run("
def depth(n):
    return 1 if n == 0 else 1 + depth(n - 1)
total = depth(900)
");
        assert_eq!(read(&interpreter, "total"), TreewalkValue::Int(901));
    }

    #[test]
    fn module_cache_shares_objects() {
        let input = "
import os
import os.path
import os.path as osp
same = os.path is osp
";
        let interpreter = run(input);
        assert_eq!(read(&interpreter, "same"), TreewalkValue::Bool(true));
    }

    #[test]
    fn unknown_native_submodule() {
        let error = run_expect_error("import os.nothing");
        assert_eq!(error.exception.kind, ExceptionKind::ModuleNotFoundError);
    }
}
