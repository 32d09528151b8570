use crate::{
    core::{log, Container, LogLevel},
    treewalk::{
        builtins::{self, methods},
        interpreter::{Flow, Frame, FrameKind},
        types::{Class, Dict, Exception, Function, FunctionBody, Iter, Object},
        utils::Args,
        DomainResult, Raise, Scope, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

impl TreewalkInterpreter<'_> {
    pub fn call(&self, callee: &TreewalkValue, args: Args) -> TreewalkResult<TreewalkValue> {
        match callee {
            TreewalkValue::Function(function) => self.call_function(function, args),
            TreewalkValue::Method(method) => {
                self.call_function(&method.function, args.with_receiver(*method.receiver.clone()))
            }
            TreewalkValue::BuiltinFunction(builtin) => (builtin.call)(self, args),
            TreewalkValue::BuiltinMethod(method) => {
                methods::call_method(self, &method.receiver, method.name, args)
            }
            TreewalkValue::Type(builtin_type) => builtins::construct(self, *builtin_type, args),
            TreewalkValue::Class(class) => self.instantiate(class, args),
            TreewalkValue::ExceptionType(kind) => {
                let (positional, _) = args.into_parts();
                Ok(TreewalkValue::Exception(Exception::new(*kind, positional)))
            }
            TreewalkValue::Stub(stub) => Ok(TreewalkValue::Stub(stub.called())),
            TreewalkValue::Object(_) => self.call_method(callee, "__call__", args),
            _ => Exception::type_error(format!(
                "'{}' object is not callable",
                callee.type_name()
            ))
            .raise(self),
        }
    }

    /// Look up `name` on `receiver` and call the result.
    pub fn call_method(
        &self,
        receiver: &TreewalkValue,
        name: &str,
        args: Args,
    ) -> TreewalkResult<TreewalkValue> {
        let method = self.get_attr(receiver, name)?;
        self.call(&method, args)
    }

    pub fn is_callable(&self, value: &TreewalkValue) -> bool {
        match value {
            TreewalkValue::Function(_)
            | TreewalkValue::Method(_)
            | TreewalkValue::BuiltinFunction(_)
            | TreewalkValue::BuiltinMethod(_)
            | TreewalkValue::Type(_)
            | TreewalkValue::Class(_)
            | TreewalkValue::ExceptionType(_)
            | TreewalkValue::Stub(_) => true,
            TreewalkValue::Object(object) => {
                Class::lookup(&object.borrow().class, "__call__").is_some()
            }
            _ => false,
        }
    }

    pub(crate) fn call_function(
        &self,
        function: &Container<Function>,
        args: Args,
    ) -> TreewalkResult<TreewalkValue> {
        let scope = bind_params(&function.borrow(), args).raise(self)?;
        let (body, is_generator, frame) = {
            let f = function.borrow();
            log(LogLevel::Trace, || format!("Calling {}", f.name));
            let frame = Frame {
                kind: FrameKind::Function,
                locals: Container::new(scope),
                enclosing: f.closure.clone(),
                globals: f.globals.clone(),
                function: Some(function.clone()),
                yielded: f.is_generator.then(|| Container::new(vec![])),
            };
            (f.body.clone(), f.is_generator, frame)
        };
        let yielded = frame.yielded.clone();

        let result = self.with_depth(|| {
            self.with_frame(frame, || match &body {
                FunctionBody::Block(block) => match self.execute_block(block)? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(TreewalkValue::None),
                },
                FunctionBody::Expr(expr) => self.evaluate_expr(expr),
            })
        })?;

        match (is_generator, yielded) {
            (true, Some(yielded)) => {
                let items = yielded.borrow().clone();
                Ok(TreewalkValue::Iterator(Container::new(Iter::from_items(
                    items,
                ))))
            }
            _ => Ok(result),
        }
    }

    /// Create an instance and run `__init__`. Exception subclasses keep their arguments in
    /// `args` even when `__init__` is overridden.
    fn instantiate(
        &self,
        class: &Container<Class>,
        args: Args,
    ) -> TreewalkResult<TreewalkValue> {
        let object = Container::new(Object::new(class.clone()));
        let (exception_kind, stub_base) = {
            let class = class.borrow();
            (class.exception_kind, class.stub_base.clone())
        };
        if exception_kind.is_some() {
            object
                .borrow_mut()
                .attrs
                .insert("args", TreewalkValue::tuple(args.args().to_vec()));
        }
        let instance = TreewalkValue::Object(object);

        match Class::lookup(class, "__init__") {
            Some(init) => {
                let init = self.bind(init, Some(instance.clone()), class.clone())?;
                self.call(&init, args)?;
            }
            None if exception_kind.is_some() || stub_base.is_some() => {}
            None if !args.is_empty() || !args.kwargs().is_empty() => {
                return Exception::type_error(format!(
                    "{}() takes no arguments",
                    class.borrow().name
                ))
                .raise(self)
            }
            None => {}
        }

        Ok(instance)
    }

    /// The zero-argument form of `super()`: the class the running method was defined in and the
    /// method's first argument.
    pub(crate) fn implicit_super(&self) -> TreewalkResult<(Container<Class>, TreewalkValue)> {
        let frame = self.current_frame();
        let function = frame.function.ok_or_else(|| {
            self.raise(Exception::runtime_error("super(): no arguments"))
        })?;
        let function = function.borrow();
        let class = function.class.clone().ok_or_else(|| {
            self.raise(Exception::runtime_error("super(): __class__ cell not found"))
        })?;
        let receiver = function
            .params
            .args
            .first()
            .and_then(|param| frame.locals.borrow().get(&param.arg))
            .ok_or_else(|| self.raise(Exception::runtime_error("super(): no arguments")))?;
        Ok((class, receiver))
    }
}

/// Match call arguments against a function's parameters.
fn bind_params(function: &Function, args: Args) -> DomainResult<Scope> {
    let name = &function.name;
    let params = &function.params;
    let (positional, keywords) = args.into_parts();

    let mut bound: Vec<Option<TreewalkValue>> = vec![None; params.args.len()];
    let mut scope = Scope::default();

    let mut positional = positional.into_iter();
    for slot in bound.iter_mut() {
        match positional.next() {
            Some(value) => *slot = Some(value),
            None => break,
        }
    }
    let extra: Vec<TreewalkValue> = positional.collect();
    match &params.args_var {
        Some(args_var) => {
            scope.insert(args_var, TreewalkValue::tuple(extra));
        }
        None if !extra.is_empty() => {
            return Err(Exception::type_error(format!(
                "{name}() takes {} positional argument(s) but {} were given",
                params.args.len(),
                params.args.len() + extra.len()
            )))
        }
        None => {}
    }

    let mut kwonly: Vec<Option<TreewalkValue>> = vec![None; params.kwonly_args.len()];
    let mut kwargs = Dict::default();
    for (key, value) in keywords {
        if let Some(index) = params.args.iter().position(|p| p.arg.as_str() == key) {
            if bound[index].is_some() {
                return Err(Exception::type_error(format!(
                    "{name}() got multiple values for argument '{key}'"
                )));
            }
            bound[index] = Some(value);
        } else if let Some(index) = params.kwonly_args.iter().position(|p| p.arg.as_str() == key) {
            kwonly[index] = Some(value);
        } else if params.kwargs_var.is_some() {
            kwargs.insert(TreewalkValue::Str(key), value)?;
        } else {
            return Err(Exception::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
    }

    for ((param, value), default) in params.args.iter().zip(bound).zip(&function.defaults) {
        let value = value.or_else(|| default.clone()).ok_or_else(|| {
            Exception::type_error(format!(
                "{name}() missing 1 required positional argument: '{}'",
                param.arg
            ))
        })?;
        scope.insert(&param.arg, value);
    }
    for ((param, value), default) in params
        .kwonly_args
        .iter()
        .zip(kwonly)
        .zip(&function.kwonly_defaults)
    {
        let value = value.or_else(|| default.clone()).ok_or_else(|| {
            Exception::type_error(format!(
                "{name}() missing 1 required keyword-only argument: '{}'",
                param.arg
            ))
        })?;
        scope.insert(&param.arg, value);
    }
    if let Some(kwargs_var) = &params.kwargs_var {
        scope.insert(kwargs_var, TreewalkValue::dict(kwargs));
    }

    Ok(scope)
}
