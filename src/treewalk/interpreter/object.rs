use crate::{
    core::Container,
    domain::ExceptionKind,
    treewalk::{
        builtins::methods,
        types::{BuiltinMethod, Class, Exception, Method, Object, Super},
        utils::Args,
        Raise, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

impl TreewalkInterpreter<'_> {
    pub fn get_attr(&self, value: &TreewalkValue, name: &str) -> TreewalkResult<TreewalkValue> {
        match value {
            TreewalkValue::Stub(stub) => Ok(TreewalkValue::Stub(stub.attribute(name))),
            TreewalkValue::Module(module) => {
                let found = module.borrow().get(name);
                found.ok_or_else(|| {
                    self.raise(Exception::new(
                        ExceptionKind::AttributeError,
                        vec![TreewalkValue::str(format!(
                            "module '{}' has no attribute '{name}'",
                            module.borrow().name()
                        ))],
                    ))
                })
            }
            TreewalkValue::Object(object) => self.get_object_attr(value, object, name),
            TreewalkValue::Class(class) => self.get_class_attr(class, name),
            TreewalkValue::Super(proxy) => self.get_super_attr(proxy, name),
            TreewalkValue::Exception(exception) if name == "args" => {
                Ok(TreewalkValue::tuple(exception.payload.clone()))
            }
            TreewalkValue::Function(function) if name == "__name__" => {
                Ok(TreewalkValue::str(function.borrow().name.as_str()))
            }
            TreewalkValue::Function(_) if name == "__doc__" => Ok(TreewalkValue::None),
            TreewalkValue::Type(t) if name == "__name__" => Ok(TreewalkValue::str(t.name())),
            TreewalkValue::ExceptionType(kind) if name == "__name__" => {
                Ok(TreewalkValue::str(kind.name()))
            }
            TreewalkValue::Tuple(tuple) if tuple.field(name).is_some() => {
                Ok(tuple.field(name).cloned().unwrap_or(TreewalkValue::None))
            }
            TreewalkValue::StringIO(stream) if name == "closed" => {
                Ok(TreewalkValue::Bool(stream.borrow().is_closed()))
            }
            _ => match methods::lookup(value, name) {
                Some(method) => Ok(TreewalkValue::BuiltinMethod(BuiltinMethod::new(
                    value.clone(),
                    method,
                ))),
                None => Exception::attribute_error(&value.type_name(), name).raise(self),
            },
        }
    }

    fn get_object_attr(
        &self,
        value: &TreewalkValue,
        object: &Container<Object>,
        name: &str,
    ) -> TreewalkResult<TreewalkValue> {
        let (own, class) = {
            let object = object.borrow();
            (object.attrs.get(name), object.class.clone())
        };
        if let Some(own) = own {
            return Ok(own);
        }
        match name {
            "__class__" => return Ok(TreewalkValue::Class(class)),
            "__dict__" => {
                return Ok(TreewalkValue::dict(object.borrow().attrs.to_dict()));
            }
            _ => {}
        }
        if let Some(attr) = Class::lookup(&class, name) {
            return self.bind(attr, Some(value.clone()), class);
        }

        let stub_base = class.borrow().stub_base.clone();
        if let Some(stub) = stub_base {
            return Ok(TreewalkValue::Stub(stub.attribute(name)));
        }
        if let Some(getattr) = Class::lookup(&class, "__getattr__") {
            let getattr = self.bind(getattr, Some(value.clone()), class)?;
            return self.call(&getattr, Args::positional(vec![TreewalkValue::str(name)]));
        }
        Exception::attribute_error(&value.type_name(), name).raise(self)
    }

    fn get_class_attr(
        &self,
        class: &Container<Class>,
        name: &str,
    ) -> TreewalkResult<TreewalkValue> {
        match name {
            "__name__" => return Ok(TreewalkValue::str(class.borrow().name.as_str())),
            "__mro__" => {
                let mro = Class::full_mro(class)
                    .into_iter()
                    .map(TreewalkValue::Class)
                    .collect();
                return Ok(TreewalkValue::tuple(mro));
            }
            "__bases__" => {
                let bases = class
                    .borrow()
                    .bases
                    .iter()
                    .cloned()
                    .map(TreewalkValue::Class)
                    .collect();
                return Ok(TreewalkValue::tuple(bases));
            }
            "__dict__" => {
                return Ok(TreewalkValue::dict(class.borrow().namespace.to_dict()));
            }
            _ => {}
        }

        if let Some(attr) = Class::lookup(class, name) {
            return self.bind(attr, None, class.clone());
        }
        let stub_base = class.borrow().stub_base.clone();
        match stub_base {
            Some(stub) => Ok(TreewalkValue::Stub(stub.attribute(name))),
            None => Exception::new(
                ExceptionKind::AttributeError,
                vec![TreewalkValue::str(format!(
                    "type object '{}' has no attribute '{name}'",
                    class.borrow().name
                ))],
            )
            .raise(self),
        }
    }

    fn get_super_attr(&self, proxy: &Super, name: &str) -> TreewalkResult<TreewalkValue> {
        let (owner, instance) = match proxy.receiver.as_ref() {
            TreewalkValue::Object(object) => (
                object.borrow().class.clone(),
                Some(proxy.receiver.as_ref().clone()),
            ),
            TreewalkValue::Class(class) => (class.clone(), None),
            other => {
                return Exception::type_error(format!(
                    "super(type, obj): obj must be an instance or subtype of type, not {}",
                    other.type_name()
                ))
                .raise(self)
            }
        };

        if let Some(attr) = Class::lookup_after(&owner, &proxy.class, name) {
            return self.bind(attr, instance, owner);
        }

        let stub_base = proxy.class.borrow().stub_base.clone();
        if let Some(stub) = stub_base {
            return Ok(TreewalkValue::Stub(stub.attribute(name)));
        }
        // `object.__init__` and `BaseException.__init__` are implemented natively.
        if name == "__init__" {
            return Ok(TreewalkValue::BuiltinMethod(BuiltinMethod::new(
                proxy.receiver.as_ref().clone(),
                "__init__",
            )));
        }
        Exception::attribute_error("super", name).raise(self)
    }

    /// Turn a class attribute into what an attribute access yields: functions become bound
    /// methods on instances, and the three decorators apply their binding rules.
    pub(crate) fn bind(
        &self,
        attr: TreewalkValue,
        instance: Option<TreewalkValue>,
        owner: Container<Class>,
    ) -> TreewalkResult<TreewalkValue> {
        match (attr, instance) {
            (TreewalkValue::Function(function), Some(instance)) => {
                Ok(TreewalkValue::Method(Method::new(instance, function)))
            }
            (TreewalkValue::Staticmethod(inner), _) => Ok(*inner),
            (TreewalkValue::Classmethod(inner), _) => match *inner {
                TreewalkValue::Function(function) => Ok(TreewalkValue::Method(Method::new(
                    TreewalkValue::Class(owner),
                    function,
                ))),
                other => Ok(other),
            },
            (TreewalkValue::Property(getter), Some(instance)) => {
                self.call(&getter, Args::positional(vec![instance]))
            }
            (attr, _) => Ok(attr),
        }
    }

    pub fn set_attr(
        &self,
        target: &TreewalkValue,
        name: &str,
        value: TreewalkValue,
    ) -> TreewalkResult<()> {
        match target {
            TreewalkValue::Object(object) => {
                object.borrow_mut().attrs.insert(name, value);
                Ok(())
            }
            TreewalkValue::Class(class) => {
                class.borrow_mut().namespace.insert(name, value);
                Ok(())
            }
            TreewalkValue::Module(module) => {
                module.borrow_mut().insert(name, value);
                Ok(())
            }
            // Stubs accept and forget any attribute assignment.
            TreewalkValue::Stub(_) => Ok(()),
            _ => Exception::new(
                ExceptionKind::AttributeError,
                vec![TreewalkValue::str(format!(
                    "'{}' object attribute '{name}' is read-only",
                    target.type_name()
                ))],
            )
            .raise(self),
        }
    }

    pub fn delete_attr(&self, target: &TreewalkValue, name: &str) -> TreewalkResult<()> {
        let removed = match target {
            TreewalkValue::Object(object) => object.borrow_mut().attrs.delete(name).is_some(),
            TreewalkValue::Class(class) => class.borrow_mut().namespace.delete(name).is_some(),
            TreewalkValue::Module(module) => module.borrow_mut().delete(name).is_some(),
            TreewalkValue::Stub(_) => true,
            _ => false,
        };
        if removed {
            Ok(())
        } else {
            Exception::attribute_error(&target.type_name(), name).raise(self)
        }
    }

    pub fn has_attr(&self, value: &TreewalkValue, name: &str) -> TreewalkResult<bool> {
        match self.get_attr(value, name) {
            Ok(_) => Ok(true),
            Err(raised)
                if raised
                    .exception
                    .kind
                    .is_subclass_of(&ExceptionKind::AttributeError) =>
            {
                Ok(false)
            }
            Err(raised) => Err(raised),
        }
    }

    /// `__enter__` for the values a `with` statement accepts.
    pub(crate) fn enter_context(&self, manager: &TreewalkValue) -> TreewalkResult<TreewalkValue> {
        match manager {
            TreewalkValue::Stub(stub) => {
                Ok(TreewalkValue::Stub(stub.attribute("__enter__").called()))
            }
            TreewalkValue::StringIO(_) => Ok(manager.clone()),
            TreewalkValue::Object(_) => self.call_method(manager, "__enter__", Args::default()),
            _ => Exception::type_error(format!(
                "'{}' object does not support the context manager protocol",
                manager.type_name()
            ))
            .raise(self),
        }
    }

    /// `__exit__`, returning whether the exception, if any, is suppressed.
    pub(crate) fn exit_context(
        &self,
        manager: &TreewalkValue,
        exception: Option<&Exception>,
    ) -> TreewalkResult<bool> {
        match manager {
            TreewalkValue::Stub(_) => Ok(false),
            TreewalkValue::StringIO(stream) => {
                stream.borrow_mut().close();
                Ok(false)
            }
            TreewalkValue::Object(_) => {
                let args = match exception {
                    Some(exception) => vec![
                        self.type_of(&exception.as_value()),
                        exception.as_value(),
                        TreewalkValue::None,
                    ],
                    None => vec![TreewalkValue::None; 3],
                };
                let suppress = self.call_method(manager, "__exit__", Args::positional(args))?;
                self.is_truthy(&suppress)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::ExceptionKind,
        treewalk::{test_utils::*, TreewalkValue},
    };

    #[test]
    fn stub_attribute_chains() {
        let interpreter = run(r#"
mod = __sandbox_stub__("numpy")
deep = mod.distutils.misc_util.Configuration("pkg").todict()["name"]
mod.anything = 1
as_text = str(deep)
"#);
        assert_eq!(read(&interpreter, "as_text"), TreewalkValue::str("FIXME"));
        let TreewalkValue::Stub(stub) = read(&interpreter, "deep") else {
            panic!("expected a stub");
        };
        assert_eq!(
            stub.name(),
            "numpy.distutils.misc_util.Configuration().todict()[]"
        );
    }

    #[test]
    fn classes_deriving_from_stubs() {
        let interpreter = run(r#"
build_ext = __sandbox_stub__("build_ext")
class BuildExt(build_ext):
    def run(self):
        self.compiler_flags = ["-O2"]
        return super().run()

cmd = BuildExt()
result = cmd.run()
flags = cmd.compiler_flags
missing = cmd.inplace
"#);
        assert_eq!(read(&interpreter, "flags"), list_of_strs(&["-O2"]));
        assert!(read(&interpreter, "result").is_stub());
        assert!(read(&interpreter, "missing").is_stub());
    }

    #[test]
    fn getattr_fallback() {
        let interpreter = run(r#"
class Lazy:
    def __getattr__(self, name):
        return name * 2
value = Lazy().ab
"#);
        assert_eq!(read(&interpreter, "value"), TreewalkValue::str("abab"));
    }

    #[test]
    fn missing_attributes() {
        let error = run_expect_error("import os\nos.nothing\n");
        assert_eq!(error.exception.kind, ExceptionKind::AttributeError);

        let error = run_expect_error("x = 5\nx.real = 1\n");
        assert_eq!(error.exception.kind, ExceptionKind::AttributeError);
    }

    #[test]
    fn named_tuple_fields() {
        assert_eq!(eval("__import__('sys').version_info.major"), TreewalkValue::Int(3));
    }
}
