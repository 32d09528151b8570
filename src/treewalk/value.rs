use std::{
    fmt::{Debug, Error, Formatter},
    ptr,
};

use crate::{
    core::{floats_equal, Container},
    domain::ExceptionKind,
    treewalk::{
        builtins::Builtin,
        types::{
            BuiltinMethod, BuiltinType, Class, Dict, Exception, Function, Iter, Method, Module,
            Object, Range, Set, Slice, StringIO, Stub, Super, Tuple,
        },
        utils::HashKey,
        DomainResult,
    },
};

#[derive(Clone)]
pub enum TreewalkValue {
    None,
    Ellipsis,
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Container<Vec<TreewalkValue>>),
    Tuple(Tuple),
    Dict(Container<Dict>),
    Set(Container<Set>),
    Range(Range),
    Slice(Slice),
    Iterator(Container<Iter>),
    Function(Container<Function>),
    Method(Method),
    BuiltinFunction(&'static Builtin),
    BuiltinMethod(BuiltinMethod),
    Type(BuiltinType),
    Class(Container<Class>),
    Object(Container<Object>),
    Super(Super),
    Staticmethod(Box<TreewalkValue>),
    Classmethod(Box<TreewalkValue>),
    Property(Box<TreewalkValue>),
    Module(Container<Module>),
    ExceptionType(ExceptionKind),
    Exception(Exception),
    Stub(Stub),
    StringIO(Container<StringIO>),
}

/// Value equality, which is what `==` means for every builtin type. User objects, functions, and
/// stubs only equal themselves.
impl PartialEq for TreewalkValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TreewalkValue::None, TreewalkValue::None) => true,
            (TreewalkValue::Ellipsis, TreewalkValue::Ellipsis) => true,
            (TreewalkValue::NotImplemented, TreewalkValue::NotImplemented) => true,
            (TreewalkValue::Str(a), TreewalkValue::Str(b)) => a == b,
            (TreewalkValue::Bytes(a), TreewalkValue::Bytes(b)) => a == b,
            (TreewalkValue::List(a), TreewalkValue::List(b)) => a == b,
            (TreewalkValue::Tuple(a), TreewalkValue::Tuple(b)) => a == b,
            (TreewalkValue::Dict(a), TreewalkValue::Dict(b)) => a == b,
            (TreewalkValue::Set(a), TreewalkValue::Set(b)) => a == b,
            (TreewalkValue::Range(a), TreewalkValue::Range(b)) => a == b,
            (TreewalkValue::Slice(a), TreewalkValue::Slice(b)) => a == b,
            (TreewalkValue::Type(a), TreewalkValue::Type(b)) => a == b,
            (TreewalkValue::ExceptionType(a), TreewalkValue::ExceptionType(b)) => a == b,
            (TreewalkValue::Exception(a), TreewalkValue::Exception(b)) => a == b,
            (TreewalkValue::BuiltinFunction(a), TreewalkValue::BuiltinFunction(b)) => {
                ptr::eq(*a, *b)
            }
            (TreewalkValue::BuiltinMethod(a), TreewalkValue::BuiltinMethod(b)) => {
                a.name == b.name && a.receiver.is(&b.receiver)
            }
            (TreewalkValue::Method(a), TreewalkValue::Method(b)) => {
                a.function.same_identity(&b.function) && a.receiver.is(&b.receiver)
            }
            (a, b) if a.as_number().is_some() && b.as_number().is_some() => {
                match (a.as_number(), b.as_number()) {
                    (Some(Number::Int(x)), Some(Number::Int(y))) => x == y,
                    (Some(x), Some(y)) => floats_equal(x.as_f64(), y.as_f64()),
                    _ => false,
                }
            }
            _ => self.is(other),
        }
    }
}

/// A numeric view of `bool`, `int`, and `float` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }
}

impl TreewalkValue {
    pub fn str(s: impl Into<String>) -> Self {
        TreewalkValue::Str(s.into())
    }

    pub fn list(items: Vec<TreewalkValue>) -> Self {
        TreewalkValue::List(Container::new(items))
    }

    pub fn tuple(items: Vec<TreewalkValue>) -> Self {
        TreewalkValue::Tuple(Tuple::new(items))
    }

    pub fn dict(dict: Dict) -> Self {
        TreewalkValue::Dict(Container::new(dict))
    }

    pub fn set(set: Set) -> Self {
        TreewalkValue::Set(Container::new(set))
    }

    pub fn stub(stub: Stub) -> Self {
        TreewalkValue::Stub(stub)
    }

    /// Python's `is`.
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (TreewalkValue::None, TreewalkValue::None) => true,
            (TreewalkValue::Ellipsis, TreewalkValue::Ellipsis) => true,
            (TreewalkValue::NotImplemented, TreewalkValue::NotImplemented) => true,
            (TreewalkValue::Bool(a), TreewalkValue::Bool(b)) => a == b,
            (TreewalkValue::Int(a), TreewalkValue::Int(b)) => a == b,
            (TreewalkValue::Str(a), TreewalkValue::Str(b)) => a == b,
            (TreewalkValue::List(a), TreewalkValue::List(b)) => a.same_identity(b),
            (TreewalkValue::Dict(a), TreewalkValue::Dict(b)) => a.same_identity(b),
            (TreewalkValue::Set(a), TreewalkValue::Set(b)) => a.same_identity(b),
            (TreewalkValue::Iterator(a), TreewalkValue::Iterator(b)) => a.same_identity(b),
            (TreewalkValue::Function(a), TreewalkValue::Function(b)) => a.same_identity(b),
            (TreewalkValue::Class(a), TreewalkValue::Class(b)) => a.same_identity(b),
            (TreewalkValue::Object(a), TreewalkValue::Object(b)) => a.same_identity(b),
            (TreewalkValue::Module(a), TreewalkValue::Module(b)) => a.same_identity(b),
            (TreewalkValue::StringIO(a), TreewalkValue::StringIO(b)) => a.same_identity(b),
            (TreewalkValue::Stub(a), TreewalkValue::Stub(b)) => a.same_identity(b),
            (TreewalkValue::Type(a), TreewalkValue::Type(b)) => a == b,
            (TreewalkValue::ExceptionType(a), TreewalkValue::ExceptionType(b)) => a == b,
            (TreewalkValue::BuiltinFunction(a), TreewalkValue::BuiltinFunction(b)) => {
                ptr::eq(*a, *b)
            }
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            TreewalkValue::Bool(b) => Some(Number::Int(*b as i64)),
            TreewalkValue::Int(i) => Some(Number::Int(*i)),
            TreewalkValue::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// The name `type(x).__name__` would give.
    pub fn type_name(&self) -> String {
        match self {
            TreewalkValue::None => "NoneType".into(),
            TreewalkValue::Ellipsis => "ellipsis".into(),
            TreewalkValue::NotImplemented => "NotImplementedType".into(),
            TreewalkValue::Bool(_) => "bool".into(),
            TreewalkValue::Int(_) => "int".into(),
            TreewalkValue::Float(_) => "float".into(),
            TreewalkValue::Str(_) => "str".into(),
            TreewalkValue::Bytes(_) => "bytes".into(),
            TreewalkValue::List(_) => "list".into(),
            TreewalkValue::Tuple(t) => t.type_name().into(),
            TreewalkValue::Dict(_) => "dict".into(),
            TreewalkValue::Set(_) => "set".into(),
            TreewalkValue::Range(_) => "range".into(),
            TreewalkValue::Slice(_) => "slice".into(),
            TreewalkValue::Iterator(_) => "iterator".into(),
            TreewalkValue::Function(_) => "function".into(),
            TreewalkValue::Method(_) => "method".into(),
            TreewalkValue::BuiltinFunction(_) | TreewalkValue::BuiltinMethod(_) => {
                "builtin_function_or_method".into()
            }
            TreewalkValue::Type(_) | TreewalkValue::Class(_) | TreewalkValue::ExceptionType(_) => {
                "type".into()
            }
            TreewalkValue::Object(o) => o.borrow().class.borrow().name.clone(),
            TreewalkValue::Super(_) => "super".into(),
            TreewalkValue::Staticmethod(_) => "staticmethod".into(),
            TreewalkValue::Classmethod(_) => "classmethod".into(),
            TreewalkValue::Property(_) => "property".into(),
            TreewalkValue::Module(_) => "module".into(),
            TreewalkValue::Exception(e) => e.type_name(),
            TreewalkValue::Stub(_) => "Stub".into(),
            TreewalkValue::StringIO(_) => "StringIO".into(),
        }
    }

    /// Truthiness for builtin values. Objects with `__bool__` or `__len__` are handled by the
    /// interpreter before this is consulted.
    pub fn is_truthy(&self) -> bool {
        match self {
            TreewalkValue::None => false,
            TreewalkValue::Bool(b) => *b,
            TreewalkValue::Int(i) => *i != 0,
            TreewalkValue::Float(f) => *f != 0.0,
            TreewalkValue::Str(s) => !s.is_empty(),
            TreewalkValue::Bytes(b) => !b.is_empty(),
            TreewalkValue::List(l) => !l.borrow().is_empty(),
            TreewalkValue::Tuple(t) => !t.is_empty(),
            TreewalkValue::Dict(d) => !d.borrow().is_empty(),
            TreewalkValue::Set(s) => !s.borrow().is_empty(),
            TreewalkValue::Range(r) => r.len() > 0,
            _ => true,
        }
    }

    pub fn hash_key(&self) -> DomainResult<HashKey> {
        let key = match self {
            TreewalkValue::None => HashKey::None,
            TreewalkValue::Ellipsis => HashKey::Ellipsis,
            TreewalkValue::Bool(b) => HashKey::Int(*b as i64),
            TreewalkValue::Int(i) => HashKey::Int(*i),
            TreewalkValue::Float(f) => HashKey::from_float(*f),
            TreewalkValue::Str(s) => HashKey::Str(s.clone()),
            TreewalkValue::Bytes(b) => HashKey::Bytes(b.clone()),
            TreewalkValue::Tuple(t) => HashKey::Tuple(
                t.iter()
                    .map(TreewalkValue::hash_key)
                    .collect::<DomainResult<Vec<_>>>()?,
            ),
            TreewalkValue::Range(r) => HashKey::Tuple(vec![
                HashKey::Int(r.start),
                HashKey::Int(r.stop),
                HashKey::Int(r.step),
            ]),
            TreewalkValue::Type(t) => HashKey::Type(t.name().to_string()),
            TreewalkValue::ExceptionType(kind) => HashKey::Type(kind.name().to_string()),
            TreewalkValue::BuiltinFunction(b) => HashKey::Identity(*b as *const Builtin as usize),
            TreewalkValue::Class(c) => HashKey::Identity(c.address()),
            TreewalkValue::Object(o) => HashKey::Identity(o.address()),
            TreewalkValue::Function(f) => HashKey::Identity(f.address()),
            TreewalkValue::Module(m) => HashKey::Identity(m.address()),
            TreewalkValue::StringIO(s) => HashKey::Identity(s.address()),
            TreewalkValue::Iterator(i) => HashKey::Identity(i.address()),
            TreewalkValue::Stub(s) => HashKey::Identity(s.address()),
            _ => {
                return Err(Exception::type_error(format!(
                    "unhashable type: '{}'",
                    self.type_name()
                )))
            }
        };
        Ok(key)
    }

    pub fn as_int(&self) -> DomainResult<i64> {
        match self {
            TreewalkValue::Int(i) => Ok(*i),
            TreewalkValue::Bool(b) => Ok(*b as i64),
            _ => Err(Exception::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                self.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> DomainResult<&str> {
        match self {
            TreewalkValue::Str(s) => Ok(s),
            _ => Err(Exception::type_error(format!(
                "expected str, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_class(&self) -> DomainResult<Container<Class>> {
        match self {
            TreewalkValue::Class(c) => Ok(c.clone()),
            _ => Err(Exception::type_error("expected a class")),
        }
    }

    pub fn as_function(&self) -> DomainResult<Container<Function>> {
        match self {
            TreewalkValue::Function(f) => Ok(f.clone()),
            _ => Err(Exception::type_error("expected a function")),
        }
    }

    pub fn as_dict(&self) -> DomainResult<Container<Dict>> {
        match self {
            TreewalkValue::Dict(d) => Ok(d.clone()),
            _ => Err(Exception::type_error(format!(
                "'{}' object is not a mapping",
                self.type_name()
            ))),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TreewalkValue::None)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, TreewalkValue::Stub(_))
    }
}

impl From<&str> for TreewalkValue {
    fn from(value: &str) -> Self {
        TreewalkValue::Str(value.to_string())
    }
}

impl From<String> for TreewalkValue {
    fn from(value: String) -> Self {
        TreewalkValue::Str(value)
    }
}

impl From<i64> for TreewalkValue {
    fn from(value: i64) -> Self {
        TreewalkValue::Int(value)
    }
}

impl From<bool> for TreewalkValue {
    fn from(value: bool) -> Self {
        TreewalkValue::Bool(value)
    }
}

impl From<Stub> for TreewalkValue {
    fn from(value: Stub) -> Self {
        TreewalkValue::Stub(value)
    }
}

impl Debug for TreewalkValue {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        match self {
            TreewalkValue::None => write!(f, "None"),
            TreewalkValue::Ellipsis => write!(f, "Ellipsis"),
            TreewalkValue::NotImplemented => write!(f, "NotImplemented"),
            TreewalkValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            TreewalkValue::Int(i) => write!(f, "{i}"),
            TreewalkValue::Float(x) => write!(f, "{x:?}"),
            TreewalkValue::Str(s) => write!(f, "{s:?}"),
            TreewalkValue::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            TreewalkValue::List(l) => match l.try_borrow() {
                Some(items) => f.debug_list().entries(items.iter()).finish(),
                None => write!(f, "[...]"),
            },
            TreewalkValue::Tuple(t) => {
                let mut tuple = f.debug_tuple("");
                for item in t.iter() {
                    tuple.field(item);
                }
                tuple.finish()
            }
            TreewalkValue::Dict(d) => match d.try_borrow() {
                Some(dict) => f.debug_map().entries(dict.items()).finish(),
                None => write!(f, "{{...}}"),
            },
            TreewalkValue::Set(s) => match s.try_borrow() {
                Some(set) => f.debug_set().entries(set.items()).finish(),
                None => write!(f, "{{...}}"),
            },
            TreewalkValue::Range(r) => write!(f, "range({}, {}, {})", r.start, r.stop, r.step),
            TreewalkValue::Slice(s) => write!(f, "{s:?}"),
            TreewalkValue::Iterator(_) => write!(f, "<iterator>"),
            TreewalkValue::Function(func) => match func.try_borrow() {
                Some(func) => write!(f, "<function {}>", func.name),
                None => write!(f, "<function>"),
            },
            TreewalkValue::Method(m) => write!(f, "<bound method of {:?}>", m.receiver),
            TreewalkValue::BuiltinFunction(b) => write!(f, "<built-in function {}>", b.name),
            TreewalkValue::BuiltinMethod(m) => write!(f, "<built-in method {}>", m.name),
            TreewalkValue::Type(t) => write!(f, "<class '{}'>", t.name()),
            TreewalkValue::Class(c) => match c.try_borrow() {
                Some(class) => write!(f, "<class '{}'>", class.name),
                None => write!(f, "<class>"),
            },
            TreewalkValue::Object(_) => write!(f, "<{} object>", self.type_name()),
            TreewalkValue::Super(_) => write!(f, "<super>"),
            TreewalkValue::Staticmethod(_) => write!(f, "<staticmethod>"),
            TreewalkValue::Classmethod(_) => write!(f, "<classmethod>"),
            TreewalkValue::Property(_) => write!(f, "<property>"),
            TreewalkValue::Module(m) => match m.try_borrow() {
                Some(module) => write!(f, "<module '{}'>", module.name()),
                None => write!(f, "<module>"),
            },
            TreewalkValue::ExceptionType(kind) => write!(f, "<class '{kind}'>"),
            TreewalkValue::Exception(e) => write!(f, "{}({:?})", e.type_name(), e.payload),
            TreewalkValue::Stub(s) => write!(f, "<stub {}>", s.name()),
            TreewalkValue::StringIO(_) => write!(f, "<StringIO>"),
        }
    }
}
