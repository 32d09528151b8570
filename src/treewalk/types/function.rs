use std::rc::Rc;

use crate::{
    core::Container,
    parser::types::{Ast, Expr, Params},
    treewalk::{types::Class, Scope, TreewalkValue},
};

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Rc<Ast>),
    /// A lambda, whose body is a single expression.
    Expr(Rc<Expr>),
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Params,
    /// Evaluated defaults, aligned with `params.args`.
    pub defaults: Vec<Option<TreewalkValue>>,
    /// Evaluated defaults, aligned with `params.kwonly_args`.
    pub kwonly_defaults: Vec<Option<TreewalkValue>>,
    pub body: FunctionBody,
    /// Generator bodies run to completion when called and return an iterator over every value
    /// they yielded.
    pub is_generator: bool,
    pub globals: Container<Scope>,
    /// Enclosing function scopes, outermost first.
    pub closure: Vec<Container<Scope>>,
    /// The class whose body defined this function, for zero-argument `super()`.
    pub class: Option<Container<Class>>,
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// A user function bound to its receiver.
#[derive(Debug, Clone)]
pub struct Method {
    pub receiver: Box<TreewalkValue>,
    pub function: Container<Function>,
}

impl Method {
    pub fn new(receiver: TreewalkValue, function: Container<Function>) -> Self {
        Self {
            receiver: Box::new(receiver),
            function,
        }
    }
}

/// A method implemented in Rust, bound to the value it was looked up on.
#[derive(Debug, Clone)]
pub struct BuiltinMethod {
    pub receiver: Box<TreewalkValue>,
    pub name: &'static str,
}

impl BuiltinMethod {
    pub fn new(receiver: TreewalkValue, name: &'static str) -> Self {
        Self {
            receiver: Box::new(receiver),
            name,
        }
    }
}
