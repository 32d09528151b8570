use std::ptr;

use crate::{
    core::Container,
    domain::ExceptionKind,
    treewalk::{types::Exception, types::Stub, DomainResult, Scope, TreewalkValue},
};

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub bases: Vec<Container<Class>>,
    /// Ancestors in method resolution order, excluding the class itself.
    pub mro: Vec<Container<Class>>,
    pub namespace: Scope,
    /// The nearest builtin exception this class derives from, if any.
    pub exception_kind: Option<ExceptionKind>,
    /// Set when the class, or any ancestor, derives from a stub. Missing attributes then resolve
    /// to fresh stubs instead of raising.
    pub stub_base: Option<Stub>,
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Class {
    /// Build a class from its evaluated bases. Bases other than classes, exception types, stubs,
    /// and `object` are rejected.
    pub fn new(name: &str, bases: &[TreewalkValue], namespace: Scope) -> DomainResult<Self> {
        let mut class_bases = vec![];
        let mut exception_kind = None;
        let mut stub_base = None;

        for base in bases {
            match base {
                TreewalkValue::Class(class) => {
                    let parent = class.borrow();
                    exception_kind = exception_kind.or(parent.exception_kind);
                    stub_base = stub_base.or_else(|| parent.stub_base.clone());
                    drop(parent);
                    class_bases.push(class.clone());
                }
                TreewalkValue::ExceptionType(kind) => {
                    exception_kind = exception_kind.or(Some(*kind));
                }
                TreewalkValue::Stub(stub) => {
                    stub_base = stub_base.or_else(|| Some(stub.clone()));
                }
                TreewalkValue::Type(t) if t.name() == "object" => {}
                other => {
                    return Err(Exception::type_error(format!(
                        "cannot derive class '{name}' from '{}'",
                        other.type_name()
                    )))
                }
            }
        }

        let mro = linearize(&class_bases)?;

        Ok(Self {
            name: name.to_string(),
            bases: class_bases,
            mro,
            namespace,
            exception_kind,
            stub_base,
        })
    }

    /// Look `name` up on the class itself and then along its MRO.
    pub fn lookup(class: &Container<Class>, name: &str) -> Option<TreewalkValue> {
        let class = class.borrow();
        class
            .namespace
            .get(name)
            .or_else(|| class.mro.iter().find_map(|c| c.borrow().namespace.get(name)))
    }

    /// Look `name` up on the ancestors that follow `after` in `class`'s MRO, as `super()` does.
    pub fn lookup_after(
        class: &Container<Class>,
        after: &Container<Class>,
        name: &str,
    ) -> Option<TreewalkValue> {
        let full = Class::full_mro(class);
        full.iter()
            .skip_while(|c| !c.same_identity(after))
            .skip(1)
            .find_map(|c| c.borrow().namespace.get(name))
    }

    pub fn full_mro(class: &Container<Class>) -> Vec<Container<Class>> {
        let mut mro = vec![class.clone()];
        mro.extend(class.borrow().mro.iter().cloned());
        mro
    }

    pub fn is_subclass_of(class: &Container<Class>, other: &Container<Class>) -> bool {
        class.same_identity(other) || class.borrow().mro.iter().any(|c| c.same_identity(other))
    }
}

/// C3 linearization of the given bases.
fn linearize(bases: &[Container<Class>]) -> DomainResult<Vec<Container<Class>>> {
    let mut sequences: Vec<Vec<Container<Class>>> =
        bases.iter().map(Class::full_mro).collect();
    sequences.push(bases.to_vec());

    let mut result: Vec<Container<Class>> = vec![];
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Ok(result);
        }

        let candidate = sequences
            .iter()
            .map(|s| &s[0])
            .find(|head| {
                !sequences
                    .iter()
                    .any(|s| s[1..].iter().any(|c| c.same_identity(head)))
            })
            .cloned()
            .ok_or_else(|| {
                Exception::type_error("Cannot create a consistent method resolution order (MRO)")
            })?;

        for sequence in sequences.iter_mut() {
            if sequence[0].same_identity(&candidate) {
                sequence.remove(0);
            }
        }
        result.push(candidate);
    }
}

#[derive(Debug)]
pub struct Object {
    pub class: Container<Class>,
    pub attrs: Scope,
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Object {
    pub fn new(class: Container<Class>) -> Self {
        Self {
            class,
            attrs: Scope::default(),
        }
    }
}

/// The proxy `super()` returns inside a method.
#[derive(Debug, Clone)]
pub struct Super {
    pub class: Container<Class>,
    pub receiver: Box<TreewalkValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, bases: &[&Container<Class>]) -> Container<Class> {
        let bases: Vec<_> = bases.iter().map(|b| TreewalkValue::Class((*b).clone())).collect();
        Container::new(Class::new(name, &bases, Scope::default()).expect("valid class"))
    }

    fn names(classes: &[Container<Class>]) -> Vec<String> {
        classes.iter().map(|c| c.borrow().name.clone()).collect()
    }

    #[test]
    fn diamond_mro() {
        let o = class("O", &[]);
        let a = class("A", &[&o]);
        let b = class("B", &[&o]);
        let c = class("C", &[&a, &b]);
        assert_eq!(names(&Class::full_mro(&c)), vec!["C", "A", "B", "O"]);
        assert!(Class::is_subclass_of(&c, &o));
        assert!(!Class::is_subclass_of(&o, &c));
    }

    #[test]
    fn inconsistent_mro() {
        let o = class("O", &[]);
        let a = class("A", &[&o]);
        let bases = vec![TreewalkValue::Class(o), TreewalkValue::Class(a)];
        assert!(Class::new("X", &bases, Scope::default()).is_err());
    }

    #[test]
    fn lookup_walks_ancestors() {
        let base = class("Base", &[]);
        base.borrow_mut()
            .namespace
            .insert("version", TreewalkValue::str("1.0"));
        let child = class("Child", &[&base]);
        assert_eq!(
            Class::lookup(&child, "version"),
            Some(TreewalkValue::str("1.0"))
        );
        assert_eq!(Class::lookup_after(&child, &child, "version"), Some(TreewalkValue::str("1.0")));
        assert_eq!(Class::lookup_after(&child, &base, "version"), None);
    }

    #[test]
    fn stub_and_exception_bases_are_inherited() {
        let stubbed = Container::new(
            Class::new(
                "BuildExt",
                &[TreewalkValue::Stub(Stub::new("build_ext"))],
                Scope::default(),
            )
            .expect("valid class"),
        );
        let child = class("Child", &[&stubbed]);
        assert!(child.borrow().stub_base.is_some());

        let error = Class::new(
            "BuildError",
            &[TreewalkValue::ExceptionType(ExceptionKind::RuntimeError)],
            Scope::default(),
        )
        .expect("valid class");
        assert_eq!(error.exception_kind, Some(ExceptionKind::RuntimeError));
    }
}
