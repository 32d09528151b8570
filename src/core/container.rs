use std::{
    cell::{Ref, RefCell, RefMut},
    fmt::{Debug, Formatter, Result},
    rc::Rc,
};

/// Shared, interior-mutable ownership for interpreter objects which must be aliased, such as
/// lists, dicts, and module namespaces. Two clones of a `Container` point at the same object.
pub struct Container<T>(Rc<RefCell<T>>);

impl<T> Container<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// `None` while the object is mutably borrowed, e.g. when a list is printed from inside one
    /// of its own methods.
    pub fn try_borrow(&self) -> Option<Ref<'_, T>> {
        self.0.try_borrow().ok()
    }

    /// Python's `is`: two containers are the same object when they share an allocation.
    pub fn same_identity(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity for this object, used as its hash when no value hash exists.
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: PartialEq> PartialEq for Container<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other) || *self.borrow() == *other.borrow()
    }
}

impl<T: Debug> Debug for Container<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.0.try_borrow() {
            Ok(inner) => inner.fmt(f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
