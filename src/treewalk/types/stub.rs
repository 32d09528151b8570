use std::rc::Rc;

/// The universal placeholder bound in place of anything that could not be imported. Attribute
/// access, subscripts, and calls on a stub each yield a fresh stub named after the access path,
/// and converting one to text always produces the sentinel.
#[derive(Clone, Debug)]
pub struct Stub(Rc<str>);

impl Stub {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn attribute(&self, attr: &str) -> Self {
        Self::new(format!("{}.{attr}", self.0))
    }

    pub fn item(&self) -> Self {
        Self::new(format!("{}[]", self.0))
    }

    pub fn called(&self) -> Self {
        Self::new(format!("{}()", self.0))
    }

    /// The result of an operator dunder, e.g. `v.__radd__()` for `"x" + v`.
    pub fn operated(&self, dunder: &str) -> Self {
        self.attribute(dunder).called()
    }

    /// Stubs hash and compare by identity, so each one is its own object.
    pub fn same_identity(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}
