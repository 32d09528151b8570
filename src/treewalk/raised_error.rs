use std::fmt::{Display, Error, Formatter};

use crate::treewalk::{types::Exception, TreewalkInterpreter};

/// An exception propagating out of the script, tagged with the line that raised it.
#[derive(Debug, PartialEq, Clone)]
pub struct RaisedException {
    pub line: usize,
    pub exception: Exception,
}

impl RaisedException {
    pub fn new(line: usize, exception: Exception) -> Self {
        Self { line, exception }
    }
}

pub type TreewalkResult<T> = Result<T, RaisedException>;

/// Results of operations that do not know where in the script they are running.
pub type DomainResult<T> = Result<T, Exception>;

/// Attach the interpreter's current line to a `DomainResult` failure.
pub trait Raise<T> {
    fn raise(self, interpreter: &TreewalkInterpreter) -> TreewalkResult<T>;
}

impl<T> Raise<T> for DomainResult<T> {
    fn raise(self, interpreter: &TreewalkInterpreter) -> TreewalkResult<T> {
        self.map_err(|exception| interpreter.raise(exception))
    }
}

impl Display for RaisedException {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "line {}: {}", self.line, self.exception.type_name())
    }
}

impl<T> Raise<T> for Exception {
    fn raise(self, interpreter: &TreewalkInterpreter) -> TreewalkResult<T> {
        Err(interpreter.raise(self))
    }
}
