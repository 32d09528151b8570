//! The sandbox: a tree-walking interpreter for the subset of Python that build descriptors use.

pub mod builtins;
pub mod compile;
mod interpreter;
mod raised_error;
mod scope;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod types;
pub mod utils;
mod value;

pub use interpreter::TreewalkInterpreter;
pub use raised_error::{DomainResult, Raise, RaisedException, TreewalkResult};
pub use scope::{Scope, SymbolTable};
pub use value::{Number, TreewalkValue};
