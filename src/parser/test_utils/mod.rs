mod context;
mod helpers;
mod nodes;

pub use context::ParseContext;
pub(crate) use helpers::*;
pub(crate) use nodes::*;
pub(crate) use crate::parser::types::ast;
