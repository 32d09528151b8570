mod class;
mod dict;
mod exception;
mod function;
mod iterator;
mod module;
mod range;
mod slice;
mod string_io;
mod stub;
mod tuple;
mod r#type;

pub use class::{Class, Object, Super};
pub use dict::{Dict, Set};
pub use exception::Exception;
pub use function::{BuiltinMethod, Function, FunctionBody, Method};
pub use iterator::Iter;
pub use module::Module;
pub use r#type::BuiltinType;
pub use range::Range;
pub use slice::Slice;
pub use string_io::StringIO;
pub use stub::Stub;
pub use tuple::{NamedFields, Tuple};
