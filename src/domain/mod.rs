mod error;
mod identifier;
mod module_name;
mod source;
mod text;
pub mod utils;

pub use error::ExceptionKind;
pub use identifier::{Identifier, InvalidIdentifier};
pub use module_name::{FromImportPath, ModuleName, ModulePath};
pub use source::Source;
pub use text::Text;
