mod args;
mod hash_key;

pub use args::{check_args, Args};
pub use hash_key::HashKey;
