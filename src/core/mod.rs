mod container;
mod log;
mod utils;

pub use container::Container;
pub use log::{log, LogLevel};
pub use utils::floats_equal;
