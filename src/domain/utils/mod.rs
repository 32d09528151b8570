mod comma_separated;
mod indices;
mod quote;

pub use comma_separated::{format_bytes, format_comma_separated, format_comma_separated_with};
pub use indices::{normalize_index, slice_indices, wrap_negative};
pub use quote::quote_str;
