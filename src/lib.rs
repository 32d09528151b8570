//! Extract the `install_requires` of a Python package by running its `setup.py` in a sandbox.
//!
//! The descriptor is parsed, rewritten so that imports of unavailable modules bind stubs,
//! read-mode `open()` calls yield in-memory streams and `setup()` feeds a capture buffer, and then
//! executed by a tree-walking interpreter that has no access to the host.

pub mod capture;
pub mod config;
pub mod core;
pub mod domain;
pub mod extract;
pub mod lexer;
pub mod parser;
pub mod sanitizer;
pub mod treewalk;

pub use config::ExtractConfig;
pub use extract::{
    extract, extract_from_path, extract_from_reader, extract_text, ExtractError, Extractor, Phase,
};
pub use sanitizer::{AvailabilityProber, HostModules};
