//! Configuration parsing for xkeybind
//!
//! This crate handles parsing the KDL configuration file: global settings
//! plus the list of key bindings to resolve or grab.

mod error;
mod model;
mod parser;

pub use error::{ConfigError, SourceLocation};
pub use model::*;
pub use parser::{load_config, parse_config, parse_config_str};
