//! Configuration file parsing for devlink
//!
//! Settings live in `<config_dir>/devlink/config.toml`; every key is optional.

pub mod settings;
pub mod types;

pub use settings::{default_config_path, init_config_file, load_default_settings, load_settings};
pub use types::*;
