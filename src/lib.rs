//! devlink - terminal front end for the device session controller
//!
//! The controller itself lives in `devlink-app`; this crate wires it to the
//! USB host and the ADB server, and renders it on a terminal.

pub mod commands;
pub mod output;
pub mod runner;
pub mod selector;

pub use runner::{run, RunOptions};
