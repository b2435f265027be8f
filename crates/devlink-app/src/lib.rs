//! devlink-app - Session lifecycle controller for devlink
//!
//! This crate implements the TEA (The Elm Architecture) pattern for the single
//! device session: a `Message` enum, one `update` transition function, and an
//! engine loop that performs the resulting actions (connection attempts, the
//! readiness probe, post-ready setup, teardown).

pub mod actions;
pub mod cleanup;
pub mod config;
pub mod controller;
pub mod engine;
pub mod handler;
pub mod hooks;
pub mod message;
pub mod state;
pub mod watcher;

// Re-export primary types
pub use cleanup::{CleanupCoordinator, TeardownReport};
pub use config::Settings;
pub use controller::ControllerHandle;
pub use engine::SessionController;
pub use handler::{TeardownPlan, UpdateAction, UpdateResult};
pub use hooks::SessionHooks;
pub use message::{ConnectOutcome, Message};
pub use state::ControllerState;
pub use watcher::DeviceWatcher;
