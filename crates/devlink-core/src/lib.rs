//! # devlink-core - Core Domain Types
//!
//! Foundation crate for devlink. Provides the device identity, session status,
//! published snapshot, error handling and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`DeviceId`] - Physical device identity (serial-based equality)
//! - [`SessionStatus`] - Lifecycle status with transition rules
//! - [`ProductInfo`] - Metadata fetched once the device is live
//! - [`SessionSnapshot`] - Read-only view published to UI collaborators
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `benign` classification
//! - [`ErrorInfo`] - Cloneable error payload carried in snapshots
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use devlink_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all devlink crates
pub mod prelude {
    pub use super::error::{Error, Result};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use error::{Error, ErrorInfo, ErrorKind, Result};
pub use types::{DeviceId, ProductInfo, SessionSnapshot, SessionStatus};
