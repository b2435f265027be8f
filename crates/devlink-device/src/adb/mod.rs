//! ADB server backed device transport

pub mod client;
pub mod transport;

pub use client::AdbServer;
pub use transport::AdbServerTransport;
