//! Action executors: background tasks spawned on behalf of the controller
//!
//! Tasks hold only a weak sender to the controller inbox. When the
//! controller is gone their results have nowhere to go, and the task is
//! responsible for releasing anything it acquired.

use tokio::sync::mpsc;

use crate::message::Message;

pub mod attempt;
pub mod discovery;
pub mod probe;
pub mod setup;

pub use attempt::{AttemptFailure, ConnectionAttempt};
pub use probe::ProbeTimer;

/// Weak handle to the controller inbox
pub type MessageSender = mpsc::WeakUnboundedSender<Message>;

/// Deliver a message to the controller.
///
/// Returns the message back if the controller is no longer running.
pub(crate) fn send(tx: &MessageSender, msg: Message) -> std::result::Result<(), Message> {
    match tx.upgrade() {
        Some(tx) => tx.send(msg).map_err(|e| e.0),
        None => Err(msg),
    }
}
