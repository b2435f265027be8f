//! Main update function - handles state transitions (TEA pattern)

use crate::message::Message;
use crate::state::ControllerState;

use super::{attempt, probe, teardown, UpdateAction, UpdateResult};

/// Process a message and update state
/// Returns optional follow-up message and the actions to perform
pub fn update(state: &mut ControllerState, message: Message) -> UpdateResult {
    if state.quitting {
        return teardown::reject_after_shutdown(message);
    }

    match message {
        Message::Start => {
            state.reset_context();
            let result = UpdateResult::action(UpdateAction::SubscribeWatcher);
            if state.settings.auto_connect {
                result.with_message(Message::AutoConnect)
            } else {
                result
            }
        }

        // ─────────────────────────────────────────────────────────
        // Connection
        // ─────────────────────────────────────────────────────────
        Message::Connect { device, replies } => attempt::handle_connect(state, device, replies),
        Message::AutoConnect => attempt::handle_auto_connect(state),
        Message::DevicesEnumerated { request, devices } => {
            attempt::handle_devices_enumerated(state, request, devices)
        }
        Message::SelectDevice { reply } => attempt::handle_select_device(state, reply),
        Message::SelectionResolved { request, result } => {
            attempt::handle_selection_resolved(state, request, result)
        }
        Message::AttemptProgress { attempt, status } => {
            attempt::handle_attempt_progress(state, attempt, status)
        }
        Message::AttemptSucceeded { attempt, handle } => {
            attempt::handle_attempt_succeeded(state, attempt, handle)
        }
        Message::AttemptFailed {
            attempt,
            device,
            error,
            transport_opened,
        } => attempt::handle_attempt_failed(state, attempt, device, error, transport_opened),

        // ─────────────────────────────────────────────────────────
        // Probe
        // ─────────────────────────────────────────────────────────
        Message::ProbeReading { token, reading } => {
            probe::handle_probe_reading(state, token, reading)
        }
        Message::PostReadyCompleted {
            token,
            reverse_socket_opened,
            product_info,
        } => probe::handle_post_ready_completed(state, token, reverse_socket_opened, product_info),
        Message::BinariesChecked { token, binaries } => {
            probe::handle_binaries_checked(state, token, binaries)
        }

        // ─────────────────────────────────────────────────────────
        // Teardown
        // ─────────────────────────────────────────────────────────
        Message::Hotplug(Some(device)) => {
            tracing::debug!("Device attached: {}", device.display_name());
            UpdateResult::message(Message::AutoConnect)
        }
        Message::Hotplug(None) => teardown::handle_detach(state),
        Message::Disconnect { done } => teardown::handle_disconnect(state, done),
        Message::Shutdown { done } => teardown::handle_shutdown(state, done),
    }
}
