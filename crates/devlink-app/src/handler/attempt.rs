//! Connection handlers: connect, auto-connect, user selection and attempt results

use devlink_core::prelude::*;
use devlink_core::{DeviceId, ErrorInfo, SessionStatus};
use devlink_device::SessionHandle;

use crate::message::{AttemptId, ConnectOutcome, ConnectReply, Message, RequestId};
use crate::state::{ControllerState, PendingAttempt, Session};

use super::{TeardownPlan, UpdateAction, UpdateResult};

/// Deliver `outcome` to every waiting caller; callers that went away are skipped
pub(crate) fn reply_all(replies: Vec<ConnectReply>, outcome: &ConnectOutcome) {
    for reply in replies {
        let _ = reply.send(outcome.clone());
    }
}

/// Handle a connect request
pub fn handle_connect(
    state: &mut ControllerState,
    device: DeviceId,
    replies: Vec<ConnectReply>,
) -> UpdateResult {
    // A second connect while one is pending shares the pending outcome
    if let Some(pending) = state.pending.as_mut() {
        if pending.device != device {
            debug!(
                "Connect to {} suppressed: attempt {} for {} in flight",
                device, pending.id, pending.device
            );
        }
        pending.replies.extend(replies);
        return UpdateResult::none();
    }

    let mut actions = Vec::new();

    if let Some(session) = state.session.as_ref() {
        if session.device() == &device {
            reply_all(replies, &Ok(device));
            return UpdateResult::none();
        }

        info!(
            "Switching session from {} to {}",
            session.device(),
            device
        );
        let previous = session.device().clone();
        state.session = None;
        state.last_reading = None;
        state.transition(SessionStatus::Disconnected);
        actions.push(UpdateAction::Teardown(TeardownPlan::session(Some(previous))));
        actions.push(UpdateAction::ResetDependents);
    }

    if !state.transition(SessionStatus::Connecting) {
        reply_all(
            replies,
            &Err(ErrorInfo::from(Error::connection_failed(
                device.serial.clone(),
                format!("cannot connect while {}", state.status),
            ))),
        );
        return UpdateResult::actions(actions);
    }

    let id = state.allocate_attempt();
    info!("Starting connection attempt {} to {}", id, device.display_name());
    state.last_error = None;
    state.pending = Some(PendingAttempt {
        id,
        device: device.clone(),
        replies,
    });
    state.touch();

    actions.push(UpdateAction::StartAttempt { attempt: id, device });
    UpdateResult::actions(actions)
}

/// Handle an auto-connect request; no-op unless fully idle
pub fn handle_auto_connect(state: &mut ControllerState) -> UpdateResult {
    if !state.is_idle() {
        debug!("Auto-connect skipped: session busy");
        return UpdateResult::none();
    }
    if state.enumeration.is_some() {
        debug!("Auto-connect skipped: enumeration in flight");
        return UpdateResult::none();
    }

    let request = state.allocate_request();
    state.enumeration = Some(request);
    UpdateResult::action(UpdateAction::EnumerateDevices { request })
}

pub fn handle_devices_enumerated(
    state: &mut ControllerState,
    request: RequestId,
    devices: Vec<DeviceId>,
) -> UpdateResult {
    // Withdrawn by a detach or disconnect while the platform was enumerating
    if state.enumeration != Some(request) {
        debug!("Dropping result of withdrawn enumeration {}", request);
        return UpdateResult::none();
    }
    state.enumeration = None;

    // A user action may have started something while we enumerated
    if !state.is_idle() {
        debug!("Auto-connect dropped: session became busy");
        return UpdateResult::none();
    }

    match devices.into_iter().next() {
        Some(device) => {
            info!("Auto-connecting to {}", device.display_name());
            UpdateResult::message(Message::Connect {
                device,
                replies: Vec::new(),
            })
        }
        None => {
            debug!("Auto-connect: no authorized device attached");
            UpdateResult::none()
        }
    }
}

/// Handle a request to prompt the user for a device
pub fn handle_select_device(
    state: &mut ControllerState,
    reply: Option<ConnectReply>,
) -> UpdateResult {
    if state.is_selecting() {
        state.selection_replies.extend(reply);
        return UpdateResult::none();
    }
    if let Some(pending) = state.pending.as_mut() {
        pending.replies.extend(reply);
        return UpdateResult::none();
    }

    let request = state.allocate_request();
    state.selection = Some(request);
    state.selection_replies.extend(reply);
    if state.session.is_none() {
        state.last_error = None;
        state.transition(SessionStatus::Connecting);
    }
    state.touch();

    UpdateResult::action(UpdateAction::RequestSelection { request })
}

pub fn handle_selection_resolved(
    state: &mut ControllerState,
    request: RequestId,
    result: ConnectOutcome,
) -> UpdateResult {
    // The prompt was withdrawn (disconnect); its waiters were already answered
    if state.selection != Some(request) {
        debug!("Dropping result of withdrawn selection {}", request);
        return UpdateResult::none();
    }
    state.selection = None;
    let replies = std::mem::take(&mut state.selection_replies);

    match result {
        Ok(device) => {
            info!("User selected {}", device.display_name());
            UpdateResult::message(Message::Connect { device, replies })
        }
        Err(error) => {
            if error.is_benign() {
                info!("Device selection: {}", error);
            } else {
                warn!("Device selection failed: {}", error);
            }

            if state.session.is_none() && state.pending.is_none() {
                state.transition(SessionStatus::Failed);
                state.last_error = Some(error.clone());
                state.touch();
            }
            reply_all(replies, &Err(error));
            UpdateResult::none()
        }
    }
}

pub fn handle_attempt_progress(
    state: &mut ControllerState,
    attempt: AttemptId,
    status: SessionStatus,
) -> UpdateResult {
    if state.is_current_attempt(attempt) {
        state.transition(status);
    }
    UpdateResult::none()
}

pub fn handle_attempt_succeeded(
    state: &mut ControllerState,
    attempt: AttemptId,
    handle: SessionHandle,
) -> UpdateResult {
    if !state.is_current_attempt(attempt) {
        return release_stale(state, attempt, handle.device().clone());
    }
    let Some(pending) = state.pending.take() else {
        return UpdateResult::none();
    };

    state.transition(SessionStatus::Authenticating);
    state.transition(SessionStatus::Probing);

    let token = state.allocate_token();
    info!(
        "Session {} established with {}",
        token,
        pending.device.display_name()
    );
    state.session = Some(Session {
        token,
        handle: handle.clone(),
        promoted: false,
        reverse_socket_opened: false,
        product_info: None,
        binaries: Default::default(),
    });
    state.last_error = None;
    state.last_reading = None;
    state.touch();

    reply_all(pending.replies, &Ok(pending.device));
    UpdateResult::action(UpdateAction::StartProbe { token, handle })
}

pub fn handle_attempt_failed(
    state: &mut ControllerState,
    attempt: AttemptId,
    device: DeviceId,
    error: ErrorInfo,
    transport_opened: bool,
) -> UpdateResult {
    if !state.is_current_attempt(attempt) {
        if transport_opened {
            return release_stale(state, attempt, device);
        }
        debug!("Ignoring failure of stale attempt {}", attempt);
        return UpdateResult::none();
    }
    let Some(pending) = state.pending.take() else {
        return UpdateResult::none();
    };

    warn!("Connection attempt {} failed: {}", attempt, error);
    state.transition(SessionStatus::Failed);
    state.last_error = Some(error.clone());
    state.touch();

    reply_all(pending.replies, &Err(error));
    UpdateResult::action(UpdateAction::Teardown(TeardownPlan::session(
        transport_opened.then_some(device),
    )))
}

/// A superseded attempt produced a transport; close it unless the device is
/// in use by the current attempt or session
fn release_stale(state: &ControllerState, attempt: AttemptId, device: DeviceId) -> UpdateResult {
    if state.device_in_use(&device) {
        debug!(
            "Stale attempt {} left {} open; device still in use",
            attempt, device
        );
        return UpdateResult::none();
    }
    info!("Discarding stale attempt {}, releasing {}", attempt, device);
    UpdateResult::action(UpdateAction::Teardown(TeardownPlan::orphan(device)))
}
