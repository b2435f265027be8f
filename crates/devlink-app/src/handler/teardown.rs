//! Teardown handlers: detach, disconnect and shutdown

use devlink_core::prelude::*;
use devlink_core::{ErrorInfo, SessionStatus};
use tokio::sync::oneshot;

use crate::message::Message;
use crate::state::ControllerState;

use super::attempt::reply_all;
use super::{TeardownPlan, UpdateAction, UpdateResult};

/// End the session and any pending attempt.
///
/// Returns `None` when nothing was held, so repeated detaches are observed
/// exactly once.
fn end_session(state: &mut ControllerState, reason: Error) -> Option<Vec<UpdateAction>> {
    if state.session.is_none() && state.pending.is_none() {
        return None;
    }

    let device = state.session.take().map(|s| s.device().clone());
    if let Some(pending) = state.pending.take() {
        debug!("Abandoning attempt {} for {}", pending.id, pending.device);
        reply_all(pending.replies, &Err(ErrorInfo::from(&reason)));
    }

    state.last_reading = None;
    state.last_error = None;
    state.transition(SessionStatus::Disconnected);
    state.touch();

    Some(vec![
        UpdateAction::Teardown(TeardownPlan::session(device)),
        UpdateAction::ResetDependents,
    ])
}

/// Close an open selection prompt; its eventual result is dropped
fn withdraw_selection(state: &mut ControllerState) {
    if state.selection.take().is_none() {
        return;
    }
    debug!("Selection prompt withdrawn");
    let replies = std::mem::take(&mut state.selection_replies);
    reply_all(replies, &Err(ErrorInfo::from(Error::SelectionCancelled)));
    state.touch();
}

/// Handle the device being unplugged
pub fn handle_detach(state: &mut ControllerState) -> UpdateResult {
    // A device list gathered before the detach is stale
    state.enumeration = None;

    match end_session(state, Error::DeviceDetached) {
        Some(actions) => {
            info!("Device detached, session torn down");
            UpdateResult::actions(actions)
        }
        None => {
            debug!("Detach with no session held");
            UpdateResult::none()
        }
    }
}

/// Handle an explicit disconnect
pub fn handle_disconnect(
    state: &mut ControllerState,
    done: Option<oneshot::Sender<()>>,
) -> UpdateResult {
    withdraw_selection(state);
    state.enumeration = None;

    let mut actions = match end_session(state, Error::DeviceDetached) {
        Some(actions) => {
            info!("Disconnected by request");
            actions
        }
        None => {
            // Return a failed or prompting status to idle
            if state.status != SessionStatus::Disconnected {
                state.last_error = None;
                state.transition(SessionStatus::Disconnected);
            }
            Vec::new()
        }
    };

    actions.extend(done.map(UpdateAction::Acknowledge));
    UpdateResult::actions(actions)
}

/// Handle shutdown: release everything, including the watcher
pub fn handle_shutdown(
    state: &mut ControllerState,
    done: Option<oneshot::Sender<()>>,
) -> UpdateResult {
    info!("Controller shutting down");
    state.quitting = true;

    let held = state.session.is_some() || state.pending.is_some();
    let device = state.session.take().map(|s| s.device().clone());

    let closed = ErrorInfo::from(Error::ChannelClosed);
    if let Some(pending) = state.pending.take() {
        reply_all(pending.replies, &Err(closed.clone()));
    }
    reply_all(std::mem::take(&mut state.selection_replies), &Err(closed));
    state.selection = None;
    state.enumeration = None;

    state.transition(SessionStatus::Disconnected);
    state.reset_context();

    let mut actions = vec![UpdateAction::Teardown(TeardownPlan::shutdown(device))];
    if held {
        actions.push(UpdateAction::ResetDependents);
    }
    actions.extend(done.map(UpdateAction::Acknowledge));
    UpdateResult::actions(actions)
}

/// Answer messages that arrive after shutdown without touching state
pub fn reject_after_shutdown(message: Message) -> UpdateResult {
    let closed = || Err(ErrorInfo::from(Error::ChannelClosed));
    match message {
        Message::Connect { replies, .. } => {
            reply_all(replies, &closed());
            UpdateResult::none()
        }
        Message::SelectDevice { reply: Some(reply) } => {
            let _ = reply.send(closed());
            UpdateResult::none()
        }
        Message::Disconnect { done: Some(done) } | Message::Shutdown { done: Some(done) } => {
            UpdateResult::action(UpdateAction::Acknowledge(done))
        }
        Message::AttemptSucceeded { handle, .. } => UpdateResult::action(UpdateAction::Teardown(
            TeardownPlan::orphan(handle.device().clone()),
        )),
        Message::AttemptFailed {
            device,
            transport_opened: true,
            ..
        } => UpdateResult::action(UpdateAction::Teardown(TeardownPlan::orphan(device))),
        _ => UpdateResult::none(),
    }
}
