//! Probe handlers: readings, promotion to Ready and post-ready results

use std::collections::BTreeMap;

use devlink_core::prelude::*;
use devlink_core::{ProductInfo, SessionStatus};
use devlink_device::props::is_live_reading;

use crate::message::SessionToken;
use crate::state::ControllerState;

use super::{UpdateAction, UpdateResult};

/// Handle one probe tick.
///
/// Every reading of the live session is published and passed to observers.
/// The first live reading promotes the session to Ready and schedules the
/// post-ready setup; later readings only report.
pub fn handle_probe_reading(
    state: &mut ControllerState,
    token: SessionToken,
    reading: Option<f64>,
) -> UpdateResult {
    if state.session_for(token).is_none() {
        trace!("Dropping reading from retired session {}", token);
        return UpdateResult::none();
    }

    trace!("Probe reading for session {}: {:?}", token, reading);
    state.last_reading = reading;
    state.touch();

    let mut actions = vec![UpdateAction::NotifyReading(reading)];

    let promote = state
        .session_for(token)
        .is_some_and(|session| !session.promoted)
        && is_live_reading(reading);
    if !promote {
        return UpdateResult::actions(actions);
    }

    if !state.transition(SessionStatus::Ready) {
        return UpdateResult::actions(actions);
    }
    if let Some(session) = state.session_for(token) {
        session.promoted = true;
        info!("Device {} is ready", session.device());
        actions.push(UpdateAction::PostReadySetup {
            token,
            handle: session.handle.clone(),
        });
    }

    UpdateResult::actions(actions)
}

pub fn handle_post_ready_completed(
    state: &mut ControllerState,
    token: SessionToken,
    reverse_socket_opened: bool,
    product_info: Option<ProductInfo>,
) -> UpdateResult {
    let names = state.settings.required_binaries.clone();
    let Some(session) = state.session_for(token) else {
        debug!("Post-ready result for retired session {}", token);
        return UpdateResult::none();
    };

    if reverse_socket_opened && !session.reverse_socket_opened {
        session.reverse_socket_opened = true;
    }
    if product_info.is_some() {
        session.product_info = product_info;
    }
    let handle = session.handle.clone();
    state.touch();

    let mut actions = vec![UpdateAction::RunReadyHooks];
    if !names.is_empty() {
        actions.push(UpdateAction::CheckBinaries {
            token,
            handle,
            names,
        });
    }
    UpdateResult::actions(actions)
}

pub fn handle_binaries_checked(
    state: &mut ControllerState,
    token: SessionToken,
    binaries: BTreeMap<String, bool>,
) -> UpdateResult {
    if let Some(session) = state.session_for(token) {
        debug!("Binaries on {}: {:?}", session.device(), binaries);
        session.binaries = binaries;
        state.touch();
    }
    UpdateResult::none()
}
