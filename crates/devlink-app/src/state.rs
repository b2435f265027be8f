//! Controller state: the single session slot and its bookkeeping

use std::collections::BTreeMap;

use chrono::Local;
use devlink_core::prelude::*;
use devlink_core::{DeviceId, ErrorInfo, ProductInfo, SessionSnapshot, SessionStatus};
use devlink_device::SessionHandle;

use crate::config::SessionSettings;
use crate::message::{AttemptId, ConnectReply, RequestId, SessionToken};

/// An in-flight connection attempt
#[derive(Debug)]
pub struct PendingAttempt {
    pub id: AttemptId,
    pub device: DeviceId,
    /// Callers waiting on this attempt's outcome
    pub replies: Vec<ConnectReply>,
}

/// A committed session, from authentication success until teardown
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub handle: SessionHandle,
    /// Promotion to Ready happened
    pub promoted: bool,
    pub reverse_socket_opened: bool,
    pub product_info: Option<ProductInfo>,
    pub binaries: BTreeMap<String, bool>,
}

impl Session {
    pub fn device(&self) -> &DeviceId {
        self.handle.device()
    }
}

/// Complete controller state, mutated only by `handler::update`
#[derive(Debug)]
pub struct ControllerState {
    pub status: SessionStatus,
    pub session: Option<Session>,
    pub pending: Option<PendingAttempt>,

    /// The open user selection prompt
    pub selection: Option<RequestId>,
    /// Callers waiting for the selection prompt to produce a connection
    pub selection_replies: Vec<ConnectReply>,

    /// The auto-connect enumeration in flight
    pub enumeration: Option<RequestId>,

    pub last_error: Option<ErrorInfo>,
    pub last_reading: Option<f64>,

    pub settings: SessionSettings,

    /// Set once shutdown has been processed
    pub quitting: bool,

    /// Bumped whenever something visible in the snapshot changes
    revision: u64,
    next_attempt: AttemptId,
    next_token: SessionToken,
    next_request: RequestId,
}

impl ControllerState {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            status: SessionStatus::Disconnected,
            session: None,
            pending: None,
            selection: None,
            selection_replies: Vec::new(),
            enumeration: None,
            last_error: None,
            last_reading: None,
            settings,
            quitting: false,
            revision: 0,
            next_attempt: 1,
            next_token: 1,
            next_request: 1,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark the published view as changed
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// Illegal moves are refused and logged; a move to the current status
    /// is a no-op.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if self.status == next {
            return true;
        }
        if !self.status.can_transition_to(next) {
            warn!("Refusing status change {} -> {}", self.status, next);
            return false;
        }
        info!("Session status: {} -> {}", self.status, next);
        self.status = next;
        self.touch();
        true
    }

    pub fn allocate_attempt(&mut self) -> AttemptId {
        let id = self.next_attempt;
        self.next_attempt += 1;
        id
    }

    pub fn allocate_token(&mut self) -> SessionToken {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    pub fn allocate_request(&mut self) -> RequestId {
        let request = self.next_request;
        self.next_request += 1;
        request
    }

    pub fn is_selecting(&self) -> bool {
        self.selection.is_some()
    }

    pub fn is_current_attempt(&self, attempt: AttemptId) -> bool {
        self.pending.as_ref().is_some_and(|p| p.id == attempt)
    }

    /// The committed session, if `token` names it
    pub fn session_for(&mut self, token: SessionToken) -> Option<&mut Session> {
        self.session.as_mut().filter(|s| s.token == token)
    }

    /// Whether the pending attempt or the live session uses `device`
    pub fn device_in_use(&self, device: &DeviceId) -> bool {
        self.pending.as_ref().is_some_and(|p| &p.device == device)
            || self.session.as_ref().is_some_and(|s| s.device() == device)
    }

    /// Nothing is held and nothing is in flight
    pub fn is_idle(&self) -> bool {
        self.session.is_none() && self.pending.is_none() && !self.is_selecting()
    }

    /// Build the read-only view published to collaborators
    pub fn snapshot(&self) -> SessionSnapshot {
        let device = self
            .session
            .as_ref()
            .map(|s| s.device().clone())
            .or_else(|| self.pending.as_ref().map(|p| p.device.clone()));

        SessionSnapshot {
            status: self.status,
            device,
            product_info: self.session.as_ref().and_then(|s| s.product_info.clone()),
            last_reading: self.last_reading,
            reverse_socket_opened: self
                .session
                .as_ref()
                .is_some_and(|s| s.reverse_socket_opened),
            binaries: self
                .session
                .as_ref()
                .map(|s| s.binaries.clone())
                .unwrap_or_default(),
            error: self.last_error.clone(),
            updated_at: Local::now(),
        }
    }

    /// Reset the published view to its initial state
    pub fn reset_context(&mut self) {
        self.last_error = None;
        self.last_reading = None;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_device::TransportStream;

    fn state() -> ControllerState {
        ControllerState::new(SessionSettings::default())
    }

    #[test]
    fn test_transition_refuses_skips() {
        let mut state = state();
        assert!(!state.transition(SessionStatus::Ready));
        assert_eq!(state.status, SessionStatus::Disconnected);

        assert!(state.transition(SessionStatus::Connecting));
        assert!(state.transition(SessionStatus::Connecting));
        assert_eq!(state.revision(), 1);
    }

    #[test]
    fn test_allocations_are_monotonic() {
        let mut state = state();
        let a = state.allocate_attempt();
        let b = state.allocate_attempt();
        assert!(b > a);
        assert_ne!(state.allocate_token(), state.allocate_token());
        assert_ne!(state.allocate_request(), state.allocate_request());
    }

    #[test]
    fn test_snapshot_reflects_session() {
        let mut state = state();
        let handle = SessionHandle::from_stream(TransportStream::new(DeviceId::new("0123")));
        state.session = Some(Session {
            token: 1,
            handle,
            promoted: true,
            reverse_socket_opened: true,
            product_info: None,
            binaries: BTreeMap::from([("opkg".to_string(), true)]),
        });
        state.status = SessionStatus::Ready;

        let snapshot = state.snapshot();
        assert!(snapshot.is_ready());
        assert_eq!(snapshot.device, Some(DeviceId::new("0123")));
        assert!(snapshot.reverse_socket_opened);
        assert!(snapshot.has_all_binaries());
        assert!(state.device_in_use(&DeviceId::new("0123")));
        assert!(!state.is_idle());
    }

    #[test]
    fn test_session_for_checks_token() {
        let mut state = state();
        let handle = SessionHandle::from_stream(TransportStream::new(DeviceId::new("0123")));
        state.session = Some(Session {
            token: 7,
            handle,
            promoted: false,
            reverse_socket_opened: false,
            product_info: None,
            binaries: BTreeMap::new(),
        });

        assert!(state.session_for(7).is_some());
        assert!(state.session_for(6).is_none());
    }
}
