//! Caps Lock state detector
//!
//! Owns the tap and the last observed state. Waits for Accessibility trust
//! by polling, attaches the tap once granted, and turns the tap's candidate
//! states into change notifications.
//!
//! Every method runs on the presentation loop. The tap thread never touches
//! this struct; it only sends [`TapMessage`]s.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::keys::{CapsState, ChangeGate};
use super::permission::Permission;
use super::tap::{TapBackend, TapMessage, TapSender, TapSignal};

/// Lifecycle of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Not attached and not waiting for anything
    Stopped,
    /// Permission missing; re-checked at `next_poll`
    AwaitingPermission { next_poll: Instant },
    /// Tap is live under the given session
    Attached { session: u64 },
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Stopped => write!(f, "Stopped"),
            DetectorState::AwaitingPermission { .. } => write!(f, "AwaitingPermission"),
            DetectorState::Attached { session } => write!(f, "Attached({})", session),
        }
    }
}

pub struct CapsLockDetector<P, T> {
    permission: P,
    backend: T,
    poll_interval: Duration,
    /// The consent prompt is shown at most once per process
    prompted: bool,
    /// Bumped on every attach so late messages from an old tap are dropped
    session: u64,
    state: DetectorState,
    gate: ChangeGate,
    tap_tx: mpsc::UnboundedSender<TapMessage>,
}

impl<P: Permission, T: TapBackend> CapsLockDetector<P, T> {
    pub fn new(
        permission: P,
        backend: T,
        poll_interval: Duration,
        tap_tx: mpsc::UnboundedSender<TapMessage>,
    ) -> Self {
        Self {
            permission,
            backend,
            poll_interval,
            prompted: false,
            session: 0,
            state: DetectorState::Stopped,
            gate: ChangeGate::new(),
            tap_tx,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn last_observed(&self) -> Option<CapsState> {
        self.gate.last()
    }

    /// Attach the tap if permitted, otherwise prompt once and start polling.
    /// Does nothing while already attached or polling.
    pub fn start(&mut self, now: Instant) {
        if self.state != DetectorState::Stopped {
            debug!(state = %self.state, "detector already started");
            return;
        }

        if self.permission.is_granted() {
            self.attach();
            return;
        }

        if !self.prompted {
            self.prompted = true;
            info!("Accessibility permission missing, prompting");
            self.permission.request_with_prompt();
        }

        info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            "waiting for Accessibility permission"
        );
        self.state = DetectorState::AwaitingPermission {
            next_poll: now + self.poll_interval,
        };
    }

    /// Detach the tap and stop polling. Safe to call repeatedly.
    pub fn stop(&mut self) {
        match self.state {
            DetectorState::Attached { session } => {
                self.backend.detach();
                info!(session, "detector stopped");
            }
            DetectorState::AwaitingPermission { .. } => {
                debug!("permission polling cancelled");
            }
            DetectorState::Stopped => {}
        }
        self.state = DetectorState::Stopped;
    }

    /// When the permission poll wants to run next, if it is active
    pub fn next_poll(&self) -> Option<Instant> {
        match self.state {
            DetectorState::AwaitingPermission { next_poll } => Some(next_poll),
            _ => None,
        }
    }

    /// Re-check permission. Attaches on success, which ends polling for good.
    pub fn poll_permission(&mut self, now: Instant) {
        let DetectorState::AwaitingPermission { next_poll } = self.state else {
            return;
        };
        if now < next_poll {
            return;
        }

        if self.permission.is_granted() {
            info!("Accessibility permission granted");
            self.attach();
        } else {
            trace!("Accessibility permission still missing");
            self.state = DetectorState::AwaitingPermission {
                next_poll: now + self.poll_interval,
            };
        }
    }

    /// Apply a message from the tap thread. Returns the new state when it is
    /// a confirmed change.
    pub fn handle_message(&mut self, msg: TapMessage) -> Option<CapsState> {
        match self.state {
            DetectorState::Attached { session } if session == msg.session => {}
            _ => {
                debug!(session = msg.session, state = %self.state, "dropping message from inactive tap");
                return None;
            }
        }

        match msg.signal {
            TapSignal::Attached { initial } => {
                debug!(%initial, "initial caps lock state");
                self.gate.prime(initial);
                None
            }
            TapSignal::Candidate(candidate) => {
                let change = self.gate.observe(candidate);
                match change {
                    Some(state) => info!(caps = %state, "caps lock changed"),
                    None => trace!(caps = %candidate, "duplicate caps lock report dropped"),
                }
                change
            }
            TapSignal::Reenabled(reason) => {
                warn!(?reason, "event tap disabled by the OS, re-enabled");
                None
            }
        }
    }

    fn attach(&mut self) {
        self.session += 1;
        let sender = TapSender::new(self.session, self.tap_tx.clone());

        match self.backend.attach(sender) {
            Ok(()) => {
                info!(session = self.session, "caps lock detector attached");
                self.state = DetectorState::Attached {
                    session: self.session,
                };
            }
            Err(e) => {
                warn!(error = %e, "failed to attach event tap, detector inert");
                self.state = DetectorState::Stopped;
            }
        }
    }
}
