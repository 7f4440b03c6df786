//! Debounced dynamic-resolution negotiation.
//!
//! Local size changes arrive in bursts (a window drag fires dozens per
//! second); the negotiator waits for the burst to go quiet before
//! asking the remote session to relayout, and serializes commits so
//! two layout-change requests are never in flight at once.
//!
//! ```text
//!  Idle ──request──► Debouncing ──deadline──► Committing
//!   ▲                    │  ▲ request resets       │
//!   │                    │  └─ the timer           │
//!   └── reject/abort ◄───┴──── accept (queued? ────┘
//!                               back to Debouncing)
//! ```
//!
//! Time is passed in explicitly (`now: Instant`) so state transitions
//! can be driven synthetically in tests.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SyncError;
use crate::frame::Extent;

/// Debounce window applied to a burst of resize requests.
///
/// Policy constant: long enough that a continuous window drag does not
/// spam the remote session, short enough to feel responsive once the
/// drag stops.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

// ── State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Debouncing { target: Extent, deadline: Instant },
    Committing { target: Extent },
}

/// Observable phase of the negotiator, for logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePhase {
    Idle,
    Debouncing,
    Committing,
}

impl fmt::Display for ResizePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Debouncing => write!(f, "Debouncing"),
            Self::Committing => write!(f, "Committing"),
        }
    }
}

// ── ResizeNegotiator ─────────────────────────────────────────────

/// State machine deciding when a local size change is propagated to
/// the remote session.
///
/// The negotiator itself never touches buffers or the channel; it only
/// answers "commit now, to this extent?" — the session façade performs
/// the commit protocol around it.
pub struct ResizeNegotiator {
    state: State,
    /// Request that arrived while a commit was in flight.
    queued: Option<Extent>,
    debounce: Duration,
    /// Display-control capability negotiated for this session. Without
    /// it the negotiator is permanently idle.
    capable: bool,
}

impl ResizeNegotiator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: State::Idle,
            queued: None,
            debounce,
            capable: false,
        }
    }

    /// Record whether the session negotiated dynamic resize.
    ///
    /// Losing the capability (or never gaining it) drops any pending
    /// or queued work and freezes the machine in `Idle`.
    pub fn set_capability(&mut self, capable: bool) {
        self.capable = capable;
        if !capable {
            self.state = State::Idle;
            self.queued = None;
        }
    }

    pub fn is_capable(&self) -> bool {
        self.capable
    }

    pub fn phase(&self) -> ResizePhase {
        match self.state {
            State::Idle => ResizePhase::Idle,
            State::Debouncing { .. } => ResizePhase::Debouncing,
            State::Committing { .. } => ResizePhase::Committing,
        }
    }

    /// The size the machine is currently working towards, if any.
    pub fn pending_target(&self) -> Option<Extent> {
        match self.state {
            State::Idle => None,
            State::Debouncing { target, .. } | State::Committing { target } => Some(target),
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// A new local size request.
    ///
    /// Last-request-wins: while `Debouncing` the target is replaced and
    /// the timer restarted. While `Committing` the request is queued
    /// and re-enters `Debouncing` once the in-flight commit completes —
    /// overlapping commits are forbidden.
    pub fn request(&mut self, target: Extent, now: Instant) -> Result<(), SyncError> {
        if !self.capable {
            return Err(SyncError::CapabilityUnavailable);
        }
        match self.state {
            State::Idle | State::Debouncing { .. } => {
                self.state = State::Debouncing {
                    target,
                    deadline: now + self.debounce,
                };
            }
            State::Committing { .. } => {
                debug!(%target, "resize requested mid-commit, queueing");
                self.queued = Some(target);
            }
        }
        Ok(())
    }

    /// Advance the timer. Fires at most once per stable window: when
    /// the debounce deadline has passed, enters `Committing` and
    /// returns the target the caller must now propose to the remote.
    pub fn tick(&mut self, now: Instant) -> Option<Extent> {
        if let State::Debouncing { target, deadline } = self.state
            && now >= deadline
        {
            debug!(%target, "debounce elapsed, committing resize");
            self.state = State::Committing { target };
            return Some(target);
        }
        None
    }

    /// The remote acknowledged the in-flight layout change.
    ///
    /// Returns the committed extent. A request queued during the commit
    /// re-enters `Debouncing` with a fresh timer.
    pub fn commit_accepted(&mut self, now: Instant) -> Result<Extent, SyncError> {
        let State::Committing { target } = self.state else {
            return Err(SyncError::InvalidState("commit_accepted outside Committing"));
        };
        self.finish_commit(now);
        Ok(target)
    }

    /// The remote rejected the in-flight layout change (or it timed
    /// out). Local geometry stays untouched; a queued request still
    /// gets its own debounced attempt.
    pub fn commit_rejected(&mut self, now: Instant) -> Result<(), SyncError> {
        if !matches!(self.state, State::Committing { .. }) {
            return Err(SyncError::InvalidState("commit_rejected outside Committing"));
        }
        debug!("resize commit rejected by remote");
        self.finish_commit(now);
        Ok(())
    }

    /// Teardown (disconnect). Abandons any in-flight commit without
    /// applying a partial geometry change; valid in every state.
    pub fn abort(&mut self) {
        if !matches!(self.state, State::Idle) {
            debug!(phase = %self.phase(), "resize negotiation aborted");
        }
        self.state = State::Idle;
        self.queued = None;
    }

    fn finish_commit(&mut self, now: Instant) {
        self.state = match self.queued.take() {
            Some(target) => State::Debouncing {
                target,
                deadline: now + self.debounce,
            },
            None => State::Idle,
        };
    }
}

// ── Tests ────────────────────────────────────────────────────────
