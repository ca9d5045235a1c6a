//! Lifecycle of a single study session, from the start button to either a
//! logged or a discarded session.
//!
//! The lifecycle never talks to the backend itself. Actions that need the
//! backend return a [`SessionRequest`]; whoever executes it feeds the
//! matching [`SessionReply`] back through [`SessionLifecycle::apply`]. Every
//! request carries a [`Ticket`] and a reply is only applied while the phase
//! that issued it is still waiting on that ticket.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::api::{ApiError, SessionId, StopOutcome, StudyApi};
use crate::level::Level;
use crate::util::elapsed_minutes;

/// Tag attached to an in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStart {
    pub ticket: Ticket,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    ChoosingLevel {
        pending: Option<PendingStart>,
    },
    Running {
        session_id: SessionId,
        level: Level,
        started_at: Instant,
        started_wall: DateTime<Local>,
        stopping: Option<Ticket>,
    },
    Confirming {
        session_id: SessionId,
        level: Level,
        duration_minutes: u32,
        discarding: Option<Ticket>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Idle,
    ChoosingLevel,
    Running,
    Confirming,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Idle => "idle",
            PhaseKind::ChoosingLevel => "choosing level",
            PhaseKind::Running => "running",
            PhaseKind::Confirming => "confirming",
        };
        f.write_str(name)
    }
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::ChoosingLevel { .. } => PhaseKind::ChoosingLevel,
            Phase::Running { .. } => PhaseKind::Running,
            Phase::Confirming { .. } => PhaseKind::Confirming,
        }
    }
}

/// Flat view of the lifecycle, mostly for display and assertions
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSessionState {
    pub phase: PhaseKind,
    pub session_id: Option<SessionId>,
    pub duration_minutes: Option<u32>,
    pub chosen_level: Option<Level>,
}

/// User-facing controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    ChooseLevel(Level),
    Cancel,
    Stop,
    Confirm,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    Start { ticket: Ticket, level: Level },
    Stop { ticket: Ticket, session_id: SessionId },
    Discard { ticket: Ticket, session_id: SessionId },
}

impl SessionRequest {
    pub fn ticket(&self) -> Ticket {
        match self {
            SessionRequest::Start { ticket, .. }
            | SessionRequest::Stop { ticket, .. }
            | SessionRequest::Discard { ticket, .. } => *ticket,
        }
    }

    /// Run the request against the backend. Blocks until it answers.
    pub fn execute(self, api: &dyn StudyApi) -> SessionReply {
        match self {
            SessionRequest::Start { ticket, level } => SessionReply::Started {
                ticket,
                result: api.start_session(level),
            },
            SessionRequest::Stop { ticket, session_id } => SessionReply::Stopped {
                ticket,
                result: api.stop_session(&session_id),
            },
            SessionRequest::Discard { ticket, session_id } => SessionReply::Discarded {
                ticket,
                result: api.discard_session(&session_id),
            },
        }
    }
}

#[derive(Debug)]
pub enum SessionReply {
    Started {
        ticket: Ticket,
        result: Result<SessionId, ApiError>,
    },
    Stopped {
        ticket: Ticket,
        result: Result<StopOutcome, ApiError>,
    },
    Discarded {
        ticket: Ticket,
        result: Result<(), ApiError>,
    },
}

/// What applying a reply did to the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Advanced,
    Failed,
    Stale,
}

/// Returned by a confirmed session; the stats projection should refetch.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats;

#[derive(Debug)]
pub struct SessionLifecycle {
    phase: Phase,
    error: Option<String>,
    next_ticket: u64,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            error: None,
            next_ticket: 1,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// Message from the last failed request, cleared by the next accepted action
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match &self.phase {
            Phase::Running { session_id, .. } | Phase::Confirming { session_id, .. } => {
                Some(session_id)
            }
            _ => None,
        }
    }

    pub fn state(&self) -> ClientSessionState {
        let (duration_minutes, chosen_level) = match &self.phase {
            Phase::Idle => (None, None),
            Phase::ChoosingLevel { pending } => (None, pending.map(|p| p.level)),
            Phase::Running { level, .. } => (None, Some(*level)),
            Phase::Confirming {
                level,
                duration_minutes,
                ..
            } => (Some(*duration_minutes), Some(*level)),
        };

        ClientSessionState {
            phase: self.kind(),
            session_id: self.session_id().cloned(),
            duration_minutes,
            chosen_level,
        }
    }

    /// True while a start, stop or discard is waiting on the backend
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            Phase::ChoosingLevel { pending: Some(_) }
                | Phase::Running {
                    stopping: Some(_),
                    ..
                }
                | Phase::Confirming {
                    discarding: Some(_),
                    ..
                }
        )
    }

    /// Time since the backend accepted the session
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match &self.phase {
            Phase::Running { started_at, .. } => Some(now.saturating_duration_since(*started_at)),
            _ => None,
        }
    }

    pub fn controls(&self) -> Vec<Control> {
        match &self.phase {
            Phase::Idle => vec![Control::Start],
            Phase::ChoosingLevel { pending: None } => {
                let mut controls: Vec<Control> =
                    Level::ALL.into_iter().map(Control::ChooseLevel).collect();
                controls.push(Control::Cancel);
                controls
            }
            Phase::ChoosingLevel { pending: Some(_) } => vec![Control::Cancel],
            Phase::Running { stopping: None, .. } => vec![Control::Stop],
            Phase::Confirming {
                discarding: None, ..
            } => vec![Control::Confirm, Control::Discard],
            Phase::Running { .. } | Phase::Confirming { .. } => Vec::new(),
        }
    }

    pub fn is_actionable(&self, control: Control) -> bool {
        self.controls().contains(&control)
    }

    fn issue(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase.kind(), to = %phase.kind(), "session phase change");
        self.phase = phase;
    }

    pub fn request_start(&mut self) -> bool {
        if !self.is_actionable(Control::Start) {
            return false;
        }
        self.error = None;
        self.enter(Phase::ChoosingLevel { pending: None });
        true
    }

    /// Back out of level selection. A start still in flight is abandoned.
    pub fn cancel(&mut self) -> bool {
        if !self.is_actionable(Control::Cancel) {
            return false;
        }
        if let Phase::ChoosingLevel {
            pending: Some(pending),
        } = &self.phase
        {
            info!(ticket = ?pending.ticket, "abandoning in-flight session start");
        }
        self.error = None;
        self.enter(Phase::Idle);
        true
    }

    pub fn choose_level(&mut self, level: Level) -> Option<SessionRequest> {
        if !self.is_actionable(Control::ChooseLevel(level)) {
            return None;
        }
        let ticket = self.issue();
        self.error = None;
        self.phase = Phase::ChoosingLevel {
            pending: Some(PendingStart { ticket, level }),
        };
        Some(SessionRequest::Start { ticket, level })
    }

    /// Stop the running session. After a failure this retries the same session.
    pub fn request_stop(&mut self) -> Option<SessionRequest> {
        if !self.is_actionable(Control::Stop) {
            return None;
        }
        let ticket = self.issue();
        self.error = None;
        match &mut self.phase {
            Phase::Running {
                session_id,
                stopping,
                ..
            } => {
                *stopping = Some(ticket);
                Some(SessionRequest::Stop {
                    ticket,
                    session_id: session_id.clone(),
                })
            }
            _ => None,
        }
    }

    /// Keep the session. The stop call already persisted it, so nothing is sent.
    pub fn confirm(&mut self) -> Option<RefreshStats> {
        if !self.is_actionable(Control::Confirm) {
            return None;
        }
        if let Phase::Confirming {
            session_id,
            duration_minutes,
            ..
        } = &self.phase
        {
            info!(session = %session_id, duration_minutes, "session logged");
        }
        self.error = None;
        self.enter(Phase::Idle);
        Some(RefreshStats)
    }

    pub fn discard(&mut self) -> Option<SessionRequest> {
        if !self.is_actionable(Control::Discard) {
            return None;
        }
        let ticket = self.issue();
        self.error = None;
        match &mut self.phase {
            Phase::Confirming {
                session_id,
                discarding,
                ..
            } => {
                *discarding = Some(ticket);
                Some(SessionRequest::Discard {
                    ticket,
                    session_id: session_id.clone(),
                })
            }
            _ => None,
        }
    }

    /// Feed a backend reply in. Replies whose ticket the current phase is not
    /// waiting on are ignored.
    pub fn apply(&mut self, reply: SessionReply, now: Instant) -> Applied {
        match reply {
            SessionReply::Started { ticket, result } => self.apply_started(ticket, result, now),
            SessionReply::Stopped { ticket, result } => self.apply_stopped(ticket, result, now),
            SessionReply::Discarded { ticket, result } => self.apply_discarded(ticket, result),
        }
    }

    fn apply_started(
        &mut self,
        ticket: Ticket,
        result: Result<SessionId, ApiError>,
        now: Instant,
    ) -> Applied {
        let level = match &self.phase {
            Phase::ChoosingLevel {
                pending: Some(pending),
            } if pending.ticket == ticket => pending.level,
            _ => {
                match &result {
                    Ok(session_id) => warn!(
                        session = %session_id,
                        ?ticket,
                        "ignoring stale start reply; session stays open on the backend"
                    ),
                    Err(err) => debug!(?ticket, error = %err, "ignoring stale start failure"),
                }
                return Applied::Stale;
            }
        };

        match result {
            Ok(session_id) => {
                info!(session = %session_id, %level, "session started");
                self.error = None;
                self.enter(Phase::Running {
                    session_id,
                    level,
                    started_at: now,
                    started_wall: Local::now(),
                    stopping: None,
                });
                Applied::Advanced
            }
            Err(err) => {
                warn!(error = %err, %level, "session start failed");
                self.error = Some(err.to_string());
                self.phase = Phase::ChoosingLevel { pending: None };
                Applied::Failed
            }
        }
    }

    fn apply_stopped(
        &mut self,
        ticket: Ticket,
        result: Result<StopOutcome, ApiError>,
        now: Instant,
    ) -> Applied {
        let (session_id, level, started_at) = match &self.phase {
            Phase::Running {
                session_id,
                level,
                started_at,
                stopping: Some(pending),
                ..
            } if *pending == ticket => (session_id.clone(), *level, *started_at),
            _ => {
                debug!(?ticket, "ignoring stale stop reply");
                return Applied::Stale;
            }
        };

        match result {
            Ok(outcome) => {
                let duration_minutes = match outcome {
                    StopOutcome::Stopped { duration_minutes } => duration_minutes,
                    StopOutcome::AlreadyStopped => {
                        elapsed_minutes(now.saturating_duration_since(started_at))
                    }
                };
                info!(session = %session_id, duration_minutes, "session stopped");
                self.error = None;
                self.enter(Phase::Confirming {
                    session_id,
                    level,
                    duration_minutes,
                    discarding: None,
                });
                Applied::Advanced
            }
            Err(err) => {
                warn!(session = %session_id, error = %err, "session stop failed");
                self.error = Some(err.to_string());
                if let Phase::Running { stopping, .. } = &mut self.phase {
                    *stopping = None;
                }
                Applied::Failed
            }
        }
    }

    fn apply_discarded(&mut self, ticket: Ticket, result: Result<(), ApiError>) -> Applied {
        let session_id = match &self.phase {
            Phase::Confirming {
                session_id,
                discarding: Some(pending),
                ..
            } if *pending == ticket => session_id.clone(),
            _ => {
                debug!(?ticket, "ignoring stale discard reply");
                return Applied::Stale;
            }
        };

        match result {
            Ok(()) => {
                info!(session = %session_id, "session discarded");
                self.error = None;
                self.enter(Phase::Idle);
                Applied::Advanced
            }
            Err(err) => {
                warn!(session = %session_id, error = %err, "session discard failed");
                self.error = Some(err.to_string());
                if let Phase::Confirming { discarding, .. } = &mut self.phase {
                    *discarding = None;
                }
                Applied::Failed
            }
        }
    }
}
