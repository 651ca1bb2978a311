//! Event arbitration: one decision per inbound lifecycle event.
//!
//! The host can deliver "work finished" (idle) and "work errored" within
//! milliseconds of each other, and both describe the same outcome. The
//! arbiter holds every idle notification for a short grace delay so a
//! trailing error can retract it, and suppresses whichever of the pair
//! arrives second inside the debounce window. Permission requests are
//! unambiguous and always pass through immediately.
//!
//! State is shared across concurrently in-flight `handle` calls: a new
//! event may arrive while a previous handler is suspended mid grace delay
//! or awaiting a title lookup. That sharing is what makes cancellation
//! work, so the debounce timestamps and the pending-idle token live behind
//! one mutex on the arbiter, never in per-call state. The lock is never
//! held across an await.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chime_protocol::{EventEnvelope, EventType, StatusKind};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::resolver::TitleResolver;

/// Span after an error (or an emitted idle notification) during which the
/// conflicting outcome is suppressed.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

/// How long an idle notification is held pending so a racing error can
/// cancel it before it is ever sent.
pub const IDLE_GRACE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Permission,
    Completion,
    DelegatedCompletion,
    Error,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Permission => "permission",
            Classification::Completion => "completion",
            Classification::DelegatedCompletion => "delegated_completion",
            Classification::Error => "error",
        }
    }
}

/// The immutable output of arbitration; `None` from [`Arbiter::handle`]
/// means the event was suppressed or carries no notification semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub classification: Classification,
    pub session_title: String,
}

#[derive(Default)]
struct DebounceState {
    last_error_at: Option<Instant>,
    last_idle_sent_at: Option<Instant>,
    // At most one pending idle delay is live; a newer idle replaces (and
    // cancels) the previous token.
    pending_idle: Option<CancellationToken>,
}

pub struct Arbiter {
    state: Mutex<DebounceState>,
    resolver: TitleResolver,
}

impl Arbiter {
    pub fn new(resolver: TitleResolver) -> Self {
        Self {
            state: Mutex::new(DebounceState::default()),
            resolver,
        }
    }

    /// Consume one event and decide whether to notify. Never panics and
    /// never returns an error: malformed or unknown events degrade to
    /// "no decision".
    pub async fn handle(&self, event: &EventEnvelope) -> Option<Decision> {
        let session_id = event.properties.session_id.as_deref();
        match event.event_type {
            EventType::PermissionAsked => {
                // Permission requests are not ambiguous with other
                // outcomes; no debounce applies.
                let record = self.resolver.resolve(session_id).await;
                tracing::debug!(session_id = ?session_id, "Permission request");
                Some(Decision {
                    classification: Classification::Permission,
                    session_title: record.title,
                })
            }
            EventType::SessionInfoUpdated => {
                if let Some(info) = event.properties.info.as_ref() {
                    self.resolver.record_info(info);
                }
                None
            }
            EventType::SessionStatus => {
                match event.properties.status.as_ref().map(|status| status.kind) {
                    Some(StatusKind::Idle) => self.handle_idle(session_id).await,
                    // Busy is informational only; it does not touch the
                    // debounce state. Unknown shapes are ignored.
                    _ => None,
                }
            }
            EventType::SessionError => self.handle_error(session_id).await,
            EventType::Other => None,
        }
    }

    async fn handle_idle(&self, session_id: Option<&str>) -> Option<Decision> {
        {
            let state = self.lock_state();
            if within(state.last_error_at, DEBOUNCE_WINDOW) {
                tracing::debug!(
                    session_id = ?session_id,
                    "Idle suppressed: an error was already reported in this window"
                );
                return None;
            }
        }

        let record = self.resolver.resolve(session_id).await;
        let classification = if record.parent_id.is_some() {
            Classification::DelegatedCompletion
        } else {
            Classification::Completion
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.lock_state().pending_idle.replace(token.clone()) {
            previous.cancel();
        }

        // Suspend-then-recheck: an error arriving within the grace delay
        // means the idle signal was itself an artifact of an abort.
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(session_id = ?session_id, "Pending idle notification cancelled");
                return None;
            }
            _ = sleep(IDLE_GRACE) => {}
        }

        let mut state = self.lock_state();
        if token.is_cancelled() {
            // Cancelled between the timer firing and this check; the
            // canceller already owns the pending slot.
            return None;
        }
        if within(state.last_error_at, DEBOUNCE_WINDOW) {
            state.pending_idle = None;
            tracing::debug!(
                session_id = ?session_id,
                "Idle suppressed after grace delay: an error landed while waiting"
            );
            return None;
        }
        state.pending_idle = None;
        state.last_idle_sent_at = Some(Instant::now());
        tracing::debug!(
            session_id = ?session_id,
            classification = classification.as_str(),
            "Idle notification committed"
        );
        Some(Decision {
            classification,
            session_title: record.title,
        })
    }

    async fn handle_error(&self, session_id: Option<&str>) -> Option<Decision> {
        {
            let mut state = self.lock_state();
            if let Some(pending) = state.pending_idle.take() {
                // Idle-then-immediately-error is one cancellation event,
                // not two separate outcomes.
                pending.cancel();
                tracing::debug!(
                    session_id = ?session_id,
                    "Error paired with pending idle: both suppressed"
                );
                return None;
            }
            if within(state.last_idle_sent_at, DEBOUNCE_WINDOW) {
                tracing::debug!(
                    session_id = ?session_id,
                    "Error suppressed: a completion was just reported"
                );
                return None;
            }
            state.last_error_at = Some(Instant::now());
        }

        let record = self.resolver.resolve(session_id).await;
        Some(Decision {
            classification: Classification::Error,
            session_title: record.title,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn within(timestamp: Option<Instant>, window: Duration) -> bool {
    timestamp.is_some_and(|at| at.elapsed() < window)
}
