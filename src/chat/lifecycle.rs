use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::core::session::ChatId;

/// Identifies one request. Tickets increase monotonically across all sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Awaiting,
}

struct InFlight {
    ticket: Ticket,
    cancel: CancellationToken,
}

/// Per-session request state: Idle, or Awaiting with a ticket and a cancellation handle.
///
/// At most one request per session is tracked. Beginning a new one cancels
/// the previous handle, which also makes the previous ticket stale.
#[derive(Default)]
pub struct RequestTracker {
    in_flight: HashMap<ChatId, InFlight>,
    next_ticket: u64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle → Awaiting. An outstanding request for the same session is cancelled first.
    pub fn begin(&mut self, id: &ChatId) -> (Ticket, CancellationToken) {
        if let Some(prev) = self.in_flight.remove(id) {
            prev.cancel.cancel();
            tracing::debug!(chat = %id, ticket = prev.ticket.0, "superseded outstanding request");
        }

        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        let cancel = CancellationToken::new();
        self.in_flight.insert(
            id.clone(),
            InFlight {
                ticket,
                cancel: cancel.clone(),
            },
        );
        (ticket, cancel)
    }

    /// Whether `ticket` is the session's outstanding request.
    pub fn is_current(&self, id: &ChatId, ticket: Ticket) -> bool {
        self.in_flight
            .get(id)
            .is_some_and(|f| f.ticket == ticket)
    }

    /// Awaiting → Idle for a completed request. Stale tickets are ignored.
    pub fn finish(&mut self, id: &ChatId, ticket: Ticket) -> bool {
        if !self.is_current(id, ticket) {
            return false;
        }
        self.in_flight.remove(id);
        true
    }

    /// Awaiting → Idle on user request; fires the cancellation handle.
    pub fn cancel(&mut self, id: &ChatId) -> bool {
        match self.in_flight.remove(id) {
            Some(f) => {
                f.cancel.cancel();
                tracing::debug!(chat = %id, ticket = f.ticket.0, "cancelled request");
                true
            }
            None => false,
        }
    }

    pub fn phase(&self, id: &ChatId) -> Phase {
        if self.in_flight.contains_key(id) {
            Phase::Awaiting
        } else {
            Phase::Idle
        }
    }

    pub fn is_awaiting(&self, id: &ChatId) -> bool {
        self.phase(id) == Phase::Awaiting
    }

    pub fn token(&self, id: &ChatId) -> Option<&CancellationToken> {
        self.in_flight.get(id).map(|f| &f.cancel)
    }

    /// Number of sessions with an outstanding request.
    pub fn awaiting_count(&self) -> usize {
        self.in_flight.len()
    }
}
