//! Ticket storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ticket::{NewTicket, ProcedureType, Ticket, TicketStatus};

/// Error type for ticket operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TicketError {
    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    NotFound(u64),

    /// Cannot perform operation due to current state.
    #[error("Cannot {operation} ticket {ticket_id}: current state is {current_state}")]
    InvalidState {
        ticket_id: u64,
        current_state: String,
        operation: String,
    },

    /// Sequence code already held by a waiting or calling ticket.
    #[error("Sequence code already in use: {0}")]
    DuplicateSequenceCode(String),

    /// Malformed input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Unexpected fault (including injected ones).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl TicketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TicketError::NotFound(_) => ErrorKind::NotFound,
            TicketError::InvalidState { .. } | TicketError::DuplicateSequenceCode(_) => {
                ErrorKind::Conflict
            }
            TicketError::Validation(_) => ErrorKind::Validation,
            TicketError::Database(_) | TicketError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_state(ticket: &Ticket, operation: &str) -> Self {
        TicketError::InvalidState {
            ticket_id: ticket.id,
            current_state: ticket.status.state_type().to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status.
    pub status: Option<TicketStatus>,
    /// Filter by procedure type.
    pub procedure: Option<ProcedureType>,
    /// Only tickets closed at or after this instant.
    pub closed_from: Option<DateTime<Utc>>,
    /// Only tickets closed at or before this instant.
    pub closed_to: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with no limit.
    pub fn new() -> Self {
        Self {
            limit: i64::MAX,
            ..Default::default()
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by procedure type.
    pub fn with_procedure(mut self, procedure: ProcedureType) -> Self {
        self.procedure = Some(procedure);
        self
    }

    /// Restrict to a closed-at range (both ends inclusive).
    pub fn with_closed_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.closed_from = from;
        self.closed_to = to;
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if `ticket` satisfies every condition (pagination aside).
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(status) = self.status {
            if ticket.status != status {
                return false;
            }
        }
        if let Some(ref procedure) = self.procedure {
            if &ticket.procedure != procedure {
                return false;
            }
        }
        if self.closed_from.is_some() || self.closed_to.is_some() {
            let Some(closed_at) = ticket.closed_at else {
                return false;
            };
            if self.closed_from.is_some_and(|from| closed_at < from) {
                return false;
            }
            if self.closed_to.is_some_and(|to| closed_at > to) {
                return false;
            }
        }
        true
    }
}

/// Trait for ticket storage backends.
///
/// Implementations must apply `commit` and `import` atomically: either every
/// row is written or none is. Finished tickets are immutable once stored.
pub trait TicketStore: Send + Sync {
    /// Store a new waiting ticket, assigning `id = max(id) + 1`.
    fn create(&self, ticket: NewTicket) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: u64) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, in ascending id order.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Replace the stored rows of the given tickets in one atomic write.
    fn commit(&self, tickets: &[Ticket]) -> Result<(), TicketError>;

    /// Insert fully-formed tickets (ids included) in one atomic write.
    fn import(&self, tickets: &[Ticket]) -> Result<(), TicketError>;
}

/// Check that `next` is a legal replacement for `stored`.
///
/// Shared by the store backends so both enforce the same rules.
pub(crate) fn check_replacement(stored: &Ticket, next: &Ticket) -> Result<(), TicketError> {
    if stored.is_finished() {
        return Err(TicketError::invalid_state(stored, "modify"));
    }
    if !stored.status.can_transition_to(next.status) {
        return Err(TicketError::invalid_state(
            stored,
            &format!("move to {}", next.status),
        ));
    }
    if next.is_finished() != next.closed_at.is_some() {
        return Err(TicketError::Internal(format!(
            "ticket {} has status {} but closed_at {:?}",
            next.id, next.status, next.closed_at
        )));
    }
    if stored.issued_at != next.issued_at || stored.sequence_code != next.sequence_code {
        return Err(TicketError::Internal(format!(
            "ticket {} immutable fields changed",
            next.id
        )));
    }
    Ok(())
}

/// Check a batch of fully-formed tickets before `import` writes it.
///
/// `stored_calling` is how many calling tickets the store already holds.
pub(crate) fn check_import(stored_calling: usize, batch: &[Ticket]) -> Result<(), TicketError> {
    for ticket in batch {
        if ticket.is_finished() != ticket.closed_at.is_some() {
            return Err(TicketError::Validation(format!(
                "ticket {} has status {} but closed_at {:?}",
                ticket.id, ticket.status, ticket.closed_at
            )));
        }
        if ticket.closed_at.is_some_and(|closed_at| closed_at < ticket.issued_at) {
            return Err(TicketError::Validation(format!(
                "ticket {} closed before it was issued",
                ticket.id
            )));
        }
    }

    let calling = stored_calling + batch.iter().filter(|t| t.is_calling()).count();
    if calling > 1 {
        return Err(TicketError::Validation(format!(
            "import would leave {} tickets calling",
            calling
        )));
    }
    Ok(())
}
