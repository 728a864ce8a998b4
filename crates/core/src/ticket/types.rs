//! Core ticket data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Priority
// ============================================================================

/// Urgency tier governing call order.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `Normal < Preferential < Urgent`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    #[default]
    Normal,
    #[serde(alias = "priority", alias = "prioritario", alias = "preferencial")]
    Preferential,
    Urgent,
}

impl PriorityClass {
    /// Returns the priority as a label (for logs and metrics).
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::Normal => "normal",
            PriorityClass::Preferential => "preferential",
            PriorityClass::Urgent => "urgent",
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Procedure type
// ============================================================================

/// Category of clinical step a ticket is issued for.
///
/// This is an open set: labels outside the known variants are preserved
/// as [`ProcedureType::Other`], normalized to trimmed lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcedureType {
    Reception,
    Triage,
    Care,
    Other(String),
}

impl ProcedureType {
    /// Parse a label, accepting the Portuguese names used by the front desk.
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "reception" | "acolhimento" => ProcedureType::Reception,
            "triage" | "triagem" => ProcedureType::Triage,
            "care" | "atendimento" => ProcedureType::Care,
            _ => ProcedureType::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProcedureType::Reception => "reception",
            ProcedureType::Triage => "triage",
            ProcedureType::Care => "care",
            ProcedureType::Other(label) => label,
        }
    }

    /// True for an `Other` label that normalized to nothing.
    pub fn is_blank(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<String> for ProcedureType {
    fn from(label: String) -> Self {
        ProcedureType::parse(&label)
    }
}

impl From<&str> for ProcedureType {
    fn from(label: &str) -> Self {
        ProcedureType::parse(label)
    }
}

impl From<ProcedureType> for String {
    fn from(procedure: ProcedureType) -> Self {
        procedure.as_str().to_string()
    }
}

impl fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Status
// ============================================================================

/// Current status of a ticket.
///
/// State machine flow:
/// ```text
/// Waiting -> Calling -> Finished
///    |                     ^
///    +---------------------+   (direct finalize)
/// ```
///
/// Transitions are monotonic: a ticket never returns to an earlier status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[serde(alias = "aguardando")]
    Waiting,
    #[serde(alias = "chamando")]
    Calling,
    #[serde(alias = "finalizado")]
    Finished,
}

impl TicketStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Finished)
    }

    /// Returns true if the ticket still occupies its sequence code.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving to `next` keeps the status monotonic.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        next >= *self
    }

    /// Returns the status as a string (for filtering and storage).
    pub fn state_type(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Calling => "calling",
            TicketStatus::Finished => "finished",
        }
    }

    /// Parse a stored status string.
    pub fn from_state_type(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(TicketStatus::Waiting),
            "calling" => Some(TicketStatus::Calling),
            "finished" => Some(TicketStatus::Finished),
            _ => None,
        }
    }

    pub fn all() -> [TicketStatus; 3] {
        [
            TicketStatus::Waiting,
            TicketStatus::Calling,
            TicketStatus::Finished,
        ]
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_type())
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A queue position entitling a patient to be called for a procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    /// Unique identifier, assigned at issuance.
    pub id: u64,

    /// Human-readable code shown on the panel (e.g. "A001").
    pub sequence_code: String,

    /// When the ticket was issued.
    pub issued_at: DateTime<Utc>,

    /// When the ticket was finished. Set exactly once.
    pub closed_at: Option<DateTime<Utc>>,

    pub priority: PriorityClass,

    pub procedure: ProcedureType,

    pub status: TicketStatus,
}

impl Ticket {
    pub fn is_waiting(&self) -> bool {
        self.status == TicketStatus::Waiting
    }

    pub fn is_calling(&self) -> bool {
        self.status == TicketStatus::Calling
    }

    pub fn is_finished(&self) -> bool {
        self.status == TicketStatus::Finished
    }

    /// Copy of this ticket moved to `Calling`.
    pub fn into_calling(self) -> Self {
        Self {
            status: TicketStatus::Calling,
            ..self
        }
    }

    /// Copy of this ticket moved to `Finished`, closed at `closed_at`.
    pub fn into_finished(self, closed_at: DateTime<Utc>) -> Self {
        Self {
            status: TicketStatus::Finished,
            closed_at: Some(closed_at),
            ..self
        }
    }
}

/// Data for a ticket about to be stored. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub sequence_code: String,
    pub issued_at: DateTime<Utc>,
    pub priority: PriorityClass,
    pub procedure: ProcedureType,
}

/// Why a ticket reached `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Closed because the next ticket was called.
    Superseded,
    /// Closed by an explicit finalize.
    Finalized,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Superseded => "superseded",
            FinishReason::Finalized => "finalized",
        }
    }
}
