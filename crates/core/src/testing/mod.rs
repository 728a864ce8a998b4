//! Testing utilities: a controllable clock, scripted faults and ticket fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use codenews_core::testing::{ManualClock, ScriptedFaults};
//!
//! let clock = Arc::new(ManualClock::new(start));
//! let faults = Arc::new(ScriptedFaults::new());
//! let queue = TicketQueue::new(store).with_clock(clock.clone()).with_faults(faults.clone());
//!
//! faults.fail_next(QueueOperation::CallNext, 1);
//! assert!(queue.call_next().is_err());
//! ```

mod manual_clock;
mod scripted_faults;

pub use manual_clock::ManualClock;
pub use scripted_faults::ScriptedFaults;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::ticket::{PriorityClass, ProcedureType, Ticket, TicketStatus};

    /// 2024-10-28 08:00 UTC, the morning the demo data describes.
    pub fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 28, 8, 0, 0)
            .single()
            .expect("fixed fixture date is valid")
    }

    /// A waiting ticket with reasonable defaults.
    pub fn waiting_ticket(id: u64, code: &str, priority: PriorityClass) -> Ticket {
        Ticket {
            id,
            sequence_code: code.to_string(),
            issued_at: morning(),
            closed_at: None,
            priority,
            procedure: ProcedureType::Reception,
            status: TicketStatus::Waiting,
        }
    }

    /// A finished ticket closed `minutes` after issuance.
    pub fn finished_ticket(id: u64, code: &str, procedure: ProcedureType, minutes: i64) -> Ticket {
        let issued_at = morning();
        Ticket {
            id,
            sequence_code: code.to_string(),
            issued_at,
            closed_at: Some(issued_at + chrono::Duration::minutes(minutes)),
            priority: PriorityClass::Normal,
            procedure,
            status: TicketStatus::Finished,
        }
    }
}
