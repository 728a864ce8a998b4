//! Sample queue for demos: one ticket being called, three waiting, two done.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::info;

use crate::ticket::{PriorityClass, ProcedureType, Ticket, TicketError, TicketStatus, TicketStore};

const DEMO_DAY: (i32, u32, u32) = (2024, 10, 28);

fn at(hour: u32, minute: u32) -> Result<DateTime<Utc>, TicketError> {
    let (year, month, day) = DEMO_DAY;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| TicketError::Internal(format!("invalid demo time {}:{}", hour, minute)))
}

fn ticket(
    id: u64,
    code: &str,
    status: TicketStatus,
    priority: PriorityClass,
    procedure: ProcedureType,
    issued_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
) -> Ticket {
    Ticket {
        id,
        sequence_code: code.to_string(),
        issued_at,
        closed_at,
        priority,
        procedure,
        status,
    }
}

/// The demo tickets, all dated 2024-10-28.
pub fn demo_tickets() -> Result<Vec<Ticket>, TicketError> {
    use PriorityClass::{Normal, Preferential, Urgent};
    use ProcedureType::{Care, Reception, Triage};
    use TicketStatus::{Calling, Finished, Waiting};

    Ok(vec![
        ticket(1, "A001", Calling, Normal, Reception, at(8, 0)?, None),
        ticket(2, "A002", Waiting, Normal, Triage, at(8, 5)?, None),
        ticket(3, "P001", Waiting, Preferential, Care, at(8, 10)?, None),
        ticket(4, "A003", Waiting, Normal, Reception, at(8, 15)?, None),
        ticket(5, "U001", Finished, Urgent, Care, at(7, 30)?, Some(at(7, 45)?)),
        ticket(6, "A000", Finished, Normal, Triage, at(7, 0)?, Some(at(7, 20)?)),
    ])
}

/// Import the demo tickets into `store`. Returns how many were added.
pub fn seed_demo_data(store: &dyn TicketStore) -> Result<usize, TicketError> {
    let tickets = demo_tickets()?;
    store.import(&tickets)?;
    info!("Seeded {} demo tickets", tickets.len());
    Ok(tickets.len())
}
