//! Ticket model, storage and the call queue.

mod memory_store;
mod queue;
mod sqlite_store;
mod store;
mod types;

pub use memory_store::InMemoryTicketStore;
pub use queue::{DailyStats, HistoryFilter, IssueTicketRequest, QueuePolicy, TicketQueue};
pub use sqlite_store::SqliteTicketStore;
pub use store::{ErrorKind, TicketError, TicketFilter, TicketStore};
pub use types::{FinishReason, NewTicket, PriorityClass, ProcedureType, Ticket, TicketStatus};
