//! In-memory ticket store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::store::{check_import, check_replacement};
use super::{NewTicket, Ticket, TicketError, TicketFilter, TicketStatus, TicketStore};

/// Volatile ticket store backed by a `BTreeMap` keyed by id.
///
/// Writes hold the write lock for their whole duration, so readers only
/// ever observe fully committed batches.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<BTreeMap<u64, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<u64, Ticket>>, TicketError> {
        self.tickets
            .read()
            .map_err(|_| TicketError::Internal("ticket store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<u64, Ticket>>, TicketError> {
        self.tickets
            .write()
            .map_err(|_| TicketError::Internal("ticket store lock poisoned".to_string()))
    }
}

impl TicketStore for InMemoryTicketStore {
    fn create(&self, ticket: NewTicket) -> Result<Ticket, TicketError> {
        let mut tickets = self.write()?;

        let id = tickets.keys().next_back().map_or(1, |max| max + 1);
        let ticket = Ticket {
            id,
            sequence_code: ticket.sequence_code,
            issued_at: ticket.issued_at,
            closed_at: None,
            priority: ticket.priority,
            procedure: ticket.procedure,
            status: TicketStatus::Waiting,
        };
        tickets.insert(id, ticket.clone());

        Ok(ticket)
    }

    fn get(&self, id: u64) -> Result<Option<Ticket>, TicketError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let tickets = self.read()?;
        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit.max(0)).unwrap_or(usize::MAX);

        Ok(tickets
            .values()
            .filter(|ticket| filter.matches(ticket))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let tickets = self.read()?;
        let count = tickets.values().filter(|ticket| filter.matches(ticket)).count();
        Ok(count as i64)
    }

    fn commit(&self, updates: &[Ticket]) -> Result<(), TicketError> {
        let mut tickets = self.write()?;

        // Validate the whole batch before touching the map.
        for next in updates {
            let stored = tickets.get(&next.id).ok_or(TicketError::NotFound(next.id))?;
            check_replacement(stored, next)?;
        }

        for next in updates {
            tickets.insert(next.id, next.clone());
        }

        Ok(())
    }

    fn import(&self, seed: &[Ticket]) -> Result<(), TicketError> {
        let mut tickets = self.write()?;

        for (idx, ticket) in seed.iter().enumerate() {
            let duplicate_in_batch = seed[..idx].iter().any(|t| t.id == ticket.id);
            if tickets.contains_key(&ticket.id) || duplicate_in_batch {
                return Err(TicketError::Database(format!(
                    "ticket id {} already exists",
                    ticket.id
                )));
            }
        }

        let calling = tickets.values().filter(|t| t.is_calling()).count();
        check_import(calling, seed)?;

        for ticket in seed {
            tickets.insert(ticket.id, ticket.clone());
        }

        Ok(())
    }
}
