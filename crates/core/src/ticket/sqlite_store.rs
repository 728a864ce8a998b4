//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::store::{check_import, check_replacement};
use super::{
    NewTicket, PriorityClass, ProcedureType, Ticket, TicketError, TicketFilter, TicketStatus,
    TicketStore,
};

const SELECT_COLUMNS: &str =
    "SELECT id, sequence_code, issued_at, closed_at, priority, procedure, status FROM tickets";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY,
                sequence_code TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                closed_at TEXT,
                priority TEXT NOT NULL,
                procedure TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_closed_at ON tickets(closed_at);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Internal("sqlite connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.state_type()));
        }

        if let Some(ref procedure) = filter.procedure {
            conditions.push("procedure = ?");
            params.push(Box::new(procedure.as_str().to_string()));
        }

        // Timestamps are stored as fixed-width RFC 3339 UTC strings, so text
        // comparison orders them chronologically.
        if let Some(from) = filter.closed_from {
            conditions.push("closed_at IS NOT NULL AND closed_at >= ?");
            params.push(Box::new(format_timestamp(&from)));
        }

        if let Some(to) = filter.closed_to {
            conditions.push("closed_at IS NOT NULL AND closed_at <= ?");
            params.push(Box::new(format_timestamp(&to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let id: i64 = row.get(0)?;
        let sequence_code: String = row.get(1)?;
        let issued_at_str: String = row.get(2)?;
        let closed_at_str: Option<String> = row.get(3)?;
        let priority_str: String = row.get(4)?;
        let procedure_str: String = row.get(5)?;
        let status_str: String = row.get(6)?;

        let issued_at = parse_timestamp(2, &issued_at_str)?;
        let closed_at = closed_at_str
            .map(|s| parse_timestamp(3, &s))
            .transpose()?;

        let priority: PriorityClass =
            serde_json::from_value(serde_json::Value::String(priority_str))
                .map_err(|e| conversion_err(4, e))?;

        let status = TicketStatus::from_state_type(&status_str).ok_or_else(|| {
            conversion_err(6, format!("unknown ticket status: {}", status_str))
        })?;

        Ok(Ticket {
            id: id as u64,
            sequence_code,
            issued_at,
            closed_at,
            priority,
            procedure: ProcedureType::parse(&procedure_str),
            status,
        })
    }

    fn fetch(conn: &Connection, id: u64) -> Result<Option<Ticket>, TicketError> {
        conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id as i64],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(db_err)
    }

    fn insert(tx: &Transaction<'_>, ticket: &Ticket) -> Result<(), TicketError> {
        tx.execute(
            "INSERT INTO tickets (id, sequence_code, issued_at, closed_at, priority, procedure, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                ticket.id as i64,
                ticket.sequence_code,
                format_timestamp(&ticket.issued_at),
                ticket.closed_at.as_ref().map(format_timestamp),
                ticket.priority.as_str(),
                ticket.procedure.as_str(),
                ticket.status.state_type(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, ticket: NewTicket) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let max_id: Option<i64> = tx
            .query_row("SELECT MAX(id) FROM tickets", [], |row| row.get(0))
            .map_err(db_err)?;

        let ticket = Ticket {
            id: max_id.map_or(1, |max| max as u64 + 1),
            sequence_code: ticket.sequence_code,
            issued_at: ticket.issued_at,
            closed_at: None,
            priority: ticket.priority,
            procedure: ticket.procedure,
            status: TicketStatus::Waiting,
        };

        Self::insert(&tx, &ticket)?;
        tx.commit().map_err(db_err)?;

        Ok(ticket)
    }

    fn get(&self, id: u64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "{} {} ORDER BY id ASC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        // Build parameter slice with limit and offset
        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit.max(0)));
        all_params.push(Box::new(filter.offset.max(0)));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(db_err)?;

        let tickets = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn commit(&self, updates: &[Ticket]) -> Result<(), TicketError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        for next in updates {
            let stored = Self::fetch(&tx, next.id)?.ok_or(TicketError::NotFound(next.id))?;
            check_replacement(&stored, next)?;

            tx.execute(
                "UPDATE tickets SET status = ?, closed_at = ?, priority = ?, procedure = ? WHERE id = ?",
                params![
                    next.status.state_type(),
                    next.closed_at.as_ref().map(format_timestamp),
                    next.priority.as_str(),
                    next.procedure.as_str(),
                    next.id as i64,
                ],
            )
            .map_err(db_err)?;
        }

        // Dropping the transaction on an early return rolls it back.
        tx.commit().map_err(db_err)
    }

    fn import(&self, tickets: &[Ticket]) -> Result<(), TicketError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let calling: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM tickets WHERE status = ?",
                params![TicketStatus::Calling.state_type()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        check_import(calling as usize, tickets)?;

        for ticket in tickets {
            Self::insert(&tx, ticket)?;
        }

        tx.commit().map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> TicketError {
    TicketError::Database(e.to_string())
}

fn conversion_err(
    column: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(column, e))
}
