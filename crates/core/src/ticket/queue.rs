//! The call queue: ordering, the call cycle and history.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    FinishReason, NewTicket, PriorityClass, ProcedureType, Ticket, TicketError, TicketFilter,
    TicketStatus, TicketStore,
};
use crate::clock::{Clock, SystemClock};
use crate::fault::{is_injected, FaultInjector, NoFaults, QueueOperation};
use crate::metrics;
use crate::profile::{ProfessionalProfile, ProfilePolicy};

/// Longest sequence code accepted at issuance.
const MAX_SEQUENCE_CODE_LEN: usize = 16;

/// Tunable queue rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    /// Reject issuing a code already held by a waiting or calling ticket.
    pub enforce_unique_codes: bool,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            enforce_unique_codes: true,
        }
    }
}

/// Data for issuing a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTicketRequest {
    pub sequence_code: String,
    #[serde(default)]
    pub priority: PriorityClass,
    pub procedure: ProcedureType,
}

impl IssueTicketRequest {
    pub fn new(
        sequence_code: impl Into<String>,
        priority: PriorityClass,
        procedure: impl Into<ProcedureType>,
    ) -> Self {
        Self {
            sequence_code: sequence_code.into(),
            priority,
            procedure: procedure.into(),
        }
    }
}

/// Filter for [`TicketQueue::history`]. Dates are UTC calendar days, both inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    #[serde(default)]
    pub procedure: Option<ProcedureType>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_procedure(mut self, procedure: ProcedureType) -> Self {
        self.procedure = Some(procedure);
        self
    }

    pub fn with_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }
}

/// Counters for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    /// Tickets closed on `date`.
    pub finished: u64,
    /// Tickets being called right now (0 or 1).
    pub in_progress: u64,
    /// Tickets waiting right now.
    pub waiting: u64,
    /// Tickets closed on `date`, per procedure type.
    pub by_procedure: BTreeMap<String, u64>,
}

/// The ticket queue engine.
///
/// Mutating operations (`issue`, `call_next`, `finalize`, `finalize_current`)
/// are serialized by an internal lock and write all their row changes with a
/// single [`TicketStore::commit`]. Reads go straight to the store and only
/// ever see committed state.
pub struct TicketQueue {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    faults: Arc<dyn FaultInjector>,
    policy: QueuePolicy,
    profiles: ProfilePolicy,
    write_lock: Mutex<()>,
}

impl TicketQueue {
    /// Create a queue over `store` with the system clock and no faults.
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            faults: Arc::new(NoFaults),
            policy: QueuePolicy::default(),
            profiles: ProfilePolicy::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_faults(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_profiles(mut self, profiles: ProfilePolicy) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn profiles(&self) -> &ProfilePolicy {
        &self.profiles
    }

    /// Current UTC calendar day according to the queue's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The ticket being called, if any.
    pub fn current_ticket(&self) -> Result<Option<Ticket>, TicketError> {
        self.run(QueueOperation::Current, || self.load_current())
    }

    /// Waiting tickets in call order: priority descending, then sequence code.
    pub fn waiting_tickets(&self) -> Result<Vec<Ticket>, TicketError> {
        self.run(QueueOperation::Waiting, || self.load_waiting())
    }

    /// Fetch a ticket by id.
    pub fn get(&self, id: u64) -> Result<Ticket, TicketError> {
        self.run(QueueOperation::Get, || {
            self.store.get(id)?.ok_or(TicketError::NotFound(id))
        })
    }

    /// Head of the waiting order as seen by `profile`, at most `limit` entries.
    pub fn upcoming(
        &self,
        profile: Option<&ProfessionalProfile>,
        limit: Option<usize>,
    ) -> Result<Vec<Ticket>, TicketError> {
        self.run(QueueOperation::Waiting, || {
            let waiting = self.load_waiting()?;
            let mut scoped = match profile {
                Some(profile) => self.profiles.filter_for_profile(&waiting, profile),
                None => waiting,
            };
            if let Some(limit) = limit {
                scoped.truncate(limit);
            }
            Ok(scoped)
        })
    }

    /// Finished tickets matching `filter`, most recently closed first.
    pub fn history(&self, filter: &HistoryFilter) -> Result<Vec<Ticket>, TicketError> {
        self.run(QueueOperation::History, || {
            if let (Some(from), Some(to)) = (filter.from, filter.to) {
                if from > to {
                    return Err(TicketError::Validation(format!(
                        "history range starts after it ends ({} > {})",
                        from, to
                    )));
                }
            }

            let closed_from = filter.from.map(start_of_day).transpose()?;
            let closed_to = filter.to.map(end_of_day).transpose()?;

            let mut store_filter = TicketFilter::new()
                .with_status(TicketStatus::Finished)
                .with_closed_range(closed_from, closed_to);
            if let Some(ref procedure) = filter.procedure {
                store_filter = store_filter.with_procedure(procedure.clone());
            }

            let mut tickets = self.store.list(&store_filter)?;
            tickets.sort_by(|a, b| b.closed_at.cmp(&a.closed_at).then(b.id.cmp(&a.id)));

            debug!("History query returned {} tickets", tickets.len());
            Ok(tickets)
        })
    }

    /// Counters for the UTC calendar day `date`.
    pub fn daily_stats(&self, date: NaiveDate) -> Result<DailyStats, TicketError> {
        self.run(QueueOperation::Stats, || {
            let from = start_of_day(date)?;
            let to = end_of_day(date)?;

            // One snapshot so the counters agree with each other.
            let tickets = self.store.list(&TicketFilter::new())?;

            let mut stats = DailyStats {
                date,
                finished: 0,
                in_progress: 0,
                waiting: 0,
                by_procedure: BTreeMap::new(),
            };
            for ticket in &tickets {
                match ticket.status {
                    TicketStatus::Waiting => stats.waiting += 1,
                    TicketStatus::Calling => stats.in_progress += 1,
                    TicketStatus::Finished => {
                        if ticket.closed_at.is_some_and(|at| at >= from && at <= to) {
                            stats.finished += 1;
                            *stats
                                .by_procedure
                                .entry(ticket.procedure.to_string())
                                .or_insert(0) += 1;
                        }
                    }
                }
            }
            Ok(stats)
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Issue a new waiting ticket.
    pub fn issue(&self, request: IssueTicketRequest) -> Result<Ticket, TicketError> {
        self.run(QueueOperation::Issue, || {
            let sequence_code = validate_sequence_code(&request.sequence_code)?;
            if request.procedure.is_blank() {
                return Err(TicketError::Validation(
                    "procedure type must not be empty".to_string(),
                ));
            }

            let _guard = self.lock()?;

            if self.policy.enforce_unique_codes {
                let taken = self
                    .load_active()?
                    .iter()
                    .any(|ticket| ticket.sequence_code == sequence_code);
                if taken {
                    return Err(TicketError::DuplicateSequenceCode(sequence_code));
                }
            }

            let ticket = self.store.create(NewTicket {
                sequence_code,
                issued_at: self.clock.now(),
                priority: request.priority,
                procedure: request.procedure,
            })?;

            metrics::TICKETS_ISSUED.inc();
            info!(
                ticket_id = ticket.id,
                priority = %ticket.priority,
                procedure = %ticket.procedure,
                "Issued ticket {}",
                ticket.sequence_code
            );
            Ok(ticket)
        })
    }

    /// Finish the calling ticket (if any) and call the head of the waiting order.
    ///
    /// Returns the new current ticket, or `None` when nobody is waiting. The
    /// previous ticket is finished even when the waiting set is empty.
    pub fn call_next(&self) -> Result<Option<Ticket>, TicketError> {
        self.run(QueueOperation::CallNext, || {
            let _guard = self.lock()?;

            let previous = self.load_current()?;
            let next = self.load_waiting()?.into_iter().next();

            if previous.is_none() && next.is_none() {
                debug!("Call next: queue is empty");
                return Ok(None);
            }

            let now = self.clock.now();
            let finished = previous.map(|ticket| close(ticket, now));
            let called = next.map(Ticket::into_calling);

            let updates: Vec<Ticket> = finished.iter().chain(called.iter()).cloned().collect();
            self.store.commit(&updates)?;

            if let Some(ref ticket) = finished {
                record_finished(ticket, FinishReason::Superseded);
            }
            if let Some(ref ticket) = called {
                metrics::TICKETS_CALLED
                    .with_label_values(&[ticket.priority.as_str()])
                    .inc();
                let waited = (now - ticket.issued_at).num_milliseconds().max(0) as f64 / 1000.0;
                metrics::WAIT_DURATION
                    .with_label_values(&[ticket.priority.as_str()])
                    .observe(waited);
                info!(
                    ticket_id = ticket.id,
                    priority = %ticket.priority,
                    "Calling ticket {}",
                    ticket.sequence_code
                );
            } else {
                info!("Waiting set empty, no ticket called");
            }

            Ok(called)
        })
    }

    /// Finish a waiting or calling ticket.
    ///
    /// Finalizing an already finished ticket is a conflict, not a no-op.
    pub fn finalize(&self, id: u64) -> Result<Ticket, TicketError> {
        self.run(QueueOperation::Finalize, || {
            let _guard = self.lock()?;
            let ticket = self.store.get(id)?.ok_or(TicketError::NotFound(id))?;
            self.finalize_locked(ticket)
        })
    }

    /// Finish the calling ticket, if any.
    pub fn finalize_current(&self) -> Result<Option<Ticket>, TicketError> {
        self.run(QueueOperation::Finalize, || {
            let _guard = self.lock()?;
            match self.load_current()? {
                Some(ticket) => self.finalize_locked(ticket).map(Some),
                None => {
                    debug!("Finalize current: no ticket being called");
                    Ok(None)
                }
            }
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn finalize_locked(&self, ticket: Ticket) -> Result<Ticket, TicketError> {
        if ticket.is_finished() {
            return Err(TicketError::invalid_state(&ticket, "finalize"));
        }

        let finished = close(ticket, self.clock.now());
        self.store.commit(std::slice::from_ref(&finished))?;
        record_finished(&finished, FinishReason::Finalized);
        Ok(finished)
    }

    /// Fault check, then `op`; failures are counted and logged.
    fn run<T>(
        &self,
        operation: QueueOperation,
        op: impl FnOnce() -> Result<T, TicketError>,
    ) -> Result<T, TicketError> {
        let result = self.faults.check(operation).and_then(|()| op());

        if let Err(ref e) = result {
            metrics::OPERATIONS_REJECTED
                .with_label_values(&[operation.as_str(), e.kind().as_str()])
                .inc();
            if is_injected(e) {
                metrics::FAULTS_INJECTED
                    .with_label_values(&[operation.as_str()])
                    .inc();
                warn!("Injected fault during {}", operation);
            } else {
                warn!("Queue operation {} rejected: {}", operation, e);
            }
        }

        result
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, TicketError> {
        self.write_lock
            .lock()
            .map_err(|_| TicketError::Internal("queue writer lock poisoned".to_string()))
    }

    fn load_current(&self) -> Result<Option<Ticket>, TicketError> {
        let mut calling = self
            .store
            .list(&TicketFilter::new().with_status(TicketStatus::Calling))?;

        if calling.len() > 1 {
            let ids: Vec<u64> = calling.iter().map(|t| t.id).collect();
            return Err(TicketError::Internal(format!(
                "more than one ticket is being called: {:?}",
                ids
            )));
        }
        Ok(calling.pop())
    }

    fn load_waiting(&self) -> Result<Vec<Ticket>, TicketError> {
        let mut waiting = self
            .store
            .list(&TicketFilter::new().with_status(TicketStatus::Waiting))?;
        waiting.sort_by(call_order);
        Ok(waiting)
    }

    fn load_active(&self) -> Result<Vec<Ticket>, TicketError> {
        let mut active = self.load_waiting()?;
        active.extend(self.load_current()?);
        Ok(active)
    }
}

/// Higher priority first, then ascending sequence code. Id breaks the tie
/// left when duplicate codes are allowed.
fn call_order(a: &Ticket, b: &Ticket) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.sequence_code.cmp(&b.sequence_code))
        .then(a.id.cmp(&b.id))
}

/// Finish `ticket` at `now`, never before it was issued.
fn close(ticket: Ticket, now: DateTime<Utc>) -> Ticket {
    let closed_at = now.max(ticket.issued_at);
    ticket.into_finished(closed_at)
}

fn record_finished(ticket: &Ticket, reason: FinishReason) {
    metrics::TICKETS_FINISHED
        .with_label_values(&[reason.as_str()])
        .inc();
    info!(
        ticket_id = ticket.id,
        reason = reason.as_str(),
        "Finished ticket {}",
        ticket.sequence_code
    );
}

fn validate_sequence_code(code: &str) -> Result<String, TicketError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(TicketError::Validation(
            "sequence code must not be empty".to_string(),
        ));
    }
    if code.len() > MAX_SEQUENCE_CODE_LEN {
        return Err(TicketError::Validation(format!(
            "sequence code longer than {} characters",
            MAX_SEQUENCE_CODE_LEN
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(TicketError::Validation(format!(
            "sequence code '{}' may only contain letters, digits and '-'",
            code
        )));
    }
    Ok(code.to_string())
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>, TicketError> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| TicketError::Internal(format!("no start of day for {}", date)))
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>, TicketError> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| TicketError::Internal(format!("no end of day for {}", date)))
}
