//! Queue lifecycle integration tests.
//!
//! These tests drive the full call cycle against both store backends:
//! issue -> waiting -> calling -> finished (superseded or finalized)

use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use codenews_core::{
    seed_demo_data,
    testing::{fixtures, ManualClock, ScriptedFaults},
    ErrorKind, HistoryFilter, InMemoryTicketStore, IssueTicketRequest, PriorityClass,
    ProcedureType, ProfessionalProfile, QueueOperation, SqliteTicketStore, TicketFilter,
    TicketQueue, TicketStatus, TicketStore,
};

/// Queue over a given store with a manual clock and scripted faults.
struct TestHarness {
    queue: TicketQueue,
    clock: Arc<ManualClock>,
    faults: Arc<ScriptedFaults>,
    _temp_dir: Option<TempDir>,
}

impl TestHarness {
    fn with_store(store: Arc<dyn TicketStore>, temp_dir: Option<TempDir>) -> Self {
        let clock = Arc::new(ManualClock::new(fixtures::morning()));
        let faults = Arc::new(ScriptedFaults::new());
        let queue = TicketQueue::new(store)
            .with_clock(clock.clone())
            .with_faults(faults.clone());
        Self {
            queue,
            clock,
            faults,
            _temp_dir: temp_dir,
        }
    }

    fn memory() -> Self {
        Self::with_store(Arc::new(InMemoryTicketStore::new()), None)
    }

    fn sqlite() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteTicketStore::new(&temp_dir.path().join("queue.db"))
            .expect("Failed to create ticket store");
        Self::with_store(Arc::new(store), Some(temp_dir))
    }

    fn all() -> Vec<(&'static str, Self)> {
        vec![("memory", Self::memory()), ("sqlite", Self::sqlite())]
    }

    fn issue(&self, code: &str, priority: PriorityClass, procedure: &str) -> u64 {
        self.queue
            .issue(IssueTicketRequest::new(code, priority, procedure))
            .expect("issue failed")
            .id
    }

    fn waiting_codes(&self) -> Vec<String> {
        self.queue
            .waiting_tickets()
            .unwrap()
            .into_iter()
            .map(|t| t.sequence_code)
            .collect()
    }

    fn history_codes(&self) -> Vec<String> {
        self.queue
            .history(&HistoryFilter::new())
            .unwrap()
            .into_iter()
            .map(|t| t.sequence_code)
            .collect()
    }
}

#[test]
fn test_full_call_cycle() {
    for (backend, h) in TestHarness::all() {
        let a001 = h.issue("A001", PriorityClass::Normal, "reception");
        h.clock.advance(Duration::minutes(1));
        h.issue("T002", PriorityClass::Urgent, "triage");
        h.clock.advance(Duration::minutes(1));
        h.issue("P001", PriorityClass::Preferential, "care");

        assert_eq!(h.waiting_codes(), vec!["T002", "P001", "A001"], "{}", backend);

        h.clock.advance(Duration::minutes(1));
        let current = h.queue.call_next().unwrap().unwrap();
        assert_eq!(current.sequence_code, "T002", "{}", backend);
        assert_eq!(current.status, TicketStatus::Calling);

        h.clock.advance(Duration::minutes(1));
        let current = h.queue.call_next().unwrap().unwrap();
        assert_eq!(current.sequence_code, "P001", "{}", backend);
        assert_eq!(h.waiting_codes(), vec!["A001"], "{}", backend);

        h.clock.advance(Duration::minutes(1));
        h.queue.finalize(a001).unwrap();
        assert_eq!(h.history_codes(), vec!["A001", "T002"], "{}", backend);

        let history = h.queue.history(&HistoryFilter::new()).unwrap();
        for ticket in &history {
            let closed_at = ticket.closed_at.expect("finished ticket has closed_at");
            assert!(closed_at >= ticket.issued_at, "{}", backend);
        }
    }
}

#[test]
fn test_issue_round_trip_preserves_fields() {
    for (backend, h) in TestHarness::all() {
        let issued = h
            .queue
            .issue(IssueTicketRequest::new("V010", PriorityClass::Urgent, "Vaccination"))
            .unwrap();

        let waiting = h.queue.waiting_tickets().unwrap();
        assert_eq!(waiting, vec![issued.clone()], "{}", backend);
        assert_eq!(h.queue.get(issued.id).unwrap(), issued, "{}", backend);
        assert_eq!(issued.procedure, ProcedureType::Other("vaccination".into()));
    }
}

#[test]
fn test_sub_microsecond_timestamps_round_trip() {
    for (backend, h) in TestHarness::all() {
        h.clock.advance(Duration::nanoseconds(402_580_529));
        let issued = h
            .queue
            .issue(IssueTicketRequest::new("A001", PriorityClass::Normal, "reception"))
            .unwrap();
        assert_eq!(h.queue.waiting_tickets().unwrap(), vec![issued.clone()], "{}", backend);

        h.clock.advance(Duration::nanoseconds(254_979));
        let called = h.queue.call_next().unwrap().unwrap();
        assert_eq!(h.queue.current_ticket().unwrap(), Some(called), "{}", backend);

        h.clock.advance(Duration::nanoseconds(1));
        let finished = h.queue.finalize(issued.id).unwrap();
        assert_eq!(h.queue.get(issued.id).unwrap(), finished, "{}", backend);
        assert_eq!(
            h.queue.history(&HistoryFilter::new()).unwrap(),
            vec![finished],
            "{}",
            backend
        );
    }
}

#[test]
fn test_finalize_error_paths_do_not_mutate() {
    for (backend, h) in TestHarness::all() {
        let id = h.issue("A001", PriorityClass::Normal, "reception");
        h.queue.finalize(id).unwrap();
        let before = h.queue.store().list(&TicketFilter::new()).unwrap();

        let missing = h.queue.finalize(999).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound, "{}", backend);

        let twice = h.queue.finalize(id).unwrap_err();
        assert_eq!(twice.kind(), ErrorKind::Conflict, "{}", backend);

        let after = h.queue.store().list(&TicketFilter::new()).unwrap();
        assert_eq!(before, after, "{}", backend);
    }
}

#[test]
fn test_injected_faults_are_all_or_nothing() {
    for (backend, h) in TestHarness::all() {
        h.issue("A001", PriorityClass::Normal, "reception");
        h.issue("A002", PriorityClass::Normal, "reception");
        h.queue.call_next().unwrap();
        let before = h.queue.store().list(&TicketFilter::new()).unwrap();

        h.faults.fail_any(3);
        assert_eq!(h.queue.call_next().unwrap_err().kind(), ErrorKind::Internal);
        assert!(h.queue.finalize_current().is_err());
        assert!(h
            .queue
            .issue(IssueTicketRequest::new("A003", PriorityClass::Normal, "care"))
            .is_err());

        let after = h.queue.store().list(&TicketFilter::new()).unwrap();
        assert_eq!(before, after, "{}", backend);

        // Faults are transient: the next call goes through.
        assert_eq!(
            h.queue.call_next().unwrap().unwrap().sequence_code,
            "A002",
            "{}",
            backend
        );
    }
}

#[test]
fn test_fault_is_checked_before_state_access() {
    let h = TestHarness::memory();
    h.queue.current_ticket().unwrap();
    h.queue.call_next().unwrap();
    assert_eq!(
        h.faults.checked(),
        vec![QueueOperation::Current, QueueOperation::CallNext]
    );
}

#[test]
fn test_demo_data_through_queue() {
    for (backend, h) in TestHarness::all() {
        seed_demo_data(h.queue.store().as_ref()).unwrap();

        assert_eq!(
            h.queue.current_ticket().unwrap().unwrap().sequence_code,
            "A001",
            "{}",
            backend
        );
        assert_eq!(h.waiting_codes(), vec!["P001", "A002", "A003"], "{}", backend);

        let nurse = ProfessionalProfile::new(Some("enfermeiro".into()), None);
        let scoped: Vec<String> = h
            .queue
            .upcoming(Some(&nurse), Some(3))
            .unwrap()
            .into_iter()
            .map(|t| t.sequence_code)
            .collect();
        assert_eq!(scoped, vec!["A002", "A003"], "{}", backend);

        // New ids continue after the seeded ones.
        let id = h.issue("A004", PriorityClass::Normal, "reception");
        assert_eq!(id, 7, "{}", backend);

        let stats = h
            .queue
            .daily_stats(fixtures::morning().date_naive())
            .unwrap();
        assert_eq!(stats.finished, 2, "{}", backend);
        assert_eq!(stats.in_progress, 1, "{}", backend);
        assert_eq!(stats.waiting, 4, "{}", backend);
        assert_eq!(stats.by_procedure.get("care"), Some(&1));
        assert_eq!(stats.by_procedure.get("triage"), Some(&1));
    }
}

#[test]
fn test_sqlite_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.db");

    {
        let store = Arc::new(SqliteTicketStore::new(&path).unwrap());
        let queue = TicketQueue::new(store);
        queue
            .issue(IssueTicketRequest::new("A001", PriorityClass::Normal, "reception"))
            .unwrap();
        queue
            .issue(IssueTicketRequest::new("U001", PriorityClass::Urgent, "care"))
            .unwrap();
        queue.call_next().unwrap();
    }

    let store = Arc::new(SqliteTicketStore::new(&path).unwrap());
    let queue = TicketQueue::new(store);
    assert_eq!(queue.current_ticket().unwrap().unwrap().sequence_code, "U001");
    assert_eq!(queue.waiting_tickets().unwrap().len(), 1);
}

#[test]
fn test_concurrent_call_next_keeps_single_calling_ticket() {
    let h = Arc::new(TestHarness::memory());
    for i in 0..20 {
        h.issue(&format!("A{:03}", i), PriorityClass::Normal, "reception");
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            std::thread::spawn(move || {
                for _ in 0..2 {
                    h.queue.call_next().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = h.queue.store().list(&TicketFilter::new()).unwrap();
    let calling = all.iter().filter(|t| t.is_calling()).count();
    let finished = all.iter().filter(|t| t.is_finished()).count();
    assert_eq!(calling, 1);
    assert_eq!(finished, 15);
    assert_eq!(h.queue.waiting_tickets().unwrap().len(), 4);
}
