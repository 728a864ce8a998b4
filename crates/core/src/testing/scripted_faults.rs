//! Deterministic fault injector for testing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::fault::{injected, FaultInjector, QueueOperation};
use crate::ticket::TicketError;

#[derive(Debug, Default)]
struct Script {
    /// Pending failures keyed by operation; `None` matches any operation.
    pending: HashMap<Option<QueueOperation>, usize>,
    /// Every operation checked, in order.
    checked: Vec<QueueOperation>,
}

/// Fault injector driven by an explicit script.
///
/// Provides controllable behavior for testing:
/// - Fail the next N calls of one operation
/// - Fail the next N calls of any operation
/// - Record which operations were checked
///
/// # Example
///
/// ```rust,ignore
/// use codenews_core::testing::ScriptedFaults;
///
/// let faults = ScriptedFaults::new();
/// faults.fail_next(QueueOperation::Finalize, 2);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    script: Mutex<Script>,
}

impl ScriptedFaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` checks of `operation`.
    pub fn fail_next(&self, operation: QueueOperation, count: usize) {
        *self.lock().pending.entry(Some(operation)).or_insert(0) += count;
    }

    /// Fail the next `count` checks regardless of operation.
    pub fn fail_any(&self, count: usize) {
        *self.lock().pending.entry(None).or_insert(0) += count;
    }

    /// Drop all pending failures.
    pub fn clear(&self) {
        self.lock().pending.clear();
    }

    /// Operations checked so far.
    pub fn checked(&self) -> Vec<QueueOperation> {
        self.lock().checked.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FaultInjector for ScriptedFaults {
    fn check(&self, operation: QueueOperation) -> Result<(), TicketError> {
        let mut script = self.lock();
        script.checked.push(operation);

        for key in [Some(operation), None] {
            if let Some(remaining) = script.pending.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(injected(operation));
                }
            }
        }
        Ok(())
    }
}
