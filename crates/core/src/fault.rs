//! Fault injection for simulating store failures.
//!
//! The queue consults its [`FaultInjector`] before reading or writing any
//! state, so a simulated failure never leaves a half-applied transition.

use std::fmt;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ticket::TicketError;

/// Queue operations a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueOperation {
    Get,
    Current,
    Waiting,
    CallNext,
    Finalize,
    History,
    Issue,
    Stats,
}

impl QueueOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOperation::Get => "get",
            QueueOperation::Current => "current",
            QueueOperation::Waiting => "waiting",
            QueueOperation::CallNext => "call_next",
            QueueOperation::Finalize => "finalize",
            QueueOperation::History => "history",
            QueueOperation::Issue => "issue",
            QueueOperation::Stats => "stats",
        }
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether an operation should fail with a simulated fault.
pub trait FaultInjector: Send + Sync {
    /// Returns `Err` when `operation` should fail.
    fn check(&self, operation: QueueOperation) -> Result<(), TicketError>;
}

/// Never injects a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn check(&self, _operation: QueueOperation) -> Result<(), TicketError> {
        Ok(())
    }
}

/// Fails each operation independently with a fixed probability.
pub struct RandomFaults {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomFaults {
    /// `probability` is clamped to `[0, 1]`. A seed makes the sequence reproducible.
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self {
            probability,
            rng: Mutex::new(rng),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl fmt::Debug for RandomFaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomFaults")
            .field("probability", &self.probability)
            .finish()
    }
}

impl FaultInjector for RandomFaults {
    fn check(&self, operation: QueueOperation) -> Result<(), TicketError> {
        if self.probability <= 0.0 {
            return Ok(());
        }

        let fail = self
            .rng
            .lock()
            .map_err(|_| TicketError::Internal("fault injector lock poisoned".to_string()))?
            .gen_bool(self.probability);

        if fail {
            Err(injected(operation))
        } else {
            Ok(())
        }
    }
}

/// Error returned for a simulated failure.
pub fn injected(operation: QueueOperation) -> TicketError {
    TicketError::Internal(format!("injected fault during {}", operation))
}

/// Returns true if `error` was produced by a fault injector.
pub fn is_injected(error: &TicketError) -> bool {
    matches!(error, TicketError::Internal(msg) if msg.starts_with("injected fault"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults_never_fails() {
        for _ in 0..100 {
            assert!(NoFaults.check(QueueOperation::CallNext).is_ok());
        }
    }

    #[test]
    fn test_random_faults_zero_probability() {
        let faults = RandomFaults::new(0.0, Some(1));
        assert!((0..100).all(|_| faults.check(QueueOperation::Issue).is_ok()));
    }

    #[test]
    fn test_random_faults_certain_failure() {
        let faults = RandomFaults::new(1.0, Some(1));
        let err = faults.check(QueueOperation::Finalize).unwrap_err();
        assert!(is_injected(&err));
        assert_eq!(err.to_string(), "Internal error: injected fault during finalize");
    }

    #[test]
    fn test_random_faults_seed_is_reproducible() {
        let a = RandomFaults::new(0.5, Some(42));
        let b = RandomFaults::new(0.5, Some(42));
        let run = |faults: &RandomFaults| -> Vec<bool> {
            (0..32)
                .map(|_| faults.check(QueueOperation::Waiting).is_err())
                .collect()
        };
        assert_eq!(run(&a), run(&b));
    }

    #[test]
    fn test_probability_is_clamped() {
        assert_eq!(RandomFaults::new(3.0, None).probability(), 1.0);
        assert_eq!(RandomFaults::new(-1.0, None).probability(), 0.0);
    }

    #[test]
    fn test_is_injected_ignores_other_errors() {
        assert!(!is_injected(&TicketError::Internal("disk full".into())));
        assert!(!is_injected(&TicketError::NotFound(1)));
    }
}
