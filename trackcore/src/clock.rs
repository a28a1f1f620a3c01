//! Time source used by the service and the identifier generator.

use crate::types::Timestamp;

/// Supplies the current server time.
///
/// Injected everywhere "now" matters so delivery classification and
/// identifier generation stay deterministic under test.
pub trait Clock: Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
