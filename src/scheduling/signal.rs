//! Single reusable wait primitive for the expiry loop.
//!
//! Each loop iteration calls [`WakeSignal::arm`], which installs a fresh one-shot channel and
//! drops the previous one, so at most one wait is ever outstanding. `schedule` and `cancel`
//! resolve the armed channel to cut the wait short; otherwise the wait ends on its timeout.
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::codec::timestamp::Timestamp;

/// Why a wait ended. The loop treats both the same way.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WakeReason {
    Resolved,
    Elapsed,
}

/// What the armed loop is waiting for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Parked {
    /// Armed, but the next deadline has not been picked yet.
    Deciding,
    /// Nothing pending; polling on the renewal interval.
    Idle,
    Until(Timestamp),
}

#[derive(Debug)]
struct Slot {
    tx: Option<oneshot::Sender<()>>,
    parked: Parked,
}

#[derive(Debug)]
pub struct WakeSignal {
    slot: Mutex<Slot>,
}

/// The receiving half of an armed signal.
#[derive(Debug)]
pub struct Wait {
    rx: oneshot::Receiver<()>,
}

impl Default for WakeSignal {
    fn default() -> Self {
        WakeSignal::new()
    }
}

impl WakeSignal {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                tx: None,
                parked: Parked::Deciding,
            }),
        }
    }

    /// Replaces any outstanding wait with a fresh, unresolved one.
    pub fn arm(&self) -> Wait {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.slot.lock();
        slot.tx = Some(tx);
        slot.parked = Parked::Deciding;
        Wait { rx }
    }

    /// Records the deadline of the armed wait; `None` for an idle poll.
    pub fn park(&self, until: Option<Timestamp>) {
        self.slot.lock().parked = match until {
            Some(at) => Parked::Until(at),
            None => Parked::Idle,
        };
    }

    /// Resolves the armed wait. Returns `false` if nothing was waiting.
    pub fn resolve(&self) -> bool {
        Self::fire(&mut self.slot.lock())
    }

    /// Resolves the armed wait only if `at` comes before the deadline it is parked on.
    pub fn resolve_if_before(&self, at: Timestamp) -> bool {
        let mut slot = self.slot.lock();
        let earlier = match slot.parked {
            Parked::Deciding | Parked::Idle => true,
            Parked::Until(deadline) => at < deadline,
        };
        earlier && Self::fire(&mut slot)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().tx.is_some()
    }

    fn fire(slot: &mut Slot) -> bool {
        match slot.tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl Wait {
    /// Suspends until resolved, replaced, or `timeout` elapses.
    pub async fn wait(self, timeout: Duration) -> WakeReason {
        match tokio::time::timeout(timeout, self.rx).await {
            // a dropped sender means the signal was re-armed
            Ok(_) => WakeReason::Resolved,
            Err(_) => WakeReason::Elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_cuts_wait_short() {
        let signal = WakeSignal::new();
        let wait = signal.arm();
        assert!(signal.is_armed());
        assert!(signal.resolve());
        assert!(!signal.is_armed());
        assert_eq!(
            wait.wait(Duration::from_secs(30)).await,
            WakeReason::Resolved
        );
    }

    #[tokio::test]
    async fn test_unresolved_wait_times_out() {
        let signal = WakeSignal::new();
        let wait = signal.arm();
        assert_eq!(
            wait.wait(Duration::from_millis(10)).await,
            WakeReason::Elapsed
        );
    }

    #[tokio::test]
    async fn test_rearm_replaces_previous_wait() {
        let signal = WakeSignal::new();
        let stale = signal.arm();
        let fresh = signal.arm();
        assert_eq!(
            stale.wait(Duration::from_secs(30)).await,
            WakeReason::Resolved
        );
        assert!(signal.resolve());
        assert!(!signal.resolve());
        assert_eq!(
            fresh.wait(Duration::from_secs(30)).await,
            WakeReason::Resolved
        );
    }

    #[test]
    fn test_resolve_without_wait_is_noop() {
        let signal = WakeSignal::new();
        assert!(!signal.resolve());
        assert!(!signal.resolve_if_before(Timestamp::now()));
    }

    #[test]
    fn test_resolve_if_before_respects_parked_deadline() {
        let signal = WakeSignal::new();
        let deadline = Timestamp::new(100, 0).unwrap();
        let _wait = signal.arm();
        signal.park(Some(deadline));
        assert!(!signal.resolve_if_before(Timestamp::new(150, 0).unwrap()));
        assert!(!signal.resolve_if_before(deadline));
        assert!(signal.resolve_if_before(Timestamp::new(50, 0).unwrap()));

        let _wait = signal.arm();
        signal.park(None);
        assert!(signal.resolve_if_before(Timestamp::new(150, 0).unwrap()));
    }
}
