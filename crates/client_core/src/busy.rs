//! Serialization of mutating operations.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// One shared flag; at most one mutating operation holds it at a time.
#[derive(Debug, Default)]
pub struct BusyGate {
    held: AtomicBool,
}

impl BusyGate {
    /// Returns `None` while another operation holds the gate.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.held.store(false, Ordering::Release);
        debug!("busy gate released");
    }
}

/// Releases the gate when dropped, so every exit path of the holder frees it.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    gate: &'a BusyGate,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let gate = BusyGate::default();
        let guard = gate.try_acquire().expect("first acquire");
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn failing_operation(gate: &BusyGate) -> Result<(), &'static str> {
            let _guard = gate.try_acquire().ok_or("busy")?;
            Err("server said no")
        }

        let gate = BusyGate::default();
        assert_eq!(failing_operation(&gate), Err("server said no"));
        assert!(!gate.is_busy());
    }
}
