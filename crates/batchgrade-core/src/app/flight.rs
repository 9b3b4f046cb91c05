//! Single-flight gate: at most one flush reconciles the queue at a time.
//!
//! Scheduler tick と escalation の両方がここを通る。CAS で取れなければ諦める
//! （待たない）。Guard の drop で必ず解放されるので、flush が panic しても
//! フラグが立ちっぱなしにならない。

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct FlushGate {
    in_progress: AtomicBool,
}

impl FlushGate {
    pub(crate) fn try_acquire(&self) -> Option<FlushGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard { gate: self })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the current flush.
#[derive(Debug)]
pub(crate) struct FlushGuard<'a> {
    gate: &'a FlushGate,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_progress.store(false, Ordering::Release);
    }
}
