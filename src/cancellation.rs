//! Explicit cancellation handle, checked at coarse stage boundaries.
//!
//! Spec §5 replaces ambient/implicit cancellation plumbing with a handle
//! passed through every suspending operation and checked "between
//! pipeline stages, between transactions in a loop, between blocks
//! during reorg". The teacher has no such primitive (its mining loop
//! uses raw `AtomicBool`/`AtomicU64` flags in `miner.rs`); this follows
//! that same small-atomic-flag idiom rather than adding a dependency
//! like `tokio_util::sync::CancellationToken` for one boolean.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// A token that never cancels, for call sites that don't need one.
    pub fn never() -> Self {
        Self::new()
    }
}
