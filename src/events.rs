//! Fan-out event channels (spec §9 redesign flag).
//!
//! Spec §9 replaces an implicit "chain reorganized" callback with "a
//! fan-out channel or explicit subscription list owned by the
//! reorganizer; handlers invoked on caller's thread after write batch
//! commits... fire-and-forget; handlers must not block the emitter".
//! The teacher has no observer pattern at all (its mining loop polls
//! shared state directly), so this is written fresh, reaching for the
//! teacher's existing `tokio::sync` dependency (already used for
//! `sync_lock::RwLock` and the RPC layer) rather than adding a new
//! pub/sub crate.

use tokio::sync::broadcast;

use crate::primitives::{Epoch, Hash32, Height};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReorgEvent {
    pub fork_height: Height,
    pub old_tip_hash: Hash32,
    pub old_tip_height: Height,
    pub new_tip_hash: Hash32,
    pub new_tip_height: Height,
    pub reverted_count: usize,
    pub applied_count: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeAvailable {
    pub challenge: Hash32,
    pub epoch: Epoch,
    pub start_time: i64,
}

/// Emits newly-derived challenges as they become active. Implemented by
/// [`EventBus`]; kept as a trait so `EpochManager`'s caller can supply a
/// stub in tests without pulling in a broadcast channel.
pub trait ChallengeProvider: Send + Sync {
    fn broadcast_challenge(&self, event: ChallengeAvailable);
}

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Owns both fan-out channels the consensus core emits on. Send errors
/// (no subscribers) are swallowed: emission is fire-and-forget, per
/// spec's explicit requirement that handlers never block the emitter.
pub struct EventBus {
    reorg_tx: broadcast::Sender<ChainReorgEvent>,
    challenge_tx: broadcast::Sender<ChallengeAvailable>,
}

impl EventBus {
    pub fn new() -> Self {
        let (reorg_tx, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        let (challenge_tx, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { reorg_tx, challenge_tx }
    }

    pub fn subscribe_reorg(&self) -> broadcast::Receiver<ChainReorgEvent> {
        self.reorg_tx.subscribe()
    }

    pub fn subscribe_challenge(&self) -> broadcast::Receiver<ChallengeAvailable> {
        self.challenge_tx.subscribe()
    }

    pub fn emit_reorg(&self, event: ChainReorgEvent) {
        let _ = self.reorg_tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeProvider for EventBus {
    fn broadcast_challenge(&self, event: ChallengeAvailable) {
        let _ = self.challenge_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reorg_event_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_reorg();
        let event = ChainReorgEvent {
            fork_height: 3,
            old_tip_hash: Hash32::ZERO,
            old_tip_height: 5,
            new_tip_hash: Hash32([1u8; 32]),
            new_tip_height: 6,
            reverted_count: 2,
            applied_count: 3,
            timestamp: 1_700_000_000,
        };
        bus.emit_reorg(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn emitting_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit_reorg(ChainReorgEvent {
            fork_height: 0,
            old_tip_hash: Hash32::ZERO,
            old_tip_height: 0,
            new_tip_hash: Hash32::ZERO,
            new_tip_height: 0,
            reverted_count: 0,
            applied_count: 0,
            timestamp: 0,
        });
    }

    #[test]
    fn challenge_provider_trait_object_works() {
        let bus = EventBus::new();
        let provider: &dyn ChallengeProvider = &bus;
        provider.broadcast_challenge(ChallengeAvailable { challenge: Hash32::ZERO, epoch: 1, start_time: 0 });
    }
}
