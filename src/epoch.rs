//! EpochManager: tracks `(epoch, challenge, start_time)` behind a single
//! lock (spec §5: "EpochManager holds (epoch, challenge, start_time)
//! guarded by a single lock; all accessors take it").
//!
//! Grounded on the teacher's `sync_lock::RwLock` (writer-preferring lock
//! wrapping `tokio::sync::RwLock`, exposing both blocking and async
//! accessors) — the same primitive the teacher already uses to guard its
//! mining-loop shared state.

use crate::challenge;
use crate::error::ArgumentError;
use crate::primitives::{Epoch, Hash32};
use crate::sync_lock::RwLock;

#[derive(Debug, Clone, Copy)]
struct EpochState {
    epoch: Epoch,
    challenge: Hash32,
    start_time: i64,
}

/// Tracks the current epoch/challenge/start-time triple and rotates it
/// forward as new parent blocks arrive.
pub struct EpochManager {
    state: RwLock<EpochState>,
    epoch_duration_s: i64,
}

impl EpochManager {
    /// `epoch_duration_s` must be in `[1, 3600]` per spec §6's
    /// `EpochConfig` constraint.
    pub fn new(genesis_challenge: Hash32, genesis_time: i64, epoch_duration_s: i64) -> Result<Self, ArgumentError> {
        if !(1..=3600).contains(&epoch_duration_s) {
            return Err(ArgumentError::InvalidArgument(format!(
                "epoch_duration_s must be in [1, 3600], got {epoch_duration_s}"
            )));
        }
        Ok(Self {
            state: RwLock::new(EpochState { epoch: 0, challenge: genesis_challenge, start_time: genesis_time }),
            epoch_duration_s,
        })
    }

    pub fn current_epoch(&self) -> Epoch {
        self.state.read().epoch
    }

    pub fn current_challenge(&self) -> Hash32 {
        self.state.read().challenge
    }

    pub fn epoch_start_time(&self) -> i64 {
        self.state.read().start_time
    }

    pub fn epoch_duration_s(&self) -> i64 {
        self.epoch_duration_s
    }

    /// `true` once `now >= start_time + epoch_duration_s`.
    pub fn is_expired(&self, now: i64) -> bool {
        let s = self.state.read();
        now >= s.start_time + self.epoch_duration_s
    }

    /// Advances to `epoch + 1`, deriving the new challenge from
    /// `parent_hash` and recording `now` as the new epoch's start time.
    /// Returns the newly active `(epoch, challenge)`.
    pub fn advance(&self, parent_hash: Hash32, now: i64) -> Result<(Epoch, Hash32), ArgumentError> {
        let mut s = self.state.write();
        let next_epoch = s.epoch + 1;
        let next_challenge = challenge::derive_challenge(parent_hash, next_epoch)?;
        s.epoch = next_epoch;
        s.challenge = next_challenge;
        s.start_time = now;
        Ok((next_epoch, next_challenge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_epoch_duration() {
        assert!(EpochManager::new(Hash32::ZERO, 0, 0).is_err());
        assert!(EpochManager::new(Hash32::ZERO, 0, 3601).is_err());
    }

    #[test]
    fn starts_at_epoch_zero_with_genesis_challenge() {
        let genesis = Hash32([1u8; 32]);
        let mgr = EpochManager::new(genesis, 100, 60).unwrap();
        assert_eq!(mgr.current_epoch(), 0);
        assert_eq!(mgr.current_challenge(), genesis);
        assert_eq!(mgr.epoch_start_time(), 100);
    }

    #[test]
    fn advance_derives_challenge_from_parent_and_next_epoch() {
        let mgr = EpochManager::new(Hash32::ZERO, 0, 60).unwrap();
        let parent = Hash32([2u8; 32]);
        let (epoch, chal) = mgr.advance(parent, 60).unwrap();
        assert_eq!(epoch, 1);
        assert_eq!(chal, challenge::derive_challenge(parent, 1).unwrap());
        assert_eq!(mgr.epoch_start_time(), 60);
    }

    #[test]
    fn is_expired_respects_duration() {
        let mgr = EpochManager::new(Hash32::ZERO, 0, 60).unwrap();
        assert!(!mgr.is_expired(59));
        assert!(mgr.is_expired(60));
        assert!(mgr.is_expired(1000));
    }

    #[test]
    fn successive_advances_keep_strictly_increasing_epochs() {
        let mgr = EpochManager::new(Hash32::ZERO, 0, 60).unwrap();
        let (e1, _) = mgr.advance(Hash32([1u8; 32]), 60).unwrap();
        let (e2, _) = mgr.advance(Hash32([2u8; 32]), 120).unwrap();
        assert!(e2 > e1);
    }
}
