//! Per-(motion, side) accumulator of voice credits and vote weight

use std::sync::{OnceLock, PoisonError, RwLock, RwLockWriteGuard};

use qv_common::{Address, Amount, MotionId, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::journal::{Journaled, Revertible};

/// Errors reported by a ballot box
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoxError {
    /// The caller is not the booth this box is bound to
    #[error("Unauthorized credit of {ballot_box} by {caller}")]
    Unauthorized { ballot_box: Address, caller: Address },

    /// A total would exceed 256 bits
    #[error("Overflow crediting {0}")]
    Overflow(Address),

    /// The box already has an owner
    #[error("Ballot box {0} is already bound")]
    AlreadyBound(Address),
}

/// Result type for ballot box operations
pub type BoxResult<T> = Result<T, BoxError>;

/// Accumulated totals of a ballot box
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub voice_credits: Amount,
    pub votes: Amount,
}

/// A ballot box for one side of one motion.
///
/// Totals only ever grow, and only the owning booth may grow them.
#[derive(Debug)]
pub struct BallotBox {
    address: Address,
    side: Side,
    motion_id: MotionId,
    owner: OnceLock<Address>,
    totals: RwLock<Journaled<Tally>>,
}

impl BallotBox {
    /// Create an unbound, empty box
    pub fn new(address: Address, side: Side, motion_id: MotionId) -> Self {
        Self {
            address,
            side,
            motion_id,
            owner: OnceLock::new(),
            totals: RwLock::new(Journaled::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn motion_id(&self) -> MotionId {
        self.motion_id
    }

    /// The booth permitted to credit this box, once bound
    pub fn owner(&self) -> Option<Address> {
        self.owner.get().copied()
    }

    /// Bind the single authorised writer
    pub fn bind(&self, owner: Address) -> BoxResult<()> {
        self.owner
            .set(owner)
            .map_err(|_| BoxError::AlreadyBound(self.address))?;
        debug!("Ballot box {} bound to {}", self.address, owner);
        Ok(())
    }

    /// Add to both totals, returning the new tally
    pub fn credit(&self, caller: &Address, voice_credits: &Amount, votes: &Amount) -> BoxResult<Tally> {
        if self.owner.get() != Some(caller) {
            return Err(BoxError::Unauthorized {
                ballot_box: self.address,
                caller: *caller,
            });
        }

        let mut totals = self.totals_mut();
        let current = totals.get();
        let credited = Tally {
            voice_credits: current
                .voice_credits
                .checked_add(voice_credits)
                .ok_or(BoxError::Overflow(self.address))?,
            votes: current
                .votes
                .checked_add(votes)
                .ok_or(BoxError::Overflow(self.address))?,
        };
        totals.set(credited.clone());

        debug!(
            "Ballot box {} ({} on motion {}) now at {} credits, {} votes",
            self.address, self.side, self.motion_id, credited.voice_credits, credited.votes
        );
        Ok(credited)
    }

    /// Current totals
    pub fn tally(&self) -> Tally {
        self.totals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get()
            .clone()
    }

    fn totals_mut(&self) -> RwLockWriteGuard<'_, Journaled<Tally>> {
        self.totals.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Revertible for BallotBox {
    fn begin(&self) {
        self.totals_mut().begin();
    }

    fn commit(&self) {
        self.totals_mut().commit();
    }

    fn rollback(&self) {
        self.totals_mut().rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn ballot_box() -> BallotBox {
        BallotBox::new(addr(0xb0), Side::Yes, MotionId::new(4).unwrap())
    }

    #[test]
    fn test_credit_by_owner() {
        let bb = ballot_box();
        bb.bind(addr(1)).unwrap();

        bb.credit(&addr(1), &Amount::tokens(9), &Amount::tokens(3)).unwrap();
        let tally = bb.credit(&addr(1), &Amount::tokens(1), &Amount::tokens(1)).unwrap();

        assert_eq!(tally.voice_credits, Amount::tokens(10));
        assert_eq!(tally.votes, Amount::tokens(4));
        assert_eq!(bb.tally(), tally);
    }

    #[test]
    fn test_credit_unauthorized() {
        let bb = ballot_box();
        assert!(matches!(
            bb.credit(&addr(1), &Amount::tokens(1), &Amount::tokens(1)),
            Err(BoxError::Unauthorized { .. })
        ));

        bb.bind(addr(1)).unwrap();
        assert!(matches!(
            bb.credit(&addr(2), &Amount::tokens(1), &Amount::tokens(1)),
            Err(BoxError::Unauthorized { .. })
        ));
        assert_eq!(bb.tally(), Tally::default());
    }

    #[test]
    fn test_bind_once() {
        let bb = ballot_box();
        bb.bind(addr(1)).unwrap();
        assert_eq!(bb.bind(addr(2)), Err(BoxError::AlreadyBound(addr(0xb0))));
        assert_eq!(bb.owner(), Some(addr(1)));
    }

    #[test]
    fn test_overflow_leaves_both_totals() {
        let bb = ballot_box();
        bb.bind(addr(1)).unwrap();
        bb.credit(&addr(1), &Amount::tokens(1), &Amount::max_value()).unwrap();

        let err = bb
            .credit(&addr(1), &Amount::tokens(1), &Amount::from(1u64))
            .unwrap_err();
        assert_eq!(err, BoxError::Overflow(addr(0xb0)));

        let tally = bb.tally();
        assert_eq!(tally.voice_credits, Amount::tokens(1));
        assert_eq!(tally.votes, Amount::max_value());
    }

    #[test]
    fn test_rollback_restores_totals() {
        let bb = ballot_box();
        bb.bind(addr(1)).unwrap();
        bb.credit(&addr(1), &Amount::tokens(4), &Amount::tokens(2)).unwrap();

        bb.begin();
        bb.credit(&addr(1), &Amount::tokens(9), &Amount::tokens(3)).unwrap();
        bb.credit(&addr(1), &Amount::tokens(1), &Amount::tokens(1)).unwrap();
        bb.rollback();

        assert_eq!(bb.tally().voice_credits, Amount::tokens(4));
        assert_eq!(bb.tally().votes, Amount::tokens(2));
    }
}
