//! The per-motion voting booth
//!
//! A booth consumes one ballot card per caller, prices the requested vote
//! weight quadratically and pulls both the voice credits and the vote weight
//! from the caller into the ballot box of the chosen side.
//!
//! The card is marked as used before any token is moved. Token and card
//! contracts are untrusted: a nested call back into [`VotingBooth::cast_ballot`]
//! from inside a transfer sees the card already marked and is rejected.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use qv_common::{Address, Amount, CardData, MotionId, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ballot_box::{BallotBox, BoxError};
use crate::cards::{BallotCards, CardError, CardId};
use crate::quadratic::quadratic_cost;
use crate::token::{FungibleToken, TokenError};

/// Errors reported by a voting booth
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoothError {
    /// The booth is not accepting ballots
    #[error("Booth {booth} is not active ({status})")]
    NotActive { booth: Address, status: BoothStatus },

    /// The booth already has its bindings
    #[error("Booth {0} is already bound")]
    AlreadyBound(Address),

    /// A lifecycle step was requested out of order
    #[error("Booth {booth} cannot move from {from} to {to}")]
    InvalidTransition {
        booth: Address,
        from: BoothStatus,
        to: BoothStatus,
    },

    /// The supplied bindings do not describe this booth's motion
    #[error("Invalid binding: {0}")]
    InvalidBinding(String),

    /// The caller cannot use this card, or the booth cannot write it
    #[error("Invalid credential {card}: {reason}")]
    InvalidCredential { card: CardId, reason: String },

    /// The card's data is not what the caller expected, or it already voted here
    #[error("Ballot card {card} already used")]
    BallotAlreadyUsed { card: CardId },

    /// A token refused the transfer for lack of allowance
    #[error("Insufficient allowance: {0}")]
    InsufficientAllowance(TokenError),

    /// A token refused the transfer for lack of balance
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(TokenError),

    /// An amount does not fit in 256 bits
    #[error("Overflow: {0}")]
    Overflow(String),

    /// A ballot box rejected the booth as writer
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Result type for booth operations
pub type BoothResult<T> = Result<T, BoothError>;

impl From<TokenError> for BoothError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InsufficientAllowance { .. } => BoothError::InsufficientAllowance(err),
            TokenError::InsufficientBalance { .. } => BoothError::InsufficientBalance(err),
            TokenError::Overflow(_) => BoothError::Overflow(err.to_string()),
        }
    }
}

impl From<BoxError> for BoothError {
    fn from(err: BoxError) -> Self {
        match err {
            BoxError::Overflow(_) => BoothError::Overflow(err.to_string()),
            BoxError::Unauthorized { .. } | BoxError::AlreadyBound(_) => {
                BoothError::Unauthorized(err.to_string())
            }
        }
    }
}

fn invalid_credential(card: CardId, err: CardError) -> BoothError {
    BoothError::InvalidCredential {
        card,
        reason: err.to_string(),
    }
}

/// Lifecycle of a booth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoothStatus {
    /// Constructed, no references set
    Unbound,
    /// Boxes, tokens and cards set
    Bound,
    /// Accepting ballots
    Active,
}

impl fmt::Display for BoothStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoothStatus::Unbound => write!(f, "unbound"),
            BoothStatus::Bound => write!(f, "bound"),
            BoothStatus::Active => write!(f, "active"),
        }
    }
}

/// Everything a booth is bound to
#[derive(Clone)]
pub struct BoothBindings {
    pub yes_box: Arc<BallotBox>,
    pub no_box: Arc<BallotBox>,
    pub voice_credits: Arc<dyn FungibleToken>,
    pub votes: Arc<dyn FungibleToken>,
    pub ballot_cards: Arc<dyn BallotCards>,
}

impl BoothBindings {
    fn ballot_box(&self, side: Side) -> &Arc<BallotBox> {
        match side {
            Side::Yes => &self.yes_box,
            Side::No => &self.no_box,
        }
    }
}

/// A request to cast one ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotRequest {
    /// The ballot card to consume
    pub card_id: CardId,
    /// What the caller believes the card's data currently is
    pub expected_prior_data: CardData,
    /// Vote weight to buy, scaled by 10^18
    pub vote_weight: Amount,
    /// Side to vote for
    pub side: Side,
}

/// What a committed ballot moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotReceipt {
    pub motion_id: MotionId,
    pub side: Side,
    pub card_id: CardId,
    pub voice_credits: Amount,
    pub votes: Amount,
    /// The card's data after the ballot
    pub card_data: CardData,
}

/// A voting booth for one motion
pub struct VotingBooth {
    address: Address,
    motion_id: MotionId,
    bindings: OnceLock<BoothBindings>,
    status: RwLock<BoothStatus>,
}

impl fmt::Debug for VotingBooth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VotingBooth")
            .field("address", &self.address)
            .field("motion_id", &self.motion_id)
            .field("status", &self.status())
            .finish()
    }
}

impl VotingBooth {
    /// Create an unbound booth
    pub fn new(address: Address, motion_id: MotionId) -> Self {
        Self {
            address,
            motion_id,
            bindings: OnceLock::new(),
            status: RwLock::new(BoothStatus::Unbound),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn motion_id(&self) -> MotionId {
        self.motion_id
    }

    pub fn status(&self) -> BoothStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The booth's bindings, once bound
    pub fn bindings(&self) -> Option<&BoothBindings> {
        self.bindings.get()
    }

    /// Set the boxes, tokens and card registry this booth works with
    pub fn bind(&self, bindings: BoothBindings) -> BoothResult<()> {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if *status != BoothStatus::Unbound {
            return Err(BoothError::AlreadyBound(self.address));
        }

        self.check_box(&bindings.yes_box, Side::Yes)?;
        self.check_box(&bindings.no_box, Side::No)?;
        if self.motion_id.value() >= CardData::CAPACITY {
            return Err(BoothError::InvalidBinding(format!(
                "motion {} exceeds the {} motions a ballot card can record",
                self.motion_id,
                CardData::CAPACITY
            )));
        }

        self.bindings
            .set(bindings)
            .map_err(|_| BoothError::AlreadyBound(self.address))?;
        *status = BoothStatus::Bound;
        debug!("Booth {} bound for motion {}", self.address, self.motion_id);
        Ok(())
    }

    fn check_box(&self, ballot_box: &BallotBox, side: Side) -> BoothResult<()> {
        if ballot_box.side() != side {
            return Err(BoothError::InvalidBinding(format!(
                "{} box {} collects {} votes",
                side,
                ballot_box.address(),
                ballot_box.side()
            )));
        }
        if ballot_box.motion_id() != self.motion_id {
            return Err(BoothError::InvalidBinding(format!(
                "{} box {} belongs to motion {}, not {}",
                side,
                ballot_box.address(),
                ballot_box.motion_id(),
                self.motion_id
            )));
        }
        Ok(())
    }

    /// Take ownership of both boxes and start accepting ballots
    pub fn activate(&self) -> BoothResult<()> {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let bindings = match (*status, self.bindings.get()) {
            (BoothStatus::Bound, Some(bindings)) => bindings,
            (from, _) => {
                return Err(BoothError::InvalidTransition {
                    booth: self.address,
                    from,
                    to: BoothStatus::Active,
                })
            }
        };

        for ballot_box in [&bindings.yes_box, &bindings.no_box] {
            if let Some(owner) = ballot_box.owner() {
                return Err(BoothError::InvalidBinding(format!(
                    "ballot box {} is already owned by {}",
                    ballot_box.address(),
                    owner
                )));
            }
        }
        bindings.yes_box.bind(self.address)?;
        bindings.no_box.bind(self.address)?;

        *status = BoothStatus::Active;
        info!("Booth {} active for motion {}", self.address, self.motion_id);
        Ok(())
    }

    /// Cast a ballot on behalf of `caller`.
    ///
    /// A failure may leave earlier steps applied; callers must run this inside
    /// a transaction that reverts on error.
    pub fn cast_ballot(&self, caller: &Address, request: &BallotRequest) -> BoothResult<BallotReceipt> {
        let status = self.status();
        let bindings = match (status, self.bindings.get()) {
            (BoothStatus::Active, Some(bindings)) => bindings,
            _ => {
                return Err(BoothError::NotActive {
                    booth: self.address,
                    status,
                })
            }
        };
        let card = request.card_id;
        let cards = &bindings.ballot_cards;

        // Authorization
        if !cards
            .is_approved_or_owner(caller, card)
            .map_err(|e| invalid_credential(card, e))?
        {
            return Err(BoothError::InvalidCredential {
                card,
                reason: format!("{} neither owns nor operates the card", caller),
            });
        }
        if !cards
            .is_approved_or_owner(&self.address, card)
            .map_err(|e| invalid_credential(card, e))?
        {
            return Err(BoothError::InvalidCredential {
                card,
                reason: format!("booth {} is not approved to write the card", self.address),
            });
        }

        // Anti-replay
        let current = cards
            .read_data(card)
            .map_err(|e| invalid_credential(card, e))?;
        if current != request.expected_prior_data || current.is_marked(self.motion_id) {
            return Err(BoothError::BallotAlreadyUsed { card });
        }

        let cost = quadratic_cost(&request.vote_weight).ok_or_else(|| {
            BoothError::Overflow(format!("cost of vote weight {}", request.vote_weight))
        })?;

        // Mark used before any external transfer
        let used = current.marked(self.motion_id).ok_or_else(|| {
            BoothError::InvalidBinding(format!("motion {} cannot be recorded", self.motion_id))
        })?;
        cards
            .write_data(&self.address, card, used)
            .map_err(|e| invalid_credential(card, e))?;

        let target = bindings.ballot_box(request.side);
        bindings
            .voice_credits
            .transfer_from(&self.address, caller, &target.address(), &cost)?;
        bindings
            .votes
            .transfer_from(&self.address, caller, &target.address(), &request.vote_weight)?;
        target.credit(&self.address, &cost, &request.vote_weight)?;

        debug!(
            "Card {} voted {} on motion {} with weight {} for {} credits",
            card, request.side, self.motion_id, request.vote_weight, cost
        );

        Ok(BallotReceipt {
            motion_id: self.motion_id,
            side: request.side,
            card_id: card,
            voice_credits: cost,
            votes: request.vote_weight.clone(),
            card_data: used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::MutableDataCards;
    use crate::token::SimpleToken;

    const VOTER: Address = Address::new([0x0a; 20]);
    const BOOTH: Address = Address::new([0xb0; 20]);

    struct Fixture {
        booth: VotingBooth,
        bindings: BoothBindings,
        voice: Arc<SimpleToken>,
        cards: Arc<MutableDataCards>,
    }

    fn motion(id: u64) -> MotionId {
        MotionId::new(id).unwrap()
    }

    fn fixture(motion_id: u64) -> Fixture {
        let voice = Arc::new(SimpleToken::new(
            Address::new([0xc1; 20]),
            "VOICE",
            VOTER,
            Amount::tokens(400),
        ));
        let votes = Arc::new(SimpleToken::new(
            Address::new([0xc2; 20]),
            "VOTE",
            VOTER,
            Amount::tokens(400),
        ));
        let cards = Arc::new(MutableDataCards::new(Address::new([0xc3; 20])));
        cards.mint(&VOTER, 1).unwrap();
        cards.approve(&VOTER, &BOOTH, 1).unwrap();
        voice.approve(&VOTER, &BOOTH, &Amount::tokens(400)).unwrap();
        votes.approve(&VOTER, &BOOTH, &Amount::tokens(400)).unwrap();

        let bindings = BoothBindings {
            yes_box: Arc::new(BallotBox::new(Address::new([0x01; 20]), Side::Yes, motion(motion_id))),
            no_box: Arc::new(BallotBox::new(Address::new([0x02; 20]), Side::No, motion(motion_id))),
            voice_credits: voice.clone(),
            votes,
            ballot_cards: cards.clone(),
        };

        Fixture {
            booth: VotingBooth::new(BOOTH, motion(motion_id)),
            bindings,
            voice,
            cards,
        }
    }

    fn request(weight: u64, side: Side) -> BallotRequest {
        BallotRequest {
            card_id: 1,
            expected_prior_data: CardData::UNUSED,
            vote_weight: Amount::tokens(weight),
            side,
        }
    }

    #[test]
    fn test_lifecycle() {
        let f = fixture(2);
        assert_eq!(f.booth.status(), BoothStatus::Unbound);
        assert!(matches!(
            f.booth.activate(),
            Err(BoothError::InvalidTransition { .. })
        ));

        f.booth.bind(f.bindings.clone()).unwrap();
        assert_eq!(f.booth.status(), BoothStatus::Bound);
        assert_eq!(
            f.booth.bind(f.bindings.clone()),
            Err(BoothError::AlreadyBound(BOOTH))
        );

        f.booth.activate().unwrap();
        assert_eq!(f.booth.status(), BoothStatus::Active);
        assert_eq!(f.bindings.yes_box.owner(), Some(BOOTH));
        assert_eq!(f.bindings.no_box.owner(), Some(BOOTH));
    }

    #[test]
    fn test_bind_rejects_swapped_boxes() {
        let f = fixture(2);
        let mut swapped = f.bindings.clone();
        std::mem::swap(&mut swapped.yes_box, &mut swapped.no_box);

        assert!(matches!(
            f.booth.bind(swapped),
            Err(BoothError::InvalidBinding(_))
        ));
        assert_eq!(f.booth.status(), BoothStatus::Unbound);
    }

    #[test]
    fn test_bind_rejects_other_motion() {
        let f = fixture(2);
        let booth = VotingBooth::new(BOOTH, motion(3));
        assert!(matches!(
            booth.bind(f.bindings.clone()),
            Err(BoothError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_bind_rejects_motion_beyond_card_capacity() {
        let f = fixture(256);
        assert!(matches!(
            f.booth.bind(f.bindings.clone()),
            Err(BoothError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_cast_requires_active() {
        let f = fixture(0);
        f.booth.bind(f.bindings.clone()).unwrap();

        let err = f.booth.cast_ballot(&VOTER, &request(3, Side::Yes)).unwrap_err();
        assert_eq!(
            err,
            BoothError::NotActive {
                booth: BOOTH,
                status: BoothStatus::Bound
            }
        );
    }

    #[test]
    fn test_cast_ballot_routes_to_side() {
        let f = fixture(0);
        f.booth.bind(f.bindings.clone()).unwrap();
        f.booth.activate().unwrap();

        let receipt = f.booth.cast_ballot(&VOTER, &request(3, Side::No)).unwrap();
        assert_eq!(receipt.voice_credits, Amount::tokens(9));
        assert_eq!(receipt.votes, Amount::tokens(3));
        assert!(receipt.card_data.is_marked(motion(0)));

        let no = f.bindings.no_box.tally();
        assert_eq!(no.voice_credits, Amount::tokens(9));
        assert_eq!(no.votes, Amount::tokens(3));
        assert_eq!(f.bindings.yes_box.tally().votes, Amount::zero());
        assert_eq!(f.voice.balance_of(&VOTER), Amount::tokens(391));
        assert_eq!(f.voice.balance_of(&f.bindings.no_box.address()), Amount::tokens(9));
        assert_eq!(f.cards.read_data(1).unwrap(), receipt.card_data);
    }

    #[test]
    fn test_cast_rejects_stranger() {
        let f = fixture(0);
        f.booth.bind(f.bindings.clone()).unwrap();
        f.booth.activate().unwrap();

        let stranger = Address::new([0x0b; 20]);
        assert!(matches!(
            f.booth.cast_ballot(&stranger, &request(1, Side::Yes)),
            Err(BoothError::InvalidCredential { card: 1, .. })
        ));

        let mut unknown = request(1, Side::Yes);
        unknown.card_id = 99;
        assert!(matches!(
            f.booth.cast_ballot(&VOTER, &unknown),
            Err(BoothError::InvalidCredential { card: 99, .. })
        ));
    }

    #[test]
    fn test_cast_requires_booth_approval() {
        let f = fixture(0);
        f.booth.bind(f.bindings.clone()).unwrap();
        f.booth.activate().unwrap();
        f.cards.mint(&VOTER, 2).unwrap();

        let mut unapproved = request(1, Side::Yes);
        unapproved.card_id = 2;
        assert!(matches!(
            f.booth.cast_ballot(&VOTER, &unapproved),
            Err(BoothError::InvalidCredential { card: 2, .. })
        ));
        assert_eq!(f.cards.read_data(2).unwrap(), CardData::UNUSED);
    }

    #[test]
    fn test_cast_rejects_stale_expectation() {
        let f = fixture(0);
        f.booth.bind(f.bindings.clone()).unwrap();
        f.booth.activate().unwrap();

        let mut stale = request(1, Side::Yes);
        stale.expected_prior_data = CardData::UNUSED.marked(motion(9)).unwrap();
        assert_eq!(
            f.booth.cast_ballot(&VOTER, &stale),
            Err(BoothError::BallotAlreadyUsed { card: 1 })
        );
    }

    #[test]
    fn test_token_errors_map_to_booth_errors() {
        let owner = Address::new([1; 20]);
        let allowance = TokenError::InsufficientAllowance {
            owner,
            spender: BOOTH,
            allowed: Amount::zero(),
            needed: Amount::tokens(1),
        };
        assert_eq!(
            BoothError::from(allowance.clone()),
            BoothError::InsufficientAllowance(allowance)
        );

        let balance = TokenError::InsufficientBalance {
            owner,
            balance: Amount::zero(),
            needed: Amount::tokens(1),
        };
        assert!(matches!(
            BoothError::from(balance),
            BoothError::InsufficientBalance(_)
        ));
        assert!(matches!(
            BoothError::from(BoxError::Overflow(owner)),
            BoothError::Overflow(_)
        ));
    }
}
