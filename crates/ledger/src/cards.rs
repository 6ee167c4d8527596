//! Ballot cards: non-fungible credentials carrying one mutable data field

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use qv_common::{Address, CardData};
use thiserror::Error;
use tracing::{debug, info};

use crate::journal::{JournaledMap, Revertible};

/// Identifier of a ballot card
pub type CardId = u64;

/// Errors reported by a ballot-card registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    /// No card with this id exists
    #[error("Unknown card: {0}")]
    UnknownCard(CardId),

    /// A card with this id already exists
    #[error("Card already minted: {0}")]
    AlreadyMinted(CardId),

    /// The caller does not own the card
    #[error("{caller} does not own card {card}")]
    NotOwner { card: CardId, caller: Address },

    /// The caller neither owns nor operates the card
    #[error("{caller} is not approved for card {card}")]
    NotApproved { card: CardId, caller: Address },
}

/// Result type for ballot-card operations
pub type CardResult<T> = Result<T, CardError>;

/// A registry of ballot cards.
///
/// The data field of a card can only be rewritten by its owner or by the one
/// operator the owner approved for it.
pub trait BallotCards: Send + Sync {
    /// Address of the registry contract
    fn address(&self) -> Address;

    /// Current owner of `card`
    fn owner_of(&self, card: CardId) -> CardResult<Address>;

    /// Approve `operator` for `card`; only the owner may call this
    fn approve(&self, caller: &Address, operator: &Address, card: CardId) -> CardResult<()>;

    /// The operator currently approved for `card`
    fn get_approved(&self, card: CardId) -> CardResult<Option<Address>>;

    /// Whether `who` owns `card` or is its approved operator
    fn is_approved_or_owner(&self, who: &Address, card: CardId) -> CardResult<bool>;

    /// Read the data field of `card`
    fn read_data(&self, card: CardId) -> CardResult<CardData>;

    /// Overwrite the data field of `card`
    fn write_data(&self, caller: &Address, card: CardId, data: CardData) -> CardResult<()>;
}

#[derive(Debug, Clone)]
struct CardRecord {
    owner: Address,
    approved: Option<Address>,
    data: CardData,
}

impl CardRecord {
    fn controlled_by(&self, who: &Address) -> bool {
        self.owner == *who || self.approved.as_ref() == Some(who)
    }
}

#[derive(Debug, Default)]
struct CardsState {
    cards: JournaledMap<CardId, CardRecord>,
}

impl CardsState {
    fn record(&self, card: CardId) -> CardResult<&CardRecord> {
        self.cards.get(&card).ok_or(CardError::UnknownCard(card))
    }

    /// Apply `f` to a card `who` controls
    fn update_controlled<F>(&mut self, who: &Address, card: CardId, f: F) -> CardResult<()>
    where
        F: FnOnce(&mut CardRecord),
    {
        if !self.record(card)?.controlled_by(who) {
            return Err(CardError::NotApproved { card, caller: *who });
        }
        self.cards.update(&card, f);
        Ok(())
    }
}

/// An in-memory ballot-card registry
pub struct MutableDataCards {
    address: Address,
    state: RwLock<CardsState>,
}

impl MutableDataCards {
    /// Create an empty registry
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: RwLock::new(CardsState::default()),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, CardsState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, CardsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue card `card` to `to` with unused data
    pub fn mint(&self, to: &Address, card: CardId) -> CardResult<()> {
        let mut state = self.state_mut();
        if state.cards.contains_key(&card) {
            return Err(CardError::AlreadyMinted(card));
        }
        state.cards.insert(
            card,
            CardRecord {
                owner: *to,
                approved: None,
                data: CardData::UNUSED,
            },
        );
        info!("Minted ballot card {} to {}", card, to);
        Ok(())
    }

    /// Hand `card` to a new owner, clearing its approval; the data travels with the card
    pub fn transfer_card(&self, caller: &Address, to: &Address, card: CardId) -> CardResult<()> {
        self.state_mut().update_controlled(caller, card, |record| {
            record.owner = *to;
            record.approved = None;
        })
    }
}

impl BallotCards for MutableDataCards {
    fn address(&self) -> Address {
        self.address
    }

    fn owner_of(&self, card: CardId) -> CardResult<Address> {
        self.state().record(card).map(|r| r.owner)
    }

    fn approve(&self, caller: &Address, operator: &Address, card: CardId) -> CardResult<()> {
        let mut state = self.state_mut();
        if state.record(card)?.owner != *caller {
            return Err(CardError::NotOwner {
                card,
                caller: *caller,
            });
        }
        state.cards.update(&card, |record| record.approved = Some(*operator));
        Ok(())
    }

    fn get_approved(&self, card: CardId) -> CardResult<Option<Address>> {
        self.state().record(card).map(|r| r.approved)
    }

    fn is_approved_or_owner(&self, who: &Address, card: CardId) -> CardResult<bool> {
        self.state().record(card).map(|r| r.controlled_by(who))
    }

    fn read_data(&self, card: CardId) -> CardResult<CardData> {
        self.state().record(card).map(|r| r.data)
    }

    fn write_data(&self, caller: &Address, card: CardId, data: CardData) -> CardResult<()> {
        self.state_mut()
            .update_controlled(caller, card, |record| record.data = data)?;
        debug!("Card {} data set to {} by {}", card, data, caller);
        Ok(())
    }
}

impl Revertible for MutableDataCards {
    fn begin(&self) {
        self.state_mut().cards.begin();
    }

    fn commit(&self) {
        self.state_mut().cards.commit();
    }

    fn rollback(&self) {
        let mut state = self.state_mut();
        let undone = state.cards.pending();
        state.cards.rollback();
        if undone > 0 {
            debug!("Rolled back {} card writes", undone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qv_common::MotionId;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_mint_and_read() {
        let cards = MutableDataCards::new(addr(0xcc));
        cards.mint(&addr(1), 123).unwrap();

        assert_eq!(cards.owner_of(123).unwrap(), addr(1));
        assert_eq!(cards.read_data(123).unwrap(), CardData::UNUSED);
        assert_eq!(cards.mint(&addr(2), 123), Err(CardError::AlreadyMinted(123)));
        assert_eq!(cards.read_data(7), Err(CardError::UnknownCard(7)));
    }

    #[test]
    fn test_write_requires_owner_or_operator() {
        let cards = MutableDataCards::new(addr(0xcc));
        cards.mint(&addr(1), 5).unwrap();
        let used = CardData::UNUSED.marked(MotionId::new(0).unwrap()).unwrap();

        assert!(matches!(
            cards.write_data(&addr(9), 5, used),
            Err(CardError::NotApproved { .. })
        ));

        assert!(matches!(
            cards.approve(&addr(9), &addr(9), 5),
            Err(CardError::NotOwner { .. })
        ));
        cards.approve(&addr(1), &addr(9), 5).unwrap();
        assert_eq!(cards.get_approved(5).unwrap(), Some(addr(9)));
        assert!(cards.is_approved_or_owner(&addr(9), 5).unwrap());

        cards.write_data(&addr(9), 5, used).unwrap();
        assert_eq!(cards.read_data(5).unwrap(), used);
    }

    #[test]
    fn test_transfer_clears_approval() {
        let cards = MutableDataCards::new(addr(0xcc));
        cards.mint(&addr(1), 5).unwrap();
        cards.approve(&addr(1), &addr(9), 5).unwrap();

        cards.transfer_card(&addr(1), &addr(2), 5).unwrap();
        assert_eq!(cards.owner_of(5).unwrap(), addr(2));
        assert_eq!(cards.get_approved(5).unwrap(), None);
        assert!(!cards.is_approved_or_owner(&addr(1), 5).unwrap());
    }

    #[test]
    fn test_rollback_restores_data() {
        let cards = MutableDataCards::new(addr(0xcc));
        cards.mint(&addr(1), 5).unwrap();
        cards.begin();

        let used = CardData::UNUSED.marked(MotionId::new(3).unwrap()).unwrap();
        cards.write_data(&addr(1), 5, used).unwrap();
        cards.mint(&addr(2), 6).unwrap();
        cards.rollback();

        assert_eq!(cards.read_data(5).unwrap(), CardData::UNUSED);
        assert_eq!(cards.owner_of(6), Err(CardError::UnknownCard(6)));
    }
}
