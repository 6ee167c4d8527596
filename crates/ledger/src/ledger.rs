//! The sequential ledger the contracts live on
//!
//! Transactions are applied one at a time. Every registered contract journals
//! its writes while a transaction is open; if the transaction fails or a
//! contract panics, all of them are rolled back, so a failed call leaves no
//! observable effect.
//!
//! Contracts calling each other inside a transaction go to the contract
//! directly, never back through the ledger.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use qv_common::{Address, MotionId, Side};
use qv_deployer::motion::{ballot_box_params, voting_booth_params};
use qv_deployer::{AddressDeriver, TemplateId, TokenBindings};
use tracing::{debug, info, warn};

use crate::ballot_box::{BallotBox, Tally};
use crate::cards::BallotCards;
use crate::journal::Revertible;
use crate::token::FungibleToken;
use crate::voting_booth::{BallotReceipt, BallotRequest, BoothBindings, VotingBooth};
use crate::{LedgerError, LedgerResult};

#[derive(Default)]
struct Registry {
    journal: Vec<Arc<dyn Revertible>>,
    tokens: HashMap<Address, Arc<dyn FungibleToken>>,
    cards: HashMap<Address, Arc<dyn BallotCards>>,
    boxes: HashMap<Address, Arc<BallotBox>>,
    booths: HashMap<Address, Arc<VotingBooth>>,
}

impl Registry {
    fn contains(&self, address: &Address) -> bool {
        self.tokens.contains_key(address)
            || self.cards.contains_key(address)
            || self.boxes.contains_key(address)
            || self.booths.contains_key(address)
    }

    fn ensure_free(&self, address: &Address) -> LedgerResult<()> {
        if self.contains(address) {
            return Err(LedgerError::AlreadyDeployed(*address));
        }
        Ok(())
    }
}

/// A ledger of deployed booths, boxes, tokens and ballot cards
pub struct Ledger {
    deriver: AddressDeriver,
    /// Number of committed transactions
    sequencer: Mutex<u64>,
    registry: RwLock<Registry>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger using the built-in templates
    pub fn new() -> Self {
        Self::with_deriver(AddressDeriver::new())
    }

    /// Create an empty ledger deriving addresses with `deriver`
    pub fn with_deriver(deriver: AddressDeriver) -> Self {
        Self {
            deriver,
            sequencer: Mutex::new(0),
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// Number of committed transactions
    pub fn height(&self) -> u64 {
        *self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` as one transaction.
    ///
    /// Transactions are serialised. If `f` returns an error every registered
    /// contract is rolled back and the error is returned unchanged. If `f`
    /// panics the contracts are rolled back before the panic resumes.
    pub fn execute<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce() -> LedgerResult<T>,
    {
        let mut height = self.sequencer.lock().unwrap_or_else(PoisonError::into_inner);

        let contracts = self.registry().journal.clone();
        for contract in &contracts {
            contract.begin();
        }
        debug!("Opened transaction over {} contracts at height {}", contracts.len(), *height);

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                for contract in &contracts {
                    contract.commit();
                }
                *height += 1;
                Ok(value)
            }
            Ok(Err(e)) => {
                rollback(&contracts);
                warn!("Transaction reverted at height {}: {}", *height, e);
                Err(e)
            }
            Err(payload) => {
                rollback(&contracts);
                warn!("Transaction aborted at height {}, state rolled back", *height);
                drop(height);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Put a token contract on the ledger
    pub fn register_token<T>(&self, token: Arc<T>) -> LedgerResult<Arc<dyn FungibleToken>>
    where
        T: FungibleToken + Revertible + 'static,
    {
        let address = token.address();
        self.execute(|| {
            let mut registry = self.registry_mut();
            registry.ensure_free(&address)?;

            let journal: Arc<dyn Revertible> = token.clone();
            let handle: Arc<dyn FungibleToken> = token;
            registry.journal.push(journal);
            registry.tokens.insert(address, handle.clone());

            info!("Registered token {}", address);
            Ok(handle)
        })
    }

    /// Put a ballot-card registry on the ledger
    pub fn register_cards<C>(&self, cards: Arc<C>) -> LedgerResult<Arc<dyn BallotCards>>
    where
        C: BallotCards + Revertible + 'static,
    {
        let address = cards.address();
        self.execute(|| {
            let mut registry = self.registry_mut();
            registry.ensure_free(&address)?;

            let journal: Arc<dyn Revertible> = cards.clone();
            let handle: Arc<dyn BallotCards> = cards;
            registry.journal.push(journal);
            registry.cards.insert(address, handle.clone());

            info!("Registered ballot cards {}", address);
            Ok(handle)
        })
    }

    /// Deploy the ballot box for `side` of `motion` at its derived address
    pub fn deploy_ballot_box(&self, side: Side, motion: MotionId) -> LedgerResult<Arc<BallotBox>> {
        let deployment = self
            .deriver
            .derive_deployment(&TemplateId::ballot_box(), &ballot_box_params(side, motion))?;
        let address = deployment.address;

        self.execute(|| {
            let mut registry = self.registry_mut();
            registry.ensure_free(&address)?;

            let ballot_box = Arc::new(BallotBox::new(address, side, motion));
            let journal: Arc<dyn Revertible> = ballot_box.clone();
            registry.journal.push(journal);
            registry.boxes.insert(address, ballot_box.clone());

            info!("Deployed {} box for motion {} at {}", side, motion, address);
            Ok(ballot_box)
        })
    }

    /// Deploy, bind and activate the booth for `motion`.
    ///
    /// Both ballot boxes of the motion and the three token contracts must
    /// already be on the ledger.
    pub fn deploy_voting_booth(
        &self,
        motion: MotionId,
        voice_credits: Address,
        votes: Address,
        ballot_cards: Address,
    ) -> LedgerResult<Arc<VotingBooth>> {
        let box_address = |side| {
            self.deriver
                .derive_deployment(&TemplateId::ballot_box(), &ballot_box_params(side, motion))
                .map(|d| d.address)
        };
        let yes_address = box_address(Side::Yes)?;
        let no_address = box_address(Side::No)?;

        let tokens = TokenBindings {
            voice_credits,
            votes,
            ballot_cards,
        };
        let address = self
            .deriver
            .derive_deployment(
                &TemplateId::voting_booth(),
                &voting_booth_params(motion, yes_address, no_address, &tokens),
            )?
            .address;

        self.execute(|| {
            let mut registry = self.registry_mut();
            registry.ensure_free(&address)?;

            let bindings = BoothBindings {
                yes_box: lookup(&registry.boxes, &yes_address)?,
                no_box: lookup(&registry.boxes, &no_address)?,
                voice_credits: lookup(&registry.tokens, &voice_credits)?,
                votes: lookup(&registry.tokens, &votes)?,
                ballot_cards: lookup(&registry.cards, &ballot_cards)?,
            };

            let booth = Arc::new(VotingBooth::new(address, motion));
            booth.bind(bindings)?;
            booth.activate()?;
            registry.booths.insert(address, booth.clone());

            info!("Deployed booth for motion {} at {}", motion, address);
            Ok(booth)
        })
    }

    /// Cast a ballot through `booth` as one transaction
    pub fn cast_ballot(
        &self,
        caller: &Address,
        booth: &Address,
        request: &BallotRequest,
    ) -> LedgerResult<BallotReceipt> {
        let booth = self.booth(booth)?;
        let receipt = self.execute(|| Ok(booth.cast_ballot(caller, request)?))?;

        info!(
            "Ballot committed: card {} voted {} on motion {} ({} votes, {} credits)",
            receipt.card_id, receipt.side, receipt.motion_id, receipt.votes, receipt.voice_credits
        );
        Ok(receipt)
    }

    /// Current totals of the box at `address`
    pub fn tally(&self, address: &Address) -> LedgerResult<Tally> {
        Ok(self.ballot_box(address)?.tally())
    }

    pub fn booth(&self, address: &Address) -> LedgerResult<Arc<VotingBooth>> {
        lookup(&self.registry().booths, address)
    }

    pub fn ballot_box(&self, address: &Address) -> LedgerResult<Arc<BallotBox>> {
        lookup(&self.registry().boxes, address)
    }

    pub fn token(&self, address: &Address) -> LedgerResult<Arc<dyn FungibleToken>> {
        lookup(&self.registry().tokens, address)
    }

    pub fn cards(&self, address: &Address) -> LedgerResult<Arc<dyn BallotCards>> {
        lookup(&self.registry().cards, address)
    }
}

fn rollback(contracts: &[Arc<dyn Revertible>]) {
    for contract in contracts {
        contract.rollback();
    }
}

fn lookup<T: ?Sized>(contracts: &HashMap<Address, Arc<T>>, address: &Address) -> LedgerResult<Arc<T>> {
    contracts
        .get(address)
        .cloned()
        .ok_or(LedgerError::NotDeployed(*address))
}
