//! Quadratic voting ledger
//!
//! Ballot boxes accumulate voice credits and vote weight for one side of a
//! motion; voting booths consume single-use ballot cards, price votes
//! quadratically and route the payment into the chosen box. Every call runs
//! as a transaction on the sequential [`Ledger`], which reverts all contract
//! state when a transaction fails.

use thiserror::Error;

use qv_common::Address;
use qv_deployer::DeriveError;

pub mod ballot_box;
pub mod cards;
pub mod journal;
pub mod ledger;
pub mod quadratic;
pub mod token;
pub mod voting_booth;

pub use ballot_box::{BallotBox, BoxError, BoxResult, Tally};
pub use cards::{BallotCards, CardError, CardId, CardResult, MutableDataCards};
pub use journal::{Journaled, JournaledMap, Revertible};
pub use ledger::Ledger;
pub use quadratic::quadratic_cost;
pub use token::{FungibleToken, SimpleToken, TokenError, TokenResult};
pub use voting_booth::{
    BallotReceipt, BallotRequest, BoothBindings, BoothError, BoothResult, BoothStatus, VotingBooth,
};

/// Error types for ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Error deriving a deployment address
    #[error("Derivation error: {0}")]
    Derive(#[from] DeriveError),

    /// Error from a voting booth
    #[error("Booth error: {0}")]
    Booth(#[from] BoothError),

    /// Error from a ballot box
    #[error("Ballot box error: {0}")]
    BallotBox(#[from] BoxError),

    /// Error from a token contract
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Error from the ballot-card registry
    #[error("Ballot card error: {0}")]
    Card(#[from] CardError),

    /// A contract already lives at this address
    #[error("Already deployed: {0}")]
    AlreadyDeployed(Address),

    /// No contract lives at this address
    #[error("Not deployed: {0}")]
    NotDeployed(Address),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for qv_common::Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Derive(e) => e.into(),
            LedgerError::NotDeployed(_) => qv_common::Error::not_found(err.to_string()),
            LedgerError::BallotBox(BoxError::Unauthorized { .. })
            | LedgerError::Booth(BoothError::Unauthorized(_))
            | LedgerError::Booth(BoothError::InvalidCredential { .. }) => {
                qv_common::Error::unauthorized(err.to_string())
            }
            _ => qv_common::Error::validation(err.to_string()),
        }
    }
}
