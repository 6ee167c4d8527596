//! Fungible token capability used for voice credits and votes

use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use qv_common::{Address, Amount};
use thiserror::Error;
use tracing::debug;

use crate::journal::{JournaledMap, Revertible};

/// Errors reported by a token contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The spender's allowance does not cover the transfer
    #[error("Insufficient allowance: {spender} may move {allowed} of {owner}'s tokens, needs {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowed: Amount,
        needed: Amount,
    },

    /// The owner's balance does not cover the transfer
    #[error("Insufficient balance: {owner} holds {balance}, needs {needed}")]
    InsufficientBalance {
        owner: Address,
        balance: Amount,
        needed: Amount,
    },

    /// The recipient's balance would exceed 256 bits
    #[error("Balance overflow for {0}")]
    Overflow(Address),
}

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;

/// A fungible token contract.
///
/// Every mutator takes the calling account explicitly; implementations must
/// not trust anything else to identify the caller.
pub trait FungibleToken: Send + Sync {
    /// Address of the token contract
    fn address(&self) -> Address;

    /// Current balance of `owner`
    fn balance_of(&self, owner: &Address) -> Amount;

    /// Amount `spender` may still move on behalf of `owner`
    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Move `amount` from `caller` to `to`
    fn transfer(&self, caller: &Address, to: &Address, amount: &Amount) -> TokenResult<()>;

    /// Move `amount` from `owner` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: &Amount,
    ) -> TokenResult<()>;

    /// Allow `spender` to move up to `amount` of `owner`'s tokens
    fn approve(&self, owner: &Address, spender: &Address, amount: &Amount) -> TokenResult<()>;
}

#[derive(Debug, Default)]
struct TokenState {
    balances: JournaledMap<Address, Amount>,
    allowances: JournaledMap<(Address, Address), Amount>,
}

impl TokenState {
    fn balance(&self, owner: &Address) -> Amount {
        self.balances.get(owner).cloned().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .cloned()
            .unwrap_or_default()
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: &Amount) -> TokenResult<()> {
        let from_balance = self.balance(from);
        let remaining = from_balance
            .checked_sub(amount)
            .ok_or_else(|| TokenError::InsufficientBalance {
                owner: *from,
                balance: from_balance.clone(),
                needed: amount.clone(),
            })?;

        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow(*to))?;

        self.balances.insert(*from, remaining);
        self.balances.insert(*to, credited);
        Ok(())
    }
}

/// An in-memory token with a fixed supply minted to its creator
pub struct SimpleToken {
    address: Address,
    symbol: String,
    total_supply: Amount,
    state: RwLock<TokenState>,
}

impl SimpleToken {
    /// Create a token, crediting the whole `supply` to `creator`
    pub fn new(address: Address, symbol: impl Into<String>, creator: Address, supply: Amount) -> Self {
        let mut state = TokenState::default();
        state.balances.insert(creator, supply.clone());

        Self {
            address,
            symbol: symbol.into(),
            total_supply: supply,
            state: RwLock::new(state),
        }
    }

    /// Ticker symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Fixed total supply
    pub fn total_supply(&self) -> &Amount {
        &self.total_supply
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&TokenState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl FungibleToken for SimpleToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, owner: &Address) -> Amount {
        self.read(|state| state.balance(owner))
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.read(|state| state.allowance(owner, spender))
    }

    fn transfer(&self, caller: &Address, to: &Address, amount: &Amount) -> TokenResult<()> {
        self.state_mut().move_balance(caller, to, amount)?;
        debug!("{}: {} -> {} ({})", self.symbol, caller, to, amount);
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: &Amount,
    ) -> TokenResult<()> {
        let mut state = self.state_mut();

        let allowed = state.allowance(owner, spender);
        let remaining = allowed
            .checked_sub(amount)
            .ok_or_else(|| TokenError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                allowed: allowed.clone(),
                needed: amount.clone(),
            })?;

        state.move_balance(owner, to, amount)?;
        state.allowances.insert((*owner, *spender), remaining);

        debug!(
            "{}: {} -> {} ({}) spent by {}",
            self.symbol, owner, to, amount, spender
        );
        Ok(())
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: &Amount) -> TokenResult<()> {
        self.state_mut()
            .allowances
            .insert((*owner, *spender), amount.clone());
        Ok(())
    }
}

impl Revertible for SimpleToken {
    fn begin(&self) {
        let mut state = self.state_mut();
        state.balances.begin();
        state.allowances.begin();
    }

    fn commit(&self) {
        let mut state = self.state_mut();
        state.balances.commit();
        state.allowances.commit();
    }

    fn rollback(&self) {
        let mut state = self.state_mut();
        state.balances.rollback();
        state.allowances.rollback();
    }
}
