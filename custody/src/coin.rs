//! # Coin -- Fungible Settlement Token
//!
//! [`Coin`] is the fungible currency the escrow protocol settles rentals
//! in. It is a *move-only* value: no `Clone`, no `Copy`, no `Deserialize`.
//! Any of those would be a mint. Value moves between coins only through
//! [`Coin::split`] and [`Coin::merge`], both of which conserve the total.
//!
//! [`Balance`] is a grow-only accumulator for protocol treasuries (fee
//! collection), and [`CoinLedger`] is the settlement ledger that records
//! per-address holdings, the destination of "transfer this coin to that
//! address".

use std::collections::HashMap;
use thiserror::Error;

use crate::ident::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when moving coin value around.
#[derive(Debug, Error)]
pub enum CoinError {
    /// Tried to split off more than the coin holds.
    #[error("split exceeds coin value: requested {requested}, available {available}")]
    SplitExceedsValue {
        /// Amount the caller asked to split off.
        requested: u64,
        /// Value actually held by the coin.
        available: u64,
    },

    /// A merge or deposit would overflow the 64-bit value range.
    #[error("coin value overflow: current {current}, incoming {incoming}")]
    Overflow {
        /// Value held before the failed operation.
        current: u64,
        /// Amount that caused the overflow.
        incoming: u64,
    },

    /// Tried to withdraw more than the address holds in the ledger.
    #[error("insufficient ledger balance for {address}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The address being debited.
        address: Address,
        /// Current holdings.
        available: u64,
        /// Amount requested.
        requested: u64,
    },
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// A fungible token holding a `u64` value in smallest units.
///
/// Not `Clone`, not `Copy`, and not serializable. A coin is created by
/// [`Coin::mint`] (the substrate's issuance boundary) and after that its
/// value only moves.
#[derive(Debug)]
pub struct Coin {
    value: u64,
}

impl Coin {
    /// Issues a new coin. This is the substrate's minting primitive; the
    /// escrow protocol itself never mints, it only splits and merges.
    pub fn mint(value: u64) -> Self {
        Self { value }
    }

    /// The value held by this coin.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Splits `amount` off into a new coin, leaving the remainder here.
    ///
    /// A zero-amount split is permitted and yields an empty coin; fee
    /// splits at a 0 bp rate rely on this.
    ///
    /// # Errors
    ///
    /// Returns [`CoinError::SplitExceedsValue`] if `amount` exceeds the
    /// coin's value.
    pub fn split(&mut self, amount: u64) -> Result<Coin, CoinError> {
        if amount > self.value {
            return Err(CoinError::SplitExceedsValue {
                requested: amount,
                available: self.value,
            });
        }
        self.value -= amount;
        Ok(Coin { value: amount })
    }

    /// Merges another coin into this one.
    ///
    /// # Errors
    ///
    /// Returns [`CoinError::Overflow`] if the combined value would exceed
    /// `u64::MAX`. The incoming coin is handed back inside the error so
    /// no value is lost on the failure path.
    pub fn merge(&mut self, other: Coin) -> Result<(), (CoinError, Coin)> {
        match self.value.checked_add(other.value) {
            Some(total) => {
                self.value = total;
                Ok(())
            }
            None => Err((
                CoinError::Overflow {
                    current: self.value,
                    incoming: other.value,
                },
                other,
            )),
        }
    }

    /// Consumes the coin, returning its value. The value is conceptually
    /// burned; use [`Balance::absorb`] or [`CoinLedger::deposit`] to keep
    /// it on the books instead.
    pub fn into_value(self) -> u64 {
        self.value
    }
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// A grow-only accumulator of coin value.
///
/// Used for protocol treasuries where value flows in and is observed but
/// never withdrawn through this type.
#[derive(Debug, Default)]
pub struct Balance {
    value: u64,
}

impl Balance {
    /// Creates an empty balance.
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated value.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Returns `true` if nothing has been absorbed yet.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Absorbs a coin into the balance, returning the new total.
    ///
    /// # Errors
    ///
    /// Returns [`CoinError::Overflow`] (with the coin handed back) if the
    /// balance would exceed `u64::MAX`.
    pub fn absorb(&mut self, coin: Coin) -> Result<u64, (CoinError, Coin)> {
        match self.value.checked_add(coin.value) {
            Some(total) => {
                self.value = total;
                Ok(total)
            }
            None => Err((
                CoinError::Overflow {
                    current: self.value,
                    incoming: coin.value,
                },
                coin,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// CoinLedger
// ---------------------------------------------------------------------------

/// The settlement ledger: who holds how much.
///
/// This is the concrete carrier of the "transfer coin to address"
/// primitive. Depositing consumes the coin and credits the address;
/// withdrawing mints a coin back out of the recorded holdings.
#[derive(Debug, Default)]
pub struct CoinLedger {
    accounts: HashMap<Address, u64>,
}

impl CoinLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holdings of an address. Unknown addresses hold zero.
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.accounts.get(address).copied().unwrap_or(0)
    }

    /// Deposits a coin to an address, returning the new holdings.
    ///
    /// # Errors
    ///
    /// Returns [`CoinError::Overflow`] (with the coin handed back) if the
    /// address's holdings would exceed `u64::MAX`.
    pub fn deposit(&mut self, address: Address, coin: Coin) -> Result<u64, (CoinError, Coin)> {
        let current = self.balance_of(&address);
        match current.checked_add(coin.value) {
            Some(total) => {
                self.accounts.insert(address, total);
                Ok(total)
            }
            None => Err((
                CoinError::Overflow {
                    current,
                    incoming: coin.value,
                },
                coin,
            )),
        }
    }

    /// Withdraws `amount` from an address's holdings as a fresh coin.
    ///
    /// # Errors
    ///
    /// Returns [`CoinError::InsufficientBalance`] if the address holds
    /// less than `amount`.
    pub fn withdraw(&mut self, address: Address, amount: u64) -> Result<Coin, CoinError> {
        let current = self.balance_of(&address);
        if amount > current {
            return Err(CoinError::InsufficientBalance {
                address,
                available: current,
                requested: amount,
            });
        }
        self.accounts.insert(address, current - amount);
        Ok(Coin { value: amount })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_conserves_value() {
        let mut coin = Coin::mint(1_000);
        let piece = coin.split(300).unwrap();
        assert_eq!(piece.value(), 300);
        assert_eq!(coin.value(), 700);
    }

    #[test]
    fn split_of_full_value_leaves_empty_coin() {
        let mut coin = Coin::mint(500);
        let piece = coin.split(500).unwrap();
        assert_eq!(piece.value(), 500);
        assert_eq!(coin.value(), 0);
    }

    #[test]
    fn zero_split_is_permitted() {
        let mut coin = Coin::mint(10);
        let piece = coin.split(0).unwrap();
        assert_eq!(piece.value(), 0);
        assert_eq!(coin.value(), 10);
    }

    #[test]
    fn oversplit_rejected() {
        let mut coin = Coin::mint(100);
        let result = coin.split(101);
        assert!(matches!(
            result,
            Err(CoinError::SplitExceedsValue {
                requested: 101,
                available: 100
            })
        ));
        // Failed split leaves the coin untouched.
        assert_eq!(coin.value(), 100);
    }

    #[test]
    fn merge_combines_values() {
        let mut a = Coin::mint(60);
        let b = Coin::mint(40);
        a.merge(b).unwrap();
        assert_eq!(a.value(), 100);
    }

    #[test]
    fn merge_overflow_hands_coin_back() {
        let mut a = Coin::mint(u64::MAX);
        let b = Coin::mint(1);
        let (error, returned) = a.merge(b).unwrap_err();
        assert!(matches!(error, CoinError::Overflow { .. }));
        assert_eq!(returned.value(), 1);
        assert_eq!(a.value(), u64::MAX);
    }

    #[test]
    fn balance_absorbs_and_grows() {
        let mut balance = Balance::new();
        assert!(balance.is_zero());
        balance.absorb(Coin::mint(15)).unwrap();
        balance.absorb(Coin::mint(5)).unwrap();
        assert_eq!(balance.value(), 20);
    }

    #[test]
    fn ledger_deposit_and_balance() {
        let mut ledger = CoinLedger::new();
        let alice = Address::fresh();
        assert_eq!(ledger.balance_of(&alice), 0);
        ledger.deposit(alice, Coin::mint(285)).unwrap();
        assert_eq!(ledger.balance_of(&alice), 285);
        ledger.deposit(alice, Coin::mint(15)).unwrap();
        assert_eq!(ledger.balance_of(&alice), 300);
    }

    #[test]
    fn ledger_withdraw_round_trip() {
        let mut ledger = CoinLedger::new();
        let alice = Address::fresh();
        ledger.deposit(alice, Coin::mint(100)).unwrap();
        let coin = ledger.withdraw(alice, 60).unwrap();
        assert_eq!(coin.value(), 60);
        assert_eq!(ledger.balance_of(&alice), 40);
    }

    #[test]
    fn ledger_overdraw_rejected() {
        let mut ledger = CoinLedger::new();
        let alice = Address::fresh();
        ledger.deposit(alice, Coin::mint(10)).unwrap();
        let result = ledger.withdraw(alice, 11);
        assert!(matches!(
            result,
            Err(CoinError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.balance_of(&alice), 10);
    }
}
