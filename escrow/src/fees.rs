//! # Fee Ledger
//!
//! One [`FeeLedger`] exists per asset type, created once during setup and
//! shared by every rental of that type. It records the fee rate in basis
//! points (immutable after creation) and accumulates the fees skimmed
//! from rental payments. There is no withdrawal operation;
//! collected value only grows.
//!
//! Fee math widens to `u128` before dividing so that
//! `total * fee_bp` cannot overflow even at `u64::MAX` totals, and the
//! result truncates (floors) back into `u64`.

use parking_lot::Mutex;
use std::sync::Arc;

use tessera_custody::coin::{Balance, Coin, CoinError};

use crate::error::RentalError;

/// Basis points in 100%.
pub const MAX_FEE_BP: u64 = 10_000;

// ---------------------------------------------------------------------------
// FeeLedger
// ---------------------------------------------------------------------------

/// The per-asset-type accumulator of collected rental fees.
#[derive(Debug)]
pub struct FeeLedger {
    collected: Balance,
    fee_bp: u64,
}

impl FeeLedger {
    fn new(fee_bp: u64) -> Result<Self, RentalError> {
        if fee_bp > MAX_FEE_BP {
            return Err(RentalError::InvalidFeeRate { bp: fee_bp });
        }
        Ok(Self {
            collected: Balance::new(),
            fee_bp,
        })
    }

    /// The fee rate in basis points.
    pub fn fee_bp(&self) -> u64 {
        self.fee_bp
    }

    /// Total fees collected so far.
    pub fn collected(&self) -> u64 {
        self.collected.value()
    }

    /// The fee owed on a rental total: `floor(total * fee_bp / 10000)`.
    ///
    /// Because `fee_bp <= 10_000`, the fee never exceeds the total.
    pub fn fee_for(&self, total: u64) -> u64 {
        ((total as u128 * self.fee_bp as u128) / MAX_FEE_BP as u128) as u64
    }

    fn collect(&mut self, fee: Coin) -> Result<u64, (CoinError, Coin)> {
        self.collected.absorb(fee)
    }
}

// ---------------------------------------------------------------------------
// SharedFeeLedger
// ---------------------------------------------------------------------------

/// A shared handle to one asset type's [`FeeLedger`].
///
/// Cloning shares the underlying ledger. Mutation happens only inside
/// this crate's rental operation; external holders can observe the rate
/// and the running total.
#[derive(Clone, Debug)]
pub struct SharedFeeLedger {
    inner: Arc<Mutex<FeeLedger>>,
}

impl SharedFeeLedger {
    /// Creates the shared fee ledger for an asset type.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::InvalidFeeRate`] if `fee_bp` exceeds
    /// 10,000 bp (100%).
    pub fn new(fee_bp: u64) -> Result<Self, RentalError> {
        Ok(Self {
            inner: Arc::new(Mutex::new(FeeLedger::new(fee_bp)?)),
        })
    }

    /// The fee rate in basis points.
    pub fn fee_bp(&self) -> u64 {
        self.inner.lock().fee_bp()
    }

    /// Total fees collected so far.
    pub fn collected(&self) -> u64 {
        self.inner.lock().collected()
    }

    /// The fee owed on a rental total.
    pub fn fee_for(&self, total: u64) -> u64 {
        self.inner.lock().fee_for(total)
    }

    pub(crate) fn collect(&self, fee: Coin) -> Result<u64, (CoinError, Coin)> {
        self.inner.lock().collect(fee)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
