//! Error types for the rental escrow protocol.
//!
//! Every protocol operation that can fail returns a [`RentalError`]. All
//! failures are fatal to the enclosing operation; nothing is retried
//! internally, and a failed operation has made no state change.

use std::fmt;
use thiserror::Error;

use tessera_custody::clock::Timestamp;
use tessera_custody::coin::CoinError;
use tessera_custody::ident::{AssetId, VaultId};
use tessera_custody::policy::PolicyError;
use tessera_custody::vault::VaultError;

use crate::receipt::BorrowReceipt;

/// Errors that can occur during rental escrow operations.
#[derive(Debug, Error)]
pub enum RentalError {
    /// The rental escrow extension is not installed on the vault.
    #[error("rental escrow is not installed on vault {vault}")]
    ExtensionNotInstalled {
        /// The vault missing the extension.
        vault: VaultId,
    },

    /// The presented capability does not control the vault.
    #[error("capability does not grant access to vault {vault}")]
    NotAuthorized {
        /// The vault that rejected the capability.
        vault: VaultId,
    },

    /// No escrow entry exists for the asset in the expected lifecycle
    /// state.
    #[error("no escrow entry for asset {0}")]
    AssetNotFound(AssetId),

    /// The asset is already under escrow and cannot be tracked twice.
    #[error("asset {0} is already under escrow")]
    AlreadyEscrowed(AssetId),

    /// The payment does not match the rental total exactly. No change is
    /// made; the payer supplies the exact amount or the rental aborts.
    #[error("exact payment required: paid {paid}, rental total is {required}")]
    InsufficientPayment {
        /// Value of the presented payment.
        paid: u64,
        /// The exact total the rental costs.
        required: u64,
    },

    /// `price_per_day * duration_days` would exceed the 64-bit range.
    #[error("rental price overflows: {price_per_day} per day over {duration_days} days")]
    PriceOverflow {
        /// The per-day price on the listing.
        price_per_day: u64,
        /// The listed duration in days.
        duration_days: u64,
    },

    /// The operation targeted a different vault than the escrow records
    /// require (wrong return destination, or a reclaim by a vault that is
    /// not the asset's origin).
    #[error("vault mismatch: expected {expected}, found {found}")]
    WrongVault {
        /// The vault the records point at.
        expected: VaultId,
        /// The vault the caller supplied.
        found: VaultId,
    },

    /// The rental period has not elapsed yet.
    #[error("rental not expired: now {now}, expires {expires}")]
    RentalNotExpired {
        /// The current time.
        now: Timestamp,
        /// When the rental period ends.
        expires: Timestamp,
    },

    /// The returned asset is not the one the receipt was issued for.
    #[error("returned asset {found} does not match receipt asset {expected}")]
    AssetMismatch {
        /// The asset the receipt obliges.
        expected: AssetId,
        /// The asset actually presented.
        found: AssetId,
    },

    /// The rental duration is outside the supported range.
    #[error("invalid rental duration: {days} days")]
    InvalidDuration {
        /// The rejected duration.
        days: u64,
    },

    /// The fee rate exceeds 10,000 basis points (100%).
    #[error("invalid fee rate: {bp} bp exceeds 10000")]
    InvalidFeeRate {
        /// The rejected rate.
        bp: u64,
    },

    /// A substrate vault operation failed.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// A transfer-policy confirmation failed.
    #[error("transfer policy error: {0}")]
    Policy(#[from] PolicyError),

    /// A coin operation failed.
    #[error("coin error: {0}")]
    Coin(#[from] CoinError),
}

/// A rejected asset return.
///
/// Returning an asset consumes both the asset and its receipt, so a
/// rejected return hands both back. The loan is still open and the
/// caller still owes the return, just not the one they attempted.
#[derive(Error)]
#[error("asset return rejected: {error}")]
pub struct ReturnRejected<T> {
    /// Why the return was rejected.
    pub error: RentalError,
    /// The asset, handed back untouched.
    pub asset: T,
    /// The receipt, still live and still owed.
    pub receipt: BorrowReceipt<T>,
}

impl<T> fmt::Debug for ReturnRejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnRejected")
            .field("error", &self.error)
            .field("asset_id", &self.receipt.asset_id())
            .finish_non_exhaustive()
    }
}
