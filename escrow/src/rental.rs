//! # Rental Protocol -- the escrow state machine
//!
//! The six custody-transfer operations, plus setup and the extension
//! shim. Per asset, custody moves through four states:
//!
//! ```text
//!            list                rent                 borrow_asset
//!  Absent ─────────▶ Listed ─────────▶ Rented ◀───────────────▶ Extracted
//!    ▲                  │                 │      return_asset
//!    │      delist      │                 │
//!    ├──────────────────┘                 │
//!    │              reclaim               │
//!    └────────────────────────────────────┘
//! ```
//!
//! Every operation validates all of its preconditions before touching any
//! state, so a failure leaves the world exactly as it found it. The
//! registry removal and reinsertion inside `rent` and `return_asset` are
//! one logical step: the in-between failure arms are structurally dead
//! (presence is pre-checked under exclusive `&mut` access), and even
//! those arms restore custody rather than dropping an asset.

use tracing::{debug, info, warn};

use tessera_custody::clock::Clock;
use tessera_custody::coin::{Coin, CoinError, CoinLedger};
use tessera_custody::ident::{AssetId, UniqueAsset};
use tessera_custody::policy::TransferPolicy;
use tessera_custody::vault::{OwnerCap, Vault, VaultError, PERM_LOCK, PERM_PLACE};

use crate::error::{RentalError, ReturnRejected};
use crate::fees::SharedFeeLedger;
use crate::guard::SharedPolicyGuard;
use crate::receipt::{BorrowReceipt, ReceiptState};
use crate::record::{EscrowRecord, RentalTerms};
use crate::registry::{self, lift_vault_error, EscrowKey};

/// Permission bits the escrow requests at installation: it must be able
/// to place and to lock reclaimed assets back into owner vaults.
pub const EXTENSION_PERMISSIONS: u32 = PERM_PLACE | PERM_LOCK;

/// Upper bound on rental duration (one century). Keeps the day-to-
/// millisecond conversion far away from the overflow horizon.
pub const MAX_RENTAL_DAYS: u64 = 36_500;

// ---------------------------------------------------------------------------
// Shared preconditions
// ---------------------------------------------------------------------------

fn ensure_access<T: UniqueAsset>(vault: &Vault<T>, cap: &OwnerCap) -> Result<(), RentalError> {
    if !vault.has_access(cap) {
        return Err(RentalError::NotAuthorized { vault: vault.id() });
    }
    Ok(())
}

fn ensure_installed<T: UniqueAsset>(vault: &Vault<T>) -> Result<(), RentalError> {
    if !vault.is_extension_installed() {
        return Err(RentalError::ExtensionNotInstalled { vault: vault.id() });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Setup & installation shim
// ---------------------------------------------------------------------------

/// Creates the shared fee ledger and guarded policy for asset type `T`.
/// Called once per asset type, before any listing.
///
/// # Errors
///
/// Returns [`RentalError::InvalidFeeRate`] if `fee_bp` exceeds 10,000.
pub fn setup<T>(fee_bp: u64) -> Result<(SharedFeeLedger, SharedPolicyGuard<T>), RentalError> {
    let fees = SharedFeeLedger::new(fee_bp)?;
    info!(fee_bp, "rental escrow configured for asset type");
    Ok((fees, SharedPolicyGuard::new()))
}

/// Installs the rental escrow on a vault, granting it place and lock
/// permissions. Owner-capability gated.
pub fn install<T: UniqueAsset>(vault: &mut Vault<T>, cap: &OwnerCap) -> Result<(), RentalError> {
    ensure_access(vault, cap)?;
    vault
        .install_extension(cap, EXTENSION_PERMISSIONS)
        .map_err(lift_vault_error)?;
    info!(vault = %vault.id(), "rental escrow installed");
    Ok(())
}

/// Removes the rental escrow from a vault. Refused while any asset of
/// the owner's is still listed or rented through it.
pub fn uninstall<T: UniqueAsset>(vault: &mut Vault<T>, cap: &OwnerCap) -> Result<(), RentalError> {
    ensure_access(vault, cap)?;
    vault.remove_extension(cap).map_err(lift_vault_error)?;
    info!(vault = %vault.id(), "rental escrow removed");
    Ok(())
}

/// Whether the rental escrow is installed on a vault.
pub fn is_installed<T: UniqueAsset>(vault: &Vault<T>) -> bool {
    vault.is_extension_installed()
}

// ---------------------------------------------------------------------------
// list / delist
// ---------------------------------------------------------------------------

/// Lists an asset for rental: moves it out of the owner's direct custody
/// into the escrow registry, terms attached, clock not started.
///
/// **Absent → Listed.**
///
/// The transfer out of the vault happens at zero price and is confirmed
/// against the guarded policy, so public policy rules written for market
/// sales do not interfere and the policy admin capability stays sealed.
pub fn list<T>(
    vault: &mut Vault<T>,
    cap: &OwnerCap,
    guard: &SharedPolicyGuard<T>,
    asset_id: AssetId,
    duration_days: u64,
    price_per_day: u64,
) -> Result<(), RentalError>
where
    T: UniqueAsset + Send + 'static,
{
    ensure_access(vault, cap)?;
    ensure_installed(vault)?;
    if duration_days == 0 || duration_days > MAX_RENTAL_DAYS {
        return Err(RentalError::InvalidDuration {
            days: duration_days,
        });
    }
    if registry::contains(vault, &EscrowKey::Listed(asset_id))?
        || registry::contains(vault, &EscrowKey::Rented(asset_id))?
    {
        return Err(RentalError::AlreadyEscrowed(asset_id));
    }

    let (asset, request) = vault
        .acquire_at_price(cap, asset_id, 0)
        .map_err(lift_vault_error)?;
    let confirmation = guard.confirm(request)?;
    debug!(asset = %asset_id, paid = confirmation.paid, "internal transfer confirmed");

    let record = EscrowRecord::listed(
        asset,
        RentalTerms {
            duration_days,
            price_per_day,
        },
        vault.id(),
    );
    if let Err((error, record)) = registry::insert(vault, EscrowKey::Listed(asset_id), record) {
        // Dead arm: presence was checked above under exclusive access.
        restore_to_vault(vault, cap, record.into_asset());
        return Err(error);
    }

    info!(
        asset = %asset_id,
        vault = %vault.id(),
        duration_days,
        price_per_day,
        "asset listed for rental"
    );
    Ok(())
}

/// Takes a listed asset back off the market and into the owner's direct
/// custody, locked if the public policy carries a lock rule.
///
/// **Listed → Absent.**
pub fn delist<T>(
    vault: &mut Vault<T>,
    cap: &OwnerCap,
    policy: &TransferPolicy<T>,
    asset_id: AssetId,
) -> Result<(), RentalError>
where
    T: UniqueAsset + Send + 'static,
{
    ensure_access(vault, cap)?;
    ensure_installed(vault)?;

    let record = registry::remove(vault, &EscrowKey::Listed(asset_id))?;
    let (asset, terms, start_time, origin) = record.into_parts();

    let outcome = if policy.has_lock_rule() {
        vault.lock(cap, policy, asset)
    } else {
        vault.place(cap, asset)
    };
    if let Err((error, asset)) = outcome {
        // Dead arm: an escrowed asset cannot already sit in the vault and
        // the capability was validated above. Restore the listing.
        restore_record(
            vault,
            EscrowKey::Listed(asset_id),
            EscrowRecord::restore(asset, terms, start_time, origin),
        );
        return Err(lift_vault_error(error));
    }

    info!(asset = %asset_id, vault = %vault.id(), "asset delisted");
    Ok(())
}

// ---------------------------------------------------------------------------
// rent
// ---------------------------------------------------------------------------

/// Rents a listed asset: settles the exact payment (fee slice to the
/// shared ledger, remainder to the owner's address) and moves the asset
/// from the owner's registry into the renter's, clock started.
///
/// **Listed → Rented**, atomically with payment settlement.
pub fn rent<T>(
    owner_vault: &mut Vault<T>,
    renter_vault: &mut Vault<T>,
    fees: &SharedFeeLedger,
    payouts: &mut CoinLedger,
    asset_id: AssetId,
    payment: Coin,
    clock: &Clock,
) -> Result<(), RentalError>
where
    T: UniqueAsset + Send + 'static,
{
    ensure_installed(renter_vault)?;
    ensure_installed(owner_vault)?;
    let listed_key = EscrowKey::Listed(asset_id);
    let rented_key = EscrowKey::Rented(asset_id);

    let record = registry::get(owner_vault, &listed_key)?;
    let terms = record.terms();
    let total = terms.total_price()?;
    if payment.value() != total {
        return Err(RentalError::InsufficientPayment {
            paid: payment.value(),
            required: total,
        });
    }
    if registry::contains(renter_vault, &rented_key)? {
        return Err(RentalError::AlreadyEscrowed(asset_id));
    }

    // Settlement must not be able to fail once value or custody starts
    // moving; verify headroom at both destinations first.
    let fee = fees.fee_for(total);
    let payout = total - fee;
    if fees.collected().checked_add(fee).is_none() {
        return Err(RentalError::Coin(CoinError::Overflow {
            current: fees.collected(),
            incoming: fee,
        }));
    }
    let owner_address = owner_vault.owner();
    let owner_held = payouts.balance_of(&owner_address);
    if owner_held.checked_add(payout).is_none() {
        return Err(RentalError::Coin(CoinError::Overflow {
            current: owner_held,
            incoming: payout,
        }));
    }

    // Settle: fee slice into the shared ledger, remainder to the owner.
    let mut payment = payment;
    let fee_coin = payment.split(fee)?;
    if let Err((error, _fee_coin)) = fees.collect(fee_coin) {
        return Err(error.into());
    }
    if let Err((error, _payment)) = payouts.deposit(owner_address, payment) {
        return Err(error.into());
    }

    // Move custody: the listing leaves the owner's registry and enters
    // the renter's with the clock started.
    let mut record = registry::remove(owner_vault, &listed_key)?;
    let now = clock.now();
    record.begin_rental(now);
    if let Err((error, record)) = registry::insert(renter_vault, rented_key, record) {
        // Dead arm: absence was checked above under exclusive access.
        let (asset, terms, _start, origin) = record.into_parts();
        restore_record(
            owner_vault,
            listed_key,
            EscrowRecord::restore(asset, terms, None, origin),
        );
        return Err(error);
    }

    info!(
        asset = %asset_id,
        owner = %owner_vault.id(),
        renter = %renter_vault.id(),
        total,
        fee,
        start = %now,
        "asset rented"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// borrow / return
// ---------------------------------------------------------------------------

/// Extracts the bare asset out of the renter's escrow registry, issuing
/// the receipt that obliges its return. Capability-gated: only the
/// renter, acting as owner of their own vault, can extract.
///
/// **Rented → Extracted.** The receipt cannot be dropped; the only way
/// to dispose of it is [`return_asset`].
pub fn borrow_asset<T>(
    vault: &mut Vault<T>,
    cap: &OwnerCap,
    asset_id: AssetId,
) -> Result<(T, BorrowReceipt<T>), RentalError>
where
    T: UniqueAsset + Send + 'static,
{
    ensure_access(vault, cap)?;
    ensure_installed(vault)?;
    let rented_key = EscrowKey::Rented(asset_id);

    let record = registry::get(vault, &rented_key)?;
    // A record stored under a Rented key always carries a start time.
    let Some(start_time) = record.start_time() else {
        return Err(RentalError::AssetNotFound(asset_id));
    };

    let record = registry::remove(vault, &rented_key)?;
    let (asset, terms, _start, origin) = record.into_parts();
    let receipt = BorrowReceipt::new(ReceiptState {
        asset_id,
        terms,
        start_time,
        origin,
        holder: vault.id(),
    });

    debug!(asset = %asset_id, vault = %vault.id(), "asset extracted against receipt");
    Ok((asset, receipt))
}

/// Borrows the rented asset by reference, without extracting it.
/// Capability-gated like [`borrow_asset`], but custody never moves and
/// no receipt is issued.
pub fn borrowed_asset<'a, T>(
    vault: &'a Vault<T>,
    cap: &OwnerCap,
    asset_id: AssetId,
) -> Result<&'a T, RentalError>
where
    T: UniqueAsset + Send + 'static,
{
    ensure_access(vault, cap)?;
    ensure_installed(vault)?;
    let record = registry::get(vault, &EscrowKey::Rented(asset_id))?;
    Ok(record.asset())
}

/// Returns an extracted asset, consuming its receipt and restoring the
/// rented escrow entry with the original start time.
///
/// **Extracted → Rented.** This is the only operation that can consume a
/// receipt. A rejected return hands both the asset and the still-live
/// receipt back inside the error.
pub fn return_asset<T>(
    vault: &mut Vault<T>,
    asset: T,
    receipt: BorrowReceipt<T>,
) -> Result<(), ReturnRejected<T>>
where
    T: UniqueAsset + Send + 'static,
{
    let asset_id = receipt.asset_id();
    let failure = if !vault.is_extension_installed() {
        Some(RentalError::ExtensionNotInstalled { vault: vault.id() })
    } else if vault.id() != receipt.holder() {
        Some(RentalError::WrongVault {
            expected: receipt.holder(),
            found: vault.id(),
        })
    } else if asset.id() != asset_id {
        Some(RentalError::AssetMismatch {
            expected: asset_id,
            found: asset.id(),
        })
    } else {
        match registry::contains(vault, &EscrowKey::Rented(asset_id)) {
            Ok(true) => Some(RentalError::AlreadyEscrowed(asset_id)),
            Ok(false) => None,
            Err(error) => Some(error),
        }
    };
    if let Some(error) = failure {
        return Err(ReturnRejected {
            error,
            asset,
            receipt,
        });
    }

    let state = receipt.into_state();
    let record = EscrowRecord::restore(asset, state.terms, Some(state.start_time), state.origin);
    if let Err((error, record)) = registry::insert(vault, EscrowKey::Rented(asset_id), record) {
        // Dead arm: absence was checked above under exclusive access.
        // Re-arm the receipt so the obligation survives the rejection.
        return Err(ReturnRejected {
            error,
            asset: record.into_asset(),
            receipt: BorrowReceipt::new(state),
        });
    }

    info!(asset = %asset_id, vault = %vault.id(), "asset returned under receipt");
    Ok(())
}

// ---------------------------------------------------------------------------
// reclaim
// ---------------------------------------------------------------------------

/// Reclaims an expired rental: removes the rented entry from the
/// renter's registry and puts the bare asset back into the owner's vault
/// through the extension's managed placement, locked if the public
/// policy carries a lock rule.
///
/// **Rented → Absent.** Fails while `now <= start + duration`.
pub fn reclaim<T>(
    owner_vault: &mut Vault<T>,
    renter_vault: &mut Vault<T>,
    policy: &TransferPolicy<T>,
    asset_id: AssetId,
    clock: &Clock,
) -> Result<(), RentalError>
where
    T: UniqueAsset + Send + 'static,
{
    ensure_installed(owner_vault)?;
    ensure_installed(renter_vault)?;
    let rented_key = EscrowKey::Rented(asset_id);

    let record = registry::get(renter_vault, &rented_key)?;
    if record.origin() != owner_vault.id() {
        return Err(RentalError::WrongVault {
            expected: record.origin(),
            found: owner_vault.id(),
        });
    }
    // A record stored under a Rented key always carries a start time.
    let Some(expires) = record.expiry() else {
        return Err(RentalError::AssetNotFound(asset_id));
    };
    let now = clock.now();
    if now <= expires {
        return Err(RentalError::RentalNotExpired { now, expires });
    }
    // The owner-side placement must not be able to fail after removal.
    let required = if policy.has_lock_rule() {
        PERM_LOCK
    } else {
        PERM_PLACE
    };
    if !owner_vault.extension_permits(required) {
        return Err(RentalError::Vault(VaultError::PermissionDenied {
            vault: owner_vault.id(),
            required,
        }));
    }

    let record = registry::remove(renter_vault, &rented_key)?;
    let (asset, terms, start_time, origin) = record.into_parts();
    let outcome = if policy.has_lock_rule() {
        owner_vault.managed_lock(policy, asset)
    } else {
        owner_vault.managed_place(asset)
    };
    if let Err((error, asset)) = outcome {
        // Dead arm: permissions were checked above and a reclaimed asset
        // cannot already sit in the owner's vault. Restore the rental.
        restore_record(
            renter_vault,
            rented_key,
            EscrowRecord::restore(asset, terms, start_time, origin),
        );
        return Err(lift_vault_error(error));
    }

    info!(
        asset = %asset_id,
        owner = %owner_vault.id(),
        renter = %renter_vault.id(),
        now = %now,
        "asset reclaimed after rental expiry"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Restore helpers for the structurally-dead failure arms
// ---------------------------------------------------------------------------

fn restore_to_vault<T: UniqueAsset>(vault: &mut Vault<T>, cap: &OwnerCap, asset: T) {
    let asset_id = asset.id();
    if let Err((error, _asset)) = vault.place(cap, asset) {
        warn!(
            asset = %asset_id,
            error = %error,
            "could not restore asset to vault after aborted operation"
        );
    }
}

fn restore_record<T>(vault: &mut Vault<T>, key: EscrowKey, record: EscrowRecord<T>)
where
    T: UniqueAsset + Send + 'static,
{
    let asset_id = key.asset_id();
    if let Err((error, _record)) = registry::insert(vault, key, record) {
        warn!(
            asset = %asset_id,
            error = %error,
            "could not restore escrow record after aborted operation"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
