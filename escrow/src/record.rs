//! # Escrow Record
//!
//! [`EscrowRecord`] is the unit of custody inside the escrow: the asset
//! itself, the rental terms it was listed under, the lifecycle timestamp,
//! and the vault it must ultimately go home to. A record exists exactly
//! while the escrow holds the asset: it is created on listing (and on a
//! receipt-backed return) and unwrapped on delisting, extraction, and
//! reclaim.
//!
//! Lifecycle invariant: `start_time` is `None` exactly while the record
//! sits under a `Listed` registry key and `Some` exactly while it sits
//! under a `Rented` key.

use serde::{Deserialize, Serialize};
use std::fmt;

use tessera_custody::clock::{Timestamp, MS_PER_DAY};
use tessera_custody::ident::{AssetId, UniqueAsset, VaultId};

use crate::error::RentalError;

// ---------------------------------------------------------------------------
// RentalTerms
// ---------------------------------------------------------------------------

/// The price and duration an asset is listed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalTerms {
    /// Rental duration in whole days.
    pub duration_days: u64,
    /// Price per day in smallest coin units.
    pub price_per_day: u64,
}

impl RentalTerms {
    /// The exact total a renter must pay: `price_per_day * duration_days`.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::PriceOverflow`] if the product exceeds the
    /// 64-bit range.
    pub fn total_price(&self) -> Result<u64, RentalError> {
        self.price_per_day
            .checked_mul(self.duration_days)
            .ok_or(RentalError::PriceOverflow {
                price_per_day: self.price_per_day,
                duration_days: self.duration_days,
            })
    }

    /// The rental duration in milliseconds.
    ///
    /// Durations are bounded at listing time, well below the overflow
    /// horizon of this conversion, so saturation never engages in
    /// practice.
    pub fn duration_millis(&self) -> u64 {
        self.duration_days.saturating_mul(MS_PER_DAY)
    }
}

// ---------------------------------------------------------------------------
// EscrowRecord
// ---------------------------------------------------------------------------

/// An asset under escrow custody, together with its rental terms.
pub struct EscrowRecord<T> {
    asset: T,
    terms: RentalTerms,
    start_time: Option<Timestamp>,
    origin: VaultId,
}

impl<T: UniqueAsset> EscrowRecord<T> {
    /// Wraps a freshly listed asset. The rental clock has not started.
    pub(crate) fn listed(asset: T, terms: RentalTerms, origin: VaultId) -> Self {
        Self::restore(asset, terms, None, origin)
    }

    /// Rebuilds a record from unwrapped parts (receipt-backed returns and
    /// aborted-operation restore paths).
    pub(crate) fn restore(
        asset: T,
        terms: RentalTerms,
        start_time: Option<Timestamp>,
        origin: VaultId,
    ) -> Self {
        Self {
            asset,
            terms,
            start_time,
            origin,
        }
    }

    /// The wrapped asset.
    pub fn asset(&self) -> &T {
        &self.asset
    }

    /// The wrapped asset's id.
    pub fn asset_id(&self) -> AssetId {
        self.asset.id()
    }

    /// The rental terms the asset was listed under.
    pub fn terms(&self) -> RentalTerms {
        self.terms
    }

    /// When the current rental started, if one is running.
    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    /// The vault the asset was listed from and must return to.
    pub fn origin(&self) -> VaultId {
        self.origin
    }

    /// `true` while the record is in the listed state (clock not
    /// started).
    pub fn is_listed(&self) -> bool {
        self.start_time.is_none()
    }

    /// `true` while the record is in the rented state (clock running).
    pub fn is_rented(&self) -> bool {
        self.start_time.is_some()
    }

    /// When the running rental expires, or `None` if the clock has not
    /// started.
    pub fn expiry(&self) -> Option<Timestamp> {
        self.start_time
            .map(|start| start.saturating_add_millis(self.terms.duration_millis()))
    }

    /// Starts the rental clock.
    pub(crate) fn begin_rental(&mut self, now: Timestamp) {
        self.start_time = Some(now);
    }

    /// Unwraps the record into the bare asset, discarding the terms.
    pub(crate) fn into_asset(self) -> T {
        self.asset
    }

    /// Unwraps the record into all of its parts.
    pub(crate) fn into_parts(self) -> (T, RentalTerms, Option<Timestamp>, VaultId) {
        (self.asset, self.terms, self.start_time, self.origin)
    }
}

impl<T: UniqueAsset> fmt::Debug for EscrowRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscrowRecord")
            .field("asset_id", &self.asset_id())
            .field("terms", &self.terms)
            .field("start_time", &self.start_time)
            .field("origin", &self.origin)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Gem {
        id: AssetId,
    }

    impl UniqueAsset for Gem {
        fn id(&self) -> AssetId {
            self.id
        }
    }

    fn terms(duration_days: u64, price_per_day: u64) -> RentalTerms {
        RentalTerms {
            duration_days,
            price_per_day,
        }
    }

    #[test]
    fn total_price_multiplies_exactly() {
        assert_eq!(terms(3, 100).total_price().unwrap(), 300);
        assert_eq!(terms(1, 0).total_price().unwrap(), 0);
    }

    #[test]
    fn total_price_overflow_detected() {
        let result = terms(3, u64::MAX / 2).total_price();
        assert!(matches!(
            result,
            Err(RentalError::PriceOverflow {
                duration_days: 3,
                ..
            })
        ));
        // The exact boundary still fits.
        assert_eq!(
            terms(3, u64::MAX / 3).total_price().unwrap(),
            (u64::MAX / 3) * 3
        );
    }

    #[test]
    fn listed_record_has_no_start_time() {
        let record = EscrowRecord::listed(
            Gem { id: AssetId::fresh() },
            terms(3, 100),
            VaultId::fresh(),
        );
        assert!(record.is_listed());
        assert!(!record.is_rented());
        assert_eq!(record.start_time(), None);
        assert_eq!(record.expiry(), None);
    }

    #[test]
    fn begin_rental_starts_the_clock() {
        let mut record = EscrowRecord::listed(
            Gem { id: AssetId::fresh() },
            terms(3, 100),
            VaultId::fresh(),
        );
        record.begin_rental(Timestamp::from_millis(1_000));
        assert!(record.is_rented());
        assert_eq!(record.start_time(), Some(Timestamp::from_millis(1_000)));
        assert_eq!(
            record.expiry(),
            Some(Timestamp::from_millis(1_000 + 3 * MS_PER_DAY))
        );
    }

    #[test]
    fn into_parts_preserves_everything() {
        let origin = VaultId::fresh();
        let asset_id = AssetId::fresh();
        let mut record = EscrowRecord::listed(Gem { id: asset_id }, terms(7, 50), origin);
        record.begin_rental(Timestamp::from_millis(42));

        let (asset, t, start, o) = record.into_parts();
        assert_eq!(asset.id(), asset_id);
        assert_eq!(t, terms(7, 50));
        assert_eq!(start, Some(Timestamp::from_millis(42)));
        assert_eq!(o, origin);
    }

    #[test]
    fn terms_serialization_roundtrip() {
        let t = terms(14, 250);
        let json = serde_json::to_string(&t).unwrap();
        let recovered: RentalTerms = serde_json::from_str(&json).unwrap();
        assert_eq!(t, recovered);
    }
}
