//! # Borrow Receipt
//!
//! When a renter extracts the bare asset out of escrow, they receive a
//! [`BorrowReceipt`] alongside it. The receipt is the escrow's claim
//! check: it records the rental terms, where the asset came from, and
//! which vault it must be returned into.
//!
//! The receipt is a *linear* value. It cannot be cloned, it cannot be
//! serialized, and (the important part) it cannot be quietly dropped:
//! its drop guard panics unless the receipt was consumed by the return
//! operation. Extract-without-return therefore cannot complete as a
//! durable outcome; the enclosing logic either closes the loan or blows
//! up with it.

use std::fmt;
use std::marker::PhantomData;

use tessera_custody::clock::Timestamp;
use tessera_custody::ident::{AssetId, VaultId};

use crate::record::RentalTerms;

/// The terms carried by a receipt. All fields are plain copies of the
/// escrow record the receipt replaced.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ReceiptState {
    pub(crate) asset_id: AssetId,
    pub(crate) terms: RentalTerms,
    pub(crate) start_time: Timestamp,
    pub(crate) origin: VaultId,
    pub(crate) holder: VaultId,
}

/// Proof that an asset was extracted from escrow and is owed back.
///
/// Produced only by the borrow operation; consumed only by the return
/// operation. Dropping a live receipt panics.
#[must_use = "a borrow receipt must be consumed by returning the asset"]
pub struct BorrowReceipt<T> {
    state: ReceiptState,
    defused: bool,
    _asset: PhantomData<fn() -> T>,
}

impl<T> BorrowReceipt<T> {
    pub(crate) fn new(state: ReceiptState) -> Self {
        Self {
            state,
            defused: false,
            _asset: PhantomData,
        }
    }

    /// The asset this receipt obliges the holder to return.
    pub fn asset_id(&self) -> AssetId {
        self.state.asset_id
    }

    /// The rental terms in force.
    pub fn terms(&self) -> RentalTerms {
        self.state.terms
    }

    /// When the rental started.
    pub fn start_time(&self) -> Timestamp {
        self.state.start_time
    }

    /// The vault the asset was originally listed from.
    pub fn origin(&self) -> VaultId {
        self.state.origin
    }

    /// The vault the asset was extracted from, which is the only vault
    /// the return operation will accept.
    pub fn holder(&self) -> VaultId {
        self.state.holder
    }

    /// Consumes the receipt, defusing the drop guard. Only the return
    /// operation calls this.
    pub(crate) fn into_state(mut self) -> ReceiptState {
        self.defused = true;
        self.state
    }
}

impl<T> Drop for BorrowReceipt<T> {
    fn drop(&mut self) {
        if !self.defused && !std::thread::panicking() {
            panic!(
                "asset {} was extracted from escrow but never returned",
                self.state.asset_id
            );
        }
    }
}

impl<T> fmt::Debug for BorrowReceipt<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowReceipt")
            .field("asset_id", &self.state.asset_id)
            .field("holder", &self.state.holder)
            .field("defused", &self.defused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gem;

    fn receipt() -> BorrowReceipt<Gem> {
        BorrowReceipt::new(ReceiptState {
            asset_id: AssetId::fresh(),
            terms: RentalTerms {
                duration_days: 3,
                price_per_day: 100,
            },
            start_time: Timestamp::from_millis(1_000),
            origin: VaultId::fresh(),
            holder: VaultId::fresh(),
        })
    }

    #[test]
    fn accessors_expose_the_terms() {
        let r = receipt();
        assert_eq!(r.terms().duration_days, 3);
        assert_eq!(r.start_time(), Timestamp::from_millis(1_000));
        assert_ne!(r.origin(), r.holder());
        let _ = r.into_state();
    }

    #[test]
    #[should_panic(expected = "never returned")]
    fn dropping_a_live_receipt_panics() {
        let r = receipt();
        drop(r);
    }

    #[test]
    fn consumed_receipt_drops_quietly() {
        let r = receipt();
        let state = r.into_state();
        assert_eq!(state.terms.price_per_day, 100);
    }
}
