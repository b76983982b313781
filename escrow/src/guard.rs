//! # Guarded Policy Holder
//!
//! Listing an asset moves it through the substrate's transfer-request
//! machinery, which demands confirmation against a transfer policy. The
//! escrow cannot use the asset type's public policy for this, because its
//! rules (royalties, lock requirements) are written for market sales, not
//! for the zero-price internal transfer a listing performs. It also must not
//! hand anyone the admin capability that could rewrite rules out from
//! under running rentals.
//!
//! [`SharedPolicyGuard`] solves both: it creates a private, rule-free
//! policy together with its capability and seals them away. The only
//! thing the outside world can do with the guard is confirm a pending
//! transfer, which is exactly what listing needs.

use parking_lot::Mutex;
use std::sync::Arc;

use tessera_custody::policy::{
    create_policy, Confirmation, PolicyCap, PolicyError, TransferPolicy, TransferRequest,
};

struct PolicyGuard<T> {
    policy: TransferPolicy<T>,
    // Held so that no caller can ever reach it; the guarded policy's
    // ruleset is frozen for the lifetime of the escrow.
    _cap: PolicyCap<T>,
}

/// A shared handle to one asset type's guarded policy.
pub struct SharedPolicyGuard<T> {
    inner: Arc<Mutex<PolicyGuard<T>>>,
}

impl<T> Clone for SharedPolicyGuard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedPolicyGuard<T> {
    /// Creates the guarded policy for an asset type.
    pub fn new() -> Self {
        let (policy, cap) = create_policy::<T>();
        Self {
            inner: Arc::new(Mutex::new(PolicyGuard { policy, _cap: cap })),
        }
    }

    /// Confirms a pending transfer against the guarded policy.
    pub(crate) fn confirm(&self, request: TransferRequest<T>) -> Result<Confirmation, PolicyError> {
        self.inner.lock().policy.confirm(request)
    }
}

impl<T> Default for SharedPolicyGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_custody::ident::{Address, AssetId, UniqueAsset};
    use tessera_custody::vault::Vault;

    #[derive(Debug)]
    struct Gem {
        id: AssetId,
    }

    impl UniqueAsset for Gem {
        fn id(&self) -> AssetId {
            self.id
        }
    }

    #[test]
    fn guard_confirms_internal_transfers() {
        let guard = SharedPolicyGuard::<Gem>::new();
        let (mut vault, cap) = Vault::new(Address::fresh());
        let gem = Gem { id: AssetId::fresh() };
        let gem_id = gem.id();
        vault.place(&cap, gem).unwrap();

        let (_gem, request) = vault.acquire_at_price(&cap, gem_id, 0).unwrap();
        let confirmation = guard.confirm(request).unwrap();
        assert_eq!(confirmation.asset_id, gem_id);
        assert_eq!(confirmation.paid, 0);
    }

    #[test]
    fn clones_confirm_against_the_same_policy() {
        let guard = SharedPolicyGuard::<Gem>::new();
        let view = guard.clone();
        let (mut vault, cap) = Vault::new(Address::fresh());
        let gem = Gem { id: AssetId::fresh() };
        let gem_id = gem.id();
        vault.place(&cap, gem).unwrap();

        let (_gem, request) = vault.acquire_at_price(&cap, gem_id, 0).unwrap();
        assert!(view.confirm(request).is_ok());
    }
}
