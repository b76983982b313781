//! # Transfer Policies
//!
//! A [`TransferPolicy`] decides under what conditions an asset of type `T`
//! may leave custody. The policy carries a set of [`RuleKind`]s; every
//! transfer produces a [`TransferRequest`] that must collect a stamp for
//! each rule before [`TransferPolicy::confirm`] will let it through.
//!
//! Administration is capability-gated: rules can only be added or removed
//! by presenting the [`PolicyCap`] created alongside the policy. The cap
//! is an unforgeable value: private fields, constructor-only creation,
//! compared by identity against the policy's record.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;
use uuid::Uuid;

use crate::ident::{AssetId, VaultId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from policy administration and transfer confirmation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The presented capability does not administer this policy.
    #[error("capability does not administer this transfer policy")]
    CapMismatch,

    /// A transfer request is missing the stamp for a required rule.
    #[error("transfer rule not satisfied: {0}")]
    RuleNotSatisfied(RuleKind),

    /// A lock proof was requested for an asset the vault does not hold
    /// in locked form.
    #[error("asset {0} is not locked in the vault")]
    AssetNotLocked(AssetId),
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The kinds of rules a transfer policy can require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleKind {
    /// The asset must be placed into locked custody at its destination;
    /// it can then only leave through another policy-confirmed transfer.
    Lock,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Lock => write!(f, "lock"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransferPolicy & PolicyCap
// ---------------------------------------------------------------------------

/// The transfer ruleset for asset type `T`.
#[derive(Debug)]
pub struct TransferPolicy<T> {
    id: Uuid,
    rules: BTreeSet<RuleKind>,
    _asset: PhantomData<fn() -> T>,
}

/// The unforgeable admin capability for one [`TransferPolicy`].
#[derive(Debug)]
pub struct PolicyCap<T> {
    policy_id: Uuid,
    _asset: PhantomData<fn() -> T>,
}

/// Creates a fresh, rule-free policy for asset type `T` together with its
/// admin capability. Naming the type parameter is the attestation that
/// the caller speaks for that asset type.
pub fn create_policy<T>() -> (TransferPolicy<T>, PolicyCap<T>) {
    let id = Uuid::new_v4();
    (
        TransferPolicy {
            id,
            rules: BTreeSet::new(),
            _asset: PhantomData,
        },
        PolicyCap {
            policy_id: id,
            _asset: PhantomData,
        },
    )
}

impl<T> TransferPolicy<T> {
    fn authorize(&self, cap: &PolicyCap<T>) -> Result<(), PolicyError> {
        if cap.policy_id != self.id {
            return Err(PolicyError::CapMismatch);
        }
        Ok(())
    }

    /// Adds a rule to the policy. Requires the admin capability.
    pub fn add_rule(&mut self, cap: &PolicyCap<T>, rule: RuleKind) -> Result<(), PolicyError> {
        self.authorize(cap)?;
        self.rules.insert(rule);
        Ok(())
    }

    /// Removes a rule from the policy. Requires the admin capability.
    pub fn remove_rule(&mut self, cap: &PolicyCap<T>, rule: RuleKind) -> Result<(), PolicyError> {
        self.authorize(cap)?;
        self.rules.remove(&rule);
        Ok(())
    }

    /// Returns `true` if the policy requires locked placement.
    pub fn has_lock_rule(&self) -> bool {
        self.rules.contains(&RuleKind::Lock)
    }

    /// Confirms a pending transfer, consuming the request.
    ///
    /// Every rule on the policy must have a matching stamp on the
    /// request; otherwise the transfer is rejected and the enclosing
    /// operation is expected to abort.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::RuleNotSatisfied`] naming the first rule
    /// without a stamp.
    pub fn confirm(&self, request: TransferRequest<T>) -> Result<Confirmation, PolicyError> {
        for rule in &self.rules {
            if !request.stamps.contains(rule) {
                return Err(PolicyError::RuleNotSatisfied(*rule));
            }
        }
        Ok(Confirmation {
            asset_id: request.asset_id,
            paid: request.paid,
            from: request.from,
        })
    }
}

// ---------------------------------------------------------------------------
// TransferRequest & Confirmation
// ---------------------------------------------------------------------------

/// A pending transfer awaiting policy confirmation.
///
/// Created by the vault when an asset is acquired out of custody; carries
/// the price paid and the source vault so rules can inspect the terms.
/// Move-only: it is either confirmed or the transfer never completes.
#[derive(Debug)]
pub struct TransferRequest<T> {
    asset_id: AssetId,
    paid: u64,
    from: VaultId,
    stamps: BTreeSet<RuleKind>,
    _asset: PhantomData<fn() -> T>,
}

impl<T> TransferRequest<T> {
    pub(crate) fn new(asset_id: AssetId, paid: u64, from: VaultId) -> Self {
        Self {
            asset_id,
            paid,
            from,
            stamps: BTreeSet::new(),
            _asset: PhantomData,
        }
    }

    /// The asset being transferred.
    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    /// The price paid in the acquiring transfer.
    pub fn paid(&self) -> u64 {
        self.paid
    }

    /// The vault the asset came from.
    pub fn from(&self) -> VaultId {
        self.from
    }

    pub(crate) fn add_stamp(&mut self, rule: RuleKind) {
        self.stamps.insert(rule);
    }
}

/// Proof that a transfer satisfied its policy.
#[derive(Clone, Copy, Debug)]
pub struct Confirmation {
    /// The asset that changed custody.
    pub asset_id: AssetId,
    /// The price paid.
    pub paid: u64,
    /// The vault the asset left.
    pub from: VaultId,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn empty_policy_confirms_unstamped_request() {
        let (policy, _cap) = create_policy::<Widget>();
        let request = TransferRequest::<Widget>::new(AssetId::fresh(), 0, VaultId::fresh());
        let confirmation = policy.confirm(request).unwrap();
        assert_eq!(confirmation.paid, 0);
    }

    #[test]
    fn lock_rule_blocks_unstamped_request() {
        let (mut policy, cap) = create_policy::<Widget>();
        policy.add_rule(&cap, RuleKind::Lock).unwrap();
        assert!(policy.has_lock_rule());

        let request = TransferRequest::<Widget>::new(AssetId::fresh(), 10, VaultId::fresh());
        let result = policy.confirm(request);
        assert!(matches!(
            result,
            Err(PolicyError::RuleNotSatisfied(RuleKind::Lock))
        ));
    }

    #[test]
    fn stamped_request_passes_lock_rule() {
        let (mut policy, cap) = create_policy::<Widget>();
        policy.add_rule(&cap, RuleKind::Lock).unwrap();

        let mut request = TransferRequest::<Widget>::new(AssetId::fresh(), 10, VaultId::fresh());
        request.add_stamp(RuleKind::Lock);
        assert!(policy.confirm(request).is_ok());
    }

    #[test]
    fn foreign_cap_cannot_administer() {
        let (mut policy, _cap) = create_policy::<Widget>();
        let (_other_policy, other_cap) = create_policy::<Widget>();
        let result = policy.add_rule(&other_cap, RuleKind::Lock);
        assert!(matches!(result, Err(PolicyError::CapMismatch)));
        assert!(!policy.has_lock_rule());
    }

    #[test]
    fn rule_removal_is_cap_gated() {
        let (mut policy, cap) = create_policy::<Widget>();
        policy.add_rule(&cap, RuleKind::Lock).unwrap();
        policy.remove_rule(&cap, RuleKind::Lock).unwrap();
        assert!(!policy.has_lock_rule());
    }
}
