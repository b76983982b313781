//! # Vault -- Capability-Gated Custody Container
//!
//! A [`Vault`] holds unique assets on behalf of one owner. Control is
//! proven by the [`OwnerCap`] created with the vault, an unforgeable
//! value compared by identity, never a caller-supplied boolean.
//!
//! Assets sit in the vault either *placed* (freely retrievable by the
//! owner) or *locked* (they can leave only through a policy-confirmed
//! transfer). Beyond item storage, a vault has one *extension slot*: a
//! protocol add-on installs itself with a set of permission bits and gets
//! private keyed storage plus, if permitted, the ability to place or lock
//! assets without holding the owner capability.
//!
//! API discipline for fallible consumers: any operation that takes an
//! asset by value hands it back inside the error, so a rejected call
//! never destroys custody.

mod extension;
mod store;

pub use extension::{PERM_LOCK, PERM_PLACE};
pub use store::{KeyedStore, OccupiedKey, StoreError};

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::ident::{Address, AssetId, UniqueAsset, VaultId};
use crate::policy::{PolicyError, RuleKind, TransferPolicy, TransferRequest};

use extension::Extension;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The presented capability does not control this vault.
    #[error("capability does not control vault {vault}")]
    NotAuthorized {
        /// The vault that rejected the capability.
        vault: VaultId,
    },

    /// The asset is not held by this vault.
    #[error("vault does not hold asset {asset}")]
    AssetNotHeld {
        /// The missing asset.
        asset: AssetId,
    },

    /// An asset with the same id is already held.
    #[error("vault already holds asset {asset}")]
    AssetAlreadyHeld {
        /// The conflicting asset id.
        asset: AssetId,
    },

    /// No extension is installed on this vault.
    #[error("no extension installed on vault {vault}")]
    ExtensionNotInstalled {
        /// The vault without an extension.
        vault: VaultId,
    },

    /// The extension slot is already occupied.
    #[error("an extension is already installed on vault {vault}")]
    ExtensionAlreadyInstalled {
        /// The vault with the occupied slot.
        vault: VaultId,
    },

    /// The installed extension lacks a required permission.
    #[error("extension on vault {vault} lacks permission bits {required:#04b}")]
    PermissionDenied {
        /// The vault whose extension was checked.
        vault: VaultId,
        /// The permission bits the operation needs.
        required: u32,
    },

    /// Extension removal was refused because its storage still holds
    /// entries.
    #[error("extension storage on vault {vault} still holds {entries} entries")]
    StorageNotEmpty {
        /// The vault whose extension was to be removed.
        vault: VaultId,
        /// Number of entries still present.
        entries: usize,
    },

    /// A keyed-store access failed.
    #[error("extension storage error: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// OwnerCap
// ---------------------------------------------------------------------------

/// The unforgeable token proving control over one specific vault.
///
/// Created only by [`Vault::new`]; there is no other constructor and no
/// way to deserialize one. Whoever holds the cap is the owner.
#[derive(Debug)]
pub struct OwnerCap {
    id: Uuid,
    vault_id: VaultId,
}

impl OwnerCap {
    /// The vault this capability controls.
    pub fn vault_id(&self) -> VaultId {
        self.vault_id
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

struct StoredItem<T> {
    asset: T,
    locked: bool,
}

/// An owner-controlled custody container for assets of type `T`.
pub struct Vault<T: UniqueAsset> {
    id: VaultId,
    owner: Address,
    cap_id: Uuid,
    items: HashMap<AssetId, StoredItem<T>>,
    extension: Option<Extension>,
}

impl<T: UniqueAsset> Vault<T> {
    /// Creates a vault owned by `owner`, returning it together with the
    /// only capability that will ever control it.
    pub fn new(owner: Address) -> (Self, OwnerCap) {
        let id = VaultId::fresh();
        let cap_id = Uuid::new_v4();
        let vault = Self {
            id,
            owner,
            cap_id,
            items: HashMap::new(),
            extension: None,
        };
        let cap = OwnerCap { id: cap_id, vault_id: id };
        (vault, cap)
    }

    /// The vault's identifier.
    pub fn id(&self) -> VaultId {
        self.id
    }

    /// The owner's payment address.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Returns `true` if `cap` controls this vault.
    pub fn has_access(&self, cap: &OwnerCap) -> bool {
        cap.vault_id == self.id && cap.id == self.cap_id
    }

    fn authorize(&self, cap: &OwnerCap) -> Result<(), VaultError> {
        if !self.has_access(cap) {
            return Err(VaultError::NotAuthorized { vault: self.id });
        }
        Ok(())
    }

    /// Returns `true` if the vault holds the asset (placed or locked).
    pub fn holds(&self, asset_id: &AssetId) -> bool {
        self.items.contains_key(asset_id)
    }

    /// Whether the held asset is locked; `None` if the asset is absent.
    pub fn is_locked(&self, asset_id: &AssetId) -> Option<bool> {
        self.items.get(asset_id).map(|item| item.locked)
    }

    fn store(&mut self, asset: T, locked: bool) -> Result<(), (VaultError, T)> {
        let asset_id = asset.id();
        if self.items.contains_key(&asset_id) {
            return Err((VaultError::AssetAlreadyHeld { asset: asset_id }, asset));
        }
        self.items.insert(asset_id, StoredItem { asset, locked });
        Ok(())
    }

    /// Places an asset into the vault. Owner-capability gated.
    pub fn place(&mut self, cap: &OwnerCap, asset: T) -> Result<(), (VaultError, T)> {
        if let Err(error) = self.authorize(cap) {
            return Err((error, asset));
        }
        self.store(asset, false)
    }

    /// Locks an asset into the vault. Owner-capability gated.
    ///
    /// The policy parameter attests that a transfer policy exists for the
    /// asset type. A locked asset can only leave custody through a
    /// policy-confirmed transfer, so locking without a policy would be a
    /// one-way door.
    pub fn lock(
        &mut self,
        cap: &OwnerCap,
        _policy: &TransferPolicy<T>,
        asset: T,
    ) -> Result<(), (VaultError, T)> {
        if let Err(error) = self.authorize(cap) {
            return Err((error, asset));
        }
        self.store(asset, true)
    }

    /// Acquires an asset out of custody at the given price, producing the
    /// pending [`TransferRequest`] that must be confirmed against the
    /// asset type's transfer policy before the transfer is final.
    ///
    /// Owner-capability gated; works on both placed and locked assets
    /// (the request/confirm step is what keeps locked assets honest).
    pub fn acquire_at_price(
        &mut self,
        cap: &OwnerCap,
        asset_id: AssetId,
        price: u64,
    ) -> Result<(T, TransferRequest<T>), VaultError> {
        self.authorize(cap)?;
        let item = self
            .items
            .remove(&asset_id)
            .ok_or(VaultError::AssetNotHeld { asset: asset_id })?;
        let request = TransferRequest::new(asset_id, price, self.id);
        Ok((item.asset, request))
    }

    /// Stamps the lock rule onto a pending transfer request, proving the
    /// named asset currently sits locked in this vault.
    pub fn prove_locked(&self, request: &mut TransferRequest<T>) -> Result<(), PolicyError> {
        match self.is_locked(&request.asset_id()) {
            Some(true) => {
                request.add_stamp(RuleKind::Lock);
                Ok(())
            }
            _ => Err(PolicyError::AssetNotLocked(request.asset_id())),
        }
    }

    // -----------------------------------------------------------------------
    // Extension slot
    // -----------------------------------------------------------------------

    /// Installs an extension with the given permission bits.
    pub fn install_extension(&mut self, cap: &OwnerCap, permissions: u32) -> Result<(), VaultError> {
        self.authorize(cap)?;
        if self.extension.is_some() {
            return Err(VaultError::ExtensionAlreadyInstalled { vault: self.id });
        }
        self.extension = Some(Extension::new(permissions));
        debug!(vault = %self.id, permissions, "extension installed");
        Ok(())
    }

    /// Removes the installed extension.
    ///
    /// # Errors
    ///
    /// Fails with [`VaultError::StorageNotEmpty`] while the extension's
    /// storage still holds entries; an extension cannot abandon state.
    pub fn remove_extension(&mut self, cap: &OwnerCap) -> Result<(), VaultError> {
        self.authorize(cap)?;
        let extension = self
            .extension
            .as_ref()
            .ok_or(VaultError::ExtensionNotInstalled { vault: self.id })?;
        let entries = extension.storage.len();
        if entries > 0 {
            return Err(VaultError::StorageNotEmpty {
                vault: self.id,
                entries,
            });
        }
        self.extension = None;
        debug!(vault = %self.id, "extension removed");
        Ok(())
    }

    /// Returns `true` if an extension is installed.
    pub fn is_extension_installed(&self) -> bool {
        self.extension.is_some()
    }

    /// Returns `true` if an installed extension carries all of the
    /// `required` permission bits.
    pub fn extension_permits(&self, required: u32) -> bool {
        self.extension
            .as_ref()
            .map(|ext| ext.permits(required))
            .unwrap_or(false)
    }

    /// Read access to the extension's keyed storage.
    pub fn extension_storage(&self) -> Result<&KeyedStore, VaultError> {
        self.extension
            .as_ref()
            .map(|ext| &ext.storage)
            .ok_or(VaultError::ExtensionNotInstalled { vault: self.id })
    }

    /// Write access to the extension's keyed storage.
    pub fn extension_storage_mut(&mut self) -> Result<&mut KeyedStore, VaultError> {
        let vault = self.id;
        self.extension
            .as_mut()
            .map(|ext| &mut ext.storage)
            .ok_or(VaultError::ExtensionNotInstalled { vault })
    }

    fn managed_store(&mut self, asset: T, locked: bool, required: u32) -> Result<(), (VaultError, T)> {
        match &self.extension {
            None => {
                return Err((VaultError::ExtensionNotInstalled { vault: self.id }, asset));
            }
            Some(ext) if !ext.permits(required) => {
                return Err((
                    VaultError::PermissionDenied {
                        vault: self.id,
                        required,
                    },
                    asset,
                ));
            }
            Some(_) => {}
        }
        self.store(asset, locked)
    }

    /// Places an asset on behalf of the installed extension. Requires
    /// [`PERM_PLACE`].
    pub fn managed_place(&mut self, asset: T) -> Result<(), (VaultError, T)> {
        self.managed_store(asset, false, PERM_PLACE)
    }

    /// Locks an asset on behalf of the installed extension. Requires
    /// [`PERM_LOCK`]. The policy parameter carries the same attestation
    /// as [`Vault::lock`].
    pub fn managed_lock(
        &mut self,
        _policy: &TransferPolicy<T>,
        asset: T,
    ) -> Result<(), (VaultError, T)> {
        self.managed_store(asset, true, PERM_LOCK)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::create_policy;

    #[derive(Debug)]
    struct Gem {
        id: AssetId,
    }

    impl Gem {
        fn new() -> Self {
            Self { id: AssetId::fresh() }
        }
    }

    impl UniqueAsset for Gem {
        fn id(&self) -> AssetId {
            self.id
        }
    }

    fn vault() -> (Vault<Gem>, OwnerCap) {
        Vault::new(Address::fresh())
    }

    #[test]
    fn place_and_acquire_roundtrip() {
        let (mut vault, cap) = vault();
        let gem = Gem::new();
        let gem_id = gem.id();

        vault.place(&cap, gem).unwrap();
        assert!(vault.holds(&gem_id));
        assert_eq!(vault.is_locked(&gem_id), Some(false));

        let (acquired, request) = vault.acquire_at_price(&cap, gem_id, 0).unwrap();
        assert_eq!(acquired.id(), gem_id);
        assert_eq!(request.paid(), 0);
        assert_eq!(request.from(), vault.id());
        assert!(!vault.holds(&gem_id));
    }

    #[test]
    fn foreign_cap_is_rejected() {
        let (mut vault, _cap) = vault();
        let (_other_vault, other_cap) = Vault::<Gem>::new(Address::fresh());
        let gem = Gem::new();

        let (error, gem) = vault.place(&other_cap, gem).unwrap_err();
        assert!(matches!(error, VaultError::NotAuthorized { .. }));
        // The asset is handed back on rejection.
        assert!(!vault.holds(&gem.id()));
    }

    #[test]
    fn duplicate_place_is_rejected() {
        let (mut vault, cap) = vault();
        let gem = Gem::new();
        let gem_id = gem.id();
        vault.place(&cap, gem).unwrap();

        let duplicate = Gem { id: gem_id };
        let (error, _duplicate) = vault.place(&cap, duplicate).unwrap_err();
        assert!(matches!(error, VaultError::AssetAlreadyHeld { .. }));
    }

    #[test]
    fn acquire_absent_asset_fails() {
        let (mut vault, cap) = vault();
        let result = vault.acquire_at_price(&cap, AssetId::fresh(), 0);
        assert!(matches!(result, Err(VaultError::AssetNotHeld { .. })));
    }

    #[test]
    fn lock_marks_asset_locked() {
        let (mut vault, cap) = vault();
        let (policy, _policy_cap) = create_policy::<Gem>();
        let gem = Gem::new();
        let gem_id = gem.id();

        vault.lock(&cap, &policy, gem).unwrap();
        assert_eq!(vault.is_locked(&gem_id), Some(true));
    }

    #[test]
    fn prove_locked_stamps_request() {
        let (mut vault, cap) = vault();
        let (mut policy, policy_cap) = create_policy::<Gem>();
        policy.add_rule(&policy_cap, RuleKind::Lock).unwrap();

        let gem = Gem::new();
        let gem_id = gem.id();
        vault.lock(&cap, &policy, gem).unwrap();

        // Re-acquire and prove the lock satisfies the policy.
        let (gem, mut request) = vault.acquire_at_price(&cap, gem_id, 0).unwrap();
        vault.lock(&cap, &policy, gem).unwrap();
        vault.prove_locked(&mut request).unwrap();
        assert!(policy.confirm(request).is_ok());
    }

    #[test]
    fn prove_locked_rejects_placed_asset() {
        let (mut vault, cap) = vault();
        let gem = Gem::new();
        let gem_id = gem.id();
        vault.place(&cap, gem).unwrap();

        let (gem, mut request) = vault.acquire_at_price(&cap, gem_id, 0).unwrap();
        vault.place(&cap, gem).unwrap();
        let result = vault.prove_locked(&mut request);
        assert!(matches!(result, Err(PolicyError::AssetNotLocked(_))));
    }

    #[test]
    fn extension_install_remove_lifecycle() {
        let (mut vault, cap) = vault();
        assert!(!vault.is_extension_installed());

        vault.install_extension(&cap, PERM_PLACE | PERM_LOCK).unwrap();
        assert!(vault.is_extension_installed());
        assert!(vault.extension_permits(PERM_PLACE));
        assert!(vault.extension_permits(PERM_PLACE | PERM_LOCK));

        let result = vault.install_extension(&cap, PERM_PLACE);
        assert!(matches!(
            result,
            Err(VaultError::ExtensionAlreadyInstalled { .. })
        ));

        vault.remove_extension(&cap).unwrap();
        assert!(!vault.is_extension_installed());
    }

    #[test]
    fn extension_removal_refused_while_storage_nonempty() {
        let (mut vault, cap) = vault();
        vault.install_extension(&cap, PERM_PLACE).unwrap();
        vault
            .extension_storage_mut()
            .unwrap()
            .insert(vec![1], 7u8)
            .unwrap();

        let result = vault.remove_extension(&cap);
        assert!(matches!(
            result,
            Err(VaultError::StorageNotEmpty { entries: 1, .. })
        ));

        let _: u8 = vault.extension_storage_mut().unwrap().remove(&[1]).unwrap();
        vault.remove_extension(&cap).unwrap();
    }

    #[test]
    fn managed_place_requires_permission() {
        let (mut vault, cap) = vault();
        vault.install_extension(&cap, PERM_LOCK).unwrap();

        let gem = Gem::new();
        let (error, gem) = vault.managed_place(gem).unwrap_err();
        assert!(matches!(
            error,
            VaultError::PermissionDenied {
                required: PERM_PLACE,
                ..
            }
        ));

        // With the right permission it goes through.
        let (mut vault2, cap2) = Vault::<Gem>::new(Address::fresh());
        vault2.install_extension(&cap2, PERM_PLACE).unwrap();
        vault2.managed_place(gem).unwrap();
    }

    #[test]
    fn managed_lock_requires_extension() {
        let (mut vault, _cap) = vault();
        let (policy, _policy_cap) = create_policy::<Gem>();
        let gem = Gem::new();
        let (error, _gem) = vault.managed_lock(&policy, gem).unwrap_err();
        assert!(matches!(error, VaultError::ExtensionNotInstalled { .. }));
    }

    #[test]
    fn storage_access_requires_extension() {
        let (vault, _cap) = vault();
        assert!(matches!(
            vault.extension_storage(),
            Err(VaultError::ExtensionNotInstalled { .. })
        ));
    }
}
