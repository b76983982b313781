//! # Identifiers
//!
//! Newtype identifiers for the three kinds of things the substrate tracks:
//! assets, vaults, and addresses. All three wrap a UUIDv4, random enough
//! that collisions are a non-concern, opaque enough that nobody is tempted
//! to parse meaning out of them.
//!
//! The [`UniqueAsset`] trait is the only requirement this substrate puts
//! on the objects it holds: an asset must be able to name itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a unique digital asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(Uuid);

/// Identifies a custody vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VaultId(Uuid);

/// Identifies a party that can own vaults and receive payments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(Uuid);

macro_rules! impl_ident {
    ($name:ident) => {
        impl $name {
            /// Generates a fresh random identifier.
            pub fn fresh() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the raw 16-byte representation.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_ident!(AssetId);
impl_ident!(VaultId);
impl_ident!(Address);

/// An object that can live in a custody vault.
///
/// The substrate is generic over asset types (NFTs, game items, tokenized
/// deeds) as long as each instance carries a stable unique id.
/// The id must not change for the lifetime of the asset; vaults and
/// registries use it as the storage key.
pub trait UniqueAsset {
    /// The asset's stable unique identifier.
    fn id(&self) -> AssetId;
}
