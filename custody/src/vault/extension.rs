//! Extension slot internals: the permission bits a vault owner grants to
//! an installed protocol extension, and the extension's private storage.

use super::store::KeyedStore;

/// Permission to place assets into the vault without the owner capability.
pub const PERM_PLACE: u32 = 0b01;

/// Permission to lock assets into the vault without the owner capability.
pub const PERM_LOCK: u32 = 0b10;

/// An installed extension: granted permissions plus its keyed storage.
///
/// One extension slot per vault. The storage is reachable only through
/// the vault's accessor methods, which require the slot to be installed.
#[derive(Debug)]
pub(crate) struct Extension {
    pub(crate) permissions: u32,
    pub(crate) storage: KeyedStore,
}

impl Extension {
    pub(crate) fn new(permissions: u32) -> Self {
        Self {
            permissions,
            storage: KeyedStore::new(),
        }
    }

    pub(crate) fn permits(&self, required: u32) -> bool {
        self.permissions & required == required
    }
}
