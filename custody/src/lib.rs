//! # Tessera Custody -- Substrate Library
//!
//! The custody substrate that the Tessera escrow protocol is built on:
//! owner-controlled vaults for unique digital assets, capability tokens
//! that prove control, transfer policies that gate how assets leave
//! custody, a fungible coin for settlement, and a clock.
//!
//! Everything here is intentionally plain. The interesting state-machine
//! logic lives in `tessera-escrow`; this crate's job is to make custody
//! primitives that cannot be forged or bypassed:
//!
//! - **ident** -- Unique identifiers for assets, vaults, and addresses.
//! - **clock** -- Millisecond timestamps and a pluggable time source.
//! - **coin** -- A move-only fungible token with split/merge, plus the
//!   settlement ledger that records who got paid.
//! - **policy** -- Transfer policies with an unforgeable admin capability
//!   and a rule-confirmation flow for pending transfers.
//! - **vault** -- The custody container: capability-gated item storage
//!   with a permissioned extension slot for protocol add-ons.
//!
//! ## Design Philosophy
//!
//! 1. Capabilities are values, not booleans. If an operation is gated,
//!    it takes a capability and compares identity, never a flag.
//! 2. Value types that represent money or custody never implement
//!    `Clone` or `Deserialize`; both would be mints.
//! 3. If it moves an asset or a coin, it has tests.

pub mod clock;
pub mod coin;
pub mod ident;
pub mod policy;
pub mod vault;
