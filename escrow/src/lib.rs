//! # Tessera Rental Escrow
//!
//! A time-bounded escrow protocol for unique digital assets. An owner
//! lists an asset out of their vault; a renter pays the exact rental
//! total to take custody for a fixed number of days; the renter may
//! extract the asset's value against a must-return receipt; once the
//! rental period elapses, the owner reclaims the asset. Fees are skimmed
//! in basis points into a shared per-asset-type ledger, and the remainder
//! settles to the owner, atomically with the custody transfer.
//!
//! The protocol is a strict state machine per asset: **Listed** (owner's
//! registry, clock not started), **Rented** (renter's registry, clock
//! started), **Extracted** (outside any registry, owed back under a
//! receipt), and **Absent** (not under escrow at all). Registries enforce
//! a remove-before-reinsert discipline, so an asset is addressable under
//! exactly one lifecycle key at any moment, with no duplicates and no
//! dangling entries.
//!
//! ## Design Principles
//!
//! 1. All monetary arithmetic is checked; fee math widens to `u128`
//!    before dividing, because wrapping arithmetic and money do not mix.
//! 2. Every precondition is validated before the first mutation. A
//!    failed operation leaves no trace.
//! 3. Custody-bearing values ([`receipt::BorrowReceipt`], the records)
//!    are move-only and cannot be cloned or serialized; the receipt
//!    cannot even be silently dropped.

pub mod error;
pub mod fees;
pub mod guard;
pub mod receipt;
pub mod record;
pub mod registry;
pub mod rental;
