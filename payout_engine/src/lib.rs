//! Vendor Payout Engine
//!
//! The payout engine gates the movement of real money out of vendor wallets behind a multi-party approval workflow,
//! and verifies after the fact that settled money actually moved correctly. This library contains the core logic;
//! it is transport-agnostic and knows nothing about HTTP, identity, or notification delivery.
//!
//! The library is divided into three main sections:
//! 1. The payout approval flow. [`workflow`] holds the pure state machine; backends implementing
//!    [`PayoutDatabase`] (currently SQLite) persist its results, coupling the status write and the wallet debit
//!    into a single unit of work. [`PayoutApi`] is the public-facing surface and owns the injected permission
//!    check.
//! 2. Settlement reconciliation ([`mod@reconciliation`]). A strict three-way matcher across order, gateway, and
//!    bank records, and a batch runner that contains per-order failures instead of aborting the run.
//! 3. The database types ([`mod@db_types`]) shared by both.

pub mod db_types;
mod ppe_api;
pub mod reconciliation;
pub mod traits;
pub mod workflow;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use ppe_api::{
    errors::PayoutApiError,
    payout_api::PayoutApi,
    permissions::{Capability, PermissionCheck, RolePermissions},
};
pub use traits::{PayoutDatabase, PayoutDbError};
