//! The backend contract for the payout engine.
//!
//! Specific storage backends (currently SQLite) implement [`PayoutDatabase`] to provide durable, transactional
//! payout and wallet state. The public API layer ([`crate::PayoutApi`]) is written against this trait only.

mod payout_database;

pub use payout_database::{PayoutDatabase, PayoutDbError};
