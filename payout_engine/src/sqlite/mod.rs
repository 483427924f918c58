//! The SQLite implementation of the payout engine backend.

pub mod db;
mod errors;
pub mod payouts;
mod sqlite_impl;
pub mod wallets;

pub use errors::SqliteDatabaseError;
pub use sqlite_impl::SqliteDatabase;
