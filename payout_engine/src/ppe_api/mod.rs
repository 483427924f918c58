pub mod errors;
pub mod payout_api;
pub mod permissions;
