//! Shared wire types for the wallet ledger API.
//!
//! The server serializes these types and the optional `client` feature
//! provides a typed HTTP client that deserializes them.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;

/// Header carrying the authenticated account id.
///
/// Set by the upstream authentication gateway after it has validated the
/// caller's token. The wallet server trusts it as-is.
pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";
