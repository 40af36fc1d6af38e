//! Configuration types shared by the core and the server.
//!
//! Loading and validation of the config file happens in the server crate;
//! these are the validated values the core runs with.

mod settlement;

pub use settlement::SettlementConfig;
