//! Trust game protocol client.
//!
//! Builds unsigned transactions for the experiment contract, submits
//! signed ones and waits for confirmation, decodes on-chain state, and
//! rebuilds the experiment's event ledger from indexer history.

pub mod address;
pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod params;
pub mod phase;
pub mod rpc;
pub mod session;
pub mod state;
pub mod submit;
pub mod txn;

#[cfg(test)]
mod testing;

pub use client::{Submitted, TransactionSigner, TrustGameClient};
pub use errors::{ClientError, Result};
