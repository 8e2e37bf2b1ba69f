//! Ledger anchoring for the custody ledger.
//!
//! Two interchangeable strategies implement [`LedgerAnchor`]:
//!
//! - [`ContractAnchor`] writes `(logicalRef, fingerprint, contentAddress)`
//!   to a registry contract and waits for the write to be mined.
//! - [`DirectAnchor`] sends a signed transaction carrying
//!   `fingerprint:contentAddress` to the zero address.
//!
//! [`Anchor::from_config`] picks one from [`LedgerConfig`]. Both talk to
//! the ledger through [`ChainClient`]; [`InMemoryChain`] is a simulated
//! ledger implementing it.

pub mod anchor;
pub mod chain;
pub mod config;
pub mod contract;
pub mod direct;
pub mod error;
pub mod memory;
mod submitter;
pub mod traits;

pub use anchor::Anchor;
pub use chain::{
    parse_address, parse_hash_ref, wait_mined, ChainClient, SignedTransaction, Transaction,
    TxData, TxReceipt, ZERO_ADDRESS,
};
pub use config::LedgerConfig;
pub use contract::{logical_ref, ContractAnchor};
pub use direct::{anchor_payload, DirectAnchor};
pub use error::{AnchorError, AnchorResult};
pub use memory::InMemoryChain;
pub use traits::LedgerAnchor;
