//! Chain-of-custody orchestration.
//!
//! [`CustodyService`] owns the write path and the verify path:
//!
//! ```text
//! register:  validate -> content store -> fingerprint -> metadata store
//!                                                      \-> [detached] ledger anchor -> metadata update
//! verify:    metadata lookup -> recompute fingerprint -> ledger check -> content fetch + compare
//! ```
//!
//! The synchronous part of `register` runs under a deadline and decides
//! whether registration succeeds. Anchoring is handed to an
//! [`AnchorDispatcher`] and settles the record to `confirmed` or `failed`
//! later, exactly once.
//!
//! [`Oracle`] replays verification over a product's full history and
//! checks the chain's order.

pub mod anchoring;
pub mod config;
pub mod error;
pub mod oracle;
pub mod service;
pub mod validation;

pub use anchoring::{run_anchor_task, AnchorDispatcher, AnchorOutcome, AnchorTask, SpawnDispatcher};
pub use config::{
    ContentBackend, ContentConfig, CustodyConfig, MetadataBackend, MetadataConfig, OracleConfig,
};
pub use error::{CustodyError, CustodyResult, FieldViolation};
pub use oracle::{
    check_chain_order, ChainReport, ChainViolation, ChainViolationKind, Oracle, OracleView,
    VerifiedEvent, VerifiedHistory, ViewStatus,
};
pub use service::{CustodyService, HealthReport, SubstrateHealth, NOT_YET_ANCHORED};
pub use validation::validate_request;
