//! Shared types for the plan catalog protocol
//!
//! Wire types used both by the sync engine and by whatever carries its
//! messages: the bus envelope, the plan database message and its operation
//! taxonomy, catalog listings and the plan content digest.

pub mod error;
pub mod message;
pub mod plandb;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Message bus re-exports (for convenient access)
pub use message::{BusMessage, EventType};

pub use error::{WireError, WireResult};
pub use plandb::{
    DIGEST_LEN, CatalogEntryWire, CatalogListing, PlanContent, PlanDbArgument, PlanDbMessage,
    PlanDbOp, PlanDbType, PlanDigest,
};
