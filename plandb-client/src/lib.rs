//! Plan catalog synchronization client
//!
//! Keeps a local mirror of the plans stored on a remote system, issues
//! catalog operations over an injected [`Channel`] and notifies observers
//! when the remote catalog changes.
//!
//! # Example
//!
//! ```ignore
//! let (channel, outbound) = MemoryChannel::new();
//! let controller = Arc::new(SyncController::new(Arc::new(channel), SyncConfig::lan())?);
//! controller.add_listener(Arc::new(MyListener));
//! controller.bind("auv-1");
//!
//! // expire unanswered requests and poll stale catalogs
//! let shutdown = CancellationToken::new();
//! let maintenance = controller.clone().spawn_maintenance(shutdown.clone());
//! controller.pull_state().await?;
//!
//! // feed inbound traffic
//! controller.on_message(&msg).await;
//!
//! shutdown.cancel();
//! maintenance.await?;
//! ```

pub mod catalog;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod listener;
pub mod logger;
pub mod pending;

pub use catalog::{CatalogEntry, CatalogState, Originator, Provenance, SyncStatus};
pub use channel::{Channel, MemoryChannel, Outbound};
pub use config::SyncConfig;
pub use controller::SyncController;
pub use error::{ChannelError, SyncError, SyncResult};
pub use listener::{CatalogEvent, ListenerRegistry, NoopListener, PlanDbListener};
pub use pending::{FailureReason, PendingRequest, PendingRequests, RequestFailure};

// Re-export shared wire types for convenience
pub use shared::message::{BusMessage, EventType};
pub use shared::{
    CatalogEntryWire, CatalogListing, PlanContent, PlanDbArgument, PlanDbMessage, PlanDbOp,
    PlanDbType, PlanDigest,
};
