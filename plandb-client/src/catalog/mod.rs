//! Local mirror of a remote plan catalog

mod entry;
mod state;

pub use entry::{CatalogEntry, Originator};
pub use state::{CatalogState, Provenance, SyncStatus};
