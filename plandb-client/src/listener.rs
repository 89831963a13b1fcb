//! Catalog change notification
//!
//! Observers implement [`PlanDbListener`] and override only the events they
//! care about. The same events are also published as [`CatalogEvent`] on the
//! controller's broadcast bus for async consumers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use shared::PlanContent;

use crate::catalog::CatalogState;
use crate::pending::RequestFailure;

/// Observer of remote catalog changes
///
/// Callbacks run on whatever task delivered the triggering message, with no
/// controller lock held. They should return quickly.
pub trait PlanDbListener: Send + Sync {
    /// Whole catalog replaced from a GET_STATE listing
    fn catalog_refreshed(&self, _state: &CatalogState) {}

    /// Plan content fetched with GET
    fn plan_received(&self, _plan: &PlanContent) {}

    /// Remote stored a plan sent with SET
    fn plan_acknowledged(&self, _plan_id: &str) {}

    /// Remote deleted a plan
    fn plan_removed(&self, _plan_id: &str) {}

    /// Remote deleted every plan
    fn catalog_cleared(&self) {}

    /// Request rejected by the remote or left unanswered past its deadline
    fn request_failed(&self, _failure: &RequestFailure) {}
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl PlanDbListener for NoopListener {}

/// Catalog notification, as published on the event bus
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    CatalogRefreshed(CatalogState),
    PlanReceived(PlanContent),
    PlanAcknowledged(String),
    PlanRemoved(String),
    CatalogCleared,
    RequestFailed(RequestFailure),
}

impl CatalogEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogEvent::CatalogRefreshed(_) => "catalog_refreshed",
            CatalogEvent::PlanReceived(_) => "plan_received",
            CatalogEvent::PlanAcknowledged(_) => "plan_acknowledged",
            CatalogEvent::PlanRemoved(_) => "plan_removed",
            CatalogEvent::CatalogCleared => "catalog_cleared",
            CatalogEvent::RequestFailed(_) => "request_failed",
        }
    }

    fn deliver(&self, listener: &dyn PlanDbListener) {
        match self {
            CatalogEvent::CatalogRefreshed(state) => listener.catalog_refreshed(state),
            CatalogEvent::PlanReceived(plan) => listener.plan_received(plan),
            CatalogEvent::PlanAcknowledged(plan_id) => listener.plan_acknowledged(plan_id),
            CatalogEvent::PlanRemoved(plan_id) => listener.plan_removed(plan_id),
            CatalogEvent::CatalogCleared => listener.catalog_cleared(),
            CatalogEvent::RequestFailed(failure) => listener.request_failed(failure),
        }
    }
}

/// Registered listeners
///
/// Notification iterates a snapshot taken before the first callback, so a
/// listener may register or unregister (itself or others) from inside a
/// callback without affecting the event being delivered.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn PlanDbListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; registering the same instance twice is a no-op
    pub fn add(&self, listener: Arc<dyn PlanDbListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener; unknown instances are ignored
    pub fn remove(&self, listener: &Arc<dyn PlanDbListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver an event to every listener registered right now
    ///
    /// A panicking listener is logged and skipped.
    pub fn notify(&self, event: &CatalogEvent) {
        let snapshot: Vec<Arc<dyn PlanDbListener>> = self.listeners.read().clone();

        for listener in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| event.deliver(listener.as_ref())));
            if let Err(panic_info) = result {
                let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!(event = event.name(), panic = %panic_msg, "Listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_listener(a: &Arc<dyn PlanDbListener>, b: &Arc<dyn PlanDbListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
