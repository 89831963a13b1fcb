//! SyncController - mirrors a remote plan catalog and mediates operations on it
//!
//! Issuing operations return as soon as the request has been handed to the
//! [`Channel`]; outcomes arrive later through [`SyncController::on_message`]
//! and are observed via listeners or the event bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use shared::message::BusMessage;
use shared::{PlanContent, PlanDbArgument, PlanDbMessage, PlanDbOp, PlanDbType, PlanDigest};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogEntry, CatalogState, SyncStatus};
use crate::channel::Channel;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::listener::{CatalogEvent, ListenerRegistry, PlanDbListener};
use crate::pending::{FailureReason, PendingRequest, PendingRequests, RequestFailure};

/// Process-wide request id counter
static NEXT_REQUEST_ID: AtomicU32 = AtomicU32::new(1);

fn next_request_id() -> u32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Plan catalog synchronization engine for one remote system at a time
///
/// Lock order is `state` then `pending`. Neither lock is held across an
/// `.await` or while listeners run.
pub struct SyncController {
    config: SyncConfig,
    channel: Arc<dyn Channel>,
    state: Mutex<CatalogState>,
    pending: Mutex<PendingRequests>,
    listeners: ListenerRegistry,
    event_tx: broadcast::Sender<CatalogEvent>,
}

impl SyncController {
    pub fn new(channel: Arc<dyn Channel>, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config,
            channel,
            state: Mutex::new(CatalogState::default()),
            pending: Mutex::new(PendingRequests::new()),
            listeners: ListenerRegistry::new(),
            event_tx,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ========== Binding ==========

    /// Bind to a remote system
    ///
    /// Binding to a different system discards the mirrored catalog and every
    /// request still waiting on the previous one. Returns false if already
    /// bound to `system_id`.
    pub fn bind(&self, system_id: &str) -> bool {
        let mut state = self.state.lock();
        if state.bound_system_id() == Some(system_id) {
            return false;
        }
        let previous = state.bound_system_id().map(str::to_string);
        *state = CatalogState::new(Some(system_id.to_string()));
        let dropped = self.pending.lock().retain_target(system_id);
        drop(state);

        tracing::info!(
            system = %system_id,
            previous = ?previous,
            dropped_requests = dropped,
            "Bound to remote system"
        );
        true
    }

    pub fn bound_system_id(&self) -> Option<String> {
        self.state.lock().bound_system_id().map(str::to_string)
    }

    // ========== Issuing operations ==========

    /// Delete every plan on the remote system
    pub async fn clear(&self) -> SyncResult<u32> {
        self.issue(PlanDbOp::Clear, None, None, "").await
    }

    /// Store a plan on the remote system
    pub async fn push(&self, plan: &PlanContent) -> SyncResult<u32> {
        let note = self.config.provenance_note();
        self.issue(
            PlanDbOp::Set,
            Some(&plan.plan_id),
            Some(PlanDbArgument::Plan(plan.clone())),
            &note,
        )
        .await
    }

    /// Fetch a plan's content; `None` asks for the active plan
    pub async fn pull(&self, plan_id: Option<&str>) -> SyncResult<u32> {
        self.issue(PlanDbOp::Get, plan_id, None, "").await
    }

    /// Fetch the plan currently active on the remote system
    pub async fn pull_active(&self) -> SyncResult<u32> {
        self.pull(None).await
    }

    /// Fetch one catalog entry
    pub async fn pull_info(&self, plan_id: &str) -> SyncResult<u32> {
        self.issue(PlanDbOp::GetInfo, Some(plan_id), None, "").await
    }

    /// Fetch the whole catalog
    pub async fn pull_state(&self) -> SyncResult<u32> {
        self.issue(PlanDbOp::GetState, None, None, "").await
    }

    /// Delete one plan on the remote system
    pub async fn remove(&self, plan_id: &str) -> SyncResult<u32> {
        self.issue(PlanDbOp::Del, Some(plan_id), None, "").await
    }

    /// Poll the whole catalog if the mirror is older than `state_max_age`
    ///
    /// Returns `Ok(None)` when the mirror is fresh or a poll is already
    /// outstanding.
    pub async fn refresh_if_stale(&self) -> SyncResult<Option<u32>> {
        let needs_refresh = {
            let state = self.state.lock();
            let target = state.bound_system_id().ok_or(SyncError::Unbound)?;
            state.is_stale(self.config.state_max_age, Utc::now())
                && !self.pending.lock().has_pending(PlanDbOp::GetState, target)
        };
        if !needs_refresh {
            return Ok(None);
        }
        self.pull_state().await.map(Some)
    }

    async fn issue(
        &self,
        op: PlanDbOp,
        plan_id: Option<&str>,
        arg: Option<PlanDbArgument>,
        info: &str,
    ) -> SyncResult<u32> {
        let request_id = next_request_id();
        let request = PlanDbMessage::request(request_id, op, plan_id, arg, info);
        let envelope = BusMessage::plan_db(&request)?.with_source(&self.config.client_name, None);

        // Register before sending so a fast reply always finds its entry
        let target = {
            let state = self.state.lock();
            let target = state.bound_system_id().ok_or(SyncError::Unbound)?.to_string();
            let now = Instant::now();
            self.pending.lock().insert(
                request_id,
                PendingRequest {
                    op,
                    plan_id: plan_id.map(str::to_string),
                    target: target.clone(),
                    issued_at: now,
                    deadline: now + self.config.request_timeout,
                },
            );
            target
        };

        if let Err(e) = self.channel.send(&target, envelope).await {
            self.pending.lock().resolve(request_id);
            tracing::warn!(request_id, op = %op, target = %target, error = %e, "Request not dispatched");
            return Err(e.into());
        }

        tracing::debug!(request_id, op = %op, target = %target, plan_id = ?plan_id, "Request dispatched");
        Ok(request_id)
    }

    // ========== Queries ==========

    /// Whether the remote holds `plan_id` with exactly this digest
    pub fn matches(&self, plan_id: &str, local_digest: &[u8]) -> bool {
        self.state.lock().matches(plan_id, local_digest)
    }

    /// Compare a local copy of a plan against the mirror
    pub fn sync_status(&self, plan_id: &str, local: Option<&PlanDigest>) -> Option<SyncStatus> {
        self.state.lock().sync_status(plan_id, local)
    }

    /// Copy of the mirrored catalog
    pub fn snapshot(&self) -> CatalogState {
        self.state.lock().clone()
    }

    /// Requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    // ========== Observers ==========

    pub fn add_listener(&self, listener: Arc<dyn PlanDbListener>) -> bool {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn PlanDbListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Subscribe to catalog events
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.event_tx.subscribe()
    }

    fn publish(&self, event: CatalogEvent) {
        tracing::debug!(event = event.name(), "Catalog event");
        self.listeners.notify(&event);
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }

    // ========== Inbound ==========

    /// Handle a message delivered by the channel
    pub async fn on_message(&self, msg: &BusMessage) {
        if !msg.is_plan_db() {
            tracing::trace!(event_type = %msg.event_type, "Ignoring non plan database traffic");
            return;
        }

        let reply = match msg.plan_db_payload() {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(message_id = %msg.message_id, error = %e, "Skipping undecodable plan database message");
                return;
            }
        };

        let Some(source) = msg.source.as_deref() else {
            tracing::debug!(request_id = reply.request_id, "Ignoring plan database message without source");
            return;
        };

        self.discover(source);
        if self.bound_system_id().as_deref() != Some(source) {
            tracing::debug!(source = %source, request_id = reply.request_id, "Ignoring message from unbound system");
            return;
        }

        let pending = if reply.is_reply() {
            let pending = self.pending.lock().resolve_matching(reply.request_id, reply.op);
            if pending.is_none() {
                tracing::debug!(request_id = reply.request_id, op = %reply.op, "Reply without pending request");
            }
            pending
        } else {
            None
        };
        let plan_id = reply
            .plan_id
            .clone()
            .or_else(|| pending.as_ref().and_then(|p| p.plan_id.clone()));

        let mut follow_up = None;
        let event = match (reply.kind, reply.op) {
            (PlanDbType::Request, op) => {
                tracing::debug!(request_id = reply.request_id, op = %op, "Ignoring plan database request");
                None
            }
            (PlanDbType::InProgress, op) => {
                let deadline = Instant::now() + self.config.request_timeout;
                let extended = self.pending.lock().extend(reply.request_id, op, deadline);
                tracing::debug!(request_id = reply.request_id, op = %op, extended, "Request in progress");
                None
            }
            (PlanDbType::Failure, op) => {
                tracing::warn!(request_id = reply.request_id, op = %op, info = %reply.info, "Request rejected");
                Some(CatalogEvent::RequestFailed(RequestFailure {
                    request_id: reply.request_id,
                    op,
                    plan_id,
                    system_id: source.to_string(),
                    reason: FailureReason::Rejected {
                        info: reply.info.clone(),
                    },
                }))
            }
            (PlanDbType::Success, PlanDbOp::GetState) => {
                let Some(listing) = reply.listing() else {
                    return self.skip_malformed(&reply, "missing catalog listing");
                };
                let applied = self.mutate_bound(source, |state| {
                    state.apply_listing(listing).map(|_| state.clone())
                });
                match applied {
                    Some(Ok(state)) => Some(CatalogEvent::CatalogRefreshed(state)),
                    Some(Err(e)) => return self.skip_malformed(&reply, &e.to_string()),
                    None => None,
                }
            }
            (PlanDbType::Success, PlanDbOp::Get) => match reply.plan_content() {
                Some(plan) => Some(CatalogEvent::PlanReceived(plan.clone())),
                None => return self.skip_malformed(&reply, "missing plan content"),
            },
            (PlanDbType::Success, PlanDbOp::GetInfo) => {
                let Some(wire) = reply.entry() else {
                    return self.skip_malformed(&reply, "missing catalog entry");
                };
                let entry = match CatalogEntry::from_wire(wire) {
                    Ok(entry) => entry,
                    Err(e) => return self.skip_malformed(&reply, &e.to_string()),
                };
                self.mutate_bound(source, |state| state.upsert(entry));
                None
            }
            (PlanDbType::Success, PlanDbOp::Del) => {
                let Some(plan_id) = plan_id else {
                    return self.skip_malformed(&reply, "missing plan id");
                };
                self.mutate_bound(source, |state| state.remove_by_plan_id(&plan_id))
                    .map(|_| CatalogEvent::PlanRemoved(plan_id))
            }
            (PlanDbType::Success, PlanDbOp::Clear) => self
                .mutate_bound(source, |state| state.clear())
                .map(|_| CatalogEvent::CatalogCleared),
            (PlanDbType::Success, PlanDbOp::Set) => {
                let plan_id = plan_id.or_else(|| reply.plan_content().map(|p| p.plan_id.clone()));
                let Some(plan_id) = plan_id else {
                    return self.skip_malformed(&reply, "missing plan id");
                };
                follow_up = Some(plan_id.clone());
                Some(CatalogEvent::PlanAcknowledged(plan_id))
            }
        };

        if let Some(event) = event {
            self.publish(event);
        }

        // The SET reply carries no entry; fetch the stored metadata
        if let Some(plan_id) = follow_up
            && let Err(e) = self.pull_info(&plan_id).await
        {
            tracing::warn!(plan_id = %plan_id, error = %e, "Follow-up GET_INFO not dispatched");
        }
    }

    fn discover(&self, source: &str) {
        let mut state = self.state.lock();
        if state.bound_system_id().is_some() {
            return;
        }
        *state = CatalogState::new(Some(source.to_string()));
        self.pending.lock().retain_target(source);
        drop(state);
        tracing::info!(system = %source, "Discovered remote system");
    }

    /// Apply a mutation if `source` is still the bound system
    fn mutate_bound<R>(&self, source: &str, f: impl FnOnce(&mut CatalogState) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if state.bound_system_id() != Some(source) {
            tracing::debug!(source = %source, "Bound system changed, dropping update");
            return None;
        }
        Some(f(&mut state))
    }

    fn skip_malformed(&self, reply: &PlanDbMessage, reason: &str) {
        tracing::warn!(
            request_id = reply.request_id,
            op = %reply.op,
            reason = %reason,
            "Skipping malformed plan database reply"
        );
    }

    // ========== Expiry ==========

    /// Expire requests whose deadline has passed and report them to listeners
    pub fn sweep_expired(&self, now: Instant) -> Vec<RequestFailure> {
        let failures = self.pending.lock().sweep_expired(now);
        for failure in &failures {
            tracing::warn!(request_id = failure.request_id, op = %failure.op, system = %failure.system_id, "Request timed out");
            self.publish(CatalogEvent::RequestFailed(failure.clone()));
        }
        failures
    }

    /// Spawn the background task that expires requests and polls stale catalogs
    pub fn spawn_maintenance(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Plan catalog maintenance started");
            let mut ticker = tokio::time::interval(self.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Plan catalog maintenance shutting down");
                        break;
                    }

                    _ = ticker.tick() => {
                        self.sweep_expired(Instant::now());

                        if self.config.auto_refresh
                            && self.bound_system_id().is_some()
                            && let Err(e) = self.refresh_if_stale().await
                        {
                            tracing::warn!("Catalog refresh failed: {e}");
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("bound_system_id", &self.bound_system_id())
            .field("pending", &self.pending_count())
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::error::ChannelError;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct RefusingChannel;

    #[async_trait]
    impl Channel for RefusingChannel {
        async fn send(&self, target: &str, _msg: BusMessage) -> Result<(), ChannelError> {
            Err(ChannelError::Unreachable(target.to_string()))
        }
    }

    #[test]
    fn test_request_ids_increase() {
        let a = next_request_id();
        let b = next_request_id();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_unbound_operations_fail_without_dispatch() {
        let (channel, mut rx) = MemoryChannel::new();
        let controller = SyncController::new(Arc::new(channel), SyncConfig::default()).unwrap();

        assert!(matches!(controller.pull_active().await, Err(SyncError::Unbound)));
        assert!(matches!(controller.clear().await, Err(SyncError::Unbound)));
        assert!(matches!(controller.remove("p1").await, Err(SyncError::Unbound)));
        assert!(matches!(
            controller.push(&PlanContent::new("p1", b"goto".to_vec())).await,
            Err(SyncError::Unbound)
        ));
        assert!(matches!(controller.refresh_if_stale().await, Err(SyncError::Unbound)));

        assert!(rx.try_recv().is_err());
        assert_eq!(controller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_failure_withdraws_pending() {
        let controller =
            SyncController::new(Arc::new(RefusingChannel), SyncConfig::default()).unwrap();
        controller.bind("auv-1");

        let result = controller.pull_state().await;
        assert!(matches!(
            result,
            Err(SyncError::Channel(ChannelError::Unreachable(_)))
        ));
        assert_eq!(controller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_same_system_keeps_state() {
        let (channel, _rx) = MemoryChannel::new();
        let controller = SyncController::new(Arc::new(channel), SyncConfig::default()).unwrap();

        assert!(controller.bind("auv-1"));
        controller.pull_state().await.unwrap();
        assert!(!controller.bind("auv-1"));
        assert_eq!(controller.pending_count(), 1);

        assert!(controller.bind("auv-2"));
        assert_eq!(controller.pending_count(), 0);
        assert_eq!(controller.bound_system_id().as_deref(), Some("auv-2"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (channel, _rx) = MemoryChannel::new();
        let config = SyncConfig::default().with_request_timeout(std::time::Duration::ZERO);
        assert!(matches!(
            SyncController::new(Arc::new(channel), config),
            Err(SyncError::Config(_))
        ));
    }
}
