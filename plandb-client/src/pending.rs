//! Outstanding request tracking
//!
//! Every request is registered here before it reaches the channel. A reply
//! carrying the same request id and operation resolves it; otherwise the
//! sweeper expires it once its deadline has passed and the failure is
//! reported to listeners.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use shared::PlanDbOp;
use tokio::time::Instant;

/// Request waiting for its reply
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub op: PlanDbOp,
    pub plan_id: Option<String>,
    /// System the request was addressed to
    pub target: String,
    pub issued_at: Instant,
    pub deadline: Instant,
}

/// Why a request did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Remote answered FAILURE
    Rejected { info: String },
    /// No reply before the deadline
    TimedOut { waited: Duration },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Rejected { info } if info.is_empty() => write!(f, "rejected"),
            FailureReason::Rejected { info } => write!(f, "rejected: {info}"),
            FailureReason::TimedOut { waited } => write!(f, "timed out after {waited:?}"),
        }
    }
}

/// Failed request, as reported to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub request_id: u32,
    pub op: PlanDbOp,
    pub plan_id: Option<String>,
    /// System that failed to answer or rejected the request
    pub system_id: String,
    pub reason: FailureReason,
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} to {}", self.op, self.request_id, self.system_id)?;
        if let Some(plan_id) = &self.plan_id {
            write!(f, " ({plan_id})")?;
        }
        write!(f, " {}", self.reason)
    }
}

/// Pending requests keyed by request id
#[derive(Debug, Default)]
pub struct PendingRequests {
    requests: HashMap<u32, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, request_id: u32, request: PendingRequest) {
        self.requests.insert(request_id, request);
    }

    /// Remove and return a pending request
    pub fn resolve(&mut self, request_id: u32) -> Option<PendingRequest> {
        self.requests.remove(&request_id)
    }

    /// Remove and return a pending request only if it was issued for `op`
    ///
    /// A message reusing the id for another operation leaves the request pending.
    pub fn resolve_matching(&mut self, request_id: u32, op: PlanDbOp) -> Option<PendingRequest> {
        match self.requests.get(&request_id) {
            Some(request) if request.op == op => self.requests.remove(&request_id),
            _ => None,
        }
    }

    /// Push a request's deadline out; returns false unless an `op` request with this id is pending
    pub fn extend(&mut self, request_id: u32, op: PlanDbOp, deadline: Instant) -> bool {
        match self.requests.get_mut(&request_id) {
            Some(request) if request.op == op => {
                request.deadline = request.deadline.max(deadline);
                true
            }
            _ => false,
        }
    }

    /// Drop every request not addressed to `target`; returns how many were dropped
    pub fn retain_target(&mut self, target: &str) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, request| request.target == target);
        before - self.requests.len()
    }

    /// Whether an `op` request to `target` is outstanding
    pub fn has_pending(&self, op: PlanDbOp, target: &str) -> bool {
        self.requests
            .values()
            .any(|request| request.op == op && request.target == target)
    }

    /// Remove requests whose deadline has passed, oldest id first
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<RequestFailure> {
        let mut expired: Vec<u32> = self
            .requests
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();

        expired
            .into_iter()
            .filter_map(|id| {
                self.requests.remove(&id).map(|request| RequestFailure {
                    request_id: id,
                    op: request.op,
                    plan_id: request.plan_id,
                    system_id: request.target,
                    reason: FailureReason::TimedOut {
                        waited: now.saturating_duration_since(request.issued_at),
                    },
                })
            })
            .collect()
    }

    pub fn get(&self, request_id: u32) -> Option<&PendingRequest> {
        self.requests.get(&request_id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
