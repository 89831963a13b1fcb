//! Plan database protocol
//!
//! A remote system keeps a catalog of stored plans. Clients operate on it
//! with request messages and learn the outcome from reply messages that
//! echo the operation and the request id.
//!
//! ```text
//! client                                   remote
//!   │ ── Request  { op: SET, plan }  ──────▶ │
//!   │ ◀───────── InProgress { op: SET } ──── │   (optional)
//!   │ ◀───────── Success { op: SET } ─────── │
//!   │ ── Request  { op: GET_INFO } ────────▶ │
//!   │ ◀─ Success { op: GET_INFO, entry } ─── │
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

mod catalog;
mod content;

pub use catalog::{CatalogEntryWire, CatalogListing};
pub use content::{DIGEST_LEN, PlanContent, PlanDigest};

/// Message direction / outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanDbType {
    Request,
    Success,
    Failure,
    InProgress,
}

impl fmt::Display for PlanDbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanDbType::Request => write!(f, "REQUEST"),
            PlanDbType::Success => write!(f, "SUCCESS"),
            PlanDbType::Failure => write!(f, "FAILURE"),
            PlanDbType::InProgress => write!(f, "IN_PROGRESS"),
        }
    }
}

/// Catalog operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanDbOp {
    /// Store a plan
    Set,
    /// Fetch full plan content
    Get,
    /// Fetch one catalog entry
    GetInfo,
    /// Fetch the whole catalog listing
    GetState,
    /// Delete a plan
    Del,
    /// Delete every plan
    Clear,
}

impl fmt::Display for PlanDbOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanDbOp::Set => write!(f, "SET"),
            PlanDbOp::Get => write!(f, "GET"),
            PlanDbOp::GetInfo => write!(f, "GET_INFO"),
            PlanDbOp::GetState => write!(f, "GET_STATE"),
            PlanDbOp::Del => write!(f, "DEL"),
            PlanDbOp::Clear => write!(f, "CLEAR"),
        }
    }
}

/// Operation argument; its shape depends on the operation and direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlanDbArgument {
    /// Full plan (SET request, GET reply)
    Plan(PlanContent),
    /// Whole catalog (GET_STATE reply)
    Listing(CatalogListing),
    /// Single catalog entry (GET_INFO reply)
    Entry(CatalogEntryWire),
}

/// Plan database message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDbMessage {
    pub kind: PlanDbType,
    pub op: PlanDbOp,
    pub request_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<PlanDbArgument>,
    /// Free-text provenance / diagnostic
    #[serde(default)]
    pub info: String,
}

impl PlanDbMessage {
    pub fn new(kind: PlanDbType, op: PlanDbOp, request_id: u32) -> Self {
        Self {
            kind,
            op,
            request_id,
            plan_id: None,
            arg: None,
            info: String::new(),
        }
    }

    /// Build a request
    pub fn request(
        request_id: u32,
        op: PlanDbOp,
        plan_id: Option<&str>,
        arg: Option<PlanDbArgument>,
        info: &str,
    ) -> Self {
        Self {
            plan_id: plan_id.map(str::to_string),
            arg,
            info: info.to_string(),
            ..Self::new(PlanDbType::Request, op, request_id)
        }
    }

    /// Build a success reply
    pub fn success(
        request_id: u32,
        op: PlanDbOp,
        plan_id: Option<&str>,
        arg: Option<PlanDbArgument>,
    ) -> Self {
        Self {
            plan_id: plan_id.map(str::to_string),
            arg,
            ..Self::new(PlanDbType::Success, op, request_id)
        }
    }

    /// Build a failure reply
    pub fn failure(request_id: u32, op: PlanDbOp, plan_id: Option<&str>, info: &str) -> Self {
        Self {
            plan_id: plan_id.map(str::to_string),
            info: info.to_string(),
            ..Self::new(PlanDbType::Failure, op, request_id)
        }
    }

    /// Build an in-progress notice
    pub fn in_progress(request_id: u32, op: PlanDbOp, plan_id: Option<&str>) -> Self {
        Self {
            plan_id: plan_id.map(str::to_string),
            ..Self::new(PlanDbType::InProgress, op, request_id)
        }
    }

    /// Whether this message answers a request (success or failure)
    pub fn is_reply(&self) -> bool {
        matches!(self.kind, PlanDbType::Success | PlanDbType::Failure)
    }

    pub fn plan_content(&self) -> Option<&PlanContent> {
        match &self.arg {
            Some(PlanDbArgument::Plan(plan)) => Some(plan),
            _ => None,
        }
    }

    pub fn listing(&self) -> Option<&CatalogListing> {
        match &self.arg {
            Some(PlanDbArgument::Listing(listing)) => Some(listing),
            _ => None,
        }
    }

    pub fn entry(&self) -> Option<&CatalogEntryWire> {
        match &self.arg {
            Some(PlanDbArgument::Entry(entry)) => Some(entry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_display_matches_wire_names() {
        assert_eq!(PlanDbOp::GetInfo.to_string(), "GET_INFO");
        assert_eq!(PlanDbType::InProgress.to_string(), "IN_PROGRESS");

        let json = serde_json::to_string(&PlanDbOp::GetState).unwrap();
        assert_eq!(json, "\"GET_STATE\"");
    }

    #[test]
    fn test_request_without_plan_id_omits_field() {
        let msg = PlanDbMessage::request(1, PlanDbOp::Get, None, None, "");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("plan_id").is_none());
        assert!(json.get("arg").is_none());

        let back: PlanDbMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.plan_id, None);
    }

    #[test]
    fn test_argument_accessors() {
        let plan = PlanContent::new("p1", b"goto 1".to_vec());
        let msg = PlanDbMessage::request(
            3,
            PlanDbOp::Set,
            Some("p1"),
            Some(PlanDbArgument::Plan(plan.clone())),
            "console 0.1.0",
        );

        assert_eq!(msg.plan_content(), Some(&plan));
        assert!(msg.listing().is_none());
        assert!(msg.entry().is_none());
        assert!(!msg.is_reply());
        assert!(PlanDbMessage::failure(3, PlanDbOp::Set, Some("p1"), "full").is_reply());
    }
}
