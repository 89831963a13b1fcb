//! Message bus envelope
//!
//! Every message exchanged with a remote system travels inside a
//! [`BusMessage`]: a typed envelope carrying routing metadata and a JSON
//! payload. The plan catalog protocol is one event type among the traffic a
//! channel delivers; the sync engine ignores the others.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

use crate::error::{WireError, WireResult};
use crate::plandb::PlanDbMessage;

/// Bus event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// System announcement
    Announce,
    /// Plan database request / reply
    PlanDb,
    /// Plan execution control
    PlanControl,
    /// Liveness beacon
    Heartbeat,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Announce => write!(f, "announce"),
            EventType::PlanDb => write!(f, "plan_db"),
            EventType::PlanControl => write!(f, "plan_control"),
            EventType::Heartbeat => write!(f, "heartbeat"),
        }
    }
}

/// Bus message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub message_id: Uuid,
    pub event_type: EventType,
    /// Logical name of the originating system
    pub source: Option<String>,
    /// Numeric address of the originating system
    pub source_addr: Option<u16>,
    /// Logical name of the destination system
    pub target: Option<String>,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            event_type,
            source: None,
            source_addr: None,
            target: None,
            payload,
        }
    }

    /// Build a plan database message
    pub fn plan_db(msg: &PlanDbMessage) -> WireResult<Self> {
        Ok(Self::new(EventType::PlanDb, serde_json::to_vec(msg)?))
    }

    /// Set the originating system
    pub fn with_source(mut self, name: &str, addr: Option<u16>) -> Self {
        self.source = Some(name.to_string());
        self.source_addr = addr;
        self
    }

    /// Set the destination system
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    /// Whether this envelope belongs to the plan catalog protocol
    pub fn is_plan_db(&self) -> bool {
        self.event_type == EventType::PlanDb
    }

    /// Decode the payload as a plan database message
    pub fn plan_db_payload(&self) -> WireResult<PlanDbMessage> {
        if !self.is_plan_db() {
            return Err(WireError::UnexpectedEventType {
                expected: EventType::PlanDb,
                actual: self.event_type,
            });
        }
        self.parse_payload()
    }

    /// Parse the payload as the given type
    pub fn parse_payload<T: DeserializeOwned>(&self) -> WireResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}
