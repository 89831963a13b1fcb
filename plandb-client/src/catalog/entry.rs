use std::fmt;

use shared::{CatalogEntryWire, PlanDigest};

use crate::error::{SyncError, SyncResult};

/// System that last changed a plan or the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Originator {
    /// Numeric bus address
    pub address: u16,
    pub name: String,
}

impl Originator {
    pub fn new(address: u16, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }
}

impl fmt::Display for Originator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name, self.address)
    }
}

/// One plan stored on the remote system, as last confirmed
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    plan_id: String,
    size_bytes: u32,
    change_time: f64,
    change_originator: Originator,
    digest: PlanDigest,
}

impl CatalogEntry {
    pub fn new(
        plan_id: impl Into<String>,
        size_bytes: u32,
        change_time: f64,
        change_originator: Originator,
        digest: PlanDigest,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            size_bytes,
            change_time,
            change_originator,
            digest,
        }
    }

    /// Parse a wire record
    pub fn from_wire(wire: &CatalogEntryWire) -> SyncResult<Self> {
        if wire.plan_id.is_empty() {
            return Err(SyncError::MalformedPayload(
                "catalog entry without plan id".into(),
            ));
        }
        let digest = PlanDigest::from_slice(&wire.md5)?;
        Ok(Self {
            plan_id: wire.plan_id.clone(),
            size_bytes: wire.plan_size,
            change_time: wire.change_time,
            change_originator: Originator::new(wire.change_sid, wire.change_sname.clone()),
            digest,
        })
    }

    pub fn to_wire(&self) -> CatalogEntryWire {
        CatalogEntryWire {
            plan_id: self.plan_id.clone(),
            plan_size: self.size_bytes,
            change_time: self.change_time,
            change_sid: self.change_originator.address,
            change_sname: self.change_originator.name.clone(),
            md5: self.digest.to_vec(),
        }
    }

    pub fn id(&self) -> &str {
        &self.plan_id
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn change_time(&self) -> f64 {
        self.change_time
    }

    pub fn change_originator(&self) -> &Originator {
        &self.change_originator
    }

    pub fn digest(&self) -> &PlanDigest {
        &self.digest
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plan_id)
    }
}
