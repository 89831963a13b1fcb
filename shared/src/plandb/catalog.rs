use serde::{Deserialize, Serialize};

/// One stored plan as reported by the remote system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntryWire {
    pub plan_id: String,
    /// Size of the plan's canonical encoding in bytes
    pub plan_size: u32,
    /// Time of last change (epoch seconds)
    pub change_time: f64,
    /// Numeric address of the system that last changed the plan
    pub change_sid: u16,
    /// Name of the system that last changed the plan
    pub change_sname: String,
    /// MD5 of the plan's canonical encoding (16 bytes)
    pub md5: Vec<u8>,
}

/// Whole-catalog listing (GET_STATE reply)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogListing {
    /// Number of stored plans
    pub plan_count: u16,
    /// Sum of the stored plans' sizes
    pub plan_size: u32,
    /// Time of last catalog change (epoch seconds)
    pub change_time: f64,
    pub change_sid: u16,
    pub change_sname: String,
    /// Aggregate digest over the whole catalog (16 bytes)
    pub md5: Vec<u8>,
    #[serde(default)]
    pub plans_info: Vec<CatalogEntryWire>,
}
