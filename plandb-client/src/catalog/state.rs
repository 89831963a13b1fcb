use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use shared::{CatalogListing, PlanDigest};

use super::entry::{CatalogEntry, Originator};
use crate::error::SyncResult;

/// Who changed the catalog as a whole, and when
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Provenance {
    /// Remote epoch seconds
    pub change_time: f64,
    pub originator: Originator,
}

/// How a plan known locally relates to the remote copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Only known locally
    Local,
    /// Only stored on the remote system
    Remote,
    /// Both sides hold the same content
    Synchronized,
    /// Both sides hold the plan but the content differs
    Unsynchronized,
}

/// Local mirror of one remote system's plan catalog
///
/// Holds only entries confirmed by the remote. A state belongs to exactly
/// one bound system; binding elsewhere starts a fresh one. Mutation is
/// serialized by the owning controller.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    bound_system_id: Option<String>,
    catalog: HashMap<String, CatalogEntry>,
    aggregate_digest: Option<PlanDigest>,
    provenance: Option<Provenance>,
    freshness: Option<DateTime<Utc>>,
}

impl CatalogState {
    /// Empty catalog for the given system
    pub fn new(bound_system_id: Option<String>) -> Self {
        Self {
            bound_system_id,
            ..Self::default()
        }
    }

    pub fn upsert(&mut self, entry: CatalogEntry) {
        self.catalog.insert(entry.id().to_string(), entry);
        self.touch();
    }

    pub fn remove_by_plan_id(&mut self, plan_id: &str) -> Option<CatalogEntry> {
        let removed = self.catalog.remove(plan_id);
        self.touch();
        removed
    }

    pub fn clear(&mut self) {
        self.catalog.clear();
        self.touch();
    }

    /// Replace the whole catalog with a confirmed listing
    pub fn replace_all(
        &mut self,
        entries: Vec<CatalogEntry>,
        aggregate_digest: PlanDigest,
        provenance: Provenance,
    ) {
        self.catalog = entries
            .into_iter()
            .map(|entry| (entry.id().to_string(), entry))
            .collect();
        self.aggregate_digest = Some(aggregate_digest);
        self.provenance = Some(provenance);
        self.touch();
    }

    /// Apply a GET_STATE listing
    ///
    /// Every record is parsed before anything is replaced, so a listing with
    /// one bad record leaves the mirror untouched.
    pub fn apply_listing(&mut self, listing: &CatalogListing) -> SyncResult<()> {
        let entries = listing
            .plans_info
            .iter()
            .map(CatalogEntry::from_wire)
            .collect::<SyncResult<Vec<_>>>()?;
        let digest = PlanDigest::from_slice(&listing.md5)?;
        let provenance = Provenance {
            change_time: listing.change_time,
            originator: Originator::new(listing.change_sid, listing.change_sname.clone()),
        };
        self.replace_all(entries, digest, provenance);
        Ok(())
    }

    /// Whether the remote holds `plan_id` with exactly this digest
    pub fn matches(&self, plan_id: &str, digest: &[u8]) -> bool {
        self.catalog
            .get(plan_id)
            .is_some_and(|entry| entry.digest().matches(digest))
    }

    /// Compare a local copy of a plan against the mirror
    ///
    /// Returns `None` when the plan is unknown on both sides.
    pub fn sync_status(&self, plan_id: &str, local: Option<&PlanDigest>) -> Option<SyncStatus> {
        match (local, self.catalog.get(plan_id)) {
            (None, None) => None,
            (Some(_), None) => Some(SyncStatus::Local),
            (None, Some(_)) => Some(SyncStatus::Remote),
            (Some(local), Some(remote)) if local == remote.digest() => {
                Some(SyncStatus::Synchronized)
            }
            (Some(_), Some(_)) => Some(SyncStatus::Unsynchronized),
        }
    }

    /// Never refreshed, or last changed longer than `max_age` before `now`
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.freshness {
            None => true,
            Some(at) => TimeDelta::from_std(max_age).is_ok_and(|max| now - at > max),
        }
    }

    /// Re-encode the mirror as a wire listing
    pub fn to_listing(&self) -> CatalogListing {
        let provenance = self.provenance.clone().unwrap_or_default();
        let mut plans_info: Vec<_> = self.catalog.values().map(CatalogEntry::to_wire).collect();
        plans_info.sort_by(|a, b| a.plan_id.cmp(&b.plan_id));

        CatalogListing {
            plan_count: u16::try_from(plans_info.len()).unwrap_or(u16::MAX),
            plan_size: plans_info
                .iter()
                .fold(0u32, |acc, p| acc.saturating_add(p.plan_size)),
            change_time: provenance.change_time,
            change_sid: provenance.originator.address,
            change_sname: provenance.originator.name,
            md5: self.aggregate_digest.unwrap_or_default().to_vec(),
            plans_info,
        }
    }

    pub fn get(&self, plan_id: &str) -> Option<&CatalogEntry> {
        self.catalog.get(plan_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.catalog.values()
    }

    /// Stored plan ids, sorted
    pub fn plan_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.catalog.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn aggregate_digest(&self) -> Option<&PlanDigest> {
        self.aggregate_digest.as_ref()
    }

    pub fn change_provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Time of the last local mutation
    pub fn freshness(&self) -> Option<DateTime<Utc>> {
        self.freshness
    }

    pub fn bound_system_id(&self) -> Option<&str> {
        self.bound_system_id.as_deref()
    }

    fn touch(&mut self) {
        self.freshness = Some(Utc::now());
    }
}

// Freshness is local bookkeeping; two mirrors of the same remote catalog are equal.
impl PartialEq for CatalogState {
    fn eq(&self, other: &Self) -> bool {
        self.bound_system_id == other.bound_system_id
            && self.catalog == other.catalog
            && self.aggregate_digest == other.aggregate_digest
            && self.provenance == other.provenance
    }
}
