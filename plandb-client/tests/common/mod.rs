// plandb-client/tests/common/mod.rs
// Test support: a scripted remote system and a recording listener

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use parking_lot::Mutex;
use plandb_client::{
    BusMessage, CatalogEntryWire, CatalogListing, CatalogState, MemoryChannel, Outbound,
    PlanContent, PlanDbArgument, PlanDbListener, PlanDbMessage, PlanDbOp, PlanDbType, PlanDigest,
    RequestFailure, SyncConfig, SyncController,
};
use tokio::sync::mpsc;

pub const REMOTE: &str = "auv-1";
pub const REMOTE_ADDR: u16 = 0x2001;

/// Controller wired to an in-memory channel
pub fn controller(config: SyncConfig) -> (Arc<SyncController>, mpsc::UnboundedReceiver<Outbound>) {
    let (channel, rx) = MemoryChannel::new();
    let controller = SyncController::new(Arc::new(channel), config).expect("valid config");
    (Arc::new(controller), rx)
}

/// Envelope as the remote system would send it
pub fn from_remote(source: &str, msg: &PlanDbMessage) -> BusMessage {
    BusMessage::plan_db(msg)
        .expect("encodable message")
        .with_source(source, Some(REMOTE_ADDR))
}

/// Catalog entry record for `plan`
pub fn entry_wire(plan: &PlanContent, change_time: f64) -> CatalogEntryWire {
    CatalogEntryWire {
        plan_id: plan.plan_id.clone(),
        plan_size: plan.size() as u32,
        change_time,
        change_sid: 0x4001,
        change_sname: "console".to_string(),
        md5: plan.digest().to_vec(),
    }
}

/// Next outbound request, decoded
pub fn next_request(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> anyhow::Result<(String, PlanDbMessage)> {
    let outbound = rx.try_recv().context("no outbound message")?;
    let request = outbound.message.plan_db_payload()?;
    Ok((outbound.target, request))
}

/// In-memory remote catalog answering requests the way a vehicle would
#[derive(Debug)]
pub struct FakeRemote {
    pub name: String,
    plans: BTreeMap<String, (PlanContent, CatalogEntryWire)>,
    active: Option<String>,
    clock: f64,
    /// Plan ids whose DEL is refused
    pub locked: Vec<String>,
}

impl FakeRemote {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            plans: BTreeMap::new(),
            active: None,
            clock: 1_700_000_000.0,
            locked: Vec::new(),
        }
    }

    pub fn with_plan(mut self, plan: PlanContent) -> Self {
        self.store(plan);
        self
    }

    pub fn with_active(mut self, plan_id: &str) -> Self {
        self.active = Some(plan_id.to_string());
        self
    }

    fn store(&mut self, plan: PlanContent) {
        self.clock += 1.0;
        let wire = entry_wire(&plan, self.clock);
        self.plans.insert(plan.plan_id.clone(), (plan, wire));
    }

    pub fn listing(&self) -> CatalogListing {
        let plans_info: Vec<_> = self.plans.values().map(|(_, wire)| wire.clone()).collect();
        let mut all_digests = Vec::new();
        for wire in &plans_info {
            all_digests.extend_from_slice(&wire.md5);
        }
        CatalogListing {
            plan_count: plans_info.len() as u16,
            plan_size: plans_info.iter().map(|p| p.plan_size).sum(),
            change_time: self.clock,
            change_sid: REMOTE_ADDR,
            change_sname: self.name.clone(),
            md5: PlanDigest::of(&all_digests).to_vec(),
            plans_info,
        }
    }

    /// Answer one request
    pub fn answer(&mut self, request: &PlanDbMessage) -> anyhow::Result<PlanDbMessage> {
        if request.kind != PlanDbType::Request {
            bail!("remote received a {} message", request.kind);
        }
        let id = request.request_id;
        let plan_id = request.plan_id.as_deref();

        let reply = match request.op {
            PlanDbOp::Set => {
                let plan = request.plan_content().context("SET without plan")?.clone();
                let plan_id = plan.plan_id.clone();
                self.store(plan);
                PlanDbMessage::success(id, PlanDbOp::Set, Some(&plan_id), None)
            }
            PlanDbOp::Get => {
                let wanted = plan_id.map(str::to_string).or_else(|| self.active.clone());
                match wanted.and_then(|p| self.plans.get(&p)) {
                    Some((plan, _)) => PlanDbMessage::success(
                        id,
                        PlanDbOp::Get,
                        Some(&plan.plan_id),
                        Some(PlanDbArgument::Plan(plan.clone())),
                    ),
                    None => PlanDbMessage::failure(id, PlanDbOp::Get, plan_id, "plan not found"),
                }
            }
            PlanDbOp::GetInfo => match plan_id.and_then(|p| self.plans.get(p)) {
                Some((_, wire)) => PlanDbMessage::success(
                    id,
                    PlanDbOp::GetInfo,
                    plan_id,
                    Some(PlanDbArgument::Entry(wire.clone())),
                ),
                None => PlanDbMessage::failure(id, PlanDbOp::GetInfo, plan_id, "plan not found"),
            },
            PlanDbOp::GetState => PlanDbMessage::success(
                id,
                PlanDbOp::GetState,
                None,
                Some(PlanDbArgument::Listing(self.listing())),
            ),
            PlanDbOp::Del => {
                let plan_id = plan_id.context("DEL without plan id")?;
                if self.locked.iter().any(|p| p == plan_id) {
                    PlanDbMessage::failure(id, PlanDbOp::Del, Some(plan_id), "plan is executing")
                } else if self.plans.remove(plan_id).is_some() {
                    PlanDbMessage::success(id, PlanDbOp::Del, Some(plan_id), None)
                } else {
                    PlanDbMessage::failure(id, PlanDbOp::Del, Some(plan_id), "plan not found")
                }
            }
            PlanDbOp::Clear => {
                self.plans.clear();
                PlanDbMessage::success(id, PlanDbOp::Clear, None, None)
            }
        };
        Ok(reply)
    }

    /// Answer every queued request, feeding replies back until traffic settles
    pub async fn serve(
        &mut self,
        controller: &SyncController,
        rx: &mut mpsc::UnboundedReceiver<Outbound>,
    ) -> anyhow::Result<usize> {
        let mut answered = 0;
        while let Ok(outbound) = rx.try_recv() {
            if outbound.target != self.name {
                bail!("request addressed to {}, expected {}", outbound.target, self.name);
            }
            let request = outbound.message.plan_db_payload()?;
            let reply = self.answer(&request)?;
            controller.on_message(&from_remote(&self.name, &reply)).await;
            answered += 1;
        }
        Ok(answered)
    }
}

/// Listener recording every callback as a short string
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Mutex<Vec<String>>,
    pub failures: Mutex<Vec<RequestFailure>>,
    pub received: Mutex<Vec<PlanContent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl PlanDbListener for Recorder {
    fn catalog_refreshed(&self, state: &CatalogState) {
        self.events.lock().push(format!("refreshed:{}", state.len()));
    }

    fn plan_received(&self, plan: &PlanContent) {
        self.events.lock().push(format!("received:{}", plan.plan_id));
        self.received.lock().push(plan.clone());
    }

    fn plan_acknowledged(&self, plan_id: &str) {
        self.events.lock().push(format!("acknowledged:{plan_id}"));
    }

    fn plan_removed(&self, plan_id: &str) {
        self.events.lock().push(format!("removed:{plan_id}"));
    }

    fn catalog_cleared(&self) {
        self.events.lock().push("cleared".to_string());
    }

    fn request_failed(&self, failure: &RequestFailure) {
        self.events.lock().push(format!("failed:{}", failure.op));
        self.failures.lock().push(failure.clone());
    }
}
