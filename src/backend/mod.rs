//! Orchestrator + worker pool (§4.E, §5): a single cooperative tick loop
//! owns the job table and decides what's due; a broker channel hands due
//! work to a pool of worker tasks that do the actual SNMP/HTTP I/O.

pub mod manager;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::info;

use crate::config::PollerConfig;
use crate::inventory::InventoryRecord;
use crate::profiles::merge_profiles;
use crate::store::StorePool;
use crate::worker::PollContext;

use scheduler::OrchestratorState;

/// One due job handed to a worker (§3 ScheduledJob, minus scheduling
/// metadata the worker doesn't need).
#[derive(Debug, Clone)]
pub struct PollDispatch {
    pub record: InventoryRecord,
    pub entry_key: String,
}

/// A one-time walk request, either for a freshly matched dynamic device
/// or an IF-MIB rewalk triggered by a config or liveness change (§4.E).
#[derive(Debug, Clone)]
pub struct OnetimeWalk {
    pub host_id: String,
    pub record: InventoryRecord,
    pub root: String,
}

/// A liveness-only check dispatched by the real-time task for a device
/// that isn't due for a full poll right now (§4.E real-time liveness
/// task, independent of each job's own poll cadence).
#[derive(Debug, Clone)]
pub struct LivenessCheck {
    pub host_id: String,
    pub record: InventoryRecord,
}

/// Unit of work passed from the Orchestrator to the worker pool.
#[derive(Debug, Clone)]
pub enum Task {
    Poll(PollDispatch),
    Walk(OnetimeWalk),
    Liveness(LivenessCheck),
}

pub type Broker = mpsc::UnboundedSender<Task>;
pub type BrokerReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Task>>>;

/// Tunable tick intervals (§6 CLI flags).
pub struct OrchestratorTiming {
    pub realtime_task_frequency: Duration,
    pub matching_task_frequency: Duration,
    pub onetime_task_frequency: Duration,
}

/// Everything needed to start the backend (§6 server config + CLI flags,
/// assembled by `bin/poller`).
pub struct BackendConfig {
    pub inventory_path: PathBuf,
    pub config_path: PathBuf,
    pub refresh_interval: Duration,
    pub worker_count: usize,
    pub timing: OrchestratorTiming,
}

/// Start the Orchestrator tick loop, the background tasks, and the
/// worker pool; run until Ctrl+C (§4.E, §5).
pub async fn start_backend(backend_config: BackendConfig, poller_config: PollerConfig, store: StorePool, ctx: PollContext) -> Result<()> {
    info!(workers = backend_config.worker_count, "starting sc4snmp poller backend");

    let (tx, rx): (Broker, mpsc::UnboundedReceiver<Task>) = mpsc::unbounded_channel();
    let rx: BrokerReceiver = Arc::new(Mutex::new(rx));

    let mut worker_handles = Vec::new();
    for worker_id in 0..backend_config.worker_count {
        let worker_rx = rx.clone();
        let worker_ctx = ctx.clone();
        worker_handles.push(tokio::spawn(manager::run_worker(worker_id, worker_rx, worker_ctx)));
    }

    let state = Arc::new(Mutex::new(OrchestratorState::new(
        backend_config.inventory_path.clone(),
        backend_config.config_path.clone(),
    )));
    let shared_config = ctx.config.clone();

    let tick_handle = tokio::spawn(run_tick_loop(
        state.clone(),
        shared_config.clone(),
        backend_config.inventory_path.clone(),
        tx.clone(),
        backend_config.refresh_interval,
        store.clone(),
    ));

    let liveness_handle = tokio::spawn(run_realtime_liveness_task(
        state.clone(),
        tx.clone(),
        backend_config.timing.realtime_task_frequency,
    ));
    let matching_handle = tokio::spawn(run_profile_matching_task(
        state.clone(),
        shared_config.clone(),
        store.clone(),
        backend_config.timing.matching_task_frequency,
    ));
    let rewalk_handle =
        tokio::spawn(run_onetime_rewalk_drain(store.clone(), tx.clone(), backend_config.timing.onetime_task_frequency));

    let _ = poller_config;
    info!("backend running, press Ctrl+C to stop");
    signal::ctrl_c().await?;
    info!("shutdown signal received, stopping tasks");

    tick_handle.abort();
    liveness_handle.abort();
    matching_handle.abort();
    rewalk_handle.abort();
    for handle in worker_handles {
        handle.abort();
    }

    info!("backend stopped");
    Ok(())
}

/// The 1-second cooperative tick loop (§4.E "Main tick loop (every
/// second)"): reconcile when inventory/config changed, then dispatch
/// every due job to the broker. Never blocks on I/O itself.
async fn run_tick_loop(
    state: Arc<Mutex<OrchestratorState>>,
    config: Arc<RwLock<PollerConfig>>,
    inventory_path: PathBuf,
    broker: Broker,
    refresh_interval: Duration,
    store: StorePool,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut last_refresh = tokio::time::Instant::now() - refresh_interval;

    loop {
        interval.tick().await;
        let mut guard = state.lock().await;

        if guard.needs_reconcile() || last_refresh.elapsed() >= refresh_interval {
            last_refresh = tokio::time::Instant::now();
            let parsed = crate::inventory::load_inventory(&inventory_path);
            match parsed {
                Ok(parsed) => {
                    let enricher = config.read().await.enricher.clone();
                    let outcome = guard.reconcile(&parsed.records, &enricher);
                    for host_id in &outcome.deleted_host_ids {
                        let _ = crate::store::delete(store.get_pool(), host_id).await;
                    }
                    if !outcome.removed_families.is_empty() {
                        let families: std::collections::HashSet<String> = outcome.removed_families.iter().cloned().collect();
                        for host_id in guard.jobs.values().map(|j| j.record.host_id()).collect::<std::collections::HashSet<_>>() {
                            let _ = crate::store::delete_static_families(store.get_pool(), &host_id, &families).await;
                        }
                    }
                    for walk in outcome.onetime_walks {
                        let _ = broker.send(Task::Walk(walk));
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to reload inventory"),
            }
        }

        for dispatch in guard.take_due_jobs() {
            if broker.send(Task::Poll(dispatch)).is_err() {
                tracing::warn!("broker channel closed, stopping tick loop");
                return;
            }
        }
    }
}

/// Real-time liveness task (§4.E): at its own configured frequency,
/// independent of any device's own poll cadence, re-check every known
/// device's `sysUpTimeInstance` — including devices still waiting on a
/// dynamic profile match, which otherwise would never get a restart
/// check until they're matched.
async fn run_realtime_liveness_task(state: Arc<Mutex<OrchestratorState>>, broker: Broker, frequency: Duration) {
    let mut interval = tokio::time::interval(frequency);
    loop {
        interval.tick().await;
        let guard = state.lock().await;
        let checks: Vec<LivenessCheck> = guard
            .jobs
            .values()
            .map(|job| LivenessCheck { host_id: job.record.host_id(), record: job.record.clone() })
            .chain(
                guard
                    .unmatched_devices
                    .values()
                    .map(|record| LivenessCheck { host_id: record.host_id(), record: record.clone() }),
            )
            .collect();
        drop(guard);

        tracing::debug!(checks = checks.len(), "real-time liveness tick");
        for check in checks {
            if broker.send(Task::Liveness(check)).is_err() {
                tracing::warn!("broker channel closed, stopping liveness task");
                return;
            }
        }
    }
}

/// Profile matching task (§4.E): for every device still waiting on a
/// dynamic profile match, check whether its real-time data now carries a
/// description and, if so, assign it a profile.
async fn run_profile_matching_task(state: Arc<Mutex<OrchestratorState>>, config: Arc<RwLock<PollerConfig>>, store: StorePool, frequency: Duration) {
    let mut interval = tokio::time::interval(frequency);
    loop {
        interval.tick().await;
        let mut guard = state.lock().await;
        if guard.unmatched_devices.is_empty() {
            continue;
        }

        let mut descriptions = std::collections::HashMap::new();
        for (host, record) in guard.unmatched_devices.clone() {
            if let Ok(Some(data)) = crate::store::real_time_data(store.get_pool(), &record.host_id()).await {
                let sys_descr = data.get("sysObjects").and_then(|o| o.get("1.3.6.1.2.1.1.1.0")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                let sys_object_id = data.get("sysObjects").and_then(|o| o.get("1.3.6.1.2.1.1.2.0")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                descriptions.insert(host, (sys_descr, sys_object_id));
            }
        }

        let profiles = merge_profiles(std::collections::HashMap::new(), config.read().await.profiles.clone());
        for (record, profile_name, frequency) in scheduler::match_unmatched_devices(&guard.unmatched_devices, &descriptions, &profiles) {
            guard.apply_profile_match(&record, &profile_name, frequency);
        }
    }
}

/// One-time re-walk drain (§4.E): pull everything the store has queued
/// and hand each to the broker as a walk task.
async fn run_onetime_rewalk_drain(store: StorePool, broker: Broker, frequency: Duration) {
    let mut interval = tokio::time::interval(frequency);
    loop {
        interval.tick().await;
        let pending = match crate::store::dequeue_all_pending(store.get_pool()).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to drain rewalk queue");
                continue;
            }
        };
        for item in pending {
            let version = match item.version.as_str() {
                "1" => crate::snmp::SnmpVersion::V1,
                "3" => crate::snmp::SnmpVersion::V3,
                _ => crate::snmp::SnmpVersion::V2c,
            };
            let record = InventoryRecord {
                host: item.host_id.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_else(|| item.host_id.clone()),
                port: item.host_id.rsplit_once(':').and_then(|(_, p)| p.parse().ok()).unwrap_or(161),
                version,
                credential: item.credential.clone(),
                profile: String::new(),
                frequency_seconds: None,
            };
            let walk = OnetimeWalk {
                host_id: item.host_id.clone(),
                record,
                root: crate::snmp::oids::oid_to_string(&crate::snmp::oids::UNIVERSAL_ROOT),
            };
            let _ = broker.send(Task::Walk(walk));
        }
    }
}

/// Resolve `AUTO * N`-style worker-count config into a concrete thread
/// count (§6 CLI flags).
pub fn calculate_workers(tasks_str: &str) -> usize {
    if tasks_str.starts_with("AUTO") {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        if let Some(multiplier) = tasks_str.split('*').nth(1) {
            let mult: usize = multiplier.trim().parse().unwrap_or(2);
            cpus * mult
        } else {
            cpus * 2
        }
    } else {
        tasks_str.parse().unwrap_or(4)
    }
}
