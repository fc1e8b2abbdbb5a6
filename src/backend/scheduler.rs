//! Scheduler / Orchestrator (§4.E): owns the live job table, reacts to
//! inventory and config changes, and decides what to dispatch to the
//! broker. Runs single-threaded and cooperative — every method here is
//! either pure or touches only in-memory maps and file mtimes; SNMP/HTTP
//! I/O always happens on the worker side (§5).

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use tracing::{info, warn};

use crate::enricher::{families_removed, if_mib_rules_changed, EnricherConfig};
use crate::inventory::{self, InventoryRecord, DYNAMIC_PROFILE};
use crate::profiles::{assign_profiles, Profile};

use super::{OnetimeWalk, PollDispatch};

/// One entry in the live job table, keyed by `entry_key = host#profile`
/// (§3 ScheduledJob). Immutable — rescheduling replaces the map entry
/// rather than mutating one in place (§9 design note).
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub record: InventoryRecord,
    pub interval_seconds: u64,
    pub next_run_at: Instant,
    pub generation: u64,
}

impl ScheduledJob {
    fn new(record: InventoryRecord, interval_seconds: u64, generation: u64) -> Self {
        Self { record, interval_seconds, next_run_at: Instant::now() + Duration::from_secs(interval_seconds), generation }
    }

    fn due(&self, now: Instant) -> bool {
        now >= self.next_run_at
    }

    fn rescheduled(&self, now: Instant) -> Self {
        Self { next_run_at: now + Duration::from_secs(self.interval_seconds), ..self.clone() }
    }
}

/// Outcome of reconciling one valid inventory row, reported up so the
/// caller can wire store deletes / one-time walks without this module
/// needing store access directly (kept a pure function, §4.E).
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub onetime_walks: Vec<OnetimeWalk>,
    pub deleted_host_ids: Vec<String>,
    /// OID families to drop from every known device's static data because
    /// the enricher config stopped naming them (§4.E step 5); never
    /// contains `IF-MIB` (see [`families_removed`]).
    pub removed_families: Vec<String>,
}

/// The live state the Orchestrator owns (§4.E "State").
pub struct OrchestratorState {
    pub jobs: HashMap<String, ScheduledJob>,
    pub enricher_jobs: HashMap<String, ScheduledJob>,
    pub dynamic_jobs: HashSet<String>,
    pub unmatched_devices: HashMap<String, InventoryRecord>,
    pub inventory_mtime: Option<SystemTime>,
    pub config_mtime: Option<SystemTime>,
    pub force_refresh: bool,
    pub old_enricher: EnricherConfig,
    known_host_ids: HashSet<String>,
    inventory_path: PathBuf,
    config_path: PathBuf,
    generation: u64,
}

impl OrchestratorState {
    pub fn new(inventory_path: PathBuf, config_path: PathBuf) -> Self {
        Self {
            jobs: HashMap::new(),
            enricher_jobs: HashMap::new(),
            dynamic_jobs: HashSet::new(),
            unmatched_devices: HashMap::new(),
            inventory_mtime: None,
            config_mtime: None,
            force_refresh: true,
            old_enricher: EnricherConfig::default(),
            known_host_ids: HashSet::new(),
            inventory_path,
            config_path,
            generation: 0,
        }
    }

    /// True when either watched file has advanced, or a refresh was
    /// forced (§4.E "Triggered when the inventory file or config file
    /// mtime advances, or on explicit force").
    pub fn needs_reconcile(&self) -> bool {
        if self.force_refresh {
            return true;
        }
        let current_inventory_mtime = inventory::file_mtime(&self.inventory_path);
        let current_config_mtime = crate::config::config_mtime(&self.config_path);
        current_inventory_mtime != self.inventory_mtime || current_config_mtime != self.config_mtime
    }

    /// Reconcile the live job table against the current inventory + the
    /// given enricher config (§4.E steps 1-5). Config reload and store
    /// access are the caller's responsibility; this takes the
    /// already-loaded values so the core logic stays a pure-ish
    /// in-memory operation and stays unit-testable.
    pub fn reconcile(&mut self, records: &[InventoryRecord], new_enricher: &EnricherConfig) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let now = Instant::now();

        let live_entry_keys: HashSet<String> =
            records.iter().filter(|r| !r.is_dynamic()).map(InventoryRecord::entry_key).collect();
        let live_host_ids: HashSet<String> = records.iter().map(InventoryRecord::host_id).collect();

        for record in records {
            if record.is_dynamic() {
                // Already matched to a real profile by a prior reconcile:
                // its job lives under `host#profile_name`, not this
                // `host#*` row, so leave it alone rather than treating the
                // still-dynamic inventory row as a fresh unmatched device.
                let already_matched = self.dynamic_jobs.iter().any(|key| key.starts_with(&format!("{}#", record.host)));
                if already_matched {
                    continue;
                }
                let is_new_host = !self.unmatched_devices.contains_key(&record.host);
                self.unmatched_devices.insert(record.host.clone(), record.clone());
                if is_new_host {
                    outcome.onetime_walks.push(OnetimeWalk {
                        host_id: record.host_id(),
                        record: record.clone(),
                        root: crate::snmp::oids::oid_to_string(&crate::snmp::oids::UNIVERSAL_ROOT),
                    });
                }
                continue;
            }

            let entry_key = record.entry_key();
            let frequency = record.frequency_seconds.unwrap_or(crate::profiles::DEFAULT_DYNAMIC_FREQUENCY_SECONDS);
            match self.jobs.get(&entry_key) {
                None => {
                    self.generation += 1;
                    self.jobs.insert(entry_key.clone(), ScheduledJob::new(record.clone(), frequency, self.generation));
                }
                Some(existing) if existing.record != *record => {
                    self.generation += 1;
                    let replacement = ScheduledJob::new(record.clone(), frequency, self.generation);
                    let soonest = replacement.next_run_at.min(existing.next_run_at);
                    self.jobs.insert(entry_key, ScheduledJob { next_run_at: soonest, ..replacement });
                }
                Some(_) => {}
            }
        }

        // Drop dynamic-match jobs whose host left the inventory first, so
        // the stale-key sweep below sees an up-to-date survivor set: a
        // matched dynamic job's key (`host#profile_name`) never appears in
        // `live_entry_keys` (that only holds non-dynamic rows' keys), so it
        // must be kept alive explicitly via `dynamic_jobs` membership.
        self.dynamic_jobs.retain(|key| live_host_ids.iter().any(|h| key.starts_with(&format!("{}#", h))));

        let stale_keys: Vec<String> =
            self.jobs.keys().filter(|k| !live_entry_keys.contains(*k) && !self.dynamic_jobs.contains(*k)).cloned().collect();
        for key in stale_keys {
            self.jobs.remove(&key);
        }
        self.unmatched_devices.retain(|host, _| live_host_ids.iter().any(|h| h.starts_with(host)));

        // Hosts present in the previous reconcile but dropped from this
        // one lose their whole device document (§4.E step 4).
        for host_id in self.known_host_ids.difference(&live_host_ids) {
            outcome.deleted_host_ids.push(host_id.clone());
            self.enricher_jobs.retain(|key, _| !key.starts_with(&format!("{}#", host_id)));
        }
        self.known_host_ids = live_host_ids.clone();

        // Enricher config changed since the last reconcile: drop families
        // no longer configured, and force a fresh IF-MIB walk per known
        // device if its rules changed (§4.E step 5).
        outcome.removed_families = families_removed(&self.old_enricher, new_enricher);
        if if_mib_rules_changed(&self.old_enricher, new_enricher) {
            for host_id in &live_host_ids {
                outcome.onetime_walks.push(OnetimeWalk {
                    host_id: host_id.clone(),
                    record: records.iter().find(|r| &r.host_id() == host_id).cloned().unwrap_or_else(|| dummy_record(host_id)),
                    root: crate::snmp::oids::oid_to_string(&crate::snmp::oids::IF_NUMBER),
                });
            }
        }
        self.old_enricher = new_enricher.clone();
        self.force_refresh = false;
        self.inventory_mtime = inventory::file_mtime(&self.inventory_path);
        self.config_mtime = crate::config::config_mtime(&self.config_path);

        outcome
    }

    /// Jobs whose `next_run_at` has passed; marks each as rescheduled for
    /// its next interval (§4.E "run_pending_jobs").
    pub fn take_due_jobs(&mut self) -> Vec<PollDispatch> {
        let now = Instant::now();
        let mut dispatches = Vec::new();
        let due_keys: Vec<String> = self.jobs.iter().filter(|(_, job)| job.due(now)).map(|(k, _)| k.clone()).collect();
        for key in due_keys {
            if let Some(job) = self.jobs.get(&key) {
                dispatches.push(PollDispatch { record: job.record.clone(), entry_key: key.clone() });
                let rescheduled = job.rescheduled(now);
                self.jobs.insert(key, rescheduled);
            }
        }
        dispatches
    }

    /// Apply a dynamic profile match: create a ScheduledJob bound to the
    /// matched profile and drop the host from `unmatched_devices`
    /// (§4.E "Profile matching task").
    pub fn apply_profile_match(&mut self, record: &InventoryRecord, profile_name: &str, frequency_seconds: u64) {
        let mut matched = record.clone();
        matched.profile = profile_name.to_string();
        let entry_key = matched.entry_key();
        self.generation += 1;
        self.jobs.insert(entry_key.clone(), ScheduledJob::new(matched, frequency_seconds, self.generation));
        self.dynamic_jobs.insert(entry_key);
        self.unmatched_devices.remove(&record.host);
    }
}

fn dummy_record(host_id: &str) -> InventoryRecord {
    let host = host_id.split(':').next().unwrap_or(host_id).to_string();
    InventoryRecord {
        host,
        port: 161,
        version: crate::snmp::SnmpVersion::V2c,
        credential: String::new(),
        profile: String::new(),
        frequency_seconds: None,
    }
}

/// `device_restarted`/`should_walk` (§4.E real-time liveness task, §8
/// "walk monotonicity"): both values must parse as TimeTicks and the
/// previous reading must exceed the new one.
pub fn device_restarted(previous: Option<i64>, new_uptime: i64) -> bool {
    match previous {
        Some(prev) => prev > new_uptime,
        None => false,
    }
}

/// `should_walk` combines "never seen before" with the restart check
/// (§4.E).
pub fn should_walk(host_known: bool, previous_uptime: Option<i64>, new_uptime: i64) -> bool {
    !host_known || device_restarted(previous_uptime, new_uptime)
}

/// Evaluate dynamic profile matching for every unmatched device whose
/// real-time data now carries a non-empty description (§4.E "Profile
/// matching task").
pub fn match_unmatched_devices(
    unmatched: &HashMap<String, InventoryRecord>,
    descriptions: &HashMap<String, (String, String)>,
    profiles: &HashMap<String, Profile>,
) -> Vec<(InventoryRecord, String, u64)> {
    let mut matches = Vec::new();
    for (host, record) in unmatched {
        let Some((sys_descr, sys_object_id)) = descriptions.get(host) else { continue };
        if sys_descr.is_empty() && sys_object_id.is_empty() {
            continue;
        }
        for (profile_name, frequency) in assign_profiles(profiles, sys_descr, sys_object_id) {
            matches.push((record.clone(), profile_name, frequency));
            break;
        }
    }
    matches
}
