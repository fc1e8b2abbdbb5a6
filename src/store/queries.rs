//! Store Adapter operations (§4.C). Every write is an idempotent upsert;
//! multi-step reads against a single document go through a
//! `SELECT ... FOR UPDATE` transaction so concurrent workers serialize on
//! that one row instead of racing each other (§5 "per-document
//! read-modify-write... protected by the store's own compare-and-set").

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sqlx::PgPool;

use super::RewalkReason;

fn reason_str(reason: RewalkReason) -> &'static str {
    match reason {
        RewalkReason::None => "none",
        RewalkReason::FirstTime => "first_time",
        RewalkReason::AfterFail => "after_fail",
        RewalkReason::UptimeRegressed => "uptime_regressed",
        RewalkReason::EnricherChanged => "enricher_changed",
    }
}

/// `contains(host_id) -> bool`
pub async fn contains(pool: &PgPool, host_id: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM device_documents WHERE host_id = $1)")
        .bind(host_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// `upsert_real_time(host_id, partial_dict)`: merge `partial` into
/// `real_time_data`, creating the document if it doesn't exist yet.
pub async fn upsert_real_time(pool: &PgPool, host_id: &str, partial: &Value) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO device_documents (host_id, real_time_data)
           VALUES ($1, $2)
           ON CONFLICT (host_id) DO UPDATE SET
             real_time_data = device_documents.real_time_data || EXCLUDED.real_time_data,
             updated_at = now()"#,
    )
    .bind(host_id)
    .bind(partial)
    .execute(pool)
    .await
    .context("upserting real-time data")?;
    Ok(())
}

/// `real_time_data(host_id) -> map | nil`
pub async fn real_time_data(pool: &PgPool, host_id: &str) -> Result<Option<Value>> {
    let row: Option<Value> = sqlx::query_scalar("SELECT real_time_data FROM device_documents WHERE host_id = $1")
        .bind(host_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// `static_data(host_id) -> oidFamily -> dimension_table | nil`
pub async fn static_data(pool: &PgPool, host_id: &str) -> Result<Option<Value>> {
    let row: Option<Value> = sqlx::query_scalar("SELECT static_data FROM device_documents WHERE host_id = $1")
        .bind(host_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// `update_static_existing(host_id, family, attribute, values_list)`:
/// replace one dimension array within a family's dimension table.
pub async fn update_static_existing(
    pool: &PgPool,
    host_id: &str,
    family: &str,
    attribute: &str,
    values: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    let existing: Option<Value> = sqlx::query_scalar(
        "SELECT static_data FROM device_documents WHERE host_id = $1 FOR UPDATE",
    )
    .bind(host_id)
    .fetch_optional(&mut *tx)
    .await?;

    let mut static_data = existing.unwrap_or_else(|| json!({}));
    let family_entry = static_data.as_object_mut().unwrap().entry(family).or_insert_with(|| json!({}));
    family_entry.as_object_mut().unwrap().insert(attribute.to_string(), json!(values));

    sqlx::query(
        r#"INSERT INTO device_documents (host_id, static_data)
           VALUES ($1, $2)
           ON CONFLICT (host_id) DO UPDATE SET static_data = EXCLUDED.static_data, updated_at = now()"#,
    )
    .bind(host_id)
    .bind(&static_data)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// `update_static_additional(host_id, family, {indexName -> splunkName})`:
/// record the additional-varbind dimension name mapping for a family.
pub async fn update_static_additional(
    pool: &PgPool,
    host_id: &str,
    family: &str,
    names: &HashMap<String, String>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    let existing: Option<Value> = sqlx::query_scalar(
        "SELECT static_data FROM device_documents WHERE host_id = $1 FOR UPDATE",
    )
    .bind(host_id)
    .fetch_optional(&mut *tx)
    .await?;

    let mut static_data = existing.unwrap_or_else(|| json!({}));
    let family_entry = static_data.as_object_mut().unwrap().entry(family).or_insert_with(|| json!({}));
    family_entry.as_object_mut().unwrap().insert("additional_names".to_string(), json!(names));

    sqlx::query(
        r#"INSERT INTO device_documents (host_id, static_data)
           VALUES ($1, $2)
           ON CONFLICT (host_id) DO UPDATE SET static_data = EXCLUDED.static_data, updated_at = now()"#,
    )
    .bind(host_id)
    .bind(&static_data)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// `delete_static_families(host_id, family_set)`: drop the listed families
/// from `static_data`, but never `IF-MIB` through this path (§4.C, §8
/// boundary case) — callers are expected to have already excluded it, and
/// this function enforces that exclusion defensively.
pub async fn delete_static_families(pool: &PgPool, host_id: &str, families: &HashSet<String>) -> Result<()> {
    let mut tx = pool.begin().await?;
    let existing: Option<Value> = sqlx::query_scalar(
        "SELECT static_data FROM device_documents WHERE host_id = $1 FOR UPDATE",
    )
    .bind(host_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(mut static_data) = existing else {
        return Ok(());
    };
    if let Some(obj) = static_data.as_object_mut() {
        for family in families {
            if family == crate::snmp::oids::IF_MIB_FAMILY {
                continue;
            }
            obj.remove(family);
        }
    }

    sqlx::query("UPDATE device_documents SET static_data = $2, updated_at = now() WHERE host_id = $1")
        .bind(host_id)
        .bind(&static_data)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// `delete(host_id)`: remove all state for a device.
pub async fn delete(pool: &PgPool, host_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM device_documents WHERE host_id = $1").bind(host_id).execute(pool).await?;
    sqlx::query("DELETE FROM rewalk_queue WHERE host_id = $1").bind(host_id).execute(pool).await?;
    Ok(())
}

/// `enqueue_rewalk(host_id, version, credential)`
pub async fn enqueue_rewalk(pool: &PgPool, host_id: &str, version: &str, credential: &str) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO rewalk_queue (host_id, version, credential)
           VALUES ($1, $2, $3)
           ON CONFLICT (host_id) DO UPDATE SET version = EXCLUDED.version, credential = EXCLUDED.credential"#,
    )
    .bind(host_id)
    .bind(version)
    .bind(credential)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingRewalk {
    pub host_id: String,
    pub version: String,
    pub credential: String,
}

/// `dequeue_all_pending() -> list`: drain the whole queue atomically.
pub async fn dequeue_all_pending(pool: &PgPool) -> Result<Vec<PendingRewalk>> {
    let mut tx = pool.begin().await?;
    let pending: Vec<PendingRewalk> =
        sqlx::query_as("SELECT host_id, version, credential FROM rewalk_queue FOR UPDATE SKIP LOCKED")
            .fetch_all(&mut *tx)
            .await?;
    sqlx::query("DELETE FROM rewalk_queue").execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(pending)
}

/// `clear_rewalk(host_id)`
pub async fn clear_rewalk(pool: &PgPool, host_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM rewalk_queue WHERE host_id = $1").bind(host_id).execute(pool).await?;
    Ok(())
}

/// Set the device's `pending_rewalk_reason` field (§3 DeviceState,
/// §7 category-2 error handling: "set the device's pending_rewalk_reason").
pub async fn set_pending_rewalk_reason(pool: &PgPool, host_id: &str, reason: RewalkReason) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO device_documents (host_id, pending_rewalk_reason)
           VALUES ($1, $2)
           ON CONFLICT (host_id) DO UPDATE SET pending_rewalk_reason = EXCLUDED.pending_rewalk_reason, updated_at = now()"#,
    )
    .bind(host_id)
    .bind(reason_str(reason))
    .execute(pool)
    .await?;
    Ok(())
}

/// Update the device's last-seen `sysUpTimeInstance` and return the
/// previous value, used by the real-time liveness task's restart check
/// (§4.E, §8 "walk monotonicity").
pub async fn swap_last_sys_uptime(pool: &PgPool, host_id: &str, new_uptime: i64) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;
    let previous: Option<i64> =
        sqlx::query_scalar("SELECT last_sys_uptime FROM device_documents WHERE host_id = $1 FOR UPDATE")
            .bind(host_id)
            .fetch_optional(&mut *tx)
            .await?
            .flatten();

    sqlx::query(
        r#"INSERT INTO device_documents (host_id, last_sys_uptime)
           VALUES ($1, $2)
           ON CONFLICT (host_id) DO UPDATE SET last_sys_uptime = EXCLUDED.last_sys_uptime, updated_at = now()"#,
    )
    .bind(host_id)
    .bind(new_uptime)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(previous)
}
