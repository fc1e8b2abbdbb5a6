//! Discovery & Enrichment Store Adapter (§4.C): a document store keyed by
//! `host:port`, backed by Postgres JSONB columns so idempotent per-field
//! upserts can use the database's own row locking for compare-and-set
//! (§5 "shared resources").

pub mod pool;
pub mod queries;

pub use pool::StorePool;
pub use queries::*;

use serde::{Deserialize, Serialize};

/// Reason a device is queued for a one-time re-walk (§3 DeviceState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewalkReason {
    None,
    FirstTime,
    AfterFail,
    UptimeRegressed,
    EnricherChanged,
}

impl Default for RewalkReason {
    fn default() -> Self {
        RewalkReason::None
    }
}
