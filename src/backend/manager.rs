//! Worker pool (§5 "execution... behind a broker with at-least-once
//! semantics"): each worker owns one lazily-initialized [`Engine`] and
//! loops pulling tasks off the shared broker receiver.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::snmp::Engine;
use crate::worker::{execute_liveness_check, execute_onetime_walk, execute_poll, PollContext};

use super::{BrokerReceiver, Task};

const SNMP_TIMEOUT: Duration = Duration::from_secs(5);
const SNMP_RETRIES: usize = 2;
const TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Run one worker: a single [`Engine`] instance lives for the worker's
/// whole lifetime (§5 "per-worker-thread lazy SNMP engine instance"),
/// reused across every task it dequeues. Each task runs on its own
/// `tokio::spawn`'d task so a panic inside `execute_poll`/
/// `execute_onetime_walk` is caught by the runtime as a `JoinError`
/// instead of taking the whole worker down (§7 category 2/4).
pub async fn run_worker(worker_id: usize, rx: BrokerReceiver, ctx: PollContext) {
    let engine = Arc::new(Engine::new(SNMP_TIMEOUT, SNMP_RETRIES));
    info!(worker_id, "worker started");

    loop {
        let task = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(task) = task else {
            info!(worker_id, "broker channel closed, worker exiting");
            return;
        };

        let task_engine = engine.clone();
        let task_ctx = ctx.clone();
        let handle = tokio::spawn(async move { run_task(&task_engine, &task_ctx, &task).await });

        match tokio::time::timeout(TASK_TIMEOUT, handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(worker_id, error = %e, "task failed"),
            Ok(Err(join_err)) => error!(worker_id, error = %join_err, "caught panic at worker task boundary"),
            Err(_) => warn!(worker_id, "task timed out"),
        }
    }
}

async fn run_task(engine: &Engine, ctx: &PollContext, task: &Task) -> anyhow::Result<()> {
    match task {
        Task::Poll(dispatch) => execute_poll(engine, ctx, dispatch).await,
        Task::Walk(walk) => execute_onetime_walk(engine, ctx, walk).await,
        Task::Liveness(check) => execute_liveness_check(engine, ctx, check).await,
    }
}
