//! Example: Several nodes competing for a scheduled job
//!
//! Run with: `RUST_LOG=debug cargo run --example scheduled_job`
//!
//! Each "node" is a task with its own manager over one shared in-memory store.
//! Every tick all nodes try to run the job; only one of them holds the lease
//! at a time.

use shedlock::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const JOB: &str = "send-digest-emails";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(MemoryLockStore::new());
    let (shutdown, signal) = watch::channel(false);

    let mut nodes = Vec::new();
    for i in 0..3 {
        let locker = LockManager::builder(store.clone())
            .locked_by(format!("node-{i}"))
            .operation_timeout(Duration::from_secs(1))
            .cancel_signal(signal.clone())
            .build();
        nodes.push(tokio::spawn(run_node(locker)));
    }

    tokio::time::sleep(Duration::from_millis(550)).await;
    shutdown.send(true)?;
    for node in nodes {
        let runs = node.await??;
        println!("node finished after running the job {runs} time(s)");
    }

    // Manual lease handling: hold the lock past the job, then let it go early.
    let locker = LockManager::builder(store).locked_by("admin").build();
    if locker.acquire("maintenance", Duration::from_secs(60)).await? {
        println!("maintenance lock held by {}", locker.locked_by());
        locker.release("maintenance").await?;
        println!("maintenance lock released early");
    }

    Ok(())
}

async fn run_node<S: LockStore>(locker: LockManager<S>) -> LockResult<usize> {
    let node = locker.locked_by();
    let mut runs = 0;
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    for _ in 0..5 {
        tick.tick().await;
        let ran = locker
            .run_once(JOB, Duration::from_secs(30), move || async move {
                tracing::info!(node, "sending digest emails");
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
            .await?;
        if ran.is_some() {
            runs += 1;
        }
    }
    Ok(runs)
}
