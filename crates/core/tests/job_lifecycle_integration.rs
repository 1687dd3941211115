// End-to-end job lifecycle coverage: state machine, FIFO admission,
// cooperative and forced cancellation, retention sweep.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use folio_common::error::OperationError;
use folio_common::types::{Caller, JobSnapshot, JobState};
use folio_core::config::JobConfig;
use folio_core::jobs::{JobInvocation, JobManager};
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

fn owner() -> Caller {
    Caller::for_user(Uuid::new_v4(), ["documents:read"])
}

async fn wait_for(
    manager: &JobManager,
    job_id: Uuid,
    caller: &Caller,
    predicate: impl Fn(&JobSnapshot) -> bool,
) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = manager.get_status(job_id, caller).await.expect("job should be queryable");
        if predicate(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never satisfied the awaited condition");
}

#[tokio::test]
async fn job_walks_the_state_machine_exactly_once() {
    let manager = JobManager::start(JobConfig::default());
    let caller = owner();
    let release = Arc::new(Notify::new());

    let gate = Arc::clone(&release);
    let invocation: JobInvocation = Box::new(move |_cancel| {
        Box::pin(async move {
            gate.notified().await;
            Ok(json!({ "exported": 3 }))
        })
    });

    let job_id = manager
        .schedule("doc.export", invocation, caller.owner_key())
        .await
        .expect("job should schedule");

    // Freshly scheduled: pending or already picked up, but not terminal.
    let snapshot = manager.get_status(job_id, &caller).await.expect("job should exist");
    assert!(!snapshot.state.is_terminal());
    assert!(snapshot.result.is_none() && snapshot.error.is_none());

    let running = wait_for(&manager, job_id, &caller, |s| s.state == JobState::Running).await;
    assert!(running.started_at.is_some());

    release.notify_one();
    let done = wait_for(&manager, job_id, &caller, |s| s.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Succeeded);
    assert_eq!(done.result, Some(json!({ "exported": 3 })));
    assert!(done.error.is_none());
    assert!(done.finished_at.is_some());

    // Terminal means immutable: later reads see the identical snapshot.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let again = manager.get_status(job_id, &caller).await.expect("job should still be retained");
    assert_eq!(again, done);

    manager.shutdown();
}

#[tokio::test]
async fn admission_into_running_is_fifo_with_one_worker() {
    let manager = JobManager::start(JobConfig {
        workers: 1,
        ..JobConfig::default()
    });
    let caller = owner();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut job_ids = Vec::new();
    for index in 0..4_usize {
        let order = Arc::clone(&order);
        let invocation: JobInvocation = Box::new(move |_cancel| {
            Box::pin(async move {
                order.lock().expect("order lock should not poison").push(index);
                Ok(json!({ "index": index }))
            })
        });
        let job_id = manager
            .schedule("doc.export", invocation, caller.owner_key())
            .await
            .expect("job should schedule");
        job_ids.push(job_id);
    }

    for job_id in &job_ids {
        wait_for(&manager, *job_id, &caller, |s| s.state.is_terminal()).await;
    }

    let observed = order.lock().expect("order lock should not poison").clone();
    assert_eq!(observed, vec![0, 1, 2, 3], "single worker must admit jobs in schedule order");
    manager.shutdown();
}

#[tokio::test]
async fn cancelling_a_pending_job_skips_the_handler_entirely() {
    let manager = JobManager::start(JobConfig {
        workers: 1,
        ..JobConfig::default()
    });
    let caller = owner();
    let invoked = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    // Park the single worker.
    let gate = Arc::clone(&release);
    let blocker: JobInvocation = Box::new(move |_cancel| {
        Box::pin(async move {
            gate.notified().await;
            Ok(json!(null))
        })
    });
    let blocker_id = manager
        .schedule("doc.export", blocker, caller.owner_key())
        .await
        .expect("blocker should schedule");
    wait_for(&manager, blocker_id, &caller, |s| s.state == JobState::Running).await;

    // This one stays pending behind the blocker; cancel it there.
    let spy = Arc::clone(&invoked);
    let victim: JobInvocation = Box::new(move |_cancel| {
        Box::pin(async move {
            spy.fetch_add(1, Ordering::SeqCst);
            Ok(json!(null))
        })
    });
    let victim_id = manager
        .schedule("doc.export", victim, caller.owner_key())
        .await
        .expect("victim should schedule");

    let cancelled = manager.cancel(victim_id, &caller).await.expect("pending cancel succeeds");
    assert_eq!(cancelled.state, JobState::Cancelled);

    // Unblock the worker; it must discard the cancelled queue entry.
    release.notify_one();
    wait_for(&manager, blocker_id, &caller, |s| s.state.is_terminal()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(invoked.load(Ordering::SeqCst), 0, "cancelled pending job must never run");
    let snapshot = manager.get_status(victim_id, &caller).await.expect("snapshot retained");
    assert_eq!(snapshot.state, JobState::Cancelled);
    assert!(snapshot.started_at.is_none());
    manager.shutdown();
}

#[tokio::test]
async fn cancel_of_a_running_job_is_observable_immediately_and_cooperatively() {
    let manager = JobManager::start(JobConfig::default());
    let caller = owner();
    let observed_cancel = Arc::new(AtomicUsize::new(0));

    let spy = Arc::clone(&observed_cancel);
    let invocation: JobInvocation = Box::new(move |cancel| {
        Box::pin(async move {
            cancel.cancelled().await;
            spy.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "ignored": "late result" }))
        })
    });

    let job_id = manager
        .schedule("doc.export", invocation, caller.owner_key())
        .await
        .expect("job should schedule");
    wait_for(&manager, job_id, &caller, |s| s.state == JobState::Running).await;

    manager.cancel(job_id, &caller).await.expect("running cancel succeeds");

    // Status boundary: once cancel returned, the job is never again
    // pending or running.
    let snapshot = manager.get_status(job_id, &caller).await.expect("snapshot retained");
    assert_eq!(snapshot.state, JobState::Cancelled);
    assert!(snapshot.result.is_none(), "late handler output must be discarded");

    // The handler observed the token and unwound within the grace
    // window.
    for _ in 0..100 {
        if observed_cancel.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(observed_cancel.load(Ordering::SeqCst), 1);

    let after = manager.get_status(job_id, &caller).await.expect("snapshot retained");
    assert_eq!(after.state, JobState::Cancelled);
    assert!(after.result.is_none());
    manager.shutdown();
}

#[tokio::test]
async fn handler_that_ignores_cancellation_is_force_finalized() {
    let manager = JobManager::start(JobConfig {
        cancel_grace_secs: 0,
        ..JobConfig::default()
    });
    let caller = owner();

    let invocation: JobInvocation = Box::new(|_cancel| {
        Box::pin(async {
            // Never observes the token.
            std::future::pending::<()>().await;
            unreachable!()
        })
    });

    let job_id = manager
        .schedule("doc.export", invocation, caller.owner_key())
        .await
        .expect("job should schedule");
    wait_for(&manager, job_id, &caller, |s| s.state == JobState::Running).await;

    manager.cancel(job_id, &caller).await.expect("cancel succeeds");
    let snapshot =
        wait_for(&manager, job_id, &caller, |s| s.state == JobState::Cancelled).await;
    assert!(snapshot.result.is_none() && snapshot.error.is_none());
    manager.shutdown();
}

#[tokio::test]
async fn sweep_evicts_terminal_jobs_past_retention() {
    let manager = JobManager::start(JobConfig {
        retention_secs: 0,
        // Keep the background sweeper out of the way; the test drives
        // the sweep directly.
        sweep_interval_secs: 3_600,
        ..JobConfig::default()
    });
    let caller = owner();

    let invocation: JobInvocation =
        Box::new(|_cancel| Box::pin(async { Ok(json!({ "done": true })) }));
    let job_id = manager
        .schedule("doc.export", invocation, caller.owner_key())
        .await
        .expect("job should schedule");
    wait_for(&manager, job_id, &caller, |s| s.state.is_terminal()).await;

    manager.sweep_now().await;

    let error = manager
        .get_status(job_id, &caller)
        .await
        .expect_err("evicted job must be indistinguishable from unknown");
    assert_eq!(error, OperationError::NotFound);
    assert_eq!(manager.retained_len().await, 0);
    manager.shutdown();
}

#[tokio::test]
async fn sweep_leaves_live_and_recent_jobs_alone() {
    let manager = JobManager::start(JobConfig {
        workers: 1,
        sweep_interval_secs: 3_600,
        ..JobConfig::default()
    });
    let caller = owner();
    let release = Arc::new(Notify::new());

    let gate = Arc::clone(&release);
    let running: JobInvocation = Box::new(move |_cancel| {
        Box::pin(async move {
            gate.notified().await;
            Ok(json!(null))
        })
    });
    let running_id = manager
        .schedule("doc.export", running, caller.owner_key())
        .await
        .expect("job should schedule");
    wait_for(&manager, running_id, &caller, |s| s.state == JobState::Running).await;

    manager.sweep_now().await;
    assert!(
        manager.get_status(running_id, &caller).await.is_ok(),
        "non-terminal jobs are never swept"
    );

    release.notify_one();
    let done = wait_for(&manager, running_id, &caller, |s| s.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Succeeded);

    // Default retention is fifteen minutes; a fresh terminal job stays.
    manager.sweep_now().await;
    assert!(manager.get_status(running_id, &caller).await.is_ok());
    manager.shutdown();
}
