//! Tests for jobs and the job manager.

use super::*;
use crate::error::MbError;
use serde_json::json;
use std::time::Duration;

fn manager() -> JobManager {
    JobManager::start(Duration::from_millis(200))
}

/// Poll until the manager's active set is empty.
async fn wait_until_idle(manager: &JobManager) {
    for _ in 0..100 {
        if manager.active().await.unwrap().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("jobs still active: {:?}", manager.active().await.unwrap());
}

#[tokio::test]
async fn test_new_ids_are_unique() {
    assert_ne!(JobManager::new_id(), JobManager::new_id());
}

#[tokio::test]
async fn test_started_job_is_active_and_findable() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();

    let active = manager.active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, job.id());
    assert_eq!(active[0].kind, "provision");
    assert_eq!(active[0].state, JobState::Running);

    let record = manager.find(job.id()).await.unwrap().unwrap();
    assert_eq!(record.status, "Starting");
    assert!(record.time_end.is_none());
}

#[tokio::test]
async fn test_find_unknown_job_is_none() {
    let manager = manager();
    assert!(manager.find(JobManager::new_id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_keeps_record() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();
    job.report_success(None).await;
    manager.complete(&job).await.unwrap();

    assert!(manager.active().await.unwrap().is_empty());
    let record = manager.find(job.id()).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Success);
    assert!(record.time_end.is_some());
    assert_eq!(manager.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_is_last_write_wins() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();

    job.set_status("Locking environment:prod").await;
    job.set_status("Bootstrapping 3 nodes").await;

    let record = manager.find(job.id()).await.unwrap().unwrap();
    assert_eq!(record.status, "Bootstrapping 3 nodes");
    assert_eq!(job.status().await.unwrap(), "Bootstrapping 3 nodes");
}

#[tokio::test]
async fn test_update_pushes_latest_record() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();
    job.set_status("working").await;

    manager.update(&job).await.unwrap();

    let record = manager.find(job.id()).await.unwrap().unwrap();
    assert_eq!(record.status, "working");
    assert_eq!(record.state, JobState::Running);
}

#[tokio::test]
async fn test_terminal_state_is_final() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();

    job.report_success(Some(json!({"nodes": 2}))).await;
    job.report_failure("too late").await;

    let record = manager.find(job.id()).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Success);
    assert_eq!(record.result, Some(json!({"nodes": 2})));
    assert!(record.error.is_none());
}

#[tokio::test]
async fn test_failure_sets_error_and_status() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();

    job.report_failure(MbError::RemoteCommand("chef-client exited 1".into()))
        .await;

    let record = job.record().await.unwrap();
    assert_eq!(record.state, JobState::Failure);
    assert_eq!(record.error.as_deref(), Some("chef-client exited 1"));
    assert_eq!(record.status, "chef-client exited 1");
}

#[tokio::test]
async fn test_dropping_every_handle_fails_running_job() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();
    let id = job.id();
    drop(job);

    wait_until_idle(&manager).await;

    let record = manager.find(id).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Failure);
    assert!(record.error.unwrap().starts_with("incomplete:"));
}

#[tokio::test]
async fn test_weak_job_does_not_keep_job_alive() {
    let manager = manager();
    let job = Job::start("provision", &manager).await.unwrap();
    let weak = job.downgrade();
    assert!(weak.upgrade().is_some());

    drop(job);
    wait_until_idle(&manager).await;

    assert!(weak.upgrade().is_none());
}

#[tokio::test]
async fn test_spawned_job_reports_result() {
    let manager = manager();
    let spawned = manager
        .spawn("provision", |job| async move {
            job.set_status("halfway").await;
            Ok(json!({"ok": true}))
        })
        .await
        .unwrap();

    let record = spawned.wait().await.unwrap();
    assert_eq!(record.state, JobState::Success);
    assert_eq!(record.result, Some(json!({"ok": true})));
    assert!(manager.active().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spawned_job_reports_error() {
    let manager = manager();
    let spawned = manager
        .spawn("provision", |_job| async move {
            Err::<(), _>(MbError::UserError("no hosts given".into()))
        })
        .await
        .unwrap();

    let record = spawned.wait().await.unwrap();
    assert_eq!(record.state, JobState::Failure);
    assert_eq!(record.error.as_deref(), Some("no hosts given"));
}

#[tokio::test]
async fn test_panicking_worker_leaves_active_set() {
    let manager = manager();
    let spawned = manager
        .spawn("provision", |_job| async move {
            let crash = true;
            if crash {
                panic!("worker crashed");
            }
            Ok(())
        })
        .await
        .unwrap();
    let id = spawned.id();

    spawned.wait().await.unwrap();

    assert!(manager.active().await.unwrap().is_empty());
    let record = manager.find(id).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Failure);
    assert_eq!(
        record.error.as_deref(),
        Some("incomplete: job worker panicked")
    );
}

#[tokio::test]
async fn test_terminate_active_stops_cooperative_job() {
    let manager = manager();
    let spawned = manager
        .spawn("provision", |job| async move {
            job.terminated().await;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(manager.terminate_active().await.unwrap(), 1);

    let record = spawned.wait().await.unwrap();
    assert_eq!(record.state, JobState::Failure);
    assert_eq!(
        record.error.as_deref(),
        Some("incomplete: job was terminated")
    );
    assert!(manager.active().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_terminated_job_error_from_body_is_kept() {
    let manager = manager();
    let spawned = manager
        .spawn("provision", |job| async move {
            job.terminated().await;
            Err::<(), _>(MbError::JobTerminated("released environment:prod".into()))
        })
        .await
        .unwrap();

    spawned.job().terminate();

    let record = spawned.wait().await.unwrap();
    assert_eq!(
        record.error.as_deref(),
        Some("incomplete: released environment:prod")
    );
}

#[tokio::test]
async fn test_unresponsive_job_is_abandoned_after_grace() {
    let manager = JobManager::start(Duration::from_millis(20));
    let spawned = manager
        .spawn("provision", |_job| async move {
            std::future::pending::<()>().await;
            Ok(())
        })
        .await
        .unwrap();

    manager.terminate_active().await.unwrap();

    let record = spawned.wait().await.unwrap();
    assert_eq!(record.state, JobState::Failure);
    assert!(record.error.unwrap().contains("did not stop"));
}

#[tokio::test]
async fn test_active_preserves_start_order() {
    let manager = manager();
    let first = Job::start("a", &manager).await.unwrap();
    let second = Job::start("b", &manager).await.unwrap();
    let third = Job::start("c", &manager).await.unwrap();
    manager.complete(&second).await.unwrap();

    let ids: Vec<_> = manager
        .active()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![first.id(), third.id()]);
}

#[tokio::test]
async fn test_join_returns_typed_failure() {
    let manager = manager();
    let spawned = manager
        .spawn("provision", |_job| async move {
            Err::<(), _>(MbError::ResourceLocked("Resource environment-prod locked".into()))
        })
        .await
        .unwrap();

    let err = spawned.join().await.unwrap_err();
    assert_eq!(
        err,
        MbError::ResourceLocked("Resource environment-prod locked".into())
    );
}
