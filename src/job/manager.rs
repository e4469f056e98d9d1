//! The job manager actor and job spawning.

use super::job::Job;
use super::record::{JobId, JobRecord};
use crate::error::{MbError, Result};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

const MANAGER_MAILBOX: usize = 256;

enum ManagerMessage {
    Add {
        record: JobRecord,
        cancel: CancellationToken,
        respond_to: oneshot::Sender<()>,
    },
    Update(JobRecord),
    Complete(JobId),
    Active(oneshot::Sender<Vec<JobRecord>>),
    List(oneshot::Sender<Vec<JobRecord>>),
    Find {
        id: JobId,
        respond_to: oneshot::Sender<Option<JobRecord>>,
    },
    TerminateActive(oneshot::Sender<usize>),
}

/// Handle to the process-wide job supervisor.
///
/// Construct one with [`JobManager::start`] at process start and pass clones
/// to everything that starts asynchronous work.
#[derive(Clone, Debug)]
pub struct JobManager {
    sender: mpsc::Sender<ManagerMessage>,
    termination_grace: Duration,
}

impl JobManager {
    /// Start the manager actor.
    ///
    /// `termination_grace` is how long a terminated job spawned through
    /// [`JobManager::spawn`] may keep running to release its locks before it
    /// is abandoned.
    pub fn start(termination_grace: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(MANAGER_MAILBOX);
        let actor = JobManagerActor {
            records: Vec::new(),
            active: Vec::new(),
            receiver,
        };
        tokio::spawn(actor.run());

        Self {
            sender,
            termination_grace,
        }
    }

    /// Generate a new job id.
    pub fn new_id() -> JobId {
        Uuid::new_v4()
    }

    pub fn termination_grace(&self) -> Duration {
        self.termination_grace
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ManagerMessage,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| MbError::ActorStopped("job manager"))?;
        response
            .await
            .map_err(|_| MbError::ActorStopped("job manager"))
    }

    async fn send(&self, message: ManagerMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| MbError::ActorStopped("job manager"))
    }

    /// Begin supervising `job`: create its record and mark it active.
    pub async fn add(&self, job: &Job) -> Result<()> {
        let record = JobRecord::new(job.id(), job.kind());
        let cancel = job.cancellation_token();
        self.request(|respond_to| ManagerMessage::Add {
            record,
            cancel,
            respond_to,
        })
        .await
    }

    /// Remove `job` from the active set. Its record is kept.
    pub async fn complete(&self, job: &Job) -> Result<()> {
        self.send(ManagerMessage::Complete(job.id())).await
    }

    /// Records of jobs that are still active, in start order.
    pub async fn active(&self) -> Result<Vec<JobRecord>> {
        self.request(ManagerMessage::Active).await
    }

    /// Records of every job, active and completed, in start order.
    pub async fn list(&self) -> Result<Vec<JobRecord>> {
        self.request(ManagerMessage::List).await
    }

    pub async fn find(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.request(|respond_to| ManagerMessage::Find { id, respond_to })
            .await
    }

    /// Copy the job's latest status and state into its record.
    pub async fn update(&self, job: &Job) -> Result<()> {
        let record = job.record().await?;
        self.send(ManagerMessage::Update(record)).await
    }

    /// Ask every active job to stop. Returns how many were signalled.
    pub async fn terminate_active(&self) -> Result<usize> {
        self.request(ManagerMessage::TerminateActive).await
    }

    pub(super) async fn push(&self, record: JobRecord) {
        if self.send(ManagerMessage::Update(record)).await.is_err() {
            debug!("job manager stopped, record update dropped");
        }
    }

    pub(super) async fn job_exited(&self, id: JobId) {
        if self.send(ManagerMessage::Complete(id)).await.is_err() {
            debug!(job = %id, "job manager stopped before job exit was recorded");
        }
    }

    /// Start a job and run `body` on its own worker task.
    ///
    /// The body's `Ok` value becomes the record's result, an `Err` its error.
    /// If the job is terminated the body gets `termination_grace` to finish
    /// (and release whatever it holds); the job then ends as `failure` whatever
    /// the body returned. A panicking or aborted worker also ends the job as
    /// `failure`. In every case the job leaves the active set.
    pub async fn spawn<F, Fut, T>(&self, kind: impl Into<String>, body: F) -> Result<SpawnedJob>
    where
        F: FnOnce(Job) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let job = Job::start(kind, self).await?;
        let worker = tokio::spawn(run_body(job.clone(), body, self.termination_grace));
        let supervisor = tokio::spawn(supervise(self.clone(), job.clone(), worker));

        Ok(SpawnedJob {
            job,
            supervisor,
            manager: self.clone(),
        })
    }
}

/// Returns the error the job failed with, if it failed.
async fn run_body<F, Fut, T>(job: Job, body: F, grace: Duration) -> Option<MbError>
where
    F: FnOnce(Job) -> Fut,
    Fut: Future<Output = Result<T>>,
    T: Serialize,
{
    let work = body(job.clone());
    tokio::pin!(work);

    let outcome = tokio::select! {
        outcome = &mut work => outcome,
        _ = job.terminated() => {
            debug!(job = %job.id(), "termination requested, waiting for job to wind down");
            match tokio::time::timeout(grace, &mut work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(MbError::JobTerminated(format!(
                    "job did not stop within {}ms of termination",
                    grace.as_millis()
                ))),
            }
        }
    };

    // A terminated job never ends as success
    let outcome = match outcome {
        Ok(_) if job.is_terminated() => {
            Err(MbError::JobTerminated("job was terminated".to_string()))
        }
        other => other,
    };

    match outcome {
        Ok(value) => {
            let result = match serde_json::to_value(value) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(job = %job.id(), error = %e, "job result is not serializable");
                    None
                }
            };
            job.report_success(result).await;
            None
        }
        Err(err) => {
            job.report_failure(&err).await;
            Some(err)
        }
    }
}

async fn supervise(
    manager: JobManager,
    job: Job,
    worker: JoinHandle<Option<MbError>>,
) -> Option<MbError> {
    let failure = match worker.await {
        Ok(failure) => failure,
        Err(err) => {
            let reason = if err.is_panic() {
                "job worker panicked"
            } else {
                "job worker was aborted"
            };
            error!(job = %job.id(), kind = job.kind(), reason, "job worker died");
            let err = MbError::JobTerminated(reason.to_string());
            job.report_failure(&err).await;
            Some(err)
        }
    };

    if manager.complete(&job).await.is_err() {
        debug!(job = %job.id(), "job manager stopped before completion was recorded");
    }
    failure
}

/// A job started with [`JobManager::spawn`].
pub struct SpawnedJob {
    job: Job,
    supervisor: JoinHandle<Option<MbError>>,
    manager: JobManager,
}

impl SpawnedJob {
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn id(&self) -> JobId {
        self.job.id()
    }

    /// Wait for the job to leave the active set and return its final record.
    pub async fn wait(self) -> Result<JobRecord> {
        Ok(self.finish().await?.0)
    }

    /// Like [`SpawnedJob::wait`], but a failed job returns the error it
    /// failed with.
    pub async fn join(self) -> Result<JobRecord> {
        match self.finish().await? {
            (_, Some(err)) => Err(err),
            (record, None) => Ok(record),
        }
    }

    async fn finish(self) -> Result<(JobRecord, Option<MbError>)> {
        let SpawnedJob {
            job,
            supervisor,
            manager,
        } = self;

        let failure = supervisor
            .await
            .map_err(|e| MbError::UserError(format!("job supervisor failed: {}", e)))?;

        let record = manager
            .find(job.id())
            .await?
            .ok_or_else(|| MbError::UserError(format!("no record for job {}", job.id())))?;
        Ok((record, failure))
    }
}

struct JobManagerActor {
    records: Vec<JobRecord>,
    active: Vec<(JobId, CancellationToken)>,
    receiver: mpsc::Receiver<ManagerMessage>,
}

impl JobManagerActor {
    async fn run(mut self) {
        debug!("Job Manager starting...");

        while let Some(message) = self.receiver.recv().await {
            match message {
                ManagerMessage::Add {
                    record,
                    cancel,
                    respond_to,
                } => {
                    debug!(job = %record.id, kind = %record.kind, "job added");
                    if !self.records.iter().any(|r| r.id == record.id) {
                        self.active.push((record.id, cancel));
                        self.records.push(record);
                    }
                    let _ = respond_to.send(());
                }
                ManagerMessage::Update(record) => {
                    match self.records.iter_mut().find(|r| r.id == record.id) {
                        Some(existing) => *existing = record,
                        None => debug!(job = %record.id, "update for unknown job"),
                    }
                }
                ManagerMessage::Complete(id) => {
                    if let Some(pos) = self.active.iter().position(|(active, _)| *active == id) {
                        debug!(job = %id, "job completed");
                        self.active.remove(pos);
                    }
                }
                ManagerMessage::Active(respond_to) => {
                    let active = self
                        .records
                        .iter()
                        .filter(|r| self.active.iter().any(|(id, _)| *id == r.id))
                        .cloned()
                        .collect();
                    let _ = respond_to.send(active);
                }
                ManagerMessage::List(respond_to) => {
                    let _ = respond_to.send(self.records.clone());
                }
                ManagerMessage::Find { id, respond_to } => {
                    let record = self.records.iter().find(|r| r.id == id).cloned();
                    let _ = respond_to.send(record);
                }
                ManagerMessage::TerminateActive(respond_to) => {
                    let _ = respond_to.send(self.terminate_active());
                }
            }
        }

        debug!("Job Manager stopping...");
        self.terminate_active();
    }

    fn terminate_active(&self) -> usize {
        for (id, cancel) in &self.active {
            debug!(job = %id, "terminating job");
            cancel.cancel();
        }
        self.active.len()
    }
}
