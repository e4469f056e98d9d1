//! Job handles and the per-job actor.

use super::manager::JobManager;
use super::record::{JobId, JobRecord, JobState};
use crate::error::{MbError, Result};
use serde_json::Value;
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const JOB_MAILBOX: usize = 32;

enum JobChange {
    Status(String),
    Success(Option<Value>),
    Failure(String),
}

enum JobMessage {
    /// Apply a change; `ack` fires once the manager has been told about it.
    Change {
        change: JobChange,
        ack: oneshot::Sender<()>,
    },
    Snapshot(oneshot::Sender<JobRecord>),
}

/// Handle to a running job.
///
/// Handles are cheap to clone. Updates sent through one handle are applied in
/// the order they were sent. When the last handle is dropped while the job is
/// still running, the job fails as incomplete.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    kind: String,
    sender: mpsc::Sender<JobMessage>,
    cancel: CancellationToken,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("terminated", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Job {
    /// Start a new job of the given kind and register it with `manager`.
    pub async fn start(kind: impl Into<String>, manager: &JobManager) -> Result<Self> {
        let kind = kind.into();
        let id = JobManager::new_id();
        let (sender, receiver) = mpsc::channel(JOB_MAILBOX);

        let job = Self {
            id,
            kind: kind.clone(),
            sender,
            cancel: CancellationToken::new(),
        };
        manager.add(&job).await?;

        let actor = JobActor {
            record: JobRecord::new(id, kind),
            receiver,
            manager: manager.clone(),
        };
        tokio::spawn(actor.run());

        Ok(job)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Replace the job's progress message.
    pub async fn set_status(&self, status: impl Into<String>) {
        self.change(JobChange::Status(status.into())).await;
    }

    /// Move the job to `success`. Ignored if the job already finished.
    pub async fn report_success(&self, result: Option<Value>) {
        self.change(JobChange::Success(result)).await;
    }

    /// Move the job to `failure`. Ignored if the job already finished.
    pub async fn report_failure(&self, error: impl fmt::Display) {
        self.change(JobChange::Failure(error.to_string())).await;
    }

    async fn change(&self, change: JobChange) {
        let (ack, done) = oneshot::channel();
        if self
            .sender
            .send(JobMessage::Change { change, ack })
            .await
            .is_err()
        {
            debug!(job = %self.id, "job actor stopped, update dropped");
            return;
        }
        let _ = done.await;
    }

    /// Current record of this job.
    pub async fn record(&self) -> Result<JobRecord> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(JobMessage::Snapshot(reply))
            .await
            .map_err(|_| MbError::ActorStopped("job"))?;
        response.await.map_err(|_| MbError::ActorStopped("job"))
    }

    pub async fn status(&self) -> Result<String> {
        Ok(self.record().await?.status)
    }

    pub async fn state(&self) -> Result<JobState> {
        Ok(self.record().await?.state)
    }

    /// Ask the job to stop. Work holding a lock releases it before finishing.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the job has been asked to stop.
    pub async fn terminated(&self) {
        self.cancel.cancelled().await;
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A handle that does not keep the job alive.
    pub fn downgrade(&self) -> WeakJob {
        WeakJob {
            id: self.id,
            kind: self.kind.clone(),
            sender: self.sender.downgrade(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Non-owning job handle, used by long-lived objects that report into a job
/// (such as a registered mutex) without extending its life.
#[derive(Clone)]
pub struct WeakJob {
    id: JobId,
    kind: String,
    sender: mpsc::WeakSender<JobMessage>,
    cancel: CancellationToken,
}

impl fmt::Debug for WeakJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakJob").field("id", &self.id).finish()
    }
}

impl WeakJob {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The job, if it is still alive.
    pub fn upgrade(&self) -> Option<Job> {
        self.sender.upgrade().map(|sender| Job {
            id: self.id,
            kind: self.kind.clone(),
            sender,
            cancel: self.cancel.clone(),
        })
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Owns one job's record; every change is forwarded to the manager.
struct JobActor {
    record: JobRecord,
    receiver: mpsc::Receiver<JobMessage>,
    manager: JobManager,
}

impl JobActor {
    async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            match message {
                JobMessage::Change { change, ack } => {
                    self.apply(change);
                    self.manager.push(self.record.clone()).await;
                    let _ = ack.send(());
                }
                JobMessage::Snapshot(reply) => {
                    let _ = reply.send(self.record.clone());
                }
            }
        }

        // Every handle is gone
        if !self.record.state.is_terminal() {
            warn!(
                job = %self.record.id,
                kind = %self.record.kind,
                "job abandoned while running"
            );
            self.record.fail(
                MbError::JobTerminated("job worker exited before reporting a result".to_string())
                    .to_string(),
            );
            self.manager.push(self.record.clone()).await;
        }
        self.manager.job_exited(self.record.id).await;
    }

    fn apply(&mut self, change: JobChange) {
        match change {
            JobChange::Status(status) => self.record.status = status,
            JobChange::Success(result) if !self.record.state.is_terminal() => {
                self.record.succeed(result);
            }
            JobChange::Failure(error) if !self.record.state.is_terminal() => {
                self.record.fail(error);
            }
            _ => debug!(
                job = %self.record.id,
                state = %self.record.state,
                "ignoring transition out of terminal state"
            ),
        }
    }
}
