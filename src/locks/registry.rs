//! Process-local registry of held mutexes.
//!
//! Membership mirrors "this process believes it holds this lock". The remote
//! lock item stays the only authority on who actually holds it; the registry
//! exists so that shutdown can release whatever is still held and so callers
//! can find the live mutex for a resource.

use super::mutex::ChefMutex;
use super::types::LockType;
use crate::error::{MbError, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

const REGISTRY_MAILBOX: usize = 64;

enum RegistryMessage {
    Register(ChefMutex),
    Unregister(Uuid),
    Find {
        lock_type: LockType,
        name: String,
        respond_to: oneshot::Sender<Option<ChefMutex>>,
    },
    List(oneshot::Sender<Vec<ChefMutex>>),
    Reset(oneshot::Sender<()>),
    Drain(oneshot::Sender<Vec<ChefMutex>>),
}

/// Handle to the lock registry actor.
#[derive(Clone, Debug)]
pub struct LockRegistry {
    sender: mpsc::Sender<RegistryMessage>,
}

impl LockRegistry {
    /// Start a registry actor. Must be called from within a tokio runtime.
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_MAILBOX);
        tokio::spawn(RegistryActor::new(receiver).run());
        Self { sender }
    }

    async fn send(&self, message: RegistryMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| MbError::ActorStopped("lock registry"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply)).await?;
        response
            .await
            .map_err(|_| MbError::ActorStopped("lock registry"))
    }

    /// Record that `mutex` holds its lock. Registering twice is a no-op.
    pub async fn register(&self, mutex: &ChefMutex) -> Result<()> {
        self.send(RegistryMessage::Register(mutex.clone())).await
    }

    /// Forget `mutex`. Unknown mutexes are ignored.
    pub async fn unregister(&self, mutex: &ChefMutex) -> Result<()> {
        self.send(RegistryMessage::Unregister(mutex.id())).await
    }

    /// The registered mutex for `lock_type:name`, if any.
    pub async fn find(&self, lock_type: LockType, name: &str) -> Result<Option<ChefMutex>> {
        let name = name.to_string();
        self.request(|respond_to| RegistryMessage::Find {
            lock_type,
            name,
            respond_to,
        })
        .await
    }

    /// Every registered mutex, in registration order.
    pub async fn list(&self) -> Result<Vec<ChefMutex>> {
        self.request(RegistryMessage::List).await
    }

    /// Forget every mutex without releasing anything.
    pub async fn reset(&self) -> Result<()> {
        self.request(RegistryMessage::Reset).await
    }

    /// Release every registered mutex, best-effort.
    ///
    /// Each mutex is unlocked with its own ownership rules, so a lock that was
    /// taken over by another client in the meantime is left alone. Failures are
    /// logged and skipped. Returns how many locks were released.
    pub async fn shutdown(&self) -> Result<usize> {
        let held = self.request(RegistryMessage::Drain).await?;
        if !held.is_empty() {
            info!(count = held.len(), "Releasing held locks");
        }

        let mut released = 0;
        for mutex in held {
            match mutex.release().await {
                Ok(true) => {
                    info!(lock = %mutex, "Released lock");
                    released += 1;
                }
                Ok(false) => debug!(lock = %mutex, "lock no longer ours, left in place"),
                Err(e) => warn!(lock = %mutex, error = %e, "failed to release lock"),
            }
        }
        Ok(released)
    }
}

struct RegistryActor {
    locks: Vec<ChefMutex>,
    receiver: mpsc::Receiver<RegistryMessage>,
}

impl RegistryActor {
    fn new(receiver: mpsc::Receiver<RegistryMessage>) -> Self {
        Self {
            locks: Vec::new(),
            receiver,
        }
    }

    async fn run(mut self) {
        debug!("Lock Manager starting...");

        while let Some(message) = self.receiver.recv().await {
            match message {
                RegistryMessage::Register(mutex) => {
                    if !self.locks.iter().any(|held| held.id() == mutex.id()) {
                        self.locks.push(mutex);
                    }
                }
                RegistryMessage::Unregister(id) => {
                    self.locks.retain(|held| held.id() != id);
                }
                RegistryMessage::Find {
                    lock_type,
                    name,
                    respond_to,
                } => {
                    let found = self
                        .locks
                        .iter()
                        .find(|held| held.lock_type() == lock_type && held.name() == name)
                        .cloned();
                    let _ = respond_to.send(found);
                }
                RegistryMessage::List(respond_to) => {
                    let _ = respond_to.send(self.locks.clone());
                }
                RegistryMessage::Reset(respond_to) => {
                    self.locks.clear();
                    let _ = respond_to.send(());
                }
                RegistryMessage::Drain(respond_to) => {
                    let _ = respond_to.send(std::mem::take(&mut self.locks));
                }
            }
        }

        debug!("Lock Manager stopping...");
    }
}
