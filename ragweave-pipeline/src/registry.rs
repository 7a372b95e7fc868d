//! Runtime registry of language-model clients.
//!
//! Each registered client gets an opaque handle and a background watcher
//! task that emits a periodic heartbeat until deregistration cancels it.

use crate::llm::LlmClient;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Opaque handle identifying a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(u64);

struct Registration {
    client: std::sync::Arc<dyn LlmClient>,
    cancel: CancellationToken,
    watcher: tokio::task::JoinHandle<()>,
}

/// Tracks live clients and their watcher tasks.
pub struct ClientRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Registration>>,
    heartbeat: Duration,
}

impl ClientRegistry {
    pub fn new(heartbeat: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
            heartbeat,
        }
    }

    /// Register a client and spawn its watcher. Must be called from within a
    /// tokio runtime.
    pub fn register(&self, client: std::sync::Arc<dyn LlmClient>) -> RegistrationHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let watcher = spawn_watcher(client.clone(), cancel.clone(), self.heartbeat);

        self.entries
            .lock()
            .expect("registry lock poisoned")
            .insert(
                id,
                Registration {
                    client,
                    cancel,
                    watcher,
                },
            );
        tracing::debug!(handle = id, "Client registered");
        RegistrationHandle(id)
    }

    pub fn get(&self, handle: RegistrationHandle) -> Option<std::sync::Arc<dyn LlmClient>> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .get(&handle.0)
            .map(|entry| entry.client.clone())
    }

    /// Remove a client, stop its watcher, and wait for the watcher to exit.
    /// Returns `false` for an unknown or already-removed handle.
    pub async fn deregister(&self, handle: RegistrationHandle) -> bool {
        let removed = self
            .entries
            .lock()
            .expect("registry lock poisoned")
            .remove(&handle.0);
        let Some(registration) = removed else {
            return false;
        };
        registration.cancel.cancel();
        let _ = registration.watcher.await;
        tracing::debug!(handle = handle.0, "Client deregistered");
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ClientRegistry {
    fn drop(&mut self) {
        let entries = self.entries.lock().expect("registry lock poisoned");
        for registration in entries.values() {
            registration.cancel.cancel();
        }
    }
}

fn spawn_watcher(
    client: std::sync::Arc<dyn LlmClient>,
    cancel: CancellationToken,
    heartbeat: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(heartbeat) => {
                    tracing::trace!(model = client.model_name(), "Client watcher heartbeat");
                }
            }
        }
    })
}
