//! Global in-flight budget plus per-host concurrency limits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SearchError};

/// Held for the duration of one request; releases both slots on drop.
#[derive(Debug)]
pub struct RequestPermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Two-level concurrency gate: one semaphore for the whole run and one
/// per host, created on first use.
#[derive(Debug)]
pub struct RequestLimiter {
    global: Arc<Semaphore>,
    per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl RequestLimiter {
    pub fn new(global_in_flight: usize, per_host: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_in_flight.max(1))),
            per_host: per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone()
    }

    /// Wait for a host slot, then a global slot.
    ///
    /// The host slot is taken first so a busy host never holds global
    /// capacity while it waits.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if `cancel` fires while waiting.
    pub async fn acquire(&self, host: &str, cancel: &CancellationToken) -> Result<RequestPermit> {
        let host_sem = self.host_semaphore(host);
        let host_permit = tokio::select! {
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            permit = host_sem.acquire_owned() => permit.map_err(|_| SearchError::Cancelled)?,
        };
        let global_permit = tokio::select! {
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            permit = Arc::clone(&self.global).acquire_owned() => {
                permit.map_err(|_| SearchError::Cancelled)?
            }
        };
        Ok(RequestPermit {
            _host: host_permit,
            _global: global_permit,
        })
    }

    /// Free global slots right now.
    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }

    /// Free slots for `host` right now.
    pub fn available_for_host(&self, host: &str) -> usize {
        self.host_semaphore(host).available_permits()
    }
}
