//! Context store
//!
//! Process-lifetime keyed storage of per-run execution state. The store is
//! the exclusive owner of every `RunState`: the executor checks out a
//! snapshot, mutates it, and hands every mutation back through `save` before
//! a response is produced, so a `get` after a `save` always observes the
//! saved state.
//!
//! Per-id serialization: each run carries a lease. A request must hold the
//! lease for the whole of its mutate cycle; a second request for the same id
//! fails fast with `Busy` instead of interleaving. Requests for distinct ids
//! share nothing but the map itself.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::types::RunState;


/// Eviction policy for terminal runs. Paused runs are never swept; an
/// abandoned run stays until its terminal state ages out or `delete` is
/// called.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// How long a terminal run remains queryable.
    pub ttl: Duration,
    /// Cap on retained terminal runs; the oldest are evicted first.
    pub max_terminal: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            ttl: Duration::hours(24),
            max_terminal: None,
        }
    }
}

struct RunEntry {
    state: RunState,
    lease: Arc<Mutex<()>>,
}

/// In-process context store.
#[derive(Default)]
pub struct ContextStore {
    runs: RwLock<HashMap<Uuid, RunEntry>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run. The caller still has to take the lease before
    /// executing against it.
    pub async fn create(&self, state: RunState) -> Uuid {
        let id = state.id;
        let mut runs = self.runs.write().await;
        runs.insert(
            id,
            RunEntry {
                state,
                lease: Arc::new(Mutex::new(())),
            },
        );
        debug!(%id, "created run");
        id
    }

    /// Snapshot of a run's current state.
    pub async fn get(&self, id: Uuid) -> EngineResult<RunState> {
        let runs = self.runs.read().await;
        runs.get(&id)
            .map(|entry| entry.state.clone())
            .ok_or(EngineError::NotFound(id))
    }

    /// Persist a run's state. The save is what makes progress durable; the
    /// executor never reports a step as done before its save returns.
    pub async fn save(&self, id: Uuid, mut state: RunState) -> EngineResult<()> {
        state.touched_at = Utc::now();

        let mut runs = self.runs.write().await;
        match runs.get_mut(&id) {
            Some(entry) => {
                entry.state = state;
                Ok(())
            }
            // Deleted out from under the request; surface instead of
            // silently resurrecting the run.
            None => Err(EngineError::Store(format!("run {} no longer exists", id))),
        }
    }

    /// Forced cleanup hook. Safe to call on a missing id.
    pub async fn delete(&self, id: Uuid) {
        let mut runs = self.runs.write().await;
        if runs.remove(&id).is_some() {
            debug!(%id, "deleted run");
        }
    }

    /// Take the run's lease, or fail fast if another request holds it.
    pub async fn lease(&self, id: Uuid) -> EngineResult<OwnedMutexGuard<()>> {
        let lease = {
            let runs = self.runs.read().await;
            runs.get(&id)
                .map(|entry| entry.lease.clone())
                .ok_or(EngineError::NotFound(id))?
        };

        lease.try_lock_owned().map_err(|_| EngineError::Busy(id))
    }

    /// Evict terminal runs per the retention policy. Returns how many were
    /// removed.
    pub async fn sweep(&self, policy: &RetentionPolicy) -> usize {
        let cutoff = Utc::now() - policy.ttl;
        let mut runs = self.runs.write().await;

        let before = runs.len();
        runs.retain(|_, entry| {
            !(entry.state.status.is_terminal() && entry.state.touched_at < cutoff)
        });

        if let Some(cap) = policy.max_terminal {
            let mut terminal: Vec<(Uuid, chrono::DateTime<Utc>)> = runs
                .iter()
                .filter(|(_, e)| e.state.status.is_terminal())
                .map(|(id, e)| (*id, e.state.touched_at))
                .collect();

            if terminal.len() > cap {
                let overflow = terminal.len() - cap;
                terminal.sort_by_key(|(_, touched)| *touched);
                for (id, _) in terminal.into_iter().take(overflow) {
                    runs.remove(&id);
                }
            }
        }

        let evicted = before - runs.len();
        if evicted > 0 {
            debug!(evicted, "retention sweep");
        }
        evicted
    }

    /// Number of live runs, for tests and diagnostics.
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}
