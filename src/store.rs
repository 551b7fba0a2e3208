use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;

use crate::error::{Result, VerdictError};
use crate::state_machine::{Job, JobId, JobState, JobStats, Payload, StateMachine, Transition};

#[derive(Debug, Default)]
struct Inner {
    // Ids are allocated in increasing order, so key order is creation order.
    jobs: BTreeMap<JobId, Job>,
    last_id: u64,
}

/// Single source of truth for job records.
///
/// All mutation goes through [`JobStore::create`] and [`JobStore::update`];
/// readers always receive owned snapshots.
#[derive(Debug, Default)]
pub struct JobStore {
    inner: RwLock<Inner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-applied transition:
    // `StateMachine::apply` validates before it writes.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh id and insert a pending job.
    pub fn create(&self, payload: Payload) -> JobId {
        let mut inner = self.write();
        inner.last_id += 1;
        let id = JobId::new(inner.last_id);
        inner.jobs.insert(id, Job::new(id, payload));
        tracing::debug!(job_id = %id, "Job created");
        id
    }

    /// Snapshot of a single job.
    pub fn get(&self, id: JobId) -> Result<Job> {
        self.read()
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| VerdictError::NotFound(id.to_string()))
    }

    /// Snapshots of all jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.read().jobs.values().cloned().collect()
    }

    /// Atomically apply `transition` and return the updated snapshot.
    pub fn update(&self, id: JobId, transition: Transition) -> Result<Job> {
        let mut inner = self.write();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| VerdictError::NotFound(id.to_string()))?;
        StateMachine::apply(job, transition)?;
        tracing::debug!(job_id = %id, state = %job.state, "Job updated");
        Ok(job.clone())
    }

    pub fn stats(&self) -> JobStats {
        let inner = self.read();
        let mut stats = JobStats::default();
        for job in inner.jobs.values() {
            stats.record(job.state);
        }
        stats
    }

    /// Running jobs that were claimed more than `older_than` ago.
    pub fn stalled(&self, older_than: Duration) -> Vec<JobId> {
        // A threshold reaching back before the representable range matches
        // nothing.
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|limit| Utc::now().checked_sub_signed(limit))
        else {
            return Vec::new();
        };
        self.read()
            .jobs
            .values()
            .filter(|j| j.state == JobState::Running)
            .filter(|j| j.started_at.is_some_and(|t| t < cutoff))
            .map(|j| j.id)
            .collect()
    }

    /// Drop the oldest finished jobs so that at most `keep` remain. Returns
    /// the number of jobs removed. Pending and running jobs are never evicted.
    pub fn evict_finished(&self, keep: usize) -> usize {
        let mut inner = self.write();
        let finished: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|j| j.is_terminal())
            .map(|j| j.id)
            .collect();
        let excess = finished.len().saturating_sub(keep);
        for id in &finished[..excess] {
            inner.jobs.remove(id);
        }
        if excess > 0 {
            tracing::debug!(evicted = excess, "Evicted finished jobs");
        }
        excess
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Verdict;
    use std::sync::Arc;

    fn payload(text: &str) -> Payload {
        Payload::new(text)
    }

    fn finish(store: &JobStore, id: JobId) {
        store.update(id, Transition::Claim { worker: 0 }).unwrap();
        store
            .update(id, Transition::Succeed(Verdict::new("real", 0.9).unwrap()))
            .unwrap();
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let store = JobStore::new();
        let a = store.create(payload("a"));
        let b = store.create(payload("b"));
        assert_eq!(a.to_string(), "1");
        assert_eq!(b.to_string(), "2");
        assert_eq!(store.get(a).unwrap().state, JobState::Pending);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = JobStore::new();
        assert!(matches!(
            store.get(JobId::new(99)),
            Err(VerdictError::NotFound(_))
        ));
    }

    #[test]
    fn list_is_in_creation_order() {
        let store = JobStore::new();
        for text in ["one", "two", "three"] {
            store.create(payload(text));
        }
        let texts: Vec<String> = store.list().into_iter().map(|j| j.payload.text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn update_unknown_is_not_found() {
        let store = JobStore::new();
        let err = store
            .update(JobId::new(5), Transition::Claim { worker: 0 })
            .unwrap_err();
        assert!(matches!(err, VerdictError::NotFound(_)));
    }

    #[test]
    fn update_rejects_backward_transition() {
        let store = JobStore::new();
        let id = store.create(payload("x"));
        finish(&store, id);
        let err = store.update(id, Transition::Claim { worker: 1 }).unwrap_err();
        assert!(matches!(err, VerdictError::InvalidTransition { .. }));
        assert_eq!(store.get(id).unwrap().state, JobState::Done);
    }

    #[test]
    fn repeated_reads_are_identical() {
        let store = JobStore::new();
        let id = store.create(payload("stable"));
        assert_eq!(store.get(id).unwrap(), store.get(id).unwrap());
    }

    #[test]
    fn stats_count_by_state() {
        let store = JobStore::new();
        let a = store.create(payload("a"));
        let b = store.create(payload("b"));
        store.create(payload("c"));
        finish(&store, a);
        store.update(b, Transition::Claim { worker: 0 }).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn stalled_reports_old_running_jobs_only() {
        let store = JobStore::new();
        let running = store.create(payload("r"));
        store.create(payload("p"));
        store.update(running, Transition::Claim { worker: 0 }).unwrap();

        assert!(store.stalled(Duration::from_secs(60)).is_empty());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.stalled(Duration::from_millis(5)), vec![running]);
    }

    #[test]
    fn stalled_with_huge_threshold_matches_nothing() {
        let store = JobStore::new();
        let running = store.create(payload("r"));
        store.update(running, Transition::Claim { worker: 0 }).unwrap();

        // Parses and validates as a config value, but reaches back past the
        // earliest representable timestamp.
        let config: crate::config::VerdictConfig =
            toml::from_str("stall_timeout_ms = 1152921504606846976").unwrap();
        assert!(config.validate().is_ok());
        let limit = config.stall_timeout().unwrap();

        assert!(store.stalled(limit).is_empty());
        assert!(store.stalled(Duration::MAX).is_empty());
    }

    #[test]
    fn evict_keeps_newest_finished_and_all_active() {
        let store = JobStore::new();
        let ids: Vec<JobId> = (0..4).map(|i| store.create(payload(&i.to_string()))).collect();
        finish(&store, ids[0]);
        finish(&store, ids[1]);
        finish(&store, ids[2]);

        assert_eq!(store.evict_finished(1), 2);
        assert!(store.get(ids[0]).is_err());
        assert!(store.get(ids[1]).is_err());
        assert!(store.get(ids[2]).is_ok());
        assert!(store.get(ids[3]).is_ok());

        // Ids are never reused after eviction.
        assert_eq!(store.create(payload("new")), JobId::new(5));
    }

    #[test]
    fn concurrent_creates_yield_distinct_ids() {
        let store = Arc::new(JobStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| store.create(Payload::new(format!("{t}-{i}"))))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<JobId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(store.stats().total, 400);
    }
}
