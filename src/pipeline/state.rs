use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Per-run coordination state shared by every stage call.
///
/// Each run gets one async mutex that serializes its stage writes, and at
/// most one live cancellation token while it is ingesting.
#[derive(Default)]
pub struct RunRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
    cancel_tokens: DashMap<String, CancellationToken>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, run_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Register a fresh token for an ingestion that is about to start.
    pub fn begin_ingest(&self, run_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel_tokens.insert(run_id.to_string(), token.clone());
        token
    }

    pub fn end_ingest(&self, run_id: &str) {
        self.cancel_tokens.remove(run_id);
    }

    pub fn is_ingesting(&self, run_id: &str) -> bool {
        self.cancel_tokens.contains_key(run_id)
    }

    /// Signal the run's live ingestion to stop. Returns false when nothing
    /// was running.
    pub fn cancel(&self, run_id: &str) -> bool {
        match self.cancel_tokens.get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn forget(&self, run_id: &str) {
        self.cancel_tokens.remove(run_id);
        self.locks.remove(run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_shared_per_run() {
        let registry = RunRegistry::new();
        let a = registry.lock_for("r1");
        let b = registry.lock_for("r1");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &registry.lock_for("r2")));
    }

    #[test]
    fn test_cancel_only_live_ingest() {
        let registry = RunRegistry::new();
        assert!(!registry.cancel("r1"));

        let token = registry.begin_ingest("r1");
        assert!(registry.is_ingesting("r1"));
        assert!(registry.cancel("r1"));
        assert!(token.is_cancelled());

        registry.end_ingest("r1");
        assert!(!registry.cancel("r1"));
    }

    #[tokio::test]
    async fn test_try_lock_conflicts_while_held() {
        let registry = RunRegistry::new();
        let _guard = registry.lock_for("r1").try_lock_owned().unwrap();
        assert!(registry.lock_for("r1").try_lock_owned().is_err());
    }
}
