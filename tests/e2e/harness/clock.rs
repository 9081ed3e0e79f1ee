use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 2024-06-01T09:00:00Z in Unix milliseconds.
const START_MILLIS: i64 = 1_717_232_400_000;

/// Shared scenario clock handed to `KnowledgeBase::with_time_provider()`.
///
/// Starts at a fixed instant so run and record timestamps are reproducible.
/// `Wait` steps move it forward.
#[derive(Clone)]
pub struct MockClock {
    millis: Arc<AtomicI64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::starting_at(START_MILLIS)
    }

    pub fn starting_at(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn as_provider(&self) -> impl Fn() -> i64 + Send + Sync + 'static {
        let millis = Arc::clone(&self.millis);
        move || millis.load(Ordering::SeqCst)
    }

    pub fn now(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }

    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
