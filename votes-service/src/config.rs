//! Configuration types for the VoteService.
use std::time::Duration;

/// Retry and batching behaviour of the `VoteService`.
#[derive(Debug, Clone)]
pub struct VoteServiceConfig {
    /// How many times a request that lost a uniqueness race is replayed.
    /// The replay sees the winner's row and resolves to an ordinary transition.
    pub conflict_retries: usize,

    /// How many times a request is retried after a transient store failure.
    pub transient_retries: usize,

    /// Base of the exponential backoff between transient retries, in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay.
    pub retry_max_delay: Duration,

    /// Maximum number of targets in one `summaries` call. `None` disables the limit.
    pub max_batch_size: Option<usize>,
}

impl Default for VoteServiceConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 1,
            transient_retries: 3,
            retry_base_delay_ms: 10,
            retry_max_delay: Duration::from_secs(1),
            max_batch_size: Some(1000),
        }
    }
}

impl VoteServiceConfig {
    /// A config that surfaces every conflict and transient failure immediately.
    pub fn without_retries() -> Self {
        Self {
            conflict_retries: 0,
            transient_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }
}
