//! Rate limiting utilities

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::MonotonicInstant;

/// Fixed-window rate limiter keyed by caller (an IPC client or a user)
#[derive(Debug)]
pub struct RateLimiter<K> {
    /// Bucket capacity; also the number of tokens restored per window
    capacity: u32,
    window: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    window_start: MonotonicInstant,
}

impl<K: Hash + Eq + Clone> RateLimiter<K> {
    /// Allow `max_requests` per `window` for each key
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            capacity: max_requests,
            window,
            buckets: HashMap::new(),
        }
    }

    /// Consume one token for `key`.
    ///
    /// Returns `true` if the request is allowed, `false` if rate limited.
    pub fn check(&mut self, key: &K) -> bool {
        let now = MonotonicInstant::now();
        let capacity = self.capacity;

        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.tokens = capacity;
            bucket.window_start = now;
        }

        match bucket.tokens.checked_sub(1) {
            Some(left) => {
                bucket.tokens = left;
                true
            }
            None => false,
        }
    }

    /// Forget a key's bucket (client disconnected)
    pub fn forget(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    /// Number of keys currently tracked
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
