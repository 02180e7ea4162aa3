use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sliding-window request limiter, keyed by user. Guards the AI reply
/// endpoint so one user cannot burn the inference quota for everyone.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert("standard".to_string(), 20);
        limits.insert("premium".to_string(), 100);

        Self {
            window_size: Duration::minutes(1),
            limits,
        }
    }
}

#[derive(Debug, Default)]
struct RequestLog {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl RequestLog {
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            self.timestamps.pop_front();
        }
    }
}

pub struct RateLimiter {
    logs: Arc<RwLock<HashMap<Uuid, RequestLog>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            logs: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Records and admits the request if the user is under their tier's
    /// limit; unknown tiers fall back to `standard`.
    pub async fn check_rate_limit(&self, user_id: Uuid, tier: &str) -> bool {
        let limit = *self
            .config
            .limits
            .get(tier)
            .or_else(|| self.config.limits.get("standard"))
            .unwrap_or(&0);

        let mut logs = self.logs.write().await;
        let log = logs.entry(user_id).or_default();
        log.prune(Utc::now() - self.config.window_size);

        if log.timestamps.len() < limit as usize {
            log.timestamps.push_back(Utc::now());
            true
        } else {
            false
        }
    }

    /// Drops users with no requests in the current window.
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.config.window_size;
        let mut logs = self.logs.write().await;
        logs.retain(|_, log| {
            log.prune(cutoff);
            !log.timestamps.is_empty()
        });
    }
}
