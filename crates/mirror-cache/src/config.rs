//! Coordinator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when the freshness probe cannot reach the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailurePolicy {
    /// Keep serving the cached copy. An unreachable origin is never a reason
    /// to refetch.
    #[default]
    ServeCached,
    /// Treat the entry as stale and repopulate.
    Refetch,
}

/// Configuration for the [`CacheCoordinator`](crate::CacheCoordinator).
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Upper bound on the origin HEAD probe. `None` disables freshness
    /// checking: any non-empty cached entry is trusted.
    pub freshness_timeout: Option<Duration>,
    /// Behaviour when the probe fails or times out.
    pub probe_failure: ProbeFailurePolicy,
    /// Upper bound on a populate job. `None` lets it run to completion.
    pub populate_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness probe timeout. A zero duration disables the probe.
    pub fn with_freshness_timeout(mut self, timeout: Duration) -> Self {
        self.freshness_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_probe_failure(mut self, policy: ProbeFailurePolicy) -> Self {
        self.probe_failure = policy;
        self
    }

    /// Set the populate timeout. A zero duration means no timeout.
    pub fn with_populate_timeout(mut self, timeout: Duration) -> Self {
        self.populate_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_disables_probe() {
        let config = CoordinatorConfig::new().with_freshness_timeout(Duration::ZERO);
        assert_eq!(config.freshness_timeout, None);

        let config = CoordinatorConfig::new().with_freshness_timeout(Duration::from_secs(3));
        assert_eq!(config.freshness_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_default_policy_serves_cached() {
        assert_eq!(
            CoordinatorConfig::default().probe_failure,
            ProbeFailurePolicy::ServeCached
        );
    }
}
