use std::time::Duration;

use crate::types::UrlDecoration;

/// Timeout, retry cap and decoration applied to a load session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    load_timeout_ms: u64,
    max_attempts: u32,
    decoration: UrlDecoration,
    external_open_grace_ms: u64,
}

impl LoadPolicy {
    pub fn new(load_timeout_ms: u64, max_attempts: u32) -> Self {
        Self {
            load_timeout_ms: load_timeout_ms.max(1),
            max_attempts,
            decoration: UrlDecoration::default(),
            external_open_grace_ms: 100,
        }
    }

    /// Policy matching the lighter embed variant: 15s timeout, two retries,
    /// timestamp-only decoration.
    pub fn conservative() -> Self {
        Self::new(15_000, 2).with_decoration(UrlDecoration::Minimal)
    }

    pub fn with_decoration(mut self, decoration: UrlDecoration) -> Self {
        self.decoration = decoration;
        self
    }

    pub fn with_external_open_grace_ms(mut self, grace_ms: u64) -> Self {
        self.external_open_grace_ms = grace_ms;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Automatic retry cap. A failure at this attempt count surfaces the
    /// error phase instead of retrying.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn decoration(&self) -> UrlDecoration {
        self.decoration
    }

    pub fn external_open_grace(&self) -> Duration {
        Duration::from_millis(self.external_open_grace_ms)
    }

    pub fn external_open_grace_ms(&self) -> u64 {
        self.external_open_grace_ms
    }

    pub fn allows_automatic_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self::new(10_000, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rich_variant() {
        let policy = LoadPolicy::default();
        assert_eq!(policy.load_timeout(), Duration::from_secs(10));
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.decoration(), UrlDecoration::Rich);
        assert_eq!(policy.external_open_grace(), Duration::from_millis(100));
        assert_eq!(policy.external_open_grace_ms(), 100);

        let patient = policy.with_external_open_grace_ms(u64::MAX);
        assert_eq!(patient.external_open_grace_ms(), u64::MAX);
    }

    #[test]
    fn conservative_variant_is_slower_and_minimal() {
        let policy = LoadPolicy::conservative();
        assert_eq!(policy.load_timeout(), Duration::from_secs(15));
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.decoration(), UrlDecoration::Minimal);
    }

    #[test]
    fn automatic_retry_stops_at_cap() {
        let policy = LoadPolicy::new(1_000, 2);
        assert!(policy.allows_automatic_retry(0));
        assert!(policy.allows_automatic_retry(1));
        assert!(!policy.allows_automatic_retry(2));
        assert!(!policy.allows_automatic_retry(7));
    }

    #[test]
    fn zero_timeout_is_clamped() {
        assert_eq!(
            LoadPolicy::new(0, 1).load_timeout(),
            Duration::from_millis(1)
        );
    }
}
