//! Layer configuration.

use std::time::Duration;

/// What the layer does when a GPU call fails for a reason other than an
/// out-of-date surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Log one line naming the failing stage and abort the process.
    #[default]
    Abort,
    /// Return the failure to the host as [`crate::LayerError::Frame`].
    Propagate,
}

/// Immutable layer configuration.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    block_events: bool,
    fatal_policy: FatalPolicy,
    idle_backoff: Option<Duration>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            block_events: true,
            fatal_policy: FatalPolicy::Abort,
            idle_backoff: Some(Duration::from_millis(10)),
        }
    }
}

impl LayerConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> LayerConfigBuilder {
        LayerConfigBuilder::default()
    }

    /// Whether captured pointer and keyboard events are marked handled at start-up.
    pub fn block_events(&self) -> bool {
        self.block_events
    }

    /// Failure policy for unrecoverable GPU errors.
    pub fn fatal_policy(&self) -> FatalPolicy {
        self.fatal_policy
    }

    /// How long `begin_frame` sleeps while the window is minimized.
    pub fn idle_backoff(&self) -> Option<Duration> {
        self.idle_backoff
    }
}

/// Builder for [`LayerConfig`].
#[derive(Debug, Default)]
pub struct LayerConfigBuilder {
    config: LayerConfig,
}

impl LayerConfigBuilder {
    /// Set whether captured events are blocked.
    #[must_use]
    pub fn block_events(mut self, block: bool) -> Self {
        self.config.block_events = block;
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub fn fatal_policy(mut self, policy: FatalPolicy) -> Self {
        self.config.fatal_policy = policy;
        self
    }

    /// Set the minimized-window sleep; `None` returns immediately.
    #[must_use]
    pub fn idle_backoff(mut self, backoff: Option<Duration>) -> Self {
        self.config.idle_backoff = backoff;
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> LayerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LayerConfig::default();
        assert!(config.block_events());
        assert_eq!(config.fatal_policy(), FatalPolicy::Abort);
        assert_eq!(config.idle_backoff(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn builder_overrides() {
        let config = LayerConfig::builder()
            .block_events(false)
            .fatal_policy(FatalPolicy::Propagate)
            .idle_backoff(None)
            .build();
        assert!(!config.block_events());
        assert_eq!(config.fatal_policy(), FatalPolicy::Propagate);
        assert_eq!(config.idle_backoff(), None);
    }
}
