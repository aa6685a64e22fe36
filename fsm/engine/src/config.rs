//! Runtime configuration of a state machine instance

#[cfg(feature = "serde")]
use serde::Serialize;

/// Configuration for a state machine.
///
/// Capacities of the arena variant are compile-time parameters of
/// [`StateBuffer`](fsm_mem::StateBuffer); this only covers runtime options.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsmConfig {
    /// Name used in log records
    pub name: &'static str,
    /// Log events no state accepted at debug level
    pub log_unhandled: bool,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            name: "fsm",
            log_unhandled: true,
        }
    }
}

impl FsmConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> FsmConfigBuilder {
        FsmConfigBuilder::default()
    }
}

/// Builder for ergonomic configuration construction.
#[derive(Debug, Clone, Default)]
pub struct FsmConfigBuilder {
    config: FsmConfig,
}

impl FsmConfigBuilder {
    /// Sets the machine name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Enables or disables logging of unhandled events.
    pub fn log_unhandled(mut self, enabled: bool) -> Self {
        self.config.log_unhandled = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> FsmConfig {
        self.config
    }
}
