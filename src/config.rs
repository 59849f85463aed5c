//! Gate and runner configuration.

use std::time::Duration;

/// GPU selection hint handed to context providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    Default,
    LowPower,
    HighPerformance,
}

/// Options used both when probing for a context and when creating the
/// accelerated surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub antialias: bool,
    pub alpha: bool,
    pub power_preference: PowerPreference,
    /// Refuse software-emulated contexts.
    pub fail_if_major_performance_caveat: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
            power_preference: PowerPreference::Default,
            fail_if_major_performance_caveat: false,
        }
    }
}

/// Configuration for a [`GateSession`](crate::GateSession) and the runner.
///
/// ```ignore
/// GateConfig::new()
///     .power_preference(PowerPreference::LowPower)
///     .ready_timeout(Duration::from_secs(5))
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub context: ContextOptions,
    /// How long a mounted surface may stay unconfirmed. `None` waits forever.
    pub ready_timeout: Option<Duration>,
    /// Tick interval of the host loop.
    pub frame_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            context: ContextOptions::default(),
            ready_timeout: None,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl GateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }

    pub fn antialias(mut self, antialias: bool) -> Self {
        self.context.antialias = antialias;
        self
    }

    pub fn alpha(mut self, alpha: bool) -> Self {
        self.context.alpha = alpha;
        self
    }

    pub fn power_preference(mut self, preference: PowerPreference) -> Self {
        self.context.power_preference = preference;
        self
    }

    pub fn fail_if_major_performance_caveat(mut self, fail: bool) -> Self {
        self.context.fail_if_major_performance_caveat = fail;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }
}
