//! Capability probing for accelerated graphics contexts.
//!
//! The probe asks a [`ContextProvider`] for a context at the enhanced tier
//! first and at the baseline tier second. It never panics: provider errors
//! and provider panics both end up as an unsupported [`ProbeReport`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::config::ContextOptions;

/// Capability tier of an accelerated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Lowest tier that still counts as accelerated.
    Baseline,
    /// Full-featured tier, always tried first.
    Enhanced,
}

impl Tier {
    /// Tiers in the order the probe tries them.
    pub const PROBE_ORDER: [Tier; 2] = [Tier::Enhanced, Tier::Baseline];

    pub fn level(&self) -> u8 {
        match self {
            Tier::Baseline => 1,
            Tier::Enhanced => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.level())
    }
}

/// Description of a context a provider managed to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub name: String,
    pub backend: String,
}

/// Source of throwaway accelerated contexts.
///
/// Implementations must release whatever they create before returning, so
/// that probing holds no resources and can run any number of times.
pub trait ContextProvider {
    fn try_context(&self, tier: Tier, options: &ContextOptions) -> Result<ContextInfo, String>;
}

impl<P: ContextProvider + ?Sized> ContextProvider for Box<P> {
    fn try_context(&self, tier: Tier, options: &ContextOptions) -> Result<ContextInfo, String> {
        (**self).try_context(tier, options)
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeReport {
    Supported { tier: Tier, context: ContextInfo },
    Unsupported { error: String },
}

impl ProbeReport {
    pub fn supported(&self) -> bool {
        matches!(self, ProbeReport::Supported { .. })
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            ProbeReport::Supported { tier, .. } => Some(*tier),
            ProbeReport::Unsupported { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProbeReport::Supported { .. } => None,
            ProbeReport::Unsupported { error } => Some(error),
        }
    }
}

pub struct CapabilityProbe<P> {
    provider: P,
    options: ContextOptions,
}

impl<P: ContextProvider> CapabilityProbe<P> {
    pub fn new(provider: P, options: ContextOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn probe(&self) -> ProbeReport {
        let mut reasons = Vec::new();

        for tier in Tier::PROBE_ORDER {
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                self.provider.try_context(tier, &self.options)
            }));

            match attempt {
                Ok(Ok(context)) => {
                    log::info!(
                        "Accelerated context available at {} ({} on {})",
                        tier,
                        context.name,
                        context.backend
                    );
                    return ProbeReport::Supported { tier, context };
                }
                Ok(Err(reason)) => {
                    log::debug!("No context at {}: {}", tier, reason);
                    reasons.push(format!("{tier}: {reason}"));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    log::warn!("Capability detection failed at {}: {}", tier, message);
                    return ProbeReport::Unsupported {
                        error: format!("capability detection failed: {message}"),
                    };
                }
            }
        }

        let error = if reasons.is_empty() {
            "accelerated graphics not supported by host".to_string()
        } else {
            format!(
                "accelerated graphics not supported by host ({})",
                reasons.join("; ")
            )
        };
        log::warn!("{}", error);
        ProbeReport::Unsupported { error }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScriptedProvider {
        enhanced: Result<(), &'static str>,
        baseline: Result<(), &'static str>,
        calls: RefCell<Vec<Tier>>,
    }

    impl ScriptedProvider {
        fn new(enhanced: Result<(), &'static str>, baseline: Result<(), &'static str>) -> Self {
            Self {
                enhanced,
                baseline,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ContextProvider for ScriptedProvider {
        fn try_context(&self, tier: Tier, _: &ContextOptions) -> Result<ContextInfo, String> {
            self.calls.borrow_mut().push(tier);
            let result = match tier {
                Tier::Enhanced => self.enhanced,
                Tier::Baseline => self.baseline,
            };
            result.map_err(str::to_string).map(|_| ContextInfo {
                name: "scripted".into(),
                backend: "test".into(),
            })
        }
    }

    struct PanickingProvider;

    impl ContextProvider for PanickingProvider {
        fn try_context(&self, _: Tier, _: &ContextOptions) -> Result<ContextInfo, String> {
            panic!("driver crashed");
        }
    }

    #[test]
    fn test_enhanced_tier_preferred() {
        let probe = CapabilityProbe::new(
            ScriptedProvider::new(Ok(()), Ok(())),
            ContextOptions::default(),
        );
        let report = probe.probe();
        assert_eq!(report.tier(), Some(Tier::Enhanced));
        assert_eq!(*probe.provider.calls.borrow(), vec![Tier::Enhanced]);
    }

    #[test]
    fn test_falls_back_to_baseline() {
        let probe = CapabilityProbe::new(
            ScriptedProvider::new(Err("no vulkan"), Ok(())),
            ContextOptions::default(),
        );
        let report = probe.probe();
        assert!(report.supported());
        assert_eq!(report.tier(), Some(Tier::Baseline));
        assert_eq!(
            *probe.provider.calls.borrow(),
            vec![Tier::Enhanced, Tier::Baseline]
        );
    }

    #[test]
    fn test_unsupported_collects_reasons() {
        let probe = CapabilityProbe::new(
            ScriptedProvider::new(Err("no vulkan"), Err("no gl")),
            ContextOptions::default(),
        );
        let report = probe.probe();
        assert!(!report.supported());
        let error = report.error().unwrap_or_default();
        assert!(error.contains("no vulkan"));
        assert!(error.contains("no gl"));
    }

    #[test]
    fn test_provider_panic_becomes_report() {
        let probe = CapabilityProbe::new(PanickingProvider, ContextOptions::default());
        let report = probe.probe();
        assert!(!report.supported());
        assert_eq!(
            report.error(),
            Some("capability detection failed: driver crashed")
        );
    }

    #[test]
    fn test_probe_is_repeatable() {
        let probe = CapabilityProbe::new(
            ScriptedProvider::new(Err("busy"), Ok(())),
            ContextOptions::default(),
        );
        assert_eq!(probe.probe(), probe.probe());
    }
}
