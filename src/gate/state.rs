use std::fmt;

use crate::error::GateError;
use crate::probe::Tier;

/// Counter distinguishing successive surface attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Generation = Generation(0);

    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Result of the most recent probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Support {
    /// Only while the first probe of a generation has not completed.
    #[default]
    Unknown,
    Unsupported,
    Supported { tier: Tier },
}

/// Named states of the gate, derived from [`GateState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatePhase {
    Checking,
    Unsupported,
    AwaitingReady,
    Ready,
    Degraded,
}

impl GatePhase {
    /// Phases in which the accelerated surface stays mounted.
    pub fn surface_mounted(&self) -> bool {
        !matches!(self, GatePhase::Checking | GatePhase::Unsupported)
    }
}

/// The authoritative readiness record.
///
/// Only [`Gate`](super::Gate) mutates it; everyone else reads snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateState {
    pub support: Support,
    pub ready: bool,
    pub error: Option<GateError>,
    pub generation: Generation,
}

/// A broken [`GateState`] invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    ReadyWithoutSupport,
    ErrorWhileReady,
    ErrorWhileChecking,
}

impl GateState {
    /// Fresh CHECKING state for `generation`.
    pub fn checking(generation: Generation) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> GatePhase {
        match (&self.support, self.ready, &self.error) {
            (Support::Unknown, _, _) => GatePhase::Checking,
            (Support::Unsupported, _, _) => GatePhase::Unsupported,
            (Support::Supported { .. }, true, _) => GatePhase::Ready,
            (Support::Supported { .. }, false, None) => GatePhase::AwaitingReady,
            (Support::Supported { .. }, false, Some(_)) => GatePhase::Degraded,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self.support {
            Support::Supported { tier } => Some(tier),
            _ => None,
        }
    }

    /// Human-readable error for the fallback view.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let supported = matches!(self.support, Support::Supported { .. });
        if self.ready && !supported {
            return Err(InvariantViolation::ReadyWithoutSupport);
        }
        if self.error.is_some() {
            if self.ready {
                return Err(InvariantViolation::ErrorWhileReady);
            }
            if self.support == Support::Unknown {
                return Err(InvariantViolation::ErrorWhileChecking);
            }
        }
        Ok(())
    }
}
