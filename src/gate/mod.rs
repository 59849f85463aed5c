//! The gate: single source of truth for whether the accelerated surface may
//! be shown.
//!
//! ```text
//! CHECKING ──probe ok──▶ AWAITING_READY ──created──▶ READY
//!    │                        │                        │
//!    └─probe fails─▶ UNSUPPORTED   └─creation error─▶ DEGRADED ◀─lost─┘
//! ```
//!
//! Every state returns to CHECKING through [`Gate::reset`], which bumps the
//! generation. Events carry the generation they were produced for and are
//! dropped when it is no longer current.

mod event;
mod state;

pub use event::{GateEvent, Outcome, Tagged};
pub use state::{GatePhase, GateState, Generation, InvariantViolation, Support};

use crate::error::GateError;
use crate::probe::ProbeReport;
use crate::reactive::{create_signal, ReadSignal, Signal};

pub struct Gate {
    state: GateState,
    published: Signal<GateState>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        let state = GateState::default();
        Self {
            published: create_signal(state.clone()),
            state,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn phase(&self) -> GatePhase {
        self.state.phase()
    }

    pub fn generation(&self) -> Generation {
        self.state.generation
    }

    /// Reactive view of the state for consumers.
    pub fn watch(&self) -> ReadSignal<GateState> {
        self.published.reader()
    }

    /// Return to a fresh CHECKING state under a new generation.
    pub fn reset(&mut self) -> Generation {
        let previous = self.state.phase();
        let generation = self.state.generation.next();
        self.commit(GateState::checking(generation));
        log::info!(
            "Gate reset: {:?} -> {:?} ({})",
            previous,
            GatePhase::Checking,
            generation
        );
        generation
    }

    /// The transition function. Stale and out-of-phase events leave the
    /// state untouched.
    pub fn apply(&mut self, tagged: Tagged) -> Outcome {
        if tagged.generation != self.state.generation {
            log::debug!(
                "Discarding stale {:?} from {} (current {})",
                tagged.event,
                tagged.generation,
                self.state.generation
            );
            return Outcome::Stale;
        }

        let from = self.state.phase();
        let mut next = self.state.clone();

        match (from, tagged.event) {
            (GatePhase::Checking, GateEvent::ProbeCompleted(report)) => match report {
                ProbeReport::Supported { tier, .. } => {
                    next.support = Support::Supported { tier };
                    next.error = None;
                }
                ProbeReport::Unsupported { error } => {
                    log::warn!("Accelerated graphics unavailable: {}", error);
                    next.support = Support::Unsupported;
                    next.error = Some(GateError::DetectionFailure(error));
                }
            },
            (GatePhase::AwaitingReady, GateEvent::SurfaceCreated) => {
                next.ready = true;
                next.error = None;
            }
            (GatePhase::AwaitingReady, GateEvent::SurfaceCreationFailed(message)) => {
                log::warn!("Surface creation failed: {}", message);
                next.error = Some(GateError::CreationFailure(message));
            }
            (GatePhase::AwaitingReady | GatePhase::Ready, GateEvent::ContextLost) => {
                log::warn!("Graphics context lost ({})", self.state.generation);
                next.ready = false;
                next.error = Some(GateError::ContextLost);
            }
            (GatePhase::AwaitingReady, GateEvent::ReadyTimedOut(after)) => {
                log::warn!("Surface not ready after {:?}", after);
                next.error = Some(GateError::ReadyTimeout(after));
            }
            (GatePhase::Degraded, GateEvent::ContextRestored)
                if self.state.error == Some(GateError::ContextLost) =>
            {
                log::info!("Graphics context restored ({})", self.state.generation);
                return Outcome::RestoreRequested;
            }
            (phase, event) => {
                log::debug!("Ignoring {:?} while {:?}", event, phase);
                return Outcome::Ignored;
            }
        }

        let to = next.phase();
        self.commit(next);
        log::info!("Gate transition: {:?} -> {:?}", from, to);
        Outcome::Transitioned { from, to }
    }

    fn commit(&mut self, next: GateState) {
        debug_assert_eq!(next.check_invariants(), Ok(()));
        self.state = next;
        self.published.set(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ContextInfo, Tier};
    use std::time::Duration;

    fn supported() -> GateEvent {
        GateEvent::ProbeCompleted(ProbeReport::Supported {
            tier: Tier::Enhanced,
            context: ContextInfo {
                name: "test".into(),
                backend: "test".into(),
            },
        })
    }

    fn current(gate: &Gate, event: GateEvent) -> Tagged {
        Tagged::new(gate.generation(), event)
    }

    #[test]
    fn test_probe_success_awaits_ready() {
        let mut gate = Gate::new();
        let outcome = gate.apply(current(&gate, supported()));
        assert_eq!(
            outcome,
            Outcome::Transitioned {
                from: GatePhase::Checking,
                to: GatePhase::AwaitingReady
            }
        );
        assert_eq!(gate.state().tier(), Some(Tier::Enhanced));
    }

    #[test]
    fn test_probe_failure_is_unsupported() {
        let mut gate = Gate::new();
        let report = ProbeReport::Unsupported {
            error: "no adapter".into(),
        };
        gate.apply(current(&gate, GateEvent::ProbeCompleted(report)));
        assert_eq!(gate.phase(), GatePhase::Unsupported);
        assert_eq!(
            gate.state().error,
            Some(GateError::DetectionFailure("no adapter".into()))
        );
    }

    #[test]
    fn test_creation_confirmed_is_ready() {
        let mut gate = Gate::new();
        gate.apply(current(&gate, supported()));
        gate.apply(current(&gate, GateEvent::SurfaceCreated));
        assert_eq!(gate.phase(), GatePhase::Ready);
        assert!(gate.state().ready);
        assert_eq!(gate.state().error, None);
    }

    #[test]
    fn test_creation_error_degrades() {
        let mut gate = Gate::new();
        gate.apply(current(&gate, supported()));
        gate.apply(current(
            &gate,
            GateEvent::SurfaceCreationFailed("shader compile".into()),
        ));
        assert_eq!(gate.phase(), GatePhase::Degraded);
    }

    #[test]
    fn test_loss_from_ready_degrades() {
        let mut gate = Gate::new();
        gate.apply(current(&gate, supported()));
        gate.apply(current(&gate, GateEvent::SurfaceCreated));
        gate.apply(current(&gate, GateEvent::ContextLost));
        assert_eq!(gate.phase(), GatePhase::Degraded);
        assert_eq!(gate.state().error, Some(GateError::ContextLost));
        assert!(!gate.state().ready);
    }

    #[test]
    fn test_restore_only_after_loss() {
        let mut gate = Gate::new();
        gate.apply(current(&gate, supported()));
        gate.apply(current(&gate, GateEvent::SurfaceCreationFailed("x".into())));
        assert_eq!(
            gate.apply(current(&gate, GateEvent::ContextRestored)),
            Outcome::Ignored
        );

        let mut gate = Gate::new();
        gate.apply(current(&gate, supported()));
        gate.apply(current(&gate, GateEvent::SurfaceCreated));
        gate.apply(current(&gate, GateEvent::ContextLost));
        assert_eq!(
            gate.apply(current(&gate, GateEvent::ContextRestored)),
            Outcome::RestoreRequested
        );
        assert_eq!(gate.phase(), GatePhase::Degraded);
    }

    #[test]
    fn test_timeout_degrades_only_while_awaiting() {
        let mut gate = Gate::new();
        let timeout = GateEvent::ReadyTimedOut(Duration::from_secs(5));
        assert_eq!(gate.apply(current(&gate, timeout.clone())), Outcome::Ignored);

        gate.apply(current(&gate, supported()));
        gate.apply(current(&gate, timeout));
        assert_eq!(
            gate.state().error,
            Some(GateError::ReadyTimeout(Duration::from_secs(5)))
        );
    }

    #[test]
    fn test_reset_bumps_generation_and_clears() {
        let mut gate = Gate::new();
        gate.apply(current(&gate, supported()));
        gate.apply(current(&gate, GateEvent::SurfaceCreated));

        let before = gate.generation();
        let after = gate.reset();
        assert!(after > before);
        assert_eq!(gate.phase(), GatePhase::Checking);
        assert_eq!(gate.state().error, None);
        assert!(!gate.state().ready);
    }

    #[test]
    fn test_stale_event_is_noop() {
        let mut gate = Gate::new();
        let old = gate.generation();
        gate.reset();
        let snapshot = gate.state().clone();

        assert_eq!(gate.apply(Tagged::new(old, supported())), Outcome::Stale);
        assert_eq!(gate.state(), &snapshot);
    }

    #[test]
    fn test_watch_follows_transitions() {
        let mut gate = Gate::new();
        let watch = gate.watch();
        gate.apply(current(&gate, supported()));
        assert_eq!(watch.get().phase(), GatePhase::AwaitingReady);
        gate.reset();
        assert_eq!(watch.get().phase(), GatePhase::Checking);
    }
}
