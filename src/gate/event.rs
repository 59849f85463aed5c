use std::time::Duration;

use super::state::{GatePhase, Generation};
use crate::probe::ProbeReport;

/// Inputs to the gate's transition function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    ProbeCompleted(ProbeReport),
    SurfaceCreated,
    SurfaceCreationFailed(String),
    ContextLost,
    ContextRestored,
    /// The configured ready window elapsed.
    ReadyTimedOut(Duration),
}

/// An event stamped with the generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub generation: Generation,
    pub event: GateEvent,
}

impl Tagged {
    pub fn new(generation: Generation, event: GateEvent) -> Self {
        Self { generation, event }
    }
}

/// What applying a tagged event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Event belonged to a superseded generation and was dropped.
    Stale,
    /// Event is meaningless in the current phase.
    Ignored,
    Transitioned { from: GatePhase, to: GatePhase },
    /// The lost context came back; the caller must reset the gate.
    RestoreRequested,
}
