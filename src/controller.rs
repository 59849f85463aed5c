//! Reset and retry.
//!
//! Every way of restarting the gate (the fallback's retry button, a restored
//! context, a hot-reload notification) ends in [`ResetController::reset`],
//! which bumps the generation, tears the surface down and schedules a fresh
//! probe. Callers that cannot borrow the session (views, event-loop sources)
//! go through [`ResetRequests`], which the session drains on its next pump.

use std::cell::Cell;
use std::rc::Rc;

use crate::gate::{Gate, Generation};
use crate::scheduler::{Deferred, Scheduler, TaskId};
use crate::surface_manager::SurfaceManager;

/// What asked for a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetSource {
    UserRetry,
    Restoration,
    HotReload,
}

/// Deferred reset requests. Requests made before the next pump coalesce
/// into one; the first source wins.
#[derive(Clone, Default)]
pub struct ResetRequests {
    pending: Rc<Cell<Option<ResetSource>>>,
}

impl ResetRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, source: ResetSource) {
        match self.pending.get() {
            Some(existing) => {
                log::debug!("Reset already pending ({:?}), ignoring {:?}", existing, source);
            }
            None => self.pending.set(Some(source)),
        }
    }

    pub fn take(&self) -> Option<ResetSource> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

/// Retry affordance handed to the fallback view.
#[derive(Clone)]
pub struct RetryHandle {
    requests: ResetRequests,
}

impl RetryHandle {
    pub fn retry(&self) {
        self.requests.request(ResetSource::UserRetry);
    }
}

#[derive(Default)]
pub struct ResetController {
    requests: ResetRequests,
    probe_task: Option<TaskId>,
    timeout_task: Option<TaskId>,
    resets: u64,
    last_source: Option<ResetSource>,
}

impl ResetController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> ResetRequests {
        self.requests.clone()
    }

    pub fn retry_handle(&self) -> RetryHandle {
        RetryHandle {
            requests: self.requests.clone(),
        }
    }

    /// Number of resets performed so far.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn last_source(&self) -> Option<ResetSource> {
        self.last_source
    }

    /// Schedule the probe for the gate's current generation, replacing any
    /// probe still waiting.
    pub fn schedule_probe(&mut self, gate: &Gate, scheduler: &mut Scheduler<Deferred>) {
        if let Some(task) = self.probe_task.take() {
            scheduler.cancel(task);
        }
        self.probe_task = Some(scheduler.after_paint(Deferred::Probe(gate.generation())));
    }

    pub fn probe_started(&mut self) {
        self.probe_task = None;
    }

    pub fn arm_timeout(
        &mut self,
        gate: &Gate,
        scheduler: &mut Scheduler<Deferred>,
        timeout: std::time::Duration,
    ) {
        self.disarm_timeout(scheduler);
        self.timeout_task =
            Some(scheduler.after(timeout, Deferred::ReadyTimeout(gate.generation())));
    }

    pub fn disarm_timeout(&mut self, scheduler: &mut Scheduler<Deferred>) {
        if let Some(task) = self.timeout_task.take() {
            scheduler.cancel(task);
        }
    }

    /// The single reset path: unmount the current surface (detaching its
    /// listeners), return the gate to CHECKING under a new generation and
    /// schedule a new probe cycle.
    pub fn reset(
        &mut self,
        source: ResetSource,
        gate: &mut Gate,
        surfaces: &mut SurfaceManager,
        scheduler: &mut Scheduler<Deferred>,
    ) -> Generation {
        surfaces.teardown();
        self.disarm_timeout(scheduler);

        let generation = gate.reset();
        self.resets += 1;
        self.last_source = Some(source);
        log::info!("Reset requested by {:?}, now {}", source, generation);

        self.schedule_probe(gate, scheduler);
        generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_coalesce() {
        let requests = ResetRequests::new();
        requests.request(ResetSource::HotReload);
        requests.request(ResetSource::UserRetry);
        assert_eq!(requests.take(), Some(ResetSource::HotReload));
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_retry_handle_requests_user_retry() {
        let controller = ResetController::new();
        controller.retry_handle().retry();
        assert!(controller.requests().is_pending());
        assert_eq!(controller.requests().take(), Some(ResetSource::UserRetry));
    }

    #[test]
    fn test_reset_schedules_single_probe() {
        let mut controller = ResetController::new();
        let mut gate = Gate::new();
        let mut surfaces = SurfaceManager::new();
        let mut scheduler = Scheduler::new();

        controller.schedule_probe(&gate, &mut scheduler);
        let generation =
            controller.reset(ResetSource::UserRetry, &mut gate, &mut surfaces, &mut scheduler);

        assert_eq!(scheduler.paint_settled(), vec![Deferred::Probe(generation)]);
        assert_eq!(controller.resets(), 1);
        assert_eq!(controller.last_source(), Some(ResetSource::UserRetry));
    }
}
