//! The gate session: one owned object wiring probe, gate, surface, monitor
//! and reset controller together.
//!
//! The host drives it with three calls:
//!
//! - [`GateSession::paint_settled`] once the current paint has settled (runs
//!   the deferred probe),
//! - [`GateSession::advance`] with the time elapsed since the last tick (fires
//!   the optional ready timeout),
//! - [`GateSession::pump`] to deliver queued surface events and reset requests.
//!
//! Both `paint_settled` and `advance` pump on their own.

use std::time::Duration;

use crate::config::GateConfig;
use crate::controller::{ResetController, ResetRequests, ResetSource, RetryHandle};
use crate::gate::{Gate, GateEvent, GatePhase, GateState, Generation, Outcome, Tagged};
use crate::lifecycle::EventSink;
use crate::probe::{CapabilityProbe, ContextProvider};
use crate::reactive::ReadSignal;
use crate::scheduler::{Deferred, Scheduler};
use crate::surface::{SurfaceFactory, SurfaceId, SurfaceRequest};
use crate::surface_manager::SurfaceManager;

pub struct GateSession {
    config: GateConfig,
    gate: Gate,
    probe: CapabilityProbe<Box<dyn ContextProvider>>,
    factory: Box<dyn SurfaceFactory>,
    surfaces: SurfaceManager,
    scheduler: Scheduler<Deferred>,
    events: EventSink,
    controller: ResetController,
}

impl GateSession {
    /// Create a session in CHECKING with its first probe deferred until the
    /// first paint settles.
    pub fn new(
        config: GateConfig,
        provider: impl ContextProvider + 'static,
        factory: impl SurfaceFactory + 'static,
    ) -> Self {
        let probe = CapabilityProbe::new(
            Box::new(provider) as Box<dyn ContextProvider>,
            config.context.clone(),
        );
        let mut session = Self {
            config,
            gate: Gate::new(),
            probe,
            factory: Box::new(factory),
            surfaces: SurfaceManager::new(),
            scheduler: Scheduler::new(),
            events: EventSink::new(),
            controller: ResetController::new(),
        };
        session
            .controller
            .schedule_probe(&session.gate, &mut session.scheduler);
        session
    }

    pub fn state(&self) -> &GateState {
        self.gate.state()
    }

    pub fn phase(&self) -> GatePhase {
        self.gate.phase()
    }

    pub fn generation(&self) -> Generation {
        self.gate.generation()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Reactive view of the gate state.
    pub fn watch(&self) -> ReadSignal<GateState> {
        self.gate.watch()
    }

    pub fn retry_handle(&self) -> RetryHandle {
        self.controller.retry_handle()
    }

    /// Deferred reset requests, for sources that cannot borrow the session.
    pub fn requests(&self) -> ResetRequests {
        self.controller.requests()
    }

    pub fn mounted_surface(&self) -> Option<SurfaceId> {
        self.surfaces.mounted().map(|m| m.id())
    }

    pub fn resets(&self) -> u64 {
        self.controller.resets()
    }

    /// Reset the gate now. Always safe; every call starts a new generation.
    pub fn reset(&mut self, source: ResetSource) -> Generation {
        self.controller.reset(
            source,
            &mut self.gate,
            &mut self.surfaces,
            &mut self.scheduler,
        )
    }

    pub fn paint_settled(&mut self) {
        for task in self.scheduler.paint_settled() {
            self.run_deferred(task);
        }
        self.pump();
    }

    pub fn advance(&mut self, elapsed: Duration) {
        for task in self.scheduler.advance(elapsed) {
            self.run_deferred(task);
        }
        self.pump();
    }

    /// Deliver pending surface signals and reset requests.
    pub fn pump(&mut self) {
        loop {
            self.surfaces.dispatch();

            let mut progressed = false;
            while let Some(tagged) = self.events.pop() {
                progressed = true;
                self.apply(tagged);
            }

            if let Some(source) = self.controller.requests().take() {
                progressed = true;
                self.reset(source);
            }

            if !progressed {
                break;
            }
        }
    }

    fn apply(&mut self, tagged: Tagged) -> Outcome {
        let outcome = self.gate.apply(tagged);
        match outcome {
            Outcome::Transitioned {
                to: GatePhase::Ready | GatePhase::Degraded,
                ..
            } => self.controller.disarm_timeout(&mut self.scheduler),
            Outcome::RestoreRequested => {
                self.reset(ResetSource::Restoration);
            }
            _ => {}
        }
        outcome
    }

    fn run_deferred(&mut self, task: Deferred) {
        match task {
            Deferred::Probe(generation) => self.run_probe(generation),
            Deferred::ReadyTimeout(generation) => {
                if let Some(timeout) = self.config.ready_timeout {
                    self.apply(Tagged::new(generation, GateEvent::ReadyTimedOut(timeout)));
                }
            }
        }
    }

    fn run_probe(&mut self, generation: Generation) {
        self.controller.probe_started();
        if generation != self.gate.generation() {
            log::debug!("Skipping probe for superseded {}", generation);
            return;
        }

        let report = self.probe.probe();
        let tier = report.tier();
        let outcome = self.apply(Tagged::new(generation, GateEvent::ProbeCompleted(report)));

        if let (
            Outcome::Transitioned {
                to: GatePhase::AwaitingReady,
                ..
            },
            Some(tier),
        ) = (outcome, tier)
        {
            self.mount_surface(generation, tier);
        }
    }

    fn mount_surface(&mut self, generation: Generation, tier: crate::probe::Tier) {
        let request = SurfaceRequest {
            id: SurfaceId::next(),
            generation,
            tier,
            options: self.config.context.clone(),
        };
        self.surfaces
            .mount(self.factory.as_mut(), request, self.events.clone());

        if let Some(timeout) = self.config.ready_timeout {
            self.controller
                .arm_timeout(&self.gate, &mut self.scheduler, timeout);
        }
    }
}
