//! Binds a mounted surface's lifecycle signals to the gate.
//!
//! The monitor forwards each signal as a [`Tagged`] event carrying the
//! generation that was current when it attached. Events are queued in an
//! [`EventSink`] and applied by the session in delivery order, so a surface
//! raising a signal from inside a host callback never re-enters the gate.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::gate::{GateEvent, Generation, Tagged};
use crate::surface::{Subscription, Surface, SurfaceSignal};

/// FIFO of lifecycle events waiting to reach the gate.
#[derive(Clone, Default)]
pub struct EventSink {
    queue: Rc<RefCell<VecDeque<Tagged>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Tagged) {
        self.queue.borrow_mut().push_back(event);
    }

    pub fn pop(&self) -> Option<Tagged> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// Translate a surface signal into a gate event. A lost context has its
/// default host behavior suppressed first so the host keeps it restorable.
pub fn translate(signal: &mut SurfaceSignal) -> GateEvent {
    match signal {
        SurfaceSignal::Created => GateEvent::SurfaceCreated,
        SurfaceSignal::CreationError(err) => GateEvent::SurfaceCreationFailed(err.to_string()),
        SurfaceSignal::Lost(lost) => {
            lost.prevent_default();
            GateEvent::ContextLost
        }
        SurfaceSignal::Restored => GateEvent::ContextRestored,
    }
}

pub struct LifecycleMonitor;

impl LifecycleMonitor {
    /// Attach to `surface` for `generation`. Dropping the returned
    /// subscription detaches the monitor.
    pub fn attach(
        surface: &mut dyn Surface,
        generation: Generation,
        sink: EventSink,
    ) -> Subscription {
        let surface_id = surface.id();
        log::debug!(
            "Monitoring surface {} for {}",
            surface_id.raw(),
            generation
        );
        surface.subscribe(Box::new(move |signal| {
            let event = translate(signal);
            log::debug!(
                "Surface {} raised {:?} ({})",
                surface_id.raw(),
                event,
                generation
            );
            sink.push(Tagged::new(generation, event));
        }))
    }
}
