//! Ownership of the single mounted accelerated surface.
//!
//! Each mount runs inside its own owner scope. The lifecycle monitor's
//! subscription is released through `on_cleanup`, so tearing a surface down
//! (dispose the owner, then drop the surface) detaches every listener of the
//! old generation before a new one can attach.

use std::panic::{self, AssertUnwindSafe};

use crate::gate::{GateEvent, Generation, Tagged};
use crate::lifecycle::{EventSink, LifecycleMonitor};
use crate::probe::panic_message;
use crate::reactive::{dispose_owner, on_cleanup, with_owner, OwnerId};
use crate::surface::{Surface, SurfaceFactory, SurfaceId, SurfaceRequest};

/// A surface owned by one gate generation.
pub struct ManagedSurface {
    pub generation: Generation,
    surface: Box<dyn Surface>,
    owner: OwnerId,
}

impl ManagedSurface {
    pub fn id(&self) -> SurfaceId {
        self.surface.id()
    }

    fn teardown(self) {
        dispose_owner(self.owner);
        log::info!(
            "Unmounting surface {} ({})",
            self.surface.id().raw(),
            self.generation
        );
        drop(self.surface);
    }
}

#[derive(Default)]
pub struct SurfaceManager {
    mounted: Option<ManagedSurface>,
}

impl SurfaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(&self) -> Option<&ManagedSurface> {
        self.mounted.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Mount a surface for `request.generation`, replacing any previous one.
    ///
    /// A factory that panics mounts nothing; the panic reaches the gate as a
    /// creation failure through `sink`.
    pub fn mount(
        &mut self,
        factory: &mut dyn SurfaceFactory,
        request: SurfaceRequest,
        sink: EventSink,
    ) {
        self.teardown();

        let generation = request.generation;
        log::info!(
            "Mounting surface {} at {} ({})",
            request.id.raw(),
            request.tier,
            generation
        );

        let (created, owner) = with_owner(|| {
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| factory.create(request)));
            match attempt {
                Ok(mut surface) => {
                    let subscription =
                        LifecycleMonitor::attach(surface.as_mut(), generation, sink.clone());
                    on_cleanup(move || subscription.detach());
                    Ok(surface)
                }
                Err(payload) => Err(panic_message(payload.as_ref())),
            }
        });

        match created {
            Ok(surface) => {
                self.mounted = Some(ManagedSurface {
                    generation,
                    surface,
                    owner,
                });
            }
            Err(message) => {
                dispose_owner(owner);
                log::warn!("Surface creation panicked ({}): {}", generation, message);
                sink.push(Tagged::new(
                    generation,
                    GateEvent::SurfaceCreationFailed(format!("surface creation panicked: {message}")),
                ));
            }
        }
    }

    /// Deliver host-raised signals of the mounted surface.
    pub fn dispatch(&mut self) {
        if let Some(mounted) = self.mounted.as_mut() {
            mounted.surface.dispatch();
        }
    }

    /// Detach listeners and unmount. Safe to call with nothing mounted.
    pub fn teardown(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.teardown();
        }
    }
}

impl Drop for SurfaceManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
