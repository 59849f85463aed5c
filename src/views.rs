//! Consumers of the gate's readiness signal.
//!
//! The loading screen, the fallback interface and the overlay hold no
//! decision logic. [`ViewHost`] derives a [`Presentation`] from each gate
//! snapshot and mounts or unmounts views on the edges:
//!
//! | phase          | presentation        |
//! |----------------|---------------------|
//! | CHECKING       | LOADING             |
//! | UNSUPPORTED    | FALLBACK            |
//! | AWAITING_READY | SCENE               |
//! | READY          | SCENE \| OVERLAY    |
//! | DEGRADED       | SCENE \| FALLBACK   |
//!
//! `SCENE` marks the accelerated surface, which the session mounts itself.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::controller::RetryHandle;
use crate::gate::{GatePhase, GateState};
use crate::probe::Tier;
use crate::reactive::{create_effect, Effect, ReadSignal};

/// Notice shown by the fallback when the gate carries no error text.
pub const DEFAULT_FALLBACK_NOTICE: &str =
    "Accelerated graphics is not supported on this device. Showing the 2D interface.";

bitflags! {
    /// Which consumers are mounted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Presentation: u8 {
        const LOADING = 1 << 0;
        const SCENE = 1 << 1;
        const FALLBACK = 1 << 2;
        const OVERLAY = 1 << 3;
    }
}

impl Presentation {
    pub fn for_state(state: &GateState) -> Self {
        match state.phase() {
            GatePhase::Checking => Presentation::LOADING,
            GatePhase::Unsupported => Presentation::FALLBACK,
            GatePhase::AwaitingReady => Presentation::SCENE,
            GatePhase::Ready => Presentation::SCENE | Presentation::OVERLAY,
            GatePhase::Degraded => Presentation::SCENE | Presentation::FALLBACK,
        }
    }
}

/// Props handed to a view when it mounts.
#[derive(Clone)]
pub struct ViewProps {
    pub error: Option<String>,
    pub tier: Option<Tier>,
    pub retry: RetryHandle,
}

impl ViewProps {
    /// Text for the fallback's "3D mode unavailable" notice.
    pub fn notice(&self) -> &str {
        self.error.as_deref().unwrap_or(DEFAULT_FALLBACK_NOTICE)
    }
}

pub trait View {
    fn mount(&mut self, props: &ViewProps);
    fn unmount(&mut self);
}

/// The three consumer slots.
pub struct Views {
    pub loading: Box<dyn View>,
    pub fallback: Box<dyn View>,
    pub overlay: Box<dyn View>,
}

impl Views {
    pub fn new(
        loading: impl View + 'static,
        fallback: impl View + 'static,
        overlay: impl View + 'static,
    ) -> Self {
        Self {
            loading: Box::new(loading),
            fallback: Box::new(fallback),
            overlay: Box::new(overlay),
        }
    }
}

struct ViewSlots {
    views: Views,
    presented: Presentation,
    fallback_error: Option<String>,
}

impl ViewSlots {
    fn present(&mut self, state: &GateState, retry: &RetryHandle) {
        let next = Presentation::for_state(state);
        let props = ViewProps {
            error: state.error_message(),
            tier: state.tier(),
            retry: retry.clone(),
        };

        // Unmount first so consumers never overlap a stale sibling
        if self.presented.contains(Presentation::OVERLAY) && !next.contains(Presentation::OVERLAY) {
            self.views.overlay.unmount();
        }
        let fallback_changed = self.fallback_error != props.error;
        if self.presented.contains(Presentation::FALLBACK)
            && (!next.contains(Presentation::FALLBACK) || fallback_changed)
        {
            self.views.fallback.unmount();
            self.presented.remove(Presentation::FALLBACK);
        }
        if self.presented.contains(Presentation::LOADING) && !next.contains(Presentation::LOADING) {
            self.views.loading.unmount();
        }

        if next.contains(Presentation::LOADING) && !self.presented.contains(Presentation::LOADING) {
            self.views.loading.mount(&props);
        }
        if next.contains(Presentation::FALLBACK) && !self.presented.contains(Presentation::FALLBACK) {
            self.views.fallback.mount(&props);
            self.fallback_error = props.error.clone();
        }
        if next.contains(Presentation::OVERLAY) && !self.presented.contains(Presentation::OVERLAY) {
            self.views.overlay.mount(&props);
        }

        if next != self.presented {
            log::debug!("Presentation {:?} -> {:?}", self.presented, next);
        }
        self.presented = next;
    }
}

/// Keeps the views in step with the gate for as long as it lives.
pub struct ViewHost {
    slots: Rc<RefCell<ViewSlots>>,
    _effect: Effect,
}

impl ViewHost {
    pub fn attach(views: Views, state: ReadSignal<GateState>, retry: RetryHandle) -> Self {
        let slots = Rc::new(RefCell::new(ViewSlots {
            views,
            presented: Presentation::empty(),
            fallback_error: None,
        }));

        let effect_slots = slots.clone();
        let effect = create_effect(move || {
            let snapshot = state.get();
            effect_slots.borrow_mut().present(&snapshot, &retry);
        });

        Self {
            slots,
            _effect: effect,
        }
    }

    pub fn presented(&self) -> Presentation {
        self.slots.borrow().presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::gate::{Generation, Support};

    #[test]
    fn test_presentation_table() {
        let mut state = GateState::checking(Generation::INITIAL);
        assert_eq!(Presentation::for_state(&state), Presentation::LOADING);

        state.support = Support::Unsupported;
        state.error = Some(GateError::DetectionFailure("none".into()));
        assert_eq!(Presentation::for_state(&state), Presentation::FALLBACK);

        state.support = Support::Supported {
            tier: Tier::Baseline,
        };
        state.error = None;
        assert_eq!(Presentation::for_state(&state), Presentation::SCENE);

        state.ready = true;
        assert_eq!(
            Presentation::for_state(&state),
            Presentation::SCENE | Presentation::OVERLAY
        );

        state.ready = false;
        state.error = Some(GateError::ContextLost);
        assert_eq!(
            Presentation::for_state(&state),
            Presentation::SCENE | Presentation::FALLBACK
        );
    }

    #[test]
    fn test_notice_defaults_without_error() {
        let props = ViewProps {
            error: None,
            tier: None,
            retry: crate::controller::ResetController::new().retry_handle(),
        };
        assert_eq!(props.notice(), DEFAULT_FALLBACK_NOTICE);
    }
}
