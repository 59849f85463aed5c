//! Accelerated surface contracts.
//!
//! A [`SurfaceFactory`] mounts one [`Surface`] per gate generation. The
//! surface reports its lifecycle (created, creation error, lost, restored)
//! to listeners registered through [`Surface::subscribe`]. Every registration
//! returns a [`Subscription`] that detaches the listener when dropped.
//!
//! ```ignore
//! let subscription = surface.subscribe(Box::new(|signal| {
//!     if let SurfaceSignal::Lost(lost) = signal {
//!         lost.prevent_default();
//!     }
//! }));
//! // ...
//! subscription.detach();
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ContextOptions;
use crate::error::ContextErrorCode;
use crate::gate::Generation;
use crate::probe::Tier;

/// Unique identifier for each mounted surface instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Create a new unique surface ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        SurfaceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value (for debugging/logging).
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Host-delivered "context lost" notification.
///
/// Unless a listener calls [`LostEvent::prevent_default`], the host is free to
/// discard the context for good and never signal restoration.
#[derive(Debug, Default)]
pub struct LostEvent {
    default_prevented: bool,
}

impl LostEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Why a surface failed to initialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationError {
    pub message: String,
    pub code: Option<ContextErrorCode>,
}

impl CreationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: ContextErrorCode) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for CreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code.and_then(|code| code.describe()) {
            Some(detail) => write!(f, "{} ({})", self.message, detail),
            None => f.write_str(&self.message),
        }
    }
}

/// Lifecycle signals raised by a mounted surface.
#[derive(Debug)]
pub enum SurfaceSignal {
    /// First frame created successfully.
    Created,
    CreationError(CreationError),
    Lost(LostEvent),
    Restored,
}

pub type Listener = Box<dyn FnMut(&mut SurfaceSignal)>;

/// What the factory needs to mount a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub id: SurfaceId,
    pub generation: Generation,
    pub tier: Tier,
    pub options: ContextOptions,
}

/// A mounted accelerated surface. Dropping it unmounts it.
pub trait Surface {
    fn id(&self) -> SurfaceId;

    fn subscribe(&mut self, listener: Listener) -> Subscription;

    /// Deliver signals the host raised since the last call.
    ///
    /// Surfaces that invoke listeners synchronously from host callbacks can
    /// keep the default.
    fn dispatch(&mut self) {}
}

pub trait SurfaceFactory {
    fn create(&mut self, request: SurfaceRequest) -> Box<dyn Surface>;
}

impl<F> SurfaceFactory for F
where
    F: FnMut(SurfaceRequest) -> Box<dyn Surface>,
{
    fn create(&mut self, request: SurfaceRequest) -> Box<dyn Surface> {
        self(request)
    }
}

#[derive(Default)]
struct ListenerSlots {
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
    emitting: bool,
    detached_while_emitting: Vec<u64>,
}

/// Listener registry for [`Surface`] implementations.
#[derive(Clone, Default)]
pub struct ListenerSet {
    slots: Rc<RefCell<ListenerSlots>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            slots.next_id += 1;
            let id = slots.next_id;
            slots.listeners.push((id, listener));
            id
        };

        let slots = Rc::downgrade(&self.slots);
        Subscription::new(move || remove_listener(&slots, id))
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every attached listener with `signal`, in registration order.
    pub fn emit(&self, signal: &mut SurfaceSignal) {
        // Listeners run with the registry unborrowed so they may detach
        let mut active = {
            let mut slots = self.slots.borrow_mut();
            slots.emitting = true;
            std::mem::take(&mut slots.listeners)
        };

        for (_, listener) in active.iter_mut() {
            listener(signal);
        }

        let mut slots = self.slots.borrow_mut();
        let detached = std::mem::take(&mut slots.detached_while_emitting);
        active.retain(|(id, _)| !detached.contains(id));
        active.append(&mut slots.listeners);
        slots.listeners = active;
        slots.emitting = false;
    }
}

fn remove_listener(slots: &Weak<RefCell<ListenerSlots>>, id: u64) {
    let Some(slots) = slots.upgrade() else {
        return;
    };
    let mut slots = slots.borrow_mut();
    slots.listeners.retain(|(listener_id, _)| *listener_id != id);
    if slots.emitting {
        slots.detached_while_emitting.push(id);
    }
}

/// Detaches a listener when dropped or when [`Subscription::detach`] is called.
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn detach(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}
