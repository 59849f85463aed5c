#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use devverse::prelude::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What a fake provider does when asked for one tier.
#[derive(Debug, Clone)]
pub enum TierScript {
    Available,
    Missing(&'static str),
    Panics(&'static str),
}

/// Context provider answering from a per-tier script.
#[derive(Clone)]
pub struct FakeProvider {
    enhanced: Rc<RefCell<TierScript>>,
    baseline: Rc<RefCell<TierScript>>,
    calls: Rc<RefCell<Vec<Tier>>>,
}

impl FakeProvider {
    pub fn new(enhanced: TierScript, baseline: TierScript) -> Self {
        Self {
            enhanced: Rc::new(RefCell::new(enhanced)),
            baseline: Rc::new(RefCell::new(baseline)),
            calls: Rc::default(),
        }
    }

    pub fn supported() -> Self {
        Self::new(TierScript::Available, TierScript::Available)
    }

    pub fn unsupported() -> Self {
        Self::new(
            TierScript::Missing("no enhanced adapter"),
            TierScript::Missing("no baseline adapter"),
        )
    }

    /// Change the answers for later probes; clones share the script.
    pub fn rescript(&self, enhanced: TierScript, baseline: TierScript) {
        *self.enhanced.borrow_mut() = enhanced;
        *self.baseline.borrow_mut() = baseline;
    }

    pub fn calls(&self) -> Vec<Tier> {
        self.calls.borrow().clone()
    }
}

impl ContextProvider for FakeProvider {
    fn try_context(&self, tier: Tier, _options: &ContextOptions) -> Result<ContextInfo, String> {
        self.calls.borrow_mut().push(tier);
        let script = match tier {
            Tier::Enhanced => self.enhanced.borrow().clone(),
            Tier::Baseline => self.baseline.borrow().clone(),
        };
        match script {
            TierScript::Available => Ok(ContextInfo {
                name: "fake adapter".into(),
                backend: format!("fake {tier}"),
            }),
            TierScript::Missing(reason) => Err(reason.to_string()),
            TierScript::Panics(message) => panic!("{}", message),
        }
    }
}

#[derive(Default)]
struct RemoteState {
    pending: Vec<SurfaceSignal>,
    prevented: Vec<bool>,
}

/// Test-side handle to a fake surface: raise host signals, inspect what the
/// gate did with them.
#[derive(Clone)]
pub struct SurfaceRemote {
    pub request: SurfaceRequest,
    listeners: ListenerSet,
    state: Rc<RefCell<RemoteState>>,
    dropped: Rc<Cell<bool>>,
}

impl SurfaceRemote {
    pub fn created(&self) {
        self.raise(SurfaceSignal::Created);
    }

    pub fn fail(&self, message: &str) {
        self.raise(SurfaceSignal::CreationError(CreationError::new(message)));
    }

    pub fn fail_with(&self, error: CreationError) {
        self.raise(SurfaceSignal::CreationError(error));
    }

    pub fn lose(&self) {
        self.raise(SurfaceSignal::Lost(LostEvent::new()));
    }

    pub fn restore(&self) {
        self.raise(SurfaceSignal::Restored);
    }

    /// Queue a signal for the next dispatch, as a host callback would.
    pub fn raise(&self, signal: SurfaceSignal) {
        self.state.borrow_mut().pending.push(signal);
    }

    /// Deliver a signal immediately to whatever listeners are attached.
    pub fn emit_now(&self, mut signal: SurfaceSignal) {
        self.listeners.emit(&mut signal);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.get()
    }

    /// Whether each delivered loss had its default action suppressed.
    pub fn losses_prevented(&self) -> Vec<bool> {
        self.state.borrow().prevented.clone()
    }
}

pub struct FakeSurface {
    remote: SurfaceRemote,
}

impl Surface for FakeSurface {
    fn id(&self) -> SurfaceId {
        self.remote.request.id
    }

    fn subscribe(&mut self, listener: Listener) -> Subscription {
        self.remote.listeners.subscribe(listener)
    }

    fn dispatch(&mut self) {
        let pending = std::mem::take(&mut self.remote.state.borrow_mut().pending);
        for mut signal in pending {
            self.remote.listeners.emit(&mut signal);
            if let SurfaceSignal::Lost(lost) = &signal {
                self.remote
                    .state
                    .borrow_mut()
                    .prevented
                    .push(lost.default_prevented());
            }
        }
    }
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        self.remote.dropped.set(true);
    }
}

/// Factory handing out [`FakeSurface`]s and keeping a remote for each.
#[derive(Clone, Default)]
pub struct FakeFactory {
    remotes: Rc<RefCell<Vec<SurfaceRemote>>>,
    auto_create: Rc<Cell<bool>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every new surface confirms creation on its first dispatch.
    pub fn auto_created() -> Self {
        let factory = Self::default();
        factory.auto_create.set(true);
        factory
    }

    pub fn set_auto_create(&self, auto: bool) {
        self.auto_create.set(auto);
    }

    pub fn created_count(&self) -> usize {
        self.remotes.borrow().len()
    }

    pub fn remote(&self, index: usize) -> SurfaceRemote {
        self.remotes.borrow()[index].clone()
    }

    pub fn last(&self) -> SurfaceRemote {
        self.remotes
            .borrow()
            .last()
            .cloned()
            .expect("no surface created yet")
    }
}

impl SurfaceFactory for FakeFactory {
    fn create(&mut self, request: SurfaceRequest) -> Box<dyn Surface> {
        let remote = SurfaceRemote {
            request,
            listeners: ListenerSet::new(),
            state: Rc::default(),
            dropped: Rc::new(Cell::new(false)),
        };
        if self.auto_create.get() {
            remote.created();
        }
        self.remotes.borrow_mut().push(remote.clone());
        Box::new(FakeSurface { remote })
    }
}

/// What a recording view saw.
#[derive(Default)]
pub struct ViewLog {
    pub mounts: usize,
    pub unmounts: usize,
    pub mounted: bool,
    pub props: Option<ViewProps>,
}

#[derive(Clone, Default)]
pub struct RecordingView {
    log: Rc<RefCell<ViewLog>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounts(&self) -> usize {
        self.log.borrow().mounts
    }

    pub fn unmounts(&self) -> usize {
        self.log.borrow().unmounts
    }

    pub fn is_mounted(&self) -> bool {
        self.log.borrow().mounted
    }

    pub fn props(&self) -> Option<ViewProps> {
        self.log.borrow().props.clone()
    }
}

impl View for RecordingView {
    fn mount(&mut self, props: &ViewProps) {
        let mut log = self.log.borrow_mut();
        log.mounts += 1;
        log.mounted = true;
        log.props = Some(props.clone());
    }

    fn unmount(&mut self) {
        let mut log = self.log.borrow_mut();
        log.unmounts += 1;
        log.mounted = false;
    }
}

/// Loading, fallback and overlay recorders plus the [`Views`] wrapping them.
pub struct Consumers {
    pub loading: RecordingView,
    pub fallback: RecordingView,
    pub overlay: RecordingView,
}

impl Consumers {
    pub fn new() -> (Self, Views) {
        let consumers = Self {
            loading: RecordingView::new(),
            fallback: RecordingView::new(),
            overlay: RecordingView::new(),
        };
        let views = Views::new(
            consumers.loading.clone(),
            consumers.fallback.clone(),
            consumers.overlay.clone(),
        );
        (consumers, views)
    }
}

/// Record every published gate phase.
pub fn record_phases(session: &GateSession) -> (Rc<RefCell<Vec<GatePhase>>>, Effect) {
    let phases = Rc::new(RefCell::new(Vec::new()));
    let watch = session.watch();
    let sink = phases.clone();
    let effect = create_effect(move || {
        let phase = watch.with(|state| state.phase());
        sink.borrow_mut().push(phase);
    });
    (phases, effect)
}
