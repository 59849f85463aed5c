use std::cell::RefCell;
use std::collections::BTreeSet;

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

pub type SignalId = usize;
pub type EffectId = usize;

type EffectCallback = Box<dyn FnMut()>;

#[derive(Default)]
pub struct Runtime {
    current_effect: Option<EffectId>,
    pending_effects: BTreeSet<EffectId>,
    effect_callbacks: Vec<Option<EffectCallback>>,
    effect_alive: Vec<bool>,
    effect_dependencies: Vec<BTreeSet<SignalId>>,
    signal_subscribers: Vec<BTreeSet<EffectId>>,
    batch_depth: usize,
    flushing: bool,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_signal(&mut self) -> SignalId {
        let id = self.signal_subscribers.len();
        self.signal_subscribers.push(BTreeSet::new());
        id
    }

    pub fn allocate_effect(&mut self, callback: EffectCallback) -> EffectId {
        let id = self.effect_callbacks.len();
        self.effect_callbacks.push(Some(callback));
        self.effect_alive.push(true);
        self.effect_dependencies.push(BTreeSet::new());
        id
    }

    pub fn track_read(&mut self, signal_id: SignalId) {
        // Signals created on another thread are unknown to this runtime
        if signal_id >= self.signal_subscribers.len() {
            return;
        }

        if let Some(effect_id) = self.current_effect {
            self.signal_subscribers[signal_id].insert(effect_id);
            self.effect_dependencies[effect_id].insert(signal_id);
        }
    }

    /// Queue every subscriber of `signal_id`. Returns true when the caller
    /// should flush (not batching and no flush already running).
    fn queue_subscribers(&mut self, signal_id: SignalId) -> bool {
        if signal_id >= self.signal_subscribers.len() {
            return false;
        }

        let subscribers: Vec<_> = self.signal_subscribers[signal_id].iter().copied().collect();
        self.pending_effects.extend(subscribers);

        self.batch_depth == 0 && !self.flushing
    }

    /// Detach the effect from its old dependencies and take its callback out
    /// so it can run without the runtime borrowed.
    fn begin_run(&mut self, effect_id: EffectId) -> Option<(EffectCallback, Option<EffectId>)> {
        if !self.effect_alive.get(effect_id).copied().unwrap_or(false) {
            return None;
        }

        let old_deps = std::mem::take(&mut self.effect_dependencies[effect_id]);
        for signal_id in old_deps {
            self.signal_subscribers[signal_id].remove(&effect_id);
        }

        let callback = self.effect_callbacks[effect_id].take()?;
        let prev_effect = self.current_effect.replace(effect_id);
        Some((callback, prev_effect))
    }

    fn end_run(&mut self, effect_id: EffectId, callback: EffectCallback, prev: Option<EffectId>) {
        self.current_effect = prev;
        // The effect may have been disposed while it was running
        if self.effect_alive[effect_id] {
            self.effect_callbacks[effect_id] = Some(callback);
        }
    }

    pub fn dispose_effect(&mut self, effect_id: EffectId) {
        if effect_id >= self.effect_alive.len() {
            return;
        }
        let deps = std::mem::take(&mut self.effect_dependencies[effect_id]);
        for signal_id in deps {
            if signal_id < self.signal_subscribers.len() {
                self.signal_subscribers[signal_id].remove(&effect_id);
            }
        }
        self.effect_alive[effect_id] = false;
        self.effect_callbacks[effect_id] = None;
        self.pending_effects.remove(&effect_id);
    }
}

pub fn with_runtime<F, R>(f: F) -> R
where
    F: FnOnce(&mut Runtime) -> R,
{
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Try to access the runtime. Does nothing if the runtime is already borrowed.
pub fn try_with_runtime<F>(f: F)
where
    F: FnOnce(&mut Runtime),
{
    RUNTIME.with(|rt| {
        if let Ok(mut runtime) = rt.try_borrow_mut() {
            f(&mut runtime);
        }
    });
}

/// Run one effect with dependency tracking. The runtime is not borrowed while
/// the callback executes, so the callback may read and write signals.
pub fn run_effect(effect_id: EffectId) {
    let Some((mut callback, prev)) = with_runtime(|rt| rt.begin_run(effect_id)) else {
        return;
    };
    callback();
    with_runtime(|rt| rt.end_run(effect_id, callback, prev));
}

/// Notify subscribers of a signal write and flush them unless batching.
pub fn notify_write(signal_id: SignalId) {
    let mut should_flush = false;
    try_with_runtime(|rt| should_flush = rt.queue_subscribers(signal_id));
    if should_flush {
        flush_effects();
    }
}

pub fn flush_effects() {
    with_runtime(|rt| rt.flushing = true);
    loop {
        let next = with_runtime(|rt| rt.pending_effects.pop_first());
        match next {
            Some(effect_id) => run_effect(effect_id),
            None => break,
        }
    }
    with_runtime(|rt| rt.flushing = false);
}

pub fn batch<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    with_runtime(|rt| rt.batch_depth += 1);
    let result = f();
    let flush = with_runtime(|rt| {
        rt.batch_depth -= 1;
        rt.batch_depth == 0 && !rt.flushing
    });

    if flush {
        flush_effects();
    }

    result
}
