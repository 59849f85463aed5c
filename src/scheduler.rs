//! Deterministic single-shot scheduling.
//!
//! Work is queued as plain values and handed back to the caller when due,
//! either once the current paint settles ([`Scheduler::after_paint`]) or
//! after a delay on the scheduler's own clock ([`Scheduler::after`]). The
//! clock only moves through [`Scheduler::advance`], so tests step time
//! explicitly instead of sleeping.

use std::time::Duration;

use crate::gate::Generation;

/// Handle to a scheduled task, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Due {
    AfterPaint,
    At(Duration),
}

struct Pending<T> {
    id: TaskId,
    due: Due,
    task: T,
}

pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    pending: Vec<Pending<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Time elapsed on the scheduler clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn after_paint(&mut self, task: T) -> TaskId {
        self.push(Due::AfterPaint, task)
    }

    pub fn after(&mut self, delay: Duration, task: T) -> TaskId {
        let at = self.now + delay;
        self.push(Due::At(at), task)
    }

    /// Cancel a task. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        before != self.pending.len()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every task waiting for the paint to settle, in scheduling order.
    pub fn paint_settled(&mut self) -> Vec<T> {
        self.take_where(|due| due == Due::AfterPaint)
    }

    /// Move the clock forward and take every timer that is now due, ordered
    /// by deadline then scheduling order.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<T> {
        self.now += elapsed;
        let now = self.now;
        let mut due: Vec<Pending<T>> = Vec::new();
        let mut remaining = Vec::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            match pending.due {
                Due::At(at) if at <= now => due.push(pending),
                _ => remaining.push(pending),
            }
        }
        self.pending = remaining;
        due.sort_by_key(|p| match p.due {
            Due::At(at) => (at, p.id.0),
            Due::AfterPaint => (Duration::ZERO, p.id.0),
        });
        due.into_iter().map(|p| p.task).collect()
    }

    fn push(&mut self, due: Due, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        log::debug!("Scheduled task {} ({:?})", id.0, due);
        self.pending.push(Pending { id, due, task });
        id
    }

    fn take_where(&mut self, mut select: impl FnMut(Due) -> bool) -> Vec<T> {
        let mut taken = Vec::new();
        let mut remaining = Vec::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            if select(pending.due) {
                taken.push(pending.task);
            } else {
                remaining.push(pending);
            }
        }
        self.pending = remaining;
        taken
    }
}

/// Deferred gate work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Run the capability probe for a generation.
    Probe(Generation),
    /// Give up on a surface that never confirmed creation.
    ReadyTimeout(Generation),
}
