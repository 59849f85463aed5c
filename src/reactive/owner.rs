//! Owner scopes for deterministic teardown.
//!
//! Anything created inside [`with_owner`] can register [`on_cleanup`]
//! callbacks; [`dispose_owner`] runs them (children first, then the owner's
//! own callbacks in reverse registration order). The gate mounts each surface
//! generation inside its own owner so that disposing the owner detaches every
//! listener bound to that generation.

use std::cell::RefCell;

/// Handle to an owner scope.
///
/// Slots are reused once disposed; the version keeps a handle to a disposed
/// owner from reaching whatever scope later occupies the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId {
    index: usize,
    version: u32,
}

struct Owner {
    parent: Option<OwnerId>,
    cleanups: Vec<Box<dyn FnOnce()>>,
    children: Vec<OwnerId>,
}

struct Slot {
    version: u32,
    owner: Option<Owner>,
}

struct OwnerArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl OwnerArena {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn allocate(&mut self, parent: Option<OwnerId>) -> OwnerId {
        let owner = Owner {
            parent,
            cleanups: Vec::new(),
            children: Vec::new(),
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.owner = Some(owner);
                OwnerId {
                    index,
                    version: slot.version,
                }
            }
            None => {
                self.slots.push(Slot {
                    version: 0,
                    owner: Some(owner),
                });
                OwnerId {
                    index: self.slots.len() - 1,
                    version: 0,
                }
            }
        };

        if let Some(parent_owner) = parent.and_then(|p| self.get_mut(p)) {
            parent_owner.children.push(id);
        }
        id
    }

    fn get_mut(&mut self, id: OwnerId) -> Option<&mut Owner> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.version == id.version)
            .and_then(|slot| slot.owner.as_mut())
    }

    /// Remove an owner, unlink it from a live parent and free its slot.
    fn take(&mut self, id: OwnerId) -> Option<Owner> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.version == id.version)?;
        let owner = slot.owner.take()?;
        slot.version = slot.version.wrapping_add(1);
        self.free.push(id.index);

        if let Some(parent) = owner.parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        Some(owner)
    }
}

thread_local! {
    static CURRENT_OWNER: RefCell<Option<OwnerId>> = const { RefCell::new(None) };
    static OWNERS: RefCell<OwnerArena> = RefCell::new(OwnerArena::new());
}

/// Execute a closure within a new owner scope.
///
/// Returns the closure's result and the owner ID to dispose later. Owners
/// created while another owner is current become its children.
pub fn with_owner<T>(f: impl FnOnce() -> T) -> (T, OwnerId) {
    let parent = current_owner();

    let owner_id = OWNERS.with(|owners| owners.borrow_mut().allocate(parent));

    let prev_owner = CURRENT_OWNER.with(|current| current.borrow_mut().replace(owner_id));
    let result = f();
    CURRENT_OWNER.with(|current| *current.borrow_mut() = prev_owner);

    (result, owner_id)
}

/// Get the current owner ID, if any.
pub fn current_owner() -> Option<OwnerId> {
    CURRENT_OWNER.with(|current| *current.borrow())
}

/// Dispose an owner: children first (depth-first), then its cleanup
/// callbacks in LIFO order. Disposing twice is a no-op.
pub fn dispose_owner(id: OwnerId) {
    let Some(owner) = OWNERS.with(|owners| owners.borrow_mut().take(id)) else {
        return;
    };

    for child_id in owner.children {
        dispose_owner(child_id);
    }

    for cleanup in owner.cleanups.into_iter().rev() {
        cleanup();
    }
}

/// Register a cleanup callback to run when the current owner is disposed.
///
/// Outside an owner scope the callback is dropped without running.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    let Some(owner_id) = current_owner() else {
        log::debug!("on_cleanup called outside an owner scope");
        return;
    };
    OWNERS.with(|owners| {
        if let Some(owner) = owners.borrow_mut().get_mut(owner_id) {
            owner.cleanups.push(Box::new(f));
        }
    });
}
