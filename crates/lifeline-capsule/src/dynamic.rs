//! Dynamically scoped variables.
//!
//! A [`DynamicVariable`] is a per-thread cell with stack discipline:
//! [`DynamicVariable::with_value`] binds a value for the duration of a block
//! and restores the previous binding on every exit path, including unwinding.
//!
//! Bindings are inherited by threads spawned through [`spawn`] (or by running
//! code inside [`InheritedBindings::scope`]). The child starts from a snapshot
//! of the parent's bindings taken at spawn time; after that the two threads
//! diverge.
//!
//! A binding never outlives its variable: each one remembers its owner
//! weakly, and bindings of dropped variables are pruned whenever a thread
//! binds a value or takes a snapshot.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

type Binding = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Slot {
    owner: Weak<()>,
    value: Binding,
}

impl Slot {
    fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static BINDINGS: RefCell<HashMap<u64, Slot>> = RefCell::new(HashMap::new());
}

fn read_binding(id: u64) -> Option<Binding> {
    BINDINGS
        .try_with(|bindings| bindings.borrow().get(&id).map(|slot| Arc::clone(&slot.value)))
        .ok()
        .flatten()
}

fn write_binding(id: u64, slot: Option<Slot>) -> Option<Slot> {
    let (previous, _dead) = BINDINGS
        .try_with(|bindings| {
            let mut bindings = bindings.borrow_mut();
            match slot {
                Some(slot) => {
                    let dead = prune(&mut bindings);
                    (bindings.insert(id, slot), dead)
                },
                None => (bindings.remove(&id), Vec::new()),
            }
        })
        .unwrap_or_default();
    previous
}

/// Remove bindings whose variable is gone. The caller drops them once the
/// map is no longer borrowed.
fn prune(bindings: &mut HashMap<u64, Slot>) -> Vec<Slot> {
    let dead: Vec<u64> = bindings
        .iter()
        .filter(|(_, slot)| !slot.is_live())
        .map(|(id, _)| *id)
        .collect();
    dead.iter().filter_map(|id| bindings.remove(id)).collect()
}

/// A thread-inheritable variable with stack-disciplined bindings.
///
/// Threads that never bound the variable observe its initial value.
pub struct DynamicVariable<T> {
    id: u64,
    owner: Arc<()>,
    initial: T,
}

impl<T> DynamicVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a variable whose unbound value is `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            id: NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed),
            owner: Arc::new(()),
            initial,
        }
    }

    /// The value bound on the calling thread, or the initial value.
    #[must_use]
    pub fn value(&self) -> T {
        read_binding(self.id)
            .and_then(|binding| binding.downcast_ref::<T>().cloned())
            .unwrap_or_else(|| self.initial.clone())
    }

    /// Bind `value` while `block` runs, then restore the previous binding.
    ///
    /// The previous binding is restored when the block returns and also when
    /// it unwinds.
    pub fn with_value<R>(&self, value: T, block: impl FnOnce() -> R) -> R {
        let previous = write_binding(self.id, Some(self.slot(value)));
        let _restore = RestoreGuard {
            id: self.id,
            previous,
            _not_send: PhantomData,
        };
        block()
    }

    /// Overwrite the binding on the calling thread.
    ///
    /// This bypasses the stack discipline of [`with_value`](Self::with_value):
    /// an enclosing `with_value` still restores its own previous binding when
    /// it exits, which discards this assignment. Prefer `with_value`.
    pub fn set_value(&self, value: T) {
        write_binding(self.id, Some(self.slot(value)));
    }

    fn slot(&self, value: T) -> Slot {
        Slot {
            owner: Arc::downgrade(&self.owner),
            value: Arc::new(value),
        }
    }
}

impl<T> Drop for DynamicVariable<T> {
    fn drop(&mut self) {
        write_binding(self.id, None);
    }
}

impl<T: fmt::Debug> fmt::Debug for DynamicVariable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicVariable")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// Restores a binding when dropped. Pinned to the thread that created it.
struct RestoreGuard {
    id: u64,
    previous: Option<Slot>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        write_binding(self.id, self.previous.take());
    }
}

/// A snapshot of every dynamic binding visible on one thread.
#[derive(Clone, Default)]
pub struct InheritedBindings {
    bindings: HashMap<u64, Slot>,
}

impl InheritedBindings {
    /// Snapshot the live bindings of the calling thread.
    #[must_use]
    pub fn capture() -> Self {
        let (bindings, _dead) = BINDINGS
            .try_with(|bindings| {
                let mut bindings = bindings.borrow_mut();
                let dead = prune(&mut bindings);
                (bindings.clone(), dead)
            })
            .unwrap_or_default();
        Self { bindings }
    }

    /// Number of bound variables in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the snapshot holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Install the snapshot on the calling thread while `block` runs.
    ///
    /// The thread's own bindings are restored afterwards, on every exit path.
    pub fn scope<R>(self, block: impl FnOnce() -> R) -> R {
        let previous = BINDINGS
            .try_with(|bindings| std::mem::replace(&mut *bindings.borrow_mut(), self.bindings))
            .unwrap_or_default();
        let _restore = SnapshotGuard {
            previous: Some(previous),
            _not_send: PhantomData,
        };
        block()
    }
}

impl fmt::Debug for InheritedBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InheritedBindings")
            .field("bound_variables", &self.bindings.len())
            .finish()
    }
}

struct SnapshotGuard {
    previous: Option<HashMap<u64, Slot>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let _ = BINDINGS.try_with(|bindings| *bindings.borrow_mut() = previous);
        }
    }
}

/// Spawn a thread that inherits the caller's dynamic bindings.
pub fn spawn<F, R>(block: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let inherited = InheritedBindings::capture();
    thread::spawn(move || inherited.scope(block))
}

/// Spawn a configured thread that inherits the caller's dynamic bindings.
///
/// # Errors
///
/// Returns an error if the operating system refuses to create the thread.
pub fn spawn_with<F, R>(builder: thread::Builder, block: F) -> std::io::Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let inherited = InheritedBindings::capture();
    builder.spawn(move || inherited.scope(block))
}
