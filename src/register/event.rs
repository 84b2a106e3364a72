use crate::error::Cause;
use crate::state::{Interest, PartialState, State};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Listener callback, receiving the current state and the previous values.
pub type Callback<V> = Arc<dyn Fn(&State<V>, &PartialState<V>) + Send + Sync>;

struct Registration<V> {
    interest: Interest,
    callback: Callback<V>,
}

type Registrations<V> = Mutex<IndexMap<u64, Registration<V>>>;

/// Fans changes out to the listeners interested in them.
///
/// Listeners are called in registration order. A dispatch pass takes a
/// snapshot of the matching listeners up front and re-checks each one is
/// still registered right before calling it, so:
///
/// - a listener removed earlier in the same pass is skipped,
/// - a listener added during a pass first hears about the next one,
/// - nobody is called twice.
///
/// No lock is held while a callback runs, which lets callbacks subscribe,
/// unsubscribe or trigger further updates.
pub struct EventRegister<V> {
    registrations: Arc<Registrations<V>>,
    next_id: AtomicU64,
}

impl<V> EventRegister<V> {
    /// An empty register.
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(Mutex::new(IndexMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `callback` for changes touching `interest`.
    pub fn add<F>(&self, interest: impl Into<Interest>, callback: F) -> ListenerHandle<V>
    where
        F: Fn(&State<V>, &PartialState<V>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registrations.lock().insert(
            id,
            Registration {
                interest: interest.into(),
                callback: Arc::new(callback),
            },
        );

        ListenerHandle {
            id,
            registrations: Arc::downgrade(&self.registrations),
        }
    }

    /// Notify listeners whose interest intersects `changed`.
    ///
    /// Returns how many listeners were called.
    pub fn trigger_updated(
        &self,
        changed: &PartialState<V>,
        current: &State<V>,
        prev: &PartialState<V>,
    ) -> Result<usize, Cause> {
        self.dispatch(|interest| interest.matches(changed), current, prev)
    }

    /// Notify listeners reached by `target` without any value having changed.
    ///
    /// Listeners receive the current state as both arguments.
    pub fn trigger_refresh(&self, target: &Interest, current: &State<V>) -> Result<usize, Cause> {
        self.dispatch(|interest| interest.is_refreshed_by(target), current, current)
    }

    /// Drop every registration. Outstanding handles become no-ops.
    pub fn remove_all(&self) {
        let drained = std::mem::take(&mut *self.registrations.lock());
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    fn dispatch(
        &self,
        wants: impl Fn(&Interest) -> bool,
        current: &State<V>,
        prev: &PartialState<V>,
    ) -> Result<usize, Cause> {
        let pending: Vec<(u64, Callback<V>)> = self
            .registrations
            .lock()
            .iter()
            .filter(|(_, registration)| wants(&registration.interest))
            .map(|(id, registration)| (*id, Arc::clone(&registration.callback)))
            .collect();

        let mut notified = 0;
        for (id, callback) in pending {
            if !self.registrations.lock().contains_key(&id) {
                continue;
            }
            panic::catch_unwind(AssertUnwindSafe(|| callback(current, prev)))
                .map_err(|payload| Cause::ListenerPanicked(panic_message(payload.as_ref())))?;
            notified += 1;
        }
        Ok(notified)
    }
}

impl<V> Default for EventRegister<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Removes one listener registration.
///
/// Handles are cheap to clone; every clone refers to the same registration.
/// Dropping a handle leaves the listener registered.
pub struct ListenerHandle<V> {
    id: u64,
    registrations: Weak<Registrations<V>>,
}

impl<V> ListenerHandle<V> {
    /// Remove the registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(registrations) = self.registrations.upgrade() else {
            return false;
        };
        let removed = registrations.lock().shift_remove(&self.id);
        removed.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.registrations
            .upgrade()
            .is_some_and(|registrations| registrations.lock().contains_key(&self.id))
    }
}

impl<V> Clone for ListenerHandle<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            registrations: Weak::clone(&self.registrations),
        }
    }
}

impl<V> fmt::Debug for ListenerHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}
