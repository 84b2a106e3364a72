use super::storage::{Persistence, StateStore};
use crate::error::{Cause, StateError};
use crate::register::{ComponentId, ComponentRegister, EventRegister, ListenerHandle, Rerender, ShouldUpdate};
use crate::state::{value_eq, Comparator, Interest, PartialState, State, StateCache};
use futures::task::{Spawn, SpawnExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Settings for a [`SharedState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Attached as the `label` field to every log event this state emits.
    pub debug_label: Option<String>,
}

struct Inner<V: Send + Sync + 'static> {
    label: Option<String>,
    equals: Mutex<Comparator<V>>,
    cache: Mutex<Option<StateCache<V>>>,
    listeners: EventRegister<V>,
    components: ComponentRegister<V>,
    persistence: Mutex<Option<Persistence<V>>>,
}

/// State shared between many UI components.
///
/// A `SharedState` is a handle: clones refer to the same state, so one is
/// created at the root of the application and handed down to whatever needs
/// it. Subscribers declare which fields they care about and are only called
/// when one of those fields changes, or when a refresh targets them.
///
/// Reads hand out snapshots. There is no way to reach the live state except
/// through [`set_state`](Self::set_state), [`set_prop`](Self::set_prop) and
/// [`reset`](Self::reset).
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shared_state::{SharedState, State};
/// use std::sync::{Arc, Mutex};
///
/// let counter = SharedState::new(
///     [("count", json!(0)), ("name", json!("x"))].into_iter().collect(),
/// );
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let seen_clone = seen.clone();
/// counter
///     .add_listener("count", move |current: &State, prev: &State| {
///         seen_clone.lock().unwrap().push((current["count"].clone(), prev["count"].clone()));
///     })
///     .unwrap();
///
/// let changed = counter.set_prop("count", json!(1)).unwrap();
///
/// assert_eq!(changed.unwrap()["count"], json!(1));
/// assert_eq!(*seen.lock().unwrap(), vec![(json!(1), json!(0))]);
/// ```
pub struct SharedState<V = serde_json::Value>
where
    V: Send + Sync + 'static,
{
    inner: Arc<Inner<V>>,
}

impl<V> SharedState<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an initialized state holding `default`.
    pub fn new(default: State<V>) -> Self {
        Self::with_options(Some(default), Options::default())
    }

    /// Create a state that must be [`initialize`](Self::initialize)d before use.
    pub fn uninitialized(options: Options) -> Self {
        Self::with_options(None, options)
    }

    /// Create a state from optional defaults and [`Options`].
    pub fn with_options(default: Option<State<V>>, options: Options) -> Self {
        let equals = value_eq();
        let cache = default.map(|default| StateCache::new(default, Arc::clone(&equals)));
        let shared = Self {
            inner: Arc::new(Inner {
                label: options.debug_label,
                equals: Mutex::new(equals),
                cache: Mutex::new(cache),
                listeners: EventRegister::new(),
                components: ComponentRegister::new(),
                persistence: Mutex::new(None),
            }),
        };
        debug!(
            label = shared.label(),
            initialized = shared.is_initialized(),
            "shared state created"
        );
        shared
    }

    /// Replace the rule deciding whether a written value differs from the
    /// stored one. Defaults to `PartialEq`.
    pub fn with_comparator<F>(self, equals: F) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        let equals: Comparator<V> = Arc::new(equals);
        if let Some(cache) = self.inner.cache.lock().as_mut() {
            cache.set_comparator(Arc::clone(&equals));
        }
        *self.inner.equals.lock() = equals;
        self
    }

    /// Whether the state has its fields yet.
    pub fn is_initialized(&self) -> bool {
        self.inner.cache.lock().is_some()
    }

    /// Give the state its fields.
    ///
    /// The first call re-renders components registered for every field.
    /// Later calls behave like `reset(Some(state))`.
    pub fn initialize(&self, state: State<V>) -> Result<(), StateError> {
        let mut cache = self.inner.cache.lock();
        if cache.is_some() {
            drop(cache);
            return self.reset(Some(state)).map(drop);
        }

        let current = state.clone();
        *cache = Some(StateCache::new(state, Arc::clone(&self.inner.equals.lock())));
        drop(cache);

        debug!(label = self.label(), "state initialized");
        self.inner
            .components
            .refresh(&Interest::none(), &current)
            .map_err(StateError::Refresh)?;
        Ok(())
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> Result<State<V>, StateError> {
        self.read(State::clone)
    }

    /// The value each changed field held right before its latest change.
    pub fn prev_state(&self) -> Result<PartialState<V>, StateError> {
        self.with_cache(|cache| cache.prev().clone())
    }

    /// Borrow the current state.
    ///
    /// `f` runs with the state locked and must not call back into this
    /// `SharedState`.
    pub fn read<R>(&self, f: impl FnOnce(&State<V>) -> R) -> Result<R, StateError> {
        self.with_cache(|cache| f(cache.current()))
    }

    pub fn prop(&self, key: &str) -> Result<Option<V>, StateError> {
        self.read(|state| state.get(key).cloned())
    }

    /// Write the given fields.
    ///
    /// Returns the fields that actually changed, or `None` if every value
    /// was already current, in which case nobody is notified.
    pub fn set_state(&self, partial: PartialState<V>) -> Result<Option<PartialState<V>>, StateError> {
        let changed = self
            .with_cache(|cache| cache.update(partial))?
            .map_err(StateError::Update)?;
        let Some(changed) = changed else {
            trace!(label = self.label(), "update changed nothing");
            return Ok(None);
        };

        self.notify(&changed, StateError::Update)?;
        let keys: Vec<&str> = changed.keys().collect();
        debug!(label = self.label(), changed = ?keys, "state updated");

        if let Some(persistence) = self.persistence() {
            if persistence.store.save_automatically() {
                self.spawn_save(&persistence)?;
            }
        }

        Ok(Some(changed))
    }

    /// Write a single field. Same as `set_state` with one entry.
    pub fn set_prop(&self, key: impl Into<String>, value: V) -> Result<Option<PartialState<V>>, StateError> {
        let key: String = key.into();
        self.set_state(State::from_iter([(key, value)]))
    }

    /// Notify subscribers reached by `target` without changing anything.
    ///
    /// Listeners receive the current state as both arguments.
    pub fn refresh(&self, target: impl Into<Interest>) -> Result<(), StateError> {
        let target = target.into();
        let current = self.state()?;

        self.inner
            .components
            .refresh(&target, &current)
            .map_err(StateError::Refresh)?;
        self.inner
            .listeners
            .trigger_refresh(&target, &current)
            .map_err(StateError::Refresh)?;

        debug!(label = self.label(), target = ?target, "state refreshed");
        Ok(())
    }

    /// Restore `data`, or the original default when `None`.
    ///
    /// With a store attached, `data` is saved, while returning to the
    /// default deletes whatever was stored.
    pub fn reset(&self, data: Option<State<V>>) -> Result<Option<PartialState<V>>, StateError> {
        let to_default = data.is_none();
        let changed = self
            .with_cache(|cache| cache.reset(data))?
            .map_err(StateError::Reset)?;

        if let Some(changed) = &changed {
            self.notify(changed, StateError::Reset)?;
        }

        if let Some(persistence) = self.persistence() {
            if to_default {
                self.spawn_delete(&persistence);
            } else {
                self.spawn_save(&persistence)?;
            }
        }

        debug!(label = self.label(), to_default, "state reset");
        Ok(changed)
    }

    /// Call `callback` whenever a field in `interest` changes or is refreshed.
    pub fn add_listener<F>(&self, interest: impl Into<Interest>, callback: F) -> Result<ListenerHandle<V>, StateError>
    where
        F: Fn(&State<V>, &PartialState<V>) + Send + Sync + 'static,
    {
        self.ensure_initialized()?;
        Ok(self.inner.listeners.add(interest, callback))
    }

    /// Drop every listener. Registered components are kept.
    pub fn remove_all_listeners(&self) -> Result<(), StateError> {
        self.ensure_initialized()?;
        self.inner.listeners.remove_all();
        Ok(())
    }

    /// Re-render `component` whenever a field in `interest` changes.
    ///
    /// Components may be registered before the state is initialized.
    pub fn register<C>(&self, component: C, interest: impl Into<Interest>) -> ComponentId
    where
        C: Rerender + 'static,
    {
        self.register_component(component, interest.into(), None)
    }

    /// Like [`register`](Self::register), but only re-render when
    /// `should_update` agrees.
    pub fn register_with<C, F>(&self, component: C, interest: impl Into<Interest>, should_update: F) -> ComponentId
    where
        C: Rerender + 'static,
        F: Fn(&State<V>, &PartialState<V>) -> bool + Send + Sync + 'static,
    {
        self.register_component(component, interest.into(), Some(Arc::new(should_update)))
    }

    /// Stop re-rendering the component. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ComponentId) -> bool {
        let removed = self.inner.components.unregister(id);
        debug!(label = self.label(), component = ?id, removed, "component unregistered");
        removed
    }

    /// Attach a persistence store and load whatever it holds.
    ///
    /// Background saves and deletes are spawned on `spawner`. An already
    /// attached store is kept and `store` is dropped.
    ///
    /// Returns `true` if a saved state was restored. Failures are logged
    /// rather than returned and `false` comes back. When the store itself
    /// fails, the in-memory state is reset (when there is one). A saved
    /// state whose fields don't match is left in the store, and the
    /// in-memory state is kept.
    pub async fn initialize_storage<S, Sp>(&self, store: S, spawner: Sp) -> bool
    where
        S: StateStore<V> + 'static,
        Sp: Spawn + Send + Sync + 'static,
    {
        let persistence = self
            .inner
            .persistence
            .lock()
            .get_or_insert_with(|| Persistence {
                store: Arc::new(store),
                spawner: Arc::new(spawner),
            })
            .clone();
        debug!(label = self.label(), store = persistence.store.store_name(), "storage attached");

        let retrieved = match persistence.store.retrieve().await {
            Ok(Some(retrieved)) => retrieved,
            Ok(None) => return false,
            Err(err) => {
                self.log_storage_error(&persistence, &err.into(), "failed to load state from storage");
                if self.is_initialized() {
                    if let Err(err) = self.reset(None) {
                        warn!(label = self.label(), error = %err, "reset after storage failure failed");
                    }
                }
                return false;
            }
        };

        // A snapshot with other fields stays in the store untouched
        match self.initialize(retrieved) {
            Ok(()) => {
                debug!(label = self.label(), store = persistence.store.store_name(), "state restored");
                true
            }
            Err(err) => {
                self.log_storage_error(&persistence, &err, "stored state was not restored");
                false
            }
        }
    }

    /// Save the current state now. Returns `false` when no store is attached.
    pub async fn save(&self) -> Result<bool, StateError> {
        let Some(persistence) = self.persistence() else {
            return Ok(false);
        };
        let snapshot = self.state()?;
        debug!(label = self.label(), store = persistence.store.store_name(), "saving state");
        Ok(persistence.store.save(snapshot).await?)
    }

    fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    fn log_storage_error(&self, persistence: &Persistence<V>, err: &StateError, message: &str) {
        let cause = std::error::Error::source(err).map(|source| source.to_string());
        error!(
            label = self.label(),
            store = persistence.store.store_name(),
            code = err.code(),
            severity = ?err.severity(),
            error = %err,
            cause = ?cause,
            "{}",
            message
        );
    }

    fn with_cache<R>(&self, f: impl FnOnce(&mut StateCache<V>) -> R) -> Result<R, StateError> {
        self.inner
            .cache
            .lock()
            .as_mut()
            .map(f)
            .ok_or(StateError::Uninitialized)
    }

    fn ensure_initialized(&self) -> Result<(), StateError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StateError::Uninitialized)
        }
    }

    fn persistence(&self) -> Option<Persistence<V>> {
        self.inner.persistence.lock().clone()
    }

    fn register_component<C>(&self, component: C, interest: Interest, should_update: Option<ShouldUpdate<V>>) -> ComponentId
    where
        C: Rerender + 'static,
    {
        let id = self.inner.components.register(component, interest.clone(), should_update);
        debug!(label = self.label(), component = ?id, interest = ?interest, "component registered");
        id
    }

    /// Components first, then listeners, each seeing the same snapshot.
    fn notify(&self, changed: &PartialState<V>, wrap: fn(Cause) -> StateError) -> Result<(), StateError> {
        let (current, prev) = self.with_cache(|cache| (cache.current().clone(), cache.prev().clone()))?;

        self.inner
            .components
            .update(changed, &current, &prev)
            .map_err(wrap)?;
        self.inner
            .listeners
            .trigger_updated(changed, &current, &prev)
            .map_err(wrap)?;
        Ok(())
    }

    fn spawn_save(&self, persistence: &Persistence<V>) -> Result<(), StateError> {
        let snapshot = self.state()?;
        let store = Arc::clone(&persistence.store);
        let label = self.inner.label.clone();

        self.spawn(persistence, async move {
            match store.save(snapshot).await {
                Ok(true) => debug!(label = label.as_deref(), store = store.store_name(), "state saved"),
                Ok(false) => warn!(label = label.as_deref(), store = store.store_name(), "store did not save state"),
                Err(err) => warn!(
                    label = label.as_deref(),
                    store = store.store_name(),
                    error = %err,
                    "failed to save state"
                ),
            }
        });
        Ok(())
    }

    fn spawn_delete(&self, persistence: &Persistence<V>) {
        let store = Arc::clone(&persistence.store);
        let label = self.inner.label.clone();

        self.spawn(persistence, async move {
            match store.delete().await {
                Ok(deleted) => debug!(label = label.as_deref(), store = store.store_name(), deleted, "stored state deleted"),
                Err(err) => warn!(
                    label = label.as_deref(),
                    store = store.store_name(),
                    error = %err,
                    "failed to delete stored state"
                ),
            }
        });
    }

    fn spawn(&self, persistence: &Persistence<V>, task: impl Future<Output = ()> + Send + 'static) {
        if let Err(err) = persistence.spawner.spawn(task) {
            warn!(label = self.label(), error = %err, "failed to spawn persistence task");
        }
    }
}

impl<V: Send + Sync + 'static> Clone for SharedState<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> fmt::Debug for SharedState<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("label", &self.inner.label)
            .field("initialized", &self.inner.cache.lock().is_some())
            .field("listeners", &self.inner.listeners.len())
            .field("components", &self.inner.components.len())
            .finish()
    }
}

/// The current state as pretty JSON, or `null` before initialization.
impl<V> fmt::Display for SharedState<V>
where
    V: Serialize + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.cache.lock().as_ref() {
            Some(cache) => fmt::Display::fmt(cache.current(), f),
            None => f.write_str("null"),
        }
    }
}
