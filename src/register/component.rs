use super::event::{EventRegister, ListenerHandle};
use crate::error::Cause;
use crate::state::{Interest, PartialState, State};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Something that can be asked to redraw itself from the latest state.
///
/// Host UI frameworks implement this for whatever schedules a re-render of
/// their component. Plain closures work too.
pub trait Rerender: Send + Sync {
    fn rerender(&self);
}

impl<F> Rerender for F
where
    F: Fn() + Send + Sync,
{
    fn rerender(&self) {
        self()
    }
}

/// Gate deciding whether a component actually re-renders for a change.
pub type ShouldUpdate<V> = Arc<dyn Fn(&State<V>, &PartialState<V>) -> bool + Send + Sync>;

/// Opaque identity of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Binds UI components to change notifications.
///
/// Each component is wrapped in a listener that calls its [`Rerender`]
/// capability. The register keeps the component's unsubscribe handle in a
/// side map keyed by [`ComponentId`], so the component itself carries no
/// bookkeeping.
pub struct ComponentRegister<V> {
    events: EventRegister<V>,
    handles: Mutex<HashMap<ComponentId, ListenerHandle<V>>>,
}

impl<V: 'static> ComponentRegister<V> {
    pub fn new() -> Self {
        Self {
            events: EventRegister::new(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Wrap `component` in a listener for `interest` and return its id.
    ///
    /// With `should_update`, the component is only re-rendered when the gate
    /// returns `true` for the new and previous state.
    pub fn register<C>(
        &self,
        component: C,
        interest: Interest,
        should_update: Option<ShouldUpdate<V>>,
    ) -> ComponentId
    where
        C: Rerender + 'static,
    {
        let id = ComponentId::next();
        let handle = self.events.add(interest, move |current, prev| {
            if should_update
                .as_ref()
                .map_or(true, |should_update| should_update(current, prev))
            {
                component.rerender();
            }
        });
        self.handles.lock().insert(id, handle);
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: ComponentId) -> bool {
        let handle = self.handles.lock().remove(&id);
        handle.is_some_and(|handle| handle.unsubscribe())
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.handles.lock().contains_key(&id)
    }

    /// Re-render components interested in the `changed` fields.
    pub fn update(
        &self,
        changed: &PartialState<V>,
        current: &State<V>,
        prev: &PartialState<V>,
    ) -> Result<usize, Cause> {
        self.events.trigger_updated(changed, current, prev)
    }

    /// Re-render components reached by `target`. A gate sees the current state twice.
    pub fn refresh(&self, target: &Interest, current: &State<V>) -> Result<usize, Cause> {
        self.events.trigger_refresh(target, current)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl<V: 'static> Default for ComponentRegister<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct Widget {
        renders: Arc<AtomicUsize>,
    }

    impl Rerender for Widget {
        fn rerender(&self) {
            self.renders.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn widget() -> Widget {
        Widget::default()
    }

    fn state(pairs: &[(&str, Value)]) -> State {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn rerenders_on_matching_change() {
        let register = ComponentRegister::new();
        let counter = widget();
        let label = widget();
        register.register(counter.clone(), Interest::from("count"), None);
        register.register(label.clone(), Interest::from("name"), None);

        let current = state(&[("count", json!(1)), ("name", json!("x"))]);
        let changed = state(&[("count", json!(1))]);
        register.update(&changed, &current, &State::new()).unwrap();

        assert_eq!(counter.renders.load(Ordering::SeqCst), 1);
        assert_eq!(label.renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unregister_stops_rerenders() {
        let register = ComponentRegister::new();
        let counter = widget();
        let id = register.register(counter.clone(), Interest::All, None);

        assert!(register.contains(id));
        assert!(register.unregister(id));
        assert!(!register.unregister(id));
        assert!(register.is_empty());

        let current = state(&[("count", json!(1))]);
        register.refresh(&Interest::All, &current).unwrap();
        assert_eq!(counter.renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn should_update_gates_rerender() {
        let register: ComponentRegister<Value> = ComponentRegister::new();
        let renders = Arc::new(AtomicUsize::new(0));
        let renders_clone = renders.clone();
        register.register(
            move || {
                renders_clone.fetch_add(1, Ordering::SeqCst);
            },
            Interest::All,
            Some(Arc::new(|current: &State, _: &State| {
                current["count"].as_i64().is_some_and(|count| count % 2 == 0)
            })),
        );

        for count in 1..=4 {
            let current = state(&[("count", json!(count))]);
            register.update(&current, &current, &State::new()).unwrap();
        }

        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ids_are_unique() {
        let register: ComponentRegister<Value> = ComponentRegister::new();
        let first = register.register(|| {}, Interest::All, None);
        let second = register.register(|| {}, Interest::All, None);

        assert_ne!(first, second);
        assert_eq!(register.len(), 2);
    }
}
