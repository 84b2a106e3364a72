use super::state::{PartialState, State};
use crate::error::Cause;
use std::sync::Arc;

/// Decides whether two values of a field are the same.
///
/// Returning `true` makes the write a no-op for that field.
pub type Comparator<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// The default comparator: plain value equality.
pub fn value_eq<V: PartialEq>() -> Comparator<V> {
    Arc::new(|a: &V, b: &V| a == b)
}

/// Holds the live state alongside its pristine default and the previous
/// value of every field that has changed.
///
/// `prev` only ever gains entries; a field appears there once it has changed
/// at least once and always holds the value it had right before its latest
/// change.
///
/// Cloning a `State` is the copy boundary: plain data inside a value is
/// duplicated, while shared handles such as `Arc<T>` keep pointing at the
/// same object.
pub struct StateCache<V> {
    default: State<V>,
    current: State<V>,
    prev: PartialState<V>,
    equals: Comparator<V>,
}

impl<V> StateCache<V> {
    /// The live state.
    pub fn current(&self) -> &State<V> {
        &self.current
    }

    /// The value each changed field held right before its latest change.
    pub fn prev(&self) -> &PartialState<V> {
        &self.prev
    }

    /// The state this cache was created with.
    pub fn default_state(&self) -> &State<V> {
        &self.default
    }

    pub(crate) fn set_comparator(&mut self, equals: Comparator<V>) {
        self.equals = equals;
    }
}

impl<V: Clone> StateCache<V> {
    /// Start from a copy of `default`, with nothing changed yet.
    pub fn new(default: State<V>, equals: Comparator<V>) -> Self {
        Self {
            current: default.clone(),
            default,
            prev: State::new(),
            equals,
        }
    }

    /// Apply a partial update.
    ///
    /// Returns the fields whose value actually changed, or `None` when every
    /// written value was already current. Fails without touching the state
    /// if `partial` names a field this state doesn't have.
    pub fn update(&mut self, partial: PartialState<V>) -> Result<Option<PartialState<V>>, Cause> {
        if let Some(key) = partial.keys().find(|key| !self.current.contains_key(key)) {
            return Err(Cause::UnknownKey(key.to_owned()));
        }

        let mut changed = State::new();
        for (key, value) in partial {
            self.update_prop(key, value, &mut changed);
        }

        Ok((!changed.is_empty()).then_some(changed))
    }

    /// Replace every field with `data`, or with a fresh copy of the default.
    ///
    /// Diffs field by field like [`update`](Self::update), so `prev` and the
    /// returned change set stay accurate.
    pub fn reset(&mut self, data: Option<State<V>>) -> Result<Option<PartialState<V>>, Cause> {
        let data = data.unwrap_or_else(|| self.default.clone());

        if let Some(key) = self.current.keys().find(|key| !data.contains_key(key)) {
            return Err(Cause::MissingKey(key.to_owned()));
        }
        if let Some(key) = data.keys().find(|key| !self.current.contains_key(key)) {
            return Err(Cause::UnknownKey(key.to_owned()));
        }

        let mut changed = State::new();
        for (key, value) in data {
            self.update_prop(key, value, &mut changed);
        }

        Ok((!changed.is_empty()).then_some(changed))
    }

    fn update_prop(&mut self, key: String, value: V, changed: &mut PartialState<V>) {
        let Some(current) = self.current.get_mut(&key) else {
            return;
        };
        if (self.equals)(current, &value) {
            return;
        }

        let old = std::mem::replace(current, value.clone());
        self.prev.insert(key.clone(), old);
        changed.insert(key, value);
    }
}
