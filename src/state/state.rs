use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// An ordered mapping of named fields to values.
///
/// A `State` is supplied once when a [`SharedState`](crate::SharedState) is
/// created and its set of fields never changes afterwards; only the values
/// do. The same type carries partial updates and the changed fields an
/// update produced (see [`PartialState`]).
///
/// ```
/// use serde_json::json;
/// use shared_state::State;
///
/// let state: State = [("count", json!(0)), ("name", json!("x"))]
///     .into_iter()
///     .collect();
///
/// assert_eq!(state["count"], json!(0));
/// assert_eq!(state.keys().collect::<Vec<_>>(), ["count", "name"]);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State<V = serde_json::Value> {
    fields: IndexMap<String, V>,
}

/// A subset of a state's fields, used for updates and change sets.
pub type PartialState<V = serde_json::Value> = State<V>;

impl<V> State<V> {
    /// An empty state, usually the start of a partial update.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// The value of `key`, if the state has that field.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.fields.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.fields.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert a field, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.fields.insert(key.into(), value)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<V> Default for State<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for State<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

/// Pretty JSON, two-space indented.
impl<V: Serialize> fmt::Display for State<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl<V> Index<&str> for State<V> {
    type Output = V;

    fn index(&self, key: &str) -> &V {
        &self.fields[key]
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for State<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V> From<IndexMap<String, V>> for State<V> {
    fn from(fields: IndexMap<String, V>) -> Self {
        Self { fields }
    }
}

impl<V> IntoIterator for State<V> {
    type Item = (String, V);
    type IntoIter = indexmap::map::IntoIter<String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Which fields a subscriber cares about, or which fields a refresh targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Interest {
    /// Every change and every refresh.
    #[default]
    All,
    Keys(IndexSet<String>),
}

impl Interest {
    pub fn keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// An empty key set. As a refresh target it reaches wildcard subscribers only.
    pub fn none() -> Self {
        Self::Keys(IndexSet::new())
    }

    /// Whether a change to the fields in `changed` concerns this interest.
    pub fn matches<V>(&self, changed: &State<V>) -> bool {
        match self {
            Self::All => true,
            Self::Keys(keys) => changed.keys().any(|key| keys.contains(key)),
        }
    }

    /// Whether a refresh aimed at `target` reaches this interest.
    pub fn is_refreshed_by(&self, target: &Interest) -> bool {
        match (self, target) {
            (Self::All, _) | (_, Self::All) => true,
            (Self::Keys(mine), Self::Keys(theirs)) => theirs.iter().any(|key| mine.contains(key)),
        }
    }
}

impl From<&str> for Interest {
    fn from(key: &str) -> Self {
        Self::keys([key])
    }
}

impl From<String> for Interest {
    fn from(key: String) -> Self {
        Self::keys([key])
    }
}

impl<const N: usize> From<[&str; N]> for Interest {
    fn from(keys: [&str; N]) -> Self {
        Self::keys(keys)
    }
}

impl From<&[&str]> for Interest {
    fn from(keys: &[&str]) -> Self {
        Self::keys(keys.iter().copied())
    }
}

impl From<Vec<&str>> for Interest {
    fn from(keys: Vec<&str>) -> Self {
        Self::keys(keys)
    }
}

impl From<Vec<String>> for Interest {
    fn from(keys: Vec<String>) -> Self {
        Self::keys(keys)
    }
}
