//! State values and change tracking.
//!
//! This module provides the field map held by a shared state, the key sets
//! subscribers declare interest in, and the cache that diffs updates per field.

mod cache;
mod state;

pub use cache::{value_eq, Comparator, StateCache};
pub use state::{Interest, PartialState, State};
