//! # Shared State
//!
//! A small shared-state container for UI components.
//!
//! Many components read one mutable state object and subscribe to the fields
//! they care about. Updates are diffed field by field, and only subscribers
//! whose fields actually changed are called back.
//!
//! ## State (change tracking)
//!
//! - `State<V>` - Ordered map of named fields, fixed at creation
//! - `StateCache<V>` - Current, default and previous values with per-field diffing
//! - `Interest` - The fields a subscriber cares about, or all of them
//!
//! ## Registers (notification fan-out)
//!
//! - `EventRegister<V>` - Plain callbacks receiving current and previous state
//! - `ComponentRegister<V>` - UI components behind a `Rerender` capability
//!
//! ## Store (facade)
//!
//! - `SharedState<V>` - Reads, updates, refreshes, resets and subscriptions
//! - `StateStore<V>` - Optional persistence collaborator, saved in the background

pub mod error;
pub mod register;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use error::{Cause, Severity, StateError, StorageError};
pub use register::{ComponentId, ListenerHandle, Rerender};
pub use state::{Interest, PartialState, State};
pub use store::{Options, SharedState, StateStore};
