//! The shared state facade and its persistence collaborator.
//!
//! [`SharedState`] ties a state cache to listener and component registries
//! and optionally mirrors every change into a [`StateStore`].

mod shared;
mod storage;

pub use shared::{Options, SharedState};
pub use storage::StateStore;
