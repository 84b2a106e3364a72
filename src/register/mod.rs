//! Subscriber registries.
//!
//! Listeners and UI components subscribe to a subset of a state's fields (or
//! to all of them) and are called back when those fields change or when a
//! refresh targets them.

mod component;
mod event;

pub use component::{ComponentId, ComponentRegister, Rerender, ShouldUpdate};
pub use event::{Callback, EventRegister, ListenerHandle};
