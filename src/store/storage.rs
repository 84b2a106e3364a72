use crate::error::StorageError;
use crate::state::State;
use async_trait::async_trait;
use futures::task::Spawn;
use std::sync::Arc;

/// A persistence backend for a shared state.
///
/// Backends live in the host application; this crate only drives them.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use parking_lot::Mutex;
/// use shared_state::{State, StateStore, StorageError};
///
/// struct MemoryStore {
///     saved: Mutex<Option<State>>,
/// }
///
/// #[async_trait]
/// impl StateStore for MemoryStore {
///     fn store_name(&self) -> &str {
///         "memory"
///     }
///
///     async fn retrieve(&self) -> Result<Option<State>, StorageError> {
///         Ok(self.saved.lock().clone())
///     }
///
///     async fn save(&self, state: State) -> Result<bool, StorageError> {
///         *self.saved.lock() = Some(state);
///         Ok(true)
///     }
///
///     async fn delete(&self) -> Result<bool, StorageError> {
///         Ok(self.saved.lock().take().is_some())
///     }
/// }
/// ```
#[async_trait]
pub trait StateStore<V = serde_json::Value>: Send + Sync
where
    V: Send + Sync + 'static,
{
    fn store_name(&self) -> &str;

    /// Save after every change that `set_state` applies.
    fn save_automatically(&self) -> bool {
        false
    }

    /// Load the last saved snapshot, or `None` if nothing is stored yet.
    async fn retrieve(&self) -> Result<Option<State<V>>, StorageError>;

    async fn save(&self, state: State<V>) -> Result<bool, StorageError>;

    async fn delete(&self) -> Result<bool, StorageError>;
}

/// An attached store together with the executor its background work runs on.
pub(crate) struct Persistence<V: Send + Sync + 'static> {
    pub(crate) store: Arc<dyn StateStore<V>>,
    pub(crate) spawner: Arc<dyn Spawn + Send + Sync>,
}

impl<V: Send + Sync + 'static> Clone for Persistence<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            spawner: Arc::clone(&self.spawner),
        }
    }
}
