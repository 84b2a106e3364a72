//! Two screens sharing one counter, with the counter saved as JSON

use async_trait::async_trait;
use futures::executor::block_on;
use futures::future::FutureObj;
use futures::task::{Spawn, SpawnError};
use parking_lot::Mutex;
use serde_json::json;
use shared_state::{Interest, Options, SharedState, State, StateStore, StorageError};
use std::sync::Arc;

/// Keeps the saved state as a JSON string, like a key-value store on a device.
struct JsonStore {
    name: String,
    saved: Mutex<Option<String>>,
}

#[async_trait]
impl StateStore for JsonStore {
    fn store_name(&self) -> &str {
        &self.name
    }

    fn save_automatically(&self) -> bool {
        true
    }

    async fn retrieve(&self) -> Result<Option<State>, StorageError> {
        match self.saved.lock().as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: State) -> Result<bool, StorageError> {
        let json = serde_json::to_string(&state)?;
        println!("   [Store:{}] saved {}", self.name, json);
        *self.saved.lock() = Some(json);
        Ok(true)
    }

    async fn delete(&self) -> Result<bool, StorageError> {
        println!("   [Store:{}] deleted", self.name);
        Ok(self.saved.lock().take().is_some())
    }
}

/// Runs background persistence to completion on the spot.
struct InlineSpawner;

impl Spawn for InlineSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        block_on(future);
        Ok(())
    }
}

struct Screen {
    name: &'static str,
    state: SharedState,
}

impl Screen {
    fn draw(&self) {
        let count = self.state.prop("sharedCounter").ok().flatten();
        println!("   [{}] shared counter: {}", self.name, count.unwrap_or(json!(null)));
    }
}

fn main() {
    println!("=== Shared Counter ===\n");

    println!("1. Creating shared state");
    let counter = SharedState::with_options(
        Some([("sharedCounter", json!(0)), ("theme", json!("light"))].into_iter().collect()),
        Options {
            debug_label: Some("SharedCounterState".to_string()),
        },
    );

    println!("\n2. Attaching storage with a previously saved counter");
    let store = JsonStore {
        name: "SharedCounterState".to_string(),
        saved: Mutex::new(Some(r#"{"sharedCounter": 3, "theme": "light"}"#.to_string())),
    };
    let restored = block_on(counter.initialize_storage(store, InlineSpawner));
    println!("   restored from storage: {}", restored);

    println!("\n3. Registering two screens for the counter");
    for name in ["Screen1", "Screen2"] {
        let screen = Arc::new(Screen {
            name,
            state: counter.clone(),
        });
        counter.register(move || screen.draw(), "sharedCounter");
    }

    println!("\n4. Listening to theme changes");
    let _theme_listener = counter
        .add_listener("theme", |current: &State, prev: &State| {
            println!("   [Theme] {} -> {}", prev["theme"], current["theme"]);
        })
        .expect("state is initialized");

    println!("\n5. Pressing 'Up' on Screen1");
    let up = |state: &SharedState| {
        let next = state.read(|s| s["sharedCounter"].as_i64().unwrap_or(0) + 1).expect("initialized");
        state.set_prop("sharedCounter", json!(next)).expect("known field");
    };
    up(&counter);
    up(&counter);

    println!("\n6. Switching theme (screens stay idle)");
    counter.set_prop("theme", json!("dark")).expect("known field");

    println!("\n7. Writing the same value again (nothing happens)");
    let changed = counter.set_prop("theme", json!("dark")).expect("known field");
    println!("   changed: {:?}", changed);

    println!("\n8. Forcing a redraw of every screen");
    counter.refresh(Interest::All).expect("initialized");

    println!("\n9. Resetting to defaults");
    counter.reset(None).expect("same fields");

    println!("\n10. Final state:\n{}", counter);

    println!("\n✓ Shared counter complete!");
}
