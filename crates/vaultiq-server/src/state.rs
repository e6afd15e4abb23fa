//! Shared application state, grounded on the `AppState` pattern in
//! `crates/api/src/state.rs`.

use std::sync::Arc;

use vaultiq_core::gate::Capabilities;

#[derive(Clone)]
pub struct AppState {
    pub capabilities: Arc<Capabilities>,
}

impl AppState {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities: Arc::new(capabilities),
        }
    }
}
