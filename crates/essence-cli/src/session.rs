//! The wizard draft for one CLI invocation.
//!
//! Each run restores the current draft, works on it, and flushes it through
//! the autosaver's before-unload path when dropped.

use essence_core::persist::{self, AutosaveHandle, Lifecycle, PerformanceMode};
use essence_core::store::{TracingObserver, WizardStore, lock_store};
use essence_core::{RecipeError, SharedStore, Storage, WizardState};
use std::sync::{Arc, MutexGuard};
use tracing::debug;

pub struct Session {
    store: SharedStore,
    autosave: Option<AutosaveHandle>,
}

impl Session {
    pub fn open(storage: Storage, mode: PerformanceMode) -> Result<Self, RecipeError> {
        let store = match persist::restore(&storage) {
            Some(state) => WizardStore::from_state(state),
            None => {
                debug!("no draft found, starting fresh");
                WizardStore::new()
            }
        }
        .with_observer(TracingObserver)
        .into_shared();

        let autosave = AutosaveHandle::spawn(Arc::clone(&store), storage, mode)?;
        Ok(Self {
            store,
            autosave: Some(autosave),
        })
    }

    pub fn store(&self) -> MutexGuard<'_, WizardStore> {
        lock_store(&self.store)
    }

    pub fn snapshot(&self) -> Arc<WizardState> {
        self.store().snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(autosave) = self.autosave.take() {
            autosave.notify(Lifecycle::BeforeUnload);
            autosave.shutdown();
        }
    }
}
