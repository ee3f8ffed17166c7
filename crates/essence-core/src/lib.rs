//! essence-core library.
//!
//! The recipe wizard engine: a six-step state machine with cascading
//! invalidation, TTL-bounded draft storage with autosave, and a blocking
//! webhook client that retries and fans out per therapeutic property.

pub mod client;
pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod persist;
pub mod selectors;
pub mod steps;
pub mod storage;
pub mod store;
pub mod webhook;

pub use client::{OilFanout, RetryPolicy, WebhookClient};
pub use config::{EssenceConfig, resolve_config};
pub use error::{ErrorCode, RecipeError};
pub use model::RecipeStep;
pub use persist::{AutosaveHandle, Lifecycle, PerformanceMode};
pub use storage::Storage;
pub use store::{SharedStore, WizardAction, WizardState, WizardStore};
