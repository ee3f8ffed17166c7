//! The wizard store: one owner of [`WizardState`], mutated only through
//! [`WizardAction`]s.
//!
//! Snapshots are handed out as `Arc<WizardState>`. A successful mutation
//! always installs a fresh `Arc`; a no-op keeps the old one, so pointer
//! equality on snapshots is a valid "nothing changed" check.

mod action;
mod observer;
mod state;

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use action::{WizardAction, reduce};
pub use observer::{StoreObserver, TracingObserver};
pub use state::{SessionId, StreamKind, WizardState};

use crate::error::RecipeError;
use crate::model::{
    Demographics, HealthConcern, PotentialCause, PotentialSymptom, PropertyOilSuggestion,
    RecipeStep, TherapeuticProperty,
};
use crate::steps;

/// A store shared with a background autosaver.
pub type SharedStore = Arc<Mutex<WizardStore>>;

/// Lock a [`SharedStore`], recovering from a poisoned mutex.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, WizardStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct WizardStore {
    state: Arc<WizardState>,
    observers: Vec<Box<dyn StoreObserver>>,
}

impl std::fmt::Debug for WizardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardStore")
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for WizardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardStore {
    /// Fresh store with a newly generated session id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_state(WizardState::initial(SessionId::generate()))
    }

    #[must_use]
    pub fn from_state(state: WizardState) -> Self {
        Self {
            state: Arc::new(state),
            observers: Vec::new(),
        }
    }

    /// Attach a middleware observer. Observers run in attach order.
    #[must_use]
    pub fn with_observer(mut self, observer: impl StoreObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<WizardState> {
        Arc::clone(&self.state)
    }

    /// Apply an action. Returns true when the state changed.
    pub fn dispatch(&mut self, action: WizardAction) -> bool {
        let before = Arc::clone(&self.state);
        let changed = match reduce(&before, action.clone()) {
            Some(mut next) => {
                // a restored draft keeps the time it was last edited
                if !matches!(action, WizardAction::Restore(_)) {
                    next.last_updated = Utc::now();
                }
                self.state = Arc::new(next);
                true
            }
            None => false,
        };

        for observer in &self.observers {
            observer.on_dispatch(&action, &before, &self.state);
        }
        changed
    }

    pub fn set_current_step(&mut self, step: RecipeStep) -> bool {
        self.dispatch(WizardAction::SetCurrentStep(step))
    }

    pub fn mark_step_completed(&mut self, step: RecipeStep) -> bool {
        self.dispatch(WizardAction::MarkStepCompleted(step))
    }

    #[must_use]
    pub fn can_navigate_to_step(&self, step: RecipeStep) -> bool {
        steps::can_navigate_to_step(&self.state, step)
    }

    /// Move to `step` if its prerequisites are met.
    pub fn navigate_to(&mut self, step: RecipeStep) -> Result<(), RecipeError> {
        if let Some(missing) = steps::missing_prerequisite(&self.state, step) {
            return Err(RecipeError::InvalidTransition {
                from: self.state.current_step,
                to: step,
                reason: missing.describe(),
            });
        }
        self.set_current_step(step);
        Ok(())
    }

    /// Mark the current step completed and move to the next one.
    pub fn advance(&mut self) -> Result<RecipeStep, RecipeError> {
        let current = self.state.current_step;
        let Some(next) = current.next() else {
            return Err(RecipeError::InvalidTransition {
                from: current,
                to: current,
                reason: "already on the last step",
            });
        };
        self.navigate_to(next)?;
        self.mark_step_completed(current);
        Ok(next)
    }

    pub fn update_health_concern(&mut self, concern: HealthConcern) -> bool {
        self.dispatch(WizardAction::UpdateHealthConcern(concern))
    }

    pub fn update_demographics(&mut self, demographics: Demographics) -> bool {
        self.dispatch(WizardAction::UpdateDemographics(demographics))
    }

    pub fn set_potential_causes(&mut self, causes: Vec<PotentialCause>) -> bool {
        self.dispatch(WizardAction::SetPotentialCauses(causes))
    }

    pub fn set_potential_symptoms(&mut self, symptoms: Vec<PotentialSymptom>) -> bool {
        self.dispatch(WizardAction::SetPotentialSymptoms(symptoms))
    }

    pub fn update_selected_causes(&mut self, causes: Vec<PotentialCause>) -> bool {
        self.dispatch(WizardAction::UpdateSelectedCauses(causes))
    }

    pub fn update_selected_symptoms(&mut self, symptoms: Vec<PotentialSymptom>) -> bool {
        self.dispatch(WizardAction::UpdateSelectedSymptoms(symptoms))
    }

    pub fn update_therapeutic_properties(&mut self, properties: Vec<TherapeuticProperty>) -> bool {
        self.dispatch(WizardAction::UpdateTherapeuticProperties(properties))
    }

    pub fn set_suggested_oils(&mut self, oils: Vec<PropertyOilSuggestion>) -> bool {
        self.dispatch(WizardAction::SetSuggestedOils(oils))
    }

    pub fn clear_steps_after(&mut self, step: RecipeStep) -> bool {
        self.dispatch(WizardAction::ClearStepsAfter(step))
    }

    pub fn clear_step_data(&mut self, step: RecipeStep) -> bool {
        self.dispatch(WizardAction::ClearStepData(step))
    }

    /// Back to the initial state under a new session id.
    pub fn reset_wizard(&mut self) {
        self.dispatch(WizardAction::Reset {
            session_id: SessionId::generate(),
        });
    }

    pub fn restore(&mut self, state: WizardState) -> bool {
        self.dispatch(WizardAction::Restore(Box::new(state)))
    }

    pub fn set_loading(&mut self, loading: bool) -> bool {
        self.dispatch(WizardAction::SetLoading(loading))
    }

    pub fn set_error(&mut self, error: Option<String>) -> bool {
        self.dispatch(WizardAction::SetError(error))
    }

    pub fn set_streaming(&mut self, kind: StreamKind, on: bool) -> bool {
        self.dispatch(WizardAction::SetStreaming(kind, on))
    }

    pub fn set_streaming_causes(&mut self, on: bool) -> bool {
        self.set_streaming(StreamKind::Causes, on)
    }

    pub fn set_streaming_symptoms(&mut self, on: bool) -> bool {
        self.set_streaming(StreamKind::Symptoms, on)
    }

    pub fn set_streaming_properties(&mut self, on: bool) -> bool {
        self.set_streaming(StreamKind::Properties, on)
    }

    pub fn set_streaming_oils(&mut self, on: bool) -> bool {
        self.set_streaming(StreamKind::Oils, on)
    }

    pub fn set_streaming_error(&mut self, error: Option<String>) -> bool {
        self.dispatch(WizardAction::SetStreamingError(error))
    }
}
