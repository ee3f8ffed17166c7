//! Wizard actions and the reducer that applies them.
//!
//! Every mutation of [`WizardState`] goes through [`reduce`]. The reducer is
//! pure: it never reads the clock or generates ids, so the same state and
//! action always produce the same result.

use crate::model::{
    Demographics, HealthConcern, PotentialCause, PotentialSymptom, PropertyOilSuggestion,
    RecipeStep, TherapeuticProperty,
};

use super::state::{SessionId, StreamKind, WizardState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    SetCurrentStep(RecipeStep),
    MarkStepCompleted(RecipeStep),
    UpdateHealthConcern(HealthConcern),
    UpdateDemographics(Demographics),
    SetPotentialCauses(Vec<PotentialCause>),
    SetPotentialSymptoms(Vec<PotentialSymptom>),
    UpdateSelectedCauses(Vec<PotentialCause>),
    UpdateSelectedSymptoms(Vec<PotentialSymptom>),
    UpdateTherapeuticProperties(Vec<TherapeuticProperty>),
    SetSuggestedOils(Vec<PropertyOilSuggestion>),
    ClearStepsAfter(RecipeStep),
    ClearStepData(RecipeStep),
    SetLoading(bool),
    SetError(Option<String>),
    SetStreaming(StreamKind, bool),
    SetStreamingError(Option<String>),
    Reset { session_id: SessionId },
    Restore(Box<WizardState>),
}

impl WizardAction {
    /// Stable name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetCurrentStep(_) => "set_current_step",
            Self::MarkStepCompleted(_) => "mark_step_completed",
            Self::UpdateHealthConcern(_) => "update_health_concern",
            Self::UpdateDemographics(_) => "update_demographics",
            Self::SetPotentialCauses(_) => "set_potential_causes",
            Self::SetPotentialSymptoms(_) => "set_potential_symptoms",
            Self::UpdateSelectedCauses(_) => "update_selected_causes",
            Self::UpdateSelectedSymptoms(_) => "update_selected_symptoms",
            Self::UpdateTherapeuticProperties(_) => "update_therapeutic_properties",
            Self::SetSuggestedOils(_) => "set_suggested_oils",
            Self::ClearStepsAfter(_) => "clear_steps_after",
            Self::ClearStepData(_) => "clear_step_data",
            Self::SetLoading(_) => "set_loading",
            Self::SetError(_) => "set_error",
            Self::SetStreaming(..) => "set_streaming",
            Self::SetStreamingError(_) => "set_streaming_error",
            Self::Reset { .. } => "reset_wizard",
            Self::Restore(_) => "restore",
        }
    }

    /// The step whose downstream data this action invalidates, if any.
    #[must_use]
    pub const fn cascade_from(&self) -> Option<RecipeStep> {
        match self {
            Self::UpdateHealthConcern(_) => Some(RecipeStep::HealthConcern),
            Self::UpdateDemographics(_) => Some(RecipeStep::Demographics),
            Self::SetPotentialCauses(_) | Self::UpdateSelectedCauses(_) => {
                Some(RecipeStep::Causes)
            }
            Self::SetPotentialSymptoms(_) | Self::UpdateSelectedSymptoms(_) => {
                Some(RecipeStep::Symptoms)
            }
            Self::UpdateTherapeuticProperties(_) => Some(RecipeStep::Properties),
            Self::ClearStepsAfter(step) | Self::ClearStepData(step) => Some(*step),
            _ => None,
        }
    }
}

/// Apply `action` to `state`.
///
/// Returns `None` when the action would not change anything, so callers can
/// keep the previous snapshot.
#[must_use]
pub fn reduce(state: &WizardState, action: WizardAction) -> Option<WizardState> {
    let mut next = state.clone();

    match action {
        WizardAction::SetCurrentStep(step) => {
            next.current_step = step;
            next.completed_steps.retain(|done| *done <= step);
        }
        WizardAction::MarkStepCompleted(step) => {
            let prefix_complete = step.upstream().all(|s| next.completed_steps.contains(&s));
            if step > next.current_step || !prefix_complete {
                return None;
            }
            next.completed_steps.insert(step);
        }
        WizardAction::UpdateHealthConcern(concern) => {
            next.health_concern = Some(concern);
            next.clear_downstream(RecipeStep::HealthConcern);
        }
        WizardAction::UpdateDemographics(demographics) => {
            next.demographics = Some(demographics);
            next.clear_downstream(RecipeStep::Demographics);
        }
        WizardAction::SetPotentialCauses(causes) => {
            next.potential_causes = causes;
            next.selected_causes.clear();
            next.completed_steps.remove(&RecipeStep::Causes);
            next.clear_downstream(RecipeStep::Causes);
        }
        WizardAction::SetPotentialSymptoms(symptoms) => {
            next.potential_symptoms = symptoms;
            next.selected_symptoms.clear();
            next.completed_steps.remove(&RecipeStep::Symptoms);
            next.clear_downstream(RecipeStep::Symptoms);
        }
        WizardAction::UpdateSelectedCauses(causes) => {
            next.selected_causes = causes;
            next.clear_downstream(RecipeStep::Causes);
        }
        WizardAction::UpdateSelectedSymptoms(symptoms) => {
            next.selected_symptoms = symptoms;
            next.clear_downstream(RecipeStep::Symptoms);
        }
        WizardAction::UpdateTherapeuticProperties(properties) => {
            next.therapeutic_properties = properties;
            next.clear_downstream(RecipeStep::Properties);
        }
        WizardAction::SetSuggestedOils(oils) => {
            next.suggested_oils = oils;
        }
        WizardAction::ClearStepsAfter(step) => {
            next.clear_downstream(step);
        }
        WizardAction::ClearStepData(step) => {
            next.clear_data_for(step);
            next.clear_downstream(step);
        }
        WizardAction::SetLoading(loading) => next.is_loading = loading,
        WizardAction::SetError(error) => next.error = error,
        WizardAction::SetStreaming(kind, on) => {
            next.set_streaming_flag(kind, on);
            if on {
                next.streaming_error = None;
            }
        }
        WizardAction::SetStreamingError(error) => {
            if error.is_some() {
                for kind in StreamKind::ALL {
                    next.set_streaming_flag(kind, false);
                }
            }
            next.streaming_error = error;
        }
        WizardAction::Reset { session_id } => {
            next = WizardState::initial(session_id);
        }
        WizardAction::Restore(restored) => {
            next = *restored;
        }
    }

    if state.same_content(&next) {
        None
    } else {
        Some(next)
    }
}
