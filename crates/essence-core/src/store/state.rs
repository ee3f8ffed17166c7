use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::{
    Demographics, HealthConcern, PotentialCause, PotentialSymptom, PropertyOilSuggestion,
    RecipeStep, TherapeuticProperty,
};

/// Opaque per-session token used to scope persisted drafts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ses-{}", uuid::Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which step an in-flight incremental response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Causes,
    Symptoms,
    Properties,
    Oils,
}

impl StreamKind {
    pub const ALL: [Self; 4] = [Self::Causes, Self::Symptoms, Self::Properties, Self::Oils];

    #[must_use]
    pub const fn step(self) -> RecipeStep {
        match self {
            Self::Causes => RecipeStep::Causes,
            Self::Symptoms => RecipeStep::Symptoms,
            Self::Properties => RecipeStep::Properties,
            Self::Oils => RecipeStep::Oils,
        }
    }
}

/// Everything the wizard knows about one session.
///
/// Only [`crate::store::WizardStore`] mutates this; everything else reads
/// snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub current_step: RecipeStep,
    pub completed_steps: BTreeSet<RecipeStep>,

    pub health_concern: Option<HealthConcern>,
    pub demographics: Option<Demographics>,
    pub selected_causes: Vec<PotentialCause>,
    pub selected_symptoms: Vec<PotentialSymptom>,
    pub therapeutic_properties: Vec<TherapeuticProperty>,
    pub suggested_oils: Vec<PropertyOilSuggestion>,

    pub potential_causes: Vec<PotentialCause>,
    pub potential_symptoms: Vec<PotentialSymptom>,

    pub is_loading: bool,
    pub error: Option<String>,
    pub is_streaming_causes: bool,
    pub is_streaming_symptoms: bool,
    pub is_streaming_properties: bool,
    pub is_streaming_oils: bool,
    pub streaming_error: Option<String>,

    pub last_updated: DateTime<Utc>,
    pub session_id: SessionId,
}

impl WizardState {
    #[must_use]
    pub fn initial(session_id: SessionId) -> Self {
        Self {
            current_step: RecipeStep::FIRST,
            completed_steps: BTreeSet::new(),
            health_concern: None,
            demographics: None,
            selected_causes: Vec::new(),
            selected_symptoms: Vec::new(),
            therapeutic_properties: Vec::new(),
            suggested_oils: Vec::new(),
            potential_causes: Vec::new(),
            potential_symptoms: Vec::new(),
            is_loading: false,
            error: None,
            is_streaming_causes: false,
            is_streaming_symptoms: false,
            is_streaming_properties: false,
            is_streaming_oils: false,
            streaming_error: None,
            last_updated: Utc::now(),
            session_id,
        }
    }

    #[must_use]
    pub const fn is_streaming(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Causes => self.is_streaming_causes,
            StreamKind::Symptoms => self.is_streaming_symptoms,
            StreamKind::Properties => self.is_streaming_properties,
            StreamKind::Oils => self.is_streaming_oils,
        }
    }

    pub(crate) const fn set_streaming_flag(&mut self, kind: StreamKind, on: bool) {
        match kind {
            StreamKind::Causes => self.is_streaming_causes = on,
            StreamKind::Symptoms => self.is_streaming_symptoms = on,
            StreamKind::Properties => self.is_streaming_properties = on,
            StreamKind::Oils => self.is_streaming_oils = on,
        }
    }

    /// True when the step's own payload (entered or fetched) is present.
    #[must_use]
    pub fn has_data_for(&self, step: RecipeStep) -> bool {
        match step {
            RecipeStep::HealthConcern => self.health_concern.is_some(),
            RecipeStep::Demographics => self.demographics.is_some(),
            RecipeStep::Causes => {
                !self.potential_causes.is_empty() || !self.selected_causes.is_empty()
            }
            RecipeStep::Symptoms => {
                !self.potential_symptoms.is_empty() || !self.selected_symptoms.is_empty()
            }
            RecipeStep::Properties => !self.therapeutic_properties.is_empty(),
            RecipeStep::Oils => !self.suggested_oils.is_empty(),
        }
    }

    /// Drop the payload owned by `step` and its completion mark.
    pub(crate) fn clear_data_for(&mut self, step: RecipeStep) {
        match step {
            RecipeStep::HealthConcern => self.health_concern = None,
            RecipeStep::Demographics => self.demographics = None,
            RecipeStep::Causes => {
                self.potential_causes.clear();
                self.selected_causes.clear();
            }
            RecipeStep::Symptoms => {
                self.potential_symptoms.clear();
                self.selected_symptoms.clear();
            }
            RecipeStep::Properties => self.therapeutic_properties.clear(),
            RecipeStep::Oils => self.suggested_oils.clear(),
        }
        self.completed_steps.remove(&step);
    }

    /// Apply the cascade rule: every step after `step` loses its data.
    pub(crate) fn clear_downstream(&mut self, step: RecipeStep) {
        for later in step.downstream() {
            self.clear_data_for(later);
        }
    }

    /// Field-wise equality that ignores `last_updated`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        let mut aligned = other.clone();
        aligned.last_updated = self.last_updated;
        *self == aligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_empty_and_on_first_step() {
        let state = WizardState::initial(SessionId::from("ses-test"));
        assert_eq!(state.current_step, RecipeStep::HealthConcern);
        assert!(state.completed_steps.is_empty());
        assert!(RecipeStep::ALL.iter().all(|s| !state.has_data_for(*s)));
        assert!(StreamKind::ALL.iter().all(|k| !state.is_streaming(*k)));
        assert_eq!(state.session_id.as_str(), "ses-test");
    }

    #[test]
    fn generated_session_ids_differ() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn same_content_ignores_timestamp() {
        let a = WizardState::initial(SessionId::from("ses-a"));
        let mut b = a.clone();
        b.last_updated += chrono::Duration::seconds(5);
        assert!(a.same_content(&b));
        b.is_loading = true;
        assert!(!a.same_content(&b));
    }

    #[test]
    fn state_round_trips_through_camel_case_json() {
        let state = WizardState::initial(SessionId::from("ses-json"));
        let json = serde_json::to_value(&state).expect("serialize");
        assert!(json.get("currentStep").is_some());
        assert!(json.get("isStreamingCauses").is_some());
        let back: WizardState = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, state);
    }
}
