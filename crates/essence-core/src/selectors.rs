//! Read-only projections over [`WizardState`].
//!
//! Views subscribe to a slice instead of the whole state and only redraw when
//! their slice changes. Slices compare by value; because the store never
//! mutates a published snapshot, an unchanged `Arc` is also an unchanged
//! slice.

use serde::Serialize;
use std::sync::Arc;

use crate::model::{
    Demographics, HealthConcern, PotentialCause, PotentialSymptom, PropertyOilSuggestion,
    RecipeStep, TherapeuticProperty,
};
use crate::steps;
use crate::store::{StreamKind, WizardState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationSlice {
    pub current_step: RecipeStep,
    pub completed_steps: Vec<RecipeStep>,
    pub reachable_steps: Vec<RecipeStep>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

#[must_use]
pub fn navigation(state: &WizardState) -> NavigationSlice {
    let reachable_steps = RecipeStep::ALL
        .into_iter()
        .filter(|step| steps::can_navigate_to_step(state, *step))
        .collect();
    NavigationSlice {
        current_step: state.current_step,
        completed_steps: state.completed_steps.iter().copied().collect(),
        reachable_steps,
        can_go_back: state.current_step.previous().is_some(),
        can_go_forward: state
            .current_step
            .next()
            .is_some_and(|next| steps::can_navigate_to_step(state, next)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionCounts {
    pub potential_causes: usize,
    pub selected_causes: usize,
    pub potential_symptoms: usize,
    pub selected_symptoms: usize,
    pub therapeutic_properties: usize,
    pub suggested_oils: usize,
}

#[must_use]
pub fn selection_counts(state: &WizardState) -> SelectionCounts {
    SelectionCounts {
        potential_causes: state.potential_causes.len(),
        selected_causes: state.selected_causes.len(),
        potential_symptoms: state.potential_symptoms.len(),
        selected_symptoms: state.selected_symptoms.len(),
        therapeutic_properties: state.therapeutic_properties.len(),
        suggested_oils: state
            .suggested_oils
            .iter()
            .map(|s| s.suggested_oils.len())
            .sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamingSlice {
    pub causes: bool,
    pub symptoms: bool,
    pub properties: bool,
    pub oils: bool,
    pub any: bool,
    pub error: Option<String>,
}

#[must_use]
pub fn streaming(state: &WizardState) -> StreamingSlice {
    StreamingSlice {
        causes: state.is_streaming_causes,
        symptoms: state.is_streaming_symptoms,
        properties: state.is_streaming_properties,
        oils: state.is_streaming_oils,
        any: StreamKind::ALL.iter().any(|k| state.is_streaming(*k)),
        error: state.streaming_error.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

#[must_use]
pub fn progress(state: &WizardState) -> Progress {
    let total = RecipeStep::ALL.len();
    let completed = state.completed_steps.len();
    let percent = u8::try_from(completed * 100 / total).unwrap_or(100);
    Progress {
        completed,
        total,
        percent,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSlice {
    pub is_loading: bool,
    pub error: Option<String>,
}

#[must_use]
pub fn status(state: &WizardState) -> StatusSlice {
    StatusSlice {
        is_loading: state.is_loading,
        error: state.error.clone(),
    }
}

/// The data one step owns, for a view that renders a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "data", rename_all = "kebab-case")]
pub enum StepData {
    HealthConcern(Option<HealthConcern>),
    Demographics(Option<Demographics>),
    Causes {
        potential: Vec<PotentialCause>,
        selected: Vec<PotentialCause>,
    },
    Symptoms {
        potential: Vec<PotentialSymptom>,
        selected: Vec<PotentialSymptom>,
    },
    Properties(Vec<TherapeuticProperty>),
    Oils(Vec<PropertyOilSuggestion>),
}

#[must_use]
pub fn step_data(state: &WizardState, step: RecipeStep) -> StepData {
    match step {
        RecipeStep::HealthConcern => StepData::HealthConcern(state.health_concern.clone()),
        RecipeStep::Demographics => StepData::Demographics(state.demographics),
        RecipeStep::Causes => StepData::Causes {
            potential: state.potential_causes.clone(),
            selected: state.selected_causes.clone(),
        },
        RecipeStep::Symptoms => StepData::Symptoms {
            potential: state.potential_symptoms.clone(),
            selected: state.selected_symptoms.clone(),
        },
        RecipeStep::Properties => StepData::Properties(state.therapeutic_properties.clone()),
        RecipeStep::Oils => StepData::Oils(state.suggested_oils.clone()),
    }
}

/// Remembers the last slice a subscriber saw.
pub struct Subscription<S, F>
where
    F: Fn(&WizardState) -> S,
{
    select: F,
    last_state: Option<Arc<WizardState>>,
    last_slice: Option<S>,
}

impl<S, F> Subscription<S, F>
where
    S: PartialEq,
    F: Fn(&WizardState) -> S,
{
    pub const fn new(select: F) -> Self {
        Self {
            select,
            last_state: None,
            last_slice: None,
        }
    }

    /// Returns the new slice when it differs from the last one seen.
    pub fn poll(&mut self, snapshot: &Arc<WizardState>) -> Option<&S> {
        if self
            .last_state
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, snapshot))
        {
            return None;
        }
        self.last_state = Some(Arc::clone(snapshot));

        let slice = (self.select)(snapshot);
        if self.last_slice.as_ref() == Some(&slice) {
            return None;
        }
        self.last_slice = Some(slice);
        self.last_slice.as_ref()
    }

    /// Whether `snapshot` changes the slice; records it like [`Self::poll`].
    pub fn changed(&mut self, snapshot: &Arc<WizardState>) -> bool {
        self.poll(snapshot).is_some()
    }

    #[must_use]
    pub const fn current(&self) -> Option<&S> {
        self.last_slice.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WizardStore;

    #[test]
    fn navigation_reports_forward_reachability() {
        let mut store = WizardStore::new();
        assert!(!navigation(store.state()).can_go_forward);
        store.update_health_concern(HealthConcern::new("hay fever"));
        let nav = navigation(store.state());
        assert!(nav.can_go_forward);
        assert!(!nav.can_go_back);
        assert_eq!(
            nav.reachable_steps,
            vec![RecipeStep::HealthConcern, RecipeStep::Demographics]
        );
    }

    #[test]
    fn subscription_fires_only_on_slice_change() {
        let mut store = WizardStore::new();
        let mut sub = Subscription::new(selection_counts);

        assert!(sub.poll(&store.snapshot()).is_some());
        assert!(sub.poll(&store.snapshot()).is_none());

        // state changes, but not the counted slice
        store.set_loading(true);
        assert!(sub.poll(&store.snapshot()).is_none());

        store.update_health_concern(HealthConcern::new("sore muscles"));
        assert!(sub.poll(&store.snapshot()).is_none());
        assert_eq!(sub.current().map(|c| c.selected_causes), Some(0));
    }

    #[test]
    fn step_data_follows_the_cascade() {
        let mut store = WizardStore::new();
        store.update_health_concern(HealthConcern::new("tension headaches"));
        let mut sub = Subscription::new(|s: &WizardState| step_data(s, RecipeStep::HealthConcern));
        assert!(sub.changed(&store.snapshot()));

        store.set_loading(true);
        assert!(!sub.changed(&store.snapshot()));

        store.update_health_concern(HealthConcern::new("migraines"));
        assert!(sub.changed(&store.snapshot()));
        assert_eq!(
            sub.current(),
            Some(&StepData::HealthConcern(Some(HealthConcern::new("migraines"))))
        );
        assert_eq!(
            step_data(store.state(), RecipeStep::Oils),
            StepData::Oils(Vec::new())
        );
    }

    #[test]
    fn streaming_slice_tracks_any_flag() {
        let mut store = WizardStore::new();
        assert!(!streaming(store.state()).any);
        store.set_streaming_properties(true);
        let slice = streaming(store.state());
        assert!(slice.any);
        assert!(slice.properties);
    }

    #[test]
    fn progress_is_a_percentage_of_all_steps() {
        let mut store = WizardStore::new();
        store.update_health_concern(HealthConcern::new("headache"));
        store.advance().expect("demographics reachable");
        let p = progress(store.state());
        assert_eq!(p.completed, 1);
        assert_eq!(p.total, 6);
        assert_eq!(p.percent, 16);
    }
}
