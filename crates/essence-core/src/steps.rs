//! Static step descriptors: prerequisites, validation bounds, display text.
//!
//! Reachability of a step is decided here and nowhere else. Each step lists
//! the fields that must be present before it can be entered; the lists are
//! cumulative, so a step's prerequisites include every earlier step's.

use crate::error::RecipeError;
use crate::model::{Demographics, HealthConcern, RecipeStep};
use crate::store::WizardState;
use crate::webhook::ApiStep;

/// A piece of wizard data a step depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    HealthConcern,
    Demographics,
    SelectedCauses,
    SelectedSymptoms,
    TherapeuticProperties,
}

impl Prerequisite {
    #[must_use]
    pub fn is_met(self, state: &WizardState) -> bool {
        match self {
            Self::HealthConcern => state.health_concern.is_some(),
            Self::Demographics => state.demographics.is_some(),
            Self::SelectedCauses => !state.selected_causes.is_empty(),
            Self::SelectedSymptoms => !state.selected_symptoms.is_empty(),
            Self::TherapeuticProperties => !state.therapeutic_properties.is_empty(),
        }
    }

    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::HealthConcern => "a health concern",
            Self::Demographics => "demographics",
            Self::SelectedCauses => "at least one selected cause",
            Self::SelectedSymptoms => "at least one selected symptom",
            Self::TherapeuticProperties => "therapeutic properties",
        }
    }
}

/// Validation bounds that apply to the step's own input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Text { min_length: usize, max_length: usize },
    Age { min: u8, max: u8 },
    Selection { min: usize, max: usize },
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct StepConfig {
    pub step: RecipeStep,
    pub title: &'static str,
    pub description: &'static str,
    pub prerequisites: &'static [Prerequisite],
    pub validation: Validation,
    /// Webhook call that populates this step, if any.
    pub api_step: Option<ApiStep>,
}

static STEPS: [StepConfig; 6] = [
    StepConfig {
        step: RecipeStep::HealthConcern,
        title: "Health concern",
        description: "Describe what you would like support with.",
        prerequisites: &[],
        validation: Validation::Text {
            min_length: 3,
            max_length: 500,
        },
        api_step: None,
    },
    StepConfig {
        step: RecipeStep::Demographics,
        title: "About you",
        description: "Gender and age help tailor safe suggestions.",
        prerequisites: &[Prerequisite::HealthConcern],
        validation: Validation::Age { min: 0, max: 120 },
        api_step: None,
    },
    StepConfig {
        step: RecipeStep::Causes,
        title: "Potential causes",
        description: "Pick the causes that resonate with your situation.",
        prerequisites: &[Prerequisite::HealthConcern, Prerequisite::Demographics],
        validation: Validation::Selection { min: 1, max: 10 },
        api_step: Some(ApiStep::PotentialCauses),
    },
    StepConfig {
        step: RecipeStep::Symptoms,
        title: "Symptoms",
        description: "Pick the symptoms you are experiencing.",
        prerequisites: &[
            Prerequisite::HealthConcern,
            Prerequisite::Demographics,
            Prerequisite::SelectedCauses,
        ],
        validation: Validation::Selection { min: 1, max: 15 },
        api_step: Some(ApiStep::PotentialSymptoms),
    },
    StepConfig {
        step: RecipeStep::Properties,
        title: "Therapeutic properties",
        description: "Properties an oil blend should have for your situation.",
        prerequisites: &[
            Prerequisite::HealthConcern,
            Prerequisite::Demographics,
            Prerequisite::SelectedCauses,
            Prerequisite::SelectedSymptoms,
        ],
        validation: Validation::Selection { min: 1, max: 12 },
        api_step: Some(ApiStep::MedicalProperties),
    },
    StepConfig {
        step: RecipeStep::Oils,
        title: "Suggested oils",
        description: "Oils matched to each therapeutic property.",
        prerequisites: &[
            Prerequisite::HealthConcern,
            Prerequisite::Demographics,
            Prerequisite::SelectedCauses,
            Prerequisite::SelectedSymptoms,
            Prerequisite::TherapeuticProperties,
        ],
        validation: Validation::None,
        api_step: Some(ApiStep::SuggestedOils),
    },
];

#[must_use]
pub fn all() -> &'static [StepConfig] {
    &STEPS
}

#[must_use]
pub fn config_for(step: RecipeStep) -> &'static StepConfig {
    &STEPS[step.index()]
}

/// First unmet prerequisite for `step`, if any.
#[must_use]
pub fn missing_prerequisite(state: &WizardState, step: RecipeStep) -> Option<Prerequisite> {
    config_for(step)
        .prerequisites
        .iter()
        .copied()
        .find(|p| !p.is_met(state))
}

/// Whether `step` can be entered given the current data.
#[must_use]
pub fn can_navigate_to_step(state: &WizardState, step: RecipeStep) -> bool {
    missing_prerequisite(state, step).is_none()
}

pub fn validate_health_concern(raw: &str) -> Result<HealthConcern, RecipeError> {
    let Validation::Text {
        min_length,
        max_length,
    } = config_for(RecipeStep::HealthConcern).validation
    else {
        return Ok(HealthConcern::new(raw.trim()));
    };

    let text = raw.trim();
    let len = text.chars().count();
    if len < min_length {
        return Err(RecipeError::validation(
            "health concern",
            format!("must be at least {min_length} characters"),
        ));
    }
    if len > max_length {
        return Err(RecipeError::validation(
            "health concern",
            format!("must be at most {max_length} characters (got {len})"),
        ));
    }
    Ok(HealthConcern::new(text))
}

pub fn validate_demographics(demographics: &Demographics) -> Result<(), RecipeError> {
    if let Validation::Age { min, max } = config_for(RecipeStep::Demographics).validation
        && !(min..=max).contains(&demographics.specific_age)
    {
        return Err(RecipeError::validation(
            "age",
            format!(
                "{} is outside {min}..={max}",
                demographics.specific_age
            ),
        ));
    }
    Ok(())
}

pub fn validate_selection(step: RecipeStep, count: usize) -> Result<(), RecipeError> {
    let Validation::Selection { min, max } = config_for(step).validation else {
        return Ok(());
    };
    if count < min {
        return Err(RecipeError::validation(
            "selection",
            format!("{step} needs at least {min} selection(s)"),
        ));
    }
    if count > max {
        return Err(RecipeError::validation(
            "selection",
            format!("{step} allows at most {max} selections (got {count})"),
        ));
    }
    Ok(())
}
