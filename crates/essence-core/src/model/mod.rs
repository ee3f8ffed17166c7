//! Wizard domain types.

pub mod recipe;
pub mod step;

pub use recipe::{
    AgeCategory, Demographics, EssentialOil, Gender, HealthConcern, PotentialCause,
    PotentialSymptom, PropertyOilSuggestion, TherapeuticProperty,
};
pub use step::{ParseStepError, RecipeStep};
