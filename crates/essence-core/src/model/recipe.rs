//! Per-step payloads: what the user entered and what the recipe service
//! proposed. Field names follow the webhook's JSON contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecipeError;

/// Relevancy scores returned by the service are on a 1..=5 scale.
pub const RELEVANCY_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConcern {
    pub text: String,
}

impl HealthConcern {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            other => Err(RecipeError::validation(
                "gender",
                format!("'{other}' is not one of male, female, other"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeCategory {
    Child,
    Teen,
    Adult,
    Senior,
}

impl AgeCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Teen => "teen",
            Self::Adult => "adult",
            Self::Senior => "senior",
        }
    }
}

impl fmt::Display for AgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeCategory {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "child" => Ok(Self::Child),
            "teen" => Ok(Self::Teen),
            "adult" => Ok(Self::Adult),
            "senior" => Ok(Self::Senior),
            other => Err(RecipeError::validation(
                "age category",
                format!("'{other}' is not one of child, teen, adult, senior"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub gender: Gender,
    pub age_category: AgeCategory,
    pub specific_age: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialCause {
    #[serde(default)]
    pub cause_id: String,
    pub cause_name: String,
    #[serde(default)]
    pub cause_suggestion: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialSymptom {
    #[serde(default)]
    pub symptom_id: String,
    pub symptom_name: String,
    #[serde(default)]
    pub symptom_suggestion: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TherapeuticProperty {
    #[serde(default)]
    pub property_id: String,
    pub property_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name_localized: Option<String>,
    #[serde(default)]
    pub description: String,
    pub relevancy: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses_cause_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses_symptom_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssentialOil {
    #[serde(default)]
    pub oil_id: String,
    pub name_english: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_localized: Option<String>,
    #[serde(default)]
    pub match_rationale: String,
    pub relevancy: u8,
}

/// Oils proposed for one therapeutic property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOilSuggestion {
    pub property_id: String,
    pub property_name: String,
    pub suggested_oils: Vec<EssentialOil>,
}

/// Check a relevancy score against [`RELEVANCY_RANGE`].
pub fn check_relevancy(field: &'static str, score: u8) -> Result<(), RecipeError> {
    if RELEVANCY_RANGE.contains(&score) {
        Ok(())
    } else {
        Err(RecipeError::validation(
            field,
            format!("relevancy {score} is outside 1..=5"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demographics_serialize_with_camel_case() {
        let d = Demographics {
            gender: Gender::Female,
            age_category: AgeCategory::Adult,
            specific_age: 28,
        };
        let json = serde_json::to_value(d).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"gender": "female", "ageCategory": "adult", "specificAge": 28})
        );
    }

    #[test]
    fn gender_and_age_category_parse_case_insensitively() {
        assert_eq!("Female".parse::<Gender>().ok(), Some(Gender::Female));
        assert_eq!(" senior ".parse::<AgeCategory>().ok(), Some(AgeCategory::Senior));
        assert!("robot".parse::<Gender>().is_err());
    }

    #[test]
    fn cause_tolerates_missing_optional_fields() {
        let cause: PotentialCause =
            serde_json::from_str(r#"{"cause_name": "Work stress"}"#).expect("parse");
        assert_eq!(cause.cause_name, "Work stress");
        assert!(cause.cause_id.is_empty());
        assert!(cause.explanation.is_empty());
    }

    #[test]
    fn relevancy_bounds_are_inclusive() {
        assert!(check_relevancy("relevancy", 1).is_ok());
        assert!(check_relevancy("relevancy", 5).is_ok());
        assert!(check_relevancy("relevancy", 0).is_err());
        assert!(check_relevancy("relevancy", 6).is_err());
    }
}
