//! Wire contract of the recipe webhook.
//!
//! Requests carry `{feature, step, data}`. Responses are a one-element JSON
//! array whose `message.content` holds the step payload, either as an object
//! or as a string containing JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::RecipeError;
use crate::model::{
    AgeCategory, EssentialOil, Gender, PotentialCause, PotentialSymptom, PropertyOilSuggestion,
    TherapeuticProperty, recipe::check_relevancy,
};
use crate::store::WizardState;

pub const FEATURE: &str = "create-recipe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiStep {
    PotentialCauses,
    PotentialSymptoms,
    MedicalProperties,
    SuggestedOils,
    RecipeChoices,
}

impl ApiStep {
    pub const ALL: [Self; 5] = [
        Self::PotentialCauses,
        Self::PotentialSymptoms,
        Self::MedicalProperties,
        Self::SuggestedOils,
        Self::RecipeChoices,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PotentialCauses => "PotentialCauses",
            Self::PotentialSymptoms => "PotentialSymptoms",
            Self::MedicalProperties => "MedicalProperties",
            Self::SuggestedOils => "SuggestedOils",
            Self::RecipeChoices => "RecipeChoices",
        }
    }

    /// Key under which the response payload lists its items.
    #[must_use]
    pub const fn payload_key(self) -> &'static str {
        match self {
            Self::PotentialCauses => "potential_causes",
            Self::PotentialSymptoms => "potential_symptoms",
            Self::MedicalProperties => "therapeutic_properties",
            Self::SuggestedOils => "suggested_oils",
            Self::RecipeChoices => "recipe_choices",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == raw)
    }
}

impl fmt::Display for ApiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    pub health_concern: String,
    pub gender: Gender,
    pub age_category: AgeCategory,
    pub age_specific: u8,
    pub user_language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_causes: Vec<PotentialCause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_symptoms: Vec<PotentialSymptom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapeutic_property: Option<TherapeuticProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_oils: Vec<PropertyOilSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRequest {
    pub feature: String,
    pub step: ApiStep,
    pub data: RequestData,
}

impl RecipeRequest {
    /// Build the request for `step` from wizard state.
    ///
    /// `SuggestedOils` is issued once per property; use
    /// [`RecipeRequest::for_property`] for it.
    pub fn for_step(
        state: &WizardState,
        step: ApiStep,
        user_language: &str,
    ) -> Result<Self, RecipeError> {
        let mut data = base_data(state, user_language)?;
        match step {
            ApiStep::PotentialCauses => {}
            ApiStep::PotentialSymptoms => {
                require_non_empty("selected causes", &state.selected_causes)?;
                data.selected_causes.clone_from(&state.selected_causes);
            }
            ApiStep::MedicalProperties => {
                require_non_empty("selected causes", &state.selected_causes)?;
                require_non_empty("selected symptoms", &state.selected_symptoms)?;
                data.selected_causes.clone_from(&state.selected_causes);
                data.selected_symptoms.clone_from(&state.selected_symptoms);
            }
            ApiStep::SuggestedOils => {
                return Err(RecipeError::validation(
                    "step",
                    "SuggestedOils requests are built per therapeutic property",
                ));
            }
            ApiStep::RecipeChoices => {
                require_non_empty("suggested oils", &state.suggested_oils)?;
                data.selected_causes.clone_from(&state.selected_causes);
                data.selected_symptoms.clone_from(&state.selected_symptoms);
                data.suggested_oils.clone_from(&state.suggested_oils);
            }
        }
        Ok(Self {
            feature: FEATURE.to_string(),
            step,
            data,
        })
    }

    /// `SuggestedOils` request for one therapeutic property.
    pub fn for_property(
        state: &WizardState,
        property: &TherapeuticProperty,
        user_language: &str,
    ) -> Result<Self, RecipeError> {
        let mut data = base_data(state, user_language)?;
        data.selected_causes.clone_from(&state.selected_causes);
        data.selected_symptoms.clone_from(&state.selected_symptoms);
        data.therapeutic_property = Some(property.clone());
        Ok(Self {
            feature: FEATURE.to_string(),
            step: ApiStep::SuggestedOils,
            data,
        })
    }
}

fn base_data(state: &WizardState, user_language: &str) -> Result<RequestData, RecipeError> {
    let concern = state
        .health_concern
        .as_ref()
        .ok_or_else(|| RecipeError::validation("health concern", "is required"))?;
    let demographics = state
        .demographics
        .ok_or_else(|| RecipeError::validation("demographics", "are required"))?;
    Ok(RequestData {
        health_concern: concern.text.clone(),
        gender: demographics.gender,
        age_category: demographics.age_category,
        age_specific: demographics.specific_age,
        user_language: user_language.to_string(),
        selected_causes: Vec::new(),
        selected_symptoms: Vec::new(),
        therapeutic_property: None,
        suggested_oils: Vec::new(),
    })
}

fn require_non_empty<T>(field: &'static str, items: &[T]) -> Result<(), RecipeError> {
    if items.is_empty() {
        Err(RecipeError::validation(field, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Pull `message.content` out of a webhook response, decoding it when the
/// service sent it as a JSON string.
pub fn extract_content(response: &Value) -> Result<Value, RecipeError> {
    let first = match response {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| RecipeError::MalformedResponse("empty response array".into()))?,
        Value::Object(_) => response,
        _ => {
            return Err(RecipeError::MalformedResponse(
                "expected a JSON array".into(),
            ));
        }
    };

    let content = first
        .get("message")
        .and_then(|m| m.get("content"))
        .ok_or_else(|| RecipeError::MalformedResponse("missing message.content".into()))?;

    match content {
        Value::String(raw) => serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
            RecipeError::MalformedResponse(format!("message.content is not JSON: {e}"))
        }),
        Value::Object(_) => Ok(content.clone()),
        _ => Err(RecipeError::MalformedResponse(
            "message.content must be an object or a JSON string".into(),
        )),
    }
}

/// LLM output is sometimes wrapped in a Markdown code fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn payload_items<T: DeserializeOwned>(
    response: &Value,
    step: ApiStep,
) -> Result<Vec<T>, RecipeError> {
    let content = extract_content(response)?;
    let key = step.payload_key();
    let items = content
        .get(key)
        .or_else(|| content.get("data").and_then(|d| d.get(key)))
        .ok_or_else(|| RecipeError::MalformedResponse(format!("{step} payload lacks '{key}'")))?;
    serde_json::from_value(items.clone())
        .map_err(|e| RecipeError::MalformedResponse(format!("{step} '{key}': {e}")))
}

pub fn parse_potential_causes(response: &Value) -> Result<Vec<PotentialCause>, RecipeError> {
    let mut causes: Vec<PotentialCause> = payload_items(response, ApiStep::PotentialCauses)?;
    for (i, cause) in causes.iter_mut().enumerate() {
        if cause.cause_id.is_empty() {
            cause.cause_id = format!("cause-{}", i + 1);
        }
    }
    Ok(causes)
}

pub fn parse_potential_symptoms(response: &Value) -> Result<Vec<PotentialSymptom>, RecipeError> {
    let mut symptoms: Vec<PotentialSymptom> =
        payload_items(response, ApiStep::PotentialSymptoms)?;
    for (i, symptom) in symptoms.iter_mut().enumerate() {
        if symptom.symptom_id.is_empty() {
            symptom.symptom_id = format!("symptom-{}", i + 1);
        }
    }
    Ok(symptoms)
}

pub fn parse_therapeutic_properties(
    response: &Value,
) -> Result<Vec<TherapeuticProperty>, RecipeError> {
    let mut properties: Vec<TherapeuticProperty> =
        payload_items(response, ApiStep::MedicalProperties)?;
    for (i, property) in properties.iter_mut().enumerate() {
        check_relevancy("property relevancy", property.relevancy)
            .map_err(|e| RecipeError::MalformedResponse(e.to_string()))?;
        if property.property_id.is_empty() {
            property.property_id = format!("property-{}", i + 1);
        }
    }
    Ok(properties)
}

pub fn parse_suggested_oils(response: &Value) -> Result<Vec<EssentialOil>, RecipeError> {
    let mut oils: Vec<EssentialOil> = payload_items(response, ApiStep::SuggestedOils)?;
    for (i, oil) in oils.iter_mut().enumerate() {
        check_relevancy("oil relevancy", oil.relevancy)
            .map_err(|e| RecipeError::MalformedResponse(e.to_string()))?;
        if oil.oil_id.is_empty() {
            oil.oil_id = format!("oil-{}", i + 1);
        }
    }
    Ok(oils)
}

/// Minimal shape check for a request body arriving at the proxy.
pub fn validate_request_body(body: &Value) -> Result<ApiStep, RecipeError> {
    let feature = body
        .get("feature")
        .and_then(Value::as_str)
        .ok_or_else(|| RecipeError::validation("feature", "is required"))?;
    if feature.trim().is_empty() {
        return Err(RecipeError::validation("feature", "must not be empty"));
    }

    let raw_step = body
        .get("step")
        .and_then(Value::as_str)
        .ok_or_else(|| RecipeError::validation("step", "is required"))?;
    let step = ApiStep::parse(raw_step).ok_or_else(|| {
        RecipeError::validation("step", format!("'{raw_step}' is not a known step"))
    })?;

    let data = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| RecipeError::validation("data", "must be an object"))?;
    let concern = data
        .get("health_concern")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if concern.trim().is_empty() {
        return Err(RecipeError::validation(
            "data.health_concern",
            "is required",
        ));
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Demographics, HealthConcern};
    use crate::store::SessionId;
    use serde_json::json;

    fn ready_state() -> WizardState {
        let mut s = WizardState::initial(SessionId::from("ses-webhook"));
        s.health_concern = Some(HealthConcern::new("chronic anxiety and stress"));
        s.demographics = Some(Demographics {
            gender: Gender::Female,
            age_category: AgeCategory::Adult,
            specific_age: 28,
        });
        s
    }

    #[test]
    fn causes_request_matches_contract() -> Result<(), RecipeError> {
        let request = RecipeRequest::for_step(&ready_state(), ApiStep::PotentialCauses, "en")?;
        let json = serde_json::to_value(&request).map_err(|e| RecipeError::Config(e.to_string()))?;
        assert_eq!(
            json,
            json!({
                "feature": "create-recipe",
                "step": "PotentialCauses",
                "data": {
                    "health_concern": "chronic anxiety and stress",
                    "gender": "female",
                    "age_category": "adult",
                    "age_specific": 28,
                    "user_language": "en"
                }
            })
        );
        Ok(())
    }

    #[test]
    fn symptoms_request_requires_selected_causes() {
        let err = RecipeRequest::for_step(&ready_state(), ApiStep::PotentialSymptoms, "en")
            .expect_err("needs causes");
        assert!(matches!(err, RecipeError::Validation { .. }));
    }

    #[test]
    fn request_without_demographics_is_rejected() {
        let mut s = ready_state();
        s.demographics = None;
        assert!(RecipeRequest::for_step(&s, ApiStep::PotentialCauses, "en").is_err());
    }

    #[test]
    fn content_may_be_object_or_string() -> Result<(), RecipeError> {
        let as_object = json!([{"message": {"content": {"potential_causes": [
            {"cause_name": "Work pressure", "cause_suggestion": "Breaks", "explanation": "Deadlines"}
        ]}}}]);
        let as_string = json!([{"message": {"content":
            "```json\n{\"potential_causes\": [{\"cause_name\": \"Work pressure\"}]}\n```"
        }}]);
        let a = parse_potential_causes(&as_object)?;
        let b = parse_potential_causes(&as_string)?;
        assert_eq!(a[0].cause_name, "Work pressure");
        assert_eq!(a[0].cause_id, "cause-1");
        assert_eq!(b[0].cause_name, "Work pressure");
        Ok(())
    }

    #[test]
    fn payload_may_be_nested_under_data() -> Result<(), RecipeError> {
        let response = json!([{"message": {"content": {"data": {"potential_symptoms": [
            {"symptom_id": "s9", "symptom_name": "Racing thoughts"}
        ]}}}}]);
        let symptoms = parse_potential_symptoms(&response)?;
        assert_eq!(symptoms[0].symptom_id, "s9");
        Ok(())
    }

    #[test]
    fn out_of_range_relevancy_is_malformed() {
        let response = json!([{"message": {"content": {"therapeutic_properties": [
            {"property_name": "Calming", "relevancy": 9}
        ]}}}]);
        assert!(matches!(
            parse_therapeutic_properties(&response),
            Err(RecipeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_content_is_malformed() {
        assert!(extract_content(&json!([])).is_err());
        assert!(extract_content(&json!([{"message": {}}])).is_err());
        assert!(extract_content(&json!("text")).is_err());
    }

    #[test]
    fn request_body_validation() {
        let ok = json!({"feature": "create-recipe", "step": "PotentialCauses",
            "data": {"health_concern": "stress"}});
        assert_eq!(validate_request_body(&ok).ok(), Some(ApiStep::PotentialCauses));

        let unknown = json!({"feature": "create-recipe", "step": "Nope",
            "data": {"health_concern": "stress"}});
        assert!(validate_request_body(&unknown).is_err());

        let no_data = json!({"feature": "create-recipe", "step": "PotentialCauses"});
        assert!(validate_request_body(&no_data).is_err());

        let blank = json!({"feature": "create-recipe", "step": "PotentialCauses",
            "data": {"health_concern": "  "}});
        assert!(validate_request_body(&blank).is_err());
    }
}
