// Shared helpers for the essence-core integration tests.
// Included from each test file with #[path = "support.rs"].
#![allow(dead_code)]

use essence_core::client::{Sleeper, Transport, TransportError, TransportResponse};
use essence_core::model::{
    AgeCategory, Demographics, Gender, PotentialCause, PotentialSymptom, TherapeuticProperty,
};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<TransportResponse, TransportError>;

/// Transport answering from a closure and recording every request body.
pub struct MockWebhook {
    respond: Box<dyn Fn(&Value, usize) -> Reply + Send + Sync>,
    requests: Mutex<Vec<Value>>,
}

impl MockWebhook {
    pub fn new(respond: impl Fn(&Value, usize) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies taken in order; extra calls get a network error.
    pub fn scripted(replies: Vec<Reply>) -> Self {
        Self::new(move |_, n| {
            replies
                .get(n)
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into())))
        })
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl Transport for MockWebhook {
    fn post_json(&self, _url: &str, body: &Value, _timeout: Duration) -> Reply {
        let n = {
            let mut requests = self.requests.lock().expect("requests lock");
            requests.push(body.clone());
            requests.len() - 1
        };
        (self.respond)(body, n)
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().expect("sleeper lock").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().expect("sleeper lock").push(duration);
    }
}

pub fn status(code: u16, body: &str) -> Reply {
    Ok(TransportResponse {
        status: code,
        body: body.to_string(),
    })
}

/// A 200 whose `message.content` is `content`.
pub fn content_reply(content: &Value) -> Reply {
    status(200, &json!([{ "message": { "content": content } }]).to_string())
}

pub fn adult_woman() -> Demographics {
    Demographics {
        gender: Gender::Female,
        age_category: AgeCategory::Adult,
        specific_age: 28,
    }
}

pub fn causes(n: usize) -> Vec<PotentialCause> {
    (1..=n)
        .map(|i| PotentialCause {
            cause_id: format!("c{i}"),
            cause_name: format!("Cause {i}"),
            cause_suggestion: format!("Suggestion {i}"),
            explanation: format!("Explanation {i}"),
        })
        .collect()
}

pub fn symptoms(n: usize) -> Vec<PotentialSymptom> {
    (1..=n)
        .map(|i| PotentialSymptom {
            symptom_id: format!("s{i}"),
            symptom_name: format!("Symptom {i}"),
            symptom_suggestion: String::new(),
            explanation: String::new(),
        })
        .collect()
}

pub fn properties(n: usize) -> Vec<TherapeuticProperty> {
    (1..=n)
        .map(|i| TherapeuticProperty {
            property_id: format!("p{i}"),
            property_name: format!("Property {i}"),
            property_name_localized: None,
            description: String::new(),
            relevancy: 4,
            addresses_cause_ids: vec!["c1".into()],
            addresses_symptom_ids: vec!["s1".into()],
        })
        .collect()
}

/// Webhook content payload for `step`, shaped like the live service.
pub fn payload_for(step: &str) -> Value {
    match step {
        "PotentialCauses" => json!({ "potential_causes": serde_json::to_value(causes(6)).expect("causes") }),
        "PotentialSymptoms" => json!({ "potential_symptoms": serde_json::to_value(symptoms(4)).expect("symptoms") }),
        "MedicalProperties" => json!({ "therapeutic_properties": serde_json::to_value(properties(3)).expect("properties") }),
        "SuggestedOils" => json!({ "suggested_oils": [
            { "oil_id": "lavender", "name_english": "Lavender", "match_rationale": "calming", "relevancy": 5 },
            { "oil_id": "bergamot", "name_english": "Bergamot", "match_rationale": "uplifting", "relevancy": 4 }
        ]}),
        other => json!({ "unexpected": other }),
    }
}

/// Mock that answers every step like a healthy webhook.
pub fn healthy_webhook() -> MockWebhook {
    MockWebhook::new(|body, _| {
        let step = body["step"].as_str().unwrap_or_default();
        content_reply(&payload_for(step))
    })
}
