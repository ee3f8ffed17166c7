//! Blocking webhook client with retry and the per-property oil fan-out.

mod retry;
mod transport;

pub use retry::{RetryPolicy, Sleeper, ThreadSleeper, is_retryable_status};
pub use transport::{Transport, TransportError, TransportResponse, UreqTransport};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RecipeError;
use crate::model::{
    PotentialCause, PotentialSymptom, PropertyOilSuggestion, TherapeuticProperty,
};
use crate::store::WizardState;
use crate::webhook::{self, ApiStep, RecipeRequest};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_LANGUAGE: &str = "en";

/// Upstream error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    timeout: Duration,
    user_language: String,
    policy: RetryPolicy,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("user_language", &self.user_language)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// One property whose oil request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OilFailure {
    pub property_id: String,
    pub property_name: String,
    pub code: &'static str,
    pub message: String,
}

/// Aggregate of the per-property oil requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OilFanout {
    pub suggestions: Vec<PropertyOilSuggestion>,
    pub failed: Vec<OilFailure>,
}

impl OilFanout {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl WebhookClient {
    #[must_use]
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_language: DEFAULT_USER_LANGUAGE.to_string(),
            policy: RetryPolicy::default(),
            transport,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Production client over [`UreqTransport`].
    #[must_use]
    pub fn http(url: impl Into<String>) -> Self {
        Self::new(url, Arc::new(UreqTransport::new()))
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_user_language(mut self, language: impl Into<String>) -> Self {
        self.user_language = language.into();
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn user_language(&self) -> &str {
        &self.user_language
    }

    pub fn send(&self, request: &RecipeRequest) -> Result<Value, RecipeError> {
        let body = serde_json::to_value(request)
            .map_err(|e| RecipeError::validation("request", e.to_string()))?;
        self.send_value(&body)
    }

    /// POST `body` with retries. Returns the decoded JSON of the first 2xx.
    pub fn send_value(&self, body: &Value) -> Result<Value, RecipeError> {
        let attempts = self.policy.attempts();
        let step = body.get("step").and_then(Value::as_str).unwrap_or("?");
        let mut attempt = 0;
        loop {
            let last_attempt = attempt + 1 >= attempts;
            let failure = match self.transport.post_json(&self.url, body, self.timeout) {
                Ok(response) if response.is_success() => {
                    debug!(step, status = response.status, attempt, "webhook answered");
                    return serde_json::from_str(&response.body).map_err(|e| {
                        RecipeError::MalformedResponse(format!("body is not JSON: {e}"))
                    });
                }
                Ok(response) => {
                    let err = RecipeError::Upstream {
                        status: response.status,
                        message: truncate(&response.body, ERROR_BODY_LIMIT),
                    };
                    if !is_retryable_status(response.status) {
                        return Err(err);
                    }
                    err
                }
                Err(TransportError::Timeout(waited)) => {
                    warn!(step, ?waited, "webhook timed out");
                    return Err(RecipeError::Timeout(waited));
                }
                Err(TransportError::Network(message)) => RecipeError::Network(message),
            };

            if last_attempt {
                warn!(step, attempts, error = %failure, "webhook failed, giving up");
                return Err(failure);
            }
            let delay = self.policy.delay_for(attempt);
            info!(step, attempt = attempt + 1, ?delay, error = %failure, "retrying webhook");
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }

    pub fn fetch_potential_causes(
        &self,
        state: &WizardState,
    ) -> Result<Vec<PotentialCause>, RecipeError> {
        let request = RecipeRequest::for_step(state, ApiStep::PotentialCauses, &self.user_language)?;
        webhook::parse_potential_causes(&self.send(&request)?)
    }

    pub fn fetch_potential_symptoms(
        &self,
        state: &WizardState,
    ) -> Result<Vec<PotentialSymptom>, RecipeError> {
        let request =
            RecipeRequest::for_step(state, ApiStep::PotentialSymptoms, &self.user_language)?;
        webhook::parse_potential_symptoms(&self.send(&request)?)
    }

    pub fn fetch_therapeutic_properties(
        &self,
        state: &WizardState,
    ) -> Result<Vec<TherapeuticProperty>, RecipeError> {
        let request =
            RecipeRequest::for_step(state, ApiStep::MedicalProperties, &self.user_language)?;
        webhook::parse_therapeutic_properties(&self.send(&request)?)
    }

    fn fetch_oils_for(
        &self,
        state: &WizardState,
        property: &TherapeuticProperty,
    ) -> Result<PropertyOilSuggestion, RecipeError> {
        let request = RecipeRequest::for_property(state, property, &self.user_language)?;
        let oils = webhook::parse_suggested_oils(&self.send(&request)?)?;
        Ok(PropertyOilSuggestion {
            property_id: property.property_id.clone(),
            property_name: property.property_name.clone(),
            suggested_oils: oils,
        })
    }

    /// One request per therapeutic property, all in flight at once.
    ///
    /// Succeeds when at least one property got oils back. Results keep the
    /// order of `state.therapeutic_properties`.
    pub fn fetch_suggested_oils(&self, state: &WizardState) -> Result<OilFanout, RecipeError> {
        let properties = &state.therapeutic_properties;
        if properties.is_empty() {
            return Err(RecipeError::validation(
                "therapeutic properties",
                "must not be empty",
            ));
        }

        let results: Vec<Result<PropertyOilSuggestion, RecipeError>> = thread::scope(|scope| {
            let handles: Vec<_> = properties
                .iter()
                .map(|property| scope.spawn(move || self.fetch_oils_for(state, property)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(RecipeError::Network("oil request worker panicked".into()))
                    })
                })
                .collect()
        });

        let mut fanout = OilFanout {
            suggestions: Vec::new(),
            failed: Vec::new(),
        };
        for (property, result) in properties.iter().zip(results) {
            match result {
                Ok(suggestion) => fanout.suggestions.push(suggestion),
                Err(e) => {
                    warn!(property = %property.property_id, error = %e, "oil request failed");
                    fanout.failed.push(OilFailure {
                        property_id: property.property_id.clone(),
                        property_name: property.property_name.clone(),
                        code: e.code().code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if fanout.suggestions.is_empty() {
            let detail = fanout
                .failed
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_default();
            return Err(RecipeError::Upstream {
                status: 502,
                message: format!(
                    "all {} oil requests failed; first: {detail}",
                    fanout.failed.len()
                ),
            });
        }
        info!(
            ok = fanout.suggestions.len(),
            failed = fanout.failed.len(),
            "oil fan-out finished"
        );
        Ok(fanout)
    }
}

fn truncate(body: &str, limit: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<TransportResponse, TransportError>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<TransportResponse, TransportError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("calls lock")
        }
    }

    impl Transport for Scripted {
        fn post_json(
            &self,
            _url: &str,
            _body: &Value,
            _timeout: Duration,
        ) -> Result<TransportResponse, TransportError> {
            *self.calls.lock().expect("calls lock") += 1;
            self.replies
                .lock()
                .expect("replies lock")
                .pop()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into())))
        }
    }

    #[derive(Default)]
    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    fn status(code: u16, body: &str) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: code,
            body: body.to_string(),
        })
    }

    fn client(transport: &Arc<Scripted>) -> WebhookClient {
        let dyn_transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
        WebhookClient::new("http://webhook.test/hook", dyn_transport).with_sleeper(Arc::new(NoSleep))
    }

    #[test]
    fn client_error_is_not_retried() {
        let transport = Arc::new(Scripted::new(vec![status(422, "bad step")]));
        let err = client(&transport)
            .send_value(&json!({"step": "PotentialCauses"}))
            .expect_err("422 surfaces");
        assert!(matches!(err, RecipeError::Upstream { status: 422, .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn timeout_is_surfaced_without_retry() {
        let transport = Arc::new(Scripted::new(vec![
            Err(TransportError::Timeout(Duration::from_secs(30))),
            status(200, "[]"),
        ]));
        let err = client(&transport)
            .send_value(&json!({}))
            .expect_err("timeout surfaces");
        assert!(matches!(err, RecipeError::Timeout(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn network_errors_exhaust_attempts() {
        let transport = Arc::new(Scripted::new(vec![
            Err(TransportError::Network("refused".into())),
            Err(TransportError::Network("refused".into())),
            Err(TransportError::Network("refused".into())),
        ]));
        let err = client(&transport).send_value(&json!({})).expect_err("fails");
        assert!(matches!(err, RecipeError::Network(_)));
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn non_json_success_is_malformed() {
        let transport = Arc::new(Scripted::new(vec![status(200, "<html>")]));
        let err = client(&transport).send_value(&json!({})).expect_err("not json");
        assert!(matches!(err, RecipeError::MalformedResponse(_)));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let long = "x".repeat(500);
        let cut = truncate(&long, ERROR_BODY_LIMIT);
        assert_eq!(cut.len(), ERROR_BODY_LIMIT + 3);
        assert_eq!(truncate(" short ", ERROR_BODY_LIMIT), "short");
    }
}
