use essence_core::client::{RetryPolicy, TransportError, WebhookClient};
use essence_core::model::HealthConcern;
use essence_core::{RecipeError, WizardState};
use essence_core::store::SessionId;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

#[path = "support.rs"]
mod support;
use support::*;

fn client_over(webhook: &Arc<MockWebhook>, sleeper: &Arc<RecordingSleeper>) -> WebhookClient {
    WebhookClient::new("http://webhook.test/create-recipe", Arc::clone(webhook) as _)
        .with_sleeper(Arc::clone(sleeper) as _)
}

fn properties_ready() -> WizardState {
    let mut state = WizardState::initial(SessionId::from("ses-retry"));
    state.health_concern = Some(HealthConcern::new("chronic anxiety and stress"));
    state.demographics = Some(adult_woman());
    state.selected_causes = causes(2);
    state.selected_symptoms = symptoms(2);
    state.therapeutic_properties = properties(3);
    state
}

#[test]
fn two_unavailable_then_ok_takes_three_requests() {
    let webhook = Arc::new(MockWebhook::scripted(vec![
        status(503, "busy"),
        status(503, "busy"),
        content_reply(&json!({ "potential_causes": [] })),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let policy = RetryPolicy::default();

    let answer = client_over(&webhook, &sleeper)
        .with_policy(policy)
        .send_value(&json!({ "feature": "create-recipe", "step": "PotentialCauses" }))
        .expect("third attempt succeeds");

    assert_eq!(webhook.request_count(), 3);
    assert_eq!(answer[0]["message"]["content"], json!({ "potential_causes": [] }));

    let delays = sleeper.delays();
    assert_eq!(delays.len(), 2);
    assert!(delays[0] >= policy.base_delay);
    assert!(delays[1] >= policy.base_delay.mul_f64(policy.multiplier));
}

#[test]
fn exhausted_retries_surface_the_last_status() {
    let webhook = Arc::new(MockWebhook::scripted(vec![
        status(500, "boom"),
        status(502, "bad gateway"),
        status(503, "unavailable"),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());

    let err = client_over(&webhook, &sleeper)
        .send_value(&json!({}))
        .expect_err("all attempts fail");

    assert!(matches!(err, RecipeError::Upstream { status: 503, .. }), "{err:?}");
    assert_eq!(webhook.request_count(), 3);
    assert_eq!(sleeper.delays().len(), 2);
}

#[test]
fn rate_limit_is_retried() {
    let webhook = Arc::new(MockWebhook::scripted(vec![
        status(429, "slow down"),
        status(200, "[]"),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let answer = client_over(&webhook, &sleeper)
        .send_value(&json!({}))
        .expect("second attempt succeeds");
    assert_eq!(answer, json!([]));
    assert_eq!(webhook.request_count(), 2);
}

#[test]
fn timeout_stops_retrying() {
    let webhook = Arc::new(MockWebhook::scripted(vec![
        Err(TransportError::Timeout(Duration::from_secs(30))),
        status(200, "[]"),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let err = client_over(&webhook, &sleeper)
        .send_value(&json!({}))
        .expect_err("timeout surfaces");
    assert_eq!(err.code().code(), "E3003");
    assert_eq!(webhook.request_count(), 1);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn oil_fanout_sends_one_request_per_property() {
    let webhook = Arc::new(healthy_webhook());
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = properties_ready();

    let fanout = client_over(&webhook, &sleeper)
        .fetch_suggested_oils(&state)
        .expect("all properties answer");

    assert_eq!(webhook.request_count(), 3);
    assert!(!fanout.is_partial());
    let ids: Vec<&str> = fanout
        .suggestions
        .iter()
        .map(|s| s.property_id.as_str())
        .collect();
    assert_eq!(ids, ["p1", "p2", "p3"]);
    assert_eq!(fanout.suggestions[0].suggested_oils[0].name_english, "Lavender");

    let mut asked: Vec<String> = webhook
        .requests()
        .iter()
        .map(|r| r["data"]["therapeutic_property"]["property_id"].as_str().unwrap_or_default().to_string())
        .collect();
    asked.sort();
    assert_eq!(asked, ["p1", "p2", "p3"]);
}

#[test]
fn oil_fanout_accepts_partial_success() {
    let webhook = Arc::new(MockWebhook::new(|body: &Value, _| {
        let property = body["data"]["therapeutic_property"]["property_id"]
            .as_str()
            .unwrap_or_default();
        if property == "p2" {
            status(400, "property rejected")
        } else {
            content_reply(&payload_for("SuggestedOils"))
        }
    }));
    let sleeper = Arc::new(RecordingSleeper::default());

    let fanout = client_over(&webhook, &sleeper)
        .fetch_suggested_oils(&properties_ready())
        .expect("two of three succeed");

    assert!(fanout.is_partial());
    assert_eq!(fanout.suggestions.len(), 2);
    assert_eq!(fanout.failed.len(), 1);
    assert_eq!(fanout.failed[0].property_id, "p2");
    assert_eq!(fanout.failed[0].code, "E3001");
}

#[test]
fn oil_fanout_fails_when_every_property_fails() {
    let webhook = Arc::new(MockWebhook::new(|_, _| status(404, "gone")));
    let sleeper = Arc::new(RecordingSleeper::default());

    let err = client_over(&webhook, &sleeper)
        .with_policy(RetryPolicy::none())
        .fetch_suggested_oils(&properties_ready())
        .expect_err("nothing succeeded");

    assert!(matches!(err, RecipeError::Upstream { .. }), "{err:?}");
    assert_eq!(webhook.request_count(), 3);
}
