use essence_core::{EssenceConfig, RecipeError, WebhookClient};
use serde_json::Value;

/// Sends a validated request body upstream and returns the raw answer.
///
/// Called from a blocking worker thread, never on the async executor.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(&self, body: &Value) -> Result<Value, RecipeError>;
}

/// Production forwarder over the retrying webhook client.
#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    client: WebhookClient,
}

impl WebhookForwarder {
    #[must_use]
    pub const fn new(client: WebhookClient) -> Self {
        Self { client }
    }
}

impl Forwarder for WebhookForwarder {
    fn forward(&self, body: &Value) -> Result<Value, RecipeError> {
        self.client.send_value(body)
    }
}

/// Stand-in when no webhook URL is configured. Answers every request with
/// the configuration error so the server can still start and report health.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
}

impl Forwarder for Unconfigured {
    fn forward(&self, _body: &Value) -> Result<Value, RecipeError> {
        Err(RecipeError::Config(self.reason.clone()))
    }
}

/// Forwarder for `config`: the webhook client if a URL is set, otherwise
/// [`Unconfigured`].
#[must_use]
pub fn from_config(config: &EssenceConfig) -> Box<dyn Forwarder> {
    match config.webhook_client() {
        Ok(client) => Box::new(WebhookForwarder::new(client)),
        Err(RecipeError::Config(reason)) => Box::new(Unconfigured { reason }),
        Err(other) => Box::new(Unconfigured {
            reason: other.to_string(),
        }),
    }
}
