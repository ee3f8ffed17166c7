use serde_json::Value;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Raw HTTP answer from the webhook, any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Network(String),
}

/// One POST of a JSON body. Implementations must give up after `timeout`.
pub trait Transport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Blocking transport on a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    #[must_use]
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("essence/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        debug!(url, ?timeout, "webhook POST");
        let result = self
            .agent
            .post(url)
            .timeout(timeout)
            .set("Accept", "application/json")
            .send_json(body);

        match result {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .map_err(|e| read_failure(&e, timeout))?;
                Ok(TransportResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Ok(TransportResponse {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => {
                let timed_out = std::error::Error::source(&transport)
                    .and_then(|src| src.downcast_ref::<io::Error>())
                    .is_some_and(|e| is_timeout_kind(e.kind()));
                if timed_out {
                    Err(TransportError::Timeout(timeout))
                } else {
                    Err(TransportError::Network(transport.to_string()))
                }
            }
        }
    }
}

fn read_failure(err: &io::Error, timeout: Duration) -> TransportError {
    if is_timeout_kind(err.kind()) {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Network(format!("reading response body: {err}"))
    }
}

const fn is_timeout_kind(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let ok = TransportResponse {
            status: 204,
            body: String::new(),
        };
        let bad = TransportResponse {
            status: 503,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }

    #[test]
    fn refused_connection_is_a_network_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let transport = UreqTransport::new();
        let err = transport
            .post_json(
                "http://127.0.0.1:9/webhook",
                &serde_json::json!({}),
                Duration::from_secs(2),
            )
            .expect_err("nothing listens there");
        assert!(matches!(err, TransportError::Network(_)), "{err:?}");
    }
}
