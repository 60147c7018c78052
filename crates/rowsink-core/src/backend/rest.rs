//! HTTP backend speaking a REST bulk-write protocol.
//!
//! Posts each batch to `/v1/tables/{table}/bulk-write` with optional
//! bearer-token authentication. Connection failures and server errors
//! feed a circuit breaker so a dead endpoint is not hammered; the write
//! buffer itself never retries a hard failure.

use super::{BulkWrite, BulkWriteResponse};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::BackendConfig;
use crate::request::WriteRequest;
use crate::{BackendError, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// REST bulk-write client.
pub struct RestBackend {
    client: Client,
    base_uri: String,
    bearer_token: Option<String>,
    circuit_breaker: CircuitBreaker,
}

impl RestBackend {
    /// Create a new REST backend from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig::from_settings(
            "bulk-write",
            &config.circuit_breaker,
        ));

        info!(endpoint = %config.endpoint, "REST backend initialized");

        Ok(Self {
            client,
            base_uri: config.endpoint.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            circuit_breaker,
        })
    }

    fn bulk_write_url(&self, table: &str) -> String {
        format!(
            "{}/v1/tables/{}/bulk-write",
            self.base_uri,
            urlencoding::encode(table)
        )
    }

    fn map_error_response(status: StatusCode, body: &str) -> Error {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Error::Backend(BackendError::Throttled {
                message: body.to_string(),
            }),
            _ => Error::Backend(BackendError::Rejected {
                status: status.as_u16(),
                message: body.to_string(),
            }),
        }
    }
}

#[async_trait]
impl BulkWrite for RestBackend {
    async fn bulk_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BulkWriteResponse> {
        if !self.circuit_breaker.is_allowed() {
            warn!(table = %table, "Circuit breaker is open, rejecting bulk write");
            return Err(Error::Backend(BackendError::CircuitOpen));
        }

        let url = self.bulk_write_url(table);
        let mut request = self.client.post(&url).json(&requests);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(Error::Backend(BackendError::Connection(e.to_string())));
            }
        };

        let status = response.status();
        if status.is_success() || status.is_client_error() {
            // A 4xx means the endpoint itself is reachable and answering
            self.circuit_breaker.record_success();
        } else {
            self.circuit_breaker.record_failure();
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error_response(status, &body));
        }

        let parsed: BulkWriteResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(BackendError::InvalidResponse(e.to_string())))?;

        debug!(
            table = %table,
            sent = requests.len(),
            fully_processed = parsed.fully_processed(),
            "Bulk write accepted"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerSettings;

    fn backend_config(endpoint: &str) -> BackendConfig {
        BackendConfig {
            endpoint: endpoint.into(),
            request_timeout_seconds: 1,
            bearer_token: None,
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }

    #[test]
    fn test_backend_construction_strips_trailing_slash() {
        let backend = RestBackend::new(&backend_config("http://localhost:8181/")).unwrap();
        assert_eq!(
            backend.bulk_write_url("events"),
            "http://localhost:8181/v1/tables/events/bulk-write"
        );
    }

    #[test]
    fn test_bulk_write_url_encodes_table_name() {
        let backend = RestBackend::new(&backend_config("http://localhost:8181")).unwrap();
        assert_eq!(
            backend.bulk_write_url("my table"),
            "http://localhost:8181/v1/tables/my%20table/bulk-write"
        );
    }

    #[test]
    fn test_throttling_status_maps_to_throttled() {
        let err = RestBackend::map_error_response(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(
            err,
            Error::Backend(BackendError::Throttled { .. })
        ));

        let err = RestBackend::map_error_response(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(
            err,
            Error::Backend(BackendError::Rejected { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_connection_error() {
        // Nothing listens on port 1; the call must surface as a backend
        // connection failure rather than a panic or a hang.
        let backend = RestBackend::new(&backend_config("http://127.0.0.1:1")).unwrap();

        let err = backend.bulk_write("events", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Backend(BackendError::Connection(_))
        ));
        assert_eq!(backend.circuit_breaker.failure_count(), 1);
    }
}
