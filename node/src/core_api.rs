//! HTTP submitter for a node's Core API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use gateway_mempool::{Rejection, SubmitAccepted, SubmitError, TransactionSubmitter};
use gateway_types::{NetworkId, NodeName};

use crate::config::NodeConfig;
use crate::GatewayError;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    network: &'a str,
    notarized_transaction_hex: String,
}

/// Submits transactions with `POST {core_api_url}/transaction/submit`.
pub struct CoreApiSubmitter {
    client: Client,
    network: NetworkId,
    base_urls: HashMap<NodeName, String>,
}

impl CoreApiSubmitter {
    pub fn new(
        network: NetworkId,
        nodes: &[NodeConfig],
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build Core API client: {}", e)))?;

        let mut base_urls = HashMap::new();
        for node in nodes {
            let name = NodeName::new(&node.name).map_err(|e| GatewayError::Config(e.to_string()))?;
            base_urls.insert(name, node.core_api_url.trim_end_matches('/').to_string());
        }
        Ok(Self {
            client,
            network,
            base_urls,
        })
    }

    fn endpoint(&self, node: &NodeName) -> Result<String, SubmitError> {
        self.base_urls
            .get(node)
            .map(|base| format!("{}/transaction/submit", base))
            .ok_or_else(|| SubmitError::Transport(format!("no Core API URL for node {}", node)))
    }
}

#[async_trait]
impl TransactionSubmitter for CoreApiSubmitter {
    async fn submit(&self, node: &NodeName, payload: &[u8]) -> Result<SubmitAccepted, SubmitError> {
        let url = self.endpoint(node)?;
        let request = SubmitRequest {
            network: self.network.as_str(),
            notarized_transaction_hex: hex::encode(payload),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(node = %node, status = status.as_u16(), "Core API submit response");
        classify_response(status, &body)
    }
}

fn transport_error(e: reqwest::Error) -> SubmitError {
    if e.is_timeout() {
        SubmitError::Timeout
    } else {
        SubmitError::Transport(e.to_string())
    }
}

/// Interpret a submit response.
///
/// Client errors are definitive rejections; a rejection naming a substate
/// dependency or conflict may mean the transaction itself already committed.
/// Server errors say nothing about whether the node took the transaction.
pub fn classify_response(status: StatusCode, body: &str) -> Result<SubmitAccepted, SubmitError> {
    if status.is_success() {
        let duplicate = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("duplicate").and_then(Value::as_bool))
            .unwrap_or(false);
        return Ok(SubmitAccepted { duplicate });
    }

    let message = error_message(body);
    if status.is_client_error() {
        let lowered = body.to_ascii_lowercase();
        let rejection = if lowered.contains("substate") || lowered.contains("conflict") {
            Rejection::SubstateConflict(message)
        } else {
            Rejection::Permanent(message)
        };
        return Err(SubmitError::Rejected(rejection));
    }

    Err(SubmitError::Transport(format!("{}: {}", status, message)))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_reads_duplicate_flag() {
        assert_eq!(
            classify_response(StatusCode::OK, r#"{"duplicate": true}"#),
            Ok(SubmitAccepted { duplicate: true })
        );
        assert_eq!(
            classify_response(StatusCode::OK, ""),
            Ok(SubmitAccepted { duplicate: false })
        );
    }

    #[test]
    fn substate_rejection_is_a_conflict() {
        let body = r#"{"code": 400, "message": "input already spent", "details": {"type": "SubstateDependencyNotFound"}}"#;
        assert_eq!(
            classify_response(StatusCode::BAD_REQUEST, body),
            Err(SubmitError::Rejected(Rejection::SubstateConflict(
                "input already spent".to_string()
            )))
        );
    }

    #[test]
    fn other_client_errors_are_permanent() {
        let result = classify_response(StatusCode::BAD_REQUEST, r#"{"message": "invalid signature"}"#);
        assert_eq!(
            result,
            Err(SubmitError::Rejected(Rejection::Permanent(
                "invalid signature".to_string()
            )))
        );
    }

    #[test]
    fn server_errors_are_inconclusive() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(err.is_inconclusive());
    }

    #[test]
    fn unknown_node_has_no_endpoint() {
        let submitter =
            CoreApiSubmitter::new(NetworkId::Localnet, &[], Duration::from_secs(1)).unwrap();
        let node = NodeName::new("ghost").unwrap();
        assert!(matches!(submitter.endpoint(&node), Err(SubmitError::Transport(_))));
    }
}
