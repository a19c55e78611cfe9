use super::protocol::*;
use crate::error::PeerError;
use crate::metadata::types::FileId;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Attempts per peer call: the first try plus one retry.
const ATTEMPTS: usize = 2;
const RETRY_DELAY_MS: u64 = 150;

/// A peer's answer to a capacity query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityAnswer {
    pub space_left: i64,
    pub accepted: bool,
}

/// Outbound calls to other nodes.
///
/// Every call is bounded by a timeout; a peer that stays silent after the retry
/// yields [`PeerError::Unreachable`] so callers can move on to the next peer.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Does `peer` hold a local copy of `file_id`?
    async fn file_exists(&self, peer: &str, file_id: &FileId) -> Result<bool, PeerError>;

    /// Writes `bytes` to `peer` under `file_id`. Returns the peer's status code;
    /// `201` means the copy was stored.
    async fn clone_file(
        &self,
        peer: &str,
        file_id: &FileId,
        bytes: Vec<u8>,
        origin: &str,
    ) -> Result<u16, PeerError>;

    /// Asks whether `peer` can fit `file_size` more bytes.
    async fn query_capacity(&self, peer: &str, file_size: u64) -> Result<CapacityAnswer, PeerError>;
}

/// [`PeerClient`] speaking the node HTTP API through reqwest.
pub struct HttpPeerClient {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Sends the request built by `build`, retrying once on transport errors.
    /// Any HTTP response, whatever its status, counts as the peer answering.
    async fn send_with_retry<F>(&self, peer: &str, build: F) -> Result<reqwest::Response, PeerError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut last_error = String::new();

        for attempt in 0..ATTEMPTS {
            match build(&self.http_client).timeout(self.timeout).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    tracing::debug!("Call to {} failed (attempt {}): {}", peer, attempt + 1, e);
                    last_error = e.to_string();
                    if attempt + 1 < ATTEMPTS {
                        let jitter = rand::random::<u64>() % 50;
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS + jitter)).await;
                    }
                }
            }
        }

        Err(PeerError::Unreachable {
            peer: peer.to_string(),
            reason: last_error,
        })
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn file_exists(&self, peer: &str, file_id: &FileId) -> Result<bool, PeerError> {
        let url = format!("http://{}{}", peer, ENDPOINT_FILE_EXISTS);
        let response = self
            .send_with_retry(peer, |client| {
                client.get(&url).query(&[("uuid", file_id.as_str())])
            })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(PeerError::Protocol {
                peer: peer.to_string(),
                reason: format!("existence probe returned {}", other),
            }),
        }
    }

    async fn clone_file(
        &self,
        peer: &str,
        file_id: &FileId,
        bytes: Vec<u8>,
        origin: &str,
    ) -> Result<u16, PeerError> {
        let url = format!("http://{}{}", peer, ENDPOINT_WRITE);
        let response = self
            .send_with_retry(peer, |client| {
                // Forms are single-use, so each attempt builds its own.
                let part = Part::bytes(bytes.clone()).file_name(file_id.to_string());
                client
                    .post(&url)
                    .query(&[("uuid", file_id.as_str()), ("ip", origin)])
                    .multipart(Form::new().part(MULTIPART_FILE_FIELD, part))
            })
            .await?;

        Ok(response.status().as_u16())
    }

    async fn query_capacity(&self, peer: &str, file_size: u64) -> Result<CapacityAnswer, PeerError> {
        let url = format!("http://{}{}", peer, ENDPOINT_CAN_MOVE_FILE);
        let size = file_size.to_string();
        let response = self
            .send_with_retry(peer, |client| {
                client.get(&url).query(&[("file_size", size.as_str())])
            })
            .await?;

        let status = response.status();
        let accepted = match status {
            StatusCode::OK => true,
            StatusCode::PAYLOAD_TOO_LARGE => false,
            other => {
                return Err(PeerError::Protocol {
                    peer: peer.to_string(),
                    reason: format!("capacity query returned {}", other),
                });
            }
        };

        let body = response.text().await.map_err(|e| PeerError::Protocol {
            peer: peer.to_string(),
            reason: format!("capacity body unreadable: {}", e),
        })?;
        let space_left = body.trim().parse::<i64>().map_err(|e| PeerError::Protocol {
            peer: peer.to_string(),
            reason: format!("capacity body {:?} is not a number: {}", body, e),
        })?;

        Ok(CapacityAnswer {
            space_left,
            accepted,
        })
    }
}
