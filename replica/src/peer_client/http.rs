//! HTTP-based peer root hash client.
//!
//! This implementation of [`crate::checkpoint::PeerRootHashClient`] talks to
//! the query gateway of another replica:
//!
//! ```text
//! GET {peer}/rootHash?blockNumber=10
//!
//! 200 OK
//! 3f1c...e9 (hex-encoded digest)
//! ```
//!
//! A `200` body that is not valid hex is kept as raw bytes; it can never
//! match a local digest but still counts as an answer. Any other status is
//! a peer that does not know the block, and transport errors are retried
//! up to the configured number of attempts.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::checkpoint::PeerRootHashClient;
use crate::config::PeerClientConfig;
use crate::types::{PeerId, PeerVote};

/// HTTP client asking peers for their digest at a height.
///
/// This client is cheap to share (`reqwest::Client` is reference counted)
/// and safe to use from concurrent validation queries.
pub struct HttpPeerClient {
    client: Client,
    config: PeerClientConfig,
}

impl HttpPeerClient {
    pub fn new(config: PeerClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PeerClientConfig {
        &self.config
    }
}

/// Builds the root hash URL for `peer`, defaulting the scheme to `http`.
fn root_hash_url(peer: &PeerId, block_number: u64) -> String {
    let base = peer.as_str().trim_end_matches('/');
    if base.contains("://") {
        format!("{base}/rootHash?blockNumber={block_number}")
    } else {
        format!("http://{base}/rootHash?blockNumber={block_number}")
    }
}

/// Decodes a hex digest body, falling back to the raw bytes.
fn decode_digest(body: &[u8]) -> Vec<u8> {
    let decoded = std::str::from_utf8(body).ok().and_then(|text| {
        let text = text.trim();
        let text = text.strip_prefix("0x").unwrap_or(text);
        hex::decode(text).ok()
    });
    decoded.unwrap_or_else(|| body.to_vec())
}

#[async_trait]
impl PeerRootHashClient for HttpPeerClient {
    async fn query(&self, peer: &PeerId, block_number: u64) -> PeerVote {
        let url = root_hash_url(peer, block_number);
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(%peer, block = block_number, attempt, error = %e, "peer request failed");
                    continue;
                }
            };

            let status = response.status();
            if status != StatusCode::OK {
                debug!(%peer, block = block_number, %status, "peer has no digest for block");
                return PeerVote::no_response(peer.clone());
            }

            match response.bytes().await {
                Ok(body) => return PeerVote::responded(peer.clone(), decode_digest(&body)),
                Err(e) => {
                    debug!(%peer, block = block_number, attempt, error = %e, "failed to read peer response");
                }
            }
        }

        PeerVote::no_response(peer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::{Router, extract::Query, http::StatusCode as AxumStatus, routing::get};

    #[test]
    fn url_defaults_to_http_and_trims_slashes() {
        assert_eq!(
            root_hash_url(&PeerId::from("10.0.0.2:8081"), 5),
            "http://10.0.0.2:8081/rootHash?blockNumber=5"
        );
        assert_eq!(
            root_hash_url(&PeerId::from("https://replica-b.example/"), 7),
            "https://replica-b.example/rootHash?blockNumber=7"
        );
    }

    #[test]
    fn hex_bodies_are_decoded_and_others_kept_raw() {
        assert_eq!(decode_digest(b"00ff10\n"), vec![0x00, 0xff, 0x10]);
        assert_eq!(decode_digest(b"0xabcd"), vec![0xab, 0xcd]);
        assert_eq!(decode_digest(b"not hex"), b"not hex".to_vec());
    }

    async fn spawn_peer() -> String {
        async fn root_hash(
            Query(params): Query<HashMap<String, String>>,
        ) -> (AxumStatus, String) {
            match params.get("blockNumber").map(String::as_str) {
                Some("5") => (AxumStatus::OK, "0a0b0c".to_string()),
                _ => (AxumStatus::BAD_REQUEST, "unknown block".to_string()),
            }
        }

        let app = Router::new().route("/rootHash", get(root_hash));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    fn client() -> HttpPeerClient {
        HttpPeerClient::new(PeerClientConfig {
            request_timeout: Duration::from_millis(500),
            max_attempts: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn known_block_yields_decoded_digest() {
        let peer = PeerId(spawn_peer().await);
        let vote = client().query(&peer, 5).await;
        assert_eq!(vote, PeerVote::responded(peer, vec![0x0a, 0x0b, 0x0c]));
    }

    #[tokio::test]
    async fn error_status_counts_as_no_response() {
        let peer = PeerId(spawn_peer().await);
        let vote = client().query(&peer, 6).await;
        assert!(!vote.responded);
    }

    #[tokio::test]
    async fn unreachable_peer_counts_as_no_response() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let vote = client().query(&PeerId(addr.to_string()), 5).await;
        assert_eq!(vote, PeerVote::no_response(PeerId(addr.to_string())));
    }
}
