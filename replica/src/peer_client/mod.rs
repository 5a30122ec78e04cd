//! Clients for other replicas' root hash endpoints.
//!
//! This module provides concrete implementations of the
//! [`crate::checkpoint::PeerRootHashClient`] trait. Peers are addressed by
//! the base URL of their query gateway.

pub mod http;

pub use http::HttpPeerClient;
