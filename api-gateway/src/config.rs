//! API gateway configuration.
//!
//! Only the HTTP listen address lives here; everything about the embedded
//! replica comes from [`replica::NodeArgs`].

use std::net::SocketAddr;

use clap::Args;

/// Configuration for the API gateway HTTP server.
#[derive(Args, Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to. All interfaces by default, so a
    /// container port mapping reaches it.
    #[arg(long = "listen", env = "GATEWAY_LISTEN", default_value = "0.0.0.0:8081")]
    pub listen_addr: SocketAddr,
}
