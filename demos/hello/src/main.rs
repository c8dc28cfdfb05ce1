//! p2p-session hello demo
//!
//! Plays one side of a negotiated link. The owner greets the member as soon
//! as the session is connected; the member prints what it receives and
//! closes.
//!
//! Environment variables:
//! - P2P_ROLE: "owner" or "member" (default owner)
//! - P2P_OWNER_HOST: owner address on the link (default 127.0.0.1)
//! - P2P_MESSAGE: greeting sent by the owner (default "hello")
//! - P2P_PORT, P2P_LISTEN_HOST, ...: session configuration
//! - RUST_LOG: log filter (default info)

use std::net::{IpAddr, Ipv4Addr};

use anyhow::{Context, Result};
use p2p_session::prelude::*;
use tracing::{info, warn};

const DEFAULT_MESSAGE: &str = "hello";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let role: Role = std::env::var("P2P_ROLE")
        .unwrap_or_else(|_| "owner".into())
        .parse()
        .map_err(anyhow::Error::msg)
        .context("P2P_ROLE must be owner or member")?;
    let owner: IpAddr = match std::env::var("P2P_OWNER_HOST") {
        Ok(host) => host.parse().context("P2P_OWNER_HOST is not an IP address")?,
        Err(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
    };
    let greeting = std::env::var("P2P_MESSAGE").unwrap_or_else(|_| DEFAULT_MESSAGE.into());

    let config = SessionConfig::from_env().context("invalid P2P_* configuration")?;
    info!(%role, %owner, port = config.port, "starting");

    let (handle, mut events) = SessionManager::spawn(config)?;
    handle.negotiation_ready(role, owner, true)?;

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            SessionEvent::Listening { addr, .. } => info!(%addr, "waiting for the member"),
            SessionEvent::Retrying { attempt, delay, .. } => {
                info!(attempt, ?delay, "owner not reachable yet")
            }
            SessionEvent::StateChanged { state, .. } => match state {
                SessionState::Connected if role.is_owner() => {
                    handle.send_message(greeting.as_str()).await?;
                    info!(message = %greeting, "greeting sent");
                }
                SessionState::Closed => break,
                SessionState::Failed(reason) => {
                    warn!(%reason, "session failed");
                    break;
                }
                state => info!(%state, "session state"),
            },
            SessionEvent::MessageReceived { payload, .. } => {
                println!("{}", String::from_utf8_lossy(&payload));
                handle.close()?;
            }
            other => info!(event = ?other, "event"),
        }
    }

    handle.shutdown().await?;
    Ok(())
}
