//! A local transport that writes messages to the log.
//!
//! Lets the launcher run end to end without a network gateway: login always
//! succeeds, outgoing messages are logged, and the session disconnects on
//! Ctrl+C or SIGTERM.

use std::sync::Arc;

use async_trait::async_trait;
use keystone_core::{
    ClientSettings, GatewaySession, Presence, Snowflake, TransportBuilder, TransportClient,
    TransportError, TransportResult,
};
use tokio::signal;
use tracing::{info, warn};

/// Builds [`ConsoleClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl TransportBuilder for ConsoleTransport {
    async fn build(&self, settings: &ClientSettings) -> TransportResult<Arc<dyn TransportClient>> {
        if settings.token.is_empty() {
            return Err(TransportError::BuildFailed("empty token".into()));
        }
        info!(
            rest_timeout_secs = settings.rest_timeout.as_secs(),
            rest_buffer_size = settings.rest_buffer_size,
            message_cache_max_size = ?settings.message_cache_max_size,
            "Console transport ready"
        );
        Ok(Arc::new(ConsoleClient))
    }
}

/// Client that logs every outgoing message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleClient;

#[async_trait]
impl TransportClient for ConsoleClient {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_message(&self, channel: Snowflake, content: &str) -> TransportResult<()> {
        info!(target: "keystone::console", %channel, "{content}");
        Ok(())
    }

    async fn login(&self, presence: Presence) -> TransportResult<Arc<dyn GatewaySession>> {
        info!(status = presence.status().as_str(), activity = ?presence.activity(), "Logged in");
        Ok(Arc::new(ConsoleSession))
    }
}

struct ConsoleSession;

#[async_trait]
impl GatewaySession for ConsoleSession {
    async fn on_disconnect(&self) {
        shutdown_signal().await;
    }
}

/// Completes on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings(token: &str) -> ClientSettings {
        ClientSettings {
            token: token.into(),
            rest_timeout: Duration::from_secs(120),
            rest_buffer_size: 256,
            message_cache_max_size: Some(2048),
        }
    }

    #[tokio::test]
    async fn test_build_and_send() {
        let client = ConsoleTransport.build(&settings("abc")).await.unwrap();
        assert_eq!(client.name(), "console");
        tokio_test::assert_ok!(client.send_message(Snowflake(1), "hello").await);
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let result = ConsoleTransport.build(&settings("")).await;
        assert!(matches!(result, Err(TransportError::BuildFailed(_))));
    }
}
