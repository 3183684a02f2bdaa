//! Graceful shutdown handling.
//!
//! On shutdown every open chat connection is closed through the registry,
//! so sessions run the same cleanup path as a peer-initiated close and no
//! registry entries are leaked.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::chat::ConnectionRegistry;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for sessions to unwind after being signalled
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
        }
    }
}

pub struct GracefulShutdown {
    registry: Arc<ConnectionRegistry>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            config: ShutdownConfig::default(),
        }
    }

    pub fn with_config(registry: Arc<ConnectionRegistry>, config: ShutdownConfig) -> Self {
        Self { registry, config }
    }

    /// Execute the shutdown sequence.
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.registry.stats().total_connections)
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();

        tracing::info!(reason = %reason, "Starting graceful shutdown - closing chat connections");
        let connections_closed = self.registry.close_all();

        // Connections registered while shutdown was in flight also need to
        // drain before we report done
        let drained = self.wait_for_drain().await;

        let result = ShutdownResult {
            connections_closed,
            drained,
            duration: start.elapsed(),
        };

        tracing::info!(
            connections_closed = result.connections_closed,
            drained = result.drained,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }

    async fn wait_for_drain(&self) -> bool {
        let registry = self.registry.clone();
        let drain_future = async {
            loop {
                if registry.stats().total_connections == 0 {
                    break;
                }
                registry.close_all();
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };

        match timeout(self.config.drain_timeout, drain_future).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.registry.stats().total_connections,
                    "Shutdown drain timeout, some connections did not close"
                );
                false
            }
        }
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug)]
pub struct ShutdownResult {
    /// Connections signalled to close
    pub connections_closed: usize,
    /// Whether the registry fully drained within the timeout
    pub drained: bool,
    /// Total time taken
    pub duration: Duration,
}
