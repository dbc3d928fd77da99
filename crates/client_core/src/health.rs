//! Startup liveness probe.

use std::{fmt, sync::Arc};

use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::{
    events::ConsoleEvent,
    gateway::{CallOptions, RequestGateway, HEALTH_ENDPOINT},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    Checking,
    Ok,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Checking => "checking",
            Self::Ok => "ok",
            Self::Error => "error",
        })
    }
}

pub struct HealthMonitor {
    gateway: Arc<RequestGateway>,
    status: RwLock<HealthStatus>,
    events: broadcast::Sender<ConsoleEvent>,
}

impl HealthMonitor {
    pub(crate) fn new(
        gateway: Arc<RequestGateway>,
        events: broadcast::Sender<ConsoleEvent>,
    ) -> Self {
        Self {
            gateway,
            status: RwLock::new(HealthStatus::Checking),
            events,
        }
    }

    /// One best-effort probe; no retries. Any failure, network or server, maps to `Error`.
    pub async fn check_health(&self) -> HealthStatus {
        self.set(HealthStatus::Checking).await;

        let status = match self
            .gateway
            .call_unit(HEALTH_ENDPOINT, CallOptions::get())
            .await
        {
            Ok(()) => {
                info!(base_url = %self.gateway.base_url(), "backend is healthy");
                HealthStatus::Ok
            }
            Err(err) => {
                warn!(base_url = %self.gateway.base_url(), error = %err, "health probe failed");
                HealthStatus::Error
            }
        };

        self.set(status).await;
        status
    }

    pub async fn status(&self) -> HealthStatus {
        *self.status.read().await
    }

    async fn set(&self, status: HealthStatus) {
        *self.status.write().await = status;
        let _ = self.events.send(ConsoleEvent::HealthChanged(status));
    }
}
