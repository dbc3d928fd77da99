//! Door-side token check-in.

use std::sync::Arc;

use shared::protocol::{CheckinReceipt, CheckinRequest};
use tracing::info;

use crate::{
    error::{ConsoleError, Result},
    gateway::{CallOptions, RequestGateway, CHECKIN_ENDPOINT},
};

pub struct CheckinDesk {
    gateway: Arc<RequestGateway>,
}

impl CheckinDesk {
    pub(crate) fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    pub fn validate_token(token: &str) -> Result<&str> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ConsoleError::validation("credential token is required"));
        }
        Ok(token)
    }

    pub async fn check_in(&self, token: &str) -> Result<CheckinReceipt> {
        let request = CheckinRequest {
            token: Self::validate_token(token)?.to_string(),
        };
        let receipt: CheckinReceipt = self
            .gateway
            .call(CHECKIN_ENDPOINT, CallOptions::post().json(&request)?)
            .await?;
        info!(
            guest_id = %receipt.guest_id,
            event_id = %receipt.event_id,
            status = ?receipt.status,
            "guest checked in"
        );
        Ok(receipt)
    }
}
