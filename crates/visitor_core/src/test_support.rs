//! Shared doubles for the engine tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Profile, PushPayload, Role};
use crate::ports::{DeliveryOutcome, PortError, PortResult, PushGateway};

#[derive(Clone, Copy)]
pub enum GatewayBehavior {
    Deliver,
    Unconfigured,
    Fail,
    Hang,
}

/// A push gateway that records every send and answers with a fixed behavior.
pub struct RecordingGateway {
    behavior: GatewayBehavior,
    pub sent: Mutex<Vec<(String, PushPayload)>>,
}

impl RecordingGateway {
    pub fn new(behavior: GatewayBehavior) -> Self {
        Self {
            behavior,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, device_token: &str, payload: &PushPayload) -> PortResult<DeliveryOutcome> {
        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), payload.clone()));
        match self.behavior {
            GatewayBehavior::Deliver => Ok(DeliveryOutcome::Delivered),
            GatewayBehavior::Unconfigured => Ok(DeliveryOutcome::ConfigurationIncomplete),
            GatewayBehavior::Fail => Err(PortError::delivery(
                "push endpoint returned 401 Unauthorized",
                Some("{\"error\":\"invalid credentials\"}".to_string()),
            )),
            GatewayBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(DeliveryOutcome::Delivered)
            }
        }
    }
}

pub fn resident(unit: &str, device_token: Option<&str>) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        role: Role::Resident,
        unit_number: Some(unit.to_string()),
        full_name: Some(format!("Resident of {}", unit)),
        device_token: device_token.map(str::to_string),
    }
}

pub fn officer() -> Profile {
    Profile {
        id: Uuid::new_v4(),
        role: Role::Security,
        unit_number: None,
        full_name: Some("Gate Officer".to_string()),
        device_token: None,
    }
}
