//! Ethernet pause frames (`ethtool -A`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::or_skipped;
use crate::attribute::{configure_attribute, deconfigure_attributes, describe_attribute, shared_targets};
use crate::chain::HwConfig;
use crate::device::{AttrValue, DeviceRef};
use crate::error::Result;
use crate::record::{ConcernKey, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult};

const RX: &str = "rx_pause_frames";
const TX: &str = "tx_pause_frames";

/// Pause frame parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseFramesParams {
    /// Receive pause frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_pause_frames: Option<bool>,
    /// Transmit pause frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_pause_frames: Option<bool>,
}

impl PauseFramesParams {
    fn requests(&self) -> [(&'static str, Option<bool>); 2] {
        [(RX, self.rx_pause_frames), (TX, self.tx_pause_frames)]
    }
}

impl Validatable for PauseFramesParams {
    fn validate(&self) -> ValidationResult {
        ValidationResult::new()
    }
}

/// Toggles RX/TX pause frames.
#[derive(Debug)]
pub struct PauseFramesConfig {
    devices: Vec<DeviceRef>,
    params: PauseFramesParams,
}

impl PauseFramesConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: PauseFramesParams) -> Self {
        Self { devices, params }
    }
}

#[async_trait]
impl HwConfig for PauseFramesConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::PAUSE_FRAMES
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        for (attribute, desired) in self.params.requests() {
            let desired = desired.map(AttrValue::Bool);
            let targets = shared_targets(&self.devices, desired.as_ref());
            configure_attribute(record, ConcernKey::PAUSE_FRAMES, attribute, &targets).await?;
        }
        Ok(())
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        deconfigure_attributes(record, ConcernKey::PAUSE_FRAMES).await
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        let lines = [RX, TX]
            .into_iter()
            .flat_map(|attribute| describe_attribute(record, ConcernKey::PAUSE_FRAMES, attribute))
            .collect();
        or_skipped(lines, "Pause frames configuration skipped.")
    }

    fn plan(&self) -> Vec<String> {
        self.params
            .requests()
            .into_iter()
            .filter_map(|(attribute, desired)| desired.map(|on| (attribute, on)))
            .flat_map(|(attribute, on)| {
                self.devices
                    .iter()
                    .map(move |dev| format!("{} {} -> {}", dev.id(), attribute, on))
            })
            .collect()
    }
}
