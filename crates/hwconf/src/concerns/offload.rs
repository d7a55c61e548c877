//! Offload features (`ethtool -K`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::or_skipped;
use crate::attribute::{configure_attribute, deconfigure_attributes, describe_attribute, shared_targets};
use crate::chain::HwConfig;
use crate::device::{AttrValue, DeviceRef, offload_attribute};
use crate::error::Result;
use crate::record::{ConcernKey, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult, validate_tool_key};

/// Offload parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffloadParams {
    /// Feature name in `ethtool -K` vocabulary (`gro`, `tso`) to on/off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offload_settings: Option<BTreeMap<String, AttrValue>>,
}

impl Validatable for OffloadParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        for (feature, value) in self.offload_settings.iter().flatten() {
            result.merge(validate_tool_key(feature, "offload_settings"));
            if value.as_bool().is_none() {
                result.add_error(
                    "offload_settings",
                    format!("{} must be on or off, got {}", feature, value),
                );
            }
        }
        result
    }
}

/// Toggles offload features.
#[derive(Debug)]
pub struct OffloadConfig {
    devices: Vec<DeviceRef>,
    params: OffloadParams,
}

impl OffloadConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: OffloadParams) -> Self {
        Self { devices, params }
    }

    fn requests(&self) -> impl Iterator<Item = (String, Option<bool>)> + '_ {
        self.params
            .offload_settings
            .iter()
            .flatten()
            .map(|(feature, value)| (offload_attribute(feature), value.as_bool()))
    }
}

#[async_trait]
impl HwConfig for OffloadConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::OFFLOADS
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        for (attribute, desired) in self.requests() {
            let desired = desired.map(AttrValue::Bool);
            let targets = shared_targets(&self.devices, desired.as_ref());
            configure_attribute(record, ConcernKey::OFFLOADS, &attribute, &targets).await?;
        }
        Ok(())
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        deconfigure_attributes(record, ConcernKey::OFFLOADS).await
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        let lines = self
            .requests()
            .flat_map(|(attribute, _)| describe_attribute(record, ConcernKey::OFFLOADS, &attribute))
            .collect();
        or_skipped(lines, "Offload configuration skipped.")
    }

    fn plan(&self) -> Vec<String> {
        self.requests()
            .filter_map(|(attribute, on)| on.map(|on| (attribute, on)))
            .flat_map(|(attribute, on)| {
                self.devices
                    .iter()
                    .map(move |dev| format!("{} {} -> {}", dev.id(), attribute, on))
            })
            .collect()
    }
}
