//! Device MTU.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::or_skipped;
use crate::attribute::{configure_attribute, deconfigure_attributes, describe_attribute, shared_targets};
use crate::chain::HwConfig;
use crate::device::{AttrValue, DeviceRef};
use crate::error::Result;
use crate::record::{ConcernKey, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult, validate_mtu};

const ATTRIBUTE: &str = "mtu";

/// MTU parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtuParams {
    /// MTU to set on every target device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

impl Validatable for MtuParams {
    fn validate(&self) -> ValidationResult {
        match self.mtu {
            Some(mtu) => validate_mtu(mtu, "mtu"),
            None => ValidationResult::new(),
        }
    }
}

/// Sets the same MTU on every target device.
#[derive(Debug)]
pub struct MtuConfig {
    devices: Vec<DeviceRef>,
    params: MtuParams,
}

impl MtuConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: MtuParams) -> Self {
        Self { devices, params }
    }
}

#[async_trait]
impl HwConfig for MtuConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::MTU
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let desired = self.params.mtu.map(AttrValue::from);
        let targets = shared_targets(&self.devices, desired.as_ref());
        configure_attribute(record, ConcernKey::MTU, ATTRIBUTE, &targets).await
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        deconfigure_attributes(record, ConcernKey::MTU).await
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        or_skipped(
            describe_attribute(record, ConcernKey::MTU, ATTRIBUTE),
            "MTU configuration skipped.",
        )
    }

    fn plan(&self) -> Vec<String> {
        match self.params.mtu {
            Some(mtu) if !self.devices.is_empty() => self
                .devices
                .iter()
                .map(|dev| format!("{} mtu -> {}", dev.id(), mtu))
                .collect(),
            _ => Vec::new(),
        }
    }
}
