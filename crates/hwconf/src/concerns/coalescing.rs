//! Interrupt coalescing (`ethtool -C`).
//!
//! Adaptive RX/TX are plain toggles. Everything else comes from
//! `coalescing_settings`, a mapping in `ethtool -C` vocabulary given once for
//! all devices or once per device. An `adaptive-rx`/`adaptive-tx` key inside
//! that mapping is treated as the corresponding toggle.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::or_skipped;
use crate::attribute::{configure_attribute, deconfigure_attributes, describe_attributes};
use crate::chain::HwConfig;
use crate::device::{AttrValue, DeviceRef, coalescing_attribute};
use crate::error::{Error, Result};
use crate::params::PerDevice;
use crate::record::{ConcernKey, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult, validate_positional, validate_tool_key};

const ADAPTIVE_RX: &str = "adaptive_rx_coalescing";
const ADAPTIVE_TX: &str = "adaptive_tx_coalescing";
const SETTINGS: &str = "coalescing_settings";

/// Coalescing settings in `ethtool -C` vocabulary.
pub type CoalescingSettings = BTreeMap<String, AttrValue>;

/// Coalescing parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescingParams {
    /// Adaptive RX coalescing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_rx_coalescing: Option<bool>,
    /// Adaptive TX coalescing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_tx_coalescing: Option<bool>,
    /// Other settings, e.g. `rx-usecs: 64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coalescing_settings: Option<PerDevice<CoalescingSettings>>,
}

impl CoalescingParams {
    /// `(settings key, attribute, explicit toggle)` for both directions.
    fn toggles(&self) -> [(&'static str, &'static str, Option<bool>); 2] {
        [
            ("adaptive-rx", ADAPTIVE_RX, self.adaptive_rx_coalescing),
            ("adaptive-tx", ADAPTIVE_TX, self.adaptive_tx_coalescing),
        ]
    }

    fn is_toggle_key(key: &str) -> bool {
        key == "adaptive-rx" || key == "adaptive-tx"
    }

    /// Check per-device settings against the number of target devices.
    pub fn validate_devices(&self, devices: usize) -> ValidationResult {
        match &self.coalescing_settings {
            Some(PerDevice::Each(list)) => validate_positional(list.len(), devices, SETTINGS),
            _ => ValidationResult::new(),
        }
    }
}

impl Validatable for CoalescingParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        let Some(settings) = &self.coalescing_settings else {
            return result;
        };

        for map in settings.values() {
            for (key, value) in map {
                result.merge(validate_tool_key(key, SETTINGS));
                if !Self::is_toggle_key(key) {
                    continue;
                }
                if value.as_bool().is_none() {
                    result.add_error(SETTINGS, format!("{} must be on or off, got {}", key, value));
                }
            }
        }
        for (key, attribute, explicit) in self.toggles() {
            if explicit.is_some() && settings.values().any(|map| map.contains_key(key)) {
                result.add_error(SETTINGS, format!("{} conflicts with {}", key, attribute));
            }
        }

        result
    }
}

type Request = (String, Vec<(DeviceRef, Option<AttrValue>)>);

/// Applies coalescing toggles and settings.
#[derive(Debug)]
pub struct CoalescingConfig {
    devices: Vec<DeviceRef>,
    params: CoalescingParams,
}

impl CoalescingConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: CoalescingParams) -> Self {
        Self { devices, params }
    }

    fn settings_for(&self, index: usize) -> Option<&CoalescingSettings> {
        self.params
            .coalescing_settings
            .as_ref()
            .and_then(|settings| settings.for_device(index))
    }

    /// Normalize parameters into per-attribute device targets.
    ///
    /// Toggles come first, then the remaining settings by key.
    fn requests(&self) -> Result<Vec<Request>> {
        let mut requests = Vec::new();

        for (key, attribute, explicit) in self.params.toggles() {
            let mut targets = Vec::with_capacity(self.devices.len());
            for (index, device) in self.devices.iter().enumerate() {
                let from_settings = self.settings_for(index).and_then(|map| map.get(key));
                let desired = match (explicit, from_settings) {
                    (Some(_), Some(_)) => {
                        return Err(Error::invalid_parameter(
                            SETTINGS,
                            format!("{} conflicts with {}", key, attribute),
                        ));
                    }
                    (Some(on), None) => Some(AttrValue::Bool(on)),
                    (None, Some(value)) => {
                        let on = value.as_bool().ok_or_else(|| {
                            Error::invalid_parameter(
                                SETTINGS,
                                format!("{} must be on or off, got {}", key, value),
                            )
                        })?;
                        Some(AttrValue::Bool(on))
                    }
                    (None, None) => None,
                };
                targets.push((device.clone(), desired));
            }
            requests.push((attribute.to_string(), targets));
        }

        let keys: BTreeSet<&str> = self
            .params
            .coalescing_settings
            .iter()
            .flat_map(|settings| settings.values())
            .flat_map(|map| map.keys().map(String::as_str))
            .filter(|key| !CoalescingParams::is_toggle_key(key))
            .collect();
        for key in keys {
            let targets = self
                .devices
                .iter()
                .enumerate()
                .map(|(index, device)| {
                    let desired = self.settings_for(index).and_then(|map| map.get(key)).cloned();
                    (device.clone(), desired)
                })
                .collect();
            requests.push((coalescing_attribute(key), targets));
        }

        Ok(requests)
    }
}

#[async_trait]
impl HwConfig for CoalescingConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::COALESCING
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        for (attribute, targets) in self.requests()? {
            configure_attribute(record, ConcernKey::COALESCING, &attribute, &targets).await?;
        }
        Ok(())
    }

    // Recorded toggles first, so settings are restored before the toggles.
    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        deconfigure_attributes(record, ConcernKey::COALESCING).await
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        or_skipped(
            describe_attributes(record, ConcernKey::COALESCING),
            "Coalescing configuration skipped.",
        )
    }

    fn plan(&self) -> Vec<String> {
        let Ok(requests) = self.requests() else {
            return Vec::new();
        };
        requests
            .into_iter()
            .flat_map(|(attribute, targets)| {
                targets.into_iter().filter_map(move |(dev, desired)| {
                    desired.map(|value| format!("{} {} -> {}", dev.id(), attribute, value))
                })
            })
            .collect()
    }
}
