//! Fields hashed for a flow type (`ethtool -N rx-flow-hash`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::or_skipped;
use crate::attribute::{configure_attribute, deconfigure_attributes, describe_attribute, shared_targets};
use crate::chain::HwConfig;
use crate::device::{AttrValue, DeviceRef, rx_flow_hash_attribute};
use crate::error::Result;
use crate::record::{ConcernKey, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult};

/// Flow types accepted by `ethtool -N rx-flow-hash`.
pub const FLOW_TYPES: [&str; 14] = [
    "tcp4", "udp4", "sctp4", "ah4", "esp4", "ip4", "tcp6", "udp6", "sctp6", "ah6", "esp6", "ip6",
    "ether", "gtpu4",
];

/// Field letters accepted by `ethtool -N rx-flow-hash`.
pub const FIELD_LETTERS: &str = "mvtsdfnr";

/// NFC RX flow hash parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcFlowHashParams {
    /// Flow type, e.g. `tcp4`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfc_rx_flow_hash_type: Option<String>,
    /// Hashed fields, e.g. `sdfn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfc_rx_flow_hash_value: Option<String>,
}

impl NfcFlowHashParams {
    fn request(&self) -> Option<(String, AttrValue)> {
        match (&self.nfc_rx_flow_hash_type, &self.nfc_rx_flow_hash_value) {
            (Some(flow_type), Some(value)) => {
                Some((rx_flow_hash_attribute(flow_type), AttrValue::from(value.as_str())))
            }
            _ => None,
        }
    }
}

impl Validatable for NfcFlowHashParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        match (&self.nfc_rx_flow_hash_type, &self.nfc_rx_flow_hash_value) {
            (None, None) => {}
            (Some(flow_type), Some(value)) => {
                if !FLOW_TYPES.contains(&flow_type.as_str()) {
                    result.add_error(
                        "nfc_rx_flow_hash_type",
                        format!("unknown flow type '{}'", flow_type),
                    );
                }
                if value.is_empty() || !value.chars().all(|c| FIELD_LETTERS.contains(c)) {
                    result.add_error(
                        "nfc_rx_flow_hash_value",
                        format!("'{}' must be made of [{}]", value, FIELD_LETTERS),
                    );
                }
            }
            (Some(_), None) => {
                result.add_error("nfc_rx_flow_hash_value", "required with nfc_rx_flow_hash_type")
            }
            (None, Some(_)) => {
                result.add_error("nfc_rx_flow_hash_type", "required with nfc_rx_flow_hash_value")
            }
        }
        result
    }
}

/// Selects the hashed fields of one flow type.
#[derive(Debug)]
pub struct NfcFlowHashConfig {
    devices: Vec<DeviceRef>,
    params: NfcFlowHashParams,
}

impl NfcFlowHashConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: NfcFlowHashParams) -> Self {
        Self { devices, params }
    }
}

#[async_trait]
impl HwConfig for NfcFlowHashConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::NFC_RX_FLOW_HASH
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let Some((attribute, value)) = self.params.request() else {
            return Ok(());
        };
        let targets = shared_targets(&self.devices, Some(&value));
        configure_attribute(record, ConcernKey::NFC_RX_FLOW_HASH, &attribute, &targets).await
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        deconfigure_attributes(record, ConcernKey::NFC_RX_FLOW_HASH).await
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        let lines = match self.params.request() {
            Some((attribute, _)) => {
                describe_attribute(record, ConcernKey::NFC_RX_FLOW_HASH, &attribute)
            }
            None => Vec::new(),
        };
        or_skipped(lines, "NFC RX flow hash configuration skipped.")
    }

    fn plan(&self) -> Vec<String> {
        let Some((attribute, value)) = self.params.request() else {
            return Vec::new();
        };
        self.devices
            .iter()
            .map(|dev| format!("{} {} -> {}", dev.id(), attribute, value))
            .collect()
    }
}
