//! RSS hash function (`ethtool -X hfunc`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::or_skipped;
use crate::attribute::{configure_attribute, deconfigure_attributes, describe_attribute, shared_targets};
use crate::chain::HwConfig;
use crate::device::{AttrValue, DeviceRef};
use crate::error::Result;
use crate::record::{ConcernKey, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult};

const ATTRIBUTE: &str = "rx_hash_function";

/// Hash functions known to the kernel's ethtool interface.
pub const KNOWN_HASH_FUNCTIONS: [&str; 3] = ["toeplitz", "xor", "crc32"];

/// RSS hash function parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxHashParams {
    /// Hash function name, e.g. `toeplitz`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_hash_function: Option<String>,
}

impl Validatable for RxHashParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(function) = &self.rx_hash_function {
            if function.is_empty() || function.contains(char::is_whitespace) {
                result.add_error("rx_hash_function", format!("invalid hash function '{}'", function));
            } else if !KNOWN_HASH_FUNCTIONS.contains(&function.as_str()) {
                result.add_warning(
                    "rx_hash_function",
                    format!("'{}' is not one of {:?}", function, KNOWN_HASH_FUNCTIONS),
                );
            }
        }
        result
    }
}

/// Selects the RSS hash function.
#[derive(Debug)]
pub struct RxHashConfig {
    devices: Vec<DeviceRef>,
    params: RxHashParams,
}

impl RxHashConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: RxHashParams) -> Self {
        Self { devices, params }
    }
}

#[async_trait]
impl HwConfig for RxHashConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::RX_HASH_FUNCTION
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let desired = self.params.rx_hash_function.as_deref().map(AttrValue::from);
        let targets = shared_targets(&self.devices, desired.as_ref());
        configure_attribute(record, ConcernKey::RX_HASH_FUNCTION, ATTRIBUTE, &targets).await
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        deconfigure_attributes(record, ConcernKey::RX_HASH_FUNCTION).await
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        or_skipped(
            describe_attribute(record, ConcernKey::RX_HASH_FUNCTION, ATTRIBUTE),
            "RX hash function configuration skipped.",
        )
    }

    fn plan(&self) -> Vec<String> {
        let Some(function) = &self.params.rx_hash_function else {
            return Vec::new();
        };
        self.devices
            .iter()
            .map(|dev| format!("{} {} -> {}", dev.id(), ATTRIBUTE, function))
            .collect()
    }
}
