//! The parameter set of one run.
//!
//! All fields are optional and flat, so a parameter file reads like a list
//! of tunables:
//!
//! ```yaml
//! mtu: 9000
//! adaptive_rx_coalescing: false
//! coalescing_settings:
//!   rx-usecs: 64
//! dev_intr_cpu_lists: [[2, 4], [2, 4]]
//! dev_intr_cpu_policies: [round-robin, all]
//! perf_parallel_streams: 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::concerns::{
    CoalescingParams, DevQueuesParams, InterruptsParams, IrqPolicy, MtuParams, NfcFlowHashParams,
    OffloadParams, ParallelQdiscParams, PauseFramesParams, RxHashParams,
};
use crate::device::AttrValue;
use crate::error::Result;
use crate::targets::TargetDevices;
use crate::validation::{Validatable, ValidationResult};

/// A value given once for every device or once per device.
///
/// Per-device lists are positional; `None` leaves that device alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerDevice<T> {
    /// The same value for every device.
    Shared(T),
    /// One value per target device.
    Each(Vec<Option<T>>),
}

impl<T> PerDevice<T> {
    /// Value for the device at `index`.
    pub fn for_device(&self, index: usize) -> Option<&T> {
        match self {
            PerDevice::Shared(value) => Some(value),
            PerDevice::Each(values) => values.get(index).and_then(Option::as_ref),
        }
    }

    /// Every value given.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        let (shared, each) = match self {
            PerDevice::Shared(value) => (Some(value), None),
            PerDevice::Each(values) => (None, Some(values)),
        };
        shared
            .into_iter()
            .chain(each.into_iter().flatten().flatten())
    }
}

/// Every tunable of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwConfigParams {
    /// Offload features.
    #[serde(flatten)]
    pub offload: OffloadParams,
    /// MTU.
    #[serde(flatten)]
    pub mtu: MtuParams,
    /// Interrupt coalescing.
    #[serde(flatten)]
    pub coalescing: CoalescingParams,
    /// IRQ affinity.
    #[serde(flatten)]
    pub interrupts: InterruptsParams,
    /// Root qdisc for parallel streams.
    #[serde(flatten)]
    pub parallel_qdisc: ParallelQdiscParams,
    /// Pause frames.
    #[serde(flatten)]
    pub pause_frames: PauseFramesParams,
    /// Channel counts.
    #[serde(flatten)]
    pub dev_queues: DevQueuesParams,
    /// NFC RX flow hash.
    #[serde(flatten)]
    pub nfc_flow_hash: NfcFlowHashParams,
    /// RSS hash function.
    #[serde(flatten)]
    pub rx_hash: RxHashParams,
}

impl HwConfigParams {
    /// Parse a JSON parameter set.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse a YAML parameter set.
    #[cfg(feature = "yaml")]
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to YAML.
    #[cfg(feature = "yaml")]
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load a parameter file; `.yaml`/`.yml` is YAML, anything else JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if !is_yaml {
            return Self::from_json(&input);
        }
        #[cfg(feature = "yaml")]
        {
            Self::from_yaml(&input)
        }
        #[cfg(not(feature = "yaml"))]
        {
            Err(crate::error::Error::invalid_parameter(
                "params",
                format!("{}: YAML needs the `yaml` feature", path.display()),
            ))
        }
    }

    /// A parameter set touching every concern.
    pub fn example() -> Self {
        let mut params = Self::default();
        params.offload.offload_settings = Some(
            [("gro", false), ("tso", true)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        );
        params.mtu.mtu = Some(9000);
        params.coalescing.adaptive_rx_coalescing = Some(false);
        params.coalescing.coalescing_settings = Some(PerDevice::Shared(
            [("rx-usecs", 64), ("tx-usecs", 64)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), AttrValue::Int(v)))
                .collect(),
        ));
        params.interrupts.dev_intr_cpu_lists = Some(vec![vec![2, 4], vec![2, 4]]);
        params.interrupts.dev_intr_cpu_policies =
            Some(vec![IrqPolicy::RoundRobin, IrqPolicy::All]);
        params.parallel_qdisc.perf_parallel_streams = Some(4);
        params.pause_frames.rx_pause_frames = Some(false);
        params.pause_frames.tx_pause_frames = Some(false);
        params.dev_queues.dev_queues = Some(vec![
            [("combined".to_string(), 4)].into_iter().collect(),
            [("combined".to_string(), 4)].into_iter().collect(),
        ]);
        params.nfc_flow_hash.nfc_rx_flow_hash_type = Some("udp4".into());
        params.nfc_flow_hash.nfc_rx_flow_hash_value = Some("sdfn".into());
        params.rx_hash.rx_hash_function = Some("toeplitz".into());
        params
    }

    /// Check per-device parameter lists against a recipe's target devices.
    pub fn validate_targets(&self, targets: &dyn TargetDevices) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge(
            self.coalescing
                .validate_devices(targets.coalescing_devices().len()),
        );
        result.merge(
            self.interrupts
                .validate_devices(targets.dev_interrupt_devices().len()),
        );
        result.merge(
            self.dev_queues
                .validate_devices(targets.dev_queues_devices().len()),
        );
        result
    }
}

impl Validatable for HwConfigParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge(self.offload.validate());
        result.merge(self.mtu.validate());
        result.merge(self.coalescing.validate());
        result.merge(self.interrupts.validate());
        result.merge(self.parallel_qdisc.validate());
        result.merge(self.pause_frames.validate());
        result.merge(self.dev_queues.validate());
        result.merge(self.nfc_flow_hash.validate());
        result.merge(self.rx_hash.validate());
        result
    }
}
