//! Device channel counts (`ethtool -l` / `ethtool -L`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::HwConfig;
use crate::device::DeviceRef;
use crate::error::Result;
use crate::host::JobLevel;
use crate::parse::ChannelParameters;
use crate::record::{ConcernKey, ConcernState, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult, validate_positional};

/// Queue types `ethtool -L` accepts.
pub const QUEUE_TYPES: [&str; 4] = ["rx", "tx", "other", "combined"];

/// Device queue parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevQueuesParams {
    /// Per target device, queue type to count. An empty mapping leaves that
    /// device alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_queues: Option<Vec<BTreeMap<String, u32>>>,
}

impl DevQueuesParams {
    /// Check the per-device list against the number of target devices.
    pub fn validate_devices(&self, devices: usize) -> ValidationResult {
        match &self.dev_queues {
            Some(list) => validate_positional(list.len(), devices, "dev_queues"),
            None => ValidationResult::new(),
        }
    }
}

impl Validatable for DevQueuesParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        for queues in self.dev_queues.iter().flatten() {
            for queue_type in queues.keys() {
                if !QUEUE_TYPES.contains(&queue_type.as_str()) {
                    result.add_error(
                        "dev_queues",
                        format!("unknown queue type '{}', expected one of {:?}", queue_type, QUEUE_TYPES),
                    );
                }
            }
        }
        result
    }
}

/// Channel counts of one device before and after configuration.
#[derive(Debug, Clone)]
pub struct QueueChange {
    /// The device.
    pub device: DeviceRef,
    /// Current hardware settings before the change; `None` for `n/a`.
    pub original: BTreeMap<String, Option<u32>>,
    /// Counts that were written.
    pub configured: BTreeMap<String, u32>,
}

impl QueueChange {
    /// Original counts of the configured queue types only.
    ///
    /// Types whose original count was `n/a` are left out.
    pub fn restore_counts(&self) -> BTreeMap<String, u32> {
        self.configured
            .keys()
            .filter_map(|queue_type| {
                self.original
                    .get(queue_type)
                    .copied()
                    .flatten()
                    .map(|count| (queue_type.clone(), count))
            })
            .collect()
    }
}

/// Recorded device queue changes.
#[derive(Debug, Default)]
pub struct DevQueuesState {
    /// Changed devices in configure order.
    pub devices: Vec<QueueChange>,
}

fn format_counts(counts: &BTreeMap<String, u32>) -> String {
    counts
        .iter()
        .map(|(queue_type, count)| format!("{} {}", queue_type, count))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sets per-device channel counts.
#[derive(Debug)]
pub struct DevQueuesConfig {
    devices: Vec<DeviceRef>,
    params: DevQueuesParams,
}

impl DevQueuesConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: DevQueuesParams) -> Self {
        Self { devices, params }
    }

    fn targets(&self) -> impl Iterator<Item = (&DeviceRef, &BTreeMap<String, u32>)> {
        self.devices
            .iter()
            .zip(self.params.dev_queues.iter().flatten())
            .filter(|(_, queues)| !queues.is_empty())
    }

    async fn apply(&self, state: &mut DevQueuesState) -> Result<()> {
        for (device, queues) in self.targets() {
            let netns = device.netns();
            let name = device.name();

            let out = netns
                .run_at(&format!("ethtool -l {}", name), JobLevel::Debug)
                .await?;
            let channels = ChannelParameters::parse(&out.stdout)?;

            netns
                .run(&format!("ethtool -L {} {}", name, format_counts(queues)))
                .await?;
            tracing::debug!(device = %device.id(), queues = %format_counts(queues), "queues configured");

            state.devices.push(QueueChange {
                device: device.clone(),
                original: channels.current,
                configured: queues.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HwConfig for DevQueuesConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::DEV_QUEUES
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let mut state = DevQueuesState::default();
        let result = self.apply(&mut state).await;
        // Devices changed before a failure still need restoring.
        if !state.devices.is_empty() {
            record.insert(ConcernKey::DEV_QUEUES, ConcernState::DevQueues(state))?;
        }
        result
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let Some(state) = record.take_dev_queues() else {
            return Ok(());
        };

        let mut first_error = None;
        for change in state.devices.iter().rev() {
            let counts = change.restore_counts();
            if counts.is_empty() {
                continue;
            }
            let command = format!("ethtool -L {} {}", change.device.name(), format_counts(&counts));
            if let Err(e) = change.device.netns().run(&command).await {
                tracing::warn!(device = %change.device.id(), error = %e, "failed to restore queues");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        match record.dev_queues() {
            Some(state) if !state.devices.is_empty() => state
                .devices
                .iter()
                .map(|change| {
                    format!(
                        "{} device {} queues configured: {}",
                        change.device.host().id(),
                        change.device.name(),
                        format_counts(&change.configured)
                    )
                })
                .collect(),
            _ => vec!["device queues configuration skipped".to_string()],
        }
    }

    fn plan(&self) -> Vec<String> {
        self.targets()
            .map(|(device, queues)| format!("{} queues -> {}", device.id(), format_counts(queues)))
            .collect()
    }
}
