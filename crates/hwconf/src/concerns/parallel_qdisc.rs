//! Multiqueue root qdisc for parallel streams.
//!
//! With more than one stream, traffic is spread over TX queues only if the
//! root qdisc is `mq`. The previous root qdisc is dropped on deconfigure so
//! the kernel reinstalls its default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::HwConfig;
use crate::device::DeviceRef;
use crate::error::Result;
use crate::host::JobLevel;
use crate::parse::parse_root_qdisc_kind;
use crate::record::{ConcernKey, ConcernState, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult};

/// Parallel-stream parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelQdiscParams {
    /// Number of parallel performance streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perf_parallel_streams: Option<u32>,
}

impl ParallelQdiscParams {
    fn wants_mq(&self) -> bool {
        self.perf_parallel_streams.is_some_and(|streams| streams > 1)
    }
}

impl Validatable for ParallelQdiscParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if self.perf_parallel_streams == Some(0) {
            result.add_error("perf_parallel_streams", "must be at least 1");
        }
        result
    }
}

/// A device whose root qdisc was replaced.
#[derive(Debug, Clone)]
pub struct QdiscChange {
    /// The device.
    pub device: DeviceRef,
    /// Root qdisc kind before the change, if one was reported.
    pub original_kind: Option<String>,
}

/// Recorded root qdisc changes.
#[derive(Debug, Default)]
pub struct QdiscState {
    /// Changed devices in configure order.
    pub devices: Vec<QdiscChange>,
}

/// Installs an `mq` root qdisc when several streams run in parallel.
#[derive(Debug)]
pub struct ParallelQdiscConfig {
    devices: Vec<DeviceRef>,
    params: ParallelQdiscParams,
}

impl ParallelQdiscConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: ParallelQdiscParams) -> Self {
        Self { devices, params }
    }

    async fn apply(&self, state: &mut QdiscState) -> Result<()> {
        for device in &self.devices {
            let netns = device.netns();
            let name = device.name();

            let out = netns
                .run_at(&format!("tc qdisc show dev {} root", name), JobLevel::Debug)
                .await?;
            let original_kind = parse_root_qdisc_kind(&out.stdout);

            netns
                .run(&format!("tc qdisc replace dev {} root mq", name))
                .await?;
            tracing::debug!(device = %device.id(), original = ?original_kind, "root qdisc replaced with mq");

            state.devices.push(QdiscChange {
                device: device.clone(),
                original_kind,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HwConfig for ParallelQdiscConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::PARALLEL_STREAM_QDISC
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        if !self.params.wants_mq() {
            return Ok(());
        }

        let mut state = QdiscState::default();
        let result = self.apply(&mut state).await;
        if !state.devices.is_empty() {
            record.insert(
                ConcernKey::PARALLEL_STREAM_QDISC,
                ConcernState::ParallelStreamQdisc(state),
            )?;
        }
        result
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let Some(state) = record.take_parallel_stream_qdisc() else {
            return Ok(());
        };

        let mut first_error = None;
        for change in state.devices.iter().rev() {
            // Already mq before; nothing to undo.
            if change.original_kind.as_deref() == Some("mq") {
                continue;
            }
            let command = format!("tc qdisc del dev {} root", change.device.name());
            if let Err(e) = change.device.netns().run(&command).await {
                tracing::warn!(device = %change.device.id(), error = %e, "failed to restore root qdisc");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        match record.parallel_stream_qdisc() {
            Some(state) if !state.devices.is_empty() => state
                .devices
                .iter()
                .map(|change| {
                    format!(
                        "{}.{} root qdisc replaced with mq",
                        change.device.host().id(),
                        change.device.name()
                    )
                })
                .collect(),
            _ => vec!["Parallel stream qdisc configuration skipped.".to_string()],
        }
    }

    fn plan(&self) -> Vec<String> {
        if !self.params.wants_mq() {
            return Vec::new();
        }
        self.devices
            .iter()
            .map(|dev| format!("{} root qdisc -> mq", dev.id()))
            .collect()
    }
}
