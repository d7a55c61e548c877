//! The hardware tunables, one module per concern.
//!
//! Each concern pairs a serde parameter struct with an [`HwConfig`]
//! implementation. [`common_hw_config`] assembles the standard chain from a
//! parameter set and a recipe's target devices.

pub mod coalescing;
pub mod dev_queues;
pub mod interrupts;
pub mod mtu;
pub mod nfc_flow_hash;
pub mod offload;
pub mod parallel_qdisc;
pub mod pause_frames;
pub mod rx_hash;

pub use coalescing::{CoalescingConfig, CoalescingParams};
pub use dev_queues::{DevQueuesConfig, DevQueuesParams, DevQueuesState, QueueChange};
pub use interrupts::{
    InterruptState, InterruptsConfig, InterruptsParams, IrqBalanceGuard, IrqPolicy, PinnedDevice,
    assign_irq_cpus,
};
pub use mtu::{MtuConfig, MtuParams};
pub use nfc_flow_hash::{NfcFlowHashConfig, NfcFlowHashParams};
pub use offload::{OffloadConfig, OffloadParams};
pub use parallel_qdisc::{ParallelQdiscConfig, ParallelQdiscParams, QdiscChange, QdiscState};
pub use pause_frames::{PauseFramesConfig, PauseFramesParams};
pub use rx_hash::{RxHashConfig, RxHashParams};

use crate::chain::HwConfigChain;
use crate::error::Result;
use crate::params::HwConfigParams;
use crate::targets::TargetDevices;
use crate::validation::Validatable;

#[cfg(doc)]
use crate::chain::HwConfig;

/// Use `lines`, or a single `skipped` line when there are none.
pub(crate) fn or_skipped(lines: Vec<String>, skipped: &str) -> Vec<String> {
    if lines.is_empty() {
        vec![skipped.to_string()]
    } else {
        lines
    }
}

/// Build the standard chain.
///
/// The parameter set is validated against the target devices first; nothing
/// is touched when validation fails. Concerns run in this order:
/// offloads, MTU, coalescing, IRQ affinity, parallel-stream qdisc, pause
/// frames, device queues, NFC flow hash, RSS hash function.
pub fn common_hw_config(
    params: &HwConfigParams,
    targets: &dyn TargetDevices,
) -> Result<HwConfigChain> {
    let mut result = params.validate();
    result.merge(params.validate_targets(targets));
    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }
    result.into_result()?;

    Ok(HwConfigChain::new()
        .with(OffloadConfig::new(
            targets.offload_devices(),
            params.offload.clone(),
        ))
        .with(MtuConfig::new(targets.mtu_devices(), params.mtu.clone()))
        .with(CoalescingConfig::new(
            targets.coalescing_devices(),
            params.coalescing.clone(),
        ))
        .with(InterruptsConfig::new(
            targets.dev_interrupt_devices(),
            params.interrupts.clone(),
        ))
        .with(ParallelQdiscConfig::new(
            targets.parallel_stream_qdisc_devices(),
            params.parallel_qdisc.clone(),
        ))
        .with(PauseFramesConfig::new(
            targets.pause_frames_devices(),
            params.pause_frames.clone(),
        ))
        .with(DevQueuesConfig::new(
            targets.dev_queues_devices(),
            params.dev_queues.clone(),
        ))
        .with(NfcFlowHashConfig::new(
            targets.nfc_rx_flow_hash_devices(),
            params.nfc_flow_hash.clone(),
        ))
        .with(RxHashConfig::new(
            targets.rx_hash_function_devices(),
            params.rx_hash.clone(),
        )))
}
