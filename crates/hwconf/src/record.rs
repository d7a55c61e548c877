//! The configuration record shared by every concern of one run.
//!
//! Each concern writes its state once while configuring and consumes it
//! once while deconfiguring. The record is owned by the run and handed down
//! the chain as `&mut`, so writes happen in strict program order.

use std::fmt;

use crate::attribute::AttributeState;
use crate::concerns::dev_queues::DevQueuesState;
use crate::concerns::interrupts::InterruptState;
use crate::concerns::parallel_qdisc::QdiscState;
use crate::error::{Error, Result};

/// Identifies a concern inside the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConcernKey(&'static str);

impl ConcernKey {
    /// Device MTU.
    pub const MTU: Self = Self("mtu");
    /// Interrupt coalescing.
    pub const COALESCING: Self = Self("coalescing");
    /// Pause frames.
    pub const PAUSE_FRAMES: Self = Self("pause_frames");
    /// Offload features.
    pub const OFFLOADS: Self = Self("offloads");
    /// RSS hash function.
    pub const RX_HASH_FUNCTION: Self = Self("dev_rx_hash_function");
    /// NFC RX flow hash fields.
    pub const NFC_RX_FLOW_HASH: Self = Self("dev_nfc_rx_flow_hash");
    /// Device channel counts.
    pub const DEV_QUEUES: Self = Self("dev_queues");
    /// IRQ CPU affinity.
    pub const DEV_INTERRUPTS: Self = Self("dev_intr_cpu_configuration");
    /// Root qdisc for parallel streams.
    pub const PARALLEL_STREAM_QDISC: Self = Self("parallel_stream_qdisc");

    /// Create a key for a concern defined outside this crate.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The key's name.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ConcernKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// State recorded by one concern.
#[derive(Debug)]
pub enum ConcernState {
    /// Original and configured values of device attributes.
    Attributes(AttributeState),
    /// Original and configured channel counts.
    DevQueues(DevQueuesState),
    /// Stopped interrupt balancers and pinned devices.
    Interrupts(InterruptState),
    /// Devices whose root qdisc was replaced.
    ParallelStreamQdisc(QdiscState),
}

/// Configuration record of one run.
#[derive(Debug, Default)]
pub struct HwConfigRecord {
    entries: Vec<(ConcernKey, ConcernState)>,
}

impl HwConfigRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if no concern recorded anything.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of concerns with recorded state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Concern keys in the order they were recorded.
    pub fn keys(&self) -> impl Iterator<Item = ConcernKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// Check if a concern has recorded state.
    pub fn contains(&self, key: ConcernKey) -> bool {
        self.position(key).is_some()
    }

    /// Get a concern's state.
    pub fn get(&self, key: ConcernKey) -> Option<&ConcernState> {
        self.position(key).map(|pos| &self.entries[pos].1)
    }

    /// Get a concern's state mutably.
    pub fn get_mut(&mut self, key: ConcernKey) -> Option<&mut ConcernState> {
        self.position(key).map(|pos| &mut self.entries[pos].1)
    }

    /// Record a concern's state.
    ///
    /// Fails if the concern already has state: a concern is configured at
    /// most once per run.
    pub fn insert(&mut self, key: ConcernKey, state: ConcernState) -> Result<()> {
        if self.contains(key) {
            return Err(Error::AlreadyConfigured {
                concern: key.to_string(),
            });
        }
        self.entries.push((key, state));
        Ok(())
    }

    /// Remove and return a concern's state.
    pub fn take(&mut self, key: ConcernKey) -> Option<ConcernState> {
        self.position(key).map(|pos| self.entries.remove(pos).1)
    }

    /// Attribute state of a concern.
    pub fn attributes(&self, key: ConcernKey) -> Option<&AttributeState> {
        match self.get(key)? {
            ConcernState::Attributes(state) => Some(state),
            _ => None,
        }
    }

    /// Attribute state of a concern, created empty on first use.
    pub fn attributes_mut(&mut self, key: ConcernKey) -> Result<&mut AttributeState> {
        let pos = match self.position(key) {
            Some(pos) => pos,
            None => {
                self.entries
                    .push((key, ConcernState::Attributes(AttributeState::default())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[pos].1 {
            ConcernState::Attributes(state) => Ok(state),
            _ => Err(Error::AlreadyConfigured {
                concern: key.to_string(),
            }),
        }
    }

    /// Device queue state.
    pub fn dev_queues(&self) -> Option<&DevQueuesState> {
        match self.get(ConcernKey::DEV_QUEUES)? {
            ConcernState::DevQueues(state) => Some(state),
            _ => None,
        }
    }

    /// Remove and return the device queue state.
    pub fn take_dev_queues(&mut self) -> Option<DevQueuesState> {
        match self.take_matching(ConcernKey::DEV_QUEUES, |s| {
            matches!(s, ConcernState::DevQueues(_))
        })? {
            ConcernState::DevQueues(state) => Some(state),
            _ => None,
        }
    }

    /// IRQ affinity state.
    pub fn interrupts(&self) -> Option<&InterruptState> {
        match self.get(ConcernKey::DEV_INTERRUPTS)? {
            ConcernState::Interrupts(state) => Some(state),
            _ => None,
        }
    }

    /// Remove and return the IRQ affinity state.
    pub fn take_interrupts(&mut self) -> Option<InterruptState> {
        match self.take_matching(ConcernKey::DEV_INTERRUPTS, |s| {
            matches!(s, ConcernState::Interrupts(_))
        })? {
            ConcernState::Interrupts(state) => Some(state),
            _ => None,
        }
    }

    /// Parallel-stream qdisc state.
    pub fn parallel_stream_qdisc(&self) -> Option<&QdiscState> {
        match self.get(ConcernKey::PARALLEL_STREAM_QDISC)? {
            ConcernState::ParallelStreamQdisc(state) => Some(state),
            _ => None,
        }
    }

    /// Remove and return the parallel-stream qdisc state.
    pub fn take_parallel_stream_qdisc(&mut self) -> Option<QdiscState> {
        match self.take_matching(ConcernKey::PARALLEL_STREAM_QDISC, |s| {
            matches!(s, ConcernState::ParallelStreamQdisc(_))
        })? {
            ConcernState::ParallelStreamQdisc(state) => Some(state),
            _ => None,
        }
    }

    fn position(&self, key: ConcernKey) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }

    /// Remove a state only when `is` accepts it, leaving other entries in place.
    fn take_matching(
        &mut self,
        key: ConcernKey,
        is: fn(&ConcernState) -> bool,
    ) -> Option<ConcernState> {
        let pos = self.position(key)?;
        is(&self.entries[pos].1).then(|| self.entries.remove(pos).1)
    }
}
