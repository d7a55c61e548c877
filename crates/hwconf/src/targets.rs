//! Which devices each concern acts on.
//!
//! A recipe describes its topology by implementing [`TargetDevices`]. Every
//! list defaults to empty, which makes the corresponding concern skip.

use crate::device::DeviceRef;

/// Per-concern target device lists.
///
/// Lists are positional: per-device parameters (`dev_queues`,
/// `dev_intr_cpu_lists`, per-device `coalescing_settings`) are matched
/// index by index.
pub trait TargetDevices {
    /// Devices for offload settings.
    fn offload_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices for the MTU.
    fn mtu_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices for coalescing.
    fn coalescing_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices whose interrupts get pinned.
    fn dev_interrupt_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices that get an `mq` root qdisc for parallel streams.
    fn parallel_stream_qdisc_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices for pause frames.
    fn pause_frames_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices whose channel counts are set.
    fn dev_queues_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices for the NFC RX flow hash.
    fn nfc_rx_flow_hash_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }

    /// Devices for the RSS hash function.
    fn rx_hash_function_devices(&self) -> Vec<DeviceRef> {
        Vec::new()
    }
}

/// Two directly connected endpoints, every concern on both.
#[derive(Debug, Clone)]
pub struct EndpointPair {
    /// First endpoint.
    pub endpoint1: DeviceRef,
    /// Second endpoint.
    pub endpoint2: DeviceRef,
}

impl EndpointPair {
    /// Create a pair.
    pub fn new(endpoint1: DeviceRef, endpoint2: DeviceRef) -> Self {
        Self {
            endpoint1,
            endpoint2,
        }
    }

    /// Both endpoints, first one first.
    pub fn devices(&self) -> Vec<DeviceRef> {
        vec![self.endpoint1.clone(), self.endpoint2.clone()]
    }
}

impl TargetDevices for EndpointPair {
    fn offload_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn mtu_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn coalescing_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn dev_interrupt_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn parallel_stream_qdisc_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn pause_frames_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn dev_queues_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn nfc_rx_flow_hash_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }

    fn rx_hash_function_devices(&self) -> Vec<DeviceRef> {
        self.devices()
    }
}

/// Endpoints that are SR-IOV virtual functions.
///
/// Pause frames are a physical port property, so they target the PFs; every
/// other concern targets the VFs.
#[derive(Debug, Clone)]
pub struct VfEndpointPair {
    /// The virtual functions carrying traffic.
    pub vfs: EndpointPair,
    /// Their physical functions.
    pub pfs: EndpointPair,
}

impl VfEndpointPair {
    /// Create a VF pair.
    pub fn new(vfs: EndpointPair, pfs: EndpointPair) -> Self {
        Self { vfs, pfs }
    }
}

impl TargetDevices for VfEndpointPair {
    fn offload_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn mtu_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn coalescing_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn dev_interrupt_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn parallel_stream_qdisc_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn pause_frames_devices(&self) -> Vec<DeviceRef> {
        self.pfs.devices()
    }

    fn dev_queues_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn nfc_rx_flow_hash_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }

    fn rx_hash_function_devices(&self) -> Vec<DeviceRef> {
        self.vfs.devices()
    }
}
