//! Common test utilities for integration tests.
//!
//! Provides `Testbed`, two lab hosts with one tunable device each, and
//! helper macros for checking device attributes.

#![allow(dead_code)]

use hwconf::lab::{LabDevice, LabHost};
use hwconf::targets::{EndpointPair, VfEndpointPair};

/// `ethtool -l` output with 16 of 32 combined channels in use.
pub const CHANNELS: &str = "Channel parameters for eth0:
Pre-set maximums:
RX:\t\tn/a
TX:\t\tn/a
Other:\t\t1
Combined:\t32
Current hardware settings:
RX:\t\tn/a
TX:\t\tn/a
Other:\t\t1
Combined:\t16
";

/// `/proc/interrupts` with five queue interrupts for `eth0`.
pub const INTERRUPTS: &str = "            CPU0       CPU1       CPU2       CPU3
  0:         18          0          0          0   IO-APIC   2-edge      timer
 10:          0        120          0          0   PCI-MSI 524288-edge      eth0-TxRx-0
 11:        300          0          0          0   PCI-MSI 524289-edge      eth0-TxRx-1
 12:          0          0          0          0   PCI-MSI 524290-edge      eth0-TxRx-2
 13:          0          0          0          0   PCI-MSI 524291-edge      eth0-TxRx-3
 14:          0          0          0          0   PCI-MSI 524292-edge      eth0-TxRx-4
NMI:          0          0          0          0   Non-maskable interrupts
";

/// Attribute values every lab device starts with.
pub const DEFAULT_ATTRIBUTES: &[(&str, Initial)] = &[
    ("mtu", Initial::Int(1500)),
    ("adaptive_rx_coalescing", Initial::Bool(true)),
    ("adaptive_tx_coalescing", Initial::Bool(true)),
    ("coalescing_rx_usecs", Initial::Int(3)),
    ("coalescing_tx_usecs", Initial::Int(0)),
    ("rx_pause_frames", Initial::Bool(true)),
    ("tx_pause_frames", Initial::Bool(true)),
    ("offload_gro", Initial::Bool(true)),
    ("offload_tso", Initial::Bool(true)),
    ("rx_hash_function", Initial::Str("toeplitz")),
    ("nfc_rx_flow_hash_udp4", Initial::Str("sd")),
];

/// A starting attribute value.
#[derive(Debug, Clone, Copy)]
pub enum Initial {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl From<Initial> for hwconf::AttrValue {
    fn from(value: Initial) -> Self {
        match value {
            Initial::Bool(v) => v.into(),
            Initial::Int(v) => v.into(),
            Initial::Str(v) => v.into(),
        }
    }
}

/// A host with 8 CPUs and scripted `ethtool`, `tc` and `/proc` output.
pub fn lab_host(id: &str) -> LabHost {
    let host = LabHost::new(id);
    host.respond("lscpu", "Architecture:  x86_64\nCPU(s):        8\n")
        .respond("cat /proc/interrupts", INTERRUPTS)
        .respond("ethtool -l", CHANNELS)
        .respond("tc qdisc show", "qdisc fq_codel 0: root refcnt 2\n");
    host
}

/// A device carrying [`DEFAULT_ATTRIBUTES`].
pub fn lab_device(host: &LabHost, name: &str) -> LabDevice {
    DEFAULT_ATTRIBUTES
        .iter()
        .fold(LabDevice::new(host, name), |dev, (attr, value)| {
            dev.with_attribute(attr, *value)
        })
}

/// Two hosts, one `eth0` on each.
pub struct Testbed {
    pub host1: LabHost,
    pub host2: LabHost,
    pub eth1: LabDevice,
    pub eth2: LabDevice,
}

impl Testbed {
    pub fn new() -> Self {
        let host1 = lab_host("host1");
        let host2 = lab_host("host2");
        let eth1 = lab_device(&host1, "eth0");
        let eth2 = lab_device(&host2, "eth0");
        Self {
            host1,
            host2,
            eth1,
            eth2,
        }
    }

    /// Both devices as a simple endpoint pair.
    pub fn pair(&self) -> EndpointPair {
        EndpointPair::new(self.eth1.clone().into_ref(), self.eth2.clone().into_ref())
    }

    /// Clear the command logs of both hosts.
    pub fn clear_commands(&self) {
        self.host1.clear_commands();
        self.host2.clear_commands();
    }
}

/// Two VFs on top of two PFs, one of each per host.
pub struct VfTestbed {
    pub host1: LabHost,
    pub host2: LabHost,
    pub vf1: LabDevice,
    pub vf2: LabDevice,
    pub pf1: LabDevice,
    pub pf2: LabDevice,
}

impl VfTestbed {
    pub fn new() -> Self {
        let host1 = lab_host("host1");
        let host2 = lab_host("host2");
        Self {
            vf1: lab_device(&host1, "eth0v0"),
            vf2: lab_device(&host2, "eth0v0"),
            pf1: lab_device(&host1, "eth0"),
            pf2: lab_device(&host2, "eth0"),
            host1,
            host2,
        }
    }

    pub fn targets(&self) -> VfEndpointPair {
        VfEndpointPair::new(
            EndpointPair::new(self.vf1.clone().into_ref(), self.vf2.clone().into_ref()),
            EndpointPair::new(self.pf1.clone().into_ref(), self.pf2.clone().into_ref()),
        )
    }
}

/// Assert that a lab device attribute has a value.
#[macro_export]
macro_rules! assert_attr {
    ($dev:expr, $attr:expr, $value:expr) => {
        assert_eq!(
            $dev.attribute($attr),
            Some(hwconf::AttrValue::from($value)),
            "{} on {}",
            $attr,
            stringify!($dev)
        )
    };
}

/// Assert that a lab device carries every [`DEFAULT_ATTRIBUTES`] value.
#[macro_export]
macro_rules! assert_defaults {
    ($dev:expr) => {
        for (attr, value) in crate::common::DEFAULT_ATTRIBUTES {
            assert_attr!($dev, attr, *value);
        }
    };
}
