//! Network devices and their named attributes.
//!
//! The configuration protocol only needs a small capability set from a
//! device: read and write a named attribute, bring it up or down, and know
//! which host and namespace it lives in. [`Device`] captures that contract;
//! [`ShellDevice`] implements it on top of `ip`, `ethtool` and sysfs.
//!
//! # Attribute names
//!
//! | Attribute                   | Backed by                            |
//! |-----------------------------|--------------------------------------|
//! | `mtu`                       | `/sys/class/net/<dev>/mtu`, `ip link`|
//! | `adaptive_rx_coalescing`    | `ethtool -c` / `-C adaptive-rx`      |
//! | `adaptive_tx_coalescing`    | `ethtool -c` / `-C adaptive-tx`      |
//! | `coalescing_<key>`          | `ethtool -c` / `-C <key>`            |
//! | `rx_pause_frames`           | `ethtool -a` / `-A rx`               |
//! | `tx_pause_frames`           | `ethtool -a` / `-A tx`               |
//! | `offload_<feature>`         | `ethtool -k` / `-K <feature>`        |
//! | `rx_hash_function`          | `ethtool -x` / `-X hfunc`            |
//! | `nfc_rx_flow_hash_<type>`   | `ethtool -n` / `-N rx-flow-hash`     |

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::host::{HostRef, JobLevel};
use crate::parse::{
    CoalesceParameters, feature_long_name, parse_features, parse_key_values, parse_link_is_up,
    parse_on_off, parse_rx_flow_hash, parse_rx_hash_function,
};

/// Shared handle to a device.
pub type DeviceRef = Arc<dyn Device>;

/// Value of a device attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A flag.
    Bool(bool),
    /// A number.
    Int(i64),
    /// Anything else (hash function names, flow hash fields).
    Str(String),
}

impl AttrValue {
    /// Render the value the way `ethtool`/`ip` expect it on the command line.
    pub fn to_arg(&self) -> String {
        match self {
            AttrValue::Bool(true) => "on".to_string(),
            AttrValue::Bool(false) => "off".to_string(),
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Str(v) => v.clone(),
        }
    }

    /// Interpret the value as a flag (`true`, `"on"`, `1`).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            AttrValue::Int(0) => Some(false),
            AttrValue::Int(1) => Some(true),
            AttrValue::Int(_) => None,
            AttrValue::Str(v) => match v.as_str() {
                "on" | "true" => Some(true),
                "off" | "false" => Some(false),
                _ => None,
            },
        }
    }

    /// Parse tool output: numbers become [`AttrValue::Int`].
    pub fn from_output(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(v) => AttrValue::Int(v),
            Err(_) => AttrValue::Str(value.trim().to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v.into())
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v.into())
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// Device attribute for a coalescing key in `ethtool -C` vocabulary.
///
/// `rx-usecs` becomes `coalescing_rx_usecs`.
pub fn coalescing_attribute(key: &str) -> String {
    format!("coalescing_{}", key.replace('-', "_"))
}

/// Device attribute for an offload feature in `ethtool -K` vocabulary.
pub fn offload_attribute(feature: &str) -> String {
    format!("offload_{}", feature.replace('-', "_"))
}

/// Device attribute for the NFC flow hash of a flow type (`tcp4`).
pub fn rx_flow_hash_attribute(flow_type: &str) -> String {
    format!("nfc_rx_flow_hash_{}", flow_type)
}

/// A network device the configuration protocol can act on.
#[async_trait]
pub trait Device: Send + Sync + fmt::Debug {
    /// Interface name.
    fn name(&self) -> &str;

    /// The machine owning the device.
    fn host(&self) -> &HostRef;

    /// Where commands for this device run; differs from [`Device::host`]
    /// when the device was moved into a network namespace.
    fn netns(&self) -> &HostRef {
        self.host()
    }

    /// PCI bus info, when the device is backed by hardware.
    fn bus_info(&self) -> Option<&str> {
        None
    }

    /// `<host>.<device>` identifier.
    fn id(&self) -> String {
        format!("{}.{}", self.host().id(), self.name())
    }

    /// Read a named attribute.
    async fn get_attribute(&self, attribute: &str) -> Result<AttrValue>;

    /// Write a named attribute.
    async fn set_attribute(&self, attribute: &str, value: &AttrValue) -> Result<()>;

    /// Check the administrative UP flag.
    async fn is_up(&self) -> Result<bool>;

    /// Set the device administratively up.
    async fn up(&self) -> Result<()>;

    /// Set the device administratively down.
    async fn down(&self) -> Result<()>;
}

/// Attribute names understood by [`ShellDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceAttribute {
    Mtu,
    AdaptiveCoalescing(&'static str),
    Coalescing(String),
    PauseFrames(&'static str),
    Offload(String),
    RxHashFunction,
    RxFlowHash(String),
}

impl DeviceAttribute {
    fn parse(attribute: &str) -> Option<Self> {
        let attr = match attribute {
            "mtu" => Self::Mtu,
            "adaptive_rx_coalescing" => Self::AdaptiveCoalescing("rx"),
            "adaptive_tx_coalescing" => Self::AdaptiveCoalescing("tx"),
            "rx_pause_frames" => Self::PauseFrames("rx"),
            "tx_pause_frames" => Self::PauseFrames("tx"),
            "rx_hash_function" => Self::RxHashFunction,
            other => {
                if let Some(key) = other.strip_prefix("coalescing_") {
                    Self::Coalescing(key.replace('_', "-"))
                } else if let Some(flow_type) = other.strip_prefix("nfc_rx_flow_hash_") {
                    Self::RxFlowHash(flow_type.to_string())
                } else if let Some(feature) = other.strip_prefix("offload_") {
                    Self::Offload(feature.replace('_', "-"))
                } else {
                    return None;
                }
            }
        };
        Some(attr)
    }
}

/// A device driven through shell commands on its namespace.
#[derive(Debug, Clone)]
pub struct ShellDevice {
    name: String,
    host: HostRef,
    netns: HostRef,
    bus_info: Option<String>,
}

impl ShellDevice {
    /// Create a device living in the root namespace of `host`.
    pub fn new(host: HostRef, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            netns: host.clone(),
            host,
            bus_info: None,
        }
    }

    /// Run the device's commands in another namespace of the same host.
    pub fn in_netns(mut self, netns: HostRef) -> Self {
        self.netns = netns;
        self
    }

    /// Set the PCI bus info used to find the device's interrupts.
    pub fn with_bus_info(mut self, bus_info: impl Into<String>) -> Self {
        self.bus_info = Some(bus_info.into());
        self
    }

    fn unsupported(&self, attribute: &str) -> Error {
        Error::UnsupportedAttribute {
            device: self.id(),
            attribute: attribute.to_string(),
        }
    }

    async fn query(&self, command: String) -> Result<String> {
        Ok(self.netns.run_at(&command, JobLevel::Debug).await?.stdout)
    }

    async fn apply(&self, command: String) -> Result<()> {
        self.netns.run(&command).await?;
        Ok(())
    }
}

#[async_trait]
impl Device for ShellDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> &HostRef {
        &self.host
    }

    fn netns(&self) -> &HostRef {
        &self.netns
    }

    fn bus_info(&self) -> Option<&str> {
        self.bus_info.as_deref()
    }

    async fn get_attribute(&self, attribute: &str) -> Result<AttrValue> {
        let attr = DeviceAttribute::parse(attribute).ok_or_else(|| self.unsupported(attribute))?;
        let dev = &self.name;

        let value = match attr {
            DeviceAttribute::Mtu => {
                let out = self.query(format!("cat /sys/class/net/{}/mtu", dev)).await?;
                Some(AttrValue::from_output(&out))
            }
            DeviceAttribute::AdaptiveCoalescing(dir) => {
                let coalesce = CoalesceParameters::parse(&self.query(format!("ethtool -c {}", dev)).await?);
                let flag = if dir == "rx" {
                    coalesce.adaptive_rx
                } else {
                    coalesce.adaptive_tx
                };
                flag.map(AttrValue::Bool)
            }
            DeviceAttribute::Coalescing(key) => {
                let coalesce = CoalesceParameters::parse(&self.query(format!("ethtool -c {}", dev)).await?);
                coalesce
                    .settings
                    .get(&key)
                    .cloned()
                    .flatten()
                    .map(|v| AttrValue::from_output(&v))
            }
            DeviceAttribute::PauseFrames(dir) => {
                let pause = parse_key_values(&self.query(format!("ethtool -a {}", dev)).await?);
                pause.get(dir).and_then(|v| parse_on_off(v)).map(AttrValue::Bool)
            }
            DeviceAttribute::Offload(feature) => {
                let features = parse_features(&self.query(format!("ethtool -k {}", dev)).await?);
                features
                    .get(feature_long_name(&feature))
                    .copied()
                    .map(AttrValue::Bool)
            }
            DeviceAttribute::RxHashFunction => {
                parse_rx_hash_function(&self.query(format!("ethtool -x {}", dev)).await?)
                    .map(AttrValue::Str)
            }
            DeviceAttribute::RxFlowHash(flow_type) => {
                let out = self
                    .query(format!("ethtool -n {} rx-flow-hash {}", dev, flow_type))
                    .await?;
                Some(AttrValue::Str(parse_rx_flow_hash(&out)))
            }
        };

        value.ok_or_else(|| self.unsupported(attribute))
    }

    async fn set_attribute(&self, attribute: &str, value: &AttrValue) -> Result<()> {
        let attr = DeviceAttribute::parse(attribute).ok_or_else(|| self.unsupported(attribute))?;
        let dev = &self.name;
        let arg = value.to_arg();

        let command = match attr {
            DeviceAttribute::Mtu => format!("ip link set dev {} mtu {}", dev, arg),
            DeviceAttribute::AdaptiveCoalescing(dir) => {
                format!("ethtool -C {} adaptive-{} {}", dev, dir, arg)
            }
            DeviceAttribute::Coalescing(key) => format!("ethtool -C {} {} {}", dev, key, arg),
            DeviceAttribute::PauseFrames(dir) => format!("ethtool -A {} {} {}", dev, dir, arg),
            DeviceAttribute::Offload(feature) => format!("ethtool -K {} {} {}", dev, feature, arg),
            DeviceAttribute::RxHashFunction => format!("ethtool -X {} hfunc {}", dev, arg),
            DeviceAttribute::RxFlowHash(flow_type) => {
                format!("ethtool -N {} rx-flow-hash {} {}", dev, flow_type, arg)
            }
        };

        self.apply(command).await
    }

    async fn is_up(&self) -> Result<bool> {
        parse_link_is_up(&self.query(format!("ip -o link show dev {}", self.name)).await?)
    }

    async fn up(&self) -> Result<()> {
        self.apply(format!("ip link set dev {} up", self.name)).await
    }

    async fn down(&self) -> Result<()> {
        self.apply(format!("ip link set dev {} down", self.name)).await
    }
}
