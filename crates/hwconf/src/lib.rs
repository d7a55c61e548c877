//! Reversible, layered NIC tuning for network test scenarios.
//!
//! A test scenario often needs devices in a particular hardware state before
//! it measures anything: jumbo MTU, adaptive coalescing off, interrupts
//! pinned to chosen CPUs, a fixed number of channels. This crate applies such
//! settings through a chain of independent *concerns*, remembers every
//! original value in a per-run record, and puts everything back afterwards.
//!
//! # Features
//!
//! - `yaml` - Parameter files in YAML
//! - `lab` - In-memory hosts and devices for tests
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use hwconf::concerns::common_hw_config;
//! use hwconf::device::ShellDevice;
//! use hwconf::host::LocalHost;
//! use hwconf::params::HwConfigParams;
//! use hwconf::record::HwConfigRecord;
//! use hwconf::targets::EndpointPair;
//!
//! #[tokio::main]
//! async fn main() -> hwconf::Result<()> {
//!     let host: hwconf::HostRef = Arc::new(LocalHost::new("localhost"));
//!     let targets = EndpointPair::new(
//!         Arc::new(ShellDevice::new(host.clone(), "veth0")),
//!         Arc::new(ShellDevice::new(host.clone(), "veth1")),
//!     );
//!
//!     let params = HwConfigParams::load("tuning.yaml")?;
//!     let chain = common_hw_config(&params, &targets)?;
//!
//!     let mut record = HwConfigRecord::new();
//!     let configured = chain.configure(&mut record).await;
//!     if configured.is_ok() {
//!         for line in chain.describe(&record) {
//!             println!("{}", line);
//!         }
//!     }
//!
//!     // Always undo, even after a partial configure.
//!     let report = chain.deconfigure(&mut record).await;
//!     configured?;
//!     report.into_result()
//! }
//! ```
//!
//! # Layout
//!
//! - [`host`] and [`device`] - what the concerns act on
//! - [`attribute`] - reversible get/set of one device attribute
//! - [`concerns`] - the tunables
//! - [`chain`] - ordered composition of concerns
//! - [`record`] - per-run state shared by the concerns
//! - [`params`] and [`targets`] - the user's values and the recipe's devices

pub mod attribute;
pub mod chain;
pub mod concerns;
pub mod device;
pub mod error;
pub mod host;
pub mod params;
pub mod parse;
pub mod record;
pub mod targets;
pub mod validation;

#[cfg(any(test, feature = "lab"))]
pub mod lab;

pub use chain::{DeconfigureReport, HwConfig, HwConfigChain, RunOutcome};
pub use device::{AttrValue, Device, DeviceRef};
pub use error::{Error, Result};
pub use host::{Host, HostRef};
pub use params::HwConfigParams;
pub use record::{ConcernKey, HwConfigRecord};
pub use targets::TargetDevices;
