//! Device selection shared by the subcommands.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use hwconf::device::{DeviceRef, ShellDevice};
use hwconf::host::{HostRef, LocalHost};
use hwconf::params::HwConfigParams;
use hwconf::targets::TargetDevices;
use hwconf::validation::validate_ifname;

#[derive(Args)]
pub struct TargetArgs {
    /// Parameter file (YAML or JSON), `-` for stdin.
    #[arg(short, long)]
    pub params: PathBuf,

    /// Target device, repeat for several. Order matches per-device parameters.
    #[arg(short, long = "dev", value_name = "NAME", required = true)]
    pub devices: Vec<String>,

    /// Physical function of each target VF; pause frames go there.
    #[arg(long = "pf", value_name = "NAME")]
    pub pfs: Vec<String>,

    /// Network namespace the devices live in.
    #[arg(short, long)]
    pub netns: Option<String>,

    /// Host name used in descriptions.
    #[arg(long, default_value = "localhost")]
    pub host_id: String,
}

impl TargetArgs {
    pub fn load_params(&self) -> anyhow::Result<HwConfigParams> {
        if self.params.as_os_str() == "-" {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading parameters from stdin")?;
            // JSON is valid YAML.
            return HwConfigParams::from_yaml(&input).context("parsing parameters from stdin");
        }
        HwConfigParams::load(&self.params)
            .with_context(|| format!("loading {}", self.params.display()))
    }

    pub fn targets(&self) -> anyhow::Result<LocalTargets> {
        for name in self.devices.iter().chain(&self.pfs) {
            validate_ifname(name, "dev").into_result()?;
        }
        if !self.pfs.is_empty() && self.pfs.len() != self.devices.len() {
            anyhow::bail!(
                "{} --pf given for {} --dev, expected one per device",
                self.pfs.len(),
                self.devices.len()
            );
        }

        let root = LocalHost::new(self.host_id.clone());
        let host: HostRef = Arc::new(root.clone());
        let netns: HostRef = match &self.netns {
            Some(ns) => Arc::new(root.netns(ns.clone())),
            None => host.clone(),
        };
        let device = |name: &String| -> DeviceRef {
            Arc::new(ShellDevice::new(host.clone(), name.clone()).in_netns(netns.clone()))
        };

        Ok(LocalTargets {
            devices: self.devices.iter().map(device).collect(),
            pfs: self.pfs.iter().map(device).collect(),
        })
    }
}

/// Devices named on the command line; every concern targets all of them.
pub struct LocalTargets {
    devices: Vec<DeviceRef>,
    pfs: Vec<DeviceRef>,
}

impl TargetDevices for LocalTargets {
    fn offload_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn mtu_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn coalescing_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn dev_interrupt_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn parallel_stream_qdisc_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn pause_frames_devices(&self) -> Vec<DeviceRef> {
        if self.pfs.is_empty() {
            self.devices.clone()
        } else {
            self.pfs.clone()
        }
    }

    fn dev_queues_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn nfc_rx_flow_hash_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }

    fn rx_hash_function_devices(&self) -> Vec<DeviceRef> {
        self.devices.clone()
    }
}
