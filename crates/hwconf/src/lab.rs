//! In-memory hosts and devices for tests.
//!
//! [`LabHost`] records every command it is asked to run and answers from a
//! table of scripted outputs. [`LabDevice`] keeps its attributes in memory.
//! Both are cheap to clone; clones share state, so a test can keep a handle
//! while the chain owns another.
//!
//! # Example
//!
//! ```ignore
//! use hwconf::lab::{LabDevice, LabHost};
//!
//! let host = LabHost::new("host1");
//! host.respond("lscpu", "CPU(s): 4\n");
//! let eth0 = LabDevice::new(&host, "eth0").with_attribute("mtu", 1500);
//!
//! // ... run a chain against eth0.clone().into_ref() ...
//!
//! assert!(host.commands().contains(&"service irqbalance stop".to_string()));
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::device::{AttrValue, Device, DeviceRef};
use crate::error::{Error, Result};
use crate::host::{CommandOutput, Host, HostRef, JobLevel};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct LabHostState {
    commands: Vec<String>,
    responses: Vec<(String, CommandOutput)>,
}

/// A host that records commands and replays scripted outputs.
///
/// Commands without a scripted output succeed with empty stdout. When
/// several prefixes match, the most recently scripted one wins.
#[derive(Debug, Clone)]
pub struct LabHost {
    id: Arc<str>,
    state: Arc<Mutex<LabHostState>>,
}

impl LabHost {
    /// Create a host with the given identifier.
    pub fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::default(),
        }
    }

    /// Answer commands starting with `prefix` with a successful `stdout`.
    pub fn respond(&self, prefix: &str, stdout: &str) -> &Self {
        lock(&self.state)
            .responses
            .push((prefix.to_string(), CommandOutput::ok(stdout)));
        self
    }

    /// Answer commands starting with `prefix` with a failure.
    pub fn fail(&self, prefix: &str, exit_code: i32, stderr: &str) -> &Self {
        lock(&self.state)
            .responses
            .push((prefix.to_string(), CommandOutput::failed(exit_code, stderr)));
        self
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    /// Commands run so far that start with `prefix`.
    pub fn commands_matching(&self, prefix: &str) -> Vec<String> {
        lock(&self.state)
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Forget the recorded commands.
    pub fn clear_commands(&self) {
        lock(&self.state).commands.clear();
    }

    /// Shared handle for use as a device's host.
    pub fn to_ref(&self) -> HostRef {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Host for LabHost {
    fn id(&self) -> &str {
        &self.id
    }

    async fn exec(&self, command: &str, _level: JobLevel) -> Result<CommandOutput> {
        let mut state = lock(&self.state);
        state.commands.push(command.to_string());
        let output = state
            .responses
            .iter()
            .rev()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();
        Ok(output)
    }
}

#[derive(Debug, Default)]
struct LabDeviceState {
    attributes: BTreeMap<String, AttrValue>,
    up: bool,
    link_changes: Vec<bool>,
    fail_writes: bool,
}

/// A device whose attributes live in memory.
#[derive(Debug, Clone)]
pub struct LabDevice {
    name: String,
    host: HostRef,
    netns: HostRef,
    bus_info: Option<String>,
    state: Arc<Mutex<LabDeviceState>>,
}

impl LabDevice {
    /// Create a device on `host`, administratively up, with no attributes.
    pub fn new(host: &LabHost, name: &str) -> Self {
        let host = host.to_ref();
        Self {
            name: name.to_string(),
            netns: host.clone(),
            host,
            bus_info: None,
            state: Arc::new(Mutex::new(LabDeviceState {
                up: true,
                ..Default::default()
            })),
        }
    }

    /// Run the device's commands in another namespace.
    pub fn in_netns(mut self, netns: &LabHost) -> Self {
        self.netns = netns.to_ref();
        self
    }

    /// Set the PCI bus info.
    pub fn with_bus_info(mut self, bus_info: &str) -> Self {
        self.bus_info = Some(bus_info.to_string());
        self
    }

    /// Give the device an attribute.
    pub fn with_attribute(self, name: &str, value: impl Into<AttrValue>) -> Self {
        lock(&self.state)
            .attributes
            .insert(name.to_string(), value.into());
        self
    }

    /// Start administratively down.
    pub fn down_initially(self) -> Self {
        lock(&self.state).up = false;
        self
    }

    /// Make every attribute write fail from now on.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Current value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<AttrValue> {
        lock(&self.state).attributes.get(name).cloned()
    }

    /// Current administrative state.
    pub fn up_state(&self) -> bool {
        lock(&self.state).up
    }

    /// Every up (`true`) / down (`false`) transition requested so far.
    pub fn link_changes(&self) -> Vec<bool> {
        lock(&self.state).link_changes.clone()
    }

    /// Shared handle for use in target device lists.
    pub fn into_ref(self) -> DeviceRef {
        Arc::new(self)
    }

    fn set_link(&self, up: bool) {
        let mut state = lock(&self.state);
        state.up = up;
        state.link_changes.push(up);
    }
}

#[async_trait]
impl Device for LabDevice {
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
        self.attribute(attribute)
            .ok_or_else(|| Error::UnsupportedAttribute {
                device: self.id(),
                attribute: attribute.to_string(),
            })
    }

    async fn set_attribute(&self, attribute: &str, value: &AttrValue) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(Error::RemoteCommand {
                host: self.host.id().to_string(),
                command: format!("set {} {} {}", self.name, attribute, value),
                exit_code: 1,
                stderr: "Operation not supported".into(),
            });
        }
        state.attributes.insert(attribute.to_string(), value.clone());
        Ok(())
    }

    async fn is_up(&self) -> Result<bool> {
        Ok(self.up_state())
    }

    async fn up(&self) -> Result<()> {
        self.set_link(true);
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        self.set_link(false);
        Ok(())
    }
}
