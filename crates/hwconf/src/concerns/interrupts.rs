//! IRQ CPU affinity.
//!
//! Pinning device interrupts to CPUs only sticks while `irqbalance` is not
//! running, so the balancer is stopped once per affected host and restarted
//! on deconfigure. The balancer stop is represented by an
//! [`IrqBalanceGuard`] kept in the record; releasing the guard restarts it.
//!
//! Interrupts are found in `/proc/interrupts` by device name or PCI bus
//! info. Some drivers only register their IRQs while the link is up, so a
//! down device is brought up for the lookup and put back down afterwards.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::HwConfig;
use crate::device::DeviceRef;
use crate::error::{Error, Result};
use crate::host::{HostRef, JobLevel};
use crate::parse::{parse_cpu_count, parse_device_interrupts};
use crate::record::{ConcernKey, ConcernState, HwConfigRecord};
use crate::validation::{Validatable, ValidationResult, validate_positional};

const CPU_LISTS: &str = "dev_intr_cpu_lists";
const POLICIES: &str = "dev_intr_cpu_policies";

/// How a device's interrupts are spread over its CPU list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IrqPolicy {
    /// Interrupt `i` goes to CPU `cpus[i % cpus.len()]`.
    #[default]
    RoundRobin,
    /// Every interrupt may run on any CPU of the list.
    All,
}

impl fmt::Display for IrqPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqPolicy::RoundRobin => f.write_str("round-robin"),
            IrqPolicy::All => f.write_str("all"),
        }
    }
}

/// Assign CPUs to interrupts according to a policy.
///
/// Returns `(irq, smp_affinity_list)` pairs in interrupt order.
///
/// ```
/// use hwconf::concerns::{IrqPolicy, assign_irq_cpus};
///
/// let rr = assign_irq_cpus(&[10, 11, 12], &[2, 4], IrqPolicy::RoundRobin);
/// assert_eq!(rr, vec![(10, "2".to_string()), (11, "4".to_string()), (12, "2".to_string())]);
///
/// let all = assign_irq_cpus(&[10, 11], &[2, 4], IrqPolicy::All);
/// assert_eq!(all, vec![(10, "2,4".to_string()), (11, "2,4".to_string())]);
/// ```
pub fn assign_irq_cpus(irqs: &[u32], cpus: &[u32], policy: IrqPolicy) -> Vec<(u32, String)> {
    if cpus.is_empty() {
        return Vec::new();
    }
    match policy {
        IrqPolicy::RoundRobin => irqs
            .iter()
            .zip(cpus.iter().cycle())
            .map(|(irq, cpu)| (*irq, cpu.to_string()))
            .collect(),
        IrqPolicy::All => {
            let list = cpus
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            irqs.iter().map(|irq| (*irq, list.clone())).collect()
        }
    }
}

/// Check CPU ids against the number of CPUs of a host.
pub fn check_cpus(cpus: &[i64], cpu_count: usize) -> Result<Vec<u32>> {
    if cpu_count == 0 {
        return Err(Error::Parse("lscpu reported no CPUs".to_string()));
    }
    cpus.iter()
        .map(|&cpu| {
            u32::try_from(cpu)
                .ok()
                .filter(|&id| (id as usize) < cpu_count)
                .ok_or_else(|| {
                    let accepted = if cpu_count == 1 {
                        "value is: 0".to_string()
                    } else {
                        format!("values are: 0..{}", cpu_count - 1)
                    };
                    Error::invalid_parameter(
                        CPU_LISTS,
                        format!("Invalid CPU value given: {}. Accepted {}.", cpu, accepted),
                    )
                })
        })
        .collect()
}

/// IRQ affinity parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptsParams {
    /// Per target device, the CPUs its interrupts are pinned to. An empty
    /// list leaves that device alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_intr_cpu_lists: Option<Vec<Vec<i64>>>,
    /// Per target device, the spreading policy. Defaults to round-robin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_intr_cpu_policies: Option<Vec<IrqPolicy>>,
}

impl InterruptsParams {
    fn policy(&self, index: usize) -> IrqPolicy {
        self.dev_intr_cpu_policies
            .as_ref()
            .and_then(|policies| policies.get(index))
            .copied()
            .unwrap_or_default()
    }

    /// Check the per-device lists against the number of target devices.
    pub fn validate_devices(&self, devices: usize) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(lists) = &self.dev_intr_cpu_lists {
            result.merge(validate_positional(lists.len(), devices, CPU_LISTS));
        }
        if let Some(policies) = self.dev_intr_cpu_policies.as_ref().filter(|p| !p.is_empty()) {
            result.merge(validate_positional(policies.len(), devices, POLICIES));
        }
        result
    }
}

impl Validatable for InterruptsParams {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        // Ids are range-checked against the host at configure time.
        if self.dev_intr_cpu_policies.is_some() && self.dev_intr_cpu_lists.is_none() {
            result.add_warning(POLICIES, format!("ignored without {}", CPU_LISTS));
        }
        result
    }
}

/// Proof that `irqbalance` is stopped on a host.
///
/// [`IrqBalanceGuard::release`] starts it again. The guard is not released on
/// drop: restarting is a remote command and must be awaited.
#[derive(Debug)]
pub struct IrqBalanceGuard {
    host: HostRef,
}

impl IrqBalanceGuard {
    /// Stop `irqbalance` on `host`.
    pub async fn acquire(host: HostRef) -> Result<Self> {
        host.run("service irqbalance stop").await?;
        tracing::debug!(host = %host.id(), "irqbalance stopped");
        Ok(Self { host })
    }

    /// The host whose balancer is stopped.
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// Start `irqbalance` again.
    pub async fn release(self) -> Result<()> {
        self.host.run("service irqbalance start").await?;
        tracing::debug!(host = %self.host.id(), "irqbalance started");
        Ok(())
    }
}

/// A device whose interrupts were pinned.
#[derive(Debug, Clone)]
pub struct PinnedDevice {
    /// The device.
    pub device: DeviceRef,
    /// The CPU list it was pinned to.
    pub cpus: Vec<u32>,
    /// How interrupts were spread.
    pub policy: IrqPolicy,
    /// `(irq, smp_affinity_list)` as written.
    pub assignments: Vec<(u32, String)>,
}

/// Recorded IRQ affinity configuration.
#[derive(Debug, Default)]
pub struct InterruptState {
    /// Stopped balancers, one per host, in stop order.
    pub irqbalance: Vec<IrqBalanceGuard>,
    /// Pinned devices in configure order.
    pub devices: Vec<PinnedDevice>,
}

impl InterruptState {
    /// Check if nothing was changed.
    pub fn is_empty(&self) -> bool {
        self.irqbalance.is_empty() && self.devices.is_empty()
    }

    fn balancer_stopped(&self, host: &HostRef) -> bool {
        self.irqbalance
            .iter()
            .any(|guard| guard.host().id() == host.id())
    }
}

/// Pins device interrupts to CPU lists.
#[derive(Debug)]
pub struct InterruptsConfig {
    devices: Vec<DeviceRef>,
    params: InterruptsParams,
}

impl InterruptsConfig {
    /// Create the concern.
    pub fn new(devices: Vec<DeviceRef>, params: InterruptsParams) -> Self {
        Self { devices, params }
    }

    fn targets(&self) -> impl Iterator<Item = (usize, &DeviceRef, &Vec<i64>)> {
        self.devices
            .iter()
            .zip(self.params.dev_intr_cpu_lists.iter().flatten())
            .enumerate()
            .filter(|(_, (_, cpus))| !cpus.is_empty())
            .map(|(index, (device, cpus))| (index, device, cpus))
    }

    /// Validate every CPU list against its host before touching anything.
    async fn checked_targets(&self) -> Result<Vec<(DeviceRef, Vec<u32>, IrqPolicy)>> {
        let mut checked = Vec::new();
        for (index, device, cpus) in self.targets() {
            let out = device.netns().run_at("lscpu", JobLevel::Debug).await?;
            let cpus = check_cpus(cpus, parse_cpu_count(&out.stdout)?)?;
            checked.push((device.clone(), cpus, self.params.policy(index)));
        }
        Ok(checked)
    }

    async fn apply(
        &self,
        targets: Vec<(DeviceRef, Vec<u32>, IrqPolicy)>,
        state: &mut InterruptState,
    ) -> Result<()> {
        for (device, cpus, policy) in targets {
            let host = device.host().clone();
            if !state.balancer_stopped(&host) {
                state.irqbalance.push(IrqBalanceGuard::acquire(host).await?);
            }

            let irqs = device_interrupts(&device).await?;
            let assignments = assign_irq_cpus(&irqs, &cpus, policy);
            for (irq, cpu_list) in &assignments {
                device
                    .netns()
                    .run(&format!(
                        "echo -n {} > /proc/irq/{}/smp_affinity_list",
                        cpu_list, irq
                    ))
                    .await?;
            }
            tracing::debug!(
                device = %device.id(),
                irqs = irqs.len(),
                ?cpus,
                %policy,
                "interrupts pinned"
            );

            state.devices.push(PinnedDevice {
                device,
                cpus,
                policy,
                assignments,
            });
        }
        Ok(())
    }
}

/// Interrupt numbers of a device, bringing it up for the lookup if needed.
async fn device_interrupts(device: &DeviceRef) -> Result<Vec<u32>> {
    let was_down = !device.is_up().await?;
    if was_down {
        device.up().await?;
    }

    let table = device
        .netns()
        .run_at("cat /proc/interrupts", JobLevel::Debug)
        .await;

    let restored = if was_down { device.down().await } else { Ok(()) };
    let table = table?;
    restored?;

    Ok(parse_device_interrupts(
        &table.stdout,
        device.name(),
        device.bus_info(),
    ))
}

#[async_trait]
impl HwConfig for InterruptsConfig {
    fn key(&self) -> ConcernKey {
        ConcernKey::DEV_INTERRUPTS
    }

    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let targets = self.checked_targets().await?;
        if targets.is_empty() {
            return Ok(());
        }

        let mut state = InterruptState::default();
        let result = self.apply(targets, &mut state).await;
        // A stopped balancer must be restarted even if pinning failed.
        if !state.is_empty() {
            record.insert(ConcernKey::DEV_INTERRUPTS, ConcernState::Interrupts(state))?;
        }
        result
    }

    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()> {
        let Some(state) = record.take_interrupts() else {
            return Ok(());
        };

        let mut first_error = None;
        for guard in state.irqbalance.into_iter().rev() {
            let host = guard.host().id().to_string();
            if let Err(e) = guard.release().await {
                tracing::warn!(%host, error = %e, "failed to restart irqbalance");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        let Some(state) = record.interrupts().filter(|state| !state.is_empty()) else {
            return vec!["Device irq configuration skipped.".to_string()];
        };

        let stopped = state
            .irqbalance
            .iter()
            .map(|guard| format!("{} irqbalance stopped", guard.host().id()));
        let pinned = state.devices.iter().map(|pinned| {
            format!(
                "{}.{} irqs bound to cpu {:?} with policy:{}",
                pinned.device.host().id(),
                pinned.device.name(),
                pinned.cpus,
                pinned.policy
            )
        });
        stopped.chain(pinned).collect()
    }

    fn plan(&self) -> Vec<String> {
        self.targets()
            .map(|(index, device, cpus)| {
                format!(
                    "{} irqs -> cpu {:?} policy:{}",
                    device.id(),
                    cpus,
                    self.params.policy(index)
                )
            })
            .collect()
    }
}
