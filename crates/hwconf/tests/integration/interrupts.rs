//! IRQ affinity integration tests.

use hwconf::chain::{HwConfig, HwConfigChain};
use hwconf::concerns::{InterruptsConfig, InterruptsParams, IrqPolicy, common_hw_config};
use hwconf::params::HwConfigParams;
use hwconf::record::HwConfigRecord;
use hwconf::targets::TargetDevices;
use hwconf::{ConcernKey, Error, Result};

use crate::common::Testbed;

fn interrupts(bed: &Testbed, params: InterruptsParams) -> InterruptsConfig {
    InterruptsConfig::new(bed.pair().dev_interrupt_devices(), params)
}

#[tokio::test]
async fn test_round_robin_and_all() -> Result<()> {
    let bed = Testbed::new();
    let concern = interrupts(
        &bed,
        InterruptsParams {
            dev_intr_cpu_lists: Some(vec![vec![2, 3], vec![0, 1]]),
            dev_intr_cpu_policies: Some(vec![IrqPolicy::RoundRobin, IrqPolicy::All]),
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert_eq!(
        bed.host1.commands_matching("echo"),
        vec![
            "echo -n 2 > /proc/irq/10/smp_affinity_list",
            "echo -n 3 > /proc/irq/11/smp_affinity_list",
            "echo -n 2 > /proc/irq/12/smp_affinity_list",
            "echo -n 3 > /proc/irq/13/smp_affinity_list",
            "echo -n 2 > /proc/irq/14/smp_affinity_list",
        ]
    );
    assert_eq!(
        bed.host2.commands_matching("echo").len(),
        5,
        "every eth0 interrupt is pinned on host2"
    );
    assert!(
        bed.host2
            .commands_matching("echo")
            .iter()
            .all(|cmd| cmd.starts_with("echo -n 0,1 > "))
    );
    assert_eq!(
        concern.describe(&record),
        vec![
            "host1 irqbalance stopped",
            "host2 irqbalance stopped",
            "host1.eth0 irqs bound to cpu [2, 3] with policy:round-robin",
            "host2.eth0 irqs bound to cpu [0, 1] with policy:all",
        ]
    );

    bed.clear_commands();
    concern.deconfigure(&mut record).await?;
    assert!(record.is_empty());
    assert_eq!(bed.host1.commands(), vec!["service irqbalance start"]);
    assert_eq!(bed.host2.commands(), vec!["service irqbalance start"]);

    Ok(())
}

#[tokio::test]
async fn test_balancer_stopped_once_per_host() -> Result<()> {
    let bed = Testbed::new();
    let second = crate::common::lab_device(&bed.host1, "eth1");
    bed.host1.respond(
        "cat /proc/interrupts",
        "            CPU0       CPU1       CPU2       CPU3
 10:          0          0          0          0   PCI-MSI 1-edge      eth0-TxRx-0
 20:          0          0          0          0   PCI-MSI 2-edge      eth1-TxRx-0
",
    );
    let concern = InterruptsConfig::new(
        vec![bed.eth1.clone().into_ref(), second.into_ref()],
        InterruptsParams {
            dev_intr_cpu_lists: Some(vec![vec![1], vec![2]]),
            dev_intr_cpu_policies: None,
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert_eq!(bed.host1.commands_matching("service irqbalance"), vec!["service irqbalance stop"]);
    assert_eq!(
        bed.host1.commands_matching("echo"),
        vec![
            "echo -n 1 > /proc/irq/10/smp_affinity_list",
            "echo -n 2 > /proc/irq/20/smp_affinity_list",
        ]
    );

    concern.deconfigure(&mut record).await?;
    assert_eq!(
        bed.host1.commands_matching("service irqbalance"),
        vec!["service irqbalance stop", "service irqbalance start"]
    );
    Ok(())
}

#[tokio::test]
async fn test_down_device_is_brought_up_for_lookup() -> Result<()> {
    let host = crate::common::lab_host("host1");
    let eth0 = crate::common::lab_device(&host, "eth0").down_initially();
    let concern = InterruptsConfig::new(
        vec![eth0.clone().into_ref()],
        InterruptsParams {
            dev_intr_cpu_lists: Some(vec![vec![0]]),
            dev_intr_cpu_policies: None,
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert_eq!(eth0.link_changes(), vec![true, false]);
    assert!(!eth0.up_state());
    assert_eq!(host.commands_matching("echo").len(), 5);

    concern.deconfigure(&mut record).await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_cpu_changes_nothing() {
    let bed = Testbed::new();
    let chain = HwConfigChain::new().with(interrupts(
        &bed,
        InterruptsParams {
            dev_intr_cpu_lists: Some(vec![vec![1], vec![9]]),
            dev_intr_cpu_policies: None,
        },
    ));
    let mut record = HwConfigRecord::new();

    let err = chain.configure(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::InvalidParameter { .. }));
    assert!(
        err.to_string()
            .contains("Invalid CPU value given: 9. Accepted values are: 0..7.")
    );
    assert!(!record.contains(ConcernKey::DEV_INTERRUPTS));
    for host in [&bed.host1, &bed.host2] {
        assert!(host.commands_matching("service").is_empty());
        assert!(host.commands_matching("echo").is_empty());
    }
}

#[tokio::test]
async fn test_empty_cpu_list_leaves_device_alone() -> Result<()> {
    let bed = Testbed::new();
    let concern = interrupts(
        &bed,
        InterruptsParams {
            dev_intr_cpu_lists: Some(vec![vec![], vec![1]]),
            dev_intr_cpu_policies: None,
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert!(bed.host1.commands().is_empty());
    assert_eq!(bed.host2.commands_matching("echo").len(), 5);
    assert_eq!(
        concern.describe(&record),
        vec![
            "host2 irqbalance stopped",
            "host2.eth0 irqs bound to cpu [1] with policy:round-robin",
        ]
    );

    concern.deconfigure(&mut record).await?;
    Ok(())
}

#[tokio::test]
async fn test_negative_cpu_names_accepted_range() {
    let bed = Testbed::new();
    let mut params = HwConfigParams::default();
    params.interrupts.dev_intr_cpu_lists = Some(vec![vec![-1], vec![0]]);
    let chain = common_hw_config(&params, &bed.pair()).unwrap();
    let mut record = HwConfigRecord::new();

    let err = chain.configure(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::InvalidParameter { .. }));
    assert!(
        err.to_string()
            .contains("Invalid CPU value given: -1. Accepted values are: 0..7.")
    );
    assert!(!record.contains(ConcernKey::DEV_INTERRUPTS));
    for host in [&bed.host1, &bed.host2] {
        assert!(host.commands_matching("service").is_empty());
    }
}

#[tokio::test]
async fn test_balancers_restarted_in_reverse() {
    let bed = Testbed::new();
    let concern = interrupts(
        &bed,
        InterruptsParams {
            dev_intr_cpu_lists: Some(vec![vec![0], vec![1]]),
            dev_intr_cpu_policies: None,
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await.unwrap();
    bed.clear_commands();
    bed.host1.fail("service irqbalance start", 1, "host1 down");
    bed.host2.fail("service irqbalance start", 1, "host2 down");

    let err = concern.deconfigure(&mut record).await.unwrap_err();

    // host2 stopped last, so it is restarted first.
    assert!(err.to_string().starts_with("host2: "));
    assert!(record.is_empty());
    for host in [&bed.host1, &bed.host2] {
        assert_eq!(host.commands(), vec!["service irqbalance start"]);
    }
}
