//! Absent parameters and empty target lists.

use hwconf::concerns::{MtuParams, common_hw_config};
use hwconf::params::HwConfigParams;
use hwconf::record::HwConfigRecord;
use hwconf::targets::TargetDevices;
use hwconf::Result;

use crate::common::Testbed;

/// A topology without any target devices.
struct NoDevices;

impl TargetDevices for NoDevices {}

#[tokio::test]
async fn test_empty_params_touch_nothing() -> Result<()> {
    let bed = Testbed::new();
    let chain = common_hw_config(&HwConfigParams::default(), &bed.pair())?;
    let mut record = HwConfigRecord::new();

    assert!(chain.plan().is_empty());
    chain.configure(&mut record).await?;

    assert!(record.is_empty());
    assert!(bed.host1.commands().is_empty());
    assert!(bed.host2.commands().is_empty());
    assert_eq!(
        chain.describe(&record),
        vec![
            "Offload configuration skipped.",
            "MTU configuration skipped.",
            "Coalescing configuration skipped.",
            "Device irq configuration skipped.",
            "Parallel stream qdisc configuration skipped.",
            "Pause frames configuration skipped.",
            "device queues configuration skipped",
            "NFC RX flow hash configuration skipped.",
            "RX hash function configuration skipped.",
        ]
    );

    let report = chain.deconfigure(&mut record).await;
    assert!(report.is_success());
    assert!(report.deconfigured.is_empty());
    assert_defaults!(bed.eth1);
    Ok(())
}

#[tokio::test]
async fn test_no_target_devices() -> Result<()> {
    let params = HwConfigParams {
        mtu: MtuParams { mtu: Some(9000) },
        ..Default::default()
    };
    let chain = common_hw_config(&params, &NoDevices)?;
    let mut record = HwConfigRecord::new();

    assert!(chain.plan().is_empty());
    chain.configure(&mut record).await?;

    assert!(record.is_empty());
    assert!(
        chain
            .describe(&record)
            .contains(&"MTU configuration skipped.".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_deconfigure_without_configure() {
    let bed = Testbed::new();
    let chain = common_hw_config(&HwConfigParams::example(), &bed.pair()).unwrap();
    let mut record = HwConfigRecord::new();

    let report = chain.deconfigure(&mut record).await;

    assert!(report.is_success());
    assert!(report.deconfigured.is_empty());
    assert!(bed.host1.commands().is_empty());
    assert_defaults!(bed.eth2);
}
