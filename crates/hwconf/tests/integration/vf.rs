//! SR-IOV topology: VFs carry traffic, pause frames go to the PFs.

use hwconf::concerns::common_hw_config;
use hwconf::params::HwConfigParams;
use hwconf::record::HwConfigRecord;
use hwconf::Result;

use crate::common::VfTestbed;

const PARAMS: &str = r#"{
    "mtu": 9000,
    "rx_pause_frames": false,
    "tx_pause_frames": false
}"#;

#[tokio::test]
async fn test_pause_frames_on_physical_functions() -> Result<()> {
    let bed = VfTestbed::new();
    let params = HwConfigParams::from_json(PARAMS)?;
    let chain = common_hw_config(&params, &bed.targets())?;
    let mut record = HwConfigRecord::new();

    chain.configure(&mut record).await?;

    assert_attr!(bed.vf1, "mtu", 9000);
    assert_attr!(bed.vf2, "mtu", 9000);
    assert_attr!(bed.pf1, "mtu", 1500);
    assert_attr!(bed.pf1, "rx_pause_frames", false);
    assert_attr!(bed.pf2, "tx_pause_frames", false);
    assert_attr!(bed.vf1, "rx_pause_frames", true);

    let description = chain.describe(&record);
    assert!(description.contains(&"host1.eth0v0 mtu configured to 9000".to_string()));
    assert!(description.contains(&"host2.eth0 rx_pause_frames configured to false".to_string()));

    chain.deconfigure(&mut record).await.into_result()?;

    for dev in [&bed.vf1, &bed.vf2, &bed.pf1, &bed.pf2] {
        assert_defaults!(dev);
    }
    Ok(())
}

#[tokio::test]
async fn test_plan_names_physical_functions() -> Result<()> {
    let bed = VfTestbed::new();
    let params = HwConfigParams::from_json(PARAMS)?;
    let chain = common_hw_config(&params, &bed.targets())?;

    let plan = chain.plan();

    assert!(plan.contains(&"host1.eth0v0 mtu -> 9000".to_string()));
    assert!(plan.contains(&"host1.eth0 rx_pause_frames -> false".to_string()));
    assert!(!plan.iter().any(|line| line.starts_with("host1.eth0 mtu")));
    assert!(bed.host1.commands().is_empty());
    Ok(())
}
