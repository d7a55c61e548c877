//! Standard chain integration tests.

use hwconf::chain::HwConfigChain;
use hwconf::concerns::{
    CoalescingConfig, CoalescingParams, MtuConfig, MtuParams, PauseFramesConfig,
    PauseFramesParams, common_hw_config,
};
use hwconf::params::HwConfigParams;
use hwconf::record::HwConfigRecord;
use hwconf::targets::TargetDevices;
use hwconf::{ConcernKey, Result};

use crate::common::Testbed;

#[tokio::test]
async fn test_mtu_coalescing_pause_frames() -> Result<()> {
    let bed = Testbed::new();
    let pair = bed.pair();
    let chain = HwConfigChain::new()
        .with(MtuConfig::new(pair.mtu_devices(), MtuParams { mtu: Some(9000) }))
        .with(CoalescingConfig::new(
            pair.coalescing_devices(),
            CoalescingParams {
                adaptive_rx_coalescing: Some(false),
                ..Default::default()
            },
        ))
        .with(PauseFramesConfig::new(
            pair.pause_frames_devices(),
            PauseFramesParams {
                rx_pause_frames: Some(false),
                tx_pause_frames: Some(false),
            },
        ));
    let mut record = HwConfigRecord::new();

    chain.configure(&mut record).await?;

    assert_attr!(bed.eth1, "mtu", 9000);
    assert_attr!(bed.eth2, "mtu", 9000);
    assert_attr!(bed.eth1, "adaptive_rx_coalescing", false);
    assert_attr!(bed.eth2, "tx_pause_frames", false);
    assert_eq!(
        chain.describe(&record),
        vec![
            "host1.eth0 mtu configured to 9000",
            "host2.eth0 mtu configured to 9000",
            "host1.eth0 adaptive_rx_coalescing configured to false",
            "host2.eth0 adaptive_rx_coalescing configured to false",
            "host1.eth0 rx_pause_frames configured to false",
            "host2.eth0 rx_pause_frames configured to false",
            "host1.eth0 tx_pause_frames configured to false",
            "host2.eth0 tx_pause_frames configured to false",
        ]
    );

    let report = chain.deconfigure(&mut record).await;
    assert!(report.is_success());
    assert_eq!(
        report.deconfigured,
        vec![ConcernKey::PAUSE_FRAMES, ConcernKey::COALESCING, ConcernKey::MTU]
    );
    assert!(record.is_empty());
    assert_defaults!(bed.eth1);
    assert_defaults!(bed.eth2);

    Ok(())
}

#[tokio::test]
async fn test_mtu_coalescing_with_pause_frames_unset() -> Result<()> {
    let bed = Testbed::new();
    let pair = bed.pair();
    let chain = HwConfigChain::new()
        .with(MtuConfig::new(pair.mtu_devices(), MtuParams { mtu: Some(9000) }))
        .with(CoalescingConfig::new(
            pair.coalescing_devices(),
            CoalescingParams {
                adaptive_rx_coalescing: Some(false),
                ..Default::default()
            },
        ))
        .with(PauseFramesConfig::new(
            pair.pause_frames_devices(),
            PauseFramesParams::default(),
        ));
    let mut record = HwConfigRecord::new();

    chain.configure(&mut record).await?;

    assert!(!record.contains(ConcernKey::PAUSE_FRAMES));
    assert_attr!(bed.eth1, "rx_pause_frames", true);
    assert_attr!(bed.eth2, "tx_pause_frames", true);
    assert_eq!(
        chain.describe(&record),
        vec![
            "host1.eth0 mtu configured to 9000",
            "host2.eth0 mtu configured to 9000",
            "host1.eth0 adaptive_rx_coalescing configured to false",
            "host2.eth0 adaptive_rx_coalescing configured to false",
            "Pause frames configuration skipped.",
        ]
    );

    let report = chain.deconfigure(&mut record).await;
    assert!(report.is_success());
    assert_eq!(report.deconfigured, vec![ConcernKey::COALESCING, ConcernKey::MTU]);
    assert!(record.is_empty());
    assert_defaults!(bed.eth1);
    assert_defaults!(bed.eth2);

    Ok(())
}

#[tokio::test]
async fn test_every_concern_round_trip() -> Result<()> {
    let bed = Testbed::new();
    let chain = common_hw_config(&HwConfigParams::example(), &bed.pair())?;
    let mut record = HwConfigRecord::new();

    chain.configure(&mut record).await?;
    assert_eq!(record.len(), 9);
    assert_attr!(bed.eth1, "offload_gro", false);
    assert_attr!(bed.eth1, "coalescing_rx_usecs", 64);
    assert_attr!(bed.eth2, "rx_hash_function", "toeplitz");
    assert_attr!(bed.eth2, "nfc_rx_flow_hash_udp4", "sdfn");
    assert_eq!(
        bed.host1.commands_matching("ethtool -L"),
        vec!["ethtool -L eth0 combined 4"]
    );
    assert_eq!(
        bed.host2.commands_matching("tc qdisc replace"),
        vec!["tc qdisc replace dev eth0 root mq"]
    );

    let description = chain.describe(&record);
    assert!(description.iter().all(|line| !line.contains("skipped")));
    assert!(description.contains(&"host1 irqbalance stopped".to_string()));
    assert!(description.contains(&"host2.eth0 irqs bound to cpu [2, 4] with policy:all".to_string()));

    bed.clear_commands();
    chain.deconfigure(&mut record).await.into_result()?;

    assert!(record.is_empty());
    assert_defaults!(bed.eth1);
    assert_defaults!(bed.eth2);
    for host in [&bed.host1, &bed.host2] {
        assert_eq!(
            host.commands(),
            vec![
                "ethtool -L eth0 combined 16",
                "tc qdisc del dev eth0 root",
                "service irqbalance start",
            ]
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_run_wraps_body() -> Result<()> {
    let bed = Testbed::new();
    let pair = bed.pair();
    let chain =
        HwConfigChain::new().with(MtuConfig::new(pair.mtu_devices(), MtuParams { mtu: Some(4000) }));
    let mut record = HwConfigRecord::new();

    let eth1 = bed.eth1.clone();
    let outcome = chain
        .run(&mut record, || async move {
            assert_attr!(eth1, "mtu", 4000);
            Ok(42)
        })
        .await;

    assert_eq!(outcome.into_result()?, 42);
    assert_attr!(bed.eth1, "mtu", 1500);
    Ok(())
}
