//! Partial configure and best-effort restore.

use std::cell::Cell;

use hwconf::chain::HwConfigChain;
use hwconf::concerns::{
    DevQueuesConfig, DevQueuesParams, InterruptsConfig, InterruptsParams, MtuConfig, MtuParams,
    PauseFramesConfig, PauseFramesParams,
};
use hwconf::record::HwConfigRecord;
use hwconf::targets::TargetDevices;
use hwconf::{ConcernKey, Error};

use crate::common::Testbed;

fn mtu_and_pause_frames(bed: &Testbed) -> HwConfigChain {
    let pair = bed.pair();
    HwConfigChain::new()
        .with(MtuConfig::new(pair.mtu_devices(), MtuParams { mtu: Some(9000) }))
        .with(PauseFramesConfig::new(
            pair.pause_frames_devices(),
            PauseFramesParams {
                rx_pause_frames: Some(false),
                tx_pause_frames: Some(false),
            },
        ))
}

#[tokio::test]
async fn test_partial_configure_is_undone() {
    let bed = Testbed::new();
    bed.eth2.fail_writes(true);
    let chain = mtu_and_pause_frames(&bed);
    let mut record = HwConfigRecord::new();

    let body_ran = Cell::new(false);
    let ran = &body_ran;
    let outcome = chain
        .run(&mut record, || async move {
            ran.set(true);
            Ok(())
        })
        .await;

    assert!(!body_ran.get());
    assert!(outcome.result.unwrap_err().is_remote_failure());
    assert!(outcome.deconfigure.is_success());
    assert_eq!(outcome.deconfigure.deconfigured, vec![ConcernKey::MTU]);
    assert!(record.is_empty());
    assert_attr!(bed.eth1, "mtu", 1500);
    assert_attr!(bed.eth1, "rx_pause_frames", true);
}

#[tokio::test]
async fn test_restore_continues_past_failures() {
    let bed = Testbed::new();
    let chain = mtu_and_pause_frames(&bed);
    let mut record = HwConfigRecord::new();

    chain.configure(&mut record).await.unwrap();
    bed.eth1.fail_writes(true);
    let report = chain.deconfigure(&mut record).await;

    assert!(!report.is_success());
    let failed: Vec<_> = report.errors.iter().map(|e| e.concern).collect();
    assert_eq!(failed, vec![ConcernKey::PAUSE_FRAMES, ConcernKey::MTU]);
    assert!(report.errors[0].to_string().starts_with("pause_frames: "));
    assert!(record.is_empty());
    // The healthy endpoint is still restored.
    assert_defaults!(bed.eth2);
    assert_attr!(bed.eth1, "mtu", 9000);
}

#[tokio::test]
async fn test_failed_command_restarts_irqbalance() {
    let bed = Testbed::new();
    bed.host2.fail("ethtool -L", 1, "Operation not supported");
    let pair = bed.pair();
    let chain = HwConfigChain::new()
        .with(InterruptsConfig::new(
            pair.dev_interrupt_devices(),
            InterruptsParams {
                dev_intr_cpu_lists: Some(vec![vec![0], vec![1]]),
                dev_intr_cpu_policies: None,
            },
        ))
        .with(DevQueuesConfig::new(
            pair.dev_queues_devices(),
            DevQueuesParams {
                dev_queues: Some(vec![
                    [("combined".to_string(), 4)].into_iter().collect(),
                    [("combined".to_string(), 4)].into_iter().collect(),
                ]),
            },
        ));
    let mut record = HwConfigRecord::new();

    let outcome = chain.run(&mut record, || async { Ok(()) }).await;

    let err = outcome.result.unwrap_err();
    assert_eq!(err.exit_code(), Some(1));
    assert!(err.to_string().contains("Operation not supported"));
    assert!(outcome.deconfigure.is_success());
    assert_eq!(
        bed.host1.commands_matching("ethtool -L"),
        vec!["ethtool -L eth0 combined 4", "ethtool -L eth0 combined 16"]
    );
    for host in [&bed.host1, &bed.host2] {
        assert_eq!(
            host.commands_matching("service irqbalance"),
            vec!["service irqbalance stop", "service irqbalance start"]
        );
    }
}

#[tokio::test]
async fn test_body_failure_still_restores() {
    let bed = Testbed::new();
    let chain = mtu_and_pause_frames(&bed);
    let mut record = HwConfigRecord::new();

    let outcome = chain
        .run(&mut record, || async {
            Err::<(), _>(Error::invalid_parameter("measurement", "aborted"))
        })
        .await;

    assert!(outcome.deconfigure.is_success());
    assert!(outcome.into_result().unwrap_err().is_invalid_input());
    assert_defaults!(bed.eth1);
    assert_defaults!(bed.eth2);
}

#[tokio::test]
async fn test_configure_twice_is_rejected() {
    let bed = Testbed::new();
    let chain = mtu_and_pause_frames(&bed);
    let mut record = HwConfigRecord::new();

    chain.configure(&mut record).await.unwrap();
    let err = chain.configure(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::AlreadyConfigured { .. }));
    assert_eq!(err.to_string(), "mtu is already configured");
    assert_attr!(bed.eth1, "mtu", 9000);

    chain.deconfigure(&mut record).await.into_result().unwrap();
    assert_defaults!(bed.eth1);
}
