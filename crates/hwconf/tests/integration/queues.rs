//! Channel count and parallel-stream qdisc integration tests.

use std::collections::BTreeMap;

use hwconf::chain::HwConfig;
use hwconf::concerns::{DevQueuesConfig, DevQueuesParams, ParallelQdiscConfig, ParallelQdiscParams};
use hwconf::record::HwConfigRecord;
use hwconf::targets::TargetDevices;
use hwconf::{ConcernKey, Result};

use crate::common::Testbed;

fn queues(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries
        .iter()
        .map(|(queue_type, count)| (queue_type.to_string(), *count))
        .collect()
}

#[tokio::test]
async fn test_dev_queues_round_trip() -> Result<()> {
    let bed = Testbed::new();
    let concern = DevQueuesConfig::new(
        bed.pair().dev_queues_devices(),
        DevQueuesParams {
            dev_queues: Some(vec![queues(&[("combined", 8), ("other", 2)]), queues(&[])]),
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert_eq!(
        bed.host1.commands(),
        vec!["ethtool -l eth0", "ethtool -L eth0 combined 8 other 2"]
    );
    assert!(bed.host2.commands().is_empty());
    assert_eq!(
        concern.describe(&record),
        vec!["host1 device eth0 queues configured: combined 8 other 2"]
    );

    bed.clear_commands();
    concern.deconfigure(&mut record).await?;

    assert_eq!(bed.host1.commands(), vec!["ethtool -L eth0 combined 16 other 1"]);
    assert!(!record.contains(ConcernKey::DEV_QUEUES));
    Ok(())
}

#[tokio::test]
async fn test_dev_queues_restore_only_requested_types() -> Result<()> {
    let bed = Testbed::new();
    let concern = DevQueuesConfig::new(
        bed.pair().dev_queues_devices(),
        DevQueuesParams {
            dev_queues: Some(vec![queues(&[("combined", 4)]), queues(&[("combined", 2)])]),
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;
    bed.clear_commands();
    concern.deconfigure(&mut record).await?;

    assert_eq!(bed.host1.commands(), vec!["ethtool -L eth0 combined 16"]);
    assert_eq!(bed.host2.commands(), vec!["ethtool -L eth0 combined 16"]);
    Ok(())
}

#[tokio::test]
async fn test_parallel_streams_install_mq() -> Result<()> {
    let bed = Testbed::new();
    let concern = ParallelQdiscConfig::new(
        bed.pair().parallel_stream_qdisc_devices(),
        ParallelQdiscParams {
            perf_parallel_streams: Some(2),
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert_eq!(
        bed.host1.commands(),
        vec!["tc qdisc show dev eth0 root", "tc qdisc replace dev eth0 root mq"]
    );
    assert_eq!(
        concern.describe(&record),
        vec![
            "host1.eth0 root qdisc replaced with mq",
            "host2.eth0 root qdisc replaced with mq",
        ]
    );

    bed.clear_commands();
    concern.deconfigure(&mut record).await?;
    assert_eq!(bed.host2.commands(), vec!["tc qdisc del dev eth0 root"]);
    assert!(record.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_single_stream_keeps_qdisc() -> Result<()> {
    let bed = Testbed::new();
    let concern = ParallelQdiscConfig::new(
        bed.pair().parallel_stream_qdisc_devices(),
        ParallelQdiscParams {
            perf_parallel_streams: Some(1),
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;

    assert!(bed.host1.commands().is_empty());
    assert!(record.is_empty());
    assert_eq!(
        concern.describe(&record),
        vec!["Parallel stream qdisc configuration skipped."]
    );
    Ok(())
}

#[tokio::test]
async fn test_existing_mq_is_left_in_place() -> Result<()> {
    let bed = Testbed::new();
    bed.host1.respond("tc qdisc show", "qdisc mq 0: root\n");
    let concern = ParallelQdiscConfig::new(
        bed.pair().parallel_stream_qdisc_devices(),
        ParallelQdiscParams {
            perf_parallel_streams: Some(8),
        },
    );
    let mut record = HwConfigRecord::new();

    concern.configure(&mut record).await?;
    bed.clear_commands();
    concern.deconfigure(&mut record).await?;

    assert!(bed.host1.commands().is_empty());
    assert_eq!(bed.host2.commands(), vec!["tc qdisc del dev eth0 root"]);
    Ok(())
}
