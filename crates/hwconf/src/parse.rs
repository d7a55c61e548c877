//! Parsers for the text output of `ethtool`, `lscpu`, `tc`, `ip` and
//! `/proc/interrupts`.
//!
//! Most of these tools print `Key:<whitespace>value` lines, so everything is
//! built on one winnow combinator, [`key_value`], applied line by line.

use std::collections::BTreeMap;

use winnow::ascii::{space0, till_line_ending};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_till;

use crate::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Parse a `Key:   value` line into its trimmed parts.
///
/// The value may be empty (section headers such as `Pre-set maximums:`).
pub fn key_value<'s>(input: &mut &'s str) -> PResult<(&'s str, &'s str)> {
    let key = take_till(1.., ':').parse_next(input)?;
    ':'.parse_next(input)?;
    space0.parse_next(input)?;
    let value = till_line_ending.parse_next(input)?;
    Ok((key.trim(), value.trim()))
}

/// Split a single line with [`key_value`].
pub fn split_key_value(line: &str) -> Option<(&str, &str)> {
    key_value.parse(line).ok()
}

/// Collect every `key: value` line with a non-empty value, keys lowercased.
pub fn parse_key_values(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(split_key_value)
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.to_lowercase(), value.to_string()))
        .collect()
}

/// Parse an `on`/`off` flag as printed by ethtool.
pub fn parse_on_off(value: &str) -> Option<bool> {
    match value.split_whitespace().next()? {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// ethtool -l
// ============================================================================

/// Channel counts as reported by `ethtool -l`.
///
/// Queue types are lowercased (`rx`, `tx`, `other`, `combined`); `n/a` is
/// stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelParameters {
    /// Pre-set maximums.
    pub preset: BTreeMap<String, Option<u32>>,
    /// Current hardware settings.
    pub current: BTreeMap<String, Option<u32>>,
}

impl ChannelParameters {
    /// Parse `ethtool -l <dev>` output.
    ///
    /// ```text
    /// Channel parameters for ens7f0:
    /// Pre-set maximums:
    /// RX:             n/a
    /// TX:             n/a
    /// Other:          1
    /// Combined:       32
    /// Current hardware settings:
    /// RX:             n/a
    /// TX:             n/a
    /// Other:          1
    /// Combined:       16
    /// ```
    pub fn parse(output: &str) -> Result<Self> {
        let mut result = Self::default();
        let mut section: Option<&mut BTreeMap<String, Option<u32>>> = None;

        for line in output.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match line.trim() {
                "Pre-set maximums:" => section = Some(&mut result.preset),
                "Current hardware settings:" => section = Some(&mut result.current),
                _ => {
                    let (name, setting) = split_key_value(line)
                        .ok_or_else(|| Error::Parse(format!("bad channel line '{}'", line)))?;
                    let setting = match setting {
                        "n/a" => None,
                        v => Some(v.parse::<u32>().map_err(|_| {
                            Error::Parse(format!("bad channel count '{}' for {}", v, name))
                        })?),
                    };
                    let map = section.as_deref_mut().ok_or_else(|| {
                        Error::Parse(format!("channel line '{}' outside of a section", line))
                    })?;
                    map.insert(name.to_lowercase(), setting);
                }
            }
        }

        Ok(result)
    }
}

// ============================================================================
// ethtool -c
// ============================================================================

/// Interrupt coalescing parameters as reported by `ethtool -c`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoalesceParameters {
    /// Adaptive RX coalescing.
    pub adaptive_rx: Option<bool>,
    /// Adaptive TX coalescing.
    pub adaptive_tx: Option<bool>,
    /// Remaining settings keyed in `ethtool -C` vocabulary (`rx-usecs`).
    pub settings: BTreeMap<String, Option<String>>,
}

impl CoalesceParameters {
    /// Parse `ethtool -c <dev>` output.
    pub fn parse(output: &str) -> Self {
        let mut result = Self::default();

        for line in output.lines().skip(1) {
            let Some((key, value)) = split_key_value(line) else {
                continue;
            };
            if key == "Adaptive RX" {
                // "Adaptive RX: on  TX: off"
                let mut parts = value.split_whitespace();
                result.adaptive_rx = parts.next().and_then(parse_on_off);
                if parts.next() == Some("TX:") {
                    result.adaptive_tx = parts.next().and_then(parse_on_off);
                }
            } else if !value.is_empty() {
                let value = (value != "n/a").then(|| value.to_string());
                result.settings.insert(key.to_string(), value);
            }
        }

        result
    }
}

// ============================================================================
// ethtool -k / -x / -n
// ============================================================================

/// Long `ethtool -k` feature name for a short `ethtool -K` alias.
pub fn feature_long_name(short: &str) -> &str {
    match short {
        "rx" => "rx-checksumming",
        "tx" => "tx-checksumming",
        "sg" => "scatter-gather",
        "tso" => "tcp-segmentation-offload",
        "ufo" => "udp-fragmentation-offload",
        "gso" => "generic-segmentation-offload",
        "gro" => "generic-receive-offload",
        "lro" => "large-receive-offload",
        "rxvlan" => "rx-vlan-offload",
        "txvlan" => "tx-vlan-offload",
        "ntuple" => "ntuple-filters",
        "rxhash" => "receive-hashing",
        other => other,
    }
}

/// Parse `ethtool -k <dev>` output into feature name → enabled.
///
/// `[fixed]` and `[requested on]` suffixes are ignored.
pub fn parse_features(output: &str) -> BTreeMap<String, bool> {
    output
        .lines()
        .skip(1)
        .filter_map(split_key_value)
        .filter_map(|(key, value)| parse_on_off(value).map(|on| (key.to_string(), on)))
        .collect()
}

/// Parse the active hash function from `ethtool -x <dev>` output.
///
/// ```text
/// RSS hash function:
///     toeplitz: on
///     xor: off
///     crc32: off
/// ```
pub fn parse_rx_hash_function(output: &str) -> Option<String> {
    output
        .lines()
        .skip_while(|line| line.trim() != "RSS hash function:")
        .skip(1)
        .take_while(|line| line.starts_with(char::is_whitespace))
        .filter_map(split_key_value)
        .find(|(_, value)| parse_on_off(value) == Some(true))
        .map(|(name, _)| name.to_string())
}

/// Parse `ethtool -n <dev> rx-flow-hash <type>` output into the compact
/// `ethtool -N` field string (`sdfn`).
pub fn parse_rx_flow_hash(output: &str) -> String {
    const FIELDS: [(&str, char); 7] = [
        ("L2DA", 'm'),
        ("VLAN tag", 'v'),
        ("L3 proto", 't'),
        ("IP SA", 's'),
        ("IP DA", 'd'),
        ("L4 bytes 0 & 1 [TCP/UDP src port]", 'f'),
        ("L4 bytes 2 & 3 [TCP/UDP dst port]", 'n'),
    ];

    let lines: Vec<&str> = output.lines().skip(1).map(str::trim).collect();
    FIELDS
        .iter()
        .filter(|(label, _)| lines.contains(label))
        .map(|(_, flag)| *flag)
        .collect()
}

// ============================================================================
// lscpu, /proc/interrupts, tc, ip
// ============================================================================

/// Parse the number of CPUs from `lscpu` output.
pub fn parse_cpu_count(output: &str) -> Result<usize> {
    output
        .lines()
        .filter_map(split_key_value)
        .find(|(key, _)| *key == "CPU(s)")
        .and_then(|(_, value)| value.parse().ok())
        .ok_or_else(|| Error::Parse("no CPU(s) line in lscpu output".into()))
}

/// Find the interrupt numbers of a device in `/proc/interrupts`.
///
/// A line matches when it mentions the device name or, if given, its bus
/// info, as a whole word: `eth1` matches `eth1-TxRx-0` but not
/// `eth10-TxRx-0`. Rows without a numeric IRQ (`NMI`, `LOC`) are skipped.
pub fn parse_device_interrupts(table: &str, name: &str, bus_info: Option<&str>) -> Vec<u32> {
    table
        .lines()
        .filter(|line| {
            mentions(line, name, |c| c.is_whitespace())
                || bus_info
                    .is_some_and(|bus| mentions(line, bus, |c| c.is_whitespace() || c == ':'))
        })
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(irq, _)| irq.trim().parse().ok())
        .collect()
}

/// Whether `word` occurs in `line` preceded by start of line or a `lead`
/// character and followed by end of line, whitespace, `-` or `@`.
fn mentions(line: &str, word: &str, lead: impl Fn(char) -> bool) -> bool {
    if word.is_empty() {
        return false;
    }
    line.match_indices(word).any(|(start, _)| {
        let before = line[..start].chars().next_back();
        let after = line[start + word.len()..].chars().next();
        before.is_none_or(&lead)
            && after.is_none_or(|c| c.is_whitespace() || c == '-' || c == '@')
    })
}

/// Parse the root qdisc kind from `tc qdisc show dev <dev> root`.
pub fn parse_root_qdisc_kind(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "qdisc" => tokens.next().map(str::to_string),
        _ => None,
    }
}

/// Parse the administrative UP flag from `ip -o link show dev <dev>`.
pub fn parse_link_is_up(output: &str) -> Result<bool> {
    let start = output
        .find('<')
        .ok_or_else(|| Error::Parse(format!("no link flags in '{}'", output.trim())))?;
    let end = output[start..]
        .find('>')
        .ok_or_else(|| Error::Parse(format!("unterminated link flags in '{}'", output.trim())))?;
    Ok(output[start + 1..start + end].split(',').any(|flag| flag == "UP"))
}
