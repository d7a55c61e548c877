//! Reversible get/set of named device attributes.
//!
//! The building block of most concerns: read the current value, remember
//! it, write the desired one; later write the remembered value back.

use crate::device::{AttrValue, DeviceRef};
use crate::error::Result;
use crate::record::{ConcernKey, HwConfigRecord};

/// One device attribute change.
#[derive(Debug, Clone)]
pub struct AttributeChange {
    /// The device that was changed.
    pub device: DeviceRef,
    /// Value read before the change.
    pub original: AttrValue,
    /// Value written.
    pub configured: AttrValue,
}

/// Attribute changes of one concern, grouped by attribute in recording order.
#[derive(Debug, Default)]
pub struct AttributeState {
    attributes: Vec<(String, Vec<AttributeChange>)>,
}

impl AttributeState {
    /// Check if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attribute names in recording order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    /// Changes recorded for an attribute.
    pub fn get(&self, attribute: &str) -> Option<&[AttributeChange]> {
        self.attributes
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, changes)| changes.as_slice())
    }

    /// Record a change.
    pub fn push(&mut self, attribute: &str, change: AttributeChange) {
        match self.attributes.iter_mut().find(|(name, _)| name == attribute) {
            Some((_, changes)) => changes.push(change),
            None => self.attributes.push((attribute.to_string(), vec![change])),
        }
    }

    /// Remove and return the changes of an attribute.
    pub fn take(&mut self, attribute: &str) -> Option<Vec<AttributeChange>> {
        let pos = self.attributes.iter().position(|(name, _)| name == attribute)?;
        Some(self.attributes.remove(pos).1)
    }
}

/// Pair every device with the same desired value.
pub fn shared_targets(
    devices: &[DeviceRef],
    value: Option<&AttrValue>,
) -> Vec<(DeviceRef, Option<AttrValue>)> {
    devices
        .iter()
        .map(|device| (device.clone(), value.cloned()))
        .collect()
}

/// Set `attribute` on every target, remembering the previous values.
///
/// Targets without a desired value are skipped. Each device is read before
/// it is written, and recorded right after the write so a failure on a later
/// device still leaves the earlier ones restorable.
pub async fn configure_attribute(
    record: &mut HwConfigRecord,
    key: ConcernKey,
    attribute: &str,
    targets: &[(DeviceRef, Option<AttrValue>)],
) -> Result<()> {
    for (device, desired) in targets {
        let Some(desired) = desired else {
            continue;
        };

        let original = device.get_attribute(attribute).await?;
        device.set_attribute(attribute, desired).await?;
        tracing::debug!(
            device = %device.id(),
            attribute,
            %original,
            configured = %desired,
            "attribute configured"
        );

        record.attributes_mut(key)?.push(
            attribute,
            AttributeChange {
                device: device.clone(),
                original,
                configured: desired.clone(),
            },
        );
    }
    Ok(())
}

/// Write back the original values of `attribute` and drop its record.
///
/// Devices are restored in reverse order. A failing device does not stop
/// the others: failures are logged and the first one is returned at the end.
/// The concern's entry is removed once its last attribute is restored.
pub async fn deconfigure_attribute(
    record: &mut HwConfigRecord,
    key: ConcernKey,
    attribute: &str,
) -> Result<()> {
    let Some(state) = record.attributes(key) else {
        return Ok(());
    };
    if state.get(attribute).is_none() {
        return Ok(());
    }

    let changes = record
        .attributes_mut(key)?
        .take(attribute)
        .unwrap_or_default();
    if record.attributes(key).is_some_and(AttributeState::is_empty) {
        record.take(key);
    }

    let mut first_error = None;
    for change in changes.iter().rev() {
        match change.device.set_attribute(attribute, &change.original).await {
            Ok(()) => tracing::debug!(
                device = %change.device.id(),
                attribute,
                restored = %change.original,
                "attribute restored"
            ),
            Err(e) => {
                tracing::warn!(
                    device = %change.device.id(),
                    attribute,
                    error = %e,
                    "failed to restore attribute"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Restore every attribute of a concern, last recorded first.
pub async fn deconfigure_attributes(record: &mut HwConfigRecord, key: ConcernKey) -> Result<()> {
    let names: Vec<String> = match record.attributes(key) {
        Some(state) => state.names().map(str::to_string).collect(),
        None => return Ok(()),
    };

    let mut first_error = None;
    for name in names.iter().rev() {
        if let Err(e) = deconfigure_attribute(record, key, name).await {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Describe the recorded changes of `attribute`.
///
/// One `"<host>.<device> <attribute> configured to <value>"` line per device.
pub fn describe_attribute(record: &HwConfigRecord, key: ConcernKey, attribute: &str) -> Vec<String> {
    record
        .attributes(key)
        .and_then(|state| state.get(attribute))
        .map(|changes| {
            changes
                .iter()
                .map(|change| {
                    format!(
                        "{}.{} {} configured to {}",
                        change.device.host().id(),
                        change.device.name(),
                        attribute,
                        change.configured
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Describe every recorded attribute of a concern, in recording order.
pub fn describe_attributes(record: &HwConfigRecord, key: ConcernKey) -> Vec<String> {
    record
        .attributes(key)
        .map(|state| {
            state
                .names()
                .flat_map(|name| describe_attribute(record, key, name))
                .collect()
        })
        .unwrap_or_default()
}
