//! Helper functions shared by the state pipeline, the address orchestrator and the watchers
//!
//! Condition bookkeeping, the change detector that decides whether a status write
//! (or a sibling re-enqueue) is needed, and resolution of IPAM selections against a
//! concrete switch.

use crate::addressing::normalize_chassis_id;
use crate::error::ControllerError;
use chrono::{DateTime, Utc};
use crds::labels;
use crds::{ConditionType, IpamSelection, Switch, SwitchCondition, SwitchStatus};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Key used for per-switch bookkeeping (backoff state, seen-cache)
pub fn resource_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Record a condition outcome
///
/// The transition timestamp only moves when `status` flips; reason and message
/// always reflect the latest evaluation (cleared on success).
pub fn set_condition(
    conditions: &mut Vec<SwitchCondition>,
    condition_type: ConditionType,
    status: bool,
    reason: Option<String>,
    message: Option<String>,
    now: DateTime<Utc>,
) {
    let (reason, message) = if status { (None, None) } else { (reason, message) };

    match conditions.iter_mut().find(|c| c.condition_type == condition_type) {
        Some(existing) => {
            if existing.status != status {
                existing.last_transition_timestamp = Some(now);
            }
            existing.status = status;
            existing.reason = reason;
            existing.message = message;
            existing.last_update_timestamp = Some(now);
        }
        None => conditions.push(SwitchCondition {
            condition_type,
            status,
            reason,
            message,
            last_update_timestamp: Some(now),
            last_transition_timestamp: Some(now),
        }),
    }
}

/// Conditions with the per-evaluation timestamp stripped, in a stable order
fn comparable_conditions(status: &SwitchStatus) -> Vec<SwitchCondition> {
    let mut conditions: Vec<SwitchCondition> = status
        .conditions
        .iter()
        .cloned()
        .map(|mut c| {
            c.last_update_timestamp = None;
            c
        })
        .collect();
    conditions.sort_by_key(|c| c.condition_type.as_str());
    conditions
}

fn status_changed(old: Option<&SwitchStatus>, new: Option<&SwitchStatus>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(old), Some(new)) => {
            let strip = |s: &SwitchStatus| SwitchStatus {
                conditions: Vec::new(),
                ..s.clone()
            };
            strip(old) != strip(new) || comparable_conditions(old) != comparable_conditions(new)
        }
        _ => true,
    }
}

/// Change detector: true when two versions of a switch differ in anything the
/// fabric cares about
///
/// Compares labels, annotations, finalizers, spec and status. Condition update
/// timestamps are ignored so a steady-state pass is not a change.
pub fn switch_changed(old: &Switch, new: &Switch) -> bool {
    old.metadata.labels != new.metadata.labels
        || old.metadata.annotations != new.metadata.annotations
        || old.metadata.finalizers != new.metadata.finalizers
        || old.spec != new.spec
        || status_changed(old.status.as_ref(), new.status.as_ref())
}

/// Key inside `metadata.labels['key']` style paths
fn bracket_key<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let inner = path.strip_prefix(prefix)?.strip_suffix(']')?;
    Some(inner.trim_matches(|c| c == '\'' || c == '"'))
}

/// Read a field of the switch by path
///
/// Returns `Ok(None)` when the path is valid but the field is absent.
pub fn resolve_field_path(switch: &Switch, path: &str) -> Result<Option<String>, ControllerError> {
    let meta = &switch.metadata;
    let value = match path {
        "metadata.name" => meta.name.clone(),
        "metadata.namespace" => meta.namespace.clone(),
        "metadata.uid" => meta.uid.clone(),
        _ => {
            if let Some(key) = bracket_key(path, "metadata.labels[") {
                switch.labels().get(key).cloned()
            } else if let Some(key) = bracket_key(path, "metadata.annotations[") {
                switch.annotations().get(key).cloned()
            } else {
                return Err(ControllerError::InvalidConfig(format!(
                    "unsupported field path '{}'",
                    path
                )));
            }
        }
    };
    Ok(value)
}

/// Labels an IPAM selection resolves to for a given switch
///
/// Static `matchLabels` plus, when a field selector is set, the label whose value
/// is read from the switch.
pub fn selection_labels(
    selection: &IpamSelection,
    switch: &Switch,
) -> Result<BTreeMap<String, String>, ControllerError> {
    let mut labels = selection
        .label_selector
        .as_ref()
        .map(|s| s.match_labels.clone())
        .unwrap_or_default();

    if let Some(field) = &selection.field_selector {
        let value = resolve_field_path(switch, &field.field_path)?.ok_or_else(|| {
            ControllerError::InvalidConfig(format!(
                "field '{}' is not set on switch {}",
                field.field_path,
                switch.name_any()
            ))
        })?;
        labels.insert(field.label_key.clone(), value);
    }

    Ok(labels)
}

/// Normalized chassis ID annotation of a switch
pub fn chassis_id(switch: &Switch) -> Option<String> {
    switch
        .annotations()
        .get(labels::CHASSIS_ID_ANNOTATION)
        .map(|id| normalize_chassis_id(id))
}

/// Names of the switches this switch is linked to, resolved or by LLDP chassis ID
pub fn linked_switches<'a>(switch: &Switch, all: impl IntoIterator<Item = &'a Switch>) -> Vec<String> {
    let own_name = switch.name_any();
    let own_chassis = chassis_id(switch);
    let peer_chassis: Vec<String> = switch
        .status
        .iter()
        .flat_map(|s| s.interfaces.values())
        .filter_map(|iface| iface.peer.as_ref()?.lldp.as_ref())
        .map(|lldp| normalize_chassis_id(&lldp.chassis_id))
        .collect();
    let peer_refs: Vec<&str> = switch
        .status
        .iter()
        .flat_map(|s| s.interfaces.values())
        .filter_map(|iface| iface.peer.as_ref()?.object_ref.as_ref())
        .map(|r| r.name.as_str())
        .collect();

    let mut names: Vec<String> = all
        .into_iter()
        .filter(|other| other.name_any() != own_name)
        .filter(|other| {
            let name = other.name_any();
            if peer_refs.contains(&name.as_str()) {
                return true;
            }
            if chassis_id(other).is_some_and(|c| peer_chassis.contains(&c)) {
                return true;
            }
            // The other side may know about us before we know about it
            other
                .status
                .iter()
                .flat_map(|s| s.interfaces.values())
                .filter_map(|iface| iface.peer.as_ref())
                .any(|peer| {
                    peer.object_ref.as_ref().is_some_and(|r| r.name == own_name)
                        || peer.lldp.as_ref().is_some_and(|lldp| {
                            own_chassis.as_deref() == Some(normalize_chassis_id(&lldp.chassis_id).as_str())
                        })
                })
        })
        .map(|other| other.name_any())
        .collect();
    names.sort();
    names.dedup();
    names
}
