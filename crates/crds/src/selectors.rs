//! Label selectors and IPAM selections
//!
//! Structural-schema friendly label selectors, the matching logic used when
//! filtering in memory, and rendering into the Kubernetes query syntax used
//! when listing from the API server.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector (mirrors `metav1.LabelSelector`)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorSpec {
    /// Exact label matches
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Set-based requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// A single set-based requirement
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// Label key the requirement applies to
    pub key: String,

    /// Relationship between the key and the values
    pub operator: SelectorOperator,

    /// Values for `In` and `NotIn`; must be empty for `Exists` and `DoesNotExist`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Set-based selector operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl LabelSelectorSpec {
    /// Selector made only of exact matches
    pub fn from_labels(labels: BTreeMap<String, String>) -> Self {
        Self {
            match_labels: labels,
            match_expressions: Vec::new(),
        }
    }

    /// True when the selector has no requirements (matches everything)
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    /// Returns true if `labels` satisfies every requirement of the selector
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let exact = self
            .match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v));

        exact
            && self.match_expressions.iter().all(|req| {
                let value = labels.get(&req.key);
                match req.operator {
                    SelectorOperator::In => value.is_some_and(|v| req.values.contains(v)),
                    SelectorOperator::NotIn => value.is_none_or(|v| !req.values.contains(v)),
                    SelectorOperator::Exists => value.is_some(),
                    SelectorOperator::DoesNotExist => value.is_none(),
                }
            })
    }

    /// Render into the `labelSelector` query string understood by the API server
    pub fn to_query(&self) -> String {
        let mut parts: Vec<String> = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        for req in &self.match_expressions {
            let part = match req.operator {
                SelectorOperator::In => format!("{} in ({})", req.key, req.values.join(",")),
                SelectorOperator::NotIn => format!("{} notin ({})", req.key, req.values.join(",")),
                SelectorOperator::Exists => req.key.clone(),
                SelectorOperator::DoesNotExist => format!("!{}", req.key),
            };
            parts.push(part);
        }

        parts.join(",")
    }

    /// Merge another set of exact matches into this selector (existing keys are overwritten)
    pub fn with_labels(mut self, labels: &BTreeMap<String, String>) -> Self {
        for (k, v) in labels {
            self.match_labels.insert(k.clone(), v.clone());
        }
        self
    }
}

/// Selects address-pool resources by labels, optionally with one label whose value
/// is read from a field of the switch being reconciled
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpamSelection {
    /// Static label matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelectorSpec>,

    /// Label whose value comes from a field of the switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_selector: Option<FieldSelector>,
}

/// Label key paired with a field path on the switch object
///
/// Supported paths: `metadata.name`, `metadata.namespace`, `metadata.uid`,
/// `metadata.labels['<key>']`, `metadata.annotations['<key>']`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelector {
    /// Label key to populate
    pub label_key: String,

    /// Field path read from the switch
    pub field_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelectorSpec::default();
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("a", "b")])));
    }

    #[test]
    fn test_match_labels_and_expressions() {
        let selector = LabelSelectorSpec {
            match_labels: labels(&[("role", "spine")]),
            match_expressions: vec![
                LabelSelectorRequirement {
                    key: "zone".to_string(),
                    operator: SelectorOperator::In,
                    values: vec!["a".to_string(), "b".to_string()],
                },
                LabelSelectorRequirement {
                    key: "cordoned".to_string(),
                    operator: SelectorOperator::DoesNotExist,
                    values: vec![],
                },
            ],
        };

        assert!(selector.matches(&labels(&[("role", "spine"), ("zone", "b")])));
        assert!(!selector.matches(&labels(&[("role", "spine"), ("zone", "c")])));
        assert!(!selector.matches(&labels(&[("role", "spine"), ("zone", "a"), ("cordoned", "")])));
        assert!(!selector.matches(&labels(&[("role", "leaf"), ("zone", "a")])));
    }

    #[test]
    fn test_to_query() {
        let selector = LabelSelectorSpec {
            match_labels: labels(&[("a", "1"), ("b", "2")]),
            match_expressions: vec![
                LabelSelectorRequirement {
                    key: "c".to_string(),
                    operator: SelectorOperator::NotIn,
                    values: vec!["x".to_string(), "y".to_string()],
                },
                LabelSelectorRequirement {
                    key: "d".to_string(),
                    operator: SelectorOperator::DoesNotExist,
                    values: vec![],
                },
            ],
        };
        assert_eq!(selector.to_query(), "a=1,b=2,c notin (x,y),!d");
    }
}
