//! List queries

use crds::LabelSelectorSpec;
use kube::api::ListParams;
use std::collections::BTreeMap;

/// Label-selector filtered list request with an optional page size
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Objects must match this selector (empty matches everything)
    pub selector: LabelSelectorSpec,

    /// Page size; all pages are still fetched
    pub limit: Option<u32>,
}

impl ListQuery {
    /// Query matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Query for objects matching the selector
    pub fn selector(selector: LabelSelectorSpec) -> Self {
        Self {
            selector,
            limit: None,
        }
    }

    /// Query for objects carrying all of the given labels
    pub fn labels(labels: BTreeMap<String, String>) -> Self {
        Self::selector(LabelSelectorSpec::from_labels(labels))
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if an object with these labels satisfies the query
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.selector.matches(labels)
    }

    /// Kubernetes list parameters for the first page
    pub fn list_params(&self) -> ListParams {
        let mut lp = ListParams::default();
        if !self.selector.is_empty() {
            lp = lp.labels(&self.selector.to_query());
        }
        if let Some(limit) = self.limit {
            lp = lp.limit(limit);
        }
        lp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_from_query() {
        let mut labels = BTreeMap::new();
        labels.insert("dcops.microscaler.io/onboarded".to_string(), "true".to_string());
        let lp = ListQuery::labels(labels).with_limit(500).list_params();

        assert_eq!(lp.label_selector.as_deref(), Some("dcops.microscaler.io/onboarded=true"));
        assert_eq!(lp.limit, Some(500));
    }

    #[test]
    fn test_empty_query_has_no_selector() {
        let lp = ListQuery::all().list_params();
        assert!(lp.label_selector.is_none());
        assert!(lp.limit.is_none());
    }
}
