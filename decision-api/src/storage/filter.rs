//! Decision filters parsed from request query parameters.

use decision_types::{SCOPE_IP, SCOPE_RANGE};
use std::collections::HashMap;

/// Filter applied to store queries.
///
/// Empty lists and `None` fields do not constrain the query. Scope matching
/// is case-insensitive; every other field matches exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionFilter {
    /// Allowed scopes.
    pub scopes: Vec<String>,
    /// Exact value.
    pub value: Option<String>,
    /// Exact action type.
    pub kind: Option<String>,
    /// Allowed origins.
    pub origins: Vec<String>,
    /// Scenario must contain at least one of these.
    pub scenarios_containing: Vec<String>,
    /// Scenario must contain none of these.
    pub scenarios_not_containing: Vec<String>,
}

impl DecisionFilter {
    /// Build a filter from query parameters.
    ///
    /// `scope` and `scopes` are merged; list parameters are comma separated.
    /// Unknown parameters are ignored.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let mut scopes = Vec::new();
        if let Some(scope) = params.get("scope") {
            scopes.extend(split_list(scope));
        }
        if let Some(list) = params.get("scopes") {
            scopes.extend(split_list(list));
        }

        Self {
            scopes,
            value: non_empty(params.get("value")),
            kind: non_empty(params.get("type")),
            origins: params.get("origins").map(|v| split_list(v)).unwrap_or_default(),
            scenarios_containing: params
                .get("scenarios_containing")
                .map(|v| split_list(v))
                .unwrap_or_default(),
            scenarios_not_containing: params
                .get("scenarios_not_containing")
                .map(|v| split_list(v))
                .unwrap_or_default(),
        }
    }

    /// Restrict to addresses and ranges when no scope was requested.
    pub fn with_default_scopes(mut self) -> Self {
        if self.scopes.is_empty() {
            self.scopes = vec![SCOPE_IP.to_string(), SCOPE_RANGE.to_string()];
        }
        self
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
