//! Ingest-time operation filters
//!
//! Filters restrict which operations of a document become tools. They apply
//! before meta-tools are registered; meta-tools are never filtered out.

use regex::Regex;
use std::collections::HashSet;

use toolgate_core::Operation;

/// Which operations of a document are exposed as tools.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    /// Keep only operations carrying this tag.
    pub tag: Option<String>,
    /// Keep only operations whose description/summary matches.
    pub include_description: Option<Regex>,
    /// Drop operations whose description/summary matches.
    pub exclude_description: Option<Regex>,
    /// Explicit allow-list of operation ids.
    pub allow_operations: Option<HashSet<String>>,
}

impl OperationFilter {
    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.include_description.is_none()
            && self.exclude_description.is_none()
            && self.allow_operations.is_none()
    }

    /// Whether an operation survives this filter.
    pub fn matches(&self, operation: &Operation) -> bool {
        if let Some(allowed) = &self.allow_operations {
            if !allowed.contains(&operation.operation_id) {
                return false;
            }
        }

        if let Some(tag) = &self.tag {
            if !operation.tags.iter().any(|t| t == tag) {
                return false;
            }
        }

        let text = description_text(operation);

        if let Some(include) = &self.include_description {
            if !include.is_match(&text) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude_description {
            if exclude.is_match(&text) {
                return false;
            }
        }

        true
    }
}

fn description_text(operation: &Operation) -> String {
    let mut text = String::new();
    if let Some(summary) = &operation.summary {
        text.push_str(summary);
        text.push(' ');
    }
    if let Some(description) = &operation.description {
        text.push_str(description);
    }
    text
}
