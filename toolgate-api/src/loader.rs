//! Spec Loader
//!
//! Materializes active spec records into mounts: parse the content into a
//! [`Document`], translate every surviving operation into a tool, and stamp
//! the set with a fingerprint the reconciler uses as its change key. One
//! malformed record never prevents mounting the others.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use toolgate_core::{Document, SpecRecord, ToolDescriptor};
use toolgate_openapi::{build_tool, parse_document, OperationFilter};

// ============================================================================
// MOUNTS
// ============================================================================

/// One mounted document: record + parsed form + generated tools.
#[derive(Debug, Clone)]
pub struct Mount {
    pub record: SpecRecord,
    pub document: Arc<Document>,
    pub tools: Vec<ToolDescriptor>,
    /// URL prefix this mount serves, identical to `record.endpoint_path`.
    pub mount_path: String,
    /// Upper-cased first path segment, used for env credential lookup.
    pub endpoint_tag: String,
}

impl Mount {
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

/// Snapshot of everything currently mounted. Replaced atomically on reload;
/// in-flight requests keep the snapshot they started with.
#[derive(Debug, Clone, Default)]
pub struct ActiveMountSet {
    pub mounts: Vec<Arc<Mount>>,
    pub fingerprint: String,
}

impl ActiveMountSet {
    /// Longest-prefix match of a request path against the mount paths.
    pub fn match_path(&self, path: &str) -> Option<(&Arc<Mount>, String)> {
        self.mounts
            .iter()
            .filter_map(|mount| {
                let prefix = mount.mount_path.as_str();
                if path == prefix {
                    Some((mount, String::new()))
                } else {
                    path.strip_prefix(prefix)
                        .filter(|rest| rest.starts_with('/'))
                        .map(|rest| (mount, rest.to_string()))
                }
            })
            .max_by_key(|(mount, _)| mount.mount_path.len())
    }

    pub fn mounted_paths(&self) -> Vec<String> {
        self.mounts
            .iter()
            .map(|mount| mount.mount_path.clone())
            .collect()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Fingerprint of a record set: SHA-256 over (id, name, endpoint,
/// token-length) per record in listing order. Token values never enter the
/// hash; their length is enough to observe rotation.
pub fn fingerprint(records: &[SpecRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.id.to_le_bytes());
        hasher.update(record.name.as_bytes());
        hasher.update([0]);
        hasher.update(record.endpoint_path.as_bytes());
        hasher.update([0]);
        hasher.update((record.token_len() as u64).to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Build one mount from a record. Fails (with the parse error) only for this
/// record; callers skip and continue.
pub fn build_mount(
    record: SpecRecord,
    filter: &OperationFilter,
) -> Result<Mount, toolgate_core::SpecError> {
    let mut document = parse_document(&record.spec_content, Some(record.file_format))?;

    if !filter.is_empty() {
        let before = document.operations.len();
        document.operations.retain(|op| filter.matches(op));
        tracing::debug!(
            spec = %record.name,
            kept = document.operations.len(),
            dropped = before - document.operations.len(),
            "applied operation filter"
        );
    }

    let tools = document
        .operations
        .iter()
        .map(|op| build_tool(op, &document))
        .collect();

    let mount_path = record.endpoint_path.clone();
    let endpoint_tag = endpoint_tag(&mount_path);

    Ok(Mount {
        document: Arc::new(document),
        tools,
        mount_path,
        endpoint_tag,
        record,
    })
}

/// Build the full mount set, skipping malformed records.
pub fn build_mount_set(records: Vec<SpecRecord>, filter: &OperationFilter) -> ActiveMountSet {
    let fingerprint = fingerprint(&records);
    let mut mounts = Vec::with_capacity(records.len());

    for record in records {
        let name = record.name.clone();
        match build_mount(record, filter) {
            Ok(mount) => {
                tracing::info!(
                    spec = %name,
                    mount = %mount.mount_path,
                    tools = mount.tools.len(),
                    "mounted spec"
                );
                mounts.push(Arc::new(mount));
            }
            Err(err) => {
                tracing::warn!(spec = %name, error = %err, "skipping malformed spec record");
            }
        }
    }

    ActiveMountSet {
        mounts,
        fingerprint,
    }
}

/// Env lookup tag from a mount path: first segment, upper-cased, with every
/// non-alphanumeric character mapped to `_` (`/weather-api` -> `WEATHER_API`).
pub fn endpoint_tag(mount_path: &str) -> String {
    mount_path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use toolgate_core::{ApiToken, FileFormat};

    fn record(id: i64, name: &str, endpoint: &str, content: &str) -> SpecRecord {
        SpecRecord {
            id,
            name: name.to_string(),
            endpoint_path: endpoint.to_string(),
            spec_content: content.to_string(),
            file_format: FileFormat::Json,
            api_key_token: None,
            active: true,
            title: None,
            version: None,
            file_size: content.len() as i64,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const PETS: &str = r#"{
        "openapi": "3.0.0",
        "info": {"title": "Pets", "version": "1"},
        "servers": [{"url": "https://pets.example.com"}],
        "paths": {"/pets": {"get": {"operationId": "listPets"}}}
    }"#;

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let records = vec![record(1, "pets", "/pets", PETS)];
        let base = fingerprint(&records);
        assert_eq!(base, fingerprint(&records));

        let mut renamed = records.clone();
        renamed[0].name = "cats".to_string();
        assert_ne!(base, fingerprint(&renamed));

        let mut token_added = records.clone();
        token_added[0].api_key_token = Some(ApiToken::new("secret"));
        assert_ne!(base, fingerprint(&token_added));

        // Content alone is not part of the change key.
        let mut content_changed = records;
        content_changed[0].spec_content.push(' ');
        assert_eq!(base, fingerprint(&content_changed));
    }

    #[test]
    fn test_build_set_skips_malformed() {
        let records = vec![
            record(1, "pets", "/pets", PETS),
            record(2, "broken", "/broken", "{ not json"),
            record(3, "legacy", "/legacy", r#"{"swagger": "2.0"}"#),
        ];
        let set = build_mount_set(records, &OperationFilter::all());
        assert_eq!(set.mounts.len(), 1);
        assert_eq!(set.mounts[0].mount_path, "/pets");
        assert_eq!(set.mounts[0].tools.len(), 1);
    }

    #[test]
    fn test_match_path_longest_prefix() {
        let records = vec![
            record(1, "pets", "/pets", PETS),
            record(2, "pets-admin", "/pets/admin", PETS),
        ];
        let set = build_mount_set(records, &OperationFilter::all());

        let (mount, rest) = set.match_path("/pets").expect("exact");
        assert_eq!(mount.mount_path, "/pets");
        assert_eq!(rest, "");

        let (mount, rest) = set.match_path("/pets/admin/sse").expect("nested");
        assert_eq!(mount.mount_path, "/pets/admin");
        assert_eq!(rest, "/sse");

        let (mount, rest) = set.match_path("/pets/sse").expect("outer");
        assert_eq!(mount.mount_path, "/pets");
        assert_eq!(rest, "/sse");

        assert!(set.match_path("/petstore").is_none());
        assert!(set.match_path("/other").is_none());
    }

    #[test]
    fn test_endpoint_tag() {
        assert_eq!(endpoint_tag("/weather"), "WEATHER");
        assert_eq!(endpoint_tag("/weather-api"), "WEATHER_API");
        assert_eq!(endpoint_tag("/a/b"), "A");
        assert_eq!(endpoint_tag("/"), "");
    }
}
