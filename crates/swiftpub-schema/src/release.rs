//! Registry-side release records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One published `(scope, name, version)` triple as reported by the registry.
///
/// A triple maps to at most one `Release`. The checksum is the hex SHA-256
/// of the source archive the registry stored for that version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Version string, e.g. `1.2.0`.
    pub version: String,

    /// Hex SHA-256 of the source archive, if the registry reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Base64 signature of the source archive, if the release was signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Opaque registry metadata (author, description, repository URLs, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Release {
    /// A release known only by its version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}

/// Body of `GET /{scope}/{name}`.
///
/// Maps each version to a small descriptor; only the presence of the key and
/// an optional `problem` object (withdrawn or unavailable releases) matter here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseListing {
    /// Version string to descriptor.
    #[serde(default)]
    pub releases: BTreeMap<String, ReleaseListingEntry>,
}

/// One version in a [`ReleaseListing`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseListingEntry {
    /// Canonical URL of the release metadata document.
    #[serde(default)]
    pub url: Option<String>,

    /// Present when the release is unavailable (e.g. removed for legal reasons).
    #[serde(default)]
    pub problem: Option<serde_json::Value>,
}

/// Body of `GET /{scope}/{name}/{version}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseDocument {
    /// Package identifier, `scope.name`.
    #[serde(default)]
    pub id: Option<String>,

    /// Version string.
    #[serde(default)]
    pub version: Option<String>,

    /// Downloadable resources of the release.
    #[serde(default)]
    pub resources: Vec<ReleaseResource>,

    /// Free-form package metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A downloadable resource attached to a release (the source archive).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseResource {
    /// Resource name; the source archive is `source-archive`.
    pub name: String,

    /// Media type, `application/zip` for source archives.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Hex SHA-256 of the resource.
    #[serde(default)]
    pub checksum: Option<String>,

    /// Signature block for signed releases.
    #[serde(default)]
    pub signing: Option<ResourceSigning>,
}

/// Signature attached to a [`ReleaseResource`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSigning {
    /// Base64-encoded signature bytes.
    #[serde(default)]
    pub signature_base64: Option<String>,

    /// Signature format, e.g. `cms-1.0.0`.
    #[serde(default)]
    pub signature_format: Option<String>,
}

/// Name of the source archive resource in a [`ReleaseDocument`].
pub const SOURCE_ARCHIVE_RESOURCE: &str = "source-archive";

impl ReleaseDocument {
    /// Collapse the document into a [`Release`].
    ///
    /// `fallback_version` is used when the document omits `version`.
    pub fn into_release(self, fallback_version: &str) -> Release {
        let archive = self
            .resources
            .into_iter()
            .find(|r| r.name == SOURCE_ARCHIVE_RESOURCE);

        let (checksum, signature) = match archive {
            Some(res) => (
                res.checksum,
                res.signing.and_then(|s| s.signature_base64),
            ),
            None => (None, None),
        };

        Release {
            version: self
                .version
                .unwrap_or_else(|| fallback_version.to_string()),
            checksum,
            signature,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_extracts_source_archive() {
        let json = r#"{
            "id": "mona.LinkedList",
            "version": "1.1.1",
            "resources": [
                {
                    "name": "source-archive",
                    "type": "application/zip",
                    "checksum": "a2ac54cf25fbc1ad0028f03f0aa4b96833b83bb05a14e510892bb27dea4dc812",
                    "signing": {
                        "signatureBase64": "l1TdTeIuGdNsO1FQ0ptD64F5nSSOsQ5WzhM6/7KsHRuLHfTsggnyIWr0DxMcBj5F40zfplwntXAgS0ynlqvlFw==",
                        "signatureFormat": "cms-1.0.0"
                    }
                }
            ],
            "metadata": { "description": "One thing links to another." }
        }"#;

        let doc: ReleaseDocument = serde_json::from_str(json).unwrap();
        let release = doc.into_release("ignored");
        assert_eq!(release.version, "1.1.1");
        assert_eq!(
            release.checksum.as_deref(),
            Some("a2ac54cf25fbc1ad0028f03f0aa4b96833b83bb05a14e510892bb27dea4dc812")
        );
        assert!(release.signature.is_some());
        assert_eq!(
            release.metadata["description"],
            serde_json::json!("One thing links to another.")
        );
    }

    #[test]
    fn document_without_archive_uses_fallback_version() {
        let doc: ReleaseDocument = serde_json::from_str("{}").unwrap();
        let release = doc.into_release("2.0.0");
        assert_eq!(release, Release::with_version("2.0.0"));
    }
}
