//! Plugin protocol exchanged with the host release pipeline.
//!
//! The host sends an [`ExecuteRequest`] per hook and expects an
//! [`ExecuteResponse`] back. A failed step is reported as
//! `success: false` with a message, never as a transport-level error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Extension point in the host's release pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Hook {
    /// Before the release is published: validate, build, test.
    PrePublish,
    /// After the release is published: archive, upload, tag.
    PostPublish,
    /// Any hook this plugin does not handle.
    Other(String),
}

impl Hook {
    /// Wire name of the hook.
    pub fn as_str(&self) -> &str {
        match self {
            Hook::PrePublish => "pre-publish",
            Hook::PostPublish => "post-publish",
            Hook::Other(name) => name,
        }
    }
}

impl From<String> for Hook {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pre-publish" | "pre_publish" | "PrePublish" => Hook::PrePublish,
            "post-publish" | "post_publish" | "PostPublish" => Hook::PostPublish,
            _ => Hook::Other(s),
        }
    }
}

impl From<&str> for Hook {
    fn from(s: &str) -> Self {
        Hook::from(s.to_string())
    }
}

impl From<Hook> for String {
    fn from(hook: Hook) -> Self {
        hook.as_str().to_string()
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release facts supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseContext {
    /// Version being released, without a tag prefix (e.g. `1.4.0`).
    pub version: String,

    /// Previously released version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,

    /// Tag the host intends to use for this release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,

    /// Other host-provided fields, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Request to run one hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Hook being executed.
    pub hook: Hook,

    /// Release facts.
    #[serde(default)]
    pub context: ReleaseContext,

    /// Raw plugin configuration, interpreted by the plugin.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,

    /// Host-level dry-run switch; OR-ed with the config's `dry_run`.
    #[serde(default)]
    pub dry_run: bool,
}

/// Outcome of one hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Whether every step succeeded.
    pub success: bool,

    /// Human-readable summary or failure reason.
    pub message: String,

    /// Values produced by the hook (package name, checksum, tag, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl ExecuteResponse {
    /// A successful response.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            outputs: BTreeMap::new(),
        }
    }

    /// An unsuccessful response.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            outputs: BTreeMap::new(),
        }
    }

    /// Attach an output value.
    pub fn with_output(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.outputs.insert(key.to_string(), value.into());
        self
    }
}

/// Static description of the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin identifier.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// One-line description.
    pub description: String,
    /// Hooks the plugin acts on.
    pub hooks: Vec<Hook>,
}

/// A configuration problem tied to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted config key (e.g. `test_config.coverage`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of validating a configuration; valid iff `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Whether the configuration is usable.
    pub valid: bool,
    /// Every problem found.
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

impl From<Vec<FieldError>> for ValidateResponse {
    fn from(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_round_trips_known_and_unknown_names() {
        let hook: Hook = serde_json::from_str("\"post-publish\"").unwrap();
        assert_eq!(hook, Hook::PostPublish);

        let other: Hook = serde_json::from_str("\"on-success\"").unwrap();
        assert_eq!(other, Hook::Other("on-success".into()));
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"on-success\"");
    }

    #[test]
    fn request_defaults_optional_parts() {
        let json = r#"{"hook":"pre-publish","context":{"version":"1.0.0","branch":"main"}}"#;
        let req: ExecuteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.hook, Hook::PrePublish);
        assert_eq!(req.context.version, "1.0.0");
        assert_eq!(req.context.extra["branch"], serde_json::json!("main"));
        assert!(req.config.is_empty());
        assert!(!req.dry_run);
    }

    #[test]
    fn validate_response_from_errors() {
        assert!(ValidateResponse::from(Vec::new()).valid);
        let resp =
            ValidateResponse::from(vec![FieldError::new("scope", "Package scope is required")]);
        assert!(!resp.valid);
        assert_eq!(resp.errors[0].to_string(), "scope: Package scope is required");
    }
}
