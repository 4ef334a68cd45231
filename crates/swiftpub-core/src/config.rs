//! Plugin configuration.
//!
//! The host hands the plugin an untyped JSON map. [`PluginConfig`] is the
//! typed view of it: every field has a default, a few can come from the
//! environment, and an explicit value in the map wins over both. Values of
//! the wrong type are reported per field rather than silently ignored, and
//! all of them are reported at once.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use swiftpub_schema::{FieldError, MANIFEST_FILE};
use thiserror::Error;

use crate::archive::{ArchiveOptions, DEFAULT_EXCLUDES};
use crate::toolchain::TestOptions;

/// Registry used when none is configured.
pub const DEFAULT_REGISTRY: &str = "https://swift.pkg.github.com";

/// Environment fallback for `registry`.
pub const ENV_REGISTRY: &str = "SWIFT_REGISTRY_URL";
/// Environment fallback for `scope`.
pub const ENV_SCOPE: &str = "SWIFT_PACKAGE_SCOPE";
/// Environment fallback for `token`.
pub const ENV_TOKEN: &str = "SWIFT_REGISTRY_TOKEN";

const DEFAULT_VERSION_CONSTANT: &str = "packageVersion";

/// Every field error found while loading a configuration map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid configuration: {}", join(.0))]
pub struct ConfigErrors(pub Vec<FieldError>);

fn join(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Typed plugin configuration.
#[derive(Clone, PartialEq, Serialize)]
pub struct PluginConfig {
    /// Registry base URL.
    pub registry: String,
    /// Registry namespace the package is published under.
    pub scope: String,
    /// Bearer token. Never serialized or printed.
    #[serde(skip_serializing)]
    pub token: String,
    /// Package name override; empty means "ask `swift package dump-package`".
    pub package_name: String,
    pub manifest_path: String,
    pub update_manifest: bool,
    pub version_constant: String,
    pub create_tag: bool,
    pub tag_prefix: String,
    pub validate: bool,
    pub build: bool,
    pub test: bool,
    pub test_config: TestOptions,
    pub archive: ArchiveOptions,
    /// Skip archive and upload when the registry already has the version.
    pub skip_existing: bool,
    pub dry_run: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            scope: String::new(),
            token: String::new(),
            package_name: String::new(),
            manifest_path: MANIFEST_FILE.to_string(),
            update_manifest: false,
            version_constant: DEFAULT_VERSION_CONSTANT.to_string(),
            create_tag: true,
            tag_prefix: String::new(),
            validate: true,
            build: true,
            test: true,
            test_config: TestOptions::default(),
            archive: ArchiveOptions::default(),
            skip_existing: true,
            dry_run: false,
        }
    }
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("registry", &self.registry)
            .field("scope", &self.scope)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("package_name", &self.package_name)
            .field("manifest_path", &self.manifest_path)
            .field("update_manifest", &self.update_manifest)
            .field("version_constant", &self.version_constant)
            .field("create_tag", &self.create_tag)
            .field("tag_prefix", &self.tag_prefix)
            .field("validate", &self.validate)
            .field("build", &self.build)
            .field("test", &self.test)
            .field("test_config", &self.test_config)
            .field("archive", &self.archive)
            .field("skip_existing", &self.skip_existing)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl PluginConfig {
    /// Load from a raw map, with environment fallbacks from the process env.
    ///
    /// # Errors
    ///
    /// Returns every field whose value has the wrong JSON type.
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self, ConfigErrors> {
        Self::from_raw_with_env(raw, |key| std::env::var(key).ok())
    }

    /// Load from a raw map, resolving environment fallbacks through `env`.
    ///
    /// # Errors
    ///
    /// Returns every field whose value has the wrong JSON type.
    pub fn from_raw_with_env(
        raw: &Map<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigErrors> {
        let (config, errors) = Self::load(raw, env);
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigErrors(errors))
        }
    }

    /// Best-effort load: a fully defaulted config plus whatever errors were
    /// found. Fields with errors keep their default.
    pub fn load(
        raw: &Map<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> (Self, Vec<FieldError>) {
        let mut r = Reader {
            errors: Vec::new(),
            env: &env,
        };
        let top = Section::root(raw);
        let mut cfg = Self::default();

        r.string(&top, "registry", Some(ENV_REGISTRY), &mut cfg.registry);
        r.string(&top, "scope", Some(ENV_SCOPE), &mut cfg.scope);
        r.string(&top, "token", Some(ENV_TOKEN), &mut cfg.token);
        r.string(&top, "package_name", None, &mut cfg.package_name);
        r.string(&top, "manifest_path", None, &mut cfg.manifest_path);
        r.boolean(&top, "update_manifest", &mut cfg.update_manifest);
        r.string(&top, "version_constant", None, &mut cfg.version_constant);
        r.boolean(&top, "create_tag", &mut cfg.create_tag);
        r.string(&top, "tag_prefix", None, &mut cfg.tag_prefix);
        r.boolean(&top, "validate", &mut cfg.validate);
        r.boolean(&top, "build", &mut cfg.build);
        r.boolean(&top, "test", &mut cfg.test);
        r.boolean(&top, "skip_existing", &mut cfg.skip_existing);
        r.boolean(&top, "dry_run", &mut cfg.dry_run);

        if let Some(tc) = r.section(&top, "test_config") {
            let opts = &mut cfg.test_config;
            r.string(&tc, "configuration", None, &mut opts.configuration);
            r.boolean(&tc, "coverage", &mut opts.coverage);
            r.boolean(&tc, "parallel", &mut opts.parallel);
        }

        if let Some(ar) = r.section(&top, "archive") {
            r.boolean(&ar, "include_docs", &mut cfg.archive.include_docs);
            if let Some(exclude) = r.string_list(&ar, "exclude") {
                if !exclude.is_empty() {
                    cfg.archive.exclude = exclude;
                }
            }
        }

        (cfg, r.errors)
    }

    /// Semantic checks beyond type coercion.
    ///
    /// `swift_on_path` is passed in so callers decide how the toolchain is
    /// located.
    pub fn problems(&self, swift_on_path: bool) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if !swift_on_path {
            errors.push(FieldError::new("swift", "Swift CLI not found in PATH"));
        }
        if self.scope.is_empty() {
            errors.push(FieldError::new("scope", "Package scope is required"));
        }
        if self.token.is_empty() {
            errors.push(FieldError::new("token", "Registry token is required"));
        }
        if !self.registry.is_empty() {
            if let Err(e) = reqwest::Url::parse(&self.registry) {
                errors.push(FieldError::new("registry", format!("Invalid registry URL: {e}")));
            }
        }
        let manifest = self.manifest_file();
        if !manifest.exists() {
            errors.push(FieldError::new(
                "manifest_path",
                format!("Package.swift not found at: {}", manifest.display()),
            ));
        }

        errors
    }

    /// Manifest location; an empty setting means `Package.swift`.
    pub fn manifest_file(&self) -> PathBuf {
        if self.manifest_path.is_empty() {
            PathBuf::from(MANIFEST_FILE)
        } else {
            PathBuf::from(&self.manifest_path)
        }
    }

    /// Directory holding the manifest.
    ///
    /// A bare file name resolves to the current directory.
    ///
    /// # Errors
    ///
    /// Fails only if the current directory is needed and cannot be read.
    pub fn work_dir(&self) -> std::io::Result<PathBuf> {
        match self.manifest_file().parent() {
            Some(dir) if dir != Path::new("") => Ok(dir.to_path_buf()),
            _ => std::env::current_dir(),
        }
    }

    /// Tag created for `version`.
    pub fn tag_for(&self, version: &str) -> String {
        format!("{}{version}", self.tag_prefix)
    }
}

/// The exclusion list used when the configuration provides none.
pub fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(ToString::to_string).collect()
}

struct Section<'a> {
    map: &'a Map<String, Value>,
    prefix: Option<&'static str>,
}

impl<'a> Section<'a> {
    fn root(map: &'a Map<String, Value>) -> Self {
        Self { map, prefix: None }
    }

    /// Dotted field name for error reports.
    fn field(&self, key: &str) -> String {
        match self.prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.to_string(),
        }
    }

    /// Value for `key`; explicit `null` counts as absent.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }
}

struct Reader<'e, E> {
    errors: Vec<FieldError>,
    env: &'e E,
}

impl<E: Fn(&str) -> Option<String>> Reader<'_, E> {
    fn string(&mut self, s: &Section<'_>, key: &str, env_key: Option<&str>, out: &mut String) {
        if let Some(v) = env_key.and_then(|k| (self.env)(k)).filter(|v| !v.is_empty()) {
            *out = v;
        }
        match s.get(key) {
            None => {}
            Some(Value::String(v)) => {
                if !v.is_empty() {
                    out.clone_from(v);
                }
            }
            Some(other) => self.type_error(s, key, "a string", other),
        }
    }

    fn boolean(&mut self, s: &Section<'_>, key: &str, out: &mut bool) {
        match s.get(key) {
            None => {}
            Some(Value::Bool(v)) => *out = *v,
            Some(other) => self.type_error(s, key, "a boolean", other),
        }
    }

    fn string_list(&mut self, s: &Section<'_>, key: &str) -> Option<Vec<String>> {
        let items = match s.get(key)? {
            Value::Array(items) => items,
            other => {
                self.type_error(s, key, "a list of strings", other);
                return None;
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(v) => out.push(v.clone()),
                other => self.type_error(s, &format!("{key}[{i}]"), "a string", other),
            }
        }
        Some(out)
    }

    fn section<'a>(&mut self, s: &Section<'a>, key: &'static str) -> Option<Section<'a>> {
        match s.get(key)? {
            Value::Object(map) => Some(Section {
                map,
                prefix: Some(key),
            }),
            other => {
                self.type_error(s, key, "an object", other);
                None
            }
        }
    }

    fn type_error(&mut self, s: &Section<'_>, key: &str, expected: &str, got: &Value) {
        self.errors.push(FieldError::new(
            s.field(key),
            format!("expected {expected}, got {}", json_kind(got)),
        ));
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn raw(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults() {
        let cfg = PluginConfig::from_raw_with_env(&Map::new(), no_env).unwrap();

        assert_eq!(cfg.registry, "https://swift.pkg.github.com");
        assert_eq!(cfg.manifest_path, "Package.swift");
        assert_eq!(cfg.version_constant, "packageVersion");
        assert!(cfg.create_tag);
        assert!(cfg.validate && cfg.build && cfg.test);
        assert!(!cfg.update_manifest);
        assert!(cfg.skip_existing);
        assert!(!cfg.dry_run);
        assert_eq!(cfg.test_config, TestOptions::default());
        assert!(cfg.archive.include_docs);
        assert_eq!(cfg.archive.exclude, default_excludes());
        assert_eq!(cfg, PluginConfig::default());
    }

    #[test]
    fn explicit_values() {
        let cfg = PluginConfig::from_raw_with_env(
            &raw(json!({
                "registry": "https://registry.example.com",
                "scope": "myorg",
                "token": "secret",
                "package_name": "MyPackage",
                "manifest_path": "pkg/Package.swift",
                "update_manifest": true,
                "version_constant": "kVersion",
                "create_tag": false,
                "tag_prefix": "v",
                "validate": false,
                "build": false,
                "test": false,
                "skip_existing": false,
                "dry_run": true,
            })),
            no_env,
        )
        .unwrap();

        assert_eq!(cfg.registry, "https://registry.example.com");
        assert_eq!(cfg.scope, "myorg");
        assert_eq!(cfg.token, "secret");
        assert_eq!(cfg.package_name, "MyPackage");
        assert_eq!(cfg.manifest_path, "pkg/Package.swift");
        assert!(cfg.update_manifest);
        assert_eq!(cfg.version_constant, "kVersion");
        assert!(!cfg.create_tag);
        assert_eq!(cfg.tag_for("1.2.3"), "v1.2.3");
        assert!(!cfg.validate && !cfg.build && !cfg.test);
        assert!(!cfg.skip_existing);
        assert!(cfg.dry_run);
    }

    #[test]
    fn nested_sections() {
        let cfg = PluginConfig::from_raw_with_env(
            &raw(json!({
                "test_config": {"configuration": "release", "coverage": true, "parallel": false},
                "archive": {"include_docs": false, "exclude": ["*.md", "Docs/"]},
            })),
            no_env,
        )
        .unwrap();

        assert_eq!(cfg.test_config.configuration, "release");
        assert!(cfg.test_config.coverage);
        assert!(!cfg.test_config.parallel);
        assert!(!cfg.archive.include_docs);
        assert_eq!(cfg.archive.exclude, vec!["*.md", "Docs/"]);
    }

    #[test]
    fn empty_exclude_list_uses_defaults() {
        let raw = raw(json!({"archive": {"exclude": []}}));
        let cfg = PluginConfig::from_raw_with_env(&raw, no_env).unwrap();
        assert_eq!(cfg.archive.exclude, default_excludes());
    }

    #[test]
    fn env_fills_in_and_explicit_wins() {
        let env: HashMap<&str, &str> = [
            ("SWIFT_REGISTRY_URL", "https://env.example.com"),
            ("SWIFT_PACKAGE_SCOPE", "envorg"),
            ("SWIFT_REGISTRY_TOKEN", "envtoken"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(ToString::to_string);

        let raw = raw(json!({"scope": "explicit", "token": ""}));
        let cfg = PluginConfig::from_raw_with_env(&raw, lookup).unwrap();

        assert_eq!(cfg.registry, "https://env.example.com");
        assert_eq!(cfg.scope, "explicit");
        // An empty explicit value does not clear the env value.
        assert_eq!(cfg.token, "envtoken");
    }

    #[test]
    fn type_errors_are_all_collected() {
        let err = PluginConfig::from_raw_with_env(
            &raw(json!({
                "scope": 42,
                "dry_run": "yes",
                "test_config": {"coverage": "true"},
                "archive": {"exclude": [".git", 7]},
            })),
            no_env,
        )
        .unwrap_err();

        let fields: Vec<&str> = err.0.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["scope", "dry_run", "test_config.coverage", "archive.exclude[1]"]
        );
        assert!(err.to_string().contains("scope: expected a string, got number"));
    }

    #[test]
    fn wrong_section_type() {
        let (cfg, errors) = PluginConfig::load(&raw(json!({"archive": "none"})), no_env);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "archive");
        assert_eq!(cfg.archive, ArchiveOptions::default());
    }

    #[test]
    fn null_is_absent() {
        let raw = raw(json!({"scope": null, "create_tag": null}));
        let cfg = PluginConfig::from_raw_with_env(&raw, no_env).unwrap();
        assert_eq!(cfg.scope, "");
        assert!(cfg.create_tag);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = PluginConfig {
            token: "super-secret".to_string(),
            ..PluginConfig::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
        assert!(!serde_json::to_string(&cfg).unwrap().contains("super-secret"));
    }

    #[test]
    fn problems_are_aggregated() {
        let cfg = PluginConfig {
            registry: "not a url".to_string(),
            manifest_path: "/nonexistent/Package.swift".to_string(),
            ..PluginConfig::default()
        };
        let fields: Vec<String> = cfg.problems(false).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["swift", "scope", "token", "registry", "manifest_path"]);
    }

    #[test]
    fn complete_config_has_no_problems() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = dir.path().join("Package.swift");
        std::fs::write(&manifest, "// swift-tools-version:5.7\n").unwrap();

        let cfg = PluginConfig {
            scope: "org".to_string(),
            token: "t".to_string(),
            manifest_path: manifest.to_string_lossy().into_owned(),
            ..PluginConfig::default()
        };
        assert!(cfg.problems(true).is_empty());
        assert_eq!(cfg.work_dir().unwrap(), dir.path());
    }

    #[test]
    fn bare_manifest_name_uses_current_dir() {
        let cfg = PluginConfig::default();
        assert_eq!(cfg.work_dir().unwrap(), std::env::current_dir().unwrap());
    }
}
