//! Package description as printed by `swift package dump-package`.
//!
//! Only the fields the publisher reads are modeled. The dump format has
//! changed shape across toolchain releases (products and dependencies in
//! particular), so the loosely-typed parts are kept as JSON values with
//! accessors instead of strict enums.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level package description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDescription {
    /// Package name declared in `Package(name:)`.
    pub name: String,

    /// Minimum deployment targets.
    #[serde(default)]
    pub platforms: Vec<Platform>,

    /// Libraries and executables vended by the package.
    #[serde(default)]
    pub products: Vec<Product>,

    /// External package dependencies.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Build targets.
    #[serde(default)]
    pub targets: Vec<Target>,

    /// Declared tools version, e.g. `5.9.0`.
    #[serde(
        default,
        rename = "toolsVersion",
        alias = "swift_tools_version",
        deserialize_with = "tools_version"
    )]
    pub tools_version: Option<String>,
}

/// A supported platform and its minimum version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Platform identifier, e.g. `macos`.
    #[serde(rename = "platformName")]
    pub name: String,

    /// Minimum version, e.g. `13.0`.
    #[serde(default)]
    pub version: String,
}

/// A package product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product name.
    pub name: String,

    /// Product type: `{"library": ["automatic"]}`, `{"executable": null}`,
    /// or a bare string in older dumps.
    #[serde(default, rename = "type")]
    pub kind: Value,

    /// Targets that make up the product.
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Product {
    /// Short product kind (`library`, `executable`, `plugin`, ...).
    pub fn kind_name(&self) -> Option<&str> {
        match &self.kind {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.keys().next().map(String::as_str),
            _ => None,
        }
    }
}

/// A package dependency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Dependency {
    /// Package identity (lowercased repository name or registry id).
    pub identity: Option<String>,

    /// Remote URL, local path, or registry identifier.
    pub url: Option<String>,

    /// Version requirement exactly as dumped.
    pub requirement: Option<Value>,
}

impl From<Value> for Dependency {
    fn from(value: Value) -> Self {
        // Newer dumps wrap the body as {"sourceControl": [{...}]} etc.
        let body = ["sourceControl", "fileSystem", "registry"]
            .iter()
            .find_map(|k| value.get(*k).and_then(|v| v.get(0)))
            .unwrap_or(&value);

        let identity = body
            .get("identity")
            .or_else(|| body.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let url = body
            .get("location")
            .and_then(|loc| {
                loc.get("remote")
                    .and_then(|r| r.get(0))
                    .and_then(|r| r.get("urlString").or(Some(r)))
                    .and_then(Value::as_str)
                    .or_else(|| loc.get("local").and_then(|l| l.get(0)).and_then(Value::as_str))
            })
            .or_else(|| body.get("url").and_then(Value::as_str))
            .or_else(|| body.get("path").and_then(Value::as_str))
            .map(str::to_string);

        let requirement = body
            .get("requirement")
            .or_else(|| body.get("version"))
            .cloned();

        Self {
            identity,
            url,
            requirement,
        }
    }
}

/// A build target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Target name.
    pub name: String,

    /// `regular`, `test`, `executable`, `plugin`, ...
    #[serde(default, rename = "type")]
    pub kind: String,

    /// Target dependencies as dumped (`{"byName": ["Foo", null]}`, ...).
    #[serde(default)]
    pub dependencies: Vec<Value>,
}

impl Target {
    /// Names of the target's dependencies, whatever their dumped form.
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter_map(|dep| match dep {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map
                    .values()
                    .next()
                    .and_then(|v| v.get(0))
                    .and_then(Value::as_str),
                _ => None,
            })
            .collect()
    }
}

fn tools_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(map)) => map
            .get("_version")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}
