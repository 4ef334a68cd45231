//! Reading plugin configuration and requests from disk.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

/// Load a configuration map from a `.toml` or `.json` file.
///
/// Any other extension is tried as JSON first, then TOML.
pub fn load_config(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => from_toml(&text),
        Some("json") => from_json(&text),
        _ => from_json(&text).or_else(|_| from_toml(&text)),
    }
    .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => bail!(
            "Config file {} must contain a table, found {}",
            path.display(),
            kind(&other)
        ),
    }
}

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn from_json(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

fn from_toml(text: &str) -> Result<Value> {
    let table: toml::Table = toml::from_str(text)?;
    Ok(serde_json::to_value(table)?)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Array(_) => "an array",
        Value::Object(_) => "a table",
        Value::Null => "null",
        _ => "a scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn toml_becomes_json_map() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "swiftpub.toml",
            r#"
scope = "myorg"
create_tag = false

[test_config]
coverage = true

[archive]
exclude = [".git", "Docs/"]
"#,
        );

        let map = load_config(&path).unwrap();
        assert_eq!(map["scope"], "myorg");
        assert_eq!(map["create_tag"], false);
        assert_eq!(map["test_config"]["coverage"], true);
        assert_eq!(map["archive"]["exclude"][1], "Docs/");
    }

    #[test]
    fn json_config() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", r#"{"scope": "org", "dry_run": true}"#);
        let map = load_config(&path).unwrap();
        assert_eq!(map["dry_run"], true);
    }

    #[test]
    fn unknown_extension_sniffs_format() {
        let dir = TempDir::new().unwrap();
        let json = write(&dir, "a.conf", r#"{"scope": "j"}"#);
        let toml = write(&dir, "b.conf", "scope = \"t\"\n");
        assert_eq!(load_config(&json).unwrap()["scope"], "j");
        assert_eq!(load_config(&toml).unwrap()["scope"], "t");
    }

    #[test]
    fn non_table_json_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.json", "[1, 2]");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("must contain a table"), "{err}");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/nonexistent/swiftpub.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/swiftpub.toml"));
    }
}
