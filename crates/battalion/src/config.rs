//! YAML config files.
//!
//! A config file is loaded once per run and flattened into dotted keys, so
//! the nesting style does not matter:
//!
//! ```yaml
//! mycli:
//!   debug: true
//!   myhandler:
//!     msg: Kyle
//! mycli.myhandler:
//!   greeting: Hi
//! ```
//!
//! Each dispatch level asks for its [fragment](Config::fragment_for): the
//! entries that sit directly under the level's key (`mycli.myhandler.msg`
//! belongs to `mycli.myhandler`, not to `mycli`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ConfigError;
use crate::invocation::normalize_key;
use crate::key::Key;
use crate::state::State;

/// A loaded, flattened config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    path: Option<PathBuf>,
    values: BTreeMap<String, Value>,
}

impl Config {
    /// Parses YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        let root: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(text)?
        };
        let mut values = BTreeMap::new();
        flatten("", &root, &mut values);
        Ok(Self { path: None, values })
    }

    /// Loads `path`. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            tracing::debug!("no config file at {}", path.display());
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "loaded {} config entries from {}",
            config.values.len(),
            path.display()
        );
        config.path = Some(path.to_path_buf());
        Ok(Some(config))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Looks up a flattened dotted key.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        self.values.get(dotted)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The entries directly under `key`, with the prefix stripped.
    pub fn fragment_for(&self, key: &Key) -> State {
        let prefix: String = key
            .segments()
            .iter()
            .map(|s| normalize_key(s))
            .collect::<Vec<_>>()
            .join(".");
        let prefix = format!("{}.", prefix);

        self.values
            .iter()
            .filter_map(|(k, v)| {
                let leaf = k.strip_prefix(&prefix)?;
                (!leaf.contains('.')).then(|| (leaf.to_string(), v.clone()))
            })
            .collect()
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let k = k.split('.').map(normalize_key).collect::<Vec<_>>().join(".");
                let key = if prefix.is_empty() {
                    k
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        Value::Null if prefix.is_empty() => {}
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const YAML: &str = "
mycli:
  debug: true
  myhandler:
    msg: Kyle
mycli.myhandler:
  dry-run: false
other:
  x: 1
";

    #[test]
    fn test_flatten_nested_and_dotted() {
        let config = Config::from_yaml_str(YAML).unwrap();
        assert_eq!(config.get("mycli.debug"), Some(&json!(true)));
        assert_eq!(config.get("mycli.myhandler.msg"), Some(&json!("Kyle")));
        assert_eq!(config.get("mycli.myhandler.dry_run"), Some(&json!(false)));
        assert_eq!(config.len(), 4);
    }

    #[test]
    fn test_fragment_only_takes_direct_children() {
        let config = Config::from_yaml_str(YAML).unwrap();

        let cli = config.fragment_for(&Key::cli("mycli"));
        assert!(cli.get_bool("debug"));
        assert!(!cli.contains("msg"));

        let handler = config.fragment_for(&Key::handler("mycli", "myhandler"));
        assert_eq!(handler.get_str("msg"), Some("Kyle"));
        assert_eq!(handler.get("dry_run"), Some(&json!(false)));
        assert_eq!(handler.len(), 2);
    }

    #[test]
    fn test_empty_document() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(Config::load(&missing).unwrap().is_none());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", YAML).unwrap();

        let config = Config::load(file.path()).unwrap().unwrap();
        assert_eq!(config.path(), Some(file.path()));
        assert_eq!(config.get("other.x"), Some(&json!(1)));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "mycli: [unclosed").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/etc/x.yaml"), PathBuf::from("/etc/x.yaml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/.mycli/mycli.yaml"), home.join(".mycli/mycli.yaml"));
        }
    }
}
