//! File-based discovery of the project's component configuration document.
//!
//! The document holds the same keys as [`PluginOptions`]. It is optional:
//! a project without one simply resolves to the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format as _, Json, Toml};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::options::PluginOptions;

/// File names probed in the project directory, in order.
pub const DOCUMENT_FILES: [&str; 3] = ["svelte.config.toml", "svelte.config.json", ".svelterc"];

/// Field of `package.json` that may carry the configuration.
pub const PACKAGE_JSON_FIELD: &str = "svelte";

/// Options loaded from an external configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub options: PluginOptions,
}

/// Searches for the configuration document of a project.
///
/// # Example
///
/// ```no_run
/// use svite_config::ConfigDiscovery;
///
/// let document = ConfigDiscovery::new(".").load().unwrap();
/// if let Some(document) = document {
///     println!("loaded {}", document.path.display());
/// }
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config document in the root directory
    ///
    /// Searches in this order:
    /// 1. svelte.config.toml
    /// 2. svelte.config.json
    /// 3. .svelterc (JSON)
    /// 4. package.json (`svelte` field, when it is a table)
    pub fn find(&self) -> Option<PathBuf> {
        for name in DOCUMENT_FILES {
            let path = self.root.join(name);
            if path.is_file() {
                return Some(path);
            }
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.is_file() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get(PACKAGE_JSON_FIELD).is_some_and(Value::is_object) {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Load the discovered document.
    ///
    /// A missing document yields `Ok(None)`; a document that exists but
    /// cannot be parsed yields [`ConfigError::Malformed`].
    pub fn load(&self) -> Result<Option<ConfigDocument>> {
        match self.find() {
            Some(path) => load_document(&path).map(Some),
            None => Ok(None),
        }
    }
}

/// Load a configuration document from an explicit path.
pub fn load_document(path: &Path) -> Result<ConfigDocument> {
    if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
        return load_from_package_json(path);
    }

    if !path.is_file() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config document not found: {}", path.display()),
        )));
    }

    let figment = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Figment::from(Toml::file(path)),
        _ => Figment::from(Json::file(path)),
    };

    let options: PluginOptions = figment.extract().map_err(|e| ConfigError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(ConfigDocument {
        path: path.to_path_buf(),
        options,
    })
}

fn load_from_package_json(path: &Path) -> Result<ConfigDocument> {
    let content = fs::read_to_string(path)?;

    let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Malformed {
        path: path.to_path_buf(),
        message: format!("Invalid JSON: {}", e),
    })?;

    let field = parsed
        .get(PACKAGE_JSON_FIELD)
        .filter(|value| value.is_object())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: PACKAGE_JSON_FIELD.to_string(),
            hint: Some("Add a 'svelte' table to your package.json".to_string()),
        })?;

    let options: PluginOptions =
        serde_json::from_value(field.clone()).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            message: format!("{}: {}", PACKAGE_JSON_FIELD, e),
        })?;

    Ok(ConfigDocument {
        path: path.to_path_buf(),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        let discovery = ConfigDiscovery::new(dir.path());
        assert!(discovery.find().is_none());
        assert!(discovery.load().unwrap().is_none());
    }

    #[test]
    fn toml_wins_over_package_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("svelte.config.toml"), "extensions = [\".svelte\"]\n").unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "svelte": { "extensions": [".svx"] } }"#,
        )
        .unwrap();

        let discovery = ConfigDiscovery::new(dir.path());
        assert_eq!(discovery.find().unwrap(), dir.path().join("svelte.config.toml"));
    }

    #[test]
    fn package_json_entry_string_is_not_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "lib", "svelte": "src/index.js" }"#,
        )
        .unwrap();

        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn load_parses_svelterc_json() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".svelterc"),
            r#"{ "hot": false, "immutable": true }"#,
        )
        .unwrap();

        let document = ConfigDiscovery::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(document.options.hot, Some(crate::HotSetting::Enabled(false)));
        assert_eq!(
            document.options.passthrough.get("immutable"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("svelte.config.toml"), "extensions = [\n").unwrap();

        let result = ConfigDiscovery::new(dir.path()).load();
        assert!(matches!(result, Err(ConfigError::Malformed { .. })));
    }
}
