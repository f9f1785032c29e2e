//! Option layers as supplied by the caller or a configuration document.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mode::Mode;

/// One layer of options.
///
/// The same shape is used for the defaults, the configuration document and the
/// options passed at plugin creation. Every field is optional so that layers
/// can be merged with "later wins" precedence. Keys that are not recognised
/// land in [`PluginOptions::passthrough`] and reach the compiler unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot: Option<HotSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_transform_cache: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_cache_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_absolute_imports_inside_root: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// Substring patterns a module id must contain to be compiled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    /// Substring patterns that exclude a module id from compilation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<Vec<PreprocessorRef>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor_options: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_options: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a JSON value, e.g. options forwarded by a JS host.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        serde_json::from_value(value).map_err(|e| crate::ConfigError::InvalidValue {
            field: "pluginOptions".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn with_hot(mut self, hot: impl Into<HotSetting>) -> Self {
        self.hot = Some(hot.into());
        self
    }

    pub fn with_transform_cache(mut self, enabled: bool) -> Self {
        self.use_transform_cache = Some(enabled);
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set a compiler flag through the nested `compilerOptions` sub-map.
    pub fn with_compiler_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compiler_options
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// The `hot` option accepts either a boolean or a table of hot-reload options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HotSetting {
    Enabled(bool),
    Options(HotOptions),
}

impl HotSetting {
    /// `true` expands to the default options, `false` disables hot reload.
    pub fn to_options(&self) -> Option<HotOptions> {
        match self {
            HotSetting::Enabled(true) => Some(HotOptions::default()),
            HotSetting::Enabled(false) => None,
            HotSetting::Options(options) => Some(options.clone()),
        }
    }
}

impl From<bool> for HotSetting {
    fn from(enabled: bool) -> Self {
        HotSetting::Enabled(enabled)
    }
}

impl From<HotOptions> for HotSetting {
    fn from(options: HotOptions) -> Self {
        HotSetting::Options(options)
    }
}

/// Options handed to the hot-reload runtime of the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotOptions {
    pub compat_vite: bool,
    pub optimistic: bool,
    pub no_preserve_state: bool,
}

impl Default for HotOptions {
    fn default() -> Self {
        Self {
            compat_vite: true,
            optimistic: true,
            no_preserve_state: false,
        }
    }
}

/// Reference to a registered preprocessor, optionally limited to some modes.
///
/// ```toml
/// preprocess = ["typescript", { name = "postcss", modes = ["build"] }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreprocessorRef {
    Name(String),
    Scoped {
        name: String,
        #[serde(default)]
        modes: Option<Vec<Mode>>,
    },
}

impl PreprocessorRef {
    pub fn name(&self) -> &str {
        match self {
            PreprocessorRef::Name(name) => name,
            PreprocessorRef::Scoped { name, .. } => name,
        }
    }

    pub fn applies_to(&self, mode: Mode) -> bool {
        match self {
            PreprocessorRef::Name(_) => true,
            PreprocessorRef::Scoped { modes: None, .. } => true,
            PreprocessorRef::Scoped { modes: Some(modes), .. } => modes.contains(&mode),
        }
    }
}

impl From<&str> for PreprocessorRef {
    fn from(name: &str) -> Self {
        PreprocessorRef::Name(name.to_string())
    }
}

/// Log level of a plugin session
///
/// Deserialized through [`FromStr`](std::str::FromStr), so names are
/// case-insensitive and accept `warning` and `off` as aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LogLevel {
    /// All logs including debug
    Debug,
    /// Errors, warnings, and info (default)
    #[default]
    Info,
    /// Errors and warnings
    Warn,
    /// Only errors
    Error,
    /// No logging output
    Silent,
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "off",
        }
    }

    /// Whether an event at `level` passes this session level.
    pub fn enabled(&self, level: tracing::Level) -> bool {
        let threshold = match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warn => 2,
            LogLevel::Error => 3,
            LogLevel::Silent => return false,
        };
        let rank = if level == tracing::Level::ERROR {
            3
        } else if level == tracing::Level::WARN {
            2
        } else if level == tracing::Level::INFO {
            1
        } else {
            0
        };
        rank >= threshold
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;
    fn try_from(value: String) -> Result<Self, <Self as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_keys_and_passthrough() {
        let options = PluginOptions::from_value(json!({
            "hot": false,
            "useTransformCache": false,
            "resolveAbsoluteImportsInsideRoot": true,
            "extensions": [".svelte", ".svx"],
            "logLevel": "debug",
            "immutable": true,
            "compilerOptions": { "accessors": true }
        }))
        .unwrap();

        assert_eq!(options.hot, Some(HotSetting::Enabled(false)));
        assert_eq!(options.use_transform_cache, Some(false));
        assert_eq!(options.resolve_absolute_imports_inside_root, Some(true));
        assert_eq!(options.log_level, Some(LogLevel::Debug));
        assert_eq!(options.passthrough.get("immutable"), Some(&json!(true)));
        assert_eq!(
            options.compiler_options.unwrap().get("accessors"),
            Some(&json!(true))
        );
        assert!(!options.passthrough.contains_key("compilerOptions"));
    }

    #[test]
    fn hot_setting_accepts_table() {
        let options = PluginOptions::from_value(json!({
            "hot": { "optimistic": false }
        }))
        .unwrap();

        let hot = options.hot.unwrap().to_options().unwrap();
        assert!(!hot.optimistic);
        assert!(hot.compat_vite);
    }

    #[test]
    fn hot_true_expands_to_defaults() {
        assert_eq!(HotSetting::Enabled(true).to_options(), Some(HotOptions::default()));
        assert_eq!(HotSetting::Enabled(false).to_options(), None);
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let result = PluginOptions::from_value(json!({ "logLevel": "loud" }));
        assert!(matches!(result, Err(crate::ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn preprocessor_refs_parse_both_forms() {
        let options = PluginOptions::from_value(json!({
            "preprocess": ["typescript", { "name": "postcss", "modes": ["build"] }]
        }))
        .unwrap();

        let refs = options.preprocess.unwrap();
        assert_eq!(refs[0].name(), "typescript");
        assert!(refs[0].applies_to(Mode::Dev));
        assert_eq!(refs[1].name(), "postcss");
        assert!(refs[1].applies_to(Mode::Build));
        assert!(!refs[1].applies_to(Mode::Dev));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("invalid".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_gates_events() {
        assert!(LogLevel::Info.enabled(tracing::Level::WARN));
        assert!(!LogLevel::Info.enabled(tracing::Level::DEBUG));
        assert!(LogLevel::Error.enabled(tracing::Level::ERROR));
        assert!(!LogLevel::Error.enabled(tracing::Level::WARN));
        assert!(!LogLevel::Silent.enabled(tracing::Level::ERROR));
    }
}
