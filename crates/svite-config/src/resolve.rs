//! Layered resolution of plugin options into per-mode configuration views.
//!
//! Precedence, later wins:
//!
//! ```text
//! built-in defaults → configuration document → plugin options
//! ```
//!
//! Top-level keys are merged shallowly. The nested `compilerOptions` and
//! `preprocessorOptions` maps are merged one level deep as their own
//! sub-layers, with the same precedence.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{Level, debug, warn};

use crate::document::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::mode::{Environment, Mode};
use crate::options::{HotOptions, HotSetting, LogLevel, PluginOptions};
use crate::preprocess::{NamedPreprocessor, PreprocessorRegistry};
use crate::warning::{LogWarningHandler, SharedWarningHandler};

pub const DEFAULT_EXTENSIONS: [&str; 1] = [".svelte"];

/// Extensions the host cannot serve as a build entry.
pub const UNSUPPORTED_BUILD_EXTENSIONS: [&str; 1] = [".html"];

pub const DEFAULT_TRANSFORM_CACHE_SIZE: usize = 10_000;

/// Option key for hot reload. Lives outside the compiler flag map.
const HOT_KEY: &str = "hot";

/// The layer every resolution starts from.
pub fn default_options() -> PluginOptions {
    PluginOptions {
        hot: Some(HotSetting::Enabled(true)),
        use_transform_cache: Some(true),
        transform_cache_size: Some(DEFAULT_TRANSFORM_CACHE_SIZE),
        resolve_absolute_imports_inside_root: Some(true),
        extensions: Some(DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()),
        log_level: Some(LogLevel::Info),
        ..Default::default()
    }
}

/// Configuration for one mode.
///
/// Every view owns its containers; cloning or mutating one view never
/// affects another. Preprocessors and the warning handler are shared
/// immutable handles.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub mode: Mode,
    pub root: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub preprocess: Vec<NamedPreprocessor>,
    pub preprocessor_options: Map<String, Value>,
    pub on_warn: SharedWarningHandler,
    pub hot: Option<HotOptions>,
    /// Flags handed to the compiler (`dev`, `css`, `format`, ...).
    pub compiler: Map<String, Value>,
    pub use_transform_cache: bool,
    pub transform_cache_size: usize,
    pub resolve_absolute_imports_inside_root: bool,
    pub log_level: LogLevel,
}

impl ResolvedConfig {
    /// Current value of an option as seen by the forced-option enforcer.
    ///
    /// `hot` reads as `false` when hot reload is off; every other key is a
    /// compiler flag and reads as `null` when unset.
    pub fn option(&self, key: &str) -> Value {
        if key == HOT_KEY {
            return match &self.hot {
                Some(hot) => serde_json::to_value(hot).unwrap_or(Value::Bool(true)),
                None => Value::Bool(false),
            };
        }
        self.compiler.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn set_option(&mut self, key: &str, value: Value) {
        if key == HOT_KEY {
            self.compiler.remove(HOT_KEY);
            self.hot = match value {
                Value::Bool(true) => Some(HotOptions::default()),
                Value::Object(_) => serde_json::from_value(value).ok(),
                _ => None,
            };
            return;
        }
        self.compiler.insert(key.to_string(), value);
    }

    pub fn hot_enabled(&self) -> bool {
        self.hot.is_some()
    }

    /// The compiler's development flag.
    pub fn dev(&self) -> bool {
        self.compiler.get("dev").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn compiler_flag(&self, key: &str) -> Option<&Value> {
        self.compiler.get(key)
    }
}

/// Facts about a resolution, surfaced for logging.
#[derive(Debug, Clone, Default)]
pub struct ResolveMeta {
    pub document: Option<PathBuf>,
    pub removed_extensions: Vec<String>,
}

/// The three views produced from one set of inputs.
#[derive(Debug, Clone)]
pub struct ResolvedConfigs {
    pub dev: ResolvedConfig,
    pub build: ResolvedConfig,
    pub optimize: ResolvedConfig,
    pub meta: ResolveMeta,
}

impl ResolvedConfigs {
    pub fn get(&self, mode: Mode) -> &ResolvedConfig {
        match mode {
            Mode::Dev => &self.dev,
            Mode::Build => &self.build,
            Mode::Optimize => &self.optimize,
        }
    }

    pub fn get_mut(&mut self, mode: Mode) -> &mut ResolvedConfig {
        match mode {
            Mode::Dev => &mut self.dev,
            Mode::Build => &mut self.build,
            Mode::Optimize => &mut self.optimize,
        }
    }
}

/// Merges option layers into per-mode views.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    environment: Environment,
    preprocessors: PreprocessorRegistry,
    on_warn: Option<SharedWarningHandler>,
}

impl ConfigResolver {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    pub fn with_preprocessors(mut self, preprocessors: PreprocessorRegistry) -> Self {
        self.preprocessors = preprocessors;
        self
    }

    pub fn with_warning_handler(mut self, handler: SharedWarningHandler) -> Self {
        self.on_warn = Some(handler);
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Resolve `options` on top of the optional configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPreprocessor`] when a preprocessor that
    /// applies to some mode is not registered.
    pub fn resolve(
        &self,
        options: &PluginOptions,
        document: Option<&ConfigDocument>,
    ) -> Result<ResolvedConfigs> {
        let defaults = default_options();
        let mut layers = vec![&defaults];
        if let Some(document) = document {
            layers.push(&document.options);
        }
        layers.push(options);

        let merged = merge_layers(&layers);
        let mut meta = ResolveMeta {
            document: document.map(|d| d.path.clone()),
            ..Default::default()
        };

        let log_level = merged.log_level.unwrap_or_default();
        let extensions = normalize_extensions(
            merged.extensions.clone().unwrap_or_default(),
            log_level,
            &mut meta,
        );
        let on_warn = self.on_warn.clone().unwrap_or_else(|| {
            Arc::new(LogWarningHandler::new(log_level, self.environment.production))
        });
        let hot = merged.hot.as_ref().and_then(HotSetting::to_options);
        let compiler = compiler_flags(&layers);
        let preprocess_refs = merged.preprocess.clone().unwrap_or_default();

        let view = |mode: Mode| -> Result<ResolvedConfig> {
            let mut preprocess = Vec::new();
            for reference in preprocess_refs.iter().filter(|r| r.applies_to(mode)) {
                let preprocessor = self.preprocessors.get(reference.name()).ok_or_else(|| {
                    ConfigError::MissingPreprocessor {
                        name: reference.name().to_string(),
                        mode,
                    }
                })?;
                preprocess.push(NamedPreprocessor {
                    name: reference.name().to_string(),
                    preprocessor: Arc::clone(preprocessor),
                });
            }

            Ok(ResolvedConfig {
                mode,
                root: merged.root.clone(),
                extensions: extensions.clone(),
                include: merged.include.clone().unwrap_or_default(),
                exclude: merged.exclude.clone().unwrap_or_default(),
                preprocess,
                preprocessor_options: merged.preprocessor_options.clone().unwrap_or_default(),
                on_warn: Arc::clone(&on_warn),
                // no dev code outside of the dev server
                hot: if mode == Mode::Dev { hot.clone() } else { None },
                compiler: compiler.clone(),
                use_transform_cache: merged.use_transform_cache.unwrap_or(true),
                transform_cache_size: merged
                    .transform_cache_size
                    .unwrap_or(DEFAULT_TRANSFORM_CACHE_SIZE),
                resolve_absolute_imports_inside_root: merged
                    .resolve_absolute_imports_inside_root
                    .unwrap_or(true),
                log_level,
            })
        };

        let configs = ResolvedConfigs {
            dev: view(Mode::Dev)?,
            build: view(Mode::Build)?,
            optimize: view(Mode::Optimize)?,
            meta,
        };

        debug!(
            target: "svite",
            document = ?configs.meta.document,
            extensions = ?configs.dev.extensions,
            hot = configs.dev.hot_enabled(),
            "resolved svite configuration"
        );

        Ok(configs)
    }
}

/// Shallow "later wins" merge of option layers.
pub fn merge_layers(layers: &[&PluginOptions]) -> PluginOptions {
    let mut merged = PluginOptions::default();
    for layer in layers {
        let layer = (*layer).clone();
        merged.hot = layer.hot.or(merged.hot);
        merged.use_transform_cache = layer.use_transform_cache.or(merged.use_transform_cache);
        merged.transform_cache_size = layer.transform_cache_size.or(merged.transform_cache_size);
        merged.resolve_absolute_imports_inside_root = layer
            .resolve_absolute_imports_inside_root
            .or(merged.resolve_absolute_imports_inside_root);
        merged.extensions = layer.extensions.or(merged.extensions);
        merged.include = layer.include.or(merged.include);
        merged.exclude = layer.exclude.or(merged.exclude);
        merged.root = layer.root.or(merged.root);
        merged.log_level = layer.log_level.or(merged.log_level);
        merged.preprocess = layer.preprocess.or(merged.preprocess);
        merged.preprocessor_options =
            merge_sub_layer(merged.preprocessor_options, layer.preprocessor_options);
        merged.compiler_options = merge_sub_layer(merged.compiler_options, layer.compiler_options);
        merged.passthrough.extend(layer.passthrough);
    }
    merged
}

fn merge_sub_layer(
    base: Option<Map<String, Value>>,
    update: Option<Map<String, Value>>,
) -> Option<Map<String, Value>> {
    match (base, update) {
        (Some(mut base), Some(update)) => {
            base.extend(update);
            Some(base)
        }
        (base, None) => base,
        (None, update) => update,
    }
}

/// Compiler flags, layer by layer in precedence order. Within a layer the
/// `compilerOptions` sub-layer wins over unrecognised top-level keys.
///
/// `hot` is owned by [`ResolvedConfig::hot`] and never kept as a flag.
fn compiler_flags(layers: &[&PluginOptions]) -> Map<String, Value> {
    let mut flags = Map::new();
    for layer in layers {
        flags.extend(layer.passthrough.clone());
        if let Some(options) = &layer.compiler_options {
            flags.extend(options.clone());
        }
    }
    flags.remove(HOT_KEY);
    flags
}

fn normalize_extensions(
    extensions: Vec<String>,
    log_level: LogLevel,
    meta: &mut ResolveMeta,
) -> Vec<String> {
    let (kept, removed): (Vec<String>, Vec<String>) = extensions
        .into_iter()
        .partition(|ext| !UNSUPPORTED_BUILD_EXTENSIONS.contains(&ext.as_str()));

    if log_level.enabled(Level::WARN) {
        for ext in &removed {
            warn!(target: "svite", "build does not support {} extension for svelte, ignoring it", ext);
        }
    }
    meta.removed_extensions = removed;

    if kept.is_empty() {
        return DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect();
    }
    kept
}
