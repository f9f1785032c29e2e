//! Configuration for the svite component compiler plugin.
//!
//! Option layers (defaults, a configuration document, caller options) are
//! merged into three mode views by [`ConfigResolver`]; [`enforce`] then pins
//! the options each mode cannot do without.

pub mod document;
pub mod error;
pub mod forced;
pub mod mode;
pub mod options;
pub mod preprocess;
pub mod resolve;
pub mod warning;

pub use document::{ConfigDiscovery, ConfigDocument, load_document};
pub use error::{ConfigError, Result};
pub use forced::{
    ChangeLog, ForcedContext, ForcedOptionsSet, OptionChange, derive_dev_flag, enforce,
    forced_options,
};
pub use mode::{Environment, Mode};
pub use options::{HotOptions, HotSetting, LogLevel, PluginOptions, PreprocessorRef};
pub use preprocess::{NamedPreprocessor, Preprocessor, PreprocessorRegistry, SharedPreprocessor};
pub use resolve::{
    ConfigResolver, DEFAULT_EXTENSIONS, DEFAULT_TRANSFORM_CACHE_SIZE, ResolveMeta, ResolvedConfig,
    ResolvedConfigs, default_options, merge_layers,
};
pub use warning::{
    CSS_UNUSED_SELECTOR, CompilerDiagnostic, Location, LogWarningHandler, SharedWarningHandler,
    WarningHandler,
};
