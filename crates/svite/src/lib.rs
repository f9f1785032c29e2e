//! Component compiler plugin for a dev server and rolldown builds.
//!
//! The compiler itself is supplied through [`CompilerFactory`]. This crate
//! decides when it is built, with which options, and how its output is
//! cached and served:
//!
//! - [`PluginHandle`] defers compiler construction until the host
//!   configuration is final
//! - [`TransformCache`] keeps compiled modules for the dev server
//! - [`AliasResolver`] maps absolute imports inside the project root to
//!   root-relative ids
//! - [`advise`] computes dependency prebundling lists
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use svite::{HostConfig, Staleness, SvitePlugin};
//! # use svite::{CompilerFactory, SharedCompiler};
//! # use svite_config::ResolvedConfig;
//! # struct Factory;
//! # #[async_trait::async_trait]
//! # impl CompilerFactory for Factory {
//! #     async fn create(&self, _: &ResolvedConfig, _: &HostConfig) -> anyhow::Result<SharedCompiler> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn example() -> svite::Result<()> {
//! let plugin = SvitePlugin::builder(Arc::new(Factory)).build()?;
//! plugin.configure_server(&HostConfig::new("/project")).await?;
//!
//! let output = plugin
//!     .transform("<h1>hi</h1>", "/project/src/App.svelte", false, Staleness::Changed)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod build;
pub mod cache;
pub mod changes;
pub mod compiler;
pub mod error;
pub mod handle;
pub mod host;
pub mod optimize;
pub mod plugin;

#[cfg(feature = "logging")]
pub mod logging;

pub use alias::AliasResolver;
pub use build::{BUILD_PLACEHOLDER, BuildPluginEntry, BuildPluginList, SviteRolldownPlugin};
pub use cache::{Staleness, TransformCache};
pub use changes::ContentChangeDetector;
pub use compiler::{
    CompiledOutput, Compiler, CompilerFactory, SharedCompiler, SharedCompilerFactory, Transformer,
};
pub use error::{Error, Result, TransformError};
pub use handle::{CompilerPlugin, PluginHandle};
pub use host::{HostCommand, HostConfig, OptimizeDeps, ResolverConfig};
pub use optimize::{HMR_DEPS, OptimizationSets, SVELTE_DEPS, advise, base_includes};
pub use plugin::{
    OPTIMIZE_PLUGIN_NAME, PLUGIN_NAME, ServerSetup, Session, SvitePlugin, SvitePluginBuilder,
};

pub use svite_config;
