//! Deferred construction of the compiler plugin.
//!
//! A [`PluginHandle`] exists from plugin registration on, but the compiler
//! behind it is only built when the host has finalized its configuration:
//!
//! ```text
//! PluginHandle::new()  ──configure_server──▶  initialize()  ──▶  Ready(CompilerPlugin)
//!        │
//!        └── transform() before that ──▶ Error::NotReady
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use svite_config::{Mode, ResolvedConfig};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::compiler::{CompiledOutput, SharedCompiler, SharedCompilerFactory, Transformer};
use crate::error::{Error, Result, TransformError};
use crate::host::HostConfig;

/// A stable reference to a compiler plugin that may not be built yet.
pub struct PluginHandle {
    name: String,
    mode: Mode,
    factory: SharedCompilerFactory,
    /// Uses tokio::sync::OnceCell so concurrent initializers share one
    /// construction
    delegate: OnceCell<Arc<CompilerPlugin>>,
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl PluginHandle {
    pub fn new(name: impl Into<String>, mode: Mode, factory: SharedCompilerFactory) -> Self {
        Self {
            name: name.into(),
            mode,
            factory,
            delegate: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_ready(&self) -> bool {
        self.delegate.initialized()
    }

    /// Build the compiler plugin unless it already exists.
    ///
    /// Repeated and concurrent calls construct at most once. A failed
    /// construction leaves the handle pending so a later call may retry.
    pub async fn initialize(
        &self,
        config: Arc<ResolvedConfig>,
        host: &HostConfig,
    ) -> Result<Arc<CompilerPlugin>> {
        let mode = self.mode;
        let name = self.name.clone();
        let factory = Arc::clone(&self.factory);

        self.delegate
            .get_or_try_init(|| async move {
                debug!(target: "svite", "constructing {} compiler for {}", mode, host.root.display());
                let compiler = factory
                    .create(&config, host)
                    .await
                    .map_err(|e| Error::Construction {
                        mode,
                        message: format!("{:#}", e),
                    })?;
                Ok::<_, Error>(Arc::new(CompilerPlugin::new(name, compiler, config)))
            })
            .await
            .map(Arc::clone)
    }

    /// The constructed plugin, or [`Error::NotReady`] naming `hook`.
    pub fn delegate(&self, hook: &'static str) -> Result<Arc<CompilerPlugin>> {
        self.delegate.get().cloned().ok_or_else(|| Error::NotReady {
            plugin: self.name.clone(),
            hook,
        })
    }

    /// Compile through the delegate; fails fast while it is not built.
    pub async fn transform(&self, code: &str, id: &str) -> Result<Option<CompiledOutput>> {
        let delegate = self.delegate("transform")?;
        Ok(delegate.transform(code, id).await?)
    }
}

/// A constructed compiler bound to the configuration of its mode.
pub struct CompilerPlugin {
    name: String,
    compiler: SharedCompiler,
    config: Arc<ResolvedConfig>,
}

impl std::fmt::Debug for CompilerPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerPlugin")
            .field("name", &self.name)
            .field("mode", &self.config.mode)
            .finish()
    }
}

impl CompilerPlugin {
    pub fn new(name: impl Into<String>, compiler: SharedCompiler, config: Arc<ResolvedConfig>) -> Self {
        Self {
            name: name.into(),
            compiler,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Whether `id` is a component this plugin compiles.
    ///
    /// The extension is checked without the query string; include and
    /// exclude patterns are checked against the full id.
    pub fn handles(&self, id: &str) -> bool {
        let path = id.split('?').next().unwrap_or(id);
        if !self
            .config
            .extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return false;
        }
        should_process(id, &self.config.include, &self.config.exclude)
    }

    async fn preprocess(&self, code: &str, id: &str) -> std::result::Result<String, TransformError> {
        let mut source = code.to_string();
        for step in &self.config.preprocess {
            let output = step
                .preprocessor
                .preprocess(&source, id, &self.config.preprocessor_options)
                .await
                .map_err(|diagnostic| TransformError::new(id, diagnostic))?;
            if let Some(output) = output {
                debug!(target: "svite", "preprocessed {} with {}", id, step.name);
                source = output;
            }
        }
        Ok(source)
    }
}

#[async_trait]
impl Transformer for CompilerPlugin {
    async fn transform(
        &self,
        code: &str,
        id: &str,
    ) -> std::result::Result<Option<CompiledOutput>, TransformError> {
        if !self.handles(id) {
            return Ok(None);
        }

        let source = self.preprocess(code, id).await?;
        let output = self
            .compiler
            .compile(&source, id, &self.config)
            .await
            .map_err(|diagnostic| TransformError::new(id, diagnostic))?;

        for warning in &output.warnings {
            self.config.on_warn.warn(warning);
        }
        Ok(Some(output))
    }
}

/// Substring include/exclude check; exclusion wins.
pub(crate) fn should_process(id: &str, include: &[String], exclude: &[String]) -> bool {
    if exclude.iter().any(|pattern| id.contains(pattern.as_str())) {
        return false;
    }
    include.is_empty() || include.iter().any(|pattern| id.contains(pattern.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_wins_over_include() {
        let include = vec!["src/".to_string()];
        let exclude = vec!["src/legacy".to_string()];
        assert!(should_process("/p/src/App.svelte", &include, &exclude));
        assert!(!should_process("/p/src/legacy/Old.svelte", &include, &exclude));
        assert!(!should_process("/p/lib/Lib.svelte", &include, &exclude));
    }

    #[test]
    fn empty_patterns_accept_everything() {
        assert!(should_process("/any/thing.svelte", &[], &[]));
    }
}
