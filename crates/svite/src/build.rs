//! Build-graph integration through rolldown plugins.
//!
//! At registration time the build compiler does not exist yet, so the plugin
//! list carries a named placeholder. Once the host configuration is final,
//! the placeholder is swapped for a [`SviteRolldownPlugin`] wrapping the
//! constructed compiler.

use std::borrow::Cow;
use std::sync::Arc;

use rolldown_common::ModuleType;
use rolldown_plugin::__inner::SharedPluginable;
use rolldown_plugin::{
    HookTransformArgs, HookTransformOutput, HookTransformReturn, HookUsage, Plugin,
    SharedTransformPluginContext,
};
use tracing::debug;

use crate::compiler::{CompiledOutput, Transformer};
use crate::error::{Error, Result, TransformError};
use crate::handle::CompilerPlugin;

/// Name of the placeholder replaced by the build compiler plugin.
pub const BUILD_PLACEHOLDER: &str = "svite:build";

pub enum BuildPluginEntry {
    Placeholder { name: String },
    Ready(SharedPluginable),
}

impl std::fmt::Debug for BuildPluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildPluginEntry::Placeholder { name } => {
                f.debug_struct("Placeholder").field("name", name).finish()
            }
            BuildPluginEntry::Ready(_) => f.write_str("Ready(..)"),
        }
    }
}

/// Ordered plugin list for the build graph.
#[derive(Debug, Default)]
pub struct BuildPluginList {
    entries: Vec<BuildPluginEntry>,
}

impl BuildPluginList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_placeholder(&mut self, name: impl Into<String>) {
        self.entries
            .push(BuildPluginEntry::Placeholder { name: name.into() });
    }

    /// Append a plugin supplied by the host.
    pub fn push(&mut self, plugin: SharedPluginable) {
        self.entries.push(BuildPluginEntry::Ready(plugin));
    }

    pub fn entries(&self) -> &[BuildPluginEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            BuildPluginEntry::Placeholder { name } => Some(name.as_str()),
            BuildPluginEntry::Ready(_) => None,
        })
    }

    /// Put `plugin` where the placeholder called `name` is.
    pub fn replace_placeholder(&mut self, name: &str, plugin: SharedPluginable) -> Result<()> {
        let slot = self
            .entries
            .iter_mut()
            .find(|entry| matches!(entry, BuildPluginEntry::Placeholder { name: n } if n == name))
            .ok_or_else(|| Error::PlaceholderNotFound {
                name: name.to_string(),
            })?;
        *slot = BuildPluginEntry::Ready(plugin);
        Ok(())
    }

    /// The plugins in order; fails while any placeholder is left.
    pub fn into_rolldown_plugins(self) -> Result<Vec<SharedPluginable>> {
        self.entries
            .into_iter()
            .map(|entry| match entry {
                BuildPluginEntry::Ready(plugin) => Ok(plugin),
                BuildPluginEntry::Placeholder { name } => Err(Error::UnresolvedPlaceholder { name }),
            })
            .collect()
    }
}

/// Rolldown plugin compiling components with a constructed compiler.
#[derive(Debug, Clone)]
pub struct SviteRolldownPlugin {
    name: String,
    plugin: Arc<CompilerPlugin>,
}

impl SviteRolldownPlugin {
    pub fn new(name: impl Into<String>, plugin: Arc<CompilerPlugin>) -> Self {
        Self {
            name: name.into(),
            plugin,
        }
    }

    pub fn compiler_plugin(&self) -> &CompilerPlugin {
        &self.plugin
    }

    /// What the `transform` hook does, without a rolldown context.
    pub async fn transform_module(
        &self,
        code: &str,
        id: &str,
    ) -> std::result::Result<Option<CompiledOutput>, TransformError> {
        self.plugin.transform(code, id).await
    }

    pub fn into_shared(self) -> SharedPluginable {
        Arc::new(self)
    }
}

impl Plugin for SviteRolldownPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.name.clone())
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::Transform
    }

    /// Compiles matching components to JavaScript.
    ///
    /// - `Ok(Some(output))` - the module was compiled
    /// - `Ok(None)` - not a component handled by this plugin
    /// - `Err(e)` - the compiler rejected the module
    fn transform(
        &self,
        _ctx: SharedTransformPluginContext,
        args: &HookTransformArgs<'_>,
    ) -> impl std::future::Future<Output = HookTransformReturn> + Send {
        let id = args.id.to_string();
        let code = args.code.to_string();
        let plugin = Arc::clone(&self.plugin);

        async move {
            let Some(output) = plugin.transform(&code, &id).await? else {
                return Ok(None);
            };
            debug!(target: "svite", "[{}] compiled {}", plugin.name(), id);

            Ok(Some(HookTransformOutput {
                code: Some(output.code),
                map: None,
                side_effects: None,
                module_type: Some(ModuleType::Js),
            }))
        }
    }
}
