//! The plugin instance and the host hooks it exposes.
//!
//! ```text
//! SvitePlugin::builder(factory).build()      resolve options into dev/build/optimize
//!        │
//!        ├── configure_server(host)          enforce forced options, construct compilers,
//!        │                                   compute prebundling advice
//!        ├── transform(code, id, ..)         dev path, through the transform cache
//!        ├── resolve_id(path)                root-relative aliases
//!        └── build_plugins() / resolve_build_plugins(list, host)
//! ```
//!
//! Everything a session needs (configuration views, cache, alias memo) is
//! owned by the plugin instance; two instances in one process share nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use svite_config::{
    ChangeLog, ConfigDiscovery, ConfigDocument, ConfigError, ConfigResolver, Environment,
    ForcedContext, Mode, PluginOptions, PreprocessorRegistry, ResolvedConfig, ResolvedConfigs,
    SharedWarningHandler, enforce, forced_options,
};
use tokio::sync::OnceCell;
use tracing::{Level, debug, info};

use crate::alias::AliasResolver;
use crate::build::{BUILD_PLACEHOLDER, BuildPluginList, SviteRolldownPlugin};
use crate::cache::{Staleness, TransformCache};
use crate::changes::ContentChangeDetector;
use crate::compiler::{CompiledOutput, SharedCompilerFactory};
use crate::error::Result;
use crate::handle::PluginHandle;
use crate::host::{HostConfig, ResolverConfig};
use crate::optimize::{OptimizationSets, SVELTE_DEPS, advise, base_includes};

pub const PLUGIN_NAME: &str = "svite";
pub const OPTIMIZE_PLUGIN_NAME: &str = "svite:optimize";

/// Field and condition the component framework publishes its sources under.
const SVELTE_FIELD: &str = "svelte";

/// Builder for [`SvitePlugin`].
pub struct SvitePluginBuilder {
    factory: SharedCompilerFactory,
    options: PluginOptions,
    preprocessors: PreprocessorRegistry,
    on_warn: Option<SharedWarningHandler>,
    environment: Option<Environment>,
    config_root: Option<PathBuf>,
    document: Option<ConfigDocument>,
    discover: bool,
}

impl SvitePluginBuilder {
    pub fn options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }

    pub fn preprocessors(mut self, preprocessors: PreprocessorRegistry) -> Self {
        self.preprocessors = preprocessors;
        self
    }

    pub fn warning_handler(mut self, handler: SharedWarningHandler) -> Self {
        self.on_warn = Some(handler);
        self
    }

    /// Use `environment` instead of reading `NODE_ENV`.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Directory searched for the configuration document.
    pub fn config_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config_root = Some(root.into());
        self
    }

    /// Use `document` and skip discovery.
    pub fn document(mut self, document: ConfigDocument) -> Self {
        self.document = Some(document);
        self
    }

    /// Skip configuration document discovery.
    pub fn without_document(mut self) -> Self {
        self.discover = false;
        self
    }

    /// Resolve the options.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::Config`] when the configuration document is
    /// malformed or a required preprocessor is not registered.
    pub fn build(self) -> Result<SvitePlugin> {
        let environment = self.environment.unwrap_or_else(Environment::from_env);

        let document = match self.document {
            Some(document) => Some(document),
            None if self.discover => {
                let root = match self.config_root.or_else(|| self.options.root.clone()) {
                    Some(root) => root,
                    None => std::env::current_dir().map_err(ConfigError::from)?,
                };
                ConfigDiscovery::new(root).load()?
            }
            None => None,
        };

        let mut resolver = ConfigResolver::new(environment).with_preprocessors(self.preprocessors);
        if let Some(handler) = self.on_warn {
            resolver = resolver.with_warning_handler(handler);
        }
        let configs = resolver.resolve(&self.options, document.as_ref())?;

        if let Some(path) = &configs.meta.document {
            debug!(target: "svite", "loaded config document {}", path.display());
        }

        Ok(SvitePlugin {
            environment,
            dev: PluginHandle::new(PLUGIN_NAME, Mode::Dev, Arc::clone(&self.factory)),
            build: PluginHandle::new(PLUGIN_NAME, Mode::Build, Arc::clone(&self.factory)),
            optimize: PluginHandle::new(OPTIMIZE_PLUGIN_NAME, Mode::Optimize, self.factory),
            configs,
            session: OnceCell::new(),
            changes: ContentChangeDetector::new(),
        })
    }
}

/// State that exists once the host configuration is known.
#[derive(Debug)]
pub struct Session {
    host: HostConfig,
    dev: Arc<ResolvedConfig>,
    build: Arc<ResolvedConfig>,
    optimize: Arc<ResolvedConfig>,
    change_logs: Vec<ChangeLog>,
    cache: TransformCache,
    aliases: AliasResolver,
    optimization: OptimizationSets,
}

impl Session {
    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    /// The enforced configuration of `mode`.
    pub fn config(&self, mode: Mode) -> &Arc<ResolvedConfig> {
        match mode {
            Mode::Dev => &self.dev,
            Mode::Build => &self.build,
            Mode::Optimize => &self.optimize,
        }
    }

    pub fn change_logs(&self) -> &[ChangeLog] {
        &self.change_logs
    }

    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    pub fn optimization(&self) -> &OptimizationSets {
        &self.optimization
    }
}

/// What `configure_server` hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSetup {
    pub optimize_deps: OptimizationSets,
    pub resolver: ResolverConfig,
}

/// One plugin instance, owning its whole session.
pub struct SvitePlugin {
    environment: Environment,
    configs: ResolvedConfigs,
    dev: PluginHandle,
    build: PluginHandle,
    optimize: PluginHandle,
    session: OnceCell<Arc<Session>>,
    changes: ContentChangeDetector,
}

impl std::fmt::Debug for SvitePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvitePlugin")
            .field("environment", &self.environment)
            .field("dev", &self.dev)
            .field("build", &self.build)
            .field("optimize", &self.optimize)
            .field("configured", &self.session.initialized())
            .finish()
    }
}

impl SvitePlugin {
    pub fn builder(factory: SharedCompilerFactory) -> SvitePluginBuilder {
        SvitePluginBuilder {
            factory,
            options: PluginOptions::default(),
            preprocessors: PreprocessorRegistry::default(),
            on_warn: None,
            environment: None,
            config_root: None,
            document: None,
            discover: true,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// The resolved views before forced options are applied.
    pub fn configs(&self) -> &ResolvedConfigs {
        &self.configs
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.get()
    }

    pub fn handle(&self, mode: Mode) -> &PluginHandle {
        match mode {
            Mode::Dev => &self.dev,
            Mode::Build => &self.build,
            Mode::Optimize => &self.optimize,
        }
    }

    /// Host hook: the host configuration is final.
    ///
    /// Enforces the forced options, constructs the dev compiler when serving
    /// and the optimize compiler, and computes the prebundling lists.
    /// Repeated calls reuse the first session.
    pub async fn configure_server(&self, host: &HostConfig) -> Result<ServerSetup> {
        let session = self.prepare(host).await?;

        if session.host.is_serve() {
            self.dev.initialize(Arc::clone(&session.dev), &session.host).await?;
        }
        self.optimize
            .initialize(Arc::clone(&session.optimize), &session.host)
            .await?;

        Ok(ServerSetup {
            optimize_deps: session.optimization.clone(),
            resolver: self.resolver_config(),
        })
    }

    /// Host hook: compile a module for the dev server.
    ///
    /// Build requests and modules the plugin does not handle yield `None`.
    /// Fails with [`crate::Error::NotReady`] before `configure_server`.
    pub async fn transform(
        &self,
        code: &str,
        id: &str,
        is_build: bool,
        staleness: Staleness,
    ) -> Result<Option<Arc<CompiledOutput>>> {
        if is_build {
            return Ok(None);
        }

        let delegate = self.dev.delegate("transform")?;
        if !delegate.handles(id) {
            return Ok(None);
        }
        let session = self.ready_session("transform")?;

        Ok(session.cache.get(&*delegate, id, code, staleness).await?)
    }

    /// [`transform`](Self::transform) with the staleness signal derived from
    /// a content hash, for hosts without file-change detection.
    pub async fn transform_detecting_changes(
        &self,
        code: &str,
        id: &str,
        is_build: bool,
    ) -> Result<Option<Arc<CompiledOutput>>> {
        let staleness = self.changes.check(id, code);
        self.transform(code, id, is_build, staleness).await
    }

    /// Watcher notification: the next request for `id` compiles again.
    pub fn file_changed(&self, id: &str) {
        self.changes.invalidate(id);
    }

    /// Host hook: alias for an absolute import, if it has one.
    pub async fn resolve_id(&self, path: impl AsRef<Path>) -> Option<String> {
        let session = self.session.get()?;
        session.aliases.resolve(path).await
    }

    /// Host hook: plugin list for the build graph, with a placeholder for the
    /// build compiler.
    pub fn build_plugins(&self) -> BuildPluginList {
        let mut list = BuildPluginList::new();
        list.push_placeholder(BUILD_PLACEHOLDER);
        list
    }

    /// Construct the build compiler and put it in place of the placeholder.
    pub async fn resolve_build_plugins(
        &self,
        list: &mut BuildPluginList,
        host: &HostConfig,
    ) -> Result<()> {
        let session = self.prepare(host).await?;
        let plugin = self
            .build
            .initialize(Arc::clone(&session.build), &session.host)
            .await?;
        list.replace_placeholder(
            BUILD_PLACEHOLDER,
            SviteRolldownPlugin::new(PLUGIN_NAME, plugin).into_shared(),
        )
    }

    /// The optimize compiler as a rolldown plugin for the prebundler.
    pub fn optimize_plugin(&self) -> Result<SviteRolldownPlugin> {
        let plugin = self.optimize.delegate("optimize_plugin")?;
        Ok(SviteRolldownPlugin::new(OPTIMIZE_PLUGIN_NAME, plugin))
    }

    /// Resolution settings for the host to compose into its resolver.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            extensions: self.configs.dev.extensions.clone(),
            main_fields: vec![SVELTE_FIELD.to_string()],
            conditions: vec![SVELTE_FIELD.to_string()],
            dedupe: SVELTE_DEPS.iter().map(|dep| dep.to_string()).collect(),
        }
    }

    fn ready_session(&self, hook: &'static str) -> Result<&Arc<Session>> {
        self.session.get().ok_or_else(|| crate::Error::NotReady {
            plugin: PLUGIN_NAME.to_string(),
            hook,
        })
    }

    async fn prepare(&self, host: &HostConfig) -> Result<Arc<Session>> {
        self.session
            .get_or_try_init(|| async move {
                Ok::<_, crate::Error>(Arc::new(self.create_session(host)))
            })
            .await
            .map(Arc::clone)
    }

    fn create_session(&self, host: &HostConfig) -> Session {
        let mut configs = self.configs.clone();
        let serving = host.is_serve();
        let ctx = ForcedContext::new(self.environment.production, configs.dev.hot_enabled(), serving);

        let mut change_logs = Vec::with_capacity(Mode::ALL.len());
        for mode in Mode::ALL {
            let forced = forced_options(mode, ctx);
            let view = configs.get_mut(mode);
            let log = enforce(view, &forced, mode);
            log.report(view.log_level);
            change_logs.push(log);
        }

        let root = match &configs.dev.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => host.root.join(root),
            None => host.root.clone(),
        };
        let aliases = AliasResolver::new(
            Some(&root),
            configs.dev.resolve_absolute_imports_inside_root,
        );
        let cache = TransformCache::from_config(&configs.dev);
        let optimization = advise(
            &base_includes(),
            serving && configs.dev.hot_enabled(),
            &host.optimize_deps,
        );
        optimization.report(configs.dev.log_level);

        if configs.dev.log_level.enabled(Level::INFO) {
            info!(
                target: "svite",
                command = ?host.command,
                root = %root.display(),
                hot = serving && configs.dev.hot_enabled(),
                cache = cache.is_enabled(),
                "svite session ready"
            );
        }

        Session {
            host: host.clone(),
            dev: Arc::new(configs.dev),
            build: Arc::new(configs.build),
            optimize: Arc::new(configs.optimize),
            change_logs,
            cache,
            aliases,
            optimization,
        }
    }
}
