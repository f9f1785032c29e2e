//! Dependency prebundling advice for the host.

use indexmap::IndexSet;
use svite_config::LogLevel;
use tracing::{Level, warn};

use crate::host::OptimizeDeps;

/// Runtime modules of the component framework, always prebundled.
pub const SVELTE_DEPS: [&str; 7] = [
    "svelte",
    "svelte/animate",
    "svelte/easing",
    "svelte/internal",
    "svelte/motion",
    "svelte/store",
    "svelte/transition",
];

/// Hot-reload runtime modules, prebundled while hot reload is active.
pub const HMR_DEPS: [&str; 3] = [
    "svelte-hmr",
    "svelte-hmr/runtime/esm",
    "svelte-hmr/runtime/proxy-adapter-dom",
];

/// Include and exclude lists handed to the host's prebundler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationSets {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Identifiers dropped from `include` because they are also excluded.
    pub conflicts: Vec<String>,
}

impl OptimizationSets {
    /// Log identifiers dropped from `include`, gated by the session level.
    pub fn report(&self, level: LogLevel) {
        if !self.conflicts.is_empty() && level.enabled(Level::WARN) {
            warn!(
                target: "svite",
                "excluding {} from dependency prebundling, also listed in optimizeDeps.exclude",
                self.conflicts.join(", ")
            );
        }
    }
}

/// The framework runtime modules as an owned base set.
pub fn base_includes() -> Vec<String> {
    SVELTE_DEPS.iter().map(|dep| dep.to_string()).collect()
}

/// Merge `base` with the host lists, de-duplicated in first-seen order.
///
/// An identifier that is both included and excluded is only excluded.
pub fn advise(base: &[String], hot: bool, host: &OptimizeDeps) -> OptimizationSets {
    let mut include: IndexSet<String> = base.iter().cloned().collect();
    if hot {
        include.extend(HMR_DEPS.iter().map(|dep| dep.to_string()));
    }
    include.extend(host.include.iter().cloned());

    let exclude: IndexSet<String> = host.exclude.iter().cloned().collect();

    let mut conflicts = Vec::new();
    include.retain(|dep| {
        if exclude.contains(dep) {
            conflicts.push(dep.clone());
            false
        } else {
            true
        }
    });

    OptimizationSets {
        include: include.into_iter().collect(),
        exclude: exclude.into_iter().collect(),
        conflicts,
    }
}
