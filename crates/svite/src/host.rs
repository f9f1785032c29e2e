//! Values exchanged with the bundler host.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the host is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostCommand {
    #[default]
    Serve,
    Build,
}

/// Dependency prebundling lists already present in the host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeDeps {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// The host's runtime configuration, known only once the host has
/// finalized it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub command: HostCommand,
    #[serde(default)]
    pub optimize_deps: OptimizeDeps,
}

impl HostConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            command: HostCommand::Serve,
            optimize_deps: OptimizeDeps::default(),
        }
    }

    pub fn with_command(mut self, command: HostCommand) -> Self {
        self.command = command;
        self
    }

    pub fn with_optimize_deps(mut self, optimize_deps: OptimizeDeps) -> Self {
        self.optimize_deps = optimize_deps;
        self
    }

    pub fn is_serve(&self) -> bool {
        self.command == HostCommand::Serve
    }
}

/// Module resolution settings the host composes into its own resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    pub extensions: Vec<String>,
    pub main_fields: Vec<String>,
    pub conditions: Vec<String>,
    pub dedupe: Vec<String>,
}
