//! Interfaces to the component compiler.
//!
//! The compiler itself is an external collaborator. The session only needs
//! a factory that builds one per mode and a `compile` entry point.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use svite_config::{CompilerDiagnostic, ResolvedConfig};

use crate::error::TransformError;
use crate::host::HostConfig;

/// Result of compiling one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledOutput {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<serde_json::Value>,
    /// Warnings emitted while compiling; already forwarded to the handler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CompilerDiagnostic>,
}

impl CompiledOutput {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_map(mut self, map: serde_json::Value) -> Self {
        self.map = Some(map);
        self
    }

    pub fn with_warning(mut self, warning: CompilerDiagnostic) -> Self {
        self.warnings.push(warning);
        self
    }
}

/// A constructed compiler for one mode.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(
        &self,
        source: &str,
        id: &str,
        config: &ResolvedConfig,
    ) -> Result<CompiledOutput, CompilerDiagnostic>;
}

pub type SharedCompiler = Arc<dyn Compiler>;

/// Builds a compiler once the host configuration is known.
///
/// Construction may be expensive; the session calls it at most once per mode.
#[async_trait]
pub trait CompilerFactory: Send + Sync {
    async fn create(
        &self,
        config: &ResolvedConfig,
        host: &HostConfig,
    ) -> anyhow::Result<SharedCompiler>;
}

pub type SharedCompilerFactory = Arc<dyn CompilerFactory>;

/// Anything that turns a module into compiled output.
///
/// `Ok(None)` means the module is not handled and passes through untouched.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, code: &str, id: &str)
    -> Result<Option<CompiledOutput>, TransformError>;
}
