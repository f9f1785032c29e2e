//! Preprocessors run on component source before it reaches the compiler.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::warning::CompilerDiagnostic;

/// A source-to-source step applied before compilation, e.g. TypeScript
/// stripping or PostCSS.
#[async_trait]
pub trait Preprocessor: Send + Sync + fmt::Debug {
    /// Returns `Ok(None)` when the source is left untouched.
    async fn preprocess(
        &self,
        source: &str,
        id: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<String>, CompilerDiagnostic>;
}

pub type SharedPreprocessor = Arc<dyn Preprocessor>;

/// Preprocessor implementations addressable by name from option layers.
#[derive(Debug, Clone, Default)]
pub struct PreprocessorRegistry {
    entries: IndexMap<String, SharedPreprocessor>,
}

impl PreprocessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, preprocessor: SharedPreprocessor) {
        self.entries.insert(name.into(), preprocessor);
    }

    pub fn with(mut self, name: impl Into<String>, preprocessor: SharedPreprocessor) -> Self {
        self.register(name, preprocessor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SharedPreprocessor> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A preprocessor bound to the name it was configured under.
#[derive(Clone)]
pub struct NamedPreprocessor {
    pub name: String,
    pub preprocessor: SharedPreprocessor,
}

impl fmt::Debug for NamedPreprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedPreprocessor").field(&self.name).finish()
    }
}
