//! Error types for the svite plugin session.

use miette::Diagnostic;
use svite_config::{CompilerDiagnostic, ConfigError, Mode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The compiler rejected a module.
///
/// Cloneable so that every request waiting on the same in-flight compile
/// receives the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to compile {id}: {diagnostic}")]
pub struct TransformError {
    pub id: String,
    pub diagnostic: CompilerDiagnostic,
}

impl TransformError {
    pub fn new(id: impl Into<String>, diagnostic: CompilerDiagnostic) -> Self {
        Self {
            id: id.into(),
            diagnostic,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// Option resolution or the configuration document failed
    #[error(transparent)]
    #[diagnostic(
        code(svite::config),
        help("Fix the option or config document named above; the dev server and build cannot start without it")
    )]
    Config(#[from] ConfigError),

    /// A hook that needs the compiler ran before `configure_server`
    #[error("{plugin}: {hook} called before the compiler was constructed")]
    #[diagnostic(
        code(svite::not_ready),
        help("The host must call configure_server before it requests transforms")
    )]
    NotReady { plugin: String, hook: &'static str },

    #[error(transparent)]
    #[diagnostic(code(svite::transform))]
    Transform(#[from] TransformError),

    /// The compiler factory failed
    #[error("failed to construct the {mode} compiler: {message}")]
    #[diagnostic(code(svite::construction))]
    Construction { mode: Mode, message: String },

    #[error("no placeholder named '{name}' in the build plugin list")]
    #[diagnostic(code(svite::placeholder_not_found))]
    PlaceholderNotFound { name: String },

    #[error("build plugin list still contains the placeholder '{name}'")]
    #[diagnostic(
        code(svite::unresolved_placeholder),
        help("Call resolve_build_plugins before handing the plugin list to rolldown")
    )]
    UnresolvedPlaceholder { name: String },
}
