//! Compilation modes and the process environment they are derived from.

use serde::{Deserialize, Serialize};

/// One of the three configuration views produced per plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Modules compiled on request by the dev server.
    Dev,
    /// Modules compiled into the production build graph.
    Build,
    /// Dependencies compiled by the host's prebundler.
    Optimize,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Dev, Mode::Build, Mode::Optimize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Build => "build",
            Mode::Optimize => "optimize",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the process environment taken once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    pub production: bool,
}

impl Environment {
    pub fn new(production: bool) -> Self {
        Self { production }
    }

    /// Reads `NODE_ENV`; only the exact value `production` counts.
    pub fn from_env() -> Self {
        let production = std::env::var("NODE_ENV")
            .map(|value| value == "production")
            .unwrap_or(false);
        Self { production }
    }

    pub fn production() -> Self {
        Self::new(true)
    }

    pub fn development() -> Self {
        Self::new(false)
    }
}
