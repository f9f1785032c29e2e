//! Options whose value is fixed per mode regardless of user input.

use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::Level;

use crate::mode::Mode;
use crate::options::LogLevel;
use crate::resolve::ResolvedConfig;

/// Facts the forced sets are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForcedContext {
    /// `NODE_ENV` is `production`.
    pub production: bool,
    /// Hot reload is enabled for the dev view.
    pub hot: bool,
    /// A dev server is running for this session.
    pub dev_server: bool,
}

impl ForcedContext {
    pub fn new(production: bool, hot: bool, dev_server: bool) -> Self {
        Self {
            production,
            hot,
            dev_server,
        }
    }
}

/// The compiler's development flag for code compiled outside the dev path.
///
/// Dependencies prebundled while a hot-reload dev server is running have to
/// stay compatible with the hot-reload runtime, so they are compiled in
/// development mode even for a production environment.
pub fn derive_dev_flag(ctx: ForcedContext) -> bool {
    (ctx.dev_server && ctx.hot) || !ctx.production
}

/// Keys and the values they are forced to for one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedOptionsSet {
    mode: Mode,
    values: IndexMap<String, Value>,
}

impl ForcedOptionsSet {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The forced set of `mode` under `ctx`.
pub fn forced_options(mode: Mode, ctx: ForcedContext) -> ForcedOptionsSet {
    let mut values = IndexMap::new();
    match mode {
        Mode::Dev => {
            values.insert("css".to_string(), json!(true));
            values.insert("emitCss".to_string(), json!(false));
            if ctx.hot {
                values.insert("dev".to_string(), json!(true));
            }
        }
        Mode::Build => {
            values.insert("css".to_string(), json!(false));
            values.insert("emitCss".to_string(), json!(true));
            values.insert("hot".to_string(), json!(false));
            values.insert("dev".to_string(), json!(derive_dev_flag(ctx)));
        }
        Mode::Optimize => {
            values.insert("css".to_string(), json!(true));
            values.insert("emitCss".to_string(), json!(false));
            values.insert("hot".to_string(), json!(false));
            values.insert("dev".to_string(), json!(derive_dev_flag(ctx)));
        }
    }
    values.insert("format".to_string(), json!("esm"));
    values.insert("generate".to_string(), json!("dom"));
    ForcedOptionsSet { mode, values }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionChange {
    pub key: String,
    pub old: Value,
    pub new: Value,
}

impl OptionChange {
    /// The key had a value before enforcement, as opposed to being unset.
    pub fn is_override(&self) -> bool {
        !self.old.is_null()
    }
}

/// Changes made by one [`enforce`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLog {
    pub mode: Mode,
    pub changes: Vec<OptionChange>,
}

impl ChangeLog {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OptionChange> {
        self.changes.iter()
    }

    pub fn get(&self, key: &str) -> Option<&OptionChange> {
        self.changes.iter().find(|change| change.key == key)
    }

    /// Log the changes: overrides of user values at warn, fills at debug.
    pub fn report(&self, level: LogLevel) {
        for change in &self.changes {
            if change.is_override() {
                if level.enabled(Level::WARN) {
                    tracing::warn!(
                        target: "svite",
                        "forcing {} option {} to {} (was {})",
                        self.mode,
                        change.key,
                        change.new,
                        change.old
                    );
                }
            } else if level.enabled(Level::DEBUG) {
                tracing::debug!(
                    target: "svite",
                    "setting {} option {} to {}",
                    self.mode,
                    change.key,
                    change.new
                );
            }
        }
    }
}

/// Overwrite every key of `forced` in `config`, recording what changed.
///
/// Never fails. A second call with the same set records nothing.
pub fn enforce(config: &mut ResolvedConfig, forced: &ForcedOptionsSet, mode: Mode) -> ChangeLog {
    let mut changes = Vec::new();
    for (key, required) in forced.iter() {
        let current = config.option(key);
        if !same_value(key, &current, required) {
            config.set_option(key, required.clone());
            changes.push(OptionChange {
                key: key.to_string(),
                old: current,
                new: required.clone(),
            });
        }
    }
    ChangeLog { mode, changes }
}

fn same_value(key: &str, current: &Value, required: &Value) -> bool {
    // an unset hot option is the same as hot: false
    if key == "hot" && current.is_null() {
        return required == &Value::Bool(false);
    }
    current == required
}
