use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use svite_config::{
    CompilerDiagnostic, ConfigDiscovery, ConfigError, ConfigResolver, Environment, LogLevel, Mode,
    PluginOptions, Preprocessor, PreprocessorRegistry, WarningHandler,
};
use tempfile::TempDir;

#[derive(Debug)]
struct Upper;

#[async_trait]
impl Preprocessor for Upper {
    async fn preprocess(
        &self,
        source: &str,
        _id: &str,
        _options: &Map<String, Value>,
    ) -> Result<Option<String>, CompilerDiagnostic> {
        Ok(Some(source.to_uppercase()))
    }
}

#[derive(Debug, Default)]
struct CountingHandler {
    warnings: AtomicUsize,
}

impl WarningHandler for CountingHandler {
    fn warn(&self, _diagnostic: &CompilerDiagnostic) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
    }
}

fn resolver() -> ConfigResolver {
    ConfigResolver::new(Environment::development())
}

#[test]
fn plugin_options_win_over_document() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("svelte.config.json"),
        r#"{ "useTransformCache": false, "extensions": [".svx"], "immutable": true }"#,
    )
    .unwrap();

    let document = ConfigDiscovery::new(dir.path()).load().unwrap();
    let options = PluginOptions::new().with_extensions([".svelte"]);
    let configs = resolver().resolve(&options, document.as_ref()).unwrap();

    assert_eq!(configs.dev.extensions, vec![".svelte"]);
    assert!(!configs.dev.use_transform_cache);
    assert_eq!(configs.dev.compiler_flag("immutable"), Some(&json!(true)));
    assert_eq!(
        configs.meta.document.as_deref(),
        Some(dir.path().join("svelte.config.json").as_path())
    );
}

#[test]
fn compiler_options_merge_one_level_per_layer() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("svelte.config.toml"),
        "[compilerOptions]\naccessors = true\nimmutable = true\n",
    )
    .unwrap();

    let document = ConfigDiscovery::new(dir.path()).load().unwrap();
    let options = PluginOptions::new().with_compiler_option("immutable", false);
    let configs = resolver().resolve(&options, document.as_ref()).unwrap();

    assert_eq!(configs.dev.compiler_flag("accessors"), Some(&json!(true)));
    assert_eq!(configs.dev.compiler_flag("immutable"), Some(&json!(false)));
}

#[test]
fn plugin_top_level_flag_beats_document_compiler_options() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("svelte.config.json"),
        r#"{ "compilerOptions": { "accessors": true, "immutable": true } }"#,
    )
    .unwrap();

    let document = ConfigDiscovery::new(dir.path()).load().unwrap();
    let options = PluginOptions::from_value(json!({ "accessors": false })).unwrap();
    let configs = resolver().resolve(&options, document.as_ref()).unwrap();

    assert_eq!(configs.dev.compiler_flag("accessors"), Some(&json!(false)));
    assert_eq!(configs.dev.compiler_flag("immutable"), Some(&json!(true)));
}

#[test]
fn mutating_dev_view_leaves_other_views_alone() {
    let options = PluginOptions::new()
        .with_compiler_option("accessors", true)
        .with_extensions([".svelte", ".svx"]);
    let mut configs = resolver().resolve(&options, None).unwrap();

    configs.dev.extensions.push(".md".to_string());
    configs.dev.compiler.insert("accessors".to_string(), json!(false));
    configs.dev.include.push("src/".to_string());
    configs.dev.set_option("hot", json!(false));

    for mode in [Mode::Build, Mode::Optimize] {
        let view = configs.get(mode);
        assert_eq!(view.extensions, vec![".svelte", ".svx"]);
        assert_eq!(view.compiler_flag("accessors"), Some(&json!(true)));
        assert!(view.include.is_empty());
    }
}

#[test]
fn preprocessors_resolve_per_mode() {
    let options = PluginOptions::from_value(json!({
        "preprocess": ["upper", { "name": "postcss", "modes": ["build"] }]
    }))
    .unwrap();
    let registry = PreprocessorRegistry::new()
        .with("upper", Arc::new(Upper))
        .with("postcss", Arc::new(Upper));

    let configs = resolver()
        .with_preprocessors(registry)
        .resolve(&options, None)
        .unwrap();

    let names = |mode: Mode| -> Vec<String> {
        configs
            .get(mode)
            .preprocess
            .iter()
            .map(|p| p.name.clone())
            .collect()
    };
    assert_eq!(names(Mode::Dev), vec!["upper"]);
    assert_eq!(names(Mode::Build), vec!["upper", "postcss"]);
    assert_eq!(names(Mode::Optimize), vec!["upper"]);
}

#[test]
fn preprocessor_missing_for_its_mode_fails() {
    let options = PluginOptions::from_value(json!({
        "preprocess": [{ "name": "postcss", "modes": ["build"] }]
    }))
    .unwrap();

    let err = resolver().resolve(&options, None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingPreprocessor { mode: Mode::Build, .. }));
    assert_eq!(err.offending_key().as_deref(), Some("preprocess.postcss"));
}

#[tokio::test]
async fn resolved_preprocessor_is_callable() {
    let options = PluginOptions::from_value(json!({ "preprocess": ["upper"] })).unwrap();
    let configs = resolver()
        .with_preprocessors(PreprocessorRegistry::new().with("upper", Arc::new(Upper)))
        .resolve(&options, None)
        .unwrap();

    let step = &configs.dev.preprocess[0];
    let output = step
        .preprocessor
        .preprocess("<p>hi</p>", "App.svelte", &configs.dev.preprocessor_options)
        .await
        .unwrap();
    assert_eq!(output.as_deref(), Some("<P>HI</P>"));
}

#[test]
fn configured_warning_handler_is_shared_by_views() {
    let handler = Arc::new(CountingHandler::default());
    let configs = resolver()
        .with_warning_handler(handler.clone())
        .resolve(&PluginOptions::default(), None)
        .unwrap();

    configs.dev.on_warn.warn(&CompilerDiagnostic::new("a"));
    configs.build.on_warn.warn(&CompilerDiagnostic::new("b"));
    assert_eq!(handler.warnings.load(Ordering::SeqCst), 2);
}

#[test]
fn log_level_parses_case_insensitively() {
    for (raw, expected) in [
        ("WARN", LogLevel::Warn),
        ("Debug", LogLevel::Debug),
        ("Off", LogLevel::Silent),
        ("warning", LogLevel::Warn),
    ] {
        let options = PluginOptions::from_value(json!({ "logLevel": raw })).unwrap();
        assert_eq!(options.log_level, Some(expected), "{raw}");
    }

    let err = PluginOptions::from_value(json!({ "logLevel": "loud" })).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn malformed_document_fails_resolution() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("svelte.config.json"), "{ \"hot\": ").unwrap();

    let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
    match err {
        ConfigError::Malformed { path, .. } => {
            assert_eq!(path, dir.path().join("svelte.config.json"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
