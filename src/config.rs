//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the path given with `-f`), then applies
//! `SCRIVENER_WORK_DIR` and `SCRIVENER_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Which conversation store backs the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON metadata + Markdown transcript per conversation directory.
    Basic,
    /// Single SQLite database (requires the `isqlite` feature).
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "basic" => Ok(StoreBackend::Basic),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(AppError::Config(format!("unknown store backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Number of most recent messages loaded into each turn.
    pub history_window: usize,
}

#[derive(Debug, Clone)]
pub struct WikipediaConfig {
    /// MediaWiki `api.php` endpoint.
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

/// Tool defaults applied by the executor when building tool inputs.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub write_style: String,
    pub history_last_n: usize,
    pub lookup_max_results: usize,
    pub wikipedia: WikipediaConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            write_style: default_write_style(),
            history_last_n: default_history_last_n(),
            lookup_max_results: default_lookup_max_results(),
            wikipedia: WikipediaConfig {
                api_base_url: default_wikipedia_api_base_url(),
                timeout_seconds: default_wikipedia_timeout_seconds(),
            },
        }
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Directory holding prompt template overrides. Missing files fall back
    /// to the built-in templates.
    pub prompts_dir: PathBuf,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var: `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub store: StoreConfig,
    pub tools: ToolsConfig,
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    tools: RawTools,
}

#[derive(Deserialize)]
struct RawApp {
    #[serde(default = "default_name")]
    name: String,
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_prompts_dir")]
    prompts_dir: String,
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_store_backend")]
    backend: String,
    #[serde(default = "default_history_window")]
    history_window: usize,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { backend: default_store_backend(), history_window: default_history_window() }
    }
}

#[derive(Deserialize)]
struct RawTools {
    #[serde(default = "default_write_style")]
    write_style: String,
    #[serde(default = "default_history_last_n")]
    history_last_n: usize,
    #[serde(default = "default_lookup_max_results")]
    lookup_max_results: usize,
    #[serde(default)]
    wikipedia: RawWikipedia,
}

impl Default for RawTools {
    fn default() -> Self {
        Self {
            write_style: default_write_style(),
            history_last_n: default_history_last_n(),
            lookup_max_results: default_lookup_max_results(),
            wikipedia: RawWikipedia::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawWikipedia {
    #[serde(default = "default_wikipedia_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_wikipedia_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawWikipedia {
    fn default() -> Self {
        Self {
            api_base_url: default_wikipedia_api_base_url(),
            timeout_seconds: default_wikipedia_timeout_seconds(),
        }
    }
}

fn default_name() -> String { "scrivener".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_prompts_dir() -> String { "config/prompts".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_store_backend() -> String { "basic".to_string() }
fn default_history_window() -> usize { 10 }
fn default_write_style() -> String { "professional".to_string() }
fn default_history_last_n() -> usize { 5 }
fn default_lookup_max_results() -> usize { 2 }
fn default_wikipedia_api_base_url() -> String { "https://en.wikipedia.org/w/api.php".to_string() }
fn default_wikipedia_timeout_seconds() -> u64 { 15 }

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("SCRIVENER_WORK_DIR").ok();
    let log_level_override = env::var("SCRIVENER_LOG_LEVEL").ok();
    load_from(
        Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH)),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let app = parsed.app;
    let work_dir = expand_home(work_dir_override.unwrap_or(&app.work_dir));
    let log_level = log_level_override.unwrap_or(&app.log_level).to_string();

    let backend: StoreBackend = parsed.store.backend.parse()?;
    if parsed.store.history_window == 0 {
        return Err(AppError::Config("store.history_window must be at least 1".into()));
    }

    Ok(Config {
        name: app.name,
        work_dir,
        log_level,
        prompts_dir: expand_home(&app.prompts_dir),
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        store: StoreConfig { backend, history_window: parsed.store.history_window },
        tools: ToolsConfig {
            write_style: parsed.tools.write_style,
            history_last_n: parsed.tools.history_last_n,
            lookup_max_results: parsed.tools.lookup_max_results,
            wikipedia: WikipediaConfig {
                api_base_url: parsed.tools.wikipedia.api_base_url,
                timeout_seconds: parsed.tools.wikipedia.timeout_seconds,
            },
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// `Config` for tests: dummy LLM and no API keys.
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            prompts_dir: work_dir.join("prompts"),
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            store: StoreConfig { backend: StoreBackend::Basic, history_window: 10 },
            tools: ToolsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[app]
work_dir = "~/.scrivener"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_applies_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.name, "scrivener");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.store.backend, StoreBackend::Basic);
        assert_eq!(cfg.store.history_window, 10);
        assert_eq!(cfg.tools.write_style, "professional");
        assert_eq!(cfg.tools.history_last_n, 5);
        assert_eq!(cfg.tools.lookup_max_results, 2);
    }

    #[test]
    fn parse_full_config() {
        let f = write_toml(
            r#"
[app]
name = "desk"
work_dir = "/tmp/desk"
log_level = "debug"

[llm]
default = "openai"

[llm.openai]
model = "gpt-4o"
temperature = 0.3

[store]
backend = "sqlite"
history_window = 20

[tools]
write_style = "casual"
lookup_max_results = 3

[tools.wikipedia]
api_base_url = "http://localhost:9000/api.php"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.name, "desk");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "gpt-4o");
        assert_eq!(cfg.llm.openai.timeout_seconds, 60);
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.store.history_window, 20);
        assert_eq!(cfg.tools.write_style, "casual");
        assert_eq!(cfg.tools.lookup_max_results, 3);
        assert_eq!(cfg.tools.wikipedia.api_base_url, "http://localhost:9000/api.php");
    }

    #[test]
    fn unknown_backend_errors() {
        let f = write_toml("[app]\nwork_dir = \"/tmp/x\"\n[store]\nbackend = \"postgres\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn zero_history_window_errors() {
        let f = write_toml("[app]\nwork_dir = \"/tmp/x\"\n[store]\nhistory_window = 0\n");
        assert!(load_from(f.path(), None, None).is_err());
    }

    #[test]
    fn work_dir_and_prompts_dir_expand_tilde() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let f = write_toml("[app]\nwork_dir = \"~/.scrivener\"\nprompts_dir = \"~/prompts\"\n");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.work_dir, home.join(".scrivener"));
        assert_eq!(cfg.prompts_dir, home.join("prompts"));
        assert_eq!(expand_home("relative/dir"), PathBuf::from("relative/dir"));
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!(" sqlite ".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert!("Basic".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn missing_file_errors() {
        let err = load_from(Path::new("/nonexistent/scrivener.toml"), None, None).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/scrivener.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/test-override"), Some("debug")).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/test-override"));
        assert_eq!(cfg.log_level, "debug");
    }
}
