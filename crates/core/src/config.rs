//! Configuration management.
//!
//! Configuration is assembled once at process entry from, in increasing
//! precedence:
//! - Built-in defaults
//! - The YAML file (`.grounded/config.yaml` or `--config`)
//! - Environment variables
//! - Command-line flags (see [`AppConfig::with_overrides`])
//!
//! The resulting [`AppConfig`] is passed by reference into every component.
//! Nothing below the CLI reads the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

const CONFIG_DIR: &str = ".grounded";

/// Retrieval knobs for the similarity engine and answer synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Minimum cosine similarity for a chunk to be considered at all
    pub similarity_threshold: f32,
    /// Final number of ranked results
    pub max_results: usize,
    /// Per-document cap applied before global ranking
    pub max_context_chunks: usize,
    /// Characters of each result placed in the grounding prompt
    pub context_chars: usize,
    /// Results used to build citations when the model lists none
    pub fallback_citations: usize,
    /// Snippet length for fallback citations
    pub snippet_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.50,
            max_results: 10,
            max_context_chunks: 4,
            context_chars: 1500,
            fallback_citations: 5,
            snippet_chars: 100,
        }
    }
}

/// Ingestion-time chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding provider selection and backfill pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "openai" or "mock"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Texts longer than this are split into parts before embedding
    pub max_input_chars: usize,
    pub part_overlap: usize,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub transient_backoff_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            max_input_chars: 8000,
            part_overlap: 200,
            batch_size: 10,
            batch_delay_ms: 2000,
            max_attempts: 3,
            rate_limit_backoff_ms: 5000,
            transient_backoff_ms: 3000,
        }
    }
}

impl EmbeddingSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Completion calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationSettings {
    /// "openai" or "mock"
    pub provider: String,
    pub chat_model: String,
    /// Model used to describe attached images; falls back to `chat_model`
    pub vision_model: Option<String>,
    pub temperature: f32,
    pub max_attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub transient_backoff_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: None,
            temperature: 0.3,
            max_attempts: 3,
            rate_limit_backoff_ms: 5000,
            transient_backoff_ms: 3000,
        }
    }
}

impl GenerationSettings {
    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.chat_model)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root; relative paths below resolve against it
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// SQLite corpus database
    pub database_path: PathBuf,

    /// Directory of thread export JSON files
    pub threads_dir: PathBuf,

    /// Directory of front-matter markdown documents
    pub documents_dir: PathBuf,

    /// HTTP listen address for `serve`
    pub bind: String,

    /// API key for the OpenAI-compatible provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Per-request timeout for provider calls
    pub request_timeout_secs: u64,

    /// Forum root used to rebuild thread URLs
    pub forum_base_url: String,

    /// Docs root used when a document carries no URL
    pub docs_base_url: String,

    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit JSON log lines instead of the human format
    pub json_logs: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceSection>,
    paths: Option<PathsSection>,
    server: Option<ServerSection>,
    provider: Option<ProviderSection>,
    urls: Option<UrlsSection>,
    retrieval: Option<RetrievalSettings>,
    chunking: Option<ChunkingSettings>,
    embedding: Option<EmbeddingSettings>,
    generation: Option<GenerationSettings>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PathsSection {
    database: Option<String>,
    threads: Option<String>,
    documents: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServerSection {
    bind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProviderSection {
    #[serde(rename = "apiBase")]
    api_base: Option<String>,
    /// Name of the environment variable holding the key
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
    #[serde(rename = "requestTimeoutSecs")]
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UrlsSection {
    #[serde(rename = "forumBase")]
    forum_base: Option<String>,
    #[serde(rename = "docsBase")]
    docs_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            database_path: PathBuf::from(CONFIG_DIR).join("knowledge_base.db"),
            threads_dir: PathBuf::from("downloaded_threads"),
            documents_dir: PathBuf::from("markdown_files"),
            bind: "127.0.0.1:5000".to_string(),
            api_key: None,
            api_base: "https://aipipe.org/openai/v1".to_string(),
            request_timeout_secs: 60,
            forum_base_url: "https://discourse.onlinedegree.iitm.ac.in".to_string(),
            docs_base_url: "https://docs.onlinedegree.iitm.ac.in".to_string(),
            retrieval: RetrievalSettings::default(),
            chunking: ChunkingSettings::default(),
            embedding: EmbeddingSettings::default(),
            generation: GenerationSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and the environment.
    ///
    /// `workspace` and `config_file` come from the command line (clap already
    /// falls back to `GROUNDED_WORKSPACE` / `GROUNDED_CONFIG`).
    ///
    /// Environment variables:
    /// - `GROUNDED_API_KEY`, then `API_KEY`: provider key
    /// - the variable named by `provider.apiKeyEnv` in YAML, if set
    /// - `GROUNDED_API_BASE`: provider base URL
    /// - `GROUNDED_DATABASE`: corpus database path
    /// - `NO_COLOR`: disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use grounded_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Database: {:?}", config.database_path());
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.grounded_dir().join("config.yaml"),
        };

        let mut api_key_env = None;
        if config_path.exists() {
            let (merged, key_env) = config.merge_yaml(&config_path)?;
            config = merged;
            api_key_env = key_env;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment overrides YAML
        config.api_key = std::env::var("GROUNDED_API_KEY")
            .ok()
            .or_else(|| api_key_env.and_then(|var| std::env::var(var).ok()))
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|key| !key.trim().is_empty());

        if let Ok(api_base) = std::env::var("GROUNDED_API_BASE") {
            config.api_base = api_base;
        }

        if let Ok(database) = std::env::var("GROUNDED_DATABASE") {
            config.database_path = PathBuf::from(database);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    ///
    /// Returns the merged config and the name of the API key variable when the
    /// file declares one.
    fn merge_yaml(self, path: &Path) -> AppResult<(Self, Option<String>)> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self;
        let mut api_key_env = None;

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(paths) = file.paths {
            if let Some(database) = paths.database {
                result.database_path = PathBuf::from(database);
            }
            if let Some(threads) = paths.threads {
                result.threads_dir = PathBuf::from(threads);
            }
            if let Some(documents) = paths.documents {
                result.documents_dir = PathBuf::from(documents);
            }
        }

        if let Some(bind) = file.server.and_then(|s| s.bind) {
            result.bind = bind;
        }

        if let Some(provider) = file.provider {
            if let Some(api_base) = provider.api_base {
                result.api_base = api_base;
            }
            if let Some(timeout) = provider.request_timeout_secs {
                result.request_timeout_secs = timeout;
            }
            api_key_env = provider.api_key_env;
        }

        if let Some(urls) = file.urls {
            if let Some(forum) = urls.forum_base {
                result.forum_base_url = forum;
            }
            if let Some(docs) = urls.docs_base {
                result.docs_base_url = docs;
            }
        }

        if let Some(retrieval) = file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(chunking) = file.chunking {
            result.chunking = chunking;
        }
        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }
        if let Some(generation) = file.generation {
            result.generation = generation;
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok((result, api_key_env))
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over the environment and the YAML file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        database: Option<PathBuf>,
        api_base: Option<String>,
        chat_model: Option<String>,
        provider: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(database) = database {
            self.database_path = database;
        }

        if let Some(api_base) = api_base {
            self.api_base = api_base;
        }

        if let Some(chat_model) = chat_model {
            self.generation.chat_model = chat_model;
        }

        if let Some(provider) = provider {
            self.embedding.provider = provider.clone();
            self.generation.provider = provider;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the `.grounded` directory.
    pub fn grounded_dir(&self) -> PathBuf {
        self.workspace.join(CONFIG_DIR)
    }

    /// Ensure the `.grounded` directory exists.
    pub fn ensure_grounded_dir(&self) -> AppResult<()> {
        let dir = self.grounded_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create {:?} directory: {}", dir, e))
            })?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database_path)
    }

    pub fn threads_dir(&self) -> PathBuf {
        self.resolve(&self.threads_dir)
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.resolve(&self.documents_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate the configuration before any component is built.
    ///
    /// A missing API key is fatal whenever a remote provider is selected.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["openai", "mock"];

        for (role, provider) in [
            ("embedding", self.embedding.provider.as_str()),
            ("generation", self.generation.provider.as_str()),
        ] {
            if !known_providers.contains(&provider) {
                return Err(AppError::Config(format!(
                    "Unknown {} provider: {}. Supported: {}",
                    role,
                    provider,
                    known_providers.join(", ")
                )));
            }

            if provider == "openai" && self.api_key.is_none() {
                return Err(AppError::Config(
                    "API key not set. Export GROUNDED_API_KEY or API_KEY".to_string(),
                ));
            }
        }

        let threshold = self.retrieval.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "similarityThreshold must be within [-1, 1], got {}",
                threshold
            )));
        }

        let sizes = [
            ("maxResults", self.retrieval.max_results),
            ("maxContextChunks", self.retrieval.max_context_chunks),
            ("contextChars", self.retrieval.context_chars),
            ("chunkSize", self.chunking.chunk_size),
            ("maxInputChars", self.embedding.max_input_chars),
            ("batchSize", self.embedding.batch_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.embedding.part_overlap >= self.embedding.max_input_chars {
            return Err(AppError::Config(format!(
                "partOverlap ({}) must be smaller than maxInputChars ({})",
                self.embedding.part_overlap, self.embedding.max_input_chars
            )));
        }

        if self.embedding.max_attempts == 0 || self.generation.max_attempts == 0 {
            return Err(AppError::Config(
                "maxAttempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_key() -> AppConfig {
        AppConfig {
            api_key: Some("sk-test".to_string()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.generation.chat_model, "gpt-4o-mini");
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.retrieval.similarity_threshold, 0.50);
        assert_eq!(config.retrieval.max_results, 10);
        assert_eq!(config.retrieval.max_context_chunks, 4);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.embedding.batch_size, 10);
        assert_eq!(config.bind, "127.0.0.1:5000");
        assert!(!config.verbose);
    }

    #[test]
    fn test_grounded_dir() {
        let config = AppConfig::default();
        assert!(config.grounded_dir().ends_with(".grounded"));
        assert!(config.database_path().starts_with(&config.workspace));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            Some(PathBuf::from("/tmp/corpus.db")),
            Some("http://localhost:8080/v1".to_string()),
            Some("gpt-4o".to_string()),
            Some("mock".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.database_path(), PathBuf::from("/tmp/corpus.db"));
        assert_eq!(overridden.api_base, "http://localhost:8080/v1");
        assert_eq!(overridden.generation.chat_model, "gpt-4o");
        assert_eq!(overridden.generation.vision_model(), "gpt-4o");
        assert_eq!(overridden.embedding.provider, "mock");
        assert_eq!(overridden.generation.provider, "mock");
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_missing_api_key() {
        let config = AppConfig::default();
        match config.validate() {
            Err(AppError::Config(msg)) => assert!(msg.contains("API key")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_mock_provider_needs_no_key() {
        let mut config = AppConfig::default();
        config.embedding.provider = "mock".to_string();
        config.generation.provider = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = config_with_key();
        config.embedding.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlap_must_be_smaller_than_size() {
        let mut config = config_with_key();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = config_with_key();
        config.retrieval.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_yaml_partial_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
paths:
  database: data/corpus.db
provider:
  apiBase: http://localhost:9999/v1
  apiKeyEnv: MY_PROVIDER_KEY
retrieval:
  similarityThreshold: 0.65
  maxResults: 3
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let base = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..AppConfig::default()
        };
        let (merged, key_env) = base.merge_yaml(&path).unwrap();

        assert_eq!(merged.database_path(), temp.path().join("data/corpus.db"));
        assert_eq!(merged.api_base, "http://localhost:9999/v1");
        assert_eq!(key_env.as_deref(), Some("MY_PROVIDER_KEY"));
        assert_eq!(merged.retrieval.similarity_threshold, 0.65);
        assert_eq!(merged.retrieval.max_results, 3);
        // Unset fields keep their defaults
        assert_eq!(merged.retrieval.max_context_chunks, 4);
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
    }

    #[test]
    fn test_load_missing_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("absent.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
