//! Configuration management for factrag.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults (local-first: Ollama + SQLite)
//! - Config file (`.factrag/config.yaml` in the workspace, or `FACTRAG_CONFIG`)
//! - Environment variables (`FACTRAG_*`, `PORT`)
//! - Command-line flags
//!
//! Values that the pipeline needs (collection, threshold, top-k, dimensions)
//! are read once here and handed to the components at construction; nothing
//! downstream looks configuration up on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .factrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// API key override for every provider that needs one
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub server: ServerConfig,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector: VectorSettings,
    pub retrieval: RetrievalSettings,
    pub store: StoreSettings,
    pub streaming: StreamingSettings,
    pub index: IndexSettings,
}

/// HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(rename = "corsAllowedOrigins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// "ollama" or "openai"
    pub provider: String,

    /// Model identifier; the provider's default when unset
    pub model: Option<String>,

    /// Custom endpoint (provider default when absent)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    /// Configured model, or the default for the selected provider.
    pub fn effective_model(&self) -> &str {
        match self.model.as_deref() {
            Some(model) if !model.trim().is_empty() => model,
            _ => match self.provider.as_str() {
                "openai" => DEFAULT_OPENAI_LLM_MODEL,
                _ => DEFAULT_OLLAMA_LLM_MODEL,
            },
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// "ollama", "openai" or "mock"
    pub provider: String,

    pub model: Option<String>,

    pub endpoint: Option<String>,

    /// Fixed vector dimensionality D shared by the provider and the index;
    /// the provider's default when unset
    pub dimensions: Option<usize>,

    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: String,

    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            endpoint: None,
            dimensions: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn effective_model(&self) -> &str {
        match self.model.as_deref() {
            Some(model) if !model.trim().is_empty() => model,
            _ => match self.provider.as_str() {
                "openai" => DEFAULT_OPENAI_EMBEDDING_MODEL,
                _ => DEFAULT_OLLAMA_EMBEDDING_MODEL,
            },
        }
    }

    pub fn effective_dimensions(&self) -> usize {
        match (self.dimensions, self.provider.as_str()) {
            (Some(dimensions), _) => dimensions,
            (None, "openai") => DEFAULT_OPENAI_EMBEDDING_DIMENSIONS,
            (None, _) => DEFAULT_OLLAMA_EMBEDDING_DIMENSIONS,
        }
    }
}

/// Vector index backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    /// "sqlite", "milvus" or "lancedb"
    pub backend: String,

    /// Collection (table) name
    pub collection: String,

    /// Similarity metric: "ip" (inner product) or "cosine"
    pub metric: String,

    /// Remote endpoint (milvus)
    pub endpoint: Option<String>,

    /// Environment variable holding the backend token (milvus)
    #[serde(rename = "tokenEnv")]
    pub token_env: String,

    /// Local storage path (sqlite / lancedb); relative to the workspace
    pub path: Option<PathBuf>,

    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            collection: "facts".to_string(),
            metric: "ip".to_string(),
            endpoint: None,
            token_env: "MILVUS_TOKEN".to_string(),
            path: None,
            timeout_secs: 10,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of nearest neighbours requested from the index
    #[serde(rename = "topK")]
    pub top_k: usize,

    /// Candidates scoring below this are dropped
    #[serde(rename = "scoreThreshold")]
    pub score_threshold: f32,

    /// What to do when no candidate survives the threshold:
    /// "proceed" (prompt with zero facts) or "no_information"
    #[serde(rename = "emptyContext")]
    pub empty_context: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.3,
            empty_context: "proceed".to_string(),
        }
    }
}

/// Fact store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database path; relative to the workspace
    pub path: Option<PathBuf>,
}

/// Paced streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Delay after each flushed token, in milliseconds
    #[serde(rename = "tokenDelayMs")]
    pub token_delay_ms: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self { token_delay_ms: 50 }
    }
}

/// Document indexing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Maximum characters per chunk when indexing files
    #[serde(rename = "chunkSize")]
    pub chunk_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { chunk_size: 800 }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    vector: Option<VectorSettings>,
    retrieval: Option<RetrievalSettings>,
    store: Option<StoreSettings>,
    streaming: Option<StreamingSettings>,
    index: Option<IndexSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

pub const KNOWN_LLM_PROVIDERS: [&str; 2] = ["ollama", "openai"];
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["ollama", "openai", "mock"];
pub const KNOWN_VECTOR_BACKENDS: [&str; 3] = ["sqlite", "milvus", "lancedb"];

pub const DEFAULT_OLLAMA_LLM_MODEL: &str = "llama3.2";
pub const DEFAULT_OPENAI_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_OLLAMA_EMBEDDING_DIMENSIONS: usize = 768;
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_EMBEDDING_DIMENSIONS: usize = 512;

/// Canonical metric name ("ip" or "cosine") for any accepted spelling.
pub fn canonical_metric(name: &str) -> Option<&'static str> {
    match name.trim().to_lowercase().as_str() {
        "ip" | "inner_product" => Some("ip"),
        "cosine" => Some("cosine"),
        _ => None,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            server: ServerConfig::default(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            vector: VectorSettings::default(),
            retrieval: RetrievalSettings::default(),
            store: StoreSettings::default(),
            streaming: StreamingSettings::default(),
            index: IndexSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `FACTRAG_WORKSPACE`, `FACTRAG_CONFIG`: workspace and config file
    /// - `FACTRAG_HOST`, `PORT`: listen address
    /// - `FACTRAG_LLM_PROVIDER`, `FACTRAG_LLM_MODEL`, `FACTRAG_LLM_ENDPOINT`
    /// - `FACTRAG_EMBEDDING_PROVIDER`, `FACTRAG_EMBEDDING_MODEL`,
    ///   `FACTRAG_EMBEDDING_ENDPOINT`, `FACTRAG_EMBEDDING_DIMENSIONS`
    /// - `FACTRAG_VECTOR_BACKEND`, `FACTRAG_VECTOR_ENDPOINT`, `FACTRAG_COLLECTION`
    /// - `FACTRAG_TOP_K`, `FACTRAG_SCORE_THRESHOLD`
    /// - `FACTRAG_DB_PATH`, `FACTRAG_TOKEN_DELAY_MS`
    /// - `FACTRAG_API_KEY`: API key override
    /// - `RUST_LOG`, `NO_COLOR`
    ///
    /// # Example
    /// ```no_run
    /// use factrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Collection: {}", config.vector.collection);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file given
    /// explicitly (e.g. from CLI flags) taking precedence over the environment.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("FACTRAG_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("FACTRAG_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.factrag_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env()?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.clone().merge(config_file))
    }

    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(server) = file.server {
            self.server = server;
        }
        if let Some(llm) = file.llm {
            self.llm = llm;
        }
        if let Some(embedding) = file.embedding {
            self.embedding = embedding;
        }
        if let Some(vector) = file.vector {
            self.vector = vector;
        }
        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(store) = file.store {
            self.store = store;
        }
        if let Some(streaming) = file.streaming {
            self.streaming = streaming;
        }
        if let Some(index) = file.index {
            self.index = index;
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }
        self
    }

    /// Apply environment variable overrides.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(host) = std::env::var("FACTRAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORT")? {
            self.server.port = port;
        }

        if let Ok(provider) = std::env::var("FACTRAG_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("FACTRAG_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Ok(endpoint) = std::env::var("FACTRAG_LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }

        if let Ok(provider) = std::env::var("FACTRAG_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("FACTRAG_EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }
        if let Ok(endpoint) = std::env::var("FACTRAG_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = Some(endpoint);
        }
        if let Some(dimensions) = env_parse::<usize>("FACTRAG_EMBEDDING_DIMENSIONS")? {
            self.embedding.dimensions = Some(dimensions);
        }

        if let Ok(backend) = std::env::var("FACTRAG_VECTOR_BACKEND") {
            self.vector.backend = backend;
        }
        if let Ok(endpoint) = std::env::var("FACTRAG_VECTOR_ENDPOINT") {
            self.vector.endpoint = Some(endpoint);
        }
        if let Ok(collection) = std::env::var("FACTRAG_COLLECTION") {
            self.vector.collection = collection;
        }

        if let Some(top_k) = env_parse::<usize>("FACTRAG_TOP_K")? {
            self.retrieval.top_k = top_k;
        }
        if let Some(threshold) = env_parse::<f32>("FACTRAG_SCORE_THRESHOLD")? {
            self.retrieval.score_threshold = threshold;
        }

        if let Ok(path) = std::env::var("FACTRAG_DB_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(delay) = env_parse::<u64>("FACTRAG_TOKEN_DELAY_MS")? {
            self.streaming.token_delay_ms = delay;
        }

        self.api_key = std::env::var("FACTRAG_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        llm_provider: Option<String>,
        llm_model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = llm_provider {
            self.llm.provider = provider;
        }

        if let Some(model) = llm_model {
            self.llm.model = Some(model);
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

    /// Get the path to the .factrag directory.
    pub fn factrag_dir(&self) -> PathBuf {
        self.workspace.join(".factrag")
    }

    /// Ensure the .factrag directory exists.
    pub fn ensure_factrag_dir(&self) -> AppResult<()> {
        let dir = self.factrag_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .factrag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved path of the fact store database.
    pub fn store_path(&self) -> PathBuf {
        self.resolve_path(self.store.path.as_deref(), "facts.sqlite")
    }

    /// Resolved local path of the vector index (sqlite file or lancedb directory).
    pub fn vector_path(&self) -> PathBuf {
        let default = match self.vector.backend.as_str() {
            "lancedb" => "lancedb",
            _ => "vectors.sqlite",
        };
        self.resolve_path(self.vector.path.as_deref(), default)
    }

    fn resolve_path(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.workspace.join(path),
            None => self.factrag_dir().join(default_name),
        }
    }

    /// Resolve an API key: `FACTRAG_API_KEY` first, then the named variable.
    pub fn resolve_api_key(&self, api_key_env: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        std::env::var(api_key_env).ok().filter(|k| !k.is_empty())
    }

    /// Validate the configuration before any client is built.
    pub fn validate(&self) -> AppResult<()> {
        check_known("LLM provider", &self.llm.provider, &KNOWN_LLM_PROVIDERS)?;
        check_known(
            "embedding provider",
            &self.embedding.provider,
            &KNOWN_EMBEDDING_PROVIDERS,
        )?;
        check_known("vector backend", &self.vector.backend, &KNOWN_VECTOR_BACKENDS)?;
        if canonical_metric(&self.vector.metric).is_none() {
            return Err(AppError::Config(format!(
                "Unknown metric: {}. Supported: ip, cosine",
                self.vector.metric
            )));
        }
        check_known(
            "emptyContext policy",
            &self.retrieval.empty_context,
            &["proceed", "no_information"],
        )?;

        if self.embedding.effective_dimensions() == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "Retrieval topK must be greater than zero".to_string(),
            ));
        }

        if !self.retrieval.score_threshold.is_finite() {
            return Err(AppError::Config(format!(
                "Retrieval scoreThreshold must be a finite number, got {}",
                self.retrieval.score_threshold
            )));
        }

        if self.vector.collection.trim().is_empty() {
            return Err(AppError::Config(
                "Vector collection name cannot be empty".to_string(),
            ));
        }

        if self.llm.provider == "openai" && self.resolve_api_key(&self.llm.api_key_env).is_none()
        {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.llm.api_key_env
            )));
        }

        if self.embedding.provider == "openai"
            && self.resolve_api_key(&self.embedding.api_key_env).is_none()
        {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.embedding.api_key_env
            )));
        }

        if self.vector.backend == "milvus" && self.vector.endpoint.is_none() {
            return Err(AppError::Config(
                "Milvus backend requires vector.endpoint".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}

fn env_parse<T: FromStr>(name: &str) -> AppResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
