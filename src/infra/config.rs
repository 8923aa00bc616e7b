// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default, rename = "loop")]
    pub convergence: LoopConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Oracle model in "provider/model" form. Auto-detected from env when unset.
    pub oracle: Option<String>,
    /// Override for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
    /// Caller-level retry budget for transient oracle failures (0 = never retry).
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub max_tokens: u32,
    pub document_type: String,
    pub max_document_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            document_type: "specification".into(),
            max_document_chars: 200_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    pub max_tokens: u32,
    /// Claims per oracle call (1 = strictly per-claim).
    pub batch_size: usize,
    /// Maximum oracle calls in flight during one verification stage.
    pub concurrency: usize,
    pub max_context_chars: usize,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            batch_size: 8,
            concurrency: 4,
            max_context_chars: 120_000,
            include: default_include(),
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

fn default_include() -> Vec<String> {
    [
        "**/*.rs", "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.py", "**/*.go",
        "**/*.java", "**/*.kt", "**/*.rb", "**/*.php", "**/*.cs", "**/*.swift", "**/*.c",
        "**/*.h", "**/*.cpp", "**/*.sql", "**/*.toml", "**/*.yaml", "**/*.yml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        "target",
        "node_modules",
        paths::PROJECT_STATE_DIR,
        "dist",
        "build",
        "vendor",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    pub max_iterations: u32,
    /// Compliance score (0-100) at which the loop stops.
    pub target_score: f64,
    pub stop_on_regression: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            target_score: 90.0,
            stop_on_regression: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub max_tokens: u32,
    pub codegen_max_tokens: u32,
    pub max_input_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            codegen_max_tokens: 8192,
            max_input_chars: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
    /// Bearer token required on pipeline routes when set.
    pub token: Option<String>,
    pub requests_per_minute: u32,
    pub monthly_quota: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8787,
            token: None,
            requests_per_minute: 30,
            monthly_quota: None,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage unable to run.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.verify.batch_size == 0 {
            anyhow::bail!("verify.batch_size must be at least 1");
        }
        if self.verify.concurrency == 0 {
            anyhow::bail!("verify.concurrency must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.convergence.target_score) {
            anyhow::bail!("loop.target_score must be within 0-100");
        }
        Ok(())
    }
}
