//! Configuration types for the pipeline.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{DEFAULT_CLONE_TIMEOUT_SECS, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Hard ceiling on concurrently processed files after scaling.
pub const MAX_SCALED_FILES: usize = 20;

/// Hard ceiling on concurrently in-flight remote calls after scaling.
pub const MAX_SCALED_REMOTE_CALLS: usize = 25;

/// Named concurrency presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPreset {
    /// Small repositories, tight API quotas
    Conservative,
    /// General use
    #[default]
    Balanced,
    /// Large repositories, generous API quotas
    Aggressive,
}

impl ConcurrencyPreset {
    pub const ALL: [ConcurrencyPreset; 3] = [
        ConcurrencyPreset::Conservative,
        ConcurrencyPreset::Balanced,
        ConcurrencyPreset::Aggressive,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConcurrencyPreset::Conservative => "conservative",
            ConcurrencyPreset::Balanced => "balanced",
            ConcurrencyPreset::Aggressive => "aggressive",
        }
    }

    /// Unscaled profile for this preset.
    pub fn base_profile(&self) -> ConcurrencyProfile {
        let (files, calls, delay_ms) = match self {
            ConcurrencyPreset::Conservative => (3, 5, 500),
            ConcurrencyPreset::Balanced => (8, 10, 200),
            ConcurrencyPreset::Aggressive => (15, 20, 100),
        };
        ConcurrencyProfile {
            max_concurrent_files: files,
            max_concurrent_remote_calls: calls,
            base_rate_limit_delay: Duration::from_millis(delay_ms),
        }
    }
}

impl FromStr for ConcurrencyPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset {
                name: s.to_string(),
                available: Self::ALL.map(|p| p.name()).join(", "),
            })
    }
}

impl std::fmt::Display for ConcurrencyPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved parallelism and rate-limit parameters for one batch run.
///
/// Built once per run and passed by reference; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyProfile {
    pub max_concurrent_files: usize,
    pub max_concurrent_remote_calls: usize,
    #[serde(with = "duration_ms")]
    pub base_rate_limit_delay: Duration,
}

impl ConcurrencyProfile {
    /// Scale a preset against the number of files in the batch.
    ///
    /// Tiers: up to 10 files ×1.0, up to 30 ×1.5, up to 80 ×2.0, above ×2.5.
    /// Concurrency is capped at [`MAX_SCALED_FILES`] / [`MAX_SCALED_REMOTE_CALLS`];
    /// a heavy combined load raises the delay floor.
    pub fn scaled(preset: ConcurrencyPreset, file_count: usize) -> Self {
        let base = preset.base_profile();
        let factor = match file_count {
            0..=10 => 1.0,
            11..=30 => 1.5,
            31..=80 => 2.0,
            _ => 2.5,
        };

        let files = ((base.max_concurrent_files as f64 * factor) as usize).clamp(1, MAX_SCALED_FILES);
        let calls = ((base.max_concurrent_remote_calls as f64 * factor) as usize)
            .clamp(1, MAX_SCALED_REMOTE_CALLS);

        let combined = files * calls;
        let delay = if combined > 100 {
            base.base_rate_limit_delay.max(Duration::from_millis(300))
        } else if combined > 50 {
            base.base_rate_limit_delay.max(Duration::from_millis(200))
        } else {
            base.base_rate_limit_delay
        };

        Self {
            max_concurrent_files: files,
            max_concurrent_remote_calls: calls,
            base_rate_limit_delay: delay,
        }
    }

    /// Explicit profile, mostly for tests and embedding callers.
    pub fn fixed(files: usize, calls: usize, delay: Duration) -> Self {
        Self {
            max_concurrent_files: files.max(1),
            max_concurrent_remote_calls: calls.max(1),
            base_rate_limit_delay: delay,
        }
    }
}

/// A remote model together with the chunk budget it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelPreset {
    pub name: &'static str,
    pub model_name: &'static str,
    pub context_window: usize,
    pub max_chunk_tokens: usize,
}

const MODEL_PRESETS: &[ModelPreset] = &[
    ModelPreset {
        name: "gpt-3.5-turbo",
        model_name: "gpt-3.5-turbo",
        context_window: 16_385,
        max_chunk_tokens: 15_000,
    },
    ModelPreset {
        name: "gpt-4o-mini",
        model_name: "gpt-4o-mini",
        context_window: 128_000,
        max_chunk_tokens: 120_000,
    },
    ModelPreset {
        name: "gpt-4o",
        model_name: "gpt-4o",
        context_window: 128_000,
        max_chunk_tokens: 120_000,
    },
];

impl ModelPreset {
    pub fn all() -> &'static [ModelPreset] {
        MODEL_PRESETS
    }

    pub fn get(name: &str) -> Result<ModelPreset, ConfigError> {
        MODEL_PRESETS
            .iter()
            .find(|p| p.name == name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownModel {
                name: name.to_string(),
                available: MODEL_PRESETS
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn default_preset() -> ModelPreset {
        MODEL_PRESETS[1]
    }
}

/// What the batch pipeline produces per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Merge transformed chunks back into one document
    #[default]
    Document,
    /// Aggregate per-chunk relationship analyses into a graph
    Graph,
}

/// Pipeline configuration as read from file and environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrency preset name
    pub preset: String,

    /// Model preset name
    pub model: String,

    /// Overrides the model preset's chunk budget
    pub max_chunk_tokens: Option<usize>,

    /// Per remote call deadline
    pub request_timeout_secs: u64,

    /// Deadline for cloning a remote repository
    pub clone_timeout_secs: u64,

    /// Where merged documents and the report are written
    pub output_dir: PathBuf,

    /// Document or graph surface
    pub mode: PipelineMode,

    /// Base URL of the OpenAI-compatible transformation service
    pub api_base: String,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Instruction sent alongside every chunk
    pub instruction: Option<String>,

    #[serde(skip_serializing)]
    pub github_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preset: ConcurrencyPreset::default().name().to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_chunk_tokens: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            clone_timeout_secs: DEFAULT_CLONE_TIMEOUT_SECS,
            output_dir: PathBuf::from("output"),
            mode: PipelineMode::Document,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            instruction: None,
            github_token: None,
        }
    }
}

impl PipelineConfig {
    /// Default configuration file, read when present.
    pub const DEFAULT_FILE: &'static str = "splicer.toml";

    /// Load configuration: defaults, then the optional file, then `SPLICER_*`
    /// environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_else(|| Path::new(Self::DEFAULT_FILE));
        let settings = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(config::Environment::with_prefix("SPLICER").try_parsing(true))
            .build()?;

        let mut loaded: PipelineConfig = settings.try_deserialize()?;
        if loaded.api_key.is_none() {
            loaded.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if loaded.github_token.is_none() {
            loaded.github_token = std::env::var("GITHUB_TOKEN").ok();
        }
        Ok(loaded)
    }

    pub fn concurrency_preset(&self) -> Result<ConcurrencyPreset, ConfigError> {
        self.preset.parse()
    }

    pub fn model_preset(&self) -> Result<ModelPreset, ConfigError> {
        ModelPreset::get(&self.model)
    }

    /// Token budget per chunk: the explicit override or the model's default.
    pub fn token_budget(&self) -> Result<usize, ConfigError> {
        match self.max_chunk_tokens {
            Some(0) => Err(ConfigError::InvalidBudget(0)),
            Some(budget) => Ok(budget),
            None => Ok(self.model_preset()?.max_chunk_tokens),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
