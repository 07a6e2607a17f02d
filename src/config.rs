//! Configuration for the ingestion core: embedding/LLM endpoints, chunking
//! parameters, and video tool paths. Loaded once from `~/.ingestcore/config.toml`
//! (falling back to defaults if absent) and held behind a hot-swappable
//! handle by the Document Manager so an admin update never requires a
//! restart.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_embedding_batch_cap")]
    pub batch_cap: usize,
    /// Vector width the remote model returns; the vector store's Arrow
    /// schema is fixed-width, so this must match the configured model.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_batch_cap() -> usize {
    256
}

fn default_embedding_dimensions() -> usize {
    768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            api_key: None,
            model: "text-embedding-default".to_string(),
            batch_cap: default_embedding_batch_cap(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8082".to_string(),
            api_key: None,
            model: "chat-default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::chunker::DEFAULT_CHUNK_SIZE,
            overlap: crate::chunker::DEFAULT_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub audio_extractor_path: String,
    #[serde(default)]
    pub asr_binary_path: String,
    #[serde(default)]
    pub asr_model_path: String,
    #[serde(default)]
    pub keyframe_extractor_path: String,
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval_secs: u32,
    #[serde(default)]
    pub ocr_enabled: bool,
    #[serde(default = "default_ocr_max_frames")]
    pub ocr_max_frames: usize,
}

fn default_keyframe_interval() -> u32 {
    10
}

fn default_ocr_max_frames() -> usize {
    20
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            audio_extractor_path: String::new(),
            asr_binary_path: String::new(),
            asr_model_path: String::new(),
            keyframe_extractor_path: String::new(),
            keyframe_interval_secs: default_keyframe_interval(),
            ocr_enabled: false,
            ocr_max_frames: default_ocr_max_frames(),
        }
    }
}

impl VideoConfig {
    /// Both external tool paths empty means video ingestion degrades to the
    /// filename-only fallback chunk.
    pub fn is_configured(&self) -> bool {
        !self.audio_extractor_path.is_empty() || !self.asr_binary_path.is_empty()
            || !self.keyframe_extractor_path.is_empty()
    }

    /// Clamped per the video parser's contract: `[1, 300]` seconds.
    pub fn clamped_keyframe_interval(&self) -> u32 {
        self.keyframe_interval_secs.clamp(1, 300)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir_field")]
    pub data_dir: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub default_product_id: String,
}

fn default_data_dir_field() -> String {
    data_dir().map(|p| p.to_string_lossy().to_string()).unwrap_or_else(|_| "./data".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_field(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            chunking: ChunkingConfig::default(),
            video: VideoConfig::default(),
            default_product_id: String::new(),
        }
    }
}

impl Config {
    /// Path to the config file: `~/.ingestcore/config.toml`.
    pub fn path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".ingestcore").join("config.toml"))
    }

    /// Loads the config from disk, falling back to defaults if the file
    /// does not exist. A malformed file is a hard error — unlike a missing
    /// file, it indicates the operator's intent was not honored.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context("failed to read config file")?;
        let config: Config = toml::from_str(&content).context("failed to parse config file")?;
        Ok(config)
    }

    /// Saves the config to disk, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&path, content).context("failed to write config file")?;
        Ok(())
    }
}

/// Default data directory: `~/.ingestcore/data`.
pub fn data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".ingestcore").join("data"))
}
