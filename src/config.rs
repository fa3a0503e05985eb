use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the cartoonizer service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Artifact storage layout
    pub storage: StorageConfig,

    /// Frame codec settings
    pub codec: CodecConfig,

    /// Pipeline behaviour settings
    pub pipeline: PipelineConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum accepted request body in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory that holds every artifact kind
    pub data_root: PathBuf,

    /// Raw uploaded videos, one file per id
    pub uploads_dir: String,

    /// Extracted frames, one directory per id
    pub frames_dir: String,

    /// Styled frames, `{id}/{style}` directories
    pub styled_frames_dir: String,

    /// Assembled output videos, `{id}/{style}.mp4`
    pub styled_videos_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Output frame rate for assembled videos
    pub fps: u32,

    /// Video encoder passed to ffmpeg
    pub video_codec: String,

    /// JPEG quality for extracted and styled frames (1-100)
    pub jpeg_quality: u8,

    /// ffmpeg binary
    pub ffmpeg_bin: String,

    /// ffprobe binary
    pub ffprobe_bin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Remove the whole namespace when a full pipeline run fails midway
    pub cleanup_on_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Worker threads for CPU-bound image work
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
}

impl StorageConfig {
    pub fn uploads_root(&self) -> PathBuf {
        self.data_root.join(&self.uploads_dir)
    }

    pub fn frames_root(&self) -> PathBuf {
        self.data_root.join(&self.frames_dir)
    }

    pub fn styled_frames_root(&self) -> PathBuf {
        self.data_root.join(&self.styled_frames_dir)
    }

    pub fn styled_videos_root(&self) -> PathBuf {
        self.data_root.join(&self.styled_videos_dir)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        // Try to load from various locations
        let config_paths = [
            "cartoonizer.toml",
            "config/cartoonizer.toml",
            "/etc/cartoonizer/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to defaults plus environment overrides
        Self::from_env()
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Cannot parse config {}: {}", path.display(), e))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CARTOONIZER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("CARTOONIZER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| anyhow!("CARTOONIZER_PORT is not a valid port: {}", port))?;
        }

        if let Ok(data_root) = std::env::var("CARTOONIZER_DATA_ROOT") {
            config.storage.data_root = PathBuf::from(data_root);
        }

        if let Ok(fps) = std::env::var("CARTOONIZER_FPS") {
            config.codec.fps = fps.parse().unwrap_or(24);
        }

        if let Ok(log_level) = std::env::var("CARTOONIZER_LOG_LEVEL") {
            config.logging.log_level = log_level;
        }

        if let Ok(cleanup) = std::env::var("CARTOONIZER_CLEANUP_ON_FAILURE") {
            config.pipeline.cleanup_on_failure = matches!(cleanup.as_str(), "1" | "true" | "yes");
        }

        if let Ok(workers) = std::env::var("CARTOONIZER_WORKERS") {
            config.performance.workers = workers.parse().unwrap_or(4);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("port must be greater than 0"));
        }

        if self.codec.fps == 0 {
            return Err(anyhow!("fps must be greater than 0"));
        }

        if self.codec.jpeg_quality == 0 || self.codec.jpeg_quality > 100 {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }

        if self.performance.workers == 0 {
            return Err(anyhow!("workers must be greater than 0"));
        }

        let dirs = [
            &self.storage.uploads_dir,
            &self.storage.frames_dir,
            &self.storage.styled_frames_dir,
            &self.storage.styled_videos_dir,
        ];
        for (i, dir) in dirs.iter().enumerate() {
            if dir.is_empty() || dir.contains('/') || dir.contains('\\') || dir.as_str() == ".." {
                return Err(anyhow!("storage subdirectory '{}' must be a plain directory name", dir));
            }
            if dirs[..i].contains(dir) {
                return Err(anyhow!("storage subdirectory '{}' is used twice", dir));
            }
        }

        if !self.storage.data_root.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.storage.data_root) {
                return Err(anyhow!("Cannot create data root: {}", e));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Cartoonizer Configuration:\n\
            - Listen: {}:{}\n\
            - Data Root: {}\n\
            - Frame Rate: {}fps\n\
            - Video Codec: {}\n\
            - Workers: {}\n\
            - Cleanup On Failure: {}",
            self.server.host,
            self.server.port,
            self.storage.data_root.display(),
            self.codec.fps,
            self.codec.video_codec,
            self.performance.workers,
            self.pipeline.cleanup_on_failure
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                max_upload_bytes: 512 * 1024 * 1024, // 512MB
            },
            storage: StorageConfig {
                data_root: PathBuf::from("./data"),
                uploads_dir: "uploads".to_string(),
                frames_dir: "frames".to_string(),
                styled_frames_dir: "styled_frames".to_string(),
                styled_videos_dir: "styled_videos".to_string(),
            },
            codec: CodecConfig {
                fps: 24,
                video_codec: "libx264".to_string(),
                jpeg_quality: 95,
                ffmpeg_bin: "ffmpeg".to_string(),
                ffprobe_bin: "ffprobe".to_string(),
            },
            pipeline: PipelineConfig {
                cleanup_on_failure: false,
            },
            performance: PerformanceConfig {
                workers: num_cpus::get().min(8), // Use available cores, max 8
            },
            logging: LoggingConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_data_root(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_root = dir;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.config.codec.fps = fps;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.workers = workers;
        self
    }

    pub fn cleanup_on_failure(mut self, enable: bool) -> Self {
        self.config.pipeline.cleanup_on_failure = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
