use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Root directory receiving one sub-directory per source video
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Scratch directory for downloads
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Output container
    #[serde(default)]
    pub video_format: VideoFormat,

    /// Maximum source quality requested from remote providers (e.g. "1080p")
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Encoder settings
    #[serde(default)]
    pub encode: EncodeConfig,

    /// Hardware encoding settings
    #[serde(default)]
    pub gpu: GpuConfig,

    /// Crop settings
    #[serde(default)]
    pub crop: CropConfig,

    /// Output validation and retry settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Worker pool settings
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Output naming settings
    #[serde(default)]
    pub naming: NamingConfig,

    /// Subtitle settings
    #[serde(default)]
    pub subtitles: SubtitleConfig,

    /// Manifest export settings
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Skip segments whose output already exists and validates
    #[serde(default = "default_true")]
    pub skip_existing: bool,

    /// Keep downloaded sources after splitting
    #[serde(default = "default_true")]
    pub keep_source: bool,

    /// Plan only, never encode
    #[serde(default)]
    pub dry_run: bool,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Output container format
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Mp4,
    Mkv,
}

impl VideoFormat {
    // @returns: File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
        }
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for VideoFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "mkv" => Ok(Self::Mkv),
            _ => Err(anyhow!("Invalid video format: {}", s)),
        }
    }
}

/// Software encoder configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EncodeConfig {
    // @field: x264 constant rate factor (0-51)
    #[serde(default = "default_crf")]
    pub crf: u8,

    // @field: x264 preset used for the first attempt
    #[serde(default = "default_x264_preset")]
    pub preset: String,

    // @field: Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    // @field: Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    // @field: Timeout per encode call
    #[serde(default = "default_encode_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            crf: default_crf(),
            preset: default_x264_preset(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            timeout_secs: default_encode_timeout_secs(),
        }
    }
}

/// Hardware encoder configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GpuConfig {
    /// Request the hardware backend
    #[serde(default)]
    pub enabled: bool,

    /// Downgrade to the CPU backend when the hardware path is unavailable
    #[serde(default = "default_true")]
    pub fallback_to_cpu: bool,

    /// Hardware encoder name
    #[serde(default = "default_gpu_encoder")]
    pub encoder: String,

    /// Hardware preset used for the first attempt (p1 fastest … p7 slowest)
    #[serde(default = "default_gpu_preset")]
    pub preset: String,

    /// Constant quality value for the hardware encoder
    #[serde(default = "default_gpu_cq")]
    pub cq: u8,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fallback_to_cpu: true,
            encoder: default_gpu_encoder(),
            preset: default_gpu_preset(),
            cq: default_gpu_cq(),
        }
    }
}

/// Crop configuration, in pixels removed from each edge
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CropConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub top: u32,
    #[serde(default)]
    pub bottom: u32,
    #[serde(default)]
    pub left: u32,
    #[serde(default)]
    pub right: u32,
    /// Smallest width allowed after cropping
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    /// Smallest height allowed after cropping
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            top: 0,
            bottom: 0,
            left: 0,
            right: 0,
            min_width: default_min_width(),
            min_height: default_min_height(),
        }
    }
}

/// Output validation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationConfig {
    /// Absolute tolerance in seconds between expected and probed durations
    #[serde(default = "default_tolerance_s")]
    pub tolerance_s: f64,

    /// Retries after the first attempt, each one with a slower preset
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance_s: default_tolerance_s(),
            max_retries: default_max_retries(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParallelConfig {
    /// Maximum number of encodes running at the same time
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Output naming configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NamingConfig {
    /// Template for output stems. Placeholders: {n}, {n:02}, {n:03}, {title}
    #[serde(default = "default_naming_template")]
    pub template: String,

    /// Maximum stem length in characters
    #[serde(default = "default_sanitize_maxlen")]
    pub sanitize_maxlen: usize,

    /// Characters replaced in titles, mapped to their replacement
    #[serde(default = "default_replace_chars")]
    pub replace_chars: BTreeMap<char, String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            template: default_naming_template(),
            sanitize_maxlen: default_sanitize_maxlen(),
            replace_chars: default_replace_chars(),
        }
    }
}

/// Configuration for subtitle processing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubtitleConfig {
    /// Produce one subtitle file per segment when a source track is available
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Preferred languages for remote subtitle download, in order
    #[serde(default = "default_subtitle_languages")]
    pub languages: Vec<String>,

    /// Constant offset applied to every source entry, in seconds
    #[serde(default)]
    pub offset_s: f64,

    /// Minimum duration of a sliced entry, in milliseconds
    #[serde(default = "default_min_entry_ms")]
    pub min_entry_ms: u64,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_subtitle_languages(),
            offset_s: 0.0,
            min_entry_ms: default_min_entry_ms(),
        }
    }
}

/// Manifest export format
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    Json,
    Md,
}

/// Manifest export configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManifestConfig {
    /// Formats written next to the segments
    #[serde(default = "default_manifest_formats")]
    pub export: Vec<ManifestFormat>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            export: default_manifest_formats(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

// @const: x264 presets, fastest first
pub const X264_PRESETS: [&str; 9] = [
    "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow", "slower", "veryslow",
];

// @const: NVENC presets, fastest first
pub const NVENC_PRESETS: [&str; 7] = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];

const SUPPORTED_QUALITIES: [&str; 6] = ["2160p", "1440p", "1080p", "720p", "480p", "360p"];

fn default_out_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_quality() -> String {
    "1080p".to_string()
}

fn default_crf() -> u8 {
    18
}

fn default_x264_preset() -> String {
    "veryfast".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_encode_timeout_secs() -> u64 {
    1800 // long chapters at slow presets take a while
}

fn default_gpu_encoder() -> String {
    "h264_nvenc".to_string()
}

fn default_gpu_preset() -> String {
    "p5".to_string()
}

fn default_gpu_cq() -> u8 {
    21
}

fn default_min_width() -> u32 {
    640
}

fn default_min_height() -> u32 {
    480
}

fn default_tolerance_s() -> f64 {
    0.15
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_workers() -> usize {
    2
}

fn default_naming_template() -> String {
    "{n:02} - {title}".to_string()
}

fn default_sanitize_maxlen() -> usize {
    120
}

fn default_replace_chars() -> BTreeMap<char, String> {
    [
        ('<', "＜"),
        ('>', "＞"),
        (':', "："),
        ('"', "＂"),
        ('/', "／"),
        ('\\', "＼"),
        ('|', "｜"),
        ('?', "？"),
        ('*', "＊"),
    ]
    .into_iter()
    .map(|(c, r)| (c, r.to_string()))
    .collect()
}

fn default_subtitle_languages() -> Vec<String> {
    vec!["en".to_string(), "fr".to_string()]
}

fn default_min_entry_ms() -> u64 {
    300
}

fn default_manifest_formats() -> Vec<ManifestFormat> {
    vec![ManifestFormat::Json, ManifestFormat::Md]
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load the configuration from a JSON file, or create it with defaults when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok((config, false));
        }

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
        Ok((config, true))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_QUALITIES.contains(&self.quality.as_str()) {
            return Err(anyhow!("Unsupported quality: {} (expected one of {})", self.quality, SUPPORTED_QUALITIES.join(", ")));
        }

        if self.encode.crf > 51 {
            return Err(anyhow!("CRF must be between 0 and 51, got {}", self.encode.crf));
        }

        if !X264_PRESETS.contains(&self.encode.preset.as_str()) {
            return Err(anyhow!("Unknown x264 preset: {}", self.encode.preset));
        }

        if self.gpu.enabled && !NVENC_PRESETS.contains(&self.gpu.preset.as_str()) {
            return Err(anyhow!("Unknown hardware preset: {}", self.gpu.preset));
        }

        if !(self.validation.tolerance_s.is_finite() && self.validation.tolerance_s > 0.0) {
            return Err(anyhow!("Duration tolerance must be positive, got {}", self.validation.tolerance_s));
        }

        if !(1..=8).contains(&self.parallel.max_workers) {
            return Err(anyhow!("max_workers must be between 1 and 8, got {}", self.parallel.max_workers));
        }

        if self.naming.sanitize_maxlen == 0 {
            return Err(anyhow!("sanitize_maxlen must be greater than zero"));
        }

        if self.crop.enabled && (self.crop.min_width == 0 || self.crop.min_height == 0) {
            return Err(anyhow!("Crop minimum dimensions must be greater than zero"));
        }

        if !self.subtitles.offset_s.is_finite() {
            return Err(anyhow!("Subtitle offset must be a finite number"));
        }

        Ok(())
    }

    /// Maximum source height requested from remote providers
    pub fn max_height(&self) -> u32 {
        self.quality.trim_end_matches('p').parse().unwrap_or(1080)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            out_dir: default_out_dir(),
            work_dir: default_work_dir(),
            video_format: VideoFormat::default(),
            quality: default_quality(),
            encode: EncodeConfig::default(),
            gpu: GpuConfig::default(),
            crop: CropConfig::default(),
            validation: ValidationConfig::default(),
            parallel: ParallelConfig::default(),
            naming: NamingConfig::default(),
            subtitles: SubtitleConfig::default(),
            manifest: ManifestConfig::default(),
            skip_existing: true,
            keep_source: true,
            dry_run: false,
            log_level: LogLevel::default(),
        }
    }
}
