/*!
 * ffmpeg/ffprobe backed executor.
 *
 * Every call spawns a child process with `kill_on_drop`, so dropping the
 * future (timeout or cancellation) also stops the process.
 */

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use tokio::process::Command;

use crate::app_config::Config;
use crate::encoding::executor::{Backend, EncodeExecutor, EncodeRequest};
use crate::errors::{ExecutorError, ProbeError};
use crate::timecode::format_timecode;

// @const: Timeout for version checks and probes
const PROBE_TIMEOUT_SECS: u64 = 60;

/// Why a tool invocation did not produce an output
#[derive(Debug)]
pub(crate) enum ToolError {
    /// The binary could not be found
    NotFound(String),
    /// Spawning or waiting failed
    Io(String),
    /// The process ran longer than allowed
    Timeout(u64),
}

/// Run `program` with `args`, killing it after `timeout_secs`
pub(crate) async fn run_tool(program: &str, args: &[String], timeout_secs: u64) -> Result<Output, ToolError> {
    debug!("Running {} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let timeout_duration = Duration::from_secs(timeout_secs);
    tokio::select! {
        result = command.output() => result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(format!("{} not found in PATH", program))
            } else {
                ToolError::Io(format!("Failed to execute {}: {}", program, e))
            }
        }),
        _ = tokio::time::sleep(timeout_duration) => Err(ToolError::Timeout(timeout_secs)),
    }
}

/// Keep only the meaningful lines of ffmpeg's stderr
pub(crate) fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        // The tail carries the actual error
        meaningful[meaningful.len().saturating_sub(5)..].join("\n")
    }
}

/// Settings for the ffmpeg command lines
#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub gpu_encoder: String,
    pub gpu_cq: u8,
    pub timeout_secs: u64,
}

impl FfmpegSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            crf: config.encode.crf,
            audio_codec: config.encode.audio_codec.clone(),
            audio_bitrate: config.encode.audio_bitrate.clone(),
            gpu_encoder: config.gpu.encoder.clone(),
            gpu_cq: config.gpu.cq,
            timeout_secs: config.encode.timeout_secs,
        }
    }
}

/// Executor shelling out to ffmpeg and ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    settings: FfmpegSettings,
}

impl FfmpegExecutor {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(FfmpegSettings::from_config(config))
    }

    /// Arguments for one encode, without the program name
    pub fn build_encode_args(&self, request: &EncodeRequest) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"].iter().map(|s| s.to_string()).collect();

        if request.backend == Backend::Gpu {
            args.extend(["-hwaccel".to_string(), "cuda".to_string()]);
        }

        args.push("-i".to_string());
        args.push(request.source.to_string_lossy().to_string());
        // Output-side seeking: frame accurate since the video is re-encoded
        args.extend([
            "-ss".to_string(),
            format_timecode(request.start_s),
            "-to".to_string(),
            format_timecode(request.end_s),
        ]);

        if let Some(window) = &request.crop {
            let filter = match request.backend {
                Backend::Cpu => window.filter(),
                Backend::Gpu => format!("hwupload_cuda,{},hwdownload,format=nv12", window.filter()),
            };
            args.extend(["-vf".to_string(), filter]);
        }

        match request.backend {
            Backend::Cpu => args.extend([
                "-c:v".to_string(),
                "libx264".to_string(),
                "-crf".to_string(),
                self.settings.crf.to_string(),
                "-preset".to_string(),
                request.preset.clone(),
                "-c:a".to_string(),
                self.settings.audio_codec.clone(),
                "-b:a".to_string(),
                self.settings.audio_bitrate.clone(),
            ]),
            Backend::Gpu => args.extend([
                "-c:v".to_string(),
                self.settings.gpu_encoder.clone(),
                "-preset".to_string(),
                request.preset.clone(),
                "-cq".to_string(),
                self.settings.gpu_cq.to_string(),
                "-c:a".to_string(),
                "copy".to_string(),
            ]),
        }

        args.extend(["-map".to_string(), "0:v:0".to_string(), "-map".to_string(), "0:a?".to_string()]);

        let is_mp4_family = request
            .output
            .extension()
            .map(|ext| matches!(ext.to_string_lossy().to_lowercase().as_str(), "mp4" | "m4v" | "mov"))
            .unwrap_or(false);
        if is_mp4_family {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.push("-y".to_string());
        args.push(request.output.to_string_lossy().to_string());
        args
    }

    async fn run_probe(&self, path: &Path, args: &[&str]) -> Result<String, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }

        let mut full_args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        full_args.push(path.to_string_lossy().to_string());

        let output = run_tool(&self.settings.ffprobe_bin, &full_args, PROBE_TIMEOUT_SECS)
            .await
            .map_err(|e| match e {
                ToolError::NotFound(msg) | ToolError::Io(msg) => ProbeError::Failed(msg),
                ToolError::Timeout(secs) => ProbeError::Failed(format!("ffprobe timed out after {}s", secs)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Failed(filter_ffmpeg_stderr(&stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parse `WIDTHxHEIGHT` as printed by `-of csv=s=x:p=0`
pub(crate) fn parse_resolution(text: &str) -> Result<(u32, u32), ProbeError> {
    let first = text.lines().next().unwrap_or_default().trim().trim_end_matches('x');
    let (w, h) = first
        .split_once('x')
        .ok_or_else(|| ProbeError::InvalidOutput(format!("expected WIDTHxHEIGHT, got '{}'", text)))?;
    match (w.parse::<u32>(), h.parse::<u32>()) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(ProbeError::InvalidOutput(format!("invalid resolution '{}'", first))),
    }
}

/// Parse a duration in seconds as printed by `format=duration`
pub(crate) fn parse_duration(text: &str) -> Result<f64, ProbeError> {
    let first = text.lines().next().unwrap_or_default().trim();
    match first.parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(ProbeError::InvalidOutput(format!("invalid duration '{}'", first))),
    }
}

#[async_trait]
impl EncodeExecutor for FfmpegExecutor {
    async fn check_available(&self) -> Result<(), ExecutorError> {
        for program in [&self.settings.ffmpeg_bin, &self.settings.ffprobe_bin] {
            let args = vec!["-hide_banner".to_string(), "-version".to_string()];
            let output = run_tool(program, &args, PROBE_TIMEOUT_SECS).await.map_err(|e| match e {
                ToolError::NotFound(msg) | ToolError::Io(msg) => ExecutorError::Unavailable(msg),
                ToolError::Timeout(secs) => ExecutorError::Unavailable(format!("{} -version timed out after {}s", program, secs)),
            })?;
            if !output.status.success() {
                return Err(ExecutorError::Unavailable(format!("{} -version exited with {}", program, output.status)));
            }
        }
        Ok(())
    }

    async fn probe_gpu(&self) -> bool {
        let args = vec!["-hide_banner".to_string(), "-encoders".to_string()];
        match run_tool(&self.settings.ffmpeg_bin, &args, PROBE_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout.contains(self.settings.gpu_encoder.as_str())
            }
            Ok(_) => false,
            Err(e) => {
                debug!("GPU probe failed: {:?}", e);
                false
            }
        }
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), ExecutorError> {
        let args = self.build_encode_args(request);
        let output = run_tool(&self.settings.ffmpeg_bin, &args, self.settings.timeout_secs)
            .await
            .map_err(|e| match e {
                ToolError::NotFound(msg) => ExecutorError::Unavailable(msg),
                ToolError::Io(msg) => ExecutorError::Failed { code: None, message: msg },
                ToolError::Timeout(secs) => ExecutorError::Timeout(secs),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = filter_ffmpeg_stderr(&stderr);
            error!("ffmpeg failed for {}: {}", request.output.display(), message);
            return Err(ExecutorError::Failed {
                code: output.status.code(),
                message,
            });
        }

        if !request.output.exists() {
            return Err(ExecutorError::MissingOutput(request.output.clone()));
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let stdout = self
            .run_probe(
                path,
                &["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
            )
            .await?;
        parse_duration(&stdout)
    }

    async fn probe_resolution(&self, path: &Path) -> Result<(u32, u32), ProbeError> {
        let stdout = self
            .run_probe(
                path,
                &["-v", "error", "-select_streams", "v:0", "-show_entries", "stream=width,height", "-of", "csv=s=x:p=0"],
            )
            .await?;
        parse_resolution(&stdout)
    }
}
