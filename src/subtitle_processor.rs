use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SubtitleError;

// @module: Subtitle track model, SRT/WebVTT parsing and SRT output

// @const: Cue timing line, HH:MM:SS or MM:SS followed by a comma or dot millisecond field
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(\d+):)?(\d{1,2}):(\d{2})([,.])(\d{3})\s*-->\s*(?:(\d+):)?(\d{1,2}):(\d{2})([,.])(\d{3})(?:\s+.*)?$",
    )
    .unwrap()
});

// @const: Inline markup such as <i>, <b>, <c.color> or <v Speaker>
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Caption dialects understood by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleDialect {
    /// SubRip: numeric index, comma millisecond separator
    Srt,
    /// WebVTT: `WEBVTT` header, dot millisecond separator
    WebVtt,
}

impl SubtitleDialect {
    /// Pick the dialect from the header or the first timing line's millisecond separator
    pub fn sniff(content: &str) -> Result<Self, SubtitleError> {
        let body = content.trim_start_matches('\u{feff}').trim_start();
        if body.starts_with("WEBVTT") {
            return Ok(Self::WebVtt);
        }

        let timing = body
            .lines()
            .map(str::trim)
            .find_map(|line| TIMING_REGEX.captures(line))
            .ok_or_else(|| SubtitleError::UnknownFormat("no cue timing line found".to_string()))?;

        match &timing[4] {
            "," => Ok(Self::Srt),
            _ => Ok(Self::WebVtt),
        }
    }
}

impl fmt::Display for SubtitleDialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Srt => write!(f, "srt"),
            Self::WebVtt => write!(f, "vtt"),
        }
    }
}

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text, lines joined with '\n'
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: impl Into<String>) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text: text.into(),
        }
    }

    /// Length of the entry in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_time_ms),
            Self::format_timestamp(self.end_time_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// A parsed subtitle track
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// File the track was read from, if any
    pub source_file: Option<PathBuf>,

    /// Dialect the source was written in
    pub dialect: SubtitleDialect,

    /// Language code guessed from a `name.<lang>.srt` file name
    pub language: Option<String>,

    /// Entries in source order
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleTrack {
    /// Create a track from entries built in memory
    pub fn new(entries: Vec<SubtitleEntry>) -> Self {
        SubtitleTrack {
            source_file: None,
            dialect: SubtitleDialect::Srt,
            language: None,
            entries,
        }
    }

    /// Read and parse a subtitle file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, SubtitleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut track = Self::parse_str(&content)?;
        track.source_file = Some(path.to_path_buf());
        track.language = language_from_filename(path);
        debug!(
            "Parsed {} {} entries from {}",
            track.entries.len(),
            track.dialect,
            path.display()
        );
        Ok(track)
    }

    /// Parse SRT or WebVTT content
    pub fn parse_str(content: &str) -> Result<Self, SubtitleError> {
        let content = content.trim_start_matches('\u{feff}');
        let dialect = SubtitleDialect::sniff(content)?;

        let mut entries = Vec::new();
        let mut block: Vec<(usize, &str)> = Vec::new();

        for (line_idx, line) in content.lines().enumerate() {
            let trimmed = line.trim_end_matches('\r');
            if trimmed.trim().is_empty() {
                Self::flush_block(&mut block, &mut entries)?;
            } else {
                block.push((line_idx + 1, trimmed));
            }
        }
        Self::flush_block(&mut block, &mut entries)?;

        Ok(SubtitleTrack {
            source_file: None,
            dialect,
            language: None,
            entries,
        })
    }

    // Turn one blank-line separated block into an entry. Header, NOTE, STYLE and
    // REGION blocks have no timing line and are skipped.
    fn flush_block(block: &mut Vec<(usize, &str)>, entries: &mut Vec<SubtitleEntry>) -> Result<(), SubtitleError> {
        if block.is_empty() {
            return Ok(());
        }

        let lines = std::mem::take(block);
        let first = lines[0].1.trim();
        if first.starts_with("WEBVTT") || first.starts_with("NOTE") || first == "STYLE" || first == "REGION" {
            return Ok(());
        }

        let Some(timing_pos) = lines.iter().position(|(_, l)| l.contains("-->")) else {
            warn!("Skipping block without timing at line {}: {}", lines[0].0, first);
            return Ok(());
        };

        let (line_no, timing_line) = lines[timing_pos];
        let caps = TIMING_REGEX
            .captures(timing_line.trim())
            .ok_or_else(|| SubtitleError::InvalidTimestamp {
                line: line_no,
                text: timing_line.trim().to_string(),
            })?;

        let start_ms = Self::captured_ms(&caps, 1);
        let end_ms = Self::captured_ms(&caps, 6);
        let (Some(start_ms), Some(end_ms)) = (start_ms, end_ms) else {
            return Err(SubtitleError::InvalidTimestamp {
                line: line_no,
                text: timing_line.trim().to_string(),
            });
        };

        let text = lines[timing_pos + 1..]
            .iter()
            .map(|(_, l)| TAG_REGEX.replace_all(l, "").trim().to_string())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            debug!("Skipping empty cue at line {}", line_no);
            return Ok(());
        }
        if end_ms <= start_ms {
            warn!("Skipping cue with non-positive duration at line {}: {}", line_no, timing_line.trim());
            return Ok(());
        }

        entries.push(SubtitleEntry::new(entries.len() + 1, start_ms, end_ms, text));
        Ok(())
    }

    // Hours group is optional (WebVTT short form). Minutes and seconds must be < 60.
    fn captured_ms(caps: &regex::Captures, start_idx: usize) -> Option<u64> {
        let hours: u64 = match caps.get(start_idx) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let minutes: u64 = caps.get(start_idx + 1)?.as_str().parse().ok()?;
        let seconds: u64 = caps.get(start_idx + 2)?.as_str().parse().ok()?;
        let millis: u64 = caps.get(start_idx + 4)?.as_str().parse().ok()?;

        if minutes >= 60 || seconds >= 60 {
            return None;
        }

        hours
            .checked_mul(3_600_000)?
            .checked_add(minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Render the track as SRT: comma separator, LF line endings
    pub fn to_srt_string(&self) -> String {
        self.entries.iter().map(|entry| entry.to_string()).collect()
    }

    /// Write the track as an SRT file, creating the parent directory if needed
    pub fn write_srt<P: AsRef<Path>>(&self, path: P) -> Result<(), SubtitleError> {
        let path = path.as_ref();
        let io_err = |source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(path, self.to_srt_string()).map_err(io_err)
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Dialect: {}", self.dialect)?;
        writeln!(f, "Entries: {}", self.entries.len())?;
        Ok(())
    }
}

// `video.en.srt` -> `en`
fn language_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let candidate = stem.rsplit_once('.')?.1;
    let is_code = matches!(candidate.len(), 2 | 3) && candidate.chars().all(|c| c.is_ascii_alphabetic());
    is_code.then(|| candidate.to_lowercase())
}
