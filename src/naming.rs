/*!
 * Filesystem-safe output names.
 *
 * Chapter titles come straight from video metadata and may contain anything:
 * path separators, characters Windows refuses, control characters, or names
 * like `CON`. This module turns a title and its chapter index into a stem that
 * every common filesystem accepts.
 */

use std::collections::BTreeMap;

use crate::app_config::NamingConfig;

// @const: Names Windows reserves regardless of extension
const WINDOWS_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns a chapter title and index into an output stem
pub trait StemNamer: Send + Sync {
    /// Build the stem for the chapter at `index` (1-based)
    fn safe_name(&self, title: &str, index: usize) -> String;
}

/// Template-driven namer backed by `generate_safe_filename`
#[derive(Debug, Clone)]
pub struct NameSanitizer {
    template: String,
    max_length: usize,
    replace_chars: BTreeMap<char, String>,
}

impl NameSanitizer {
    /// Create a namer from the naming section of the configuration
    pub fn new(config: &NamingConfig) -> Self {
        Self {
            template: config.template.clone(),
            max_length: config.sanitize_maxlen.max(1),
            replace_chars: config.replace_chars.clone(),
        }
    }

    fn render(&self, title: &str, index: usize) -> String {
        self.template
            .replace("{n:03}", &format!("{:03}", index))
            .replace("{n:02}", &format!("{:02}", index))
            .replace("{n}", &index.to_string())
            .replace("{title}", title)
    }
}

impl Default for NameSanitizer {
    fn default() -> Self {
        Self::new(&NamingConfig::default())
    }
}

impl StemNamer for NameSanitizer {
    fn safe_name(&self, title: &str, index: usize) -> String {
        let clean_title = generate_safe_filename(title, self.max_length, &self.replace_chars);
        if clean_title.is_empty() {
            return format!("{:02}", index);
        }

        // The template itself may carry unsafe characters, so sanitize the rendered stem too
        let stem = generate_safe_filename(&self.render(&clean_title, index), self.max_length, &self.replace_chars);
        if stem.is_empty() {
            format!("{:02}", index)
        } else {
            stem
        }
    }
}

/// Sanitize `name` for use as a file or directory name.
///
/// Returns an empty string when nothing usable is left; callers pick their own fallback.
pub fn generate_safe_filename(name: &str, max_length: usize, replace_chars: &BTreeMap<char, String>) -> String {
    let mut replaced = String::with_capacity(name.len());
    for c in name.chars() {
        if let Some(replacement) = replace_chars.get(&c) {
            replaced.push_str(replacement);
        } else if c.is_whitespace() {
            replaced.push(' ');
        } else if !c.is_control() {
            replaced.push(c);
        }
    }

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut safe = trim_tail(&collapsed);

    if WINDOWS_RESERVED.contains(&safe.to_uppercase().as_str()) {
        safe.push_str("_file");
    }

    if safe.chars().count() > max_length {
        let truncated: String = safe.chars().take(max_length).collect();
        safe = trim_tail(&truncated);
    }

    safe
}

fn trim_tail(name: &str) -> String {
    name.trim().trim_end_matches(['.', ' ']).to_string()
}

/// Name of the per-video output directory: `<safe title>-<video id>`, or just
/// the title when both are the same
pub fn output_dir_name(video_title: &str, video_id: &str, replace_chars: &BTreeMap<char, String>) -> String {
    let safe_title = generate_safe_filename(video_title, 50, replace_chars);
    let safe_id = generate_safe_filename(video_id, 50, replace_chars);
    match (safe_title.is_empty(), safe_id.is_empty()) {
        (true, true) => "video".to_string(),
        (true, false) => safe_id,
        (false, true) => safe_title,
        (false, false) if safe_title == safe_id => safe_title,
        (false, false) => format!("{}-{}", safe_title, safe_id),
    }
}
