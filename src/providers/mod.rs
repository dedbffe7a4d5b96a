/*!
 * Source acquisition.
 *
 * A provider turns a user supplied source (a local path or a URL) into a
 * `SourceMedia`: a local media file, its duration, its raw chapter list and an
 * optional subtitle track.
 * - `local`: media files on disk, chapters from a list file or the container
 * - `ytdlp`: remote videos downloaded with yt-dlp
 */

use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use log::warn;

use crate::errors::AcquisitionError;
use crate::planning::Chapter;

/// Everything the pipeline needs from a source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    /// Local media file to cut
    pub media_path: PathBuf,
    pub duration_s: f64,
    /// Raw chapters, unclamped and possibly unsorted
    pub chapters: Vec<Chapter>,
    /// Subtitle track to slice, if any
    pub subtitle_path: Option<PathBuf>,
    /// Stable identifier used in the output directory name
    pub video_id: String,
    pub title: String,
    /// The media was fetched into the work directory by the provider
    pub downloaded: bool,
}

/// Common trait for all source providers
#[async_trait]
pub trait MediaProvider: Send + Sync + Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this provider understands `source`
    fn supports(&self, source: &str) -> bool;

    /// Acquire the source
    async fn fetch(&self, source: &str) -> Result<SourceMedia, AcquisitionError>;
}

/// Build chapters from `(title, start_s, end_s)` triples, skipping unusable
/// ones. Falls back to one chapter covering the whole media when none survive.
pub fn chapters_or_whole(raw: Vec<(String, f64, f64)>, fallback_title: &str, duration_s: f64) -> Vec<Chapter> {
    let mut chapters = Vec::with_capacity(raw.len());
    for (position, (title, start_s, end_s)) in raw.into_iter().enumerate() {
        let index = position + 1;
        let title = if title.trim().is_empty() {
            format!("Chapter {}", index)
        } else {
            title
        };
        match Chapter::new(index, title, start_s, end_s) {
            Ok(chapter) => chapters.push(chapter),
            Err(e) => warn!("Ignoring chapter from source metadata: {}", e),
        }
    }

    if chapters.is_empty() {
        if let Ok(whole) = Chapter::new(1, fallback_title, 0.0, duration_s) {
            chapters.push(whole);
        }
    }
    chapters
}

pub mod local;
pub mod ytdlp;
