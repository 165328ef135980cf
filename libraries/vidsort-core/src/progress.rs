//! Local playback-progress record.
//!
//! A single key/value map from video id to seconds watched, persisted as one
//! JSON file. This is the only thing Vidsort persists; playlist state lives
//! in memory and on the server.

use crate::error::Result;
use crate::types::VideoId;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed map of video id to playback position in seconds.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    entries: HashMap<VideoId, u32>,
}

impl ProgressStore {
    /// Open the store at the given path, creating an empty one if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };

        Ok(Self { path, entries })
    }

    /// Playback position for a video, if recorded.
    pub fn get(&self, video_id: &VideoId) -> Option<u32> {
        self.entries.get(video_id).copied()
    }

    /// Record a playback position and persist.
    pub fn set(&mut self, video_id: VideoId, seconds: u32) -> Result<()> {
        self.entries.insert(video_id, seconds);
        self.save()
    }

    /// Drop a video's record and persist.
    pub fn remove(&mut self, video_id: &VideoId) -> Result<()> {
        if self.entries.remove(video_id).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Number of recorded videos.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Write to a sibling temp file then rename, so a crash mid-write never
    // truncates the existing record.
    fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        let tmp = temp_path(&self.path);
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "Progress saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
