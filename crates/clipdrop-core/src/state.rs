// crates/clipdrop-core/src/state.rs
// Pure project data: media pool bins and a single-row-per-kind timeline.
// Serializable via serde. Backs the project-file workspace in clipdrop-ui.
use std::path::{Path, PathBuf};
use uuid::Uuid;
use serde::{Deserialize, Serialize};

/// Duration given to stills and text cards when they land on the timeline.
pub const STILL_DURATION: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipType {
    Video,
    Audio,
    Still,
    Text,
    Other,
}

impl ClipType {
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase();
        match ext.as_str() {
            "mp4" | "mov" | "mkv" | "avi" | "webm" | "m4v"         => ClipType::Video,
            "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a"         => ClipType::Audio,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tif" | "tiff" => ClipType::Still,
            "txt" | "srt"                                          => ClipType::Text,
            _                                                      => ClipType::Other,
        }
    }

    /// Timeline row: video-like clips on 0, audio on 1.
    pub fn track_row(self) -> usize {
        match self {
            ClipType::Audio => 1,
            _               => 0,
        }
    }
}

/// Source file in a media bin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LibraryClip {
    pub id:        Uuid,
    pub path:      PathBuf,
    pub name:      String,
    pub clip_type: ClipType,
    /// Seconds; 0.0 until something measures it.
    #[serde(default)]
    pub duration:  f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaBin {
    pub id:    Uuid,
    pub name:  String,
    pub items: Vec<LibraryClip>,
}

/// An instance of a LibraryClip placed on the timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineClip {
    pub id:         Uuid,
    pub media_id:   Uuid,
    pub start_time: f64,
    pub duration:   f64,
    pub track_row:  usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub name:     String,
    #[serde(default)]
    pub bins:     Vec<MediaBin>,
    #[serde(default)]
    pub timeline: Vec<TimelineClip>,
}

impl ProjectState {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn bin(&self, id: Uuid) -> Option<&MediaBin> {
        self.bins.iter().find(|b| b.id == id)
    }

    pub fn bin_by_name(&self, name: &str) -> Option<&MediaBin> {
        self.bins.iter().find(|b| b.name == name)
    }

    pub fn get_or_create_bin(&mut self, name: &str) -> Uuid {
        if let Some(existing) = self.bin_by_name(name) {
            return existing.id;
        }
        let id = Uuid::new_v4();
        self.bins.push(MediaBin { id, name: name.to_string(), items: Vec::new() });
        id
    }

    /// Add `path` to a bin. Re-adding the same path returns the existing item.
    pub fn add_to_bin(&mut self, bin: Uuid, path: PathBuf) -> Option<Uuid> {
        let bin = self.bins.iter_mut().find(|b| b.id == bin)?;

        // Avoid duplicates
        if let Some(existing) = bin.items.iter().find(|c| c.path == path) {
            return Some(existing.id);
        }

        let name = path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let id = Uuid::new_v4();
        bin.items.push(LibraryClip {
            id,
            clip_type: ClipType::from_path(&path),
            path,
            name,
            duration:  0.0,
        });
        Some(id)
    }

    pub fn find_in_bin(&self, bin: Uuid, name: &str) -> Option<Uuid> {
        self.bin(bin)?.items.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn clip(&self, media_id: Uuid) -> Option<&LibraryClip> {
        self.bins.iter().flat_map(|b| b.items.iter()).find(|c| c.id == media_id)
    }

    /// Append after the last clip on the media's track.
    pub fn append_to_timeline(&mut self, media_id: Uuid) -> Option<Uuid> {
        let lib_clip = self.clip(media_id)?.clone();
        let row = lib_clip.clip_type.track_row();

        let track_end = self.timeline.iter()
            .filter(|c| c.track_row == row)
            .map(|c| c.start_time + c.duration)
            .fold(0.0_f64, f64::max);

        let duration = if lib_clip.duration > 0.0 { lib_clip.duration } else { STILL_DURATION };
        let id = Uuid::new_v4();
        self.timeline.push(TimelineClip {
            id,
            media_id,
            start_time: track_end,
            duration,
            track_row:  row,
        });
        Some(id)
    }

    pub fn total_duration(&self) -> f64 {
        self.timeline.iter()
            .map(|c| c.start_time + c.duration)
            .fold(0.0_f64, f64::max)
    }
}
