//! JSON shapes exchanged with the conversion service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Video containers the service accepts for upload
pub const ALLOWED_VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "mkv", "webm", "avi", "ogg"];

/// Whether the service would accept `path` based on its extension
pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| ALLOWED_VIDEO_EXTENSIONS.contains(&e.as_str()))
}

/// Anime style model applied to every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimeStyle {
    #[default]
    #[serde(rename = "face_paint_512_v2")]
    FacePaint512V2,
    Hayao,
    Paprika,
    Shinkai,
}

impl AnimeStyle {
    pub const ALL: [AnimeStyle; 4] = [
        AnimeStyle::FacePaint512V2,
        AnimeStyle::Hayao,
        AnimeStyle::Paprika,
        AnimeStyle::Shinkai,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnimeStyle::FacePaint512V2 => "face_paint_512_v2",
            AnimeStyle::Hayao => "hayao",
            AnimeStyle::Paprika => "paprika",
            AnimeStyle::Shinkai => "shinkai",
        }
    }
}

impl fmt::Display for AnimeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimeStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown style '{}'", s))
    }
}

/// Output height of the converted video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    P720,
    P1080,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::P720 => "720",
            Resolution::P1080 => "1080",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('p') {
            "720" => Ok(Resolution::P720),
            "1080" => Ok(Resolution::P1080),
            other => Err(format!("unsupported resolution '{}' (720 or 1080)", other)),
        }
    }
}

/// Form fields sent alongside the uploaded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertRequest {
    pub style: AnimeStyle,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Lifecycle of a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, worker not started yet
    Queued,
    Pending,
    Running,
    Done,
    Error,
}

impl JobState {
    /// Polling stops on these
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Error => "error",
        }
    }
}

/// Body of `GET /api/status/{jobId}`
///
/// Unknown job ids come back as `{"error": "..."}` with no status at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub status: Option<JobState>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /api/result/{jobId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}
