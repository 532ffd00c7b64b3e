//! Render progress tracking
//!
//! Each export owns its own progress state. Callers on other threads poll
//! [`RenderProgress::snapshot`] while the render worker advances it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// Progress of one offline render, updated from the render thread
#[derive(Debug, Default)]
pub struct RenderProgress {
    /// Frames produced so far
    frames_rendered: AtomicU64,
    /// Frames the render will produce in total
    total_frames: AtomicU64,
    /// Whether the render is currently running
    is_running: AtomicBool,
    /// Current status message
    status: RwLock<String>,
    /// Error message if the render failed
    error: RwLock<Option<String>>,
}

impl RenderProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a render of `total_frames`
    pub fn start(&self, total_frames: u64, status: &str) {
        self.frames_rendered.store(0, Ordering::SeqCst);
        self.total_frames.store(total_frames, Ordering::SeqCst);
        self.is_running.store(true, Ordering::SeqCst);
        if let Ok(mut s) = self.status.write() {
            *s = status.to_string();
        }
        if let Ok(mut e) = self.error.write() {
            *e = None;
        }
    }

    /// Record `frames` more frames as rendered
    pub fn advance(&self, frames: u64) {
        let total = self.total_frames.load(Ordering::SeqCst);
        let done = self.frames_rendered.load(Ordering::SeqCst) + frames;
        self.frames_rendered.store(done.min(total), Ordering::SeqCst);
    }

    /// Mark the render (and its encoding) as complete
    pub fn complete(&self) {
        self.frames_rendered
            .store(self.total_frames.load(Ordering::SeqCst), Ordering::SeqCst);
        self.is_running.store(false, Ordering::SeqCst);
        if let Ok(mut s) = self.status.write() {
            *s = "Export complete".to_string();
        }
    }

    /// Mark the render as failed with an error message
    pub fn fail(&self, error: &str) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Ok(mut s) = self.status.write() {
            *s = "Export failed".to_string();
        }
        if let Ok(mut e) = self.error.write() {
            *e = Some(error.to_string());
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Completed fraction in percent (0-100)
    pub fn percent(&self) -> u32 {
        let total = self.total_frames.load(Ordering::SeqCst);
        if total == 0 {
            return 0;
        }
        let done = self.frames_rendered.load(Ordering::SeqCst);
        ((done as f64 / total as f64) * 100.0).floor().min(100.0) as u32
    }

    /// Consistent-enough copy of the current state for display
    pub fn snapshot(&self) -> RenderProgressInfo {
        RenderProgressInfo {
            frames_rendered: self.frames_rendered.load(Ordering::SeqCst),
            total_frames: self.total_frames.load(Ordering::SeqCst),
            percent: self.percent(),
            is_running: self.is_running(),
            status: self.status.read().map(|s| s.clone()).unwrap_or_default(),
            error: self.error.read().ok().and_then(|e| e.clone()),
        }
    }
}

/// Point-in-time view of a [`RenderProgress`]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProgressInfo {
    pub frames_rendered: u64,
    pub total_frames: u64,
    pub percent: u32,
    pub is_running: bool,
    pub status: String,
    pub error: Option<String>,
}

impl RenderProgressInfo {
    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "frames_rendered": self.frames_rendered,
            "total_frames": self.total_frames,
            "progress": self.percent,
            "is_running": self.is_running,
            "status": self.status,
            "error": self.error,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lifecycle() {
        let progress = RenderProgress::new();
        assert_eq!(progress.percent(), 0);

        progress.start(200, "Rendering kid");
        assert!(progress.is_running());
        progress.advance(50);
        assert_eq!(progress.percent(), 25);

        // Overshoot is clamped to the total
        progress.advance(500);
        assert_eq!(progress.snapshot().frames_rendered, 200);

        progress.complete();
        let info = progress.snapshot();
        assert!(!info.is_running);
        assert_eq!(info.percent, 100);
        assert_eq!(info.status, "Export complete");
    }

    #[test]
    fn test_progress_failure_records_error() {
        let progress = RenderProgress::new();
        progress.start(10, "Rendering cat");
        progress.fail("render would produce no output frames");

        let info = progress.snapshot();
        assert!(!info.is_running);
        assert_eq!(info.error.as_deref(), Some("render would produce no output frames"));

        let json: serde_json::Value = serde_json::from_str(&info.to_json()).unwrap();
        assert_eq!(json["status"], "Export failed");
        assert_eq!(json["total_frames"], 10);
    }
}
