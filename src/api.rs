/// API functions for embedding hosts
///
/// A single process-wide [`AudioSession`] sits behind these calls. Results are
/// plain strings (JSON where structured) so any FFI layer can pass them on.
use crate::config::{load_config, EngineConfig};
use crate::presets::{EffectPreset, BUILTIN_PRESETS};
use crate::session::AudioSession;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::OnceLock;

/// Global audio session (thread-safe, initialized once)
static AUDIO_SESSION: OnceLock<Mutex<AudioSession>> = OnceLock::new();

fn session() -> Result<&'static Mutex<AudioSession>, String> {
    AUDIO_SESSION
        .get()
        .ok_or_else(|| "Audio session not initialized".to_string())
}

fn preset(label: &str) -> Result<EffectPreset, String> {
    EffectPreset::by_label(label).ok_or_else(|| format!("Unknown preset '{}'", label))
}

// ============================================================================
// SESSION
// ============================================================================

/// Create the audio session, optionally from a JSON config file
pub fn init_audio_session(config_path: Option<String>) -> Result<String, String> {
    let config = match config_path {
        Some(path) => load_config(Path::new(&path)).map_err(|e| format!("{:#}", e))?,
        None => EngineConfig::default(),
    };
    install_session(AudioSession::with_defaults(config))
}

/// Install an already built session (custom decoder or sink)
pub fn install_session(session: AudioSession) -> Result<String, String> {
    AUDIO_SESSION
        .set(Mutex::new(session))
        .map_err(|_| "Audio session already initialized".to_string())?;
    tracing::info!("audio session initialized");
    Ok("Audio session initialized".to_string())
}

/// Status line, last error and last export as JSON
pub fn get_session_status() -> Result<String, String> {
    let mut session = session()?.lock();
    let status = session.poll_preview();
    let asset = session.last_asset();
    Ok(serde_json::json!({
        "status": status.as_str(),
        "error": session.last_error(),
        "preview_graph": session.preview_graph(),
        "last_asset": asset.map(|a| serde_json::json!({
            "file_name": a.file_name,
            "bytes": a.bytes.len(),
            "duration": a.duration(),
        })),
    })
    .to_string())
}

// ============================================================================
// AUDIO FILES
// ============================================================================

/// Decode a file and make it the current buffer; returns its info as JSON
pub fn load_audio_file_api(path: String) -> Result<String, String> {
    let mut session = session()?.lock();
    session
        .load_file(Path::new(&path))
        .map_err(|e| e.to_string())?;
    audio_info_json(&session)
}

/// Info about the current buffer as JSON
pub fn get_audio_info() -> Result<String, String> {
    let session = session()?.lock();
    audio_info_json(&session)
}

fn audio_info_json(session: &AudioSession) -> Result<String, String> {
    let loaded = session.current().ok_or("No audio loaded")?;
    Ok(serde_json::json!({
        "name": loaded.name,
        "sample_rate": loaded.audio.sample_rate(),
        "channels": loaded.audio.number_of_channels(),
        "length": loaded.audio.length(),
        "duration": loaded.audio.duration(),
    })
    .to_string())
}

// ============================================================================
// PRESETS & PREVIEW
// ============================================================================

/// Built-in presets as a JSON array
pub fn list_presets() -> Result<String, String> {
    let presets: Vec<EffectPreset> = BUILTIN_PRESETS.iter().map(|p| (*p).into()).collect();
    serde_json::to_string(&presets).map_err(|e| e.to_string())
}

/// Preview the current buffer through a built-in preset
pub fn play_preset_preview(label: &str) -> Result<String, String> {
    let preset = preset(label)?;
    let mut session = session()?.lock();
    let graph = session.play_preview(&preset).map_err(|e| e.to_string())?;
    Ok(format!("Previewing '{}' (graph {})", preset.label, graph))
}

/// Stop the running preview; succeeds when nothing plays
pub fn stop_preview_api() -> Result<String, String> {
    let mut session = session()?.lock();
    session.stop_preview();
    Ok("Preview stopped".to_string())
}

// ============================================================================
// EXPORT
// ============================================================================

/// Render the current buffer through a preset and save it into `out_dir`
///
/// Returns the written file's path.
pub fn export_preset(label: &str, out_dir: String) -> Result<String, String> {
    let preset = preset(label)?;
    let asset = {
        let mut session = session()?.lock();
        session
            .export(&preset, &preset.label)
            .map_err(|e| e.to_string())?
    };
    let path = asset
        .write_to(Path::new(&out_dir))
        .map_err(|e| format!("Failed to write {}: {}", asset.file_name, e))?;
    Ok(path.display().to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::tests::wav_bytes;

    #[test]
    fn test_preset_listing_is_json() {
        let presets: serde_json::Value = serde_json::from_str(&list_presets().unwrap()).unwrap();
        assert_eq!(presets.as_array().unwrap().len(), 4);
        assert_eq!(presets[1]["label"], "kid");
        assert_eq!(presets[1]["equalizer"]["filter_type"], "highshelf");
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        assert_eq!(preset("robot").unwrap_err(), "Unknown preset 'robot'");
    }

    /// The session is process-wide, so the whole flow runs in one test
    #[test]
    fn test_session_flow() {
        let _ = init_audio_session(None);
        assert!(init_audio_session(None).is_err());

        let dir = std::env::temp_dir().join("audio_tool_api_test");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("greeting.wav");
        let frames: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        std::fs::write(&input, wav_bytes(44100, 1, &frames)).unwrap();

        let info: serde_json::Value =
            serde_json::from_str(&load_audio_file_api(input.display().to_string()).unwrap()).unwrap();
        assert_eq!(info["channels"], 1);
        assert_eq!(info["length"], 4410);

        stop_preview_api().unwrap();
        stop_preview_api().unwrap();

        let out = export_preset("slow", dir.join("out").display().to_string()).unwrap();
        assert!(out.ends_with("greeting-slow.wav"));
        assert!(Path::new(&out).exists());

        let status: serde_json::Value = serde_json::from_str(&get_session_status().unwrap()).unwrap();
        assert_eq!(status["status"], "done");
        assert_eq!(status["last_asset"]["file_name"], "greeting-slow.wav");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
