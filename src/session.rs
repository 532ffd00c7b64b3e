/// Audio session: owns the current buffer, the live preview and the last export
///
/// One session exists per user interaction context. Every transition replaces
/// exactly one slot and tears down what it replaces.
use crate::audio_file::{DecodedAudio, Decoder, SymphoniaDecoder};
use crate::audio_graph::{build_graph, GraphId};
use crate::config::EngineConfig;
use crate::error::{DecodeError, EngineError, EngineResult, PlaybackError, RenderError};
use crate::export::{export_asset, RenderProgress, RenderedAsset};
use crate::playback::{ActivePlayback, PlaybackSink};
use crate::presets::EffectPreset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What the user-facing status line shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Loading,
    Loaded,
    Playing,
    Rendering,
    Done,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Loaded => "loaded",
            SessionStatus::Playing => "playing",
            SessionStatus::Rendering => "rendering",
            SessionStatus::Done => "done",
            SessionStatus::Error => "error",
        }
    }
}

/// Policy for results of requests that a newer request of the same kind replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersededResults {
    /// Drop them; only the newest request may change session state
    #[default]
    Discard,
    /// Apply whichever result completes last
    LastToComplete,
}

/// Hands out monotonically increasing request tickets
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Newest ticket issued so far (0 before the first)
    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest() == ticket
    }
}

/// Creates the playback sink the first time one is needed
pub type SinkFactory = Box<dyn FnMut() -> Result<Box<dyn PlaybackSink>, PlaybackError> + Send>;

/// The currently selected file
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    pub name: Option<String>,
    pub audio: Arc<DecodedAudio>,
}

/// A decode running on a worker thread
pub struct PendingDecode {
    ticket: u64,
    name: Option<String>,
    handle: JoinHandle<Result<DecodedAudio, DecodeError>>,
}

impl PendingDecode {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// An export running on a worker thread
pub struct ExportTask {
    ticket: u64,
    /// Buffer the export renders; a later decode makes the result stale
    source: Arc<DecodedAudio>,
    progress: Arc<RenderProgress>,
    handle: JoinHandle<Result<RenderedAsset, RenderError>>,
}

impl ExportTask {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn progress(&self) -> &RenderProgress {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct AudioSession {
    config: EngineConfig,
    decoder: Arc<dyn Decoder>,
    sink_factory: SinkFactory,
    /// Created lazily, then kept for the session's lifetime
    sink: Option<Box<dyn PlaybackSink>>,
    current: Option<LoadedAudio>,
    preview: Option<Box<dyn ActivePlayback>>,
    last_asset: Option<Arc<RenderedAsset>>,
    status: SessionStatus,
    last_error: Option<String>,
    decodes: RequestSequencer,
    exports: RequestSequencer,
}

impl AudioSession {
    pub fn new(config: EngineConfig, decoder: Arc<dyn Decoder>, sink_factory: SinkFactory) -> Self {
        Self {
            config,
            decoder,
            sink_factory,
            sink: None,
            current: None,
            preview: None,
            last_asset: None,
            status: SessionStatus::Idle,
            last_error: None,
            decodes: RequestSequencer::new(),
            exports: RequestSequencer::new(),
        }
    }

    /// Session with the symphonia decoder and the host's default output
    pub fn with_defaults(config: EngineConfig) -> Self {
        let buffer_frames = config.preview_buffer_frames;
        Self::new(
            config,
            Arc::new(SymphoniaDecoder::new()),
            default_sink_factory(buffer_frames),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn current(&self) -> Option<&LoadedAudio> {
        self.current.as_ref()
    }

    pub fn decoded(&self) -> Option<Arc<DecodedAudio>> {
        self.current.as_ref().map(|c| c.audio.clone())
    }

    /// The most recent export, shared with whoever offers it for download
    pub fn last_asset(&self) -> Option<Arc<RenderedAsset>> {
        self.last_asset.clone()
    }

    pub fn preview_graph(&self) -> Option<GraphId> {
        self.preview.as_ref().map(|p| p.graph_id())
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    fn fail<E: Into<EngineError>>(&mut self, err: E) -> EngineError {
        let err = err.into();
        tracing::warn!(error = %err, "session operation failed");
        self.status = SessionStatus::Error;
        self.last_error = Some(err.to_string());
        err
    }

    fn ensure_sink(&mut self) -> Result<&mut Box<dyn PlaybackSink>, PlaybackError> {
        if self.sink.is_none() {
            self.sink = Some((self.sink_factory)()?);
        }
        self.sink.as_mut().ok_or(PlaybackError::NoDevice)
    }

    fn applies(&self, sequencer: &RequestSequencer, ticket: u64) -> bool {
        self.config.superseded_results == SupersededResults::LastToComplete
            || sequencer.is_current(ticket)
    }

    // ========================================================================
    // SLOT TRANSITIONS
    // ========================================================================

    /// Install a new buffer, stopping any preview of the old one
    fn replace_decoded_audio(&mut self, name: Option<String>, audio: Arc<DecodedAudio>) {
        self.replace_preview(None);
        self.replace_last_asset(None);
        self.current = Some(LoadedAudio { name, audio });
        self.status = SessionStatus::Loaded;
        self.last_error = None;
    }

    /// Swap the live preview; the previous one is stopped and disconnected first
    fn replace_preview(&mut self, next: Option<Box<dyn ActivePlayback>>) {
        if let Some(mut previous) = self.preview.take() {
            previous.stop();
            tracing::debug!(graph = previous.graph_id(), "preview torn down");
        }
        self.preview = next;
    }

    fn replace_last_asset(&mut self, next: Option<Arc<RenderedAsset>>) {
        self.last_asset = next;
    }

    // ========================================================================
    // DECODING
    // ========================================================================

    /// Decode `bytes` on the calling thread and make them the current buffer
    pub fn load_bytes(&mut self, name: Option<&str>, bytes: Vec<u8>) -> EngineResult<Arc<DecodedAudio>> {
        let ticket = self.start_decode();
        let result = self.decoder.decode(bytes, name);
        self.finish_decode(ticket, name.map(str::to_string), result)
    }

    pub fn load_file(&mut self, path: &Path) -> EngineResult<Arc<DecodedAudio>> {
        let name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(DecodeError::Io(e))),
        };
        self.load_bytes(name.as_deref(), bytes)
    }

    /// Start decoding on a worker thread; finish with [`Self::commit_decode`]
    pub fn begin_decode(&mut self, name: Option<&str>, bytes: Vec<u8>) -> PendingDecode {
        let ticket = self.start_decode();
        let decoder = self.decoder.clone();
        let name = name.map(str::to_string);
        let hint = name.clone();
        let handle = thread::spawn(move || decoder.decode(bytes, hint.as_deref()));
        PendingDecode {
            ticket,
            name,
            handle,
        }
    }

    /// Wait for a background decode and apply its result
    pub fn commit_decode(&mut self, pending: PendingDecode) -> EngineResult<Arc<DecodedAudio>> {
        let result = match pending.handle.join() {
            Ok(result) => result,
            Err(_) => return Err(self.fail(EngineError::WorkerPanicked("decode"))),
        };
        self.finish_decode(pending.ticket, pending.name, result)
    }

    fn start_decode(&mut self) -> u64 {
        self.status = SessionStatus::Loading;
        if self.sink.is_none() {
            if let Err(e) = self.ensure_sink() {
                // Decoding does not need the device; preview retries later
                tracing::warn!(error = %e, "playback sink unavailable");
            }
        }
        self.decodes.begin()
    }

    fn finish_decode(
        &mut self,
        ticket: u64,
        name: Option<String>,
        result: Result<DecodedAudio, DecodeError>,
    ) -> EngineResult<Arc<DecodedAudio>> {
        if !self.applies(&self.decodes, ticket) {
            tracing::debug!(ticket, latest = self.decodes.latest(), "discarding superseded decode");
            return Err(EngineError::Superseded(ticket));
        }
        match result {
            Ok(audio) => {
                let audio = Arc::new(audio);
                self.replace_decoded_audio(name, audio.clone());
                tracing::info!(
                    ticket,
                    frames = audio.length(),
                    channels = audio.number_of_channels(),
                    "audio loaded"
                );
                Ok(audio)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    // ========================================================================
    // PREVIEW
    // ========================================================================

    /// Play the current buffer through `preset`, replacing any running preview
    pub fn play_preview(&mut self, preset: &EffectPreset) -> EngineResult<GraphId> {
        let Some(audio) = self.decoded() else {
            return Err(PlaybackError::NotLoaded.into());
        };
        if let Err(e) = preset.validate() {
            return Err(self.fail(e));
        }

        // Only one audible graph: the old one goes before the new one is built
        self.replace_preview(None);

        let interpolation = self.config.interpolation;
        let sink = match self.ensure_sink() {
            Ok(sink) => sink,
            Err(e) => return Err(self.fail(e)),
        };
        let started = build_graph(audio, preset, sink.target(), interpolation)
            .map_err(EngineError::from)
            .and_then(|graph| sink.start(graph).map_err(EngineError::from));

        match started {
            Ok(handle) => {
                let id = handle.graph_id();
                self.replace_preview(Some(handle));
                self.status = SessionStatus::Playing;
                tracing::info!(graph = id, preset = %preset.label, "preview playing");
                Ok(id)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Stop the running preview; a no-op when nothing plays
    pub fn stop_preview(&mut self) {
        if self.preview.is_none() {
            return;
        }
        self.replace_preview(None);
        if self.status == SessionStatus::Playing {
            self.status = SessionStatus::Loaded;
        }
    }

    /// Reap a preview whose source reached its end
    pub fn poll_preview(&mut self) -> SessionStatus {
        if self.preview.as_ref().is_some_and(|p| !p.is_playing()) {
            self.stop_preview();
        }
        self.status
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    fn export_source(&mut self) -> EngineResult<LoadedAudio> {
        self.current
            .clone()
            .ok_or(EngineError::NotLoaded)
    }

    /// Render the current buffer through `preset` on the calling thread
    pub fn export(&mut self, preset: &EffectPreset, label: &str) -> EngineResult<Arc<RenderedAsset>> {
        let source = self.export_source()?;
        let ticket = self.exports.begin();
        self.status = SessionStatus::Rendering;
        let result = export_asset(
            source.audio.clone(),
            preset,
            label,
            source.name.as_deref(),
            &self.config,
            None,
        );
        self.finish_export(ticket, &source.audio, result)
    }

    /// Render on a worker thread; finish with [`Self::commit_export`]
    pub fn spawn_export(&mut self, preset: &EffectPreset, label: &str) -> EngineResult<ExportTask> {
        let source = self.export_source()?;
        let ticket = self.exports.begin();
        self.status = SessionStatus::Rendering;

        let progress = Arc::new(RenderProgress::new());
        let worker_progress = progress.clone();
        let config = self.config.clone();
        let preset = preset.clone();
        let label = label.to_string();
        let rendered = source.audio.clone();
        let handle = thread::spawn(move || {
            export_asset(
                source.audio,
                &preset,
                &label,
                source.name.as_deref(),
                &config,
                Some(&worker_progress),
            )
        });

        Ok(ExportTask {
            ticket,
            source: rendered,
            progress,
            handle,
        })
    }

    /// Wait for a background export and publish its asset
    pub fn commit_export(&mut self, task: ExportTask) -> EngineResult<Arc<RenderedAsset>> {
        let result = match task.handle.join() {
            Ok(result) => result,
            Err(_) => return Err(self.fail(EngineError::WorkerPanicked("export"))),
        };
        self.finish_export(task.ticket, &task.source, result)
    }

    fn finish_export(
        &mut self,
        ticket: u64,
        source: &Arc<DecodedAudio>,
        result: Result<RenderedAsset, RenderError>,
    ) -> EngineResult<Arc<RenderedAsset>> {
        if !self.applies(&self.exports, ticket) {
            tracing::debug!(ticket, latest = self.exports.latest(), "discarding superseded export");
            return Err(EngineError::Superseded(ticket));
        }
        let same_buffer = self
            .current
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(&c.audio, source));
        if !same_buffer && self.config.superseded_results == SupersededResults::Discard {
            tracing::debug!(ticket, "discarding export of a buffer that was replaced");
            return Err(EngineError::Superseded(ticket));
        }
        match result {
            Ok(asset) => {
                let asset = Arc::new(asset);
                self.replace_last_asset(Some(asset.clone()));
                self.status = SessionStatus::Done;
                self.last_error = None;
                Ok(asset)
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}

/// Sink factory for the host's default output device
#[cfg(feature = "playback")]
pub fn default_sink_factory(buffer_frames: usize) -> SinkFactory {
    Box::new(move || {
        crate::playback::CpalPlayback::new(buffer_frames)
            .map(|sink| Box::new(sink) as Box<dyn PlaybackSink>)
    })
}

/// Without the `playback` feature there is no device to open
#[cfg(not(feature = "playback"))]
pub fn default_sink_factory(_buffer_frames: usize) -> SinkFactory {
    Box::new(|| Err::<Box<dyn PlaybackSink>, _>(PlaybackError::NoDevice))
}
