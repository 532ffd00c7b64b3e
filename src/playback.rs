/// Realtime preview output
///
/// A [`PlaybackSink`] owns the output side of the engine and is created once
/// per session. Each preview hands it a freshly built [`RenderGraph`] and gets
/// back an [`ActivePlayback`] handle used to stop it.
use crate::audio_graph::{GraphId, GraphTarget, RenderGraph};
use crate::error::PlaybackError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Something that can play render graphs
pub trait PlaybackSink: Send {
    /// Rate and channel layout graphs must be built for
    fn target(&self) -> GraphTarget;

    /// Start playing `graph` from its first frame
    fn start(&mut self, graph: RenderGraph) -> Result<Box<dyn ActivePlayback>, PlaybackError>;
}

/// Handle to a playing graph
pub trait ActivePlayback: Send {
    fn graph_id(&self) -> GraphId;

    /// False once the source has ended or the handle was stopped
    fn is_playing(&self) -> bool;

    /// Stop the source and disconnect the graph. Calling it again is a no-op.
    fn stop(&mut self);
}

// ============================================================================
// CAPTURE SINK
// ============================================================================

/// Sink that renders each graph straight into memory instead of a device
///
/// Useful where no output device exists (headless hosts, tests). Each started
/// graph is pulled until its source ends and the interleaved frames are kept.
pub struct CaptureSink {
    target: GraphTarget,
    /// Upper bound on frames captured per graph
    max_frames: usize,
    captures: Arc<Mutex<Vec<Capture>>>,
}

/// Frames captured from one graph
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub graph_id: GraphId,
    pub samples: Vec<f32>,
}

impl CaptureSink {
    pub fn new(target: GraphTarget, max_frames: usize) -> Self {
        Self {
            target,
            max_frames,
            captures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of every capture made so far, oldest first
    pub fn captures(&self) -> Arc<Mutex<Vec<Capture>>> {
        self.captures.clone()
    }
}

impl PlaybackSink for CaptureSink {
    fn target(&self) -> GraphTarget {
        self.target
    }

    fn start(&mut self, mut graph: RenderGraph) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
        let channels = self.target.channels.max(1);
        let quantum = 128;
        let mut samples = Vec::new();
        let mut frame_buf = vec![0.0f32; quantum * channels];

        while !graph.is_ended() && samples.len() / channels < self.max_frames {
            graph.render(&mut frame_buf);
            samples.extend_from_slice(&frame_buf);
        }
        samples.truncate(self.max_frames * channels);

        let graph_id = graph.id();
        graph.disconnect();
        self.captures.lock().push(Capture { graph_id, samples });

        Ok(Box::new(FinishedPlayback { graph_id }))
    }
}

/// Handle for a graph that already played to completion
struct FinishedPlayback {
    graph_id: GraphId,
}

impl ActivePlayback for FinishedPlayback {
    fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    fn is_playing(&self) -> bool {
        false
    }

    fn stop(&mut self) {}
}

// ============================================================================
// CPAL SINK
// ============================================================================

#[cfg(feature = "playback")]
pub use device::CpalPlayback;

#[cfg(feature = "playback")]
mod device {
    use super::{ActivePlayback, PlaybackSink};
    use crate::audio_graph::{GraphId, GraphTarget, RenderGraph};
    use crate::error::PlaybackError;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use ringbuf::traits::{Consumer, Observer, Producer, Split};
    use ringbuf::HeapRb;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    /// Frames rendered per push into the ring buffer
    const RENDER_CHUNK_FRAMES: usize = 256;

    /// Default output device of the default cpal host
    pub struct CpalPlayback {
        sample_rate: u32,
        channels: usize,
        buffer_frames: usize,
    }

    impl CpalPlayback {
        /// Query the default output device for its rate and channel count
        pub fn new(buffer_frames: usize) -> Result<Self, PlaybackError> {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
            let config = device
                .default_output_config()
                .map_err(|e| PlaybackError::Stream(e.to_string()))?;

            let device_name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
            tracing::info!(
                device = %device_name,
                sample_rate = config.sample_rate().0,
                channels = config.channels(),
                "opened playback device"
            );

            Ok(Self {
                sample_rate: config.sample_rate().0,
                channels: config.channels() as usize,
                buffer_frames: buffer_frames.max(RENDER_CHUNK_FRAMES * 2),
            })
        }
    }

    impl PlaybackSink for CpalPlayback {
        fn target(&self) -> GraphTarget {
            GraphTarget::realtime(self.sample_rate, self.channels)
        }

        fn start(&mut self, mut graph: RenderGraph) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
            let graph_id = graph.id();
            let channels = self.channels;
            let sample_rate = self.sample_rate;
            let rb = HeapRb::<f32>::new(self.buffer_frames * channels);
            let (mut producer, mut consumer) = rb.split();

            let stopped = Arc::new(AtomicBool::new(false));
            let rendered_all = Arc::new(AtomicBool::new(false));
            let drained = Arc::new(AtomicBool::new(false));

            // Render thread: keeps the ring buffer topped up until the source ends
            let render_stopped = stopped.clone();
            let render_done = rendered_all.clone();
            let render_thread = thread::spawn(move || {
                let mut chunk = vec![0.0f32; RENDER_CHUNK_FRAMES * channels];
                while !render_stopped.load(Ordering::SeqCst) {
                    if graph.is_ended() {
                        break;
                    }
                    if producer.vacant_len() < chunk.len() {
                        thread::sleep(Duration::from_millis(2));
                        continue;
                    }
                    graph.render(&mut chunk);
                    producer.push_slice(&chunk);
                }
                graph.disconnect();
                render_done.store(true, Ordering::SeqCst);
            });

            // Stream thread: owns the cpal stream, which must stay on one thread
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), PlaybackError>>();
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            let cb_done = rendered_all.clone();
            let cb_drained = drained.clone();
            let stream_thread = thread::spawn(move || {
                let stream = (|| {
                    let device = cpal::default_host()
                        .default_output_device()
                        .ok_or(PlaybackError::NoDevice)?;
                    let config = cpal::StreamConfig {
                        channels: channels as u16,
                        sample_rate: cpal::SampleRate(sample_rate),
                        buffer_size: cpal::BufferSize::Default,
                    };
                    let stream = device
                        .build_output_stream(
                            &config,
                            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                                let read = consumer.pop_slice(data);
                                data[read..].fill(0.0);
                                if read == 0 && cb_done.load(Ordering::SeqCst) {
                                    cb_drained.store(true, Ordering::SeqCst);
                                }
                            },
                            |err| tracing::error!(error = %err, "audio stream error"),
                            None,
                        )
                        .map_err(|e| PlaybackError::Stream(e.to_string()))?;
                    stream.play().map_err(|e| PlaybackError::Stream(e.to_string()))?;
                    Ok::<_, PlaybackError>(stream)
                })();

                match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Blocks until stop() sends or the handle is dropped
                        let _ = stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            });

            let mut handle = CpalPreview {
                graph_id,
                stop_tx: Some(stop_tx),
                stopped,
                drained,
                threads: vec![render_thread, stream_thread],
            };

            match ready_rx.recv() {
                Ok(Ok(())) => {
                    tracing::debug!(graph = graph_id, "preview started");
                    Ok(Box::new(handle))
                }
                Ok(Err(e)) => {
                    handle.stop();
                    Err(e)
                }
                Err(_) => {
                    handle.stop();
                    Err(PlaybackError::Stream("stream thread exited".into()))
                }
            }
        }
    }

    /// A preview playing on the device
    struct CpalPreview {
        graph_id: GraphId,
        stop_tx: Option<mpsc::Sender<()>>,
        stopped: Arc<AtomicBool>,
        drained: Arc<AtomicBool>,
        threads: Vec<JoinHandle<()>>,
    }

    impl ActivePlayback for CpalPreview {
        fn graph_id(&self) -> GraphId {
            self.graph_id
        }

        fn is_playing(&self) -> bool {
            !self.stopped.load(Ordering::SeqCst) && !self.drained.load(Ordering::SeqCst)
        }

        fn stop(&mut self) {
            let Some(stop_tx) = self.stop_tx.take() else {
                return;
            };
            self.stopped.store(true, Ordering::SeqCst);
            let _ = stop_tx.send(());
            for handle in self.threads.drain(..) {
                if handle.join().is_err() {
                    tracing::warn!(graph = self.graph_id, "preview thread panicked");
                }
            }
            tracing::debug!(graph = self.graph_id, "preview stopped");
        }
    }

    impl Drop for CpalPreview {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
