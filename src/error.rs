//! Error taxonomy for the audio engine.
//!
//! Every fallible engine operation returns one of these typed errors. None of
//! them is retried inside the engine: decoding is deterministic and an
//! offline render that failed once is abandoned until the user asks again.

/// Convenience result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Input bytes could not be turned into a [`crate::DecodedAudio`].
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// No registered container/codec recognised the data.
    #[error("unsupported audio format: {0}")]
    Unsupported(String),

    /// The container was recognised but the stream is corrupt.
    #[error("malformed audio stream: {0}")]
    Malformed(String),

    /// The stream decoded cleanly but carried no sample frames.
    #[error("audio stream contains no frames")]
    NoAudio,

    /// Decoded data violates the buffer invariants (rate, channels, lengths).
    #[error("invalid decoded buffer: {0}")]
    InvalidBuffer(String),

    /// Reading the source file failed.
    #[error("failed to read audio source: {0}")]
    Io(#[from] std::io::Error),
}

/// The offline render pipeline could not produce an asset.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Playback rate must be finite and strictly positive.
    #[error("invalid pitch factor {0}: must be finite and greater than zero")]
    InvalidPitch(f64),

    /// The computed output would hold zero frames.
    #[error("render would produce no output frames")]
    EmptyOutput,

    /// The computed output exceeds the configured render limit.
    #[error("render of {frames} frames exceeds the limit of {limit} frames")]
    TooLong { frames: u64, limit: u64 },

    /// The sinc resampler rejected the buffer.
    #[error("resampler failed: {0}")]
    Resampler(String),

    /// Writing the PCM container failed.
    #[error("failed to encode WAV container: {0}")]
    Encode(#[from] hound::Error),
}

/// Realtime preview could not be started.
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    /// No audio buffer has been decoded yet.
    #[error("no audio loaded")]
    NotLoaded,

    /// The host exposes no output device.
    #[error("no output device available")]
    NoDevice,

    /// The host audio stream failed to build or start.
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Talking to the remote conversion service failed.
#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    /// Connection, TLS or request body failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status code.
    #[error("service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the wire contract.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Top-level error returned by session-level operations.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// An export was requested before any audio was decoded.
    #[error("no audio loaded to export")]
    NotLoaded,

    /// A newer request replaced this one before it finished.
    #[error("request {0} was superseded by a newer request")]
    Superseded(u64),

    /// A background decode or render thread panicked.
    #[error("{0} worker terminated unexpectedly")]
    WorkerPanicked(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_wraps_render_error_message() {
        let err: EngineError = RenderError::InvalidPitch(0.0).into();
        assert_eq!(
            err.to_string(),
            "invalid pitch factor 0: must be finite and greater than zero"
        );
        assert!(matches!(err, EngineError::Render(RenderError::InvalidPitch(_))));
    }

    #[test]
    fn test_too_long_reports_both_counts() {
        let err = RenderError::TooLong {
            frames: 10,
            limit: 5,
        };
        assert_eq!(err.to_string(), "render of 10 frames exceeds the limit of 5 frames");
    }

    #[test]
    fn test_superseded_and_worker_messages() {
        assert_eq!(
            EngineError::Superseded(3).to_string(),
            "request 3 was superseded by a newer request"
        );
        assert_eq!(EngineError::NotLoaded.to_string(), "no audio loaded to export");
        assert_eq!(
            EngineError::WorkerPanicked("export").to_string(),
            "export worker terminated unexpectedly"
        );
    }

    #[test]
    fn test_io_error_converts_into_decode_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wav");
        let err: DecodeError = io.into();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
