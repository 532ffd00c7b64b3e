//! Export module for offline rendering and file encoding
//!
//! - WAV encoding (16-bit mono PCM, asymmetric quantization)
//! - Rendered asset naming and saving
//! - Progress tracking (polling-based)

mod asset;
mod progress;
mod wav;

pub use asset::*;
pub use progress::*;
pub use wav::*;
