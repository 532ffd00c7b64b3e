// Audio effects engine modules
mod api;
mod audio_file;
mod audio_graph;
mod config;
mod effects;
mod error;
mod export;
mod playback;
mod presets;
mod render;
mod session;

pub mod conversion;

// Re-export the engine surface
pub use api::*;
pub use audio_file::*;
pub use audio_graph::*;
pub use config::*;
pub use effects::*;
pub use error::*;
pub use export::*;
pub use playback::*;
pub use presets::*;
pub use render::*;
pub use session::*;
