//! Client side of the remote video-to-anime conversion service
//!
//! The service runs the frame pipeline itself; this module only uploads a
//! video, polls the job and reports where the result can be downloaded.

mod client;
mod poller;
mod wire;

pub use client::*;
pub use poller::*;
pub use wire::*;
