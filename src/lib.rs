//! Media decode core for embedding behind a C boundary.
//!
//! A [`player::Player`] owns one demux/decode session and fills
//! [`buffer::DecodeBuffer`]s with decoded video frames or PCM audio, one
//! unit per `decode` call. [`subtitle::SubtitleReader`] passes raw
//! subtitle packets through. [`ffi`] exposes both as handle-based C functions.

pub mod buffer;
pub mod core;
pub mod decode;
pub mod ffi;
pub mod player;
pub mod runtime;
pub mod subtitle;
pub mod worker;

pub use buffer::{BufferHandle, BufferPool, DecodeBuffer};
pub use decode::{MediaEngine, MediaInfo};
pub use player::{Player, PlayerConfig, PlayerError};
pub use subtitle::SubtitleReader;
pub use worker::DecodeWorker;
