pub mod convert;
pub mod engine;
pub mod ffmpeg;
pub mod hwaccel;
pub mod stream_info;

#[cfg(test)]
pub(crate) mod scripted;

pub use engine::{AudioSampleFormat, DecodedUnit, EngineError, MediaEngine, OpenOptions, VideoOutput};
pub use ffmpeg::FfmpegEngine;
pub use stream_info::{AudioStreamInfo, MediaInfo, StreamInfo, VideoStreamInfo};
