//! The codec-engine seam the player drives.
//! All demux/decode work happens behind [`MediaEngine`]; the player only
//! sees packets by stream kind and decoded units in buffer-payload form.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::buffer::{BufferKind, Payload};
use crate::core::time::Millis;
use crate::decode::stream_info::MediaInfo;

/// Error type for codec-engine operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("failed to open {path:?}: {reason}")]
    OpenInput { path: PathBuf, reason: String },
    #[error("no playable audio or video stream")]
    NoStream,
    #[error("failed to open {kind:?} codec: {reason}")]
    CodecOpen { kind: BufferKind, reason: String },
    #[error("failed to read packet: {0}")]
    Read(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("seek to {target}ms failed: {reason}")]
    Seek { target: Millis, reason: String },
    #[error("no input is open")]
    NotOpen,
}

/// How decoded video is laid out in buffer payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoOutput {
    /// Keep YUV420P / NV12 / NV21 as decoded; scale anything else to RGBA
    #[default]
    Native,
    /// Scale every frame to RGBA
    ForceRgba,
}

/// Packed PCM sample format of audio payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioSampleFormat {
    /// Signed 16-bit
    #[default]
    S16,
    /// 32-bit float
    F32,
}

impl AudioSampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            AudioSampleFormat::S16 => 2,
            AudioSampleFormat::F32 => 4,
        }
    }
}

/// Everything the engine needs to open and configure a session
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    pub hardware_decode: bool,
    /// Output channel count, already clamped by the caller
    pub audio_channels: u16,
    pub audio_sample_format: AudioSampleFormat,
    pub video_output: VideoOutput,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            hardware_decode: false,
            audio_channels: 2,
            audio_sample_format: AudioSampleFormat::S16,
            video_output: VideoOutput::Native,
        }
    }
}

/// One decoded video frame or audio block, conformed to the output contract
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedUnit {
    pub pts: Millis,
    pub content: Payload,
}

impl DecodedUnit {
    pub fn kind(&self) -> Option<BufferKind> {
        self.content.kind()
    }
}

/// Demux/decode session over one media file.
///
/// Calls are strictly sequential. `read_frame` stages one packet of a
/// selected stream; `decode_packet` consumes the staged packet and appends
/// every unit it produced, in decode order.
pub trait MediaEngine: Send {
    /// Open `path`, select the best audio and video streams and open their codecs
    fn open_input(&mut self, path: &Path, options: &OpenOptions) -> Result<MediaInfo, EngineError>;

    /// Stage the next packet of a selected stream; `None` at end of input
    fn read_frame(&mut self) -> Result<Option<BufferKind>, EngineError>;

    /// Decode the staged packet
    fn decode_packet(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError>;

    /// Flush frames the decoders still hold once input is exhausted
    fn drain(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError>;

    /// Reposition to the keyframe at or before `target` and flush decoder state
    fn seek_to_timestamp(&mut self, target: Millis) -> Result<(), EngineError>;

    /// Tear down codec and demux sessions. Safe to call more than once.
    fn close(&mut self);
}
