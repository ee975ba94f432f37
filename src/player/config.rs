//! Player configuration.

use crate::core::time::Millis;
use crate::decode::{AudioSampleFormat, OpenOptions, VideoOutput};

/// Output channel counts the player delivers (mono or stereo)
pub const MIN_AUDIO_CHANNELS: u16 = 1;
pub const MAX_AUDIO_CHANNELS: u16 = 2;

/// Player settings. Hardware decoding and the output channel count are
/// chosen per `prepare` call, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub video_output: VideoOutput,
    pub audio_sample_format: AudioSampleFormat,
    /// Span of audio a pre-sized audio buffer holds
    pub audio_prealloc_millis: Millis,
    /// Decoded units held for later `decode` calls before the oldest are dropped
    pub max_pending_units: usize,
    /// Units a filling seek may decode before giving up on reaching the target
    pub max_seek_decode_units: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video_output: VideoOutput::Native,
            audio_sample_format: AudioSampleFormat::S16,
            audio_prealloc_millis: 100,
            max_pending_units: 256,
            max_seek_decode_units: 4096,
        }
    }
}

impl PlayerConfig {
    /// Engine options for one `prepare` call
    pub fn open_options(&self, hardware_decode: bool, audio_channels: i32) -> OpenOptions {
        OpenOptions {
            hardware_decode,
            audio_channels: clamp_channels(audio_channels),
            audio_sample_format: self.audio_sample_format,
            video_output: self.video_output,
        }
    }
}

/// Clamp a requested channel count to what the player can deliver
pub fn clamp_channels(requested: i32) -> u16 {
    requested.clamp(MIN_AUDIO_CHANNELS as i32, MAX_AUDIO_CHANNELS as i32) as u16
}
