//! Stream metadata extracted from media files.
//! Populated once by `open_input` and immutable until the session closes.

use crate::buffer::{FrameLayout, PixelLayout};
use crate::core::time::{constants, Millis};

/// Information common to video and audio streams
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub duration: Millis,
    pub codec_name: String,
    pub bit_rate: i64,
    /// Stream time base as (num, den)
    pub time_base: (i32, i32),
}

/// Video-specific stream information
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamInfo {
    pub stream_info: StreamInfo,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Pixel format the codec produces
    pub pixel_format: String,
    /// Layout frames are delivered in
    pub output_layout: PixelLayout,
    pub hardware_decoder: Option<String>,
}

impl VideoStreamInfo {
    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout::new(self.output_layout, self.width, self.height)
    }
}

/// Audio-specific stream information.
/// `channels` and `bytes_per_sample` describe the delivered PCM, not the source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStreamInfo {
    pub stream_info: StreamInfo,
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: usize,
    pub source_channels: u16,
    pub sample_format: String,
    pub bit_depth: u32,
}

impl AudioStreamInfo {
    /// PCM byte count for `millis` of output audio
    pub fn bytes_for(&self, millis: Millis) -> usize {
        let frames = self.sample_rate as i64 * millis.max(0) / constants::MILLIS_PER_SECOND;
        frames as usize * self.channels as usize * self.bytes_per_sample
    }
}

/// Everything known about an open media file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    /// Container duration
    pub duration: Millis,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
    /// Container-level tags
    pub metadata: Vec<(String, String)>,
}

impl MediaInfo {
    pub fn contains_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn contains_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Latest valid position; falls back to the longest stream when the container has no duration.
    /// 0 when nothing reports a duration.
    pub fn seekable_end(&self) -> Millis {
        if self.duration > 0 {
            return self.duration;
        }
        let video = self.video.as_ref().map_or(0, |v| v.stream_info.duration);
        let audio = self.audio.as_ref().map_or(0, |a| a.stream_info.duration);
        video.max(audio).max(0)
    }
}
