//! Conversion of decoded FFmpeg frames into buffer payloads.
//! Video planes are copied row by row without stride padding; audio is
//! resampled into packed PCM at the configured channel count.

use ffmpeg_next::format::{sample::Type as SampleType, Pixel, Sample};
use ffmpeg_next::software::{resampling, scaling};
use ffmpeg_next::util::frame::{audio::Audio as AudioFrame, video::Video as VideoFrame};
use ffmpeg_next::ChannelLayout;

use crate::buffer::{AudioPayload, FrameLayout, PixelLayout, VideoPayload, VideoPlanes};
use crate::decode::engine::{AudioSampleFormat, EngineError, VideoOutput};

/// Layout a decoder pixel format is delivered in under `output`
pub fn output_layout(source: Pixel, output: VideoOutput) -> PixelLayout {
    if output == VideoOutput::ForceRgba {
        return PixelLayout::Rgba;
    }
    match source {
        Pixel::YUV420P | Pixel::YUVJ420P => PixelLayout::Yuv420p,
        Pixel::NV12 => PixelLayout::Nv12,
        Pixel::NV21 => PixelLayout::Nv21,
        _ => PixelLayout::Rgba,
    }
}

/// Copy `rows` rows of `row_bytes` from a strided plane into `dst`
pub fn pack_plane(src: &[u8], stride: usize, row_bytes: usize, rows: usize, dst: &mut Vec<u8>) {
    dst.clear();
    if stride == 0 {
        return;
    }
    dst.reserve(row_bytes * rows);
    for row in src.chunks(stride).take(rows) {
        dst.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
}

/// Scaler cache key: source format and dimensions
type ScaleKey = (Pixel, u32, u32);

/// Turns decoded video frames into [`VideoPayload`]s
pub struct VideoConverter {
    output: VideoOutput,
    scaler: Option<(ScaleKey, scaling::Context)>,
}

impl VideoConverter {
    pub fn new(output: VideoOutput) -> Self {
        Self { output, scaler: None }
    }

    pub fn convert(&mut self, frame: &VideoFrame) -> Result<VideoPayload, EngineError> {
        let (width, height) = (frame.width(), frame.height());
        let layout = FrameLayout::new(output_layout(frame.format(), self.output), width, height);
        let (cw, ch) = layout.chroma_size();
        let (w, h, cw, ch) = (width as usize, height as usize, cw as usize, ch as usize);

        let mut payload = VideoPayload::allocate(&FrameLayout::new(layout.layout, 0, 0));
        payload.width = width;
        payload.height = height;
        match &mut payload.planes {
            VideoPlanes::Yuv420p { y, u, v } => {
                pack_plane(frame.data(0), frame.stride(0), w, h, y);
                pack_plane(frame.data(1), frame.stride(1), cw, ch, u);
                pack_plane(frame.data(2), frame.stride(2), cw, ch, v);
            }
            VideoPlanes::Nv12 { y, uv } | VideoPlanes::Nv21 { y, uv } => {
                pack_plane(frame.data(0), frame.stride(0), w, h, y);
                pack_plane(frame.data(1), frame.stride(1), cw * 2, ch, uv);
            }
            VideoPlanes::Rgba { rgba } => {
                let scaled = self.scale_frame(frame)?;
                pack_plane(scaled.data(0), scaled.stride(0), w * 4, h, rgba);
            }
        }
        Ok(payload)
    }

    /// Scale a frame to RGBA at its own size, rebuilding the scaler when the source changes
    pub fn scale_frame(&mut self, frame: &VideoFrame) -> Result<VideoFrame, EngineError> {
        let key = (frame.format(), frame.width(), frame.height());
        if self.scaler.as_ref().map(|(k, _)| *k) != Some(key) {
            let scaler = scaling::Context::get(
                key.0,
                key.1,
                key.2,
                Pixel::RGBA,
                key.1,
                key.2,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| EngineError::Decode(format!("failed to create scaler: {}", e)))?;
            log::debug!("scaler initialized: {:?} {}x{} -> RGBA", key.0, key.1, key.2);
            self.scaler = Some((key, scaler));
        }

        let mut scaled = VideoFrame::empty();
        if let Some((_, scaler)) = self.scaler.as_mut() {
            scaler
                .run(frame, &mut scaled)
                .map_err(|e| EngineError::Decode(format!("failed to scale frame: {}", e)))?;
        }
        Ok(scaled)
    }
}

/// Resampler cache key: source format, layout and rate
type ResampleKey = (Sample, ChannelLayout, u32);

/// Turns decoded audio frames into packed PCM [`AudioPayload`]s
pub struct AudioConverter {
    channels: u16,
    format: AudioSampleFormat,
    resampler: Option<(ResampleKey, resampling::Context)>,
}

impl AudioConverter {
    pub fn new(channels: u16, format: AudioSampleFormat) -> Self {
        Self {
            channels,
            format,
            resampler: None,
        }
    }

    fn target_sample(&self) -> Sample {
        match self.format {
            AudioSampleFormat::S16 => Sample::I16(SampleType::Packed),
            AudioSampleFormat::F32 => Sample::F32(SampleType::Packed),
        }
    }

    pub fn convert(&mut self, frame: &AudioFrame) -> Result<AudioPayload, EngineError> {
        let mut layout = frame.channel_layout();
        if layout.is_empty() {
            layout = ChannelLayout::default(frame.channels() as i32);
        }
        let key = (frame.format(), layout, frame.rate());

        if self.resampler.as_ref().map(|(k, _)| *k) != Some(key) {
            let resampler = resampling::Context::get(
                key.0,
                key.1,
                key.2,
                self.target_sample(),
                ChannelLayout::default(self.channels as i32),
                key.2,
            )
            .map_err(|e| EngineError::Decode(format!("failed to create resampler: {}", e)))?;
            log::debug!(
                "resampler initialized: {:?} {}ch @ {}Hz -> {:?} {}ch",
                key.0,
                frame.channels(),
                key.2,
                self.format,
                self.channels
            );
            self.resampler = Some((key, resampler));
        }

        let mut resampled = AudioFrame::empty();
        if let Some((_, resampler)) = self.resampler.as_mut() {
            resampler
                .run(frame, &mut resampled)
                .map_err(|e| EngineError::Decode(format!("resampling failed: {}", e)))?;
        }

        let bytes = resampled.samples() * self.channels as usize * self.format.bytes_per_sample();
        let data = if resampled.samples() > 0 { resampled.data(0) } else { &[] };
        Ok(AudioPayload {
            pcm: data[..bytes.min(data.len())].to_vec(),
        })
    }
}

/// Human-readable name of a sample format, e.g. `fltp`
pub fn sample_format_name(format: Sample) -> String {
    if format == Sample::None {
        return "none".to_string();
    }
    format.name().to_string()
}

/// Human-readable name of a pixel format, e.g. `yuv420p`
pub fn pixel_format_name(format: Pixel) -> String {
    format!("{:?}", format).to_lowercase()
}

/// Bit depth of a source sample format; 0 when unknown
pub fn sample_bit_depth(format: Sample) -> u32 {
    if format == Sample::None {
        return 0;
    }
    (format.bytes() * 8) as u32
}
