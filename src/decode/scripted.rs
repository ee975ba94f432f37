//! In-memory [`MediaEngine`] that plays back a fixed packet script.
//! Used by the player and worker tests in place of real media files.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{AudioPayload, BufferKind, FrameLayout, Payload, PixelLayout, VideoPayload};
use crate::core::time::Millis;
use crate::decode::engine::{DecodedUnit, EngineError, MediaEngine, OpenOptions};
use crate::decode::stream_info::{AudioStreamInfo, MediaInfo, StreamInfo, VideoStreamInfo};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;
pub const AUDIO_BLOCK_MS: Millis = 50;
pub const AUDIO_BLOCK_BYTES: usize = 64;

#[derive(Debug, Clone)]
pub enum Outcome {
    Units(Vec<DecodedUnit>),
    Corrupt,
}

#[derive(Debug, Clone)]
pub struct ScriptPacket {
    pub kind: BufferKind,
    pub pts: Millis,
    pub keyframe: bool,
    pub outcome: Outcome,
}

/// What the engine was asked to do, for assertions after it moved into a player
#[derive(Debug, Default)]
pub struct EngineLog {
    pub opens: u32,
    pub closes: u32,
    pub seeks: Vec<Millis>,
    pub options: Option<OpenOptions>,
}

pub fn video_unit(pts: Millis) -> DecodedUnit {
    let mut video = VideoPayload::allocate(&FrameLayout::new(PixelLayout::Yuv420p, WIDTH, HEIGHT));
    if let crate::buffer::VideoPlanes::Yuv420p { y, .. } = &mut video.planes {
        y.fill(pts as u8);
    }
    DecodedUnit {
        pts,
        content: Payload::Video(video),
    }
}

pub fn audio_unit(pts: Millis) -> DecodedUnit {
    DecodedUnit {
        pts,
        content: Payload::Audio(AudioPayload {
            pcm: vec![1; AUDIO_BLOCK_BYTES],
        }),
    }
}

fn packet(kind: BufferKind, pts: Millis, keyframe: bool) -> ScriptPacket {
    let unit = match kind {
        BufferKind::Video => video_unit(pts),
        BufferKind::Audio => audio_unit(pts),
    };
    ScriptPacket {
        kind,
        pts,
        keyframe,
        outcome: Outcome::Units(vec![unit]),
    }
}

fn stream(index: usize, duration: Millis) -> StreamInfo {
    StreamInfo {
        index,
        duration,
        codec_name: "scripted".into(),
        bit_rate: 0,
        time_base: (1, 1000),
    }
}

pub fn video_info(duration: Millis, fps: f64) -> VideoStreamInfo {
    VideoStreamInfo {
        stream_info: stream(0, duration),
        width: WIDTH,
        height: HEIGHT,
        fps,
        pixel_format: "yuv420p".into(),
        output_layout: PixelLayout::Yuv420p,
        hardware_decoder: None,
    }
}

pub fn audio_info(duration: Millis) -> AudioStreamInfo {
    AudioStreamInfo {
        stream_info: stream(1, duration),
        sample_rate: 44_100,
        channels: 2,
        bytes_per_sample: 2,
        source_channels: 2,
        sample_format: "s16".into(),
        bit_depth: 16,
    }
}

pub struct ScriptedEngine {
    info: MediaInfo,
    packets: Vec<ScriptPacket>,
    held: Vec<DecodedUnit>,
    open_error: Option<EngineError>,
    cursor: usize,
    staged: Option<usize>,
    open: bool,
    drained: bool,
    log: Arc<Mutex<EngineLog>>,
}

impl ScriptedEngine {
    pub fn new(info: MediaInfo, packets: Vec<ScriptPacket>) -> Self {
        Self {
            info,
            packets,
            held: Vec::new(),
            open_error: None,
            cursor: 0,
            staged: None,
            open: false,
            drained: false,
            log: Arc::new(Mutex::new(EngineLog::default())),
        }
    }

    /// `frames` video frames at `fps` with a keyframe every `gop` frames,
    /// interleaved with 50ms audio blocks covering the same span
    pub fn av_file(frames: usize, fps: f64, gop: usize) -> Self {
        let interval = 1000.0 / fps;
        let duration = (frames as f64 * interval).round() as Millis;
        let mut packets: Vec<ScriptPacket> = (0..frames)
            .map(|i| packet(BufferKind::Video, (i as f64 * interval) as Millis, i % gop == 0))
            .collect();
        packets.extend(
            (0..duration / AUDIO_BLOCK_MS).map(|i| packet(BufferKind::Audio, i * AUDIO_BLOCK_MS, true)),
        );
        // container order: by pts, audio first on ties
        packets.sort_by_key(|p| (p.pts, p.kind == BufferKind::Video));

        let info = MediaInfo {
            duration,
            video: Some(video_info(duration, fps)),
            audio: Some(audio_info(duration)),
            metadata: vec![("title".into(), "scripted".into())],
        };
        Self::new(info, packets)
    }

    pub fn video_only(frames: usize, fps: f64, gop: usize) -> Self {
        let mut engine = Self::av_file(frames, fps, gop);
        engine.packets.retain(|p| p.kind == BufferKind::Video);
        engine.info.audio = None;
        engine
    }

    pub fn audio_only(blocks: usize) -> Self {
        let duration = blocks as Millis * AUDIO_BLOCK_MS;
        let packets = (0..blocks)
            .map(|i| packet(BufferKind::Audio, i as Millis * AUDIO_BLOCK_MS, true))
            .collect();
        let info = MediaInfo {
            duration,
            audio: Some(audio_info(duration)),
            ..Default::default()
        };
        Self::new(info, packets)
    }

    pub fn with_open_error(mut self, err: EngineError) -> Self {
        self.open_error = Some(err);
        self
    }

    /// Report no duration for the container or any stream
    pub fn with_unknown_duration(mut self) -> Self {
        self.info.duration = 0;
        if let Some(video) = self.info.video.as_mut() {
            video.stream_info.duration = 0;
        }
        if let Some(audio) = self.info.audio.as_mut() {
            audio.stream_info.duration = 0;
        }
        self
    }

    /// Units the decoder only releases when drained at end of input
    pub fn with_held_units(mut self, units: Vec<DecodedUnit>) -> Self {
        self.held = units;
        self
    }

    /// Make the packet at `index` fail to decode
    pub fn with_corrupt_packet(mut self, index: usize) -> Self {
        self.packets[index].outcome = Outcome::Corrupt;
        self
    }

    /// Make the packet at `index` decode to `units`
    pub fn with_packet_units(mut self, index: usize, units: Vec<DecodedUnit>) -> Self {
        self.packets[index].outcome = Outcome::Units(units);
        self
    }

    pub fn packets(&self) -> &[ScriptPacket] {
        &self.packets
    }

    pub fn log(&self) -> Arc<Mutex<EngineLog>> {
        self.log.clone()
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.open {
            Ok(())
        } else {
            Err(EngineError::NotOpen)
        }
    }
}

impl MediaEngine for ScriptedEngine {
    fn open_input(&mut self, _path: &Path, options: &OpenOptions) -> Result<MediaInfo, EngineError> {
        if let Some(err) = self.open_error.clone() {
            return Err(err);
        }
        {
            let mut log = self.log.lock();
            log.opens += 1;
            log.options = Some(options.clone());
        }
        self.open = true;
        self.cursor = 0;

        let mut info = self.info.clone();
        if let Some(audio) = info.audio.as_mut() {
            audio.channels = options.audio_channels;
            audio.bytes_per_sample = options.audio_sample_format.bytes_per_sample();
        }
        Ok(info)
    }

    fn read_frame(&mut self) -> Result<Option<BufferKind>, EngineError> {
        self.ensure_open()?;
        let Some(packet) = self.packets.get(self.cursor) else {
            return Ok(None);
        };
        self.staged = Some(self.cursor);
        self.cursor += 1;
        Ok(Some(packet.kind))
    }

    fn decode_packet(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError> {
        self.ensure_open()?;
        let Some(index) = self.staged.take() else {
            return Ok(());
        };
        match &self.packets[index].outcome {
            Outcome::Units(units) => {
                out.extend(units.iter().cloned());
                Ok(())
            }
            Outcome::Corrupt => Err(EngineError::Decode(format!("corrupt packet {}", index))),
        }
    }

    fn drain(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError> {
        self.ensure_open()?;
        if !self.drained {
            out.extend(self.held.iter().cloned());
            self.drained = true;
        }
        Ok(())
    }

    fn seek_to_timestamp(&mut self, target: Millis) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.log.lock().seeks.push(target);
        let anchor = if self.info.video.is_some() { BufferKind::Video } else { BufferKind::Audio };
        self.cursor = self
            .packets
            .iter()
            .rposition(|p| p.kind == anchor && p.keyframe && p.pts <= target)
            .unwrap_or(0);
        self.staged = None;
        self.drained = false;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.log.lock().closes += 1;
        }
    }
}
