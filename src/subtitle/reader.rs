//! Subtitle Packet Reader: pulls raw subtitle packets out of a container
//! without decoding them.

use std::mem;
use std::path::{Path, PathBuf};

use crate::core::time::Millis;
use crate::player::seek::clamp_target;
use crate::player::state::PlayerState;
use crate::subtitle::ffmpeg::FfmpegSubtitleDemuxer;

/// Error type for subtitle reading
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubtitleError {
    #[error("failed to open {path:?}: {reason}")]
    OpenInput { path: PathBuf, reason: String },
    #[error("no subtitle stream found")]
    NoStream,
    #[error("failed to read packet: {0}")]
    Read(String),
    #[error("seek to {target}ms failed: {reason}")]
    Seek { target: Millis, reason: String },
    #[error("operation needs a prepared reader, reader is {0:?}")]
    InvalidState(PlayerState),
    #[error("demuxer is not open")]
    NotOpen,
}

/// One undecoded subtitle packet. Times are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitlePacket {
    pub data: Vec<u8>,
    pub pts: Millis,
    pub duration: Millis,
}

impl SubtitlePacket {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Payload as text, for text-based codecs
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pts = 0;
        self.duration = 0;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleStreamInfo {
    pub index: usize,
    pub codec_name: String,
    pub language: Option<String>,
    pub duration: Millis,
}

/// Outcome of a successful `read_packet`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Packet,
    EndOfStream,
}

/// Container access for the reader
pub trait SubtitleDemuxer: Send {
    /// Open `path` and select its subtitle stream
    fn open(&mut self, path: &Path) -> Result<SubtitleStreamInfo, SubtitleError>;

    /// Read the next packet of the selected stream into `packet`.
    /// Returns `false` at end of input.
    fn read_packet(&mut self, packet: &mut SubtitlePacket) -> Result<bool, SubtitleError>;

    fn seek(&mut self, target: Millis) -> Result<(), SubtitleError>;

    fn close(&mut self);
}

pub struct SubtitleReader {
    demuxer: Box<dyn SubtitleDemuxer>,
    state: PlayerState,
    info: Option<SubtitleStreamInfo>,
    packet: SubtitlePacket,
}

impl SubtitleReader {
    pub fn new() -> Self {
        Self::with_demuxer(Box::new(FfmpegSubtitleDemuxer::new()))
    }

    pub fn with_demuxer(demuxer: Box<dyn SubtitleDemuxer>) -> Self {
        Self {
            demuxer,
            state: PlayerState::Created,
            info: None,
            packet: SubtitlePacket::default(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn stream_info(&self) -> Option<&SubtitleStreamInfo> {
        self.info.as_ref().filter(|_| self.state.is_prepared())
    }

    fn ensure_prepared(&self) -> Result<(), SubtitleError> {
        if self.state.is_prepared() {
            Ok(())
        } else {
            Err(SubtitleError::InvalidState(self.state))
        }
    }

    pub fn prepare(&mut self, path: impl AsRef<Path>) -> Result<&SubtitleStreamInfo, SubtitleError> {
        let path = path.as_ref();
        if !self.state.can_prepare() {
            return Err(SubtitleError::InvalidState(self.state));
        }
        let info = match self.demuxer.open(path) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("subtitle prepare {:?} failed: {}", path, e);
                self.demuxer.close();
                return Err(e);
            }
        };
        log::info!("subtitle stream {} ({}) ready in {:?}", info.index, info.codec_name, path);
        self.packet.clear();
        self.state = PlayerState::Prepared;
        Ok(self.info.insert(info))
    }

    /// Read the next packet into the reader's reusable packet
    pub fn read_packet(&mut self) -> Result<ReadOutcome, SubtitleError> {
        self.ensure_prepared()?;
        self.packet.clear();
        if self.demuxer.read_packet(&mut self.packet)? {
            log::trace!("subtitle packet at {}ms, {} bytes", self.packet.pts, self.packet.size());
            Ok(ReadOutcome::Packet)
        } else {
            Ok(ReadOutcome::EndOfStream)
        }
    }

    /// The packet filled by the last `read_packet`
    pub fn packet(&self) -> &SubtitlePacket {
        &self.packet
    }

    /// Hand the current packet to `target` without copying its payload.
    /// The reader's packet is left empty and reused by the next read.
    pub fn move_packet_ref(&mut self, target: &mut SubtitlePacket) {
        *target = mem::take(&mut self.packet);
    }

    /// Reposition to the packet at or before `target`, clamped to the stream
    pub fn seek_to(&mut self, target: Millis) -> Result<(), SubtitleError> {
        self.ensure_prepared()?;
        let end = self.info.as_ref().map_or(0, |info| info.duration);
        let clamped = clamp_target(target, end);
        self.demuxer.seek(clamped)?;
        self.packet.clear();
        log::debug!("subtitle reader seeked to {}ms", clamped);
        Ok(())
    }

    pub fn release(&mut self) {
        if self.state.is_released() {
            return;
        }
        self.demuxer.close();
        self.packet = SubtitlePacket::default();
        self.info = None;
        self.state = PlayerState::Released;
        log::info!("subtitle reader released");
    }
}

impl Default for SubtitleReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubtitleReader {
    fn drop(&mut self) {
        self.release();
    }
}
