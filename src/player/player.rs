//! Player Context: owns one demux/decode session and fills caller buffers.
//!
//! Lifecycle is `Created -> Prepared -> Released`. Each `decode` call
//! delivers exactly one decoded unit in container read order. Units a
//! packet produced beyond that are queued for later calls, or written
//! straight into provider buffers when a [`BufferProvider`] is attached.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use crate::buffer::{Binding, BufferError, BufferHandle, BufferKind, BufferPool, DecodeBuffer, FrameLayout};
use crate::decode::{DecodedUnit, EngineError, FfmpegEngine, MediaEngine, MediaInfo};
use crate::player::config::PlayerConfig;
use crate::player::provider::{BufferProvider, ProviderLink};
use crate::player::state::PlayerState;

/// Error type for player operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    #[error("operation needs a prepared player, player is {0:?}")]
    InvalidState(PlayerState),
    #[error("prepare failed: {0}")]
    Setup(EngineError),
    #[error("decode failed: {0}")]
    Decode(EngineError),
    #[error("seek failed: {0}")]
    Seek(EngineError),
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// What one `decode` or filling seek hands to a buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Unit(DecodedUnit),
    EndOfStream(BufferKind),
}

impl Delivery {
    pub fn write_into(&self, buffer: &mut DecodeBuffer) -> Result<(), BufferError> {
        match self {
            Delivery::Unit(unit) => buffer.fill(unit.pts, &unit.content),
            Delivery::EndOfStream(kind) => {
                buffer.mark_last_frame(*kind);
                Ok(())
            }
        }
    }
}

pub struct Player {
    pub(super) engine: Box<dyn MediaEngine>,
    pub(super) config: PlayerConfig,
    pub(super) state: PlayerState,
    pub(super) info: Option<MediaInfo>,
    pub(super) pending: VecDeque<DecodedUnit>,
    pub(super) input_exhausted: bool,
    pub(super) drained: bool,
    provider: Option<ProviderLink>,
}

impl Player {
    /// Player backed by FFmpeg
    pub fn new(config: PlayerConfig) -> Self {
        Self::with_engine(Box::new(FfmpegEngine::new()), config)
    }

    pub fn with_engine(engine: Box<dyn MediaEngine>, config: PlayerConfig) -> Self {
        Self {
            engine,
            config,
            state: PlayerState::Created,
            info: None,
            pending: VecDeque::new(),
            input_exhausted: false,
            drained: false,
            provider: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Stream metadata; `None` unless prepared
    pub fn media_info(&self) -> Option<&MediaInfo> {
        self.info.as_ref().filter(|_| self.state.is_prepared())
    }

    pub(super) fn ensure_prepared(&self) -> Result<(), PlayerError> {
        if self.state.is_prepared() {
            Ok(())
        } else {
            Err(PlayerError::InvalidState(self.state))
        }
    }

    /// Open `path` and its best audio and video streams.
    ///
    /// Only valid in `Created`. A failed attempt leaves the player in
    /// `Created` with no session open.
    pub fn prepare(
        &mut self,
        path: impl AsRef<Path>,
        hardware_decode: bool,
        audio_channels: i32,
    ) -> Result<&MediaInfo, PlayerError> {
        let path = path.as_ref();
        if !self.state.can_prepare() {
            log::warn!("prepare rejected: player is {:?}", self.state);
            return Err(PlayerError::InvalidState(self.state));
        }

        let options = self.config.open_options(hardware_decode, audio_channels);
        let info = match self.engine.open_input(path, &options) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("prepare {:?} failed: {}", path, e);
                self.engine.close();
                return Err(PlayerError::Setup(e));
            }
        };

        log::info!(
            "prepared {:?}: {}ms, video={}, audio={}",
            path,
            info.duration,
            info.contains_video(),
            info.contains_audio()
        );
        self.pending.clear();
        self.input_exhausted = false;
        self.drained = false;
        self.state = PlayerState::Prepared;
        Ok(self.info.insert(info))
    }

    pub(super) fn has_stream(&self, kind: BufferKind) -> bool {
        self.info.as_ref().is_some_and(|info| match kind {
            BufferKind::Video => info.contains_video(),
            BufferKind::Audio => info.contains_audio(),
        })
    }

    /// Kind a generic buffer stands for: video when the file has it
    pub(super) fn primary_kind(&self) -> BufferKind {
        if self.has_stream(BufferKind::Video) {
            BufferKind::Video
        } else {
            BufferKind::Audio
        }
    }

    /// Pull the next unit of `want` (any kind when `None`), reading and
    /// decoding packets as needed. `None` once that kind is drained.
    pub(super) fn next_unit(&mut self, want: Option<BufferKind>) -> Result<Option<DecodedUnit>, PlayerError> {
        if let Some(kind) = want {
            if !self.has_stream(kind) {
                return Ok(None);
            }
        }
        loop {
            let matches = |u: &DecodedUnit| want.is_none() || u.kind() == want;
            if let Some(index) = self.pending.iter().position(matches) {
                return Ok(self.pending.remove(index));
            }
            if self.drained {
                return Ok(None);
            }
            if self.input_exhausted {
                self.engine.drain(&mut self.pending).map_err(PlayerError::Decode)?;
                self.drained = true;
                log::debug!("decoders drained, {} units left", self.pending.len());
                continue;
            }

            match self.engine.read_frame().map_err(PlayerError::Decode)? {
                Some(kind) => {
                    if let Err(e) = self.engine.decode_packet(&mut self.pending) {
                        log::warn!("dropping undecodable {:?} packet: {}", kind, e);
                        return Err(PlayerError::Decode(e));
                    }
                    self.trim_pending(want);
                }
                None => {
                    log::debug!("end of input");
                    self.input_exhausted = true;
                }
            }
        }
    }

    /// Keep the queue bounded, dropping the oldest units `want` does not need
    fn trim_pending(&mut self, want: Option<BufferKind>) {
        while self.pending.len() > self.config.max_pending_units {
            let victim = self
                .pending
                .iter()
                .position(|u| want.is_none() || u.kind() != want)
                .unwrap_or(0);
            if let Some(unit) = self.pending.remove(victim) {
                log::warn!("pending queue full, dropped {:?} unit at {}ms", unit.kind(), unit.pts);
            }
        }
    }

    /// Produce what the next `decode` into a buffer with `binding` receives
    pub fn next_delivery(&mut self, binding: Binding) -> Result<Delivery, PlayerError> {
        self.ensure_prepared()?;
        let want = match binding {
            Binding::Generic => None,
            Binding::Pinned(kind) => Some(kind),
        };
        let delivery = match self.next_unit(want)? {
            Some(unit) => {
                log::trace!("delivering {:?} unit at {}ms", unit.kind(), unit.pts);
                Delivery::Unit(unit)
            }
            None => Delivery::EndOfStream(want.unwrap_or_else(|| self.primary_kind())),
        };
        self.hand_off_to_provider();
        Ok(delivery)
    }

    /// Decode the next unit into `buffer`.
    ///
    /// At end of stream the buffer is marked as last frame and the call
    /// succeeds; every later call does the same.
    pub fn decode(&mut self, buffer: &mut DecodeBuffer) -> Result<(), PlayerError> {
        let delivery = self.next_delivery(buffer.binding())?;
        delivery.write_into(buffer)?;
        Ok(())
    }

    /// [`Player::decode`] into a pooled buffer. The pool lock is only held while writing.
    pub fn decode_handle(&mut self, pool: &BufferPool, handle: BufferHandle) -> Result<(), PlayerError> {
        let binding = pool.with_buffer(handle, |b| b.binding())?;
        let delivery = self.next_delivery(binding)?;
        pool.with_buffer_mut(handle, |b| delivery.write_into(b))??;
        Ok(())
    }

    /// Attach the provider extra units are written to, replacing any previous one
    pub fn set_buffer_provider(&mut self, provider: Box<dyn BufferProvider>, pool: Arc<BufferPool>) {
        self.clear_buffer_provider();
        self.provider = Some(ProviderLink { provider, pool });
        log::debug!("buffer provider attached");
    }

    pub fn clear_buffer_provider(&mut self) {
        if let Some(mut link) = self.provider.take() {
            link.provider.release();
            log::debug!("buffer provider released");
        }
    }

    pub fn has_buffer_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Write queued units into provider buffers until the queue or the provider runs dry
    fn hand_off_to_provider(&mut self) {
        let Some(link) = self.provider.as_mut() else {
            return;
        };
        while let Some(kind) = self.pending.front().and_then(DecodedUnit::kind) {
            let Some(handle) = link.request(kind) else {
                break;
            };
            let Some(unit) = self.pending.pop_front() else {
                break;
            };
            match link.pool.with_buffer_mut(handle, |b| b.fill(unit.pts, &unit.content)) {
                Ok(Ok(())) => link.provider.on_buffer_filled(handle, kind),
                Ok(Err(e)) | Err(e) => {
                    log::warn!("provider buffer {:#x} not filled: {}", handle.into_raw(), e);
                    self.pending.push_front(unit);
                    break;
                }
            }
        }
    }

    /// Layout a pre-sized video buffer needs for this file
    pub fn video_frame_layout(&self) -> Option<FrameLayout> {
        self.media_info()?.video.as_ref().map(|v| v.frame_layout())
    }

    /// PCM capacity of a pre-sized audio buffer for this file
    pub fn audio_buffer_capacity(&self) -> Option<usize> {
        let audio = self.media_info()?.audio.as_ref()?;
        Some(audio.bytes_for(self.config.audio_prealloc_millis))
    }

    /// Tear down the session and let go of the provider. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.state.is_released() {
            log::debug!("release on an already released player");
            return;
        }
        self.engine.close();
        self.clear_buffer_provider();
        self.pending.clear();
        self.info = None;
        self.state = PlayerState::Released;
        log::info!("player released");
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.release();
    }
}
