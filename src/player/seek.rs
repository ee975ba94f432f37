//! Seek Coordinator.
//!
//! A seek clamps the target into the media's range, repositions the
//! demuxer to the keyframe at or before it and flushes decoders. Everything
//! queued from before the seek is dropped. A filling seek then decodes
//! forward, discarding units that precede the target, and delivers the
//! first one at or after it.

use crate::buffer::{Binding, BufferHandle, BufferKind, BufferPool, DecodeBuffer};
use crate::core::time::Millis;
use crate::player::player::{Delivery, Player, PlayerError};

/// Clamp a seek target into `[0, end]`. An `end` of 0 or less means the
/// duration is unknown; only the lower bound applies then.
pub fn clamp_target(target: Millis, end: Millis) -> Millis {
    if end > 0 {
        target.clamp(0, end)
    } else {
        target.max(0)
    }
}

impl Player {
    fn reposition(&mut self, target: Millis) -> Result<Millis, PlayerError> {
        self.ensure_prepared()?;
        let end = self.info.as_ref().map_or(0, |info| info.seekable_end());
        let clamped = clamp_target(target, end);
        if clamped != target {
            log::debug!("seek target {}ms clamped to {}ms", target, clamped);
        }

        self.engine.seek_to_timestamp(clamped).map_err(|e| {
            log::warn!("seek to {}ms failed: {}", clamped, e);
            PlayerError::Seek(e)
        })?;
        self.pending.clear();
        self.input_exhausted = false;
        self.drained = false;
        Ok(clamped)
    }

    /// Decode forward from the current position to the first unit of
    /// `kind` at or after `target`. Falls back to the last unit decoded
    /// when the stream ends first or the decode bound is hit.
    fn decode_to_target(&mut self, target: Millis, kind: BufferKind) -> Result<Delivery, PlayerError> {
        let limit = self.config.max_seek_decode_units;
        let mut fallback = None;
        let mut decoded = 0usize;

        let found = loop {
            if decoded >= limit {
                log::warn!("seek gave up after {} units short of {}ms", decoded, target);
                break None;
            }
            decoded += 1;
            match self.next_unit(Some(kind)) {
                Ok(Some(unit)) if unit.pts >= target => break Some(unit),
                Ok(Some(unit)) => fallback = Some(unit),
                Ok(None) => break None,
                // a corrupt packet between keyframe and target only costs that packet
                Err(PlayerError::Decode(e)) => log::warn!("skipping undecodable packet during seek: {}", e),
                Err(e) => return Err(e),
            }
        };

        // queued units of the other stream from before the target are stale too
        self.pending.retain(|u| u.pts >= target);
        log::trace!("seek decoded {} units to reach {}ms", decoded, target);

        Ok(match found.or(fallback) {
            Some(unit) => Delivery::Unit(unit),
            None => Delivery::EndOfStream(kind),
        })
    }

    /// Seek and, for a buffer with `binding`, produce the first unit at or after the target
    pub fn seek_delivery(&mut self, target: Millis, binding: Option<Binding>) -> Result<Option<Delivery>, PlayerError> {
        let clamped = self.reposition(target)?;
        let Some(binding) = binding else {
            return Ok(None);
        };
        let kind = match binding {
            Binding::Generic => self.primary_kind(),
            Binding::Pinned(kind) => kind,
        };
        self.decode_to_target(clamped, kind).map(Some)
    }

    /// Seek to `target` milliseconds.
    ///
    /// With `fill` and a buffer, the first presentable unit at or after the
    /// target is written into it. Otherwise only the position changes and
    /// the next `decode` returns the first post-seek unit.
    pub fn seek_to(&mut self, target: Millis, buffer: Option<&mut DecodeBuffer>, fill: bool) -> Result<(), PlayerError> {
        let buffer = buffer.filter(|_| fill);
        let binding = buffer.as_ref().map(|b| b.binding());
        if let (Some(delivery), Some(buffer)) = (self.seek_delivery(target, binding)?, buffer) {
            delivery.write_into(buffer)?;
        }
        Ok(())
    }

    /// [`Player::seek_to`] with a pooled buffer; `None` repositions without filling
    pub fn seek_to_handle(
        &mut self,
        pool: &BufferPool,
        buffer: Option<BufferHandle>,
        target: Millis,
    ) -> Result<(), PlayerError> {
        let binding = match buffer {
            Some(handle) => Some(pool.with_buffer(handle, |b| b.binding())?),
            None => None,
        };
        if let (Some(delivery), Some(handle)) = (self.seek_delivery(target, binding)?, buffer) {
            pool.with_buffer_mut(handle, |b| delivery.write_into(b))??;
        }
        Ok(())
    }

    /// Restart from the beginning without reopening the file
    pub fn reset_decode_progress(&mut self) -> Result<(), PlayerError> {
        self.reposition(0)?;
        log::debug!("decode progress reset");
        Ok(())
    }
}
