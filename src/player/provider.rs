//! Buffer provider: the host-side capability a player forwards extra
//! decoded units to.

use std::sync::Arc;

use crate::buffer::{BufferHandle, BufferKind, BufferPool};

/// Supplies buffers for units a `decode` call produced beyond the one it returned.
///
/// Handles returned here stay owned by the provider; the player only
/// writes into them and reports each fill through `on_buffer_filled`.
pub trait BufferProvider: Send {
    fn request_audio_buffer(&mut self) -> Option<BufferHandle>;

    fn request_video_buffer(&mut self) -> Option<BufferHandle>;

    fn on_buffer_filled(&mut self, _handle: BufferHandle, _kind: BufferKind) {}

    /// Called once when the player lets go of the provider
    fn release(&mut self) {}
}

/// A provider together with the pool its handles come from
pub(crate) struct ProviderLink {
    pub provider: Box<dyn BufferProvider>,
    pub pool: Arc<BufferPool>,
}

impl ProviderLink {
    pub fn request(&mut self, kind: BufferKind) -> Option<BufferHandle> {
        match kind {
            BufferKind::Video => self.provider.request_video_buffer(),
            BufferKind::Audio => self.provider.request_audio_buffer(),
        }
    }
}
