//! Decode Buffer: the container for one decoded unit that crosses the boundary.
//! The payload is a closed sum type; accessors for planes or PCM that the
//! current payload does not carry return empty slices and zero sizes.

use crate::buffer::layout::{FrameLayout, PixelLayout, Plane, FRAME_TYPE_UNKNOWN};
use crate::core::time::Millis;

/// Error type for buffer operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("stale or foreign buffer handle: {0:#x}")]
    StaleHandle(u64),
    #[error("buffer pinned to {pinned:?} cannot hold a {offered:?} unit")]
    KindMismatch { pinned: BufferKind, offered: BufferKind },
}

/// Which stream a buffer's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Video,
    Audio,
}

/// Whether a buffer takes any unit, or only units of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Generic,
    Pinned(BufferKind),
}

/// Plane storage, one variant per pixel layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPlanes {
    Rgba { rgba: Vec<u8> },
    Nv12 { y: Vec<u8>, uv: Vec<u8> },
    Nv21 { y: Vec<u8>, uv: Vec<u8> },
    Yuv420p { y: Vec<u8>, u: Vec<u8>, v: Vec<u8> },
}

impl VideoPlanes {
    /// Zero-filled planes sized for `layout`
    pub fn allocate(layout: &FrameLayout) -> Self {
        let plane = |p| vec![0u8; layout.plane_size(p)];
        match layout.layout {
            PixelLayout::Rgba => VideoPlanes::Rgba { rgba: plane(Plane::Rgba) },
            PixelLayout::Nv12 => VideoPlanes::Nv12 { y: plane(Plane::Y), uv: plane(Plane::Uv) },
            PixelLayout::Nv21 => VideoPlanes::Nv21 { y: plane(Plane::Y), uv: plane(Plane::Uv) },
            PixelLayout::Yuv420p => VideoPlanes::Yuv420p {
                y: plane(Plane::Y),
                u: plane(Plane::U),
                v: plane(Plane::V),
            },
        }
    }

    pub fn layout(&self) -> PixelLayout {
        match self {
            VideoPlanes::Rgba { .. } => PixelLayout::Rgba,
            VideoPlanes::Nv12 { .. } => PixelLayout::Nv12,
            VideoPlanes::Nv21 { .. } => PixelLayout::Nv21,
            VideoPlanes::Yuv420p { .. } => PixelLayout::Yuv420p,
        }
    }

    pub fn plane(&self, plane: Plane) -> &[u8] {
        match (self, plane) {
            (VideoPlanes::Rgba { rgba }, Plane::Rgba) => rgba.as_slice(),
            (VideoPlanes::Nv12 { y, .. } | VideoPlanes::Nv21 { y, .. }, Plane::Y) => y.as_slice(),
            (VideoPlanes::Nv12 { uv, .. } | VideoPlanes::Nv21 { uv, .. }, Plane::Uv) => uv.as_slice(),
            (VideoPlanes::Yuv420p { y, .. }, Plane::Y) => y.as_slice(),
            (VideoPlanes::Yuv420p { u, .. }, Plane::U) => u.as_slice(),
            (VideoPlanes::Yuv420p { v, .. }, Plane::V) => v.as_slice(),
            _ => &[],
        }
    }

    fn planes_mut(&mut self) -> Vec<&mut Vec<u8>> {
        match self {
            VideoPlanes::Rgba { rgba } => vec![rgba],
            VideoPlanes::Nv12 { y, uv } | VideoPlanes::Nv21 { y, uv } => vec![y, uv],
            VideoPlanes::Yuv420p { y, u, v } => vec![y, u, v],
        }
    }

    /// Copy `src` into self, reusing allocations when the layouts agree
    fn copy_from(&mut self, src: &VideoPlanes) {
        if self.layout() != src.layout() {
            *self = src.clone();
            return;
        }
        let sources: Vec<&[u8]> = match src {
            VideoPlanes::Rgba { rgba } => vec![rgba.as_slice()],
            VideoPlanes::Nv12 { y, uv } | VideoPlanes::Nv21 { y, uv } => vec![y.as_slice(), uv.as_slice()],
            VideoPlanes::Yuv420p { y, u, v } => vec![y.as_slice(), u.as_slice(), v.as_slice()],
        };
        for (dst, src) in self.planes_mut().into_iter().zip(sources) {
            dst.clear();
            dst.extend_from_slice(src);
        }
    }

    fn clear(&mut self) {
        for plane in self.planes_mut() {
            plane.clear();
        }
    }
}

/// One decoded video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPayload {
    pub width: u32,
    pub height: u32,
    pub planes: VideoPlanes,
}

impl VideoPayload {
    pub fn allocate(layout: &FrameLayout) -> Self {
        Self {
            width: layout.width,
            height: layout.height,
            planes: VideoPlanes::allocate(layout),
        }
    }

    pub fn layout(&self) -> PixelLayout {
        self.planes.layout()
    }
}

/// One decoded block of packed PCM, already conformed to the player's output format
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioPayload {
    pub pcm: Vec<u8>,
}

impl AudioPayload {
    pub fn with_capacity(bytes: usize) -> Self {
        Self { pcm: Vec::with_capacity(bytes) }
    }
}

/// Content of a decoded unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Video(VideoPayload),
    Audio(AudioPayload),
}

impl Payload {
    pub fn kind(&self) -> Option<BufferKind> {
        match self {
            Payload::Empty => None,
            Payload::Video(_) => Some(BufferKind::Video),
            Payload::Audio(_) => Some(BufferKind::Audio),
        }
    }
}

/// A reusable decode buffer.
///
/// Owned by the [`BufferPool`](crate::buffer::BufferPool); the player only
/// writes into it. `kind` and `payload` always agree, except that a buffer
/// marked as last frame may carry an empty payload.
#[derive(Debug, Clone)]
pub struct DecodeBuffer {
    binding: Binding,
    kind: Option<BufferKind>,
    is_last_frame: bool,
    pts: Millis,
    payload: Payload,
}

impl DecodeBuffer {
    /// Empty, kind-less buffer that accepts either kind of unit
    pub fn generic() -> Self {
        Self {
            binding: Binding::Generic,
            kind: None,
            is_last_frame: false,
            pts: 0,
            payload: Payload::Empty,
        }
    }

    /// Video buffer with planes pre-allocated for `layout`
    pub fn video(layout: &FrameLayout) -> Self {
        Self {
            binding: Binding::Pinned(BufferKind::Video),
            kind: Some(BufferKind::Video),
            is_last_frame: false,
            pts: 0,
            payload: Payload::Video(VideoPayload::allocate(layout)),
        }
    }

    /// Audio buffer with `capacity` bytes of PCM storage reserved
    pub fn audio(capacity: usize) -> Self {
        Self {
            binding: Binding::Pinned(BufferKind::Audio),
            kind: Some(BufferKind::Audio),
            is_last_frame: false,
            pts: 0,
            payload: Payload::Audio(AudioPayload::with_capacity(capacity)),
        }
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Overwrite contents with a decoded unit
    pub fn fill(&mut self, pts: Millis, content: &Payload) -> Result<(), BufferError> {
        let Some(offered) = content.kind() else {
            return Ok(());
        };
        if let Binding::Pinned(pinned) = self.binding {
            if pinned != offered {
                return Err(BufferError::KindMismatch { pinned, offered });
            }
        }

        match (&mut self.payload, content) {
            (Payload::Video(dst), Payload::Video(src)) => {
                dst.width = src.width;
                dst.height = src.height;
                dst.planes.copy_from(&src.planes);
            }
            (Payload::Audio(dst), Payload::Audio(src)) => {
                dst.pcm.clear();
                dst.pcm.extend_from_slice(&src.pcm);
            }
            (dst, src) => *dst = src.clone(),
        }
        self.kind = Some(offered);
        self.pts = pts;
        self.is_last_frame = false;
        Ok(())
    }

    /// Turn this buffer into the end-of-stream marker for `kind`.
    /// The payload is emptied; `pts` keeps its previous value.
    pub fn mark_last_frame(&mut self, kind: BufferKind) {
        let kind = match self.binding {
            Binding::Pinned(pinned) => pinned,
            Binding::Generic => kind,
        };
        match &mut self.payload {
            Payload::Video(video) if kind == BufferKind::Video => {
                video.width = 0;
                video.height = 0;
                video.planes.clear();
            }
            Payload::Audio(audio) if kind == BufferKind::Audio => audio.pcm.clear(),
            payload => *payload = Payload::Empty,
        }
        self.kind = Some(kind);
        self.is_last_frame = true;
    }

    pub fn kind(&self) -> Option<BufferKind> {
        self.kind
    }

    pub fn is_video(&self) -> bool {
        self.kind == Some(BufferKind::Video)
    }

    pub fn is_audio(&self) -> bool {
        self.kind == Some(BufferKind::Audio)
    }

    pub fn is_last_frame(&self) -> bool {
        self.is_last_frame
    }

    pub fn pts(&self) -> Millis {
        self.pts
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    fn video_payload(&self) -> Option<&VideoPayload> {
        match &self.payload {
            Payload::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn width(&self) -> u32 {
        self.video_payload().map_or(0, |v| v.width)
    }

    pub fn height(&self) -> u32 {
        self.video_payload().map_or(0, |v| v.height)
    }

    pub fn pixel_layout(&self) -> Option<PixelLayout> {
        self.video_payload().map(VideoPayload::layout)
    }

    /// Boundary frame-type code, or [`FRAME_TYPE_UNKNOWN`] for non-video content
    pub fn frame_type(&self) -> i32 {
        self.pixel_layout().map_or(FRAME_TYPE_UNKNOWN, PixelLayout::code)
    }

    pub fn plane(&self, plane: Plane) -> &[u8] {
        match self.video_payload() {
            Some(video) => video.planes.plane(plane),
            None => &[],
        }
    }

    pub fn plane_size(&self, plane: Plane) -> usize {
        self.plane(plane).len()
    }

    /// Copy a plane into caller memory; returns bytes written
    pub fn copy_plane(&self, plane: Plane, dst: &mut [u8]) -> usize {
        copy_prefix(self.plane(plane), dst)
    }

    pub fn audio_bytes(&self) -> &[u8] {
        match &self.payload {
            Payload::Audio(audio) => &audio.pcm,
            _ => &[],
        }
    }

    pub fn audio_size(&self) -> usize {
        self.audio_bytes().len()
    }

    /// Copy PCM into caller memory; returns bytes written
    pub fn copy_audio(&self, dst: &mut [u8]) -> usize {
        copy_prefix(self.audio_bytes(), dst)
    }
}

fn copy_prefix(src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    n
}
