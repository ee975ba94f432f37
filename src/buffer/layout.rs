//! Pixel layouts and plane size math for video payloads.

/// Pixel layout of a video payload.
/// Discriminants are the frame-type codes reported across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PixelLayout {
    Rgba = 0,
    Nv12 = 1,
    Nv21 = 2,
    Yuv420p = 3,
}

/// Frame-type code for buffers that hold no video payload
pub const FRAME_TYPE_UNKNOWN: i32 = -1;

/// Individual planes a caller can query on a video payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Rgba,
    Y,
    U,
    V,
    /// Interleaved chroma of the semi-planar layouts
    Uv,
}

impl PixelLayout {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether `plane` carries data in this layout
    pub fn has_plane(self, plane: Plane) -> bool {
        matches!(
            (self, plane),
            (PixelLayout::Rgba, Plane::Rgba)
                | (PixelLayout::Nv12 | PixelLayout::Nv21 | PixelLayout::Yuv420p, Plane::Y)
                | (PixelLayout::Yuv420p, Plane::U | Plane::V)
                | (PixelLayout::Nv12 | PixelLayout::Nv21, Plane::Uv)
        )
    }
}

/// Dimensions plus layout of one video frame; enough to size every plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub layout: PixelLayout,
    pub width: u32,
    pub height: u32,
}

impl FrameLayout {
    pub fn new(layout: PixelLayout, width: u32, height: u32) -> Self {
        Self { layout, width, height }
    }

    /// Chroma dimensions for 4:2:0 subsampling, rounded up for odd sizes
    pub fn chroma_size(&self) -> (u32, u32) {
        (self.width.div_ceil(2), self.height.div_ceil(2))
    }

    /// Byte size of `plane`; zero when the layout does not use it
    pub fn plane_size(&self, plane: Plane) -> usize {
        if !self.layout.has_plane(plane) {
            return 0;
        }
        let luma = self.width as usize * self.height as usize;
        let (cw, ch) = self.chroma_size();
        let chroma = cw as usize * ch as usize;
        match plane {
            Plane::Rgba => luma * 4,
            Plane::Y => luma,
            Plane::U | Plane::V => chroma,
            Plane::Uv => chroma * 2,
        }
    }
}
