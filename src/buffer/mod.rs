pub mod buffer;
pub mod layout;
pub mod pool;

pub use buffer::{AudioPayload, Binding, BufferError, BufferKind, DecodeBuffer, Payload, VideoPayload, VideoPlanes};
pub use layout::{FrameLayout, PixelLayout, Plane, FRAME_TYPE_UNKNOWN};
pub use pool::{BufferHandle, BufferPool, PoolStats, StalePolicy};
