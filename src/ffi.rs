//! C ABI over players, decode buffers and subtitle readers.
//!
//! Objects cross the boundary as nonzero `u64` handles; 0 is never valid.
//! A null, stale or foreign handle makes a call fail with
//! [`OptResult::Fail`], and makes a query return zero or `false`. Panics
//! are caught here and reported the same way.

use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use slab::Slab;

use crate::buffer::{BufferError, BufferHandle, BufferKind, BufferPool, DecodeBuffer, Plane};
use crate::decode::{EngineError, MediaInfo};
use crate::player::{BufferProvider, Player, PlayerConfig, PlayerError};
use crate::runtime::{self, RuntimeToken};
use crate::subtitle::{ReadOutcome, SubtitleError, SubtitlePacket, SubtitleReader};

/// Result codes of boundary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OptResult {
    Success = 0,
    Fail = 1,
    OpenFileFail = 2,
    NoStreamFound = 3,
    CodecOpenFail = 4,
    DecodeFail = 5,
    SeekFail = 6,
}

impl From<PlayerError> for OptResult {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::Setup(EngineError::OpenInput { .. }) => OptResult::OpenFileFail,
            PlayerError::Setup(EngineError::NoStream) => OptResult::NoStreamFound,
            PlayerError::Setup(EngineError::CodecOpen { .. }) => OptResult::CodecOpenFail,
            PlayerError::Decode(_) => OptResult::DecodeFail,
            PlayerError::Seek(_) => OptResult::SeekFail,
            _ => OptResult::Fail,
        }
    }
}

impl From<SubtitleError> for OptResult {
    fn from(err: SubtitleError) -> Self {
        match err {
            SubtitleError::OpenInput { .. } => OptResult::OpenFileFail,
            SubtitleError::NoStream => OptResult::NoStreamFound,
            SubtitleError::Seek { .. } => OptResult::SeekFail,
            _ => OptResult::Fail,
        }
    }
}

impl From<BufferError> for OptResult {
    fn from(_: BufferError) -> Self {
        OptResult::Fail
    }
}

/// Result codes of `playcore_subtitle_read_packet`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReadPacketResult {
    Success = 0,
    Eof = 1,
    Fail = 2,
}

pub const BUFFER_KIND_VIDEO: i32 = 0;
pub const BUFFER_KIND_AUDIO: i32 = 1;

pub const PLANE_RGBA: i32 = 0;
pub const PLANE_Y: i32 = 1;
pub const PLANE_U: i32 = 2;
pub const PLANE_V: i32 = 3;
pub const PLANE_UV: i32 = 4;

fn kind_code(kind: BufferKind) -> i32 {
    match kind {
        BufferKind::Video => BUFFER_KIND_VIDEO,
        BufferKind::Audio => BUFFER_KIND_AUDIO,
    }
}

fn plane_from_code(code: i32) -> Option<Plane> {
    match code {
        PLANE_RGBA => Some(Plane::Rgba),
        PLANE_Y => Some(Plane::Y),
        PLANE_U => Some(Plane::U),
        PLANE_V => Some(Plane::V),
        PLANE_UV => Some(Plane::Uv),
        _ => None,
    }
}

trait ReturnCode {
    fn code(&self) -> i32;
}

impl ReturnCode for OptResult {
    fn code(&self) -> i32 {
        *self as i32
    }
}

impl ReturnCode for ReadPacketResult {
    fn code(&self) -> i32 {
        *self as i32
    }
}

impl ReturnCode for Result<(), OptResult> {
    fn code(&self) -> i32 {
        match self {
            Ok(()) => OptResult::Success.code(),
            Err(e) => e.code(),
        }
    }
}

impl ReturnCode for Result<ReadPacketResult, OptResult> {
    fn code(&self) -> i32 {
        match self {
            Ok(result) => result.code(),
            Err(_) => ReadPacketResult::Fail.code(),
        }
    }
}

fn return_code<C: ReturnCode>(f: impl FnOnce() -> C) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(ret) => ret.code(),
        Err(_) => {
            log::error!("panic caught at the C boundary");
            OptResult::Fail.code()
        }
    }
}

/// Run a query, answering `fallback` for bad handles and panics
fn query<T>(fallback: T, f: impl FnOnce() -> Option<T>) -> T {
    catch_unwind(AssertUnwindSafe(f)).ok().flatten().unwrap_or(fallback)
}

struct Entry<T> {
    generation: u32,
    value: Arc<Mutex<T>>,
}

/// Generational handle table. The registry lock is only held to look an
/// entry up; each object has its own lock for the duration of a call.
struct Registry<T> {
    entries: Mutex<Slab<Entry<T>>>,
    next_generation: AtomicU32,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Slab::new()),
            next_generation: AtomicU32::new(1),
        }
    }

    fn split(id: u64) -> Option<(u32, usize)> {
        let low = (id & 0xffff_ffff) as usize;
        let index = low.checked_sub(1)?;
        Some(((id >> 32) as u32, index))
    }

    fn insert(&self, value: T) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let index = self.entries.lock().insert(Entry {
            generation,
            value: Arc::new(Mutex::new(value)),
        });
        (u64::from(generation) << 32) | (index as u64 + 1)
    }

    fn get(&self, id: u64) -> Option<Arc<Mutex<T>>> {
        let (generation, index) = Self::split(id)?;
        self.entries
            .lock()
            .get(index)
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.value.clone())
    }

    fn remove(&self, id: u64) -> Option<Arc<Mutex<T>>> {
        let (generation, index) = Self::split(id)?;
        let mut entries = self.entries.lock();
        if entries.get(index)?.generation != generation {
            return None;
        }
        Some(entries.remove(index).value)
    }
}

static PLAYERS: Lazy<Registry<Player>> = Lazy::new(Registry::new);
static SUBTITLE_READERS: Lazy<Registry<SubtitleReader>> = Lazy::new(Registry::new);
static SUBTITLE_PACKETS: Lazy<Registry<SubtitlePacket>> = Lazy::new(Registry::new);
static BUFFERS: Lazy<Arc<BufferPool>> = Lazy::new(|| Arc::new(BufferPool::new()));

fn with_player<R>(player: u64, f: impl FnOnce(&mut Player) -> R) -> Option<R> {
    let entry = PLAYERS.get(player)?;
    let mut guard = entry.lock();
    Some(f(&mut guard))
}

fn with_info<R>(player: u64, f: impl FnOnce(&MediaInfo) -> Option<R>) -> Option<R> {
    with_player(player, |p| p.media_info().and_then(f)).flatten()
}

fn with_buffer<R>(buffer: u64, f: impl FnOnce(&DecodeBuffer) -> R) -> Option<R> {
    let handle = BufferHandle::from_raw(buffer)?;
    BUFFERS.with_buffer(handle, f).ok()
}

fn with_subtitle_reader<R>(reader: u64, f: impl FnOnce(&mut SubtitleReader) -> R) -> Option<R> {
    let entry = SUBTITLE_READERS.get(reader)?;
    let mut guard = entry.lock();
    Some(f(&mut guard))
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
unsafe fn parse_path(path: *const c_char) -> Result<PathBuf, OptResult> {
    if path.is_null() {
        return Err(OptResult::Fail);
    }
    let path = unsafe { CStr::from_ptr(path) };
    let path = path.to_str().map_err(|_| OptResult::Fail)?;
    Ok(PathBuf::from(path))
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
unsafe fn dst_slice<'a>(dst: *mut u8, len: usize) -> Option<&'a mut [u8]> {
    if dst.is_null() || len == 0 {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts_mut(dst, len) })
}

/// Copy `text` NUL-terminated into `dst`, truncating to fit.
/// Returns the full byte length of `text`.
///
/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
unsafe fn copy_str(text: &str, dst: *mut c_char, len: usize) -> usize {
    if let Some(dst) = unsafe { dst_slice(dst.cast(), len) } {
        let n = text.len().min(dst.len() - 1);
        dst[..n].copy_from_slice(&text.as_bytes()[..n]);
        dst[n] = 0;
    }
    text.len()
}

// Player lifecycle

/// Create a player. Always returns a valid handle.
#[no_mangle]
pub extern "C" fn playcore_create_player() -> u64 {
    PLAYERS.insert(Player::new(PlayerConfig::default()))
}

/// Open a media file on a created player.
///
/// # Safety
/// `path` must be a valid NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn playcore_prepare(
    player: u64,
    path: *const c_char,
    hardware_decode: bool,
    audio_channels: i32,
) -> i32 {
    return_code(|| {
        let path = unsafe { parse_path(path) }?;
        with_player(player, |p| {
            p.prepare(&path, hardware_decode, audio_channels)
                .map(|_| ())
                .map_err(OptResult::from)
        })
        .unwrap_or(Err(OptResult::Fail))
    })
}

#[no_mangle]
pub extern "C" fn playcore_decode(player: u64, buffer: u64) -> i32 {
    return_code(|| {
        let handle = BufferHandle::from_raw(buffer).ok_or(OptResult::Fail)?;
        with_player(player, |p| p.decode_handle(&BUFFERS, handle).map_err(OptResult::from))
            .unwrap_or(Err(OptResult::Fail))
    })
}

/// Seek to `target_millis`. A nonzero `buffer` receives the first unit at
/// or after the target; 0 only repositions.
#[no_mangle]
pub extern "C" fn playcore_seek_to(player: u64, buffer: u64, target_millis: i64) -> i32 {
    return_code(|| {
        let handle = BufferHandle::from_raw(buffer);
        with_player(player, |p| {
            p.seek_to_handle(&BUFFERS, handle, target_millis)
                .map_err(OptResult::from)
        })
        .unwrap_or(Err(OptResult::Fail))
    })
}

#[no_mangle]
pub extern "C" fn playcore_reset_decode_progress(player: u64) -> i32 {
    return_code(|| {
        with_player(player, |p| p.reset_decode_progress().map_err(OptResult::from))
            .unwrap_or(Err(OptResult::Fail))
    })
}

/// Release a player and invalidate its handle
#[no_mangle]
pub extern "C" fn playcore_release(player: u64) -> i32 {
    return_code(|| {
        let entry = PLAYERS.remove(player).ok_or(OptResult::Fail)?;
        entry.lock().release();
        Ok(())
    })
}

// Metadata

#[no_mangle]
pub extern "C" fn playcore_duration(player: u64) -> i64 {
    query(0, || with_info(player, |info| Some(info.duration)))
}

#[no_mangle]
pub extern "C" fn playcore_contains_video(player: u64) -> bool {
    query(false, || with_info(player, |info| Some(info.contains_video())))
}

#[no_mangle]
pub extern "C" fn playcore_contains_audio(player: u64) -> bool {
    query(false, || with_info(player, |info| Some(info.contains_audio())))
}

#[no_mangle]
pub extern "C" fn playcore_video_width(player: u64) -> i32 {
    query(0, || with_info(player, |info| Some(info.video.as_ref()?.width as i32)))
}

#[no_mangle]
pub extern "C" fn playcore_video_height(player: u64) -> i32 {
    query(0, || with_info(player, |info| Some(info.video.as_ref()?.height as i32)))
}

#[no_mangle]
pub extern "C" fn playcore_video_fps(player: u64) -> f64 {
    query(0.0, || with_info(player, |info| Some(info.video.as_ref()?.fps)))
}

#[no_mangle]
pub extern "C" fn playcore_video_duration(player: u64) -> i64 {
    query(0, || with_info(player, |info| Some(info.video.as_ref()?.stream_info.duration)))
}

#[no_mangle]
pub extern "C" fn playcore_video_bitrate(player: u64) -> i64 {
    query(0, || with_info(player, |info| Some(info.video.as_ref()?.stream_info.bit_rate)))
}

/// Frame-type code video buffers of this player are filled with
#[no_mangle]
pub extern "C" fn playcore_video_output_frame_type(player: u64) -> i32 {
    query(crate::buffer::FRAME_TYPE_UNKNOWN, || {
        with_info(player, |info| Some(info.video.as_ref()?.output_layout.code()))
    })
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_video_codec_name(player: u64, dst: *mut c_char, len: usize) -> usize {
    query(0, || {
        with_info(player, |info| {
            Some(unsafe { copy_str(&info.video.as_ref()?.stream_info.codec_name, dst, len) })
        })
    })
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_video_pixel_format(player: u64, dst: *mut c_char, len: usize) -> usize {
    query(0, || {
        with_info(player, |info| Some(unsafe { copy_str(&info.video.as_ref()?.pixel_format, dst, len) }))
    })
}

#[no_mangle]
pub extern "C" fn playcore_audio_channels(player: u64) -> i32 {
    query(0, || with_info(player, |info| Some(i32::from(info.audio.as_ref()?.channels))))
}

#[no_mangle]
pub extern "C" fn playcore_audio_bytes_per_sample(player: u64) -> i32 {
    query(0, || with_info(player, |info| Some(info.audio.as_ref()?.bytes_per_sample as i32)))
}

#[no_mangle]
pub extern "C" fn playcore_audio_sample_rate(player: u64) -> i32 {
    query(0, || with_info(player, |info| Some(info.audio.as_ref()?.sample_rate as i32)))
}

#[no_mangle]
pub extern "C" fn playcore_audio_duration(player: u64) -> i64 {
    query(0, || with_info(player, |info| Some(info.audio.as_ref()?.stream_info.duration)))
}

#[no_mangle]
pub extern "C" fn playcore_audio_bitrate(player: u64) -> i64 {
    query(0, || with_info(player, |info| Some(info.audio.as_ref()?.stream_info.bit_rate)))
}

#[no_mangle]
pub extern "C" fn playcore_audio_bit_depth(player: u64) -> i32 {
    query(0, || with_info(player, |info| Some(info.audio.as_ref()?.bit_depth as i32)))
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_audio_codec_name(player: u64, dst: *mut c_char, len: usize) -> usize {
    query(0, || {
        with_info(player, |info| {
            Some(unsafe { copy_str(&info.audio.as_ref()?.stream_info.codec_name, dst, len) })
        })
    })
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_audio_sample_format(player: u64, dst: *mut c_char, len: usize) -> usize {
    query(0, || {
        with_info(player, |info| Some(unsafe { copy_str(&info.audio.as_ref()?.sample_format, dst, len) }))
    })
}

#[no_mangle]
pub extern "C" fn playcore_metadata_count(player: u64) -> usize {
    query(0, || with_info(player, |info| Some(info.metadata.len())))
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_metadata_key(player: u64, index: usize, dst: *mut c_char, len: usize) -> usize {
    query(0, || {
        with_info(player, |info| {
            let (key, _) = info.metadata.get(index)?;
            Some(unsafe { copy_str(key, dst, len) })
        })
    })
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_metadata_value(player: u64, index: usize, dst: *mut c_char, len: usize) -> usize {
    query(0, || {
        with_info(player, |info| {
            let (_, value) = info.metadata.get(index)?;
            Some(unsafe { copy_str(value, dst, len) })
        })
    })
}

// Decode buffers

#[no_mangle]
pub extern "C" fn playcore_alloc_decode_buffer() -> u64 {
    query(0, || Some(BUFFERS.alloc().into_raw()))
}

/// Video buffer sized for `player`'s current format; 0 if it has no video
#[no_mangle]
pub extern "C" fn playcore_alloc_video_decode_buffer(player: u64) -> u64 {
    query(0, || {
        let layout = with_player(player, |p| p.video_frame_layout()).flatten()?;
        Some(BUFFERS.alloc_video(&layout).into_raw())
    })
}

/// Audio buffer sized for `player`'s current format; 0 if it has no audio
#[no_mangle]
pub extern "C" fn playcore_alloc_audio_decode_buffer(player: u64) -> u64 {
    query(0, || {
        let capacity = with_player(player, |p| p.audio_buffer_capacity()).flatten()?;
        Some(BUFFERS.alloc_audio(capacity).into_raw())
    })
}

#[no_mangle]
pub extern "C" fn playcore_free_decode_buffer(buffer: u64) -> i32 {
    return_code(|| {
        let handle = BufferHandle::from_raw(buffer).ok_or(OptResult::Fail)?;
        BUFFERS.free(handle)?;
        Ok(())
    })
}

/// Buffers currently allocated and not yet freed
#[no_mangle]
pub extern "C" fn playcore_live_decode_buffers() -> usize {
    query(0, || Some(BUFFERS.stats().live))
}

#[no_mangle]
pub extern "C" fn playcore_is_video_buffer(buffer: u64) -> bool {
    query(false, || with_buffer(buffer, DecodeBuffer::is_video))
}

#[no_mangle]
pub extern "C" fn playcore_is_last_frame_buffer(buffer: u64) -> bool {
    query(false, || with_buffer(buffer, DecodeBuffer::is_last_frame))
}

#[no_mangle]
pub extern "C" fn playcore_buffer_width(buffer: u64) -> i32 {
    query(0, || with_buffer(buffer, |b| b.width() as i32))
}

#[no_mangle]
pub extern "C" fn playcore_buffer_height(buffer: u64) -> i32 {
    query(0, || with_buffer(buffer, |b| b.height() as i32))
}

#[no_mangle]
pub extern "C" fn playcore_buffer_pts(buffer: u64) -> i64 {
    query(0, || with_buffer(buffer, DecodeBuffer::pts))
}

#[no_mangle]
pub extern "C" fn playcore_buffer_frame_type(buffer: u64) -> i32 {
    query(crate::buffer::FRAME_TYPE_UNKNOWN, || with_buffer(buffer, DecodeBuffer::frame_type))
}

/// Size of plane `plane` (one of the `PLANE_*` codes); 0 when absent
#[no_mangle]
pub extern "C" fn playcore_buffer_plane_size(buffer: u64, plane: i32) -> usize {
    query(0, || {
        let plane = plane_from_code(plane)?;
        with_buffer(buffer, |b| b.plane_size(plane))
    })
}

/// Copy plane `plane` into `dst`; returns bytes written
///
/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_buffer_copy_plane(buffer: u64, plane: i32, dst: *mut u8, len: usize) -> usize {
    query(0, || {
        let plane = plane_from_code(plane)?;
        let dst = unsafe { dst_slice(dst, len) }?;
        with_buffer(buffer, |b| b.copy_plane(plane, dst))
    })
}

macro_rules! plane_accessors {
    ($($code:expr => $size:ident, $copy:ident;)*) => {$(
        #[no_mangle]
        pub extern "C" fn $size(buffer: u64) -> usize {
            playcore_buffer_plane_size(buffer, $code)
        }

        /// # Safety
        /// `dst` must be null or valid for writes of `len` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn $copy(buffer: u64, dst: *mut u8, len: usize) -> usize {
            unsafe { playcore_buffer_copy_plane(buffer, $code, dst, len) }
        }
    )*};
}

plane_accessors! {
    PLANE_RGBA => playcore_buffer_rgba_size, playcore_buffer_copy_rgba;
    PLANE_Y => playcore_buffer_y_size, playcore_buffer_copy_y;
    PLANE_U => playcore_buffer_u_size, playcore_buffer_copy_u;
    PLANE_V => playcore_buffer_v_size, playcore_buffer_copy_v;
    PLANE_UV => playcore_buffer_uv_size, playcore_buffer_copy_uv;
}

#[no_mangle]
pub extern "C" fn playcore_buffer_audio_size(buffer: u64) -> usize {
    query(0, || with_buffer(buffer, DecodeBuffer::audio_size))
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_buffer_copy_audio(buffer: u64, dst: *mut u8, len: usize) -> usize {
    query(0, || {
        let dst = unsafe { dst_slice(dst, len) }?;
        with_buffer(buffer, |b| b.copy_audio(dst))
    })
}

// Buffer provider

type RequestBufferFn = extern "C" fn(user_data: *mut c_void) -> u64;
type BufferFilledFn = extern "C" fn(user_data: *mut c_void, buffer: u64, kind: i32);
type ReleaseFn = extern "C" fn(user_data: *mut c_void);

struct CallbackProvider {
    user_data: *mut c_void,
    request_audio: Option<RequestBufferFn>,
    request_video: Option<RequestBufferFn>,
    on_filled: Option<BufferFilledFn>,
    on_release: Option<ReleaseFn>,
}

// The host guarantees user_data may be used from the thread driving the player
unsafe impl Send for CallbackProvider {}

impl CallbackProvider {
    fn request(&self, callback: Option<RequestBufferFn>) -> Option<BufferHandle> {
        callback.and_then(|request| BufferHandle::from_raw(request(self.user_data)))
    }
}

impl BufferProvider for CallbackProvider {
    fn request_audio_buffer(&mut self) -> Option<BufferHandle> {
        self.request(self.request_audio)
    }

    fn request_video_buffer(&mut self) -> Option<BufferHandle> {
        self.request(self.request_video)
    }

    fn on_buffer_filled(&mut self, handle: BufferHandle, kind: BufferKind) {
        if let Some(on_filled) = self.on_filled {
            on_filled(self.user_data, handle.into_raw(), kind_code(kind));
        }
    }

    fn release(&mut self) {
        if let Some(on_release) = self.on_release.take() {
            on_release(self.user_data);
        }
    }
}

/// Attach host callbacks that receive extra decoded units. Buffers they
/// return must come from `playcore_alloc_*decode_buffer`; a 0 return means
/// none available. `on_release` runs once when the player lets go.
///
/// # Safety
/// The callbacks and `user_data` must stay valid until `on_release` runs.
#[no_mangle]
pub unsafe extern "C" fn playcore_set_buffer_provider(
    player: u64,
    request_audio: Option<RequestBufferFn>,
    request_video: Option<RequestBufferFn>,
    on_filled: Option<BufferFilledFn>,
    on_release: Option<ReleaseFn>,
    user_data: *mut c_void,
) -> i32 {
    return_code(|| {
        let provider = CallbackProvider {
            user_data,
            request_audio,
            request_video,
            on_filled,
            on_release,
        };
        with_player(player, |p| p.set_buffer_provider(Box::new(provider), Arc::clone(&BUFFERS))).ok_or(OptResult::Fail)
    })
}

#[no_mangle]
pub extern "C" fn playcore_clear_buffer_provider(player: u64) -> i32 {
    return_code(|| with_player(player, Player::clear_buffer_provider).ok_or(OptResult::Fail))
}

// Platform runtime

/// Register the platform runtime hardware decoders need. Registering again
/// while one is held keeps the first and still succeeds; `Fail` means no
/// runtime could be registered.
#[no_mangle]
pub extern "C" fn playcore_register_platform_runtime(runtime_ptr: *mut c_void) -> i32 {
    return_code(|| {
        let token = RuntimeToken::from_ptr(runtime_ptr).ok_or(OptResult::Fail)?;
        if runtime::register_platform_runtime(token) || runtime::platform_runtime().is_some() {
            Ok(())
        } else {
            Err(OptResult::Fail)
        }
    })
}

#[no_mangle]
pub extern "C" fn playcore_teardown_platform_runtime() {
    let _ = catch_unwind(runtime::teardown_platform_runtime);
}

// Subtitle reader

#[no_mangle]
pub extern "C" fn playcore_create_subtitle_reader() -> u64 {
    SUBTITLE_READERS.insert(SubtitleReader::new())
}

/// # Safety
/// `path` must be a valid NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn playcore_subtitle_prepare(reader: u64, path: *const c_char) -> i32 {
    return_code(|| {
        let path = unsafe { parse_path(path) }?;
        with_subtitle_reader(reader, |r| r.prepare(&path).map(|_| ()).map_err(OptResult::from))
            .unwrap_or(Err(OptResult::Fail))
    })
}

/// Read the next packet into the reader; take it with `playcore_subtitle_move_packet_ref`
#[no_mangle]
pub extern "C" fn playcore_subtitle_read_packet(reader: u64) -> i32 {
    return_code(|| {
        with_subtitle_reader(reader, |r| match r.read_packet() {
            Ok(ReadOutcome::Packet) => Ok(ReadPacketResult::Success),
            Ok(ReadOutcome::EndOfStream) => Ok(ReadPacketResult::Eof),
            Err(e) => {
                log::warn!("subtitle read failed: {}", e);
                Err(OptResult::from(e))
            }
        })
        .unwrap_or(Err(OptResult::Fail))
    })
}

#[no_mangle]
pub extern "C" fn playcore_subtitle_seek_to(reader: u64, target_millis: i64) -> i32 {
    return_code(|| {
        with_subtitle_reader(reader, |r| r.seek_to(target_millis).map_err(OptResult::from))
            .unwrap_or(Err(OptResult::Fail))
    })
}

#[no_mangle]
pub extern "C" fn playcore_subtitle_release(reader: u64) -> i32 {
    return_code(|| {
        let entry = SUBTITLE_READERS.remove(reader).ok_or(OptResult::Fail)?;
        entry.lock().release();
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn playcore_alloc_subtitle_packet() -> u64 {
    SUBTITLE_PACKETS.insert(SubtitlePacket::default())
}

#[no_mangle]
pub extern "C" fn playcore_free_subtitle_packet(packet: u64) -> i32 {
    return_code(|| SUBTITLE_PACKETS.remove(packet).map(drop).ok_or(OptResult::Fail))
}

/// Move the reader's current packet into `packet`, leaving the reader's empty
#[no_mangle]
pub extern "C" fn playcore_subtitle_move_packet_ref(reader: u64, packet: u64) -> i32 {
    return_code(|| {
        let target = SUBTITLE_PACKETS.get(packet).ok_or(OptResult::Fail)?;
        let mut target = target.lock();
        with_subtitle_reader(reader, |r| r.move_packet_ref(&mut target)).ok_or(OptResult::Fail)
    })
}

fn with_packet<R>(packet: u64, f: impl FnOnce(&SubtitlePacket) -> R) -> Option<R> {
    let entry = SUBTITLE_PACKETS.get(packet)?;
    let guard = entry.lock();
    Some(f(&guard))
}

#[no_mangle]
pub extern "C" fn playcore_subtitle_packet_size(packet: u64) -> usize {
    query(0, || with_packet(packet, SubtitlePacket::size))
}

#[no_mangle]
pub extern "C" fn playcore_subtitle_packet_pts(packet: u64) -> i64 {
    query(0, || with_packet(packet, |p| p.pts))
}

#[no_mangle]
pub extern "C" fn playcore_subtitle_packet_duration(packet: u64) -> i64 {
    query(0, || with_packet(packet, |p| p.duration))
}

/// # Safety
/// `dst` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn playcore_subtitle_copy_packet(packet: u64, dst: *mut u8, len: usize) -> usize {
    query(0, || {
        let dst = unsafe { dst_slice(dst, len) }?;
        with_packet(packet, |p| {
            let n = p.data.len().min(dst.len());
            dst[..n].copy_from_slice(&p.data[..n]);
            n
        })
    })
}
