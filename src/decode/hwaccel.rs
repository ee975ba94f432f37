//! Hardware video decoder selection.
//! Hardware decoders are FFmpeg wrapper codecs looked up by name
//! (`h264_mediacodec`, `hevc_cuvid`, ...). Any failure to find or open one
//! falls back to the software decoder.

use ffmpeg_next::codec::{self, Codec};
use ffmpeg_next::decoder;

use crate::runtime;

/// Wrapper-codec suffixes to try, in order, on this platform
pub fn platform_suffixes() -> &'static [&'static str] {
    if cfg!(target_os = "android") {
        &["mediacodec"]
    } else if cfg!(any(target_os = "linux", target_os = "windows")) {
        &["cuvid", "qsv"]
    } else {
        &[]
    }
}

/// Candidate decoder names for `codec_name`, e.g. `h264` -> `["h264_cuvid", "h264_qsv"]`
pub fn candidate_names(codec_name: &str) -> Vec<String> {
    platform_suffixes()
        .iter()
        .map(|suffix| format!("{}_{}", codec_name, suffix))
        .collect()
}

/// First hardware decoder FFmpeg was built with for `id`
pub fn find_hardware_decoder(id: codec::Id) -> Option<Codec> {
    if !runtime::hardware_runtime_ready() {
        log::debug!("hardware decode requested but the platform runtime is not registered");
        return None;
    }
    candidate_names(id.name())
        .iter()
        .find_map(|name| decoder::find_by_name(name))
}
