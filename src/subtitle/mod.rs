pub mod ffmpeg;
pub mod reader;
#[cfg(test)]
pub(crate) mod scripted;

pub use ffmpeg::FfmpegSubtitleDemuxer;
pub use reader::{ReadOutcome, SubtitleDemuxer, SubtitleError, SubtitlePacket, SubtitleReader, SubtitleStreamInfo};
