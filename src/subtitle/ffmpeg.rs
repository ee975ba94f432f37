//! FFmpeg-backed [`SubtitleDemuxer`]. Packets of the best subtitle stream
//! are passed through undecoded.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::media::Type as MediaType;
use ffmpeg_next::{Packet, Rational};

use crate::core::time::{self, Millis};
use crate::runtime;
use crate::subtitle::reader::{SubtitleDemuxer, SubtitleError, SubtitlePacket, SubtitleStreamInfo};

fn ticks(value: Option<i64>, time_base: Rational) -> Millis {
    match value {
        Some(ticks) if ticks > 0 => time::ticks_to_millis(ticks, time_base.numerator(), time_base.denominator()),
        _ => 0,
    }
}

struct SubtitleSession {
    input: Input,
    index: usize,
    time_base: Rational,
}

// Input is only ever touched from the thread that owns the reader
unsafe impl Send for SubtitleSession {}

#[derive(Default)]
pub struct FfmpegSubtitleDemuxer {
    session: Option<SubtitleSession>,
}

impl FfmpegSubtitleDemuxer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubtitleDemuxer for FfmpegSubtitleDemuxer {
    fn open(&mut self, path: &Path) -> Result<SubtitleStreamInfo, SubtitleError> {
        self.close();
        let open_err = |reason: String| SubtitleError::OpenInput {
            path: path.to_path_buf(),
            reason,
        };
        runtime::init().map_err(|e| open_err(e.to_string()))?;
        let input = ffmpeg::format::input(&path).map_err(|e| open_err(e.to_string()))?;

        let stream = input.streams().best(MediaType::Subtitle).ok_or(SubtitleError::NoStream)?;
        let time_base = stream.time_base();
        let mut duration = ticks(Some(stream.duration()), time_base);
        if duration == 0 && input.duration() > 0 {
            duration = time::from_micros(input.duration());
        }
        let info = SubtitleStreamInfo {
            index: stream.index(),
            codec_name: stream.parameters().id().name().to_string(),
            language: stream.metadata().get("language").map(str::to_string),
            duration,
        };

        self.session = Some(SubtitleSession {
            input,
            index: info.index,
            time_base,
        });
        Ok(info)
    }

    fn read_packet(&mut self, packet: &mut SubtitlePacket) -> Result<bool, SubtitleError> {
        let session = self.session.as_mut().ok_or(SubtitleError::NotOpen)?;
        loop {
            let mut raw = Packet::empty();
            match raw.read(&mut session.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => return Ok(false),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => continue,
                Err(e) => return Err(SubtitleError::Read(e.to_string())),
            }
            if raw.stream() != session.index {
                continue;
            }
            packet.data.clear();
            packet.data.extend_from_slice(raw.data().unwrap_or_default());
            packet.pts = ticks(raw.pts().or(raw.dts()), session.time_base);
            packet.duration = ticks(Some(raw.duration()), session.time_base);
            return Ok(true);
        }
    }

    fn seek(&mut self, target: Millis) -> Result<(), SubtitleError> {
        let session = self.session.as_mut().ok_or(SubtitleError::NotOpen)?;
        let ts = time::to_micros(target);
        session.input.seek(ts, ..ts).map_err(|e| SubtitleError::Seek {
            target,
            reason: e.to_string(),
        })
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::debug!("subtitle session closed");
        }
    }
}
