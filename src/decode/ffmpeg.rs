//! FFmpeg implementation of [`MediaEngine`].
//! Packets are read in container order; only the selected audio and video
//! streams are staged, every other stream is skipped.

use std::collections::VecDeque;
use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::stream::Disposition;
use ffmpeg_next::media::Type as MediaType;
use ffmpeg_next::util::frame::{audio::Audio as AudioFrame, video::Video as VideoFrame};
use ffmpeg_next::{Packet, Rational};

use crate::buffer::{BufferKind, Payload};
use crate::core::time::{self, Millis};
use crate::decode::convert::{self, AudioConverter, VideoConverter};
use crate::decode::engine::{DecodedUnit, EngineError, MediaEngine, OpenOptions};
use crate::decode::hwaccel;
use crate::decode::stream_info::{AudioStreamInfo, MediaInfo, StreamInfo, VideoStreamInfo};
use crate::runtime;

fn stream_millis(ticks: i64, time_base: Rational) -> Millis {
    if ticks <= 0 {
        return 0;
    }
    time::ticks_to_millis(ticks, time_base.numerator(), time_base.denominator())
}

/// Map a `receive_frame` result to "got a frame"
fn received(result: Result<(), ffmpeg::Error>) -> Result<bool, EngineError> {
    match result {
        Ok(()) => Ok(true),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(false),
        Err(ffmpeg::Error::Eof) => Ok(false),
        Err(e) => Err(EngineError::Decode(e.to_string())),
    }
}

/// Map a `send_eof` result. A decoder that was already drained answers
/// `Eof`, which is not an error.
fn eof_sent(result: Result<(), ffmpeg::Error>) -> Result<(), EngineError> {
    match result {
        Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
        Err(e) => Err(EngineError::Decode(e.to_string())),
    }
}

struct VideoTrack {
    index: usize,
    time_base: Rational,
    decoder: ffmpeg::decoder::Video,
    converter: VideoConverter,
}

impl VideoTrack {
    fn open(input: &Input, index: usize, options: &OpenOptions) -> Result<(Self, VideoStreamInfo), EngineError> {
        let stream = input.stream(index).ok_or(EngineError::NoStream)?;
        let codec_err = |e: ffmpeg::Error| EngineError::CodecOpen {
            kind: BufferKind::Video,
            reason: e.to_string(),
        };
        let id = stream.parameters().id();

        let mut hardware_decoder = None;
        let mut decoder = None;
        if options.hardware_decode {
            match hwaccel::find_hardware_decoder(id) {
                Some(codec) => {
                    let opened = CodecContext::from_parameters(stream.parameters())
                        .and_then(|ctx| ctx.decoder().open_as(codec))
                        .and_then(|opened| opened.video());
                    match opened {
                        Ok(d) => {
                            log::info!("using hardware decoder {}", codec.name());
                            hardware_decoder = Some(codec.name().to_string());
                            decoder = Some(d);
                        }
                        Err(e) => log::warn!(
                            "hardware decoder {} failed to open, falling back to software: {}",
                            codec.name(),
                            e
                        ),
                    }
                }
                None => log::info!("no hardware decoder for {}, using software", id.name()),
            }
        }
        let decoder = match decoder {
            Some(d) => d,
            None => CodecContext::from_parameters(stream.parameters())
                .and_then(|ctx| ctx.decoder().video())
                .map_err(codec_err)?,
        };

        let time_base = stream.time_base();
        let fps = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .find(|r| r.numerator() > 0 && r.denominator() > 0)
            .map_or(0.0, f64::from);

        let info = VideoStreamInfo {
            stream_info: StreamInfo {
                index,
                duration: stream_millis(stream.duration(), time_base),
                codec_name: id.name().to_string(),
                bit_rate: decoder.bit_rate() as i64,
                time_base: (time_base.numerator(), time_base.denominator()),
            },
            width: decoder.width(),
            height: decoder.height(),
            fps,
            pixel_format: convert::pixel_format_name(decoder.format()),
            output_layout: convert::output_layout(decoder.format(), options.video_output),
            hardware_decoder,
        };
        let track = Self {
            index,
            time_base,
            decoder,
            converter: VideoConverter::new(options.video_output),
        };
        Ok((track, info))
    }

    fn receive(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError> {
        let mut frame = VideoFrame::empty();
        while received(self.decoder.receive_frame(&mut frame))? {
            let pts = frame.timestamp().or(frame.pts()).unwrap_or(0);
            out.push_back(DecodedUnit {
                pts: time::ticks_to_millis(pts, self.time_base.numerator(), self.time_base.denominator()),
                content: Payload::Video(self.converter.convert(&frame)?),
            });
        }
        Ok(())
    }
}

struct AudioTrack {
    index: usize,
    time_base: Rational,
    decoder: ffmpeg::decoder::Audio,
    converter: AudioConverter,
}

impl AudioTrack {
    fn open(input: &Input, index: usize, options: &OpenOptions) -> Result<(Self, AudioStreamInfo), EngineError> {
        let stream = input.stream(index).ok_or(EngineError::NoStream)?;
        let id = stream.parameters().id();
        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().audio())
            .map_err(|e| EngineError::CodecOpen {
                kind: BufferKind::Audio,
                reason: e.to_string(),
            })?;

        let time_base = stream.time_base();
        let info = AudioStreamInfo {
            stream_info: StreamInfo {
                index,
                duration: stream_millis(stream.duration(), time_base),
                codec_name: id.name().to_string(),
                bit_rate: decoder.bit_rate() as i64,
                time_base: (time_base.numerator(), time_base.denominator()),
            },
            sample_rate: decoder.rate(),
            channels: options.audio_channels,
            bytes_per_sample: options.audio_sample_format.bytes_per_sample(),
            source_channels: decoder.channels(),
            sample_format: convert::sample_format_name(decoder.format()),
            bit_depth: convert::sample_bit_depth(decoder.format()),
        };
        let track = Self {
            index,
            time_base,
            decoder,
            converter: AudioConverter::new(options.audio_channels, options.audio_sample_format),
        };
        Ok((track, info))
    }

    fn receive(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError> {
        let mut frame = AudioFrame::empty();
        while received(self.decoder.receive_frame(&mut frame))? {
            let pts = frame.timestamp().or(frame.pts()).unwrap_or(0);
            let pcm = self.converter.convert(&frame)?;
            // the resampler may buffer a whole input frame
            if pcm.pcm.is_empty() {
                continue;
            }
            out.push_back(DecodedUnit {
                pts: time::ticks_to_millis(pts, self.time_base.numerator(), self.time_base.denominator()),
                content: Payload::Audio(pcm),
            });
        }
        Ok(())
    }
}

struct Session {
    input: Input,
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
    staged: Option<(BufferKind, Packet)>,
}

// Scaler and resampler contexts hold raw pointers. A session is only ever
// touched through `&mut FfmpegEngine`, so it is never used from two threads at once.
unsafe impl Send for Session {}

impl Session {
    fn kind_of(&self, stream: usize) -> Option<BufferKind> {
        if self.video.as_ref().is_some_and(|t| t.index == stream) {
            Some(BufferKind::Video)
        } else if self.audio.as_ref().is_some_and(|t| t.index == stream) {
            Some(BufferKind::Audio)
        } else {
            None
        }
    }
}

/// [`MediaEngine`] backed by libavformat / libavcodec
#[derive(Default)]
pub struct FfmpegEngine {
    session: Option<Session>,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&mut self) -> Result<&mut Session, EngineError> {
        self.session.as_mut().ok_or(EngineError::NotOpen)
    }
}

impl MediaEngine for FfmpegEngine {
    fn open_input(&mut self, path: &Path, options: &OpenOptions) -> Result<MediaInfo, EngineError> {
        self.close();
        runtime::init()?;

        let input = ffmpeg::format::input(&path).map_err(|e| EngineError::OpenInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // cover art shows up as a single-frame video stream
        let video_index = input
            .streams()
            .best(MediaType::Video)
            .filter(|s| !s.disposition().contains(Disposition::ATTACHED_PIC))
            .map(|s| s.index());
        let audio_index = input.streams().best(MediaType::Audio).map(|s| s.index());
        if video_index.is_none() && audio_index.is_none() {
            return Err(EngineError::NoStream);
        }

        let (video, video_info) = match video_index {
            Some(index) => {
                let (track, info) = VideoTrack::open(&input, index, options)?;
                (Some(track), Some(info))
            }
            None => (None, None),
        };
        let (audio, audio_info) = match audio_index {
            Some(index) => {
                let (track, info) = AudioTrack::open(&input, index, options)?;
                (Some(track), Some(info))
            }
            None => (None, None),
        };

        let info = MediaInfo {
            duration: if input.duration() > 0 { time::from_micros(input.duration()) } else { 0 },
            video: video_info,
            audio: audio_info,
            metadata: input
                .metadata()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        log::info!(
            "opened {:?}: duration {}, video {:?}, audio {:?}",
            path,
            time::format_time(info.duration),
            info.video.as_ref().map(|v| (v.width, v.height, v.fps)),
            info.audio.as_ref().map(|a| (a.sample_rate, a.source_channels)),
        );

        self.session = Some(Session {
            input,
            video,
            audio,
            staged: None,
        });
        Ok(info)
    }

    fn read_frame(&mut self) -> Result<Option<BufferKind>, EngineError> {
        let session = self.session()?;
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut session.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => continue,
                Err(e) => return Err(EngineError::Read(e.to_string())),
            }
            if let Some(kind) = session.kind_of(packet.stream()) {
                log::trace!("staged {:?} packet pts {:?}", kind, packet.pts());
                session.staged = Some((kind, packet));
                return Ok(Some(kind));
            }
        }
    }

    fn decode_packet(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError> {
        let session = self.session()?;
        let Some((kind, packet)) = session.staged.take() else {
            return Ok(());
        };
        let send_err = |e: ffmpeg::Error| EngineError::Decode(e.to_string());
        match (kind, session.video.as_mut(), session.audio.as_mut()) {
            (BufferKind::Video, Some(track), _) => {
                track.decoder.send_packet(&packet).map_err(send_err)?;
                track.receive(out)
            }
            (BufferKind::Audio, _, Some(track)) => {
                track.decoder.send_packet(&packet).map_err(send_err)?;
                track.receive(out)
            }
            _ => Ok(()),
        }
    }

    fn drain(&mut self, out: &mut VecDeque<DecodedUnit>) -> Result<(), EngineError> {
        let session = self.session()?;
        session.staged = None;
        if let Some(track) = session.video.as_mut() {
            eof_sent(track.decoder.send_eof())?;
            track.receive(out)?;
        }
        if let Some(track) = session.audio.as_mut() {
            eof_sent(track.decoder.send_eof())?;
            track.receive(out)?;
        }
        Ok(())
    }

    fn seek_to_timestamp(&mut self, target: Millis) -> Result<(), EngineError> {
        let session = self.session()?;
        let ts = time::to_micros(target);
        session.input.seek(ts, ..ts).map_err(|e| EngineError::Seek {
            target,
            reason: e.to_string(),
        })?;

        // decoders hold reference frames from before the seek point
        session.staged = None;
        if let Some(track) = session.video.as_mut() {
            track.decoder.flush();
        }
        if let Some(track) = session.audio.as_mut() {
            track.decoder.flush();
        }
        log::debug!("seeked to {}", time::format_time(target));
        Ok(())
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::info!("media session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let mut engine = FfmpegEngine::new();
        let err = engine
            .open_input(Path::new("/nonexistent/playcore.mp4"), &OpenOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::OpenInput { .. }));
    }

    #[test]
    fn test_calls_before_open_report_not_open() {
        let mut engine = FfmpegEngine::new();
        let mut out = VecDeque::new();
        assert_eq!(engine.read_frame(), Err(EngineError::NotOpen));
        assert_eq!(engine.decode_packet(&mut out), Err(EngineError::NotOpen));
        assert_eq!(engine.seek_to_timestamp(0), Err(EngineError::NotOpen));
        engine.close();
    }

    #[test]
    fn test_eof_after_drain_is_not_an_error() {
        assert_eq!(eof_sent(Ok(())), Ok(()));
        assert_eq!(eof_sent(Err(ffmpeg::Error::Eof)), Ok(()));
        assert!(matches!(
            eof_sent(Err(ffmpeg::Error::InvalidData)),
            Err(EngineError::Decode(_))
        ));
    }

    #[test]
    fn test_stream_millis_ignores_unknown_duration() {
        let tb = Rational::new(1, 90_000);
        assert_eq!(stream_millis(900_000, tb), 10_000);
        assert_eq!(stream_millis(i64::MIN, tb), 0);
    }
}
