//! Media written on the fly for the file-backed tests: a short Matroska
//! file with MPEG-4 Part 2 video and 16-bit PCM audio, and an SRT file.
//! Both use encoders and muxers built into every FFmpeg, and each is
//! written once per test binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{sample::Type as SampleType, Pixel, Sample};
use ffmpeg_next::{codec, encoder, format, frame, ChannelLayout, Packet, Rational};
use once_cell::sync::OnceCell;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;
pub const FPS: i32 = 25;
pub const FRAME_MS: i64 = 40;
pub const FRAMES: usize = 75;
/// Keyframe every 400ms
pub const GOP: u32 = 10;
pub const SAMPLE_RATE: i32 = 44_100;
/// 40ms of audio per packet
pub const AUDIO_BLOCK: usize = 1_764;
pub const DURATION_MS: i64 = FRAMES as i64 * FRAME_MS;

const CUES: &str = "1
00:00:00,000 --> 00:00:01,000
first cue

2
00:00:02,000 --> 00:00:03,000
second cue

3
00:00:04,000 --> 00:00:05,000
third cue
";

static MEDIA: OnceCell<PathBuf> = OnceCell::new();
static SUBTITLES: OnceCell<PathBuf> = OnceCell::new();

fn scratch_dir() -> PathBuf {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = std::env::temp_dir().join(format!("playcore-fixture-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Path of the audio/video fixture
pub fn media() -> &'static Path {
    MEDIA.get_or_init(|| {
        let path = scratch_dir().join("av.mkv");
        write_media(&path).unwrap();
        path
    })
}

/// Path of the subtitle fixture: three one-second cues starting at 0s, 2s and 4s
pub fn subtitles() -> &'static Path {
    SUBTITLES.get_or_init(|| {
        let path = scratch_dir().join("cues.srt");
        std::fs::write(&path, CUES).unwrap();
        path
    })
}

/// Move every packet the encoder has ready into the muxer
fn write_ready(
    octx: &mut format::context::Output,
    index: usize,
    encoder_time_base: Rational,
    mut receive: impl FnMut(&mut Packet) -> bool,
) -> Result<(), ffmpeg::Error> {
    let stream_time_base = octx.stream(index).map_or(encoder_time_base, |s| s.time_base());
    let mut packet = Packet::empty();
    while receive(&mut packet) {
        packet.set_stream(index);
        packet.rescale_ts(encoder_time_base, stream_time_base);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}

fn video_frame(index: usize) -> frame::Video {
    let mut frame = frame::Video::new(Pixel::YUV420P, WIDTH, HEIGHT);
    let stride = frame.stride(0);
    for (row, line) in frame.data_mut(0).chunks_mut(stride).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            *px = (row + col + index * 3) as u8;
        }
    }
    frame.data_mut(1).fill(128);
    frame.data_mut(2).fill(128);
    frame.set_pts(Some(index as i64));
    frame
}

fn audio_frame(index: usize) -> frame::Audio {
    let mut frame = frame::Audio::new(Sample::I16(SampleType::Packed), AUDIO_BLOCK, ChannelLayout::STEREO);
    frame.set_rate(SAMPLE_RATE as u32);
    // quiet sawtooth so blocks differ
    for (i, sample) in frame.data_mut(0).chunks_exact_mut(2).enumerate() {
        let value = ((i + index * AUDIO_BLOCK) % 256) as i16 * 16;
        sample.copy_from_slice(&value.to_le_bytes());
    }
    frame.set_pts(Some((index * AUDIO_BLOCK) as i64));
    frame
}

fn write_media(path: &Path) -> Result<(), ffmpeg::Error> {
    ffmpeg::init()?;
    let mut octx = format::output(&path)?;
    let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

    let video_codec = encoder::find(codec::Id::MPEG4).ok_or(ffmpeg::Error::EncoderNotFound)?;
    let video_time_base = Rational::new(1, FPS);
    let mut video = codec::context::Context::new_with_codec(video_codec).encoder().video()?;
    video.set_width(WIDTH);
    video.set_height(HEIGHT);
    video.set_format(Pixel::YUV420P);
    video.set_time_base(video_time_base);
    video.set_frame_rate(Some(Rational::new(FPS, 1)));
    video.set_gop(GOP);
    video.set_max_b_frames(0);
    if global_header {
        video.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut video = video.open_as(video_codec)?;
    let video_index = {
        let mut stream = octx.add_stream(video_codec)?;
        stream.set_time_base(video_time_base);
        stream.set_parameters(&video);
        stream.index()
    };

    let audio_codec = encoder::find(codec::Id::PCM_S16LE).ok_or(ffmpeg::Error::EncoderNotFound)?;
    let audio_time_base = Rational::new(1, SAMPLE_RATE);
    let mut audio = codec::context::Context::new_with_codec(audio_codec).encoder().audio()?;
    audio.set_rate(SAMPLE_RATE);
    audio.set_channel_layout(ChannelLayout::STEREO);
    audio.set_format(Sample::I16(SampleType::Packed));
    audio.set_time_base(audio_time_base);
    if global_header {
        audio.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut audio = audio.open_as(audio_codec)?;
    let audio_index = {
        let mut stream = octx.add_stream(audio_codec)?;
        stream.set_time_base(audio_time_base);
        stream.set_parameters(&audio);
        stream.index()
    };

    octx.write_header()?;

    // one audio block covers exactly one video frame
    for index in 0..FRAMES {
        video.send_frame(&video_frame(index))?;
        write_ready(&mut octx, video_index, video_time_base, |p| video.receive_packet(p).is_ok())?;
        audio.send_frame(&audio_frame(index))?;
        write_ready(&mut octx, audio_index, audio_time_base, |p| audio.receive_packet(p).is_ok())?;
    }
    video.send_eof()?;
    write_ready(&mut octx, video_index, video_time_base, |p| video.receive_packet(p).is_ok())?;
    audio.send_eof()?;
    write_ready(&mut octx, audio_index, audio_time_base, |p| audio.receive_packet(p).is_ok())?;

    octx.write_trailer()?;
    Ok(())
}
