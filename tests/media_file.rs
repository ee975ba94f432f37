//! Player and engine against a real file (see `fixture` for its layout).

mod fixture;

use std::collections::VecDeque;

use playcore::buffer::{BufferKind, DecodeBuffer, Plane, PixelLayout};
use playcore::decode::{FfmpegEngine, MediaEngine, OpenOptions, VideoOutput};
use playcore::{Player, PlayerConfig};

fn prepared(hardware_decode: bool, audio_channels: i32) -> Player {
    let mut player = Player::new(PlayerConfig::default());
    player.prepare(fixture::media(), hardware_decode, audio_channels).unwrap();
    player
}

#[test]
fn test_prepare_reports_stream_metadata() {
    let player = prepared(false, 2);
    let info = player.media_info().unwrap();
    assert!((info.duration - fixture::DURATION_MS).abs() <= fixture::FRAME_MS);

    let video = info.video.as_ref().unwrap();
    assert_eq!((video.width, video.height), (fixture::WIDTH, fixture::HEIGHT));
    assert!((video.fps - fixture::FPS as f64).abs() < 0.5);
    assert_eq!(video.stream_info.codec_name, "mpeg4");
    assert_eq!(video.output_layout, PixelLayout::Yuv420p);
    assert!(video.hardware_decoder.is_none());

    let audio = info.audio.as_ref().unwrap();
    assert_eq!(audio.sample_rate, fixture::SAMPLE_RATE as u32);
    assert_eq!(audio.source_channels, 2);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.bytes_per_sample, 2);
    assert_eq!(audio.bit_depth, 16);
}

#[test]
fn test_decode_to_end_of_stream() {
    let mut player = prepared(false, 2);
    let mut buffer = DecodeBuffer::generic();
    let mut video_pts = Vec::new();
    let mut audio_bytes = 0usize;
    let mut last_frames = 0usize;

    for _ in 0..10_000 {
        player.decode(&mut buffer).unwrap();
        if buffer.is_last_frame() {
            last_frames += 1;
            if last_frames == 3 {
                break;
            }
            continue;
        }
        assert_eq!(last_frames, 0, "unit delivered after end of stream");
        assert!(buffer.is_video() != buffer.is_audio());
        if buffer.is_video() {
            assert_eq!(buffer.width(), fixture::WIDTH);
            assert_eq!(buffer.plane_size(Plane::Y), (fixture::WIDTH * fixture::HEIGHT) as usize);
            video_pts.push(buffer.pts());
        } else {
            audio_bytes += buffer.audio_size();
        }
    }
    assert_eq!(last_frames, 3);
    assert_eq!(video_pts.len(), fixture::FRAMES);
    assert!(video_pts.windows(2).all(|w| w[0] < w[1]));

    let expected = fixture::FRAMES * fixture::AUDIO_BLOCK * 2 * 2;
    assert!(audio_bytes <= expected);
    assert!(audio_bytes >= expected * 9 / 10);
}

#[test]
fn test_seek_lands_near_target() {
    let mut player = prepared(false, 2);
    let mut buffer = DecodeBuffer::generic();

    // between keyframes: decoding has to run forward from 800ms
    player.seek_to(1_000, Some(&mut buffer), true).unwrap();
    assert!(buffer.is_video());
    assert!(buffer.pts() >= 1_000);
    assert!(buffer.pts() <= 1_000 + fixture::FRAME_MS);

    for _ in 0..20 {
        player.decode(&mut buffer).unwrap();
        assert!(buffer.pts() >= 1_000, "stale unit at {}", buffer.pts());
    }

    // past the end clamps instead of failing
    player.seek_to(fixture::DURATION_MS * 10, Some(&mut buffer), true).unwrap();
    assert!(buffer.pts() <= fixture::DURATION_MS);
}

#[test]
fn test_reset_restarts_from_first_frame() {
    let mut player = prepared(false, 2);
    let mut buffer = DecodeBuffer::video(&player.video_frame_layout().unwrap());
    for _ in 0..10 {
        player.decode(&mut buffer).unwrap();
    }
    assert!(buffer.pts() > 0);

    player.reset_decode_progress().unwrap();
    player.decode(&mut buffer).unwrap();
    assert_eq!(buffer.pts(), 0);
}

#[test]
fn test_pinned_audio_buffer_after_seek() {
    let mut player = prepared(false, 1);
    let mut audio = DecodeBuffer::audio(player.audio_buffer_capacity().unwrap());
    player.seek_to(1_000, Some(&mut audio), true).unwrap();
    assert_eq!(audio.kind(), Some(BufferKind::Audio));
    assert!(audio.pts() >= 1_000);
    // mono 16-bit: at most one block of two-byte samples
    assert!(audio.audio_size() > 0);
    assert!(audio.audio_size() <= fixture::AUDIO_BLOCK * 2);
    assert_eq!(audio.audio_size() % 2, 0);
}

#[test]
fn test_forced_rgba_output() {
    let config = PlayerConfig {
        video_output: VideoOutput::ForceRgba,
        ..Default::default()
    };
    let mut player = Player::new(config);
    player.prepare(fixture::media(), false, 2).unwrap();
    let layout = player.video_frame_layout().unwrap();
    assert_eq!(layout.layout, PixelLayout::Rgba);

    let mut buffer = DecodeBuffer::video(&layout);
    player.decode(&mut buffer).unwrap();
    assert_eq!(buffer.pixel_layout(), Some(PixelLayout::Rgba));
    assert_eq!(buffer.plane_size(Plane::Rgba), (fixture::WIDTH * fixture::HEIGHT * 4) as usize);
    assert_eq!(buffer.plane_size(Plane::Y), 0);
}

#[test]
fn test_hardware_request_falls_back() {
    let software = prepared(false, 2);
    let hardware = prepared(true, 2);
    let sw = software.media_info().unwrap();
    let hw = hardware.media_info().unwrap();
    assert_eq!(sw.duration, hw.duration);
    assert_eq!(sw.audio, hw.audio);

    let (sw_video, hw_video) = (sw.video.as_ref().unwrap(), hw.video.as_ref().unwrap());
    assert_eq!(sw_video.width, hw_video.width);
    assert_eq!(sw_video.height, hw_video.height);
    assert!((sw_video.fps - hw_video.fps).abs() < 0.01);

    let mut hardware = hardware;
    let mut buffer = DecodeBuffer::generic();
    player_decodes_video(&mut hardware, &mut buffer);
}

fn player_decodes_video(player: &mut Player, buffer: &mut DecodeBuffer) {
    for _ in 0..10 {
        player.decode(buffer).unwrap();
        if buffer.is_video() {
            return;
        }
    }
    panic!("no video within ten units");
}

#[test]
fn test_engine_drains_every_frame_once() {
    let mut engine = FfmpegEngine::new();
    let info = engine.open_input(fixture::media(), &OpenOptions::default()).unwrap();
    assert!(info.contains_video() && info.contains_audio());

    let mut out = VecDeque::new();
    while engine.read_frame().unwrap().is_some() {
        engine.decode_packet(&mut out).unwrap();
    }
    engine.drain(&mut out).unwrap();
    let decoded = out.len();
    // draining a drained decoder is not an error and yields nothing
    engine.drain(&mut out).unwrap();
    assert_eq!(out.len(), decoded);

    let video = out.iter().filter(|u| u.kind() == Some(BufferKind::Video)).count();
    assert_eq!(video, fixture::FRAMES);
    engine.close();
    assert!(engine.read_frame().is_err());
}
