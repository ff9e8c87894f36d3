//! Per-packet decision and timeline continuity tests.
//!
//! These drive [`SegmentWindow::apply`], the per-packet step of the remux
//! loop, with synthetic packet sequences so they run without media
//! fixtures.

use std::time::Duration;

use ffmpeg_next::{Rational, codec::Id};
use segmux::{
    MediaKind, PacketAction, PacketTiming, Segment, SegmentWindow, StreamDescriptor, StreamId,
    TimestampState,
};

fn video() -> StreamDescriptor {
    StreamDescriptor {
        id: StreamId(0),
        kind: MediaKind::Video,
        time_base: Rational::new(1, 90_000),
        codec: Id::H264,
    }
}

fn audio() -> StreamDescriptor {
    StreamDescriptor {
        id: StreamId(1),
        kind: MediaKind::Audio,
        time_base: Rational::new(1, 44_100),
        codec: Id::AAC,
    }
}

fn timing(stream: StreamId, pts: i64, dts: i64) -> PacketTiming {
    PacketTiming {
        stream,
        pts: Some(pts),
        dts: Some(dts),
    }
}

/// Run one segment over `packets`, returning the written (stream, pts, dts)
/// triples in input time base.
fn run_segment(
    segment: &Segment,
    streams: &[StreamDescriptor],
    state: &mut TimestampState,
    packets: &[PacketTiming],
) -> Vec<(StreamId, i64, i64)> {
    let window = SegmentWindow::new(segment, streams, &streams[0]);
    state.begin_segment();

    let mut written = Vec::new();
    for packet in packets {
        let Some(stream) = streams.iter().find(|s| s.id == packet.stream) else {
            continue;
        };
        match window.apply(stream, *packet, state) {
            PacketAction::Stop => break,
            PacketAction::Discard => continue,
            PacketAction::Write { pts, dts } => {
                written.push((stream.id, pts.unwrap(), dts.unwrap()));
            }
        }
    }
    written
}

/// The packets a backward seek to `start` would yield: everything from the
/// last video keyframe at or before `start`, with keyframes every
/// `gop_seconds`.
fn seek(packets: &[PacketTiming], start: Duration, gop_seconds: u64) -> &[PacketTiming] {
    let keyframe = (start.as_secs() / gop_seconds * gop_seconds) as i64 * 90_000;
    let index = packets
        .iter()
        .position(|p| p.stream == StreamId(0) && p.pts == Some(keyframe))
        .unwrap_or(packets.len());
    &packets[index..]
}

/// 25 fps video (3600 ticks per frame) from `from` seconds to `to`
/// seconds, interleaved with 1024-sample audio frames.
fn source_packets(from: u64, to: u64) -> Vec<PacketTiming> {
    let mut packets = Vec::new();
    let mut audio_ts = (from * 44_100) as i64;
    for frame in (from * 25)..=(to * 25) {
        let ts = frame as i64 * 3600;
        packets.push(timing(StreamId(0), ts, ts));
        let video_seconds = ts as f64 / 90_000.0;
        while (audio_ts as f64 / 44_100.0) < video_seconds + 0.04 {
            packets.push(timing(StreamId(1), audio_ts, audio_ts));
            audio_ts += 1024;
        }
    }
    packets
}

#[test]
fn single_segment_starts_near_zero() {
    let streams = [video(), audio()];
    let mut state = TimestampState::new(streams.iter().map(|s| s.id));
    let segment = Segment::new(Duration::from_secs(2), Duration::from_secs(4));

    // Seek landed on a keyframe at 1.4 s.
    let packets: Vec<_> = source_packets(1, 5)
        .into_iter()
        .filter(|p| p.stream != StreamId(0) || p.pts.unwrap() >= 126_000)
        .collect();
    let written = run_segment(&segment, &streams, &mut state, &packets);

    let first_video = written.iter().find(|(s, _, _)| *s == StreamId(0)).unwrap();
    // 0.6 s of slack between the keyframe basis and the start.
    assert_eq!(first_video.2, 54_000);

    let last_video = written.iter().rev().find(|(s, _, _)| *s == StreamId(0)).unwrap();
    assert_eq!(last_video.1 - first_video.1, 2 * 90_000);
}

#[test]
fn reference_stops_at_end_inclusive() {
    let streams = [video()];
    let mut state = TimestampState::new([StreamId(0)]);
    let segment = Segment::new(Duration::ZERO, Duration::from_secs(1));

    let packets: Vec<_> = (0..50)
        .map(|f| timing(StreamId(0), f * 3600, f * 3600))
        .collect();
    let written = run_segment(&segment, &streams, &mut state, &packets);

    // Frames 0..=25: the frame exactly at 1 s is kept.
    assert_eq!(written.len(), 26);
    assert_eq!(written.last().unwrap().1, 90_000);
}

#[test]
fn non_reference_streams_never_stop_the_segment() {
    let streams = [video(), audio()];
    let mut state = TimestampState::new(streams.iter().map(|s| s.id));
    let segment = Segment::new(Duration::ZERO, Duration::from_secs(1));
    let window = SegmentWindow::new(&segment, &streams, &video());
    state.begin_segment();

    let late_audio = timing(StreamId(1), 10 * 44_100, 10 * 44_100);
    assert!(matches!(
        window.classify(&audio(), late_audio, &mut state),
        PacketAction::Write { .. }
    ));
}

#[test]
fn discard_threshold_uses_each_streams_time_base() {
    let streams = [video(), audio()];
    let mut state = TimestampState::new(streams.iter().map(|s| s.id));
    let segment = Segment::new(Duration::from_secs(1), Duration::from_secs(2));
    let window = SegmentWindow::new(&segment, &streams, &video());
    state.begin_segment();

    let early_audio = timing(StreamId(1), 44_099, 44_099);
    assert_eq!(
        window.classify(&audio(), early_audio, &mut state),
        PacketAction::Discard
    );
    let on_time_audio = timing(StreamId(1), 44_100, 44_100);
    assert_eq!(
        window.classify(&audio(), on_time_audio, &mut state),
        PacketAction::Write {
            pts: Some(1),
            dts: Some(1),
        }
    );
}

#[test]
fn two_segments_concatenate_monotonically() {
    let streams = [video(), audio()];
    let mut state = TimestampState::new(streams.iter().map(|s| s.id));
    let first = Segment::new(Duration::from_secs(1), Duration::from_secs(3));
    let second = Segment::new(Duration::from_secs(6), Duration::from_secs(8));

    let mut written = run_segment(&first, &streams, &mut state, &source_packets(1, 9));
    let boundary = written.len();
    written.extend(run_segment(
        &second,
        &streams,
        &mut state,
        &source_packets(6, 9),
    ));

    for stream in [StreamId(0), StreamId(1)] {
        let dts: Vec<i64> = written
            .iter()
            .filter(|(s, _, _)| *s == stream)
            .map(|(_, _, dts)| *dts)
            .collect();
        assert!(
            dts.windows(2).all(|pair| pair[0] < pair[1]),
            "DTS of {stream} must strictly increase across segments"
        );
    }

    // The second segment's first video packet sits right after the first's
    // last one.
    let last_of_first = written[..boundary]
        .iter()
        .rev()
        .find(|(s, _, _)| *s == StreamId(0))
        .unwrap();
    let first_of_second = written[boundary..]
        .iter()
        .find(|(s, _, _)| *s == StreamId(0))
        .unwrap();
    assert_eq!(first_of_second.2, last_of_first.2 + 1);
}

#[test]
fn applied_writes_advance_the_offset() {
    let streams = [video()];
    let mut state = TimestampState::new([StreamId(0)]);
    let segment = Segment::new(Duration::ZERO, Duration::from_secs(1));
    let window = SegmentWindow::new(&segment, &streams, &video());
    state.begin_segment();

    let packet = timing(StreamId(0), 7200, 3600);
    assert_eq!(
        window.apply(&video(), packet, &mut state),
        PacketAction::Write {
            pts: Some(3600),
            dts: Some(0),
        }
    );
    assert_eq!(state.output_offset(StreamId(0)), 3601);

    // Stops and discards leave the offset alone.
    let past_end = timing(StreamId(0), 90_001, 90_001);
    assert_eq!(window.apply(&video(), past_end, &mut state), PacketAction::Stop);
    assert_eq!(state.output_offset(StreamId(0)), 3601);
}

#[test]
fn second_segment_follows_first_segments_content() {
    // A 10 minute source with a keyframe every 2 s; export 10-20 s and
    // 100-130 s.
    let streams = [video(), audio()];
    let source = source_packets(0, 600);
    let mut state = TimestampState::new(streams.iter().map(|s| s.id));
    let first = Segment::new(Duration::from_secs(10), Duration::from_secs(20));
    let second = Segment::new(Duration::from_secs(100), Duration::from_secs(130));

    let first_written = run_segment(
        &first,
        &streams,
        &mut state,
        seek(&source, first.start, 2),
    );
    let second_written = run_segment(
        &second,
        &streams,
        &mut state,
        seek(&source, second.start, 2),
    );

    let video_pts = |written: &[(StreamId, i64, i64)]| -> Vec<i64> {
        written
            .iter()
            .filter(|(s, _, _)| *s == StreamId(0))
            .map(|(_, pts, _)| *pts)
            .collect()
    };
    let first_video = video_pts(&first_written);
    let second_video = video_pts(&second_written);

    assert_eq!(first_video.first(), Some(&0));
    assert_eq!(first_video.last(), Some(&(10 * 90_000)));

    let second_start = second_video[0] as f64 / 90_000.0;
    assert!(
        (second_start - 10.0).abs() < 0.05,
        "Second segment should start at about 10 s, started at {second_start:.3} s",
    );
    let second_end = *second_video.last().unwrap() as f64 / 90_000.0;
    assert!(
        (second_end - 40.0).abs() < 0.05,
        "Output should span about 40 s, ended at {second_end:.3} s",
    );
}

#[test]
fn reordered_frames_advance_past_highest_pts() {
    let streams = [video()];
    let mut state = TimestampState::new([StreamId(0)]);
    let first = Segment::new(Duration::ZERO, Duration::from_secs(1));

    // I P B B: PTS runs ahead of DTS.
    let packets = [
        timing(StreamId(0), 3600, 0),
        timing(StreamId(0), 14_400, 3600),
        timing(StreamId(0), 7200, 7200),
        timing(StreamId(0), 10_800, 10_800),
    ];
    run_segment(&first, &streams, &mut state, &packets);
    // Offsets move past the highest rebased PTS, not the last DTS.
    assert_eq!(state.output_offset(StreamId(0)), 14_401);

    let second = Segment::new(Duration::from_secs(5), Duration::from_secs(6));
    let written = run_segment(
        &second,
        &streams,
        &mut state,
        &[timing(StreamId(0), 453_600, 450_000)],
    );
    assert_eq!(written[0], (StreamId(0), 18_001, 14_401));
}

#[test]
fn missing_timestamps_stay_missing() {
    let streams = [video()];
    let mut state = TimestampState::new([StreamId(0)]);
    let segment = Segment::new(Duration::ZERO, Duration::from_secs(1));
    let window = SegmentWindow::new(&segment, &streams, &video());
    state.begin_segment();

    let untimed = PacketTiming {
        stream: StreamId(0),
        pts: None,
        dts: None,
    };
    assert_eq!(
        window.classify(&video(), untimed, &mut state),
        PacketAction::Write {
            pts: None,
            dts: None,
        }
    );
    assert_eq!(state.basis(StreamId(0)), None);

    let dts_only = PacketTiming {
        stream: StreamId(0),
        pts: None,
        dts: Some(900),
    };
    assert_eq!(
        window.classify(&video(), dts_only, &mut state),
        PacketAction::Write {
            pts: None,
            dts: Some(0),
        }
    );
}

#[test]
fn begin_segment_keeps_offsets() {
    let mut state = TimestampState::new([StreamId(0)]);
    state.begin_segment();
    state.observe(StreamId(0), Some(500), Some(500));
    state.advance(StreamId(0), Some(99), Some(99));

    state.begin_segment();
    assert_eq!(state.basis(StreamId(0)), None);
    assert_eq!(state.output_offset(StreamId(0)), 100);
}
