//! Benchmarks for segment export and the per-packet decision path.
//!
//! Run with: cargo bench
//!
//! Export benchmarks require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, time::Duration};

use criterion::{Criterion, criterion_group, criterion_main};
use ffmpeg_next::{Rational, codec::Id};
use segmux::{
    ExportOptions, FfmpegLogLevel, MediaKind, PacketTiming, Segment, SegmentExporter,
    SegmentWindow, StreamDescriptor, StreamId, TimestampState,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";
const SAMPLE_MKV: &str = "tests/fixtures/sample_video.mkv";

fn benchmark_packet_decision(criterion: &mut Criterion) {
    let video = StreamDescriptor {
        id: StreamId(0),
        kind: MediaKind::Video,
        time_base: Rational::new(1, 90_000),
        codec: Id::H264,
    };
    let segment = Segment::new(Duration::from_secs(10), Duration::from_secs(20));
    let window = SegmentWindow::new(&segment, &[video], &video);

    criterion.bench_function("apply 1000 packets", |bencher| {
        bencher.iter(|| {
            let mut state = TimestampState::new([video.id]);
            state.begin_segment();
            for frame in 0..1000_i64 {
                let ts = 810_000 + frame * 3600;
                let timing = PacketTiming {
                    stream: video.id,
                    pts: Some(ts),
                    dts: Some(ts),
                };
                let action = window.apply(&video, timing, &mut state);
                std::hint::black_box(action);
            }
        });
    });
}

fn benchmark_single_segment_export(criterion: &mut Criterion) {
    segmux::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let temporary_directory = tempfile::tempdir().unwrap();
    let output = temporary_directory.path().join("bench.mp4");

    criterion.bench_function("export one 3 s segment (unthrottled)", |bencher| {
        bencher.iter(|| {
            SegmentExporter::new(SAMPLE_VIDEO, &output)
                .unwrap()
                .segment(Segment::new(Duration::from_secs(2), Duration::from_secs(5)))
                .with_options(ExportOptions::new().without_throttle())
                .run()
                .unwrap();
        });
    });
}

fn benchmark_multi_segment_export(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().unwrap();
    let output = temporary_directory.path().join("bench_multi.mp4");
    let segments: Vec<Segment> = (0..4)
        .map(|index| {
            let start = Duration::from_secs(index * 2);
            Segment::new(start, start + Duration::from_secs(1))
        })
        .collect();

    criterion.bench_function("export four 1 s segments (unthrottled)", |bencher| {
        bencher.iter(|| {
            SegmentExporter::new(SAMPLE_VIDEO, &output)
                .unwrap()
                .segments(segments.clone())
                .with_options(ExportOptions::new().without_throttle())
                .run()
                .unwrap();
        });
    });
}

fn benchmark_cross_container_export(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_MKV).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().unwrap();
    let output = temporary_directory.path().join("bench.mp4");

    criterion.bench_function("export MKV segment to MP4", |bencher| {
        bencher.iter(|| {
            SegmentExporter::new(SAMPLE_MKV, &output)
                .unwrap()
                .segment(Segment::new(Duration::from_secs(1), Duration::from_secs(4)))
                .with_options(ExportOptions::new().without_throttle())
                .run()
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    benchmark_packet_decision,
    benchmark_single_segment_export,
    benchmark_multi_segment_export,
    benchmark_cross_container_export,
);
criterion_main!(benches);
