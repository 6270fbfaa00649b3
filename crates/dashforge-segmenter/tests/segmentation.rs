//! End-to-end behaviour of the segmentation manager against a real
//! output directory.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use assert_matches::assert_matches;
use dashforge_segmenter::{
    segment_name, AudioFrame, CycleReport, DasherConfig, Error, ManifestEvent, NullManifest,
    RecordingManifest, SegmentationManager, SegmenterState, TrackKind, WrittenSegment,
};

use common::*;

fn box_type(path: &Path) -> [u8; 4] {
    let data = fs::read(path).unwrap();
    [data[4], data[5], data[6], data[7]]
}

#[test]
fn test_audio_only_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), NullManifest);
    manager.add_segmenter(1, TrackKind::Audio).unwrap();

    let mut inits = Vec::new();
    let mut segments: Vec<(u64, WrittenSegment)> = Vec::new();
    for n in 0..200 {
        let report = manager.process_cycle([(1, audio_frame(n))]).unwrap();
        assert!(report.failed_writes.is_empty());
        inits.extend(report.init_segments);
        segments.extend(report.segments.into_iter().map(|s| (n, s)));
    }

    assert_eq!(inits, vec![dir.path().join("live_1_init.m4a")]);
    assert_eq!(box_type(&inits[0]), *b"ftyp");

    assert_eq!(segments.len(), 2);
    let (at, first) = &segments[0];
    assert_eq!(*at, 93);
    assert_eq!(first.seq, 0);
    assert_eq!(first.timestamp_ms, 0);
    assert_eq!(first.duration, 96256);
    assert_eq!(first.time_base, 48000);
    assert_eq!(
        first.path,
        PathBuf::from(segment_name(&dir.path().to_string_lossy(), "live", 1, 0, ".m4a"))
    );
    assert_eq!(box_type(&first.path), *b"styp");

    let (at, second) = &segments[1];
    assert_eq!(*at, 187);
    assert_eq!(second.seq, 1);
    assert_eq!(second.timestamp_ms, 2005);
    assert_eq!(second.path, dir.path().join("live_1_2005.m4a"));

    let last = manager.finish_all().unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].seq, 2);
    assert_eq!(last[0].timestamp_ms, 4011);
    assert_eq!(last[0].duration, 12 * 1024);

    let total: u64 = segments.iter().map(|(_, s)| s.duration).sum::<u64>() + last[0].duration;
    assert_eq!(total, 200 * 1024);
    assert!(manager.readers().is_empty());
}

#[test]
fn test_audio_waits_for_first_video_segment() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), NullManifest);
    manager.add_segmenter(1, TrackKind::Video).unwrap();
    manager.add_segmenter(2, TrackKind::Audio).unwrap();

    let mut reports: Vec<CycleReport> = Vec::new();
    for n in 0..=50 {
        let report = manager.process_cycle(av_cycle(n, 1, 2)).unwrap();
        if n < 50 {
            assert!(report.segments.is_empty(), "cycle {} wrote a segment", n);
            assert!(!manager.timeline().video_started);
        }
        reports.push(report);
    }

    // audio reached its target in cycle 49 but was held back
    assert!(manager.segmenter(2).unwrap().accumulated_ticks() < 96000);
    let last = &reports[50];
    assert_eq!(last.segments.len(), 2);
    assert_eq!(last.segments[0].kind, TrackKind::Video);
    assert_eq!(last.segments[0].path, dir.path().join("live_1_0.m4v"));
    assert_eq!(last.segments[0].duration, 25600);
    assert_eq!(last.segments[1].kind, TrackKind::Audio);
    assert_eq!(last.segments[1].path, dir.path().join("live_2_0.m4a"));
    assert_eq!(last.segments[1].duration, 95 * 1024);
    assert!(manager.timeline().video_started);
}

#[test]
fn test_durations_conserved_and_sequences_gapless() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = RecordingManifest::new();
    let mut manager = manager(dir.path(), recorder.handle());
    manager.add_segmenter(1, TrackKind::Video).unwrap();
    manager.add_segmenter(2, TrackKind::Audio).unwrap();

    let mut audio_frames = 0u64;
    for n in 0..300 {
        let frames = av_cycle(n, 1, 2);
        audio_frames += frames.iter().filter(|(id, _)| *id == 2).count() as u64;
        manager.process_cycle(frames).unwrap();
    }
    manager.finish_all().unwrap();

    for (id, expected) in [(1, 300 * 512), (2, audio_frames * 1024)] {
        let segments = recorder.segments(id);
        assert!(segments.len() > 2);
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.seq, i as u64);
            assert!(seg.path.exists());
        }
        for pair in segments.windows(2) {
            assert_eq!(pair[1].timestamp, pair[0].timestamp + pair[0].duration);
        }
        assert_eq!(segments.iter().map(|s| s.duration).sum::<u64>(), expected);
    }

    let events = recorder.events();
    assert!(matches!(events.last(), Some(ManifestEvent::Removed(_))));
}

#[test]
fn test_init_written_once_per_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = RecordingManifest::new();
    let mut manager = manager(dir.path(), recorder.handle());
    manager.add_segmenter(1, TrackKind::Audio).unwrap();

    let mut inits = Vec::new();
    for n in 0..10 {
        inits.extend(manager.process_cycle([(1, adts_frame(n, 48000))]).unwrap().init_segments);
    }
    assert_eq!(inits.len(), 1);

    for n in 10..20 {
        inits.extend(manager.process_cycle([(1, adts_frame(n, 44100))]).unwrap().init_segments);
    }
    assert_eq!(inits.len(), 2);
    assert_eq!(inits[0], inits[1]);
    assert_eq!(manager.segmenter(1).unwrap().config_epoch(), 1);

    let updates: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ManifestEvent::Updated(info) => Some(info),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].sample_rate, 48000);
    assert_eq!(updates[1].sample_rate, 44100);
}

#[test]
fn test_removal_flushes_partial_segment() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = RecordingManifest::new();
    let mut manager = manager(dir.path(), recorder.handle());
    manager.add_segmenter(1, TrackKind::Audio).unwrap();

    for n in 0..10 {
        manager.process_cycle([(1, audio_frame(n))]).unwrap();
    }
    let last = manager.remove_segmenter(1).unwrap().unwrap();

    assert_eq!(last.seq, 0);
    assert_eq!(last.duration, 10 * 1024);
    assert!(last.path.exists());
    assert_eq!(recorder.events().last(), Some(&ManifestEvent::Removed(1)));
    assert!(manager.segmenter(1).is_none());
}

#[test]
fn test_video_removal_closes_open_access_unit() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), NullManifest);
    manager.add_segmenter(1, TrackKind::Video).unwrap();

    let mut segments = Vec::new();
    for n in 0..60 {
        segments.extend(manager.process_cycle([(1, video_frame(n))]).unwrap().segments);
    }
    assert_eq!(segments.len(), 1);
    assert_eq!(manager.segmenter(1).unwrap().accumulated_ticks(), 9 * 512);

    // frames 50..=58 are committed, frame 59 is still open
    let last = manager.remove_segmenter(1).unwrap().unwrap();
    assert_eq!(last.seq, 1);
    assert_eq!(last.timestamp_ms, 2000);
    assert_eq!(last.duration, 10 * 512);
    assert_eq!(last.path, dir.path().join("live_1_2000.m4v"));
    assert!(last.path.exists());
    assert!(manager.segmenter(1).is_none());
}

#[test]
fn test_capacity_overflow_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = DasherConfig {
        max_segment_size: 2048,
        ..config(dir.path())
    };
    let mut manager = SegmentationManager::new(config, Box::new(NullManifest)).unwrap();
    manager.add_segmenter(1, TrackKind::Audio).unwrap();
    manager.add_segmenter(2, TrackKind::Audio).unwrap();

    let big = AudioFrame::new(audio_pts(0), vec![0x21; 1900], 1024, 48000, 2);
    let report = manager
        .process_cycle([(1, big.into()), (2, audio_frame(0))])
        .unwrap();

    assert_eq!(report.dropped, vec![1]);
    assert_eq!(report.frames_accepted, 1);
    assert_eq!(report.init_segments, vec![dir.path().join("live_2_init.m4a")]);

    let report = manager.process_cycle([(1, audio_frame(1))]).unwrap();
    assert!(report.dropped.is_empty());
    assert_eq!(manager.segmenter(1).unwrap().accumulated_ticks(), 1024);
}

#[test]
fn test_failed_writes_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), NullManifest);
    manager.add_segmenter(1, TrackKind::Audio).unwrap();
    let init_path = dir.path().join("live_1_init.m4a");
    let seg_path = dir.path().join("live_1_0.m4a");

    fs::remove_dir_all(dir.path()).unwrap();
    let report = manager.process_cycle([(1, audio_frame(0))]).unwrap();
    assert_eq!(report.failed_writes, vec![init_path.clone()]);
    assert!(report.init_segments.is_empty());

    fs::create_dir_all(dir.path()).unwrap();
    let report = manager.process_cycle([(1, audio_frame(1))]).unwrap();
    assert_eq!(report.init_segments, vec![init_path.clone()]);
    assert!(init_path.exists());

    for n in 2..93 {
        manager.process_cycle([(1, audio_frame(n))]).unwrap();
    }

    fs::remove_dir_all(dir.path()).unwrap();
    let report = manager.process_cycle([(1, audio_frame(93))]).unwrap();
    assert_eq!(report.failed_writes, vec![seg_path.clone()]);
    let report = manager.process_cycle([(1, audio_frame(94))]).unwrap();
    assert_eq!(report.failed_writes, vec![seg_path.clone()]);

    fs::create_dir_all(dir.path()).unwrap();
    let report = manager.process_cycle([(1, audio_frame(95))]).unwrap();
    assert!(report.failed_writes.is_empty());
    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].seq, 0);
    assert_eq!(report.segments[0].duration, 94 * 1024);
    assert!(seg_path.exists());

    let mut next = Vec::new();
    for n in 96..200 {
        next.extend(manager.process_cycle([(1, audio_frame(n))]).unwrap().segments);
    }
    assert_eq!(next[0].seq, 1);
    assert_eq!(next[0].timestamp_ms, 2005);
}

#[test]
fn test_wrong_kind_aborts_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), NullManifest);
    manager.add_segmenter(1, TrackKind::Audio).unwrap();

    assert_matches!(
        manager.process_cycle([(1, video_frame(0))]),
        Err(Error::TrackKindMismatch {
            expected: TrackKind::Audio,
            got: TrackKind::Video
        })
    );
}

#[test]
fn test_frames_without_timestamp_do_not_start_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), NullManifest);
    manager.add_segmenter(1, TrackKind::Audio).unwrap();

    let frame = AudioFrame::new(UNIX_EPOCH, vec![0x21, 0x10], 1024, 48000, 2);
    let report = manager.process_cycle([(1, frame.into())]).unwrap();

    assert_eq!(report.frames_accepted, 1);
    assert!(report.init_segments.is_empty());
    assert!(manager.timeline().origin.is_none());
    assert_eq!(manager.segmenter(1).unwrap().state(), SegmenterState::Uninitialized);
}

#[test]
fn test_bitrate_reaches_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = RecordingManifest::new();
    let mut manager = manager(dir.path(), recorder.handle());
    manager.add_segmenter(3, TrackKind::Video).unwrap();
    manager.set_bitrate(3, 2500).unwrap();

    match recorder.events().last() {
        Some(ManifestEvent::Updated(info)) => {
            assert_eq!(info.id, 3);
            assert_eq!(info.bandwidth, 2_500_000);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(manager.state().representations[0].bitrate, 2_500_000);
}
