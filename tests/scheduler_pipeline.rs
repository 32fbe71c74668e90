//! End-to-end scheduler runs over the public API: stub file sources in,
//! recorded publishes out.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use stereocast::{
    DualStreamScheduler, FileConfig, FileSource, MemoryPublisher, ScheduleSettings, SchedulerPhase,
};

fn stub_source(name: &str, frames: u64) -> FileSource {
    FileSource::open(FileConfig {
        path: format!("stub://{}?frames={}", name, frames),
    })
    .expect("open stub source")
}

fn fast_schedule(start_frame: u64) -> ScheduleSettings {
    ScheduleSettings {
        period: Duration::from_millis(1),
        start_frame,
    }
}

#[test]
fn replays_five_frame_pair_onto_both_channels() {
    let left_publisher = MemoryPublisher::new("left");
    let right_publisher = MemoryPublisher::new("right");
    let left_log = left_publisher.log();
    let right_log = right_publisher.log();

    let mut scheduler = DualStreamScheduler::new(
        stub_source("left", 5),
        stub_source("right", 5),
        left_publisher,
        right_publisher,
        fast_schedule(0),
    );

    scheduler.run().expect("run scheduler");

    assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
    let left = left_log.lock().unwrap();
    let right = right_log.lock().unwrap();
    assert_eq!(left.len(), 5);
    assert_eq!(right.len(), 5);
    for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        assert_eq!(l.sequence, i as u64);
        assert_eq!(l.sequence, r.sequence);
        assert_eq!(l.stamp, r.stamp);
        assert_eq!(l.frame_id, "left_camera");
        assert_eq!(r.frame_id, "right_camera");
        assert_eq!(l.width, 640);
        assert_eq!(l.height, 480);
        assert_eq!(l.byte_len, 640 * 480 * 3);
    }
}

#[test]
fn uneven_pair_stops_at_the_shorter_stream() {
    let left_publisher = MemoryPublisher::new("left");
    let left_log = left_publisher.log();

    let mut scheduler = DualStreamScheduler::new(
        stub_source("left", 5),
        stub_source("right", 10),
        left_publisher,
        MemoryPublisher::new("right"),
        fast_schedule(3),
    );

    scheduler.run().expect("run scheduler");

    let sequences: Vec<u64> = left_log.lock().unwrap().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![3, 4]);
    assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
}

#[test]
fn interrupt_is_observed_during_a_long_period_sleep() {
    let mut scheduler = DualStreamScheduler::new(
        stub_source("left", 1_000),
        stub_source("right", 1_000),
        MemoryPublisher::new("left"),
        MemoryPublisher::new("right"),
        ScheduleSettings {
            period: Duration::from_secs(10),
            start_frame: 0,
        },
    );

    let shutdown = scheduler.shutdown_handle();
    let trigger = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::SeqCst);
    });

    let started = Instant::now();
    scheduler.run().expect("run scheduler");
    trigger.join().expect("join trigger thread");

    assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
    // The 10 s period must not delay the stop; the sleep polls the flag.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(feature = "ingest-file-ffmpeg")]
#[test]
fn missing_video_file_fails_to_open_with_the_path() {
    let err = FileSource::open(FileConfig {
        path: "/nonexistent/pair1_left.mp4".to_string(),
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/pair1_left.mp4"));
}
