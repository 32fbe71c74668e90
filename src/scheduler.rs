//! Dual-stream tick scheduler.
//!
//! The scheduler owns the two frame sources and the two publishers. Once per
//! period it pulls one frame from each source, stamps both with the same
//! wall-clock instant and sequence index, and forwards each side to its
//! channel. End of stream on either side stops the scheduler for good.
//!
//! Phases move `INIT → RUNNING → STOPPED` and never back. `STOPPED` is
//! terminal: both sources are closed exactly once and any late tick is a
//! no-op. Ticks are strictly serialized on the caller's thread; a tick that
//! overruns the period delays the next tick rather than overlapping it.

use anyhow::{anyhow, ensure, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::frame::{FramePair, StereoSide};
use crate::ingest::{FrameRead, FrameSource};
use crate::publish::{FramePublisher, PublishOutcome};
use crate::Timestamp;

/// Progress log cadence in sequence indices. Arbitrary, not tied to any
/// video's actual fps.
const PROGRESS_LOG_INTERVAL: u64 = 30;

/// Slice length for the inter-tick sleep, so a shutdown request is observed
/// well before a long period elapses.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Scheduling parameters, fixed at construction.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleSettings {
    /// Time between ticks (already clamped by the configuration layer).
    pub period: Duration,
    /// First sequence index, and the offset both sources are seeked to.
    pub start_frame: u64,
}

/// Lifecycle of the scheduler. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    Init,
    Running,
    Stopped,
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A full pair was stamped and handed to both publishers.
    Published,
    /// A mid-stream read failed; nothing was published, the sequence index
    /// did not advance.
    Skipped,
    /// This tick transitioned the scheduler to `Stopped`.
    Stopped,
    /// The scheduler was already stopped; the tick was a no-op.
    Ignored,
}

#[derive(Debug)]
struct SchedulerState {
    sequence_index: u64,
    period: Duration,
    phase: SchedulerPhase,
}

/// The core: two sources in, two channels out, one tick at a time.
pub struct DualStreamScheduler<S: FrameSource, P: FramePublisher> {
    left: S,
    right: S,
    left_publisher: P,
    right_publisher: P,
    state: SchedulerState,
    shutdown: Arc<AtomicBool>,
}

impl<S: FrameSource, P: FramePublisher> DualStreamScheduler<S, P> {
    /// Build a scheduler over two already-open sources. Open failures are the
    /// caller's to surface; a scheduler never exists half-open.
    pub fn new(
        left: S,
        right: S,
        left_publisher: P,
        right_publisher: P,
        settings: ScheduleSettings,
    ) -> Self {
        Self {
            left,
            right,
            left_publisher,
            right_publisher,
            state: SchedulerState {
                sequence_index: settings.start_frame,
                period: settings.period,
                phase: SchedulerPhase::Init,
            },
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.state.phase
    }

    pub fn sequence_index(&self) -> u64 {
        self.state.sequence_index
    }

    /// Flag observed at tick boundaries; set it (e.g. from a signal handler)
    /// to request an orderly stop. In-flight ticks finish.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// One-time transition `INIT → RUNNING`: seek both sources to the start
    /// frame (best effort), then accept ticks.
    pub fn start(&mut self) -> Result<()> {
        ensure!(
            self.state.phase == SchedulerPhase::Init,
            "scheduler already started"
        );
        let start_frame = self.state.sequence_index;
        if start_frame > 0 {
            for (source, side) in [
                (&mut self.left, StereoSide::Left),
                (&mut self.right, StereoSide::Right),
            ] {
                if let Err(e) = source.seek(start_frame) {
                    log::warn!(
                        "{} source {} cannot seek, continuing from frame 0: {e:#}",
                        side.label(),
                        source.descriptor()
                    );
                }
            }
        }
        self.state.phase = SchedulerPhase::Running;
        Ok(())
    }

    /// One read-publish cycle. Never call concurrently; the host loop invokes
    /// this once per period.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        match self.state.phase {
            SchedulerPhase::Init => return Err(anyhow!("scheduler tick before start()")),
            SchedulerPhase::Stopped => return Ok(TickOutcome::Ignored),
            SchedulerPhase::Running => {}
        }
        if self.shutdown.load(Ordering::SeqCst) {
            self.stop("shutdown requested");
            return Ok(TickOutcome::Stopped);
        }

        // Read both sides every tick, left first, so the nth-read pairing
        // stays aligned even when one side fails.
        let left = self.left.read_next();
        let right = self.right.read_next();
        let (left, right) = match (left, right) {
            (Ok(left), Ok(right)) => (left, right),
            (left, right) => {
                if let Err(e) = &left {
                    log::warn!("left source read failed, skipping tick: {e:#}");
                }
                if let Err(e) = &right {
                    log::warn!("right source read failed, skipping tick: {e:#}");
                }
                return Ok(TickOutcome::Skipped);
            }
        };

        let (left_frame, right_frame) = match (left, right) {
            (FrameRead::Frame(left_frame), FrameRead::Frame(right_frame)) => {
                (left_frame, right_frame)
            }
            (left, right) => {
                // Never publish a partial pair.
                let reason = match (left.is_end_of_stream(), right.is_end_of_stream()) {
                    (true, true) => "both streams exhausted",
                    (true, false) => "left stream exhausted",
                    _ => "right stream exhausted",
                };
                self.stop(reason);
                return Ok(TickOutcome::Stopped);
            }
        };

        let pair = FramePair::new(
            self.state.sequence_index,
            Timestamp::now()?,
            left_frame,
            right_frame,
        );
        self.publish_side(StereoSide::Left, &pair);
        self.publish_side(StereoSide::Right, &pair);

        if pair.sequence % PROGRESS_LOG_INTERVAL == 0 {
            log::info!("published frame pair {}", pair.sequence);
        }
        self.state.sequence_index += 1;
        Ok(TickOutcome::Published)
    }

    /// Host loop: tick once per period until stopped. Overruns delay the next
    /// tick; the sleep polls the shutdown flag in short slices.
    pub fn run(&mut self) -> Result<()> {
        if self.state.phase == SchedulerPhase::Init {
            self.start()?;
        }
        let period = self.state.period;
        let mut next_tick = Instant::now();
        loop {
            match self.tick()? {
                TickOutcome::Stopped | TickOutcome::Ignored => return Ok(()),
                TickOutcome::Published | TickOutcome::Skipped => {}
            }
            next_tick += period;
            let now = Instant::now();
            if next_tick < now {
                next_tick = now;
            }
            self.sleep_until(next_tick);
        }
    }

    fn publish_side(&mut self, side: StereoSide, pair: &FramePair) {
        let message = pair.message(side);
        let publisher = match side {
            StereoSide::Left => &mut self.left_publisher,
            StereoSide::Right => &mut self.right_publisher,
        };
        match publisher.publish(&message) {
            Ok(PublishOutcome::Accepted) => {}
            Ok(PublishOutcome::Dropped) => {
                log::warn!(
                    "{} channel saturated, dropped frame {}",
                    publisher.channel(),
                    pair.sequence
                );
            }
            Err(e) => {
                log::warn!(
                    "{} publish failed for frame {}: {e:#}",
                    publisher.channel(),
                    pair.sequence
                );
            }
        }
    }

    fn stop(&mut self, reason: &str) {
        if self.state.phase == SchedulerPhase::Stopped {
            return;
        }
        log::info!("stopping: {}", reason);
        self.left.close();
        self.right.close();
        self.state.phase = SchedulerPhase::Stopped;
    }

    fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
