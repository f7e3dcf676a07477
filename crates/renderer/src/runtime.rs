//! Frame scheduling and time sources.
//!
//! The render core never drives its own loop. It asks a [`FrameScheduler`]
//! for the next frame and the host hands the returned [`FrameHandle`] back
//! to [`crate::RenderCore::run_frame`] when the frame is due. Cancelling a
//! handle guarantees the host will not deliver it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Identifies one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(pub u64);

/// Host primitive that delivers at most one frame per request.
pub trait FrameScheduler {
    fn schedule_next_frame(&mut self) -> FrameHandle;
    fn cancel(&mut self, handle: FrameHandle);
}

#[derive(Debug, Default)]
struct ManualQueue {
    next: u64,
    pending: VecDeque<FrameHandle>,
    scheduled: usize,
    cancelled: usize,
}

/// Scheduler that queues frame requests until the host pulls them.
///
/// Clones share the same queue, so a test or headless host can keep one
/// clone while the core owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the oldest due frame.
    pub fn take_due(&self) -> Option<FrameHandle> {
        self.queue.borrow_mut().pending.pop_front()
    }

    pub fn pending(&self) -> Vec<FrameHandle> {
        self.queue.borrow().pending.iter().copied().collect()
    }

    pub fn scheduled_count(&self) -> usize {
        self.queue.borrow().scheduled
    }

    pub fn cancelled_count(&self) -> usize {
        self.queue.borrow().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule_next_frame(&mut self) -> FrameHandle {
        let mut queue = self.queue.borrow_mut();
        queue.next += 1;
        queue.scheduled += 1;
        let handle = FrameHandle(queue.next);
        queue.pending.push_back(handle);
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        let mut queue = self.queue.borrow_mut();
        let before = queue.pending.len();
        queue.pending.retain(|pending| *pending != handle);
        if queue.pending.len() != before {
            queue.cancelled += 1;
        }
    }
}

/// Abstraction over where frame timestamps originate from.
pub trait Clock {
    /// Milliseconds since an arbitrary origin.
    fn now_ms(&mut self) -> f64;
}

/// Clock backed by the monotonic system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that advances by a fixed step on every sample.
#[derive(Debug, Clone, Copy)]
pub struct SteppedClock {
    now: f64,
    step: f64,
}

impl SteppedClock {
    pub fn new(start_ms: f64, step_ms: f64) -> Self {
        Self {
            now: start_ms,
            step: step_ms,
        }
    }

    /// Clock stepping at the interval of `fps` frames per second.
    pub fn at_fps(fps: f64) -> Self {
        Self::new(0.0, 1000.0 / fps.max(1.0))
    }
}

impl Clock for SteppedClock {
    fn now_ms(&mut self) -> f64 {
        let now = self.now;
        self.now += self.step;
        now
    }
}

/// Caps the frame rate of a host loop.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FramePacer {
    /// `None` or a non-positive rate disables pacing.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Time to wait before the next frame is due, measured from `now`.
    pub fn wait_time(&self, now: Instant) -> Duration {
        match (self.interval, self.last) {
            (Some(interval), Some(last)) => (last + interval).saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }

    /// Instant the next frame is due, if pacing is active.
    pub fn next_deadline(&self) -> Option<Instant> {
        Some(self.last? + self.interval?)
    }

    pub fn mark_frame(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_scheduler_cancels_pending_frames() {
        let mut scheduler = ManualScheduler::new();
        let observer = scheduler.clone();
        let first = scheduler.schedule_next_frame();
        let second = scheduler.schedule_next_frame();
        scheduler.cancel(first);
        scheduler.cancel(first);

        assert_eq!(observer.pending(), vec![second]);
        assert_eq!(observer.cancelled_count(), 1);
        assert_eq!(observer.take_due(), Some(second));
        assert_eq!(observer.take_due(), None);
    }

    #[test]
    fn stepped_clock_advances_per_sample() {
        let mut clock = SteppedClock::new(100.0, 16.0);
        assert_eq!(clock.now_ms(), 100.0);
        assert_eq!(clock.now_ms(), 116.0);
        let mut paced = SteppedClock::at_fps(50.0);
        paced.now_ms();
        assert_eq!(paced.now_ms(), 20.0);
    }

    #[test]
    fn pacer_waits_for_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let start = Instant::now();
        assert_eq!(pacer.wait_time(start), Duration::ZERO);
        pacer.mark_frame(start);
        assert_eq!(pacer.wait_time(start), Duration::from_millis(100));
        assert_eq!(
            pacer.wait_time(start + Duration::from_millis(250)),
            Duration::ZERO
        );
        assert!(FramePacer::new(Some(0.0)).interval().is_none());
    }
}
