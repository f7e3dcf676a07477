use std::collections::VecDeque;

/// Rolling window of frames-per-second samples.
///
/// Frame timestamps are folded into one sample per elapsed wall-clock
/// second; the window keeps the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct FpsMonitor {
    samples: VecDeque<f32>,
    capacity: usize,
    second_start: Option<f64>,
    frames: u32,
}

impl FpsMonitor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            second_start: None,
            frames: 0,
        }
    }

    /// Counts a frame; returns the new sample when a second has elapsed.
    pub fn record_frame(&mut self, timestamp_ms: f64) -> Option<f32> {
        let Some(start) = self.second_start else {
            self.second_start = Some(timestamp_ms);
            return None;
        };
        if timestamp_ms < start {
            // clock went backwards; restart the bucket
            self.second_start = Some(timestamp_ms);
            self.frames = 0;
            return None;
        }
        self.frames += 1;
        let elapsed = timestamp_ms - start;
        if elapsed < 1000.0 {
            return None;
        }
        let fps = (f64::from(self.frames) * 1000.0 / elapsed) as f32;
        self.frames = 0;
        self.second_start = Some(timestamp_ms);
        self.push_sample(fps);
        Some(fps)
    }

    pub fn push_sample(&mut self, fps: f32) {
        if !fps.is_finite() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(fps.max(0.0));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn average(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f32>() / self.samples.len() as f32)
    }

    /// Drops the samples but keeps the per-second bucket running.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
