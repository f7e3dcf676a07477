//! Micro-benchmarks run once during capability detection.
//!
//! The render benchmark animates filled circles on a software canvas, so it
//! measures raw fill throughput rather than any particular GPU path. The
//! CPU benchmark times a dense matrix multiply with a seeded fill.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

const CANVAS_WIDTH: usize = 320;
const CANVAS_HEIGHT: usize = 180;
const CIRCLE_COUNT: usize = 48;
/// Floor applied to measured durations, one microsecond.
const MIN_DURATION_MS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub frames: u32,
    pub fps: f64,
    pub frame_ms: f64,
    pub score: u32,
}

#[derive(Debug, Clone, Copy)]
struct Circle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    radius: f32,
    color: u32,
}

/// Software canvas with bouncing filled circles.
#[derive(Debug, Clone)]
pub struct SyntheticCanvas {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
    circles: Vec<Circle>,
}

impl SyntheticCanvas {
    pub fn new(width: usize, height: usize, circles: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        let circles = (0..circles)
            .map(|_| Circle {
                x: rng.gen_range(0.0..w),
                y: rng.gen_range(0.0..h),
                vx: rng.gen_range(-4.0..4.0),
                vy: rng.gen_range(-4.0..4.0),
                radius: rng.gen_range(4.0..24.0),
                color: rng.gen(),
            })
            .collect();
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            circles,
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Advances the animation one step and redraws the canvas.
    pub fn step(&mut self) {
        self.pixels.fill(0);
        let (w, h) = (self.width as f32, self.height as f32);
        for index in 0..self.circles.len() {
            let circle = &mut self.circles[index];
            circle.x += circle.vx;
            circle.y += circle.vy;
            if circle.x < 0.0 || circle.x > w {
                circle.vx = -circle.vx;
                circle.x = circle.x.clamp(0.0, w);
            }
            if circle.y < 0.0 || circle.y > h {
                circle.vy = -circle.vy;
                circle.y = circle.y.clamp(0.0, h);
            }
            let circle = *circle;
            self.fill_circle(circle);
        }
    }

    fn fill_circle(&mut self, circle: Circle) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let r2 = circle.radius * circle.radius;
        let x0 = (circle.x - circle.radius).max(0.0) as usize;
        let y0 = (circle.y - circle.radius).max(0.0) as usize;
        let x1 = ((circle.x + circle.radius) as usize).min(self.width - 1);
        let y1 = ((circle.y + circle.radius) as usize).min(self.height - 1);
        for y in y0..=y1 {
            let dy = y as f32 - circle.y;
            let row = y * self.width;
            for x in x0..=x1 {
                let dx = x as f32 - circle.x;
                if dx * dx + dy * dy <= r2 {
                    self.pixels[row + x] = circle.color;
                }
            }
        }
    }
}

/// `round(fps * 10 / (frame_ms / 10))`, kept finite and non-negative.
pub fn render_score(fps: f64, frame_ms: f64) -> u32 {
    if !fps.is_finite() || fps <= 0.0 {
        return 0;
    }
    let frame_ms = if frame_ms.is_finite() {
        frame_ms.max(MIN_DURATION_MS)
    } else {
        return 0;
    };
    clamp_score((fps * 10.0 / (frame_ms / 10.0)).round())
}

/// `round(5000 / duration_ms * 100)` with the duration floored at 1µs.
pub fn cpu_score(duration_ms: f64) -> u32 {
    let duration_ms = if duration_ms.is_finite() {
        duration_ms.max(MIN_DURATION_MS)
    } else {
        return 0;
    };
    clamp_score((5000.0 / duration_ms * 100.0).round())
}

fn clamp_score(value: f64) -> u32 {
    if value.is_nan() {
        0
    } else {
        value.clamp(0.0, f64::from(u32::MAX)) as u32
    }
}

/// Renders `frames` canvas frames and scores the throughput.
pub fn render_benchmark(frames: u32, seed: u64) -> BenchmarkResult {
    let frames = frames.max(1);
    let mut canvas = SyntheticCanvas::new(CANVAS_WIDTH, CANVAS_HEIGHT, CIRCLE_COUNT, seed);
    let started = Instant::now();
    for _ in 0..frames {
        canvas.step();
    }
    let elapsed_ms = duration_ms(started.elapsed());
    let frame_ms = elapsed_ms / f64::from(frames);
    let fps = 1000.0 / frame_ms;
    BenchmarkResult {
        frames,
        fps,
        frame_ms,
        score: render_score(fps, frame_ms),
    }
}

/// Multiplies two seeded `size × size` matrices and returns the elapsed
/// time with its score.
pub fn cpu_benchmark(size: usize, seed: u64) -> (Duration, u32) {
    let size = size.max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    let a: Vec<f64> = (0..size * size).map(|_| rng.gen()).collect();
    let b: Vec<f64> = (0..size * size).map(|_| rng.gen()).collect();
    let mut c = vec![0.0f64; size * size];

    let started = Instant::now();
    for i in 0..size {
        for k in 0..size {
            let aik = a[i * size + k];
            for j in 0..size {
                c[i * size + j] += aik * b[k * size + j];
            }
        }
    }
    let elapsed = started.elapsed();
    std::hint::black_box(&c);
    (elapsed, cpu_score(duration_ms(elapsed)))
}

fn duration_ms(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0).max(MIN_DURATION_MS)
}
