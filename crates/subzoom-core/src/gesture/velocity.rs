use std::collections::VecDeque;

use kurbo::{Point, Vec2};

use crate::consts::VELOCITY_WINDOW_MS;

/// Estimates pointer velocity from recent position samples with a
/// least-squares linear fit over a sliding time window.
#[derive(Clone, Debug, Default)]
pub struct VelocityTracker {
    samples: VecDeque<(u64, Point)>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn add(&mut self, time_ms: u64, position: Point) {
        if let Some(&(last, _)) = self.samples.back() {
            if time_ms < last {
                self.samples.clear();
            }
        }
        self.samples.push_back((time_ms, position));
        while let Some(&(first, _)) = self.samples.front() {
            if time_ms.saturating_sub(first) > VELOCITY_WINDOW_MS {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Velocity in units per second, each axis clamped to `[-max, max]`.
    pub fn velocity(&self, max: f64) -> Vec2 {
        if self.samples.len() < 2 {
            return Vec2::ZERO;
        }
        let Some(&(newest, _)) = self.samples.back() else {
            return Vec2::ZERO;
        };
        let n = self.samples.len() as f64;
        // Times relative to the newest sample, in seconds (all <= 0).
        let ts: Vec<f64> = self
            .samples
            .iter()
            .map(|&(t, _)| -((newest - t) as f64) / 1000.0)
            .collect();
        let mean_t = ts.iter().sum::<f64>() / n;
        let mean_x = self.samples.iter().map(|(_, p)| p.x).sum::<f64>() / n;
        let mean_y = self.samples.iter().map(|(_, p)| p.y).sum::<f64>() / n;

        let mut var_t = 0.0;
        let mut cov_x = 0.0;
        let mut cov_y = 0.0;
        for (t, (_, p)) in ts.iter().zip(self.samples.iter()) {
            let dt = t - mean_t;
            var_t += dt * dt;
            cov_x += dt * (p.x - mean_x);
            cov_y += dt * (p.y - mean_y);
        }
        if var_t <= f64::EPSILON {
            return Vec2::ZERO;
        }
        let max = max.abs();
        Vec2::new(
            (cov_x / var_t).clamp(-max, max),
            (cov_y / var_t).clamp(-max, max),
        )
    }
}
